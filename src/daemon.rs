//! MySQL-protocol access to the daemon through sqlx.
//!
//! Statements are sent as plain strings so sqlx uses the text protocol; the
//! daemon does not support server-side prepared statements.

use crate::{
    classify::ErrorClass,
    connection::{
        Connector,
        Session,
    },
    error::{
        CollectError,
        QueryFailure,
    },
    rows::QueryRows,
};
use futures::future::BoxFuture;
use manticore_collector_config::{
    ClientDefaults,
    Config,
    ConnectionTarget,
    Credentials,
};
use sqlx::{
    mysql::{
        MySqlConnectOptions,
        MySqlConnection,
        MySqlDatabaseError,
        MySqlRow,
    },
    Column as _,
    Connection as _,
    Executor as _,
    Row as _,
};
use std::{
    path::PathBuf,
    time::Duration,
};

/// Server error numbers that reject the statement rather than the session.
const PROGRAMMING_ERROR_CODES: &[u16] = &[
    1007, // ER_DB_CREATE_EXISTS
    1064, // ER_PARSE_ERROR, also used by the daemon for unknown commands and tables
    1102, // ER_WRONG_DB_NAME
    1103, // ER_WRONG_TABLE_NAME
    1110, // ER_FIELD_SPECIFIED_TWICE
    1111, // ER_INVALID_GROUP_FUNC_USE
    1112, // ER_UNSUPPORTED_EXTENSION
    1113, // ER_TABLE_MUST_HAVE_COLUMNS
    1146, // ER_NO_SUCH_TABLE
    1149, // ER_SYNTAX_ERROR
    1166, // ER_WRONG_COLUMN_NAME
    1179, // ER_CANT_DO_THIS_DURING_AN_TRANSACTION
];

enum Endpoint {
    Socket(PathBuf),
    Tcp { host: String, port: u16 },
}

pub struct MySqlConnector {
    target: ConnectionTarget,
    credentials: Credentials,
    default_port: u16,
}

impl MySqlConnector {
    pub fn new(target: ConnectionTarget, credentials: Credentials, default_port: u16) -> Self {
        Self {
            target,
            credentials,
            default_port,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.target(), config.credentials(), config.port)
    }

    /// The option file is read on every attempt so edits are picked up on reconnect.
    fn endpoint(&self) -> Result<(Endpoint, Credentials), CollectError> {
        let (target, credentials) = match &self.target {
            ConnectionTarget::DefaultsFile(path) => {
                let defaults = ClientDefaults::load(path).map_err(|err| CollectError::Connectivity {
                    reason: format!("{err:#}"),
                })?;
                (
                    defaults.target(self.default_port),
                    self.credentials.clone().or(defaults.credentials()),
                )
            }
            target => (target.clone(), self.credentials.clone()),
        };

        let endpoint = match target {
            ConnectionTarget::Socket(path) => Endpoint::Socket(path),
            ConnectionTarget::Tcp { host, port } => Endpoint::Tcp { host, port },
            ConnectionTarget::DefaultsFile(path) => {
                return Err(CollectError::Connectivity {
                    reason: format!("option file {} refers to another option file", path.display()),
                })
            }
        };
        Ok((endpoint, credentials))
    }

    fn options(&self) -> Result<MySqlConnectOptions, CollectError> {
        let (endpoint, credentials) = self.endpoint()?;

        // Keep the session setup to `SET NAMES`; the daemon has no sql_mode or time_zone.
        let mut options = MySqlConnectOptions::new()
            .pipes_as_concat(false)
            .no_engine_substitution(false)
            .timezone(None::<String>);

        options = match endpoint {
            Endpoint::Socket(path) => options.socket(path),
            Endpoint::Tcp { host, port } => options.host(&host).port(port),
        };
        if let Some(user) = &credentials.user {
            options = options.username(user);
        }
        if let Some(password) = &credentials.password {
            options = options.password(password.expose());
        }
        Ok(options)
    }
}

impl Connector for MySqlConnector {
    type Session = MySqlSession;

    fn describe(&self) -> String {
        self.target.to_string()
    }

    fn connect(&self, timeout: Duration) -> BoxFuture<'_, Result<MySqlSession, CollectError>> {
        Box::pin(async move {
            let options = self.options()?;
            match tokio::time::timeout(timeout, MySqlConnection::connect_with(&options)).await {
                Ok(Ok(conn)) => Ok(MySqlSession { conn }),
                Ok(Err(err)) => Err(CollectError::Connectivity {
                    reason: err.to_string(),
                }),
                Err(_) => Err(CollectError::Connectivity {
                    reason: format!("no answer within {}s", timeout.as_secs()),
                }),
            }
        })
    }
}

pub struct MySqlSession {
    conn: MySqlConnection,
}

impl Session for MySqlSession {
    fn query<'a>(&'a mut self, sql: &'a str) -> BoxFuture<'a, Result<QueryRows, QueryFailure>> {
        Box::pin(async move {
            let rows = (&mut self.conn).fetch_all(sql).await.map_err(failure_from)?;
            rows_to_table(&rows)
        })
    }

    fn commit(&mut self) -> BoxFuture<'_, Result<(), QueryFailure>> {
        Box::pin(async move {
            (&mut self.conn).execute("COMMIT").await.map_err(failure_from)?;
            Ok(())
        })
    }

    fn close(self) -> BoxFuture<'static, ()> {
        Box::pin(async move {
            if let Err(err) = self.conn.close().await {
                debug!(%err, "error while closing connection");
            }
        })
    }
}

fn rows_to_table(rows: &[MySqlRow]) -> Result<QueryRows, QueryFailure> {
    let columns = rows
        .first()
        .map(|row| row.columns().iter().map(|c| c.name().to_string()).collect())
        .unwrap_or_default();

    let mut table = Vec::with_capacity(rows.len());
    for row in rows {
        let mut cells = Vec::with_capacity(row.len());
        for index in 0..row.len() {
            // Text protocol: every value arrives as its textual form.
            let cell: Option<String> = row.try_get_unchecked(index).map_err(failure_from)?;
            cells.push(cell);
        }
        table.push(cells);
    }
    Ok(QueryRows::new(columns, table))
}

fn failure_from(err: sqlx::Error) -> QueryFailure {
    let class = match &err {
        sqlx::Error::Database(db) => match db.try_downcast_ref::<MySqlDatabaseError>() {
            Some(db) if PROGRAMMING_ERROR_CODES.contains(&db.number()) => ErrorClass::Programming,
            _ => ErrorClass::Operational,
        },
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::Protocol(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed => ErrorClass::Connection,
        sqlx::Error::ColumnDecode { .. }
        | sqlx::Error::Decode(_)
        | sqlx::Error::TypeNotFound { .. }
        | sqlx::Error::ColumnIndexOutOfBounds { .. }
        | sqlx::Error::ColumnNotFound(_) => ErrorClass::Decode,
        _ => ErrorClass::Interface,
    };
    QueryFailure::new(class, err.to_string())
}
