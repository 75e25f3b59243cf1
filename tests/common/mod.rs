//! An in-memory daemon speaking just enough of the status commands.

use futures::future::{
    ready,
    BoxFuture,
};
use manticore_collector::{
    classify::ErrorClass,
    rows::QueryRows,
    CollectError,
    Connector,
    QueryFailure,
    Session,
};
use std::{
    collections::HashMap,
    sync::{
        Arc,
        Mutex,
        MutexGuard,
    },
    time::Duration,
};

pub const CONNECT: &str = "<connect>";

#[derive(Debug, Default)]
pub struct DaemonState {
    pub global: Vec<(String, String)>,
    pub tables: Vec<String>,
    pub index_status: HashMap<String, Vec<(String, String)>>,
    /// Statements that fail on every execution.
    pub failures: HashMap<String, QueryFailure>,
    /// The next execution of this statement loses the connection.
    pub drop_connection_on: Option<String>,
    pub refuse_connections: bool,
    pub connects: usize,
    pub closes: usize,
    /// Every statement in execution order, with `CONNECT` marking new sessions.
    pub log: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ScriptedDaemon(Arc<Mutex<DaemonState>>);

impl ScriptedDaemon {
    pub fn state(&self) -> MutexGuard<'_, DaemonState> {
        self.0.lock().unwrap()
    }

    pub fn with_global(self, pairs: &[(&str, &str)]) -> Self {
        self.state().global = owned(pairs);
        self
    }

    pub fn with_table(self, name: &str, status: &[(&str, &str)]) -> Self {
        {
            let mut state = self.state();
            state.tables.push(name.to_string());
            state.index_status.insert(name.to_string(), owned(status));
        }
        self
    }

    pub fn failing(self, sql: &str, class: ErrorClass, text: &str) -> Self {
        self.state()
            .failures
            .insert(sql.to_string(), QueryFailure::new(class, text));
        self
    }

    /// Statements executed since the log was last taken.
    pub fn take_log(&self) -> Vec<String> {
        std::mem::take(&mut self.state().log)
    }

    fn run(&self, sql: &str) -> Result<QueryRows, QueryFailure> {
        let mut state = self.state();
        state.log.push(sql.to_string());

        if state.drop_connection_on.as_deref() == Some(sql) {
            state.drop_connection_on = None;
            return Err(QueryFailure::new(
                ErrorClass::Connection,
                "Lost connection to server during query",
            ));
        }
        if let Some(failure) = state.failures.get(sql) {
            return Err(failure.clone());
        }

        match sql {
            "SHOW STATUS" => Ok(QueryRows::key_values(
                ["Counter", "Value"],
                state.global.iter().cloned(),
            )),
            "SHOW TABLES" => Ok(QueryRows::key_values(
                ["Index", "Type"],
                state.tables.iter().map(|t| (t.clone(), "rt".to_string())),
            )),
            "COMMIT" => Ok(QueryRows::default()),
            other => {
                let table = other
                    .strip_prefix("SHOW INDEX ")
                    .and_then(|rest| rest.strip_suffix(" STATUS"));
                match table.and_then(|t| state.index_status.get(t)) {
                    Some(status) => Ok(QueryRows::key_values(
                        ["Variable_name", "Value"],
                        status.iter().cloned(),
                    )),
                    None => Err(QueryFailure::new(
                        ErrorClass::Programming,
                        format!("unknown local index in '{other}'"),
                    )),
                }
            }
        }
    }
}

fn owned(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

pub struct ScriptedSession {
    daemon: ScriptedDaemon,
}

impl Session for ScriptedSession {
    fn query<'a>(&'a mut self, sql: &'a str) -> BoxFuture<'a, Result<QueryRows, QueryFailure>> {
        Box::pin(ready(self.daemon.run(sql)))
    }

    fn commit(&mut self) -> BoxFuture<'_, Result<(), QueryFailure>> {
        Box::pin(ready(self.daemon.run("COMMIT").map(|_| ())))
    }

    fn close(self) -> BoxFuture<'static, ()> {
        self.daemon.state().closes += 1;
        Box::pin(ready(()))
    }
}

impl Connector for ScriptedDaemon {
    type Session = ScriptedSession;

    fn describe(&self) -> String {
        "scripted".to_string()
    }

    fn connect(&self, _timeout: Duration) -> BoxFuture<'_, Result<ScriptedSession, CollectError>> {
        let result = {
            let mut state = self.state();
            if state.refuse_connections {
                Err(CollectError::Connectivity {
                    reason: "Connection refused".to_string(),
                })
            } else {
                state.connects += 1;
                state.log.push(CONNECT.to_string());
                Ok(ScriptedSession { daemon: self.clone() })
            }
        };
        Box::pin(ready(result))
    }
}
