use crate::{
    error::{
        CollectError,
        QueryFailure,
    },
    rows::QueryRows,
};
use futures::future::BoxFuture;
use std::time::Duration;

/// An open session with the daemon.
pub trait Session: Send {
    /// Runs one statement over the text protocol and fetches every row.
    fn query<'a>(&'a mut self, sql: &'a str) -> BoxFuture<'a, Result<QueryRows, QueryFailure>>;

    /// Closes the unit of work opened by the preceding statements.
    fn commit(&mut self) -> BoxFuture<'_, Result<(), QueryFailure>>;

    /// Closes the session. Errors are irrelevant at this point and swallowed.
    fn close(self) -> BoxFuture<'static, ()>
    where
        Self: Sized;
}

/// Opens sessions against a fixed target.
pub trait Connector: Send {
    type Session: Session;

    /// A human readable description of the target for logs.
    fn describe(&self) -> String;

    fn connect(&self, timeout: Duration) -> BoxFuture<'_, Result<Self::Session, CollectError>>;
}

/// Owns the single lazily opened session. The session is either absent or
/// open; a broken one is closed and dropped by [`ConnectionManager::invalidate`].
pub struct ConnectionManager<C: Connector> {
    connector: C,
    connect_timeout: Duration,
    session: Option<C::Session>,
}

impl<C: Connector> ConnectionManager<C> {
    pub fn new(connector: C, connect_timeout: Duration) -> Self {
        Self {
            connector,
            connect_timeout,
            session: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.session.is_some()
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }

    /// Returns the cached session or opens a new one.
    pub async fn acquire(&mut self) -> Result<&mut C::Session, CollectError> {
        let session = match self.session.take() {
            Some(session) => session,
            None => match self.connector.connect(self.connect_timeout).await {
                Ok(session) => {
                    debug!(daemon = %self.connector.describe(), "connected");
                    session
                }
                Err(err) => {
                    warn!(daemon = %self.connector.describe(), %err, "connect failed");
                    return Err(err);
                }
            },
        };
        Ok(self.session.insert(session))
    }

    /// Closes and forgets the session, if any.
    pub async fn invalidate(&mut self) {
        if let Some(session) = self.session.take() {
            debug!(daemon = %self.connector.describe(), "dropping connection");
            session.close().await;
        }
    }
}
