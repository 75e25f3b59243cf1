use crate::{
    classify::{
        classify,
        Severity,
    },
    connection::{
        ConnectionManager,
        Connector,
        Session as _,
    },
    error::{
        CollectError,
        QueryFailure,
    },
    rows::RawData,
};
use std::collections::HashSet;

pub const GLOBAL_STATS: &str = "global_stats";
pub const QUERY_STATUS: &str = "SHOW STATUS";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryEntry {
    pub name: String,
    pub text: String,
}

impl QueryEntry {
    pub fn new(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            text: text.into(),
        }
    }
}

/// Outcome of one pass over a list of statements.
#[derive(Debug, Default)]
pub struct Batch {
    pub rows: RawData,
    /// Entries the daemon permanently rejected, in execution order.
    pub pruned: Vec<(String, QueryFailure)>,
    /// Set when a critical failure cut the pass short. Rows and prunes
    /// gathered before that point are kept.
    pub aborted: Option<CollectError>,
}

impl Batch {
    /// Drops the rows of an aborted pass, keeping only the error.
    pub fn into_result(self) -> Result<Self, CollectError> {
        match self.aborted {
            Some(err) => Err(err),
            None => Ok(self),
        }
    }
}

/// Runs `entries` in order on the managed session.
///
/// A prunable failure skips the entry and records it in [`Batch::pruned`].
/// A critical failure invalidates the connection and ends the pass with
/// [`Batch::aborted`] set. On success the unit of work is committed.
pub async fn run_batch<C: Connector>(connections: &mut ConnectionManager<C>, entries: &[QueryEntry]) -> Batch {
    let mut batch = Batch::default();
    if let Err(err) = run_on_session(connections, entries, &mut batch).await {
        if !matches!(err, CollectError::Connectivity { .. }) {
            error!(%err, "aborting batch");
        }
        connections.invalidate().await;
        batch.aborted = Some(err);
    }
    batch
}

async fn run_on_session<C: Connector>(
    connections: &mut ConnectionManager<C>,
    entries: &[QueryEntry],
    batch: &mut Batch,
) -> Result<(), CollectError> {
    let session = connections.acquire().await?;

    for entry in entries {
        match session.query(&entry.text).await {
            Ok(rows) => {
                trace!(name = %entry.name, rows = rows.rows.len(), "query done");
                batch.rows.insert(entry.name.clone(), rows);
            }
            Err(failure) => match classify(failure.class, &failure.text) {
                Severity::Prunable => {
                    debug!(name = %entry.name, %failure, "statement rejected");
                    batch.pruned.push((entry.name.clone(), failure));
                }
                Severity::Critical => {
                    return Err(CollectError::CriticalQuery {
                        name: entry.name.clone(),
                        failure,
                    });
                }
            },
        }
    }

    session.commit().await.map_err(|failure| CollectError::CriticalQuery {
        name: "commit".to_string(),
        failure,
    })
}

/// Named statements executed on every cycle. Entries only ever leave the
/// registry through pruning, and a pruned name is never accepted again.
#[derive(Debug, Clone)]
pub struct QueryRegistry {
    entries: Vec<QueryEntry>,
    pruned: HashSet<String>,
}

impl Default for QueryRegistry {
    fn default() -> Self {
        Self::new([QueryEntry::new(GLOBAL_STATS, QUERY_STATUS)])
    }
}

impl QueryRegistry {
    pub fn new(entries: impl IntoIterator<Item = QueryEntry>) -> Self {
        let mut registry = Self {
            entries: Vec::new(),
            pruned: HashSet::new(),
        };
        for entry in entries {
            registry.insert(entry);
        }
        registry
    }

    /// Adds `entry` unless the name is registered or was pruned before.
    pub fn insert(&mut self, entry: QueryEntry) -> bool {
        if self.pruned.contains(&entry.name) || self.contains(&entry.name) {
            return false;
        }
        self.entries.push(entry);
        true
    }

    /// Removes `name` for good.
    pub fn prune(&mut self, name: &str) -> bool {
        self.pruned.insert(name.to_string());
        let before = self.entries.len();
        self.entries.retain(|entry| entry.name != name);
        self.entries.len() != before
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|entry| entry.name == name)
    }

    pub fn is_pruned(&self, name: &str) -> bool {
        self.pruned.contains(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|entry| entry.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Runs every registered statement once.
    ///
    /// Iterates a snapshot and applies prunes afterwards. Returns `None` when
    /// the cycle failed or produced no rows at all.
    pub async fn execute<C: Connector>(&mut self, connections: &mut ConnectionManager<C>) -> Option<RawData> {
        let snapshot = self.entries.clone();
        let batch = run_batch(connections, &snapshot).await;

        // Prunes stick even when a later statement aborted the pass.
        for (name, failure) in batch.pruned.iter() {
            if self.prune(name) {
                let err = CollectError::PrunableQuery {
                    name: name.clone(),
                    failure: failure.clone(),
                };
                warn!(%err, "removing query");
            }
        }
        let batch = batch.into_result().ok()?;
        if batch.rows.is_empty() {
            debug!(registered = self.len(), "batch returned no data");
            return None;
        }
        Some(batch.rows)
    }
}
