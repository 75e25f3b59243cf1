//! # Manticore Collector
//!
//! Polls a Manticore Search daemon over its MySQL-protocol listener and turns
//! the status output into chart definitions plus one flat metric sample per
//! cycle, ready for a monitoring host.
//!
//! ## Architecture
//!
//! - **`connection`**: lazily opened session behind the `Connector`/`Session` seam
//! - **`daemon`**: the sqlx implementation of that seam
//! - **`classify`**: decides whether a failed query is dropped or aborts the cycle
//! - **`registry`**: named queries run on every cycle; pruned entries never return
//! - **`discovery`**: expands the per-table templates once tables are known
//! - **`extract`**: status rows to metrics
//! - **`collector`**: one poll, start to finish
//! - **`charts`**: the declarative chart catalogue
//! - **`host`**: netdata `plugins.d` protocol output

#[macro_use]
extern crate tracing;

pub mod charts;
pub mod classify;
pub mod collector;
pub mod connection;
pub mod daemon;
pub mod discovery;
pub mod error;
pub mod extract;
pub mod host;
mod logging;
pub mod registry;
pub mod rows;

pub use collector::Collector;
pub use connection::{
    ConnectionManager,
    Connector,
    Session,
};
pub use daemon::MySqlConnector;
pub use error::{
    CollectError,
    QueryFailure,
};
pub use extract::MetricSample;
pub use logging::{
    init_errors,
    init_logging,
};
