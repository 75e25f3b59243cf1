use crate::{
    charts::{
        ChartDefinition,
        ChartSet,
    },
    connection::{
        ConnectionManager,
        Connector,
    },
    discovery::{
        Discovery,
        SchemaDiscovery,
    },
    extract::{
        extract,
        MetricSample,
    },
    registry::QueryRegistry,
};
use std::time::Duration;

/// Polls one daemon. Every call to [`Collector::collect`] is one cycle;
/// cycles never overlap because they need `&mut self`.
pub struct Collector<C: Connector> {
    connections: ConnectionManager<C>,
    registry: QueryRegistry,
    discovery: SchemaDiscovery,
    charts: ChartSet,
}

impl<C: Connector> Collector<C> {
    /// `update_every` doubles as the connect timeout.
    pub fn new(connector: C, update_every: Duration) -> Self {
        Self {
            connections: ConnectionManager::new(connector, update_every),
            registry: QueryRegistry::default(),
            discovery: SchemaDiscovery::default(),
            charts: ChartSet::default(),
        }
    }

    /// Runs one cycle. `None` means no data this time; the reason is logged.
    #[instrument(level = "debug", skip(self), fields(daemon = %self.connections.connector().describe()))]
    pub async fn collect(&mut self) -> Option<MetricSample> {
        if !self.discovery.is_done() {
            match self
                .discovery
                .probe(&mut self.connections, &mut self.registry, &mut self.charts)
                .await
            {
                Ok(Discovery::Expanded { entities }) => {
                    debug!(entities, queries = self.registry.len(), "templates expanded");
                }
                Ok(Discovery::Empty | Discovery::AlreadyDone) => {}
                Err(err) => {
                    debug!(%err, "discovery failed, skipping cycle");
                    return None;
                }
            }
        }

        let raw = self.registry.execute(&mut self.connections).await?;
        let mut sample = extract(&raw, self.discovery.entities())?;

        let charts = &self.charts;
        sample.retain(|key, _| {
            let declared = charts.declares(key);
            if !declared {
                trace!(%key, "no chart for metric");
            }
            declared
        });
        (!sample.is_empty()).then_some(sample)
    }

    /// Chart definitions to expose to the host, in order.
    pub fn charts(&self) -> impl Iterator<Item = &ChartDefinition> {
        self.charts.definitions()
    }

    pub fn chart_set(&self) -> &ChartSet {
        &self.charts
    }

    pub fn registry(&self) -> &QueryRegistry {
        &self.registry
    }

    pub fn entities(&self) -> &[String] {
        self.discovery.entities()
    }

    pub fn is_connected(&self) -> bool {
        self.connections.is_open()
    }

    pub fn connector(&self) -> &C {
        self.connections.connector()
    }

    /// Closes the session, if any.
    pub async fn shutdown(&mut self) {
        self.connections.invalidate().await;
    }
}
