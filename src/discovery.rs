//! One-time expansion of the chart and query templates for every table the
//! daemon serves.

use crate::{
    charts::{
        ChartSet,
        Line,
        HISTOGRAM_TEMPLATES,
        SIMPLE_GAUGE_KEYS,
    },
    connection::{
        ConnectionManager,
        Connector,
    },
    error::CollectError,
    registry::{
        run_batch,
        QueryEntry,
        QueryRegistry,
    },
};

pub const TABLES: &str = "tables";
pub const QUERY_TABLES: &str = "SHOW TABLES";

/// Name of the registry entry polling `entity`.
pub fn entity_query_name(entity: &str) -> String {
    format!("entity_{entity}")
}

pub fn entity_query_text(entity: &str) -> String {
    format!("SHOW INDEX {entity} STATUS")
}

fn is_identifier(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Discovery {
    /// Tables were found and the templates expanded.
    Expanded { entities: usize },
    /// An earlier probe already expanded the templates.
    AlreadyDone,
    /// The probe ran but found nothing usable; try again next cycle.
    Empty,
}

#[derive(Debug, Clone, Default)]
pub struct SchemaDiscovery {
    entities: Vec<String>,
}

impl SchemaDiscovery {
    /// Discovered tables, in the order the daemon listed them.
    pub fn entities(&self) -> &[String] {
        &self.entities
    }

    pub fn is_done(&self) -> bool {
        !self.entities.is_empty()
    }

    /// Lists tables with a probe outside the registry and expands the
    /// templates the first time any are found.
    ///
    /// A critical probe failure has already invalidated the connection when
    /// this returns `Err`.
    pub async fn probe<C: Connector>(
        &mut self,
        connections: &mut ConnectionManager<C>,
        registry: &mut QueryRegistry,
        charts: &mut ChartSet,
    ) -> Result<Discovery, CollectError> {
        if self.is_done() {
            return Ok(Discovery::AlreadyDone);
        }

        let batch = run_batch(connections, &[QueryEntry::new(TABLES, QUERY_TABLES)])
            .await
            .into_result()?;
        if let Some((_, failure)) = batch.pruned.first() {
            debug!(%failure, "table listing rejected, will retry");
            return Ok(Discovery::Empty);
        }
        let Some(rows) = batch.rows.get(TABLES) else {
            debug!("table listing unavailable");
            return Ok(Discovery::Empty);
        };

        let names = rows.first_column().map(str::to_string).collect::<Vec<_>>();
        Ok(self.expand(names, registry, charts))
    }

    /// Registers per-table queries and chart lines for `names`.
    ///
    /// A no-op once a previous call has recorded any table.
    pub fn expand(&mut self, names: Vec<String>, registry: &mut QueryRegistry, charts: &mut ChartSet) -> Discovery {
        if self.is_done() {
            return Discovery::AlreadyDone;
        }

        let mut entities: Vec<String> = Vec::with_capacity(names.len());
        for name in names {
            if !is_identifier(&name) {
                warn!(table = %name, "skipping table with unsupported name");
            } else if !entities.contains(&name) {
                entities.push(name);
            }
        }
        if entities.is_empty() {
            debug!("daemon reports no tables yet");
            return Discovery::Empty;
        }

        for entity in &entities {
            registry.insert(QueryEntry::new(entity_query_name(entity), entity_query_text(entity)));
        }

        for key in SIMPLE_GAUGE_KEYS {
            for entity in &entities {
                charts.add_line(key, Line::absolute(format!("{key}_{entity}"), entity.as_str()));
            }
        }

        for template in HISTOGRAM_TEMPLATES {
            for entity in &entities {
                charts.push(template.instantiate(entity));
            }
        }

        info!(tables = ?entities, "discovered tables");
        self.entities = entities;
        Discovery::Expanded {
            entities: self.entities.len(),
        }
    }
}
