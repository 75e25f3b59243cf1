//! Declarative chart definitions handed to the monitoring host.
//!
//! The static catalogue is built by value on every call, so per-entity
//! expansions never share a line list with the templates.

use serde::Serialize;
use std::collections::HashSet;
use strum::{
    Display,
    EnumString,
};

/// How the host turns successive raw values into a displayed value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Transform {
    Absolute,
    Incremental,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum RenderHint {
    Line,
    Area,
    Stacked,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Line {
    pub key: String,
    pub label: String,
    pub transform: Transform,
    /// The host divides reported integers by this.
    pub divisor: u32,
}

impl Line {
    pub fn new(key: impl Into<String>, label: impl Into<String>, transform: Transform) -> Self {
        Self {
            key: key.into(),
            label: label.into(),
            transform,
            divisor: 1,
        }
    }

    pub fn with_divisor(mut self, divisor: u32) -> Self {
        self.divisor = divisor;
        self
    }

    pub fn absolute(key: impl Into<String>, label: impl Into<String>) -> Self {
        Self::new(key, label, Transform::Absolute)
    }

    pub fn incremental(key: impl Into<String>, label: impl Into<String>) -> Self {
        Self::new(key, label, Transform::Incremental)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartDefinition {
    pub id: String,
    pub title: String,
    pub unit: String,
    pub family: String,
    pub context: String,
    pub render_hint: RenderHint,
    pub lines: Vec<Line>,
}

impl ChartDefinition {
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        unit: impl Into<String>,
        family: impl Into<String>,
        render_hint: RenderHint,
    ) -> Self {
        let id = id.into();
        Self {
            context: format!("manticore.{id}"),
            id,
            title: title.into(),
            unit: unit.into(),
            family: family.into(),
            render_hint,
            lines: Vec::new(),
        }
    }

    pub fn with_lines(mut self, lines: impl IntoIterator<Item = Line>) -> Self {
        self.lines.extend(lines);
        self
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = context.into();
        self
    }
}

/// Status variables of `SHOW STATUS` that are turned into metrics.
pub const GLOBAL_STATUS_KEYS: &[&str] = &[
    "uptime",
    "connections",
    "maxed_out",
    "command_search",
    "command_excerpt",
    "command_update",
    "command_delete",
    "command_keywords",
    "command_persist",
    "command_status",
    "command_flushattrs",
    "command_set",
    "command_insert",
    "command_replace",
    "command_commit",
    "command_suggest",
    "command_json",
    "agent_connect",
    "agent_retry",
    "queries",
    "dist_queries",
    "query_wall",
    "query_cpu",
    "dist_wall",
    "dist_local",
    "dist_wait",
    "query_reads",
    "query_readkb",
    "query_readtime",
    "avg_query_wall",
    "avg_query_cpu",
    "avg_dist_wall",
    "avg_dist_local",
    "avg_dist_wait",
    "avg_query_reads",
    "avg_query_readkb",
    "avg_query_readtime",
    "qcache_max_bytes",
    "qcache_thresh_msec",
    "qcache_ttl_sec",
    "qcache_cached_queries",
    "qcache_used_bytes",
    "qcache_hits",
];

/// Per-table scalars, each rendered as one shared chart with a line per table.
pub const SIMPLE_GAUGE_KEYS: &[&str] = &["indexed_documents", "indexed_bytes", "ram_bytes", "disk_bytes"];

/// Fields of a query-time or found-rows block in `SHOW INDEX <t> STATUS`.
pub const HISTOGRAM_FIELDS: &[&str] = &[
    "queries",
    "avg_sec",
    "min_sec",
    "max_sec",
    "pct95_sec",
    "pct99_sec",
    "avg",
    "min",
    "max",
    "pct95",
    "pct99",
];

/// Template for a chart instantiated once per table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistogramTemplate {
    /// Status key of the JSON block, also the chart id suffix.
    pub key: &'static str,
    pub title: &'static str,
    pub unit: &'static str,
}

impl HistogramTemplate {
    pub fn chart_id(&self, entity: &str) -> String {
        format!("{entity}_{}", self.key)
    }

    /// A fresh chart for `entity` with one line per histogram field.
    pub fn instantiate(&self, entity: &str) -> ChartDefinition {
        let id = self.chart_id(entity);
        let lines = HISTOGRAM_FIELDS
            .iter()
            .map(|field| {
                let line = Line::absolute(format!("{id}_{field}"), *field);
                // Timings are mostly sub-second; ship them as milliseconds.
                if field.ends_with("_sec") {
                    line.with_divisor(1000)
                } else {
                    line
                }
            })
            .collect::<Vec<_>>();
        ChartDefinition::new(
            id,
            format!("{} ({entity})", self.title),
            self.unit,
            self.key,
            RenderHint::Line,
        )
        .with_context(format!("manticore.{}", self.key))
        .with_lines(lines)
    }
}

pub const HISTOGRAM_TEMPLATES: &[HistogramTemplate] = &[
    HistogramTemplate {
        key: "query_time_total",
        title: "Query time total",
        unit: "query/total",
    },
    HistogramTemplate {
        key: "found_rows_total",
        title: "Found rows total",
        unit: "rows",
    },
];

/// Charts known before discovery, in display order. The simple gauge charts
/// start without lines and are filled in by discovery.
pub fn static_charts() -> Vec<ChartDefinition> {
    vec![
        ChartDefinition::new("commands", "Commands", "commands/s", "commands", RenderHint::Line).with_lines([
            Line::incremental("command_search", "search"),
            Line::incremental("command_excerpt", "excerpt"),
            Line::incremental("command_update", "update"),
            Line::incremental("command_delete", "delete"),
            Line::incremental("command_keywords", "keywords"),
            Line::incremental("command_persist", "persist"),
            Line::incremental("command_status", "status"),
            Line::incremental("command_flushattrs", "flushattrs"),
            Line::incremental("command_set", "set"),
            Line::incremental("command_insert", "insert"),
            Line::incremental("command_replace", "replace"),
            Line::incremental("command_commit", "commit"),
            Line::incremental("command_suggest", "suggest"),
            Line::incremental("command_json", "json"),
        ]),
        ChartDefinition::new("queries", "Queries", "queries/s", "queries", RenderHint::Line).with_lines([
            Line::incremental("queries", "Queries"),
            Line::incremental("dist_queries", "Distributed Queries"),
        ]),
        ChartDefinition::new("uptime", "Uptime", "s", "uptime", RenderHint::Line)
            .with_lines([Line::absolute("uptime", "uptime")]),
        ChartDefinition::new("connections", "Connections", "connections", "connections", RenderHint::Line)
            .with_lines([
                Line::incremental("connections", "connections"),
                Line::incremental("maxed_out", "dismissing client"),
            ]),
        ChartDefinition::new("agents", "Agent connections", "connections/s", "agents", RenderHint::Line)
            .with_lines([
                Line::incremental("agent_connect", "connect"),
                Line::incremental("agent_retry", "retry"),
            ]),
        ChartDefinition::new("query_wall", "Query wall", "s", "query_wall", RenderHint::Line).with_lines([
            Line::incremental("query_wall", "Query wall"),
            Line::absolute("avg_query_wall", "avg. query wall"),
        ]),
        ChartDefinition::new("query_cpu", "Query CPU", "CPU/s", "query_cpu", RenderHint::Line).with_lines([
            Line::incremental("query_cpu", "Query CPU"),
            Line::absolute("avg_query_cpu", "avg. Query CPU"),
        ]),
        ChartDefinition::new("dist_wall", "Distributed query time", "s", "dist_wall", RenderHint::Line)
            .with_lines([
                Line::incremental("dist_wall", "wall"),
                Line::incremental("dist_local", "local"),
                Line::incremental("dist_wait", "wait"),
                Line::absolute("avg_dist_wall", "avg. wall"),
                Line::absolute("avg_dist_local", "avg. local"),
                Line::absolute("avg_dist_wait", "avg. wait"),
            ]),
        ChartDefinition::new("query_reads", "Query reads", "reads/s", "query_reads", RenderHint::Line).with_lines(
            [
                Line::incremental("query_reads", "Query reads"),
                Line::absolute("avg_query_reads", "avg. query reads"),
            ],
        ),
        ChartDefinition::new("query_readkb", "Query read KB", "KB/s", "query_readkb", RenderHint::Line)
            .with_lines([
                Line::incremental("query_readkb", "Query read KB"),
                Line::absolute("avg_query_readkb", "avg. query read KB"),
            ]),
        ChartDefinition::new("query_readtime", "Query read time", "s", "query_readtime", RenderHint::Line)
            .with_lines([
                Line::incremental("query_readtime", "Query read time"),
                Line::absolute("avg_query_readtime", "avg. query read time"),
            ]),
        ChartDefinition::new("qcache", "Query cache", "queries", "qcache", RenderHint::Line).with_lines([
            Line::absolute("qcache_cached_queries", "cached"),
            Line::incremental("qcache_hits", "hits"),
        ]),
        ChartDefinition::new("qcache_bytes", "Query cache size", "B", "qcache", RenderHint::Area).with_lines([
            Line::absolute("qcache_used_bytes", "used"),
            Line::absolute("qcache_max_bytes", "max"),
        ]),
        ChartDefinition::new("qcache_limits", "Query cache limits", "ms", "qcache", RenderHint::Line)
            .with_lines([
                Line::absolute("qcache_thresh_msec", "threshold"),
                Line::new("qcache_ttl_sec", "ttl (s)", Transform::Absolute),
            ]),
        ChartDefinition::new("indexed_bytes", "Index size", "B", "indexed_bytes", RenderHint::Stacked),
        ChartDefinition::new(
            "indexed_documents",
            "Indexed documents",
            "doc",
            "indexed_documents",
            RenderHint::Stacked,
        ),
        ChartDefinition::new("ram_bytes", "RAM bytes", "B", "ram_bytes", RenderHint::Stacked),
        ChartDefinition::new("disk_bytes", "Disk bytes", "B", "disk_bytes", RenderHint::Stacked),
    ]
}

/// Ordered, append-only set of chart definitions.
#[derive(Debug, Clone, Serialize)]
pub struct ChartSet {
    charts: Vec<ChartDefinition>,
    #[serde(skip)]
    keys: HashSet<String>,
}

impl Default for ChartSet {
    fn default() -> Self {
        Self::from_charts(static_charts())
    }
}

impl ChartSet {
    pub fn from_charts(charts: Vec<ChartDefinition>) -> Self {
        let mut set = Self {
            charts: Vec::with_capacity(charts.len()),
            keys: HashSet::new(),
        };
        for chart in charts {
            set.push(chart);
        }
        set
    }

    /// Appends `chart` unless a chart with the same id exists.
    pub fn push(&mut self, chart: ChartDefinition) -> bool {
        if self.get(&chart.id).is_some() {
            return false;
        }
        self.keys.extend(chart.lines.iter().map(|line| line.key.clone()));
        self.charts.push(chart);
        true
    }

    /// Appends `line` to chart `chart_id` unless its key is already declared.
    pub fn add_line(&mut self, chart_id: &str, line: Line) -> bool {
        if self.keys.contains(&line.key) {
            return false;
        }
        let Some(chart) = self.charts.iter_mut().find(|chart| chart.id == chart_id) else {
            return false;
        };
        self.keys.insert(line.key.clone());
        chart.lines.push(line);
        true
    }

    pub fn get(&self, id: &str) -> Option<&ChartDefinition> {
        self.charts.iter().find(|chart| chart.id == id)
    }

    /// Charts the host should know about: every chart with at least one line, in order.
    pub fn definitions(&self) -> impl Iterator<Item = &ChartDefinition> {
        self.charts.iter().filter(|chart| !chart.lines.is_empty())
    }

    /// Whether some line of some chart carries `key`.
    pub fn declares(&self, key: &str) -> bool {
        self.keys.contains(key)
    }

    pub fn len(&self) -> usize {
        self.charts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.charts.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn every_global_status_key_is_charted() {
        let charts = ChartSet::default();
        for key in GLOBAL_STATUS_KEYS {
            assert!(charts.declares(key), "{key} has no chart line");
        }
    }

    #[test]
    fn gauge_charts_are_hidden_until_they_have_lines() {
        let mut charts = ChartSet::default();
        assert!(charts.get("indexed_bytes").is_some());
        assert!(charts.definitions().all(|chart| chart.id != "indexed_bytes"));

        assert!(charts.add_line("indexed_bytes", Line::absolute("indexed_bytes_docs", "docs")));
        assert!(charts.definitions().any(|chart| chart.id == "indexed_bytes"));
    }

    #[test]
    fn duplicate_lines_and_charts_are_ignored() {
        let mut charts = ChartSet::default();
        let before = charts.len();
        assert!(!charts.add_line("uptime", Line::absolute("uptime", "uptime")));
        assert!(!charts.push(ChartDefinition::new("uptime", "Uptime", "s", "uptime", RenderHint::Line)));
        assert_eq!(charts.len(), before);
        assert_eq!(charts.get("uptime").unwrap().lines.len(), 1);
    }

    #[test]
    fn add_line_to_unknown_chart_is_rejected() {
        let mut charts = ChartSet::default();
        assert!(!charts.add_line("nope", Line::absolute("nope_docs", "docs")));
        assert!(!charts.declares("nope_docs"));
    }

    #[test]
    fn histogram_instances_are_independent() {
        let template = HISTOGRAM_TEMPLATES[0];
        let mut docs = template.instantiate("docs");
        let logs = template.instantiate("logs");

        docs.lines.clear();
        assert_eq!(logs.lines.len(), HISTOGRAM_FIELDS.len());
        assert_eq!(logs.id, "logs_query_time_total");
        assert_eq!(logs.title, "Query time total (logs)");
        assert_eq!(logs.lines[0], Line::absolute("logs_query_time_total_queries", "queries"));
        assert_eq!(template.instantiate("docs").lines.len(), HISTOGRAM_FIELDS.len());
        assert_eq!(logs.lines[1], Line::absolute("logs_query_time_total_avg_sec", "avg_sec").with_divisor(1000));
    }

    #[test]
    fn transforms_render_lowercase() {
        assert_eq!(Transform::Incremental.to_string(), "incremental");
        assert_eq!(RenderHint::Stacked.to_string(), "stacked");
    }
}
