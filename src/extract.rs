//! Raw status rows to a flat metric sample.

use crate::{
    charts::{
        GLOBAL_STATUS_KEYS,
        HISTOGRAM_FIELDS,
        SIMPLE_GAUGE_KEYS,
    },
    discovery::entity_query_name,
    error::CollectError,
    registry::GLOBAL_STATS,
    rows::RawData,
};
use serde_json::Value;
use std::collections::BTreeMap;

/// Metric key to value for one cycle.
pub type MetricSample = BTreeMap<String, f64>;

/// Substrings marking a JSON histogram block in per-table status.
const HISTOGRAM_MARKERS: &[&str] = &["query_time", "found_row"];

/// Placeholder the daemon reports for a histogram field without samples.
const NO_SAMPLES: &str = "-";

/// A status row, tagged by the query that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusRow<'a> {
    Global { name: &'a str, value: &'a str },
    Entity { entity: &'a str, key: &'a str, value: EntityValue<'a> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityValue<'a> {
    Scalar(&'a str),
    JsonHistogram(&'a str),
}

impl<'a> StatusRow<'a> {
    /// `None` for variables that are not collected.
    pub fn global(name: &'a str, value: &'a str) -> Option<Self> {
        GLOBAL_STATUS_KEYS
            .contains(&name)
            .then_some(StatusRow::Global { name, value })
    }

    /// `None` for keys that are neither a simple gauge nor a histogram block.
    pub fn entity(entity: &'a str, key: &'a str, value: &'a str) -> Option<Self> {
        let value = if SIMPLE_GAUGE_KEYS.contains(&key) {
            EntityValue::Scalar(value)
        } else if HISTOGRAM_MARKERS.iter().any(|marker| key.contains(marker)) {
            EntityValue::JsonHistogram(value)
        } else {
            return None;
        };
        Some(StatusRow::Entity { entity, key, value })
    }

    /// Emits this row's metrics into `sample`. Values that do not parse are
    /// dropped one by one.
    fn emit(self, sample: &mut MetricSample) {
        match self {
            StatusRow::Global { name, value } => insert_parsed(sample, name.to_string(), value),
            StatusRow::Entity {
                entity,
                key,
                value: EntityValue::Scalar(value),
            } => insert_parsed(sample, format!("{key}_{entity}"), value),
            StatusRow::Entity {
                entity,
                key,
                value: EntityValue::JsonHistogram(payload),
            } => {
                let fields = match serde_json::from_str::<Value>(payload) {
                    Ok(Value::Object(fields)) => fields,
                    Ok(other) => {
                        let err = CollectError::Parse {
                            key: format!("{entity}_{key}"),
                            reason: format!("expected a JSON object, got {other}"),
                        };
                        debug!(%err, "dropping histogram");
                        return;
                    }
                    Err(err) => {
                        let err = CollectError::Parse {
                            key: format!("{entity}_{key}"),
                            reason: err.to_string(),
                        };
                        debug!(%err, "dropping histogram");
                        return;
                    }
                };

                for field in HISTOGRAM_FIELDS {
                    let Some(raw) = fields.get(*field) else {
                        continue;
                    };
                    let metric = format!("{entity}_{key}_{field}");
                    match histogram_value(raw) {
                        Ok(value) => {
                            sample.insert(metric, value);
                        }
                        Err(reason) => {
                            let err = CollectError::Parse { key: metric, reason };
                            debug!(%err, "dropping value");
                        }
                    }
                }
            }
        }
    }
}

fn insert_parsed(sample: &mut MetricSample, metric: String, value: &str) {
    match parse_number(value) {
        Ok(value) => {
            sample.insert(metric, value);
        }
        Err(reason) => {
            let err = CollectError::Parse { key: metric, reason };
            debug!(%err, "dropping value");
        }
    }
}

fn parse_number(value: &str) -> Result<f64, String> {
    value
        .trim()
        .parse::<f64>()
        .map_err(|err| format!("{value:?} is not a number: {err}"))
}

/// Histogram fields are numbers, numeric strings or the no-samples marker.
fn histogram_value(raw: &Value) -> Result<f64, String> {
    match raw {
        Value::String(s) if s == NO_SAMPLES => Ok(0.0),
        Value::String(s) => parse_number(s),
        Value::Number(n) => n.as_f64().ok_or_else(|| format!("{n} does not fit a float")),
        other => Err(format!("unexpected value {other}")),
    }
}

/// Flattens the rows of one batch. `entities` are the discovered tables;
/// tables whose query was pruned simply have no rows. Returns `None` when
/// nothing usable came back.
pub fn extract(raw: &RawData, entities: &[String]) -> Option<MetricSample> {
    let mut sample = MetricSample::new();

    if let Some(rows) = raw.get(GLOBAL_STATS) {
        for (name, value) in rows.pairs() {
            if let Some(row) = StatusRow::global(name, value) {
                row.emit(&mut sample);
            }
        }
    }

    for entity in entities {
        let Some(rows) = raw.get(&entity_query_name(entity)) else {
            continue;
        };
        for (key, value) in rows.pairs() {
            if let Some(row) = StatusRow::entity(entity, key, value) {
                row.emit(&mut sample);
            }
        }
    }

    (!sample.is_empty()).then_some(sample)
}
