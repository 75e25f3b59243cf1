//! Netdata external plugin protocol (`plugins.d`) writer.
//!
//! Charts are (re)announced whenever they are new or have gained lines, so
//! the host picks up what discovery adds at runtime.

use crate::{
    charts::ChartDefinition,
    extract::MetricSample,
};
use std::{
    collections::HashMap,
    io::{
        self,
        Write,
    },
};

pub struct PluginWriter<W: Write> {
    out: W,
    chart_type: String,
    update_every: u64,
    priority: u32,
    /// Chart id to number of lines the host has been told about.
    announced: HashMap<String, usize>,
}

fn quote(text: &str) -> String {
    format!("'{}'", text.replace('\'', ""))
}

impl<W: Write> PluginWriter<W> {
    pub fn new(out: W, job_name: &str, update_every: u64, priority: u32) -> Self {
        Self {
            out,
            chart_type: format!("manticore_{job_name}"),
            update_every,
            priority,
            announced: HashMap::new(),
        }
    }

    /// Announces every chart that is new or changed since the last call.
    /// Returns how many charts were written.
    pub fn announce<'a>(&mut self, charts: impl IntoIterator<Item = &'a ChartDefinition>) -> io::Result<usize> {
        let mut written = 0;
        for (index, chart) in charts.into_iter().enumerate() {
            if self.announced.get(&chart.id) == Some(&chart.lines.len()) {
                continue;
            }
            writeln!(
                self.out,
                "CHART {}.{} '' {} {} {} {} {} {} {} '' 'manticore.plugin' 'manticore'",
                self.chart_type,
                chart.id,
                quote(&chart.title),
                quote(&chart.unit),
                quote(&chart.family),
                quote(&chart.context),
                chart.render_hint,
                self.priority as usize + index,
                self.update_every,
            )?;
            for line in &chart.lines {
                writeln!(
                    self.out,
                    "DIMENSION {} {} {} 1 {}",
                    quote(&line.key),
                    quote(&line.label),
                    line.transform,
                    line.divisor
                )?;
            }
            self.announced.insert(chart.id.clone(), chart.lines.len());
            written += 1;
        }
        self.out.flush()?;
        Ok(written)
    }

    /// Writes one `BEGIN`/`SET`/`END` block per chart with at least one value.
    pub fn sample<'a>(
        &mut self,
        charts: impl IntoIterator<Item = &'a ChartDefinition>,
        sample: &MetricSample,
    ) -> io::Result<()> {
        for chart in charts {
            let values = chart
                .lines
                .iter()
                .filter_map(|line| {
                    sample
                        .get(&line.key)
                        .map(|value| (&line.key, value * f64::from(line.divisor)))
                })
                .collect::<Vec<_>>();
            if values.is_empty() {
                continue;
            }
            writeln!(self.out, "BEGIN {}.{}", self.chart_type, chart.id)?;
            for (key, value) in values {
                // The protocol only carries integers; the divisor keeps fractions.
                writeln!(self.out, "SET {} = {}", quote(key), value.round() as i64)?;
            }
            writeln!(self.out, "END")?;
        }
        self.out.flush()
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::charts::{
        ChartSet,
        Line,
        HISTOGRAM_TEMPLATES,
    };
    use pretty_assertions::assert_eq;

    fn output(writer: PluginWriter<Vec<u8>>) -> String {
        String::from_utf8(writer.into_inner()).unwrap()
    }

    #[test]
    fn announces_charts_once() {
        let charts = ChartSet::default();
        let mut writer = PluginWriter::new(Vec::new(), "local", 1, 60000);

        let first = writer.announce(charts.definitions()).unwrap();
        assert_eq!(first, charts.definitions().count());
        assert_eq!(writer.announce(charts.definitions()).unwrap(), 0);

        let text = output(writer);
        assert!(text.starts_with(
            "CHART manticore_local.commands '' 'Commands' 'commands/s' 'commands' 'manticore.commands' line 60000 1 '' 'manticore.plugin' 'manticore'\n\
             DIMENSION 'command_search' 'search' incremental 1 1\n"
        ));
        assert!(!text.contains("indexed_bytes"));
    }

    #[test]
    fn reannounces_grown_charts() {
        let mut charts = ChartSet::default();
        let mut writer = PluginWriter::new(Vec::new(), "local", 1, 60000);
        writer.announce(charts.definitions()).unwrap();

        charts.add_line("ram_bytes", Line::absolute("ram_bytes_docs", "docs"));
        assert_eq!(writer.announce(charts.definitions()).unwrap(), 1);

        let text = output(writer);
        assert!(text.contains("CHART manticore_local.ram_bytes '' 'RAM bytes' 'B' 'ram_bytes'"));
        assert!(text.contains("DIMENSION 'ram_bytes_docs' 'docs' absolute 1 1\n"));
    }

    #[test]
    fn sub_second_timings_keep_their_fraction() {
        let mut charts = ChartSet::default();
        for chart in HISTOGRAM_TEMPLATES.iter().map(|template| template.instantiate("docs")) {
            charts.push(chart);
        }
        let mut writer = PluginWriter::new(Vec::new(), "local", 1, 60000);
        let sample = MetricSample::from([
            ("docs_query_time_total_queries".to_string(), 5.0),
            ("docs_query_time_total_avg_sec".to_string(), 0.042),
        ]);

        writer.announce(charts.definitions()).unwrap();
        writer.sample(charts.definitions(), &sample).unwrap();

        let text = output(writer);
        assert!(text.contains("DIMENSION 'docs_query_time_total_avg_sec' 'avg_sec' absolute 1 1000\n"));
        assert!(text.contains("DIMENSION 'docs_query_time_total_queries' 'queries' absolute 1 1\n"));
        assert!(text.contains(
            "BEGIN manticore_local.docs_query_time_total\n\
             SET 'docs_query_time_total_queries' = 5\n\
             SET 'docs_query_time_total_avg_sec' = 42\n\
             END\n"
        ));
    }

    #[test]
    fn writes_only_charts_with_values() {
        let charts = ChartSet::default();
        let mut writer = PluginWriter::new(Vec::new(), "local", 1, 60000);
        let sample = MetricSample::from([("uptime".to_string(), 12345.0), ("maxed_out".to_string(), 2.6)]);

        writer.sample(charts.definitions(), &sample).unwrap();

        assert_eq!(
            output(writer),
            "BEGIN manticore_local.uptime\nSET 'uptime' = 12345\nEND\n\
             BEGIN manticore_local.connections\nSET 'maxed_out' = 3\nEND\n"
        );
    }
}
