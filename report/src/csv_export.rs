//! CSV export functionality

use std::fs::File;
use std::path::Path;

use csv::Writer;

use hobbit_bench_core::BenchmarkOutcome;

use crate::ReportError;

/// Writes run statistics as a two-column CSV
pub struct CsvExporter;

fn optional(value: Option<f64>) -> String {
    value.map(|v| format!("{:.2}", v)).unwrap_or_default()
}

impl CsvExporter {
    /// Export summary statistics to CSV
    ///
    /// Undefined values are written as empty cells.
    pub fn export_summary(outcome: &BenchmarkOutcome, path: &Path) -> Result<(), ReportError> {
        let stats = &outcome.statistics;
        let file = File::create(path)?;
        let mut wtr = Writer::from_writer(file);

        wtr.write_record(["metric", "value"])?;

        wtr.write_record(["session_id", outcome.session_id.as_str()])?;
        wtr.write_record(["train_size", &outcome.train_size.to_string()])?;
        wtr.write_record(["test_set_size", &stats.test_set_size.to_string()])?;
        wtr.write_record(["answered", &stats.answered_count.to_string()])?;
        wtr.write_record([
            "faulty_or_missing",
            &stats.faulty_or_missing_count.to_string(),
        ])?;
        wtr.write_record(["skipped", &stats.skipped_count.to_string()])?;
        wtr.write_record(["rejected_answers", &outcome.rejected_answers.to_string()])?;

        wtr.write_record(["avg_latency_ms", &optional(stats.mean_latency_millis)])?;
        wtr.write_record(["std_dev_latency_ms", &optional(stats.std_dev_latency_millis)])?;

        if let Some(accuracy) = &stats.accuracy {
            wtr.write_record([accuracy.metric.as_str(), &format!("{:.4}", accuracy.value)])?;
        }

        wtr.write_record([
            "elapsed_secs",
            &format!("{:.3}", outcome.elapsed.as_secs_f64()),
        ])?;

        wtr.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::outcome;
    use hobbit_bench_core::AccuracyScore;

    fn read_rows(path: &Path) -> Vec<(String, String)> {
        let mut rdr = csv::Reader::from_path(path).unwrap();
        rdr.records()
            .map(|r| {
                let r = r.unwrap();
                (r[0].to_string(), r[1].to_string())
            })
            .collect()
    }

    #[test]
    fn test_export_summary() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("summary.csv");

        CsvExporter::export_summary(&outcome(), &path).unwrap();

        let rows = read_rows(&path);
        assert!(rows.contains(&("test_set_size".into(), "4".into())));
        assert!(rows.contains(&("avg_latency_ms".into(), "25.00".into())));
        assert!(rows.contains(&("elapsed_secs".into(), "1.500".into())));
        assert!(!rows.iter().any(|(k, _)| k == "mae"));
    }

    #[test]
    fn test_export_summary_with_undefined_latency_and_accuracy() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("summary.csv");
        let mut outcome = outcome();
        outcome.statistics.mean_latency_millis = None;
        outcome.statistics.accuracy = Some(AccuracyScore {
            metric: "rmse".into(),
            value: 1.25,
            scored_count: 3,
        });

        CsvExporter::export_summary(&outcome, &path).unwrap();

        let rows = read_rows(&path);
        assert!(rows.contains(&("avg_latency_ms".into(), String::new())));
        assert!(rows.contains(&("rmse".into(), "1.2500".into())));
    }
}
