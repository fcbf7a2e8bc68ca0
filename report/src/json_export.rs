//! JSON export functionality

use std::fs::File;
use std::io::Write;
use std::path::Path;

use serde_json::json;

use hobbit_bench_core::BenchmarkOutcome;

use crate::model::ResultModel;
use crate::ReportError;

/// Writes run results as JSON
pub struct JsonExporter;

impl JsonExporter {
    /// Export the outcome and the result model to a JSON file
    pub fn export(
        outcome: &BenchmarkOutcome,
        model: &ResultModel,
        path: &Path,
    ) -> Result<(), ReportError> {
        let output = json!({
            "generated_at": chrono::Utc::now().to_rfc3339(),
            "outcome": outcome,
            "result_model": model.to_json_ld(),
        });

        let file = File::create(path)?;
        serde_json::to_writer_pretty(file, &output)?;

        Ok(())
    }

    /// Export the statistics only (smaller file)
    pub fn export_summary(outcome: &BenchmarkOutcome, path: &Path) -> Result<(), ReportError> {
        let stats = &outcome.statistics;
        let output = json!({
            "session_id": outcome.session_id,
            "test_set_size": stats.test_set_size,
            "answered": stats.answered_count,
            "faulty_or_missing": stats.faulty_or_missing_count,
            "latency_ms": {
                "mean": stats.mean_latency_millis,
                "std_dev": stats.std_dev_latency_millis,
            },
            "accuracy": stats.accuracy,
        });

        let mut file = File::create(path)?;
        file.write_all(serde_json::to_string_pretty(&output)?.as_bytes())?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::outcome;

    #[test]
    fn test_export_full() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.json");
        let outcome = outcome();
        let model = ResultModel::from_statistics("urn:exp", "http://ns/", &outcome.statistics);

        JsonExporter::export(&outcome, &model, &path).unwrap();

        let doc: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(doc["outcome"]["session_id"], "s1");
        assert_eq!(doc["outcome"]["elapsed"], 1.5);
        assert_eq!(doc["outcome"]["statistics"]["test_set_size"], 4);
        assert_eq!(doc["result_model"]["@id"], "urn:exp");
        assert!(doc["generated_at"].is_string());
    }

    #[test]
    fn test_export_summary() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("summary.json");

        JsonExporter::export_summary(&outcome(), &path).unwrap();

        let doc: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(doc["faulty_or_missing"], 1);
        assert_eq!(doc["latency_ms"]["mean"], 25.0);
        assert!(doc["accuracy"].is_null());
    }

    #[test]
    fn test_export_to_missing_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("summary.json");

        let err = JsonExporter::export_summary(&outcome(), &path).unwrap_err();
        assert!(matches!(err, ReportError::Io(_)));
    }
}
