//! Console summary table

use std::fmt::Write;

use hobbit_bench_core::BenchmarkOutcome;

fn millis(value: Option<f64>) -> String {
    value
        .map(|v| format!("{:.2} ms", v))
        .unwrap_or_else(|| "n/a".to_string())
}

/// Render a plain-text summary of a run
pub fn render_summary(outcome: &BenchmarkOutcome) -> String {
    let stats = &outcome.statistics;
    let mut rows: Vec<(&str, String)> = vec![
        ("Session", outcome.session_id.clone()),
        ("Training rows", outcome.train_size.to_string()),
        ("Test rows", stats.test_set_size.to_string()),
        ("Answered", stats.answered_count.to_string()),
        ("Faulty or missing", stats.faulty_or_missing_count.to_string()),
        ("Skipped rows", stats.skipped_count.to_string()),
        ("Rejected answers", outcome.rejected_answers.to_string()),
        ("Mean latency", millis(stats.mean_latency_millis)),
        ("Std dev latency", millis(stats.std_dev_latency_millis)),
    ];
    if let Some(accuracy) = &stats.accuracy {
        rows.push((
            "Accuracy",
            format!(
                "{} = {:.4} ({} scored)",
                accuracy.metric, accuracy.value, accuracy.scored_count
            ),
        ));
    }
    rows.push(("Elapsed", format!("{:.2}s", outcome.elapsed.as_secs_f64())));

    let width = rows.iter().map(|(k, _)| k.len()).max().unwrap_or(0);
    let rule = "=".repeat(width + 24);

    let mut out = String::new();
    let _ = writeln!(out, "{}", rule);
    let _ = writeln!(out, "Benchmark Summary");
    let _ = writeln!(out, "{}", rule);
    for (key, value) in rows {
        let _ = writeln!(out, "{:<width$}  {}", key, value, width = width);
    }
    let _ = write!(out, "{}", rule);
    out
}
