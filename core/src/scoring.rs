//! Pluggable accuracy scoring

/// Scores predictions against expected target values
pub trait ScoringStrategy: Send + Sync {
    /// Short identifier used in reports (e.g. "mae")
    fn name(&self) -> &str;

    /// Score `(expected, predicted)` pairs; `None` when `pairs` is empty
    fn score(&self, pairs: &[(f64, f64)]) -> Option<f64>;
}

/// Mean absolute error
#[derive(Debug, Default, Clone, Copy)]
pub struct MeanAbsoluteError;

impl ScoringStrategy for MeanAbsoluteError {
    fn name(&self) -> &str {
        "mae"
    }

    fn score(&self, pairs: &[(f64, f64)]) -> Option<f64> {
        if pairs.is_empty() {
            return None;
        }
        let total: f64 = pairs.iter().map(|(e, p)| (e - p).abs()).sum();
        Some(total / pairs.len() as f64)
    }
}

/// Root mean squared error
#[derive(Debug, Default, Clone, Copy)]
pub struct RootMeanSquaredError;

impl ScoringStrategy for RootMeanSquaredError {
    fn name(&self) -> &str {
        "rmse"
    }

    fn score(&self, pairs: &[(f64, f64)]) -> Option<f64> {
        if pairs.is_empty() {
            return None;
        }
        let total: f64 = pairs.iter().map(|(e, p)| (e - p).powi(2)).sum();
        Some((total / pairs.len() as f64).sqrt())
    }
}

/// Look up a built-in strategy by name
pub fn strategy_by_name(name: &str) -> Option<Box<dyn ScoringStrategy>> {
    match name.to_ascii_lowercase().as_str() {
        "mae" => Some(Box::new(MeanAbsoluteError)),
        "rmse" => Some(Box::new(RootMeanSquaredError)),
        _ => None,
    }
}
