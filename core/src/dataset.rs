//! Dataset loading and deterministic train/test splitting

use std::fs;
use std::path::Path;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::{BenchError, BenchResult};

/// Row-oriented tabular data: one header line followed by raw data rows
///
/// Rows are kept as the original text; columns are only interpreted when a
/// task is built or an expected value is read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dataset {
    header: String,
    rows: Vec<String>,
}

impl Dataset {
    /// Load a dataset file
    ///
    /// # Errors
    ///
    /// Returns a dataset error if the file cannot be read or has no header.
    pub fn from_path(path: &Path) -> BenchResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            BenchError::dataset(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::from_text(&content)
            .map_err(|e| BenchError::dataset(format!("{}: {}", path.display(), e.message)))
    }

    /// Parse a dataset from text, first line being the header
    pub fn from_text(text: &str) -> BenchResult<Self> {
        let mut lines = text.lines();
        let header = lines
            .next()
            .filter(|h| !h.trim().is_empty())
            .ok_or_else(|| BenchError::dataset("dataset has no header row"))?
            .to_string();
        let rows = lines.map(str::to_string).collect();
        Ok(Self { header, rows })
    }

    /// Build a dataset from an already separated header and rows
    pub fn from_rows(header: impl Into<String>, rows: Vec<String>) -> Self {
        Self {
            header: header.into(),
            rows,
        }
    }

    /// The header row
    pub fn header(&self) -> &str {
        &self.header
    }

    /// Raw data rows, blank rows included
    pub fn rows(&self) -> &[String] {
        &self.rows
    }

    /// Partition the non-blank data rows into training and test sets
    pub fn split(&self, seed: i64, train_fraction: f64) -> Split {
        let (train_rows, test_rows) = split(&self.rows, seed, train_fraction);
        Split {
            header: self.header.clone(),
            train_rows,
            test_rows,
        }
    }
}

/// Result of splitting a [`Dataset`]
///
/// The index of a row within `test_rows` is its task id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Split {
    /// Header row of the source dataset
    pub header: String,
    /// Rows delivered to the system for learning, in source order
    pub train_rows: Vec<String>,
    /// Rows turned into tasks, in source order
    pub test_rows: Vec<String>,
}

impl Split {
    /// Number of rows that took part in sampling
    pub fn total_rows(&self) -> usize {
        self.train_rows.len() + self.test_rows.len()
    }
}

/// Bernoulli-sample `rows` into `(train, test)`
///
/// One uniform draw in `[0, 1)` is taken per non-blank row from a generator
/// seeded once with `seed`; blank rows consume no draw. A draw below
/// `train_fraction` routes the row to the training set.
pub fn split(rows: &[String], seed: i64, train_fraction: f64) -> (Vec<String>, Vec<String>) {
    let mut rng = StdRng::seed_from_u64(seed as u64);
    let mut train = Vec::new();
    let mut test = Vec::new();

    for row in rows.iter().filter(|r| !r.trim().is_empty()) {
        if rng.gen::<f64>() < train_fraction {
            train.push(row.clone());
        } else {
            test.push(row.clone());
        }
    }

    (train, test)
}
