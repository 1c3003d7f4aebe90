/// Aggregation of variant results into the experiment's result table.
///
/// Aggregation is pure: it reads variant results and returns a new table. Rows are keyed by
/// (policy, error level, α) and appear in the order their key was first seen.

use std::fs::{create_dir_all, File};
use std::io::Write;
use std::path::Path;
use crate::errors::{AllocError, Result};
use crate::logger::{Logger, LogEvent};
use crate::logln;
use crate::policies::Policy;
use crate::replications::{mean_and_variance, RevenueSummary};

pub const RESULTS_CSV_HEADER: &str = "policy,error_level,alpha,replications,total_revenue,mean_revenue,variance";

/// Outcome of running one policy at one error level over all replications
#[derive(Debug, Clone, PartialEq)]
pub struct VariantResult {
    pub policy: Policy,
    pub error_level: f64,
    pub summary: RevenueSummary,
}

/// Grouping key of a result row; α is `None` for policies without one
#[derive(Debug, Clone, PartialEq)]
pub struct ResultKey {
    pub policy: &'static str,
    pub error_level: f64,
    pub alpha: Option<f64>,
}

impl ResultKey {
    pub fn new(policy: &Policy, error_level: f64) -> Self {
        Self {
            policy: policy.name(),
            error_level,
            alpha: policy.alpha(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResultRow {
    pub key: ResultKey,
    /// Replication revenues of every result sharing the key
    pub revenues: Vec<f64>,
    pub total_revenue: f64,
    pub mean_revenue: f64,
    pub variance: f64,
}

impl ResultRow {
    fn from_revenues(key: ResultKey, revenues: Vec<f64>) -> Self {
        let (mean_revenue, variance) = mean_and_variance(&revenues);
        Self {
            key,
            total_revenue: revenues.iter().sum(),
            revenues,
            mean_revenue,
            variance,
        }
    }

    pub fn replications(&self) -> usize {
        self.revenues.len()
    }

    fn csv_line(&self) -> String {
        let alpha = match self.key.alpha {
            Some(alpha) if alpha.is_infinite() => "inf".to_string(),
            Some(alpha) => format!("{}", alpha),
            None => String::new(),
        };
        format!(
            "{},{},{},{},{:.4},{:.4},{:.4}",
            self.key.policy,
            self.key.error_level,
            alpha,
            self.replications(),
            self.total_revenue,
            self.mean_revenue,
            self.variance
        )
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ResultTable {
    pub rows: Vec<ResultRow>,
}

impl ResultTable {
    /// Group results by key, concatenating replication revenues of equal keys
    pub fn aggregate(results: &[VariantResult]) -> Self {
        let mut groups: Vec<(ResultKey, Vec<f64>)> = Vec::new();
        for result in results {
            let key = ResultKey::new(&result.policy, result.error_level);
            match groups.iter_mut().find(|(k, _)| *k == key) {
                Some((_, revenues)) => revenues.extend_from_slice(&result.summary.revenues),
                None => groups.push((key, result.summary.revenues.clone())),
            }
        }
        Self {
            rows: groups.into_iter()
                .map(|(key, revenues)| ResultRow::from_revenues(key, revenues))
                .collect(),
        }
    }

    pub fn find(&self, policy: &Policy, error_level: f64) -> Option<&ResultRow> {
        let key = ResultKey::new(policy, error_level);
        self.rows.iter().find(|row| row.key == key)
    }

    pub fn to_csv(&self) -> String {
        let mut csv = String::from(RESULTS_CSV_HEADER);
        csv.push('\n');
        for row in &self.rows {
            csv.push_str(&row.csv_line());
            csv.push('\n');
        }
        csv
    }

    /// Write the CSV to `path`, creating parent directories
    pub fn write_csv(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            create_dir_all(parent).map_err(|e| AllocError::io(parent, e))?;
        }
        let mut file = File::create(path).map_err(|e| AllocError::io(path, e))?;
        file.write_all(self.to_csv().as_bytes()).map_err(|e| AllocError::io(path, e))
    }

    pub fn printout(&self, logger: &mut Logger, event: LogEvent) {
        logln!(logger, event, "\n{:<12} {:>6} {:>6} {:>5} {:>14} {:>12} {:>12}",
            "policy", "error", "alpha", "reps", "total", "mean", "variance");
        for row in &self.rows {
            let alpha = row.key.alpha.map(|a| format!("{}", a)).unwrap_or_else(|| "-".to_string());
            logln!(logger, event, "{:<12} {:>6.2} {:>6} {:>5} {:>14.2} {:>12.2} {:>12.2}",
                row.key.policy,
                row.key.error_level,
                alpha,
                row.replications(),
                row.total_revenue,
                row.mean_revenue,
                row.variance
            );
        }
    }
}
