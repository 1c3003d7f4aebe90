use crate::config::ExperimentConfig;
use crate::errors::Result;
use crate::logger::{Logger, LogEvent};
use crate::logln;
use crate::metrics::{ResultTable, VariantResult};
use crate::policies::Policy;
use crate::replications::ReplicationSet;

/// Every policy variant of the grid at one error level
/// Balanced appears once per α; the other two do not depend on α
pub fn policies_for(alphas: &[f64]) -> Vec<Policy> {
    let mut policies = vec![Policy::Optimistic, Policy::Pessimistic];
    policies.extend(alphas.iter().map(|&alpha| Policy::Balanced { alpha }));
    policies
}

/// Run the grid over an already generated replication set
pub fn run_grid(replication_set: &ReplicationSet, scenario_name: &str, logger: &mut Logger) -> Result<ResultTable> {
    let config = &replication_set.config;
    let mut results = Vec::new();
    for &error_level in &config.error_levels {
        for policy in policies_for(&config.alphas) {
            let variant_name = format!("{}-e{}", policy.label(), error_level);
            let summary = replication_set.run_variant(&policy, error_level, scenario_name, &variant_name, logger)?;
            logln!(logger, LogEvent::Scenario, "{:<24} mean revenue {:.2}", variant_name, summary.mean);
            results.push(VariantResult {
                policy,
                error_level,
                summary,
            });
        }
    }
    Ok(ResultTable::aggregate(&results))
}

/// Outcome of a full experiment
pub struct ExperimentReport {
    pub table: ResultTable,
    /// Hindsight upper bound averaged over the replications the grid ran on
    pub mean_upper_bound: f64,
}

/// Validate the configuration, draw the replications and run the full grid
pub fn run_experiment(config: &ExperimentConfig, scenario_name: &str, logger: &mut Logger) -> Result<ExperimentReport> {
    let replication_set = ReplicationSet::new(config)?;
    let table = run_grid(&replication_set, scenario_name, logger)?;
    Ok(ExperimentReport {
        table,
        mean_upper_bound: replication_set.mean_upper_bound(),
    })
}
