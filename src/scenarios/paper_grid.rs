/// This scenario runs the full comparison grid: Optimistic, Pessimistic and Balanced at every
/// configured α, each at every configured prediction error level, averaged over replications.
///
/// It validates that:
/// - every revenue is finite and non-negative
/// - no variant's mean revenue exceeds the mean hindsight upper bound (every query sold at
///   its highest bid)
/// - Pessimistic earns the same revenues at every error level, since it never reads predictions
///
/// The aggregated table is written to log/<scenario>/results.csv.

use std::path::PathBuf;
use crate::config::ExperimentConfig;
use crate::experiment::run_experiment;
use crate::logger::{Logger, LogEvent, sanitize_filename};
use crate::logln;
use crate::policies::Policy;
use crate::scenarios::{check, finish};

inventory::submit!(crate::scenarios::ScenarioEntry {
    short_name: "paper_grid",
    run,
});

pub fn run(scenario_name: &str, config: &ExperimentConfig, logger: &mut Logger) -> Result<(), Box<dyn std::error::Error>> {
    logln!(logger, LogEvent::Scenario, "=== Scenario: {} advertisers, {} keywords, {} queries, {} replications ===",
        config.num_advertisers, config.num_keywords, config.num_queries, config.replications);

    let report = run_experiment(config, scenario_name, logger)?;
    let table = &report.table;
    table.printout(logger, LogEvent::Scenario);

    let csv_path = PathBuf::from(format!("log/{}/results.csv", sanitize_filename(scenario_name)));
    table.write_csv(&csv_path)?;
    logln!(logger, LogEvent::Scenario, "Results written to {}", csv_path.display());

    logln!(logger, LogEvent::Scenario, "");
    logln!(logger, LogEvent::Scenario, "=== Validation Results ===");
    let mut errors: Vec<String> = Vec::new();
    let upper_bound = report.mean_upper_bound;

    for row in &table.rows {
        let name = match row.key.alpha {
            Some(alpha) => format!("{} (alpha {}) at error {}", row.key.policy, alpha, row.key.error_level),
            None => format!("{} at error {}", row.key.policy, row.key.error_level),
        };
        check(
            logger,
            &mut errors,
            row.revenues.iter().all(|r| r.is_finite() && *r >= 0.0),
            format!("{}: all {} revenues are finite and non-negative", name, row.replications()),
        );
        check(
            logger,
            &mut errors,
            row.mean_revenue <= upper_bound + 1e-6,
            format!("{}: mean revenue <= hindsight upper bound: {:.2} <= {:.2}", name, row.mean_revenue, upper_bound),
        );
    }

    if let Some(&first_level) = config.error_levels.first() {
        if let Some(baseline) = table.find(&Policy::Pessimistic, first_level) {
            for &error_level in &config.error_levels[1..] {
                let same = table.find(&Policy::Pessimistic, error_level)
                    .is_some_and(|row| row.revenues == baseline.revenues);
                check(logger, &mut errors, same,
                    format!("pessimistic at error {} earns the same as at error {}", error_level, first_level));
            }
        }
    }

    finish(scenario_name, errors)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_small_grid_passes_validation() {
        let config = ExperimentConfig {
            num_advertisers: 4,
            num_keywords: 3,
            num_queries: 40,
            error_levels: vec![0.0, 0.3],
            alphas: vec![1.0],
            replications: 2,
            ..Default::default()
        };
        assert!(run("paper_grid_test", &config, &mut Logger::new()).is_ok());
    }
}
