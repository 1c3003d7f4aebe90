/// This scenario shrinks budgets and thins out bidding so that budgets bind well before the
/// query sequence ends. That is the regime where the policies actually disagree.
///
/// It validates that:
/// - budgets bind (optimistic revenue stays below the hindsight upper bound)
/// - Balanced with a vanishing α earns exactly what Optimistic earns, replication by replication
/// - Balanced with α = ∞ earns exactly what Pessimistic earns
/// - running the same variant twice gives bit-identical revenues

use crate::config::{ExperimentConfig, GeneratorConfig};
use crate::logger::{Logger, LogEvent};
use crate::logln;
use crate::policies::Policy;
use crate::replications::ReplicationSet;
use crate::scenarios::{check, finish};

inventory::submit!(crate::scenarios::ScenarioEntry {
    short_name: "scarce_budgets",
    run,
});

const ERROR_LEVEL: f64 = 0.5;
const TINY_ALPHA: f64 = 1e-9;

/// Small universe with budgets worth a handful of queries each
fn scarce_config(base: &ExperimentConfig) -> ExperimentConfig {
    let mut config = ExperimentConfig {
        num_advertisers: 10,
        num_keywords: 20,
        num_queries: 500,
        error_levels: vec![ERROR_LEVEL],
        replications: 5,
        seed_base: base.seed_base,
        generator: GeneratorConfig {
            budget_min: 20.0,
            budget_max: 60.0,
            participation_rate: 0.3,
            ..Default::default()
        },
        ..Default::default()
    };
    config.policy = base.policy;
    config
}

pub fn run(scenario_name: &str, config: &ExperimentConfig, logger: &mut Logger) -> Result<(), Box<dyn std::error::Error>> {
    let config = scarce_config(config);
    logln!(logger, LogEvent::Scenario, "=== Scenario: Scarce budgets (budgets {}..{}, participation {}) ===",
        config.generator.budget_min, config.generator.budget_max, config.generator.participation_rate);

    let replication_set = ReplicationSet::new(&config)?;
    let upper_bound = replication_set.mean_upper_bound();

    let optimistic = replication_set.run_variant(&Policy::Optimistic, ERROR_LEVEL, scenario_name, "optimistic", logger)?;
    let pessimistic = replication_set.run_variant(&Policy::Pessimistic, ERROR_LEVEL, scenario_name, "pessimistic", logger)?;
    let balanced_zero = replication_set.run_variant(&Policy::Balanced { alpha: TINY_ALPHA }, ERROR_LEVEL, scenario_name, "balanced-tiny-alpha", logger)?;
    let balanced_inf = replication_set.run_variant(&Policy::Balanced { alpha: f64::INFINITY }, ERROR_LEVEL, scenario_name, "balanced-inf-alpha", logger)?;
    let balanced_repeat = replication_set.run_variant(&Policy::Balanced { alpha: 2.0 }, ERROR_LEVEL, scenario_name, "balanced-a2", logger)?;
    let balanced_again = replication_set.run_variant(&Policy::Balanced { alpha: 2.0 }, ERROR_LEVEL, scenario_name, "balanced-a2-again", logger)?;

    logln!(logger, LogEvent::Scenario, "Mean revenue optimistic/pessimistic/balanced(2): {:.2} / {:.2} / {:.2}",
        optimistic.mean, pessimistic.mean, balanced_repeat.mean);

    logln!(logger, LogEvent::Scenario, "");
    logln!(logger, LogEvent::Scenario, "=== Validation Results ===");
    let mut errors: Vec<String> = Vec::new();

    check(logger, &mut errors, optimistic.mean < upper_bound,
        format!("Budgets bind: optimistic mean revenue < hindsight upper bound: {:.2} < {:.2}", optimistic.mean, upper_bound));
    check(logger, &mut errors, balanced_zero.revenues == optimistic.revenues,
        format!("Balanced (alpha {}) == Optimistic: {:?} == {:?}", TINY_ALPHA, balanced_zero.revenues, optimistic.revenues));
    check(logger, &mut errors, balanced_inf.revenues == pessimistic.revenues,
        format!("Balanced (alpha inf) == Pessimistic: {:?} == {:?}", balanced_inf.revenues, pessimistic.revenues));
    check(logger, &mut errors, balanced_repeat == balanced_again,
        format!("Repeated Balanced (alpha 2) run is identical: {:.4} == {:.4}", balanced_repeat.mean, balanced_again.mean));

    finish(scenario_name, errors)
}
