/// Two advertisers with budget 10 each bid 5 on the same keyword, which is queried twice.
/// Whatever a policy decides, both queries fit, so every policy must earn exactly 10 and no
/// advertiser may be charged more than its budget.

use crate::advertisers::Advertisers;
use crate::config::ExperimentConfig;
use crate::dataset::Dataset;
use crate::experiment::policies_for;
use crate::forecast::Forecast;
use crate::keywords::Keywords;
use crate::logger::{Logger, LogEvent};
use crate::logln;
use crate::queries::Queries;
use crate::scenarios::{check, finish};
use crate::simulationrun::{Market, SimulationRun, SimulationStat};

inventory::submit!(crate::scenarios::ScenarioEntry {
    short_name: "two_advertisers",
    run,
});

fn prepare_dataset() -> Result<Dataset, Box<dyn std::error::Error>> {
    let mut advertisers = Advertisers::new();
    advertisers.add("A1".to_string(), 10.0);
    advertisers.add("A2".to_string(), 10.0);

    let mut keywords = Keywords::new();
    keywords.add("k1".to_string(), vec![5.0, 5.0]);

    Ok(Dataset::from_parts(advertisers, keywords, Queries::from_keyword_ids(&[0, 0]))?)
}

pub fn run(scenario_name: &str, config: &ExperimentConfig, logger: &mut Logger) -> Result<(), Box<dyn std::error::Error>> {
    logln!(logger, LogEvent::Scenario, "=== Scenario: Two advertisers, budget 10, bid 5, two queries ===");
    let dataset = prepare_dataset()?;
    let mut errors: Vec<String> = Vec::new();

    for &error_level in &config.error_levels {
        let forecast = Forecast::generate(&dataset, error_level, config.seed_base)?;
        let market = Market::new(&dataset, &forecast);
        for policy in policies_for(&config.alphas) {
            let simulation_run = SimulationRun::new(&market, &policy, &config.policy, logger);
            let stat = SimulationStat::new(&market, &simulation_run);
            let label = format!("{} at error {}", policy.label(), error_level);
            stat.printout_advertisers(&market, logger, LogEvent::Scenario);

            check(logger, &mut errors, stat.overall_stat.total_revenue == 10.0,
                format!("{}: revenue == 10: {:.2}", label, stat.overall_stat.total_revenue));
            let within_budget = stat.advertiser_stats.iter().all(|s| s.total_charge <= 10.0);
            check(logger, &mut errors, within_budget,
                format!("{}: no advertiser charged above its budget of 10", label));
        }
    }

    finish(scenario_name, errors)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_policy_passes() {
        assert!(run("two_advertisers", &ExperimentConfig::default(), &mut Logger::new()).is_ok());
        let mut config = ExperimentConfig::default();
        config.policy.cap_by_forecast_volume = true;
        config.policy.offline_plan = true;
        assert!(run("two_advertisers", &config, &mut Logger::new()).is_ok());
    }
}
