use std::path::PathBuf;
use std::sync::atomic::Ordering;
use crate::config::ExperimentConfig;
use crate::dataset::{Dataset, DatasetParam};
use crate::errors::Result;
use crate::forecast::Forecast;
use crate::logger::{Logger, LogEvent, FileReceiver, sanitize_filename};
use crate::{logln, warnln};
use crate::policies::Policy;
use crate::simulationrun::{Market, SimulationRun, SimulationStat, ALLOCATION_CSV_HEADER};
use crate::utils::{get_seed, VERBOSE_ALLOCATIONS};

/// Revenues of one variant across replications
#[derive(Debug, Clone, PartialEq)]
pub struct RevenueSummary {
    /// One entry per replication, in replication order
    pub revenues: Vec<f64>,
    pub mean: f64,
    /// Population variance
    pub variance: f64,
}

impl RevenueSummary {
    pub fn from_revenues(revenues: Vec<f64>) -> Self {
        let (mean, variance) = mean_and_variance(&revenues);
        Self { revenues, mean, variance }
    }
}

/// Mean and population variance; both zero for an empty slice
pub fn mean_and_variance(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n;
    (mean, variance)
}

/// Replicated datasets shared by every variant of an experiment
///
/// Datasets are drawn once, so all policies and error levels are compared on identical
/// advertisers, bids and query sequences (paired comparison).
pub struct ReplicationSet {
    pub config: ExperimentConfig,
    pub seeds: Vec<u64>,
    pub datasets: Vec<Dataset>,
    /// Write per-variant log files under log/<scenario>/
    pub log_to_files: bool,
}

impl ReplicationSet {
    /// Generate one dataset per replication from a validated configuration
    pub fn new(config: &ExperimentConfig) -> Result<Self> {
        config.validate()?;
        let param = DatasetParam::from_config(config)?;
        let seeds: Vec<u64> = (0..config.replications)
            .map(|replication| get_seed(config.seed_base, replication as u64))
            .collect();
        let datasets = seeds.iter()
            .map(|&seed| Dataset::generate(&param, seed))
            .collect::<Result<Vec<Dataset>>>()?;
        Ok(Self {
            config: config.clone(),
            seeds,
            datasets,
            log_to_files: true,
        })
    }

    /// Hindsight revenue upper bound of every replication
    pub fn upper_bounds(&self) -> Vec<f64> {
        self.datasets.iter().map(|d| d.revenue_upper_bound()).collect()
    }

    pub fn mean_upper_bound(&self) -> f64 {
        mean_and_variance(&self.upper_bounds()).0
    }

    /// Run `policy` at `error_level` over every replication
    ///
    /// Forecasts depend only on (replication, error level), so two policies run at the same
    /// error level see the same predictions.
    pub fn run_variant(
        &self,
        policy: &Policy,
        error_level: f64,
        scenario_name: &str,
        variant_name: &str,
        logger: &mut Logger,
    ) -> Result<RevenueSummary> {
        let mut receiver_ids = Vec::new();
        if self.log_to_files {
            receiver_ids.push(logger.add_receiver(FileReceiver::new(
                &log_path(scenario_name, &format!("replications-{}.log", variant_name)),
                vec![LogEvent::Replication],
            )?));
            receiver_ids.push(logger.add_receiver(FileReceiver::new(
                &log_path(scenario_name, &format!("variant-{}.log", variant_name)),
                vec![LogEvent::Variant],
            )?));
        }

        let result = self.run_replications(policy, error_level, scenario_name, variant_name, logger);

        // Receivers go away on the error path as well
        for id in receiver_ids {
            logger.remove_receiver(id);
        }
        result
    }

    fn run_replications(
        &self,
        policy: &Policy,
        error_level: f64,
        scenario_name: &str,
        variant_name: &str,
        logger: &mut Logger,
    ) -> Result<RevenueSummary> {
        logln!(logger, LogEvent::Variant, "\n=== {} at error level {:.2} ===", policy.label(), error_level);

        let mut revenues = Vec::with_capacity(self.datasets.len());
        for (replication, (dataset, &seed)) in self.datasets.iter().zip(&self.seeds).enumerate() {
            let forecast = Forecast::generate(dataset, error_level, seed)?;
            let market = Market::new(dataset, &forecast);
            logln!(logger, LogEvent::Replication, "\n=== {} - Replication {} ===", variant_name, replication + 1);
            market.printout(logger);

            let allocations_receiver_id = if self.log_to_files && VERBOSE_ALLOCATIONS.load(Ordering::Relaxed) {
                let receiver_id = logger.add_receiver(FileReceiver::new(
                    &log_path(scenario_name, &format!("allocations-{}-rep{}.csv", variant_name, replication + 1)),
                    vec![LogEvent::Allocation],
                )?);
                logln!(logger, LogEvent::Allocation, "{}", ALLOCATION_CSV_HEADER);
                Some(receiver_id)
            } else {
                None
            };

            let simulation_run = SimulationRun::new(&market, policy, &self.config.policy, logger);

            if let Some(id) = allocations_receiver_id {
                logger.remove_receiver(id);
            }

            let stat = SimulationStat::new(&market, &simulation_run);
            if stat.overall_stat.assigned_count == 0 && !dataset.queries.is_empty() {
                warnln!(logger, LogEvent::Replication, "{} assigned none of {} queries in replication {}",
                    policy.label(), dataset.queries.len(), replication + 1);
            }
            stat.printout_overall(logger, LogEvent::Replication);
            stat.printout_advertisers(&market, logger, LogEvent::Replication);
            revenues.push(stat.overall_stat.total_revenue);
        }

        let summary = RevenueSummary::from_revenues(revenues);
        logln!(logger, LogEvent::Variant, "Replications: {}", summary.revenues.len());
        logln!(logger, LogEvent::Variant, "Revenue (mean/variance): {:.2} / {:.2}", summary.mean, summary.variance);
        logln!(logger, LogEvent::Variant, "Mean hindsight upper bound: {:.2}", self.mean_upper_bound());
        Ok(summary)
    }
}

fn log_path(scenario_name: &str, file_name: &str) -> PathBuf {
    PathBuf::from(format!("log/{}/{}", sanitize_filename(scenario_name), sanitize_filename(file_name)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GeneratorConfig;

    fn small_config() -> ExperimentConfig {
        ExperimentConfig {
            num_advertisers: 6,
            num_keywords: 4,
            num_queries: 120,
            replications: 3,
            seed_base: 42,
            ..Default::default()
        }
    }

    fn replication_set(config: &ExperimentConfig) -> ReplicationSet {
        let mut set = ReplicationSet::new(config).unwrap();
        set.log_to_files = false;
        set
    }

    #[test]
    fn test_mean_and_variance() {
        assert_eq!(mean_and_variance(&[]), (0.0, 0.0));
        assert_eq!(mean_and_variance(&[3.0]), (3.0, 0.0));
        let (mean, variance) = mean_and_variance(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]);
        assert_eq!(mean, 5.0);
        assert_eq!(variance, 4.0);
    }

    #[test]
    fn test_one_dataset_per_replication() {
        let set = replication_set(&small_config());
        assert_eq!(set.datasets.len(), 3);
        assert_ne!(set.datasets[0].keywords.keywords, set.datasets[1].keywords.keywords);
        assert_eq!(set.upper_bounds().len(), 3);
    }

    #[test]
    fn test_run_variant_is_deterministic() {
        let config = small_config();
        let mut logger = Logger::new();
        let a = replication_set(&config)
            .run_variant(&Policy::Balanced { alpha: 2.0 }, 0.25, "test", "balanced", &mut logger)
            .unwrap();
        let b = replication_set(&config)
            .run_variant(&Policy::Balanced { alpha: 2.0 }, 0.25, "test", "balanced", &mut logger)
            .unwrap();
        assert_eq!(a, b);
        assert_eq!(a.revenues.len(), 3);
    }

    #[test]
    fn test_revenue_never_exceeds_upper_bound() {
        let set = replication_set(&small_config());
        let mut logger = Logger::new();
        let bounds = set.upper_bounds();
        for policy in [Policy::Optimistic, Policy::Pessimistic, Policy::Balanced { alpha: 4.0 }] {
            let summary = set.run_variant(&policy, 0.5, "test", policy.name(), &mut logger).unwrap();
            for (revenue, bound) in summary.revenues.iter().zip(&bounds) {
                assert!(*revenue >= 0.0 && *revenue <= bound + 1e-9);
            }
        }
    }

    #[test]
    fn test_pessimistic_ignores_error_level() {
        let set = replication_set(&small_config());
        let mut logger = Logger::new();
        let exact = set.run_variant(&Policy::Pessimistic, 0.0, "test", "p0", &mut logger).unwrap();
        let noisy = set.run_variant(&Policy::Pessimistic, 0.5, "test", "p5", &mut logger).unwrap();
        assert_eq!(exact, noisy);
    }

    #[test]
    fn test_invalid_config_is_rejected_before_generation() {
        let config = ExperimentConfig { replications: 0, ..small_config() };
        assert_eq!(ReplicationSet::new(&config).err().map(|e| e.code()), Some("ALLOC-1001"));
    }

    /// Many advertisers competing for few, noisy queries: budgets bind and predictions mislead
    fn scarce_config(cap_by_forecast_volume: bool, offline_plan: bool) -> ExperimentConfig {
        let mut config = ExperimentConfig {
            num_advertisers: 10,
            num_keywords: 20,
            num_queries: 500,
            replications: 2,
            seed_base: 7,
            generator: GeneratorConfig {
                budget_min: 20.0,
                budget_max: 60.0,
                participation_rate: 0.3,
                ..Default::default()
            },
            ..Default::default()
        };
        config.policy.cap_by_forecast_volume = cap_by_forecast_volume;
        config.policy.offline_plan = offline_plan;
        config
    }

    #[test]
    fn test_balanced_limits_match_whole_runs() {
        let mut logger = Logger::new();
        for (cap, plan) in [(false, false), (true, false), (false, true), (true, true)] {
            let set = replication_set(&scarce_config(cap, plan));
            let run = |policy: Policy, logger: &mut Logger| set.run_variant(&policy, 0.5, "test", "limits", logger).unwrap();

            let optimistic = run(Policy::Optimistic, &mut logger);
            let pessimistic = run(Policy::Pessimistic, &mut logger);
            assert_eq!(run(Policy::Balanced { alpha: 1e-12 }, &mut logger).revenues, optimistic.revenues, "cap {} plan {}", cap, plan);
            assert_eq!(run(Policy::Balanced { alpha: f64::INFINITY }, &mut logger).revenues, pessimistic.revenues, "cap {} plan {}", cap, plan);
        }
    }

    #[test]
    fn test_failed_variant_releases_receivers() {
        let mut set = replication_set(&small_config());
        set.log_to_files = true;
        // Forecast generation rejects the error level after the variant receivers are added
        let mut logger = Logger::new();
        assert!(set.run_variant(&Policy::Optimistic, -1.0, "test_release", "bad", &mut logger).is_err());
        assert!(!logger.is_enabled(LogEvent::Replication));
        assert!(!logger.is_enabled(LogEvent::Variant));
    }
}
