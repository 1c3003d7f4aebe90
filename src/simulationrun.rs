/// One simulation run replays a replication's query sequence in order under one policy.
/// Each query gets exactly one decision, and budget state carries forward from query to query.
/// Runs start from full budgets and never share state, so the same market can be replayed
/// by any number of policies (see replications.rs).

use std::sync::atomic::Ordering;
use crate::advertisers::AdvertiserStates;
use crate::config::PolicyConfig;
use crate::dataset::Dataset;
use crate::forecast::Forecast;
use crate::logger::{Logger, LogEvent};
use crate::logln;
use crate::plan::OfflinePlan;
use crate::policies::{Decision, DecisionSource, Policy, QueryContext};
use crate::utils::{TOTAL_SIMULATION_RUNS, VERBOSE_ALLOCATIONS};

/// True data of one replication together with the predictions for one error level
pub struct Market<'a> {
    pub dataset: &'a Dataset,
    pub forecast: &'a Forecast,
}

impl<'a> Market<'a> {
    pub fn new(dataset: &'a Dataset, forecast: &'a Forecast) -> Self {
        Self { dataset, forecast }
    }

    pub fn printout(&self, logger: &mut Logger) {
        self.dataset.printout(logger);
        let predicted_total: usize = self.forecast.predicted_volumes.iter().sum();
        logln!(logger, LogEvent::Replication, "Forecast at error level {:.2} ({} predicted queries)", self.forecast.error_level, predicted_total);
    }
}

/// CSV header of the per-query allocation log
pub const ALLOCATION_CSV_HEADER: &str = "query_id,keyword_id,advertiser_id,price,source,remaining_budget";

/// Decisions of one run, matched to queries by index, plus the final budget state
pub struct SimulationRun {
    pub decisions: Vec<Decision>,
    pub states: AdvertiserStates,
}

impl SimulationRun {
    /// Run `policy` over every query of the market
    pub fn new(market: &Market, policy: &Policy, params: &PolicyConfig, logger: &mut Logger) -> Self {
        TOTAL_SIMULATION_RUNS.fetch_add(1, Ordering::Relaxed);
        let verbose = VERBOSE_ALLOCATIONS.load(Ordering::Relaxed) && logger.is_enabled(LogEvent::Allocation);

        let dataset = market.dataset;
        let mut plan = if params.offline_plan {
            let plan = OfflinePlan::solve(dataset, market.forecast);
            plan.printout(logger);
            Some(plan)
        } else {
            None
        };
        let mut states = AdvertiserStates::new(&dataset.advertisers);
        let mut arrivals = vec![0usize; dataset.keywords.len()];
        let mut decisions = Vec::with_capacity(dataset.queries.len());

        for query in &dataset.queries.queries {
            let context = QueryContext {
                query,
                keywords: &dataset.keywords,
                forecast: market.forecast,
                prior_arrivals: arrivals[query.keyword_id],
                plan: plan.as_ref(),
            };
            let decision = policy.decide(&context, &states, params);
            if let Some(advertiser_id) = decision.advertiser_id() {
                states.charge(advertiser_id, decision.price());
                if let (Some(plan), Decision::Assigned { source: DecisionSource::Optimistic, .. }) = (plan.as_mut(), decision) {
                    plan.consume(query.keyword_id, advertiser_id);
                }
            }
            arrivals[query.keyword_id] += 1;

            if verbose {
                let row = match decision {
                    Decision::Assigned { advertiser_id, price, source } => format!(
                        "{},{},{},{:.2},{},{:.2}",
                        query.query_id,
                        query.keyword_id,
                        advertiser_id,
                        price,
                        source_name(source),
                        states.get(advertiser_id).remaining_budget()
                    ),
                    Decision::Unassigned => format!("{},{},,0.00,unassigned,", query.query_id, query.keyword_id),
                };
                logln!(logger, LogEvent::Allocation, "{}", row);
            }
            decisions.push(decision);
        }

        Self { decisions, states }
    }
}

fn source_name(source: DecisionSource) -> &'static str {
    match source {
        DecisionSource::Optimistic => "optimistic",
        DecisionSource::Pessimistic => "pessimistic",
    }
}

/// Statistics for a single advertiser
#[derive(Debug, Clone, PartialEq)]
pub struct AdvertiserStat {
    pub queries_won: usize,
    pub total_charge: f64,
}

/// Overall statistics for the run
#[derive(Debug, Clone, PartialEq)]
pub struct OverallStat {
    pub total_revenue: f64,
    pub assigned_count: usize,
    pub unassigned_count: usize,
    pub optimistic_follows: usize,
    pub pessimistic_follows: usize,
}

/// Complete simulation statistics
pub struct SimulationStat {
    pub advertiser_stats: Vec<AdvertiserStat>,
    pub overall_stat: OverallStat,
}

impl SimulationStat {
    /// Accumulate statistics from a finished run
    pub fn new(market: &Market, simulation_run: &SimulationRun) -> Self {
        let mut advertiser_stats: Vec<AdvertiserStat> = (0..market.dataset.advertisers.len())
            .map(|_| AdvertiserStat {
                queries_won: 0,
                total_charge: 0.0,
            })
            .collect();

        let mut overall_stat = OverallStat {
            total_revenue: 0.0,
            assigned_count: 0,
            unassigned_count: 0,
            optimistic_follows: 0,
            pessimistic_follows: 0,
        };

        for decision in &simulation_run.decisions {
            match *decision {
                Decision::Assigned { advertiser_id, price, source } => {
                    let advertiser_stat = &mut advertiser_stats[advertiser_id];
                    advertiser_stat.queries_won += 1;
                    advertiser_stat.total_charge += price;
                    overall_stat.total_revenue += price;
                    overall_stat.assigned_count += 1;
                    match source {
                        DecisionSource::Optimistic => overall_stat.optimistic_follows += 1,
                        DecisionSource::Pessimistic => overall_stat.pessimistic_follows += 1,
                    }
                }
                Decision::Unassigned => overall_stat.unassigned_count += 1,
            }
        }

        // Summed charges drift from the running budget by float error only
        let spent = simulation_run.states.total_spent();
        assert!(
            (overall_stat.total_revenue - spent).abs() <= 1e-6 * spent.max(1.0),
            "Revenue {:.4} disagrees with spent budget {:.4}",
            overall_stat.total_revenue,
            spent
        );
        for (advertiser, stat) in market.dataset.advertisers.advertisers.iter().zip(&advertiser_stats) {
            assert!(
                stat.total_charge <= advertiser.total_budget + 1e-6,
                "Budget overrun: advertiser {} charged {:.4} of {:.4}",
                advertiser.advertiser_name,
                stat.total_charge,
                advertiser.total_budget
            );
        }

        Self {
            advertiser_stats,
            overall_stat,
        }
    }

    pub fn printout_advertisers(&self, market: &Market, logger: &mut Logger, event: LogEvent) {
        for (advertiser, stat) in market.dataset.advertisers.advertisers.iter().zip(&self.advertiser_stats) {
            let utilization = if advertiser.total_budget > 0.0 {
                stat.total_charge / advertiser.total_budget * 100.0
            } else {
                0.0
            };
            logln!(logger, event, "  {} - won {} queries, charged {:.2} of {:.2} ({:.1}%)",
                advertiser.advertiser_name,
                stat.queries_won,
                stat.total_charge,
                advertiser.total_budget,
                utilization
            );
        }
    }

    pub fn printout_overall(&self, logger: &mut Logger, event: LogEvent) {
        let overall = &self.overall_stat;
        logln!(logger, event, "Revenue: {:.2}", overall.total_revenue);
        logln!(logger, event, "Queries (assigned/unassigned): {} / {}", overall.assigned_count, overall.unassigned_count);
        logln!(logger, event, "Followed (optimistic/pessimistic): {} / {}", overall.optimistic_follows, overall.pessimistic_follows);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::advertisers::Advertisers;
    use crate::keywords::Keywords;
    use crate::logger::MemoryReceiver;
    use crate::queries::Queries;

    fn two_advertiser_dataset() -> Dataset {
        let mut advertisers = Advertisers::new();
        advertisers.add("A1".to_string(), 10.0);
        advertisers.add("A2".to_string(), 10.0);
        let mut keywords = Keywords::new();
        keywords.add("k1".to_string(), vec![5.0, 5.0]);
        Dataset::from_parts(advertisers, keywords, Queries::from_keyword_ids(&[0, 0])).unwrap()
    }

    fn run(dataset: &Dataset, forecast: &Forecast, policy: Policy) -> (SimulationRun, SimulationStat) {
        run_with(dataset, forecast, policy, &PolicyConfig::default())
    }

    fn run_with(dataset: &Dataset, forecast: &Forecast, policy: Policy, params: &PolicyConfig) -> (SimulationRun, SimulationStat) {
        let market = Market::new(dataset, forecast);
        let mut logger = Logger::new();
        let simulation_run = SimulationRun::new(&market, &policy, params, &mut logger);
        let stat = SimulationStat::new(&market, &simulation_run);
        (simulation_run, stat)
    }

    #[test]
    fn test_two_advertisers_earn_ten_under_every_policy() {
        let dataset = two_advertiser_dataset();
        let forecast = Forecast::exact(&dataset);
        for policy in [Policy::Optimistic, Policy::Pessimistic, Policy::Balanced { alpha: 1.0 }] {
            let (simulation_run, stat) = run(&dataset, &forecast, policy);
            assert_eq!(stat.overall_stat.total_revenue, 10.0, "{}", policy.name());
            assert_eq!(stat.overall_stat.assigned_count, 2);
            for state in &simulation_run.states.states {
                assert!(state.remaining_budget() >= 0.0);
            }
        }
    }

    #[test]
    fn test_pessimistic_spreads_across_equal_bidders() {
        let dataset = two_advertiser_dataset();
        let forecast = Forecast::exact(&dataset);
        let (_, stat) = run(&dataset, &forecast, Policy::Pessimistic);
        // Second query goes to the untouched advertiser
        assert_eq!(stat.advertiser_stats[0].queries_won, 1);
        assert_eq!(stat.advertiser_stats[1].queries_won, 1);

        let (_, stat) = run(&dataset, &forecast, Policy::Optimistic);
        assert_eq!(stat.advertiser_stats[0].queries_won, 2);
        assert_eq!(stat.advertiser_stats[0].total_charge, 10.0);
    }

    #[test]
    fn test_exhausted_budgets_leave_queries_unassigned() {
        let mut advertisers = Advertisers::new();
        advertisers.add("A1".to_string(), 6.0);
        let mut keywords = Keywords::new();
        keywords.add("k1".to_string(), vec![5.0]);
        let dataset = Dataset::from_parts(advertisers, keywords, Queries::from_keyword_ids(&[0, 0, 0])).unwrap();
        let forecast = Forecast::exact(&dataset);
        let (simulation_run, stat) = run(&dataset, &forecast, Policy::Optimistic);
        assert_eq!(simulation_run.decisions.len(), 3);
        assert_eq!(stat.overall_stat.assigned_count, 1);
        assert_eq!(stat.overall_stat.unassigned_count, 2);
        assert_eq!(simulation_run.states.get(0).remaining_budget(), 1.0);
    }

    #[test]
    fn test_optimistic_with_exact_forecast_is_greedy_by_true_bid() {
        let mut advertisers = Advertisers::new();
        advertisers.add("A1".to_string(), 12.0);
        advertisers.add("A2".to_string(), 30.0);
        let mut keywords = Keywords::new();
        keywords.add("k1".to_string(), vec![11.0, 1.0]);
        keywords.add("k2".to_string(), vec![1.0, 10.0]);
        let dataset = Dataset::from_parts(advertisers, keywords, Queries::from_keyword_ids(&[0, 0, 1, 1])).unwrap();
        let forecast = Forecast::exact(&dataset);
        let (simulation_run, stat) = run(&dataset, &forecast, Policy::Optimistic);

        // Greedy baseline: highest affordable true bid at each step
        let mut remaining = [12.0, 30.0];
        let mut expected = 0.0;
        for query in &dataset.queries.queries {
            let best = (0..2)
                .map(|a| (a, dataset.keywords.bid(query.keyword_id, a)))
                .filter(|&(a, bid)| bid > 0.0 && bid <= remaining[a])
                .fold(None, |best: Option<(usize, f64)>, (a, bid)| match best {
                    Some((_, b)) if bid <= b => best,
                    _ => Some((a, bid)),
                });
            if let Some((a, bid)) = best {
                remaining[a] -= bid;
                expected += bid;
            }
        }
        assert_eq!(stat.overall_stat.total_revenue, expected);
        assert_eq!(simulation_run.decisions[1].advertiser_id(), Some(1));
    }

    #[test]
    fn test_verbose_allocations_write_rows() {
        let dataset = two_advertiser_dataset();
        let forecast = Forecast::exact(&dataset);
        let market = Market::new(&dataset, &forecast);
        let mut logger = Logger::new();
        let (receiver, buffer) = MemoryReceiver::new(vec![LogEvent::Allocation]);
        logger.add_receiver(receiver);

        VERBOSE_ALLOCATIONS.store(true, Ordering::Relaxed);
        SimulationRun::new(&market, &Policy::Optimistic, &PolicyConfig::default(), &mut logger);
        VERBOSE_ALLOCATIONS.store(false, Ordering::Relaxed);

        let output = buffer.borrow();
        assert!(output.contains("0,0,0,5.00,optimistic,5.00"));
        assert!(output.contains("1,0,0,5.00,optimistic,0.00"));
    }

    #[test]
    fn test_offline_plan_holds_budget_for_planned_keyword() {
        // A1 bids on both keywords but can only afford two queries; the plan keeps it for k2
        let mut advertisers = Advertisers::new();
        advertisers.add("A1".to_string(), 24.0);
        advertisers.add("A2".to_string(), 100.0);
        let mut keywords = Keywords::new();
        keywords.add("k1".to_string(), vec![10.0, 9.0]);
        keywords.add("k2".to_string(), vec![12.0, 0.0]);
        let dataset = Dataset::from_parts(advertisers, keywords, Queries::from_keyword_ids(&[0, 0, 1, 1])).unwrap();
        let forecast = Forecast::exact(&dataset);

        let (_, greedy) = run(&dataset, &forecast, Policy::Optimistic);
        assert_eq!(greedy.overall_stat.total_revenue, 20.0);

        let params = PolicyConfig { offline_plan: true, ..Default::default() };
        let (simulation_run, planned) = run_with(&dataset, &forecast, Policy::Optimistic, &params);
        assert_eq!(planned.overall_stat.total_revenue, 42.0);
        assert_eq!(simulation_run.decisions[0].advertiser_id(), Some(1));
        assert_eq!(simulation_run.decisions[3].advertiser_id(), Some(0));

        let (_, balanced) = run_with(&dataset, &forecast, Policy::Balanced { alpha: 1e-12 }, &params);
        assert_eq!(balanced.overall_stat, planned.overall_stat);
    }
}
