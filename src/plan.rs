/// Offline allocation plan built from predictions before any query arrives.
///
/// Predicted demand is split into integer quotas per (keyword, advertiser). Pairs are served
/// in order of predicted bid, and each takes as many predicted queries as its keyword still
/// has and the advertiser's budget covers at that bid. Online, the optimistic side only
/// serves advertisers that still hold quota for the arriving keyword.

use crate::dataset::Dataset;
use crate::forecast::Forecast;
use crate::logger::{Logger, LogEvent};
use crate::logln;

#[derive(Debug, Clone, PartialEq)]
pub struct OfflinePlan {
    /// Keyword-major, like the bid matrix
    pub quotas: Vec<Vec<usize>>,
}

impl OfflinePlan {
    /// Greedy integer plan over predicted bids and volumes, bounded by true budgets
    pub fn solve(dataset: &Dataset, forecast: &Forecast) -> Self {
        let num_advertisers = dataset.advertisers.len();
        let num_keywords = dataset.keywords.len();

        let mut pairs: Vec<(usize, usize, f64)> = Vec::new();
        for keyword_id in 0..num_keywords {
            for advertiser_id in 0..num_advertisers {
                let bid = forecast.predicted_bid(keyword_id, advertiser_id);
                if bid > 0.0 {
                    pairs.push((keyword_id, advertiser_id, bid));
                }
            }
        }
        // Highest bid first; ties by advertiser id, then keyword id
        pairs.sort_by(|a, b| b.2.total_cmp(&a.2).then(a.1.cmp(&b.1)).then(a.0.cmp(&b.0)));

        let mut budgets: Vec<f64> = dataset.advertisers.advertisers.iter().map(|a| a.total_budget).collect();
        let mut volumes = forecast.predicted_volumes.clone();
        let mut quotas = vec![vec![0usize; num_advertisers]; num_keywords];
        for (keyword_id, advertiser_id, bid) in pairs {
            if volumes[keyword_id] == 0 {
                continue;
            }
            let affordable = (budgets[advertiser_id] / bid).floor() as usize;
            let quota = affordable.min(volumes[keyword_id]);
            if quota == 0 {
                continue;
            }
            quotas[keyword_id][advertiser_id] = quota;
            volumes[keyword_id] -= quota;
            budgets[advertiser_id] = (budgets[advertiser_id] - quota as f64 * bid).max(0.0);
        }

        Self { quotas }
    }

    pub fn quota(&self, keyword_id: usize, advertiser_id: usize) -> usize {
        self.quotas[keyword_id][advertiser_id]
    }

    /// Use up one planned query of the pair
    pub fn consume(&mut self, keyword_id: usize, advertiser_id: usize) {
        let quota = &mut self.quotas[keyword_id][advertiser_id];
        *quota = quota.saturating_sub(1);
    }

    pub fn total_quota(&self) -> usize {
        self.quotas.iter().flatten().sum()
    }

    pub fn printout(&self, logger: &mut Logger) {
        logln!(logger, LogEvent::Replication, "Offline plan covers {} predicted queries", self.total_quota());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::advertisers::Advertisers;
    use crate::keywords::Keywords;
    use crate::queries::Queries;

    #[test]
    fn test_plan_follows_highest_bids_within_volume() {
        let mut advertisers = Advertisers::new();
        advertisers.add("A1".to_string(), 1000.0);
        advertisers.add("A2".to_string(), 1000.0);
        let mut keywords = Keywords::new();
        keywords.add("k1".to_string(), vec![10.0, 1.0]);
        keywords.add("k2".to_string(), vec![1.0, 10.0]);
        keywords.add("k3".to_string(), vec![0.0, 1.0]);
        let queries = Queries::from_keyword_ids(&[1, 1, 0, 0, 1, 2]);
        let dataset = Dataset::from_parts(advertisers, keywords, queries).unwrap();

        let plan = OfflinePlan::solve(&dataset, &Forecast::exact(&dataset));
        assert_eq!(plan.quotas, vec![vec![2, 0], vec![0, 3], vec![0, 1]]);
        assert_eq!(plan.total_quota(), 6);
    }

    #[test]
    fn test_plan_respects_budgets() {
        let mut advertisers = Advertisers::new();
        advertisers.add("A1".to_string(), 15.0);
        advertisers.add("A2".to_string(), 100.0);
        let mut keywords = Keywords::new();
        keywords.add("k1".to_string(), vec![10.0, 5.0]);
        let dataset = Dataset::from_parts(advertisers, keywords, Queries::from_keyword_ids(&[0, 0, 0])).unwrap();

        let plan = OfflinePlan::solve(&dataset, &Forecast::exact(&dataset));
        assert_eq!(plan.quota(0, 0), 1);
        assert_eq!(plan.quota(0, 1), 2);
    }

    #[test]
    fn test_consume_stops_at_zero() {
        let mut plan = OfflinePlan { quotas: vec![vec![1, 0]] };
        plan.consume(0, 0);
        plan.consume(0, 0);
        plan.consume(0, 1);
        assert_eq!(plan.total_quota(), 0);
    }
}
