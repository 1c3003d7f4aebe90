use rand::{rngs::StdRng, Rng, SeedableRng};
use rand_distr::{Distribution, Normal, Uniform};
use crate::advertisers::Advertisers;
use crate::config::{ExperimentConfig, QueryPattern};
use crate::errors::{AllocError, Result};
use crate::keywords::Keywords;
use crate::queries::Queries;
use crate::logger::{Logger, LogEvent};
use crate::logln;
use crate::utils::{get_seed, round_cents, STREAM_BIDS, STREAM_BUDGETS, STREAM_PARTICIPATION, STREAM_QUERIES};

/// Object-safe wrapper for Distribution<f64> that works with StdRng
/// This is needed because Distribution<f64> cannot be made into a trait object
/// due to its generic sample method
pub trait DistributionF64 {
    fn sample(&self, rng: &mut StdRng) -> f64;
}

impl<D: Distribution<f64>> DistributionF64 for D {
    fn sample(&self, rng: &mut StdRng) -> f64 {
        Distribution::sample(self, rng)
    }
}

/// Distribution parameters for dataset generation
/// Contains pre-initialized distribution boxes plus the scalar knobs that depend on drawn values
pub struct DatasetParam {
    pub num_advertisers: usize,
    pub num_keywords: usize,
    pub num_queries: usize,
    pub budget_dist: Box<dyn DistributionF64>,
    pub bid_dist: Box<dyn DistributionF64>,
    /// Budget noise stddev is this times the mean drawn budget; bid noise stddev is this times bid_max
    pub noise_level: f64,
    pub bid_max: f64,
    pub participation_rate: f64,
    pub query_pattern: QueryPattern,
}

impl DatasetParam {
    /// Create a new DatasetParam with Distribution<f64> types
    /// The distributions will be boxed internally
    pub fn new<D1, D2>(
        num_advertisers: usize,
        num_keywords: usize,
        num_queries: usize,
        budget_dist: D1,
        bid_dist: D2,
    ) -> Self
    where
        D1: Distribution<f64> + 'static,
        D2: Distribution<f64> + 'static,
    {
        Self {
            num_advertisers,
            num_keywords,
            num_queries,
            budget_dist: Box::new(budget_dist),
            bid_dist: Box::new(bid_dist),
            noise_level: 0.0,
            bid_max: 0.0,
            participation_rate: 1.0,
            query_pattern: QueryPattern::Uniform,
        }
    }

    /// Build generation parameters from a validated experiment configuration
    pub fn from_config(config: &ExperimentConfig) -> Result<Self> {
        let generator = &config.generator;
        generator.validate()?;
        let mut param = Self::new(
            config.num_advertisers,
            config.num_keywords,
            config.num_queries,
            Uniform::new_inclusive(generator.budget_min, generator.budget_max),
            Uniform::new_inclusive(generator.bid_min, generator.bid_max),
        );
        param.noise_level = generator.noise_level;
        param.bid_max = generator.bid_max;
        param.participation_rate = generator.participation_rate;
        param.query_pattern = generator.query_pattern;
        Ok(param)
    }
}

/// Advertisers, keywords and queries of one replication
#[derive(Debug, Clone)]
pub struct Dataset {
    pub advertisers: Advertisers,
    pub keywords: Keywords,
    pub queries: Queries,
}

impl Dataset {
    /// Assemble a dataset from explicit parts, checking that the shapes agree
    pub fn from_parts(advertisers: Advertisers, keywords: Keywords, queries: Queries) -> Result<Self> {
        for keyword in &keywords.keywords {
            if keyword.bids.len() != advertisers.len() {
                return Err(AllocError::InvalidDataset {
                    details: format!(
                        "keyword {} has {} bids for {} advertisers",
                        keyword.keyword_name,
                        keyword.bids.len(),
                        advertisers.len()
                    ),
                });
            }
        }
        if let Some(query) = queries.queries.iter().find(|q| q.keyword_id >= keywords.len()) {
            return Err(AllocError::InvalidDataset {
                details: format!(
                    "query {} references keyword {} but only {} keywords exist",
                    query.query_id,
                    query.keyword_id,
                    keywords.len()
                ),
            });
        }
        Ok(Self { advertisers, keywords, queries })
    }

    /// Generate a dataset from parameters and a seed
    /// Budgets, bids, participation and queries each draw from their own stream
    pub fn generate(param: &DatasetParam, seed: u64) -> Result<Self> {
        let mut rng_budgets = StdRng::seed_from_u64(get_seed(seed, STREAM_BUDGETS));
        let mut rng_bids = StdRng::seed_from_u64(get_seed(seed, STREAM_BIDS));
        let mut rng_participation = StdRng::seed_from_u64(get_seed(seed, STREAM_PARTICIPATION));
        let mut rng_queries = StdRng::seed_from_u64(get_seed(seed, STREAM_QUERIES));

        // Budgets: uniform draw, then noise relative to the mean drawn budget
        let raw_budgets: Vec<f64> = (0..param.num_advertisers)
            .map(|_| param.budget_dist.sample(&mut rng_budgets))
            .collect();
        let mean_budget = if raw_budgets.is_empty() {
            0.0
        } else {
            raw_budgets.iter().sum::<f64>() / raw_budgets.len() as f64
        };
        let budget_noise = noise_dist(param.noise_level * mean_budget)?;
        let mut advertisers = Advertisers::new();
        for (index, raw_budget) in raw_budgets.into_iter().enumerate() {
            let noise = Distribution::sample(&budget_noise, &mut rng_budgets);
            advertisers.add(format!("A{}", index + 1), (raw_budget + noise).max(1.0));
        }

        // Bids: uniform draw plus noise, rounded to cents and floored at zero
        let bid_noise = noise_dist(param.noise_level * param.bid_max)?;
        let mut keywords = Keywords::new();
        for keyword_index in 0..param.num_keywords {
            let mut bids = Vec::with_capacity(param.num_advertisers);
            for _ in 0..param.num_advertisers {
                let drawn = param.bid_dist.sample(&mut rng_bids) + Distribution::sample(&bid_noise, &mut rng_bids);
                let participates = rng_participation.gen::<f64>() < param.participation_rate;
                bids.push(if participates { round_cents(drawn).max(0.0) } else { 0.0 });
            }
            keywords.add(format!("k{}", keyword_index + 1), bids);
        }

        let queries = Queries::generate(param.num_keywords, param.num_queries, param.query_pattern, &mut rng_queries)?;

        Ok(Self { advertisers, keywords, queries })
    }

    /// Revenue if every query were sold at its keyword's highest bid
    /// No policy can earn more, whatever the budgets
    pub fn revenue_upper_bound(&self) -> f64 {
        self.queries.queries.iter()
            .map(|q| self.keywords.max_bid(q.keyword_id))
            .sum()
    }

    /// Print initialization information about the dataset
    pub fn printout(&self, logger: &mut Logger) {
        let total_budget: f64 = self.advertisers.advertisers.iter().map(|a| a.total_budget).sum();
        logln!(logger, LogEvent::Replication, "Initialized {} advertisers (total budget {:.2})", self.advertisers.len(), total_budget);
        logln!(logger, LogEvent::Replication, "Initialized {} keywords", self.keywords.len());
        logln!(logger, LogEvent::Replication, "Initialized {} queries (revenue upper bound {:.2})", self.queries.len(), self.revenue_upper_bound());
    }
}

fn noise_dist(stddev: f64) -> Result<Normal<f64>> {
    Normal::new(0.0, stddev).map_err(|e| AllocError::invalid_config(format!("noise stddev {}: {}", stddev, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::Query;

    fn small_config() -> ExperimentConfig {
        ExperimentConfig {
            num_advertisers: 8,
            num_keywords: 5,
            num_queries: 40,
            ..Default::default()
        }
    }

    #[test]
    fn test_generate_shapes_and_ranges() {
        let param = DatasetParam::from_config(&small_config()).unwrap();
        let dataset = Dataset::generate(&param, 1).unwrap();
        assert_eq!(dataset.advertisers.len(), 8);
        assert_eq!(dataset.keywords.len(), 5);
        assert_eq!(dataset.queries.len(), 40);
        for advertiser in &dataset.advertisers.advertisers {
            assert!(advertiser.total_budget >= 1.0);
        }
        for keyword in &dataset.keywords.keywords {
            assert_eq!(keyword.bids.len(), 8);
            for &bid in &keyword.bids {
                assert!(bid >= 0.0);
                assert_eq!(round_cents(bid), bid);
            }
        }
    }

    #[test]
    fn test_same_seed_same_dataset() {
        let param = DatasetParam::from_config(&small_config()).unwrap();
        let a = Dataset::generate(&param, 77).unwrap();
        let b = Dataset::generate(&param, 77).unwrap();
        let c = Dataset::generate(&param, 78).unwrap();
        assert_eq!(a.advertisers.advertisers, b.advertisers.advertisers);
        assert_eq!(a.keywords.keywords, b.keywords.keywords);
        assert_eq!(a.queries.queries, b.queries.queries);
        assert_ne!(a.keywords.keywords, c.keywords.keywords);
    }

    #[test]
    fn test_zero_participation_means_no_bids() {
        let mut config = small_config();
        config.generator.participation_rate = 0.0;
        let param = DatasetParam::from_config(&config).unwrap();
        let dataset = Dataset::generate(&param, 5).unwrap();
        assert!(dataset.keywords.keywords.iter().all(|k| k.bids.iter().all(|&b| b == 0.0)));
        assert_eq!(dataset.revenue_upper_bound(), 0.0);
    }

    #[test]
    fn test_participation_does_not_shift_other_streams() {
        let full = DatasetParam::from_config(&small_config()).unwrap();
        let mut sparse_config = small_config();
        sparse_config.generator.participation_rate = 0.5;
        let sparse = DatasetParam::from_config(&sparse_config).unwrap();

        let a = Dataset::generate(&full, 9).unwrap();
        let b = Dataset::generate(&sparse, 9).unwrap();
        assert_eq!(a.advertisers.advertisers, b.advertisers.advertisers);
        assert_eq!(a.queries.queries, b.queries.queries);
        // Every surviving bid is the one the full universe drew
        for (ka, kb) in a.keywords.keywords.iter().zip(&b.keywords.keywords) {
            for (&bid_a, &bid_b) in ka.bids.iter().zip(&kb.bids) {
                assert!(bid_b == 0.0 || bid_b == bid_a);
            }
        }
    }

    #[test]
    fn test_from_parts_rejects_mismatched_shapes() {
        let mut advertisers = Advertisers::new();
        advertisers.add("A1".to_string(), 10.0);
        let mut keywords = Keywords::new();
        keywords.add("k1".to_string(), vec![5.0, 5.0]);
        let err = Dataset::from_parts(advertisers.clone(), keywords, Queries::default()).unwrap_err();
        assert_eq!(err.code(), "ALLOC-1101");

        let mut keywords = Keywords::new();
        keywords.add("k1".to_string(), vec![5.0]);
        let queries = Queries { queries: vec![Query { query_id: 0, keyword_id: 3 }] };
        assert!(Dataset::from_parts(advertisers, keywords, queries).is_err());
    }

    #[test]
    fn test_revenue_upper_bound() {
        let mut advertisers = Advertisers::new();
        advertisers.add("A1".to_string(), 1000.0);
        advertisers.add("A2".to_string(), 500.0);
        let mut keywords = Keywords::new();
        keywords.add("k1".to_string(), vec![11.0, 1.0]);
        keywords.add("k2".to_string(), vec![1.0, 10.0]);
        let queries = Queries::from_keyword_ids(&[1, 0, 0, 1]);
        let dataset = Dataset::from_parts(advertisers, keywords, queries).unwrap();
        assert_eq!(dataset.revenue_upper_bound(), 42.0);
    }
}
