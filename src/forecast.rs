/// Offline predictions handed to the prediction-aware policies.
///
/// A forecast perturbs two things the optimistic side relies on: the bid each advertiser
/// places on each keyword, and how many queries each keyword will receive. Error level 0
/// reproduces the truth exactly.

use rand::{rngs::StdRng, SeedableRng};
use rand::seq::index;
use rand_distr::Distribution;
use crate::dataset::Dataset;
use crate::errors::{AllocError, Result};
use crate::utils::{get_seed, lognormal_dist, STREAM_FORECAST};

#[derive(Debug, Clone, PartialEq)]
pub struct Forecast {
    pub error_level: f64,
    /// Keyword-major, like the true bid matrix
    pub predicted_bids: Vec<Vec<f64>>,
    /// Expected number of arrivals per keyword
    pub predicted_volumes: Vec<usize>,
}

impl Forecast {
    /// Predictions equal to the truth
    pub fn exact(dataset: &Dataset) -> Self {
        Self {
            error_level: 0.0,
            predicted_bids: dataset.keywords.bid_matrix(),
            predicted_volumes: dataset.queries.keyword_counts(dataset.keywords.len()),
        }
    }

    /// Forecast for `error_level`, seeded from the replication seed and the error level
    /// so every policy compared on this replication sees the same predictions
    pub fn generate(dataset: &Dataset, error_level: f64, replication_seed: u64) -> Result<Self> {
        if !(0.0..=1.0).contains(&error_level) {
            return Err(AllocError::invalid_config(format!(
                "error level {} is outside [0, 1]",
                error_level
            )));
        }
        if error_level == 0.0 {
            return Ok(Self::exact(dataset));
        }
        let mut rng = StdRng::seed_from_u64(get_seed(replication_seed, STREAM_FORECAST ^ error_level.to_bits()));

        // Multiplicative log-normal noise with mean 1; non-bidding pairs stay at zero
        let multiplier = lognormal_dist(1.0, error_level)?;
        let predicted_bids: Vec<Vec<f64>> = dataset.keywords.keywords.iter()
            .map(|keyword| {
                keyword.bids.iter()
                    .map(|&bid| if bid > 0.0 { bid * multiplier.sample(&mut rng) } else { 0.0 })
                    .collect::<Vec<f64>>()
            })
            .collect();

        let actual_volumes = dataset.queries.keyword_counts(dataset.keywords.len());
        let num_transfers = (error_level * dataset.queries.len() as f64).floor() as usize;
        let predicted_volumes = shift_volumes(actual_volumes, num_transfers, &mut rng);

        Ok(Self {
            error_level,
            predicted_bids,
            predicted_volumes,
        })
    }

    pub fn predicted_bid(&self, keyword_id: usize, advertiser_id: usize) -> f64 {
        self.predicted_bids[keyword_id][advertiser_id]
    }

    pub fn predicted_volume(&self, keyword_id: usize) -> usize {
        self.predicted_volumes[keyword_id]
    }
}

/// Move single queries between keywords `num_transfers` times
///
/// Each transfer takes one query from a keyword that still has some and gives it to a
/// different keyword in the pool. Keywords that drop to zero leave the pool, so volume
/// only flows between keywords that were observed. Stops early once fewer than two
/// keywords remain. The total volume is preserved.
fn shift_volumes(mut volumes: Vec<usize>, num_transfers: usize, rng: &mut StdRng) -> Vec<usize> {
    let mut pool: Vec<usize> = (0..volumes.len()).filter(|&k| volumes[k] > 0).collect();
    for _ in 0..num_transfers {
        if pool.len() < 2 {
            break;
        }
        let picked = index::sample(rng, pool.len(), 2);
        let (from_slot, to_slot) = (picked.index(0), picked.index(1));
        let (from, to) = (pool[from_slot], pool[to_slot]);
        volumes[from] -= 1;
        volumes[to] += 1;
        if volumes[from] == 0 {
            pool.swap_remove(from_slot);
        }
    }
    volumes
}
