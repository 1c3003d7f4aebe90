use rand::{rngs::StdRng, Rng};
use rand::distributions::WeightedIndex;
use rand_distr::Distribution;
use crate::config::QueryPattern;
use crate::errors::{AllocError, Result};

/// One arrival event for a keyword
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Query {
    /// Position in the query sequence
    pub query_id: usize,
    pub keyword_id: usize,
}

/// The fixed, ordered query sequence of one replication
#[derive(Debug, Clone, Default)]
pub struct Queries {
    pub queries: Vec<Query>,
}

impl Queries {
    /// Build a sequence from keyword ids in arrival order
    pub fn from_keyword_ids(keyword_ids: &[usize]) -> Self {
        let queries = keyword_ids.iter()
            .enumerate()
            .map(|(query_id, &keyword_id)| Query { query_id, keyword_id })
            .collect();
        Self { queries }
    }

    /// Sample `length` keyword arrivals over `num_keywords` keywords
    pub fn generate(num_keywords: usize, length: usize, pattern: QueryPattern, rng: &mut StdRng) -> Result<Self> {
        if num_keywords == 0 && length > 0 {
            return Err(AllocError::invalid_config("cannot draw queries without keywords"));
        }
        let mut keyword_ids = Vec::with_capacity(length);
        match pattern {
            QueryPattern::Uniform => {
                for _ in 0..length {
                    keyword_ids.push(rng.gen_range(0..num_keywords));
                }
            }
            QueryPattern::Skewed { exponent } => {
                let weights: Vec<f64> = (0..num_keywords)
                    .map(|k| 1.0 / ((k + 1) as f64).powf(exponent))
                    .collect();
                let popularity = WeightedIndex::new(&weights)
                    .map_err(|e| AllocError::invalid_config(format!("keyword popularity: {}", e)))?;
                for _ in 0..length {
                    keyword_ids.push(popularity.sample(rng));
                }
            }
        }
        Ok(Self::from_keyword_ids(&keyword_ids))
    }

    /// Number of arrivals per keyword
    pub fn keyword_counts(&self, num_keywords: usize) -> Vec<usize> {
        let mut counts = vec![0; num_keywords];
        for query in &self.queries {
            counts[query.keyword_id] += 1;
        }
        counts
    }

    pub fn len(&self) -> usize {
        self.queries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queries.is_empty()
    }
}
