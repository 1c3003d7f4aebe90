/// An auctionable keyword with one bid per advertiser (0 = does not bid)
#[derive(Debug, Clone, PartialEq)]
pub struct Keyword {
    pub keyword_id: usize,
    pub keyword_name: String,
    /// Indexed by advertiser_id
    pub bids: Vec<f64>,
}

/// Container for keywords; together they form the keyword × advertiser bid matrix
#[derive(Debug, Clone, Default)]
pub struct Keywords {
    pub keywords: Vec<Keyword>,
}

impl Keywords {
    pub fn new() -> Self {
        Self {
            keywords: Vec::new(),
        }
    }

    /// Add a keyword (ID is set to match Vec index)
    ///
    /// # Returns
    /// The keyword_id of the just added keyword
    pub fn add(&mut self, keyword_name: String, bids: Vec<f64>) -> usize {
        if let Some(bad) = bids.iter().find(|b| !b.is_finite() || **b < 0.0) {
            panic!("Invalid bid {} for keyword {}", bad, keyword_name);
        }
        let keyword_id = self.keywords.len();
        self.keywords.push(Keyword {
            keyword_id,
            keyword_name,
            bids,
        });
        keyword_id
    }

    pub fn bid(&self, keyword_id: usize, advertiser_id: usize) -> f64 {
        self.keywords[keyword_id].bids[advertiser_id]
    }

    pub fn len(&self) -> usize {
        self.keywords.len()
    }

    /// Highest bid any advertiser places on this keyword
    pub fn max_bid(&self, keyword_id: usize) -> f64 {
        self.keywords[keyword_id].bids.iter().cloned().fold(0.0, f64::max)
    }

    /// Bid matrix as plain rows, keyword-major
    pub fn bid_matrix(&self) -> Vec<Vec<f64>> {
        self.keywords.iter().map(|k| k.bids.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_and_lookup() {
        let mut keywords = Keywords::new();
        assert_eq!(keywords.add("k1".to_string(), vec![11.0, 1.0]), 0);
        assert_eq!(keywords.add("k2".to_string(), vec![1.0, 10.0]), 1);
        assert_eq!(keywords.bid(1, 1), 10.0);
        assert_eq!(keywords.max_bid(0), 11.0);
        assert_eq!(keywords.bid_matrix(), vec![vec![11.0, 1.0], vec![1.0, 10.0]]);
    }

    #[test]
    fn test_max_bid_of_unbid_keyword_is_zero() {
        let mut keywords = Keywords::new();
        keywords.add("k1".to_string(), vec![0.0, 0.0]);
        assert_eq!(keywords.max_bid(0), 0.0);
    }

    #[test]
    #[should_panic(expected = "Invalid bid")]
    fn test_negative_bid_panics() {
        let mut keywords = Keywords::new();
        keywords.add("k1".to_string(), vec![1.0, -2.0]);
    }
}
