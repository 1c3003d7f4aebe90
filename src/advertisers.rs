/// Advertisers and their per-run budget state.
///
/// `Advertisers` is the immutable universe produced by the generator; `AdvertiserStates`
/// is the mutable copy a single simulation run spends from. Every run starts from a fresh
/// `AdvertiserStates`, so runs never share budget state.

/// A budget-constrained bidder
#[derive(Debug, Clone, PartialEq)]
pub struct Advertiser {
    pub advertiser_id: usize,
    pub advertiser_name: String,
    pub total_budget: f64,
}

/// Container for advertisers with methods to add advertisers
#[derive(Debug, Clone, Default)]
pub struct Advertisers {
    pub advertisers: Vec<Advertiser>,
}

impl Advertisers {
    pub fn new() -> Self {
        Self {
            advertisers: Vec::new(),
        }
    }

    /// Add an advertiser (ID is set to match Vec index)
    ///
    /// # Returns
    /// The advertiser_id of the just added advertiser
    pub fn add(&mut self, advertiser_name: String, total_budget: f64) -> usize {
        assert!(
            total_budget.is_finite() && total_budget >= 0.0,
            "Invalid budget {} for advertiser {}",
            total_budget,
            advertiser_name
        );
        let advertiser_id = self.advertisers.len();
        self.advertisers.push(Advertiser {
            advertiser_id,
            advertiser_name,
            total_budget,
        });
        advertiser_id
    }

    pub fn len(&self) -> usize {
        self.advertisers.len()
    }
}

/// Budget state of one advertiser during a run
///
/// Remaining budget is the stored quantity, so spent = total - remaining can never exceed total.
#[derive(Debug, Clone, PartialEq)]
pub struct AdvertiserState {
    pub total_budget: f64,
    remaining_budget: f64,
}

impl AdvertiserState {
    pub fn new(total_budget: f64) -> Self {
        Self {
            total_budget,
            remaining_budget: total_budget,
        }
    }

    pub fn remaining_budget(&self) -> f64 {
        self.remaining_budget
    }

    pub fn spent(&self) -> f64 {
        self.total_budget - self.remaining_budget
    }

    /// Fraction of the budget already spent; a zero budget counts as fully spent
    pub fn spent_fraction(&self) -> f64 {
        if self.total_budget <= 0.0 {
            return 1.0;
        }
        self.spent() / self.total_budget
    }

    /// Positive bid that fits into the remaining budget
    pub fn can_afford(&self, price: f64) -> bool {
        price > 0.0 && price <= self.remaining_budget
    }

    /// Charge `price` against the remaining budget
    ///
    /// Charging more than what remains means a policy proposed an infeasible allocation.
    pub fn charge(&mut self, price: f64) {
        assert!(
            price >= 0.0 && price <= self.remaining_budget,
            "Budget overrun: charge {} exceeds remaining budget {}",
            price,
            self.remaining_budget
        );
        self.remaining_budget = (self.remaining_budget - price).max(0.0);
    }
}

/// Per-run budget state for every advertiser, indexed by advertiser_id
#[derive(Debug, Clone)]
pub struct AdvertiserStates {
    pub states: Vec<AdvertiserState>,
}

impl AdvertiserStates {
    /// Fresh states at full budget
    pub fn new(advertisers: &Advertisers) -> Self {
        let states = advertisers.advertisers.iter()
            .map(|advertiser| AdvertiserState::new(advertiser.total_budget))
            .collect();
        Self { states }
    }

    pub fn get(&self, advertiser_id: usize) -> &AdvertiserState {
        &self.states[advertiser_id]
    }

    pub fn charge(&mut self, advertiser_id: usize, price: f64) {
        self.states[advertiser_id].charge(price);
    }

    pub fn total_spent(&self) -> f64 {
        self.states.iter().map(|s| s.spent()).sum()
    }
}
