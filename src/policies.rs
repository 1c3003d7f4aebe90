/// Online allocation policies.
///
/// All three policies share one eligibility rule: an advertiser can take a query when its
/// true bid on the query's keyword is positive and fits into its remaining budget. The
/// price is always that true bid (first price), so any eligible choice is budget-feasible.
///
/// - Optimistic: highest *predicted* bid among eligible advertisers. With the volume cap or
///   the offline plan it may instead hold the query back, reserving budget for predicted
///   demand.
/// - Pessimistic: highest `bid × φ(spent fraction)`, which steers queries away from
///   advertisers that already spent most of their budget.
/// - Balanced: follows the optimistic proposal only while its tradeoff score stays above
///   `α / (1 + α)` of the pessimistic score. A held-back query is scored by the candidate
///   whose budget it protects, so small α reproduces Optimistic in every mode.

use crate::advertisers::AdvertiserStates;
use crate::config::PolicyConfig;
use crate::forecast::Forecast;
use crate::keywords::Keywords;
use crate::plan::OfflinePlan;
use crate::queries::Query;

/// Which candidate a decision followed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecisionSource {
    Optimistic,
    Pessimistic,
}

/// Outcome of one allocation decision
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Decision {
    Assigned {
        advertiser_id: usize,
        price: f64,
        source: DecisionSource,
    },
    Unassigned,
}

impl Decision {
    pub fn price(&self) -> f64 {
        match self {
            Decision::Assigned { price, .. } => *price,
            Decision::Unassigned => 0.0,
        }
    }

    pub fn advertiser_id(&self) -> Option<usize> {
        match self {
            Decision::Assigned { advertiser_id, .. } => Some(*advertiser_id),
            Decision::Unassigned => None,
        }
    }
}

/// Everything a policy may look at for one query, apart from budget state
pub struct QueryContext<'a> {
    pub query: &'a Query,
    pub keywords: &'a Keywords,
    pub forecast: &'a Forecast,
    /// Arrivals of the same keyword earlier in the sequence
    pub prior_arrivals: usize,
    /// Remaining offline quotas, when the plan is in use
    pub plan: Option<&'a OfflinePlan>,
}

/// Tradeoff function φ(f) = 1 - exp(s·(f - 1)) over the spent fraction f
/// Falls from 1 - e^-s at an untouched budget to 0 at an exhausted one
pub fn tradeoff(spent_fraction: f64, shape: f64) -> f64 {
    1.0 - (shape * (spent_fraction - 1.0)).exp()
}

/// A candidate advertiser proposed by one side of the policy
#[derive(Debug, Clone, Copy, PartialEq)]
struct Candidate {
    advertiser_id: usize,
    bid: f64,
    /// bid × φ(spent fraction)
    score: f64,
}

/// What the optimistic side wants done with a query
#[derive(Debug, Clone, Copy, PartialEq)]
enum Proposal {
    Assign(Candidate),
    /// Leave the query unassigned; the candidate is the best eligible advertiser whose budget this protects
    Reserve(Candidate),
    /// Nobody is eligible
    Nobody,
}

/// Allocation policy; a closed set of variants behind one `decide`
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Policy {
    Optimistic,
    Pessimistic,
    Balanced { alpha: f64 },
}

impl Policy {
    pub fn name(&self) -> &'static str {
        match self {
            Policy::Optimistic => "optimistic",
            Policy::Pessimistic => "pessimistic",
            Policy::Balanced { .. } => "balanced",
        }
    }

    /// Balance parameter, for the policies that have one
    pub fn alpha(&self) -> Option<f64> {
        match self {
            Policy::Balanced { alpha } => Some(*alpha),
            _ => None,
        }
    }

    /// Short label used in log file names, e.g. `balanced-a2`
    pub fn label(&self) -> String {
        match self {
            Policy::Balanced { alpha } => format!("balanced-a{}", alpha),
            _ => self.name().to_string(),
        }
    }

    /// Choose an advertiser for the query in `context` given current budget state
    /// Never mutates state; the caller charges the returned price and consumes plan quota
    pub fn decide(&self, context: &QueryContext, states: &AdvertiserStates, params: &PolicyConfig) -> Decision {
        match self {
            Policy::Optimistic => match optimistic_proposal(context, states, params) {
                Proposal::Assign(c) => assigned(c, DecisionSource::Optimistic),
                Proposal::Reserve(_) | Proposal::Nobody => Decision::Unassigned,
            },
            Policy::Pessimistic => match pessimistic_candidate(context, states, params) {
                Some(c) => assigned(c, DecisionSource::Pessimistic),
                None => Decision::Unassigned,
            },
            Policy::Balanced { alpha } => {
                // Both sides share the eligibility rule, so no pessimistic candidate means nobody is eligible
                let pessimistic = match pessimistic_candidate(context, states, params) {
                    Some(c) => c,
                    None => return Decision::Unassigned,
                };
                let threshold = balance_threshold(*alpha) * pessimistic.score;
                match optimistic_proposal(context, states, params) {
                    Proposal::Assign(o) if o.score > threshold => assigned(o, DecisionSource::Optimistic),
                    Proposal::Reserve(r) if r.score > threshold => Decision::Unassigned,
                    _ => assigned(pessimistic, DecisionSource::Pessimistic),
                }
            }
        }
    }
}

/// Fraction of the pessimistic score the optimistic proposal has to beat: α / (1 + α)
/// 0 at α = 0 (always optimistic), 1 at α = ∞ (never strictly above the best pessimistic score)
fn balance_threshold(alpha: f64) -> f64 {
    if alpha.is_infinite() {
        1.0
    } else {
        alpha / (1.0 + alpha)
    }
}

fn assigned(candidate: Candidate, source: DecisionSource) -> Decision {
    Decision::Assigned {
        advertiser_id: candidate.advertiser_id,
        price: candidate.bid,
        source,
    }
}

/// Eligible advertisers for the query with their true bids and tradeoff scores, in id order
fn eligible<'a>(context: &'a QueryContext<'a>, states: &'a AdvertiserStates, params: &'a PolicyConfig) -> impl Iterator<Item = Candidate> + 'a {
    let keyword_id = context.query.keyword_id;
    states.states.iter().enumerate().filter_map(move |(advertiser_id, state)| {
        let bid = context.keywords.bid(keyword_id, advertiser_id);
        if !state.can_afford(bid) {
            return None;
        }
        Some(Candidate {
            advertiser_id,
            bid,
            score: bid * tradeoff(state.spent_fraction(), params.tradeoff_shape),
        })
    })
}

/// Highest predicted bid among `candidates`; ties go to the lowest id
fn highest_predicted(context: &QueryContext, candidates: impl Iterator<Item = Candidate>) -> Option<Candidate> {
    let keyword_id = context.query.keyword_id;
    let mut best: Option<(Candidate, f64)> = None;
    for candidate in candidates {
        let predicted = context.forecast.predicted_bid(keyword_id, candidate.advertiser_id);
        match best {
            Some((_, best_predicted)) if predicted <= best_predicted => {}
            _ => best = Some((candidate, predicted)),
        }
    }
    best.map(|(candidate, _)| candidate)
}

/// Optimistic proposal: highest predicted bid, restricted by the volume cap and the plan quotas
fn optimistic_proposal(context: &QueryContext, states: &AdvertiserStates, params: &PolicyConfig) -> Proposal {
    let keyword_id = context.query.keyword_id;
    let best = match highest_predicted(context, eligible(context, states, params)) {
        Some(c) => c,
        None => return Proposal::Nobody,
    };
    if params.cap_by_forecast_volume && context.prior_arrivals >= context.forecast.predicted_volume(keyword_id) {
        return Proposal::Reserve(best);
    }
    match context.plan {
        Some(plan) => {
            let planned = eligible(context, states, params).filter(|c| plan.quota(keyword_id, c.advertiser_id) > 0);
            match highest_predicted(context, planned) {
                Some(c) => Proposal::Assign(c),
                None => Proposal::Reserve(best),
            }
        }
        None => Proposal::Assign(best),
    }
}

/// Highest bid × φ(spent fraction) among eligible advertisers; ties go to the lowest id
fn pessimistic_candidate(context: &QueryContext, states: &AdvertiserStates, params: &PolicyConfig) -> Option<Candidate> {
    let mut best: Option<Candidate> = None;
    for candidate in eligible(context, states, params) {
        match best {
            Some(b) if candidate.score <= b.score => {}
            _ => best = Some(candidate),
        }
    }
    best
}
