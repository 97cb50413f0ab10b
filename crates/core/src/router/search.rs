use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use super::estimator::SwapEstimator;
use super::{CandidateRoute, NoRouteReason, RouteStep};
use crate::domain::{Pool, TokenId};

/// Search result: candidates, or a structured reason why there are none
#[derive(Debug)]
pub struct SearchOutcome {
    /// Every viable candidate found, unranked
    pub candidates: Vec<CandidateRoute>,

    /// Set when `candidates` is empty, explaining why
    pub empty_reason: Option<NoRouteReason>,
}

/// Bounded-depth path search over the pool graph.
///
/// Enumerates pool paths from token_in to token_out with an explicit
/// stack: depth is capped at max_hops, a token never repeats within a
/// path, and every pool for an ordered pair is explored so parallel pools
/// produce distinct candidates. Each hop's estimated output feeds the
/// next hop's input.
pub struct RouteSearch {
    estimator: Arc<dyn SwapEstimator>,
    max_hops: usize,
    hop_confidence_penalty: f64,
    impact_confidence_weight: f64,
}

impl RouteSearch {
    /// Creates a search over the given estimator
    pub fn new(estimator: Arc<dyn SwapEstimator>, max_hops: usize) -> Self {
        Self {
            estimator,
            max_hops,
            hop_confidence_penalty: 8.0,
            impact_confidence_weight: 2.5,
        }
    }

    /// Finds every candidate route for the pair within the hop limit
    pub fn find_candidates(
        &self,
        pools: &[Pool],
        token_in: &TokenId,
        token_out: &TokenId,
        amount_in: f64,
    ) -> SearchOutcome {
        if pools.is_empty() {
            return SearchOutcome {
                candidates: Vec::new(),
                empty_reason: Some(NoRouteReason::NoPools),
            };
        }

        let adjacency = build_adjacency(pools);
        if !adjacency.contains_key(token_in) || !adjacency.contains_key(token_out) {
            return SearchOutcome {
                candidates: Vec::new(),
                empty_reason: Some(NoRouteReason::TokenNotListed),
            };
        }

        let mut candidates = Vec::new();
        // Each frame: token reached, pool indices walked, tokens visited
        let mut stack: Vec<(TokenId, Vec<usize>, Vec<TokenId>)> =
            vec![(token_in.clone(), Vec::new(), vec![token_in.clone()])];

        while let Some((current, pool_path, token_path)) = stack.pop() {
            if current == *token_out {
                if let Some(candidate) =
                    self.evaluate_path(pools, &pool_path, &token_path, amount_in)
                {
                    candidates.push(candidate);
                }
                continue;
            }
            if pool_path.len() == self.max_hops {
                continue;
            }

            if let Some(pool_indices) = adjacency.get(&current) {
                for &idx in pool_indices {
                    let pool = &pools[idx];
                    let next = match pool.other_side(&current) {
                        Some(next) => next,
                        None => continue,
                    };
                    // Cycle guard: a token never repeats within a path
                    if token_path.contains(next) {
                        continue;
                    }

                    let mut next_pools = pool_path.clone();
                    next_pools.push(idx);
                    let mut next_tokens = token_path.clone();
                    next_tokens.push(next.clone());
                    stack.push((next.clone(), next_pools, next_tokens));
                }
            }
        }

        let empty_reason = if candidates.is_empty() {
            Some(NoRouteReason::NoPathWithinHopLimit)
        } else {
            None
        };
        SearchOutcome {
            candidates,
            empty_reason,
        }
    }

    /// Quotes every hop of a path, chaining outputs into inputs
    fn evaluate_path(
        &self,
        pools: &[Pool],
        pool_path: &[usize],
        token_path: &[TokenId],
        amount_in: f64,
    ) -> Option<CandidateRoute> {
        if pool_path.is_empty() {
            return None;
        }

        let mut steps = Vec::with_capacity(pool_path.len());
        let mut current_amount = amount_in;
        let mut total_impact = 0.0;
        let mut total_fee = 0.0;
        let mut min_liquidity = f64::INFINITY;

        for (i, &idx) in pool_path.iter().enumerate() {
            let pool = &pools[idx];
            let hop_in = &token_path[i];
            let hop_out = &token_path[i + 1];

            let quote = match self.estimator.estimate(pool, hop_in, current_amount) {
                Ok(quote) => quote,
                Err(err) => {
                    debug!("Dropping path at pool {}: {}", pool.id, err);
                    return None;
                }
            };
            if quote.amount_out <= 0.0 {
                return None;
            }

            steps.push(RouteStep {
                pool: pool.id.clone(),
                dex: pool.dex.clone(),
                version: pool.version,
                token_in: hop_in.clone(),
                token_out: hop_out.clone(),
                amount_in: current_amount,
                amount_out: quote.amount_out,
                price_impact_pct: quote.price_impact_pct,
                fee_usd: quote.fee_usd,
            });

            total_impact += quote.price_impact_pct;
            total_fee += quote.fee_usd;
            min_liquidity = min_liquidity.min(pool.liquidity_usd);
            current_amount = quote.amount_out;
        }

        let total_impact = total_impact.min(100.0);
        let confidence = (100.0
            - self.hop_confidence_penalty * (steps.len() as f64 - 1.0)
            - self.impact_confidence_weight * total_impact)
            .clamp(0.0, 100.0);

        Some(CandidateRoute {
            steps,
            amount_in,
            amount_out: current_amount,
            total_price_impact_pct: total_impact,
            total_fee_usd: total_fee,
            min_liquidity_usd: min_liquidity,
            confidence,
        })
    }
}

/// Token adjacency index: token -> indices of pools carrying it
fn build_adjacency(pools: &[Pool]) -> HashMap<TokenId, Vec<usize>> {
    let mut adjacency: HashMap<TokenId, Vec<usize>> = HashMap::new();
    for (idx, pool) in pools.iter().enumerate() {
        adjacency.entry(pool.token0.clone()).or_default().push(idx);
        adjacency.entry(pool.token1.clone()).or_default().push(idx);
    }
    adjacency
}
