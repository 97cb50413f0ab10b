pub mod estimator;
pub mod optimizer;
pub mod ranking;
pub mod search;

pub use estimator::{ConstantProductEstimator, SwapEstimator, SwapQuote};
pub use optimizer::RouteOptimizer;
pub use ranking::RouteRanker;
pub use search::RouteSearch;

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::{ChainId, PoolId, ProtocolVersion, TokenId};
use crate::oracle::GasPriority;

/// Route search and ranking tuning
#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// Longest pool path explored
    pub max_hops: usize,

    /// Aggregate price impact above which a route is discarded
    pub max_price_impact_pct: f64,

    /// Routes touching a pool thinner than this are discarded
    pub min_liquidity_usd: f64,

    /// Ranked routes returned per query
    pub max_routes: usize,

    /// Freshness window for cached swap quotes
    pub quote_ttl: Duration,

    /// Freshness window for cached gas and native-price quotes
    pub oracle_ttl: Duration,

    /// Priority lane used when quoting swap gas
    pub gas_priority: GasPriority,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            max_hops: 3,
            max_price_impact_pct: 5.0,
            min_liquidity_usd: 10_000.0,
            max_routes: 5,
            quote_ttl: Duration::from_secs(10),
            oracle_ttl: Duration::from_secs(15),
            gas_priority: GasPriority::Normal,
        }
    }
}

/// Route request.
///
/// Amounts are USD-denominated estimates throughout the router; the
/// estimator is an economic model, not execution-grade AMM math.
#[derive(Debug, Clone)]
pub struct RouteQuery {
    /// Chain to route on
    pub chain: ChainId,

    /// Token being sold
    pub token_in: TokenId,

    /// Token being bought
    pub token_out: TokenId,

    /// Input size in USD terms
    pub amount_usd: f64,

    /// Caller cap on returned routes; clamped to the configured maximum
    pub max_routes: Option<usize>,
}

/// One hop of a route
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteStep {
    /// Pool the hop swaps through
    pub pool: PoolId,

    /// DEX venue of the pool
    pub dex: String,

    /// Protocol generation of the pool
    pub version: ProtocolVersion,

    /// Token entering the hop
    pub token_in: TokenId,

    /// Token leaving the hop
    pub token_out: TokenId,

    /// Estimated input, USD terms
    pub amount_in: f64,

    /// Estimated output, USD terms
    pub amount_out: f64,

    /// Price impact of this hop, percent
    pub price_impact_pct: f64,

    /// Pool fee taken on this hop, USD
    pub fee_usd: f64,
}

/// Route produced by the search, before economic ranking
#[derive(Debug, Clone)]
pub struct CandidateRoute {
    /// Hops in order
    pub steps: Vec<RouteStep>,

    /// Input at the first hop, USD terms
    pub amount_in: f64,

    /// Output at the last hop, USD terms
    pub amount_out: f64,

    /// Sum of per-hop impacts, capped at 100
    pub total_price_impact_pct: f64,

    /// Sum of per-hop fees, USD
    pub total_fee_usd: f64,

    /// Thinnest pool liquidity on the path, USD
    pub min_liquidity_usd: f64,

    /// First-pass confidence from path shape alone
    pub confidence: f64,
}

impl CandidateRoute {
    /// Number of hops
    pub fn hops(&self) -> usize {
        self.steps.len()
    }

    /// DEX venues joined in path order; the deterministic tie-break key
    pub fn dex_path(&self) -> String {
        self.steps
            .iter()
            .map(|s| s.dex.as_str())
            .collect::<Vec<_>>()
            .join(">")
    }
}

/// Fully ranked route
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizedRoute {
    /// Chain the route executes on
    pub chain: ChainId,

    /// Hops in order
    pub steps: Vec<RouteStep>,

    /// Input at the first hop, USD terms
    pub amount_in: f64,

    /// Output at the last hop, USD terms
    pub amount_out: f64,

    /// Sum of per-hop impacts, capped at 100
    pub total_price_impact_pct: f64,

    /// Sum of per-hop fees, USD
    pub total_fee_usd: f64,

    /// Thinnest pool liquidity on the path, USD
    pub min_liquidity_usd: f64,

    /// Gas units for the whole route transaction
    pub gas_estimate: u64,

    /// Gas cost in USD at quoted prices
    pub gas_cost_usd: f64,

    /// Expected slippage, percent
    pub expected_slippage_pct: f64,

    /// Confidence in execution, 0-100
    pub confidence: f64,

    /// Economic ranking score
    pub efficiency_score: f64,

    /// Rough wall-clock estimate to confirmation, milliseconds
    pub estimated_time_ms: u64,
}

impl OptimizedRoute {
    /// Number of hops
    pub fn hops(&self) -> usize {
        self.steps.len()
    }

    /// DEX venues joined in path order
    pub fn dex_path(&self) -> String {
        self.steps
            .iter()
            .map(|s| s.dex.as_str())
            .collect::<Vec<_>>()
            .join(">")
    }

    /// Output value net of gas and fees, USD
    pub fn net_value_usd(&self) -> f64 {
        self.amount_out - self.gas_cost_usd - self.total_fee_usd
    }
}

/// Why a search produced no candidates
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NoRouteReason {
    /// The registry returned no pools for the chain
    NoPools,

    /// One side of the pair appears in no pool
    TokenNotListed,

    /// No pool path connects the pair within the hop limit
    NoPathWithinHopLimit,

    /// Candidates existed but every one was filtered before ranking
    AllFiltered {
        /// Dropped for exceeding the price impact cap
        price_impact: usize,

        /// Dropped for touching a pool below the liquidity floor
        thin_liquidity: usize,

        /// Dropped for a non-positive net output
        unprofitable: usize,
    },
}

impl NoRouteReason {
    /// Human-readable explanation for logs and callers
    pub fn describe(&self) -> String {
        match self {
            NoRouteReason::NoPools => "no pools available on this chain".to_string(),
            NoRouteReason::TokenNotListed => "token pair not listed in any pool".to_string(),
            NoRouteReason::NoPathWithinHopLimit => {
                "no liquidity path within the hop limit".to_string()
            }
            NoRouteReason::AllFiltered {
                price_impact,
                thin_liquidity,
                unprofitable,
            } => format!(
                "all candidates filtered: {} over impact cap, {} under liquidity floor, {} unprofitable",
                price_impact, thin_liquidity, unprofitable
            ),
        }
    }
}

/// Result of a route query.
///
/// An empty market is a successful empty discovery with a reason, never
/// an error.
#[derive(Debug, Clone)]
pub struct RouteDiscovery {
    /// Ranked routes, best first, truncated to the requested cap
    pub routes: Vec<OptimizedRoute>,

    /// Candidates the search produced before filtering
    pub candidates_considered: usize,

    /// Set when no routes survived, explaining why
    pub empty_reason: Option<NoRouteReason>,
}

impl RouteDiscovery {
    /// The top-ranked route, if any survived
    pub fn best(&self) -> Option<&OptimizedRoute> {
        self.routes.first()
    }
}
