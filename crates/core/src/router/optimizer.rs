use std::sync::Arc;

use tracing::info;

use super::estimator::{ConstantProductEstimator, SwapEstimator};
use super::ranking::RouteRanker;
use super::search::RouteSearch;
use super::{NoRouteReason, RouteDiscovery, RouteQuery, RouterConfig};
use crate::oracle::{GasOracle, NativePriceOracle};
use crate::registry::PoolRegistry;
use crate::resilience::Resilience;
use crate::{Error, Result};

/// Full route pipeline: registry lookup, path search, economic ranking.
///
/// A query that finds nothing is a successful empty discovery carrying a
/// structured reason; errors are reserved for invalid requests and
/// collaborator failures that survive the resilience layer.
pub struct RouteOptimizer {
    registry: Arc<PoolRegistry>,
    search: RouteSearch,
    ranker: RouteRanker,
    config: RouterConfig,
}

impl RouteOptimizer {
    /// Creates an optimizer with the built-in constant-product estimator
    pub fn new(
        registry: Arc<PoolRegistry>,
        gas_oracle: Arc<dyn GasOracle>,
        price_oracle: Arc<dyn NativePriceOracle>,
        resilience: Arc<Resilience>,
        config: RouterConfig,
    ) -> Self {
        let estimator = Arc::new(ConstantProductEstimator::new(
            config.max_price_impact_pct,
            config.quote_ttl,
        ));
        Self::with_estimator(registry, gas_oracle, price_oracle, resilience, config, estimator)
    }

    /// Creates an optimizer over a caller-supplied estimator
    pub fn with_estimator(
        registry: Arc<PoolRegistry>,
        gas_oracle: Arc<dyn GasOracle>,
        price_oracle: Arc<dyn NativePriceOracle>,
        resilience: Arc<Resilience>,
        config: RouterConfig,
        estimator: Arc<dyn SwapEstimator>,
    ) -> Self {
        let search = RouteSearch::new(estimator, config.max_hops);
        let ranker = RouteRanker::new(gas_oracle, price_oracle, resilience, config.clone());
        Self {
            registry,
            search,
            ranker,
            config,
        }
    }

    /// Finds and ranks routes for a query, best first
    pub async fn find_optimal_routes(&self, query: &RouteQuery) -> Result<RouteDiscovery> {
        self.validate(query)?;

        let pools = self.registry.pools(query.chain).await?;
        let searched =
            self.search
                .find_candidates(&pools, &query.token_in, &query.token_out, query.amount_usd);

        if let Some(reason) = searched.empty_reason {
            info!(
                "No routes for {}->{} on {}: {}",
                query.token_in,
                query.token_out,
                query.chain,
                reason.describe()
            );
            return Ok(RouteDiscovery {
                routes: Vec::new(),
                candidates_considered: 0,
                empty_reason: Some(reason),
            });
        }

        let candidates_considered = searched.candidates.len();
        let ranked = self.ranker.rank(query.chain, searched.candidates).await?;

        let cap = query
            .max_routes
            .unwrap_or(self.config.max_routes)
            .min(self.config.max_routes);
        let mut routes = ranked.routes;
        routes.truncate(cap);

        let empty_reason = if routes.is_empty() {
            Some(NoRouteReason::AllFiltered {
                price_impact: ranked.filtered.price_impact,
                thin_liquidity: ranked.filtered.thin_liquidity,
                unprofitable: ranked.filtered.unprofitable,
            })
        } else {
            None
        };

        info!(
            "Found {} routes for {}->{} on {} ({} candidates considered)",
            routes.len(),
            query.token_in,
            query.token_out,
            query.chain,
            candidates_considered
        );
        Ok(RouteDiscovery {
            routes,
            candidates_considered,
            empty_reason,
        })
    }

    fn validate(&self, query: &RouteQuery) -> Result<()> {
        if query.token_in == query.token_out {
            return Err(Error::InvalidRequest(format!(
                "cannot route {} to itself",
                query.token_in
            )));
        }
        if !query.amount_usd.is_finite() || query.amount_usd <= 0.0 {
            return Err(Error::InvalidRequest(format!(
                "amount must be positive, got {}",
                query.amount_usd
            )));
        }
        if query.max_routes == Some(0) {
            return Err(Error::InvalidRequest(
                "max_routes must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
