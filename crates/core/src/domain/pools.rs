use serde::{Deserialize, Serialize};

use super::chains::ChainId;
use super::tokens::TokenId;
use crate::{Error, Result};

/// Pool identifier (contract address or program account)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PoolId(pub String);

impl PoolId {
    /// Creates a new pool identifier
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PoolId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PoolId {
    fn from(value: &str) -> Self {
        PoolId(value.to_string())
    }
}

/// Protocol generation of a pool
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ProtocolVersion {
    /// Constant-product pair (Uniswap V2 style)
    V2,

    /// Concentrated liquidity (Uniswap V3 style)
    V3,

    /// Stable-swap invariant pool
    Stable,
}

impl ProtocolVersion {
    /// Returns the version as a static string
    pub fn as_str(&self) -> &'static str {
        match self {
            ProtocolVersion::V2 => "v2",
            ProtocolVersion::V3 => "v3",
            ProtocolVersion::Stable => "stable",
        }
    }
}

/// Represents a liquidity pool
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pool {
    /// Pool identifier
    pub id: PoolId,

    /// Chain the pool lives on
    pub chain: ChainId,

    /// DEX venue name (e.g., "quickswap", "orca")
    pub dex: String,

    /// Protocol generation
    pub version: ProtocolVersion,

    /// First token of the pair
    pub token0: TokenId,

    /// Second token of the pair
    pub token1: TokenId,

    /// Reserve of token0, in normalized units
    pub reserve0: f64,

    /// Reserve of token1, in normalized units
    pub reserve1: f64,

    /// Pool fee as a percentage (0.3 = 0.3%)
    pub fee_pct: f64,

    /// Total pool liquidity in USD, used for impact and scoring
    pub liquidity_usd: f64,
}

impl Pool {
    /// Checks whether the pool carries the given token
    pub fn has_token(&self, token: &TokenId) -> bool {
        self.token0 == *token || self.token1 == *token
    }

    /// Returns the opposite side of the pair, if the token belongs to it
    pub fn other_side(&self, token: &TokenId) -> Option<&TokenId> {
        if self.token0 == *token {
            Some(&self.token1)
        } else if self.token1 == *token {
            Some(&self.token0)
        } else {
            None
        }
    }

    /// Spot exchange rate for swapping token_in into the other side
    pub fn base_rate(&self, token_in: &TokenId) -> Option<f64> {
        let (reserve_in, reserve_out) = if self.token0 == *token_in {
            (self.reserve0, self.reserve1)
        } else if self.token1 == *token_in {
            (self.reserve1, self.reserve0)
        } else {
            return None;
        };

        if reserve_in <= 0.0 {
            return None;
        }

        Some(reserve_out / reserve_in)
    }

    /// Structural sanity check applied before a pool enters the registry
    pub fn validate(&self) -> Result<()> {
        if self.id.as_str().is_empty() {
            return Err(Error::Validation("pool id is empty".into()));
        }
        if self.token0 == self.token1 {
            return Err(Error::Validation(format!(
                "pool {} pairs a token with itself",
                self.id
            )));
        }
        if self.reserve0 <= 0.0 || self.reserve1 <= 0.0 {
            return Err(Error::Validation(format!(
                "pool {} has empty reserves",
                self.id
            )));
        }
        if !(0.0..100.0).contains(&self.fee_pct) {
            return Err(Error::Validation(format!(
                "pool {} fee {}% out of range",
                self.id, self.fee_pct
            )));
        }
        if self.liquidity_usd <= 0.0 || !self.liquidity_usd.is_finite() {
            return Err(Error::Validation(format!(
                "pool {} has no usable liquidity",
                self.id
            )));
        }
        Ok(())
    }
}
