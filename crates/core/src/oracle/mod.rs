use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::{ChainFamily, ChainId};
use crate::settlement::{FeeCollectionRecord, SettlementBatch};
use crate::Result;

/// Kind of transaction a gas quote is requested for
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum GasOperation {
    /// A routed swap transaction
    Swap,

    /// A fee settlement batch transaction
    Settlement,
}

/// Priority lane for a gas quote
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum GasPriority {
    Low,
    Normal,
    High,
}

/// Gas quote for one transaction on one chain
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct GasQuote {
    /// Gas units the transaction is expected to consume
    pub gas_limit: u64,

    /// Price per gas unit, denominated in the chain's native token
    pub gas_price_native: f64,
}

impl GasQuote {
    /// Total cost of the quoted transaction in native units
    pub fn cost_native(&self) -> f64 {
        self.gas_limit as f64 * self.gas_price_native
    }
}

/// Result of submitting a settlement transaction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionReceipt {
    /// Whether the transaction landed successfully
    pub success: bool,

    /// Hash of the submitted transaction, when one was produced
    pub transaction_hash: Option<String>,

    /// Gas actually consumed, when known
    pub gas_used: Option<u64>,

    /// Failure detail reported by the chain, when unsuccessful
    pub error: Option<String>,
}

impl SubmissionReceipt {
    /// Creates a success receipt
    pub fn confirmed(transaction_hash: impl Into<String>, gas_used: u64) -> Self {
        Self {
            success: true,
            transaction_hash: Some(transaction_hash.into()),
            gas_used: Some(gas_used),
            error: None,
        }
    }

    /// Creates a failure receipt
    pub fn rejected(error: impl Into<String>) -> Self {
        Self {
            success: false,
            transaction_hash: None,
            gas_used: None,
            error: Some(error.into()),
        }
    }
}

/// Gas estimation collaborator.
///
/// Implementations answer with current network conditions; callers reach
/// them only through the resilience layer and cache quotes with short TTLs.
#[async_trait]
pub trait GasOracle: Send + Sync {
    /// Quotes gas for one operation on one chain at the given priority
    async fn estimate(
        &self,
        chain: ChainId,
        operation: GasOperation,
        priority: GasPriority,
    ) -> Result<GasQuote>;
}

/// Native-token USD price collaborator
#[async_trait]
pub trait NativePriceOracle: Send + Sync {
    /// Current USD price of the chain's native token
    async fn native_price_usd(&self, chain: ChainId) -> Result<f64>;
}

/// Chain-family-specific settlement transaction submitter
#[async_trait]
pub trait SettlementSubmitter: Send + Sync {
    /// The execution family this submitter serves
    fn family(&self) -> ChainFamily;

    /// Builds and submits the settlement transaction for a batch
    async fn submit(
        &self,
        batch: &SettlementBatch,
        records: &[FeeCollectionRecord],
    ) -> Result<SubmissionReceipt>;
}
