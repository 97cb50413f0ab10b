pub mod collector;

pub use collector::FeeCollector;

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{ChainId, TokenId};
use crate::oracle::GasPriority;
use crate::{Error, Result};

/// Unique identifier for a fee collection record
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordId(pub String);

impl RecordId {
    /// Creates a record id from any string-like value
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a settlement batch
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BatchId(pub String);

impl BatchId {
    /// Creates a batch id from any string-like value
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle of a fee collection record.
///
/// A record inside an in-flight batch stays `Pending` with its
/// `settlement_batch` reference set; batch membership is not a status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FeeStatus {
    /// Recorded and awaiting settlement
    Pending,

    /// Settled on-chain
    Collected,

    /// Gave up after exhausting settlement attempts
    Failed,

    /// Returned to the user by an operator
    Refunded,
}

impl FeeStatus {
    /// Returns the status as a lowercase string
    pub fn as_str(&self) -> &'static str {
        match self {
            FeeStatus::Pending => "pending",
            FeeStatus::Collected => "collected",
            FeeStatus::Failed => "failed",
            FeeStatus::Refunded => "refunded",
        }
    }

    /// Whether the record can no longer change state
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            FeeStatus::Collected | FeeStatus::Failed | FeeStatus::Refunded
        )
    }
}

impl fmt::Display for FeeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Lifecycle of a settlement batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BatchStatus {
    /// Created and awaiting submission
    Pending,

    /// Submission in flight
    Processing,

    /// Confirmed on-chain
    Completed,

    /// Submission failed; member records were released
    Failed,
}

impl BatchStatus {
    /// Returns the status as a lowercase string
    pub fn as_str(&self) -> &'static str {
        match self {
            BatchStatus::Pending => "pending",
            BatchStatus::Processing => "processing",
            BatchStatus::Completed => "completed",
            BatchStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A fee observed at swap time, before it enters the ledger
#[derive(Debug, Clone)]
pub struct NewFee {
    /// Swap transaction the fee was charged on
    pub tx_hash: String,

    /// User the fee was charged to
    pub user_address: String,

    /// Venue the swap executed on
    pub dex: String,

    /// Chain the fee is owed on
    pub chain: ChainId,

    /// Token the fee is denominated in
    pub token: TokenId,

    /// Fee amount in the chain's native unit
    pub amount_native: f64,

    /// Fee amount in USD terms
    pub amount_usd: f64,
}

impl NewFee {
    /// Validates the fee before it is admitted to the ledger
    pub fn validate(&self) -> Result<()> {
        if self.tx_hash.trim().is_empty() {
            return Err(Error::Validation("fee is missing a transaction hash".into()));
        }
        if self.user_address.trim().is_empty() {
            return Err(Error::Validation("fee is missing a user address".into()));
        }
        if self.dex.trim().is_empty() {
            return Err(Error::Validation("fee is missing a DEX name".into()));
        }
        if !self.amount_native.is_finite() || self.amount_native <= 0.0 {
            return Err(Error::Validation(format!(
                "native fee amount must be positive, got {}",
                self.amount_native
            )));
        }
        if !self.amount_usd.is_finite() || self.amount_usd <= 0.0 {
            return Err(Error::Validation(format!(
                "USD fee amount must be positive, got {}",
                self.amount_usd
            )));
        }
        Ok(())
    }
}

/// One fee owed to the aggregator, tracked from swap to settlement
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeeCollectionRecord {
    /// Ledger identifier
    pub id: RecordId,

    /// Chain the fee is owed on
    pub chain: ChainId,

    /// Venue the originating swap executed on
    pub dex: String,

    /// Swap transaction the fee was charged on
    pub tx_hash: String,

    /// User the fee was charged to
    pub user_address: String,

    /// Token the fee is denominated in
    pub token: TokenId,

    /// Fee amount in the chain's native unit
    pub amount_native: f64,

    /// Fee amount in USD terms
    pub amount_usd: f64,

    /// Current lifecycle state
    pub status: FeeStatus,

    /// Settlement attempts consumed so far
    pub attempts: u32,

    /// When the fee entered the ledger
    pub created_at: DateTime<Utc>,

    /// When the fee was settled, if it was
    pub collected_at: Option<DateTime<Utc>>,

    /// Gas consumed by the settling transaction, prorated
    pub gas_used: Option<u64>,

    /// USD gas cost attributed to this record, prorated by value
    pub gas_cost_usd: Option<f64>,

    /// Batch currently carrying this record, if any
    pub settlement_batch: Option<BatchId>,
}

impl FeeCollectionRecord {
    /// Seconds since the fee entered the ledger
    pub fn age_secs(&self) -> i64 {
        (Utc::now() - self.created_at).num_seconds()
    }

    /// Whether the record is inside an in-flight batch
    pub fn in_batch(&self) -> bool {
        self.settlement_batch.is_some()
    }
}

/// A group of fee records settled in one on-chain transaction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettlementBatch {
    /// Batch identifier
    pub id: BatchId,

    /// Chain the batch settles on
    pub chain: ChainId,

    /// Member records, in queue order
    pub records: Vec<RecordId>,

    /// Sum of member amounts in the chain's native unit
    pub total_native: f64,

    /// Sum of member amounts in USD terms
    pub total_usd: f64,

    /// Current lifecycle state
    pub status: BatchStatus,

    /// Estimated gas for the settlement transaction
    pub gas_estimate: u64,

    /// Estimated USD cost of that gas
    pub gas_cost_usd: f64,

    /// Net value retained after gas, as a percentage of value
    pub profitability_pct: f64,

    /// When the batch was created
    pub created_at: DateTime<Utc>,

    /// When the batch reached a terminal state
    pub completed_at: Option<DateTime<Utc>>,

    /// Settlement transaction hash, once submitted successfully
    pub transaction_hash: Option<String>,
}

impl SettlementBatch {
    /// Number of member records
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the batch has no members
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Fee collection tuning
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    /// Records per batch; reaching this count triggers creation
    pub batch_size: usize,

    /// Minimum batch value considered worth settling, in USD
    pub min_batch_value_usd: f64,

    /// Pending value at `min_batch_value_usd` times this triggers early
    /// batch creation
    pub value_trigger_multiplier: f64,

    /// Pending fees older than this are swept into a batch regardless of
    /// count or value
    pub max_batch_delay: Duration,

    /// Batches below this profitability are deferred, not settled
    pub profitability_threshold_pct: f64,

    /// Batches at or above this profitability settle immediately on
    /// creation
    pub immediate_profitability_pct: f64,

    /// Settlement attempts before a record is terminally failed
    pub retry_attempts: u32,

    /// Incremental gas per record in a settlement transaction
    pub per_record_gas: u64,

    /// Priority lane used when quoting settlement gas
    pub gas_priority: GasPriority,

    /// Freshness window for cached gas and native-price quotes
    pub oracle_ttl: Duration,

    /// Pending backlog per chain that degrades health
    pub degraded_backlog: usize,

    /// Pending backlog per chain that makes health critical
    pub critical_backlog: usize,

    /// Oldest pending age per chain that degrades health
    pub degraded_age: Duration,

    /// Oldest pending age per chain that makes health critical
    pub critical_age: Duration,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            batch_size: 50,
            min_batch_value_usd: 500.0,
            value_trigger_multiplier: 2.0,
            max_batch_delay: Duration::from_secs(300),
            profitability_threshold_pct: 5.0,
            immediate_profitability_pct: 15.0,
            retry_attempts: 3,
            per_record_gas: 25_000,
            gas_priority: GasPriority::Normal,
            oracle_ttl: Duration::from_secs(15),
            degraded_backlog: 100,
            critical_backlog: 500,
            degraded_age: Duration::from_secs(600),
            critical_age: Duration::from_secs(1_800),
        }
    }
}

/// Counters for one chain's fee activity
#[derive(Debug, Clone, Default, Serialize)]
pub struct NetworkStats {
    /// Fees admitted to the ledger
    pub records_recorded: u64,

    /// Fees settled on-chain
    pub records_collected: u64,

    /// Fees terminally failed
    pub records_failed: u64,

    /// Batches confirmed on-chain
    pub batches_completed: u64,

    /// Batches whose submission failed
    pub batches_failed: u64,

    /// USD value admitted to the ledger
    pub fees_recorded_usd: f64,

    /// USD value settled on-chain
    pub fees_collected_usd: f64,

    /// USD spent on settlement gas
    pub gas_spent_usd: f64,
}

/// Ledger-wide counters, overall and per chain
#[derive(Debug, Clone, Serialize)]
pub struct CollectorStats {
    /// Totals across every chain
    pub overall: NetworkStats,

    /// Per-chain totals
    pub by_network: BTreeMap<ChainId, NetworkStats>,

    /// Pending queue depth per chain
    pub pending_counts: BTreeMap<ChainId, usize>,

    /// Batches currently pending or in flight
    pub active_batches: usize,
}

/// Coarse collector health, ordered least to most severe
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum HealthLevel {
    /// Backlogs and ages are within limits
    Healthy,

    /// A backlog or age threshold was crossed
    Degraded,

    /// A critical threshold was crossed
    Critical,
}

impl HealthLevel {
    /// Returns the level as a lowercase string
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthLevel::Healthy => "healthy",
            HealthLevel::Degraded => "degraded",
            HealthLevel::Critical => "critical",
        }
    }
}

impl fmt::Display for HealthLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Collector health derived from backlog depth and pending age
#[derive(Debug, Clone, Serialize)]
pub struct HealthStatus {
    /// Worst level observed across chains
    pub level: HealthLevel,

    /// Pending records across every chain
    pub pending_total: usize,

    /// Age of the oldest pending record, if any are pending
    pub oldest_pending_age_secs: Option<i64>,

    /// Per-chain observations behind a non-healthy level
    pub details: Vec<String>,
}

/// Outcome of one sweep pass
#[derive(Debug, Clone, Default)]
pub struct SweepReport {
    /// Batches created by the age trigger
    pub batches_created: usize,

    /// Batches whose settlement completed
    pub batches_executed: usize,

    /// Per-chain failures, reported rather than aborting the pass
    pub failures: Vec<String>,
}

/// Serializable image of the ledger for restart durability
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    /// Every record in the ledger
    pub records: Vec<FeeCollectionRecord>,

    /// Every batch in the ledger
    pub batches: Vec<SettlementBatch>,
}
