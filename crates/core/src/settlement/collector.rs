use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use dashmap::DashMap;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::{
    BatchId, BatchStatus, CollectorConfig, CollectorStats, FeeCollectionRecord, FeeStatus,
    HealthLevel, HealthStatus, LedgerSnapshot, NetworkStats, NewFee, RecordId, SettlementBatch,
    SweepReport,
};
use crate::cache::TtlCache;
use crate::domain::{ChainFamily, ChainId};
use crate::oracle::{
    GasOperation, GasOracle, GasQuote, NativePriceOracle, SettlementSubmitter, SubmissionReceipt,
};
use crate::resilience::Resilience;
use crate::{Error, Result};

/// Fee ledger and settlement batcher.
///
/// Fees enter per-chain FIFO queues and leave in batches settled by one
/// on-chain transaction. Batch creation holds the chain's queue mutex
/// across trigger evaluation, gas estimation and the queue pull, so at
/// most one batch forms per chain at a time and a failed gas quote leaves
/// the queue untouched. Batches below the profitability threshold are
/// deferred rather than failed; submission failures release their records
/// to the front of the queue in original order until the retry ceiling
/// turns them terminal.
pub struct FeeCollector {
    records: DashMap<RecordId, FeeCollectionRecord>,
    batches: DashMap<BatchId, SettlementBatch>,
    queues: DashMap<ChainId, Arc<Mutex<VecDeque<RecordId>>>>,
    stats: DashMap<ChainId, NetworkStats>,
    submitters: HashMap<ChainFamily, Arc<dyn SettlementSubmitter>>,
    gas_oracle: Arc<dyn GasOracle>,
    price_oracle: Arc<dyn NativePriceOracle>,
    resilience: Arc<Resilience>,
    gas_cache: TtlCache<ChainId, GasQuote>,
    price_cache: TtlCache<ChainId, f64>,
    seq: AtomicU64,
    config: CollectorConfig,
}

impl FeeCollector {
    /// Creates a collector over the given submitters and oracles
    pub fn new(
        submitters: Vec<Arc<dyn SettlementSubmitter>>,
        gas_oracle: Arc<dyn GasOracle>,
        price_oracle: Arc<dyn NativePriceOracle>,
        resilience: Arc<Resilience>,
        config: CollectorConfig,
    ) -> Self {
        let submitters = submitters
            .into_iter()
            .map(|submitter| (submitter.family(), submitter))
            .collect();
        let gas_cache = TtlCache::new(config.oracle_ttl);
        let price_cache = TtlCache::new(config.oracle_ttl);
        Self {
            records: DashMap::new(),
            batches: DashMap::new(),
            queues: DashMap::new(),
            stats: DashMap::new(),
            submitters,
            gas_oracle,
            price_oracle,
            resilience,
            gas_cache,
            price_cache,
            seq: AtomicU64::new(0),
            config,
        }
    }

    /// Rebuilds a collector from a ledger snapshot.
    ///
    /// Records are replayed in snapshot order, so pending unbatched fees
    /// reform their queues in the order they were serialized. Stats are
    /// recomputed from record and batch history.
    pub fn restore(
        snapshot: LedgerSnapshot,
        submitters: Vec<Arc<dyn SettlementSubmitter>>,
        gas_oracle: Arc<dyn GasOracle>,
        price_oracle: Arc<dyn NativePriceOracle>,
        resilience: Arc<Resilience>,
        config: CollectorConfig,
    ) -> Self {
        let collector = Self::new(submitters, gas_oracle, price_oracle, resilience, config);

        let mut pending: BTreeMap<ChainId, VecDeque<RecordId>> = BTreeMap::new();
        for record in snapshot.records {
            {
                let mut stats = collector.stats.entry(record.chain).or_default();
                stats.records_recorded += 1;
                stats.fees_recorded_usd += record.amount_usd;
                match record.status {
                    FeeStatus::Collected => {
                        stats.records_collected += 1;
                        stats.fees_collected_usd += record.amount_usd;
                    }
                    FeeStatus::Failed => stats.records_failed += 1,
                    _ => {}
                }
            }
            if record.status == FeeStatus::Pending && record.settlement_batch.is_none() {
                pending
                    .entry(record.chain)
                    .or_default()
                    .push_back(record.id.clone());
            }
            collector.records.insert(record.id.clone(), record);
        }

        for batch in snapshot.batches {
            {
                let mut stats = collector.stats.entry(batch.chain).or_default();
                match batch.status {
                    BatchStatus::Completed => {
                        stats.batches_completed += 1;
                        stats.gas_spent_usd += batch.gas_cost_usd;
                    }
                    BatchStatus::Failed => stats.batches_failed += 1,
                    _ => {}
                }
            }
            collector.batches.insert(batch.id.clone(), batch);
        }

        for (chain, ids) in pending {
            collector
                .queues
                .insert(chain, Arc::new(Mutex::new(ids)));
        }
        collector
    }

    /// Admits a fee to the ledger and settles opportunistically.
    ///
    /// The fee is durable once this returns; a batch trigger firing on its
    /// arrival may create and settle a batch in the same call, in which
    /// case the returned record already reflects that settlement. A batch
    /// creation or settlement problem is logged, never surfaced here,
    /// since the fee itself was recorded and the sweeper will retry.
    pub async fn record_fee(&self, fee: NewFee) -> Result<FeeCollectionRecord> {
        fee.validate()?;

        let record = FeeCollectionRecord {
            id: self.next_record_id(),
            chain: fee.chain,
            dex: fee.dex,
            tx_hash: fee.tx_hash,
            user_address: fee.user_address,
            token: fee.token,
            amount_native: fee.amount_native,
            amount_usd: fee.amount_usd,
            status: FeeStatus::Pending,
            attempts: 0,
            created_at: Utc::now(),
            collected_at: None,
            gas_used: None,
            gas_cost_usd: None,
            settlement_batch: None,
        };
        let chain = record.chain;
        let record_id = record.id.clone();
        debug!(
            "Recorded fee {} on {} (${:.2} via {})",
            record_id, chain, record.amount_usd, record.dex
        );
        self.records.insert(record_id.clone(), record.clone());
        {
            let mut stats = self.stats.entry(chain).or_default();
            stats.records_recorded += 1;
            stats.fees_recorded_usd += record.amount_usd;
        }

        let queue = self.queue(chain);
        let created = {
            let mut guard = queue.lock().await;
            guard.push_back(record_id.clone());
            self.try_create_batch(chain, &mut guard, false).await
        };

        match created {
            Ok(Some(batch)) => {
                let settle_now = batch.len() >= self.config.batch_size
                    || batch.profitability_pct >= self.config.immediate_profitability_pct;
                if settle_now {
                    if let Err(err) = self.execute_batch(&batch.id).await {
                        warn!("Immediate settlement of batch {} failed: {}", batch.id, err);
                    }
                }
            }
            Ok(None) => {}
            Err(err) => {
                warn!("Could not evaluate batch creation on {}: {}", chain, err);
            }
        }

        Ok(self
            .records
            .get(&record_id)
            .map(|entry| entry.clone())
            .unwrap_or(record))
    }

    /// Submits a pending batch and applies the outcome to the ledger.
    ///
    /// The submission goes out at most once per batch; an ambiguous
    /// outcome counts as a failed attempt and the records re-queue for a
    /// future batch. Returns the batch in its final state, `Completed` or
    /// `Failed`; an
    /// error means the batch could not be submitted at all (unknown id,
    /// not pending, or no submitter for the chain family) and its state
    /// was not consumed.
    pub async fn execute_batch(&self, batch_id: &BatchId) -> Result<SettlementBatch> {
        let (chain, member_ids) = {
            let mut batch = self
                .batches
                .get_mut(batch_id)
                .ok_or_else(|| Error::SettlementFailed(format!("unknown batch {}", batch_id)))?;
            if batch.status != BatchStatus::Pending {
                return Err(Error::SettlementFailed(format!(
                    "batch {} is {}, expected pending",
                    batch.id, batch.status
                )));
            }
            batch.status = BatchStatus::Processing;
            (batch.chain, batch.records.clone())
        };

        let family = chain.family();
        let Some(submitter) = self.submitters.get(&family).cloned() else {
            if let Some(mut batch) = self.batches.get_mut(batch_id) {
                batch.status = BatchStatus::Pending;
            }
            return Err(Error::SettlementFailed(format!(
                "no settlement submitter registered for {} chains",
                family.as_str()
            )));
        };

        let batch_snapshot = self
            .batches
            .get(batch_id)
            .map(|batch| batch.clone())
            .ok_or_else(|| Error::SettlementFailed(format!("unknown batch {}", batch_id)))?;
        let member_records: Vec<FeeCollectionRecord> = member_ids
            .iter()
            .filter_map(|id| self.records.get(id).map(|record| record.clone()))
            .collect();

        // Single-shot: a transport failure or timeout may mean the
        // transaction was already broadcast, so the batch dissolves for
        // re-batching instead of being re-sent
        let dependency = format!("settlement:{}:{}", family.as_str(), chain.as_str());
        let outcome = self
            .resilience
            .call_once(&dependency, "submit_batch", move || async move {
                submitter.submit(&batch_snapshot, &member_records).await
            })
            .await;

        match outcome {
            Ok(receipt) if receipt.success => {
                self.finalize_settled(batch_id, chain, &member_ids, receipt);
            }
            Ok(receipt) => {
                let reason = receipt
                    .error
                    .unwrap_or_else(|| "submission rejected".to_string());
                self.release_failed(batch_id, chain, &member_ids, &reason)
                    .await;
            }
            Err(err) => {
                self.release_failed(batch_id, chain, &member_ids, &err.to_string())
                    .await;
            }
        }

        self.batches
            .get(batch_id)
            .map(|batch| batch.clone())
            .ok_or_else(|| Error::SettlementFailed(format!("unknown batch {}", batch_id)))
    }

    /// One housekeeping pass: age-triggered batch creation, then
    /// settlement of every pending batch. Per-chain problems are reported
    /// in the result rather than aborting the pass.
    pub async fn sweep(&self) -> SweepReport {
        let mut report = SweepReport::default();

        let chains: Vec<ChainId> = self.queues.iter().map(|entry| *entry.key()).collect();
        for chain in chains {
            let queue = self.queue(chain);
            let created = {
                let mut guard = queue.lock().await;
                self.try_create_batch(chain, &mut guard, false).await
            };
            match created {
                Ok(Some(_)) => report.batches_created += 1,
                Ok(None) => {}
                Err(err) => report.failures.push(format!("{}: {}", chain, err)),
            }
        }

        let pending: Vec<BatchId> = self
            .batches
            .iter()
            .filter(|batch| batch.status == BatchStatus::Pending)
            .map(|batch| batch.id.clone())
            .collect();
        for batch_id in pending {
            match self.execute_batch(&batch_id).await {
                Ok(batch) if batch.status == BatchStatus::Completed => {
                    report.batches_executed += 1
                }
                Ok(batch) => report
                    .failures
                    .push(format!("batch {} on {} failed", batch.id, batch.chain)),
                Err(err) => report.failures.push(err.to_string()),
            }
        }
        report
    }

    /// Spawns the periodic sweeper task
    pub fn run_sweeper(self: &Arc<Self>, every: Duration) -> JoinHandle<()> {
        let collector = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let report = collector.sweep().await;
                if report.batches_created > 0
                    || report.batches_executed > 0
                    || !report.failures.is_empty()
                {
                    info!(
                        "Sweep: {} batches created, {} settled, {} failures",
                        report.batches_created,
                        report.batches_executed,
                        report.failures.len()
                    );
                }
            }
        })
    }

    /// Drains pending fees into batches now, bypassing the count, value
    /// and age triggers. The profitability gate still applies; an
    /// unprofitable queue stays queued.
    pub async fn force_collection(
        &self,
        chain: Option<ChainId>,
    ) -> Result<Vec<SettlementBatch>> {
        let chains: Vec<ChainId> = match chain {
            Some(chain) => vec![chain],
            None => self.queues.iter().map(|entry| *entry.key()).collect(),
        };

        let mut settled = Vec::new();
        for chain in chains {
            let queue = self.queue(chain);
            loop {
                let created = {
                    let mut guard = queue.lock().await;
                    self.try_create_batch(chain, &mut guard, true).await?
                };
                let Some(batch) = created else { break };
                let executed = self.execute_batch(&batch.id).await?;
                let completed = executed.status == BatchStatus::Completed;
                settled.push(executed);
                if !completed {
                    break;
                }
            }
        }

        if !settled.is_empty() {
            info!("Force collection produced {} batches", settled.len());
        }
        Ok(settled)
    }

    /// Marks a pending, unbatched fee as refunded and removes it from its
    /// queue
    pub async fn mark_refunded(&self, id: &RecordId) -> Result<FeeCollectionRecord> {
        let chain = self
            .records
            .get(id)
            .map(|record| record.chain)
            .ok_or_else(|| Error::InvalidRequest(format!("unknown record {}", id)))?;

        let queue = self.queue(chain);
        let mut guard = queue.lock().await;
        let updated = {
            let mut record = self
                .records
                .get_mut(id)
                .ok_or_else(|| Error::InvalidRequest(format!("unknown record {}", id)))?;
            if record.status != FeeStatus::Pending {
                return Err(Error::InvalidRequest(format!(
                    "record {} is {}, only pending fees can be refunded",
                    id, record.status
                )));
            }
            if let Some(batch) = &record.settlement_batch {
                return Err(Error::InvalidRequest(format!(
                    "record {} is in batch {}",
                    id, batch
                )));
            }
            record.status = FeeStatus::Refunded;
            record.clone()
        };
        guard.retain(|queued| queued != id);

        info!("Refunded fee {} on {} (${:.2})", id, chain, updated.amount_usd);
        Ok(updated)
    }

    /// Looks up one record
    pub fn record(&self, id: &RecordId) -> Option<FeeCollectionRecord> {
        self.records.get(id).map(|record| record.clone())
    }

    /// Looks up one batch
    pub fn batch(&self, id: &BatchId) -> Option<SettlementBatch> {
        self.batches.get(id).map(|batch| batch.clone())
    }

    /// Ledger-wide counters, overall and per chain
    pub async fn stats(&self) -> CollectorStats {
        let mut overall = NetworkStats::default();
        let mut by_network = BTreeMap::new();
        for entry in self.stats.iter() {
            let stats = entry.value().clone();
            overall.records_recorded += stats.records_recorded;
            overall.records_collected += stats.records_collected;
            overall.records_failed += stats.records_failed;
            overall.batches_completed += stats.batches_completed;
            overall.batches_failed += stats.batches_failed;
            overall.fees_recorded_usd += stats.fees_recorded_usd;
            overall.fees_collected_usd += stats.fees_collected_usd;
            overall.gas_spent_usd += stats.gas_spent_usd;
            by_network.insert(*entry.key(), stats);
        }

        let mut pending_counts = BTreeMap::new();
        for (chain, queue) in self.queue_handles() {
            pending_counts.insert(chain, queue.lock().await.len());
        }

        let active_batches = self
            .batches
            .iter()
            .filter(|batch| {
                matches!(batch.status, BatchStatus::Pending | BatchStatus::Processing)
            })
            .count();

        CollectorStats {
            overall,
            by_network,
            pending_counts,
            active_batches,
        }
    }

    /// Collector health from per-chain backlog depth and pending age
    pub async fn health(&self) -> HealthStatus {
        let mut level = HealthLevel::Healthy;
        let mut details = Vec::new();
        let mut pending_total = 0;
        let mut oldest_overall: Option<i64> = None;

        for (chain, queue) in self.queue_handles() {
            let ids: Vec<RecordId> = queue.lock().await.iter().cloned().collect();
            let depth = ids.len();
            pending_total += depth;

            if depth >= self.config.critical_backlog {
                level = level.max(HealthLevel::Critical);
                details.push(format!("{}: {} pending records (critical)", chain, depth));
            } else if depth >= self.config.degraded_backlog {
                level = level.max(HealthLevel::Degraded);
                details.push(format!("{}: {} pending records", chain, depth));
            }

            let oldest = ids
                .iter()
                .filter_map(|id| self.records.get(id).map(|record| record.age_secs()))
                .max();
            if let Some(age) = oldest {
                oldest_overall = Some(oldest_overall.map_or(age, |seen| seen.max(age)));
                if age >= self.config.critical_age.as_secs() as i64 {
                    level = level.max(HealthLevel::Critical);
                    details.push(format!(
                        "{}: oldest pending fee is {}s old (critical)",
                        chain, age
                    ));
                } else if age >= self.config.degraded_age.as_secs() as i64 {
                    level = level.max(HealthLevel::Degraded);
                    details.push(format!("{}: oldest pending fee is {}s old", chain, age));
                }
            }
        }

        HealthStatus {
            level,
            pending_total,
            oldest_pending_age_secs: oldest_overall,
            details,
        }
    }

    /// Serializable image of the ledger, records ordered oldest first
    pub fn snapshot(&self) -> LedgerSnapshot {
        let mut records: Vec<FeeCollectionRecord> =
            self.records.iter().map(|record| record.clone()).collect();
        records.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.id.0.cmp(&b.id.0))
        });

        let mut batches: Vec<SettlementBatch> =
            self.batches.iter().map(|batch| batch.clone()).collect();
        batches.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.id.0.cmp(&b.id.0))
        });

        LedgerSnapshot { records, batches }
    }

    /// Evaluates batch triggers and, when one fires profitably, pulls the
    /// next batch from the queue.
    ///
    /// Callers hold the chain's queue mutex. Totals and triggers are
    /// evaluated over the records that would form the batch; the gas
    /// quote is only fetched once a trigger fires, and the queue is only
    /// drained once the batch is known to clear the profitability gate.
    /// Queued records are pending and unbatched: refunds and batch pulls
    /// both happen under this lock.
    async fn try_create_batch(
        &self,
        chain: ChainId,
        queue: &mut VecDeque<RecordId>,
        force: bool,
    ) -> Result<Option<SettlementBatch>> {
        if queue.is_empty() {
            return Ok(None);
        }

        let take = queue.len().min(self.config.batch_size);
        let mut total_native = 0.0;
        let mut total_usd = 0.0;
        let mut oldest_age = 0i64;
        for id in queue.iter().take(take) {
            if let Some(record) = self.records.get(id) {
                total_native += record.amount_native;
                total_usd += record.amount_usd;
                oldest_age = oldest_age.max(record.age_secs());
            }
        }

        if !force {
            let size_trigger = queue.len() >= self.config.batch_size;
            let value_trigger = total_usd
                >= self.config.min_batch_value_usd * self.config.value_trigger_multiplier;
            let age_trigger = oldest_age >= self.config.max_batch_delay.as_secs() as i64;
            if !size_trigger && !value_trigger && !age_trigger {
                return Ok(None);
            }
        }

        let quote = self.settlement_gas_quote(chain).await?;
        let native_usd = self.native_price(chain).await?;
        let gas_estimate = quote.gas_limit + self.config.per_record_gas * take as u64;
        let gas_cost_usd = gas_estimate as f64 * quote.gas_price_native * native_usd;
        let profitability_pct = if total_usd > 0.0 {
            (total_usd - gas_cost_usd) / total_usd * 100.0
        } else {
            0.0
        };

        if profitability_pct < self.config.profitability_threshold_pct {
            info!(
                "Deferring batch on {}: profitability {:.2}% below {:.2}% (${:.2} value, ${:.2} gas)",
                chain,
                profitability_pct,
                self.config.profitability_threshold_pct,
                total_usd,
                gas_cost_usd
            );
            return Ok(None);
        }

        let batch_id = self.next_batch_id(chain);
        let members: Vec<RecordId> = queue.drain(..take).collect();
        for id in &members {
            if let Some(mut record) = self.records.get_mut(id) {
                record.settlement_batch = Some(batch_id.clone());
            }
        }

        let batch = SettlementBatch {
            id: batch_id.clone(),
            chain,
            records: members,
            total_native,
            total_usd,
            status: BatchStatus::Pending,
            gas_estimate,
            gas_cost_usd,
            profitability_pct,
            created_at: Utc::now(),
            completed_at: None,
            transaction_hash: None,
        };
        self.batches.insert(batch_id, batch.clone());
        info!(
            "Created batch {} on {} ({} records, ${:.2}, {:.1}% profitable)",
            batch.id,
            chain,
            batch.len(),
            batch.total_usd,
            batch.profitability_pct
        );
        Ok(Some(batch))
    }

    fn finalize_settled(
        &self,
        batch_id: &BatchId,
        chain: ChainId,
        member_ids: &[RecordId],
        receipt: SubmissionReceipt,
    ) {
        let now = Utc::now();
        let (total_usd, gas_cost_usd, gas_estimate) = match self.batches.get(batch_id) {
            Some(batch) => (batch.total_usd, batch.gas_cost_usd, batch.gas_estimate),
            None => return,
        };
        let gas_used = receipt.gas_used.unwrap_or(gas_estimate);

        let mut collected_usd = 0.0;
        for id in member_ids {
            if let Some(mut record) = self.records.get_mut(id) {
                let share = if total_usd > 0.0 {
                    record.amount_usd / total_usd
                } else {
                    0.0
                };
                record.status = FeeStatus::Collected;
                record.collected_at = Some(now);
                record.gas_used = Some((gas_used as f64 * share).round() as u64);
                record.gas_cost_usd = Some(gas_cost_usd * share);
                collected_usd += record.amount_usd;
            }
        }

        if let Some(mut batch) = self.batches.get_mut(batch_id) {
            batch.status = BatchStatus::Completed;
            batch.completed_at = Some(now);
            batch.transaction_hash = receipt.transaction_hash.clone();
        }

        {
            let mut stats = self.stats.entry(chain).or_default();
            stats.records_collected += member_ids.len() as u64;
            stats.fees_collected_usd += collected_usd;
            stats.batches_completed += 1;
            stats.gas_spent_usd += gas_cost_usd;
        }

        info!(
            "Settled batch {} on {} ({} records, ${:.2} collected, ${:.4} gas)",
            batch_id,
            chain,
            member_ids.len(),
            collected_usd,
            gas_cost_usd
        );
    }

    async fn release_failed(
        &self,
        batch_id: &BatchId,
        chain: ChainId,
        member_ids: &[RecordId],
        reason: &str,
    ) {
        let now = Utc::now();
        let mut requeue = Vec::new();
        let mut terminal = 0u64;
        for id in member_ids {
            if let Some(mut record) = self.records.get_mut(id) {
                record.attempts += 1;
                record.settlement_batch = None;
                if record.attempts >= self.config.retry_attempts {
                    record.status = FeeStatus::Failed;
                    terminal += 1;
                } else {
                    record.status = FeeStatus::Pending;
                    requeue.push(id.clone());
                }
            }
        }

        if !requeue.is_empty() {
            let queue = self.queue(chain);
            let mut guard = queue.lock().await;
            for id in requeue.iter().rev() {
                guard.push_front(id.clone());
            }
        }

        if let Some(mut batch) = self.batches.get_mut(batch_id) {
            batch.status = BatchStatus::Failed;
            batch.completed_at = Some(now);
        }

        {
            let mut stats = self.stats.entry(chain).or_default();
            stats.batches_failed += 1;
            stats.records_failed += terminal;
        }

        warn!(
            "Batch {} failed on {}: {} ({} records released, {} terminally failed)",
            batch_id,
            chain,
            reason,
            requeue.len(),
            terminal
        );
    }

    async fn settlement_gas_quote(&self, chain: ChainId) -> Result<GasQuote> {
        if let Some(quote) = self.gas_cache.get(&chain) {
            return Ok(quote);
        }

        let dependency = Resilience::key("gas-oracle", chain);
        let oracle = self.gas_oracle.clone();
        let priority = self.config.gas_priority;
        let quote = self
            .resilience
            .call(&dependency, "estimate_gas", move || {
                let oracle = oracle.clone();
                async move {
                    oracle
                        .estimate(chain, GasOperation::Settlement, priority)
                        .await
                }
            })
            .await?;

        self.gas_cache.insert(chain, quote);
        Ok(quote)
    }

    async fn native_price(&self, chain: ChainId) -> Result<f64> {
        if let Some(price) = self.price_cache.get(&chain) {
            return Ok(price);
        }

        let dependency = Resilience::key("price-oracle", chain);
        let oracle = self.price_oracle.clone();
        let price = self
            .resilience
            .call(&dependency, "native_price_usd", move || {
                let oracle = oracle.clone();
                async move { oracle.native_price_usd(chain).await }
            })
            .await?;

        self.price_cache.insert(chain, price);
        Ok(price)
    }

    fn queue(&self, chain: ChainId) -> Arc<Mutex<VecDeque<RecordId>>> {
        self.queues
            .entry(chain)
            .or_insert_with(|| Arc::new(Mutex::new(VecDeque::new())))
            .clone()
    }

    fn queue_handles(&self) -> Vec<(ChainId, Arc<Mutex<VecDeque<RecordId>>>)> {
        self.queues
            .iter()
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect()
    }

    fn next_record_id(&self) -> RecordId {
        let seq = self.seq.fetch_add(1, Ordering::SeqCst);
        RecordId::new(format!("fee-{}-{}", Utc::now().timestamp_millis(), seq))
    }

    fn next_batch_id(&self, chain: ChainId) -> BatchId {
        let seq = self.seq.fetch_add(1, Ordering::SeqCst);
        BatchId::new(format!(
            "batch-{}-{}-{}",
            chain,
            Utc::now().timestamp_millis(),
            seq
        ))
    }
}
