//! Chunk lifecycle manager.
//!
//! Owns one [`ChunkRecord`] per live key, diffs the required set against the
//! live set, and drives deferred generation from an [`IdleQueue`]. Every record
//! moves through `Requested -> Generating -> Ready | Cancelled`; results of a
//! cancelled attempt are never written back.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::builder::{BuildOutcome, ChunkBuilder, ChunkPayload, GenerationError};
use crate::chunk::{CancelToken, ChunkKey, ChunkRecord, ChunkState};
use crate::heightfield::HeightGrid;
use crate::oracle::OracleHandle;
use crate::scheduler::IdleQueue;

/// Render and physics collaborators that consume Ready chunks.
pub trait ChunkObserver {
    /// A chunk became Ready; mesh and collision field are both available.
    fn chunk_ready(&mut self, payload: &Arc<ChunkPayload>);

    /// A Ready chunk is about to be destroyed; release anything attached to it.
    fn chunk_detached(&mut self, key: ChunkKey);
}

/// Observer that ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullObserver;

impl ChunkObserver for NullObserver {
    fn chunk_ready(&mut self, _payload: &Arc<ChunkPayload>) {}

    fn chunk_detached(&mut self, _key: ChunkKey) {}
}

/// Counters accumulated over the manager's lifetime.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StreamingMetrics {
    pub scheduled: u64,
    pub stages_run: u64,
    pub built: u64,
    pub cancelled: u64,
    pub failed: u64,
    pub evicted: u64,
    /// Idle slices skipped because the oracle was still initializing.
    pub deferred_slices: u64,
    /// Completed builds dropped because their attempt was no longer current.
    pub stale_results: u64,
}

/// Keys inserted and removed by one reconciliation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub added: Vec<ChunkKey>,
    pub removed: Vec<ChunkKey>,
}

impl ReconcileReport {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// Work done by one idle slice.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdleReport {
    pub stages_run: usize,
    pub ready: Vec<ChunkKey>,
    pub failed: Vec<ChunkKey>,
    /// The slice stopped early because the oracle is not ready.
    pub waiting_for_oracle: bool,
}

/// Owns every live chunk record and its deferred work.
#[derive(Debug)]
pub struct ChunkLifecycle {
    records: BTreeMap<ChunkKey, ChunkRecord>,
    /// Render grids of records that finished their first stage.
    render_stage: HashMap<ChunkKey, HeightGrid>,
    queue: IdleQueue,
    builder: ChunkBuilder,
    oracle: OracleHandle,
    metrics: StreamingMetrics,
    retry_pending: bool,
}

impl ChunkLifecycle {
    pub fn new(builder: ChunkBuilder, oracle: OracleHandle) -> Self {
        Self {
            records: BTreeMap::new(),
            render_stage: HashMap::new(),
            queue: IdleQueue::new(),
            builder,
            oracle,
            metrics: StreamingMetrics::default(),
            retry_pending: false,
        }
    }

    /// Make the live set equal `required`.
    ///
    /// Keys no longer required are evicted (cancelling in-flight work), and
    /// missing keys get a fresh Requested record with deferred generation.
    /// Keys that are already live are left alone, whatever their state.
    pub fn reconcile(
        &mut self,
        required: &BTreeSet<ChunkKey>,
        observer: &mut dyn ChunkObserver,
    ) -> ReconcileReport {
        let mut report = ReconcileReport::default();

        let stale: Vec<ChunkKey> = self
            .records
            .keys()
            .filter(|key| !required.contains(key))
            .copied()
            .collect();
        for key in stale {
            self.evict(key, observer);
            report.removed.push(key);
        }

        for &key in required {
            if self.records.contains_key(&key) {
                continue;
            }
            self.records.insert(key, ChunkRecord::requested(key));
            self.queue.schedule(key);
            self.metrics.scheduled += 1;
            report.added.push(key);
        }

        self.retry_pending = false;
        if !report.is_empty() {
            info!(
                added = report.added.len(),
                removed = report.removed.len(),
                live = self.records.len(),
                "reconciled chunk window"
            );
        }
        report
    }

    /// Run up to `budget` deferred build stages, nearest chunks first.
    pub fn run_idle(&mut self, budget: usize, observer: &mut dyn ChunkObserver) -> IdleReport {
        let mut report = IdleReport::default();
        if self.queue.is_empty() {
            return report;
        }

        let oracle = match self.oracle.get() {
            Ok(oracle) => Arc::clone(oracle),
            Err(_) => {
                debug!(pending = self.queue.len(), "oracle not ready; deferring chunk work");
                self.metrics.deferred_slices += 1;
                report.waiting_for_oracle = true;
                return report;
            }
        };

        while report.stages_run < budget {
            let Some(key) = self.queue.pop() else {
                break;
            };
            let Some((state, token)) = self
                .records
                .get(&key)
                .map(|record| (record.state(), record.cancel_token().clone()))
            else {
                continue;
            };
            // Checked before any sampling.
            if token.is_cancelled() {
                continue;
            }

            report.stages_run += 1;
            self.metrics.stages_run += 1;

            match state {
                ChunkState::Requested => match self.builder.sample_render(key, oracle.as_ref()) {
                    Ok(grid) => {
                        if let Some(record) = self.records.get_mut(&key) {
                            record.begin_generating();
                        }
                        self.render_stage.insert(key, grid);
                        self.queue.schedule(key);
                    }
                    Err(err) if err.is_not_ready() => {
                        self.queue.schedule(key);
                        self.metrics.deferred_slices += 1;
                        report.waiting_for_oracle = true;
                        break;
                    }
                    Err(err) => {
                        if let Some(record) = self.records.get_mut(&key) {
                            record.begin_generating();
                        }
                        self.fail(key, err, &mut report);
                    }
                },
                ChunkState::Generating => {
                    let Some(render) = self.render_stage.remove(&key) else {
                        unreachable!("generating chunk {key} has no staged render grid");
                    };
                    match self.builder.finish(key, render, oracle.as_ref(), &token) {
                        Ok(BuildOutcome::Built(payload)) => {
                            if self.complete(key, &token, payload, observer) {
                                report.ready.push(key);
                            }
                        }
                        Ok(BuildOutcome::Cancelled) => {
                            debug!(chunk = %key, "build cancelled after its record was evicted");
                            self.metrics.stale_results += 1;
                        }
                        Err(err) => self.fail(key, err, &mut report),
                    }
                }
                ChunkState::Ready | ChunkState::Cancelled => {
                    debug!(chunk = %key, ?state, "dropping queued work for settled chunk");
                }
            }
        }
        report
    }

    /// Run idle slices until no work is queued or the oracle blocks progress.
    pub fn run_until_idle(&mut self, observer: &mut dyn ChunkObserver) -> IdleReport {
        let mut total = IdleReport::default();
        loop {
            let slice = self.run_idle(usize::MAX, observer);
            total.stages_run += slice.stages_run;
            total.ready.extend(slice.ready);
            total.failed.extend(slice.failed);
            total.waiting_for_oracle = slice.waiting_for_oracle;
            if slice.waiting_for_oracle || slice.stages_run == 0 || self.queue.is_empty() {
                return total;
            }
        }
    }

    /// Re-prioritize queued work around `focus`.
    pub fn set_focus(&mut self, focus: ChunkKey) {
        self.queue.set_focus(focus);
    }

    pub fn state(&self, key: ChunkKey) -> Option<ChunkState> {
        self.records.get(&key).map(ChunkRecord::state)
    }

    /// Mesh and collision field of a Ready chunk.
    pub fn payload(&self, key: ChunkKey) -> Option<Arc<ChunkPayload>> {
        self.records.get(&key).and_then(|r| r.payload().cloned())
    }

    /// Every key with a live record, in key order.
    pub fn live_keys(&self) -> impl Iterator<Item = ChunkKey> + '_ {
        self.records.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Keys with deferred work still queued.
    pub fn pending_work(&self) -> usize {
        self.queue.len()
    }

    /// A failed build left a required key without a record.
    pub fn needs_retry(&self) -> bool {
        self.retry_pending
    }

    pub fn metrics(&self) -> &StreamingMetrics {
        &self.metrics
    }

    pub fn builder(&self) -> &ChunkBuilder {
        &self.builder
    }

    fn evict(&mut self, key: ChunkKey, observer: &mut dyn ChunkObserver) {
        let Some(mut record) = self.records.remove(&key) else {
            return;
        };
        match record.state() {
            ChunkState::Ready => observer.chunk_detached(key),
            ChunkState::Requested => {
                self.queue.deschedule(key);
                record.cancel_token().cancel();
            }
            ChunkState::Generating => {
                record.mark_cancelled();
                self.queue.deschedule(key);
                self.render_stage.remove(&key);
                self.metrics.cancelled += 1;
            }
            ChunkState::Cancelled => {}
        }
        self.metrics.evicted += 1;
        debug!(chunk = %record.key(), state = ?record.state(), "evicted chunk");
    }

    fn complete(
        &mut self,
        key: ChunkKey,
        token: &CancelToken,
        payload: ChunkPayload,
        observer: &mut dyn ChunkObserver,
    ) -> bool {
        let Some(record) = self.records.get_mut(&key) else {
            self.metrics.stale_results += 1;
            return false;
        };
        let current = record.cancel_token().same_attempt(token)
            && !token.is_cancelled()
            && record.state() == ChunkState::Generating;
        if !current {
            debug!(chunk = %key, "discarding result of superseded build");
            self.metrics.stale_results += 1;
            return false;
        }

        let payload = Arc::new(payload);
        record.mark_ready(Arc::clone(&payload));
        self.metrics.built += 1;
        debug!(
            chunk = %key,
            vertices = payload.mesh().vertices.len(),
            mesh_hash = %payload.mesh().hash.to_hex(),
            "chunk ready"
        );
        observer.chunk_ready(&payload);
        true
    }

    fn fail(&mut self, key: ChunkKey, err: GenerationError, report: &mut IdleReport) {
        warn!(chunk = %key, error = %err, "chunk generation failed");
        self.render_stage.remove(&key);
        if let Some(mut record) = self.records.remove(&key) {
            if record.state() == ChunkState::Generating {
                record.mark_cancelled();
            }
        }
        self.metrics.failed += 1;
        self.retry_pending = true;
        report.failed.push(key);
    }
}
