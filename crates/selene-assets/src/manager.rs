// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! The asset residency coordinator and its replacement policy.

use std::hash::Hasher;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use rustc_hash::{FxHashMap, FxHasher};
use selene_core::task::{TaskClass, TaskGroup, TaskHandle, TaskSignal};
use selene_core::vfs::{Filesystem, SourceHandle};

use crate::config::ResidencyConfig;
use crate::cost::{CostReporter, CostUpdate};
use crate::error::AssetError;
use crate::id::{AssetId, ImageClass};
use crate::instantiator::AssetInstantiator;
use crate::record::{residency_order, AssetRecord};
use crate::report::ResidencyReport;
use crate::use_queue::UseQueue;

/// How far the fence may trail the logical timestamp before iterations are
/// skipped. Bounds the memory attributable to in-flight instantiations to
/// three iterations' worth of work.
const FENCE_SLACK: u64 = 3;

/// First logical timestamp. Starting above zero keeps a drained use signal
/// distinguishable from the zero-initialised `last_used`; the fence is
/// pre-signalled to match at construction.
const INITIAL_TIMESTAMP: u64 = 1;

struct RecordTable {
    records: Vec<AssetRecord>,
    by_path: FxHashMap<u64, AssetId>,
    instantiator: Option<Arc<dyn AssetInstantiator>>,
    timestamp: u64,
    /// Instantiations issued by `iterate_blocking` since the last
    /// iteration; folded into the timestamp by the next `iterate`.
    blocking_signals: u64,
    image_budget: u64,
    image_budget_per_iteration: u64,
    sort_scratch: Vec<u32>,
    cost_scratch: Vec<CostUpdate>,
}

impl RecordTable {
    fn register(
        &mut self,
        source: SourceHandle,
        image_class: ImageClass,
        prio: i32,
        path_hash: Option<u64>,
    ) -> AssetId {
        let id = AssetId::new(self.records.len() as u32);
        let mut record = AssetRecord::new(id, source, image_class, prio);
        record.path_hash = path_hash;
        self.records.push(record);
        if let Some(iface) = &self.instantiator {
            iface.set_id_bounds(self.records.len() as u32);
            iface.set_image_class(id, image_class);
        }
        id
    }
}

/// Decides which image assets are resident within a byte budget.
///
/// The manager is a plain value; wrap it in an `Arc` to share it with
/// loader callbacks. All public methods take `&self` and are safe from any
/// thread: the record table is guarded by one mutex, cost reports go
/// through a separately locked inbox, and use signals go through a
/// lock-free append buffer.
///
/// Nothing happens until an [`AssetInstantiator`] is bound and
/// [`iterate`](Self::iterate) is called — registration and use signals only
/// record demand.
pub struct AssetResidencyManager {
    table: Mutex<RecordTable>,
    costs: CostReporter,
    used: UseQueue,
    signal: Arc<TaskSignal>,
    total_consumed: AtomicU64,
}

impl Default for AssetResidencyManager {
    fn default() -> Self {
        Self::new()
    }
}

impl AssetResidencyManager {
    /// Creates a manager with default (unbounded) budgets.
    pub fn new() -> Self {
        Self::with_config(ResidencyConfig::default())
    }

    /// Creates a manager with the given configuration.
    pub fn with_config(config: ResidencyConfig) -> Self {
        let signal = Arc::new(TaskSignal::new());
        for _ in 0..INITIAL_TIMESTAMP {
            signal.signal_increment();
        }
        Self {
            table: Mutex::new(RecordTable {
                records: Vec::new(),
                by_path: FxHashMap::default(),
                instantiator: None,
                timestamp: INITIAL_TIMESTAMP,
                blocking_signals: 0,
                image_budget: config.image_budget,
                image_budget_per_iteration: config.image_budget_per_iteration,
                sort_scratch: Vec::new(),
                cost_scratch: Vec::new(),
            }),
            costs: CostReporter::new(),
            used: UseQueue::with_capacity(config.use_queue_capacity),
            signal,
            total_consumed: AtomicU64::new(0),
        }
    }

    /// Registers an already-opened source, unconditionally allocating a new
    /// record. Never triggers instantiation.
    pub fn register_from_handle(
        &self,
        source: SourceHandle,
        image_class: ImageClass,
        prio: i32,
    ) -> AssetId {
        let mut table = self.table.lock().unwrap();
        table.register(source, image_class, prio, None)
    }

    /// Registers the asset at `path`, or returns the id a previous
    /// registration of the same path produced.
    ///
    /// # Errors
    ///
    /// [`AssetError::InvalidSource`] when `fs` cannot open the path; no id
    /// is allocated in that case.
    pub fn register_from_path(
        &self,
        fs: &dyn Filesystem,
        path: &str,
        image_class: ImageClass,
        prio: i32,
    ) -> Result<AssetId, AssetError> {
        let mut table = self.table.lock().unwrap();
        let hash = hash_path(path);
        if let Some(&existing) = table.by_path.get(&hash) {
            debug_assert_eq!(
                table.records[existing.value() as usize].path_hash,
                Some(hash)
            );
            return Ok(existing);
        }
        let Some(source) = fs.open(path) else {
            return Err(AssetError::InvalidSource {
                path: path.to_string(),
            });
        };
        let id = table.register(source, image_class, prio, Some(hash));
        table.by_path.insert(hash, id);
        Ok(id)
    }

    /// Signals that `id` is currently of interest, refreshing its recency
    /// at the next iteration.
    ///
    /// Never blocks and never takes the record-table lock; safe to call
    /// from any thread, including instantiator callbacks. Unknown ids are
    /// ignored.
    pub fn mark_used(&self, id: AssetId) {
        self.used.push(id.value());
    }

    /// Queues the true byte cost of `id`, as learned by the instantiator.
    ///
    /// Equivalent to [`CostReporter::report_cost`] on
    /// [`cost_reporter`](Self::cost_reporter).
    pub fn report_cost(&self, id: AssetId, cost: u64) {
        self.costs.report_cost(id, cost);
    }

    /// The handle instantiators use to report costs from background work.
    pub fn cost_reporter(&self) -> CostReporter {
        self.costs.clone()
    }

    /// Updates the residency priority of `id`. Returns `false` for unknown
    /// ids.
    pub fn set_residency_priority(&self, id: AssetId, prio: i32) -> bool {
        let mut table = self.table.lock().unwrap();
        match table.records.get_mut(id.value() as usize) {
            Some(record) => {
                record.prio = prio;
                true
            }
            None => false,
        }
    }

    /// Sets the hard budget in bytes for resident image data.
    pub fn set_image_budget(&self, bytes: u64) {
        self.table.lock().unwrap().image_budget = bytes;
    }

    /// Sets the soft cap on bytes of new instantiation work per iteration.
    pub fn set_image_budget_per_iteration(&self, bytes: u64) {
        self.table.lock().unwrap().image_budget_per_iteration = bytes;
    }

    /// Bytes currently attributed to resident and in-flight image data.
    pub fn total_consumed(&self) -> u64 {
        self.total_consumed.load(Ordering::Relaxed)
    }

    /// Snapshot of the manager's state for telemetry and tests.
    pub fn usage_report(&self) -> ResidencyReport {
        let table = self.table.lock().unwrap();
        let mut resident = 0;
        let mut loading = 0;
        for record in &table.records {
            if record.consumed != 0 {
                resident += 1;
            } else if record.pending_consumed != 0 {
                loading += 1;
            }
        }
        ResidencyReport {
            total_consumed_bytes: self.total_consumed.load(Ordering::Relaxed),
            image_budget_bytes: table.image_budget,
            registered: table.records.len(),
            resident,
            loading,
        }
    }

    /// Binds, replaces or removes the instantiator.
    ///
    /// Replacing waits for all in-flight instantiations to drain, releases
    /// every id on the outgoing instantiator, clears residency state, then
    /// re-announces id bounds and image classes to the incoming one.
    pub fn bind_instantiator(&self, instantiator: Option<Arc<dyn AssetInstantiator>>) {
        let mut table = self.table.lock().unwrap();
        if let Some(outgoing) = table.instantiator.take() {
            self.signal
                .wait_until_at_least(table.timestamp + table.blocking_signals);
            // Reports queued by the drained loads belong to the outgoing
            // instantiator's resources; discard them.
            let mut stale = std::mem::take(&mut table.cost_scratch);
            self.costs.swap_into(&mut stale);
            stale.clear();
            table.cost_scratch = stale;
            for record in &table.records {
                outgoing.release(record.id);
            }
        }
        for record in &mut table.records {
            record.consumed = 0;
            record.pending_consumed = 0;
            record.last_used = 0;
        }
        self.total_consumed.store(0, Ordering::Relaxed);

        table.instantiator = instantiator;
        if let Some(incoming) = &table.instantiator {
            incoming.set_id_bounds(table.records.len() as u32);
            for record in &table.records {
                incoming.set_image_class(record.id, record.image_class);
            }
        }
    }

    /// Runs one residency step: drains the cost and use queues, then
    /// activates demanded assets and evicts cold ones until the budget
    /// holds.
    ///
    /// With a task group, instantiations are attached to one background
    /// task carrying the fence; without one they run inline and the
    /// iteration itself is the fenced unit of work. Returns without work
    /// when no instantiator is bound, and skips the policy (after letting
    /// completed uploads latch) while the fence is more than three
    /// iterations behind.
    pub fn iterate(&self, group: Option<&TaskGroup>) {
        let mut table = self.table.lock().unwrap();
        let Some(iface) = table.instantiator.clone() else {
            return;
        };

        table.timestamp += table.blocking_signals;
        table.blocking_signals = 0;

        let fence_count = self.signal.count();
        if fence_count + FENCE_SLACK < table.timestamp {
            log::info!(
                "asset residency: skipping iteration, fence at {fence_count} behind timestamp {}",
                table.timestamp
            );
            iface.latch_handles();
            return;
        }

        let mut task = group.map(|group| {
            let mut task = group.create_task();
            task.set_description("asset-residency-instantiate");
            task.set_class(TaskClass::Background);
            task.set_fence_signal(Arc::clone(&self.signal));
            task
        });
        if task.is_none() {
            // The iteration itself is the unit of work being fenced.
            self.signal.signal_increment();
        }

        self.apply_cost_updates(&mut table);
        self.refresh_recency(&mut table);
        self.run_policy(&mut table, &iface, &mut task);

        iface.latch_handles();
        table.timestamp += 1;
        drop(table);

        if let Some(task) = task {
            task.dispatch();
        }
    }

    /// Synchronously pages in one specific asset.
    ///
    /// If `id` is absent, starts its instantiation immediately on a
    /// background task bound to the fence. Returns `true` when the asset is
    /// resident or loading afterwards, `false` when no instantiator is
    /// bound or the id is unknown.
    pub fn iterate_blocking(&self, group: &TaskGroup, id: AssetId) -> bool {
        let mut table = self.table.lock().unwrap();
        let Some(iface) = table.instantiator.clone() else {
            return false;
        };

        self.apply_cost_updates(&mut table);
        self.refresh_recency(&mut table);

        let index = id.value() as usize;
        if index >= table.records.len() {
            return false;
        }
        if table.records[index].is_active() {
            return true;
        }

        let estimate = iface.estimate_cost(id, &table.records[index].source);
        let mut task = group.create_task();
        task.set_description("asset-residency-instantiate-single");
        task.set_class(TaskClass::Background);
        task.set_fence_signal(Arc::clone(&self.signal));
        iface.instantiate(&self.costs, Some(&mut task), id, &table.records[index].source);

        let timestamp = table.timestamp;
        let record = &mut table.records[index];
        record.pending_consumed = estimate;
        record.last_used = timestamp;
        self.add_total(estimate);

        // The timestamp cannot advance here; the next `iterate` folds this
        // counter in so the fence arithmetic stays consistent.
        table.blocking_signals += 1;
        drop(table);

        task.dispatch();
        true
    }

    fn apply_cost_updates(&self, table: &mut RecordTable) {
        let mut updates = std::mem::take(&mut table.cost_scratch);
        self.costs.swap_into(&mut updates);
        let timestamp = table.timestamp;
        for update in updates.drain(..) {
            if let Some(record) = table.records.get_mut(update.id.value() as usize) {
                let previous = record.consumed + record.pending_consumed;
                self.sub_total(previous);
                self.add_total(update.cost);
                record.consumed = update.cost;
                record.pending_consumed = 0;
                // A freshly paged-in asset must not become the next
                // eviction victim while the working set is thrashing.
                record.last_used = timestamp;
            }
        }
        table.cost_scratch = updates;
    }

    fn refresh_recency(&self, table: &mut RecordTable) {
        let timestamp = table.timestamp;
        let records = &mut table.records;
        self.used.drain(|raw_id| {
            if let Some(record) = records.get_mut(raw_id as usize) {
                record.last_used = timestamp;
            }
        });
    }

    fn run_policy(
        &self,
        table: &mut RecordTable,
        iface: &Arc<dyn AssetInstantiator>,
        task: &mut Option<TaskHandle<'_>>,
    ) {
        let image_budget = table.image_budget;
        let per_iteration = table.image_budget_per_iteration;

        let mut order = std::mem::take(&mut table.sort_scratch);
        order.clear();
        order.extend(0..table.records.len() as u32);
        {
            let records = &table.records;
            order.sort_unstable_by(|&a, &b| {
                residency_order(&records[a as usize], &records[b as usize])
            });
        }

        // Bytes pinned by persistent records never count against the
        // budget; admission and release both reason about the rest.
        let mut unpinned: u64 = table
            .records
            .iter()
            .filter(|record| !record.is_persistent())
            .map(|record| record.charged())
            .sum();

        let mut activate_index = 0usize;
        let mut release_index = order.len();
        let mut activated_cost = 0u64;
        let mut activation_count = 0u32;

        // Activate from highest priority down while the budget holds.
        while activate_index != release_index {
            let slot = order[activate_index] as usize;
            if table.records[slot].prio <= 0 {
                // Registered but not demanded.
                break;
            }
            if unpinned >= image_budget && !table.records[slot].is_persistent() {
                // At or over budget the walk stops here; everything past
                // the cursor stays eligible for the release passes below.
                // Persistent candidates are exempt so pins can still be
                // placed.
                break;
            }
            if table.records[slot].is_active() {
                activate_index += 1;
                continue;
            }
            if activated_cost >= per_iteration {
                // Checked before the candidate so the first activation is
                // always admitted: forward progress at any budget.
                break;
            }

            let estimate = iface.estimate_cost(table.records[slot].id, &table.records[slot].source);
            let persistent = table.records[slot].is_persistent();
            let mut can_activate =
                persistent || unpinned.saturating_add(estimate) <= image_budget;

            // Page out tail records until the candidate fits. The sort
            // guarantees nothing between the cursors outranks the
            // candidate, and no persistent record can sit there while the
            // candidate is not itself persistent.
            while !can_activate && activate_index + 1 != release_index {
                release_index -= 1;
                let victim = order[release_index] as usize;
                if table.records[victim].consumed != 0 {
                    log::info!(
                        "asset residency: releasing {} under page-in pressure",
                        table.records[victim].id
                    );
                    iface.release(table.records[victim].id);
                    let freed = table.records[victim].consumed;
                    table.records[victim].consumed = 0;
                    unpinned -= freed;
                    self.sub_total(freed);
                }
                can_activate = unpinned.saturating_add(estimate) <= image_budget;
            }
            if !can_activate {
                break;
            }

            iface.instantiate(
                &self.costs,
                task.as_mut(),
                table.records[slot].id,
                &table.records[slot].source,
            );
            table.records[slot].pending_consumed = estimate;
            if !persistent {
                unpinned = unpinned.saturating_add(estimate);
            }
            self.add_total(estimate);
            activated_cost = activated_cost.saturating_add(estimate);
            activation_count += 1;
            activate_index += 1;
        }

        // Past three quarters of the budget, garbage-collect cold
        // zero-priority residents ahead of real pressure.
        let low_budget = image_budget / 4 * 3;
        while release_index != activate_index {
            let tail = order[release_index - 1] as usize;
            if table.records[tail].is_persistent() {
                break;
            }
            let over_budget = unpinned > image_budget
                || (unpinned > low_budget && table.records[tail].prio == 0);
            if !over_budget {
                break;
            }
            release_index -= 1;
            if table.records[tail].consumed != 0 {
                log::info!(
                    "asset residency: releasing cold {} to reclaim headroom",
                    table.records[tail].id
                );
                iface.release(table.records[tail].id);
                let freed = table.records[tail].consumed;
                table.records[tail].consumed = 0;
                unpinned -= freed;
                self.sub_total(freed);
            }
        }

        if activated_cost > 0 {
            log::debug!(
                "asset residency: activated {activation_count} resources for {} KiB",
                activated_cost / 1024
            );
        }

        table.sort_scratch = order;
    }

    fn add_total(&self, bytes: u64) {
        let total = self.total_consumed.load(Ordering::Relaxed);
        self.total_consumed
            .store(total.saturating_add(bytes), Ordering::Relaxed);
    }

    fn sub_total(&self, bytes: u64) {
        let total = self.total_consumed.load(Ordering::Relaxed);
        self.total_consumed
            .store(total.saturating_sub(bytes), Ordering::Relaxed);
    }
}

impl Drop for AssetResidencyManager {
    /// Waits out every in-flight instantiation, then releases whatever is
    /// resident so no loader callback ever sees a half-destroyed manager.
    fn drop(&mut self) {
        let table = self.table.get_mut().unwrap();
        self.signal
            .wait_until_at_least(table.timestamp + table.blocking_signals);

        // Fold in what the drained loads reported so the resident set is
        // accurate before releasing it.
        let mut updates = std::mem::take(&mut table.cost_scratch);
        self.costs.swap_into(&mut updates);
        for update in updates.drain(..) {
            if let Some(record) = table.records.get_mut(update.id.value() as usize) {
                record.consumed = update.cost;
                record.pending_consumed = 0;
            }
        }

        if let Some(iface) = table.instantiator.take() {
            for record in &table.records {
                if record.consumed != 0 {
                    iface.release(record.id);
                }
            }
        }
    }
}

fn hash_path(path: &str) -> u64 {
    let mut hasher = FxHasher::default();
    hasher.write(path.as_bytes());
    hasher.finish()
}
