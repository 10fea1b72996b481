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

//! Deterministic residency-policy scenarios, driven without a task group so
//! every instantiation completes inline.

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use selene_assets::{
    AssetError, AssetId, AssetInstantiator, AssetResidencyManager, CostReporter, ImageClass,
    ResidencyConfig, PERSISTENT_PRIORITY,
};
use selene_core::task::TaskHandle;
use selene_core::vfs::{MemoryFilesystem, MemorySource, SourceHandle};

/// Uploader double: estimates from the source size (or an override),
/// reports cost at instantiation time, and records everything it is asked
/// to do.
#[derive(Default)]
struct RecordingInstantiator {
    estimates: Mutex<HashMap<u32, u64>>,
    reported: Mutex<HashMap<u32, u64>>,
    live: Mutex<BTreeSet<u32>>,
    live_costs: Mutex<HashMap<u32, u64>>,
    released: Mutex<Vec<u32>>,
    instantiated: Mutex<Vec<u32>>,
    classes: Mutex<HashMap<u32, ImageClass>>,
    id_bound: AtomicU32,
    latch_calls: AtomicU32,
}

impl RecordingInstantiator {
    fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn set_estimate(&self, id: AssetId, bytes: u64) {
        self.estimates.lock().unwrap().insert(id.value(), bytes);
    }

    fn set_reported_cost(&self, id: AssetId, bytes: u64) {
        self.reported.lock().unwrap().insert(id.value(), bytes);
    }

    fn live_ids(&self) -> Vec<u32> {
        self.live.lock().unwrap().iter().copied().collect()
    }

    fn live_cost_sum(&self) -> u64 {
        let live = self.live.lock().unwrap();
        let costs = self.live_costs.lock().unwrap();
        live.iter().map(|id| costs[id]).sum()
    }

    fn released_ids(&self) -> Vec<u32> {
        self.released.lock().unwrap().clone()
    }

    fn instantiation_count(&self) -> usize {
        self.instantiated.lock().unwrap().len()
    }

    fn latch_count(&self) -> u32 {
        self.latch_calls.load(Ordering::SeqCst)
    }
}

impl AssetInstantiator for RecordingInstantiator {
    fn set_id_bounds(&self, bound: u32) {
        self.id_bound.fetch_max(bound, Ordering::SeqCst);
    }

    fn set_image_class(&self, id: AssetId, class: ImageClass) {
        self.classes.lock().unwrap().insert(id.value(), class);
    }

    fn estimate_cost(&self, id: AssetId, source: &SourceHandle) -> u64 {
        self.estimates
            .lock()
            .unwrap()
            .get(&id.value())
            .copied()
            .or_else(|| source.size_hint())
            .unwrap_or(0)
    }

    fn instantiate(
        &self,
        costs: &CostReporter,
        task: Option<&mut TaskHandle<'_>>,
        id: AssetId,
        source: &SourceHandle,
    ) {
        self.instantiated.lock().unwrap().push(id.value());
        self.live.lock().unwrap().insert(id.value());
        let cost = self
            .reported
            .lock()
            .unwrap()
            .get(&id.value())
            .copied()
            .unwrap_or_else(|| self.estimate_cost(id, source));
        self.live_costs.lock().unwrap().insert(id.value(), cost);
        let costs = costs.clone();
        let report = move || costs.report_cost(id, cost);
        match task {
            Some(task) => task.attach(report),
            None => report(),
        }
    }

    fn release(&self, id: AssetId) {
        self.live.lock().unwrap().remove(&id.value());
        self.released.lock().unwrap().push(id.value());
    }

    fn latch_handles(&self) {
        self.latch_calls.fetch_add(1, Ordering::SeqCst);
    }
}

fn source_of(bytes: usize) -> SourceHandle {
    Arc::new(MemorySource::new("texture", vec![0u8; bytes]))
}

fn manager_with_budget(budget: u64, per_iteration: u64) -> AssetResidencyManager {
    AssetResidencyManager::with_config(ResidencyConfig {
        image_budget: budget,
        image_budget_per_iteration: per_iteration,
        ..ResidencyConfig::default()
    })
}

#[test]
fn higher_priority_wins_when_the_budget_cannot_hold_everything() {
    let instantiator = RecordingInstantiator::new();
    let manager = manager_with_budget(100, 100);
    manager.bind_instantiator(Some(instantiator.clone()));

    let a = manager.register_from_handle(source_of(60), ImageClass::Color, 1);
    let b = manager.register_from_handle(source_of(60), ImageClass::Color, 1);
    let c = manager.register_from_handle(source_of(60), ImageClass::Normal, 2);
    for id in [a, b, c] {
        manager.mark_used(id);
    }

    manager.iterate(None);

    assert_eq!(
        instantiator.live_ids(),
        vec![c.value()],
        "only the high-priority asset fits the budget"
    );
    assert_eq!(manager.total_consumed(), 60);
    assert!(instantiator.released_ids().is_empty(), "nothing was resident to release");
}

#[test]
fn persistent_records_pin_above_budget_without_starving_others() {
    let instantiator = RecordingInstantiator::new();
    let manager = manager_with_budget(1_000, u64::MAX);
    manager.bind_instantiator(Some(instantiator.clone()));

    let pinned = manager.register_from_handle(source_of(2_000), ImageClass::Color, PERSISTENT_PRIORITY);
    let small = manager.register_from_handle(source_of(100), ImageClass::Color, 1);

    manager.iterate(None);
    assert_eq!(instantiator.live_ids(), vec![pinned.value(), small.value()]);
    assert_eq!(manager.total_consumed(), 2_100);

    // The pin stays put across further iterations.
    manager.iterate(None);
    manager.iterate(None);
    assert_eq!(instantiator.live_ids(), vec![pinned.value(), small.value()]);
    assert_eq!(manager.total_consumed(), 2_100);
    assert!(instantiator.released_ids().is_empty());
}

#[test]
fn demoting_a_resident_to_zero_priority_garbage_collects_it() {
    let instantiator = RecordingInstantiator::new();
    let manager = manager_with_budget(100, u64::MAX);
    manager.bind_instantiator(Some(instantiator.clone()));

    let a = manager.register_from_handle(source_of(100), ImageClass::Color, 1);
    manager.mark_used(a);
    manager.iterate(None);
    manager.iterate(None);
    assert_eq!(instantiator.live_ids(), vec![a.value()], "resident after paging in");

    assert!(manager.set_residency_priority(a, 0));
    manager.iterate(None);

    assert!(instantiator.live_ids().is_empty(), "cold zero-priority resident is collected");
    assert_eq!(instantiator.released_ids(), vec![a.value()]);
    assert_eq!(manager.total_consumed(), 0);
}

#[test]
fn zero_budget_still_activates_persistent_records() {
    let instantiator = RecordingInstantiator::new();
    let manager = manager_with_budget(0, u64::MAX);
    manager.bind_instantiator(Some(instantiator.clone()));

    let pinned = manager.register_from_handle(source_of(50), ImageClass::Color, PERSISTENT_PRIORITY);
    let wanted = manager.register_from_handle(source_of(10), ImageClass::Color, 1);
    manager.mark_used(pinned);
    manager.mark_used(wanted);

    manager.iterate(None);

    assert_eq!(instantiator.live_ids(), vec![pinned.value()]);
    assert_eq!(manager.total_consumed(), 50);
    assert!(
        instantiator.released_ids().is_empty(),
        "an unaffordable candidate must not trigger spurious releases"
    );
}

#[test]
fn per_iteration_budget_still_admits_one_activation() {
    let instantiator = RecordingInstantiator::new();
    let manager = manager_with_budget(1_000, 1);
    manager.bind_instantiator(Some(instantiator.clone()));

    let a = manager.register_from_handle(source_of(60), ImageClass::Color, 1);
    let b = manager.register_from_handle(source_of(60), ImageClass::Color, 1);

    manager.iterate(None);
    assert_eq!(instantiator.live_ids(), vec![a.value()], "first iteration admits exactly one");
    assert_eq!(instantiator.instantiation_count(), 1);

    manager.iterate(None);
    assert_eq!(instantiator.live_ids(), vec![a.value(), b.value()]);
    assert_eq!(instantiator.instantiation_count(), 2);
}

#[test]
fn reported_cost_overrides_the_estimate() {
    let instantiator = RecordingInstantiator::new();
    let manager = manager_with_budget(1_000, u64::MAX);
    manager.bind_instantiator(Some(instantiator.clone()));

    let a = manager.register_from_handle(source_of(50), ImageClass::Color, 1);
    instantiator.set_estimate(a, 50);
    instantiator.set_reported_cost(a, 80);

    manager.iterate(None);
    assert_eq!(manager.total_consumed(), 50, "pending work is charged at the estimate");
    assert_eq!(manager.usage_report().loading, 1);

    manager.iterate(None);
    assert_eq!(manager.total_consumed(), 80, "the reported cost replaces the estimate");
    let report = manager.usage_report();
    assert_eq!(report.resident, 1);
    assert_eq!(report.loading, 0);
}

#[test]
fn iteration_is_idempotent_without_new_signals() {
    let instantiator = RecordingInstantiator::new();
    let manager = manager_with_budget(100, 100);
    manager.bind_instantiator(Some(instantiator.clone()));

    let a = manager.register_from_handle(source_of(60), ImageClass::Color, 1);
    let b = manager.register_from_handle(source_of(60), ImageClass::Color, 2);

    manager.mark_used(a);
    manager.mark_used(b);
    manager.iterate(None);
    let first_live = instantiator.live_ids();
    let first_total = manager.total_consumed();

    manager.mark_used(a);
    manager.mark_used(b);
    manager.iterate(None);

    assert_eq!(instantiator.live_ids(), first_live);
    assert_eq!(manager.total_consumed(), first_total);
}

#[test]
fn oversized_candidates_neither_activate_nor_release() {
    let instantiator = RecordingInstantiator::new();
    let manager = manager_with_budget(50, u64::MAX);
    manager.bind_instantiator(Some(instantiator.clone()));

    let a = manager.register_from_handle(source_of(60), ImageClass::Color, 1);
    let b = manager.register_from_handle(source_of(60), ImageClass::Color, 1);
    manager.mark_used(a);
    manager.mark_used(b);

    manager.iterate(None);

    assert!(instantiator.live_ids().is_empty());
    assert!(instantiator.released_ids().is_empty());
    assert_eq!(manager.total_consumed(), 0);
}

#[test]
fn shrinking_the_budget_evicts_the_cold_tail() {
    let instantiator = RecordingInstantiator::new();
    let manager = manager_with_budget(u64::MAX, u64::MAX);
    manager.bind_instantiator(Some(instantiator.clone()));

    let a = manager.register_from_handle(source_of(60), ImageClass::Color, 1);
    let b = manager.register_from_handle(source_of(60), ImageClass::Color, 1);
    manager.iterate(None);
    manager.iterate(None);
    assert_eq!(instantiator.live_ids(), vec![a.value(), b.value()]);

    manager.set_image_budget(100);
    manager.iterate(None);

    assert_eq!(instantiator.live_ids(), vec![a.value()], "the tie falls to the higher id");
    assert_eq!(instantiator.released_ids(), vec![b.value()]);
    assert_eq!(manager.total_consumed(), 60);
}

#[test]
fn total_consumed_tracks_the_live_resource_costs() {
    let instantiator = RecordingInstantiator::new();
    let manager = manager_with_budget(65, u64::MAX);
    manager.bind_instantiator(Some(instantiator.clone()));

    let sizes = [10usize, 20, 30, 40];
    let prios = [1, 2, 0, 3];
    let mut ids = Vec::new();
    for (&bytes, &prio) in sizes.iter().zip(&prios) {
        ids.push(manager.register_from_handle(source_of(bytes), ImageClass::Color, prio));
    }
    for &id in &ids {
        manager.mark_used(id);
    }

    for _ in 0..4 {
        manager.iterate(None);
        assert_eq!(
            manager.total_consumed(),
            instantiator.live_cost_sum(),
            "the byte total always matches the live resource set"
        );
    }
    let report = manager.usage_report();
    assert!(report.total_consumed_bytes <= 65, "settled under budget");
}

#[test]
fn latch_handles_runs_exactly_once_per_iteration() {
    let instantiator = RecordingInstantiator::new();
    let manager = manager_with_budget(1_000, u64::MAX);
    manager.bind_instantiator(Some(instantiator.clone()));

    manager.register_from_handle(source_of(10), ImageClass::Color, 1);
    for expected in 1..=3u32 {
        manager.iterate(None);
        assert_eq!(instantiator.latch_count(), expected);
    }
}

#[test]
fn registration_announces_but_never_instantiates() {
    let instantiator = RecordingInstantiator::new();
    let manager = manager_with_budget(1_000, u64::MAX);
    manager.bind_instantiator(Some(instantiator.clone()));

    let id = manager.register_from_handle(source_of(64), ImageClass::Normal, 5);

    assert_eq!(instantiator.id_bound.load(Ordering::SeqCst), 1);
    assert_eq!(
        instantiator.classes.lock().unwrap().get(&id.value()),
        Some(&ImageClass::Normal)
    );
    assert_eq!(instantiator.instantiation_count(), 0);
    assert!(instantiator.live_ids().is_empty());
}

#[test]
fn path_registration_dedups_and_rejects_missing_sources() {
    let mut fs = MemoryFilesystem::new();
    fs.insert_bytes("textures/brick_albedo", vec![0u8; 96]);

    let instantiator = RecordingInstantiator::new();
    let manager = manager_with_budget(1_000, u64::MAX);
    manager.bind_instantiator(Some(instantiator.clone()));

    let first = manager
        .register_from_path(&fs, "textures/brick_albedo", ImageClass::Color, 1)
        .expect("path registers");
    let second = manager
        .register_from_path(&fs, "textures/brick_albedo", ImageClass::Color, 1)
        .expect("path registers");
    assert_eq!(first, second, "re-registering a path returns the same id");
    assert_eq!(manager.usage_report().registered, 1);

    let missing = manager.register_from_path(&fs, "textures/nope", ImageClass::Color, 1);
    assert!(matches!(missing, Err(AssetError::InvalidSource { .. })));
    assert_eq!(manager.usage_report().registered, 1);
}

#[test]
fn rebinding_releases_everything_and_reannounces() {
    let first = RecordingInstantiator::new();
    let manager = manager_with_budget(1_000, u64::MAX);
    manager.bind_instantiator(Some(first.clone()));

    let a = manager.register_from_handle(source_of(40), ImageClass::Color, 1);
    let b = manager.register_from_handle(source_of(40), ImageClass::Data, 1);
    manager.iterate(None);
    manager.iterate(None);
    assert_eq!(first.live_ids(), vec![a.value(), b.value()]);

    let second = RecordingInstantiator::new();
    manager.bind_instantiator(Some(second.clone()));

    assert!(first.live_ids().is_empty(), "the old instantiator dropped everything");
    assert_eq!(first.released_ids().len(), 2);
    assert_eq!(manager.total_consumed(), 0, "residency state was cleared");

    assert_eq!(second.id_bound.load(Ordering::SeqCst), 2);
    assert_eq!(
        second.classes.lock().unwrap().get(&b.value()),
        Some(&ImageClass::Data)
    );

    // The new instantiator pages assets back in on demand.
    manager.mark_used(a);
    manager.iterate(None);
    assert_eq!(second.live_ids(), vec![a.value(), b.value()]);
}
