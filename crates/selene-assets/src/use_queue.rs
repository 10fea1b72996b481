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

//! Lock-free multi-producer append buffer for use signals.
//!
//! `mark_used` is the hottest path in the residency manager: it must never
//! block, never touch the record-table lock, and stay safe from inside
//! instantiator completion callbacks. Producers reserve a slot with a
//! single `fetch_add` and publish with a release store; the drain runs
//! during iteration and resets the buffer. A signal racing the drain either
//! lands in the current pass or stays in its slot for the next one; in the
//! worst contention cases a signal can be dropped, which only delays an LRU
//! refresh by one iteration.

use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};

// Empty-slot marker. Ids are dense from zero and cannot reach it.
const EMPTY: u32 = u32::MAX;

pub(crate) struct UseQueue {
    slots: Box<[AtomicU32]>,
    head: AtomicUsize,
}

impl UseQueue {
    pub fn with_capacity(capacity: usize) -> Self {
        let slots = (0..capacity.max(1)).map(|_| AtomicU32::new(EMPTY)).collect();
        Self {
            slots,
            head: AtomicUsize::new(0),
        }
    }

    /// Appends a raw id. Signals past capacity are dropped.
    pub fn push(&self, raw_id: u32) {
        let index = self.head.fetch_add(1, Ordering::Relaxed);
        if let Some(slot) = self.slots.get(index) {
            slot.store(raw_id, Ordering::Release);
        }
    }

    /// Visits every published signal and resets the buffer.
    pub fn drain(&self, mut visit: impl FnMut(u32)) {
        let published = self.head.swap(0, Ordering::AcqRel).min(self.slots.len());
        for slot in &self.slots[..published] {
            let value = slot.swap(EMPTY, Ordering::AcqRel);
            if value != EMPTY {
                visit(value);
            }
        }
    }
}
