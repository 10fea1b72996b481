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

use std::cmp::Ordering;

use selene_core::vfs::SourceHandle;

use crate::id::{AssetId, ImageClass, PERSISTENT_PRIORITY};

/// Per-asset bookkeeping.
///
/// Exactly one residency state holds at any quiescent point: absent
/// (`consumed == 0 && pending_consumed == 0`), loading (`pending_consumed
/// > 0`), or resident (`consumed > 0`). The policy releases before
/// re-activating, so a record is never resident and reloading at once.
#[derive(Debug)]
pub(crate) struct AssetRecord {
    pub id: AssetId,
    pub source: SourceHandle,
    pub image_class: ImageClass,
    pub prio: i32,
    /// Bytes currently attributed to a resident resource.
    pub consumed: u64,
    /// Bytes attributed to an in-flight instantiation.
    pub pending_consumed: u64,
    /// Logical timestamp of the most recent use signal.
    pub last_used: u64,
    /// Set iff the record was registered by path.
    pub path_hash: Option<u64>,
}

impl AssetRecord {
    pub fn new(id: AssetId, source: SourceHandle, image_class: ImageClass, prio: i32) -> Self {
        Self {
            id,
            source,
            image_class,
            prio,
            consumed: 0,
            pending_consumed: 0,
            last_used: 0,
            path_hash: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.consumed != 0 || self.pending_consumed != 0
    }

    pub fn is_persistent(&self) -> bool {
        self.prio == PERSISTENT_PRIORITY
    }

    /// Bytes charged against the total, resident or in flight.
    pub fn charged(&self) -> u64 {
        self.consumed + self.pending_consumed
    }
}

/// Residency ordering used by the per-iteration sort.
///
/// High priorities come first since they are activated first, with recency
/// breaking ties. High consumption moves toward the tail, where release
/// victims are taken; records mid-load sort earlier so they are not paged
/// out while still being paid for. The id settles any remaining tie so the
/// walk is deterministic.
pub(crate) fn residency_order(a: &AssetRecord, b: &AssetRecord) -> Ordering {
    b.prio
        .cmp(&a.prio)
        .then_with(|| b.last_used.cmp(&a.last_used))
        .then_with(|| a.consumed.cmp(&b.consumed))
        .then_with(|| b.pending_consumed.cmp(&a.pending_consumed))
        .then_with(|| a.id.cmp(&b.id))
}
