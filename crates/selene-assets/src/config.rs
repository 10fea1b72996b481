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

use serde::{Deserialize, Serialize};

/// Construction-time tuning for an
/// [`AssetResidencyManager`](crate::AssetResidencyManager).
///
/// Both budgets can also be changed at runtime through the manager's
/// setters; the use-queue capacity is fixed at construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResidencyConfig {
    /// Hard budget in bytes for resident image data. Persistent-priority
    /// records may pin memory above this limit.
    pub image_budget: u64,

    /// Soft cap on the bytes of new instantiation work started per
    /// iteration. At least one activation is always admitted.
    pub image_budget_per_iteration: u64,

    /// Capacity of the lock-free use-signal buffer. Signals past capacity
    /// within one iteration are dropped, which only delays an LRU refresh.
    pub use_queue_capacity: usize,
}

impl Default for ResidencyConfig {
    fn default() -> Self {
        Self {
            image_budget: u64::MAX,
            image_budget_per_iteration: u64::MAX,
            use_queue_capacity: 16 * 1024,
        }
    }
}
