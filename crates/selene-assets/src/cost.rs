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

use std::mem;
use std::sync::{Arc, Mutex};

use crate::id::AssetId;

#[derive(Debug, Clone, Copy)]
pub(crate) struct CostUpdate {
    pub id: AssetId,
    pub cost: u64,
}

/// Clonable handle through which instantiators report the true byte cost of
/// a resource back to the residency manager.
///
/// The handle owns only the cost inbox, not the manager, so background
/// completions can hold a clone for as long as they run: the manager drains
/// its fence before tearing down, and a report queued after that is simply
/// never read. The inbox lock is separate from the record-table lock, which
/// is what makes reporting safe from inside instantiator callbacks.
#[derive(Debug, Clone, Default)]
pub struct CostReporter {
    inbox: Arc<Mutex<Vec<CostUpdate>>>,
}

impl CostReporter {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Queues a cost report for `id`.
    ///
    /// Applied in FIFO order by the next iteration. Reports for unknown ids
    /// are dropped at drain time.
    pub fn report_cost(&self, id: AssetId, cost: u64) {
        self.inbox.lock().unwrap().push(CostUpdate { id, cost });
    }

    /// Exchanges the inbox contents with `scratch`, holding the inbox lock
    /// only for the swap.
    pub(crate) fn swap_into(&self, scratch: &mut Vec<CostUpdate>) {
        mem::swap(&mut *self.inbox.lock().unwrap(), scratch);
    }
}
