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

use selene_core::task::TaskHandle;
use selene_core::vfs::SourceHandle;

use crate::cost::CostReporter;
use crate::id::{AssetId, ImageClass};

/// Capability set through which the residency manager sizes, uploads and
/// releases image resources.
///
/// The manager never inspects the concrete type; a renderer binds an
/// implementation that owns the device-side tables, keyed by [`AssetId`].
/// All methods take `&self`: implementations are shared across threads and
/// use their own interior synchronisation.
pub trait AssetInstantiator: Send + Sync {
    /// Widens the id-indexed side tables to hold every id below `bound`.
    ///
    /// Called under the record-table lock whenever a registration grows the
    /// id space, and again when the instantiator is (re)bound.
    fn set_id_bounds(&self, bound: u32);

    /// Informs the instantiator of a registration's image class.
    ///
    /// The default implementation ignores it.
    fn set_image_class(&self, _id: AssetId, _class: ImageClass) {}

    /// Cheap synchronous cost guess used for admission control.
    ///
    /// May read headers from `source` but must not decode or upload.
    fn estimate_cost(&self, id: AssetId, source: &SourceHandle) -> u64;

    /// Begins instantiating `id` from `source`.
    ///
    /// Asynchronous work must be attached to `task` — the iteration's fence
    /// carrier — when one is supplied; with `None` the work runs inline.
    /// Either way the true cost is reported through `costs` once known.
    fn instantiate(
        &self,
        costs: &CostReporter,
        task: Option<&mut TaskHandle<'_>>,
        id: AssetId,
        source: &SourceHandle,
    );

    /// Synchronously drops the resource held for `id`.
    ///
    /// Must tolerate ids that hold nothing; a later `instantiate` for the
    /// same id must succeed.
    fn release(&self, id: AssetId);

    /// Publishes any uploads completed since the previous call, making them
    /// visible to the rest of the engine.
    fn latch_handles(&self);
}
