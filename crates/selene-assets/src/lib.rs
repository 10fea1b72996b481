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

//! # Selene Assets
//!
//! Asset residency management: the subsystem that decides which image
//! assets live inside a constrained GPU-visible memory budget at any
//! moment.
//!
//! Callers register image sources and mark them used from any thread; an
//! [`AssetInstantiator`] implementation knows how to size, upload and drop
//! the actual resources. Once per frame the application calls
//! [`AssetResidencyManager::iterate`], which drains the use and cost
//! queues, sorts every record by priority and recency, then activates
//! wanted assets and evicts cold ones until the byte budget holds.
//! Instantiations run on a [`selene_core::task::TaskGroup`] and complete by
//! reporting their true cost through a [`CostReporter`]; a counting fence
//! bounds how much work may be in flight.

#![warn(missing_docs)]

mod config;
mod cost;
mod error;
mod id;
mod instantiator;
mod manager;
mod record;
mod report;
mod use_queue;

pub use config::ResidencyConfig;
pub use cost::CostReporter;
pub use error::AssetError;
pub use id::{AssetId, ImageClass, PERSISTENT_PRIORITY};
pub use instantiator::AssetInstantiator;
pub use manager::AssetResidencyManager;
pub use report::ResidencyReport;
