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

/// A snapshot of the residency manager's current state, for telemetry
/// displays and tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResidencyReport {
    /// Bytes attributed to resident and in-flight image data.
    pub total_consumed_bytes: u64,
    /// The configured hard budget in bytes.
    pub image_budget_bytes: u64,
    /// Number of registered records.
    pub registered: usize,
    /// Records currently holding a resident resource.
    pub resident: usize,
    /// Records with an instantiation in flight.
    pub loading: usize,
}
