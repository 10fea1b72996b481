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

use std::fmt;

/// Errors surfaced by the residency manager's registration paths.
///
/// The taxonomy is deliberately small: unknown-id and unbound-instantiator
/// conditions are reported through `bool` returns on the operations that
/// can hit them, and a backpressure skip is not an error at all.
#[derive(Debug)]
pub enum AssetError {
    /// The filesystem could not open the requested path. No record was
    /// created and no id was allocated.
    InvalidSource {
        /// The path that failed to open.
        path: String,
    },
}

impl fmt::Display for AssetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssetError::InvalidSource { path } => {
                write!(f, "Failed to open asset source at '{path}'")
            }
        }
    }
}

impl std::error::Error for AssetError {}
