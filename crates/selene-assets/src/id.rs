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

use serde::{Deserialize, Serialize};

/// Priority value designating a record that may exceed the image budget and
/// is never chosen for eviction.
pub const PERSISTENT_PRIORITY: i32 = i32::MAX;

/// Opaque, dense identifier for a registered image asset.
///
/// Ids are assigned sequentially from zero at registration, are stable for
/// the lifetime of the manager, and are never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AssetId(u32);

impl AssetId {
    pub(crate) fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// The raw dense index value.
    pub fn value(self) -> u32 {
        self.0
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "asset #{}", self.0)
    }
}

/// Caller-selected classification of an image asset.
///
/// Stored and forwarded opaquely; only instantiator implementations act on
/// it (for example to pick a texture format or decode path).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ImageClass {
    /// Albedo / base-colour data.
    #[default]
    Color,
    /// Tangent-space normal maps.
    Normal,
    /// Packed metallic-roughness data.
    MetallicRoughness,
    /// Uninterpreted data textures (LUTs, masks).
    Data,
}

impl fmt::Display for ImageClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageClass::Color => write!(f, "Color"),
            ImageClass::Normal => write!(f, "Normal"),
            ImageClass::MetallicRoughness => write!(f, "MetallicRoughness"),
            ImageClass::Data => write!(f, "Data"),
        }
    }
}
