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

//! Virtual filesystem layer.
//!
//! Subsystems that track assets do not read bytes themselves; they hold an
//! opaque [`SourceHandle`] and forward it to whatever component knows how to
//! decode and upload the data. This module defines that handle, the
//! [`Filesystem`] capability used to resolve paths into handles, and the two
//! stock implementations: [`DiskFilesystem`] over `std::fs` and
//! [`MemoryFilesystem`] for tests and tools.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// An opened, decodable origin for asset data.
///
/// The handle is opaque to bookkeeping code; loaders downcast via
/// [`as_any`](AssetSource::as_any) to reach the concrete source.
pub trait AssetSource: fmt::Debug + Send + Sync {
    /// Size of the underlying data in bytes, if knowable without decoding.
    fn size_hint(&self) -> Option<u64> {
        None
    }

    /// Downcast support for concrete loader implementations.
    fn as_any(&self) -> &dyn Any;
}

/// Shared ownership of an [`AssetSource`].
pub type SourceHandle = Arc<dyn AssetSource>;

/// Capability to resolve a path into an opened source.
pub trait Filesystem: Send + Sync {
    /// Opens `path`, returning `None` when the source does not exist or
    /// cannot be opened.
    fn open(&self, path: &str) -> Option<SourceHandle>;
}

/// An asset source backed by an opened file on disk.
#[derive(Debug)]
pub struct FileSource {
    file: fs::File,
    path: PathBuf,
    len: u64,
}

impl FileSource {
    /// Opens `path` for reading and records its length.
    pub fn open(path: impl Into<PathBuf>) -> io::Result<Self> {
        let path = path.into();
        let file = fs::File::open(&path)?;
        let len = file.metadata()?.len();
        Ok(Self { file, path, len })
    }

    /// The path this source was opened from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The opened file.
    pub fn file(&self) -> &fs::File {
        &self.file
    }
}

impl AssetSource for FileSource {
    fn size_hint(&self) -> Option<u64> {
        Some(self.len)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// A [`Filesystem`] over the host filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiskFilesystem;

impl DiskFilesystem {
    /// Creates a disk filesystem.
    pub fn new() -> Self {
        Self
    }
}

impl Filesystem for DiskFilesystem {
    fn open(&self, path: &str) -> Option<SourceHandle> {
        match FileSource::open(path) {
            Ok(source) => Some(Arc::new(source)),
            Err(e) => {
                log::warn!("failed to open asset source '{path}': {e}");
                None
            }
        }
    }
}

/// An asset source holding its bytes in memory.
#[derive(Debug)]
pub struct MemorySource {
    label: String,
    bytes: Vec<u8>,
}

impl MemorySource {
    /// Creates a source over `bytes`, labelled for diagnostics.
    pub fn new(label: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            label: label.into(),
            bytes,
        }
    }

    /// The diagnostic label.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// The raw bytes.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl AssetSource for MemorySource {
    fn size_hint(&self) -> Option<u64> {
        Some(self.bytes.len() as u64)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// A [`Filesystem`] serving sources from an in-memory map.
///
/// The runtime equivalent of a packed asset index: paths are registered up
/// front and every `open` is an O(1) lookup. Used by tests and the sandbox.
#[derive(Debug, Default)]
pub struct MemoryFilesystem {
    files: HashMap<String, SourceHandle>,
}

impl MemoryFilesystem {
    /// Creates an empty filesystem.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `source` under `path`, replacing any previous entry.
    pub fn insert(&mut self, path: impl Into<String>, source: SourceHandle) {
        self.files.insert(path.into(), source);
    }

    /// Registers an in-memory source of `bytes` under `path`.
    pub fn insert_bytes(&mut self, path: impl Into<String>, bytes: Vec<u8>) {
        let path = path.into();
        let source = Arc::new(MemorySource::new(path.clone(), bytes));
        self.files.insert(path, source);
    }
}

impl Filesystem for MemoryFilesystem {
    fn open(&self, path: &str) -> Option<SourceHandle> {
        self.files.get(path).cloned()
    }
}
