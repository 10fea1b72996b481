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

//! Drives the asset residency manager against a mock uploader: registers a
//! handful of "textures", oscillates the working set, and logs how the
//! policy pages them in and out of a small budget.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use anyhow::Context;
use selene_assets::{
    AssetId, AssetInstantiator, AssetResidencyManager, CostReporter, ImageClass, ResidencyConfig,
    PERSISTENT_PRIORITY,
};
use selene_core::task::{TaskGroup, TaskHandle};
use selene_core::vfs::{MemoryFilesystem, SourceHandle};

/// Pretend uploader: "decodes" for a moment on the task group, then reports
/// the source size as the resource cost.
#[derive(Default)]
struct MockUploader {
    resident: Mutex<HashMap<u32, u64>>,
}

impl AssetInstantiator for MockUploader {
    fn set_id_bounds(&self, _bound: u32) {}

    fn set_image_class(&self, id: AssetId, class: ImageClass) {
        log::debug!("uploader: {id} registered as {class}");
    }

    fn estimate_cost(&self, _id: AssetId, source: &SourceHandle) -> u64 {
        source.size_hint().unwrap_or(0)
    }

    fn instantiate(
        &self,
        costs: &CostReporter,
        task: Option<&mut TaskHandle<'_>>,
        id: AssetId,
        source: &SourceHandle,
    ) {
        let cost = self.estimate_cost(id, source);
        let costs = costs.clone();
        let upload = move || {
            thread::sleep(Duration::from_millis(2));
            costs.report_cost(id, cost);
        };
        match task {
            Some(task) => task.attach(upload),
            None => upload(),
        }
        self.resident.lock().unwrap().insert(id.value(), cost);
        log::info!("uploader: instantiating {id} ({cost} bytes)");
    }

    fn release(&self, id: AssetId) {
        self.resident.lock().unwrap().remove(&id.value());
        log::info!("uploader: released {id}");
    }

    fn latch_handles(&self) {}
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    let mut fs = MemoryFilesystem::new();
    fs.insert_bytes("textures/terrain_albedo.ktx2", vec![0u8; 96 * 1024]);
    fs.insert_bytes("textures/terrain_normal.ktx2", vec![0u8; 96 * 1024]);
    fs.insert_bytes("textures/character_albedo.ktx2", vec![0u8; 64 * 1024]);
    fs.insert_bytes("textures/character_mr.ktx2", vec![0u8; 48 * 1024]);
    fs.insert_bytes("textures/ui_atlas.ktx2", vec![0u8; 32 * 1024]);

    let group = TaskGroup::new(2);
    let manager = AssetResidencyManager::with_config(ResidencyConfig {
        image_budget: 192 * 1024,
        image_budget_per_iteration: 128 * 1024,
        ..ResidencyConfig::default()
    });
    manager.bind_instantiator(Some(Arc::new(MockUploader::default())));

    let ui = manager
        .register_from_path(&fs, "textures/ui_atlas.ktx2", ImageClass::Color, PERSISTENT_PRIORITY)
        .context("registering the UI atlas")?;
    let terrain = [
        manager
            .register_from_path(&fs, "textures/terrain_albedo.ktx2", ImageClass::Color, 1)
            .context("registering terrain albedo")?,
        manager
            .register_from_path(&fs, "textures/terrain_normal.ktx2", ImageClass::Normal, 1)
            .context("registering terrain normals")?,
    ];
    let character = [
        manager
            .register_from_path(&fs, "textures/character_albedo.ktx2", ImageClass::Color, 2)
            .context("registering character albedo")?,
        manager
            .register_from_path(
                &fs,
                "textures/character_mr.ktx2",
                ImageClass::MetallicRoughness,
                2,
            )
            .context("registering character metallic-roughness")?,
    ];
    log::info!("registered {} assets", manager.usage_report().registered);

    // Oscillate between a terrain-heavy and a character-heavy working set
    // so the policy has something to evict.
    for frame in 0..24u32 {
        manager.mark_used(ui);
        let working_set: &[AssetId] = if (frame / 8) % 2 == 0 {
            &terrain
        } else {
            &character
        };
        for &id in working_set {
            manager.mark_used(id);
        }

        manager.iterate(Some(&group));
        thread::sleep(Duration::from_millis(10));

        let report = manager.usage_report();
        log::info!(
            "frame {frame:2}: {} resident, {} loading, {} / {} KiB",
            report.resident,
            report.loading,
            report.total_consumed_bytes / 1024,
            report.image_budget_bytes / 1024,
        );
    }

    Ok(())
}
