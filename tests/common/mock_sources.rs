#![allow(dead_code)]
/// Scripted drive sources
///
/// Stand in for sysfs/lsblk or CIM/Get-PhysicalDisk so enumeration can be
/// exercised without touching the host's disks.
use lbatrim::drives::{PrimarySource, RawDisk, SecondaryOpinion, SecondarySource};
use lbatrim::{DeviceDescriptor, DriveError, DriveResult, MediaClass};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Builder for a scripted primary source
#[derive(Default)]
pub struct MockPrimaryBuilder {
    disks: Vec<RawDisk>,
    volumes: HashMap<String, Vec<String>>,
    failing_volumes: Vec<String>,
    unavailable: bool,
}

impl MockPrimaryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn disk(mut self, disk: RawDisk) -> Self {
        self.disks.push(disk);
        self
    }

    pub fn volumes(mut self, device_path: &str, volumes: &[&str]) -> Self {
        self.volumes.insert(
            device_path.to_string(),
            volumes.iter().map(|v| v.to_string()).collect(),
        );
        self
    }

    pub fn failing_volumes(mut self, device_path: &str) -> Self {
        self.failing_volumes.push(device_path.to_string());
        self
    }

    pub fn unavailable(mut self) -> Self {
        self.unavailable = true;
        self
    }

    pub fn build(self) -> MockPrimary {
        MockPrimary {
            disks: self.disks,
            volumes: self.volumes,
            failing_volumes: self.failing_volumes,
            unavailable: self.unavailable,
        }
    }
}

pub struct MockPrimary {
    disks: Vec<RawDisk>,
    volumes: HashMap<String, Vec<String>>,
    failing_volumes: Vec<String>,
    unavailable: bool,
}

impl PrimarySource for MockPrimary {
    fn name(&self) -> &'static str {
        "mock-primary"
    }

    fn disks(&self) -> DriveResult<Vec<RawDisk>> {
        if self.unavailable {
            return Err(DriveError::SourceUnavailable("mock primary offline".into()));
        }
        Ok(self.disks.clone())
    }

    fn volumes(&self, disk: &RawDisk) -> DriveResult<Vec<String>> {
        if self.failing_volumes.contains(&disk.device_path) {
            return Err(DriveError::SourceQueryFailed("association query failed".into()));
        }
        Ok(self.volumes.get(&disk.device_path).cloned().unwrap_or_default())
    }
}

/// Secondary source answering from a table keyed by enumeration index
#[derive(Default)]
pub struct MockSecondary {
    answers: HashMap<u32, Result<SecondaryOpinion, String>>,
    queries: Arc<AtomicUsize>,
}

impl MockSecondary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn answer(mut self, index: u32, media: Option<&str>, bus: Option<&str>) -> Self {
        self.answers.insert(index, Ok(SecondaryOpinion::new(media, bus)));
        self
    }

    pub fn fail(mut self, index: u32, reason: &str) -> Self {
        self.answers.insert(index, Err(reason.to_string()));
        self
    }

    /// Shared counter of queries made, readable after the source is boxed
    pub fn query_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.queries)
    }
}

impl SecondarySource for MockSecondary {
    fn name(&self) -> &'static str {
        "mock-secondary"
    }

    fn query(&self, index: u32, _device_path: &str) -> DriveResult<SecondaryOpinion> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        match self.answers.get(&index) {
            Some(Ok(opinion)) => Ok(opinion.clone()),
            Some(Err(reason)) => Err(DriveError::SourceQueryFailed(reason.clone())),
            None => Err(DriveError::MalformedResponse(format!("no answer for index {}", index))),
        }
    }
}

/// Raw disk with an index and 512 GiB capacity
pub fn raw_disk(device_path: &str, model: &str, index: Option<u32>) -> RawDisk {
    RawDisk {
        index,
        ..RawDisk::new(device_path, model, 512 * 1024 * 1024 * 1024)
    }
}

/// Classified NVMe descriptor as enumeration would produce it
pub fn nvme_descriptor(device_path: &str, capacity_bytes: u64) -> DeviceDescriptor {
    DeviceDescriptor {
        device_path: device_path.to_string(),
        model: "Mock NVMe SSD".to_string(),
        serial: Some("MOCK-0001".to_string()),
        firmware: Some("1.0".to_string()),
        capacity_bytes,
        logical_block_size: 512,
        index: Some(0),
        interface_type: "NVMe".to_string(),
        media_code: Some(4),
        secondary_media: Some("SSD".to_string()),
        secondary_bus: Some("NVMe".to_string()),
        class: MediaClass::Nvme,
        volumes: Vec::new(),
    }
}
