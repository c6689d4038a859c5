use serde::{Deserialize, Serialize};

/// Reconciled media class of a physical disk.
///
/// NVMe implies solid state, so the two flags the rest of the crate asks
/// about can never disagree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MediaClass {
    Nvme,
    Ssd,
    Other,
}

impl MediaClass {
    pub fn is_ssd(self) -> bool {
        matches!(self, MediaClass::Nvme | MediaClass::Ssd)
    }

    pub fn is_nvme(self) -> bool {
        self == MediaClass::Nvme
    }
}

/// Normalized, immutable view of one physical storage device.
///
/// Produced in bulk by [`DriveClassifier::enumerate`](super::DriveClassifier::enumerate);
/// a rescan yields fresh descriptors instead of mutating these.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceDescriptor {
    /// Handle used for device operations, e.g. `/dev/nvme0n1` or `\\.\PHYSICALDRIVE0`
    pub device_path: String,
    pub model: String,
    pub serial: Option<String>,
    pub firmware: Option<String>,
    pub capacity_bytes: u64,
    pub logical_block_size: u32,
    /// Enumeration index; `None` means the secondary source was never asked
    pub index: Option<u32>,
    /// Interface hint from the primary source ("unknown" when absent)
    pub interface_type: String,
    /// Raw media-type code from the primary source
    pub media_code: Option<u32>,
    pub secondary_media: Option<String>,
    pub secondary_bus: Option<String>,
    pub class: MediaClass,
    /// Mount letters / mount points, deduplicated and sorted
    pub volumes: Vec<String>,
}

impl DeviceDescriptor {
    pub fn is_ssd(&self) -> bool {
        self.class.is_ssd()
    }

    pub fn is_nvme(&self) -> bool {
        self.class.is_nvme()
    }

    pub fn capacity_gb(&self) -> f64 {
        self.capacity_bytes as f64 / (1024.0 * 1024.0 * 1024.0)
    }

    /// Number of addressable logical blocks
    pub fn total_lbas(&self) -> u64 {
        self.capacity_bytes / u64::from(self.logical_block_size.max(1))
    }

    /// Short type label: "NVMe SSD", "SATA SSD", "SSD", "HDD" or "Drive"
    pub fn kind_label(&self) -> &'static str {
        let bus_is_sata = self
            .secondary_bus
            .as_deref()
            .is_some_and(|bus| bus.to_uppercase().contains("SATA"));
        let media_is_hdd = self
            .secondary_media
            .as_deref()
            .is_some_and(|media| media.to_uppercase().contains("HDD"));

        match self.class {
            MediaClass::Nvme => "NVMe SSD",
            MediaClass::Ssd if bus_is_sata => "SATA SSD",
            MediaClass::Ssd => "SSD",
            MediaClass::Other if media_is_hdd => "HDD",
            MediaClass::Other => "Drive",
        }
    }

    /// One-line name for selection lists
    pub fn display_name(&self) -> String {
        let location = if self.volumes.is_empty() {
            self.device_path.clone()
        } else {
            self.volumes.join(", ")
        };
        format!(
            "{} ({}, {:.2} GB) - {}",
            self.model,
            self.kind_label(),
            self.capacity_gb(),
            location
        )
    }
}
