// Drive classification: reconcile the primary and secondary sources into
// descriptors for the SSD/NVMe disks that can take a TRIM.

use super::descriptor::{DeviceDescriptor, MediaClass};
use super::sources::{
    PrimarySource, RawDisk, SecondaryOpinion, SecondarySource, MEDIA_CODE_SCM, MEDIA_CODE_SSD,
};
use std::thread;

/// Classify one disk.
///
/// A usable secondary media type is authoritative: SSD/SCM make the disk an
/// SSD, an NVMe bus makes it NVMe whatever the media says, anything else is
/// `Other`. Without one, fall back to the primary's model string, interface
/// hint and media code.
pub fn classify(disk: &RawDisk, secondary: Option<&SecondaryOpinion>) -> MediaClass {
    if let Some(opinion) = secondary {
        if let Some(media) = opinion.usable_media() {
            let nvme_bus = opinion
                .bus_type
                .as_deref()
                .is_some_and(|bus| bus.trim().eq_ignore_ascii_case("NVME"));

            if nvme_bus {
                return MediaClass::Nvme;
            }
            if media.eq_ignore_ascii_case("SSD") || media.eq_ignore_ascii_case("SCM") {
                return MediaClass::Ssd;
            }
            return MediaClass::Other;
        }
    }

    let model = disk.model.to_lowercase();
    if model.contains("nvme") || disk.interface_type.trim().eq_ignore_ascii_case("NVME") {
        MediaClass::Nvme
    } else if matches!(disk.media_code, Some(MEDIA_CODE_SSD) | Some(MEDIA_CODE_SCM)) {
        MediaClass::Ssd
    } else if model.contains("ssd") {
        MediaClass::Ssd
    } else {
        MediaClass::Other
    }
}

/// Enumerates physical disks and keeps the solid-state ones.
///
/// Source failures never abort enumeration: a failing secondary query or
/// volume lookup degrades that one disk, a failing primary yields an empty
/// list.
pub struct DriveClassifier {
    primary: Box<dyn PrimarySource>,
    secondary: Box<dyn SecondarySource>,
}

impl DriveClassifier {
    pub fn new(primary: Box<dyn PrimarySource>, secondary: Box<dyn SecondarySource>) -> Self {
        Self { primary, secondary }
    }

    /// Classifier over the host platform's sources
    pub fn for_platform() -> Self {
        let (primary, secondary) = super::sources::platform_sources();
        Self::new(primary, secondary)
    }

    /// SSD and NVMe descriptors in primary enumeration order
    pub fn enumerate(&self) -> Vec<DeviceDescriptor> {
        let disks = match self.primary.disks() {
            Ok(disks) => disks,
            Err(e) => {
                tracing::error!(source = self.primary.name(), error = %e, "Drive enumeration failed");
                return Vec::new();
            }
        };
        tracing::debug!(source = self.primary.name(), count = disks.len(), "Enumerated physical disks");

        let opinions = self.query_secondaries(&disks);

        let mut descriptors = Vec::new();
        for (disk, opinion) in disks.into_iter().zip(opinions) {
            let class = classify(&disk, opinion.as_ref());
            if class == MediaClass::Other {
                tracing::info!(
                    device = %disk.device_path,
                    model = %disk.model,
                    "Skipping non-SSD drive"
                );
                continue;
            }

            let volumes = self.volumes(&disk);
            descriptors.push(Self::describe(disk, opinion, class, volumes));
        }

        if descriptors.is_empty() {
            tracing::warn!("No SSD/NVMe drives suitable for TRIM");
        }
        descriptors
    }

    /// Secondary opinions, one slot per disk and in the same order.
    ///
    /// Queries are spread over at most one scoped thread per CPU.
    fn query_secondaries(&self, disks: &[RawDisk]) -> Vec<Option<SecondaryOpinion>> {
        if disks.is_empty() {
            return Vec::new();
        }

        let workers = num_cpus::get().clamp(1, disks.len());
        let batch_size = disks.len().div_ceil(workers);

        thread::scope(|scope| {
            let handles: Vec<_> = disks
                .chunks(batch_size)
                .map(|batch| {
                    let handle = scope.spawn(move || {
                        batch.iter().map(|disk| self.query_one(disk)).collect::<Vec<_>>()
                    });
                    (batch.len(), handle)
                })
                .collect();

            handles
                .into_iter()
                .flat_map(|(len, handle)| {
                    handle.join().unwrap_or_else(|_| {
                        tracing::error!("Secondary query worker panicked");
                        vec![None; len]
                    })
                })
                .collect()
        })
    }

    fn query_one(&self, disk: &RawDisk) -> Option<SecondaryOpinion> {
        let Some(index) = disk.index else {
            tracing::warn!(
                device = %disk.device_path,
                "No enumeration index, skipping {} query",
                self.secondary.name()
            );
            return None;
        };

        match self.secondary.query(index, &disk.device_path) {
            Ok(opinion) => Some(opinion),
            Err(e) => {
                tracing::warn!(
                    device = %disk.device_path,
                    index,
                    source = self.secondary.name(),
                    error = %e,
                    "Secondary media query failed, falling back to primary data"
                );
                None
            }
        }
    }

    fn volumes(&self, disk: &RawDisk) -> Vec<String> {
        match self.primary.volumes(disk) {
            Ok(mut volumes) => {
                volumes.sort();
                volumes.dedup();
                volumes
            }
            Err(e) => {
                tracing::warn!(device = %disk.device_path, error = %e, "Volume lookup failed");
                Vec::new()
            }
        }
    }

    fn describe(
        disk: RawDisk,
        opinion: Option<SecondaryOpinion>,
        class: MediaClass,
        volumes: Vec<String>,
    ) -> DeviceDescriptor {
        let (secondary_media, secondary_bus) = opinion
            .map(|o| (o.media_type, o.bus_type))
            .unwrap_or((None, None));

        DeviceDescriptor {
            device_path: disk.device_path,
            model: disk.model,
            serial: disk.serial,
            firmware: disk.firmware,
            capacity_bytes: disk.capacity_bytes,
            logical_block_size: disk.logical_block_size,
            index: disk.index,
            interface_type: disk.interface_type,
            media_code: disk.media_code,
            secondary_media,
            secondary_bus,
            class,
            volumes,
        }
    }
}
