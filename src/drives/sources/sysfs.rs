use super::{PrimarySource, RawDisk, MEDIA_CODE_SSD};
use crate::{DriveError, DriveResult};
use std::fs;
use std::path::{Path, PathBuf};

/// Media code for rotational media
const MEDIA_CODE_HDD: u32 = 3;

/// sysfs reports `size` in 512-byte sectors regardless of the logical block size
const SYSFS_SECTOR: u64 = 512;

/// Linux primary source: physical disks from `/sys/block`, volumes from
/// partitions under each disk matched against `/proc/mounts`.
#[derive(Debug, Clone)]
pub struct SysfsSource {
    /// Filesystem root, `/` outside of tests
    root: PathBuf,
}

impl Default for SysfsSource {
    fn default() -> Self {
        Self::with_root("/")
    }
}

impl SysfsSource {
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn block_dir(&self) -> PathBuf {
        self.root.join("sys/block")
    }

    /// Loop devices, ram disks, device mapper, optical drives and zram are not disks
    pub(crate) fn should_skip_device(device_name: &str) -> bool {
        device_name.starts_with("loop")
            || device_name.starts_with("ram")
            || device_name.starts_with("dm-")
            || device_name.starts_with("sr")
            || device_name.starts_with("zram")
            || device_name.starts_with("md")
    }

    fn read_attr(path: &Path) -> Option<String> {
        fs::read_to_string(path)
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    }

    fn analyze(&self, name: &str, index: u32) -> DriveResult<RawDisk> {
        let dev_dir = self.block_dir().join(name);

        let sectors: u64 = Self::read_attr(&dev_dir.join("size"))
            .ok_or_else(|| DriveError::MalformedResponse(format!("{}: missing size", name)))?
            .parse()
            .map_err(|e| DriveError::MalformedResponse(format!("{}: bad size: {}", name, e)))?;
        let capacity_bytes = sectors.checked_mul(SYSFS_SECTOR).ok_or_else(|| {
            DriveError::MalformedResponse(format!("{}: size {} sectors overflows", name, sectors))
        })?;

        let model = Self::read_attr(&dev_dir.join("device/model"))
            .or_else(|| Self::read_attr(&dev_dir.join("device/vendor")))
            .unwrap_or_else(|| name.to_uppercase());

        let logical_block_size = Self::read_attr(&dev_dir.join("queue/logical_block_size"))
            .and_then(|s| s.parse().ok())
            .unwrap_or(512);

        let media_code = Self::read_attr(&dev_dir.join("queue/rotational")).map(|r| {
            if r == "0" {
                MEDIA_CODE_SSD
            } else {
                MEDIA_CODE_HDD
            }
        });

        Ok(RawDisk {
            device_path: format!("/dev/{}", name),
            model,
            serial: Self::read_attr(&dev_dir.join("device/serial")),
            firmware: Self::read_attr(&dev_dir.join("device/firmware_rev"))
                .or_else(|| Self::read_attr(&dev_dir.join("device/rev"))),
            capacity_bytes,
            logical_block_size,
            index: Some(index),
            interface_type: self.interface_type(name),
            media_code,
        })
    }

    fn interface_type(&self, name: &str) -> String {
        if name.starts_with("nvme") {
            return "NVMe".to_string();
        }
        if name.starts_with("mmcblk") {
            return "SD".to_string();
        }

        let link = self.block_dir().join(name).join("device");
        match fs::read_link(&link) {
            Ok(target) if target.to_string_lossy().contains("usb") => "USB".to_string(),
            Ok(_) => "SCSI".to_string(),
            Err(_) => "unknown".to_string(),
        }
    }

    /// Kernel names of `name` and its partitions
    fn partitions(&self, name: &str) -> DriveResult<Vec<String>> {
        let pattern = format!("{}/{}/{}*/partition", self.block_dir().display(), name, name);
        let paths = glob::glob(&pattern)
            .map_err(|e| DriveError::SourceQueryFailed(format!("bad glob {}: {}", pattern, e)))?;

        let mut parts = vec![name.to_string()];
        for path in paths.flatten() {
            if let Some(part) = path
                .parent()
                .and_then(|p| p.file_name())
                .and_then(|n| n.to_str())
            {
                parts.push(part.to_string());
            }
        }
        Ok(parts)
    }

    /// /proc/mounts escapes whitespace as octal
    fn unescape_mount(field: &str) -> String {
        field
            .replace("\\040", " ")
            .replace("\\011", "\t")
            .replace("\\134", "\\")
    }
}

impl PrimarySource for SysfsSource {
    fn name(&self) -> &'static str {
        "sysfs"
    }

    fn disks(&self) -> DriveResult<Vec<RawDisk>> {
        let block_dir = self.block_dir();
        let entries = fs::read_dir(&block_dir).map_err(|e| {
            DriveError::SourceUnavailable(format!("{}: {}", block_dir.display(), e))
        })?;

        let mut names: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.file_name().to_string_lossy().into_owned())
            .filter(|name| !Self::should_skip_device(name))
            .collect();
        names.sort();

        let mut disks = Vec::with_capacity(names.len());
        for (index, name) in names.iter().enumerate() {
            match self.analyze(name, index as u32) {
                Ok(disk) => disks.push(disk),
                Err(e) => tracing::warn!(device = %name, error = %e, "Skipping unreadable block device"),
            }
        }
        Ok(disks)
    }

    fn volumes(&self, disk: &RawDisk) -> DriveResult<Vec<String>> {
        let name = disk
            .device_path
            .rsplit('/')
            .next()
            .ok_or_else(|| DriveError::NotFound(disk.device_path.clone()))?;

        let partitions = self.partitions(name)?;
        let mounts = fs::read_to_string(self.root.join("proc/mounts"))?;

        let mut volumes = Vec::new();
        for line in mounts.lines() {
            let mut fields = line.split_whitespace();
            let (Some(source), Some(target)) = (fields.next(), fields.next()) else {
                continue;
            };
            let Some(source_name) = source.strip_prefix("/dev/") else {
                continue;
            };
            if partitions.iter().any(|p| p == source_name) {
                volumes.push(Self::unescape_mount(target));
            }
        }
        Ok(volumes)
    }
}
