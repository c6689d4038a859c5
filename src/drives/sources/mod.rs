// Data sources the classifier reconciles
//
// - sysfs.rs: Linux primary source (/sys/block + /proc/mounts)
// - lsblk.rs: Linux secondary source (lsblk --json)
// - windows.rs: Windows primary (CIM Win32_DiskDrive) and secondary (Get-PhysicalDisk)

pub mod lsblk;
pub mod sysfs;
pub mod windows;

pub use lsblk::LsblkSource;
pub use sysfs::SysfsSource;
pub use windows::{CimDiskSource, PhysicalDiskSource};

use crate::{DriveError, DriveResult};
use serde::{Deserialize, Serialize};
use std::process::Command;

/// Primary media-type code meaning "SSD"
pub const MEDIA_CODE_SSD: u32 = 4;

/// Primary media-type code meaning "storage-class memory"
pub const MEDIA_CODE_SCM: u32 = 5;

/// One physical disk as reported by the primary source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawDisk {
    pub device_path: String,
    pub model: String,
    pub serial: Option<String>,
    pub firmware: Option<String>,
    pub capacity_bytes: u64,
    pub logical_block_size: u32,
    pub index: Option<u32>,
    pub interface_type: String,
    pub media_code: Option<u32>,
}

impl RawDisk {
    /// Minimal disk with everything optional left unset
    pub fn new(device_path: impl Into<String>, model: impl Into<String>, capacity_bytes: u64) -> Self {
        Self {
            device_path: device_path.into(),
            model: model.into(),
            serial: None,
            firmware: None,
            capacity_bytes,
            logical_block_size: 512,
            index: None,
            interface_type: "unknown".to_string(),
            media_code: None,
        }
    }
}

/// Media/bus opinion from the secondary source
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecondaryOpinion {
    pub media_type: Option<String>,
    pub bus_type: Option<String>,
}

impl SecondaryOpinion {
    pub fn new(media_type: Option<&str>, bus_type: Option<&str>) -> Self {
        Self {
            media_type: media_type.map(str::to_string),
            bus_type: bus_type.map(str::to_string),
        }
    }

    /// Media type, if it carries a usable value
    pub fn usable_media(&self) -> Option<&str> {
        self.media_type
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty() && !m.eq_ignore_ascii_case("N/A"))
    }
}

/// Enumerates physical disks and resolves their logical volumes
#[cfg_attr(test, mockall::automock)]
pub trait PrimarySource: Send + Sync {
    /// Source name for logs
    fn name(&self) -> &'static str;

    /// All physical disks, in enumeration order
    fn disks(&self) -> DriveResult<Vec<RawDisk>>;

    /// Logical volumes on `disk` (disk -> partitions -> volumes)
    fn volumes(&self, disk: &RawDisk) -> DriveResult<Vec<String>>;
}

/// Second opinion on media and bus type for one disk
#[cfg_attr(test, mockall::automock)]
pub trait SecondarySource: Send + Sync {
    fn name(&self) -> &'static str;

    fn query(&self, index: u32, device_path: &str) -> DriveResult<SecondaryOpinion>;
}

/// Sources appropriate for the host platform
pub fn platform_sources() -> (Box<dyn PrimarySource>, Box<dyn SecondarySource>) {
    if cfg!(windows) {
        (Box::new(CimDiskSource::new()), Box::new(PhysicalDiskSource::new()))
    } else {
        (Box::new(SysfsSource::default()), Box::new(LsblkSource::new()))
    }
}

/// Run an external tool and return its stdout.
///
/// Spawn failure, non-zero exit and empty output are all errors.
pub(crate) fn run_command(program: &str, args: &[&str]) -> DriveResult<String> {
    let mut cmd = Command::new(program);
    cmd.args(args);

    #[cfg(windows)]
    {
        use std::os::windows::process::CommandExt;
        const CREATE_NO_WINDOW: u32 = 0x08000000;
        cmd.creation_flags(CREATE_NO_WINDOW);
    }

    let output = cmd
        .output()
        .map_err(|e| DriveError::SourceUnavailable(format!("{}: {}", program, e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(DriveError::SourceQueryFailed(format!(
            "{} exited with {}: {}",
            program,
            output.status,
            stderr.trim()
        )));
    }

    let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if stdout.is_empty() {
        return Err(DriveError::MalformedResponse(format!(
            "{} produced no output",
            program
        )));
    }

    Ok(stdout)
}

/// Run a PowerShell snippet without profile or execution policy prompts
pub(crate) fn run_powershell(script: &str) -> DriveResult<String> {
    run_command(
        "powershell",
        &[
            "-NoProfile",
            "-ExecutionPolicy",
            "Bypass",
            "-Command",
            script,
        ],
    )
}

/// PowerShell's ConvertTo-Json emits a bare object for one result and an
/// array for several.
pub(crate) fn parse_json_list<T: serde::de::DeserializeOwned>(json: &str) -> DriveResult<Vec<T>> {
    let trimmed = json.trim();
    if trimmed.starts_with('[') {
        Ok(serde_json::from_str(trimmed)?)
    } else {
        Ok(vec![serde_json::from_str(trimmed)?])
    }
}
