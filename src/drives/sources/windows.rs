// Windows sources, both driven through PowerShell and parsed from JSON.
//
// Primary: CIM Win32_DiskDrive, plus the ASSOCIATORS OF hops
//   Win32_DiskDrive -> Win32_DiskPartition -> Win32_LogicalDisk for drive letters.
// Secondary: Storage module Get-PhysicalDisk (MediaType / BusType).

use super::{parse_json_list, run_powershell, PrimarySource, RawDisk, SecondaryOpinion, SecondarySource};
use crate::{DriveError, DriveResult};
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Deserialize)]
struct CimDiskDrive {
    #[serde(rename = "DeviceID")]
    device_id: String,
    #[serde(rename = "Index")]
    index: Option<u32>,
    #[serde(rename = "Model")]
    model: Option<String>,
    #[serde(rename = "SerialNumber")]
    serial_number: Option<String>,
    #[serde(rename = "FirmwareRevision")]
    firmware_revision: Option<String>,
    #[serde(rename = "Size")]
    size: Option<u64>,
    #[serde(rename = "BytesPerSector")]
    bytes_per_sector: Option<u32>,
    #[serde(rename = "InterfaceType")]
    interface_type: Option<String>,
    #[serde(rename = "MediaType", default)]
    media_type: Value,
}

#[derive(Debug, Deserialize)]
struct PhysicalDisk {
    #[serde(rename = "MediaType", default)]
    media_type: Value,
    #[serde(rename = "BusType", default)]
    bus_type: Value,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

/// Windows primary source over CIM
#[derive(Debug, Clone, Default)]
pub struct CimDiskSource;

impl CimDiskSource {
    pub fn new() -> Self {
        Self
    }

    pub(crate) fn parse_disks(json: &str) -> DriveResult<Vec<RawDisk>> {
        let drives: Vec<CimDiskDrive> = parse_json_list(json)?;
        Ok(drives
            .into_iter()
            .map(|d| RawDisk {
                model: non_empty(d.model).unwrap_or_else(|| "N/A".to_string()),
                serial: non_empty(d.serial_number),
                firmware: non_empty(d.firmware_revision),
                capacity_bytes: d.size.unwrap_or(0),
                logical_block_size: d.bytes_per_sector.filter(|b| *b > 0).unwrap_or(512),
                index: d.index,
                interface_type: non_empty(d.interface_type)
                    .unwrap_or_else(|| "unknown".to_string()),
                // Win32_DiskDrive usually reports a descriptive string here;
                // only a numeric code is meaningful to the classifier
                media_code: d.media_type.as_u64().and_then(|c| u32::try_from(c).ok()),
                device_path: d.device_id,
            })
            .collect())
    }

    /// Drive letters come back as one JSON string or an array of them
    pub(crate) fn parse_volumes(json: &str) -> DriveResult<Vec<String>> {
        parse_json_list(json)
    }

    /// WQL object paths need backslashes doubled: \\.\PHYSICALDRIVE0 -> \\\\.\\PHYSICALDRIVE0
    pub(crate) fn wql_escape(device_id: &str) -> String {
        device_id.replace('\\', "\\\\").replace('\'', "\\'")
    }

    fn volumes_script(device_id: &str) -> String {
        format!(
            "Get-CimInstance -Query \"ASSOCIATORS OF {{Win32_DiskDrive.DeviceID='{}'}} WHERE AssocClass = Win32_DiskDriveToDiskPartition\" | \
             ForEach-Object {{ Get-CimInstance -Query \"ASSOCIATORS OF {{Win32_DiskPartition.DeviceID='$($_.DeviceID)'}} WHERE AssocClass = Win32_LogicalDiskToPartition\" }} | \
             Select-Object -ExpandProperty DeviceID | ConvertTo-Json -Compress",
            Self::wql_escape(device_id)
        )
    }
}

impl PrimarySource for CimDiskSource {
    fn name(&self) -> &'static str {
        "cim"
    }

    fn disks(&self) -> DriveResult<Vec<RawDisk>> {
        let json = run_powershell(
            "Get-CimInstance -ClassName Win32_DiskDrive | \
             Select-Object DeviceID, Index, Model, SerialNumber, FirmwareRevision, Size, BytesPerSector, InterfaceType, MediaType | \
             ConvertTo-Json -Compress",
        )?;
        Self::parse_disks(&json)
    }

    fn volumes(&self, disk: &RawDisk) -> DriveResult<Vec<String>> {
        match run_powershell(&Self::volumes_script(&disk.device_path)) {
            Ok(json) => Self::parse_volumes(&json),
            // No partitions or no letters: PowerShell prints nothing
            Err(DriveError::MalformedResponse(_)) => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }
}

/// Windows secondary source over Get-PhysicalDisk
#[derive(Debug, Clone, Default)]
pub struct PhysicalDiskSource;

impl PhysicalDiskSource {
    pub fn new() -> Self {
        Self
    }

    /// MSFT_PhysicalDisk.MediaType enum values
    fn media_name(code: u64) -> Option<&'static str> {
        match code {
            0 => Some("Unspecified"),
            3 => Some("HDD"),
            4 => Some("SSD"),
            5 => Some("SCM"),
            _ => None,
        }
    }

    /// MSFT_PhysicalDisk.BusType enum values
    fn bus_name(code: u64) -> Option<&'static str> {
        match code {
            1 => Some("SCSI"),
            3 => Some("ATA"),
            7 => Some("USB"),
            8 => Some("RAID"),
            9 => Some("iSCSI"),
            10 => Some("SAS"),
            11 => Some("SATA"),
            12 => Some("SD"),
            13 => Some("MMC"),
            17 => Some("NVMe"),
            18 => Some("SCM"),
            _ => None,
        }
    }

    /// Windows PowerShell 5.1 serializes these enums as integers, PowerShell 7 as names
    fn enum_text(value: &Value, names: fn(u64) -> Option<&'static str>) -> Option<String> {
        match value {
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Value::Number(n) => n.as_u64().and_then(names).map(str::to_string),
            _ => None,
        }
    }

    pub(crate) fn parse(json: &str) -> DriveResult<SecondaryOpinion> {
        let disks: Vec<PhysicalDisk> = parse_json_list(json)?;
        let disk = disks.into_iter().next().ok_or_else(|| {
            DriveError::MalformedResponse("Get-PhysicalDisk returned an empty list".into())
        })?;

        Ok(SecondaryOpinion {
            media_type: Self::enum_text(&disk.media_type, Self::media_name),
            bus_type: Self::enum_text(&disk.bus_type, Self::bus_name),
        })
    }
}

impl SecondarySource for PhysicalDiskSource {
    fn name(&self) -> &'static str {
        "Get-PhysicalDisk"
    }

    fn query(&self, index: u32, device_path: &str) -> DriveResult<SecondaryOpinion> {
        tracing::debug!(index, device = %device_path, "Querying Get-PhysicalDisk");
        let json = run_powershell(&format!(
            "Get-PhysicalDisk -DeviceNumber {} | Select-Object MediaType, BusType | ConvertTo-Json -Compress",
            index
        ))?;
        Self::parse(&json)
    }
}
