use super::{run_command, SecondaryOpinion, SecondarySource};
use crate::{DriveError, DriveResult};
use serde::Deserialize;
use serde_json::Value;

/// Linux secondary source backed by `lsblk --json`.
///
/// lsblk answers from udev's view of the device (rotational flag and
/// transport), which is independent of what sysfs' model strings claim.
/// The enumeration index is not needed here; devices are addressed by path.
#[derive(Debug, Clone, Default)]
pub struct LsblkSource;

#[derive(Debug, Deserialize)]
struct LsblkOutput {
    blockdevices: Vec<LsblkDevice>,
}

#[derive(Debug, Deserialize)]
struct LsblkDevice {
    #[serde(default)]
    rota: Value,
    #[serde(default)]
    tran: Option<String>,
}

impl LsblkSource {
    pub fn new() -> Self {
        Self
    }

    /// Turn lsblk's JSON into an opinion.
    ///
    /// `rota` is a boolean on util-linux >= 2.33 and a "0"/"1" string before that.
    pub(crate) fn parse(json: &str) -> DriveResult<SecondaryOpinion> {
        let output: LsblkOutput = serde_json::from_str(json)?;
        let device = output
            .blockdevices
            .into_iter()
            .next()
            .ok_or_else(|| DriveError::MalformedResponse("lsblk returned no devices".into()))?;

        let rotational = match &device.rota {
            Value::Bool(b) => Some(*b),
            Value::String(s) if s == "0" => Some(false),
            Value::String(s) if s == "1" => Some(true),
            Value::Number(n) => n.as_u64().map(|n| n != 0),
            _ => None,
        };

        Ok(SecondaryOpinion {
            media_type: rotational.map(|r| if r { "HDD" } else { "SSD" }.to_string()),
            bus_type: device
                .tran
                .filter(|t| !t.is_empty())
                .map(|t| t.to_uppercase()),
        })
    }
}

impl SecondarySource for LsblkSource {
    fn name(&self) -> &'static str {
        "lsblk"
    }

    fn query(&self, index: u32, device_path: &str) -> DriveResult<SecondaryOpinion> {
        tracing::debug!(index, device = %device_path, "Querying lsblk");
        let json = run_command(
            "lsblk",
            &["--json", "--nodeps", "--output", "NAME,ROTA,TRAN", device_path],
        )?;
        Self::parse(&json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_nvme_boolean_rota() {
        let json = r#"{"blockdevices": [{"name":"nvme0n1", "rota":false, "tran":"nvme"}]}"#;
        let opinion = LsblkSource::parse(json).unwrap();
        assert_eq!(opinion.media_type.as_deref(), Some("SSD"));
        assert_eq!(opinion.bus_type.as_deref(), Some("NVME"));
    }

    #[test]
    fn test_parse_legacy_string_rota() {
        let json = r#"{"blockdevices": [{"name":"sda", "rota":"1", "tran":"sata"}]}"#;
        let opinion = LsblkSource::parse(json).unwrap();
        assert_eq!(opinion.media_type.as_deref(), Some("HDD"));
        assert_eq!(opinion.bus_type.as_deref(), Some("SATA"));
    }

    #[test]
    fn test_parse_missing_fields() {
        let json = r#"{"blockdevices": [{"name":"vda", "tran":null}]}"#;
        let opinion = LsblkSource::parse(json).unwrap();
        assert_eq!(opinion, SecondaryOpinion::default());
    }

    #[test]
    fn test_parse_empty_device_list() {
        let result = LsblkSource::parse(r#"{"blockdevices": []}"#);
        assert!(matches!(result, Err(DriveError::MalformedResponse(_))));
    }
}
