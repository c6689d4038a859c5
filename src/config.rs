// Runtime configuration
//
// Layered the usual way: built-in defaults, then an optional TOML file,
// then LBATRIM_* environment variables. CLI flags are applied on top by main.

use crate::trim_job::{ChunkPlan, JobOptions};
use crate::{DriveError, DriveResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default number of work units a device is split into
pub const DEFAULT_UNITS: usize = 100;

/// Default progress grid: 20 x 30 = 600 cells
pub const DEFAULT_GRID_ROWS: usize = 20;
pub const DEFAULT_GRID_COLUMNS: usize = 30;

const ENV_PREFIX: &str = "LBATRIM";

/// Which discard primitive the job drives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrimitiveKind {
    /// BLKDISCARD ioctl on the block device (Linux)
    Ioctl,
    /// Shell out to blkdiscard(8) per range
    Blkdiscard,
    /// No device access; every range succeeds after a delay
    Simulated,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrimConfig {
    pub units: usize,
    pub grid_rows: usize,
    pub grid_columns: usize,
    #[serde(with = "duration_str")]
    pub pause_poll_interval: Duration,
    pub max_blocked_units: Option<usize>,
    pub max_blocks_per_call: Option<u64>,
    pub primitive: PrimitiveKind,
    #[serde(with = "duration_str")]
    pub simulated_delay: Duration,
}

impl Default for TrimConfig {
    fn default() -> Self {
        Self {
            units: DEFAULT_UNITS,
            grid_rows: DEFAULT_GRID_ROWS,
            grid_columns: DEFAULT_GRID_COLUMNS,
            pause_poll_interval: Duration::from_millis(500),
            max_blocked_units: None,
            max_blocks_per_call: None,
            primitive: PrimitiveKind::Ioctl,
            simulated_delay: Duration::from_millis(100),
        }
    }
}

impl TrimConfig {
    /// Load configuration from `path` (or the per-user default location) and
    /// the environment. A missing file is not an error.
    pub fn load(path: Option<&Path>) -> DriveResult<Self> {
        let file = path.map(Path::to_path_buf).or_else(Self::default_path);

        let mut builder = ::config::Config::builder();
        if let Some(file) = file {
            tracing::debug!(path = %file.display(), "Reading configuration file");
            builder = builder.add_source(::config::File::from(file).required(path.is_some()));
        }
        builder = builder.add_source(
            ::config::Environment::with_prefix(ENV_PREFIX).try_parsing(true),
        );

        let config: TrimConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// `$XDG_CONFIG_HOME/lbatrim/config.toml` or the platform equivalent
    pub fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "lbatrim")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    pub fn validate(&self) -> DriveResult<()> {
        if self.units == 0 {
            return Err(DriveError::InvalidConfig("units must be positive".into()));
        }
        if self.cells() == 0 {
            return Err(DriveError::InvalidConfig(
                "grid_rows and grid_columns must be positive".into(),
            ));
        }
        if self.pause_poll_interval.is_zero() {
            return Err(DriveError::InvalidConfig(
                "pause_poll_interval must be non-zero".into(),
            ));
        }
        if self.max_blocks_per_call == Some(0) {
            return Err(DriveError::InvalidConfig(
                "max_blocks_per_call must be positive when set".into(),
            ));
        }
        Ok(())
    }

    pub fn cells(&self) -> usize {
        self.grid_rows.saturating_mul(self.grid_columns)
    }

    pub fn chunk_plan(&self) -> DriveResult<ChunkPlan> {
        ChunkPlan::new(self.units, self.cells())
    }

    pub fn job_options(&self) -> JobOptions {
        JobOptions {
            pause_poll_interval: self.pause_poll_interval,
            max_blocked_units: self.max_blocked_units,
            max_blocks_per_call: self.max_blocks_per_call,
        }
    }
}

/// Durations as humantime strings ("500ms", "2s")
mod duration_str {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&humantime::format_duration(*value).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let raw = String::deserialize(deserializer)?;
        humantime::parse_duration(&raw).map_err(serde::de::Error::custom)
    }
}
