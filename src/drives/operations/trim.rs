use crate::config::{PrimitiveKind, TrimConfig};
use crate::trim_job::LbaRange;
use std::process::Command;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Why a discard call failed.
///
/// `Rejected` is scoped to the one range: the job marks that unit blocked
/// and moves on. Everything else means the device itself is gone or will
/// never accept a discard, so the job stops.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DiscardError {
    #[error("Discard rejected: {0}")]
    Rejected(String),

    #[error("Device lost: {0}")]
    DeviceLost(String),

    #[error("Discard not supported: {0}")]
    Unsupported(String),

    #[error("Permission denied: {0}")]
    Denied(String),
}

impl DiscardError {
    pub fn is_fatal(&self) -> bool {
        !matches!(self, DiscardError::Rejected(_))
    }

    /// Classify an errno from open(2) or ioctl(2)
    pub fn from_errno(errno: i32, context: &str) -> Self {
        let description = format!("{}: {}", context, std::io::Error::from_raw_os_error(errno));
        match errno {
            libc::ENODEV | libc::ENXIO | libc::ENOENT | libc::EBADF => {
                DiscardError::DeviceLost(description)
            }
            libc::EOPNOTSUPP | libc::ENOTTY => DiscardError::Unsupported(description),
            libc::EPERM | libc::EACCES | libc::EROFS => DiscardError::Denied(description),
            _ => DiscardError::Rejected(description),
        }
    }
}

/// Issues a discard for one LBA range of a block device
#[cfg_attr(test, mockall::automock)]
pub trait DiscardPrimitive: Send + Sync {
    fn name(&self) -> &'static str;

    fn discard(&self, device_path: &str, range: LbaRange, block_size: u32)
        -> Result<(), DiscardError>;
}

/// Byte offset and length of `range`, or `Rejected` if it overflows u64
fn byte_span(range: LbaRange, block_size: u32) -> Result<(u64, u64), DiscardError> {
    let block = u64::from(block_size);
    let offset = range.start.checked_mul(block);
    let length = range.count.checked_mul(block);
    match (offset, length) {
        (Some(offset), Some(length)) => Ok((offset, length)),
        _ => Err(DiscardError::Rejected(format!(
            "range {} overflows byte addressing at {} bytes per block",
            range, block_size
        ))),
    }
}

#[cfg(target_os = "linux")]
mod blk {
    // BLKDISCARD = _IO(0x12, 119), argument is {offset, length} in bytes
    nix::ioctl_write_ptr_bad!(blk_discard, nix::request_code_none!(0x12, 119), [u64; 2]);
}

/// BLKDISCARD ioctl straight on the block device
#[derive(Debug, Clone, Default)]
pub struct IoctlDiscard;

impl IoctlDiscard {
    pub fn new() -> Self {
        Self
    }
}

impl DiscardPrimitive for IoctlDiscard {
    fn name(&self) -> &'static str {
        "ioctl"
    }

    #[cfg(target_os = "linux")]
    fn discard(&self, device_path: &str, range: LbaRange, block_size: u32) -> Result<(), DiscardError> {
        use std::fs::OpenOptions;
        use std::os::unix::io::AsRawFd;

        if range.is_empty() {
            return Ok(());
        }
        let (offset, length) = byte_span(range, block_size)?;

        // BLKDISCARD needs the device open for writing
        let device = OpenOptions::new()
            .write(true)
            .open(device_path)
            .map_err(|e| match e.raw_os_error() {
                Some(errno) => DiscardError::from_errno(errno, &format!("open {}", device_path)),
                None => DiscardError::DeviceLost(format!("open {}: {}", device_path, e)),
            })?;

        let span = [offset, length];
        // SAFETY: the fd is open for the duration of the call and `span` outlives it
        unsafe { blk::blk_discard(device.as_raw_fd(), &span) }
            .map(|_| ())
            .map_err(|errno| {
                DiscardError::from_errno(
                    errno as i32,
                    &format!("BLKDISCARD {} bytes at {} on {}", length, offset, device_path),
                )
            })
    }

    #[cfg(not(target_os = "linux"))]
    fn discard(&self, device_path: &str, _range: LbaRange, _block_size: u32) -> Result<(), DiscardError> {
        Err(DiscardError::Unsupported(format!(
            "BLKDISCARD is Linux-only ({})",
            device_path
        )))
    }
}

/// Shells out to blkdiscard(8) for each range
#[derive(Debug, Clone, Default)]
pub struct BlkdiscardCommand;

impl BlkdiscardCommand {
    pub fn new() -> Self {
        Self
    }

    /// Map blkdiscard's stderr onto a discard error
    pub(crate) fn classify_failure(stderr: &str) -> DiscardError {
        let message = stderr.trim().to_string();
        let lower = message.to_lowercase();

        if lower.contains("operation not supported") || lower.contains("not supported") {
            DiscardError::Unsupported(message)
        } else if lower.contains("no such file") || lower.contains("no such device") {
            DiscardError::DeviceLost(message)
        } else if lower.contains("permission denied") || lower.contains("read-only") {
            DiscardError::Denied(message)
        } else {
            DiscardError::Rejected(message)
        }
    }
}

impl DiscardPrimitive for BlkdiscardCommand {
    fn name(&self) -> &'static str {
        "blkdiscard"
    }

    fn discard(&self, device_path: &str, range: LbaRange, block_size: u32) -> Result<(), DiscardError> {
        if range.is_empty() {
            return Ok(());
        }
        let (offset, length) = byte_span(range, block_size)?;

        let output = Command::new("blkdiscard")
            .args([
                "--offset",
                &offset.to_string(),
                "--length",
                &length.to_string(),
                device_path,
            ])
            .output()
            .map_err(|e| DiscardError::Unsupported(format!("blkdiscard unavailable: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Self::classify_failure(&stderr));
        }

        Ok(())
    }
}

/// Dry run: touches nothing, every range succeeds after `delay`
#[derive(Debug, Clone)]
pub struct SimulatedDiscard {
    delay: Duration,
}

impl SimulatedDiscard {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

impl DiscardPrimitive for SimulatedDiscard {
    fn name(&self) -> &'static str {
        "simulated"
    }

    fn discard(&self, device_path: &str, range: LbaRange, _block_size: u32) -> Result<(), DiscardError> {
        tracing::trace!(device = %device_path, %range, "Simulated discard");
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        Ok(())
    }
}

/// Build the primitive selected by `kind`
pub fn primitive_for(kind: PrimitiveKind, config: &TrimConfig) -> Arc<dyn DiscardPrimitive> {
    match kind {
        PrimitiveKind::Ioctl => Arc::new(IoctlDiscard::new()),
        PrimitiveKind::Blkdiscard => Arc::new(BlkdiscardCommand::new()),
        PrimitiveKind::Simulated => Arc::new(SimulatedDiscard::new(config.simulated_delay)),
    }
}
