#![allow(dead_code)]
/// Recording discard primitive
///
/// Records every range it is handed and fails the ranges it was told to.
use lbatrim::drives::operations::{DiscardError, DiscardPrimitive};
use lbatrim::trim_job::LbaRange;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Default)]
pub struct RecordingDiscard {
    calls: Arc<Mutex<Vec<(String, LbaRange, u32)>>>,
    failures: HashMap<u64, DiscardError>,
    delay: Duration,
}

impl RecordingDiscard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the call whose range starts at `start_lba`
    pub fn fail_at(mut self, start_lba: u64, error: DiscardError) -> Self {
        self.failures.insert(start_lba, error);
        self
    }

    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Handle on the call log, readable after the primitive is moved into a job
    pub fn calls(&self) -> Arc<Mutex<Vec<(String, LbaRange, u32)>>> {
        Arc::clone(&self.calls)
    }
}

impl DiscardPrimitive for RecordingDiscard {
    fn name(&self) -> &'static str {
        "recording"
    }

    fn discard(&self, device_path: &str, range: LbaRange, block_size: u32) -> Result<(), DiscardError> {
        self.calls
            .lock()
            .unwrap()
            .push((device_path.to_string(), range, block_size));
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        match self.failures.get(&range.start) {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }
}
