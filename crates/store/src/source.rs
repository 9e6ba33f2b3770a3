use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::SystemTime;

use gatewarden_common::{GatewardenError, GatewardenResult, Policy};
use tracing::debug;

/// Where policy records live.
///
/// A source must round-trip the full record field set (id, endpoint,
/// client_key, network, tier, limit, window_secs, priority) without loss,
/// and its `write` must be atomic with respect to concurrent readers.
pub trait PolicySource: Send + Sync {
    fn read(&self) -> GatewardenResult<Vec<Policy>>;
    fn write(&self, policies: &[Policy]) -> GatewardenResult<()>;
    /// Last-modified stamp used by the change watcher. `None` when the
    /// source does not exist yet or cannot be inspected.
    fn modified(&self) -> Option<SystemTime>;
}

impl<S: PolicySource> PolicySource for std::sync::Arc<S> {
    fn read(&self) -> GatewardenResult<Vec<Policy>> {
        (**self).read()
    }

    fn write(&self, policies: &[Policy]) -> GatewardenResult<()> {
        (**self).write(policies)
    }

    fn modified(&self) -> Option<SystemTime> {
        (**self).modified()
    }
}

/// Policy records in a YAML file: a list of one record per policy.
pub struct FilePolicySource {
    path: PathBuf,
}

impl FilePolicySource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = OsString::from(self.path.as_os_str());
        name.push(".tmp");
        PathBuf::from(name)
    }
}

impl PolicySource for FilePolicySource {
    fn read(&self) -> GatewardenResult<Vec<Policy>> {
        let content = std::fs::read_to_string(&self.path)?;
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }
        Ok(serde_yaml::from_str(&content)?)
    }

    /// Write-to-temporary-then-rename, so a concurrent reader never
    /// observes a partially written file.
    fn write(&self, policies: &[Policy]) -> GatewardenResult<()> {
        let content = serde_yaml::to_string(policies)?;
        let tmp = self.tmp_path();
        std::fs::write(&tmp, content)?;
        std::fs::rename(&tmp, &self.path)?;
        debug!(path = %self.path.display(), count = policies.len(), "policy file written");
        Ok(())
    }

    fn modified(&self) -> Option<SystemTime> {
        std::fs::metadata(&self.path)
            .and_then(|meta| meta.modified())
            .ok()
    }
}

/// An in-memory source for tests and embedded setups.
pub struct MemorySource {
    records: Mutex<Vec<Policy>>,
    stamp: Mutex<SystemTime>,
    fail_reads: std::sync::atomic::AtomicBool,
}

impl MemorySource {
    pub fn new(policies: Vec<Policy>) -> Self {
        Self {
            records: Mutex::new(policies),
            stamp: Mutex::new(SystemTime::now()),
            fail_reads: std::sync::atomic::AtomicBool::new(false),
        }
    }

    /// Replace the records out-of-band, as an external writer would.
    pub fn set(&self, policies: Vec<Policy>) {
        *self.records.lock().expect("records lock poisoned") = policies;
        *self.stamp.lock().expect("stamp lock poisoned") = SystemTime::now();
    }

    /// Make subsequent reads fail, simulating an unreadable source.
    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads
            .store(fail, std::sync::atomic::Ordering::SeqCst);
    }
}

impl PolicySource for MemorySource {
    fn read(&self) -> GatewardenResult<Vec<Policy>> {
        if self.fail_reads.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(GatewardenError::Source("memory source unavailable".into()));
        }
        Ok(self.records.lock().expect("records lock poisoned").clone())
    }

    fn write(&self, policies: &[Policy]) -> GatewardenResult<()> {
        self.set(policies.to_vec());
        Ok(())
    }

    fn modified(&self) -> Option<SystemTime> {
        Some(*self.stamp.lock().expect("stamp lock poisoned"))
    }
}
