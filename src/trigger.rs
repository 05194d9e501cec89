use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{info, warn};

pub trait AbnormalTrigger: Send + Sync {
    /// Returns `true` if a signal was pending, clearing it.
    fn take(&self) -> bool;
}

/// In-process flag.
#[derive(Debug, Default)]
pub struct FlagTrigger {
    armed: AtomicBool,
}

impl FlagTrigger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arm(&self) {
        self.armed.store(true, Ordering::SeqCst);
    }

    pub fn is_armed(&self) -> bool {
        self.armed.load(Ordering::SeqCst)
    }
}

impl AbnormalTrigger for FlagTrigger {
    fn take(&self) -> bool {
        self.armed.swap(false, Ordering::SeqCst)
    }
}

/// Marker file on disk. Creating the file arms the trigger; consuming it removes the file.
#[derive(Debug, Clone)]
pub struct FileTrigger {
    path: PathBuf,
}

impl FileTrigger {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl AbnormalTrigger for FileTrigger {
    fn take(&self) -> bool {
        if !self.path.exists() {
            return false;
        }

        info!("Trigger file {} detected, forcing abnormal reading", self.path.display());
        if let Err(e) = std::fs::remove_file(&self.path) {
            warn!(
                "Could not remove trigger file {}: {}",
                self.path.display(),
                e
            );
        }
        true
    }
}

/// Never fires. Used when no trigger file is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoTrigger;

impl AbnormalTrigger for NoTrigger {
    fn take(&self) -> bool {
        false
    }
}
