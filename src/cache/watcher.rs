//! # Key Material Watcher
//!
//! Detects that a key file was replaced since the last check.
//!
//! Each file is fingerprinted by its length and the SHA-256 of its contents, so both
//! rename-over-existing and in-place rewrites are noticed regardless of mtime
//! granularity. Detection is edge-triggered: [`KeyMaterialWatcher::observe`] reports a
//! change exactly once, process-wide, and then reports nothing until the files change
//! again.

use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Cheap identity of a file's contents
#[derive(Debug, Clone, PartialEq, Eq)]
struct Fingerprint {
    len: u64,
    digest: [u8; 32],
}

impl Fingerprint {
    fn read(path: &Path) -> std::io::Result<Self> {
        let contents = zeroize::Zeroizing::new(std::fs::read(path)?);
        Ok(Self {
            len: contents.len() as u64,
            digest: Sha256::digest(contents.as_slice()).into(),
        })
    }
}

#[derive(Debug)]
struct WatchState {
    /// Last successfully read fingerprint per path; `None` until the file was readable
    fingerprints: Vec<Option<Fingerprint>>,
    last_check: Option<Instant>,
}

/// Watches the private and public key files for replacement
#[derive(Debug)]
pub struct KeyMaterialWatcher {
    paths: Vec<PathBuf>,
    min_interval: Duration,
    state: Mutex<WatchState>,
}

impl KeyMaterialWatcher {
    /// Start watching `paths`, capturing their current fingerprints
    ///
    /// Observations closer together than `min_interval` skip the disk and report no
    /// change. `Duration::ZERO` checks on every call.
    pub fn new<I, P>(paths: I, min_interval: Duration) -> Self
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let paths: Vec<PathBuf> = paths.into_iter().map(|p| p.as_ref().to_path_buf()).collect();
        let fingerprints = paths
            .iter()
            .map(|path| match Fingerprint::read(path) {
                Ok(fingerprint) => Some(fingerprint),
                Err(e) => {
                    warn!("Key file {} is not readable yet: {}", path.display(), e);
                    None
                }
            })
            .collect();

        info!("Watching {} key files for rotation", paths.len());
        Self {
            paths,
            min_interval,
            state: Mutex::new(WatchState {
                fingerprints,
                last_check: Some(Instant::now()),
            }),
        }
    }

    /// Watched paths
    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    /// Report whether any key file changed since the previous observation
    ///
    /// Returns `true` once per detected change. A file that cannot be read is treated
    /// as unchanged, its previous fingerprint is kept and the next call retries.
    pub fn observe(&self) -> bool {
        self.observe_and(|| {})
    }

    /// Like [`observe`](Self::observe), running `on_change` before any other observer
    /// can look at the files again
    ///
    /// A caller that gets `false` back from a concurrent observation therefore never
    /// runs ahead of the reaction to a change that was already detected.
    pub fn observe_and<F: FnOnce()>(&self, on_change: F) -> bool {
        // Fingerprint updates and `on_change` complete before the guard is released
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let changed = self.check(&mut state);
        if changed {
            on_change();
        }
        changed
    }

    fn check(&self, state: &mut WatchState) -> bool {

        let now = Instant::now();
        if let Some(last) = state.last_check {
            if !self.min_interval.is_zero() && now.duration_since(last) < self.min_interval {
                return false;
            }
        }
        state.last_check = Some(now);

        let mut changed = false;
        for (path, previous) in self.paths.iter().zip(state.fingerprints.iter_mut()) {
            match Fingerprint::read(path) {
                Ok(current) => {
                    if previous.as_ref() != Some(&current) {
                        info!("Key file {} changed", path.display());
                        *previous = Some(current);
                        changed = true;
                    }
                }
                Err(e) => {
                    warn!(
                        "Unable to read key file {} (rotation in progress?): {}",
                        path.display(),
                        e
                    );
                }
            }
        }
        changed
    }
}
