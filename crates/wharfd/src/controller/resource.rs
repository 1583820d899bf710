//! The exclusive "server active" resource and its lease.

use std::fmt;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use thiserror::Error;

/// Failure to acquire the exclusive resource.
#[derive(Debug, Error)]
pub enum ResourceError {
    /// Another holder owns the resource.
    #[error("resource already held by {holder}")]
    Held {
        /// Description of the current holder.
        holder: String,
    },
    /// Creating or inspecting the backing file failed.
    #[error("failed to acquire resource at {path}: {source}")]
    Io {
        /// Backing file.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// The resource declined for a reason of its own.
    #[error("resource refused acquisition: {message}")]
    Refused {
        /// Reason given by the resource.
        message: String,
    },
}

/// A process-wide resource held while a lifecycle cycle is active.
pub trait ExclusiveResource: Send + Sync {
    /// Takes the resource, failing if it is already held.
    fn acquire(&self) -> Result<(), ResourceError>;

    /// Gives the resource back. Releasing a resource that is not held does
    /// nothing.
    fn release(&self);
}

/// Releases the resource exactly once when dropped.
pub(crate) struct ResourceLease {
    resource: Arc<dyn ExclusiveResource>,
}

impl ResourceLease {
    pub(crate) fn acquire(resource: &Arc<dyn ExclusiveResource>) -> Result<Self, ResourceError> {
        resource.acquire()?;
        Ok(Self {
            resource: Arc::clone(resource),
        })
    }
}

impl Drop for ResourceLease {
    fn drop(&mut self) {
        self.resource.release();
    }
}

impl fmt::Debug for ResourceLease {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str("ResourceLease")
    }
}

/// In-memory resource that counts acquisitions and releases.
///
/// Acquiring while held fails, so two overlapping cycles are detected
/// instead of silently sharing the resource.
#[derive(Debug, Default)]
pub struct CountingResource {
    held: AtomicBool,
    acquired: AtomicUsize,
    released: AtomicUsize,
}

impl CountingResource {
    /// Builds a released resource with zeroed counters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a lease currently holds the resource.
    #[must_use]
    pub fn is_held(&self) -> bool {
        self.held.load(Ordering::SeqCst)
    }

    /// Number of successful acquisitions.
    #[must_use]
    pub fn acquire_count(&self) -> usize {
        self.acquired.load(Ordering::SeqCst)
    }

    /// Number of releases that gave back a held resource.
    #[must_use]
    pub fn release_count(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }
}

impl ExclusiveResource for CountingResource {
    fn acquire(&self) -> Result<(), ResourceError> {
        if self
            .held
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(ResourceError::Held {
                holder: "another lifecycle cycle".to_owned(),
            });
        }
        self.acquired.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn release(&self) {
        if self.held.swap(false, Ordering::SeqCst) {
            self.released.fetch_add(1, Ordering::SeqCst);
        }
    }
}
