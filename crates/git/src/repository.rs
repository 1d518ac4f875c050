use anyhow::Context as _;
use parking_lot::{Mutex, MutexGuard, RwLock};
use std::collections::VecDeque;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Maximum number of opened repositories retained by [`RepositoryCache`].
const CACHE_CAPACITY: usize = 50;

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("no git repository found under '{}'", path.display())]
    NotFound { path: PathBuf },
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// An opened repository.
///
/// `git2::Repository` is `Send` but not `Sync`, so the handle guards it with
/// a mutex; callers take the lock only for short object-database reads. A
/// handle stays valid for as long as any caller retains it, independent of
/// the cache's own reference.
pub struct RepositoryHandle {
    root: PathBuf,
    work_dir: PathBuf,
    repository: Mutex<git2::Repository>,
}

impl RepositoryHandle {
    fn open(root: PathBuf) -> Result<Self, RepositoryError> {
        let repository = git2::Repository::open(&root)
            .with_context(|| format!("failed to open git repository at '{}'", root.display()))?;
        // Bare repositories have no work tree; external git invocations fall
        // back to the discovered root there.
        let work_dir = repository
            .workdir()
            .map(Path::to_owned)
            .unwrap_or_else(|| root.clone());
        Ok(Self {
            root,
            work_dir,
            repository: Mutex::new(repository),
        })
    }

    /// The discovered repository path (normally the `.git` directory).
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The working directory external `git` commands run in.
    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    pub fn lock(&self) -> MutexGuard<'_, git2::Repository> {
        self.repository.lock()
    }
}

impl std::fmt::Debug for RepositoryHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RepositoryHandle")
            .field("root", &self.root)
            .finish_non_exhaustive()
    }
}

/// A bounded, recency-ordered cache of opened repository handles.
///
/// Many requests share a small number of expensive opens. The fast path is a
/// linear scan under a read lock; misses take the write lock and re-check
/// before opening, so concurrent requests for the same uncached path perform
/// exactly one open. Eviction drops only the cache's reference; outstanding
/// handles keep working.
pub struct RepositoryCache {
    entries: RwLock<VecDeque<Arc<RepositoryHandle>>>,
    capacity: usize,
}

impl Default for RepositoryCache {
    fn default() -> Self {
        Self::new()
    }
}

impl RepositoryCache {
    pub fn new() -> Self {
        Self::with_capacity(CACHE_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: RwLock::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    /// Discovers the repository enclosing `path` and returns a shared handle
    /// to it, opening the repository only when no cached handle exists for
    /// the discovered root.
    pub fn get_or_open(&self, path: &Path) -> Result<Arc<RepositoryHandle>, RepositoryError> {
        let root = discover_root(path)?;

        {
            let entries = self.entries.read();
            if let Some(handle) = entries.iter().find(|handle| handle.root() == root) {
                return Ok(handle.clone());
            }
        }

        let mut entries = self.entries.write();
        // Another request may have opened the same repository while we
        // waited for the write lock.
        if let Some(handle) = entries.iter().find(|handle| handle.root() == root) {
            return Ok(handle.clone());
        }

        log::debug!("opening git repository at '{}'", root.display());
        let handle = Arc::new(RepositoryHandle::open(root)?);
        if entries.len() == self.capacity {
            entries.pop_back();
        }
        entries.push_front(handle.clone());
        Ok(handle)
    }
}

fn discover_root(path: &Path) -> Result<PathBuf, RepositoryError> {
    git2::Repository::discover_path(path, std::iter::empty::<&OsStr>()).map_err(|_| {
        RepositoryError::NotFound {
            path: path.to_owned(),
        }
    })
}
