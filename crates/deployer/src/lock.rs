//! File-based deploy lock.
//!
//! The lock is a file created with `create_new`, so two deployers racing for
//! it cannot both succeed. A lock whose file is older than the maximum
//! deploy duration is treated as left behind by a crashed deploy and is
//! reclaimed; a crashed holder and a slow one are not distinguished.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime};

use smartdiary_deploy_core::lock::{classify_lock, lock_age, LockInfo, LockState};

use crate::error::{DeployError, Result};

/// How often `acquire` re-checks a held lock.
const ACQUIRE_POLL: Duration = Duration::from_secs(1);

/// Distinguishes reclaim attempts made by the same process.
static RECLAIM_SEQ: AtomicU64 = AtomicU64::new(0);

/// Snapshot of the lock file, as reported by `inspect`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockStatus {
    Free,
    Held {
        age: Duration,
        state: LockState,
        holder: Option<LockInfo>,
    },
}

/// Result of a single acquisition attempt.
#[derive(Debug)]
pub enum AcquireAttempt {
    Acquired(LockGuard),
    Held {
        age: Duration,
        holder: Option<LockInfo>,
    },
}

/// Advisory lock guarding deploy attempts.
#[derive(Debug, Clone)]
pub struct DeployLock {
    path: PathBuf,
    stale_after: Duration,
    poll: Duration,
}

impl DeployLock {
    pub fn new(path: impl Into<PathBuf>, stale_after: Duration) -> Self {
        Self {
            path: path.into(),
            stale_after,
            poll: ACQUIRE_POLL,
        }
    }

    /// Overrides the re-check interval used while waiting.
    pub fn with_poll_interval(mut self, poll: Duration) -> Self {
        self.poll = poll;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// One attempt: create the lock, reclaiming it first if stale.
    pub fn try_acquire(&self, info: &LockInfo) -> Result<AcquireAttempt> {
        match self.create(info) {
            Ok(guard) => return Ok(AcquireAttempt::Acquired(guard)),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {}
            Err(e) => return Err(self.lock_error(e)),
        }

        let age = match self.age() {
            Ok(age) => age,
            // Released between our create and the metadata call
            Err(e) if e.kind() == ErrorKind::NotFound => Duration::ZERO,
            Err(e) => return Err(self.lock_error(e)),
        };

        if classify_lock(age, self.stale_after) == LockState::Fresh {
            return Ok(AcquireAttempt::Held {
                age,
                holder: self.read_holder(),
            });
        }

        tracing::warn!(
            path = %self.path.display(),
            age_secs = age.as_secs(),
            stale_after_secs = self.stale_after.as_secs(),
            holder = ?self.read_holder(),
            "Reclaiming stale deploy lock"
        );
        if !self.reclaim()? {
            return Ok(AcquireAttempt::Held {
                age: Duration::ZERO,
                holder: self.read_holder(),
            });
        }

        match self.create(info) {
            Ok(guard) => Ok(AcquireAttempt::Acquired(guard)),
            // Another deployer reclaimed it first
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(AcquireAttempt::Held {
                age: Duration::ZERO,
                holder: self.read_holder(),
            }),
            Err(e) => Err(self.lock_error(e)),
        }
    }

    /// Moves a lock judged stale out of the way.
    ///
    /// The file is renamed to a private name first and its age checked again
    /// there, so a fresh lock another deployer created after our check is put
    /// back instead of deleted. Returns false when the lock was not removed.
    fn reclaim(&self) -> Result<bool> {
        let aside = self.aside_path();
        match fs::rename(&self.path, &aside) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(true),
            Err(e) => return Err(self.lock_error(e)),
        }

        let age = fs::metadata(&aside)
            .and_then(|m| m.modified())
            .map(|modified| lock_age(modified, SystemTime::now()))
            .map_err(|e| self.lock_error(e))?;

        if classify_lock(age, self.stale_after) == LockState::Stale {
            remove_if_exists(&aside).map_err(|e| self.lock_error(e))?;
            return Ok(true);
        }

        // Hard link fails if yet another lock appeared in the meantime
        if let Err(e) = fs::hard_link(&aside, &self.path) {
            if e.kind() != ErrorKind::AlreadyExists {
                tracing::error!(path = %self.path.display(), error = %e, "Failed to restore deploy lock");
            }
        }
        remove_if_exists(&aside).map_err(|e| self.lock_error(e))?;
        Ok(false)
    }

    fn aside_path(&self) -> PathBuf {
        let seq = RECLAIM_SEQ.fetch_add(1, Ordering::Relaxed);
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(format!(".stale.{}.{seq}", std::process::id()));
        self.path.with_file_name(name)
    }

    /// Retries `try_acquire` until `wait` elapses.
    ///
    /// Returns `None` when a fresh lock is still held at the deadline; the
    /// caller skips this poll instead of deploying alongside the holder.
    pub async fn acquire(&self, info: &LockInfo, wait: Duration) -> Result<Option<LockGuard>> {
        // `None` for a wait too long to represent, which never expires
        let deadline = tokio::time::Instant::now().checked_add(wait);

        loop {
            match self.try_acquire(info)? {
                AcquireAttempt::Acquired(guard) => return Ok(Some(guard)),
                AcquireAttempt::Held { age, holder } => {
                    let now = tokio::time::Instant::now();
                    if deadline.is_some_and(|deadline| now >= deadline) {
                        tracing::info!(
                            age_secs = age.as_secs(),
                            holder_pid = holder.as_ref().map(|h| h.pid),
                            "Deploy lock is held by another deploy"
                        );
                        return Ok(None);
                    }
                    tracing::debug!(age_secs = age.as_secs(), "Waiting for deploy lock");
                    let pause = match deadline {
                        Some(deadline) => self.poll.min(deadline - now),
                        None => self.poll,
                    };
                    tokio::time::sleep(pause).await;
                }
            }
        }
    }

    /// Reports whether the lock is held without touching it.
    pub fn inspect(&self) -> Result<LockStatus> {
        match self.age() {
            Ok(age) => Ok(LockStatus::Held {
                age,
                state: classify_lock(age, self.stale_after),
                holder: self.read_holder(),
            }),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(LockStatus::Free),
            Err(e) => Err(self.lock_error(e)),
        }
    }

    /// Removes the lock regardless of age. Returns whether a file existed.
    pub fn force_release(&self) -> Result<bool> {
        remove_if_exists(&self.path).map_err(|e| self.lock_error(e))
    }

    fn create(&self, info: &LockInfo) -> std::io::Result<LockGuard> {
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&self.path)?;
        // From here on the guard owns the file and removes it on any error.
        let guard = LockGuard {
            path: self.path.clone(),
            released: false,
        };
        let json = info.to_json().map_err(std::io::Error::other)?;
        file.write_all(json.as_bytes())?;
        file.sync_all()?;
        Ok(guard)
    }

    fn age(&self) -> std::io::Result<Duration> {
        let modified = fs::metadata(&self.path)?.modified()?;
        Ok(lock_age(modified, SystemTime::now()))
    }

    fn read_holder(&self) -> Option<LockInfo> {
        fs::read_to_string(&self.path)
            .ok()
            .and_then(|contents| LockInfo::from_json(&contents))
    }

    fn lock_error(&self, source: std::io::Error) -> DeployError {
        DeployError::Lock {
            path: self.path.clone(),
            source,
        }
    }
}

/// Held deploy lock. The file is removed on `release` or on drop.
#[derive(Debug)]
pub struct LockGuard {
    path: PathBuf,
    released: bool,
}

impl LockGuard {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Removes the lock file. A file that is already gone is not an error.
    pub fn release(mut self) -> Result<()> {
        self.released = true;
        remove_if_exists(&self.path)
            .map(|_| ())
            .map_err(|source| DeployError::Lock {
                path: self.path.clone(),
                source,
            })
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if let Err(e) = remove_if_exists(&self.path) {
            tracing::error!(
                path = %self.path.display(),
                error = %e,
                "Failed to remove deploy lock"
            );
        }
    }
}

fn remove_if_exists(path: &Path) -> std::io::Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::fs::File;

    const TIMEOUT: Duration = Duration::from_secs(30 * 60);

    fn info(pid: u32) -> LockInfo {
        LockInfo::new(pid, Utc::now(), None)
    }

    fn setup() -> (tempfile::TempDir, DeployLock) {
        let dir = tempfile::tempdir().unwrap();
        let lock = DeployLock::new(dir.path().join("deploy.lock"), TIMEOUT)
            .with_poll_interval(Duration::from_millis(10));
        (dir, lock)
    }

    fn backdate(path: &Path, by: Duration) {
        let file = File::options().write(true).open(path).unwrap();
        file.set_modified(SystemTime::now() - by).unwrap();
    }

    #[test]
    fn test_acquire_free_lock_writes_holder() {
        let (_dir, lock) = setup();

        let attempt = lock.try_acquire(&info(42)).unwrap();
        let AcquireAttempt::Acquired(guard) = attempt else {
            panic!("expected lock to be acquired");
        };

        let contents = fs::read_to_string(guard.path()).unwrap();
        assert_eq!(LockInfo::from_json(&contents).unwrap().pid, 42);
    }

    #[test]
    fn test_fresh_lock_is_not_taken() {
        let (_dir, lock) = setup();
        fs::write(lock.path(), info(7).to_json().unwrap()).unwrap();
        backdate(lock.path(), Duration::from_secs(60));

        match lock.try_acquire(&info(42)).unwrap() {
            AcquireAttempt::Held { age, holder } => {
                assert!(age >= Duration::from_secs(60));
                assert_eq!(holder.unwrap().pid, 7);
            }
            AcquireAttempt::Acquired(_) => panic!("fresh lock must not be acquired"),
        }

        // The holder's file is untouched
        let contents = fs::read_to_string(lock.path()).unwrap();
        assert_eq!(LockInfo::from_json(&contents).unwrap().pid, 7);
    }

    #[tokio::test]
    async fn test_acquire_skips_when_fresh_lock_outlives_wait() {
        let (_dir, lock) = setup();
        fs::write(lock.path(), info(7).to_json().unwrap()).unwrap();

        let guard = lock
            .acquire(&info(42), Duration::from_millis(50))
            .await
            .unwrap();

        assert!(guard.is_none());
        assert!(lock.path().exists());
    }

    #[tokio::test]
    async fn test_acquire_waits_for_release() {
        let (_dir, lock) = setup();
        let AcquireAttempt::Acquired(holder) = lock.try_acquire(&info(7)).unwrap() else {
            panic!("expected lock to be acquired");
        };

        let releaser = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            holder.release().unwrap();
        });

        let guard = lock
            .acquire(&info(42), Duration::from_secs(5))
            .await
            .unwrap();
        releaser.await.unwrap();

        assert!(guard.is_some());
    }

    #[test]
    fn test_stale_lock_is_reclaimed() {
        let (_dir, lock) = setup();
        fs::write(lock.path(), info(7).to_json().unwrap()).unwrap();
        backdate(lock.path(), TIMEOUT + Duration::from_secs(60));

        let AcquireAttempt::Acquired(guard) = lock.try_acquire(&info(42)).unwrap() else {
            panic!("stale lock must be reclaimed");
        };

        let contents = fs::read_to_string(guard.path()).unwrap();
        assert_eq!(LockInfo::from_json(&contents).unwrap().pid, 42);
    }

    #[test]
    fn test_stale_lock_with_garbage_contents_is_reclaimed() {
        let (_dir, lock) = setup();
        fs::write(lock.path(), "12345\n").unwrap();
        backdate(lock.path(), TIMEOUT * 2);

        assert!(matches!(
            lock.try_acquire(&info(42)).unwrap(),
            AcquireAttempt::Acquired(_)
        ));
    }

    #[test]
    fn test_release_removes_file() {
        let (_dir, lock) = setup();
        let AcquireAttempt::Acquired(guard) = lock.try_acquire(&info(42)).unwrap() else {
            panic!("expected lock to be acquired");
        };

        guard.release().unwrap();
        assert!(!lock.path().exists());
    }

    #[test]
    fn test_release_tolerates_missing_file() {
        let (_dir, lock) = setup();
        let AcquireAttempt::Acquired(guard) = lock.try_acquire(&info(42)).unwrap() else {
            panic!("expected lock to be acquired");
        };

        fs::remove_file(lock.path()).unwrap();
        assert!(guard.release().is_ok());
    }

    #[test]
    fn test_drop_removes_file() {
        let (_dir, lock) = setup();
        {
            let _guard = lock.try_acquire(&info(42)).unwrap();
            assert!(lock.path().exists());
        }
        assert!(!lock.path().exists());
    }

    #[test]
    fn test_inspect() {
        let (_dir, lock) = setup();
        assert_eq!(lock.inspect().unwrap(), LockStatus::Free);

        fs::write(lock.path(), info(9).to_json().unwrap()).unwrap();
        backdate(lock.path(), TIMEOUT * 2);

        match lock.inspect().unwrap() {
            LockStatus::Held { state, holder, .. } => {
                assert_eq!(state, LockState::Stale);
                assert_eq!(holder.unwrap().pid, 9);
            }
            LockStatus::Free => panic!("lock file exists"),
        }
    }

    #[test]
    fn test_force_release() {
        let (_dir, lock) = setup();
        assert!(!lock.force_release().unwrap());

        fs::write(lock.path(), info(9).to_json().unwrap()).unwrap();
        assert!(lock.force_release().unwrap());
        assert!(!lock.path().exists());
    }

    fn dir_entries(lock: &DeployLock) -> Vec<String> {
        let dir = lock.path().parent().unwrap();
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_reclaim_removes_stale_lock_without_leftovers() {
        let (_dir, lock) = setup();
        fs::write(lock.path(), info(7).to_json().unwrap()).unwrap();
        backdate(lock.path(), TIMEOUT * 2);

        assert!(lock.reclaim().unwrap());
        assert!(dir_entries(&lock).is_empty());
    }

    #[test]
    fn test_reclaim_puts_back_a_lock_replaced_after_the_age_check() {
        let (_dir, lock) = setup();
        // Another deployer swapped in its own fresh lock after we saw a stale one
        fs::write(lock.path(), info(7).to_json().unwrap()).unwrap();

        assert!(!lock.reclaim().unwrap());

        let contents = fs::read_to_string(lock.path()).unwrap();
        assert_eq!(LockInfo::from_json(&contents).unwrap().pid, 7);
        assert_eq!(dir_entries(&lock), vec!["deploy.lock".to_string()]);
    }

    #[test]
    fn test_reclaim_of_vanished_lock_frees_it() {
        let (_dir, lock) = setup();
        assert!(lock.reclaim().unwrap());
    }

    #[tokio::test]
    async fn test_acquire_with_unbounded_wait() {
        let (_dir, lock) = setup();

        let guard = lock.acquire(&info(42), Duration::MAX).await.unwrap();

        assert!(guard.is_some());
    }
}
