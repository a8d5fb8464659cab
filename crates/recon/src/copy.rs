//! Idempotent artifact transfer into the output tree.

use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use std::thread;
use std::time::Duration;

use crate::error::FiltrationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyOutcome {
    /// Destination already existed; nothing written.
    AlreadyPresent,
    /// Hard-linked on the same volume.
    Linked,
    /// Full byte copy.
    Copied,
}

/// Retry budget for permission failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    /// Sleep before retry n is `n * backoff`.
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff: Duration::from_millis(250),
        }
    }
}

/// Create `path` and its parents. An existing directory is fine; an existing
/// file anywhere on the way is a [`FiltrationError::DirectoryCollision`].
pub fn ensure_dir(path: &Path) -> Result<(), FiltrationError> {
    if path.is_dir() {
        return Ok(());
    }
    for ancestor in path.ancestors() {
        if ancestor.as_os_str().is_empty() {
            continue;
        }
        match fs::metadata(ancestor) {
            Ok(meta) if meta.is_dir() => break,
            Ok(_) => return Err(FiltrationError::DirectoryCollision(ancestor.to_path_buf())),
            Err(_) => continue,
        }
    }
    fs::create_dir_all(path).map_err(|e| FiltrationError::io("cannot create directory", path, e))?;
    log::debug!("created directory {}", path.display());
    Ok(())
}

/// Copy `src` to `dst`.
///
/// Missing `src` fails immediately. An existing `dst` counts as done. A hard
/// link is tried first, then a byte copy; permission failures on the copy
/// are retried up to `policy.max_retries` times with linear backoff, every
/// other failure is returned as-is.
pub fn copy_artifact(src: &Path, dst: &Path, policy: &RetryPolicy) -> Result<CopyOutcome, FiltrationError> {
    copy_with(src, dst, policy, transfer_once)
}

fn copy_with<F>(src: &Path, dst: &Path, policy: &RetryPolicy, mut transfer: F) -> Result<CopyOutcome, FiltrationError>
where
    F: FnMut(&Path, &Path) -> std::io::Result<CopyOutcome>,
{
    if !src.is_file() {
        return Err(FiltrationError::io(
            "source artifact missing",
            src,
            std::io::Error::new(ErrorKind::NotFound, "no such file"),
        ));
    }
    if dst.exists() {
        log::debug!("{} already present, skipping", dst.display());
        return Ok(CopyOutcome::AlreadyPresent);
    }
    if let Some(parent) = dst.parent() {
        ensure_dir(parent)?;
    }

    let mut attempt = 0u32;
    loop {
        match transfer(src, dst) {
            Ok(outcome) => return Ok(outcome),
            Err(e) if e.kind() == ErrorKind::PermissionDenied && attempt < policy.max_retries => {
                attempt += 1;
                let wait = policy.backoff * attempt;
                log::warn!(
                    "permission denied copying {} (attempt {}/{}), retrying in {:?}",
                    src.display(),
                    attempt,
                    policy.max_retries,
                    wait
                );
                thread::sleep(wait);
            }
            Err(e) => return Err(FiltrationError::io("cannot copy artifact to", dst, e)),
        }
    }
}

fn transfer_once(src: &Path, dst: &Path) -> std::io::Result<CopyOutcome> {
    match fs::hard_link(src, dst) {
        Ok(()) => return Ok(CopyOutcome::Linked),
        // Another attempt (or a resumed job) got there first.
        Err(e) if e.kind() == ErrorKind::AlreadyExists => return Ok(CopyOutcome::AlreadyPresent),
        Err(e) => log::debug!("hard link {} failed ({e}), falling back to copy", src.display()),
    }
    fs::copy(src, dst).map(|_| CopyOutcome::Copied)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quick() -> RetryPolicy {
        RetryPolicy {
            max_retries: 2,
            backoff: Duration::from_millis(1),
        }
    }

    #[test]
    fn copies_and_creates_parents() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("Product.Alpha.2024-01-01.hrl");
        fs::write(&src, b"alpha").unwrap();
        let dst = dir.path().join("out/HRLS_1/Product/Product.Alpha.2024-01-01.hrl");

        let outcome = copy_artifact(&src, &dst, &quick()).unwrap();
        assert!(matches!(outcome, CopyOutcome::Linked | CopyOutcome::Copied));
        assert_eq!(fs::read(&dst).unwrap(), b"alpha");
    }

    #[test]
    fn second_copy_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("a.hrl");
        fs::write(&src, b"v1").unwrap();
        let dst = dir.path().join("out/a.hrl");

        copy_artifact(&src, &dst, &quick()).unwrap();
        let first = fs::read(&dst).unwrap();
        assert_eq!(copy_artifact(&src, &dst, &quick()).unwrap(), CopyOutcome::AlreadyPresent);
        assert_eq!(fs::read(&dst).unwrap(), first);
    }

    #[test]
    fn missing_source_fails_fast() {
        let dir = tempfile::tempdir().unwrap();
        let err = copy_artifact(&dir.path().join("nope.hrl"), &dir.path().join("out/nope.hrl"), &quick())
            .unwrap_err();
        match err {
            FiltrationError::Io { source, .. } => assert_eq!(source.kind(), ErrorKind::NotFound),
            other => panic!("expected Io, got {other:?}"),
        }
        assert!(!dir.path().join("out").exists());
    }

    fn denied() -> std::io::Error {
        std::io::Error::new(ErrorKind::PermissionDenied, "locked")
    }

    #[test]
    fn permission_denied_is_retried_until_it_clears() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("a.hrl");
        fs::write(&src, b"x").unwrap();

        let mut attempts = 0;
        let outcome = copy_with(&src, &dir.path().join("out/a.hrl"), &quick(), |_, _| {
            attempts += 1;
            if attempts <= 2 {
                Err(denied())
            } else {
                Ok(CopyOutcome::Copied)
            }
        })
        .unwrap();
        assert_eq!(outcome, CopyOutcome::Copied);
        assert_eq!(attempts, 3);
    }

    #[test]
    fn permission_denied_gives_up_after_max_retries() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("a.hrl");
        fs::write(&src, b"x").unwrap();
        let dst = dir.path().join("out/a.hrl");

        let mut attempts = 0;
        let err = copy_with(&src, &dst, &quick(), |_, _| {
            attempts += 1;
            Err(denied())
        })
        .unwrap_err();
        assert_eq!(attempts, 3);
        match err {
            FiltrationError::Io { path, source, .. } => {
                assert_eq!(path, dst);
                assert_eq!(source.kind(), ErrorKind::PermissionDenied);
            }
            other => panic!("expected Io, got {other:?}"),
        }
    }

    #[test]
    fn other_errors_are_not_retried() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("a.hrl");
        fs::write(&src, b"x").unwrap();

        let mut attempts = 0;
        let err = copy_with(&src, &dir.path().join("out/a.hrl"), &quick(), |_, _| {
            attempts += 1;
            Err(std::io::Error::new(ErrorKind::Other, "disk full"))
        })
        .unwrap_err();
        assert_eq!(attempts, 1);
        assert!(matches!(err, FiltrationError::Io { .. }));
    }

    #[test]
    fn ensure_dir_is_silent_for_existing_dir() {
        let dir = tempfile::tempdir().unwrap();
        ensure_dir(dir.path()).unwrap();
        ensure_dir(&dir.path().join("a/b")).unwrap();
        ensure_dir(&dir.path().join("a/b")).unwrap();
        assert!(dir.path().join("a/b").is_dir());
    }

    #[test]
    fn ensure_dir_rejects_file_in_the_way() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("Product");
        fs::write(&blocker, b"not a dir").unwrap();

        let err = ensure_dir(&blocker.join("nested")).unwrap_err();
        match err {
            FiltrationError::DirectoryCollision(p) => assert_eq!(p, blocker),
            other => panic!("expected DirectoryCollision, got {other:?}"),
        }
    }

    #[test]
    fn copy_into_collided_folder_fails() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("a.hrl");
        fs::write(&src, b"x").unwrap();
        fs::write(dir.path().join("out"), b"file").unwrap();

        let err = copy_artifact(&src, &dir.path().join("out/Product/a.hrl"), &quick()).unwrap_err();
        assert!(matches!(err, FiltrationError::DirectoryCollision(_)));
    }
}
