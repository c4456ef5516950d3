// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Crash-safe file publication.
//
// Every durable artifact is written to a uniquely named temp file in the
// destination directory, fsynced, and moved into place; the parent directory
// is fsynced afterwards.  Readers see either the old file or the complete new
// one, never a prefix.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::Path;

use shunya_core::error::{PersistStage, Result, ShunyaError};
use tempfile::NamedTempFile;
use tracing::debug;

/// Outcome of [`publish_new`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Published {
    Created,
    /// Something was already at the destination; it was left untouched.
    AlreadyExists,
}

/// Atomically replace `path` with `bytes`.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8], stage: PersistStage) -> Result<()> {
    let fail = |source| ShunyaError::PersistenceFailure {
        stage,
        path: path.to_path_buf(),
        source,
    };
    let staged = stage_file(path, bytes, false).map_err(fail)?;
    staged.persist(path).map_err(|e| fail(e.error))?;
    sync_parent(path).map_err(fail)?;
    debug!(path = %path.display(), len = bytes.len(), "file replaced atomically");
    Ok(())
}

/// Atomically create `path` with `bytes`, never overwriting an existing file.
///
/// Each caller stages its own uniquely named temp file, so concurrent
/// publishers never write into each other's inode.  With `private` set the
/// file is readable by its owner only.
pub(crate) fn publish_new(
    path: &Path,
    bytes: &[u8],
    private: bool,
    stage: PersistStage,
) -> Result<Published> {
    let fail = |source| ShunyaError::PersistenceFailure {
        stage,
        path: path.to_path_buf(),
        source,
    };
    let staged = stage_file(path, bytes, private).map_err(fail)?;
    match staged.persist_noclobber(path) {
        Ok(_) => {
            sync_parent(path).map_err(fail)?;
            Ok(Published::Created)
        }
        Err(e) if e.error.kind() == io::ErrorKind::AlreadyExists => Ok(Published::AlreadyExists),
        Err(e) => Err(fail(e.error)),
    }
}

fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

/// Fully written and fsynced temp file in the destination's directory.
/// Dropped without persisting, it is removed.
fn stage_file(path: &Path, bytes: &[u8], private: bool) -> io::Result<NamedTempFile> {
    let dir = parent_dir(path);
    fs::create_dir_all(dir)?;
    let mut staged = NamedTempFile::new_in(dir)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = if private { 0o600 } else { 0o644 };
        staged.as_file().set_permissions(fs::Permissions::from_mode(mode))?;
    }
    #[cfg(not(unix))]
    let _ = private;

    staged.write_all(bytes)?;
    staged.as_file().sync_all()?;
    Ok(staged)
}

#[cfg(unix)]
fn sync_parent(path: &Path) -> io::Result<()> {
    File::open(parent_dir(path))?.sync_all()
}

#[cfg(not(unix))]
fn sync_parent(_path: &Path) -> io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_atomic_replaces_contents_and_leaves_no_temp() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/chain.json");

        write_atomic(&path, b"[1]", PersistStage::Chain { nonce: 1 }).unwrap();
        write_atomic(&path, b"[1,2]", PersistStage::Chain { nonce: 2 }).unwrap();

        assert_eq!(fs::read(&path).unwrap(), b"[1,2]");
        let leftovers: Vec<_> = fs::read_dir(path.parent().unwrap())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(leftovers.len(), 1, "unexpected files: {leftovers:?}");
    }

    #[test]
    fn publish_new_never_clobbers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("key.pem");

        let first = publish_new(&path, b"first", true, PersistStage::KeyMaterial).unwrap();
        let second = publish_new(&path, b"second", true, PersistStage::KeyMaterial).unwrap();

        assert_eq!(first, Published::Created);
        assert_eq!(second, Published::AlreadyExists);
        assert_eq!(fs::read(&path).unwrap(), b"first");
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[cfg(unix)]
    #[test]
    fn private_files_are_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("key.pem");
        publish_new(&path, b"secret", true, PersistStage::KeyMaterial).unwrap();
        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o077, 0);
    }

    #[test]
    fn unwritable_destination_reports_stage() {
        let dir = tempfile::tempdir().unwrap();
        // A regular file where a directory is expected.
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, b"").unwrap();
        let path = blocker.join("chain.json");

        match write_atomic(&path, b"[]", PersistStage::Chain { nonce: 9 }) {
            Err(ShunyaError::PersistenceFailure { stage, .. }) => {
                assert_eq!(stage, PersistStage::Chain { nonce: 9 });
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn racing_publishers_agree_on_one_winner() {
        for _ in 0..20 {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("key.pem");

            let outcomes: Vec<(Vec<u8>, Published)> = std::thread::scope(|scope| {
                let handles: Vec<_> = (0..8u8)
                    .map(|i| {
                        let path = &path;
                        scope.spawn(move || {
                            let bytes = vec![i; 4096];
                            let published =
                                publish_new(path, &bytes, true, PersistStage::KeyMaterial).unwrap();
                            (bytes, published)
                        })
                    })
                    .collect();
                handles.into_iter().map(|h| h.join().unwrap()).collect()
            });

            let winners: Vec<_> = outcomes
                .iter()
                .filter(|(_, published)| *published == Published::Created)
                .collect();
            assert_eq!(winners.len(), 1);
            assert_eq!(fs::read(&path).unwrap(), winners[0].0);
            assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
        }
    }
}
