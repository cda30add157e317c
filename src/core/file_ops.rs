/*
 * Copy, move and delete of project trees within and across storage backends.
 *
 * Nothing is ever overwritten: a copy or move whose destination already exists is
 * refused before a single byte is written. A move is a copy followed by deleting the
 * source. When the copy succeeds but the source cannot be removed, the move reports
 * failure and the duplicate stays where it is; there is no rollback.
 */
use crate::core::location::{Handle, LazyHandle, ResolveError};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

const TRANSFER_BUFFER_SIZE: usize = 4096;

#[derive(Debug, Error)]
pub enum FileOpError {
    #[error(transparent)]
    NotResolvable(#[from] ResolveError),
    #[error("Source {0:?} does not exist")]
    SourceMissing(PathBuf),
    #[error("Destination {0:?} is occupied")]
    DestinationOccupied(PathBuf),
    #[error("Destination {0:?} lies inside the source")]
    DestinationInsideSource(PathBuf),
    #[error("Could not delete {path:?}: {source}")]
    DeleteFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, FileOpError>;

pub trait FileOpsOperations: Send + Sync {
    fn copy(&self, source: &LazyHandle, dest: &LazyHandle) -> Result<()>;

    /*
     * Moves `source` to `dest`. Refusals detected up front (unresolvable handles, a
     * missing source, an occupied destination) are errors; a move that was started
     * but could not be completed yields `Ok(false)`.
     */
    fn move_node(&self, source: &LazyHandle, dest: &LazyHandle) -> Result<bool>;

    fn delete(&self, target: &LazyHandle, suppress_failure: bool) -> Result<()>;
}

// Removes one node; directories are only ever removed once empty.
type RemoveFn = dyn Fn(&Path, bool) -> io::Result<()> + Send + Sync;

fn remove_node(path: &Path, is_dir: bool) -> io::Result<()> {
    if is_dir {
        fs::remove_dir(path)
    } else {
        fs::remove_file(path)
    }
}

pub struct CoreFileOps {
    remove: Box<RemoveFn>,
}

impl CoreFileOps {
    pub fn new() -> Self {
        CoreFileOps {
            remove: Box::new(remove_node),
        }
    }

    #[cfg(test)]
    fn with_remover(
        remove: impl Fn(&Path, bool) -> io::Result<()> + Send + Sync + 'static,
    ) -> Self {
        CoreFileOps {
            remove: Box::new(remove),
        }
    }

    fn resolve_pair(source: &LazyHandle, dest: &LazyHandle) -> Result<(Handle, Handle)> {
        let source = source.resolve()?;
        let dest = dest.resolve()?;
        if !source.exists() {
            return Err(FileOpError::SourceMissing(source.path().to_path_buf()));
        }
        if dest.exists() {
            return Err(FileOpError::DestinationOccupied(dest.path().to_path_buf()));
        }
        if dest.path().starts_with(source.path()) {
            return Err(FileOpError::DestinationInsideSource(dest.path().to_path_buf()));
        }
        Ok((source, dest))
    }

    fn copy_tree(source: &Handle, dest: &Handle) -> io::Result<()> {
        if source.is_dir() {
            dest.create_dir_all()?;
            for child in source.list_children()? {
                let Some(name) = child.name() else {
                    continue;
                };
                Self::copy_tree(&child, &dest.child(&name))?;
            }
            Ok(())
        } else if source.backend().supports_native_transfer()
            && dest.backend().supports_native_transfer()
        {
            fs::copy(source.path(), dest.path()).map(|_| ())
        } else {
            Self::stream_file(source, dest)
        }
    }

    fn stream_file(source: &Handle, dest: &Handle) -> io::Result<()> {
        let mut input = File::open(source.path())?;
        let mut output = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(dest.path())?;
        let mut buffer = [0u8; TRANSFER_BUFFER_SIZE];
        loop {
            let read = input.read(&mut buffer)?;
            if read == 0 {
                break;
            }
            output.write_all(&buffer[..read])?;
        }
        output.flush()
    }

    // Children strictly before their parent directory.
    fn delete_tree(&self, target: &Handle, suppress_failure: bool) -> Result<()> {
        for entry in WalkDir::new(target.path()).contents_first(true) {
            let outcome = match entry {
                Ok(entry) => (self.remove)(entry.path(), entry.file_type().is_dir())
                    .map_err(|source| (entry.path().to_path_buf(), source)),
                Err(err) => {
                    let path = err
                        .path()
                        .map(|p| p.to_path_buf())
                        .unwrap_or_else(|| target.path().to_path_buf());
                    Err((path, io::Error::from(err)))
                }
            };

            if let Err((path, source)) = outcome {
                if suppress_failure {
                    log::warn!("FileOps: Ignoring failure to delete {path:?}: {source}");
                } else {
                    log::error!("FileOps: Failed to delete {path:?}: {source}");
                    return Err(FileOpError::DeleteFailed { path, source });
                }
            }
        }
        Ok(())
    }
}

impl Default for CoreFileOps {
    fn default() -> Self {
        Self::new()
    }
}

impl FileOpsOperations for CoreFileOps {
    fn copy(&self, source: &LazyHandle, dest: &LazyHandle) -> Result<()> {
        let (source, dest) = Self::resolve_pair(source, dest)?;
        log::debug!("FileOps: Copying {source} to {dest}.");
        Self::copy_tree(&source, &dest)?;
        Ok(())
    }

    fn move_node(&self, source: &LazyHandle, dest: &LazyHandle) -> Result<bool> {
        let (source, dest) = Self::resolve_pair(source, dest)?;
        log::debug!("FileOps: Moving {source} to {dest}.");

        if let Err(e) = Self::copy_tree(&source, &dest) {
            log::error!("FileOps: Copy of {source} to {dest} failed: {e}");
            // The destination did not exist before; drop whatever part of it was written.
            if dest.exists() {
                let _ = self.delete_tree(&dest, true);
            }
            return Ok(false);
        }

        match self.delete_tree(&source, false) {
            Ok(()) => Ok(true),
            Err(e) => {
                log::error!("FileOps: Moved {source} but could not remove the original: {e}");
                Ok(false)
            }
        }
    }

    fn delete(&self, target: &LazyHandle, suppress_failure: bool) -> Result<()> {
        let target = match target.resolve() {
            Ok(handle) => handle,
            Err(e) if suppress_failure => {
                log::warn!("FileOps: Nothing to delete, {e}");
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };
        log::debug!("FileOps: Deleting {target} (suppress_failure: {suppress_failure}).");
        self.delete_tree(&target, suppress_failure)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::location::BackendKind;
    use std::path::Path;
    use tempfile::tempdir;

    fn lazy(path: &Path, backend: BackendKind) -> LazyHandle {
        let parent = path.parent().unwrap().to_path_buf();
        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        LazyHandle::at(parent, backend).child(&name)
    }

    fn populate(root: &Path) {
        fs::create_dir_all(root.join("data").join("deeper")).unwrap();
        fs::write(root.join("sketch.pde"), "void draw() {}").unwrap();
        fs::write(root.join("data").join("image.bin"), vec![7u8; 10_000]).unwrap();
        fs::write(root.join("data").join("deeper").join("notes.txt"), "n").unwrap();
    }

    fn snapshot(root: &Path) -> Vec<(PathBuf, Vec<u8>)> {
        let mut files: Vec<(PathBuf, Vec<u8>)> = WalkDir::new(root)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| {
                (
                    e.path().strip_prefix(root).unwrap().to_path_buf(),
                    fs::read(e.path()).unwrap(),
                )
            })
            .collect();
        files.sort();
        files
    }

    #[test]
    fn test_copy_directory_preserves_structure() {
        // Arrange
        let dir = tempdir().unwrap();
        let source = dir.path().join("src_project");
        populate(&source);
        let dest = dir.path().join("copy");
        let ops = CoreFileOps::new();

        // Act
        ops.copy(
            &lazy(&source, BackendKind::DirectPath),
            &lazy(&dest, BackendKind::Sandbox),
        )
        .unwrap();

        // Assert
        assert_eq!(snapshot(&source), snapshot(&dest));
    }

    #[test]
    fn test_streamed_copy_matches_native_copy() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("src_project");
        populate(&source);
        let dest = dir.path().join("streamed");

        CoreFileOps::new()
            .copy(
                &lazy(&source, BackendKind::DirectPath),
                &lazy(&dest, BackendKind::PermissionedTree),
            )
            .unwrap();

        assert_eq!(snapshot(&source), snapshot(&dest));
    }

    #[test]
    fn test_move_refuses_occupied_destination() {
        // Arrange
        let dir = tempdir().unwrap();
        let source = dir.path().join("a");
        let dest = dir.path().join("b");
        populate(&source);
        fs::create_dir_all(&dest).unwrap();
        fs::write(dest.join("existing.pde"), "keep me").unwrap();
        let before_source = snapshot(&source);
        let before_dest = snapshot(&dest);

        // Act
        let result = CoreFileOps::new().move_node(
            &lazy(&source, BackendKind::DirectPath),
            &lazy(&dest, BackendKind::DirectPath),
        );

        // Assert
        assert!(matches!(result, Err(FileOpError::DestinationOccupied(_))));
        assert_eq!(snapshot(&source), before_source);
        assert_eq!(snapshot(&dest), before_dest);
    }

    #[test]
    fn test_move_relocates_tree() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("a");
        populate(&source);
        let expected = snapshot(&source);
        let dest = dir.path().join("moved");

        let moved = CoreFileOps::new()
            .move_node(
                &lazy(&source, BackendKind::DirectPath),
                &lazy(&dest, BackendKind::Sandbox),
            )
            .unwrap();

        assert!(moved);
        assert!(!source.exists());
        assert_eq!(snapshot(&dest), expected);
    }

    #[test]
    fn test_move_missing_source_is_refused() {
        let dir = tempdir().unwrap();
        let result = CoreFileOps::new().move_node(
            &lazy(&dir.path().join("nope"), BackendKind::DirectPath),
            &lazy(&dir.path().join("dest"), BackendKind::DirectPath),
        );
        assert!(matches!(result, Err(FileOpError::SourceMissing(_))));
    }

    #[test]
    fn test_unresolvable_destination_is_refused() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("a");
        populate(&source);
        let dest = LazyHandle::at(dir.path().join("unmounted"), BackendKind::DirectPath).child("x");

        let result = CoreFileOps::new().copy(&lazy(&source, BackendKind::DirectPath), &dest);

        assert!(matches!(
            result,
            Err(FileOpError::NotResolvable(ResolveError::RootMissing { .. }))
        ));
    }

    #[test]
    fn test_delete_removes_everything() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("doomed");
        populate(&target);

        CoreFileOps::new()
            .delete(&lazy(&target, BackendKind::DirectPath), false)
            .unwrap();

        assert!(!target.exists());
        assert!(dir.path().exists());
    }

    #[test]
    fn test_delete_missing_target_depends_on_suppression() {
        let dir = tempdir().unwrap();
        let missing = lazy(&dir.path().join("never_there"), BackendKind::DirectPath);
        let ops = CoreFileOps::new();

        assert!(matches!(
            ops.delete(&missing, false),
            Err(FileOpError::DeleteFailed { .. })
        ));
        assert!(ops.delete(&missing, true).is_ok());
    }
    // Refuses to remove any node whose file name is `denied`, like a permission error would.
    fn ops_denying(denied: &'static str) -> CoreFileOps {
        CoreFileOps::with_remover(move |path: &Path, is_dir: bool| {
            if path.file_name().is_some_and(|n| n == denied) {
                return Err(io::Error::new(io::ErrorKind::PermissionDenied, "denied"));
            }
            remove_node(path, is_dir)
        })
    }

    #[test]
    fn test_strict_delete_reports_the_denied_child() {
        // Arrange
        let dir = tempdir().unwrap();
        let target = dir.path().join("doomed");
        populate(&target);
        let denied = target.join("data").join("deeper").join("notes.txt");

        // Act
        let result = ops_denying("notes.txt").delete(&lazy(&target, BackendKind::DirectPath), false);

        // Assert
        match result {
            Err(FileOpError::DeleteFailed { path, source }) => {
                assert_eq!(path, denied);
                assert_eq!(source.kind(), io::ErrorKind::PermissionDenied);
            }
            other => panic!("expected DeleteFailed, got {other:?}"),
        }
        assert!(denied.is_file());
        assert!(target.is_dir());
    }

    #[test]
    fn test_suppressed_delete_continues_past_denied_child() {
        // Arrange
        let dir = tempdir().unwrap();
        let target = dir.path().join("doomed");
        populate(&target);

        // Act
        let result = ops_denying("notes.txt").delete(&lazy(&target, BackendKind::DirectPath), true);

        // Assert: everything except the denied file and its ancestors is gone.
        assert!(result.is_ok());
        assert!(target.join("data").join("deeper").join("notes.txt").is_file());
        assert!(!target.join("sketch.pde").exists());
        assert!(!target.join("data").join("image.bin").exists());
    }

    #[test]
    fn test_move_keeps_duplicate_when_source_cannot_be_removed() {
        // Arrange
        let dir = tempdir().unwrap();
        let source = dir.path().join("a");
        populate(&source);
        let expected = snapshot(&source);
        let dest = dir.path().join("moved");

        // Act
        let moved = ops_denying("sketch.pde")
            .move_node(
                &lazy(&source, BackendKind::DirectPath),
                &lazy(&dest, BackendKind::DirectPath),
            )
            .unwrap();

        // Assert
        assert!(!moved);
        assert_eq!(snapshot(&dest), expected);
        assert!(source.join("sketch.pde").is_file());
    }

    #[test]
    fn test_move_into_own_subtree_is_refused() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("a");
        populate(&source);
        let before = snapshot(&source);

        let result = CoreFileOps::new().move_node(
            &lazy(&source, BackendKind::DirectPath),
            &lazy(&source.join("inner"), BackendKind::DirectPath),
        );

        assert!(matches!(result, Err(FileOpError::DestinationInsideSource(_))));
        assert_eq!(snapshot(&source), before);
    }
}
