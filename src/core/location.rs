/*
 * Lazy, failure-typed addressing of nodes inside storage backends.
 *
 * A `LazyHandle` is a root descriptor plus relative segments. Building one (and
 * deriving children from it) never touches storage; only `resolve`, `exists` and
 * `is_directory` do. The first resolution is memoized per instance, and its outcome
 * is one of three explicit states so callers must deal with a revoked or vanished
 * backend instead of dereferencing something that merely looks usable.
 *
 * `CoreLocationResolver` maps a `ProjectAddress` onto the right root for its
 * `LocationKind`.
 */
use crate::core::config::SandboxLayout;
use crate::core::models::{LocationKind, ProjectAddress};
use crate::core::path_utils;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use thiserror::Error;

pub const LIBRARIES_FOLDER: &str = "libraries";

/*
 * The storage model a node lives in. Direct-path and sandbox nodes can use native
 * file transfer; permission-gated tree nodes are streamed.
 */
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    DirectPath,
    PermissionedTree,
    Sandbox,
}

impl BackendKind {
    pub fn supports_native_transfer(self) -> bool {
        !matches!(self, BackendKind::PermissionedTree)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("Not resolvable: storage root '{root_id}' has not been granted or was revoked")]
    RootRevoked { root_id: String },
    #[error("Not resolvable: storage root {path:?} is missing or unmounted")]
    RootMissing { path: PathBuf },
    #[error("Not resolvable: relative path '{relative}' cannot be constructed under its root")]
    InvalidRelativePath { relative: String },
    #[error("Not resolvable: external reference '{identifier}' cannot be opened")]
    UnknownExternalReference { identifier: String },
}

pub type Result<T> = std::result::Result<T, ResolveError>;

/*
 * A resolved, usable reference to a node. The node itself may not exist yet (a copy
 * destination, for instance); what is guaranteed is that its backend root was
 * reachable when the handle was produced.
 */
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Handle {
    path: PathBuf,
    backend: BackendKind,
}

impl Handle {
    pub fn new(path: PathBuf, backend: BackendKind) -> Self {
        Handle { path, backend }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn backend(&self) -> BackendKind {
        self.backend
    }

    pub fn name(&self) -> Option<String> {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    pub fn is_dir(&self) -> bool {
        self.path.is_dir()
    }

    pub fn is_file(&self) -> bool {
        self.path.is_file()
    }

    pub fn child(&self, name: &str) -> Handle {
        Handle::new(self.path.join(name), self.backend)
    }

    // Direct children sorted by name.
    pub fn list_children(&self) -> io::Result<Vec<Handle>> {
        let mut children = Vec::new();
        for entry in fs::read_dir(&self.path)? {
            let entry = entry?;
            children.push(Handle::new(entry.path(), self.backend));
        }
        children.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(children)
    }

    pub fn create_dir_all(&self) -> io::Result<()> {
        fs::create_dir_all(&self.path)
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path.display())
    }
}

/*
 * Where a lazy handle is anchored. `Revoked` is a selectable root that cannot be used
 * until the user grants (or re-grants) access to it. `FirstPopulated` picks between
 * two folders only when the handle is resolved, so a handle created before
 * `preferred` was filled in still ends up there.
 */
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RootDescriptor {
    Available { path: PathBuf, backend: BackendKind },
    Standalone { path: PathBuf },
    Revoked { root_id: String },
    FirstPopulated {
        preferred: PathBuf,
        fallback: PathBuf,
        backend: BackendKind,
    },
}

// `preferred` as soon as it holds at least one entry.
fn first_populated<'a>(preferred: &'a Path, fallback: &'a Path) -> &'a Path {
    let populated = fs::read_dir(preferred)
        .map(|mut entries| entries.next().is_some())
        .unwrap_or(false);
    if populated { preferred } else { fallback }
}

#[derive(Debug)]
pub enum LazyState<'a> {
    Unresolved,
    Resolved(&'a Handle),
    Failed(&'a ResolveError),
}

#[derive(Debug, Clone)]
pub struct LazyHandle {
    root: RootDescriptor,
    segments: Vec<String>,
    invalid_relative: Option<String>,
    resolution: OnceLock<Result<Handle>>,
}

impl LazyHandle {
    pub fn new(root: RootDescriptor) -> Self {
        LazyHandle {
            root,
            segments: Vec::new(),
            invalid_relative: None,
            resolution: OnceLock::new(),
        }
    }

    pub fn at(path: PathBuf, backend: BackendKind) -> Self {
        LazyHandle::new(RootDescriptor::Available { path, backend })
    }

    pub fn standalone(identifier: &str) -> Self {
        LazyHandle::new(RootDescriptor::Standalone {
            path: PathBuf::from(identifier),
        })
    }

    // Wraps an already resolved node; `state()` reports it as resolved immediately.
    pub fn from_handle(handle: Handle) -> Self {
        let lazy = LazyHandle::at(handle.path.clone(), handle.backend);
        let _ = lazy.resolution.set(Ok(handle));
        lazy
    }

    pub fn root(&self) -> &RootDescriptor {
        &self.root
    }

    pub fn state(&self) -> LazyState<'_> {
        match self.resolution.get() {
            None => LazyState::Unresolved,
            Some(Ok(handle)) => LazyState::Resolved(handle),
            Some(Err(err)) => LazyState::Failed(err),
        }
    }

    pub fn child_path(&self, relative: &str) -> LazyHandle {
        let mut derived = LazyHandle {
            root: self.root.clone(),
            segments: self.segments.clone(),
            invalid_relative: self.invalid_relative.clone(),
            resolution: OnceLock::new(),
        };
        if derived.invalid_relative.is_some() {
            return derived;
        }
        match path_utils::split_relative_path(relative) {
            Some(extra) => derived.segments.extend(extra),
            None => derived.invalid_relative = Some(relative.to_string()),
        }
        derived
    }

    pub fn child(&self, name: &str) -> LazyHandle {
        if name.is_empty() || name.contains('/') {
            let mut derived = self.child_path("");
            derived.invalid_relative = Some(name.to_string());
            return derived;
        }
        self.child_path(name)
    }

    /*
     * Name of the addressed node without resolving it: the last relative segment, or
     * the root's own folder name.
     */
    pub fn name(&self) -> Option<String> {
        if let Some(last) = self.segments.last() {
            return Some(last.clone());
        }
        match &self.root {
            RootDescriptor::Available { path, .. } | RootDescriptor::Standalone { path } => path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned()),
            RootDescriptor::FirstPopulated {
                preferred, fallback, ..
            } => first_populated(preferred, fallback)
                .file_name()
                .map(|n| n.to_string_lossy().into_owned()),
            RootDescriptor::Revoked { .. } => None,
        }
    }

    pub fn resolve(&self) -> Result<Handle> {
        self.resolution.get_or_init(|| self.resolve_uncached()).clone()
    }

    fn resolve_uncached(&self) -> Result<Handle> {
        if let Some(relative) = &self.invalid_relative {
            log::debug!("LazyHandle: Rejecting relative path '{relative}'.");
            return Err(ResolveError::InvalidRelativePath {
                relative: relative.clone(),
            });
        }
        match &self.root {
            RootDescriptor::Revoked { root_id } => {
                log::debug!("LazyHandle: Root '{root_id}' is not granted.");
                Err(ResolveError::RootRevoked {
                    root_id: root_id.clone(),
                })
            }
            RootDescriptor::Available { path, backend } => self.resolve_under(path, *backend),
            RootDescriptor::FirstPopulated {
                preferred,
                fallback,
                backend,
            } => self.resolve_under(first_populated(preferred, fallback), *backend),
            RootDescriptor::Standalone { path } => {
                if !path.is_absolute() || !path.exists() {
                    return Err(ResolveError::UnknownExternalReference {
                        identifier: path.to_string_lossy().into_owned(),
                    });
                }
                Ok(Handle::new(
                    path_utils::join_segments(path, &self.segments),
                    BackendKind::DirectPath,
                ))
            }
        }
    }

    fn resolve_under(&self, root: &Path, backend: BackendKind) -> Result<Handle> {
        if !root.is_dir() {
            log::debug!("LazyHandle: Root {root:?} is not reachable.");
            return Err(ResolveError::RootMissing {
                path: root.to_path_buf(),
            });
        }
        Ok(Handle::new(path_utils::join_segments(root, &self.segments), backend))
    }

    pub fn exists(&self) -> bool {
        self.resolve().map(|h| h.exists()).unwrap_or(false)
    }

    pub fn is_directory(&self) -> bool {
        self.resolve().map(|h| h.is_dir()).unwrap_or(false)
    }
}

impl PartialEq for LazyHandle {
    fn eq(&self, other: &Self) -> bool {
        self.root == other.root
            && self.segments == other.segments
            && self.invalid_relative == other.invalid_relative
    }
}

impl fmt::Display for LazyHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.root {
            RootDescriptor::Available { path, .. } | RootDescriptor::Standalone { path } => {
                write!(f, "{}", path.display())?
            }
            RootDescriptor::FirstPopulated {
                preferred, fallback, ..
            } => match self.resolution.get() {
                Some(Ok(handle)) => return write!(f, "{handle}"),
                _ => write!(f, "{}", first_populated(preferred, fallback).display())?,
            },
            RootDescriptor::Revoked { root_id } => write!(f, "<revoked:{root_id}>")?,
        }
        for segment in &self.segments {
            write!(f, "/{segment}")?;
        }
        Ok(())
    }
}

pub trait LocationResolverOperations: Send + Sync {
    fn root_for(&self, kind: LocationKind) -> LazyHandle;
    fn locate(&self, address: &ProjectAddress) -> LazyHandle;

    fn resolve(&self, address: &ProjectAddress) -> Result<Handle> {
        self.locate(address).resolve()
    }
}

/*
 * Maps each `LocationKind` to its root. The sketchbook handle (selected drive plus
 * configured subpath) is supplied by whoever owns the drive selection; the other
 * roots come from the sandbox layout.
 */
pub struct CoreLocationResolver {
    sketchbook: LazyHandle,
    layout: SandboxLayout,
}

impl CoreLocationResolver {
    pub fn new(sketchbook: LazyHandle, layout: SandboxLayout) -> Self {
        CoreLocationResolver { sketchbook, layout }
    }

    pub fn sketchbook(&self) -> &LazyHandle {
        &self.sketchbook
    }

    pub fn libraries_folder(&self) -> LazyHandle {
        self.sketchbook.child(LIBRARIES_FOLDER)
    }

    /*
     * The synced examples repository once it holds anything, otherwise the bundled
     * starter examples. The choice is made when the handle is resolved.
     */
    pub fn examples_folder(&self) -> LazyHandle {
        LazyHandle::new(RootDescriptor::FirstPopulated {
            preferred: self.layout.examples_repo_dir(),
            fallback: self.layout.starter_examples_dir(),
            backend: BackendKind::Sandbox,
        })
    }

    pub fn temporary_folder(&self) -> LazyHandle {
        LazyHandle::at(self.layout.temporary_projects_dir(), BackendKind::Sandbox)
    }
}

impl LocationResolverOperations for CoreLocationResolver {
    fn root_for(&self, kind: LocationKind) -> LazyHandle {
        match kind {
            LocationKind::PrimaryCollection => self.sketchbook.clone(),
            LocationKind::BuiltinExample => self.examples_folder(),
            LocationKind::LibraryExample => self.libraries_folder(),
            LocationKind::ExternalReference => {
                LazyHandle::new(RootDescriptor::Standalone { path: PathBuf::new() })
            }
            LocationKind::Temporary => self.temporary_folder(),
        }
    }

    fn locate(&self, address: &ProjectAddress) -> LazyHandle {
        match address.kind {
            LocationKind::ExternalReference => LazyHandle::standalone(&address.path),
            kind => self.root_for(kind).child_path(&address.path),
        }
    }
}
