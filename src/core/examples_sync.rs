/*
 * Keeps the local copy of the examples repository in step with its remote branch.
 *
 * Every operation first passes the update gate: updates must not be disabled, and the
 * network has to be Wi-Fi, or metered with metered updates allowed. Operations that
 * write to the repository root hold a per-root guard for their whole duration, so a
 * second trigger against the same root is refused with `SyncInProgress` instead of
 * racing the first. While one runs, the shared output channel is kept quiet.
 *
 * State machine: `Absent --clone--> UpToDate`, `UpToDate/Behind <-> Syncing`. Success
 * ends in `UpToDate`; failure puts back the state that held before the attempt. A copy
 * found on disk at construction starts out `Behind` until a check has compared heads.
 */
use crate::core::file_ops::{FileOpError, FileOpsOperations};
use crate::core::location::{BackendKind, Handle, LazyHandle};
use crate::core::network::{NetworkKind, NetworkMonitor};
use crate::core::output::OutputChannel;
use crate::core::preferences::{
    PreferenceStore, UPDATE_EXAMPLES_METERED_PREF, UPDATE_EXAMPLES_PREF,
};
use crate::core::ui_callbacks::UiCallbacks;
use crate::core::vcs::{VcsError, VcsOperations};
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

pub const UPDATING_MESSAGE: &str = "Updating examples...";
pub const UPDATED_MESSAGE: &str = "Examples updated.";
pub const METERED_REFUSAL_MESSAGE: &str =
    "Examples can only be downloaded over Wi-Fi. Allow updates over mobile data to download them now.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    Absent,
    UpToDate,
    Behind,
    Syncing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockReason {
    UpdatesDisabled,
    MeteredNotAllowed,
}

impl fmt::Display for BlockReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockReason::UpdatesDisabled => f.write_str("example updates are disabled"),
            BlockReason::MeteredNotAllowed => {
                f.write_str("updates over a metered connection are not allowed")
            }
        }
    }
}

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Examples sync blocked: {reason}")]
    PolicyBlocked { reason: BlockReason },
    #[error("Examples sync skipped: no network connection")]
    NetworkUnavailable,
    #[error("Examples sync already running for {0:?}")]
    SyncInProgress(PathBuf),
    #[error("Examples sync failed: {0}")]
    Vcs(#[from] VcsError),
    #[error("Could not remove the local examples: {0}")]
    DeleteFailed(#[from] FileOpError),
}

pub type Result<T> = std::result::Result<T, SyncError>;

/*
 * The set of repository roots with a sync in flight. One instance is shared by every
 * syncer in the process.
 */
#[derive(Debug, Default)]
pub struct RootLocks {
    active: Mutex<HashSet<PathBuf>>,
}

impl RootLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashSet<PathBuf>> {
        self.active.lock().unwrap_or_else(|p| p.into_inner())
    }

    pub fn try_acquire(&self, root: &Path) -> Option<RootGuard<'_>> {
        if self.lock().insert(root.to_path_buf()) {
            Some(RootGuard {
                locks: self,
                root: root.to_path_buf(),
            })
        } else {
            None
        }
    }

    pub fn is_held(&self, root: &Path) -> bool {
        self.lock().contains(root)
    }
}

#[must_use = "the root is released as soon as the guard is dropped"]
#[derive(Debug)]
pub struct RootGuard<'a> {
    locks: &'a RootLocks,
    root: PathBuf,
}

impl Drop for RootGuard<'_> {
    fn drop(&mut self) {
        self.locks.lock().remove(&self.root);
    }
}

pub trait ExampleSyncOperations: Send + Sync {
    fn state(&self) -> SyncState;
    fn check_gate(&self) -> Result<()>;
    fn check_for_update(&self) -> Result<SyncState>;
    // Returns whether the local copy changed.
    fn apply_update(&self) -> Result<bool>;
    fn force_redownload(&self) -> Result<()>;
}

pub struct ExampleRepositorySync {
    root: PathBuf,
    url: String,
    branch: String,
    vcs: Arc<dyn VcsOperations>,
    network: Arc<dyn NetworkMonitor>,
    preferences: Arc<dyn PreferenceStore>,
    file_ops: Arc<dyn FileOpsOperations>,
    output: Arc<OutputChannel>,
    callbacks: Arc<dyn UiCallbacks>,
    locks: Arc<RootLocks>,
    state: Mutex<SyncState>,
}

/*
 * Collaborators of an `ExampleRepositorySync`, grouped so the constructor stays
 * readable.
 */
pub struct SyncCollaborators {
    pub vcs: Arc<dyn VcsOperations>,
    pub network: Arc<dyn NetworkMonitor>,
    pub preferences: Arc<dyn PreferenceStore>,
    pub file_ops: Arc<dyn FileOpsOperations>,
    pub output: Arc<OutputChannel>,
    pub callbacks: Arc<dyn UiCallbacks>,
    pub locks: Arc<RootLocks>,
}

impl ExampleRepositorySync {
    pub fn new(root: PathBuf, url: &str, branch: &str, collaborators: SyncCollaborators) -> Self {
        let initial = if collaborators.vcs.exists(&root) {
            SyncState::Behind
        } else {
            SyncState::Absent
        };
        ExampleRepositorySync {
            root,
            url: url.to_string(),
            branch: branch.to_string(),
            vcs: collaborators.vcs,
            network: collaborators.network,
            preferences: collaborators.preferences,
            file_ops: collaborators.file_ops,
            output: collaborators.output,
            callbacks: collaborators.callbacks,
            locks: collaborators.locks,
            state: Mutex::new(initial),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn lock_state(&self) -> MutexGuard<'_, SyncState> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn set_state(&self, state: SyncState) {
        *self.lock_state() = state;
    }

    // Moves to `Syncing` and hands back the state to restore on failure.
    fn enter_syncing(&self) -> SyncState {
        let mut state = self.lock_state();
        let prior = *state;
        *state = SyncState::Syncing;
        prior
    }

    fn compare_heads(&self) -> Result<SyncState> {
        if !self.vcs.exists(&self.root) {
            return Ok(SyncState::Absent);
        }
        let local = self.vcs.local_head(&self.root)?;
        let remote = self.vcs.remote_head(&self.url, &self.branch)?;
        log::debug!("ExampleSync: Local head {local}, remote head {remote}.");
        Ok(if local == remote {
            SyncState::UpToDate
        } else {
            SyncState::Behind
        })
    }

    fn finish_success(&self) {
        self.set_state(SyncState::UpToDate);
        self.callbacks.on_project_list_invalidated();
        self.callbacks.on_sync_progress_message(UPDATED_MESSAGE);
    }
}

impl ExampleSyncOperations for ExampleRepositorySync {
    fn state(&self) -> SyncState {
        *self.lock_state()
    }

    fn check_gate(&self) -> Result<()> {
        if !self.preferences.get_bool(UPDATE_EXAMPLES_PREF, true) {
            return Err(SyncError::PolicyBlocked {
                reason: BlockReason::UpdatesDisabled,
            });
        }
        match self.network.current() {
            NetworkKind::Wifi => Ok(()),
            NetworkKind::Metered if self.preferences.get_bool(UPDATE_EXAMPLES_METERED_PREF, false) => {
                Ok(())
            }
            NetworkKind::Metered => Err(SyncError::PolicyBlocked {
                reason: BlockReason::MeteredNotAllowed,
            }),
            NetworkKind::None => Err(SyncError::NetworkUnavailable),
        }
    }

    fn check_for_update(&self) -> Result<SyncState> {
        self.check_gate()?;
        let Some(_guard) = self.locks.try_acquire(&self.root) else {
            log::debug!("ExampleSync: {:?} is busy, reporting Syncing.", self.root);
            return Ok(SyncState::Syncing);
        };
        let _quiet = self.output.begin_quiet_sync();

        let state = self.compare_heads()?;
        self.set_state(state);
        log::info!("ExampleSync: Examples repository is {state:?}.");
        Ok(state)
    }

    fn apply_update(&self) -> Result<bool> {
        self.check_gate()?;
        let Some(_guard) = self.locks.try_acquire(&self.root) else {
            return Err(SyncError::SyncInProgress(self.root.clone()));
        };
        let _quiet = self.output.begin_quiet_sync();
        self.callbacks.on_sync_progress_message(UPDATING_MESSAGE);

        let prior = self.enter_syncing();
        let outcome = match self.compare_heads() {
            Ok(SyncState::Absent) => self
                .vcs
                .clone_repo(&self.url, &self.branch, &self.root)
                .map(|()| true)
                .map_err(SyncError::from),
            Ok(SyncState::Behind) => self
                .vcs
                .pull(&self.root, &self.url, &self.branch)
                .map(|()| true)
                .map_err(SyncError::from),
            Ok(_) => Ok(false),
            Err(e) => Err(e),
        };

        match outcome {
            Ok(true) => {
                self.finish_success();
                Ok(true)
            }
            Ok(false) => {
                self.set_state(SyncState::UpToDate);
                Ok(false)
            }
            Err(e) => {
                log::error!("ExampleSync: Update failed: {e}");
                self.set_state(prior);
                Err(e)
            }
        }
    }

    fn force_redownload(&self) -> Result<()> {
        self.check_gate()?;
        let Some(_guard) = self.locks.try_acquire(&self.root) else {
            return Err(SyncError::SyncInProgress(self.root.clone()));
        };
        let _quiet = self.output.begin_quiet_sync();
        self.callbacks.on_sync_progress_message(UPDATING_MESSAGE);

        let prior = self.enter_syncing();
        if self.root.exists() {
            let target = LazyHandle::from_handle(Handle::new(self.root.clone(), BackendKind::Sandbox));
            if let Err(e) = self.file_ops.delete(&target, false) {
                log::error!("ExampleSync: Not re-cloning, removal failed: {e}");
                self.set_state(prior);
                return Err(e.into());
            }
        }

        match self.vcs.clone_repo(&self.url, &self.branch, &self.root) {
            Ok(()) => {
                self.finish_success();
                Ok(())
            }
            Err(e) => {
                // The old copy is gone at this point.
                log::error!("ExampleSync: Re-clone failed: {e}");
                self.set_state(SyncState::Absent);
                Err(e.into())
            }
        }
    }
}
