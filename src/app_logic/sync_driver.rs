use crate::core::examples_sync::{
    BlockReason, ExampleSyncOperations, METERED_REFUSAL_MESSAGE, Result, SyncError, SyncState,
};
use crate::core::preferences::{PreferenceStore, UPDATE_EXAMPLES_PREF};
use crate::core::ui_callbacks::{SyncChoice, UiCallbacks};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartupOutcome {
    Skipped,
    AlreadyRunning,
    UpToDate,
    Dismissed,
    Disabled,
    Updated,
}

/*
 * Runs the examples sync the way the editor does at startup: check quietly in the
 * background, offer an update through the UI when one exists, and act on the
 * user's answer. Failures are reported to the UI and never escape the worker thread.
 */
pub struct ExampleSyncDriver {
    sync: Arc<dyn ExampleSyncOperations>,
    preferences: Arc<dyn PreferenceStore>,
    callbacks: Arc<dyn UiCallbacks>,
}

impl ExampleSyncDriver {
    pub fn new(
        sync: Arc<dyn ExampleSyncOperations>,
        preferences: Arc<dyn PreferenceStore>,
        callbacks: Arc<dyn UiCallbacks>,
    ) -> Self {
        ExampleSyncDriver {
            sync,
            preferences,
            callbacks,
        }
    }

    pub fn run_startup_check(&self) -> Result<StartupOutcome> {
        if let Err(e) = self.sync.check_gate() {
            log::debug!("ExampleSyncDriver: Not checking for example updates: {e}");
            return Ok(StartupOutcome::Skipped);
        }

        let state = self.sync.check_for_update()?;
        if !matches!(state, SyncState::Absent | SyncState::Behind) {
            return Ok(match state {
                SyncState::Syncing => StartupOutcome::AlreadyRunning,
                _ => StartupOutcome::UpToDate,
            });
        }

        match self.callbacks.on_sync_offer(state == SyncState::Behind) {
            SyncChoice::Update => {
                self.sync.apply_update()?;
                Ok(StartupOutcome::Updated)
            }
            SyncChoice::DisablePermanently => {
                if let Err(e) = self.preferences.put_bool(UPDATE_EXAMPLES_PREF, false) {
                    log::warn!("ExampleSyncDriver: Could not persist the opt-out: {e}");
                }
                log::info!("ExampleSyncDriver: Example updates disabled by the user.");
                Ok(StartupOutcome::Disabled)
            }
            SyncChoice::Dismiss => Ok(StartupOutcome::Dismissed),
        }
    }

    pub fn spawn_startup_check(self: &Arc<Self>) -> JoinHandle<Option<StartupOutcome>> {
        let driver = Arc::clone(self);
        thread::spawn(move || match driver.run_startup_check() {
            Ok(outcome) => {
                log::debug!("ExampleSyncDriver: Startup check finished with {outcome:?}.");
                Some(outcome)
            }
            Err(e) => {
                log::error!("ExampleSyncDriver: Startup check failed: {e}");
                driver.callbacks.on_sync_progress_message(&e.to_string());
                None
            }
        })
    }

    /*
     * Throws the local examples away and downloads them again. Being refused because
     * of a metered connection is explained to the user; disabled updates stay silent.
     */
    pub fn request_redownload(&self) -> Result<()> {
        match self.sync.check_gate() {
            Err(SyncError::PolicyBlocked {
                reason: BlockReason::MeteredNotAllowed,
            }) => {
                self.callbacks.on_sync_progress_message(METERED_REFUSAL_MESSAGE);
                return Err(SyncError::PolicyBlocked {
                    reason: BlockReason::MeteredNotAllowed,
                });
            }
            Err(e) => return Err(e),
            Ok(()) => {}
        }
        let result = self.sync.force_redownload();
        if let Err(e) = &result {
            self.callbacks.on_sync_progress_message(&e.to_string());
        }
        result
    }

    // Runs `request_redownload` on a worker thread, like the startup check.
    pub fn spawn_redownload(self: &Arc<Self>) -> JoinHandle<Result<()>> {
        let driver = Arc::clone(self);
        thread::spawn(move || {
            let result = driver.request_redownload();
            match &result {
                Ok(()) => log::debug!("ExampleSyncDriver: Redownload finished."),
                Err(e) => log::error!("ExampleSyncDriver: Redownload failed: {e}"),
            }
            result
        })
    }
}
