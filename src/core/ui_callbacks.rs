/*
 * The narrow interface through which the core talks back to whatever front end hosts
 * it. Calls can arrive from the background sync thread, so implementations must
 * marshal to their own UI thread if they have one.
 */
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncChoice {
    Update,
    Dismiss,
    DisablePermanently,
}

pub trait UiCallbacks: Send + Sync {
    // Cached listings of projects (and examples) are stale and must be rebuilt.
    fn on_project_list_invalidated(&self);
    fn on_sync_offer(&self, update_available: bool) -> SyncChoice;
    fn on_sync_progress_message(&self, text: &str);
    // A move was refused because the destination already exists or the source is gone.
    fn on_move_refused(&self, reason: &str);
}

/*
 * Callbacks for headless use: messages go to the log and every offer is answered
 * with a fixed choice.
 */
pub struct LoggingUiCallbacks {
    choice: SyncChoice,
}

impl LoggingUiCallbacks {
    pub fn new(choice: SyncChoice) -> Self {
        LoggingUiCallbacks { choice }
    }
}

impl UiCallbacks for LoggingUiCallbacks {
    fn on_project_list_invalidated(&self) {
        log::debug!("UiCallbacks: Project listings invalidated.");
    }

    fn on_sync_offer(&self, update_available: bool) -> SyncChoice {
        log::info!(
            "UiCallbacks: Examples update offered (update available: {update_available}), answering {:?}.",
            self.choice
        );
        self.choice
    }

    fn on_sync_progress_message(&self, text: &str) {
        log::info!("UiCallbacks: {text}");
    }

    fn on_move_refused(&self, reason: &str) {
        log::warn!("UiCallbacks: Move refused: {reason}");
    }
}
