/*
 * The user-visible message console shared by the editor and background tasks. A sync
 * that would otherwise flood it calls `begin_quiet_sync`, which hides output until
 * the returned token is dropped. The token is released on every exit path of the
 * task, early returns and panics included. Tokens nest; output is visible again once
 * the last one is gone.
 */
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Default)]
struct ChannelState {
    quiet_depth: usize,
    messages: Vec<String>,
}

#[derive(Debug, Default)]
pub struct OutputChannel {
    state: Mutex<ChannelState>,
}

impl OutputChannel {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, ChannelState> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    pub fn is_visible(&self) -> bool {
        self.lock().quiet_depth == 0
    }

    // Messages pushed while quiet only reach the log.
    pub fn push(&self, message: &str) {
        let mut state = self.lock();
        if state.quiet_depth == 0 {
            log::debug!("Output: {message}");
            state.messages.push(message.to_string());
        } else {
            log::debug!("Output (suppressed): {message}");
        }
    }

    pub fn take_messages(&self) -> Vec<String> {
        std::mem::take(&mut self.lock().messages)
    }

    pub fn begin_quiet_sync(&self) -> QuietSyncToken<'_> {
        self.lock().quiet_depth += 1;
        log::trace!("OutputChannel: Output suspended.");
        QuietSyncToken { channel: self }
    }
}

#[must_use = "output is restored as soon as the token is dropped"]
#[derive(Debug)]
pub struct QuietSyncToken<'a> {
    channel: &'a OutputChannel,
}

impl Drop for QuietSyncToken<'_> {
    fn drop(&mut self) {
        let mut state = self.channel.lock();
        state.quiet_depth = state.quiet_depth.saturating_sub(1);
        if state.quiet_depth == 0 {
            log::trace!("OutputChannel: Output restored.");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::panic::{self, AssertUnwindSafe};

    #[test]
    fn test_quiet_token_suppresses_and_restores() {
        let channel = OutputChannel::new();
        channel.push("before");
        {
            let _quiet = channel.begin_quiet_sync();
            assert!(!channel.is_visible());
            channel.push("during");
        }
        channel.push("after");

        assert!(channel.is_visible());
        assert_eq!(channel.take_messages(), vec!["before", "after"]);
        assert!(channel.take_messages().is_empty());
    }

    #[test]
    fn test_nested_tokens_restore_after_outermost() {
        let channel = OutputChannel::new();
        let outer = channel.begin_quiet_sync();
        {
            let _inner = channel.begin_quiet_sync();
        }
        assert!(!channel.is_visible());
        drop(outer);
        assert!(channel.is_visible());
    }

    #[test]
    fn test_token_is_released_on_panic() {
        let channel = OutputChannel::new();
        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            let _quiet = channel.begin_quiet_sync();
            panic!("sync blew up");
        }));
        assert!(result.is_err());
        assert!(channel.is_visible());
    }
}
