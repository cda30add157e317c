/*
 * This module provides the application logic layer: `SketchbookSession`, which ties
 * the core pieces together for one editing session, and `ExampleSyncDriver`, which
 * runs the examples repository sync in the background. Unit tests for both are in
 * `session_tests.rs`.
 */
pub mod session;
pub mod sync_driver;


pub use session::{SessionError, SessionServices, SketchbookSession, today_local};
pub use sync_driver::{ExampleSyncDriver, StartupOutcome};
