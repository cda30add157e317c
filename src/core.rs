/*
 * This module consolidates the core, platform-agnostic building blocks: storage drive
 * enumeration, lazy location resolution, project discovery, cross-backend file
 * operations, the recent-projects list, temporary names and the examples repository
 * sync. Each concern sits behind an `XxxOperations` trait with a `CoreXxx`
 * implementation so that the application logic can be tested against mocks.
 */
pub mod config;
pub mod drives;
pub mod examples_sync;
pub mod file_ops;
pub mod location;
pub mod models;
pub mod network;
pub mod output;
pub mod path_utils;
pub mod preferences;
pub mod properties;
pub mod recent;
pub mod sketch_locator;
pub mod temp_names;
pub mod ui_callbacks;
pub mod vcs;

// Re-export key structures and enums
pub use models::{ListingItem, ListingKind, LocationKind, ProjectAddress};

// Re-export config related items
pub use config::{AppConfig, ConfigManagerOperations, CoreConfigManager, SandboxLayout, StorageAccessModel};
pub use preferences::{JsonPreferenceStore, MemoryPreferenceStore, PreferenceStore};

// Storage and resolution
pub use drives::{CoreDriveRegistry, DriveRegistryOperations, DriveType, StorageDrive};
pub use location::{
    BackendKind, CoreLocationResolver, Handle, LazyHandle, LazyState, LocationResolverOperations,
    ResolveError,
};

// Discovery and file operations
pub use file_ops::{CoreFileOps, FileOpError, FileOpsOperations};
pub use sketch_locator::{ContainerFlags, CoreSketchLocator, SketchLocatorOperations};

pub use recent::{CoreRecentProjects, RecentProjectsOperations};

// Examples sync and its collaborators
pub use examples_sync::{
    ExampleRepositorySync, ExampleSyncOperations, RootLocks, SyncCollaborators, SyncError,
    SyncState,
};
pub use network::{NetworkKind, NetworkMonitor, StaticNetworkMonitor};
pub use output::{OutputChannel, QuietSyncToken};
pub use ui_callbacks::{SyncChoice, UiCallbacks};
pub use vcs::{GitCliRepository, VcsOperations};

pub use properties::{CoreSketchPropertiesSource, SketchProperties, SketchPropertiesSource};
