/*
 * Enumerates the storage backends a sketchbook can live on and what each of them is
 * capable of. The list is rebuilt on every query: a volume can be unmounted and a
 * granted tree root revoked at any time, so nothing here is cached.
 *
 * Two access models are supported. With direct path access every external volume is
 * listed; the one holding the conventional public storage root is promoted to
 * `PrimaryExternal` and exposes that root, all others become `SecondaryExternal`
 * with an application-private subfolder. With permissioned access only the tree
 * root the user granted is listed, with no root at all until a grant exists.
 */
use crate::core::config::{SandboxLayout, StorageAccessModel};
use crate::core::location::{BackendKind, LazyHandle, RootDescriptor};
use crate::core::preferences::{PERMISSIONED_ROOT_PREF, PreferenceStore};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use sysinfo::Disks;

const BYTES_PER_GB: f64 = 1_073_741_824.0;
pub const SPACE_UNAVAILABLE: &str = "Failed to stat FS";
pub const SPACE_NOT_APPLICABLE: &str = "n/a";
const SECONDARY_SKETCHBOOK_FOLDER: &str = "sketchbook";
const FILE_URI_PREFIX: &str = "file://";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DriveType {
    Internal,
    External,
    PrimaryExternal,
    SecondaryExternal,
    PermissionedExternal,
}

impl DriveType {
    pub fn title(self) -> &'static str {
        match self {
            DriveType::Internal => "Internal",
            DriveType::External | DriveType::PermissionedExternal => "External",
            DriveType::PrimaryExternal => "Primary External",
            DriveType::SecondaryExternal => "Secondary External",
        }
    }

    // Shared public storage needs the broad storage permission; private folders do not.
    pub fn requires_external_storage_permission(self) -> bool {
        match self {
            DriveType::External | DriveType::PrimaryExternal => true,
            DriveType::Internal | DriveType::SecondaryExternal | DriveType::PermissionedExternal => {
                false
            }
        }
    }

    // Whether the sketchbook lives in a configurable subfolder of the drive root.
    pub fn uses_sketchbook_subpath(self) -> bool {
        matches!(self, DriveType::External | DriveType::PrimaryExternal)
    }

    pub fn backend(self) -> BackendKind {
        match self {
            DriveType::Internal => BackendKind::Sandbox,
            DriveType::PermissionedExternal => BackendKind::PermissionedTree,
            DriveType::External | DriveType::PrimaryExternal | DriveType::SecondaryExternal => {
                BackendKind::DirectPath
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageDrive {
    pub root: Option<PathBuf>,
    pub drive_type: DriveType,
    pub space: String,
    pub root_id: String,
}

impl StorageDrive {
    pub fn new(root: PathBuf, drive_type: DriveType, space: String) -> Self {
        let root_id = path_to_root_id(&root);
        StorageDrive {
            root: Some(root),
            drive_type,
            space,
            root_id,
        }
    }

    /*
     * A drive whose root identifier is known (it is what gets persisted) but whose
     * root cannot currently be used.
     */
    pub fn without_root(drive_type: DriveType, space: String, root_id: String) -> Self {
        StorageDrive {
            root: None,
            drive_type,
            space,
            root_id,
        }
    }

    pub fn root_handle(&self) -> LazyHandle {
        match &self.root {
            Some(path) => LazyHandle::new(RootDescriptor::Available {
                path: path.clone(),
                backend: self.drive_type.backend(),
            }),
            None => LazyHandle::new(RootDescriptor::Revoked {
                root_id: self.root_id.clone(),
            }),
        }
    }
}

pub fn path_to_root_id(path: &Path) -> String {
    format!("{FILE_URI_PREFIX}{}", path.to_string_lossy())
}

pub fn root_id_to_path(root_id: &str) -> Option<PathBuf> {
    let path = PathBuf::from(root_id.strip_prefix(FILE_URI_PREFIX)?);
    path.is_absolute().then_some(path)
}

pub fn format_space(available: u64, total: u64) -> String {
    format!(
        "{:.2} GB free of {:.2} GB",
        available as f64 / BYTES_PER_GB,
        total as f64 / BYTES_PER_GB
    )
}

/*
 * Source of volume information. The production implementation asks the operating
 * system through `sysinfo`; tests supply fixed answers.
 */
pub trait VolumeInfoOperations: Send + Sync {
    fn external_volumes(&self) -> Vec<PathBuf>;
    // (available bytes, total bytes) of the volume holding `path`.
    fn capacity(&self, path: &Path) -> Option<(u64, u64)>;
}

fn disk_capacity_for(path: &Path) -> Option<(u64, u64)> {
    let disks = Disks::new_with_refreshed_list();
    disks
        .list()
        .iter()
        .filter(|disk| path.starts_with(disk.mount_point()))
        .max_by_key(|disk| disk.mount_point().as_os_str().len())
        .map(|disk| (disk.available_space(), disk.total_space()))
}

/*
 * Volumes as reported by the operating system: every removable disk, plus the disk
 * holding the public storage root so that it can be promoted to primary.
 */
pub struct SysinfoVolumeInfo {
    public_storage_root: Option<PathBuf>,
}

impl SysinfoVolumeInfo {
    pub fn new(public_storage_root: Option<PathBuf>) -> Self {
        SysinfoVolumeInfo {
            public_storage_root,
        }
    }
}

impl VolumeInfoOperations for SysinfoVolumeInfo {
    fn external_volumes(&self) -> Vec<PathBuf> {
        let disks = Disks::new_with_refreshed_list();
        let public_mount = self.public_storage_root.as_ref().and_then(|public| {
            disks
                .list()
                .iter()
                .filter(|disk| public.starts_with(disk.mount_point()))
                .max_by_key(|disk| disk.mount_point().as_os_str().len())
                .map(|disk| disk.mount_point().to_path_buf())
        });

        let mut volumes: Vec<PathBuf> = Vec::new();
        for disk in disks.list() {
            let mount = disk.mount_point().to_path_buf();
            if (disk.is_removable() || public_mount.as_ref() == Some(&mount))
                && !volumes.contains(&mount)
            {
                volumes.push(mount);
            }
        }
        log::debug!("SysinfoVolumeInfo: Found {} candidate volumes.", volumes.len());
        volumes
    }

    fn capacity(&self, path: &Path) -> Option<(u64, u64)> {
        disk_capacity_for(path)
    }
}

// Volumes listed explicitly in the configuration.
pub struct ConfiguredVolumeInfo {
    volumes: Vec<PathBuf>,
}

impl ConfiguredVolumeInfo {
    pub fn new(volumes: Vec<PathBuf>) -> Self {
        ConfiguredVolumeInfo { volumes }
    }
}

impl VolumeInfoOperations for ConfiguredVolumeInfo {
    fn external_volumes(&self) -> Vec<PathBuf> {
        self.volumes.clone()
    }

    fn capacity(&self, path: &Path) -> Option<(u64, u64)> {
        disk_capacity_for(path)
    }
}

pub trait DriveRegistryOperations: Send + Sync {
    fn list_drives(&self) -> Vec<StorageDrive>;
}

pub struct CoreDriveRegistry {
    access: StorageAccessModel,
    app_name: String,
    layout: SandboxLayout,
    public_storage_root: Option<PathBuf>,
    volumes: Box<dyn VolumeInfoOperations>,
    preferences: Arc<dyn PreferenceStore>,
}

impl CoreDriveRegistry {
    pub fn new(
        access: StorageAccessModel,
        app_name: &str,
        layout: SandboxLayout,
        public_storage_root: Option<PathBuf>,
        volumes: Box<dyn VolumeInfoOperations>,
        preferences: Arc<dyn PreferenceStore>,
    ) -> Self {
        CoreDriveRegistry {
            access,
            app_name: app_name.to_string(),
            layout,
            public_storage_root,
            volumes,
            preferences,
        }
    }

    // Space reporting is informational: failures become a placeholder string.
    fn space_for(&self, path: &Path) -> String {
        match self.volumes.capacity(path) {
            Some((available, total)) => format_space(available, total),
            None => {
                log::warn!("DriveRegistry: Could not stat the file system holding {path:?}.");
                SPACE_UNAVAILABLE.to_string()
            }
        }
    }

    pub fn internal_drive(&self) -> StorageDrive {
        let internal_dir = self.layout.internal_sketchbook_dir();
        if let Err(e) = fs::create_dir_all(&internal_dir) {
            log::warn!("DriveRegistry: Could not create internal sketchbook {internal_dir:?}: {e}");
        }
        let space = self.space_for(&internal_dir);
        StorageDrive::new(internal_dir, DriveType::Internal, space)
    }

    fn permissioned_drive(&self) -> StorageDrive {
        let granted = self
            .preferences
            .get_string(PERMISSIONED_ROOT_PREF)
            .unwrap_or_default();
        match root_id_to_path(&granted) {
            Some(path) => StorageDrive {
                root: Some(path),
                drive_type: DriveType::PermissionedExternal,
                space: SPACE_NOT_APPLICABLE.to_string(),
                root_id: granted,
            },
            None => {
                if !granted.is_empty() {
                    log::warn!("DriveRegistry: Ignoring unusable granted root '{granted}'.");
                }
                StorageDrive::without_root(
                    DriveType::PermissionedExternal,
                    SPACE_NOT_APPLICABLE.to_string(),
                    granted,
                )
            }
        }
    }

    fn direct_path_drives(&self) -> Vec<StorageDrive> {
        let mut drives = Vec::new();
        let mut primary_found = false;

        for volume in self.volumes.external_volumes() {
            let holds_public_root = self
                .public_storage_root
                .as_ref()
                .is_some_and(|public| public.starts_with(&volume));

            if holds_public_root && !primary_found {
                if let Some(public) = &self.public_storage_root {
                    drives.push(StorageDrive::new(
                        public.clone(),
                        DriveType::PrimaryExternal,
                        self.space_for(public),
                    ));
                    primary_found = true;
                }
            } else {
                let private_dir = volume.join(&self.app_name).join(SECONDARY_SKETCHBOOK_FOLDER);
                if volume.is_dir() {
                    if let Err(e) = fs::create_dir_all(&private_dir) {
                        log::warn!("DriveRegistry: Could not prepare {private_dir:?}: {e}");
                    }
                }
                let space = self.space_for(&volume);
                drives.push(StorageDrive::new(private_dir, DriveType::SecondaryExternal, space));
            }
        }

        // The public root lives on a volume nobody enumerated: expose it as plain external.
        if !primary_found {
            if let Some(public) = self.public_storage_root.as_ref().filter(|p| p.is_dir()) {
                drives.insert(
                    0,
                    StorageDrive::new(public.clone(), DriveType::External, self.space_for(public)),
                );
            }
        }
        drives
    }
}

impl DriveRegistryOperations for CoreDriveRegistry {
    fn list_drives(&self) -> Vec<StorageDrive> {
        let mut drives = match self.access {
            StorageAccessModel::Permissioned => vec![self.permissioned_drive()],
            StorageAccessModel::DirectPath => self.direct_path_drives(),
        };
        drives.push(self.internal_drive());
        log::debug!("DriveRegistry: Enumerated {} drives.", drives.len());
        drives
    }
}

/*
 * Picks the drive a fresh installation (or one whose selected drive vanished) should
 * use: shared external storage if there is any, the internal sandbox otherwise.
 */
pub fn default_drive(drives: &[StorageDrive]) -> Option<&StorageDrive> {
    drives
        .iter()
        .find(|d| matches!(d.drive_type, DriveType::PrimaryExternal | DriveType::External))
        .or_else(|| drives.iter().find(|d| d.drive_type == DriveType::Internal))
}

pub fn drive_by_root_id<'a>(drives: &'a [StorageDrive], root_id: &str) -> Option<&'a StorageDrive> {
    drives.iter().find(|d| d.root_id == root_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::preferences::MemoryPreferenceStore;
    use std::sync::Mutex;
    use tempfile::tempdir;

    struct MockVolumeInfo {
        volumes: Vec<PathBuf>,
        capacity: Mutex<Option<(u64, u64)>>,
    }

    impl MockVolumeInfo {
        fn new(volumes: Vec<PathBuf>, capacity: Option<(u64, u64)>) -> Self {
            MockVolumeInfo {
                volumes,
                capacity: Mutex::new(capacity),
            }
        }
    }

    impl VolumeInfoOperations for MockVolumeInfo {
        fn external_volumes(&self) -> Vec<PathBuf> {
            self.volumes.clone()
        }
        fn capacity(&self, _path: &Path) -> Option<(u64, u64)> {
            *self.capacity.lock().unwrap()
        }
    }

    fn registry(
        access: StorageAccessModel,
        base: &Path,
        public: Option<PathBuf>,
        volumes: Vec<PathBuf>,
        prefs: Arc<dyn PreferenceStore>,
    ) -> CoreDriveRegistry {
        CoreDriveRegistry::new(
            access,
            "TestApp",
            SandboxLayout::new(base.join("sandbox")),
            public,
            Box::new(MockVolumeInfo::new(volumes, Some((2 * 1_073_741_824, 8 * 1_073_741_824)))),
            prefs,
        )
    }

    #[test]
    fn test_permission_flags_are_per_type() {
        assert!(DriveType::External.requires_external_storage_permission());
        assert!(DriveType::PrimaryExternal.requires_external_storage_permission());
        assert!(!DriveType::Internal.requires_external_storage_permission());
        assert!(!DriveType::SecondaryExternal.requires_external_storage_permission());
        assert!(!DriveType::PermissionedExternal.requires_external_storage_permission());
    }

    #[test]
    fn test_direct_path_promotes_volume_with_public_root() {
        // Arrange
        let dir = tempdir().unwrap();
        let primary_volume = dir.path().join("vol0");
        let public = primary_volume.join("public");
        let card = dir.path().join("card");
        fs::create_dir_all(&public).unwrap();
        fs::create_dir_all(&card).unwrap();
        let prefs: Arc<dyn PreferenceStore> = Arc::new(MemoryPreferenceStore::new());
        let registry = registry(
            StorageAccessModel::DirectPath,
            dir.path(),
            Some(public.clone()),
            vec![primary_volume, card.clone()],
            prefs,
        );

        // Act
        let drives = registry.list_drives();

        // Assert
        let types: Vec<DriveType> = drives.iter().map(|d| d.drive_type).collect();
        assert_eq!(
            types,
            vec![DriveType::PrimaryExternal, DriveType::SecondaryExternal, DriveType::Internal]
        );
        assert_eq!(drives[0].root.as_deref(), Some(public.as_path()));
        let secondary_root = card.join("TestApp").join("sketchbook");
        assert_eq!(drives[1].root.as_deref(), Some(secondary_root.as_path()));
        assert!(secondary_root.is_dir());
        assert_eq!(drives[0].space, "2.00 GB free of 8.00 GB");
    }

    #[test]
    fn test_public_root_without_volume_is_plain_external() {
        let dir = tempdir().unwrap();
        let public = dir.path().join("home");
        fs::create_dir_all(&public).unwrap();
        let prefs: Arc<dyn PreferenceStore> = Arc::new(MemoryPreferenceStore::new());
        let registry = registry(
            StorageAccessModel::DirectPath,
            dir.path(),
            Some(public),
            Vec::new(),
            prefs,
        );

        let drives = registry.list_drives();

        assert_eq!(drives[0].drive_type, DriveType::External);
        assert_eq!(default_drive(&drives).map(|d| d.drive_type), Some(DriveType::External));
    }

    #[test]
    fn test_permissioned_without_grant_has_null_root() {
        let dir = tempdir().unwrap();
        let prefs: Arc<dyn PreferenceStore> = Arc::new(MemoryPreferenceStore::new());
        let registry = registry(
            StorageAccessModel::Permissioned,
            dir.path(),
            None,
            Vec::new(),
            prefs,
        );

        let drives = registry.list_drives();

        assert_eq!(drives.len(), 2);
        assert_eq!(drives[0].drive_type, DriveType::PermissionedExternal);
        assert!(drives[0].root.is_none());
        assert_eq!(drives[0].space, SPACE_NOT_APPLICABLE);
        assert!(drives[0].root_handle().resolve().is_err());
    }

    #[test]
    fn test_permissioned_with_grant_lists_root() {
        let dir = tempdir().unwrap();
        let granted = dir.path().join("tree");
        fs::create_dir_all(&granted).unwrap();
        let prefs: Arc<dyn PreferenceStore> = Arc::new(MemoryPreferenceStore::new());
        prefs
            .put_string(PERMISSIONED_ROOT_PREF, &path_to_root_id(&granted))
            .unwrap();
        let registry = registry(
            StorageAccessModel::Permissioned,
            dir.path(),
            None,
            Vec::new(),
            prefs,
        );

        let drives = registry.list_drives();

        assert_eq!(drives[0].root.as_deref(), Some(granted.as_path()));
        let handle = drives[0].root_handle().resolve().unwrap();
        assert_eq!(handle.backend(), BackendKind::PermissionedTree);
    }

    #[test]
    fn test_failed_stat_yields_placeholder() {
        let dir = tempdir().unwrap();
        let prefs: Arc<dyn PreferenceStore> = Arc::new(MemoryPreferenceStore::new());
        let registry = CoreDriveRegistry::new(
            StorageAccessModel::DirectPath,
            "TestApp",
            SandboxLayout::new(dir.path().to_path_buf()),
            None,
            Box::new(MockVolumeInfo::new(Vec::new(), None)),
            prefs,
        );

        let drives = registry.list_drives();

        assert_eq!(drives.len(), 1);
        assert_eq!(drives[0].space, SPACE_UNAVAILABLE);
    }

    #[test]
    fn test_default_drive_prefers_external_then_internal() {
        let internal = StorageDrive::new(PathBuf::from("/i"), DriveType::Internal, String::new());
        let secondary =
            StorageDrive::new(PathBuf::from("/s"), DriveType::SecondaryExternal, String::new());
        let primary =
            StorageDrive::new(PathBuf::from("/p"), DriveType::PrimaryExternal, String::new());

        let only_internal = vec![secondary.clone(), internal.clone()];
        assert_eq!(default_drive(&only_internal), Some(&internal));

        let with_primary = vec![secondary, primary.clone(), internal];
        assert_eq!(default_drive(&with_primary), Some(&primary));

        assert_eq!(default_drive(&[]), None);
    }

    #[test]
    fn test_drive_by_root_id_inverts_enumeration() {
        let dir = tempdir().unwrap();
        let card = dir.path().join("card");
        fs::create_dir_all(&card).unwrap();
        let prefs: Arc<dyn PreferenceStore> = Arc::new(MemoryPreferenceStore::new());
        let registry = registry(
            StorageAccessModel::DirectPath,
            dir.path(),
            None,
            vec![card],
            prefs,
        );

        let drives = registry.list_drives();

        for drive in &drives {
            assert_eq!(drive_by_root_id(&drives, &drive.root_id), Some(drive));
        }
        assert_eq!(drive_by_root_id(&drives, "file:///nowhere"), None);
    }

    #[test]
    fn test_root_id_round_trip() {
        let path = PathBuf::from("/media/card/TestApp");
        assert_eq!(root_id_to_path(&path_to_root_id(&path)), Some(path));
        assert_eq!(root_id_to_path("content://tree/primary"), None);
        assert_eq!(root_id_to_path(""), None);
    }
}
