use crate::core::config::{AppConfig, SandboxLayout};
use crate::core::drives::{
    self, DriveRegistryOperations, DriveType, StorageDrive, default_drive, drive_by_root_id,
};
use crate::core::file_ops::{FileOpError, FileOpsOperations};
use crate::core::location::{
    CoreLocationResolver, Handle, LIBRARIES_FOLDER, LazyHandle, LocationResolverOperations,
    ResolveError,
};
use crate::core::models::{ListingItem, ListingKind, LocationKind, ProjectAddress};
use crate::core::preferences::{
    LAST_TEMPORARY_NAME_PREF, PERMISSIONED_ROOT_PREF, PreferenceError, PreferenceStore,
    SKETCHBOOK_LOCATION_PREF, STORAGE_DRIVE_PREF,
};
use crate::core::properties::{
    CoreSketchPropertiesSource, PropertiesError, SketchProperties, SketchPropertiesSource,
};
use crate::core::recent::{PersistError, RecentProjectsOperations};
use crate::core::sketch_locator::{ContainerFlags, SketchLocatorOperations};
use crate::core::temp_names::{self, NameError};
use crate::core::ui_callbacks::UiCallbacks;
use std::io;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use time::{Date, OffsetDateTime};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("No storage drive is available")]
    NoDrive,
    #[error("{0} is the root of its location, not a project")]
    LocationRoot(ProjectAddress),
    #[error(transparent)]
    NotResolvable(#[from] ResolveError),
    #[error(transparent)]
    FileOp(#[from] FileOpError),
    #[error(transparent)]
    Persist(#[from] PersistError),
    #[error(transparent)]
    Preference(#[from] PreferenceError),
    #[error(transparent)]
    Name(#[from] NameError),
    #[error(transparent)]
    Properties(#[from] PropertiesError),
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, SessionError>;

/*
 * The collaborators a session is built from. Production wiring uses the `CoreXxx`
 * implementations; tests substitute whatever they need to observe.
 */
pub struct SessionServices {
    pub config: AppConfig,
    pub layout: SandboxLayout,
    pub preferences: Arc<dyn PreferenceStore>,
    pub drives: Arc<dyn DriveRegistryOperations>,
    pub locator: Arc<dyn SketchLocatorOperations>,
    pub file_ops: Arc<dyn FileOpsOperations>,
    pub recent: Arc<dyn RecentProjectsOperations>,
    pub callbacks: Arc<dyn UiCallbacks>,
}

// Local calendar date, falling back to UTC where the offset cannot be determined.
pub fn today_local() -> Date {
    OffsetDateTime::now_local()
        .unwrap_or_else(|_| OffsetDateTime::now_utc())
        .date()
}

// Deleting or moving a location root would take every project under it along.
fn refuse_location_root(address: &ProjectAddress) -> Result<()> {
    if address.is_location_root() {
        log::warn!("Session: Refusing to operate on location root {address}.");
        return Err(SessionError::LocationRoot(address.clone()));
    }
    Ok(())
}

/*
 * Ties the core pieces together for one editing session: which drive holds the
 * sketchbook, which project is selected, and the bookkeeping that has to follow a
 * selection or a move (recent projects, invalidated listings). The sketchbook root
 * is looked up again for every operation since the selected drive can disappear
 * or be changed at any time.
 */
pub struct SketchbookSession {
    services: SessionServices,
    current: Option<ProjectAddress>,
}

impl SketchbookSession {
    pub fn new(services: SessionServices) -> Self {
        SketchbookSession {
            services,
            current: None,
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.services.config
    }

    pub fn list_drives(&self) -> Vec<StorageDrive> {
        self.services.drives.list_drives()
    }

    /*
     * The drive holding the sketchbook. A missing selection is initialised with the
     * default drive; a selection that no longer matches a usable drive is replaced by
     * the default, so the user always ends up with a working sketchbook.
     */
    pub fn sketchbook_drive(&self) -> Result<StorageDrive> {
        let prefs = &self.services.preferences;
        let drives = self.list_drives();
        let fallback = default_drive(&drives).ok_or(SessionError::NoDrive)?;

        if !prefs.contains(STORAGE_DRIVE_PREF) {
            log::debug!("Session: No drive selected yet, using {}.", fallback.root_id);
            prefs.put_string(STORAGE_DRIVE_PREF, &fallback.root_id)?;
        }

        let location = prefs.get_string(SKETCHBOOK_LOCATION_PREF).unwrap_or_default();
        if location.is_empty() {
            prefs.put_string(
                SKETCHBOOK_LOCATION_PREF,
                &self.services.config.default_sketchbook_location,
            )?;
        }

        let saved_id = prefs.get_string(STORAGE_DRIVE_PREF).unwrap_or_default();
        match drive_by_root_id(&drives, &saved_id) {
            Some(drive) if drive.root.is_some() => Ok(drive.clone()),
            _ => {
                log::warn!(
                    "Session: Selected drive '{saved_id}' is unavailable, falling back to {}.",
                    fallback.root_id
                );
                prefs.put_string(STORAGE_DRIVE_PREF, &fallback.root_id)?;
                Ok(fallback.clone())
            }
        }
    }

    pub fn sketchbook_folder(&self) -> Result<LazyHandle> {
        let drive = self.sketchbook_drive()?;
        let root = drive.root_handle();
        if !drive.drive_type.uses_sketchbook_subpath() {
            return Ok(root);
        }

        let location = self
            .services
            .preferences
            .get_string(SKETCHBOOK_LOCATION_PREF)
            .filter(|l| !l.is_empty())
            .unwrap_or_else(|| self.services.config.default_sketchbook_location.clone());
        let folder = root.child_path(&location);
        if let Ok(handle) = folder.resolve() {
            if !handle.exists() {
                if let Err(e) = handle.create_dir_all() {
                    log::warn!("Session: Could not create sketchbook folder {handle}: {e}");
                }
            }
        }
        Ok(folder)
    }

    pub fn resolver(&self) -> Result<CoreLocationResolver> {
        Ok(CoreLocationResolver::new(
            self.sketchbook_folder()?,
            self.services.layout.clone(),
        ))
    }

    pub fn use_internal_storage_drive(&self) -> Result<()> {
        let drives = self.list_drives();
        let internal = drives
            .iter()
            .find(|d| d.drive_type == DriveType::Internal)
            .ok_or(SessionError::NoDrive)?;
        self.services
            .preferences
            .put_string(STORAGE_DRIVE_PREF, &internal.root_id)?;
        log::info!("Session: Switched the sketchbook to internal storage.");
        self.services.callbacks.on_project_list_invalidated();
        Ok(())
    }

    // Remembers a tree root the user just granted access to and moves the sketchbook there.
    pub fn grant_permissioned_root(&self, root: &Path) -> Result<()> {
        let root_id = drives::path_to_root_id(root);
        let prefs = &self.services.preferences;
        prefs.put_string(PERMISSIONED_ROOT_PREF, &root_id)?;
        prefs.put_string(STORAGE_DRIVE_PREF, &root_id)?;
        log::info!("Session: Granted sketchbook root {root:?}.");
        self.services.callbacks.on_project_list_invalidated();
        Ok(())
    }

    pub fn current_project(&self) -> Option<&ProjectAddress> {
        self.current.as_ref()
    }

    /*
     * Makes `address` the current project. The address has to resolve; an address
     * that points at a valid project is also recorded as recently used.
     */
    pub fn select_project(&mut self, address: ProjectAddress) -> Result<()> {
        let resolver = self.resolver()?;
        let handle = resolver.resolve(&address)?;
        if self.services.locator.is_valid_project(&handle) {
            self.services
                .recent
                .record(&address, &resolver, self.services.locator.as_ref())?;
        }
        log::debug!("Session: Selected {address}.");
        self.current = Some(address);
        Ok(())
    }

    pub fn select_new_temporary_project(&mut self, today: Date) -> Result<ProjectAddress> {
        let prefs = &self.services.preferences;
        let last_name = prefs.get_string(LAST_TEMPORARY_NAME_PREF);
        let name = temp_names::next_name(last_name.as_deref(), today)?;
        let address = ProjectAddress::new(LocationKind::Temporary, format!("/{name}"));

        let handle = self.resolver()?.resolve(&address)?;
        handle.create_dir_all()?;
        prefs.put_string(LAST_TEMPORARY_NAME_PREF, &name)?;

        log::info!("Session: Started temporary project {name}.");
        self.current = Some(address.clone());
        Ok(address)
    }

    /*
     * Moves a project (or a folder of projects). Whatever the file layer refuses up
     * front is reported to the UI and nothing is touched; only an occupied destination
     * counts as a plain `Ok(false)`. Location roots are never moved. When the moved project is
     * the current one it stays selected at its new address.
     */
    pub fn move_project(&mut self, source: &ProjectAddress, dest: &ProjectAddress) -> Result<bool> {
        refuse_location_root(source)?;
        refuse_location_root(dest)?;
        let resolver = self.resolver()?;
        let was_selected = self.current.as_ref() == Some(source);

        let moved = match self
            .services
            .file_ops
            .move_node(&resolver.locate(source), &resolver.locate(dest))
        {
            Ok(moved) => moved,
            Err(
                e @ (FileOpError::DestinationOccupied(_)
                | FileOpError::SourceMissing(_)
                | FileOpError::DestinationInsideSource(_)),
            ) => {
                log::warn!("Session: Refusing to move {source} to {dest}: {e}");
                self.services.callbacks.on_move_refused(&e.to_string());
                return match e {
                    FileOpError::DestinationOccupied(_) => Ok(false),
                    other => Err(other.into()),
                };
            }
            Err(e) => return Err(e.into()),
        };

        if moved && was_selected {
            self.current = Some(dest.clone());
            self.services
                .recent
                .record(dest, &resolver, self.services.locator.as_ref())?;
        }
        self.services.callbacks.on_project_list_invalidated();
        Ok(moved)
    }

    pub fn delete_project(&mut self, address: &ProjectAddress) -> Result<()> {
        refuse_location_root(address)?;
        let resolver = self.resolver()?;
        self.services
            .file_ops
            .delete(&resolver.locate(address), false)?;
        if self.current.as_ref() == Some(address) {
            self.current = None;
        }
        self.services.callbacks.on_project_list_invalidated();
        Ok(())
    }

    pub fn recent_projects(&self) -> Result<Vec<ProjectAddress>> {
        let resolver = self.resolver()?;
        Ok(self
            .services
            .recent
            .list(&resolver, self.services.locator.as_ref()))
    }

    pub fn recent_listing_items(&self) -> Result<Vec<ListingItem>> {
        let recents = self.recent_projects()?;
        let mut items = Vec::with_capacity(recents.len() + 1);
        items.push(ListingItem::navigate_up(
            ProjectAddress::new(LocationKind::PrimaryCollection, ""),
            false,
        ));
        if recents.is_empty() {
            items.push(ListingItem::empty_placeholder());
            return Ok(items);
        }
        for address in recents {
            let mut item = ListingItem::entry(ListingKind::Project, address.name(), address.clone(), false);
            item.secondary_text = Some(format!("{}{}", address.kind.label(), address.path_prefix()));
            items.push(item);
        }
        Ok(items)
    }

    fn ignored_names(kind: LocationKind) -> Vec<String> {
        match kind {
            LocationKind::PrimaryCollection => vec![LIBRARIES_FOLDER.to_string()],
            _ => Vec::new(),
        }
    }

    // Navigator listing of the folder at `location`.
    pub fn list_folder(&self, location: &ProjectAddress, flags: ContainerFlags) -> Result<Vec<ListingItem>> {
        let resolver = self.resolver()?;
        let handle = resolver.resolve(location)?;
        Ok(self.services.locator.list_project_containers(
            &handle,
            location,
            &Self::ignored_names(location.kind),
            flags,
        ))
    }

    pub fn list_projects(&self, kind: LocationKind, depth: i32) -> Result<Vec<Handle>> {
        let resolver = self.resolver()?;
        let root = resolver.root_for(kind).resolve()?;
        Ok(self
            .services
            .locator
            .list_projects(&root, depth, &Self::ignored_names(kind)))
    }

    pub fn properties_for(&self, address: &ProjectAddress) -> Result<SketchProperties> {
        let source = CoreSketchPropertiesSource::new(Arc::new(self.resolver()?));
        Ok(source.properties_for(address)?)
    }
}
