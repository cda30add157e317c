/*
 * The persisted list of recently opened projects, newest first.
 *
 * The list is stored as a newline-delimited blob under the `recent` preference, one
 * `<location tag>,<relative path>,` line per entry. Writing only prepends; the
 * cleanup (dropping malformed lines, entries whose project no longer exists and
 * duplicates, and capping the length) happens when the list is read back.
 */
use crate::core::location::LocationResolverOperations;
use crate::core::models::{LocationKind, ProjectAddress};
use crate::core::preferences::{PreferenceError, PreferenceStore, RECENT_PROJECTS_PREF};
use crate::core::sketch_locator::SketchLocatorOperations;
use std::sync::Arc;
use thiserror::Error;

pub const MAX_RECENT_PROJECTS: usize = 20;

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("Malformed persisted entry: '{entry}'")]
    MalformedPersistedEntry { entry: String },
    #[error(transparent)]
    Preference(#[from] PreferenceError),
}

pub type Result<T> = std::result::Result<T, PersistError>;

pub trait RecentProjectsOperations: Send + Sync {
    fn record(
        &self,
        address: &ProjectAddress,
        resolver: &dyn LocationResolverOperations,
        locator: &dyn SketchLocatorOperations,
    ) -> Result<()>;

    /*
     * Recent projects, most recent first, without duplicates and with every entry
     * revalidated against the storage it points at.
     */
    fn list(
        &self,
        resolver: &dyn LocationResolverOperations,
        locator: &dyn SketchLocatorOperations,
    ) -> Vec<ProjectAddress>;
}

pub struct CoreRecentProjects {
    preferences: Arc<dyn PreferenceStore>,
}

impl CoreRecentProjects {
    pub fn new(preferences: Arc<dyn PreferenceStore>) -> Self {
        CoreRecentProjects { preferences }
    }
}

pub fn encode_entry(address: &ProjectAddress) -> String {
    format!("{},{},\n", address.kind.tag(), address.path)
}

pub fn parse_entry(line: &str) -> Result<ProjectAddress> {
    let mut parts: Vec<&str> = line.split(',').collect();
    while parts.last().is_some_and(|p| p.is_empty()) {
        parts.pop();
    }
    let malformed = || PersistError::MalformedPersistedEntry {
        entry: line.to_string(),
    };
    if parts.len() < 2 {
        return Err(malformed());
    }
    let kind = LocationKind::from_tag(parts[0]).ok_or_else(malformed)?;
    Ok(ProjectAddress::new(kind, parts[1]))
}

fn is_still_valid(
    address: &ProjectAddress,
    resolver: &dyn LocationResolverOperations,
    locator: &dyn SketchLocatorOperations,
) -> bool {
    match resolver.resolve(address) {
        Ok(handle) => locator.is_valid_project(&handle),
        Err(e) => {
            log::debug!("RecentProjects: Dropping {address}: {e}");
            false
        }
    }
}

impl RecentProjectsOperations for CoreRecentProjects {
    fn record(
        &self,
        address: &ProjectAddress,
        resolver: &dyn LocationResolverOperations,
        locator: &dyn SketchLocatorOperations,
    ) -> Result<()> {
        let mut blob = encode_entry(address);
        for previous in self.list(resolver, locator) {
            blob.push_str(&encode_entry(&previous));
        }
        self.preferences.put_string(RECENT_PROJECTS_PREF, &blob)?;
        log::debug!("RecentProjects: Recorded {address}.");
        Ok(())
    }

    fn list(
        &self,
        resolver: &dyn LocationResolverOperations,
        locator: &dyn SketchLocatorOperations,
    ) -> Vec<ProjectAddress> {
        let blob = self
            .preferences
            .get_string(RECENT_PROJECTS_PREF)
            .unwrap_or_default();
        let mut lines: Vec<&str> = blob.split('\n').collect();
        while lines.last().is_some_and(|l| l.is_empty()) {
            lines.pop();
        }
        if lines.is_empty() {
            return Vec::new();
        }

        // Oldest first, so a later (more recent) duplicate replaces an earlier one.
        let mut projects: Vec<ProjectAddress> = Vec::with_capacity(lines.len());
        let newest_scanned = (lines.len() - 1).min(MAX_RECENT_PROJECTS);
        for line in lines[..=newest_scanned].iter().rev() {
            let address = match parse_entry(line) {
                Ok(address) => address,
                Err(e) => {
                    log::warn!("RecentProjects: Skipping entry. {e}");
                    continue;
                }
            };
            if !is_still_valid(&address, resolver, locator) {
                continue;
            }
            projects.retain(|existing| *existing != address);
            projects.push(address);
        }

        projects.reverse();
        projects.truncate(MAX_RECENT_PROJECTS);
        projects
    }
}
