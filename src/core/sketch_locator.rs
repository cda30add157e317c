use crate::core::location::Handle;
use crate::core::models::{ListingItem, ListingKind, ProjectAddress};

/*
 * Discovery and validation of projects under a resolved directory. A project is a
 * directory that directly holds at least one file carrying the marker extension;
 * discovery never descends into a project once one is found, so folders nested in a
 * project (library examples, data folders) are not reported separately.
 *
 * Unreadable directories are treated as empty and logged. Nothing here writes.
 */

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ContainerFlags {
    pub parent_droppable: bool,
    pub items_draggable: bool,
}

pub trait SketchLocatorOperations: Send + Sync {
    fn is_valid_project(&self, dir: &Handle) -> bool;

    /*
     * Collects the projects under `dir`. `depth == 0` inspects `dir` alone, a negative
     * depth searches without limit, otherwise each level of recursion decrements it.
     * Directories whose name is in `ignore` are pruned, `dir` itself included.
     */
    fn list_projects(&self, dir: &Handle, depth: i32, ignore: &[String]) -> Vec<Handle>;

    fn contains_projects(&self, dir: &Handle, ignore: &[String]) -> bool;

    /*
     * Builds the navigator listing for `dir`, which is addressed as `location`. The
     * first item always navigates up to the parent of `location`; the rest are the
     * child folders holding projects and the child projects, folders first and then
     * by name. With nothing to show, a single placeholder follows the navigate-up item.
     */
    fn list_project_containers(
        &self,
        dir: &Handle,
        location: &ProjectAddress,
        ignore: &[String],
        flags: ContainerFlags,
    ) -> Vec<ListingItem>;
}

pub struct CoreSketchLocator {
    marker_extension: String,
}

impl CoreSketchLocator {
    pub fn new(marker_extension: &str) -> Self {
        CoreSketchLocator {
            marker_extension: marker_extension.trim_start_matches('.').to_string(),
        }
    }

    fn has_marker(&self, file_name: &str) -> bool {
        match file_name.rfind('.') {
            Some(idx) => file_name[idx + 1..].eq_ignore_ascii_case(&self.marker_extension),
            None => false,
        }
    }

    fn children_of(dir: &Handle) -> Vec<Handle> {
        match dir.list_children() {
            Ok(children) => children,
            Err(e) => {
                log::warn!("SketchLocator: Could not list {dir}: {e}");
                Vec::new()
            }
        }
    }

    fn is_ignored(dir: &Handle, ignore: &[String]) -> bool {
        dir.name()
            .is_some_and(|name| ignore.iter().any(|ignored| *ignored == name))
    }
}

impl Default for CoreSketchLocator {
    fn default() -> Self {
        Self::new(crate::core::config::DEFAULT_MARKER_EXTENSION)
    }
}

impl SketchLocatorOperations for CoreSketchLocator {
    fn is_valid_project(&self, dir: &Handle) -> bool {
        if !dir.is_dir() {
            return false;
        }
        Self::children_of(dir)
            .iter()
            .filter(|child| child.is_file())
            .filter_map(Handle::name)
            .any(|name| self.has_marker(&name))
    }

    fn list_projects(&self, dir: &Handle, depth: i32, ignore: &[String]) -> Vec<Handle> {
        if !dir.is_dir() || Self::is_ignored(dir, ignore) {
            return Vec::new();
        }
        if self.is_valid_project(dir) {
            return vec![dir.clone()];
        }
        if depth == 0 {
            return Vec::new();
        }

        let mut projects = Vec::new();
        for child in Self::children_of(dir).iter().filter(|c| c.is_dir()) {
            projects.extend(self.list_projects(child, depth - 1, ignore));
        }
        log::trace!("SketchLocator: Found {} projects under {dir}.", projects.len());
        projects
    }

    fn contains_projects(&self, dir: &Handle, ignore: &[String]) -> bool {
        if !dir.is_dir() || Self::is_ignored(dir, ignore) {
            return false;
        }
        if self.is_valid_project(dir) {
            return true;
        }
        Self::children_of(dir)
            .iter()
            .filter(|c| c.is_dir())
            .any(|child| self.contains_projects(child, ignore))
    }

    fn list_project_containers(
        &self,
        dir: &Handle,
        location: &ProjectAddress,
        ignore: &[String],
        flags: ContainerFlags,
    ) -> Vec<ListingItem> {
        let navigate_up = ListingItem::navigate_up(location.parent_address(), flags.parent_droppable);
        if !dir.is_dir() {
            return vec![navigate_up, ListingItem::empty_placeholder()];
        }

        let mut items = Vec::new();
        for child in Self::children_of(dir) {
            let Some(name) = child.name() else {
                continue;
            };
            if ignore.contains(&name) {
                continue;
            }
            let address = location.child(&name);
            if self.is_valid_project(&child) {
                items.push(ListingItem::entry(
                    ListingKind::Project,
                    &name,
                    address,
                    flags.items_draggable,
                ));
            } else if self.contains_projects(&child, ignore) {
                items.push(ListingItem::entry(
                    ListingKind::Folder,
                    &name,
                    address,
                    flags.items_draggable,
                ));
            }
        }

        if items.is_empty() {
            return vec![navigate_up, ListingItem::empty_placeholder()];
        }
        items.sort_by(|a, b| a.kind.cmp(&b.kind).then_with(|| a.text.cmp(&b.text)));

        let mut listing = Vec::with_capacity(items.len() + 1);
        listing.push(navigate_up);
        listing.extend(items);
        listing
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::location::BackendKind;
    use crate::core::models::{EMPTY_FOLDER_TEXT, LocationKind, NAVIGATE_UP_TEXT};
    use std::fs;
    use std::path::Path;
    use tempfile::tempdir;

    fn make_project(dir: &Path, marker_name: &str) {
        fs::create_dir_all(dir).unwrap();
        fs::write(dir.join(marker_name), "void setup() {}").unwrap();
    }

    fn handle(path: &Path) -> Handle {
        Handle::new(path.to_path_buf(), BackendKind::DirectPath)
    }

    #[test]
    fn test_is_valid_project_matches_marker_case_insensitively() {
        let dir = tempdir().unwrap();
        let locator = CoreSketchLocator::new("pde");
        make_project(&dir.path().join("upper"), "Sketch.PDE");
        make_project(&dir.path().join("lower"), "sketch.pde");
        make_project(&dir.path().join("other"), "notes.txt");

        assert!(locator.is_valid_project(&handle(&dir.path().join("upper"))));
        assert!(locator.is_valid_project(&handle(&dir.path().join("lower"))));
        assert!(!locator.is_valid_project(&handle(&dir.path().join("other"))));
    }

    #[test]
    fn test_is_valid_project_ignores_subfolders_and_empty_dirs() {
        let dir = tempdir().unwrap();
        let locator = CoreSketchLocator::default();
        let outer = dir.path().join("outer");
        make_project(&outer.join("inner"), "inner.pde");
        fs::create_dir_all(dir.path().join("empty")).unwrap();
        // A folder named like a marker is not a marker file.
        fs::create_dir_all(dir.path().join("tricky").join("fake.pde")).unwrap();

        assert!(!locator.is_valid_project(&handle(&outer)));
        assert!(!locator.is_valid_project(&handle(&dir.path().join("empty"))));
        assert!(!locator.is_valid_project(&handle(&dir.path().join("tricky"))));
        assert!(!locator.is_valid_project(&handle(&dir.path().join("missing"))));
    }

    #[test]
    fn test_list_projects_stops_at_project_boundary() {
        // Arrange
        let dir = tempdir().unwrap();
        let locator = CoreSketchLocator::default();
        let outer = dir.path().join("outer");
        make_project(&outer, "outer.pde");
        make_project(&outer.join("nested"), "nested.pde");

        // Act
        let found = locator.list_projects(&handle(dir.path()), -1, &[]);

        // Assert
        assert_eq!(found, vec![handle(&outer)]);
    }

    #[test]
    fn test_list_projects_respects_depth() {
        let dir = tempdir().unwrap();
        let locator = CoreSketchLocator::default();
        make_project(&dir.path().join("a"), "a.pde");
        make_project(&dir.path().join("deep").join("b"), "b.pde");
        let root = handle(dir.path());

        assert!(locator.list_projects(&root, 0, &[]).is_empty());
        assert_eq!(locator.list_projects(&root, 1, &[]).len(), 1);
        assert_eq!(locator.list_projects(&root, 2, &[]).len(), 2);
        assert_eq!(locator.list_projects(&root, -1, &[]).len(), 2);
    }

    #[test]
    fn test_ignore_list_prunes_root_and_children() {
        let dir = tempdir().unwrap();
        let locator = CoreSketchLocator::default();
        let libraries = dir.path().join("libraries");
        make_project(&libraries.join("lib_example"), "ex.pde");
        make_project(&dir.path().join("mine"), "mine.pde");
        let ignore = vec!["libraries".to_string()];

        let found = locator.list_projects(&handle(dir.path()), -1, &ignore);
        assert_eq!(found, vec![handle(&dir.path().join("mine"))]);

        assert!(locator.list_projects(&handle(&libraries), -1, &ignore).is_empty());
        assert!(!locator.contains_projects(&handle(&libraries), &ignore));
        assert!(locator.contains_projects(&handle(&libraries), &[]));
    }

    #[test]
    fn test_list_project_containers_orders_folders_first() {
        // Arrange
        let dir = tempdir().unwrap();
        let locator = CoreSketchLocator::default();
        make_project(&dir.path().join("zeta"), "zeta.pde");
        make_project(&dir.path().join("alpha"), "alpha.pde");
        make_project(&dir.path().join("group").join("inside"), "inside.pde");
        fs::create_dir_all(dir.path().join("nothing_here")).unwrap();
        let location = ProjectAddress::new(LocationKind::PrimaryCollection, "/folder");
        let flags = ContainerFlags {
            parent_droppable: true,
            items_draggable: true,
        };

        // Act
        let items = locator.list_project_containers(&handle(dir.path()), &location, &[], flags);

        // Assert
        let summary: Vec<(ListingKind, &str)> =
            items.iter().map(|i| (i.kind, i.text.as_str())).collect();
        assert_eq!(
            summary,
            vec![
                (ListingKind::NavigateUp, NAVIGATE_UP_TEXT),
                (ListingKind::Folder, "group"),
                (ListingKind::Project, "alpha"),
                (ListingKind::Project, "zeta"),
            ]
        );
        assert_eq!(
            items[0].address,
            Some(ProjectAddress::new(LocationKind::PrimaryCollection, ""))
        );
        assert!(items[0].droppable);
        assert_eq!(
            items[2].address,
            Some(ProjectAddress::new(LocationKind::PrimaryCollection, "/folder/alpha"))
        );
        assert!(items[1].droppable && items[1].draggable);
        assert!(!items[2].droppable && items[2].draggable);
    }

    #[test]
    fn test_list_project_containers_empty_yields_placeholder() {
        let dir = tempdir().unwrap();
        let locator = CoreSketchLocator::default();
        fs::create_dir_all(dir.path().join("just_a_folder")).unwrap();
        let location = ProjectAddress::new(LocationKind::BuiltinExample, "");

        let items = locator.list_project_containers(
            &handle(dir.path()),
            &location,
            &[],
            ContainerFlags::default(),
        );

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].kind, ListingKind::NavigateUp);
        assert_eq!(items[1].kind, ListingKind::Message);
        assert_eq!(items[1].text, EMPTY_FOLDER_TEXT);

        let missing = locator.list_project_containers(
            &handle(&dir.path().join("gone")),
            &location,
            &[],
            ContainerFlags::default(),
        );
        assert_eq!(missing.len(), 2);
    }
}
