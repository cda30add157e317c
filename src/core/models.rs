use std::fmt;

/*
 * Which storage domain a project lives in. The per-variant behaviour (persisted
 * tag, readable label, classification flags) lives in a static capability table
 * rather than in scattered `match` arms, so adding a variant only means adding
 * one table row.
 */
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LocationKind {
    PrimaryCollection,
    BuiltinExample,
    LibraryExample,
    ExternalReference,
    Temporary,
}

#[derive(Debug)]
pub struct LocationTraits {
    pub tag: &'static str,
    pub label: &'static str,
    pub is_example: bool,
    pub is_temporary: bool,
}

static PRIMARY_COLLECTION_TRAITS: LocationTraits = LocationTraits {
    tag: "sketchbook",
    label: "Sketches",
    is_example: false,
    is_temporary: false,
};
static BUILTIN_EXAMPLE_TRAITS: LocationTraits = LocationTraits {
    tag: "example",
    label: "Examples",
    is_example: true,
    is_temporary: false,
};
static LIBRARY_EXAMPLE_TRAITS: LocationTraits = LocationTraits {
    tag: "libraryExample",
    label: "Library Examples",
    is_example: true,
    is_temporary: false,
};
static EXTERNAL_REFERENCE_TRAITS: LocationTraits = LocationTraits {
    tag: "external",
    label: "External",
    is_example: false,
    is_temporary: false,
};
static TEMPORARY_TRAITS: LocationTraits = LocationTraits {
    tag: "temporary",
    label: "Temporary",
    is_example: false,
    is_temporary: true,
};

impl LocationKind {
    pub const ALL: [LocationKind; 5] = [
        LocationKind::PrimaryCollection,
        LocationKind::BuiltinExample,
        LocationKind::LibraryExample,
        LocationKind::ExternalReference,
        LocationKind::Temporary,
    ];

    pub fn traits(self) -> &'static LocationTraits {
        match self {
            LocationKind::PrimaryCollection => &PRIMARY_COLLECTION_TRAITS,
            LocationKind::BuiltinExample => &BUILTIN_EXAMPLE_TRAITS,
            LocationKind::LibraryExample => &LIBRARY_EXAMPLE_TRAITS,
            LocationKind::ExternalReference => &EXTERNAL_REFERENCE_TRAITS,
            LocationKind::Temporary => &TEMPORARY_TRAITS,
        }
    }

    pub fn tag(self) -> &'static str {
        self.traits().tag
    }

    pub fn label(self) -> &'static str {
        self.traits().label
    }

    pub fn is_example(self) -> bool {
        self.traits().is_example
    }

    pub fn is_temporary(self) -> bool {
        self.traits().is_temporary
    }

    /*
     * Inverse of `tag()`. Unknown tags (older or newer persisted data) yield `None`
     * so that callers can skip the entry instead of failing the whole load.
     */
    pub fn from_tag(tag: &str) -> Option<LocationKind> {
        LocationKind::ALL.into_iter().find(|kind| kind.tag() == tag)
    }
}

impl fmt::Display for LocationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/*
 * Identifies one project: the storage domain plus a `/`-separated path relative to
 * that domain's root. For `ExternalReference` the path is the absolute identifier of
 * the standalone reference instead.
 */
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProjectAddress {
    pub kind: LocationKind,
    pub path: String,
}

impl ProjectAddress {
    pub fn new(kind: LocationKind, path: impl Into<String>) -> Self {
        ProjectAddress {
            kind,
            path: path.into(),
        }
    }

    pub fn name(&self) -> &str {
        match self.path.rfind('/') {
            Some(idx) if idx + 1 < self.path.len() => &self.path[idx + 1..],
            _ => &self.path,
        }
    }

    pub fn parent(&self) -> &str {
        match self.path.rfind('/') {
            Some(idx) => &self.path[..idx],
            None => "",
        }
    }

    // Everything up to and including the last separator.
    pub fn path_prefix(&self) -> &str {
        match self.path.rfind('/') {
            Some(idx) => &self.path[..=idx],
            None => "",
        }
    }

    pub fn parent_address(&self) -> ProjectAddress {
        ProjectAddress::new(self.kind, self.parent())
    }

    pub fn child(&self, name: &str) -> ProjectAddress {
        ProjectAddress::new(self.kind, format!("{}/{}", self.path, name))
    }

    // True when the path names no folder at all, only the root of its location.
    pub fn is_location_root(&self) -> bool {
        self.path.split('/').all(str::is_empty)
    }
}

impl fmt::Display for ProjectAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.kind.tag(), self.path)
    }
}

/*
 * Entry kinds of a navigator listing. The declaration order is the sort order used
 * for listings: navigation first, then folders, then projects.
 */
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ListingKind {
    NavigateUp,
    Message,
    Folder,
    Project,
}

pub const NAVIGATE_UP_TEXT: &str = "..";
pub const EMPTY_FOLDER_TEXT: &str = "This folder is empty";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingItem {
    pub kind: ListingKind,
    pub text: String,
    pub secondary_text: Option<String>,
    pub address: Option<ProjectAddress>,
    pub draggable: bool,
    pub droppable: bool,
}

impl ListingItem {
    pub fn navigate_up(target: ProjectAddress, droppable: bool) -> Self {
        ListingItem {
            kind: ListingKind::NavigateUp,
            text: NAVIGATE_UP_TEXT.to_string(),
            secondary_text: None,
            address: Some(target),
            draggable: false,
            droppable,
        }
    }

    pub fn empty_placeholder() -> Self {
        ListingItem {
            kind: ListingKind::Message,
            text: EMPTY_FOLDER_TEXT.to_string(),
            secondary_text: None,
            address: None,
            draggable: false,
            droppable: false,
        }
    }

    pub fn entry(kind: ListingKind, name: &str, address: ProjectAddress, draggable: bool) -> Self {
        ListingItem {
            kind,
            text: name.to_string(),
            secondary_text: None,
            address: Some(address),
            draggable,
            // Projects are not drop targets; folders are when their items are.
            droppable: kind == ListingKind::Folder && draggable,
        }
    }
}
