/*
 * Per-project build settings handed to the build pipeline. They live in a
 * `sketch.properties` file inside the project folder; a project without one simply
 * has no settings.
 */
use crate::core::location::{LocationResolverOperations, ResolveError};
use crate::core::models::ProjectAddress;
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::sync::Arc;
use thiserror::Error;

pub const PROPERTIES_FILENAME: &str = "sketch.properties";

#[derive(Debug, Error)]
pub enum PropertiesError {
    #[error(transparent)]
    NotResolvable(#[from] ResolveError),
    #[error("Could not read project properties: {0}")]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, PropertiesError>;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SketchProperties {
    values: BTreeMap<String, String>,
}

impl SketchProperties {
    /*
     * `key=value` per line. Blank lines and lines starting with `#` or `!` are
     * comments; a line without `=` is a key with an empty value.
     */
    pub fn parse(contents: &str) -> Self {
        let mut values = BTreeMap::new();
        for line in contents.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
                continue;
            }
            let (key, value) = line.split_once('=').unwrap_or((line, ""));
            values.insert(key.trim().to_string(), value.trim().to_string());
        }
        SketchProperties { values }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

pub trait SketchPropertiesSource: Send + Sync {
    fn properties_for(&self, address: &ProjectAddress) -> Result<SketchProperties>;
}

pub struct CoreSketchPropertiesSource {
    resolver: Arc<dyn LocationResolverOperations>,
}

impl CoreSketchPropertiesSource {
    pub fn new(resolver: Arc<dyn LocationResolverOperations>) -> Self {
        CoreSketchPropertiesSource { resolver }
    }
}

impl SketchPropertiesSource for CoreSketchPropertiesSource {
    fn properties_for(&self, address: &ProjectAddress) -> Result<SketchProperties> {
        let file = self.resolver.resolve(address)?.child(PROPERTIES_FILENAME);
        if !file.is_file() {
            log::trace!("PropertiesSource: No {PROPERTIES_FILENAME} for {address}.");
            return Ok(SketchProperties::default());
        }
        let contents = fs::read_to_string(file.path())?;
        Ok(SketchProperties::parse(&contents))
    }
}
