//! Snapshot view of a destination's existing tables and columns.
//!
//! Destinations fold identifiers differently (lowercasing, uppercasing,
//! replacing characters), so the [`InfoSchema`] carries two injected
//! functions: one locating a resource path in destination form, and one
//! translating a collection field name into a destination column name.
//! Every comparison between an existing and a proposed name goes through
//! the translation.

use std::collections::HashMap;
use std::fmt;

use matsql_types::CollectionName;
use serde::{Deserialize, Serialize};

/// Maps a binding's resource path to the destination's form of it.
pub type LocatePathFn = Box<dyn Fn(&[String]) -> Vec<String> + Send + Sync>;
/// Maps a field name to the destination's form of it.
pub type TranslateFieldFn = Box<dyn Fn(&str) -> String + Send + Sync>;

/// One existing destination column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointField {
    pub name: String,
    pub nullable: bool,
    /// Connector-specific type descriptor (e.g. `"bigint"`).
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub character_max_length: Option<u32>,
}

impl EndpointField {
    #[must_use]
    pub fn new(name: impl Into<String>, type_name: impl Into<String>, nullable: bool) -> Self {
        Self {
            name: name.into(),
            nullable,
            type_name: type_name.into(),
            character_max_length: None,
        }
    }
}

#[derive(Debug, Default)]
struct EndpointResource {
    fields: Vec<EndpointField>,
    owner: Option<CollectionName>,
}

/// Queryable snapshot of existing destination tables.
pub struct InfoSchema {
    resources: HashMap<Vec<String>, EndpointResource>,
    locate_path: LocatePathFn,
    translate_field: TranslateFieldFn,
}

impl fmt::Debug for InfoSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InfoSchema")
            .field("resources", &self.resources)
            .finish_non_exhaustive()
    }
}

impl InfoSchema {
    pub fn new(locate_path: LocatePathFn, translate_field: TranslateFieldFn) -> Self {
        Self {
            resources: HashMap::new(),
            locate_path,
            translate_field,
        }
    }

    /// An empty schema using one of the built-in [`Translation`]s for both
    /// paths and fields.
    #[must_use]
    pub fn with_translation(translation: Translation) -> Self {
        Self::new(
            Box::new(move |path: &[String]| path.iter().map(|s| translation.apply(s)).collect()),
            Box::new(move |field: &str| translation.apply(field)),
        )
    }

    /// Record that a table exists at `path`, even if it has no columns.
    pub fn push_resource(&mut self, path: &[String]) {
        let located = self.locate_path(path);
        self.resources.entry(located).or_default();
    }

    /// Record an existing column of the table at `path`.
    pub fn push_field(&mut self, path: &[String], field: EndpointField) {
        let located = self.locate_path(path);
        self.resources.entry(located).or_default().fields.push(field);
    }

    /// Record which source collection the table at `path` is materializing.
    pub fn set_owner(&mut self, path: &[String], collection: CollectionName) {
        let located = self.locate_path(path);
        self.resources.entry(located).or_default().owner = Some(collection);
    }

    #[must_use]
    pub fn locate_path(&self, path: &[String]) -> Vec<String> {
        (self.locate_path)(path)
    }

    #[must_use]
    pub fn translate_field(&self, field: &str) -> String {
        (self.translate_field)(field)
    }

    #[must_use]
    pub fn has_resource(&self, path: &[String]) -> bool {
        self.resources.contains_key(&self.locate_path(path))
    }

    /// Existing columns of the table at `path`. Empty if the table does not exist.
    #[must_use]
    pub fn fields(&self, path: &[String]) -> &[EndpointField] {
        self.resources
            .get(&self.locate_path(path))
            .map(|r| r.fields.as_slice())
            .unwrap_or_default()
    }

    /// The existing column that collection field `field` would materialize to.
    #[must_use]
    pub fn resolve(&self, path: &[String], field: &str) -> Option<&EndpointField> {
        let translated = self.translate_field(field);
        self.fields(path)
            .iter()
            .find(|existing| self.translate_field(&existing.name) == translated)
    }

    /// The source collection already materializing to `path`, if known.
    #[must_use]
    pub fn table_used_by(&self, path: &[String]) -> Option<&CollectionName> {
        self.resources
            .get(&self.locate_path(path))
            .and_then(|r| r.owner.as_ref())
    }
}

/// Built-in identifier folding rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Translation {
    #[default]
    Identity,
    Lowercase,
    Uppercase,
}

impl Translation {
    #[must_use]
    pub fn apply(self, ident: &str) -> String {
        match self {
            Self::Identity => ident.to_string(),
            Self::Lowercase => ident.to_lowercase(),
            Self::Uppercase => ident.to_uppercase(),
        }
    }
}

/// Serializable form of an [`InfoSchema`], as produced by a destination
/// driver querying its catalog.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InfoSchemaSnapshot {
    #[serde(default)]
    pub translation: Translation,
    #[serde(default)]
    pub tables: Vec<TableSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableSnapshot {
    pub path: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<CollectionName>,
    #[serde(default)]
    pub columns: Vec<EndpointField>,
}

impl InfoSchemaSnapshot {
    #[must_use]
    pub fn into_info_schema(self) -> InfoSchema {
        let mut is = InfoSchema::with_translation(self.translation);
        for table in self.tables {
            is.push_resource(&table.path);
            if let Some(owner) = table.owner {
                is.set_owner(&table.path, owner);
            }
            for column in table.columns {
                is.push_field(&table.path, column);
            }
        }
        is
    }
}
