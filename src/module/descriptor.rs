//! Module descriptor types.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// category → component type → exported names (in declaration order)
pub type ExportCatalog = BTreeMap<String, BTreeMap<String, Vec<String>>>;

/// Everything the registry knows about one module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleDescriptor {
    pub name: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "ModuleMeta::is_empty")]
    pub meta: ModuleMeta,
    #[serde(default)]
    pub exports: ExportCatalog,
}

/// Optional `[Info]` fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModuleMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub license: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_chtl_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_chtl_version: Option<String>,
    /// Keys with no dedicated field, lowercased.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, String>,
}

impl ModuleMeta {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// One exported component, as seen from outside the module.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ComponentRef {
    pub module: String,
    pub category: String,
    pub kind: String,
}

impl ModuleDescriptor {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            meta: ModuleMeta::default(),
            exports: ExportCatalog::new(),
        }
    }

    /// All `(category, type, name)` triples of the export catalog.
    pub fn components(&self) -> impl Iterator<Item = (&str, &str, &str)> {
        self.exports.iter().flat_map(|(category, kinds)| {
            kinds.iter().flat_map(move |(kind, names)| {
                names
                    .iter()
                    .map(move |name| (category.as_str(), kind.as_str(), name.as_str()))
            })
        })
    }

    pub fn component_count(&self) -> usize {
        self.exports
            .values()
            .flat_map(|kinds| kinds.values())
            .map(Vec::len)
            .sum()
    }
}
