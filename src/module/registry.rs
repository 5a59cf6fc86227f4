//! In-memory module registry with atomic generation swaps.
//!
//! Readers call [`Registry::current`] (or the lookup helpers) and get an
//! `Arc` of one immutable [`Generation`]. Writers build a complete new
//! generation and swap it in, so a reader sees either the whole old state or
//! the whole new one.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arc_swap::ArcSwap;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::descriptor::{ComponentRef, ModuleDescriptor};
use super::discover::{ExtractionReport, extract_all, locate_documents, lookup_dirs};
use crate::utils::fs::{get_mtime, newest_mtime};
use crate::{debug, log};

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("failed to access registry snapshot `{path}`")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("registry snapshot `{path}` is not valid JSON")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("registry snapshot entry `{key}` holds module `{name}`")]
    NameMismatch { key: String, name: String },
}

/// Durable form of a registry: module name → descriptor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RegistrySnapshot(pub BTreeMap<String, ModuleDescriptor>);

/// One immutable registry state.
#[derive(Debug, Default)]
pub struct Generation {
    pub id: u64,
    modules: BTreeMap<String, Arc<ModuleDescriptor>>,
    /// component name → every module exporting it
    components: FxHashMap<String, Vec<ComponentRef>>,
}

impl Generation {
    fn build(id: u64, modules: BTreeMap<String, Arc<ModuleDescriptor>>) -> Self {
        let mut components: FxHashMap<String, Vec<ComponentRef>> = FxHashMap::default();
        for module in modules.values() {
            for (category, kind, name) in module.components() {
                components.entry(name.to_string()).or_default().push(ComponentRef {
                    module: module.name.clone(),
                    category: category.to_string(),
                    kind: kind.to_string(),
                });
            }
        }
        for refs in components.values_mut() {
            refs.sort();
        }
        Self {
            id,
            modules,
            components,
        }
    }

    pub fn lookup(&self, name: &str) -> Option<&Arc<ModuleDescriptor>> {
        self.modules.get(name)
    }

    pub fn find_component(&self, name: &str) -> &[ComponentRef] {
        self.components.get(name).map_or(&[], Vec::as_slice)
    }

    /// Descriptors in name order.
    pub fn modules(&self) -> impl Iterator<Item = &Arc<ModuleDescriptor>> {
        self.modules.values()
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

/// How [`Registry::load_or_extract`] filled the registry.
#[derive(Debug)]
pub enum LoadOutcome {
    /// Snapshot was newer than every source document.
    Restored,
    /// A fresh extraction pass ran and the snapshot was rewritten.
    Extracted(ExtractionReport),
}

pub struct Registry {
    current: ArcSwap<Generation>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    pub fn new() -> Self {
        Self {
            current: ArcSwap::from_pointee(Generation::default()),
        }
    }

    #[inline]
    pub fn current(&self) -> Arc<Generation> {
        self.current.load_full()
    }

    /// Insert or replace one module. Returns the new generation id.
    pub fn register(&self, descriptor: ModuleDescriptor) -> u64 {
        let descriptor = Arc::new(descriptor);
        let previous = self.current.rcu(|generation| {
            let mut modules = generation.modules.clone();
            modules.insert(descriptor.name.clone(), Arc::clone(&descriptor));
            Generation::build(generation.id + 1, modules)
        });
        // `rcu` hands back the generation it replaced
        previous.id + 1
    }

    /// Install the result of a full extraction pass as one generation.
    pub fn replace_all(&self, descriptors: impl IntoIterator<Item = ModuleDescriptor>) -> u64 {
        let modules: BTreeMap<_, _> = descriptors
            .into_iter()
            .map(|d| (d.name.clone(), Arc::new(d)))
            .collect();
        let previous = self
            .current
            .rcu(|generation| Generation::build(generation.id + 1, modules.clone()));
        previous.id + 1
    }

    pub fn lookup(&self, name: &str) -> Option<Arc<ModuleDescriptor>> {
        self.current.load().lookup(name).cloned()
    }

    /// Every `(module, category, type)` exporting a component named `name`.
    ///
    /// Several modules may export the same name; all of them are returned,
    /// sorted, and the caller picks one.
    pub fn find_component(&self, name: &str) -> Vec<ComponentRef> {
        self.current.load().find_component(name).to_vec()
    }

    pub fn snapshot(&self) -> RegistrySnapshot {
        RegistrySnapshot(
            self.current
                .load()
                .modules
                .iter()
                .map(|(name, module)| (name.clone(), (**module).clone()))
                .collect(),
        )
    }

    pub fn restore(&self, snapshot: RegistrySnapshot) -> Result<u64, RegistryError> {
        if let Some((key, module)) = snapshot.0.iter().find(|(key, m)| **key != m.name) {
            return Err(RegistryError::NameMismatch {
                key: key.clone(),
                name: module.name.clone(),
            });
        }
        Ok(self.replace_all(snapshot.0.into_values()))
    }

    /// Write the snapshot as JSON, replacing the file atomically.
    pub fn save(&self, path: &Path) -> Result<(), RegistryError> {
        let io_err = |source| RegistryError::Io {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        let json = serde_json::to_string_pretty(&self.snapshot()).map_err(|source| {
            RegistryError::Json {
                path: path.to_path_buf(),
                source,
            }
        })?;

        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json).map_err(io_err)?;
        fs::rename(&tmp, path).map_err(io_err)?;
        debug!("module"; "saved registry snapshot to {}", path.display());
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, RegistryError> {
        let content = fs::read_to_string(path).map_err(|source| RegistryError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let snapshot: RegistrySnapshot =
            serde_json::from_str(&content).map_err(|source| RegistryError::Json {
                path: path.to_path_buf(),
                source,
            })?;

        let registry = Self::new();
        registry.restore(snapshot)?;
        Ok(registry)
    }

    /// Restore from `snapshot` when it is up to date, else re-extract.
    ///
    /// The snapshot counts as up to date when it is newer than every module
    /// document, every module root and every directory a document is looked
    /// up in, so added, removed and renamed documents all invalidate it. A
    /// corrupt snapshot is treated as stale.
    pub fn load_or_extract(
        roots: &[PathBuf],
        snapshot: &Path,
    ) -> Result<(Self, LoadOutcome), RegistryError> {
        if is_snapshot_fresh(roots, snapshot) {
            match Self::load(snapshot) {
                Ok(registry) => {
                    debug!("module"; "restored {} modules from snapshot", registry.current().len());
                    return Ok((registry, LoadOutcome::Restored));
                }
                Err(e) => log!("warning"; "{e}, re-extracting"),
            }
        }

        let registry = Self::new();
        let report = registry.extract(roots);
        registry.save(snapshot)?;
        Ok((registry, LoadOutcome::Extracted(report)))
    }

    /// Run a full extraction pass and install its result.
    ///
    /// Failed documents are left out of the new generation.
    pub fn extract(&self, roots: &[PathBuf]) -> ExtractionReport {
        let mut report = extract_all(roots);
        let descriptors = std::mem::take(&mut report.descriptors);
        self.replace_all(descriptors.iter().cloned());
        report.descriptors = descriptors;
        report
    }
}

fn is_snapshot_fresh(roots: &[PathBuf], snapshot: &Path) -> bool {
    let Some(saved) = get_mtime(snapshot) else {
        return false;
    };
    let documents = locate_documents(roots);
    // a deleted or renamed document only shows up on its directory
    let dirs = lookup_dirs(roots);
    match newest_mtime(roots.iter().chain(&dirs).chain(&documents)) {
        Some(newest) => newest <= saved,
        None => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::parse::parse;
    use tempfile::TempDir;

    fn chtholly() -> ModuleDescriptor {
        parse(
            r#"[Info]{name="Chtholly"; version="1.0";}
               [Export]{[Custom] @Style Card, Banner; [Template] @Element Card;}"#,
        )
        .unwrap()
    }

    fn write_module(root: &Path, dir: &str, body: &str) {
        let path = root.join(dir).join("CMOD/info").join(format!("{dir}.chtl"));
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, body).unwrap();
    }

    #[test]
    fn test_register_and_lookup() {
        let registry = Registry::new();
        assert!(registry.lookup("Chtholly").is_none());

        let id = registry.register(chtholly());
        assert_eq!(id, 1);
        assert_eq!(registry.current().id, 1);
        assert_eq!(registry.lookup("Chtholly").unwrap().version, "1.0");
    }

    #[test]
    fn test_find_component_covers_every_triple() {
        let registry = Registry::new();
        let module = chtholly();
        registry.register(module.clone());

        for (category, kind, name) in module.components() {
            let refs = registry.find_component(name);
            assert!(refs.contains(&ComponentRef {
                module: "Chtholly".into(),
                category: category.into(),
                kind: kind.into(),
            }));
        }
        assert_eq!(registry.find_component("Card").len(), 2);
        assert!(registry.find_component("Missing").is_empty());
    }

    #[test]
    fn test_same_component_in_two_modules() {
        let registry = Registry::new();
        registry.register(chtholly());
        registry.register(
            parse(r#"[Info]{name="Other"; version="2";}[Export]{[Custom] @Style Banner;}"#)
                .unwrap(),
        );

        let refs = registry.find_component("Banner");
        let modules: Vec<_> = refs.iter().map(|r| r.module.as_str()).collect();
        assert_eq!(modules, vec!["Chtholly", "Other"]);
    }

    #[test]
    fn test_register_replaces_by_name() {
        let registry = Registry::new();
        registry.register(chtholly());
        let old = registry.current();

        let mut updated = ModuleDescriptor::new("Chtholly", "2.0");
        updated
            .exports
            .entry("Custom".into())
            .or_default()
            .insert("Var".into(), vec!["Palette".into()]);
        registry.register(updated);

        assert_eq!(registry.lookup("Chtholly").unwrap().version, "2.0");
        assert!(registry.find_component("Card").is_empty());
        assert_eq!(registry.find_component("Palette").len(), 1);

        // readers holding the old generation keep seeing it whole
        assert_eq!(old.lookup("Chtholly").unwrap().version, "1.0");
        assert_eq!(old.find_component("Card").len(), 2);
    }

    #[test]
    fn test_replace_all_drops_missing_modules() {
        let registry = Registry::new();
        registry.register(chtholly());
        registry.replace_all([ModuleDescriptor::new("Fresh", "0.1")]);

        assert!(registry.lookup("Chtholly").is_none());
        assert!(registry.lookup("Fresh").is_some());
        assert_eq!(registry.current().len(), 1);
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(".chtl/cache/module-registry.json");

        let registry = Registry::new();
        registry.register(chtholly());
        registry.save(&path).unwrap();

        let loaded = Registry::load(&path).unwrap();
        assert_eq!(loaded.snapshot(), registry.snapshot());
        assert_eq!(loaded.find_component("Banner").len(), 1);

        let json: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(json["Chtholly"]["exports"]["Custom"]["Style"][1], "Banner");
    }

    #[test]
    fn test_restore_rejects_mismatched_key() {
        let mut snapshot = RegistrySnapshot::default();
        snapshot.0.insert("Wrong".into(), chtholly());
        let err = Registry::new().restore(snapshot).unwrap_err();
        assert!(matches!(err, RegistryError::NameMismatch { .. }));
    }

    #[test]
    fn test_load_reports_bad_json() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("registry.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            Registry::load(&path),
            Err(RegistryError::Json { .. })
        ));
    }

    #[test]
    fn test_load_or_extract() {
        let dir = TempDir::new().unwrap();
        let roots = vec![dir.path().join("modules")];
        let snapshot = dir.path().join("cache/registry.json");
        write_module(
            &roots[0],
            "Chtholly",
            r#"[Info]{name="Chtholly"; version="1.0";}[Export]{[Custom] @Style Card;}"#,
        );

        let (registry, outcome) = Registry::load_or_extract(&roots, &snapshot).unwrap();
        assert!(matches!(outcome, LoadOutcome::Extracted(_)));
        assert!(registry.lookup("Chtholly").is_some());
        assert!(snapshot.exists());

        let (registry, outcome) = Registry::load_or_extract(&roots, &snapshot).unwrap();
        assert!(matches!(outcome, LoadOutcome::Restored));
        assert_eq!(registry.find_component("Card").len(), 1);
    }

    #[test]
    fn test_deleted_document_invalidates_snapshot() {
        let dir = TempDir::new().unwrap();
        let roots = vec![dir.path().join("modules")];
        let snapshot = dir.path().join("cache/registry.json");
        write_module(&roots[0], "Alpha", r#"[Info]{name="Alpha"; version="1";}"#);
        write_module(&roots[0], "Beta", r#"[Info]{name="Beta"; version="1";}"#);

        let (registry, _) = Registry::load_or_extract(&roots, &snapshot).unwrap();
        assert_eq!(registry.current().len(), 2);

        std::thread::sleep(std::time::Duration::from_millis(20));
        fs::remove_file(roots[0].join("Beta/CMOD/info/Beta.chtl")).unwrap();

        let (registry, outcome) = Registry::load_or_extract(&roots, &snapshot).unwrap();
        assert!(matches!(outcome, LoadOutcome::Extracted(_)));
        assert!(registry.lookup("Alpha").is_some());
        assert!(registry.lookup("Beta").is_none());
    }

    #[test]
    fn test_renamed_document_invalidates_snapshot() {
        let dir = TempDir::new().unwrap();
        let roots = vec![dir.path().join("modules")];
        let snapshot = dir.path().join("cache/registry.json");
        write_module(&roots[0], "Alpha", r#"[Info]{name="Alpha"; version="1";}"#);
        write_module(&roots[0], "Beta", r#"[Info]{name="Beta"; version="1";}"#);
        fs::write(roots[0].join("Beta/CMOD/info/extra.chtl"), "").unwrap();
        Registry::load_or_extract(&roots, &snapshot).unwrap();

        // two `.chtl` files and none named after the module: nothing to index
        std::thread::sleep(std::time::Duration::from_millis(20));
        let info = roots[0].join("Beta/CMOD/info");
        fs::rename(info.join("Beta.chtl"), info.join("old.chtl")).unwrap();

        let (registry, outcome) = Registry::load_or_extract(&roots, &snapshot).unwrap();
        assert!(matches!(outcome, LoadOutcome::Extracted(_)));
        assert!(registry.lookup("Beta").is_none());
    }

    #[test]
    fn test_corrupt_snapshot_triggers_extraction() {
        let dir = TempDir::new().unwrap();
        let roots = vec![dir.path().join("modules")];
        write_module(
            &roots[0],
            "Chtholly",
            r#"[Info]{name="Chtholly"; version="1.0";}"#,
        );
        let snapshot = dir.path().join("registry.json");
        fs::write(&snapshot, "garbage").unwrap();

        let (registry, outcome) = Registry::load_or_extract(&roots, &snapshot).unwrap();
        assert!(matches!(outcome, LoadOutcome::Extracted(_)));
        assert!(registry.lookup("Chtholly").is_some());
    }

    #[test]
    fn test_extract_keeps_report_descriptors() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().to_path_buf();
        write_module(&root, "A", r#"[Info]{name="A"; version="1";}"#);
        write_module(&root, "B", "[Info]{name=");

        let registry = Registry::new();
        let report = registry.extract(&[root]);
        assert_eq!(report.descriptors.len(), 1);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(registry.current().len(), 1);
    }
}
