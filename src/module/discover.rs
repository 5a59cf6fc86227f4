//! Locating module description documents and running extraction passes.
//!
//! Layouts accepted for a module directory `<root>/<Module>/`:
//!
//! ```text
//! <Module>/CMOD/info/<Module>.chtl     packaged module (any case of `cmod`)
//! <Module>/info/<Module>.chtl          standard layout
//! ```
//!
//! When the document named after the directory is missing, a lone `.chtl`
//! file inside `info/` is used instead.

use std::fs;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use rustc_hash::FxHashMap;

use super::descriptor::ModuleDescriptor;
use super::error::ExtractError;
use super::parse::parse;
use crate::{debug, log};

const INFO_DIR: &str = "info";
const DOC_EXT: &str = "chtl";

/// Outcome of one extraction pass.
#[derive(Debug, Default)]
pub struct ExtractionReport {
    /// Parsed descriptors, unique by name, in document path order.
    pub descriptors: Vec<ModuleDescriptor>,
    /// Documents that failed to read or parse. Each one skips only its module.
    pub failures: Vec<ExtractError>,
    /// Every document that was looked at, failed ones included.
    pub documents: Vec<PathBuf>,
}

/// Find the description documents of every module under `roots`.
///
/// Missing roots are skipped. The result is sorted by path.
pub fn locate_documents(roots: &[PathBuf]) -> Vec<PathBuf> {
    let mut documents: Vec<PathBuf> = module_dirs(roots)
        .iter()
        .filter_map(|module_dir| document_for(module_dir))
        .collect();
    documents.sort();
    documents
}

/// The description document of a single module directory, if it has one.
pub fn document_for(module_dir: &Path) -> Option<PathBuf> {
    let module_name = module_dir.file_name()?.to_str()?;
    info_dirs(module_dir)
        .iter()
        .filter(|dir| dir.is_dir())
        .find_map(|dir| document_in(dir, module_name))
}

/// Every directory whose listing decides which documents [`locate_documents`]
/// finds: module directories, their `cmod` packages and `info` folders.
///
/// Adding, removing or renaming a document changes the mtime of one of them.
pub fn lookup_dirs(roots: &[PathBuf]) -> Vec<PathBuf> {
    let mut dirs = Vec::new();
    for module_dir in module_dirs(roots) {
        for info in info_dirs(&module_dir) {
            if let Some(pkg) = info.parent()
                && pkg != module_dir
            {
                dirs.push(pkg.to_path_buf());
            }
            if info.is_dir() {
                dirs.push(info);
            }
        }
        dirs.push(module_dir);
    }
    dirs
}

fn module_dirs(roots: &[PathBuf]) -> Vec<PathBuf> {
    roots
        .iter()
        .filter_map(|root| fs::read_dir(root).ok())
        .flat_map(|entries| entries.flatten())
        .map(|entry| entry.path())
        .filter(|path| path.is_dir())
        .collect()
}

/// Candidate `info` folders of a module: `cmod` packages first, in path
/// order, then the standard layout.
fn info_dirs(module_dir: &Path) -> Vec<PathBuf> {
    let mut dirs: Vec<PathBuf> = fs::read_dir(module_dir)
        .into_iter()
        .flat_map(|entries| entries.flatten())
        .map(|entry| entry.path())
        .filter(|path| {
            path.is_dir()
                && path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.eq_ignore_ascii_case("cmod"))
        })
        .map(|pkg| pkg.join(INFO_DIR))
        .collect();
    dirs.sort();
    dirs.push(module_dir.join(INFO_DIR));
    dirs
}

fn document_in(info_dir: &Path, module_name: &str) -> Option<PathBuf> {
    let named = info_dir.join(format!("{module_name}.{DOC_EXT}"));
    if named.is_file() {
        return Some(named);
    }

    let mut candidates = fs::read_dir(info_dir)
        .ok()?
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && path.extension().is_some_and(|ext| ext == DOC_EXT));
    match (candidates.next(), candidates.next()) {
        (Some(only), None) => Some(only),
        _ => None,
    }
}

/// Read and parse one document.
pub fn extract_one(path: &Path) -> Result<ModuleDescriptor, ExtractError> {
    let source = fs::read_to_string(path).map_err(|e| ExtractError::Io(path.to_path_buf(), e))?;
    parse(&source).map_err(|source| ExtractError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Run a full extraction pass over `roots`.
pub fn extract_all(roots: &[PathBuf]) -> ExtractionReport {
    let documents = locate_documents(roots);
    debug!("module"; "found {} module documents", documents.len());

    let results: Vec<_> = documents
        .par_iter()
        .map(|path| (path, extract_one(path)))
        .collect();

    let mut report = ExtractionReport::default();
    let mut by_name: FxHashMap<String, (usize, &Path)> = FxHashMap::default();

    for (path, result) in results {
        match result {
            Ok(descriptor) => {
                if let Some((index, previous)) = by_name.get(&descriptor.name).copied() {
                    log!(
                        "warning";
                        "module `{}` declared by both {} and {}, using the latter",
                        descriptor.name,
                        previous.display(),
                        path.display()
                    );
                    by_name.insert(descriptor.name.clone(), (index, path.as_path()));
                    report.descriptors[index] = descriptor;
                } else {
                    by_name.insert(
                        descriptor.name.clone(),
                        (report.descriptors.len(), path.as_path()),
                    );
                    report.descriptors.push(descriptor);
                }
            }
            Err(e) => report.failures.push(e),
        }
    }

    report.documents = documents;
    report
}
