//! URL to filesystem path resolution.

use std::path::{Component, Path, PathBuf};

use percent_encoding::percent_decode_str;

#[derive(Debug, PartialEq, Eq)]
pub enum Resolved {
    File(PathBuf),
    NotFound,
    /// The URL points outside the serve root
    Forbidden,
}

/// Resolve a request URL under `root`, handling `index.html` for directories.
pub fn resolve(url: &str, root: &Path) -> Resolved {
    let clean = normalize_url(url);
    let relative = Path::new(&clean);

    if relative
        .components()
        .any(|c| !matches!(c, Component::Normal(_)))
    {
        return Resolved::Forbidden;
    }

    let Ok(root) = root.canonicalize() else {
        return Resolved::NotFound;
    };
    let Ok(canonical) = root.join(relative).canonicalize() else {
        return Resolved::NotFound;
    };

    // symlinks may still lead out of the root
    if !canonical.starts_with(&root) {
        return Resolved::Forbidden;
    }

    if canonical.is_file() {
        return Resolved::File(canonical);
    }
    let index = canonical.join("index.html");
    if canonical.is_dir() && index.is_file() {
        return Resolved::File(index);
    }
    Resolved::NotFound
}

/// Normalize URL: strip query and fragment, decode, trim slashes
fn normalize_url(url: &str) -> String {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let decoded = percent_decode_str(path)
        .decode_utf8()
        .map(std::borrow::Cow::into_owned)
        .unwrap_or_default();
    decoded.trim_matches('/').to_string()
}
