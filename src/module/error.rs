//! Module description errors.

use std::path::PathBuf;

use thiserror::Error;

/// A malformed module description document.
///
/// Every variant carries the line (and section where one is known) so the
/// message points at the offending spot.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("line {line}: unterminated string")]
    UnterminatedString { line: usize },

    #[error("line {line}: unterminated block comment")]
    UnterminatedComment { line: usize },

    #[error("[{section}] line {line}: unbalanced braces, section body never closed")]
    UnclosedSection { section: String, line: usize },

    #[error("line {line}: unmatched `}}`")]
    UnmatchedBrace { line: usize },

    #[error("[{section}] line {line}: expected {expected}, found {found}")]
    Unexpected {
        section: String,
        line: usize,
        expected: &'static str,
        found: String,
    },

    #[error("[{section}] line {line}: unexpected end of section, expected {expected}")]
    UnexpectedEnd {
        section: String,
        line: usize,
        expected: &'static str,
    },

    #[error("[{section}] line {line}: section appears more than once (first at line {first})")]
    DuplicateSection {
        section: String,
        line: usize,
        first: usize,
    },

    #[error("[Info] line {line}: key `{key}` set more than once")]
    DuplicateKey { key: String, line: usize },

    #[error("[Info]: missing required key `{key}`")]
    MissingKey { key: &'static str },

    #[error("[Export] line {line}: `{name}` exported twice under [{category}] @{kind}")]
    AmbiguousExport {
        category: String,
        kind: String,
        name: String,
        line: usize,
    },

    #[error("[Export] line {line}: [{category}] @{kind} lists no components")]
    EmptyExport {
        category: String,
        kind: String,
        line: usize,
    },
}

/// A module that could not be extracted during a pass.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("failed to read `{0}`")]
    Io(PathBuf, #[source] std::io::Error),

    #[error("`{path}`: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: ParseError,
    },
}

impl ExtractError {
    pub fn path(&self) -> &std::path::Path {
        match self {
            Self::Io(path, _) => path,
            Self::Parse { path, .. } => path,
        }
    }
}
