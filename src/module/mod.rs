//! Module packages: description documents, discovery and the registry.
//!
//! - [`lexer`] / [`parse`]: `[Info]` / `[Export]` document → [`ModuleDescriptor`]
//! - [`discover`]: find documents under module roots, parse them in parallel
//! - [`registry`]: atomically swapped, queryable set of descriptors

pub mod descriptor;
pub mod discover;
pub mod error;
pub mod lexer;
pub mod parse;
pub mod registry;

pub use descriptor::{ComponentRef, ModuleDescriptor};
pub use discover::ExtractionReport;
pub use error::{ExtractError, ParseError};
pub use parse::parse;
pub use registry::{LoadOutcome, Registry};
