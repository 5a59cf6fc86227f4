//! Configuration section definitions.
//!
//! Each module corresponds to a section in `chtl.toml`:
//!
//! | Module    | TOML Section | Purpose                              |
//! |-----------|--------------|--------------------------------------|
//! | `watch`   | `[watch]`    | Watched tree, suffixes, debounce     |
//! | `build`   | `[build]`    | Compiler command, output, timeout    |
//! | `live`    | `[live]`     | Live reload WebSocket server          |
//! | `serve`   | `[serve]`    | Preview HTTP server                  |
//! | `modules` | `[modules]`  | Module roots and registry snapshot   |

mod build;
mod live;
mod modules;
mod serve;
mod watch;

pub use build::BuildConfig;
pub use live::LiveConfig;
pub use modules::ModulesConfig;
pub use serve::ServeConfig;
pub use watch::WatchConfig;
