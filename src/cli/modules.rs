//! `modules` command: index module packages and query the registry.

use std::io::{self, Write};

use anyhow::Result;
use owo_colors::OwoColorize;

use crate::cli::ModulesArgs;
use crate::cli::common::plural_count;
use crate::config::ProjectConfig;
use crate::module::{ExtractionReport, LoadOutcome, ModuleDescriptor, Registry};
use crate::{debug, log};

/// Load (or rebuild) the registry and answer the query in `args`.
///
/// Returns `false` when a `--lookup` finds nothing.
pub fn run_modules(config: &ProjectConfig, args: &ModulesArgs) -> Result<bool> {
    let registry = open_registry(config, args.rebuild)?;
    let stdout = io::stdout();
    let mut out = stdout.lock();

    if let Some(name) = &args.lookup {
        let Some(module) = registry.lookup(name) else {
            log!("error"; "no module named `{}`", name);
            return Ok(false);
        };
        if args.json {
            writeln!(out, "{}", serde_json::to_string_pretty(&*module)?)?;
        } else {
            write_module(&mut out, &module)?;
        }
        return Ok(true);
    }

    if let Some(component) = &args.find {
        let matches = registry.find_component(component);
        if args.json {
            writeln!(out, "{}", serde_json::to_string_pretty(&matches)?)?;
        } else if matches.is_empty() {
            log!("module"; "no module exports `{}`", component);
        } else {
            for found in &matches {
                writeln!(
                    out,
                    "{} [{}] @{} {}",
                    found.module.bold(),
                    found.category,
                    found.kind,
                    component
                )?;
            }
        }
        return Ok(true);
    }

    if args.json {
        writeln!(out, "{}", serde_json::to_string_pretty(&registry.snapshot())?)?;
    } else {
        let generation = registry.current();
        for module in generation.modules() {
            writeln!(
                out,
                "{} {} {}",
                module.name.bold(),
                module.version.dimmed(),
                format!("({} components)", module.component_count()).dimmed()
            )?;
        }
        log!("module"; "{} indexed", plural_count(generation.len(), "module"));
    }
    Ok(true)
}

/// Registry from the snapshot when fresh, else from a new extraction pass.
pub fn open_registry(config: &ProjectConfig, rebuild: bool) -> Result<Registry> {
    let roots = &config.modules.paths;
    let snapshot = &config.modules.snapshot;

    if rebuild {
        let registry = Registry::new();
        let report = registry.extract(roots);
        report_extraction(&report);
        registry.save(snapshot)?;
        return Ok(registry);
    }

    let (registry, outcome) = Registry::load_or_extract(roots, snapshot)?;
    match outcome {
        LoadOutcome::Restored => debug!("module"; "using snapshot {}", snapshot.display()),
        LoadOutcome::Extracted(report) => report_extraction(&report),
    }
    Ok(registry)
}

/// Log per-document failures of an extraction pass.
pub fn report_extraction(report: &ExtractionReport) {
    for failure in &report.failures {
        log!("warning"; "skipped module: {}", failure);
    }
    debug!(
        "module";
        "extracted {} of {} documents",
        report.descriptors.len(),
        report.documents.len()
    );
}

fn write_module(out: &mut impl Write, module: &ModuleDescriptor) -> io::Result<()> {
    writeln!(out, "{} {}", module.name.bold(), module.version)?;
    let meta = &module.meta;
    for (key, value) in [
        ("description", &meta.description),
        ("author", &meta.author),
        ("license", &meta.license),
        ("category", &meta.category),
    ] {
        if let Some(value) = value {
            writeln!(out, "  {}: {}", key.dimmed(), value)?;
        }
    }
    if !meta.dependencies.is_empty() {
        writeln!(out, "  {}: {}", "dependencies".dimmed(), meta.dependencies.join(", "))?;
    }
    for (category, kinds) in &module.exports {
        for (kind, names) in kinds {
            writeln!(out, "  [{}] @{} {}", category, kind, names.join(", "))?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn project() -> (TempDir, ProjectConfig) {
        let dir = TempDir::new().unwrap();
        let doc = dir.path().join("modules/Chtholly/CMOD/info/Chtholly.chtl");
        fs::create_dir_all(doc.parent().unwrap()).unwrap();
        fs::write(
            &doc,
            r#"[Info]{name="Chtholly"; version="1.0"; author="CHTL Team";}
               [Export]{[Custom] @Style Card, Banner;}"#,
        )
        .unwrap();

        let mut config = ProjectConfig::default();
        config.finalize(dir.path());
        (dir, config)
    }

    fn args() -> ModulesArgs {
        ModulesArgs {
            rebuild: false,
            lookup: None,
            find: None,
            json: false,
        }
    }

    #[test]
    fn test_open_registry_writes_snapshot() {
        let (_dir, config) = project();
        let registry = open_registry(&config, false).unwrap();

        assert!(registry.lookup("Chtholly").is_some());
        assert!(config.modules.snapshot.is_file());
    }

    #[test]
    fn test_lookup_missing_module_fails() {
        let (_dir, config) = project();
        let args = ModulesArgs {
            lookup: Some("Nobody".into()),
            ..args()
        };
        assert!(!run_modules(&config, &args).unwrap());
    }

    #[test]
    fn test_find_and_list() {
        let (_dir, config) = project();
        let find = ModulesArgs {
            find: Some("Card".into()),
            json: true,
            ..args()
        };
        assert!(run_modules(&config, &find).unwrap());
        assert!(run_modules(&config, &args()).unwrap());
    }

    #[test]
    fn test_write_module() {
        let (_dir, config) = project();
        let registry = open_registry(&config, true).unwrap();
        let module = registry.lookup("Chtholly").unwrap();

        let mut buf = Vec::new();
        write_module(&mut buf, &module).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.contains("Chtholly"));
        assert!(text.contains("CHTL Team"));
        assert!(text.contains("[Custom] @Style Card, Banner"));
    }
}
