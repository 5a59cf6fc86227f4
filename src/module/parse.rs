//! Module description parser.
//!
//! Two stages:
//!
//! ```text
//! source ──tokenize──> tokens ──split_sections──> Document ──> ModuleDescriptor
//! ```
//!
//! `split_sections` is the only place that tracks brace depth. It hands each
//! section its balanced body, so the `[Info]` and `[Export]` readers can never
//! run past the end of their own section.

use std::collections::BTreeMap;

use rustc_hash::FxHashSet;

use super::descriptor::{ExportCatalog, ModuleDescriptor, ModuleMeta};
use super::error::ParseError;
use super::lexer::{Token, TokenKind, tokenize};

const INFO: &str = "Info";
const EXPORT: &str = "Export";

/// A tokenized document split into its top-level sections.
#[derive(Debug)]
pub struct Document {
    pub sections: Vec<Section>,
}

/// `[Name] args... { body }`
#[derive(Debug)]
pub struct Section {
    pub name: String,
    /// Line of the `[Name]` header
    pub line: usize,
    /// Tokens between the header and `{` (e.g. `@Style Card` in template blocks)
    pub args: Vec<Token>,
    /// Tokens between the outer braces, nested blocks included
    pub body: Vec<Token>,
    /// Line of the closing `}`
    pub end_line: usize,
}

impl Document {
    pub fn section(&self, name: &str) -> Option<&Section> {
        self.sections.iter().find(|s| s.name == name)
    }
}

/// Parse a module description document.
pub fn parse(source: &str) -> Result<ModuleDescriptor, ParseError> {
    let document = split_sections(tokenize(source)?)?;
    check_unique_sections(&document)?;

    let Some(info) = document.section(INFO) else {
        return Err(ParseError::MissingKey { key: "name" });
    };
    let (name, version, meta) = read_info(info)?;

    let exports = match document.section(EXPORT) {
        Some(section) => read_export(section)?,
        None => ExportCatalog::new(),
    };

    Ok(ModuleDescriptor {
        name,
        version,
        meta,
        exports,
    })
}

// ============================================================================
// Stage 1: sections
// ============================================================================

pub fn split_sections(tokens: Vec<Token>) -> Result<Document, ParseError> {
    let mut sections = Vec::new();
    let mut iter = tokens.into_iter().peekable();

    while let Some(token) = iter.next() {
        let name = match token.kind {
            TokenKind::Bracketed(name) => name,
            TokenKind::RBrace => return Err(ParseError::UnmatchedBrace { line: token.line }),
            other => {
                return Err(ParseError::Unexpected {
                    section: "document".into(),
                    line: token.line,
                    expected: "a `[Section]` header",
                    found: other.describe(),
                });
            }
        };

        let mut args = Vec::new();
        loop {
            match iter.next() {
                Some(Token {
                    kind: TokenKind::LBrace,
                    ..
                }) => break,
                Some(Token {
                    kind: found @ (TokenKind::Bracketed(_) | TokenKind::RBrace | TokenKind::Semi),
                    line,
                }) => {
                    return Err(ParseError::Unexpected {
                        section: name,
                        line,
                        expected: "`{`",
                        found: found.describe(),
                    });
                }
                Some(arg) => args.push(arg),
                None => {
                    return Err(ParseError::UnexpectedEnd {
                        section: name,
                        line: args.last().map_or(token.line, |t: &Token| t.line),
                        expected: "`{`",
                    });
                }
            }
        }

        let mut body = Vec::new();
        let mut depth = 1usize;
        let end_line = loop {
            let Some(inner) = iter.next() else {
                return Err(ParseError::UnclosedSection {
                    section: name,
                    line: token.line,
                });
            };
            match inner.kind {
                TokenKind::LBrace => depth += 1,
                TokenKind::RBrace => {
                    depth -= 1;
                    if depth == 0 {
                        break inner.line;
                    }
                }
                _ => {}
            }
            body.push(inner);
        };

        sections.push(Section {
            name,
            line: token.line,
            args,
            body,
            end_line,
        });
    }

    Ok(Document { sections })
}

fn check_unique_sections(document: &Document) -> Result<(), ParseError> {
    for name in [INFO, EXPORT] {
        let mut found = document.sections.iter().filter(|s| s.name == name);
        if let (Some(first), Some(second)) = (found.next(), found.next()) {
            return Err(ParseError::DuplicateSection {
                section: name.into(),
                line: second.line,
                first: first.line,
            });
        }
    }
    Ok(())
}

// ============================================================================
// Stage 2: section readers
// ============================================================================

/// Cursor over one section body.
struct Cursor<'a> {
    section: &'a Section,
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(section: &'a Section) -> Self {
        Self { section, pos: 0 }
    }

    fn peek(&self) -> Option<&'a Token> {
        self.section.body.get(self.pos)
    }

    fn next(&mut self) -> Option<&'a Token> {
        let token = self.section.body.get(self.pos)?;
        self.pos += 1;
        Some(token)
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.peek().is_some_and(|t| &t.kind == kind) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    /// Skip a balanced `{ ... }` block starting at the current `{`.
    fn skip_block(&mut self) {
        let mut depth = 0usize;
        while let Some(token) = self.next() {
            match token.kind {
                TokenKind::LBrace => depth += 1,
                TokenKind::RBrace => {
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        return;
                    }
                }
                _ => {}
            }
        }
    }

    fn unexpected(&self, token: &Token, expected: &'static str) -> ParseError {
        ParseError::Unexpected {
            section: self.section.name.clone(),
            line: token.line,
            expected,
            found: token.kind.describe(),
        }
    }

    fn end(&self, expected: &'static str) -> ParseError {
        ParseError::UnexpectedEnd {
            section: self.section.name.clone(),
            line: self.section.end_line,
            expected,
        }
    }

    /// `;` or the end of the section.
    fn expect_terminator(&mut self) -> Result<(), ParseError> {
        match self.next() {
            Some(Token {
                kind: TokenKind::Semi,
                ..
            })
            | None => Ok(()),
            Some(token) => Err(self.unexpected(token, "`;`")),
        }
    }
}

/// Read `key = "value";` pairs. Nested sub-blocks (`key { ... }`) are skipped.
fn read_info(section: &Section) -> Result<(String, String, ModuleMeta), ParseError> {
    let mut cursor = Cursor::new(section);
    let mut fields: BTreeMap<String, (String, usize)> = BTreeMap::new();

    while let Some(token) = cursor.next() {
        let key = match &token.kind {
            TokenKind::Semi => continue,
            TokenKind::Word(key) | TokenKind::Str(key) => key.to_ascii_lowercase(),
            TokenKind::Bracketed(_) if cursor.peek().is_some_and(|t| t.kind == TokenKind::LBrace) => {
                cursor.skip_block();
                continue;
            }
            _ => return Err(cursor.unexpected(token, "a key")),
        };

        if cursor.peek().is_some_and(|t| t.kind == TokenKind::LBrace) {
            cursor.skip_block();
            continue;
        }

        if !(cursor.eat(&TokenKind::Eq) || cursor.eat(&TokenKind::Colon)) {
            return Err(match cursor.peek() {
                Some(found) => cursor.unexpected(found, "`=` or `:`"),
                None => cursor.end("`=`"),
            });
        }

        let value = match cursor.next() {
            Some(Token {
                kind: TokenKind::Str(value) | TokenKind::Word(value),
                ..
            }) => value.clone(),
            Some(found) => return Err(cursor.unexpected(found, "a value")),
            None => return Err(cursor.end("a value")),
        };
        cursor.expect_terminator()?;

        if fields.insert(key.clone(), (value, token.line)).is_some() {
            return Err(ParseError::DuplicateKey {
                key,
                line: token.line,
            });
        }
    }

    let mut take = |key: &str| fields.remove(key).map(|(value, _)| value);
    let name = take("name")
        .filter(|n| !n.trim().is_empty())
        .ok_or(ParseError::MissingKey { key: "name" })?;
    let version = take("version")
        .filter(|v| !v.trim().is_empty())
        .ok_or(ParseError::MissingKey { key: "version" })?;

    let meta = ModuleMeta {
        description: take("description"),
        author: take("author"),
        license: take("license"),
        category: take("category"),
        dependencies: take("dependencies")
            .map(|deps| {
                deps.split(',')
                    .map(str::trim)
                    .filter(|d| !d.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default(),
        min_chtl_version: take("minchtlversion"),
        max_chtl_version: take("maxchtlversion"),
        extra: fields
            .into_iter()
            .map(|(key, (value, _))| (key, value))
            .collect(),
    };

    Ok((name, version, meta))
}

/// Read `[Category] @Type a, b, c;` lines. Nested sub-blocks (`key { ... }`)
/// are skipped as in `[Info]`.
fn read_export(section: &Section) -> Result<ExportCatalog, ParseError> {
    let mut cursor = Cursor::new(section);
    let mut catalog = ExportCatalog::new();
    let mut seen: FxHashSet<(String, String, String)> = FxHashSet::default();

    while let Some(token) = cursor.next() {
        let category = match &token.kind {
            TokenKind::Semi => continue,
            TokenKind::Word(_) | TokenKind::Str(_) | TokenKind::Bracketed(_)
                if cursor.peek().is_some_and(|t| t.kind == TokenKind::LBrace) =>
            {
                cursor.skip_block();
                continue;
            }
            TokenKind::Bracketed(category) => category.clone(),
            _ => return Err(cursor.unexpected(token, "`[Category]`")),
        };

        let kind = match cursor.next() {
            Some(Token {
                kind: TokenKind::Tag(kind),
                ..
            }) if !kind.is_empty() => kind.clone(),
            Some(found) => return Err(cursor.unexpected(found, "`@Type`")),
            None => return Err(cursor.end("`@Type`")),
        };

        let mut names = Vec::new();
        loop {
            match cursor.peek() {
                Some(Token {
                    kind: TokenKind::Word(name) | TokenKind::Str(name),
                    line,
                }) => {
                    cursor.next();
                    if !seen.insert((category.clone(), kind.clone(), name.clone())) {
                        return Err(ParseError::AmbiguousExport {
                            category,
                            kind,
                            name: name.clone(),
                            line: *line,
                        });
                    }
                    names.push(name.clone());
                }
                Some(found) => return Err(cursor.unexpected(found, "a component name")),
                None => return Err(cursor.end("a component name")),
            }
            if !cursor.eat(&TokenKind::Comma) {
                break;
            }
        }
        cursor.expect_terminator()?;

        if names.is_empty() {
            return Err(ParseError::EmptyExport {
                category,
                kind,
                line: token.line,
            });
        }

        catalog
            .entry(category)
            .or_default()
            .entry(kind)
            .or_default()
            .extend(names);
    }

    Ok(catalog)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog(entries: &[(&str, &str, &[&str])]) -> ExportCatalog {
        let mut catalog = ExportCatalog::new();
        for (category, kind, names) in entries {
            catalog
                .entry(category.to_string())
                .or_default()
                .insert(kind.to_string(), names.iter().map(|n| n.to_string()).collect());
        }
        catalog
    }

    #[test]
    fn test_minimal_document() {
        let module = parse(
            r#"[Info]{name="Chtholly"; version="1.0";}[Export]{[Custom] @Style Card, Banner;}"#,
        )
        .unwrap();

        assert_eq!(module.name, "Chtholly");
        assert_eq!(module.version, "1.0");
        assert_eq!(
            module.exports,
            catalog(&[("Custom", "Style", &["Card", "Banner"])])
        );
        assert!(module.meta.is_empty());
    }

    #[test]
    fn test_section_order_is_irrelevant() {
        let module = parse(
            r#"
            [Export] {
                [Custom] @Element Header;
            }
            [Info] {
                name = "Yuigahama";
                version = "0.2.0";
            }
            "#,
        )
        .unwrap();
        assert_eq!(module.name, "Yuigahama");
        assert_eq!(module.exports, catalog(&[("Custom", "Element", &["Header"])]));
    }

    #[test]
    fn test_missing_export_gives_empty_catalog() {
        let module = parse(r#"[Info] { name = "Bare"; version = "1.0.0"; }"#).unwrap();
        assert!(module.exports.is_empty());
    }

    #[test]
    fn test_braces_inside_values_do_not_end_section() {
        let module = parse(
            r#"
            [Info] {
                name = "Braces";
                description = "renders {{ slots }} and } stray braces";
                version = "2.0";
            }
            [Export] { [Custom] @Style Box; }
            "#,
        )
        .unwrap();
        assert_eq!(module.version, "2.0");
        assert_eq!(
            module.meta.description.as_deref(),
            Some("renders {{ slots }} and } stray braces")
        );
        assert_eq!(module.exports, catalog(&[("Custom", "Style", &["Box"])]));
    }

    #[test]
    fn test_nested_sub_blocks_are_skipped() {
        let module = parse(
            r#"
            [Info] {
                name = "Nested";
                style {
                    .card { color: red; }
                }
                version = "1.1";
            }
            "#,
        )
        .unwrap();
        assert_eq!(module.name, "Nested");
        assert_eq!(module.version, "1.1");
    }

    #[test]
    fn test_export_sub_blocks_are_skipped() {
        let module = parse(
            r#"
            [Info] { name = "Nested"; version = "1"; }
            [Export] {
                [Custom] @Style Card;
                notes { [Custom] @Style Hidden; }
                [Meta] { kept = "out"; }
                [Template] @Element Box;
            }
            "#,
        )
        .unwrap();
        assert_eq!(
            module.exports,
            catalog(&[("Custom", "Style", &["Card"]), ("Template", "Element", &["Box"])])
        );
    }

    #[test]
    fn test_unknown_sections_are_skipped() {
        let module = parse(
            r#"
            [Template] @Style Theme { color: "}"; nested { a: b; } }
            [Info] { name = "T"; version = "1"; }
            "#,
        )
        .unwrap();
        assert_eq!(module.name, "T");
    }

    #[test]
    fn test_full_info_block() {
        let module = parse(
            r#"
            [Info]
            {
                NAME = "Chtholly";
                version = "1.0.0";
                description = "theme module";
                author = "CHTL Team";
                license = "MIT";
                dependencies = "Base, Icons";
                category = "theme";
                minCHTLVersion = "1.0.0";
                maxCHTLVersion = "2.0.0";
                homepage = "https://example.org";
            }
            "#,
        )
        .unwrap();

        assert_eq!(module.name, "Chtholly");
        assert_eq!(module.meta.author.as_deref(), Some("CHTL Team"));
        assert_eq!(module.meta.dependencies, vec!["Base", "Icons"]);
        assert_eq!(module.meta.min_chtl_version.as_deref(), Some("1.0.0"));
        assert_eq!(module.meta.max_chtl_version.as_deref(), Some("2.0.0"));
        assert_eq!(
            module.meta.extra.get("homepage").map(String::as_str),
            Some("https://example.org")
        );
    }

    #[test]
    fn test_unquoted_values_and_colon() {
        let module = parse("[Info] { name: Plain; version = 1.2.3 }").unwrap();
        assert_eq!(module.name, "Plain");
        assert_eq!(module.version, "1.2.3");
    }

    #[test]
    fn test_export_lines_merge_per_category_and_type() {
        let module = parse(
            r#"
            [Info] { name = "M"; version = "1"; }
            [Export] {
                [Custom] @Style Card;
                [Custom] @Style Banner;
                [Template] @Var Palette;
                [Custom] @Element "Nav Bar";
            }
            "#,
        )
        .unwrap();
        assert_eq!(
            module.exports,
            catalog(&[
                ("Custom", "Element", &["Nav Bar"]),
                ("Custom", "Style", &["Card", "Banner"]),
                ("Template", "Var", &["Palette"]),
            ])
        );
    }

    #[test]
    fn test_duplicate_in_one_line_is_ambiguous() {
        let err = parse(
            r#"[Info]{name="Chtholly"; version="1.0";}[Export]{[Custom] @Style Card, Card;}"#,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            ParseError::AmbiguousExport { ref name, ref category, ref kind, .. }
                if name == "Card" && category == "Custom" && kind == "Style"
        ));
    }

    #[test]
    fn test_duplicate_across_lines_is_ambiguous() {
        let err = parse(
            "[Info]{name=\"A\"; version=\"1\";}\n[Export]{\n[Custom] @Style Card;\n[Custom] @Style Card;\n}",
        )
        .unwrap_err();
        assert!(matches!(err, ParseError::AmbiguousExport { line: 4, .. }));
    }

    #[test]
    fn test_same_name_under_other_type_is_fine() {
        let module = parse(
            r#"[Info]{name="A"; version="1";}[Export]{[Custom] @Style Card; [Custom] @Element Card;}"#,
        )
        .unwrap();
        assert_eq!(module.component_count(), 2);
    }

    #[test]
    fn test_unbalanced_braces() {
        let err = parse("[Info] {\n name = \"A\";\n version = \"1\";\n[Export] { [Custom] @Style X; }")
            .unwrap_err();
        assert_eq!(
            err,
            ParseError::UnclosedSection {
                section: "Info".into(),
                line: 1
            }
        );
    }

    #[test]
    fn test_stray_closing_brace() {
        let err = parse("[Info] { name = \"A\"; version = \"1\"; } }").unwrap_err();
        assert_eq!(err, ParseError::UnmatchedBrace { line: 1 });
    }

    #[test]
    fn test_unterminated_string_is_reported() {
        let err = parse("[Info] {\n name = \"A;\n version = \"1\";\n}").unwrap_err();
        assert_eq!(err, ParseError::UnterminatedString { line: 2 });
    }

    #[test]
    fn test_missing_required_keys() {
        assert_eq!(
            parse(r#"[Info] { version = "1"; }"#).unwrap_err(),
            ParseError::MissingKey { key: "name" }
        );
        assert_eq!(
            parse(r#"[Info] { name = "A"; }"#).unwrap_err(),
            ParseError::MissingKey { key: "version" }
        );
        assert_eq!(
            parse(r#"[Export] { [Custom] @Style A; }"#).unwrap_err(),
            ParseError::MissingKey { key: "name" }
        );
    }

    #[test]
    fn test_repeated_section_is_rejected() {
        let err = parse("[Info]{name=\"A\"; version=\"1\";}\n[Info]{name=\"B\"; version=\"2\";}")
            .unwrap_err();
        assert_eq!(
            err,
            ParseError::DuplicateSection {
                section: "Info".into(),
                line: 2,
                first: 1
            }
        );
    }

    #[test]
    fn test_repeated_key_is_rejected() {
        let err = parse("[Info]{\nname=\"A\";\nversion=\"1\";\nName=\"B\";\n}").unwrap_err();
        assert_eq!(
            err,
            ParseError::DuplicateKey {
                key: "name".into(),
                line: 4
            }
        );
    }

    #[test]
    fn test_export_without_type_tag() {
        let err = parse("[Info]{name=\"A\"; version=\"1\";}\n[Export]{\n[Custom] Card;\n}").unwrap_err();
        assert!(matches!(
            err,
            ParseError::Unexpected { ref section, line: 3, expected: "`@Type`", .. } if section == "Export"
        ));
    }

    #[test]
    fn test_export_without_names() {
        let err = parse("[Info]{name=\"A\"; version=\"1\";}[Export]{[Custom] @Style;}").unwrap_err();
        assert!(matches!(
            err,
            ParseError::Unexpected { expected: "a component name", .. }
        ));
    }

    #[test]
    fn test_missing_semicolon_between_pairs() {
        let err = parse("[Info]{\nname=\"A\"\nversion=\"1\";\n}").unwrap_err();
        assert!(matches!(
            err,
            ParseError::Unexpected { line: 3, expected: "`;`", .. }
        ));
    }

    #[test]
    fn test_text_outside_sections() {
        let err = parse("hello [Info]{name=\"A\"; version=\"1\";}").unwrap_err();
        assert!(matches!(err, ParseError::Unexpected { ref section, .. } if section == "document"));
    }

    #[test]
    fn test_section_tree_keeps_args_and_lines() {
        let document =
            split_sections(tokenize("[Template] @Style Theme\n{\n a { b; }\n}").unwrap()).unwrap();
        let section = &document.sections[0];
        assert_eq!(section.name, "Template");
        assert_eq!(section.args.len(), 2);
        assert_eq!(section.body.len(), 5);
        assert_eq!(section.line, 1);
        assert_eq!(section.end_line, 4);
    }
}
