//! Identifier rules for generated models.

use convert_case::{Case, Casing};

/// Method names every generated model defines itself.
pub const RESERVED_MEMBERS: &[&str] = &["new", "content"];

const KEYWORDS: &[&str] = &[
    "abstract", "as", "async", "await", "become", "box", "break", "const", "continue", "crate",
    "do", "dyn", "else", "enum", "extern", "false", "final", "fn", "for", "gen", "if", "impl",
    "in", "let", "loop", "macro", "match", "mod", "move", "mut", "override", "priv", "pub", "ref",
    "return", "self", "Self", "static", "struct", "super", "trait", "true", "try", "type",
    "typeof", "union", "unsafe", "unsized", "use", "virtual", "where", "while", "yield",
];

/// Model name for a content type alias (`blogPost` -> `BlogPost`).
pub fn class_name_for(alias: &str) -> String {
    let mut name = clean(alias).to_case(Case::Pascal);
    if name.is_empty() {
        return "Model".to_string();
    }
    if name.starts_with(|c: char| c.is_ascii_digit()) {
        name.insert_str(0, "Model");
    }
    if is_keyword(&name) {
        name.push('_');
    }
    name
}

/// Model name for an explicit name override.
///
/// Valid identifiers are kept as written (`HTMLPage`); anything else is
/// rebuilt like an alias (`Landing Page` -> `LandingPage`).
pub fn sanitize_class_name(name: &str) -> String {
    let name = name.trim();
    if is_valid_identifier(name) {
        name.to_string()
    } else {
        class_name_for(name)
    }
}

/// Accessor name for a property alias (`metaTitle` -> `meta_title`).
pub fn local_name_for(alias: &str) -> String {
    sanitize_identifier(&clean(alias).to_case(Case::Snake))
}

/// File stem of the generated file for a model (`BlogPost` -> `blog_post`).
pub fn module_file_stem(class_name: &str) -> String {
    class_name.to_case(Case::Snake)
}

/// Module identifier for an arbitrary file stem.
pub fn module_ident(stem: &str) -> String {
    sanitize_identifier(&clean(stem).to_lowercase())
}

/// Turn a candidate into a usable accessor identifier.
///
/// Keywords and reserved model members get a trailing underscore, leading
/// digits get a leading one.
pub fn sanitize_identifier(name: &str) -> String {
    let mut ident = clean(name);
    if ident.is_empty() {
        return "property_".to_string();
    }
    if ident.starts_with(|c: char| c.is_ascii_digit()) {
        ident.insert(0, '_');
    }
    if is_keyword(&ident) || RESERVED_MEMBERS.contains(&ident.as_str()) || ident == "_" {
        ident.push('_');
    }
    ident
}

/// Check whether a name is a Rust keyword.
pub fn is_keyword(name: &str) -> bool {
    KEYWORDS.contains(&name)
}

/// Check whether a string is a plain (non-raw) identifier that needs no fixing.
pub fn is_valid_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    let starts_ok = matches!(chars.next(), Some(c) if c == '_' || c.is_ascii_alphabetic());
    starts_ok
        && chars.all(|c| c == '_' || c.is_ascii_alphanumeric())
        && name != "_"
        && !is_keyword(name)
}

fn clean(name: &str) -> String {
    name.trim()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}
