//! Parser for hand-authored model code.
//!
//! Hand-authored files live next to the generated ones and extend models with
//! inherent `impl` blocks. This module parses them with `syn` and records, per
//! model, which members already exist and which properties the author asked
//! the generator to leave alone:
//!
//! ```rust,ignore
//! use super::*;
//!
//! ignore_property!(Article, "legacyBody");
//! rename_property!(Article, "metaTitle", seo_title);
//! ignore_content_type!("obsolete*");
//!
//! impl Article {
//!     pub fn title(&self) -> Option<String> { /* ... */ }
//! }
//! ```
//!
//! A member that is absent is generated; only explicit markers suppress a
//! property.

use crate::error::ParseError;
use crate::scanner::SourceFile;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use syn::parse::{Parse, ParseStream};
use syn::punctuated::Punctuated;
use syn::spanned::Spanned;
use syn::{ImplItem, Item, LitStr, Token, UseTree};

/// Marker macro suppressing properties of a model.
pub const IGNORE_PROPERTY_MARKER: &str = "ignore_property";

/// Marker macro choosing the accessor name of a property.
pub const RENAME_PROPERTY_MARKER: &str = "rename_property";

/// Marker macro suppressing whole content types.
pub const IGNORE_CONTENT_TYPE_MARKER: &str = "ignore_content_type";

/// A `use` item found in hand-authored code.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct UseImport {
    /// Canonical rendering without the `use` keyword, e.g. `chrono::{DateTime, Utc}`.
    pub path: String,
    /// Names the import brings into scope.
    pub names: Vec<String>,
}

/// Customisations hand-authored code applies to one model.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModelCustomization {
    /// Members declared in inherent `impl` blocks.
    pub declared_members: BTreeSet<String>,
    /// Aliases of properties explicitly marked as ignored.
    pub ignored_properties: BTreeSet<String>,
    /// Accessor names chosen for property aliases.
    pub renamed_properties: BTreeMap<String, String>,
    /// Whether the model type itself is declared by hand.
    pub declares_type: bool,
    /// Imports to carry into the generated file.
    pub uses: BTreeSet<String>,
}

/// Everything one hand-authored file contributes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExistingFileInfo {
    /// Path of the file.
    pub path: PathBuf,
    /// Customisations keyed by model name.
    pub models: BTreeMap<String, ModelCustomization>,
    /// Content type alias patterns marked as ignored.
    pub ignored_content_types: BTreeSet<String>,
    /// Imports declared at file level.
    pub uses: Vec<UseImport>,
}

/// Merged view over every hand-authored file of a run.
#[derive(Debug, Clone, Default)]
pub struct ExistingCode {
    files: Vec<PathBuf>,
    models: BTreeMap<String, ModelCustomization>,
    ignored_content_types: BTreeSet<String>,
}

/// Result of parsing a set of files.
#[derive(Debug, Default)]
pub struct ParseOutcome {
    /// Merged customisations of every file that parsed.
    pub existing: ExistingCode,
    /// Per-file problems; a file with a syntax error contributed nothing.
    pub errors: Vec<ParseError>,
}

/// Parser for hand-authored Rust files.
#[derive(Debug, Default)]
pub struct CodeParser;

impl CodeParser {
    /// Create a new parser.
    pub fn new() -> Self {
        Self
    }

    /// Parse one source file.
    pub fn parse_file(
        &self,
        source: &SourceFile,
    ) -> Result<(ExistingFileInfo, Vec<ParseError>), ParseError> {
        self.parse_source(&source.content, &source.path)
    }

    /// Parse source code.
    ///
    /// Returns the file's contribution together with marker problems; a syntax
    /// error fails the whole file.
    pub fn parse_source(
        &self,
        content: &str,
        file_path: &Path,
    ) -> Result<(ExistingFileInfo, Vec<ParseError>), ParseError> {
        let syntax = syn::parse_file(content).map_err(|e| {
            let start = e.span().start();
            ParseError::syntax(file_path.to_path_buf(), start.line, start.column + 1, e.to_string())
        })?;

        let mut info = ExistingFileInfo {
            path: file_path.to_path_buf(),
            ..Default::default()
        };
        let mut errors = Vec::new();

        for item in &syntax.items {
            match item {
                Item::Impl(item_impl) if item_impl.trait_.is_none() => {
                    let Some(model) = self_type_name(&item_impl.self_ty) else {
                        continue;
                    };
                    let members = &mut info.models.entry(model).or_default().declared_members;
                    for impl_item in &item_impl.items {
                        match impl_item {
                            ImplItem::Fn(f) => {
                                members.insert(f.sig.ident.to_string());
                            }
                            ImplItem::Const(c) => {
                                members.insert(c.ident.to_string());
                            }
                            _ => {}
                        }
                    }
                }
                Item::Struct(s) => self.declare_type(&mut info, s.ident.to_string()),
                Item::Enum(e) => self.declare_type(&mut info, e.ident.to_string()),
                Item::Union(u) => self.declare_type(&mut info, u.ident.to_string()),
                Item::Type(t) => self.declare_type(&mut info, t.ident.to_string()),
                Item::Macro(m) if m.ident.is_none() => {
                    if let Err(message) = self.apply_marker(&mut info, &m.mac) {
                        let line = m.mac.path.span().start().line;
                        errors.push(ParseError::marker(file_path.to_path_buf(), line, message));
                    }
                }
                Item::Use(u) => {
                    let path = render_use_tree(&u.tree);
                    if path == "self" || path.starts_with("self::") {
                        continue;
                    }
                    let path = if u.leading_colon.is_some() {
                        format!("::{}", path)
                    } else {
                        path
                    };
                    let mut names = Vec::new();
                    use_names(&u.tree, &mut names);
                    info.uses.push(UseImport { path, names });
                }
                _ => {}
            }
        }

        tracing::debug!(
            file = %file_path.display(),
            models = info.models.len(),
            "parsed hand-authored file"
        );

        Ok((info, errors))
    }

    /// Parse multiple source files, collecting errors instead of stopping.
    pub fn parse_files(&self, sources: &[SourceFile]) -> ParseOutcome {
        let mut infos = Vec::new();
        let mut errors = Vec::new();

        for source in sources {
            match self.parse_file(source) {
                Ok((info, marker_errors)) => {
                    infos.push(info);
                    errors.extend(marker_errors);
                }
                Err(e) => {
                    tracing::warn!(error = %e, "ignoring hand-authored file that failed to parse");
                    errors.push(e);
                }
            }
        }

        ParseOutcome {
            existing: ExistingCode::from_files(infos),
            errors,
        }
    }

    fn declare_type(&self, info: &mut ExistingFileInfo, name: String) {
        info.models.entry(name).or_default().declares_type = true;
    }

    fn apply_marker(&self, info: &mut ExistingFileInfo, mac: &syn::Macro) -> Result<(), String> {
        if mac.path.is_ident(IGNORE_PROPERTY_MARKER) {
            let args: IgnorePropertyArgs = mac.parse_body().map_err(|e| e.to_string())?;
            info.models
                .entry(args.model)
                .or_default()
                .ignored_properties
                .extend(args.aliases);
        } else if mac.path.is_ident(RENAME_PROPERTY_MARKER) {
            let args: RenamePropertyArgs = mac.parse_body().map_err(|e| e.to_string())?;
            info.models
                .entry(args.model)
                .or_default()
                .renamed_properties
                .insert(args.alias, args.local_name);
        } else if mac.path.is_ident(IGNORE_CONTENT_TYPE_MARKER) {
            let aliases =
                mac.parse_body_with(Punctuated::<LitStr, Token![,]>::parse_terminated)
                    .map_err(|e| e.to_string())?;
            if aliases.is_empty() {
                return Err("expected at least one content type alias".to_string());
            }
            info.ignored_content_types
                .extend(aliases.iter().map(LitStr::value));
        }
        Ok(())
    }
}

impl ExistingCode {
    /// Merge the contributions of several files.
    ///
    /// Partial declarations of one model across files merge their member sets.
    /// File-level imports are attached to every model the file extends, except
    /// imports that would shadow the model's own name.
    pub fn from_files(files: Vec<ExistingFileInfo>) -> Self {
        let mut existing = Self::default();

        for file in files {
            existing.files.push(file.path.clone());
            existing
                .ignored_content_types
                .extend(file.ignored_content_types);

            for (name, custom) in file.models {
                let merged = existing.models.entry(name.clone()).or_default();
                merged.declared_members.extend(custom.declared_members);
                merged.ignored_properties.extend(custom.ignored_properties);
                for (alias, local) in custom.renamed_properties {
                    merged.renamed_properties.entry(alias).or_insert(local);
                }
                merged.declares_type |= custom.declares_type;
                merged.uses.extend(custom.uses);
                merged.uses.extend(
                    file.uses
                        .iter()
                        .filter(|u| !u.names.iter().any(|n| *n == name))
                        .map(|u| u.path.clone()),
                );
            }
        }

        existing
    }

    /// Paths of the files that parsed, in scan order.
    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    /// Customisations of a model, if any file extends it.
    pub fn model(&self, name: &str) -> Option<&ModelCustomization> {
        self.models.get(name)
    }

    /// Whether a member with exactly this name is declared by hand.
    pub fn is_declared(&self, model: &str, member: &str) -> bool {
        self.model(model)
            .is_some_and(|m| m.declared_members.contains(member))
    }

    /// Whether a property alias is explicitly marked as ignored.
    pub fn is_property_ignored(&self, model: &str, alias: &str) -> bool {
        self.model(model)
            .is_some_and(|m| m.ignored_properties.contains(alias))
    }

    /// Accessor name chosen by hand for a property alias.
    pub fn renamed(&self, model: &str, alias: &str) -> Option<&str> {
        self.model(model)
            .and_then(|m| m.renamed_properties.get(alias))
            .map(String::as_str)
    }

    /// Whether the model type is declared by hand.
    pub fn implements_type(&self, model: &str) -> bool {
        self.model(model).is_some_and(|m| m.declares_type)
    }

    /// Whether a content type alias matches an ignore marker.
    ///
    /// A pattern ending in `*` matches every alias with that prefix.
    pub fn is_content_type_ignored(&self, alias: &str) -> bool {
        self.ignored_content_types.iter().any(|pattern| {
            match pattern.strip_suffix('*') {
                Some(prefix) => alias.starts_with(prefix),
                None => pattern == alias,
            }
        })
    }

    /// Imports to carry into the generated file of a model.
    pub fn uses_for(&self, model: &str) -> BTreeSet<String> {
        self.model(model)
            .map(|m| m.uses.clone())
            .unwrap_or_default()
    }
}

/// Name of the type an inherent impl targets, by its last path segment.
fn self_type_name(ty: &syn::Type) -> Option<String> {
    match ty {
        syn::Type::Path(type_path) if type_path.qself.is_none() => type_path
            .path
            .segments
            .last()
            .map(|segment| segment.ident.to_string()),
        _ => None,
    }
}

/// Render a use tree canonically, e.g. `chrono::{DateTime, Utc}`.
pub fn render_use_tree(tree: &UseTree) -> String {
    match tree {
        UseTree::Path(p) => format!("{}::{}", p.ident, render_use_tree(&p.tree)),
        UseTree::Name(n) => n.ident.to_string(),
        UseTree::Rename(r) => format!("{} as {}", r.ident, r.rename),
        UseTree::Glob(_) => "*".to_string(),
        UseTree::Group(g) => format!(
            "{{{}}}",
            g.items
                .iter()
                .map(render_use_tree)
                .collect::<Vec<_>>()
                .join(", ")
        ),
    }
}

fn use_names(tree: &UseTree, names: &mut Vec<String>) {
    match tree {
        UseTree::Path(p) => use_names(&p.tree, names),
        UseTree::Name(n) => names.push(n.ident.to_string()),
        UseTree::Rename(r) => names.push(r.rename.to_string()),
        UseTree::Glob(_) => {}
        UseTree::Group(g) => g.items.iter().for_each(|item| use_names(item, names)),
    }
}

/// `ignore_property!(Model, "alias", ...)`
struct IgnorePropertyArgs {
    model: String,
    aliases: Vec<String>,
}

impl Parse for IgnorePropertyArgs {
    fn parse(input: ParseStream) -> syn::Result<Self> {
        let model: syn::Ident = input.parse()?;
        let mut aliases = Vec::new();
        while !input.is_empty() {
            input.parse::<Token![,]>()?;
            if input.is_empty() {
                break;
            }
            aliases.push(input.parse::<LitStr>()?.value());
        }
        if aliases.is_empty() {
            return Err(input.error("expected at least one property alias"));
        }
        Ok(Self {
            model: model.to_string(),
            aliases,
        })
    }
}

/// `rename_property!(Model, "alias", local_name)`
struct RenamePropertyArgs {
    model: String,
    alias: String,
    local_name: String,
}

impl Parse for RenamePropertyArgs {
    fn parse(input: ParseStream) -> syn::Result<Self> {
        let model: syn::Ident = input.parse()?;
        input.parse::<Token![,]>()?;
        let alias: LitStr = input.parse()?;
        input.parse::<Token![,]>()?;
        let local_name: syn::Ident = input.parse()?;
        if input.peek(Token![,]) {
            input.parse::<Token![,]>()?;
        }
        Ok(Self {
            model: model.to_string(),
            alias: alias.value(),
            local_name: local_name.to_string(),
        })
    }
}
