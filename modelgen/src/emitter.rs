//! Text emitter for generated models.
//!
//! Every function here is pure: the same plan and namespace always render the
//! same bytes, which is what staleness checks compare against.

use crate::naming;
use crate::planner::{GenerationPlan, ModelRef};
use crate::scanner::GENERATED_SUFFIX;
use crate::schema::ItemKind;
use std::collections::BTreeSet;
use std::path::PathBuf;

/// File name of the module index.
pub const INDEX_FILE_NAME: &str = "_models.generated.rs";

/// Import every model file starts with.
pub const RUNTIME_IMPORT: &str = "super::runtime::PublishedContent";

const HEADER: &str = "\
// <auto-generated>
//   This file was generated by modelgen.
//   Changes to this file will be lost when models are regenerated.
// </auto-generated>
";

const MARKER_MACROS: &[&str] = &["ignore_content_type", "ignore_property", "rename_property"];

const RUNTIME_MODULE: &str = r#"/// Minimal runtime shared by every generated model.
pub mod runtime {
    use std::any::Any;
    use std::collections::BTreeMap;
    use std::fmt;
    use std::sync::Arc;

    /// A published content item and its property values, keyed by alias.
    #[derive(Clone, Default)]
    pub struct PublishedContent {
        content_type: String,
        values: BTreeMap<String, Arc<dyn Any + Send + Sync>>,
    }

    impl PublishedContent {
        pub fn new(content_type: impl Into<String>) -> Self {
            Self {
                content_type: content_type.into(),
                values: BTreeMap::new(),
            }
        }

        pub fn with_value<T: Any + Send + Sync>(mut self, alias: impl Into<String>, value: T) -> Self {
            self.values.insert(alias.into(), Arc::new(value));
            self
        }

        pub fn content_type(&self) -> &str {
            &self.content_type
        }

        /// Value of a property, if set and of type `T`.
        pub fn value<T: Any + Clone>(&self, alias: &str) -> Option<T> {
            self.values
                .get(alias)
                .and_then(|value| value.downcast_ref::<T>())
                .cloned()
        }
    }

    impl fmt::Debug for PublishedContent {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.debug_struct("PublishedContent")
                .field("content_type", &self.content_type)
                .field("properties", &self.values.keys().collect::<Vec<_>>())
                .finish()
        }
    }
}
"#;

/// File name of the generated file for a model (`BlogPost` -> `blog_post.generated.rs`).
pub fn generated_file_name(class_name: &str) -> String {
    format!("{}{}", naming::module_file_stem(class_name), GENERATED_SUFFIX)
}

/// Module identifier under which the index declares a generated model file.
fn generated_module_ident(class_name: &str) -> String {
    format!("{}_generated", naming::module_file_stem(class_name))
}

/// Render the source file of one model.
pub fn emit_model(plan: &GenerationPlan, namespace: &str) -> String {
    let name = &plan.class_name;
    let mut output = String::new();

    output.push_str(HEADER);
    output.push('\n');
    output.push_str(&format!("//! Models of the `{}` namespace.\n\n", namespace));

    let mut uses: BTreeSet<&str> = BTreeSet::new();
    uses.insert(RUNTIME_IMPORT);
    for path in &plan.uses {
        let imports_runtime = path.ends_with("::PublishedContent") && path != RUNTIME_IMPORT;
        if !imports_runtime {
            uses.insert(path.as_str());
        }
    }
    for path in uses {
        output.push_str(&format!("use {};\n", path));
    }
    output.push('\n');

    let kind = if plan.kind == ItemKind::Element {
        "element"
    } else {
        "content"
    };
    output.push_str(&format!("/// Published `{}` {}.\n", plan.alias, kind));
    output.push_str("#[derive(Debug, Clone)]\n");
    output.push_str(&format!("pub struct {} {{\n", name));
    output.push_str("    content: PublishedContent,\n");
    output.push_str("}\n\n");

    output.push_str(&format!("impl {} {{\n", name));
    output.push_str(&format!(
        "    pub const CONTENT_TYPE_ALIAS: &'static str = {:?};\n",
        plan.alias
    ));
    output.push_str(&format!(
        "    pub const IS_ELEMENT: bool = {};\n",
        plan.kind == ItemKind::Element
    ));
    match &plan.base {
        Some(base) => output.push_str(&format!(
            "    pub const BASE_TYPE: Option<&'static str> = Some({:?});\n",
            base.alias
        )),
        None => output.push_str("    pub const BASE_TYPE: Option<&'static str> = None;\n"),
    }
    let mixins: Vec<String> = plan.mixins.iter().map(|m| format!("{:?}", m.alias)).collect();
    output.push_str(&format!(
        "    pub const MIXINS: &'static [&'static str] = &[{}];\n\n",
        mixins.join(", ")
    ));

    output.push_str("    pub fn new(content: PublishedContent) -> Self {\n");
    output.push_str("        Self { content }\n");
    output.push_str("    }\n\n");
    output.push_str("    pub fn content(&self) -> &PublishedContent {\n");
    output.push_str("        &self.content\n");
    output.push_str("    }\n");

    for property in &plan.properties {
        output.push('\n');
        output.push_str(&format!(
            "    /// Value of the `{}` property.\n",
            property.alias
        ));
        output.push_str(&format!(
            "    pub fn {}(&self) -> Option<{}> {{\n",
            property.local_name, property.value_type
        ));
        output.push_str(&format!(
            "        self.content.value::<{}>({:?})\n",
            property.value_type, property.alias
        ));
        output.push_str("    }\n");
    }
    output.push_str("}\n\n");

    output.push_str(&format!("impl From<PublishedContent> for {} {{\n", name));
    output.push_str("    fn from(content: PublishedContent) -> Self {\n");
    output.push_str("        Self::new(content)\n");
    output.push_str("    }\n");
    output.push_str("}\n\n");

    output.push_str(&format!("impl From<{}> for PublishedContent {{\n", name));
    output.push_str(&format!("    fn from(model: {}) -> Self {{\n", name));
    output.push_str("        model.content\n");
    output.push_str("    }\n");
    output.push_str("}\n");

    for target in plan.base.iter().chain(plan.mixins.iter()) {
        output.push('\n');
        output.push_str(&emit_conversion(name, target));
    }

    output
}

fn emit_conversion(name: &str, target: &ModelRef) -> String {
    format!(
        "impl From<{name}> for super::{target} {{\n    fn from(model: {name}) -> Self {{\n        super::{target}::new(model.content)\n    }}\n}}\n",
        name = name,
        target = target.class_name
    )
}

/// Render the module index tying generated and hand-authored files together.
///
/// `hand_files` are the hand-authored files of the models directory; only
/// their file names are used.
pub fn emit_index(namespace: &str, plans: &[GenerationPlan], hand_files: &[PathBuf]) -> String {
    let mut output = String::new();

    output.push_str(HEADER);
    output.push('\n');
    output.push_str(&format!("//! Models of the `{}` namespace.\n", namespace));
    output.push_str("//!\n");
    output.push_str("//! Include it with `#[path = \"<models dir>/_models.generated.rs\"] pub mod models;`.\n\n");
    output.push_str("#![allow(dead_code, unused_imports, unused_macros)]\n\n");

    for marker in MARKER_MACROS {
        output.push_str(&format!(
            "macro_rules! {} {{\n    ($($tokens:tt)*) => {{}};\n}}\n\n",
            marker
        ));
    }

    output.push_str(RUNTIME_MODULE);

    let mut taken: BTreeSet<String> = BTreeSet::new();
    taken.insert("runtime".to_string());

    for plan in plans {
        let module = generated_module_ident(&plan.class_name);
        taken.insert(module.clone());
        output.push('\n');
        output.push_str(&format!(
            "#[path = {:?}]\nmod {};\npub use self::{}::{};\n",
            generated_file_name(&plan.class_name),
            module,
            module,
            plan.class_name
        ));
    }

    let mut names: Vec<String> = hand_files
        .iter()
        .filter_map(|path| path.file_name())
        .map(|name| name.to_string_lossy().into_owned())
        .collect();
    names.sort();
    names.dedup();

    for file_name in names {
        let stem = file_name.strip_suffix(".rs").unwrap_or(&file_name);
        let mut module = naming::module_ident(stem);
        while !taken.insert(module.clone()) {
            module.push('_');
        }
        output.push('\n');
        output.push_str(&format!("#[path = {:?}]\npub mod {};\n", file_name, module));
    }

    output
}
