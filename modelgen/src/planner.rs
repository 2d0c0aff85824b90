//! Generation planner.
//!
//! Merges the schema with what hand-authored code already provides and
//! decides, per content type, which accessors to emit.
//!
//! # Composition
//!
//! A type's effective property set is built from its own properties, then its
//! base type's effective set, then each mixin's effective set in declaration
//! order. The first declaration of an alias wins:
//!
//! - identical value types merge silently;
//! - a type's own declaration overrides composed ones (with a warning);
//! - composed declarations differing only by `Option<_>` keep the first one
//!   (with a warning);
//! - any other disagreement makes the type unresolvable.
//!
//! Problems are local to one type: an unresolvable type is skipped with a
//! diagnostic and every sibling is still planned.

use crate::diagnostic::Diagnostic;
use crate::emitter::generated_file_name;
use crate::error::PlanError;
use crate::naming;
use crate::parser::ExistingCode;
use crate::schema::{ItemKind, PropertyModel, Schema, TypeModel};
use std::collections::{BTreeMap, BTreeSet};

/// Reference from one plan to another planned model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelRef {
    pub alias: String,
    pub class_name: String,
}

/// A property the emitter will generate an accessor for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedProperty {
    pub alias: String,
    pub local_name: String,
    pub value_type: String,
    /// Alias of the type that declares the property.
    pub declared_by: String,
}

/// Why a property is left out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertySkip {
    /// Ignored by the schema or by an `ignore_property!` marker.
    Ignored,
    /// A member with the accessor name already exists in hand-authored code.
    DeclaredByHand,
}

/// A property that will not get a generated accessor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedProperty {
    pub alias: String,
    pub local_name: String,
    pub reason: PropertySkip,
}

/// Why a whole content type is left out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeSkip {
    /// Matched by an `ignore_content_type!` marker.
    IgnoredByMarker,
    /// The model struct is declared by hand.
    ImplementedByHand,
    /// Planning failed; see the run diagnostics.
    Unresolvable,
}

/// A content type that will not get a generated model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedType {
    pub alias: String,
    pub class_name: String,
    pub reason: TypeSkip,
}

/// Everything the emitter needs to render one model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationPlan {
    pub alias: String,
    pub class_name: String,
    pub kind: ItemKind,
    pub base: Option<ModelRef>,
    pub mixins: Vec<ModelRef>,
    pub properties: Vec<PlannedProperty>,
    pub skipped_properties: Vec<SkippedProperty>,
    /// Imports carried over from hand-authored code.
    pub uses: BTreeSet<String>,
}

impl GenerationPlan {
    /// Look a planned property up by alias.
    pub fn property(&self, alias: &str) -> Option<&PlannedProperty> {
        self.properties.iter().find(|p| p.alias == alias)
    }
}

/// Plans for every content type of a schema.
#[derive(Debug, Clone, Default)]
pub struct PlanSet {
    /// One plan per generated model, sorted by model name.
    pub plans: Vec<GenerationPlan>,
    pub skipped_types: Vec<SkippedType>,
    pub diagnostics: Vec<Diagnostic>,
}

impl PlanSet {
    /// Look a plan up by model name.
    pub fn plan(&self, class_name: &str) -> Option<&GenerationPlan> {
        self.plans.iter().find(|p| p.class_name == class_name)
    }
}

/// A property declaration reached through composition.
#[derive(Debug, Clone)]
struct Declared {
    property: PropertyModel,
    declared_by: String,
    ignored: bool,
}

/// Planner turning a schema and existing code into generation plans.
#[derive(Debug, Default)]
pub struct GenerationPlanner;

impl GenerationPlanner {
    /// Create a new planner.
    pub fn new() -> Self {
        Self
    }

    /// Plan every content type of the schema.
    pub fn plan(&self, schema: &Schema, existing: &ExistingCode) -> PlanSet {
        let mut index: BTreeMap<&str, &TypeModel> = BTreeMap::new();
        for ty in &schema.types {
            index.entry(ty.alias.as_str()).or_insert(ty);
        }

        let mut claimed: BTreeMap<String, String> = BTreeMap::new();
        // Distinct model names may still share a snake_case file stem.
        let mut files: BTreeMap<String, String> = BTreeMap::new();
        let mut plans: BTreeMap<String, GenerationPlan> = BTreeMap::new();
        let mut skipped_types = Vec::new();
        let mut diagnostics = Vec::new();

        for ty in &schema.types {
            let class_name = ty.model_name();

            if existing.is_content_type_ignored(&ty.alias) {
                tracing::debug!(alias = %ty.alias, "content type ignored by marker");
                skipped_types.push(SkippedType {
                    alias: ty.alias.clone(),
                    class_name,
                    reason: TypeSkip::IgnoredByMarker,
                });
                continue;
            }

            if let Some(owner) = claimed.get(&class_name) {
                let error = PlanError::DuplicateClassName {
                    type_alias: ty.alias.clone(),
                    class_name: class_name.clone(),
                    owner: owner.clone(),
                };
                self.skip_unresolvable(ty, class_name, &error, &mut skipped_types, &mut diagnostics);
                continue;
            }
            claimed.insert(class_name.clone(), ty.alias.clone());

            if existing.implements_type(&class_name) {
                tracing::debug!(alias = %ty.alias, model = %class_name, "model implemented by hand");
                skipped_types.push(SkippedType {
                    alias: ty.alias.clone(),
                    class_name,
                    reason: TypeSkip::ImplementedByHand,
                });
                continue;
            }

            let file_name = generated_file_name(&class_name);
            if let Some(owner) = files.get(&file_name) {
                let error = PlanError::GeneratedFileCollision {
                    type_alias: ty.alias.clone(),
                    file_name,
                    owner: owner.clone(),
                };
                self.skip_unresolvable(ty, class_name, &error, &mut skipped_types, &mut diagnostics);
                continue;
            }

            match self.plan_type(ty, &class_name, &index, existing) {
                Ok((plan, warnings)) => {
                    files.insert(file_name, format!("'{}'", ty.alias));
                    for warning in warnings {
                        if !diagnostics.contains(&warning) {
                            tracing::warn!(%warning, "property conflict resolved by precedence");
                            diagnostics.push(warning);
                        }
                    }
                    plans.insert(class_name, plan);
                }
                Err(error) => {
                    self.skip_unresolvable(ty, class_name, &error, &mut skipped_types, &mut diagnostics)
                }
            }
        }

        // References survive only when the referenced model is generated.
        let planned: BTreeSet<String> = plans.values().map(|p| p.alias.clone()).collect();
        for plan in plans.values_mut() {
            plan.base = plan.base.take().filter(|r| planned.contains(&r.alias));
            plan.mixins.retain(|r| planned.contains(&r.alias));
        }

        PlanSet {
            plans: plans.into_values().collect(),
            skipped_types,
            diagnostics,
        }
    }

    fn skip_unresolvable(
        &self,
        ty: &TypeModel,
        class_name: String,
        error: &PlanError,
        skipped_types: &mut Vec<SkippedType>,
        diagnostics: &mut Vec<Diagnostic>,
    ) {
        tracing::warn!(alias = %ty.alias, %error, "skipping unresolvable content type");
        diagnostics.push(Diagnostic::unresolvable(&ty.alias, error));
        skipped_types.push(SkippedType {
            alias: ty.alias.clone(),
            class_name,
            reason: TypeSkip::Unresolvable,
        });
    }

    fn plan_type(
        &self,
        ty: &TypeModel,
        class_name: &str,
        index: &BTreeMap<&str, &TypeModel>,
        existing: &ExistingCode,
    ) -> Result<(GenerationPlan, Vec<Diagnostic>), PlanError> {
        let mut warnings = Vec::new();
        let effective = resolve(ty, index, &mut Vec::new(), &mut warnings)?;

        let mut properties = Vec::new();
        let mut skipped_properties = Vec::new();
        let mut local_names: BTreeMap<String, String> = BTreeMap::new();

        for declared in effective {
            let alias = declared.property.alias.clone();
            let local_name = naming::sanitize_identifier(
                &existing
                    .renamed(class_name, &alias)
                    .map(str::to_string)
                    .unwrap_or_else(|| declared.property.default_local_name()),
            );

            if declared.ignored || existing.is_property_ignored(class_name, &alias) {
                skipped_properties.push(SkippedProperty {
                    alias,
                    local_name,
                    reason: PropertySkip::Ignored,
                });
                continue;
            }

            if existing.is_declared(class_name, &local_name) {
                tracing::debug!(model = %class_name, member = %local_name, "member declared by hand");
                skipped_properties.push(SkippedProperty {
                    alias,
                    local_name,
                    reason: PropertySkip::DeclaredByHand,
                });
                continue;
            }

            if let Some(first) = local_names.get(&local_name) {
                return Err(PlanError::LocalNameCollision {
                    type_alias: ty.alias.clone(),
                    first: first.clone(),
                    second: alias,
                    local_name,
                });
            }
            local_names.insert(local_name.clone(), alias.clone());

            properties.push(PlannedProperty {
                alias,
                local_name,
                value_type: declared.property.value_type.trim().to_string(),
                declared_by: declared.declared_by,
            });
        }

        let reference = |alias: &String| {
            index.get(alias.as_str()).map(|t| ModelRef {
                alias: t.alias.clone(),
                class_name: t.model_name(),
            })
        };
        let base = ty.base.as_ref().and_then(reference);
        let mut mixins: Vec<ModelRef> = Vec::new();
        for mixin in ty.mixins.iter().filter_map(reference) {
            let is_base = base.as_ref().is_some_and(|b| b.alias == mixin.alias);
            if !is_base && !mixins.iter().any(|m| m.alias == mixin.alias) {
                mixins.push(mixin);
            }
        }

        let plan = GenerationPlan {
            alias: ty.alias.clone(),
            class_name: class_name.to_string(),
            kind: ty.kind,
            base,
            mixins,
            properties,
            skipped_properties,
            uses: existing.uses_for(class_name),
        };

        Ok((plan, warnings))
    }
}

/// Effective property set of a type, in precedence order.
fn resolve(
    ty: &TypeModel,
    index: &BTreeMap<&str, &TypeModel>,
    stack: &mut Vec<String>,
    warnings: &mut Vec<Diagnostic>,
) -> Result<Vec<Declared>, PlanError> {
    if let Some(position) = stack.iter().position(|alias| *alias == ty.alias) {
        let mut cycle = stack[position..].to_vec();
        cycle.push(ty.alias.clone());
        return Err(PlanError::CircularComposition { cycle });
    }
    stack.push(ty.alias.clone());

    let mut merged = Vec::new();
    for property in &ty.properties {
        let declared = Declared {
            property: property.clone(),
            declared_by: ty.alias.clone(),
            ignored: property.ignored,
        };
        merge(&ty.alias, &mut merged, declared, warnings)?;
    }

    for dependency in ty.base.iter().chain(ty.mixins.iter()) {
        let composed = index
            .get(dependency.as_str())
            .ok_or_else(|| PlanError::MissingComposition {
                type_alias: ty.alias.clone(),
                dependency: dependency.clone(),
            })?;
        for declared in resolve(composed, index, stack, warnings)? {
            merge(&ty.alias, &mut merged, declared, warnings)?;
        }
    }

    stack.pop();
    Ok(merged)
}

fn merge(
    owner: &str,
    merged: &mut Vec<Declared>,
    incoming: Declared,
    warnings: &mut Vec<Diagnostic>,
) -> Result<(), PlanError> {
    let Some(kept) = merged
        .iter_mut()
        .find(|d| d.property.alias == incoming.property.alias)
    else {
        merged.push(incoming);
        return Ok(());
    };

    // An ignore anywhere in the composition sticks.
    kept.ignored |= incoming.ignored;

    let kept_type = &kept.property.value_type;
    let dropped_type = &incoming.property.value_type;
    if normalize_type(kept_type) == normalize_type(dropped_type) {
        return Ok(());
    }

    if kept.declared_by == owner || compatible_types(kept_type, dropped_type) {
        warnings.push(Diagnostic::mixin_conflict(
            owner,
            format!(
                "property '{}' is declared as `{}` by '{}' and as `{}` by '{}'; keeping `{}`",
                kept.property.alias,
                kept_type,
                kept.declared_by,
                dropped_type,
                incoming.declared_by,
                kept_type
            ),
        ));
        return Ok(());
    }

    Err(PlanError::IncompatibleProperty {
        type_alias: owner.to_string(),
        alias: kept.property.alias.clone(),
        kept: kept_type.clone(),
        kept_origin: format!("'{}'", kept.declared_by),
        dropped: dropped_type.clone(),
        dropped_origin: format!("'{}'", incoming.declared_by),
    })
}

fn normalize_type(ty: &str) -> String {
    ty.chars().filter(|c| !c.is_whitespace()).collect()
}

/// `T` and `Option<T>` are compatible; anything else must match exactly.
fn compatible_types(a: &str, b: &str) -> bool {
    let a = normalize_type(a);
    let b = normalize_type(b);
    strip_option(&a) == strip_option(&b)
}

fn strip_option(ty: &str) -> &str {
    ty.strip_prefix("Option<")
        .and_then(|inner| inner.strip_suffix('>'))
        .unwrap_or(ty)
}
