//! Field collection: flattening a selection set into response keys.
//!
//! See <https://spec.graphql.org/October2021/#CollectFields()>.

use crate::coercion::Variables;
use crate::context::ExecutionContext;
use crate::introspection::meta_object_type;
use crate::schema::{ObjectDef, Schema, TypeDef};
use gqlx_syntax::{ast, Directive, Field, Selection, SelectionSet};
use indexmap::IndexMap;
use rustc_hash::FxHashSet;
use tracing::trace;

/// Field nodes grouped by response key, in order of first appearance.
pub type CollectedFields<'a> = IndexMap<&'a str, Vec<&'a Field>>;

/// Collects the fields of `selection_set` that apply to `parent_type`.
///
/// `visited_fragments` is shared across one collection pass: the first
/// applicable spread of a fragment expands it and later spreads of the
/// same name are ignored.
pub fn collect_fields<'a>(
    ctx: &ExecutionContext<'a>,
    parent_type: &ObjectDef,
    selection_set: Option<&'a SelectionSet>,
    fields: &mut CollectedFields<'a>,
    visited_fragments: &mut FxHashSet<&'a str>,
) {
    let Some(selection_set) = selection_set else {
        return;
    };

    for selection in &selection_set.selections {
        match selection {
            Selection::Field(field) => {
                if !should_include(&field.directives, &ctx.variable_values) {
                    trace!(field = field.name.as_str(), "field excluded by directive");
                    continue;
                }
                fields.entry(field.response_key()).or_default().push(field);
            }
            Selection::InlineFragment(inline) => {
                if !should_include(&inline.directives, &ctx.variable_values) {
                    continue;
                }
                if let Some(condition) = &inline.type_condition {
                    if !does_fragment_type_apply(ctx.schema, parent_type, condition.as_str()) {
                        continue;
                    }
                }
                collect_fields(
                    ctx,
                    parent_type,
                    Some(&inline.selection_set),
                    fields,
                    visited_fragments,
                );
            }
            Selection::FragmentSpread(spread) => {
                let name = spread.fragment_name.as_str();
                if visited_fragments.contains(name) {
                    continue;
                }
                let Some(fragment) = ctx.fragments.get(name).copied() else {
                    continue;
                };
                if !should_include(&spread.directives, &ctx.variable_values) {
                    continue;
                }
                if !does_fragment_type_apply(
                    ctx.schema,
                    parent_type,
                    fragment.type_condition.as_str(),
                ) {
                    continue;
                }
                visited_fragments.insert(fragment.name.as_str());
                collect_fields(
                    ctx,
                    parent_type,
                    Some(&fragment.selection_set),
                    fields,
                    visited_fragments,
                );
            }
        }
    }
}

/// Evaluates `@skip` and `@include`. `@skip(if: true)` always wins.
#[must_use]
pub fn should_include(directives: &[Directive], variables: &Variables) -> bool {
    if eval_if_arg(directives, "skip", variables).unwrap_or(false) {
        return false;
    }
    eval_if_arg(directives, "include", variables).unwrap_or(true)
}

fn eval_if_arg(directives: &[Directive], name: &str, variables: &Variables) -> Option<bool> {
    let directive = directives.iter().find(|d| d.name.as_str() == name)?;
    match &directive.argument("if")?.value {
        ast::Value::Boolean(value, _) => Some(*value),
        ast::Value::Variable(var) => variables.get(var.as_str())?.as_bool(),
        _ => None,
    }
}

/// Returns true if a fragment with `type_condition` applies to `object_type`.
#[must_use]
pub fn does_fragment_type_apply(schema: &Schema, object_type: &ObjectDef, type_condition: &str) -> bool {
    match schema.get_type(type_condition) {
        Some(TypeDef::Object(_)) => type_condition == object_type.name,
        Some(TypeDef::Interface(_)) => object_type.implements.iter().any(|i| i == type_condition),
        Some(TypeDef::Union(union)) => union.members.iter().any(|m| *m == object_type.name),
        Some(_) => false,
        None => meta_object_type(type_condition).is_some_and(|meta| meta.name == object_type.name),
    }
}
