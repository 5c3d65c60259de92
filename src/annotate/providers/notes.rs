//! Advisory note analyzers.
//!
//! Rules run in declaration order, and each rule walks its inputs in
//! declaration order, so note output is deterministic. These are advisory
//! heuristics: a note is a nudge, not a verdict.

use inflector::Inflector;

use crate::annotate::provider::{
    ContentProvider, ProviderContext, ProviderError, ProviderKind, ProviderResult,
};
use crate::annotate::{AdvisoryNote, NoteCode};
use crate::model::AssociationDescriptor;
use crate::schema::{LogicalType, ViewKind};

/// Column, association, and naming advisories for table-backed models.
pub struct TableNotesProvider;

impl ContentProvider for TableNotesProvider {
    fn name(&self) -> &'static str {
        "table_notes"
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Notes
    }

    fn applicable(&self, ctx: &ProviderContext<'_>) -> bool {
        !ctx.view.exists
    }

    fn process(
        &self,
        ctx: &mut ProviderContext<'_>,
    ) -> Result<Option<ProviderResult>, ProviderError> {
        let mut notes = column_notes(ctx);
        notes.extend(association_notes(ctx));
        notes.extend(naming_notes(ctx));
        if notes.is_empty() {
            return Ok(None);
        }
        Ok(Some(ProviderResult::Notes(notes)))
    }
}

/// The reduced note set for view-backed models.
pub struct ViewNotesProvider;

impl ContentProvider for ViewNotesProvider {
    fn name(&self) -> &'static str {
        "view_notes"
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Notes
    }

    fn applicable(&self, ctx: &ProviderContext<'_>) -> bool {
        ctx.view.exists
    }

    fn process(
        &self,
        ctx: &mut ProviderContext<'_>,
    ) -> Result<Option<ProviderResult>, ProviderError> {
        let subject = ctx.table.name.bare_name().to_string();
        let mut notes = vec![AdvisoryNote::new(
            subject.clone(),
            NoteCode::ReadOnly,
            "backed by a view; treat as read-only",
        )];
        if matches!(ctx.view.kind, ViewKind::MaterializedView) {
            notes.push(AdvisoryNote::new(
                subject,
                NoteCode::Stale,
                "contents are only as fresh as the last refresh",
            ));
        }
        Ok(Some(ProviderResult::Notes(notes)))
    }
}

/// Column names whose values are typically set by operators, where an
/// accidental missing default surfaces as insert failures in production.
static OPERATOR_SET_NAMES: &[&str] = &["flags", "settings", "options", "preferences", "state"];

fn looks_operator_set(name: &str) -> bool {
    let last = name.rsplit('_').next().unwrap_or(name);
    OPERATOR_SET_NAMES.contains(&last)
}

fn column_notes(ctx: &ProviderContext<'_>) -> Vec<AdvisoryNote> {
    let mut notes = Vec::new();
    for column in &ctx.table.columns {
        if ctx.column_ignored(&column.name) || column.generated {
            continue;
        }
        match column.logical_type {
            LogicalType::Boolean if column.default.is_none() => {
                notes.push(AdvisoryNote::new(
                    column.name.as_str(),
                    NoteCode::Default,
                    "boolean column has no default",
                ));
            }
            LogicalType::String if column.limit.is_none() => {
                notes.push(AdvisoryNote::new(
                    column.name.as_str(),
                    NoteCode::Limit,
                    "string column has no declared length limit",
                ));
            }
            _ => {}
        }
        if !column.nullable && column.default.is_none() && looks_operator_set(&column.name) {
            notes.push(AdvisoryNote::new(
                column.name.as_str(),
                NoteCode::NotNull,
                "not null without a default",
            ));
        }
    }
    notes
}

fn association_notes(ctx: &ProviderContext<'_>) -> Vec<AdvisoryNote> {
    let mut notes = Vec::new();
    for assoc in &ctx.model.associations {
        if assoc.is_to_many() && assoc.limit.is_none() {
            notes.push(AdvisoryNote::new(
                assoc.name.as_str(),
                NoteCode::NPlusOne,
                "unbounded to-many association",
            ));
        }

        if !assoc.polymorphic {
            let target_name = resolved_target(ctx, assoc);
            match ctx.catalog.get(&target_name) {
                None => notes.push(AdvisoryNote::new(
                    assoc.name.as_str(),
                    NoteCode::Inverse,
                    format!("target model {} is not in the catalog", target_name),
                )),
                Some(target) if !has_inverse(ctx, &target.associations, assoc) => {
                    notes.push(AdvisoryNote::new(
                        assoc.name.as_str(),
                        NoteCode::Inverse,
                        format!("no inverse association found on {}", target_name),
                    ));
                }
                Some(_) => {}
            }
        }

        if assoc.is_to_many() && !assoc.counter_cache {
            let counter = format!("{}_count", assoc.name);
            if ctx.table.column(&counter).is_some() {
                notes.push(AdvisoryNote::new(
                    assoc.name.as_str(),
                    NoteCode::CounterCache,
                    format!(
                        "table has {} but the association declares no counter cache",
                        counter
                    ),
                ));
            }
        }
    }
    notes
}

fn naming_notes(ctx: &ProviderContext<'_>) -> Vec<AdvisoryNote> {
    let bare = ctx.table.name.bare_name();
    if ctx.inflector.is_plural(bare) {
        return Vec::new();
    }
    vec![AdvisoryNote::new(
        bare,
        NoteCode::Naming,
        "table name is not the conventional plural",
    )]
}

/// Target model name: the declared one, or derived from the association
/// name by convention.
fn resolved_target(ctx: &ProviderContext<'_>, assoc: &AssociationDescriptor) -> String {
    if let Some(target) = &assoc.target {
        return target.clone();
    }
    let base = if assoc.is_to_many() {
        ctx.inflector.singularize(&assoc.name)
    } else {
        assoc.name.clone()
    };
    base.to_pascal_case()
}

/// Whether any association on the target points back at this model. A
/// polymorphic back-association counts; it may be the inverse.
fn has_inverse(
    ctx: &ProviderContext<'_>,
    target_associations: &[AssociationDescriptor],
    assoc: &AssociationDescriptor,
) -> bool {
    if let Some(inverse) = &assoc.inverse_of {
        return target_associations.iter().any(|back| &back.name == inverse);
    }
    target_associations
        .iter()
        .any(|back| back.polymorphic || resolved_target(ctx, back) == ctx.model.name)
}
