//! Check constraint and generated column sections.

use crate::annotate::provider::{
    ContentProvider, ProviderContext, ProviderError, ProviderKind, ProviderResult,
};

pub struct CheckConstraintsProvider;

impl ContentProvider for CheckConstraintsProvider {
    fn name(&self) -> &'static str {
        "check_constraints"
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Section
    }

    fn applicable(&self, ctx: &ProviderContext<'_>) -> bool {
        !ctx.table.check_constraints.is_empty()
    }

    fn process(
        &self,
        ctx: &mut ProviderContext<'_>,
    ) -> Result<Option<ProviderResult>, ProviderError> {
        if ctx.table.check_constraints.is_empty() {
            return Ok(None);
        }
        let lines: Vec<String> = ctx
            .table
            .check_constraints
            .iter()
            .map(|check| format!("{}: {}", check.name, check.expression))
            .collect();
        Ok(Some(ProviderResult::Section {
            title: Some("Check Constraints".to_string()),
            content: lines.join("\n"),
        }))
    }
}

pub struct GeneratedColumnsProvider;

impl ContentProvider for GeneratedColumnsProvider {
    fn name(&self) -> &'static str {
        "generated_columns"
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Section
    }

    fn applicable(&self, ctx: &ProviderContext<'_>) -> bool {
        !ctx.table.generated_columns.is_empty()
    }

    fn process(
        &self,
        ctx: &mut ProviderContext<'_>,
    ) -> Result<Option<ProviderResult>, ProviderError> {
        if ctx.table.generated_columns.is_empty() {
            return Ok(None);
        }
        let lines: Vec<String> = ctx
            .table
            .generated_columns
            .iter()
            .map(|generated| {
                let mode = if generated.stored { "stored" } else { "virtual" };
                match &generated.expression {
                    Some(expression) => {
                        format!("{} ({}): {}", generated.name, mode, expression)
                    }
                    None => format!("{} ({})", generated.name, mode),
                }
            })
            .collect();
        Ok(Some(ProviderResult::Section {
            title: Some("Generated Columns".to_string()),
            content: lines.join("\n"),
        }))
    }
}
