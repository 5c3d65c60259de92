//! Sections derived from the model manifest and primary key shape.

use crate::annotate::provider::{
    ContentProvider, ProviderContext, ProviderError, ProviderKind, ProviderResult,
};

/// Single-table-inheritance parent and discriminator column.
pub struct InheritanceProvider;

impl ContentProvider for InheritanceProvider {
    fn name(&self) -> &'static str {
        "inheritance"
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Section
    }

    fn applicable(&self, ctx: &ProviderContext<'_>) -> bool {
        ctx.model.parent.is_some() || ctx.model.inheritance_column.is_some()
    }

    fn process(
        &self,
        ctx: &mut ProviderContext<'_>,
    ) -> Result<Option<ProviderResult>, ProviderError> {
        let mut lines: Vec<String> = Vec::new();
        if let Some(parent) = &ctx.model.parent {
            lines.push(format!("parent: {}", parent));
        }
        if let Some(column) = &ctx.model.inheritance_column {
            lines.push(format!("inheritance column: {}", column));
        }
        if lines.is_empty() {
            return Ok(None);
        }
        Ok(Some(ProviderResult::Section {
            title: Some("Inheritance".to_string()),
            content: lines.join("\n"),
        }))
    }
}

/// Declared enum columns and their permitted values.
pub struct EnumsProvider;

impl ContentProvider for EnumsProvider {
    fn name(&self) -> &'static str {
        "enums"
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Section
    }

    fn applicable(&self, ctx: &ProviderContext<'_>) -> bool {
        !ctx.model.enums.is_empty()
    }

    fn process(
        &self,
        ctx: &mut ProviderContext<'_>,
    ) -> Result<Option<ProviderResult>, ProviderError> {
        if ctx.model.enums.is_empty() {
            return Ok(None);
        }
        let lines: Vec<String> = ctx
            .model
            .enums
            .iter()
            .map(|definition| format!("{}: {}", definition.column, definition.values.join(", ")))
            .collect();
        Ok(Some(ProviderResult::Section {
            title: Some("Enums".to_string()),
            content: lines.join("\n"),
        }))
    }
}

/// Delegated type roles and their permitted types.
pub struct DelegatedTypesProvider;

impl ContentProvider for DelegatedTypesProvider {
    fn name(&self) -> &'static str {
        "delegated_types"
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Section
    }

    fn applicable(&self, ctx: &ProviderContext<'_>) -> bool {
        !ctx.model.delegated_types.is_empty()
    }

    fn process(
        &self,
        ctx: &mut ProviderContext<'_>,
    ) -> Result<Option<ProviderResult>, ProviderError> {
        if ctx.model.delegated_types.is_empty() {
            return Ok(None);
        }
        let lines: Vec<String> = ctx
            .model
            .delegated_types
            .iter()
            .map(|delegated| format!("{}: {}", delegated.role, delegated.types.join(", ")))
            .collect();
        Ok(Some(ProviderResult::Section {
            title: Some("Delegated Types".to_string()),
            content: lines.join("\n"),
        }))
    }
}

/// Calls out composite primary keys, in declaration order.
pub struct CompositeKeysProvider;

impl ContentProvider for CompositeKeysProvider {
    fn name(&self) -> &'static str {
        "composite_keys"
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Section
    }

    fn applicable(&self, ctx: &ProviderContext<'_>) -> bool {
        ctx.table.has_composite_key()
    }

    fn process(
        &self,
        ctx: &mut ProviderContext<'_>,
    ) -> Result<Option<ProviderResult>, ProviderError> {
        if !ctx.table.has_composite_key() {
            return Ok(None);
        }
        Ok(Some(ProviderResult::Section {
            title: Some("Composite Primary Key".to_string()),
            content: ctx.table.primary_key.join(", "),
        }))
    }
}
