//! The primary schema section.

use crate::annotate::provider::{
    ContentProvider, ProviderContext, ProviderError, ProviderKind, ProviderResult,
};
use crate::annotate::render;

/// Renders the main schema dump from the reflected metadata.
pub struct SchemaDumpProvider;

impl ContentProvider for SchemaDumpProvider {
    fn name(&self) -> &'static str {
        "schema_dump"
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Schema
    }

    fn process(
        &self,
        ctx: &mut ProviderContext<'_>,
    ) -> Result<Option<ProviderResult>, ProviderError> {
        let mut table = ctx.table.clone();
        table.columns = ctx.visible_columns();
        Ok(Some(ProviderResult::Schema(render::schema_dump(
            &table,
            ctx.settings,
        ))))
    }
}
