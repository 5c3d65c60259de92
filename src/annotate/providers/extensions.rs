//! Installed database extensions.

use crate::annotate::provider::{
    ContentProvider, ProviderContext, ProviderError, ProviderKind, ProviderResult,
};

/// Lists installed extensions, name-sorted. Only engines that have an
/// extension catalog at all (postgres) are asked.
pub struct ExtensionsProvider;

impl ContentProvider for ExtensionsProvider {
    fn name(&self) -> &'static str {
        "extensions"
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Section
    }

    fn applicable(&self, ctx: &ProviderContext<'_>) -> bool {
        ctx.dialect().dialect().supports_extensions()
    }

    fn process(
        &self,
        ctx: &mut ProviderContext<'_>,
    ) -> Result<Option<ProviderResult>, ProviderError> {
        let dialect = ctx.dialect().dialect();
        let extensions = dialect.extensions(&mut *ctx.connection)?;
        if extensions.is_empty() {
            return Ok(None);
        }
        Ok(Some(ProviderResult::Section {
            title: Some("Extensions".to_string()),
            content: extensions.join("\n"),
        }))
    }
}
