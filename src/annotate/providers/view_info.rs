//! View classification details for view-backed models.

use crate::annotate::provider::{
    ContentProvider, ProviderContext, ProviderError, ProviderKind, ProviderResult,
};
use crate::schema::ViewKind;

pub struct ViewInfoProvider;

impl ContentProvider for ViewInfoProvider {
    fn name(&self) -> &'static str {
        "view_info"
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Section
    }

    fn applicable(&self, ctx: &ProviderContext<'_>) -> bool {
        ctx.view.exists
    }

    fn process(
        &self,
        ctx: &mut ProviderContext<'_>,
    ) -> Result<Option<ProviderResult>, ProviderError> {
        let view = ctx.view;
        if !view.exists {
            return Ok(None);
        }

        let kind = match view.kind {
            ViewKind::MaterializedView => "materialized view",
            _ => "view",
        };
        let mut lines = vec![
            format!("kind: {}", kind),
            format!("updatable: {}", if view.updatable { "yes" } else { "no" }),
        ];
        if !view.dependencies.is_empty() {
            lines.push(format!("depends on: {}", view.dependencies.join(", ")));
        }
        if let Some(strategy) = &view.refresh_strategy {
            lines.push(format!("refresh: {}", strategy));
        }
        if let Some(at) = &view.last_refreshed {
            lines.push(format!("last refreshed: {}", at));
        }

        Ok(Some(ProviderResult::Section {
            title: Some("View".to_string()),
            content: lines.join("\n"),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotate::provider::testing::{model, table, Fixture};
    use crate::schema::ViewDescriptor;

    #[test]
    fn test_not_applicable_for_table_backed_models() {
        let mut fixture = Fixture::new(model("User"), table("users"));
        assert!(!ViewInfoProvider.applicable(&fixture.ctx()));
    }

    #[test]
    fn test_describes_a_materialized_view() {
        let mut fixture = Fixture::new(model("Report"), table("reports"));
        fixture.view = ViewDescriptor {
            exists: true,
            kind: ViewKind::MaterializedView,
            updatable: false,
            dependencies: vec!["orders".to_string(), "users".to_string()],
            refresh_strategy: Some("manual".to_string()),
            last_refreshed: None,
        };

        let result = ViewInfoProvider
            .process(&mut fixture.ctx())
            .unwrap()
            .unwrap();
        match result {
            ProviderResult::Section { title, content } => {
                assert_eq!(title.as_deref(), Some("View"));
                assert_eq!(
                    content,
                    "kind: materialized view\n\
                     updatable: no\n\
                     depends on: orders, users\n\
                     refresh: manual"
                );
            }
            other => panic!("expected a section, got {:?}", other),
        }
    }
}
