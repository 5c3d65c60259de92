//! One model in, one annotation out.
//!
//! The pipeline checks out a single pooled connection, classifies the
//! backing relation, reflects its metadata, then walks the provider
//! registry in order. Providers are sandboxed: an error or panic in one
//! is recorded and the walk continues.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use regex::Regex;
use tracing::warn;

use crate::config::{AnnotationSettings, SettingsError};
use crate::db::{ConnectionPool, DatabaseError};
use crate::inflect::{ConventionInflector, Inflection};
use crate::model::{ModelCatalog, ModelInfo};
use crate::report::error_chain;
use crate::schema::{
    resolve_adapter, IntrospectionReporter, SchemaReflector, ViewExistenceCache, ViewResolver,
};

use super::provider::{ProviderContext, ProviderError, ProviderResult};
use super::registry::ProviderRegistry;
use super::{Annotation, Section};

/// Errors that abort one model's run. All are recoverable at the batch
/// level; the runner records them and moves on.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Database(#[from] DatabaseError),

    /// Raised only under fail-fast; otherwise provider failures are
    /// recorded and the walk continues.
    #[error("provider '{provider}' failed")]
    Provider {
        provider: &'static str,
        #[source]
        source: ProviderError,
    },

    #[error("provider '{provider}' panicked")]
    ProviderPanic { provider: &'static str },
}

/// A recorded, non-fatal provider failure.
#[derive(Debug, Clone)]
pub struct ProviderFailure {
    pub provider: &'static str,
    pub message: String,
}

/// What one pipeline run produced.
#[derive(Debug)]
pub enum PipelineOutcome {
    /// Providers ran. The annotation may still be empty.
    Produced {
        annotation: Annotation,
        provider_failures: Vec<ProviderFailure>,
    },
    /// The model has no backing table or view; nothing to annotate.
    Skipped { reason: String },
}

pub struct AnnotationPipeline {
    registry: ProviderRegistry,
    settings: AnnotationSettings,
    resolver: ViewResolver,
    reporter: Arc<IntrospectionReporter>,
    inflector: Arc<dyn Inflection>,
    ignored_columns: Vec<Regex>,
}

impl AnnotationPipeline {
    pub fn new(
        settings: AnnotationSettings,
        registry: ProviderRegistry,
    ) -> Result<Self, SettingsError> {
        let ignored_columns = settings.ignored_column_patterns()?;
        Ok(AnnotationPipeline {
            registry,
            resolver: ViewResolver::new(Arc::new(ViewExistenceCache::new())),
            reporter: Arc::new(IntrospectionReporter::new()),
            inflector: Arc::new(ConventionInflector),
            ignored_columns,
            settings,
        })
    }

    /// Share a view-existence cache across pipelines.
    pub fn with_resolver(mut self, resolver: ViewResolver) -> Self {
        self.resolver = resolver;
        self
    }

    /// Share an introspection reporter, so the batch report can drain it.
    pub fn with_reporter(mut self, reporter: Arc<IntrospectionReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn with_inflector(mut self, inflector: Arc<dyn Inflection>) -> Self {
        self.inflector = inflector;
        self
    }

    pub fn reporter(&self) -> &Arc<IntrospectionReporter> {
        &self.reporter
    }

    pub fn settings(&self) -> &AnnotationSettings {
        &self.settings
    }

    /// Run the full pipeline for one model.
    pub fn process(
        &self,
        model: &ModelInfo,
        catalog: &ModelCatalog,
        pool: &ConnectionPool,
    ) -> Result<PipelineOutcome, PipelineError> {
        let mut guard = pool.checkout()?;
        let conn = &mut *guard;

        // The single resolution point for unknown adapters.
        let dialect = resolve_adapter(conn.adapter_name())?;
        let table_name = model.table_name(self.inflector.as_ref());

        let view = self.resolver.describe(dialect.dialect(), conn, &table_name)?;

        let reflector = SchemaReflector::new(dialect).fail_fast(self.settings.fail_fast);
        let metadata = reflector.reflect(conn, &table_name, &self.reporter)?;

        if metadata.columns.is_empty() && !view.exists {
            return Ok(PipelineOutcome::Skipped {
                reason: format!("no table or view named '{}'", table_name.qualified()),
            });
        }

        let mut annotation = Annotation::default();
        let mut schema_source: Option<&'static str> = None;
        let mut failures: Vec<ProviderFailure> = Vec::new();

        let mut ctx = ProviderContext {
            model,
            catalog,
            table: &metadata,
            view: &view,
            connection: conn,
            inflector: self.inflector.as_ref(),
            settings: &self.settings,
            ignored_columns: &self.ignored_columns,
        };

        for provider in self.registry.iter() {
            if !provider.applicable(&ctx) {
                continue;
            }
            match catch_unwind(AssertUnwindSafe(|| provider.process(&mut ctx))) {
                Ok(Ok(Some(ProviderResult::Schema(text)))) => {
                    if let Some(previous) = schema_source.replace(provider.name()) {
                        warn!(
                            previous,
                            current = provider.name(),
                            "multiple schema providers; keeping the later one"
                        );
                    }
                    annotation.schema = Some(text);
                }
                Ok(Ok(Some(ProviderResult::Section { title, content }))) => {
                    annotation.sections.push(Section { title, content });
                }
                Ok(Ok(Some(ProviderResult::Notes(notes)))) => {
                    annotation.notes.extend(notes);
                }
                Ok(Ok(None)) => {}
                Ok(Err(source)) => {
                    if self.settings.fail_fast {
                        return Err(PipelineError::Provider {
                            provider: provider.name(),
                            source,
                        });
                    }
                    warn!(provider = provider.name(), error = %source, "content provider failed");
                    failures.push(ProviderFailure {
                        provider: provider.name(),
                        message: error_chain(&source),
                    });
                }
                Err(_) => {
                    if self.settings.fail_fast {
                        return Err(PipelineError::ProviderPanic {
                            provider: provider.name(),
                        });
                    }
                    warn!(provider = provider.name(), "content provider panicked");
                    failures.push(ProviderFailure {
                        provider: provider.name(),
                        message: "provider panicked".to_string(),
                    });
                }
            }
        }

        Ok(PipelineOutcome::Produced {
            annotation,
            provider_failures: failures,
        })
    }
}
