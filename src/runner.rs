//! Batch commands over the model manifest.
//!
//! A runner owns the resolved settings for one invocation. It filters
//! the manifest, builds one connection pool per settings label, fans the
//! surviving models out across scoped worker threads, and merges the
//! per-model outcomes back into manifest order. Failures stay scoped to
//! the model that hit them.

use std::collections::HashMap;
use std::sync::Mutex;

use tracing::{debug, info, warn};

use crate::annotate::{AnnotationPipeline, PipelineOutcome, ProviderRegistry};
use crate::block::{BlockCodec, FilePatcher, Placement};
use crate::config::{Settings, SettingsError};
use crate::db::ConnectionPool;
use crate::model::{AnnotationPosition, ModelCatalog, ModelInfo};
use crate::report::{error_chain, BatchReport, ModelOutcome, ModelRun};

/// Whether a command writes files or only reports what it would do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriteMode {
    Apply,
    Preview,
}

/// Runs one batch command against every selected model.
pub struct BatchRunner {
    settings: Settings,
    catalog: ModelCatalog,
    only: Vec<String>,
    jobs: usize,
}

impl BatchRunner {
    pub fn new(settings: Settings) -> Self {
        let catalog = settings.model_catalog();
        let jobs = settings.annotation.jobs.max(1);
        BatchRunner {
            settings,
            catalog,
            only: Vec::new(),
            jobs,
        }
    }

    /// Restrict the run to the named models. An explicit selection also
    /// bypasses the `ignore_models` patterns.
    pub fn only_models(mut self, names: Vec<String>) -> Self {
        self.only = names;
        self
    }

    /// Override the configured worker count.
    pub fn jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs.max(1);
        self
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Annotate every selected model file.
    pub fn annotate_all(&self) -> Result<BatchReport, SettingsError> {
        self.run_with_pipeline(WriteMode::Apply)
    }

    /// Dry run: report which files would change, writing nothing.
    pub fn check_all(&self) -> Result<BatchReport, SettingsError> {
        self.run_with_pipeline(WriteMode::Preview)
    }

    /// Strip the annotation block from every selected model file.
    ///
    /// Purely file-level; no database connection is opened.
    pub fn remove_all(&self) -> Result<BatchReport, SettingsError> {
        let models = self.selected_models()?;
        let patcher = FilePatcher::new(BlockCodec::from_settings(&self.settings.annotation));

        let runs = self.run_partitioned(&models, |model| {
            let outcome = match patcher.remove(&model.file) {
                Ok(true) => ModelOutcome::Removed,
                Ok(false) => ModelOutcome::Unchanged,
                Err(err) => ModelOutcome::Failed {
                    message: error_chain(&err),
                },
            };
            finished_run(model, outcome, Vec::new())
        });

        let mut report = BatchReport::new();
        for run in runs {
            report.record(run);
        }
        info!(summary = %report.summary(), "remove finished");
        Ok(report)
    }

    fn run_with_pipeline(&self, mode: WriteMode) -> Result<BatchReport, SettingsError> {
        let models = self.selected_models()?;
        let pools = self.build_pools(&models)?;
        let pipeline = AnnotationPipeline::new(
            self.settings.annotation.clone(),
            ProviderRegistry::with_defaults(&self.settings.annotation),
        )?;
        let patcher = FilePatcher::new(BlockCodec::from_settings(&self.settings.annotation));

        let runs = self.run_partitioned(&models, |model| {
            self.annotate_one(&pipeline, &patcher, &pools, model, mode)
        });

        let mut report = BatchReport::new();
        for run in runs {
            report.record(run);
        }
        report.introspection_failures = pipeline.reporter().drain();
        info!(summary = %report.summary(), "batch finished");
        Ok(report)
    }

    /// One model end to end: pipeline, render, patch.
    fn annotate_one(
        &self,
        pipeline: &AnnotationPipeline,
        patcher: &FilePatcher,
        pools: &HashMap<String, ConnectionPool>,
        model: &ModelInfo,
        mode: WriteMode,
    ) -> ModelRun {
        let label = self.settings.connection_label(model);
        let Some(pool) = pools.get(label) else {
            let outcome = ModelOutcome::Failed {
                message: format!("connection '{}' is not configured", label),
            };
            return finished_run(model, outcome, Vec::new());
        };

        let (annotation, failures) = match pipeline.process(model, &self.catalog, pool) {
            Ok(PipelineOutcome::Produced {
                annotation,
                provider_failures,
            }) => {
                let formatted = provider_failures
                    .iter()
                    .map(|failure| format!("{}: {}", failure.provider, failure.message))
                    .collect();
                (annotation, formatted)
            }
            Ok(PipelineOutcome::Skipped { reason }) => {
                return finished_run(model, ModelOutcome::Skipped { reason }, Vec::new());
            }
            Err(err) => {
                let outcome = ModelOutcome::Failed {
                    message: error_chain(&err),
                };
                return finished_run(model, outcome, Vec::new());
            }
        };

        if annotation.is_empty() {
            let outcome = ModelOutcome::Skipped {
                reason: "nothing to annotate".to_string(),
            };
            return finished_run(model, outcome, failures);
        }

        let body = annotation.render();
        let position = model.position.unwrap_or(self.settings.annotation.position);
        let placement = match position {
            AnnotationPosition::Top => Placement::Top,
            AnnotationPosition::Class => Placement::ClassDefinition(&model.name),
        };

        let outcome = match mode {
            WriteMode::Apply => match patcher.insert(&model.file, placement, &body) {
                Ok(true) => ModelOutcome::Annotated,
                Ok(false) => ModelOutcome::Unchanged,
                Err(err) => ModelOutcome::Failed {
                    message: error_chain(&err),
                },
            },
            WriteMode::Preview => match patcher.preview_insert(&model.file, placement, &body) {
                Ok((_, true)) => ModelOutcome::WouldChange,
                Ok((_, false)) => ModelOutcome::Unchanged,
                Err(err) => ModelOutcome::Failed {
                    message: error_chain(&err),
                },
            },
        };
        debug!(model = %model.name, outcome = outcome.label(), "model finished");
        finished_run(model, outcome, failures)
    }

    /// The manifest entries this run covers, in manifest order.
    fn selected_models(&self) -> Result<Vec<&ModelInfo>, SettingsError> {
        let ignored = self.settings.annotation.ignored_model_patterns()?;

        for name in &self.only {
            if self.catalog.get(name).is_none() {
                warn!(model = %name, "no manifest entry with this name");
            }
        }

        let selected = self
            .catalog
            .iter()
            .filter(|model| {
                if self.only.is_empty() {
                    !ignored.iter().any(|pattern| pattern.is_match(&model.name))
                } else {
                    self.only.iter().any(|only| only == &model.name)
                }
            })
            .collect();
        Ok(selected)
    }

    /// One pool per connection label the selected models reference.
    ///
    /// A model naming an unknown label is a configuration error and
    /// fails the whole command before anything runs.
    fn build_pools(
        &self,
        models: &[&ModelInfo],
    ) -> Result<HashMap<String, ConnectionPool>, SettingsError> {
        let mut pools = HashMap::new();
        for model in models {
            let label = self.settings.connection_label(model);
            if pools.contains_key(label) {
                continue;
            }
            let connection = self.settings.get_connection(label)?;
            let url = connection.resolved_url()?;
            pools.insert(
                label.to_string(),
                ConnectionPool::for_database(label, &connection.adapter, &url),
            );
        }
        Ok(pools)
    }

    /// Partition the models across scoped worker threads and collect the
    /// runs back into manifest order.
    fn run_partitioned<F>(&self, models: &[&ModelInfo], work: F) -> Vec<ModelRun>
    where
        F: Fn(&ModelInfo) -> ModelRun + Sync,
    {
        if models.is_empty() {
            return Vec::new();
        }

        let indexed: Vec<(usize, &ModelInfo)> = models.iter().copied().enumerate().collect();
        let jobs = self.jobs.clamp(1, indexed.len());
        let chunk_size = indexed.len().div_ceil(jobs);

        let results = Mutex::new(Vec::with_capacity(indexed.len()));
        std::thread::scope(|scope| {
            let work = &work;
            let results = &results;
            for chunk in indexed.chunks(chunk_size) {
                scope.spawn(move || {
                    for &(index, model) in chunk {
                        let run = work(model);
                        let mut collected = match results.lock() {
                            Ok(guard) => guard,
                            Err(poisoned) => poisoned.into_inner(),
                        };
                        collected.push((index, run));
                    }
                });
            }
        });

        let mut collected = match results.into_inner() {
            Ok(runs) => runs,
            Err(poisoned) => poisoned.into_inner(),
        };
        collected.sort_by_key(|&(index, _)| index);
        collected.into_iter().map(|(_, run)| run).collect()
    }
}

fn finished_run(model: &ModelInfo, outcome: ModelOutcome, failures: Vec<String>) -> ModelRun {
    ModelRun {
        model: model.name.clone(),
        file: model.file.clone(),
        outcome,
        provider_failures: failures,
    }
}
