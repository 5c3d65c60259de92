//! # Marginalia
//!
//! Schema annotation blocks for model source files, reflected live from
//! the database.
//!
//! ## Architecture
//!
//! Marginalia reads a model manifest, introspects the backing database,
//! and patches a managed comment block into each model file:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │              Manifest + Settings (TOML)                  │
//! │   (models, associations, enums, named connections)       │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [schema]
//! ┌─────────────────────────────────────────────────────────┐
//! │        Dialect Introspection (postgres/mysql/sqlite)     │
//! │        normalized into TableMetadata                     │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [annotate]
//! ┌─────────────────────────────────────────────────────────┐
//! │   Provider Pipeline (schema dump, sections, notes)       │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [block]
//! ┌─────────────────────────────────────────────────────────┐
//! │    Managed comment block in the model source file        │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! The `runner` module drives batches of models through that flow and
//! aggregates the per-model outcomes into a [`report::BatchReport`].

pub mod annotate;
pub mod block;
pub mod config;
pub mod db;
pub mod inflect;
pub mod model;
pub mod report;
pub mod runner;
pub mod schema;

/// Re-exports for convenient usage.
pub mod prelude {
    pub use crate::annotate::{
        Annotation, AnnotationPipeline, ContentProvider, PipelineOutcome, ProviderContext,
        ProviderRegistry, ProviderResult,
    };
    pub use crate::block::{BlockCodec, FilePatcher, Placement};
    pub use crate::config::{AnnotationSettings, Settings};
    pub use crate::db::{ConnectionPool, SchemaConnection};
    pub use crate::model::{ModelCatalog, ModelInfo};
    pub use crate::report::{BatchReport, ModelOutcome};
    pub use crate::runner::BatchRunner;
    pub use crate::schema::{Dialect, QualifiedName, TableMetadata};
}

// Also export at crate root for convenience
pub use config::Settings;
pub use report::BatchReport;
pub use runner::BatchRunner;
