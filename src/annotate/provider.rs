//! The content provider contract.
//!
//! Providers are the extension seam of the pipeline: each one inspects the
//! reflected metadata (or runs an extra catalog query) and contributes one
//! [`ProviderResult`]. A provider that errors or panics costs only its own
//! contribution.

use regex::Regex;

use crate::config::AnnotationSettings;
use crate::db::{DatabaseError, SchemaConnection};
use crate::inflect::Inflection;
use crate::model::{ModelCatalog, ModelInfo};
use crate::schema::{ColumnMetadata, Dialect, TableMetadata, ViewDescriptor};

use super::AdvisoryNote;

/// What shape of content a provider yields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    Schema,
    Section,
    Notes,
}

/// One provider's contribution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderResult {
    /// The primary schema block text.
    Schema(String),
    /// An extra titled section below the schema.
    Section {
        title: Option<String>,
        content: String,
    },
    /// Advisory notes, appended to the notes list.
    Notes(Vec<AdvisoryNote>),
}

/// A provider failure. Never halts the pipeline unless fail-fast is on.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("catalog lookup failed")]
    Database(#[from] DatabaseError),

    #[error("{0}")]
    Failed(String),
}

impl ProviderError {
    pub fn failed(message: impl Into<String>) -> Self {
        ProviderError::Failed(message.into())
    }
}

/// Everything a provider may look at for one model run.
///
/// The connection is the single pooled checkout for the run; providers that
/// need an extra catalog query borrow it through here.
pub struct ProviderContext<'a> {
    pub model: &'a ModelInfo,
    pub catalog: &'a ModelCatalog,
    pub table: &'a TableMetadata,
    pub view: &'a ViewDescriptor,
    pub connection: &'a mut dyn SchemaConnection,
    pub inflector: &'a dyn Inflection,
    pub settings: &'a AnnotationSettings,
    pub(crate) ignored_columns: &'a [Regex],
}

impl ProviderContext<'_> {
    pub fn dialect(&self) -> Dialect {
        self.table.dialect
    }

    /// Whether settings exclude this column from output.
    pub fn column_ignored(&self, name: &str) -> bool {
        self.ignored_columns.iter().any(|re| re.is_match(name))
    }

    /// The table's columns with the ignored ones filtered out.
    pub fn visible_columns(&self) -> Vec<ColumnMetadata> {
        self.table
            .columns
            .iter()
            .filter(|column| !self.column_ignored(&column.name))
            .cloned()
            .collect()
    }
}

/// One content provider in the registry.
pub trait ContentProvider: Send + Sync {
    /// Short stable name, used in logs and failure reports.
    fn name(&self) -> &'static str;

    fn kind(&self) -> ProviderKind;

    /// Whether this provider has anything to say for the model.
    fn applicable(&self, _ctx: &ProviderContext<'_>) -> bool {
        true
    }

    /// Produce content. `Ok(None)` means nothing to contribute.
    fn process(
        &self,
        ctx: &mut ProviderContext<'_>,
    ) -> Result<Option<ProviderResult>, ProviderError>;
}
