//! The annotation pipeline and its content providers.
//!
//! An annotation is assembled from an ordered registry of providers, each
//! contributing one piece: the primary schema dump, an extra section, or a
//! batch of advisory notes. Providers fail independently; one broken
//! provider never takes the block down with it.

pub mod pipeline;
pub mod provider;
pub mod providers;
pub mod registry;
pub mod render;

pub use pipeline::{AnnotationPipeline, PipelineError, PipelineOutcome, ProviderFailure};
pub use provider::{ContentProvider, ProviderContext, ProviderError, ProviderKind, ProviderResult};
pub use registry::ProviderRegistry;

use std::fmt;

use serde::{Deserialize, Serialize};

/// Advisory note codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NoteCode {
    Default,
    Limit,
    NotNull,
    NPlusOne,
    Inverse,
    CounterCache,
    Naming,
    ReadOnly,
    Stale,
}

impl NoteCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            NoteCode::Default => "DEFAULT",
            NoteCode::Limit => "LIMIT",
            NoteCode::NotNull => "NOT_NULL",
            NoteCode::NPlusOne => "N_PLUS_ONE",
            NoteCode::Inverse => "INVERSE",
            NoteCode::CounterCache => "COUNTER_CACHE",
            NoteCode::Naming => "NAMING",
            NoteCode::ReadOnly => "READ_ONLY",
            NoteCode::Stale => "STALE",
        }
    }
}

impl fmt::Display for NoteCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One advisory finding about a model or one of its columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdvisoryNote {
    /// What the note is about: a column, an association, a table.
    pub subject: String,
    pub code: NoteCode,
    pub message: String,
}

impl AdvisoryNote {
    pub fn new(subject: impl Into<String>, code: NoteCode, message: impl Into<String>) -> Self {
        AdvisoryNote {
            subject: subject.into(),
            code,
            message: message.into(),
        }
    }

    /// Compact machine form, `subject:CODE`.
    pub fn compact(&self) -> String {
        format!("{}:{}", self.subject, self.code)
    }
}

impl fmt::Display for AdvisoryNote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{} {}", self.subject, self.code, self.message)
    }
}

/// A titled run of extra content below the schema dump.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub title: Option<String>,
    pub content: String,
}

/// The assembled annotation for one model.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Annotation {
    /// Primary schema text. At most one provider contributes this.
    pub schema: Option<String>,
    pub sections: Vec<Section>,
    pub notes: Vec<AdvisoryNote>,
}

impl Annotation {
    pub fn is_empty(&self) -> bool {
        self.schema.is_none() && self.sections.is_empty() && self.notes.is_empty()
    }

    /// Render the block body: schema dump first, then each section in
    /// arrival order, then the notes, with one blank line between parts.
    pub fn render(&self) -> String {
        let mut parts: Vec<String> = Vec::new();

        if let Some(schema) = &self.schema {
            parts.push(schema.trim_end().to_string());
        }

        for section in &self.sections {
            let mut text = String::new();
            if let Some(title) = &section.title {
                text.push_str("== ");
                text.push_str(title);
                text.push('\n');
            }
            text.push_str(section.content.trim_end());
            parts.push(text);
        }

        if !self.notes.is_empty() {
            let mut text = String::from("== Notes");
            for note in &self.notes {
                text.push_str("\n- ");
                text.push_str(&note.to_string());
            }
            parts.push(text);
        }

        parts.join("\n\n")
    }
}
