//! Configuration module for Marginalia.
//!
//! Handles annotation settings, named connections, and the model manifest.

mod settings;

pub use settings::{
    expand_env_vars, AnnotationSettings, ConnectionSettings, Settings, SettingsError,
};
