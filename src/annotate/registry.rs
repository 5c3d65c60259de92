//! The ordered provider registry.
//!
//! Registration is explicit; there is no global registry. Tests build a
//! registry with exactly the providers under test.

use crate::config::AnnotationSettings;

use super::provider::ContentProvider;
use super::providers::{
    CheckConstraintsProvider, CompositeKeysProvider, DelegatedTypesProvider, EnumsProvider,
    ExtensionsProvider, GeneratedColumnsProvider, InheritanceProvider, SchemaDumpProvider,
    TableNotesProvider, ViewInfoProvider, ViewNotesProvider,
};

pub struct ProviderRegistry {
    providers: Vec<Box<dyn ContentProvider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        ProviderRegistry {
            providers: Vec::new(),
        }
    }

    /// The standard lineup in its fixed order. Notes providers run last.
    pub fn with_defaults(settings: &AnnotationSettings) -> Self {
        let mut registry = ProviderRegistry::new();
        registry.register(Box::new(SchemaDumpProvider));
        registry.register(Box::new(ExtensionsProvider));
        registry.register(Box::new(ViewInfoProvider));
        registry.register(Box::new(InheritanceProvider));
        registry.register(Box::new(EnumsProvider));
        registry.register(Box::new(DelegatedTypesProvider));
        registry.register(Box::new(CompositeKeysProvider));
        if settings.show_check_constraints {
            registry.register(Box::new(CheckConstraintsProvider));
        }
        registry.register(Box::new(GeneratedColumnsProvider));
        if settings.show_notes {
            registry.register(Box::new(TableNotesProvider));
            registry.register(Box::new(ViewNotesProvider));
        }
        registry
    }

    /// Append a provider. Order of registration is order of execution.
    pub fn register(&mut self, provider: Box<dyn ContentProvider>) {
        self.providers.push(provider);
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn ContentProvider> {
        self.providers.iter().map(|provider| &**provider)
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}
