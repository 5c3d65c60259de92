//! The standard content providers.

mod constraints;
mod extensions;
mod notes;
mod schema_dump;
mod structure;
mod view_info;

pub use constraints::{CheckConstraintsProvider, GeneratedColumnsProvider};
pub use extensions::ExtensionsProvider;
pub use notes::{TableNotesProvider, ViewNotesProvider};
pub use schema_dump::SchemaDumpProvider;
pub use structure::{
    CompositeKeysProvider, DelegatedTypesProvider, EnumsProvider, InheritanceProvider,
};
pub use view_info::ViewInfoProvider;
