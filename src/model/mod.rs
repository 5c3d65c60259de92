//! Model manifest.
//!
//! Models are declared as data, typically `[[models]]` tables in the
//! config file. The manifest says where the source file lives, which
//! table backs the model, and what the host application knows that the
//! database does not: associations, declared enums, delegated types,
//! inheritance. Whether a model is table- or view-backed is resolved at
//! run time from the database, never from these declarations.

use std::collections::HashMap;
use std::path::PathBuf;

use inflector::Inflector as _;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::inflect::Inflection;
use crate::schema::QualifiedName;

/// Resolved backing kind of a model; comes from the view resolver.
pub use crate::schema::ViewKind as ModelKind;

/// Where the annotation block is placed in the source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnnotationPosition {
    /// Natural top of the file, below any pragma lines.
    Top,
    /// Directly above the class definition.
    Class,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssociationKind {
    BelongsTo,
    HasOne,
    HasMany,
    HasAndBelongsToMany,
}

impl AssociationKind {
    pub fn is_to_many(&self) -> bool {
        matches!(
            self,
            AssociationKind::HasMany | AssociationKind::HasAndBelongsToMany
        )
    }
}

/// One declared association, as the host application sees it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AssociationDescriptor {
    pub kind: AssociationKind,
    pub name: String,
    /// Target model name; absent for polymorphic associations.
    #[serde(default)]
    pub target: Option<String>,
    #[serde(default)]
    pub foreign_key: Option<String>,
    #[serde(default)]
    pub polymorphic: bool,
    #[serde(default)]
    pub inverse_of: Option<String>,
    #[serde(default)]
    pub counter_cache: bool,
    /// Declared result bound for to-many associations.
    #[serde(default)]
    pub limit: Option<u32>,
}

impl AssociationDescriptor {
    pub fn is_to_many(&self) -> bool {
        self.kind.is_to_many()
    }
}

/// A declared enum column and its permitted values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EnumDefinition {
    pub column: String,
    pub values: Vec<String>,
}

/// A delegated-type role and the types allowed to fill it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DelegatedType {
    pub role: String,
    pub types: Vec<String>,
}

/// One model entry from the manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModelInfo {
    pub name: String,
    /// Backing table; derived from the name by convention when absent.
    #[serde(default)]
    pub table: Option<String>,
    /// Source file the annotation block is written to.
    pub file: PathBuf,
    /// Named connection from the settings; the runner falls back to
    /// `primary` when absent.
    #[serde(default)]
    pub connection: Option<String>,
    /// Per-model override of the global annotation position.
    #[serde(default)]
    pub position: Option<AnnotationPosition>,
    /// STI parent model.
    #[serde(default)]
    pub parent: Option<String>,
    #[serde(default)]
    pub inheritance_column: Option<String>,
    #[serde(default)]
    pub associations: Vec<AssociationDescriptor>,
    #[serde(default)]
    pub enums: Vec<EnumDefinition>,
    #[serde(default)]
    pub delegated_types: Vec<DelegatedType>,
}

impl ModelInfo {
    /// Backing table name. `Admin::User` falls back to `users`, matching
    /// host-framework convention for namespaced models.
    pub fn table_name(&self, inflector: &dyn Inflection) -> QualifiedName {
        match &self.table {
            Some(table) => QualifiedName::parse(table),
            None => {
                let base = self.name.rsplit("::").next().unwrap_or(&self.name);
                QualifiedName::parse(&inflector.pluralize(&base.to_snake_case()))
            }
        }
    }
}

/// Insertion-ordered model collection with name lookup.
///
/// Iteration order is manifest order, which fixes batch output order.
#[derive(Debug, Clone, Default)]
pub struct ModelCatalog {
    models: Vec<ModelInfo>,
    by_name: HashMap<String, usize>,
}

impl ModelCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_models(models: Vec<ModelInfo>) -> Self {
        let mut catalog = Self::new();
        for model in models {
            catalog.insert(model);
        }
        catalog
    }

    /// Add a model. A re-declared name replaces the earlier entry in
    /// place, keeping its manifest position.
    pub fn insert(&mut self, model: ModelInfo) {
        match self.by_name.get(&model.name) {
            Some(&idx) => {
                warn!(model = %model.name, "duplicate model entry replaces the earlier one");
                self.models[idx] = model;
            }
            None => {
                self.by_name.insert(model.name.clone(), self.models.len());
                self.models.push(model);
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&ModelInfo> {
        self.by_name.get(name).map(|&idx| &self.models[idx])
    }

    pub fn iter(&self) -> impl Iterator<Item = &ModelInfo> {
        self.models.iter()
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inflect::ConventionInflector;

    fn model(name: &str) -> ModelInfo {
        ModelInfo {
            name: name.to_string(),
            table: None,
            file: PathBuf::from(format!("app/models/{}.rb", name.to_lowercase())),
            connection: None,
            position: None,
            parent: None,
            inheritance_column: None,
            associations: Vec::new(),
            enums: Vec::new(),
            delegated_types: Vec::new(),
        }
    }

    #[test]
    fn test_table_name_derived_by_convention() {
        let inflector = ConventionInflector;
        assert_eq!(model("User").table_name(&inflector).qualified(), "users");
        assert_eq!(
            model("BlogPost").table_name(&inflector).qualified(),
            "blog_posts"
        );
        assert_eq!(
            model("Admin::User").table_name(&inflector).qualified(),
            "users"
        );
    }

    #[test]
    fn test_explicit_table_wins_and_keeps_qualifier() {
        let inflector = ConventionInflector;
        let mut entry = model("AuditLog");
        entry.table = Some("audit.audit_logs".to_string());
        let table = entry.table_name(&inflector);
        assert_eq!(table.schema(), Some("audit"));
        assert_eq!(table.bare_name(), "audit_logs");
    }

    #[test]
    fn test_manifest_toml_round_trip() {
        let raw = r#"
            name = "Order"
            table = "orders"
            file = "app/models/order.rb"

            [[associations]]
            kind = "has_many"
            name = "items"
            target = "OrderItem"
            inverse_of = "order"

            [[enums]]
            column = "status"
            values = ["pending", "paid", "shipped"]
        "#;
        let parsed: ModelInfo = toml::from_str(raw).unwrap();
        assert_eq!(parsed.name, "Order");
        assert_eq!(parsed.associations.len(), 1);
        assert_eq!(parsed.associations[0].kind, AssociationKind::HasMany);
        assert!(parsed.associations[0].is_to_many());
        assert_eq!(parsed.enums[0].values.len(), 3);
    }

    #[test]
    fn test_manifest_rejects_unknown_fields() {
        let raw = r#"
            name = "Order"
            file = "app/models/order.rb"
            tabel = "orders"
        "#;
        assert!(toml::from_str::<ModelInfo>(raw).is_err());
    }

    #[test]
    fn test_catalog_preserves_insertion_order() {
        let catalog =
            ModelCatalog::from_models(vec![model("Zebra"), model("Apple"), model("Mango")]);
        let names: Vec<&str> = catalog.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, ["Zebra", "Apple", "Mango"]);
        assert!(catalog.get("Apple").is_some());
        assert!(catalog.get("Missing").is_none());
    }

    #[test]
    fn test_duplicate_name_replaces_in_place() {
        let mut catalog = ModelCatalog::from_models(vec![model("User"), model("Post")]);
        let mut replacement = model("User");
        replacement.table = Some("accounts".to_string());
        catalog.insert(replacement);

        assert_eq!(catalog.len(), 2);
        let names: Vec<&str> = catalog.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, ["User", "Post"]);
        assert_eq!(
            catalog.get("User").and_then(|m| m.table.as_deref()),
            Some("accounts")
        );
    }
}
