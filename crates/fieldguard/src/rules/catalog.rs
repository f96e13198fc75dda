//! Entity metadata for rule validation.
//!
//! Rule definitions name an entity type and a field. The [`EntityCatalog`]
//! capability tells the validator whether that type is a known record type and
//! which fields it has.

use std::collections::{HashMap, HashSet};

/// Field metadata of one record type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityDescriptor {
    /// Entity type name.
    pub entity_type: String,

    /// Primary-key attribute name.
    pub key_name: String,

    /// Mass-assignable attributes.
    pub fillable: Vec<String>,

    /// Mass-assignment-protected attributes.
    pub guarded: Vec<String>,

    /// Storage columns, when schema introspection is available.
    pub columns: Option<Vec<String>>,
}

impl EntityDescriptor {
    /// Creates a descriptor with key `id` and no known fields.
    #[must_use]
    pub fn new(entity_type: impl Into<String>) -> Self {
        Self {
            entity_type: entity_type.into(),
            key_name: "id".to_string(),
            fillable: Vec::new(),
            guarded: Vec::new(),
            columns: None,
        }
    }

    /// Sets the primary-key attribute name.
    #[must_use]
    pub fn with_key_name(mut self, key_name: impl Into<String>) -> Self {
        self.key_name = key_name.into();
        self
    }

    /// Sets the fillable attributes.
    #[must_use]
    pub fn with_fillable<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fillable = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the guarded attributes.
    #[must_use]
    pub fn with_guarded<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.guarded = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the storage columns.
    #[must_use]
    pub fn with_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns = Some(columns.into_iter().map(Into::into).collect());
        self
    }

    /// Whether `field` is a storage column; `None` without schema information.
    #[must_use]
    pub fn has_column(&self, field: &str) -> Option<bool> {
        self.columns
            .as_ref()
            .map(|columns| columns.iter().any(|c| c == field))
    }

    /// Whether `field` is fillable, guarded, or the primary key.
    #[must_use]
    pub fn declares(&self, field: &str) -> bool {
        self.fillable.iter().any(|f| f == field)
            || self.guarded.iter().any(|f| f == field)
            || self.key_name == field
    }
}

/// Result of looking up an entity type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntityLookup {
    /// A record type with its metadata.
    Record(EntityDescriptor),
    /// The name exists but is not a record type.
    NotARecord,
    /// Nothing is known under the name.
    Unknown,
}

/// Entity metadata provider.
pub trait EntityCatalog: Send + Sync {
    /// Looks up `entity_type`.
    fn lookup(&self, entity_type: &str) -> EntityLookup;
}

/// A static entity catalog.
#[derive(Debug, Clone, Default)]
pub struct EntityRegistry {
    records: HashMap<String, EntityDescriptor>,
    others: HashSet<String>,
}

impl EntityRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a record type.
    #[must_use]
    pub fn with_entity(mut self, descriptor: EntityDescriptor) -> Self {
        self.others.remove(&descriptor.entity_type);
        self.records
            .insert(descriptor.entity_type.clone(), descriptor);
        self
    }

    /// Registers a known name that is not a record type.
    #[must_use]
    pub fn with_non_record(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.records.remove(&name);
        self.others.insert(name);
        self
    }
}

impl EntityCatalog for EntityRegistry {
    fn lookup(&self, entity_type: &str) -> EntityLookup {
        if let Some(descriptor) = self.records.get(entity_type) {
            EntityLookup::Record(descriptor.clone())
        } else if self.others.contains(entity_type) {
            EntityLookup::NotARecord
        } else {
            EntityLookup::Unknown
        }
    }
}
