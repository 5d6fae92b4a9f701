use super::Property;
use crate::annotation::AnnotationStore;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityType {
    name: String,
    base: Option<String>,
    properties: IndexMap<String, Property>,
    annotations: AnnotationStore,
}

impl EntityType {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base: None,
            properties: IndexMap::new(),
            annotations: AnnotationStore::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn base(&self) -> Option<&str> {
        self.base.as_deref()
    }

    pub fn set_base(&mut self, base: Option<String>) {
        self.base = base;
    }

    /// Properties declared on this type, not including inherited ones.
    pub fn declared_properties(&self) -> impl Iterator<Item = &Property> {
        self.properties.values()
    }

    pub fn declared_property(&self, name: &str) -> Option<&Property> {
        self.properties.get(name)
    }

    pub fn declared_property_mut(&mut self, name: &str) -> Option<&mut Property> {
        self.properties.get_mut(name)
    }

    /// Adds or replaces a declared property, keeping its original position.
    pub fn add_property(&mut self, property: Property) {
        self.properties.insert(property.name.clone(), property);
    }

    pub fn annotations(&self) -> &AnnotationStore {
        &self.annotations
    }

    pub fn annotations_mut(&mut self) -> &mut AnnotationStore {
        &mut self.annotations
    }

    pub fn table_name(&self) -> Option<&str> {
        self.annotations.table_name()
    }

    /// Column the property maps to; the property name until a convention or
    /// the user says otherwise.
    pub fn column_name<'a>(&'a self, property: &'a str) -> &'a str {
        self.annotations.column_name(property).unwrap_or(property)
    }
}
