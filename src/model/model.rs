use super::{EntityType, Property, Relationship};
use crate::columns::ColumnCatalog;
use crate::core::{ModelError, Result};
use crate::grouping::TableGrouping;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// The mutable model owned by the builder and threaded through finalization.
///
/// Entity types keep their declaration order; every derived structure
/// (table groups, column definitions) is computed from that order so that
/// identical input always finalizes to identical output.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Model {
    entities: IndexMap<String, EntityType>,
    relationships: Vec<Relationship>,
    #[serde(default)]
    grouping: TableGrouping,
    #[serde(default)]
    columns: ColumnCatalog,
}

impl Model {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the entity type, declaring it first if needed.
    pub fn entity_or_insert(&mut self, name: &str) -> &mut EntityType {
        self.entities
            .entry(name.to_string())
            .or_insert_with(|| EntityType::new(name))
    }

    pub fn entity(&self, name: &str) -> Result<&EntityType> {
        self.entities
            .get(name)
            .ok_or_else(|| ModelError::EntityTypeNotFound(name.to_string()))
    }

    pub fn entity_mut(&mut self, name: &str) -> Result<&mut EntityType> {
        self.entities
            .get_mut(name)
            .ok_or_else(|| ModelError::EntityTypeNotFound(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entities.contains_key(name)
    }

    pub fn entities(&self) -> impl Iterator<Item = &EntityType> {
        self.entities.values()
    }

    /// Owned names in declaration order, for passes that mutate while iterating.
    pub fn entity_names(&self) -> Vec<String> {
        self.entities.keys().cloned().collect()
    }

    pub fn declaration_index(&self, name: &str) -> Option<usize> {
        self.entities.get_index_of(name)
    }

    pub fn relationships(&self) -> &[Relationship] {
        &self.relationships
    }

    pub fn add_relationship(&mut self, relationship: Relationship) -> &mut Relationship {
        self.relationships.push(relationship);
        let last = self.relationships.len() - 1;
        &mut self.relationships[last]
    }

    pub fn grouping(&self) -> &TableGrouping {
        &self.grouping
    }

    pub fn set_grouping(&mut self, grouping: TableGrouping) {
        self.grouping = grouping;
    }

    pub fn columns(&self) -> &ColumnCatalog {
        &self.columns
    }

    pub fn set_columns(&mut self, columns: ColumnCatalog) {
        self.columns = columns;
    }

    //
    // hierarchy
    //

    /// Entity types from the root down to `name`, inclusive.
    pub fn ancestry(&self, name: &str) -> Result<Vec<&EntityType>> {
        let mut chain = Vec::new();
        let mut current = self.entity(name)?;

        loop {
            if chain.len() > self.entities.len() {
                return Err(ModelError::ConfigurationConflict(format!(
                    "Entity type '{}' has a cyclic base type chain",
                    name
                )));
            }
            chain.push(current);
            match current.base() {
                Some(base) => current = self.entity(base)?,
                None => break,
            }
        }

        chain.reverse();
        Ok(chain)
    }

    pub fn root_of(&self, name: &str) -> Result<&str> {
        let ancestry = self.ancestry(name)?;
        Ok(ancestry[0].name())
    }

    pub fn is_root(&self, name: &str) -> Result<bool> {
        Ok(self.entity(name)?.base().is_none())
    }

    /// Every non-root type whose hierarchy root is `root`, in declaration order.
    pub fn derived_types(&self, root: &str) -> Result<Vec<&str>> {
        let mut derived = Vec::new();
        for entity in self.entities.values() {
            if entity.name() != root && self.root_of(entity.name())? == root {
                derived.push(entity.name());
            }
        }
        Ok(derived)
    }

    /// Own and inherited properties, root-first, paired with their declaring type.
    pub fn properties_of(&self, name: &str) -> Result<Vec<(&EntityType, &Property)>> {
        Ok(self
            .ancestry(name)?
            .into_iter()
            .flat_map(|declaring| {
                declaring
                    .declared_properties()
                    .map(move |property| (declaring, property))
            })
            .collect())
    }

    pub fn find_property(&self, entity: &str, property: &str) -> Result<Option<(&EntityType, &Property)>> {
        Ok(self
            .ancestry(entity)?
            .into_iter()
            .rev()
            .find_map(|declaring| {
                declaring
                    .declared_property(property)
                    .map(|found| (declaring, found))
            }))
    }

    /// The property as stored on whichever type declares it.
    pub fn property_mut(&mut self, entity: &str, property: &str) -> Result<&mut Property> {
        let declaring = self
            .find_property(entity, property)?
            .map(|(declaring, _)| declaring.name().to_string())
            .ok_or_else(|| ModelError::PropertyNotFound(property.to_string(), entity.to_string()))?;

        self.entity_mut(&declaring)?
            .declared_property_mut(property)
            .ok_or_else(|| ModelError::PropertyNotFound(property.to_string(), declaring))
    }

    /// Column a property maps to, honoring renames on the declaring type.
    pub fn column_of(&self, entity: &str, property: &str) -> Result<String> {
        let (declaring, found) = self
            .find_property(entity, property)?
            .ok_or_else(|| ModelError::PropertyNotFound(property.to_string(), entity.to_string()))?;
        Ok(declaring.column_name(&found.name).to_string())
    }

    pub fn key_properties(&self, name: &str) -> Result<Vec<&Property>> {
        Ok(self
            .properties_of(name)?
            .into_iter()
            .filter(|(_, property)| property.key)
            .map(|(_, property)| property)
            .collect())
    }

    pub fn table_of(&self, name: &str) -> Option<&str> {
        self.entities.get(name).and_then(EntityType::table_name)
    }

    /// Foreign-key properties of a relationship, defaulting to the dependent's key.
    pub fn foreign_key_of(&self, relationship: &Relationship) -> Result<Vec<String>> {
        if !relationship.foreign_key.is_empty() {
            return Ok(relationship.foreign_key.clone());
        }
        Ok(self
            .key_properties(&relationship.dependent)?
            .into_iter()
            .map(|property| property.name.clone())
            .collect())
    }

    /// Checks references between declarations: base types, relationship ends
    /// and foreign-key properties.
    pub fn validate_structure(&self) -> Result<()> {
        for entity in self.entities.values() {
            if let Some(base) = entity.base() {
                if base == entity.name() {
                    return Err(ModelError::ConfigurationConflict(format!(
                        "Entity type '{}' cannot be its own base type",
                        entity.name()
                    )));
                }
                self.entity(base)?;
            }
            self.ancestry(entity.name())?;

            let mut seen = std::collections::HashSet::new();
            for (_, property) in self.properties_of(entity.name())? {
                if !seen.insert(property.name.as_str()) {
                    return Err(ModelError::ConfigurationConflict(format!(
                        "Entity type '{}': property '{}' is declared more than once in its hierarchy",
                        entity.name(),
                        property.name
                    )));
                }
            }
        }

        for relationship in &self.relationships {
            self.entity(&relationship.principal)?;
            self.entity(&relationship.dependent)?;

            let foreign_key = self.foreign_key_of(relationship)?;
            if foreign_key.is_empty() {
                return Err(ModelError::InvalidDeclaration(format!(
                    "Relationship '{}' -> '{}' has no foreign key and '{}' declares no key",
                    relationship.dependent, relationship.principal, relationship.dependent
                )));
            }
            for property in &foreign_key {
                if self.find_property(&relationship.dependent, property)?.is_none() {
                    return Err(ModelError::PropertyNotFound(
                        property.clone(),
                        relationship.dependent.clone(),
                    ));
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vehicles() -> Model {
        let mut model = Model::new();
        model
            .entity_or_insert("Vehicle")
            .add_property(Property::new("Id").key());
        let engine = model.entity_or_insert("Engine");
        engine.set_base(Some("Vehicle".into()));
        engine.add_property(Property::new("Horsepower").required());
        let turbo = model.entity_or_insert("TurboEngine");
        turbo.set_base(Some("Engine".into()));
        model
    }

    #[test]
    fn test_root_and_ancestry() {
        let model = vehicles();
        assert_eq!(model.root_of("TurboEngine").unwrap(), "Vehicle");
        let names: Vec<_> = model
            .ancestry("TurboEngine")
            .unwrap()
            .iter()
            .map(|e| e.name())
            .collect();
        assert_eq!(names, vec!["Vehicle", "Engine", "TurboEngine"]);
        assert_eq!(model.derived_types("Vehicle").unwrap(), vec!["Engine", "TurboEngine"]);
    }

    #[test]
    fn test_inherited_properties_and_keys() {
        let model = vehicles();
        let names: Vec<_> = model
            .properties_of("TurboEngine")
            .unwrap()
            .iter()
            .map(|(declaring, p)| (declaring.name(), p.name.as_str()))
            .collect();
        assert_eq!(names, vec![("Vehicle", "Id"), ("Engine", "Horsepower")]);
        assert_eq!(model.key_properties("Engine").unwrap()[0].name, "Id");
        assert_eq!(model.column_of("TurboEngine", "Id").unwrap(), "Id");
    }

    #[test]
    fn test_property_mut_edits_declaring_type() {
        let mut model = vehicles();
        model.property_mut("TurboEngine", "Id").unwrap().concurrency_token = true;
        assert!(model.entity("Vehicle").unwrap().declared_property("Id").unwrap().concurrency_token);
    }

    #[test]
    fn test_cyclic_base_is_rejected() {
        let mut model = Model::new();
        model.entity_or_insert("A").set_base(Some("B".into()));
        model.entity_or_insert("B").set_base(Some("A".into()));
        assert!(matches!(
            model.validate_structure(),
            Err(ModelError::ConfigurationConflict(_))
        ));
    }

    #[test]
    fn test_unknown_base_is_rejected() {
        let mut model = Model::new();
        model.entity_or_insert("A").set_base(Some("Missing".into()));
        assert_eq!(
            model.validate_structure(),
            Err(ModelError::EntityTypeNotFound("Missing".into()))
        );
    }

    #[test]
    fn test_foreign_key_must_exist() {
        let mut model = vehicles();
        model.entity_or_insert("Driver").add_property(Property::new("Id").key());
        model.add_relationship(Relationship::many_to_one("Driver", "Vehicle", &["VehicleId"]));
        assert_eq!(
            model.validate_structure(),
            Err(ModelError::PropertyNotFound("VehicleId".into(), "Driver".into()))
        );
    }
}
