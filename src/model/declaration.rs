use super::{FinalizedModel, ModelBuilder, Property, Relationship};
use crate::annotation::{AnnotationKey, AnnotationValue};
use crate::config::FinalizeConfig;
use crate::core::{ConfigurationSource, ModelError, Result};
use crate::temporal::TemporalTableDescriptor;
use indexmap::IndexMap;
use log::debug;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// A model written down as JSON.
///
/// ```json
/// {
///   "entities": [
///     { "name": "Vehicle", "table": "Vehicles", "temporal": {},
///       "properties": [{ "name": "Id", "key": true, "nullable": false }] },
///     { "name": "Engine", "base": "Vehicle" }
///   ]
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModelDeclaration {
    pub entities: Vec<EntityDeclaration>,
    #[serde(default)]
    pub relationships: Vec<Relationship>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EntityDeclaration {
    pub name: String,
    #[serde(default)]
    pub base: Option<String>,
    #[serde(default)]
    pub table: Option<String>,
    #[serde(default)]
    pub properties: Vec<Property>,
    /// Property name to column name.
    #[serde(default)]
    pub columns: IndexMap<String, String>,
    #[serde(default)]
    pub temporal: Option<TemporalDeclaration>,
    #[serde(default)]
    pub memory_optimized: Option<bool>,
    /// Source recorded for every annotation of this entity.
    #[serde(default)]
    pub source: ConfigurationSource,
}

/// `{}` marks the entity temporal with the default period properties.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TemporalDeclaration {
    #[serde(default)]
    pub period_start: Option<String>,
    #[serde(default)]
    pub period_end: Option<String>,
    #[serde(default)]
    pub history_table: Option<String>,
}

impl TemporalDeclaration {
    fn to_annotation(&self, entity: &str) -> Result<AnnotationValue> {
        match (&self.period_start, &self.period_end, &self.history_table) {
            (None, None, None) => Ok(AnnotationValue::TemporalMarker),
            (Some(start), Some(end), history_table) => Ok(AnnotationValue::Temporal(
                TemporalTableDescriptor::transient(start, end, history_table.clone()),
            )),
            _ => Err(ModelError::InvalidDeclaration(format!(
                "Entity type '{}': temporal declaration needs both period_start and period_end, or neither",
                entity
            ))),
        }
    }
}

impl ModelDeclaration {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path)?;
        debug!("loaded model declaration from {}", path.display());
        Self::from_json(&json)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Replays the declaration onto a fresh builder. Entities are declared
    /// in order, relationships after all entities.
    pub fn into_builder(self, config: FinalizeConfig) -> Result<ModelBuilder> {
        let mut builder = ModelBuilder::with_config(config);

        for declaration in self.entities {
            if builder.model().contains(&declaration.name) {
                return Err(ModelError::InvalidDeclaration(format!(
                    "Entity type '{}' is declared more than once",
                    declaration.name
                )));
            }
            declare_entity(&mut builder, declaration)?;
        }

        for relationship in self.relationships {
            builder.relationship(relationship);
        }

        Ok(builder)
    }

    pub fn finalize(self, config: FinalizeConfig) -> Result<FinalizedModel> {
        self.into_builder(config)?.finalize()
    }
}

fn declare_entity(builder: &mut ModelBuilder, declaration: EntityDeclaration) -> Result<()> {
    let EntityDeclaration {
        name,
        base,
        table,
        properties,
        columns,
        temporal,
        memory_optimized,
        source,
    } = declaration;

    let mut entity = builder.entity(&name);
    if let Some(base) = &base {
        entity.has_base_type(base);
    }
    for property in properties {
        entity.property(property);
    }

    let mut annotations = Vec::new();
    if let Some(table) = table {
        annotations.push((AnnotationKey::TableName, AnnotationValue::Text(table)));
    }
    for (property, column) in columns {
        annotations.push((AnnotationKey::ColumnName(property), AnnotationValue::Text(column)));
    }
    if let Some(temporal) = &temporal {
        annotations.push((AnnotationKey::Temporal, temporal.to_annotation(&name)?));
    }
    if let Some(flag) = memory_optimized {
        annotations.push((AnnotationKey::MemoryOptimized, AnnotationValue::Flag(flag)));
    }

    for (key, value) in annotations {
        if !entity.has_annotation(key.clone(), value, source) {
            return Err(ModelError::InvalidDeclaration(format!(
                "Entity type '{}': {} was rejected",
                name, key
            )));
        }
    }

    let declared = builder.model().entity(&name)?;
    for (key, _) in declared.annotations().iter() {
        if let AnnotationKey::ColumnName(property) = key
            && declared.declared_property(property).is_none()
        {
            return Err(ModelError::PropertyNotFound(property.clone(), name));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const FLEET: &str = r#"{
        "entities": [
            {
                "name": "Vehicle",
                "table": "Vehicles",
                "temporal": {},
                "properties": [
                    { "name": "Id", "key": true, "nullable": false },
                    { "name": "Name", "nullable": false }
                ],
                "columns": { "Name": "vehicle_name" }
            },
            { "name": "Engine", "base": "Vehicle", "temporal": {} },
            {
                "name": "FuelTank",
                "table": "Vehicles",
                "source": "DataAnnotation",
                "temporal": {},
                "properties": [
                    { "name": "Id", "key": true, "nullable": false },
                    { "name": "Capacity", "nullable": false }
                ]
            }
        ],
        "relationships": [
            { "principal": "Vehicle", "dependent": "FuelTank", "kind": "OneToOne" }
        ]
    }"#;

    #[test]
    fn test_declaration_finalizes() {
        let model = ModelDeclaration::from_json(FLEET)
            .unwrap()
            .finalize(FinalizeConfig::default())
            .unwrap();

        assert_eq!(model.table_of("Engine").unwrap(), "Vehicles");
        assert_eq!(model.sharing_with("Vehicle"), vec!["Engine", "FuelTank"]);
        assert_eq!(model.column("Vehicle", "Name").unwrap().name, "vehicle_name");
        assert_eq!(
            model.annotation("FuelTank", &AnnotationKey::TableName).unwrap().unwrap().source,
            ConfigurationSource::DataAnnotation
        );
        let temporal = model.temporal("Engine").unwrap().unwrap();
        assert_eq!(temporal.period_start_column, "PeriodStart");
        assert_eq!(temporal.history_table, "VehiclesHistory");
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(FLEET.as_bytes()).unwrap();

        let declaration = ModelDeclaration::load(file.path()).unwrap();
        assert_eq!(declaration.entities.len(), 3);
        assert_eq!(declaration.relationships[0].dependent, "FuelTank");

        let reparsed = ModelDeclaration::from_json(&declaration.to_json().unwrap()).unwrap();
        assert_eq!(reparsed, declaration);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            ModelDeclaration::load(dir.path().join("missing.json")),
            Err(ModelError::IoError(_))
        ));
    }

    #[test]
    fn test_malformed_json_is_parse_error() {
        assert!(matches!(
            ModelDeclaration::from_json(r#"{ "entities": [ { "nam": "X" } ] }"#),
            Err(ModelError::ParseError(_))
        ));
    }

    #[test]
    fn test_half_temporal_declaration_is_rejected() {
        let json = r#"{ "entities": [ { "name": "A", "temporal": { "period_start": "From" } } ] }"#;
        let err = ModelDeclaration::from_json(json)
            .unwrap()
            .into_builder(FinalizeConfig::default())
            .unwrap_err();
        assert!(matches!(err, ModelError::InvalidDeclaration(_)));
    }

    #[test]
    fn test_duplicate_entity_is_rejected() {
        let json = r#"{ "entities": [ { "name": "A" }, { "name": "A" } ] }"#;
        assert!(matches!(
            ModelDeclaration::from_json(json)
                .unwrap()
                .into_builder(FinalizeConfig::default()),
            Err(ModelError::InvalidDeclaration(msg)) if msg.contains("more than once")
        ));
    }

    #[test]
    fn test_column_for_unknown_property_is_rejected() {
        let json = r#"{ "entities": [ { "name": "A", "columns": { "Missing": "m" } } ] }"#;
        assert_eq!(
            ModelDeclaration::from_json(json)
                .unwrap()
                .into_builder(FinalizeConfig::default())
                .unwrap_err(),
            ModelError::PropertyNotFound("Missing".into(), "A".into())
        );
    }
}
