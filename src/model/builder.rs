use super::{EntityType, FinalizedModel, Model, Property, Relationship};
use crate::annotation::{Annotation, AnnotationKey, AnnotationValue};
use crate::config::FinalizeConfig;
use crate::core::{ConfigurationSource, Result};
use crate::finalize::Pipeline;
use crate::temporal::TemporalTableDescriptor;

/// Collects declarations before the model is finalized.
///
/// Configuration calls return whether they were applied: a call is rejected
/// when a stronger configuration source already set the same annotation.
///
/// ```
/// use tablesplit::{ModelBuilder, Property};
///
/// let mut builder = ModelBuilder::new();
/// builder.entity("Vehicle").property(Property::new("Id").key());
/// assert!(builder.entity("Vehicle").to_table("Vehicles"));
///
/// let model = builder.finalize().unwrap();
/// assert_eq!(model.table_of("Vehicle").unwrap(), "Vehicles");
/// ```
#[derive(Debug, Clone, Default)]
pub struct ModelBuilder {
    model: Model,
    config: FinalizeConfig,
}

impl ModelBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: FinalizeConfig) -> Self {
        Self {
            model: Model::new(),
            config,
        }
    }

    pub fn config(&self) -> &FinalizeConfig {
        &self.config
    }

    /// Declares the entity type if needed and returns a builder for it.
    pub fn entity(&mut self, name: &str) -> EntityTypeBuilder<'_> {
        EntityTypeBuilder {
            entity: self.model.entity_or_insert(name),
        }
    }

    /// Declares a one-to-one relationship; when both ends map to the same
    /// table the dependent shares the principal's row.
    pub fn one_to_one(&mut self, principal: &str, dependent: &str) -> &mut Relationship {
        self.model
            .add_relationship(Relationship::one_to_one(principal, dependent))
    }

    pub fn many_to_one(
        &mut self,
        dependent: &str,
        principal: &str,
        foreign_key: &[&str],
    ) -> &mut Relationship {
        self.model
            .add_relationship(Relationship::many_to_one(dependent, principal, foreign_key))
    }

    pub fn relationship(&mut self, relationship: Relationship) -> &mut Relationship {
        self.model.add_relationship(relationship)
    }

    pub fn model(&self) -> &Model {
        &self.model
    }

    pub fn into_model(self) -> Model {
        self.model
    }

    /// Runs the standard finalization pipeline and freezes the result.
    pub fn finalize(self) -> Result<FinalizedModel> {
        Pipeline::standard(self.config).finalize(self.model)
    }
}

pub struct EntityTypeBuilder<'a> {
    entity: &'a mut EntityType,
}

impl EntityTypeBuilder<'_> {
    pub fn has_base_type(&mut self, base: &str) -> &mut Self {
        self.entity.set_base(Some(base.to_string()));
        self
    }

    pub fn property(&mut self, property: Property) -> &mut Self {
        self.entity.add_property(property);
        self
    }

    #[must_use]
    pub fn to_table(&mut self, table: &str) -> bool {
        self.to_table_from(table, ConfigurationSource::Explicit)
    }

    #[must_use]
    pub fn to_table_from(&mut self, table: &str, source: ConfigurationSource) -> bool {
        self.has_annotation(
            AnnotationKey::TableName,
            AnnotationValue::Text(table.to_string()),
            source,
        )
    }

    #[must_use]
    pub fn has_column_name(&mut self, property: &str, column: &str) -> bool {
        self.has_column_name_from(property, column, ConfigurationSource::Explicit)
    }

    #[must_use]
    pub fn has_column_name_from(
        &mut self,
        property: &str,
        column: &str,
        source: ConfigurationSource,
    ) -> bool {
        self.has_annotation(
            AnnotationKey::ColumnName(property.to_string()),
            AnnotationValue::Text(column.to_string()),
            source,
        )
    }

    /// Marks the entity temporal with the default period properties, which
    /// are added as shadow properties during finalization when missing.
    #[must_use]
    pub fn is_temporal(&mut self) -> bool {
        self.has_annotation(
            AnnotationKey::Temporal,
            AnnotationValue::TemporalMarker,
            ConfigurationSource::Explicit,
        )
    }

    /// Marks the entity temporal with explicit period properties; both must
    /// exist on the hierarchy root by the time the model is finalized.
    #[must_use]
    pub fn is_temporal_with(
        &mut self,
        period_start: &str,
        period_end: &str,
        history_table: Option<&str>,
    ) -> bool {
        self.is_temporal_from(
            TemporalTableDescriptor::transient(
                period_start,
                period_end,
                history_table.map(str::to_string),
            ),
            ConfigurationSource::Explicit,
        )
    }

    #[must_use]
    pub fn is_temporal_from(
        &mut self,
        descriptor: TemporalTableDescriptor,
        source: ConfigurationSource,
    ) -> bool {
        self.has_annotation(
            AnnotationKey::Temporal,
            AnnotationValue::Temporal(descriptor),
            source,
        )
    }

    #[must_use]
    pub fn is_memory_optimized(&mut self, memory_optimized: bool) -> bool {
        self.is_memory_optimized_from(memory_optimized, ConfigurationSource::Explicit)
    }

    #[must_use]
    pub fn is_memory_optimized_from(
        &mut self,
        memory_optimized: bool,
        source: ConfigurationSource,
    ) -> bool {
        self.has_annotation(
            AnnotationKey::MemoryOptimized,
            AnnotationValue::Flag(memory_optimized),
            source,
        )
    }

    #[must_use]
    pub fn has_annotation(
        &mut self,
        key: AnnotationKey,
        value: AnnotationValue,
        source: ConfigurationSource,
    ) -> bool {
        self.entity.annotations_mut().set(key, value, source)
    }

    pub fn remove_annotation(&mut self, key: &AnnotationKey) -> Option<Annotation> {
        self.entity.annotations_mut().remove(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ConfigurationSource::*;

    #[test]
    fn test_table_precedence_through_builder() {
        let mut builder = ModelBuilder::new();
        assert!(builder.entity("Order").to_table_from("orders_by_convention", Convention));
        assert!(builder.entity("Order").to_table("Orders"));
        assert!(!builder.entity("Order").to_table_from("orders_annotated", DataAnnotation));
        assert_eq!(builder.model().table_of("Order"), Some("Orders"));
    }

    #[test]
    fn test_temporal_declarations() {
        let mut builder = ModelBuilder::new();
        assert!(builder.entity("Vehicle").is_temporal_with("ValidFrom", "ValidTo", None));
        assert!(!builder.entity("Vehicle").is_temporal_from(
            TemporalTableDescriptor::transient("A", "B", None),
            Convention
        ));
        let entity = builder.model().entity("Vehicle").unwrap();
        assert_eq!(
            entity.annotations().temporal_descriptor().and_then(|d| d.period_properties()),
            Some(("ValidFrom", "ValidTo"))
        );
    }

    #[test]
    fn test_relationship_builders() {
        let mut builder = ModelBuilder::new();
        builder.one_to_one("Vehicle", "Engine").required();
        builder.many_to_one("Trip", "Vehicle", &["VehicleId"]);
        let relationships = builder.model().relationships();
        assert!(relationships[0].required);
        assert!(relationships[0].is_one_to_one());
        assert_eq!(relationships[1].foreign_key, vec!["VehicleId".to_string()]);
    }
}
