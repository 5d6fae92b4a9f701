use super::{FinalizeContext, FinalizePass};
use crate::annotation::{AnnotationKey, AnnotationValue};
use crate::core::{ConfigurationSource, Result};
use crate::model::Model;
use log::debug;

/// Rejects dangling base types, base cycles and broken relationship ends
/// before any convention looks at the model.
pub struct StructureValidation;

impl FinalizePass for StructureValidation {
    fn name(&self) -> &'static str {
        "structure-validation"
    }

    fn apply(&self, model: Model, _context: &mut FinalizeContext<'_>) -> Result<Model> {
        model.validate_structure()?;
        Ok(model)
    }
}

/// Gives every entity type a table: its base type's table, or its own name
/// for a hierarchy root. Runs root-first so bases are resolved before the
/// types that inherit from them.
pub struct TableNameConvention;

impl FinalizePass for TableNameConvention {
    fn name(&self) -> &'static str {
        "table-name-convention"
    }

    fn apply(&self, mut model: Model, _context: &mut FinalizeContext<'_>) -> Result<Model> {
        let mut by_depth = Vec::new();
        for name in model.entity_names() {
            let depth = model.ancestry(&name)?.len();
            by_depth.push((depth, name));
        }
        // stable: declaration order within a depth
        by_depth.sort_by_key(|(depth, _)| *depth);

        for (_, name) in by_depth {
            let derived_table = match model.entity(&name)?.base() {
                Some(base) => model.table_of(base).unwrap_or(base).to_string(),
                None => name.clone(),
            };

            let annotations = model.entity_mut(&name)?.annotations_mut();
            if annotations.take_rederive(&AnnotationKey::TableName) {
                debug!("re-deriving table name for entity type '{}'", name);
            }
            annotations.set(
                AnnotationKey::TableName,
                AnnotationValue::Text(derived_table),
                ConfigurationSource::Convention,
            );
        }

        Ok(model)
    }
}

/// Maps every declared property to a column of the same name unless
/// configured otherwise.
pub struct ColumnNameConvention;

impl FinalizePass for ColumnNameConvention {
    fn name(&self) -> &'static str {
        "column-name-convention"
    }

    fn apply(&self, mut model: Model, _context: &mut FinalizeContext<'_>) -> Result<Model> {
        for name in model.entity_names() {
            let entity = model.entity_mut(&name)?;
            let properties: Vec<String> = entity
                .declared_properties()
                .map(|property| property.name.clone())
                .collect();

            let annotations = entity.annotations_mut();
            for property in properties {
                let key = AnnotationKey::ColumnName(property.clone());
                annotations.take_rederive(&key);
                annotations.set(
                    key,
                    AnnotationValue::Text(property),
                    ConfigurationSource::Convention,
                );
            }
        }

        Ok(model)
    }
}
