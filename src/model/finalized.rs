use super::Model;
use crate::annotation::{Annotation, AnnotationKey};
use crate::columns::{ColumnDefinition, PresenceRule};
use crate::core::{ModelError, Result, Row, ValueGeneration};
use crate::grouping::{SharedRowLink, TableGroup};
use crate::save::{self, EntityEntry, RowCommand};
use crate::temporal::{ResolvedTemporal, TemporalTableDescriptor};
use indexmap::IndexMap;
use serde::Serialize;
use std::sync::Arc;

/// A model that went through finalization. Immutable and cheap to clone;
/// clones share the same model.
#[derive(Debug, Clone)]
pub struct FinalizedModel {
    inner: Arc<Model>,
}

impl FinalizedModel {
    pub(crate) fn new(model: Model) -> Self {
        Self {
            inner: Arc::new(model),
        }
    }

    pub fn model(&self) -> &Model {
        &self.inner
    }

    pub fn table_of(&self, entity: &str) -> Result<&str> {
        self.inner.entity(entity)?.table_name().ok_or_else(|| {
            ModelError::ConfigurationConflict(format!(
                "Entity type '{}' is not mapped to a table",
                entity
            ))
        })
    }

    pub fn temporal_descriptor(&self, entity: &str) -> Result<Option<&TemporalTableDescriptor>> {
        Ok(self.inner.entity(entity)?.annotations().temporal_descriptor())
    }

    /// Period columns and history table, if the entity type is temporal.
    pub fn temporal(&self, entity: &str) -> Result<Option<&ResolvedTemporal>> {
        Ok(self
            .temporal_descriptor(entity)?
            .and_then(TemporalTableDescriptor::resolved)
            .map(|resolved| &**resolved))
    }

    pub fn annotation(&self, entity: &str, key: &AnnotationKey) -> Result<Option<&Annotation>> {
        Ok(self.inner.entity(entity)?.annotations().annotation(key))
    }

    /// The reconciled column a property maps to.
    pub fn column(&self, entity: &str, property: &str) -> Result<&ColumnDefinition> {
        let table = self.table_of(entity)?;
        let column = self.inner.column_of(entity, property)?;
        self.inner
            .columns()
            .column(table, &column)
            .ok_or_else(|| ModelError::PropertyNotFound(property.to_string(), entity.to_string()))
    }

    pub fn columns_of(&self, table: &str) -> Vec<&ColumnDefinition> {
        self.inner.columns().columns(table).collect()
    }

    pub fn group_of(&self, entity: &str) -> Option<&TableGroup> {
        self.inner.grouping().group_of(entity)
    }

    /// Other entity types mapped to the same table.
    pub fn sharing_with(&self, entity: &str) -> Vec<&str> {
        self.group_of(entity)
            .map(|group| {
                group
                    .members
                    .iter()
                    .filter(|member| *member != entity)
                    .map(String::as_str)
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn is_dependent_present(&self, dependent: &str, row: &Row) -> Result<bool> {
        save::is_dependent_present(&self.inner, dependent, row)
    }

    pub fn materialize(&self, table: &str, row: &Row) -> Result<IndexMap<String, Row>> {
        save::materialize(&self.inner, table, row)
    }

    pub fn plan_save(&self, entries: &[EntityEntry]) -> Result<Vec<RowCommand>> {
        save::plan_save(&self.inner, entries)
    }

    pub fn summary(&self) -> ModelSummary {
        let model = &self.inner;
        let grouping = model.grouping();

        let tables = grouping
            .table_order()
            .iter()
            .filter_map(|table| grouping.group(table))
            .map(|group| {
                let owner = model.entity(&group.row_owner).ok();
                let temporal = owner
                    .and_then(|owner| owner.annotations().temporal_descriptor())
                    .and_then(TemporalTableDescriptor::resolved)
                    .map(|resolved| ResolvedTemporal::clone(resolved));
                let memory_optimized =
                    owner.is_some_and(|owner| owner.annotations().is_memory_optimized());

                let columns = model
                    .columns()
                    .columns(&group.table)
                    .map(|definition| ColumnSummary {
                        name: definition.name.clone(),
                        nullable: definition.nullable,
                        key: definition.key,
                        concurrency_token: definition.concurrency_token,
                        value_generation: definition.value_generation,
                        mapped_by: definition
                            .mappings
                            .iter()
                            .map(|mapping| format!("{}.{}", mapping.entity, mapping.property))
                            .collect(),
                    })
                    .collect();

                let presence = group
                    .members
                    .iter()
                    .filter_map(|member| {
                        model
                            .columns()
                            .presence_rule(member)
                            .map(|rule| (member.clone(), rule.clone()))
                    })
                    .collect();

                TableSummary {
                    table: group.table.clone(),
                    row_owner: group.row_owner.clone(),
                    members: group.members.clone(),
                    links: group.links.clone(),
                    temporal,
                    memory_optimized,
                    columns,
                    presence,
                }
            })
            .collect();

        ModelSummary { tables }
    }

    /// Takes the model back, cloning it only if other handles still share it.
    pub fn into_model(self) -> Model {
        Arc::unwrap_or_clone(self.inner)
    }
}

/// Serializable overview of a finalized model, one entry per table in
/// dependency order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModelSummary {
    pub tables: Vec<TableSummary>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableSummary {
    pub table: String,
    pub row_owner: String,
    pub members: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub links: Vec<SharedRowLink>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temporal: Option<ResolvedTemporal>,
    pub memory_optimized: bool,
    pub columns: Vec<ColumnSummary>,
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub presence: IndexMap<String, PresenceRule>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnSummary {
    pub name: String,
    pub nullable: bool,
    pub key: bool,
    pub concurrency_token: bool,
    pub value_generation: ValueGeneration,
    pub mapped_by: Vec<String>,
}
