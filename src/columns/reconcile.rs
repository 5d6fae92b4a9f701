use super::{ColumnCatalog, ColumnDefinition, ColumnMapping, PresenceRule};
use crate::core::{ModelError, Result};
use crate::finalize::{FinalizeContext, FinalizePass};
use crate::grouping::TableGroup;
use crate::model::{EntityType, Model, Property};
use log::{debug, warn};
use std::collections::HashSet;

/// Builds the column catalog: one definition per physical column, merged
/// from every property mapped to it, plus presence rules for optional
/// dependents.
pub struct SharedColumnReconciliation;

impl FinalizePass for SharedColumnReconciliation {
    fn name(&self) -> &'static str {
        "shared-column-reconciliation"
    }

    fn apply(&self, mut model: Model, _context: &mut FinalizeContext<'_>) -> Result<Model> {
        let mut catalog = ColumnCatalog::default();

        for group in model.grouping().groups() {
            let optional = optional_hierarchies(&model, group)?;
            reconcile_group(&model, group, &optional, &mut catalog)?;
            presence_rules(&model, group, &optional, &mut catalog)?;
        }

        model.set_columns(catalog);
        Ok(model)
    }
}

/// Hierarchies whose rows may be missing from the shared row: dependents of
/// an optional link, and anything hanging off such a dependent.
fn optional_hierarchies(model: &Model, group: &TableGroup) -> Result<HashSet<String>> {
    let mut optional = HashSet::new();
    for root in &group.hierarchies {
        if *root == group.row_owner {
            continue;
        }
        for link in &group.links {
            if model.root_of(&link.dependent)? != root {
                continue;
            }
            let principal_root = model.root_of(&link.principal)?;
            if !link.required || optional.contains(principal_root) {
                optional.insert(root.clone());
                break;
            }
        }
    }
    Ok(optional)
}

fn reconcile_group(
    model: &Model,
    group: &TableGroup,
    optional: &HashSet<String>,
    catalog: &mut ColumnCatalog,
) -> Result<()> {
    // Owner first, so shared key columns take the owner's settings.
    let mut members = Vec::with_capacity(group.members.len());
    for member in &group.members {
        let hierarchy = model.root_of(member)?.to_string();
        let rank = group
            .hierarchies
            .iter()
            .position(|root| *root == hierarchy)
            .unwrap_or(group.hierarchies.len());
        members.push((rank, model.entity(member)?, hierarchy));
    }
    members.sort_by_key(|(rank, _, _)| *rank);

    for (_, entity, hierarchy) in members {
        let is_root = entity.base().is_none();
        let in_optional = optional.contains(&hierarchy);

        for property in entity.declared_properties() {
            let column = entity.column_name(&property.name);
            let nullable =
                property.nullable || (!property.key && (!is_root || in_optional));
            let mirrors_owner_key = property.key && hierarchy != group.row_owner;
            let mapping = ColumnMapping {
                entity: entity.name().to_string(),
                property: property.name.clone(),
                hierarchy: hierarchy.clone(),
            };

            let Some(definition) = catalog.column_mut(&group.table, column) else {
                catalog.insert(ColumnDefinition {
                    table: group.table.clone(),
                    name: column.to_string(),
                    nullable,
                    concurrency_token: property.concurrency_token,
                    value_generation: property.value_generation,
                    key: property.key,
                    mappings: vec![mapping],
                });
                continue;
            };

            check_compatible(definition, entity, property, mirrors_owner_key)?;
            definition.nullable |= nullable;
            definition.key |= property.key;
            definition.mappings.push(mapping);
        }
    }

    for definition in catalog.columns(&group.table).filter(|d| d.is_shared()) {
        debug!(
            "column '{}.{}' shared by {} properties, nullable: {}",
            definition.table,
            definition.name,
            definition.mappings.len(),
            definition.nullable
        );
    }

    Ok(())
}

fn check_compatible(
    definition: &ColumnDefinition,
    entity: &EntityType,
    property: &Property,
    mirrors_owner_key: bool,
) -> Result<()> {
    let first = &definition.mappings[0];

    if definition.concurrency_token != property.concurrency_token {
        let existing = format!("{}.{}", first.entity, first.property);
        let incoming = format!("{}.{}", entity.name(), property.name);
        let (token, other) = if definition.concurrency_token {
            (existing, incoming)
        } else {
            (incoming, existing)
        };
        return Err(ModelError::ConfigurationConflict(format!(
            "Column '{}' in table '{}': '{}' is a concurrency token but '{}' is not",
            definition.name, definition.table, token, other
        )));
    }

    if !mirrors_owner_key && definition.value_generation != property.value_generation {
        return Err(ModelError::ConfigurationConflict(format!(
            "Column '{}' in table '{}': '{}.{}' generates values {} but '{}.{}' generates values {}",
            definition.name,
            definition.table,
            first.entity,
            first.property,
            definition.value_generation,
            entity.name(),
            property.name,
            property.value_generation
        )));
    }

    Ok(())
}

fn presence_rules(
    model: &Model,
    group: &TableGroup,
    optional: &HashSet<String>,
    catalog: &mut ColumnCatalog,
) -> Result<()> {
    for member in &group.members {
        let hierarchy = model.root_of(member)?;
        if !optional.contains(hierarchy) {
            continue;
        }

        let mut rule = PresenceRule::default();
        for (declaring, property) in model.properties_of(member)? {
            let column = declaring.column_name(&property.name);
            if property.key
                || property.concurrency_token
                || group.key_columns.iter().any(|key| key == column)
            {
                continue;
            }
            let owned = catalog
                .column(&group.table, column)
                .is_some_and(|definition| definition.is_owned_by(hierarchy));
            if !owned {
                continue;
            }
            if property.nullable {
                rule.optional_columns.push(column.to_string());
            } else {
                rule.required_columns.push(column.to_string());
            }
        }

        if rule.columns().next().is_none() {
            warn!(
                "optional dependent '{}' in table '{}' has no columns of its own and will always be materialized",
                member, group.table
            );
        }
        catalog.insert_presence(member, rule);
    }
    Ok(())
}
