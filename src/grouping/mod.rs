// ============================================================================
// Table Grouping
// ============================================================================
//
// Which entity types share a physical table, which hierarchy owns each row,
// and how the other hierarchies hang off it through one-to-one links.
//
// ============================================================================

pub mod topology;

pub use topology::{TopologicalOrder, stable_index_order, stable_order};

use crate::core::{ModelError, Result};
use crate::finalize::{FinalizeContext, FinalizePass};
use crate::model::Model;
use indexmap::IndexMap;
use log::{debug, warn};
use serde::{Deserialize, Serialize};

/// A one-to-one relationship whose two ends live in the same row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SharedRowLink {
    pub principal: String,
    pub dependent: String,
    /// A required dependent exists whenever the principal does.
    pub required: bool,
    pub foreign_key: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableGroup {
    pub table: String,
    /// Every entity type mapped to the table, in declaration order.
    pub members: Vec<String>,
    /// Root of the hierarchy that owns the rows.
    pub row_owner: String,
    /// Hierarchy roots, principals before their dependents.
    pub hierarchies: Vec<String>,
    pub links: Vec<SharedRowLink>,
    /// Primary-key columns of the row owner, shared by every hierarchy.
    pub key_columns: Vec<String>,
}

impl TableGroup {
    pub fn is_shared(&self) -> bool {
        self.members.len() > 1
    }

    pub fn contains(&self, entity: &str) -> bool {
        self.members.iter().any(|member| member == entity)
    }

    pub fn link_to(&self, dependent: &str) -> Option<&SharedRowLink> {
        self.links.iter().find(|link| link.dependent == dependent)
    }

    pub fn links_from<'a>(&'a self, principal: &'a str) -> impl Iterator<Item = &'a SharedRowLink> {
        self.links.iter().filter(move |link| link.principal == principal)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableGrouping {
    groups: IndexMap<String, TableGroup>,
    /// Tables ordered so that principal tables of cross-table foreign keys
    /// come before the tables that reference them.
    table_order: Vec<String>,
}

impl TableGrouping {
    pub fn group(&self, table: &str) -> Option<&TableGroup> {
        self.groups.get(table)
    }

    pub fn group_of(&self, entity: &str) -> Option<&TableGroup> {
        self.groups.values().find(|group| group.contains(entity))
    }

    pub fn groups(&self) -> impl Iterator<Item = &TableGroup> {
        self.groups.values()
    }

    pub fn table_order(&self) -> &[String] {
        &self.table_order
    }

    pub fn table_rank(&self, table: &str) -> usize {
        self.table_order
            .iter()
            .position(|name| name == table)
            .unwrap_or(self.table_order.len())
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

/// Groups entity types by table. Expects table names to be resolved.
pub fn resolve(model: &Model) -> Result<TableGrouping> {
    let mut members: IndexMap<String, Vec<String>> = IndexMap::new();
    for entity in model.entities() {
        let table = entity.table_name().ok_or_else(|| {
            ModelError::ConfigurationConflict(format!(
                "Entity type '{}' is not mapped to a table",
                entity.name()
            ))
        })?;

        // Rows of a hierarchy live in its root's table.
        let root = model.root_of(entity.name())?;
        if let Some(root_table) = model.table_of(root)
            && root_table != table
        {
            return Err(ModelError::ConfigurationConflict(format!(
                "Entity type '{}' is mapped to table '{}' but its root type '{}' is mapped to '{}'; derived types must use the table of their root",
                entity.name(),
                table,
                root,
                root_table
            )));
        }

        members
            .entry(table.to_string())
            .or_default()
            .push(entity.name().to_string());
    }

    let mut groups = IndexMap::new();
    for (table, members) in members {
        let group = resolve_group(model, &table, members)?;
        if group.is_shared() {
            debug!(
                "table '{}' is shared by {:?}, rows owned by '{}'",
                group.table, group.members, group.row_owner
            );
        }
        groups.insert(table, group);
    }

    let table_order = resolve_table_order(model, &groups)?;

    Ok(TableGrouping {
        groups,
        table_order,
    })
}

fn resolve_group(model: &Model, table: &str, members: Vec<String>) -> Result<TableGroup> {
    let mut hierarchies: Vec<String> = Vec::new();
    for member in &members {
        let root = model.root_of(member)?.to_string();
        if !hierarchies.contains(&root) {
            hierarchies.push(root);
        }
    }

    let mut links = Vec::new();
    let mut edges = Vec::new();
    for relationship in model.relationships() {
        if !relationship.is_one_to_one()
            || model.table_of(&relationship.principal) != Some(table)
            || model.table_of(&relationship.dependent) != Some(table)
        {
            continue;
        }

        let principal_root = model.root_of(&relationship.principal)?;
        let dependent_root = model.root_of(&relationship.dependent)?;
        if principal_root == dependent_root {
            continue;
        }

        edges.push((principal_root.to_string(), dependent_root.to_string()));
        links.push(SharedRowLink {
            principal: relationship.principal.clone(),
            dependent: relationship.dependent.clone(),
            required: relationship.required,
            foreign_key: model.foreign_key_of(relationship)?,
        });
    }

    let order = stable_order(&hierarchies, &edges);
    if !order.is_complete() {
        return Err(ModelError::ConfigurationConflict(format!(
            "Table '{}': one-to-one relationships between {} form a cycle",
            table,
            quote_list(&order.cyclic)
        )));
    }

    let owners: Vec<&String> = hierarchies
        .iter()
        .filter(|root| !edges.iter().any(|(_, dependent)| dependent == *root))
        .collect();
    let row_owner = match owners.as_slice() {
        [owner] => (*owner).clone(),
        _ => {
            return Err(ModelError::ConfigurationConflict(format!(
                "Table '{}' is shared by {} but no one-to-one relationship links them to a single row owner",
                table,
                quote_list(&owners.iter().map(|owner| (*owner).clone()).collect::<Vec<_>>())
            )));
        }
    };

    let key_columns = key_columns_of(model, &row_owner)?;
    for root in order.ordered.iter().filter(|root| **root != row_owner) {
        let dependent_keys = key_columns_of(model, root)?;
        if dependent_keys != key_columns {
            return Err(ModelError::ConfigurationConflict(format!(
                "Table '{}': key columns {:?} of '{}' do not match key columns {:?} of row owner '{}'",
                table, dependent_keys, root, key_columns, row_owner
            )));
        }
    }

    for link in &links {
        let mut fk_columns = Vec::with_capacity(link.foreign_key.len());
        for property in &link.foreign_key {
            fk_columns.push(model.column_of(&link.dependent, property)?);
        }
        if fk_columns != key_columns {
            return Err(ModelError::ConfigurationConflict(format!(
                "Table '{}': '{}' shares the row of '{}' but its foreign key {:?} is not the shared key {:?}",
                table, link.dependent, link.principal, fk_columns, key_columns
            )));
        }
    }

    Ok(TableGroup {
        table: table.to_string(),
        members,
        row_owner,
        hierarchies: order.ordered,
        links,
        key_columns,
    })
}

fn key_columns_of(model: &Model, entity: &str) -> Result<Vec<String>> {
    model
        .key_properties(entity)?
        .into_iter()
        .map(|property| model.column_of(entity, &property.name))
        .collect()
}

fn resolve_table_order(model: &Model, groups: &IndexMap<String, TableGroup>) -> Result<Vec<String>> {
    let tables: Vec<String> = groups.keys().cloned().collect();
    let mut edges = Vec::new();
    for relationship in model.relationships() {
        let (Some(principal), Some(dependent)) = (
            model.table_of(&relationship.principal),
            model.table_of(&relationship.dependent),
        ) else {
            continue;
        };
        if principal != dependent {
            edges.push((principal.to_string(), dependent.to_string()));
        }
    }

    let order = stable_order(&tables, &edges);
    if order.is_complete() {
        return Ok(order.ordered);
    }

    warn!(
        "foreign keys between tables {:?} form a cycle; falling back to declaration order for them",
        order.cyclic
    );
    let mut ordered = order.ordered;
    ordered.extend(order.cyclic);
    Ok(ordered)
}

fn quote_list(names: &[String]) -> String {
    names
        .iter()
        .map(|name| format!("'{}'", name))
        .collect::<Vec<_>>()
        .join(", ")
}

pub struct TableGroupingPass;

impl FinalizePass for TableGroupingPass {
    fn name(&self) -> &'static str {
        "table-grouping"
    }

    fn apply(&self, mut model: Model, _context: &mut FinalizeContext<'_>) -> Result<Model> {
        let grouping = resolve(&model)?;
        model.set_grouping(grouping);
        Ok(model)
    }
}
