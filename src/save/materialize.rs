use crate::core::{ModelError, Result, Row, Value};
use crate::model::Model;
use indexmap::IndexMap;

/// Whether `dependent` exists in a row fetched from its table. Types without
/// a presence rule (row owners, required dependents) are always present.
pub fn is_dependent_present(model: &Model, dependent: &str, row: &Row) -> Result<bool> {
    model.entity(dependent)?;
    Ok(model
        .columns()
        .presence_rule(dependent)
        .is_none_or(|rule| rule.is_present(row)))
}

/// Splits a fetched row into property values per hierarchy root present in
/// it. A dependent whose principal is absent is absent too.
///
/// Each entry holds the properties declared on the root. Properties declared
/// on derived types are not projected: the row does not record which derived
/// type it stores, so read them with the column names from the catalog.
pub fn materialize(model: &Model, table: &str, row: &Row) -> Result<IndexMap<String, Row>> {
    let group = model.grouping().group(table).ok_or_else(|| {
        ModelError::ConfigurationConflict(format!("No entity type is mapped to table '{}'", table))
    })?;

    let mut present: IndexMap<String, Row> = IndexMap::new();
    for root in &group.hierarchies {
        if !is_dependent_present(model, root, row)? {
            continue;
        }
        if let Some(link) = group.link_to(root) {
            let principal = model.root_of(&link.principal)?;
            if !present.contains_key(principal) {
                continue;
            }
        }

        let values = model
            .properties_of(root)?
            .into_iter()
            .map(|(declaring, property)| {
                let column = declaring.column_name(&property.name);
                let value = row.get(column).cloned().unwrap_or(Value::Null);
                (property.name.clone(), value)
            })
            .collect();
        present.insert(root.clone(), values);
    }

    Ok(present)
}
