use super::change::{EntityEntry, EntryState};
use super::command::{CommandKind, RowCommand};
use crate::core::{ModelError, Result, Row, Value, ValueGeneration};
use crate::grouping::{TableGroup, TableGrouping, stable_index_order};
use crate::model::{Model, Relationship};
use indexmap::IndexMap;
use log::{debug, warn};
use std::collections::HashMap;
use tracing::{Level, event, info_span};

/// Entries that landed on the same physical row.
struct RowEntries<'a> {
    table: String,
    key: Row,
    owner: Option<&'a EntityEntry>,
    dependents: Vec<&'a EntityEntry>,
}

/// A built command with the keys of the rows it references in its own table.
struct PlannedRow {
    command: RowCommand,
    identity: Vec<Value>,
    references: Vec<Vec<Value>>,
}

/// Column values collected for one row, remembering who wrote each one.
#[derive(Default)]
struct ColumnWrites {
    values: Row,
    writers: IndexMap<String, String>,
}

impl ColumnWrites {
    fn write(&mut self, table: &str, column: &str, value: Value, writer: &str) -> Result<()> {
        match self.values.get(column) {
            Some(existing) if *existing != value => Err(ModelError::RowAmbiguity(format!(
                "Column '{}' in table '{}' gets {} from '{}' and {} from '{}'",
                column, table, existing, self.writers[column], value, writer
            ))),
            Some(_) => Ok(()),
            None => {
                self.values.insert(column.to_string(), value);
                self.writers.insert(column.to_string(), writer.to_string());
                Ok(())
            }
        }
    }
}

/// Turns tracked entries into row commands.
///
/// Entries mapped to the same table and key become a single command. Deletes
/// come first, children before parents; inserts and updates follow, parents
/// before children. Within a table, a row referenced through a foreign key
/// by another row of the same table is written before it and deleted after
/// it. Otherwise commands keep the order in which their rows first appear in
/// `entries`.
pub fn plan_save(model: &Model, entries: &[EntityEntry]) -> Result<Vec<RowCommand>> {
    let span = info_span!("save.plan", entries = entries.len());
    let _enter = span.enter();

    let rows = match group_rows(model, entries) {
        Ok(rows) => rows,
        Err(err) => {
            event!(Level::ERROR, error = %err, "save planning failed");
            return Err(err);
        }
    };

    let mut planned = Vec::with_capacity(rows.len());
    for row in rows.values() {
        match plan_row(model, row) {
            Ok(Some(row)) => planned.push(row),
            Ok(None) => debug!("row {:?} in '{}' has nothing to write", row.key, row.table),
            Err(err) => {
                event!(Level::ERROR, error = %err, "save planning failed");
                return Err(err);
            }
        }
    }

    let (deletes, writes): (Vec<_>, Vec<_>) = planned
        .into_iter()
        .partition(|row| row.command.kind == CommandKind::Delete);
    let mut commands = order_phase(model.grouping(), deletes, true);
    commands.extend(order_phase(model.grouping(), writes, false));

    event!(Level::DEBUG, commands = commands.len(), "save plan built");
    Ok(commands)
}

fn plan_row(model: &Model, row: &RowEntries<'_>) -> Result<Option<PlannedRow>> {
    let Some(command) = build_command(model, row)? else {
        return Ok(None);
    };
    let references = same_table_references(model, row, command.kind)?;
    Ok(Some(PlannedRow {
        command,
        identity: row.key.values().cloned().collect(),
        references,
    }))
}

/// Orders one phase by table rank, then rows of each table by their
/// references to each other.
fn order_phase(
    grouping: &TableGrouping,
    mut rows: Vec<PlannedRow>,
    deleting: bool,
) -> Vec<RowCommand> {
    rows.sort_by_key(|row| {
        let rank = grouping.table_rank(&row.command.table);
        if deleting { usize::MAX - rank } else { rank }
    });

    let mut commands = Vec::with_capacity(rows.len());
    let mut rows = rows.into_iter().peekable();
    while let Some(first) = rows.next() {
        let table = first.command.table.clone();
        let mut table_rows = vec![first];
        while let Some(next) = rows.next_if(|row| row.command.table == table) {
            table_rows.push(next);
        }
        commands.extend(order_within_table(table_rows, deleting));
    }
    commands
}

fn order_within_table(rows: Vec<PlannedRow>, deleting: bool) -> Vec<RowCommand> {
    let position: HashMap<&[Value], usize> = rows
        .iter()
        .enumerate()
        .map(|(idx, row)| (row.identity.as_slice(), idx))
        .collect();

    let mut edges = Vec::new();
    for (idx, row) in rows.iter().enumerate() {
        for reference in &row.references {
            let Some(&principal) = position.get(reference.as_slice()) else {
                continue;
            };
            edges.push(if deleting { (idx, principal) } else { (principal, idx) });
        }
    }

    let order = stable_index_order(rows.len(), &edges);
    if !order.is_complete() {
        warn!(
            "rows {:?} in table '{}' reference each other in a cycle; keeping their entry order",
            order.cyclic.iter().map(|idx| &rows[*idx].identity).collect::<Vec<_>>(),
            rows[order.cyclic[0]].command.table
        );
    }

    let mut slots: Vec<Option<RowCommand>> =
        rows.into_iter().map(|row| Some(row.command)).collect();
    order
        .ordered
        .into_iter()
        .chain(order.cyclic)
        .filter_map(|idx| slots[idx].take())
        .collect()
}

/// Keys of rows in the same table that the entries of `row` point at through
/// a foreign key. Deleted rows are followed through their original values.
fn same_table_references(
    model: &Model,
    row: &RowEntries<'_>,
    kind: CommandKind,
) -> Result<Vec<Vec<Value>>> {
    let mut references = Vec::new();
    for entry in row.owner.iter().copied().chain(row.dependents.iter().copied()) {
        let lineage: Vec<&str> = model
            .ancestry(&entry.entity_type)?
            .into_iter()
            .map(|entity| entity.name())
            .collect();

        for relationship in model.relationships() {
            if !lineage.contains(&relationship.dependent.as_str())
                || model.table_of(&relationship.principal) != Some(row.table.as_str())
                || is_shared_row_link(model, relationship)?
            {
                continue;
            }

            let mut target = Vec::new();
            for property in model.foreign_key_of(relationship)? {
                let value = match kind {
                    CommandKind::Delete => entry.original(&property),
                    CommandKind::Insert | CommandKind::Update => entry.current(&property),
                };
                target.push(value.clone());
            }
            if !target.is_empty() && target.iter().all(|value| !value.is_null()) {
                references.push(target);
            }
        }
    }
    Ok(references)
}

/// One-to-one links between hierarchies of one table put both ends in the
/// same row rather than pointing from one row to another.
fn is_shared_row_link(model: &Model, relationship: &Relationship) -> Result<bool> {
    Ok(relationship.is_one_to_one()
        && model.root_of(&relationship.principal)? != model.root_of(&relationship.dependent)?)
}

fn group_rows<'a>(
    model: &Model,
    entries: &'a [EntityEntry],
) -> Result<IndexMap<(String, Vec<Value>), RowEntries<'a>>> {
    let mut rows: IndexMap<(String, Vec<Value>), RowEntries<'a>> = IndexMap::new();

    for entry in entries {
        let entity = model.entity(&entry.entity_type)?;
        let table = entity.table_name().ok_or_else(|| {
            ModelError::ConfigurationConflict(format!(
                "Entity type '{}' is not mapped to a table",
                entry.entity_type
            ))
        })?;
        let group = group_of(model, table)?;

        let mut key = Row::new();
        for property in model.key_properties(&entry.entity_type)? {
            let column = model.column_of(&entry.entity_type, &property.name)?;
            let value = match entry.state {
                EntryState::Deleted => entry.original(&property.name),
                EntryState::Added | EntryState::Modified => entry.current(&property.name),
            };
            if value.is_null() {
                return Err(ModelError::RowAmbiguity(format!(
                    "Entry for '{}' has no value for key column '{}'",
                    entry.entity_type, column
                )));
            }
            key.insert(column, value.clone());
        }

        let identity = (table.to_string(), key.values().cloned().collect());
        let row = rows.entry(identity).or_insert_with(|| RowEntries {
            table: table.to_string(),
            key,
            owner: None,
            dependents: Vec::new(),
        });

        if model.root_of(&entry.entity_type)? != group.row_owner {
            row.dependents.push(entry);
            continue;
        }
        if let Some(previous) = row.owner {
            return Err(ModelError::RowAmbiguity(format!(
                "Row {:?} in table '{}' is tracked by both '{}' and '{}'",
                row.key, row.table, previous.entity_type, entry.entity_type
            )));
        }
        row.owner = Some(entry);
    }

    Ok(rows)
}

fn group_of<'m>(model: &'m Model, table: &str) -> Result<&'m TableGroup> {
    model.grouping().group(table).ok_or_else(|| {
        ModelError::ConfigurationConflict(format!(
            "Table '{}' has no grouping; finalize the model before saving",
            table
        ))
    })
}

fn build_command(model: &Model, row: &RowEntries<'_>) -> Result<Option<RowCommand>> {
    let kind = command_kind(row)?;
    let group = group_of(model, &row.table)?;

    let mut values = ColumnWrites::default();
    let mut conditions = ColumnWrites::default();
    if kind != CommandKind::Insert {
        for (column, value) in &row.key {
            conditions.write(&row.table, column, value.clone(), "key")?;
        }
    }

    let contributing = row.owner.iter().copied().chain(row.dependents.iter().copied());
    for entry in contributing.clone() {
        let is_owner = row.owner.is_some_and(|owner| std::ptr::eq(owner, entry));
        write_entry(model, group, kind, entry, is_owner, &mut values, &mut conditions)?;
    }

    if kind != CommandKind::Delete {
        check_presence(model, row, &values.values)?;
    }

    if kind == CommandKind::Update && values.values.is_empty() {
        return Ok(None);
    }

    Ok(Some(RowCommand {
        table: row.table.clone(),
        kind,
        key: row.key.clone(),
        values: if kind == CommandKind::Delete { Row::new() } else { values.values },
        conditions: conditions.values,
        entries: contributing.map(|entry| entry.entity_type.clone()).collect(),
    }))
}

fn command_kind(row: &RowEntries<'_>) -> Result<CommandKind> {
    let Some(owner) = row.owner else {
        return Ok(CommandKind::Update);
    };

    let contradiction = row.dependents.iter().find(|dependent| match owner.state {
        EntryState::Added => dependent.state == EntryState::Deleted,
        EntryState::Deleted => dependent.state != EntryState::Deleted,
        EntryState::Modified => false,
    });
    if let Some(dependent) = contradiction {
        return Err(ModelError::RowAmbiguity(format!(
            "Row {:?} in table '{}': '{}' is {} but '{}' sharing the row is {}",
            row.key, row.table, owner.entity_type, owner.state, dependent.entity_type, dependent.state
        )));
    }

    Ok(match owner.state {
        EntryState::Added => CommandKind::Insert,
        EntryState::Modified => CommandKind::Update,
        EntryState::Deleted => CommandKind::Delete,
    })
}

fn write_entry(
    model: &Model,
    group: &TableGroup,
    kind: CommandKind,
    entry: &EntityEntry,
    is_owner: bool,
    values: &mut ColumnWrites,
    conditions: &mut ColumnWrites,
) -> Result<()> {
    let hierarchy = model.root_of(&entry.entity_type)?;
    let catalog = model.columns();

    for (declaring, property) in model.properties_of(&entry.entity_type)? {
        let column = declaring.column_name(&property.name);
        let definition = catalog.column(&group.table, column);
        let generation = definition.map_or(property.value_generation, |d| d.value_generation);

        if property.concurrency_token && kind != CommandKind::Insert {
            conditions.write(
                &group.table,
                column,
                entry.original(&property.name).clone(),
                &entry.entity_type,
            )?;
        }

        if kind == CommandKind::Delete || generation == ValueGeneration::OnAddOrUpdate {
            continue;
        }
        // Shared key columns are written once, from the row owner.
        if property.key && (!is_owner || kind == CommandKind::Update) {
            continue;
        }

        let value = match entry.state {
            EntryState::Added => entry.current(&property.name).clone(),
            EntryState::Modified if entry.is_modified(&property.name) => {
                entry.current(&property.name).clone()
            }
            EntryState::Modified => continue,
            // A dependent leaving a surviving row clears only what it owns.
            EntryState::Deleted => {
                let owned = definition.is_some_and(|d| d.is_owned_by(hierarchy));
                if !owned || property.concurrency_token {
                    continue;
                }
                Value::Null
            }
        };

        if kind == CommandKind::Insert && generation == ValueGeneration::OnAdd && value.is_null() {
            continue;
        }
        values.write(&group.table, column, value, &entry.entity_type)?;
    }

    Ok(())
}

/// A present optional dependent must not be written so that it reads back
/// as absent.
fn check_presence(model: &Model, row: &RowEntries<'_>, written: &Row) -> Result<()> {
    for dependent in &row.dependents {
        if dependent.state == EntryState::Deleted {
            continue;
        }
        let Some(rule) = model.columns().presence_rule(&dependent.entity_type) else {
            continue;
        };

        let mut image = written.clone();
        for (declaring, property) in model.properties_of(&dependent.entity_type)? {
            let column = declaring.column_name(&property.name);
            if rule.columns().any(|presence| presence == column) {
                image
                    .entry(column.to_string())
                    .or_insert_with(|| dependent.current(&property.name).clone());
            }
        }

        if !rule.is_present(&image) {
            return Err(ModelError::RowAmbiguity(format!(
                "'{}' in table '{}' would be read back as absent: presence columns {:?} are null",
                dependent.entity_type,
                row.table,
                rule.columns().collect::<Vec<_>>()
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ModelBuilder, Property};
    use crate::save::{is_dependent_present, materialize};

    fn row(pairs: &[(&str, Value)]) -> Row {
        pairs
            .iter()
            .map(|(name, value)| (name.to_string(), value.clone()))
            .collect()
    }

    /// Vehicle owns the `Vehicles` rows, Engine optionally shares them and
    /// Driver references Vehicle from its own table.
    fn fleet_builder() -> ModelBuilder {
        let mut builder = ModelBuilder::new();
        builder
            .entity("Vehicle")
            .property(Property::new("Id").key().generated(ValueGeneration::OnAdd))
            .property(Property::new("Name").required())
            .property(Property::new("Version").required().concurrency_token())
            .property(Property::new("Created").generated(ValueGeneration::OnAdd))
            .property(Property::new("Updated").generated(ValueGeneration::OnAddOrUpdate));
        assert!(builder.entity("Vehicle").to_table("Vehicles"));
        builder
            .entity("Engine")
            .property(Property::new("Id").key())
            .property(Property::new("FuelType").required())
            .property(Property::new("Notes"));
        assert!(builder.entity("Engine").to_table("Vehicles"));
        builder.one_to_one("Vehicle", "Engine");
        builder
            .entity("Driver")
            .property(Property::new("Id").key())
            .property(Property::new("VehicleId").required());
        builder.many_to_one("Driver", "Vehicle", &["VehicleId"]);
        builder
    }

    fn fleet() -> Model {
        fleet_builder().finalize().unwrap().into_model()
    }

    fn vehicle(id: i64) -> Row {
        row(&[
            ("Id", Value::Integer(id)),
            ("Name", "truck".into()),
            ("Version", Value::Integer(1)),
            ("Created", Value::Null),
            ("Updated", Value::Integer(99)),
        ])
    }

    fn engine(id: i64, fuel: Value) -> Row {
        row(&[("Id", Value::Integer(id)), ("FuelType", fuel), ("Notes", Value::Null)])
    }

    fn columns(row: &Row) -> Vec<&str> {
        row.keys().map(String::as_str).collect()
    }

    #[test]
    fn test_entries_sharing_a_row_become_one_insert() {
        let model = fleet();
        let commands = plan_save(
            &model,
            &[
                EntityEntry::added("Vehicle", vehicle(1)),
                EntityEntry::added("Engine", engine(1, "diesel".into())),
            ],
        )
        .unwrap();

        assert_eq!(commands.len(), 1);
        let insert = &commands[0];
        assert!(insert.is_insert());
        assert_eq!(insert.entries, vec!["Vehicle", "Engine"]);
        // Created is null and generated on add, Updated is always generated
        assert_eq!(columns(&insert.values), vec!["Id", "Name", "Version", "FuelType", "Notes"]);
        assert!(insert.conditions.is_empty());
    }

    #[test]
    fn test_deletes_first_then_parents_before_children() {
        let model = fleet();
        let commands = plan_save(
            &model,
            &[
                EntityEntry::added("Driver", row(&[("Id", Value::Integer(10)), ("VehicleId", Value::Integer(1))])),
                EntityEntry::added("Vehicle", vehicle(1)),
                EntityEntry::deleted("Driver", row(&[("Id", Value::Integer(11)), ("VehicleId", Value::Integer(2))])),
                EntityEntry::deleted("Vehicle", vehicle(2)),
            ],
        )
        .unwrap();

        let plan: Vec<_> = commands
            .iter()
            .map(|command| (command.kind, command.table.as_str()))
            .collect();
        assert_eq!(
            plan,
            vec![
                (CommandKind::Delete, "Driver"),
                (CommandKind::Delete, "Vehicles"),
                (CommandKind::Insert, "Vehicles"),
                (CommandKind::Insert, "Driver"),
            ]
        );
        assert_eq!(commands[1].conditions.get("Version"), Some(&Value::Integer(1)));
    }

    #[test]
    fn test_adding_dependent_to_existing_row_is_an_update() {
        let model = fleet();
        let commands =
            plan_save(&model, &[EntityEntry::added("Engine", engine(4, "electric".into()))]).unwrap();

        assert_eq!(commands.len(), 1);
        assert!(commands[0].is_update());
        assert_eq!(columns(&commands[0].values), vec!["FuelType", "Notes"]);
        assert_eq!(columns(&commands[0].conditions), vec!["Id"]);
    }

    #[test]
    fn test_deleting_dependent_nulls_its_columns() {
        let model = fleet();
        let mut renamed = vehicle(3);
        renamed.insert("Name".into(), "van".into());
        let commands = plan_save(
            &model,
            &[
                EntityEntry::modified("Vehicle", renamed, vehicle(3)),
                EntityEntry::deleted("Engine", engine(3, "diesel".into())),
            ],
        )
        .unwrap();

        assert_eq!(commands.len(), 1);
        let update = &commands[0];
        assert!(update.is_update());
        assert_eq!(update.values.get("Name"), Some(&Value::from("van")));
        assert_eq!(update.values.get("FuelType"), Some(&Value::Null));
        assert_eq!(update.values.get("Notes"), Some(&Value::Null));
        assert!(!update.values.contains_key("Updated"));
        assert_eq!(columns(&update.conditions), vec!["Id", "Version"]);
    }

    #[test]
    fn test_unchanged_entry_produces_no_command() {
        let model = fleet();
        let commands =
            plan_save(&model, &[EntityEntry::modified("Vehicle", vehicle(5), vehicle(5))]).unwrap();
        assert!(commands.is_empty());
    }

    #[test]
    fn test_contradictory_states_are_ambiguous() {
        let model = fleet();
        let err = plan_save(
            &model,
            &[
                EntityEntry::added("Vehicle", vehicle(1)),
                EntityEntry::deleted("Engine", engine(1, "diesel".into())),
            ],
        )
        .unwrap_err();
        assert!(matches!(err, ModelError::RowAmbiguity(msg) if msg.contains("'Engine'")));

        let err = plan_save(
            &model,
            &[
                EntityEntry::deleted("Vehicle", vehicle(1)),
                EntityEntry::added("Engine", engine(1, "diesel".into())),
            ],
        )
        .unwrap_err();
        assert!(matches!(err, ModelError::RowAmbiguity(_)));
    }

    #[test]
    fn test_conflicting_column_values_are_ambiguous() {
        let mut builder = fleet_builder();
        builder.entity("Engine").property(Property::new("Name").required());
        let model = builder.finalize().unwrap().into_model();

        let mut engine = engine(1, "diesel".into());
        engine.insert("Name".into(), "v8".into());
        let err = plan_save(
            &model,
            &[
                EntityEntry::added("Vehicle", vehicle(1)),
                EntityEntry::added("Engine", engine),
            ],
        )
        .unwrap_err();
        match err {
            ModelError::RowAmbiguity(msg) => {
                assert!(msg.contains("'Name'"));
                assert!(msg.contains("'truck'"));
                assert!(msg.contains("'v8'"));
            }
            other => panic!("Expected RowAmbiguity, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_key_is_ambiguous() {
        let model = fleet();
        let err = plan_save(&model, &[EntityEntry::added("Vehicle", row(&[("Name", "x".into())]))])
            .unwrap_err();
        assert!(matches!(err, ModelError::RowAmbiguity(msg) if msg.contains("key column 'Id'")));
    }

    #[test]
    fn test_present_dependent_must_not_read_back_absent() {
        let model = fleet();
        let err = plan_save(
            &model,
            &[
                EntityEntry::added("Vehicle", vehicle(1)),
                EntityEntry::added("Engine", engine(1, Value::Null)),
            ],
        )
        .unwrap_err();
        assert!(matches!(err, ModelError::RowAmbiguity(msg) if msg.contains("read back as absent")));
    }

    #[test]
    fn test_absent_dependent_round_trips() {
        let model = fleet();
        let commands = plan_save(&model, &[EntityEntry::added("Vehicle", vehicle(1))]).unwrap();
        let stored = &commands[0].values;

        assert!(!is_dependent_present(&model, "Engine", stored).unwrap());
        let fetched = materialize(&model, "Vehicles", stored).unwrap();
        assert_eq!(fetched.keys().collect::<Vec<_>>(), vec!["Vehicle"]);
        assert_eq!(fetched["Vehicle"].get("Name"), Some(&Value::from("truck")));

        let commands = plan_save(
            &model,
            &[
                EntityEntry::added("Vehicle", vehicle(2)),
                EntityEntry::added("Engine", engine(2, "diesel".into())),
            ],
        )
        .unwrap();
        let fetched = materialize(&model, "Vehicles", &commands[0].values).unwrap();
        assert_eq!(fetched["Engine"].get("FuelType"), Some(&Value::from("diesel")));
        assert_eq!(fetched["Engine"].get("Id"), Some(&Value::Integer(2)));
    }
}
