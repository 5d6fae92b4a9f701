use tablesplit::{
    CommandKind, EntityEntry, FinalizedModel, ModelBuilder, ModelError, Property, Row, Value,
    ValueGeneration,
};

fn row(pairs: &[(&str, Value)]) -> Row {
    pairs
        .iter()
        .map(|(name, value)| (name.to_string(), value.clone()))
        .collect()
}

/// Customer(Customers) <- Order(Orders) with an optional OrderDetails
/// sharing the Orders rows.
fn shop() -> FinalizedModel {
    let mut builder = ModelBuilder::new();
    builder
        .entity("Customer")
        .property(Property::new("Id").key())
        .property(Property::new("Name").required());
    assert!(builder.entity("Customer").to_table("Customers"));

    builder
        .entity("Order")
        .property(Property::new("Id").key())
        .property(Property::new("CustomerId").required())
        .property(Property::new("Version").required().concurrency_token())
        .property(Property::new("PlacedAt").generated(ValueGeneration::OnAdd));
    assert!(builder.entity("Order").to_table("Orders"));

    builder
        .entity("OrderDetails")
        .property(Property::new("Id").key())
        .property(Property::new("ShippingAddress").required())
        .property(Property::new("GiftNote"));
    assert!(builder.entity("OrderDetails").to_table("Orders"));

    builder.one_to_one("Order", "OrderDetails");
    builder.many_to_one("Order", "Customer", &["CustomerId"]);
    builder.finalize().unwrap()
}

fn order(id: i64) -> Row {
    row(&[
        ("Id", Value::Integer(id)),
        ("CustomerId", Value::Integer(1)),
        ("Version", Value::Integer(1)),
        ("PlacedAt", Value::Null),
    ])
}

fn details(id: i64, address: Value) -> Row {
    row(&[
        ("Id", Value::Integer(id)),
        ("ShippingAddress", address),
        ("GiftNote", Value::Null),
    ])
}

#[test]
fn test_absent_optional_dependent_reads_back_absent() {
    let model = shop();
    let commands = model.plan_save(&[EntityEntry::added("Order", order(1))]).unwrap();
    assert_eq!(commands.len(), 1);

    let stored = &commands[0].values;
    assert!(!stored.contains_key("PlacedAt"));
    assert!(!model.is_dependent_present("OrderDetails", stored).unwrap());

    let fetched = model.materialize("Orders", stored).unwrap();
    assert!(fetched.contains_key("Order"));
    assert!(!fetched.contains_key("OrderDetails"));
}

#[test]
fn test_present_dependent_reads_back_present() {
    let model = shop();
    let commands = model
        .plan_save(&[
            EntityEntry::added("Order", order(2)),
            EntityEntry::added("OrderDetails", details(2, "Main St".into())),
        ])
        .unwrap();

    let fetched = model.materialize("Orders", &commands[0].values).unwrap();
    assert_eq!(
        fetched["OrderDetails"].get("ShippingAddress"),
        Some(&Value::from("Main St"))
    );
}

#[test]
fn test_parents_are_inserted_first_and_deleted_last() {
    let model = shop();
    let commands = model
        .plan_save(&[
            EntityEntry::added("Order", order(5)),
            EntityEntry::deleted("Customer", row(&[("Id", Value::Integer(9)), ("Name", "Old".into())])),
            EntityEntry::added("Customer", row(&[("Id", Value::Integer(1)), ("Name", "Ann".into())])),
            EntityEntry::deleted("Order", order(6)),
        ])
        .unwrap();

    let plan: Vec<_> = commands.iter().map(|c| (c.kind, c.table.as_str())).collect();
    assert_eq!(
        plan,
        vec![
            (CommandKind::Delete, "Orders"),
            (CommandKind::Delete, "Customers"),
            (CommandKind::Insert, "Customers"),
            (CommandKind::Insert, "Orders"),
        ]
    );
}

#[test]
fn test_ambiguity_aborts_only_that_save() {
    let model = shop();
    let err = model
        .plan_save(&[
            EntityEntry::added("Order", order(3)),
            EntityEntry::deleted("OrderDetails", details(3, "Main St".into())),
        ])
        .unwrap_err();
    assert!(matches!(err, ModelError::RowAmbiguity(_)));

    // the model is still usable
    assert!(model.plan_save(&[EntityEntry::added("Order", order(3))]).is_ok());
}

#[test]
fn test_dependent_without_presence_data_is_ambiguous() {
    let model = shop();
    let err = model
        .plan_save(&[
            EntityEntry::added("Order", order(4)),
            EntityEntry::added("OrderDetails", details(4, Value::Null)),
        ])
        .unwrap_err();
    assert!(matches!(err, ModelError::RowAmbiguity(msg) if msg.contains("OrderDetails")));
}

#[test]
fn test_update_checks_concurrency_token() {
    let model = shop();
    let mut changed = order(7);
    changed.insert("CustomerId".into(), Value::Integer(2));
    changed.insert("Version".into(), Value::Integer(2));

    let commands = model
        .plan_save(&[EntityEntry::modified("Order", changed, order(7))])
        .unwrap();
    let update = &commands[0];
    assert!(update.is_update());
    assert_eq!(update.values.get("Version"), Some(&Value::Integer(2)));
    assert_eq!(update.conditions.get("Version"), Some(&Value::Integer(1)));
    assert_eq!(update.conditions.get("Id"), Some(&Value::Integer(7)));
}

#[test]
fn test_optional_column_does_not_decide_presence_when_required_ones_exist() {
    let model = shop();
    let rule = model.model().columns().presence_rule("OrderDetails").unwrap();
    assert_eq!(rule.required_columns, vec!["ShippingAddress"]);
    assert_eq!(rule.optional_columns, vec!["GiftNote"]);

    let mut stored = order(8);
    stored.extend(details(8, "Main St".into()));
    assert_eq!(stored.get("GiftNote"), Some(&Value::Null));
    assert!(model.is_dependent_present("OrderDetails", &stored).unwrap());

    stored.insert("ShippingAddress".into(), Value::Null);
    stored.insert("GiftNote".into(), "hello".into());
    assert!(!model.is_dependent_present("OrderDetails", &stored).unwrap());
}

/// Employees reference their manager in the same table.
fn staff() -> FinalizedModel {
    let mut builder = ModelBuilder::new();
    builder
        .entity("Employee")
        .property(Property::new("Id").key())
        .property(Property::new("ManagerId"));
    assert!(builder.entity("Employee").to_table("Employees"));
    builder.many_to_one("Employee", "Employee", &["ManagerId"]);
    builder.finalize().unwrap()
}

fn employee(id: i64, manager: Value) -> Row {
    row(&[("Id", Value::Integer(id)), ("ManagerId", manager)])
}

fn keys(commands: &[tablesplit::RowCommand]) -> Vec<Value> {
    commands.iter().map(|command| command.key["Id"].clone()).collect()
}

#[test]
fn test_managers_are_inserted_before_their_reports() {
    let model = staff();
    let commands = model
        .plan_save(&[
            EntityEntry::added("Employee", employee(3, Value::Integer(2))),
            EntityEntry::added("Employee", employee(2, Value::Integer(1))),
            EntityEntry::added("Employee", employee(1, Value::Null)),
            EntityEntry::added("Employee", employee(4, Value::Integer(99))),
        ])
        .unwrap();

    assert!(commands.iter().all(|command| command.is_insert()));
    assert_eq!(
        keys(&commands),
        vec![Value::Integer(1), Value::Integer(2), Value::Integer(3), Value::Integer(4)]
    );
}

#[test]
fn test_reports_are_deleted_before_their_managers() {
    let model = staff();
    let commands = model
        .plan_save(&[
            EntityEntry::deleted("Employee", employee(1, Value::Null)),
            EntityEntry::deleted("Employee", employee(2, Value::Integer(1))),
            EntityEntry::added("Employee", employee(6, Value::Integer(5))),
            EntityEntry::added("Employee", employee(5, Value::Null)),
        ])
        .unwrap();

    let plan: Vec<_> = commands.iter().map(|command| command.kind).collect();
    assert_eq!(
        plan,
        vec![CommandKind::Delete, CommandKind::Delete, CommandKind::Insert, CommandKind::Insert]
    );
    assert_eq!(
        keys(&commands),
        vec![Value::Integer(2), Value::Integer(1), Value::Integer(5), Value::Integer(6)]
    );
}

#[test]
fn test_circular_references_keep_entry_order() {
    let model = staff();
    let commands = model
        .plan_save(&[
            EntityEntry::added("Employee", employee(8, Value::Integer(7))),
            EntityEntry::added("Employee", employee(7, Value::Integer(8))),
        ])
        .unwrap();
    assert_eq!(keys(&commands), vec![Value::Integer(8), Value::Integer(7)]);
}
