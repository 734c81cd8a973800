//! Building statements and deriving temp and key table statements.

use tessera::config::QuerySettings;
use tessera::model::{Col, ModelId, ModelKind, Schema};
use tessera::sql::{
    DbFromClause, DbQueryStatement, DbSelectStatement, DbTableClause, SelectBuilder, SortDirection, UnionKind,
};

struct Orders {
    schema: Schema,
    order: ModelId,
    id: Col<i64>,
    customer: Col<String>,
    amount: Col<i64>,
}

fn orders() -> Orders {
    let mut schema = Schema::new();
    let order = schema.add_model("Order").unwrap();
    let id = schema.add_column::<i64>(order, "Id").unwrap();
    let customer = schema.add_column::<String>(order, "Customer").unwrap();
    let amount = schema.add_column::<i64>(order, "Amount").unwrap();
    Orders {
        schema,
        order,
        id,
        customer,
        amount,
    }
}

fn select_all(schema: &Schema, model: ModelId) -> DbSelectStatement {
    SelectBuilder::new(schema, model)
        .from(model)
        .unwrap()
        .auto_select(model)
        .unwrap()
        .build()
        .unwrap()
}

#[test]
fn test_grouped_select_is_aggregate() {
    let Orders {
        mut schema,
        order,
        customer,
        amount,
        ..
    } = orders();
    let totals = schema.add_model("CustomerTotal").unwrap();
    let total_customer = schema.add_column::<String>(totals, "Customer").unwrap();
    let total_amount = schema.add_column::<i64>(totals, "Amount").unwrap();
    let sum = schema.sum(amount).unwrap();
    let zero = schema.constant(0_i64).unwrap();
    let positive = schema.gt(sum, zero).unwrap();

    let statement = SelectBuilder::new(&schema, totals)
        .from(order)
        .unwrap()
        .select(customer, total_customer)
        .unwrap()
        .select(sum, total_amount)
        .unwrap()
        .group_by(customer)
        .unwrap()
        .having(positive)
        .unwrap()
        .order_by(customer, SortDirection::Descending)
        .unwrap()
        .build()
        .unwrap();

    assert!(statement.is_aggregate());
    assert!(!statement.is_simple());
    assert_eq!(statement.group_by().map(<[_]>::len), Some(1));
    assert!(statement.having().is_some());
    assert_eq!(statement.order_by()[0].direction, SortDirection::Descending);
    assert_eq!(statement.source_of(total_amount.id()), Some(&schema.db_expression(sum).unwrap()));
}

#[test]
fn test_plain_select_is_simple() {
    let f = orders();
    let statement = select_all(&f.schema, f.order);
    assert!(!statement.is_aggregate());
    assert!(statement.is_simple());
    assert_eq!(statement.group_by(), None);
    assert_eq!(statement.select().len(), 3);
    assert_eq!(
        statement.from(),
        Some(&DbFromClause::Table(DbTableClause::new("Order", "Order", f.order)))
    );
}

#[test]
fn test_empty_projection_fails() {
    let f = orders();
    assert!(SelectBuilder::new(&f.schema, f.order).from(f.order).unwrap().build().is_err());
}

#[test]
fn test_remove_system_columns() {
    let Orders {
        mut schema, order, id, ..
    } = orders();
    let row_id = schema.add_system_column::<i64>(order, "RowId").unwrap();
    let statement = SelectBuilder::new(&schema, order)
        .from(order)
        .unwrap()
        .select(id, id)
        .unwrap()
        .select(row_id, row_id)
        .unwrap()
        .build()
        .unwrap();

    let trimmed = statement.remove_system_columns(&schema).unwrap();
    let targets: Vec<_> = trimmed.select().iter().map(|m| m.target.name.as_str()).collect();
    assert_eq!(targets, vec!["Id"]);
    assert_eq!(trimmed.from(), statement.from());

    let without_system = trimmed.remove_system_columns(&schema).unwrap();
    assert_eq!(without_system, trimmed);
}

#[test]
fn test_clone_of_unknown_model_leaves_name_free() {
    let Orders { mut schema, order, .. } = orders();
    let mut other = Schema::new();
    for name in ["A", "B", "C"] {
        other.add_model(name).unwrap();
    }
    let unknown = other.model_by_name("C").unwrap();

    assert!(schema.clone_model(unknown, "OrderCopy", ModelKind::TempTable).is_err());
    let copy = schema.clone_model(order, "OrderCopy", ModelKind::TempTable).unwrap();
    assert_eq!(schema.model(copy).unwrap().columns().len(), 3);
}

#[test]
fn test_sequential_key_requires_primary_key() {
    let Orders { mut schema, order, .. } = orders();
    let statement = DbQueryStatement::from(select_all(&schema, order));
    assert!(statement
        .sequential_key_select_statement(&mut schema, &QuerySettings::default())
        .is_err());
}

#[test]
fn test_sequential_key_of_simple_select_is_inlined() {
    let Orders {
        mut schema, order, id, ..
    } = orders();
    schema.set_primary_key(order, &[id.id()]).unwrap();
    let select = select_all(&schema, order);
    let statement = DbQueryStatement::from(select.clone());
    let settings = QuerySettings::default();

    let keys = statement.sequential_key_select_statement(&mut schema, &settings).unwrap();
    let key_model = schema.model(keys.model()).unwrap();
    assert_eq!(key_model.name(), "#Order_SequentialKey");
    assert_eq!(key_model.kind(), ModelKind::SequentialKey);
    assert_eq!(key_model.columns().len(), 2);
    assert_eq!(key_model.primary_key().len(), 1);

    let row_id = schema.column_by_name(keys.model(), "sys_row_id").unwrap();
    assert!(schema.column(row_id).unwrap().is_system());

    assert_eq!(keys.select().len(), 1);
    assert_eq!(keys.select()[0].source, schema.db_expression(id).unwrap());
    assert_eq!(keys.from(), select.from());

    let again = statement.sequential_key_select_statement(&mut schema, &settings).unwrap();
    assert_eq!(schema.model(again.model()).unwrap().name(), "#Order_SequentialKey2");
}

#[test]
fn test_sequential_key_of_paged_select_is_nested() {
    let Orders {
        mut schema, order, id, ..
    } = orders();
    schema.set_primary_key(order, &[id.id()]).unwrap();
    let paged = SelectBuilder::new(&schema, order)
        .from(order)
        .unwrap()
        .auto_select(order)
        .unwrap()
        .order_by(id, SortDirection::Ascending)
        .unwrap()
        .offset(20)
        .fetch(10)
        .build()
        .unwrap();
    let statement = DbQueryStatement::from(paged.clone());

    let keys = statement
        .sequential_key_select_statement(&mut schema, &QuerySettings::default())
        .unwrap();
    assert_eq!(keys.from(), Some(&DbFromClause::Select(Box::new(paged))));
    assert_eq!(keys.offset(), None);
    assert_eq!(keys.fetch(), None);
}

#[test]
fn test_temp_table_from_select() {
    let Orders { mut schema, order, .. } = orders();
    let select = select_all(&schema, order);
    let statement = DbQueryStatement::from(select.clone());

    let fill = statement
        .build_to_temp_table_statement(&mut schema, &QuerySettings::default())
        .unwrap();
    let temp = schema.model(fill.model()).unwrap();
    assert_eq!(temp.name(), "#Order_Temp");
    assert_eq!(temp.kind(), ModelKind::TempTable);
    assert_eq!(temp.columns().len(), 3);
    assert_eq!(fill.select().len(), 3);
    assert_eq!(fill.from(), select.from());
}

#[test]
fn test_temp_table_from_union_is_nested() {
    let Orders { mut schema, order, .. } = orders();
    let select = select_all(&schema, order);
    let union = SelectBuilder::union(&schema, select.clone(), select, UnionKind::UnionAll).unwrap();
    let statement = DbQueryStatement::from(union.clone());

    let settings = QuerySettings {
        temp_table_prefix: "tmp_".into(),
        ..QuerySettings::default()
    };
    let fill = statement.build_to_temp_table_statement(&mut schema, &settings).unwrap();
    assert_eq!(schema.model(fill.model()).unwrap().name(), "tmp_Order_Temp");
    assert_eq!(fill.from(), Some(&DbFromClause::Union(Box::new(union))));
    assert_eq!(fill.select().len(), 3);
}
