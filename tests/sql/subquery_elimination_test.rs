//! Inlining simple selects into the statements that read them.

use tessera::config::QuerySettings;
use tessera::expr::BinaryKind;
use tessera::model::{Col, ModelId, Schema};
use tessera::sql::{
    ColumnMapping, DbExpression, DbFromClause, DbSelectStatement, DbTableClause, SelectBuilder,
};
use tessera::value::DataType;

struct Fixture {
    schema: Schema,
    source: ModelId,
    summary: ModelId,
    archive: ModelId,
    a: Col<i64>,
    b_plus_one: Col<i64>,
    x: Col<i64>,
    y: Col<i64>,
    archive_x: Col<i64>,
    archive_y: Col<i64>,
}

/// `Summary` is filled by `SELECT A AS X, B + 1 AS Y FROM Source`.
fn fixture() -> Fixture {
    let mut schema = Schema::new();
    let source = schema.add_model("Source").unwrap();
    let a = schema.add_column::<i64>(source, "A").unwrap();
    let b = schema.add_column::<i64>(source, "B").unwrap();
    let summary = schema.add_model("Summary").unwrap();
    let x = schema.add_column::<i64>(summary, "X").unwrap();
    let y = schema.add_column::<i64>(summary, "Y").unwrap();
    let archive = schema.add_model("Archive").unwrap();
    let archive_x = schema.add_column::<i64>(archive, "X").unwrap();
    let archive_y = schema.add_column::<i64>(archive, "Y").unwrap();
    let one = schema.constant(1_i64).unwrap();
    let b_plus_one = schema.add(b, one).unwrap();
    Fixture {
        schema,
        source,
        summary,
        archive,
        a,
        b_plus_one,
        x,
        y,
        archive_x,
        archive_y,
    }
}

fn inner_select(f: &Fixture) -> DbSelectStatement {
    SelectBuilder::new(&f.schema, f.summary)
        .from(f.source)
        .unwrap()
        .select(f.a, f.x)
        .unwrap()
        .select(f.b_plus_one, f.y)
        .unwrap()
        .build()
        .unwrap()
}

fn archive_mappings(f: &Fixture) -> Vec<ColumnMapping> {
    vec![
        ColumnMapping::from_columns(&f.schema, f.x, f.archive_x.id()).unwrap(),
        ColumnMapping::from_columns(&f.schema, f.y, f.archive_y.id()).unwrap(),
    ]
}

#[test]
fn test_outer_expression_reads_inner_sources() {
    let mut f = fixture();
    let outer = f.schema.add(f.x, f.y).unwrap();
    let statement = inner_select(&f);

    let eliminated = statement
        .eliminator()
        .eliminate(&f.schema.db_expression(outer).unwrap())
        .unwrap();

    let expected = DbExpression::Binary {
        kind: BinaryKind::Add,
        left: Box::new(f.schema.db_expression(f.a).unwrap()),
        right: Box::new(f.schema.db_expression(f.b_plus_one).unwrap()),
        data_type: DataType::Int64,
    };
    assert_eq!(eliminated, expected);
    assert_eq!(eliminated.referenced_models(), vec![f.source]);
}

#[test]
fn test_columns_of_other_models_are_kept() {
    let f = fixture();
    let statement = inner_select(&f);
    let a = f.schema.db_expression(f.a).unwrap();
    assert_eq!(statement.eliminator().eliminate(&a).unwrap(), a);
}

#[test]
fn test_unprojected_column_fails() {
    let mut f = fixture();
    let outer = f.schema.add(f.x, f.y).unwrap();
    let statement = SelectBuilder::new(&f.schema, f.summary)
        .from(f.source)
        .unwrap()
        .select(f.a, f.x)
        .unwrap()
        .build()
        .unwrap();

    let db = f.schema.db_expression(outer).unwrap();
    assert!(statement.eliminator().eliminate(&db).is_err());
}

#[test]
fn test_simple_select_is_inlined_into_target() {
    let f = fixture();
    let statement = inner_select(&f);
    let target = DbTableClause::for_model(&f.schema, f.archive).unwrap();

    let inlined = statement
        .try_build_simple_select(&target, &archive_mappings(&f))
        .unwrap()
        .expect("simple select should be inlined");

    assert_eq!(inlined.model(), f.archive);
    assert_eq!(inlined.from(), statement.from());
    let sources: Vec<_> = inlined.select().iter().map(|m| m.source.clone()).collect();
    assert_eq!(
        sources,
        vec![
            f.schema.db_expression(f.a).unwrap(),
            f.schema.db_expression(f.b_plus_one).unwrap()
        ]
    );
    let targets: Vec<_> = inlined.select().iter().map(|m| m.target.model).collect();
    assert_eq!(targets, vec![f.archive, f.archive]);
}

#[test]
fn test_select_reading_its_target_is_not_inlined() {
    let f = fixture();
    let statement = inner_select(&f);
    let target = DbTableClause::for_model(&f.schema, f.source).unwrap();
    assert_eq!(statement.try_build_simple_select(&target, &[]).unwrap(), None);

    // Tables match by name, whatever the alias.
    let aliased = DbTableClause::new("Source", "s2", f.source);
    assert_eq!(statement.try_build_simple_select(&aliased, &[]).unwrap(), None);
}

#[test]
fn test_aggregate_and_paged_selects_are_not_inlined() {
    let mut f = fixture();
    let total = f.schema.sum(f.a).unwrap();
    let target = DbTableClause::for_model(&f.schema, f.archive).unwrap();

    let aggregate = SelectBuilder::new(&f.schema, f.summary)
        .from(f.source)
        .unwrap()
        .select(total, f.x)
        .unwrap()
        .build()
        .unwrap();
    assert!(aggregate.is_aggregate());
    assert_eq!(aggregate.try_build_simple_select(&target, &[]).unwrap(), None);

    let paged = SelectBuilder::new(&f.schema, f.summary)
        .from(f.source)
        .unwrap()
        .select(f.a, f.x)
        .unwrap()
        .fetch(10)
        .build()
        .unwrap();
    assert!(!paged.is_simple());
    assert_eq!(paged.try_build_simple_select(&target, &[]).unwrap(), None);
}

#[test]
fn test_insert_select_nests_when_elimination_is_off() {
    let f = fixture();
    let statement = inner_select(&f);
    let target = DbTableClause::for_model(&f.schema, f.archive).unwrap();
    let mappings = archive_mappings(&f);

    let settings = QuerySettings {
        eliminate_subqueries: false,
        ..QuerySettings::default()
    };
    let nested = statement.build_insert_select(&target, &mappings, &settings).unwrap();
    assert_eq!(nested.model(), f.archive);
    assert_eq!(nested.select(), mappings.as_slice());
    assert_eq!(nested.from(), Some(&DbFromClause::Select(Box::new(statement.clone()))));

    let inlined = statement
        .build_insert_select(&target, &mappings, &QuerySettings::default())
        .unwrap();
    assert_eq!(inlined.from(), statement.from());
}
