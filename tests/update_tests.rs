use querycore::context::MemoryManager;
use querycore::core::{Column, Row, Schema};
use querycore::executor::{collect_rows, execute_update};
use querycore::expression::{Equals, ExprRef, Expression, GetField, Literal, SetField};
use querycore::session::{FOUND_ROWS, ROW_COUNT, Warning, WarningLevel};
use querycore::storage::{AliasedTable, MemoryTable, Table};
use querycore::trace::{CollectingTracer, FieldValue};
use querycore::{Context, ContextOption, DataType, DbError, Node, Value};
use std::fmt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

fn users() -> Arc<MemoryTable> {
    let table = MemoryTable::new(
        "users",
        Schema::new(vec![
            Column::new("id", DataType::Int64).not_null(),
            Column::new("name", DataType::Text),
            Column::new("active", DataType::Boolean),
        ]),
    );
    let rows = [(1, "alice", true), (2, "bob", false), (3, "carol", false)];
    for (id, name, active) in rows {
        table
            .insert(vec![Value::Integer(id), Value::from(name), Value::Boolean(active)])
            .unwrap();
    }
    Arc::new(table)
}

fn set_active(value: bool) -> ExprRef {
    Arc::new(SetField::new(
        GetField::new(2, "active"),
        Arc::new(Literal(Value::Boolean(value))),
    ))
}

#[test]
fn test_update_counts_matched_and_changed() {
    let ctx = Context::empty();
    let table = users();
    let plan = Node::update(Node::resolved_table("db", table.clone()), vec![set_active(true)]);

    let info = execute_update(&ctx, &plan).unwrap();
    assert_eq!(info.matched, 3);
    assert_eq!(info.updated, 2);
    assert_eq!(info.warnings, 0);
    assert_eq!(info.to_string(), "Rows matched: 3  Changed: 2  Warnings: 0");

    assert!(table.rows().iter().all(|row| row[2] == Value::Boolean(true)));
    assert_eq!(ctx.session().last_query_info(ROW_COUNT), 2);
    assert_eq!(ctx.session().last_query_info(FOUND_ROWS), 1);
}

#[test]
fn test_update_with_filter() {
    let ctx = Context::empty();
    let table = users();
    let by_id = Arc::new(Equals::new(
        Arc::new(GetField::new(0, "id")),
        Arc::new(Literal(Value::Integer(2))),
    ));
    let rename = Arc::new(SetField::new(
        GetField::new(1, "name"),
        Arc::new(Literal(Value::from("robert"))),
    ));
    let plan = Node::update(
        Node::filter(by_id, Node::resolved_table("db", table.clone())),
        vec![rename],
    );

    let info = execute_update(&ctx, &plan).unwrap();
    assert_eq!((info.matched, info.updated), (1, 1));

    let names: Vec<Value> = table.rows().into_iter().map(|row| row[1].clone()).collect();
    assert_eq!(
        names,
        vec![Value::from("alice"), Value::from("robert"), Value::from("carol")]
    );
}

#[test]
fn test_update_through_alias_and_limit() {
    let ctx = Context::empty();
    let table = users();
    let aliased: Arc<dyn Table> = Arc::new(AliasedTable::new("u", table.clone()));
    let plan = Node::update(
        Node::limit(1, Node::resolved_table("db", aliased)),
        vec![set_active(false)],
    );

    let info = execute_update(&ctx, &plan).unwrap();
    assert_eq!((info.matched, info.updated), (1, 1));
    assert_eq!(table.rows()[0][2], Value::Boolean(false));
    assert_eq!(plan.database(), "db");
}

#[test]
fn test_update_unsupported_target() {
    let ctx = Context::empty();
    let values = Node::Values {
        schema: Schema::new(vec![Column::new("a", DataType::Int64)]),
        rows: vec![vec![Value::Integer(1)]],
    };
    let plan = Node::update(values, vec![]);

    let err = execute_update(&ctx, &plan).unwrap_err();
    assert!(matches!(err, DbError::UnsupportedOperation(msg) if msg == "table doesn't support UPDATE"));
}

#[test]
fn test_update_rejects_non_row_expression() {
    let ctx = Context::empty();
    let table = users();
    let plan = Node::update(
        Node::resolved_table("db", table.clone()),
        vec![Arc::new(Literal(Value::Integer(7)))],
    );

    let err = execute_update(&ctx, &plan).unwrap_err();
    assert!(matches!(err, DbError::TypeMismatch(_)));
    assert_eq!(table.rows()[1][2], Value::Boolean(false));
}

#[test]
fn test_update_stops_when_cancelled() {
    let token = CancellationToken::new();
    let ctx = Context::new(token.clone(), []);
    let table = users();
    let plan = Node::update(Node::resolved_table("db", table.clone()), vec![set_active(true)]);

    token.cancel();
    let err = execute_update(&ctx, &plan).unwrap_err();
    assert!(matches!(err, DbError::Cancelled));
    assert_eq!(table.rows()[1][2], Value::Boolean(false));
}

#[test]
fn test_update_is_traced() {
    let tracer = CollectingTracer::new();
    let ctx = Context::new(
        CancellationToken::new(),
        [ContextOption::Tracer(Arc::new(tracer.clone()))],
    );
    let plan = Node::update(Node::resolved_table("db", users()), vec![set_active(true)]);

    execute_update(&ctx, &plan).unwrap();

    let finished = tracer.finished();
    assert_eq!(finished.len(), 1);
    assert_eq!(finished[0].operation, "plan.Update");
    assert_eq!(finished[0].field("rows"), Some(&FieldValue::Int(3)));
}

#[test]
fn test_update_source_rows_are_paired() {
    let ctx = Context::empty();
    let source = Node::update(Node::resolved_table("db", users()), vec![set_active(true)]);
    let pairs = collect_rows(&ctx, source.children()[0].row_iter(&ctx).unwrap()).unwrap();

    assert_eq!(pairs.len(), 3);
    assert_eq!(
        pairs[1],
        vec![
            Value::Integer(2),
            Value::from("bob"),
            Value::Boolean(false),
            Value::Integer(2),
            Value::from("bob"),
            Value::Boolean(true),
        ]
    );
}

struct WarnOnEval(ExprRef);

impl fmt::Display for WarnOnEval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "warn({})", self.0)
    }
}

impl Expression for WarnOnEval {
    fn eval(&self, ctx: &Context, row: &Row) -> querycore::Result<Value> {
        ctx.session()
            .warn(Warning::new(WarningLevel::Note, 1265, "data truncated"));
        self.0.eval(ctx, row)
    }
}

#[test]
fn test_update_counts_only_its_own_warnings() {
    let ctx = Context::empty();
    ctx.session()
        .warn(Warning::new(WarningLevel::Warning, 1287, "left over from an earlier statement"));
    let plan = Node::update(
        Node::resolved_table("db", users()),
        vec![Arc::new(WarnOnEval(set_active(true)))],
    );

    let info = execute_update(&ctx, &plan).unwrap();
    assert_eq!(info.warnings, 3);
    assert_eq!(ctx.session().warning_count(), 4);
}

#[test]
fn test_update_respects_memory_ceiling() {
    let memory = Arc::new(MemoryManager::new(Some(8)));
    let ctx = Context::new(
        CancellationToken::new(),
        [ContextOption::Memory(memory.clone())],
    );
    let table = users();
    let plan = Node::update(Node::resolved_table("db", table.clone()), vec![set_active(true)]);

    let err = execute_update(&ctx, &plan).unwrap_err();
    assert!(matches!(err, DbError::OutOfMemory { .. }));
    assert_eq!(table.rows()[1][2], Value::Boolean(false));
    assert_eq!(memory.reserved(), 0);
}

#[test]
fn test_update_releases_row_memory() {
    let memory = Arc::new(MemoryManager::new(Some(1 << 20)));
    let ctx = Context::new(
        CancellationToken::new(),
        [ContextOption::Memory(memory.clone())],
    );
    let table = users();
    let plan = Node::update(Node::resolved_table("db", table.clone()), vec![set_active(true)]);

    let info = execute_update(&ctx, &plan).unwrap();
    assert_eq!(info.updated, 2);
    assert_eq!(memory.reserved(), 0);
}
