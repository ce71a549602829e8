//! Integration tests for result sets, columns and ref cursors.

use chrono::{NaiveDate, NaiveDateTime};
use oracle_bound_rs::native::constants::{
    AL32UTF8_CHARSET_ID, LONG_FETCH_BYTES, OCI_ATTR_CHARSET_ID, SQLT_LNG, SQLT_RSET,
};
use oracle_bound_rs::native::sim::{SimColumn, SimInterface, SimOperation, SimQuery, SimScript};
use oracle_bound_rs::{
    ClientInfo, ConnectParams, Connection, Error, HandleOwner, OracleValue, ResultSet, ValueKind,
};
use pretty_assertions::assert_eq;
use std::rc::Rc;

const SESSION_HANDLES: usize = 5;
const EMP: &str = "SELECT id, name, hired, bonus FROM emp ORDER BY id";

fn connect(sim: &Rc<SimInterface>) -> Connection {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::TRACE)
        .with_test_writer()
        .try_init();
    let params = ConnectParams::new("ORCL", "scott", "tiger");
    Connection::open_with_client(sim.clone(), &params, &ClientInfo::unknown("tests")).unwrap()
}

fn at(y: i32, mo: u32, d: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(y, mo, d)
        .unwrap()
        .and_hms_opt(9, 30, 0)
        .unwrap()
}

fn emp_query(rows: i64) -> SimQuery {
    SimQuery::new(vec![
        SimColumn::number("ID"),
        SimColumn::text("NAME", 20),
        SimColumn::date("HIRED"),
        SimColumn::number("BONUS"),
    ])
    .rows((1..=rows).map(|id| {
        vec![
            id.into(),
            format!("EMP{}", id).into(),
            at(2000, 1, id as u32).into(),
            if id % 2 == 0 { OracleValue::from(id * 100) } else { OracleValue::Null },
        ]
    }))
}

fn ids(result_set: &mut ResultSet<'_>) -> Vec<i64> {
    let mut ids = Vec::new();
    while result_set.next().unwrap() {
        ids.push(result_set.column("ID").unwrap().to_i64().unwrap());
    }
    ids
}

#[test]
fn test_batch_boundaries() {
    let sim = Rc::new(SimInterface::new());
    sim.register(EMP, SimScript::query(emp_query(5)));
    let conn = connect(&sim);

    let mut rows = conn.select_with_fetch_size(EMP, 2).unwrap();
    assert_eq!(rows.fetch_size(), 2);
    assert_eq!(rows.rows_fetched(), 2);
    assert_eq!(sim.stats().fetch_calls, 1);

    let mut seen = Vec::new();
    for _ in 0..5 {
        assert!(!rows.is_eod());
        assert!(rows.next().unwrap());
        seen.push(rows.column("ID").unwrap().to_i64().unwrap());
    }
    assert_eq!(seen, vec![1, 2, 3, 4, 5]);
    assert!(!rows.next().unwrap());
    assert!(rows.is_eod());
    assert_eq!(rows.rows_fetched(), 5);
    assert_eq!(sim.stats().fetch_calls, 3);

    // further calls stay at the end without fetching
    assert!(!rows.next().unwrap());
    assert_eq!(sim.stats().fetch_calls, 3);
}

#[test]
fn test_exact_multiple_needs_empty_batch() {
    let sim = Rc::new(SimInterface::new());
    sim.register(EMP, SimScript::query(emp_query(4)));
    let conn = connect(&sim);

    let mut rows = conn.select_with_fetch_size(EMP, 2).unwrap();
    assert_eq!(ids(&mut rows), vec![1, 2, 3, 4]);
    assert!(rows.is_eod());
    assert_eq!(sim.stats().fetch_calls, 3);
}

#[test]
fn test_empty_result() {
    let sim = Rc::new(SimInterface::new());
    sim.register(EMP, SimScript::query(emp_query(0)));
    let conn = connect(&sim);

    let mut rows = conn.select(EMP).unwrap();
    assert!(rows.is_eod());
    assert!(!rows.next().unwrap());
    assert_eq!(rows.rows_fetched(), 0);
    assert_eq!(sim.stats().fetch_calls, 1);
}

#[test]
fn test_zero_fetch_size_is_one() {
    let sim = Rc::new(SimInterface::new());
    sim.register(EMP, SimScript::query(emp_query(3)));
    let conn = connect(&sim);

    let mut rows = conn.select_with_fetch_size(EMP, 0).unwrap();
    assert_eq!(rows.fetch_size(), 1);
    assert_eq!(ids(&mut rows), vec![1, 2, 3]);
    assert_eq!(sim.stats().fetch_calls, 4);
}

#[test]
fn test_column_decoding() {
    let sim = Rc::new(SimInterface::new());
    sim.register(EMP, SimScript::query(emp_query(2)));
    let conn = connect(&sim);
    let mut rows = conn.select(EMP).unwrap();

    assert_eq!(rows.column_count(), 4);
    let names: Vec<&str> = rows.columns().iter().map(|c| c.name()).collect();
    assert_eq!(names, vec!["ID", "NAME", "HIRED", "BONUS"]);
    let kinds: Vec<ValueKind> = rows.columns().iter().map(|c| c.kind()).collect();
    assert_eq!(
        kinds,
        vec![ValueKind::Number, ValueKind::Text, ValueKind::Date, ValueKind::Number]
    );

    assert!(rows.next().unwrap());
    assert_eq!(rows.column("name").unwrap().to_text().unwrap(), "EMP1");
    assert_eq!(rows.column("Hired").unwrap().to_date_time().unwrap(), at(2000, 1, 1));
    assert!(rows.column("BONUS").unwrap().is_null());
    assert_eq!(rows.column("BONUS").unwrap().value().unwrap(), OracleValue::Null);

    assert!(rows.next().unwrap());
    let bonus = rows.column(4usize).unwrap();
    assert!(!bonus.is_null());
    assert_eq!(bonus.to_decimal().unwrap(), "200");
    assert_eq!(bonus.to_f64().unwrap(), 200.0);
    assert_eq!(rows.column("ID").unwrap().value().unwrap(), OracleValue::from(2));
}

#[test]
fn test_reading_before_next_sees_first_row() {
    let sim = Rc::new(SimInterface::new());
    sim.register(EMP, SimScript::query(emp_query(2)));
    let conn = connect(&sim);
    let mut rows = conn.select(EMP).unwrap();

    assert_eq!(rows.column("ID").unwrap().to_i64().unwrap(), 1);
    assert!(rows.next().unwrap());
    assert_eq!(rows.column("ID").unwrap().to_i64().unwrap(), 1);
}

#[test]
fn test_no_current_row_after_end() {
    let sim = Rc::new(SimInterface::new());
    sim.register(EMP, SimScript::query(emp_query(1)));
    let conn = connect(&sim);
    let mut rows = conn.select(EMP).unwrap();

    assert!(rows.next().unwrap());
    assert!(!rows.next().unwrap());
    let id = rows.column("ID").unwrap();
    assert!(id.is_null());
    assert!(matches!(id.to_i64(), Err(Error::NoCurrentRow { .. })));
}

#[test]
fn test_column_lookup_symmetry() {
    let sim = Rc::new(SimInterface::new());
    sim.register(EMP, SimScript::query(emp_query(1)));
    let conn = connect(&sim);
    let rows = conn.select(EMP).unwrap();

    for (position, column) in rows.columns().iter().enumerate() {
        let by_name = rows.column(column.name()).unwrap().column();
        let by_ordinal = rows.column(position + 1).unwrap().column();
        assert!(std::ptr::eq(by_name, by_ordinal));
        assert!(std::ptr::eq(by_name, column));
        assert_eq!(column.position(), position + 1);
    }

    assert!(matches!(rows.column("SALARY"), Err(Error::ColumnNotFound { .. })));
    assert!(matches!(rows.column(0usize), Err(Error::ColumnNotFound { .. })));
    assert!(matches!(rows.column(5usize), Err(Error::ColumnNotFound { .. })));
}

#[test]
fn test_duplicate_column_names_resolve_to_first() {
    let sql = "SELECT a.id, b.id FROM a, b";
    let sim = Rc::new(SimInterface::new());
    sim.register(
        sql,
        SimScript::query(
            SimQuery::new(vec![SimColumn::number("ID"), SimColumn::number("id")])
                .row(vec![1.into(), 2.into()]),
        ),
    );
    let conn = connect(&sim);
    let mut rows = conn.select(sql).unwrap();
    assert!(rows.next().unwrap());
    assert_eq!(rows.column("id").unwrap().to_i64().unwrap(), 1);
    assert_eq!(rows.column(2usize).unwrap().to_i64().unwrap(), 2);
}

#[test]
fn test_column_type_mismatch_grid() {
    let sql = "SELECT n, d, t, c FROM mixed";
    let sim = Rc::new(SimInterface::new());
    sim.register(
        sql,
        SimScript::query(
            SimQuery::new(vec![
                SimColumn::number("N"),
                SimColumn::date("D"),
                SimColumn::text("T", 10),
                SimColumn::raw("C", SQLT_RSET, 8),
            ])
            .row(vec![1.into(), at(2001, 2, 3).into(), "t".into(), OracleValue::Null]),
        ),
    );
    let conn = connect(&sim);
    let mut rows = conn.select(sql).unwrap();
    assert!(rows.next().unwrap());

    for column in ["N", "D", "T", "C"] {
        let value = rows.column(column).unwrap();
        let kind = value.kind();
        let reads = [
            (ValueKind::Number, value.to_decimal().map(drop)),
            (ValueKind::Date, value.to_date_time().map(drop)),
            (ValueKind::Text, value.to_text().map(drop)),
        ];
        for (read_kind, result) in reads {
            if read_kind == kind {
                assert!(result.is_ok(), "{} reads as {}", column, read_kind);
            } else {
                assert!(
                    matches!(result, Err(Error::BadOutputType { is_null: false, .. })),
                    "{} rejects {}",
                    column,
                    read_kind
                );
            }
        }
    }
    assert!(matches!(
        rows.column("C").unwrap().value(),
        Ok(OracleValue::Null)
    ));
}

#[test]
fn test_text_define_sets_charset() {
    let sim = Rc::new(SimInterface::new());
    sim.register(EMP, SimScript::query(emp_query(1)));
    let conn = connect(&sim);
    let _rows = conn.select(EMP).unwrap();
    assert_eq!(
        sim.attribute(OCI_ATTR_CHARSET_ID),
        Some(AL32UTF8_CHARSET_ID.to_string())
    );
}

#[test]
fn test_long_column_is_capped() {
    let sql = "SELECT notes FROM docs";
    let sim = Rc::new(SimInterface::new());
    sim.register(
        sql,
        SimScript::query(
            SimQuery::new(vec![SimColumn::raw("NOTES", SQLT_LNG, 0)]).row(vec!["long text".into()]),
        ),
    );
    let conn = connect(&sim);
    let mut rows = conn.select(sql).unwrap();
    assert_eq!(rows.columns()[0].element_size(), LONG_FETCH_BYTES + 1);
    assert!(rows.next().unwrap());
    assert_eq!(rows.column("NOTES").unwrap().to_text().unwrap(), "long text");
}

#[test]
fn test_unsupported_column_type() {
    let sql = "SELECT doc FROM xml_docs";
    let sim = Rc::new(SimInterface::new());
    sim.register(
        sql,
        SimScript::query(SimQuery::new(vec![SimColumn::raw("DOC", 108, 4000)])),
    );
    let conn = connect(&sim);

    let err = conn.select(sql).unwrap_err();
    assert!(matches!(err, Error::UnsupportedNativeType { ref name, type_code: 108, .. } if name == "DOC"));
    assert_eq!(sim.live_handles(), SESSION_HANDLES);
    assert_eq!(sim.stats().invalid_frees, 0);
}

#[test]
fn test_describe_and_define_failures_leave_nothing() {
    for operation in [SimOperation::ParamGet, SimOperation::DefineByPos, SimOperation::Fetch] {
        let sim = Rc::new(SimInterface::new());
        sim.register(EMP, SimScript::query(emp_query(3)));
        let conn = connect(&sim);
        sim.fail_next(operation, 1013, "user requested cancel of current operation");

        let err = conn.select(EMP).unwrap_err();
        assert_eq!(err.ora_code(), Some(1013), "{:?}", operation);
        assert_eq!(sim.live_handles(), SESSION_HANDLES, "{:?}", operation);
        assert_eq!(sim.stats().invalid_frees, 0, "{:?}", operation);
    }
}

#[test]
fn test_define_failure_names_column() {
    let sim = Rc::new(SimInterface::new());
    sim.register(EMP, SimScript::query(emp_query(1)));
    let conn = connect(&sim);
    sim.fail_next(SimOperation::DefineByPos, 1007, "variable not in select list");

    let err = conn.select(EMP).unwrap_err();
    assert!(matches!(err, Error::NativeCallFailed { context: Some(ref c), .. } if c == "ID"));
}

#[test]
fn test_fetch_failure_mid_stream() {
    let sim = Rc::new(SimInterface::new());
    sim.register(EMP, SimScript::query(emp_query(3)));
    let conn = connect(&sim);
    let mut rows = conn.select_with_fetch_size(EMP, 2).unwrap();

    assert!(rows.next().unwrap());
    assert!(rows.next().unwrap());
    sim.fail_next(SimOperation::Fetch, 3113, "end-of-file on communication channel");
    let err = rows.next().unwrap_err();
    assert_eq!(err.ora_code(), Some(3113));
    assert_eq!(rows.rows_fetched(), 2);
    assert!(!rows.is_eod());
}

#[test]
fn test_missing_table() {
    let sim = Rc::new(SimInterface::new());
    let conn = connect(&sim);
    let err = conn.select("SELECT * FROM nowhere").unwrap_err();
    assert_eq!(err.ora_code(), Some(942));
    assert_eq!(sim.live_handles(), SESSION_HANDLES);
}

#[test]
fn test_connection_select_owns_statement() {
    let sim = Rc::new(SimInterface::new());
    sim.register(EMP, SimScript::query(emp_query(3)));
    let conn = connect(&sim);
    {
        let mut rows = conn.select(EMP).unwrap();
        assert_eq!(rows.owner(), HandleOwner::OwnedByStatementSelect);
        assert_eq!(sim.live_handles(), SESSION_HANDLES + 1);
        assert_eq!(ids(&mut rows), vec![1, 2, 3]);
    }
    assert_eq!(sim.live_handles(), SESSION_HANDLES);
    assert_eq!(sim.stats().invalid_frees, 0);
}

#[test]
fn test_statement_select_is_repeatable() {
    let sql = "SELECT id, name, hired, bonus FROM emp WHERE dept = :nDept";
    let sim = Rc::new(SimInterface::new());
    sim.register(sql, SimScript::query(emp_query(2)));
    let conn = connect(&sim);
    let mut stmt = conn.prepare(sql).unwrap();
    stmt.bind(":nDept").unwrap().set_i64(10).unwrap();

    for dept in [10, 20] {
        stmt.parameter_mut(":nDept").unwrap().set_i64(dept).unwrap();
        let mut rows = stmt.select().unwrap();
        assert_eq!(rows.owner(), HandleOwner::OwnedByStatementSelect);
        assert_eq!(ids(&mut rows), vec![1, 2]);
    }
    let executions = sim.executions();
    assert_eq!(executions.len(), 2);
    assert_eq!(executions[1].iters, 0);
    assert_eq!(executions[1].binds, vec![(":nDept".to_string(), OracleValue::from(20))]);

    assert_eq!(sim.live_handles(), SESSION_HANDLES + 1);
    drop(stmt);
    assert_eq!(sim.live_handles(), SESSION_HANDLES);
}

#[test]
fn test_into_result_set_takes_handle() {
    let sim = Rc::new(SimInterface::new());
    sim.register(EMP, SimScript::query(emp_query(2)));
    let conn = connect(&sim);
    let stmt = conn.prepare(EMP).unwrap();

    let mut rows = stmt.into_result_set().unwrap();
    assert_eq!(rows.owner(), HandleOwner::OwnedByThisResultSet);
    assert_eq!(sim.live_handles(), SESSION_HANDLES + 1);
    assert_eq!(ids(&mut rows), vec![1, 2]);

    rows.release().unwrap();
    rows.release().unwrap();
    assert_eq!(sim.live_handles(), SESSION_HANDLES);
    drop(rows);
    assert_eq!(sim.stats().invalid_frees, 0);
}

#[test]
fn test_cursor_parameter() {
    let sql = "BEGIN open_emp(:nDept, :cEmp); END;";
    let sim = Rc::new(SimInterface::new());
    sim.register(sql, SimScript::block().cursor(":cEmp", emp_query(3)));
    let conn = connect(&sim);
    let mut stmt = conn.prepare(sql).unwrap();
    stmt.bind(":nDept").unwrap().set_i64(10).unwrap();
    stmt.bind_cursor(":cEmp", 2).unwrap();

    let cursor = stmt.parameter_mut(":cEmp").unwrap();
    assert!(matches!(cursor.to_result_set(), Err(Error::StatementNotExecuted { .. })));

    stmt.execute().unwrap();
    let cursor = stmt.parameter_mut(":cEmp").unwrap();
    let first: *const ResultSet<'_> = cursor.to_result_set().unwrap();
    let rows = cursor.to_result_set().unwrap();
    assert!(std::ptr::eq(first, rows));
    assert_eq!(rows.owner(), HandleOwner::OwnedByParameterCursor);
    assert_eq!(rows.fetch_size(), 2);
    assert_eq!(ids(rows), vec![1, 2, 3]);
    assert_eq!(sim.stats().fetch_calls, 2);

    // statement handle plus the cursor sub-statement handle
    assert_eq!(sim.live_handles(), SESSION_HANDLES + 2);
    drop(stmt);
    assert_eq!(sim.live_handles(), SESSION_HANDLES);
    assert_eq!(sim.stats().invalid_frees, 0);
}

#[test]
fn test_cursor_reexecution_builds_new_result_set() {
    let sql = "BEGIN open_emp(:cEmp); END;";
    let sim = Rc::new(SimInterface::new());
    sim.register(sql, SimScript::block().cursor(":cEmp", emp_query(2)));
    let conn = connect(&sim);
    let mut stmt = conn.prepare(sql).unwrap();
    stmt.bind(":cEmp").unwrap();

    for _ in 0..2 {
        stmt.execute().unwrap();
        let rows = stmt.parameter_mut(":cEmp").unwrap().to_result_set().unwrap();
        assert_eq!(ids(rows), vec![1, 2]);
    }
    assert_eq!(sim.live_handles(), SESSION_HANDLES + 2);
}
