use std::time::Duration;

use clickhouse_session::prelude::*;
use clickhouse_session::test_utils::MockExecutor;

async fn open() -> Result<(Connection, std::sync::Arc<MockExecutor>), SessionError> {
    let mock = MockExecutor::new().shared();
    let conn = ConnectionOptionsBuilder::new("localhost")
        .server_info("UTC", "23.3.1")
        .connect(mock.clone())
        .await?;
    Ok((conn, mock))
}

#[test]
fn input_with_one_literal_is_a_streaming_insert() -> Result<(), SessionError> {
    let kind = classify("insert into t select * from input('a Int32, b String')")?;
    let StatementKind::StreamingInsert(columns) = kind else {
        panic!("expected a streaming insert");
    };
    assert_eq!(
        columns,
        vec![ColumnSpec::new("a", "Int32"), ColumnSpec::new("b", "String")]
    );
    Ok(())
}

#[test]
fn placeholder_makes_a_parameterized_statement() -> Result<(), SessionError> {
    let kind = classify("select * from t where x = ?")?;
    let StatementKind::Parameterized(query) = kind else {
        panic!("expected a parameterized statement");
    };
    assert_eq!(query.parameter_count(), 1);
    Ok(())
}

#[test]
fn two_input_calls_fall_back() -> Result<(), SessionError> {
    let kind = classify("insert into t select * from input('a Int32'), input('b Int32')")?;
    assert!(matches!(kind, StatementKind::Parameterized(q) if !q.has_parameter()));
    Ok(())
}

#[test]
fn placeholders_in_literals_and_comments_are_ignored() -> Result<(), SessionError> {
    let sql = "select '?', \"?\", `?` -- ?\n /* ? /* ? */ */ from t where a = ?";
    let StatementKind::Parameterized(query) = classify(sql)? else {
        panic!("expected a parameterized statement");
    };
    assert_eq!(query.parameter_count(), 1);
    Ok(())
}

#[test]
fn nested_types_in_input_structure() -> Result<(), SessionError> {
    let kind = classify(
        "INSERT INTO t SELECT * FROM INPUT('id UInt64, tags Array(String), m Map(String, Nullable(Int8))')",
    )?;
    let StatementKind::StreamingInsert(columns) = kind else {
        panic!("expected a streaming insert");
    };
    assert_eq!(columns.len(), 3);
    assert_eq!(columns[1].data_type, "Array(String)");
    assert_eq!(columns[2].data_type, "Map(String, Nullable(Int8))");
    Ok(())
}

#[test]
fn malformed_sql_fails_at_prepare_time() {
    for sql in ["", "   \n\t", "-- only a comment", "/* block */", "select 'unterminated", "select \"x"] {
        let err = classify(sql).expect_err(sql);
        assert!(matches!(err, SessionError::Client(_)), "{sql:?} gave {err:?}");
    }
}

#[tokio::test]
async fn parameterized_statement_inlines_literals() -> Result<(), Box<dyn std::error::Error>> {
    let (conn, mock) = open().await?;
    let stmt = conn
        .prepare_statement("select * from t where name = ? and id = ?")?
        .into_parameterized()
        .expect("parameterized");
    assert_eq!(stmt.parameter_count(), 2);

    stmt.execute(&[RowValues::Text("o'neil".into()), RowValues::Int(7)])
        .await?;
    let requests = mock.requests();
    let sent = requests.last().expect("one request");
    assert_eq!(
        sent.sql(),
        Some("select * from t where name = 'o\\'neil' and id = 7")
    );
    assert_eq!(sent.query_id(), Some(stmt.query_id()));
    assert!(!sent.is_write());
    Ok(())
}

#[tokio::test]
async fn wrong_parameter_count_is_rejected() -> Result<(), Box<dyn std::error::Error>> {
    let (conn, mock) = open().await?;
    let stmt = conn
        .prepare_statement("select ?")?
        .into_parameterized()
        .expect("parameterized");
    let err = stmt.execute(&[]).await.expect_err("missing parameter");
    assert!(matches!(err, SessionError::Parameter(_)));
    assert_eq!(err.sql_state(), Some("07001"));
    assert_eq!(mock.request_count(), 0);
    Ok(())
}

#[tokio::test]
async fn streaming_insert_ships_rows_in_write_mode() -> Result<(), Box<dyn std::error::Error>> {
    let (conn, mock) = open().await?;
    let mut stmt = conn
        .prepare_statement("insert into t select * from input('a Int32, b String')")?
        .into_streaming_insert()
        .expect("streaming insert");

    stmt.add_row(vec![RowValues::Int(1), RowValues::Text("x".into())])?;
    stmt.add_row(vec![RowValues::Int(2), RowValues::Null])?;
    let err = stmt.add_row(vec![RowValues::Int(3)]).expect_err("arity");
    assert!(matches!(err, SessionError::Parameter(_)));
    assert_eq!(stmt.pending_rows(), 2);

    assert_eq!(stmt.execute().await?, 2);
    assert_eq!(stmt.pending_rows(), 0);

    let requests = mock.requests();
    let sent = requests.last().expect("one request");
    assert!(sent.is_write());
    assert_eq!(sent.input().len(), 2);
    assert_eq!(sent.query_id(), Some(stmt.query_id()));
    Ok(())
}

#[tokio::test]
async fn transport_failure_during_execute() -> Result<(), Box<dyn std::error::Error>> {
    let (conn, mock) = open().await?;
    let stmt = conn
        .prepare_statement("select 1")?
        .into_parameterized()
        .expect("parameterized");
    mock.push_response(Err(TransportError::Timeout(500)));
    let err = stmt.execute(&[]).await.expect_err("timeout");
    assert!(matches!(err, SessionError::Execution(_)));
    Ok(())
}

#[tokio::test]
async fn network_timeout_applies_to_later_statements() -> Result<(), Box<dyn std::error::Error>> {
    let (mut conn, _mock) = open().await?;
    let before = conn.prepare_statement("select 1")?;
    conn.set_network_timeout(1500)?;
    let after = conn.prepare_statement("select 1")?;

    let timeout = |s: &Statement| match s {
        Statement::Parameterized(p) => p.request().settings().timeout,
        Statement::StreamingInsert(i) => i.request().settings().timeout,
    };
    assert_eq!(timeout(&before), None);
    assert_eq!(timeout(&after), Some(Duration::from_millis(1500)));
    assert_eq!(conn.network_timeout()?, 1500);

    assert!(matches!(conn.set_network_timeout(-1), Err(SessionError::Client(_))));
    Ok(())
}
