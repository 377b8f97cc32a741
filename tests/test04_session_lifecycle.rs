use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use clickhouse_session::prelude::*;
use clickhouse_session::test_utils::MockExecutor;

async fn open() -> Result<(Connection, Arc<MockExecutor>), SessionError> {
    let mock = MockExecutor::with_server_info("db1", "alice", "UTC", "23.3.1").shared();
    let conn = ConnectionOptionsBuilder::new("localhost")
        .client_name("reporting")
        .connect(mock.clone())
        .await?;
    Ok((conn, mock))
}

#[tokio::test]
async fn close_is_idempotent() -> Result<(), Box<dyn std::error::Error>> {
    let (conn, mock) = open().await?;
    assert!(!conn.is_closed());

    conn.close().await?;
    assert!(conn.is_closed());
    conn.close().await?;
    assert!(conn.is_closed());
    assert_eq!(mock.close_calls(), 1);
    Ok(())
}

#[tokio::test]
async fn operations_after_close_fail() -> Result<(), Box<dyn std::error::Error>> {
    let (mut conn, _mock) = open().await?;
    let stmt = conn.prepare_statement("select 1")?;
    conn.close().await?;

    let closed = |r: Result<(), SessionError>| {
        matches!(r, Err(SessionError::Client(ref m)) if m.contains("closed connection"))
    };
    assert!(closed(conn.set_auto_commit(false)));
    assert!(closed(conn.commit()));
    assert!(closed(conn.rollback()));
    assert!(closed(conn.set_schema("other")));
    assert!(closed(conn.set_read_only(true)));
    assert!(closed(conn.set_network_timeout(10)));
    assert!(closed(conn.set_savepoint(None).map(|_| ())));
    assert!(closed(conn.prepare_statement("select 1").map(|_| ())));
    assert!(closed(conn.auto_commit().map(|_| ())));
    assert!(closed(conn.schema().map(|_| ())));
    assert!(closed(conn.native_sql("select 1").map(|_| ())));

    // statements prepared earlier share the flag
    let stmt = stmt.into_parameterized().expect("parameterized");
    assert!(closed(stmt.execute(&[]).await.map(|_| ())));
    Ok(())
}

#[tokio::test]
async fn close_discards_the_open_transaction() -> Result<(), Box<dyn std::error::Error>> {
    let (mut conn, _mock) = open().await?;
    conn.set_auto_commit(false)?;
    let _ = conn.new_query_id();
    conn.close().await?;
    assert!(conn.current_transaction().is_none());
    Ok(())
}

#[tokio::test]
async fn failed_transport_close_still_closes() {
    let (conn, mock) = open().await.expect("connect");
    mock.fail_close(TransportError::Failed("socket reset".into()));

    let err = conn.close().await.expect_err("transport close fails");
    assert!(matches!(err, SessionError::Connection(_)));
    assert!(conn.is_closed());
    assert!(conn.close().await.is_ok());
}

#[tokio::test]
async fn set_schema_switches_the_default_database() -> Result<(), Box<dyn std::error::Error>> {
    let (mut conn, _mock) = open().await?;
    assert_eq!(conn.schema()?, "db1");

    let err = conn.set_schema("").expect_err("empty schema");
    assert!(matches!(err, SessionError::InvalidSchema(_)));
    assert_eq!(err.sql_state(), Some("3F000"));

    conn.set_schema("db1")?;
    conn.set_schema("archive")?;
    assert_eq!(conn.schema()?, "archive");
    assert_eq!(conn.request().settings().database.as_deref(), Some("archive"));
    assert_eq!(conn.current_database(), "archive");
    // the profile keeps the database the session started in
    assert_eq!(conn.profile().database, "db1");

    let stmt = conn.prepare_statement("select 1")?;
    let Statement::Parameterized(stmt) = stmt else {
        panic!("expected a parameterized statement");
    };
    assert_eq!(stmt.request().settings().database.as_deref(), Some("archive"));
    Ok(())
}

#[tokio::test]
async fn is_valid_pings_with_the_timeout() -> Result<(), Box<dyn std::error::Error>> {
    let (conn, mock) = open().await?;
    assert!(conn.is_valid(3).await?);
    let pings = mock.pings();
    assert_eq!(pings.len(), 1);
    assert_eq!(pings[0].1, Duration::from_secs(3));
    assert_eq!(&pings[0].0, conn.node());

    mock.set_ping_result(false);
    assert!(!conn.is_valid(0).await?);

    assert!(matches!(conn.is_valid(-1).await, Err(SessionError::Client(_))));

    conn.close().await?;
    assert!(!conn.is_valid(1).await?);
    assert_eq!(mock.pings().len(), 2);
    Ok(())
}

#[tokio::test]
async fn abort_closes_in_the_background() -> Result<(), Box<dyn std::error::Error>> {
    let (mut conn, mock) = open().await?;
    conn.set_auto_commit(false)?;
    mock.fail_close(TransportError::Failed("already gone".into()));

    let task = conn.abort(&tokio::runtime::Handle::current());
    task.await?;

    assert!(conn.is_closed());
    assert!(conn.current_transaction().is_none());
    assert_eq!(mock.close_calls(), 1);
    Ok(())
}

#[tokio::test]
async fn abort_after_close_leaves_the_transport_alone() -> Result<(), Box<dyn std::error::Error>> {
    let (conn, mock) = open().await?;
    conn.close().await?;
    assert_eq!(mock.close_calls(), 1);

    conn.abort(&tokio::runtime::Handle::current()).await?;
    assert_eq!(mock.close_calls(), 1);
    assert!(conn.is_closed());
    Ok(())
}

#[tokio::test]
async fn repeated_abort_closes_the_transport_once() -> Result<(), Box<dyn std::error::Error>> {
    let (conn, mock) = open().await?;
    let handle = tokio::runtime::Handle::current();
    let first = conn.abort(&handle);
    let second = conn.abort(&handle);
    first.await?;
    second.await?;

    assert_eq!(mock.close_calls(), 1);
    assert!(conn.close().await.is_ok());
    assert_eq!(mock.close_calls(), 1);
    Ok(())
}

#[tokio::test]
async fn client_info_round_trip() -> Result<(), Box<dyn std::error::Error>> {
    let (mut conn, _mock) = open().await?;
    assert_eq!(conn.client_info("ApplicationName")?.as_deref(), Some("reporting"));

    conn.set_client_info("CustomHttpHeaders", Some("X-Trace=1"))?;
    conn.set_client_info("NoSuchProperty", Some("ignored"))?;
    assert_eq!(conn.client_info_all()?.len(), 2);

    conn.set_client_info("ApplicationName", Some("  "))?;
    assert_eq!(conn.client_info("ApplicationName")?, None);

    let mut all = HashMap::new();
    all.insert("CustomHttpParameters".to_string(), "max_threads=2".to_string());
    conn.set_client_info_all(&all)?;
    let info = conn.client_info_all()?;
    assert_eq!(info.len(), 1);
    assert_eq!(info.get("CustomHttpParameters").map(String::as_str), Some("max_threads=2"));

    conn.close().await?;
    let err = conn
        .set_client_info("ApplicationName", Some("late"))
        .expect_err("closed");
    let SessionError::ClientInfo { properties, .. } = &err else {
        panic!("expected a client info error");
    };
    assert_eq!(properties.len(), 3);
    assert!(err.to_string().contains("CustomHttpParameters"));
    Ok(())
}

#[tokio::test]
async fn session_flags() -> Result<(), Box<dyn std::error::Error>> {
    let (mut conn, _mock) = open().await?;
    assert!(!conn.is_read_only()?);
    conn.set_read_only(true)?;
    assert!(conn.is_read_only()?);

    conn.set_catalog("ignored")?;
    assert_eq!(conn.catalog()?, None);

    assert_eq!(conn.holdability()?, Holdability::HoldOverCommit);
    conn.set_holdability(Holdability::CloseAtCommit)?;
    assert_eq!(conn.holdability()?, Holdability::CloseAtCommit);

    conn.set_transaction_isolation(IsolationLevel::Serializable)?;
    assert_eq!(conn.transaction_isolation()?, IsolationLevel::Serializable);
    assert!(matches!(
        conn.set_transaction_isolation(IsolationLevel::None),
        Err(SessionError::Client(_))
    ));

    assert_eq!(conn.native_sql("select 1")?, "select 1");
    Ok(())
}
