//! In-memory transport for tests and benchmarks.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;

use crate::config::Node;
use crate::error::TransportError;
use crate::results::ResultSet;
use crate::transport::{QueryExecutor, Request};
use crate::types::RowValues;

#[derive(Debug, Default)]
struct MockState {
    responses: VecDeque<Result<ResultSet, TransportError>>,
    requests: Vec<Request>,
    pings: Vec<(Node, Duration)>,
    ping_result: bool,
    close_calls: usize,
    close_error: Option<TransportError>,
    delay: Option<Duration>,
}

/// A [`QueryExecutor`] that records every request and replays scripted responses.
///
/// With no scripted response left, writes report their input row count as affected rows
/// and reads return an empty result set.
#[derive(Debug)]
pub struct MockExecutor {
    state: Mutex<MockState>,
}

impl Default for MockExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl MockExecutor {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MockState {
                ping_result: true,
                ..MockState::default()
            }),
        }
    }

    /// A mock whose first response answers the bootstrap probe.
    #[must_use]
    pub fn with_server_info(database: &str, user: &str, time_zone: &str, version: &str) -> Self {
        let mock = Self::new();
        mock.push_response(Ok(Self::server_info(database, user, time_zone, version)));
        mock
    }

    /// The row the server returns for the bootstrap probe.
    #[must_use]
    pub fn server_info(database: &str, user: &str, time_zone: &str, version: &str) -> ResultSet {
        let mut rs = ResultSet::with_columns(vec![
            "currentDatabase()".to_string(),
            "currentUser()".to_string(),
            "timezone()".to_string(),
            "version()".to_string(),
        ]);
        rs.add_row_values(vec![
            RowValues::Text(database.to_string()),
            RowValues::Text(user.to_string()),
            RowValues::Text(time_zone.to_string()),
            RowValues::Text(version.to_string()),
        ]);
        rs
    }

    /// Wrap in an `Arc` so tests can keep a handle while the connection owns another.
    #[must_use]
    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn push_response(&self, response: Result<ResultSet, TransportError>) {
        self.lock().responses.push_back(response);
    }

    pub fn set_ping_result(&self, alive: bool) {
        self.lock().ping_result = alive;
    }

    /// Make every later `close` fail with `error`.
    pub fn fail_close(&self, error: TransportError) {
        self.lock().close_error = Some(error);
    }

    /// Hold every `execute` for `delay` before answering.
    pub fn set_delay(&self, delay: Duration) {
        self.lock().delay = Some(delay);
    }

    #[must_use]
    pub fn requests(&self) -> Vec<Request> {
        self.lock().requests.clone()
    }

    #[must_use]
    pub fn request_count(&self) -> usize {
        self.lock().requests.len()
    }

    #[must_use]
    pub fn pings(&self) -> Vec<(Node, Duration)> {
        self.lock().pings.clone()
    }

    #[must_use]
    pub fn close_calls(&self) -> usize {
        self.lock().close_calls
    }
}

#[async_trait]
impl QueryExecutor for MockExecutor {
    async fn execute(&self, request: &Request) -> Result<ResultSet, TransportError> {
        let (delay, scripted) = {
            let mut state = self.lock();
            state.requests.push(request.clone());
            (state.delay, state.responses.pop_front())
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        match scripted {
            Some(response) => response,
            None if request.is_write() => Ok(ResultSet::affected(request.input().len())),
            None => Ok(ResultSet::default()),
        }
    }

    async fn ping(&self, node: &Node, timeout: Duration) -> bool {
        let mut state = self.lock();
        state.pings.push((node.clone(), timeout));
        state.ping_result
    }

    async fn close(&self) -> Result<(), TransportError> {
        let mut state = self.lock();
        state.close_calls += 1;
        match &state.close_error {
            Some(e) => Err(e.clone()),
            None => Ok(()),
        }
    }
}
