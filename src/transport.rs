//! The consumed transport capability.
//!
//! The session never speaks the wire protocol itself. It builds [`Request`]s, which carry
//! the target node, the per-request settings and the SQL, and hands them to a
//! [`QueryExecutor`] that owns the actual client.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;

use crate::config::{ConnectionOptions, Node};
use crate::error::TransportError;
use crate::results::ResultSet;
use crate::types::{ClientInfoProperty, RowValues};

/// Output format requested from the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Format {
    #[default]
    RowBinaryWithNamesAndTypes,
    TabSeparatedWithNamesAndTypes,
}

/// Settings that travel with every request built from the same session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestSettings {
    pub database: Option<String>,
    pub user: String,
    pub password: Option<String>,
    pub format: Format,
    pub asynchronous: bool,
    pub compress: bool,
    pub decompress: bool,
    pub server_time_zone: Option<String>,
    pub server_version: Option<String>,
    /// Socket timeout; `None` leaves it to the transport.
    pub timeout: Option<Duration>,
    pub client_info: BTreeMap<&'static str, String>,
}

/// A request handle bound to one node.
///
/// Cloning (or [`Request::copy`]) yields an independent handle whose settings can be
/// overridden without touching the original.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    node: Node,
    settings: RequestSettings,
    sql: Option<String>,
    query_id: Option<String>,
    write: bool,
    input: Vec<Vec<RowValues>>,
}

impl Request {
    /// Bind a new request handle to `node` with settings derived from `options`.
    #[must_use]
    pub fn connect(node: &Node, options: &ConnectionOptions) -> Self {
        let mut settings = RequestSettings {
            database: Some(options.database.clone()),
            user: options.user.clone(),
            password: options.password.clone(),
            asynchronous: true,
            compress: options.compress,
            decompress: options.compress,
            server_time_zone: options.server_time_zone.clone(),
            server_version: options.server_version.clone(),
            ..RequestSettings::default()
        };
        if let Some(name) = options.client_name.as_ref().filter(|n| !n.trim().is_empty()) {
            settings
                .client_info
                .insert(ClientInfoProperty::ApplicationName.name(), name.clone());
        }
        Self {
            node: node.clone(),
            settings,
            sql: None,
            query_id: None,
            write: false,
            input: Vec::new(),
        }
    }

    /// Independent copy of this handle.
    #[must_use]
    pub fn copy(&self) -> Self {
        self.clone()
    }

    /// Copy of this handle switched to write mode.
    #[must_use]
    pub fn write(&self) -> Self {
        let mut req = self.clone();
        req.write = true;
        req
    }

    /// Make `database` the default schema for requests built from this handle.
    pub fn use_database(&mut self, database: &str) {
        self.settings.database = Some(database.to_string());
    }

    #[must_use]
    pub fn query(mut self, sql: impl Into<String>, query_id: Option<String>) -> Self {
        self.sql = Some(sql.into());
        self.query_id = query_id;
        self
    }

    #[must_use]
    pub fn with_format(mut self, format: Format) -> Self {
        self.settings.format = format;
        self
    }

    #[must_use]
    pub fn with_async(mut self, asynchronous: bool) -> Self {
        self.settings.asynchronous = asynchronous;
        self
    }

    #[must_use]
    pub fn with_compression(mut self, compress: bool, decompress: bool) -> Self {
        self.settings.compress = compress;
        self.settings.decompress = decompress;
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.settings.timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_input(mut self, rows: Vec<Vec<RowValues>>) -> Self {
        self.input = rows;
        self
    }

    pub(crate) fn set_server_info(&mut self, time_zone: &str, version: &str) {
        self.settings.server_time_zone = Some(time_zone.to_string());
        self.settings.server_version = Some(version.to_string());
    }

    /// Set or, for blank values, remove a client-info setting.
    pub(crate) fn set_client_info(&mut self, property: ClientInfoProperty, value: Option<&str>) {
        match value.filter(|v| !v.trim().is_empty()) {
            Some(v) => {
                self.settings.client_info.insert(property.name(), v.to_string());
            }
            None => {
                self.settings.client_info.remove(property.name());
            }
        }
    }

    #[must_use]
    pub fn client_info(&self, property: ClientInfoProperty) -> Option<&str> {
        self.settings.client_info.get(property.name()).map(String::as_str)
    }

    #[must_use]
    pub fn node(&self) -> &Node {
        &self.node
    }

    #[must_use]
    pub fn settings(&self) -> &RequestSettings {
        &self.settings
    }

    #[must_use]
    pub fn sql(&self) -> Option<&str> {
        self.sql.as_deref()
    }

    #[must_use]
    pub fn query_id(&self) -> Option<&str> {
        self.query_id.as_deref()
    }

    #[must_use]
    pub fn is_write(&self) -> bool {
        self.write
    }

    /// Rows streamed as the `input(...)` table of a write request.
    #[must_use]
    pub fn input(&self) -> &[Vec<RowValues>] {
        &self.input
    }
}

/// Executes requests against a node.
///
/// Implementations own retries, codecs and sockets; the session treats every call as a
/// single independently-committed operation.
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    /// Send the request and collect the decoded response.
    ///
    /// # Errors
    /// Returns `TransportError` on any wire, protocol or server failure.
    async fn execute(&self, request: &Request) -> Result<ResultSet, TransportError>;

    /// Check that `node` answers within `timeout`.
    async fn ping(&self, node: &Node, timeout: Duration) -> bool;

    /// Release every resource held by the client.
    ///
    /// # Errors
    /// Returns `TransportError` if shutting down the client fails.
    async fn close(&self) -> Result<(), TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn copies_are_independent() {
        let opts = ConnectionOptions::new(Node::new("localhost"));
        let base = Request::connect(&opts.node, &opts);
        let mut copy = base.copy().with_async(false);
        copy.use_database("other");

        assert!(base.settings().asynchronous);
        assert_eq!(base.settings().database.as_deref(), Some("default"));
        assert_eq!(copy.settings().database.as_deref(), Some("other"));
        assert!(base.write().is_write());
        assert!(!base.is_write());
    }

    #[test]
    fn blank_client_info_removes_setting() {
        let mut opts = ConnectionOptions::new(Node::new("localhost"));
        opts.client_name = Some("reporting".into());
        let mut req = Request::connect(&opts.node, &opts);
        assert_eq!(
            req.client_info(ClientInfoProperty::ApplicationName),
            Some("reporting")
        );
        req.set_client_info(ClientInfoProperty::ApplicationName, Some("  "));
        assert_eq!(req.client_info(ClientInfoProperty::ApplicationName), None);
    }
}
