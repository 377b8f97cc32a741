use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

use crate::config::ConnectionOptions;
use crate::error::SessionError;
use crate::profile::{
    ServerVersion, SessionProfile, resolve_client_time_zone, resolve_server_time_zone,
};
use crate::results::CustomDbRow;
use crate::transport::{Format, QueryExecutor, Request};
use crate::types::RowValues;

/// The single query issued to learn who and where we are.
pub const PROBE_SQL: &str = "select currentDatabase(), currentUser(), timezone(), version()";

struct ServerFacts {
    database: Option<String>,
    user: Option<String>,
    time_zone: String,
    version: String,
}

/// Negotiate the session profile for a freshly bound request.
///
/// When `options` already carries both the server timezone and version nothing is sent.
/// Otherwise one synchronous, uncompressed probe runs; its results are written back into
/// `request` so later requests on the same handle carry them without probing again.
///
/// # Errors
/// - `SessionError::Cancelled` if `cancel` fires during the probe or the transport
///   reports a cancellation (the token is cancelled in the latter case so the signal
///   stays visible to the caller);
/// - `SessionError::Connection` for every other transport failure or a malformed reply;
/// - `SessionError::Config` if the configured client timezone cannot be resolved.
#[instrument(skip_all, fields(node = %request.node()))]
pub async fn negotiate(
    executor: &dyn QueryExecutor,
    request: &mut Request,
    options: &ConnectionOptions,
    cancel: &CancellationToken,
) -> Result<SessionProfile, SessionError> {
    let facts = if options.has_server_info() {
        debug!("using pre-negotiated server info");
        ServerFacts {
            database: None,
            user: None,
            time_zone: options.server_time_zone.clone().unwrap_or_default(),
            version: options.server_version.clone().unwrap_or_default(),
        }
    } else {
        let mut facts = probe(executor, request, cancel).await?;
        if facts.time_zone.trim().is_empty() {
            facts.time_zone = "UTC".to_string();
        }
        request.set_server_info(&facts.time_zone, &facts.version);
        facts
    };

    let server_time_zone = resolve_server_time_zone(&facts.time_zone);
    let effective_time_zone = if options.use_server_time_zone {
        server_time_zone
    } else {
        resolve_client_time_zone(options.use_time_zone.as_deref().unwrap_or_default())?
    };

    let profile = SessionProfile {
        server_time_zone,
        effective_time_zone,
        server_version: ServerVersion::parse(&facts.version),
        database: facts.database.unwrap_or_else(|| options.database.clone()),
        user: facts.user.unwrap_or_else(|| options.user.clone()),
        compliant: options.compliant,
    };
    debug!(
        database = %profile.database,
        user = %profile.user,
        server_time_zone = %profile.server_time_zone,
        server_version = %profile.server_version,
        "session profile negotiated"
    );
    Ok(profile)
}

async fn probe(
    executor: &dyn QueryExecutor,
    request: &Request,
    cancel: &CancellationToken,
) -> Result<ServerFacts, SessionError> {
    let probe = request
        .copy()
        .with_async(false)
        .with_compression(false, false)
        .with_format(Format::RowBinaryWithNamesAndTypes)
        .query(PROBE_SQL, None);

    let response = tokio::select! {
        biased;
        () = cancel.cancelled() => {
            return Err(SessionError::Cancelled("server info query cancelled".to_string()));
        }
        res = executor.execute(&probe) => res,
    };

    let rs = match response {
        Ok(rs) => rs,
        Err(e) if e.is_cancellation() => {
            cancel.cancel();
            return Err(SessionError::Cancelled(e.to_string()));
        }
        Err(e) => {
            return Err(SessionError::Connection(format!(
                "Failed to query server info: {e}"
            )));
        }
    };

    let row = rs.first_row().ok_or_else(|| {
        SessionError::Connection("Server info query returned no rows".to_string())
    })?;

    Ok(ServerFacts {
        database: Some(scalar(row, 0)?),
        user: Some(scalar(row, 1)?),
        time_zone: scalar(row, 2)?,
        version: scalar(row, 3)?,
    })
}

fn scalar(row: &CustomDbRow, index: usize) -> Result<String, SessionError> {
    match row.get_by_index(index) {
        Some(RowValues::Text(s)) => Ok(s.clone()),
        Some(RowValues::Null) => Ok(String::new()),
        Some(other) => Err(SessionError::Connection(format!(
            "Unexpected value in server info column {index}: {other:?}"
        ))),
        None => Err(SessionError::Connection(format!(
            "Server info row is missing column {index}"
        ))),
    }
}
