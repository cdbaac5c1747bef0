//! Deep-link and connect-URL parsing and formatting.
//!
//! Two URI shapes cross the session layer:
//!
//! - **Deep links** (`spyglass://session?adb_validation_sessionid=…&env=…`):
//!   how a developer hands the SDK a session to pair with.
//! - **Connect URLs** (`wss://connect{infix}.{domain}/client/v1?sessionId=…`):
//!   the socket endpoint; a successful one doubles as the persisted
//!   connection record used for reconnects.

use url::Url;
use url::form_urlencoded;
use uuid::Uuid;

use crate::constants::{CONNECT_PATH, connect, deep_link};
use crate::environment::Environment;
use crate::ids::SessionId;

/// Extract the session id from a session-start deep link.
///
/// Returns the value of `adb_validation_sessionid` when the URL parses and
/// the value is a hyphenated UUID (any case, returned verbatim). Deep links
/// are the one untrusted id source and the only place ids are shape-checked;
/// service-issued ids in stored records and quick-connect approvals are
/// taken as-is.
#[must_use]
pub fn session_id_from_deep_link(link: &str) -> Option<String> {
    let url = Url::parse(link).ok()?;
    query_value(&url, deep_link::SESSION_ID_KEY).filter(|id| is_uuid_shaped(id))
}

/// Hyphenated UUID, case-insensitive. Simple, braced, and urn forms do not
/// appear in pairing links.
fn is_uuid_shaped(value: &str) -> bool {
    value.len() == 36 && Uuid::parse_str(value).is_ok()
}

/// Extract the target environment from a session-start deep link.
///
/// Absent or unrecognized `env` values resolve to production, as does an
/// unparseable URL.
#[must_use]
pub fn environment_from_deep_link(link: &str) -> Environment {
    match Url::parse(link) {
        Ok(url) => Environment::from_query_value(
            query_value(&url, deep_link::ENVIRONMENT_KEY).as_deref(),
        ),
        Err(_) => Environment::Prod,
    }
}

/// First non-empty query value for `key`, percent-decoded.
fn query_value(url: &Url, key: &str) -> Option<String> {
    url.query_pairs()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.into_owned())
        .filter(|v| !v.is_empty())
}

/// The connect parameters recovered from a stored connect URL.
///
/// A record only exists when all four query parameters are present with
/// non-empty values; anything less is unusable for a reconnect. The session
/// id is stored verbatim, with no shape requirement: the service issued it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConnectionRecord {
    /// Session to rejoin.
    pub session_id: SessionId,
    /// Auth token from the last successful connect.
    pub token: String,
    /// Organization the session belongs to.
    pub org_id: String,
    /// Stable per-install client id.
    pub client_id: String,
    /// Environment recovered from the connect host.
    pub environment: Environment,
}

impl ConnectionRecord {
    /// Parse a stored connect URL into a record.
    #[must_use]
    pub fn parse(url: &str) -> Option<Self> {
        let parsed = Url::parse(url).ok()?;
        let session_id = SessionId::parse(&query_value(&parsed, connect::SESSION_ID)?).ok()?;
        let token = query_value(&parsed, connect::TOKEN)?;
        let org_id = query_value(&parsed, connect::ORG_ID)?;
        let client_id = query_value(&parsed, connect::CLIENT_ID)?;
        let environment = Environment::from_host(parsed.host_str().unwrap_or(""));
        Some(Self {
            session_id,
            token,
            org_id,
            client_id,
            environment,
        })
    }
}

/// Everything needed to open (or reopen) a session.
#[derive(Clone, Debug)]
pub struct SessionDescriptor {
    /// Validated session id.
    pub session_id: SessionId,
    /// Target environment.
    pub environment: Environment,
    /// Auth token, when one is already in hand (reconnect, quick connect).
    pub token: Option<String>,
    /// Organization id from the host configuration. May be empty when the
    /// host is unconfigured; the service rejects the connect in that case.
    pub org_id: String,
    /// Stable per-install client id.
    pub client_id: String,
}

impl SessionDescriptor {
    /// Connect URL for this descriptor with the given resolved token.
    #[must_use]
    pub fn connect_url(&self, domain: &str, token: &str) -> String {
        format_connect_url(
            domain,
            self.environment,
            &self.session_id,
            token,
            &self.org_id,
            &self.client_id,
        )
    }
}

impl From<ConnectionRecord> for SessionDescriptor {
    fn from(record: ConnectionRecord) -> Self {
        Self {
            session_id: record.session_id,
            environment: record.environment,
            token: Some(record.token),
            org_id: record.org_id,
            client_id: record.client_id,
        }
    }
}

/// Format the socket connect URL for a session.
///
/// Shape:
/// `wss://connect{infix}.{domain}/client/v1?sessionId=…&token=…&orgId=…&clientId=…`
/// with query values form-encoded (org ids contain `@`).
#[must_use]
pub fn format_connect_url(
    domain: &str,
    environment: Environment,
    session_id: &SessionId,
    token: &str,
    org_id: &str,
    client_id: &str,
) -> String {
    let query = form_urlencoded::Serializer::new(String::new())
        .append_pair(connect::SESSION_ID, session_id.as_str())
        .append_pair(connect::TOKEN, token)
        .append_pair(connect::ORG_ID, org_id)
        .append_pair(connect::CLIENT_ID, client_id)
        .finish();
    format!(
        "wss://connect{}.{domain}/{CONNECT_PATH}?{query}",
        environment.url_infix()
    )
}
