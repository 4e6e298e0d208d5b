//! Turns a sink URL into a [SinkConfig].
//!
//! Two dialects exist:
//! - [Dialect::Topic]: `scheme://host/path[?publishTimeout=<duration>]`, the topic is the
//!   path-join of host and path.
//! - [Dialect::Service]: `scheme://projects/{projectID}/topics/{topicName}[?srvAddr=<host:port>]`
//!   for managed services. `srvAddr` points the sink at an alternate (e.g. local test) endpoint.
//!
//! Host and path are percent-decoded before they are interpreted, so `%2F` separates segments
//! like a plain `/` does.
//!
//! Only a bad duration, a wrong path shape and escapes that do not decode to UTF-8 are
//! rejected here. Whether the topic exists, or
//! whether an empty topic name is acceptable, is left to the transport.

use std::borrow::Cow;

use percent_encoding::percent_decode_str;
use url::Url;

use crate::config::Settings;
use crate::duration::SignedDuration;
use crate::{Error, Result};

pub(crate) const PUBLISH_TIMEOUT_PARAM: &str = "publishTimeout";
pub(crate) const ENDPOINT_PARAM: &str = "srvAddr";

const SERVICE_PATH_SHAPE: &str = "/{projectID}/topics/{topicName}";

/// Addressing convention of a schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    /// In-process or otherwise simple topics addressed by name.
    Topic,
    /// Topics of a managed service, addressed by project and topic name.
    Service,
}

/// Everything a sink needs to know about its topic, resolved from the sink URL.
#[derive(Debug, Clone, PartialEq)]
pub struct SinkConfig {
    /// Schema (URL scheme) the sink was opened with.
    pub schema: String,
    /// Topic name. For managed services this is the bare topic name within the project.
    pub topic: String,
    /// Project owning the topic, managed services only.
    pub project_id: Option<String>,
    /// Alternate endpoint of the managed service.
    pub endpoint: Option<String>,
    /// Deadline of a single publish.
    pub publish_timeout: SignedDuration,
}

/// Resolve `url` according to `dialect`.
pub fn resolve(url: &Url, dialect: Dialect, settings: &Settings) -> Result<SinkConfig> {
    match dialect {
        Dialect::Topic => resolve_topic(url, settings),
        Dialect::Service => resolve_service(url, settings),
    }
}

fn resolve_topic(url: &Url, settings: &Settings) -> Result<SinkConfig> {
    Ok(SinkConfig {
        schema: url.scheme().to_string(),
        topic: join_path(
            &decode(url.host_str().unwrap_or_default())?,
            &decode(url.path())?,
        ),
        project_id: None,
        endpoint: None,
        publish_timeout: publish_timeout(url, settings)?,
    })
}

fn resolve_service(url: &Url, settings: &Settings) -> Result<SinkConfig> {
    let path = decode(url.path())?;
    let segments: Vec<&str> = path.split('/').collect();
    let [_, project_id, _, topic] = segments.as_slice() else {
        return Err(Error::Configuration(format!(
            "invalid path {path:?} for schema {}, expected {SERVICE_PATH_SHAPE}",
            url.scheme()
        )));
    };

    let endpoint = query_param(url, ENDPOINT_PARAM).filter(|addr| !addr.is_empty());

    Ok(SinkConfig {
        schema: url.scheme().to_string(),
        topic: topic.to_string(),
        project_id: Some(project_id.to_string()),
        endpoint,
        publish_timeout: publish_timeout(url, settings)?,
    })
}

fn publish_timeout(url: &Url, settings: &Settings) -> Result<SignedDuration> {
    match query_param(url, PUBLISH_TIMEOUT_PARAM) {
        Some(raw) if !raw.is_empty() => raw.parse(),
        _ => Ok(settings.default_publish_timeout),
    }
}

fn decode(raw: &str) -> Result<Cow<'_, str>> {
    percent_decode_str(raw).decode_utf8().map_err(|e| {
        Error::Configuration(format!("{raw:?} is not valid UTF-8 once decoded: {e}"))
    })
}

/// First value of a query parameter.
fn query_param(url: &Url, key: &str) -> Option<String> {
    url.query_pairs()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.into_owned())
}

/// Join host and path into one slash separated name and clean it lexically: empty and `.`
/// segments are dropped, `..` removes the segment before it, and no separator is left at either
/// end (unless the path was rooted and nothing else remains).
pub(crate) fn join_path(host: &str, path: &str) -> String {
    let joined = match (host.is_empty(), path.is_empty()) {
        (true, true) => return String::new(),
        (false, true) => host.to_string(),
        (true, false) => path.to_string(),
        (false, false) => format!("{host}/{path}"),
    };
    let rooted = joined.starts_with('/');

    let mut segments: Vec<&str> = Vec::new();
    for segment in joined.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if segments.last().is_some_and(|s| *s != "..") {
                    segments.pop();
                } else if !rooted {
                    segments.push("..");
                }
            }
            s => segments.push(s),
        }
    }

    let cleaned = segments.join("/");
    match (rooted, cleaned.is_empty()) {
        (true, _) => format!("/{cleaned}"),
        (false, true) => ".".to_string(),
        (false, false) => cleaned,
    }
}
