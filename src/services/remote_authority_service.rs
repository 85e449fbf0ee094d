use std::future::Future;
use std::time::Duration;

use indexmap::IndexMap;
use reqwest::{Client, Response, Url};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::warn;

use crate::models::ActivityDescriptor;

pub const GENERIC_REJECTION: &str = "An error occurred";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteError {
    /// No usable answer: transport failure, timeout, or an unreadable body.
    #[error("activity registry unreachable at {url}: {reason}")]
    Network { url: String, reason: String },
    /// The registry answered and refused the request. `detail` is its
    /// human-readable reason, when it gave one.
    #[error(
        "activity registry rejected the request ({status}): {}",
        .detail.as_deref().unwrap_or(GENERIC_REJECTION)
    )]
    Rejected { status: u16, detail: Option<String> },
}

impl RemoteError {
    fn network(url: &str, err: impl ToString) -> Self {
        Self::Network {
            url: url.to_string(),
            reason: err.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Ack {
    pub message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AckBody {
    message: Option<String>,
}

/// The remote activity registry that owns the durable roster.
///
/// Implementations never retry; every outcome is handed back as-is.
pub trait RemoteAuthority: Send + Sync {
    fn load_all(
        &self,
    ) -> impl Future<Output = Result<IndexMap<String, ActivityDescriptor>, RemoteError>> + Send;

    fn signup(
        &self,
        activity: &str,
        email: &str,
    ) -> impl Future<Output = Result<Ack, RemoteError>> + Send;

    fn unregister(
        &self,
        activity: &str,
        email: &str,
    ) -> impl Future<Output = Result<Ack, RemoteError>> + Send;
}

#[derive(Debug, Clone)]
pub struct HttpRemoteAuthority {
    client: Client,
    base_url: Url,
}

impl HttpRemoteAuthority {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, RemoteError> {
        let base_url = Url::parse(base_url).map_err(|e| RemoteError::network(base_url, e))?;
        if base_url.cannot_be_a_base() {
            return Err(RemoteError::network(
                base_url.as_str(),
                "base url cannot carry a path",
            ));
        }
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RemoteError::network(base_url.as_str(), e))?;
        Ok(Self { client, base_url })
    }

    /// `/activities[/{name}/{action}]`, every segment percent-encoded.
    fn activities_url(&self, tail: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push("activities").extend(tail);
        }
        url
    }

    async fn post_mutation(&self, action: &str, activity: &str, email: &str) -> Result<Ack, RemoteError> {
        let mut url = self.activities_url(&[activity, action]);
        url.query_pairs_mut().append_pair("email", email);

        let resp = self
            .client
            .post(url.clone())
            .send()
            .await
            .map_err(|e| {
                warn!(%url, error = %e, "📋 registry {} unreachable", action);
                RemoteError::network(url.as_str(), e)
            })?;

        let status = resp.status();
        if !status.is_success() {
            let detail = rejection_detail(resp).await;
            warn!(%url, status = status.as_u16(), detail = ?detail, "📋 registry rejected {}", action);
            return Err(RemoteError::Rejected {
                status: status.as_u16(),
                detail,
            });
        }

        // A 2xx is an acknowledgement even when the body is empty or not JSON.
        let message = resp
            .json::<AckBody>()
            .await
            .ok()
            .and_then(|body| body.message);
        Ok(Ack { message })
    }
}

async fn rejection_detail(resp: Response) -> Option<String> {
    let body: Value = resp.json().await.ok()?;
    body.get("detail")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .map(str::to_string)
}

impl RemoteAuthority for HttpRemoteAuthority {
    async fn load_all(&self) -> Result<IndexMap<String, ActivityDescriptor>, RemoteError> {
        let url = self.activities_url(&[]);

        let resp = self.client.get(url.clone()).send().await.map_err(|e| {
            warn!(%url, error = %e, "📋 registry unreachable while loading activities");
            RemoteError::network(url.as_str(), e)
        })?;

        if !resp.status().is_success() {
            warn!(%url, status = resp.status().as_u16(), "📋 registry load non-OK");
            return Err(RemoteError::network(
                url.as_str(),
                format!("unexpected status {}", resp.status()),
            ));
        }

        resp.json::<IndexMap<String, ActivityDescriptor>>()
            .await
            .map_err(|e| {
                warn!(%url, error = %e, "📋 registry load JSON parse failed");
                RemoteError::network(url.as_str(), e)
            })
    }

    async fn signup(&self, activity: &str, email: &str) -> Result<Ack, RemoteError> {
        self.post_mutation("signup", activity, email).await
    }

    async fn unregister(&self, activity: &str, email: &str) -> Result<Ack, RemoteError> {
        self.post_mutation("unregister", activity, email).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn authority(base: &str) -> HttpRemoteAuthority {
        HttpRemoteAuthority::new(base, Duration::from_secs(1)).unwrap()
    }

    #[test]
    fn activity_urls_are_percent_encoded() {
        let remote = authority("http://registry.localhost:8000");
        let mut url = remote.activities_url(&["Chess Club", "signup"]);
        url.query_pairs_mut().append_pair("email", "a+b@x.com");
        assert_eq!(
            url.as_str(),
            "http://registry.localhost:8000/activities/Chess%20Club/signup?email=a%2Bb%40x.com"
        );
    }

    #[test]
    fn slashes_in_names_stay_inside_one_segment() {
        let remote = authority("http://registry.localhost:8000/api/");
        let url = remote.activities_url(&["Art/Craft", "unregister"]);
        assert_eq!(
            url.as_str(),
            "http://registry.localhost:8000/api/activities/Art%2FCraft/unregister"
        );
    }

    #[test]
    fn rejects_unusable_base_urls() {
        assert!(HttpRemoteAuthority::new("not a url", Duration::from_secs(1)).is_err());
        assert!(HttpRemoteAuthority::new("mailto:someone@x.com", Duration::from_secs(1)).is_err());
    }
}
