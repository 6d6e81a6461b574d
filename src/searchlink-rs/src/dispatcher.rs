use reqwest::Method;
use searchlink_core::codec;
use searchlink_core::{ClientConfig, Endpoint, EndpointPool, Pick};
use serde_json::Value as Json;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::request::Request;
use crate::transport::{RawResponse, Transport, TransportError};
use crate::{preview, ClientError, Result};

/// Substrings of the service's conflict messages that mean "already exists".
/// Matching is best-effort; anything else stays a generic HTTP error.
const ALREADY_EXISTS_SIGNATURES: &[&str] = &["already_exists", "alreadyexists", "already exists"];

/// Progress of one call through its retry budget
enum AttemptState {
    Attempting { attempt: u32 },
    Succeeded(RawResponse),
    Exhausted {
        endpoint: Endpoint,
        error: TransportError,
    },
}

/// Sends requests with failover across the endpoint pool.
///
/// A transport failure marks the endpoint dead and moves on to another one,
/// up to `max_retries` extra attempts. Responses with an error status and
/// malformed responses are never retried.
pub struct Dispatcher {
    pool: EndpointPool,
    transport: Arc<dyn Transport>,
    timeout: Duration,
    max_retries: u32,
}

impl Dispatcher {
    pub fn new(config: &ClientConfig, transport: Arc<dyn Transport>) -> Result<Self> {
        config
            .validate()
            .map_err(|e| ClientError::Config(e.to_string()))?;

        Ok(Self {
            pool: config.build_pool(),
            transport,
            timeout: config.timeout(),
            max_retries: config.max_retries,
        })
    }

    pub fn pool(&self) -> &EndpointPool {
        &self.pool
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Send a request and return the decoded JSON body.
    ///
    /// Encoding happens up front, so an unencodable request never touches the
    /// network.
    pub async fn send(&self, request: &Request) -> Result<Json> {
        let target = request.path_and_query()?;
        let body = request.encoded_body()?;

        let response = self
            .perform(&request.method, &target, body.as_deref())
            .await?;
        debug!(status = response.status, "Response received");

        classify(response)
    }

    async fn perform(&self, method: &Method, target: &str, body: Option<&[u8]>) -> Result<RawResponse> {
        let mut state = AttemptState::Attempting { attempt: 0 };
        loop {
            state = match state {
                AttemptState::Attempting { attempt } => {
                    self.attempt(attempt, method, target, body).await?
                }
                AttemptState::Succeeded(response) => return Ok(response),
                AttemptState::Exhausted { endpoint, error } => {
                    return Err(ClientError::Transport {
                        endpoint: endpoint.to_string(),
                        source: error,
                    })
                }
            };
        }
    }

    async fn attempt(
        &self,
        attempt: u32,
        method: &Method,
        target: &str,
        body: Option<&[u8]>,
    ) -> Result<AttemptState> {
        let Pick { endpoint, was_dead } = self
            .pool
            .get()
            .ok_or_else(|| ClientError::Config("no endpoints configured".to_string()))?;

        if was_dead {
            warn!(endpoint = %endpoint, "All endpoints are marked dead, trying a dead one");
        }

        let url = format!("{endpoint}{target}");
        debug!(
            attempt,
            "Making a request equivalent to this: curl -X{} '{}' -d '{}'",
            method,
            url,
            body.map(preview).unwrap_or_default()
        );

        match self
            .transport
            .perform(method.clone(), &url, body, self.timeout)
            .await
        {
            Ok(response) => {
                if was_dead && self.pool.mark_live(&endpoint) {
                    info!(endpoint = %endpoint, "Endpoint answered again, marked live");
                }
                Ok(AttemptState::Succeeded(response))
            }
            Err(error) if !error.is_retryable() => Err(ClientError::Transport {
                endpoint: endpoint.to_string(),
                source: error,
            }),
            Err(error) => {
                if self.pool.mark_dead(&endpoint) {
                    info!(
                        endpoint = %endpoint,
                        error = %error,
                        "Marked as dead for {} seconds",
                        self.pool.revival_delay().as_secs()
                    );
                }
                if attempt >= self.max_retries {
                    Ok(AttemptState::Exhausted { endpoint, error })
                } else {
                    Ok(AttemptState::Attempting {
                        attempt: attempt + 1,
                    })
                }
            }
        }
    }
}

/// Decode a response and turn error statuses into typed errors.
pub(crate) fn classify(response: RawResponse) -> Result<Json> {
    let RawResponse { status, body } = response;
    let decoded = codec::decode(&body);

    if status >= 400 {
        // Proxies in front of the service may answer with non-JSON error pages
        let payload = decoded
            .unwrap_or_else(|_| Json::String(String::from_utf8_lossy(&body).into_owned()));
        let error = error_payload(payload);

        return Err(if status == 404 {
            ClientError::NotFound { error }
        } else if is_already_exists(&error) {
            ClientError::AlreadyExists { status, error }
        } else {
            ClientError::Http { status, error }
        });
    }

    decoded.map_err(|_| ClientError::MalformedResponse { status, raw: body })
}

fn error_payload(payload: Json) -> Json {
    match payload {
        Json::Object(mut map) if map.contains_key("error") => {
            map.remove("error").unwrap_or(Json::Null)
        }
        other => other,
    }
}

fn is_already_exists(error: &Json) -> bool {
    let text = match error {
        Json::String(s) => s.to_lowercase(),
        other => other.to_string().to_lowercase(),
    };
    ALREADY_EXISTS_SIGNATURES
        .iter()
        .any(|signature| text.contains(signature))
}
