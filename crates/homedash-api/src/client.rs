// Write channel HTTP client
//
// Wraps `reqwest::Client` with endpoint URL construction, per-mode auth
// headers and response decoding. Every write is a single request; retries
// and rollback are the caller's business.

use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderName, HeaderValue};
use reqwest::{RequestBuilder, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use crate::error::Error;
use crate::models::{
    AffectedResponse, ErrorBody, GroupPowerRequest, LightStatePayload, LightStateResponse,
};
use crate::transport::TransportConfig;

const DEMO_MODE_HEADER: HeaderName = HeaderName::from_static("x-demo-mode");
const REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");

/// How write requests identify themselves.
#[derive(Debug, Clone)]
pub enum ApiMode {
    /// `Authorization: Bearer <token>`
    Live(SecretString),
    /// `X-Demo-Mode: true`
    Demo,
}

impl ApiMode {
    fn headers(&self) -> Result<HeaderMap, Error> {
        let mut headers = HeaderMap::new();
        match self {
            Self::Live(token) => {
                let mut value = HeaderValue::from_str(&format!("Bearer {}", token.expose_secret()))
                    .map_err(|_| Error::Authentication {
                        message: "session token contains characters not allowed in a header"
                            .into(),
                    })?;
                value.set_sensitive(true);
                headers.insert(AUTHORIZATION, value);
            }
            Self::Demo => {
                headers.insert(DEMO_MODE_HEADER, HeaderValue::from_static("true"));
            }
        }
        Ok(headers)
    }
}

/// HTTP client for the state service's write endpoints.
#[derive(Debug, Clone)]
pub struct CommandClient {
    http: reqwest::Client,
    base_url: Url,
}

impl CommandClient {
    /// Build a client whose default headers carry the mode's credentials.
    pub fn new(base_url: Url, mode: &ApiMode, transport: &TransportConfig) -> Result<Self, Error> {
        let http = transport.build_client_with_headers(mode.headers()?)?;
        Ok(Self { http, base_url })
    }

    /// Use a pre-built `reqwest::Client` as-is (no auth headers are added).
    pub fn with_client(http: reqwest::Client, base_url: Url) -> Self {
        Self { http, base_url }
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    // ── Endpoints ────────────────────────────────────────────────────

    /// `PUT /api/lights/{id}/state`
    pub async fn set_light_state(
        &self,
        light_id: &str,
        state: &LightStatePayload,
    ) -> Result<LightStateResponse, Error> {
        let url = self.api_url(&["lights", light_id, "state"])?;
        debug!("PUT {}", url);
        self.send(self.http.put(url).json(state)).await
    }

    /// `PUT /api/rooms/{id}/lights`
    pub async fn set_room_power(&self, room_id: &str, on: bool) -> Result<AffectedResponse, Error> {
        let url = self.api_url(&["rooms", room_id, "lights"])?;
        debug!("PUT {}", url);
        self.send(self.http.put(url).json(&GroupPowerRequest { on }))
            .await
    }

    /// `PUT /api/zones/{id}/lights`
    pub async fn set_zone_power(&self, zone_id: &str, on: bool) -> Result<AffectedResponse, Error> {
        let url = self.api_url(&["zones", zone_id, "lights"])?;
        debug!("PUT {}", url);
        self.send(self.http.put(url).json(&GroupPowerRequest { on }))
            .await
    }

    /// `POST /api/scenes/{id}/activate`
    pub async fn activate_scene(&self, scene_id: &str) -> Result<AffectedResponse, Error> {
        let url = self.api_url(&["scenes", scene_id, "activate"])?;
        debug!("POST {}", url);
        self.send(self.http.post(url)).await
    }

    // ── Request helpers ──────────────────────────────────────────────

    /// `{base}/api/{segments...}`, with each segment percent-encoded.
    fn api_url(&self, segments: &[&str]) -> Result<Url, Error> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| Error::InvalidUrl(url::ParseError::RelativeUrlWithCannotBeABaseBase))?
            .pop_if_empty()
            .push("api")
            .extend(segments);
        Ok(url)
    }

    async fn send<T: DeserializeOwned + Default>(&self, request: RequestBuilder) -> Result<T, Error> {
        let request_id = uuid::Uuid::new_v4().to_string();
        let resp = request
            .header(REQUEST_ID_HEADER, &request_id)
            .send()
            .await
            .map_err(Error::Transport)?;
        debug!(%request_id, status = resp.status().as_u16(), "write response");
        parse_response(resp).await
    }
}

/// Decode a 2xx body, or turn anything else into a typed error.
async fn parse_response<T: DeserializeOwned + Default>(resp: reqwest::Response) -> Result<T, Error> {
    let status = resp.status();
    let body = resp.text().await.map_err(Error::Transport)?;

    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(Error::Authentication {
            message: error_message(status, &body),
        });
    }

    if !status.is_success() {
        return Err(Error::Rejected {
            status: status.as_u16(),
            message: error_message(status, &body),
        });
    }

    if body.trim().is_empty() {
        return Ok(T::default());
    }

    serde_json::from_str(&body).map_err(|e| Error::Deserialization {
        message: e.to_string(),
        body,
    })
}

fn error_message(status: StatusCode, body: &str) -> String {
    serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(ErrorBody::into_message)
        .or_else(|| {
            let trimmed = body.trim();
            (!trimmed.is_empty() && trimmed.len() <= 200).then(|| trimmed.to_owned())
        })
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("request failed")
                .to_owned()
        })
}
