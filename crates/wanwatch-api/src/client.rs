// Gateway HTTP client
//
// Wraps `reqwest::Client` with UniFi OS URL construction and envelope
// unwrapping. Endpoint methods live in `devices.rs`; this module only deals
// with transport mechanics. The site is passed per call, so one client can
// serve any site on the same console.

use reqwest::header::{HeaderMap, HeaderValue};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use crate::error::Error;
use crate::models::{LegacyResponse, UnifiOsError};
use crate::transport::TransportConfig;

/// Legacy Network application prefix on UniFi OS consoles.
const NETWORK_PREFIX: &str = "/proxy/network";

/// Number of body characters kept in error messages.
const BODY_PREVIEW_CHARS: usize = 200;

/// HTTP client for the console's legacy Network API.
///
/// Handles the `{ data: [], meta: { rc, msg } }` envelope and site-scoped
/// URL construction. Every request carries the `X-API-KEY` header, injected
/// once when the underlying `reqwest::Client` is built.
#[derive(Debug, Clone)]
pub struct GatewayClient {
    http: reqwest::Client,
    base_url: Url,
}

impl GatewayClient {
    /// Build a client for `host` authenticated with `api_key`.
    ///
    /// `host` may be a bare hostname (`192.168.1.1`), a host with port, or a
    /// full URL. A missing scheme defaults to `https://`.
    pub fn new(
        host: &str,
        api_key: &SecretString,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        let mut headers = HeaderMap::new();
        let mut key_value = HeaderValue::from_str(api_key.expose_secret().trim()).map_err(|e| {
            Error::InvalidApiKey {
                message: format!("invalid API key header value: {e}"),
            }
        })?;
        key_value.set_sensitive(true);
        headers.insert("X-API-KEY", key_value);

        let http = transport.build_client_with_headers(headers)?;
        let base_url = normalize_base_url(host)?;
        Ok(Self { http, base_url })
    }

    /// Wrap an existing `reqwest::Client` (caller manages auth headers).
    pub fn with_client(http: reqwest::Client, base_url: Url) -> Self {
        Self { http, base_url }
    }

    /// The console base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    // ── URL builder ──────────────────────────────────────────────────

    /// Build a site-scoped URL: `{base}/proxy/network/api/s/{site}/{path}`
    pub(crate) fn site_url(&self, site: &str, path: &str) -> Result<Url, Error> {
        let base = self.base_url.as_str().trim_end_matches('/');
        let full = format!("{base}{NETWORK_PREFIX}/api/s/{site}/{path}");
        Ok(Url::parse(&full)?)
    }

    // ── Request helpers ──────────────────────────────────────────────

    /// Send a GET request and unwrap the legacy envelope.
    pub(crate) async fn get<T: DeserializeOwned>(&self, url: Url) -> Result<Vec<T>, Error> {
        debug!("GET {}", url);

        let resp = self.http.get(url).send().await?;
        let body = checked_body(resp).await?;
        parse_envelope(&body)
    }

    /// Send a POST request with a JSON body and return the raw response text.
    ///
    /// Status and UniFi OS error bodies are already checked; interpreting the
    /// payload is left to the caller since command endpoints don't always
    /// answer with an envelope.
    pub(crate) async fn post_raw(
        &self,
        url: Url,
        body: &(impl Serialize + Sync),
    ) -> Result<String, Error> {
        debug!("POST {}", url);

        let resp = self.http.post(url).json(body).send().await?;
        checked_body(resp).await
    }
}

// ── Response handling ────────────────────────────────────────────────

/// Map HTTP status and UniFi OS error bodies to errors, returning the body text.
///
/// UniFi OS sometimes returns `{"error":{"code":N,"message":"..."}}` with HTTP 200.
async fn checked_body(resp: reqwest::Response) -> Result<String, Error> {
    let status = resp.status();

    if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
        return Err(Error::InvalidApiKey {
            message: format!("console rejected the API key (HTTP {})", status.as_u16()),
        });
    }

    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(Error::Http {
            status: status.as_u16(),
            message: preview(&body),
        });
    }

    let body = resp.text().await?;

    if let Ok(wrapper) = serde_json::from_str::<UnifiOsError>(&body) {
        if let Some(err) = wrapper.error {
            let msg = err.message.unwrap_or_default();
            return Err(if err.code == 401 || err.code == 403 {
                Error::InvalidApiKey { message: msg }
            } else {
                Error::Api {
                    message: format!("UniFi OS error {}: {msg}", err.code),
                }
            });
        }
    }

    Ok(body)
}

/// Parse the `{ meta, data }` envelope, returning `data` on success
/// or an `Error::Api` if `meta.rc != "ok"`.
pub(crate) fn parse_envelope<T: DeserializeOwned>(body: &str) -> Result<Vec<T>, Error> {
    let envelope: LegacyResponse<T> =
        serde_json::from_str(body).map_err(|e| Error::Deserialization {
            message: format!("{e} (body preview: {:?})", preview(body)),
            body: body.to_owned(),
        })?;

    match envelope.meta.rc.as_str() {
        "ok" => Ok(envelope.data),
        _ => Err(Error::Api {
            message: envelope
                .meta
                .msg
                .unwrap_or_else(|| format!("rc={}", envelope.meta.rc)),
        }),
    }
}

fn preview(body: &str) -> String {
    body.chars().take(BODY_PREVIEW_CHARS).collect()
}

/// Turn user input into a console base URL.
fn normalize_base_url(host: &str) -> Result<Url, Error> {
    let trimmed = host.trim().trim_end_matches('/');
    if trimmed.contains("://") {
        Ok(Url::parse(trimmed)?)
    } else {
        Ok(Url::parse(&format!("https://{trimmed}"))?)
    }
}
