// crates/lti1p3-services/src/connector.rs
// ============================================================================
// Module: Service Connector
// Description: OAuth2 client-credentials access to LTI platform services.
// Purpose: Sign client assertions, cache access tokens, perform requests.
// Dependencies: jsonwebtoken, lti1p3-core, rand, reqwest, serde_json
// ============================================================================

//! ## Overview
//! The connector authenticates against a platform's token endpoint with the
//! `client_credentials` grant and a signed RS256 client assertion, then
//! performs authenticated service requests. Access tokens are cached per
//! sorted scope set and reused until the platform's `expires_in` window has
//! elapsed. Responses are decoded as JSON pages together with the target of
//! the `Link` header entry carrying `rel="next"`, so paginated services can
//! be walked to exhaustion.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::sync::PoisonError;
use std::time::Duration;

use jsonwebtoken::Algorithm;
use jsonwebtoken::EncodingKey;
use jsonwebtoken::Header;
use jsonwebtoken::encode;
use jsonwebtoken::get_current_timestamp;
use lti1p3_core::KeyFormatError;
use lti1p3_core::Registration;
use rand::Rng;
use rand::distributions::Alphanumeric;
use reqwest::blocking::Client;
use reqwest::header::ACCEPT;
use reqwest::header::CONTENT_TYPE;
use reqwest::header::LINK;
use reqwest::redirect::Policy;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// OAuth2 grant type for service access.
const GRANT_TYPE: &str = "client_credentials";

/// Client assertion type URN for JWT bearer authentication.
const CLIENT_ASSERTION_TYPE: &str = "urn:ietf:params:oauth:client-assertion-type:jwt-bearer";

/// Lifetime of a signed client assertion, in seconds.
const ASSERTION_LIFETIME_SECONDS: u64 = 60;

/// Token lifetime assumed when the endpoint omits `expires_in`, in seconds.
const DEFAULT_TOKEN_LIFETIME_SECONDS: u64 = 3_600;

/// Length of the random `jti` claim on client assertions.
const JTI_LENGTH: usize = 24;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors produced while authenticating against or calling LTI services.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The HTTP client could not be constructed.
    #[error("http client build failed: {detail}")]
    Client {
        /// Builder failure message.
        detail: String,
    },
    /// The client assertion could not be signed.
    #[error("client assertion signing failed")]
    AssertionSigning(#[source] jsonwebtoken::errors::Error),
    /// The tool key material could not be parsed.
    #[error(transparent)]
    KeyFormat(#[from] KeyFormatError),
    /// The token endpoint answered with a non-success status.
    #[error("token endpoint rejected the request with status {status}: {body}")]
    TokenEndpoint {
        /// HTTP status code of the rejection.
        status: u16,
        /// Response body text.
        body: String,
    },
    /// The token endpoint payload was missing required members.
    #[error("token endpoint returned an unusable payload: {detail}")]
    TokenPayload {
        /// Description of the missing or malformed member.
        detail: String,
    },
    /// The HTTP request could not be completed.
    #[error("service request failed")]
    Transport(#[source] reqwest::Error),
    /// A service endpoint answered with a non-success status.
    #[error("service request to {url} failed with status {status}: {body}")]
    ServiceStatus {
        /// Requested service URL.
        url: String,
        /// HTTP status code of the failure.
        status: u16,
        /// Response body text.
        body: String,
    },
    /// A request or response body was not usable JSON.
    #[error("malformed json for service request to {url}: {detail}")]
    MalformedJson {
        /// Requested service URL.
        url: String,
        /// Serializer or parser message.
        detail: String,
    },
    /// A service URL could not be parsed or extended.
    #[error("invalid service url {url}")]
    Url {
        /// Offending URL text.
        url: String,
        /// Parse failure.
        #[source]
        source: url::ParseError,
    },
}

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Configuration for the service connector's HTTP client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConnectorConfig {
    /// Request timeout in milliseconds.
    pub timeout_ms: u64,
    /// User agent string for outbound requests.
    pub user_agent: String,
}

impl Default for ServiceConnectorConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 10_000,
            user_agent: "lti1p3-services/0.1".to_string(),
        }
    }
}

// ============================================================================
// SECTION: Pages
// ============================================================================

/// One page of a service response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServicePage {
    /// Decoded JSON body of the page.
    pub body: Value,
    /// Target of the `Link` header entry with `rel="next"`, when present.
    pub next_page_url: Option<String>,
}

// ============================================================================
// SECTION: Client Assertion
// ============================================================================

/// Claims of the RS256 client assertion presented at the token endpoint.
#[derive(Debug, Serialize)]
struct AssertionClaims<'a> {
    /// Assertion issuer, the tool's client id.
    iss: &'a str,
    /// Assertion subject, the same client id.
    sub: &'a str,
    /// Assertion audience, the platform's token service.
    aud: &'a str,
    /// Issue time in seconds since the Unix epoch.
    iat: u64,
    /// Expiry time in seconds since the Unix epoch.
    exp: u64,
    /// Unique assertion identifier.
    jti: String,
}

/// An access token held in the cache together with its expiry instant.
#[derive(Debug, Clone)]
struct CachedAccessToken {
    /// The bearer token text.
    access_token: String,
    /// Expiry in seconds since the Unix epoch.
    expires_at: u64,
}

// ============================================================================
// SECTION: Connector
// ============================================================================

/// Authenticated access to the LTI services of one platform registration.
pub struct ServiceConnector {
    /// Trust bundle for the platform this connector talks to.
    registration: Registration,
    /// HTTP client for token and service requests.
    client: Client,
    /// Access tokens keyed by their sorted scope set.
    token_cache: Mutex<BTreeMap<String, CachedAccessToken>>,
}

impl ServiceConnector {
    /// Creates a connector with the default HTTP client configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Client`] when the HTTP client cannot be
    /// created.
    pub fn new(registration: Registration) -> Result<Self, ServiceError> {
        Self::with_config(registration, ServiceConnectorConfig::default())
    }

    /// Creates a connector with an explicit HTTP client configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Client`] when the HTTP client cannot be
    /// created.
    pub fn with_config(
        registration: Registration,
        config: ServiceConnectorConfig,
    ) -> Result<Self, ServiceError> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .user_agent(config.user_agent)
            .redirect(Policy::none())
            .build()
            .map_err(|err| ServiceError::Client {
                detail: err.to_string(),
            })?;
        Ok(Self {
            registration,
            client,
            token_cache: Mutex::new(BTreeMap::new()),
        })
    }

    /// Returns the registration this connector authenticates for.
    #[must_use]
    pub const fn registration(&self) -> &Registration {
        &self.registration
    }

    /// Obtains an access token covering the given scopes.
    ///
    /// Tokens are cached per sorted scope set and reused until their
    /// `expires_in` window has elapsed. On a miss the token endpoint is
    /// called with the `client_credentials` grant, a signed client
    /// assertion, and the space-joined scopes.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError`] when signing the assertion, reaching the
    /// endpoint, or decoding its payload fails, and
    /// [`ServiceError::TokenEndpoint`] when the endpoint answers with a
    /// non-success status.
    pub fn access_token(&self, scopes: &[String]) -> Result<String, ServiceError> {
        let mut sorted_scopes: Vec<&str> = scopes.iter().map(String::as_str).collect();
        sorted_scopes.sort_unstable();
        let cache_key = sorted_scopes.join("|");
        let now = get_current_timestamp();
        {
            let cache = self.token_cache.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(cached) = cache.get(&cache_key)
                && cached.expires_at > now
            {
                return Ok(cached.access_token.clone());
            }
        }

        let assertion = self.sign_client_assertion(now)?;
        let scope = scopes.join(" ");
        let form = [
            ("grant_type", GRANT_TYPE),
            ("client_assertion_type", CLIENT_ASSERTION_TYPE),
            ("client_assertion", assertion.as_str()),
            ("scope", scope.as_str()),
        ];
        let response = self
            .client
            .post(&self.registration.auth_token_url)
            .form(&form)
            .send()
            .map_err(ServiceError::Transport)?;
        let status = response.status();
        let text = response.text().map_err(ServiceError::Transport)?;
        if !status.is_success() {
            return Err(ServiceError::TokenEndpoint {
                status: status.as_u16(),
                body: text,
            });
        }

        let payload: Value = serde_json::from_str(&text).map_err(|err| {
            ServiceError::TokenPayload {
                detail: err.to_string(),
            }
        })?;
        let access_token = payload
            .get("access_token")
            .and_then(Value::as_str)
            .ok_or_else(|| ServiceError::TokenPayload {
                detail: "access_token missing or not a string".to_string(),
            })?
            .to_string();
        let lifetime = payload
            .get("expires_in")
            .and_then(Value::as_u64)
            .unwrap_or(DEFAULT_TOKEN_LIFETIME_SECONDS);

        let mut cache = self.token_cache.lock().unwrap_or_else(PoisonError::into_inner);
        cache.insert(
            cache_key,
            CachedAccessToken {
                access_token: access_token.clone(),
                expires_at: now + lifetime,
            },
        );
        Ok(access_token)
    }

    /// Performs one authenticated service request and decodes the page.
    ///
    /// Issues a GET when `body` is absent and a POST carrying the JSON body
    /// with the given content type otherwise. The bearer token covers the
    /// given scopes, and the `Accept` header is sent as given. The next-page
    /// URL is taken from the response's `Link` header entry with
    /// `rel="next"`.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::ServiceStatus`] when the endpoint answers
    /// with a non-success status, and other [`ServiceError`] variants when
    /// token acquisition, transport, or JSON decoding fails.
    pub fn make_service_request(
        &self,
        scopes: &[String],
        url: &str,
        body: Option<&Value>,
        accept: &str,
        content_type: &str,
    ) -> Result<ServicePage, ServiceError> {
        let access_token = self.access_token(scopes)?;
        let request = match body {
            Some(payload) => {
                let serialized =
                    serde_json::to_string(payload).map_err(|err| ServiceError::MalformedJson {
                        url: url.to_string(),
                        detail: err.to_string(),
                    })?;
                self.client.post(url).header(CONTENT_TYPE, content_type).body(serialized)
            }
            None => self.client.get(url),
        };
        let response = request
            .bearer_auth(&access_token)
            .header(ACCEPT, accept)
            .send()
            .map_err(ServiceError::Transport)?;
        let status = response.status();
        let next_page_url = response
            .headers()
            .get(LINK)
            .and_then(|value| value.to_str().ok())
            .and_then(next_link_target);
        let text = response.text().map_err(ServiceError::Transport)?;
        if !status.is_success() {
            return Err(ServiceError::ServiceStatus {
                url: url.to_string(),
                status: status.as_u16(),
                body: text,
            });
        }

        let body = if text.trim().is_empty() {
            Value::Object(serde_json::Map::new())
        } else {
            serde_json::from_str(&text).map_err(|err| ServiceError::MalformedJson {
                url: url.to_string(),
                detail: err.to_string(),
            })?
        };
        Ok(ServicePage {
            body,
            next_page_url,
        })
    }

    /// Signs the RS256 client assertion presented at the token endpoint.
    ///
    /// The assertion names the client id as both issuer and subject, targets
    /// the registration's `auth_audience` with a fallback to the token URL,
    /// and carries the derived tool JWK's `kid` when a public key is
    /// configured.
    fn sign_client_assertion(&self, issued_at: u64) -> Result<String, ServiceError> {
        let client_id = self.registration.client_id.as_str();
        let audience = self
            .registration
            .auth_audience
            .clone()
            .unwrap_or_else(|| self.registration.auth_token_url.clone());
        let jti: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(JTI_LENGTH)
            .map(char::from)
            .collect();
        let claims = AssertionClaims {
            iss: client_id,
            sub: client_id,
            aud: &audience,
            iat: issued_at,
            exp: issued_at + ASSERTION_LIFETIME_SECONDS,
            jti,
        };
        let mut header = Header::new(Algorithm::RS256);
        header.kid = self.registration.kid()?;
        let key = EncodingKey::from_rsa_pem(self.registration.tool_private_key.as_bytes())
            .map_err(ServiceError::AssertionSigning)?;
        encode(&header, &claims, &key).map_err(ServiceError::AssertionSigning)
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Extracts the `rel="next"` target from a `Link` header value.
fn next_link_target(header: &str) -> Option<String> {
    for entry in header.split(',') {
        let mut sections = entry.split(';');
        let Some(target) = sections.next() else {
            continue;
        };
        let Some(target) = target.trim().strip_prefix('<').and_then(|rest| rest.strip_suffix('>'))
        else {
            continue;
        };
        let is_next = sections.any(|parameter| {
            let parameter = parameter.trim();
            parameter.eq_ignore_ascii_case("rel=\"next\"") || parameter.eq_ignore_ascii_case("rel=next")
        });
        if is_next {
            return Some(target.to_string());
        }
    }
    None
}
