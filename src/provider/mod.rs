//! Provides the handling of the protocol flows of an OAuth 1.0a provider.
//!
//! Each flow is a free function against two abstractions, the [`Request`] view of an incoming
//! http request and an endpoint trait bundling the backing primitives it needs. The three
//! token-granting flows plus the resource guard share one verification pipeline: transport
//! check, client resolution, timestamp window, signature, replay protection, in that order.
//!
//! [`Request`]: params/trait.Request.html
use chrono::{Duration, Utc};

use crate::primitives::nonce::{NonceRecord, NonceStore};
use crate::primitives::realm::Realm;
use crate::primitives::registrar::Client;

pub mod access_token;
pub mod authorization;
pub mod error;
pub mod params;
pub mod request_token;
pub mod resource;
pub mod signature;

pub use self::error::{ErrorKind, ProviderError};
pub use self::params::{OauthParams, Request};
pub use self::signature::SignatureMethod;

/// Provider wide policy knobs, shared by all flows.
///
/// The defaults are deliberately strict. Loosening `enforce_ssl` is meant for development
/// setups behind a terminating proxy that does not rewrite the scheme.
#[derive(Clone, Debug)]
pub struct Options {
    enforce_ssl: bool,
    key_length: (usize, usize),
    default_realms: Realm,
    timestamp_window: Duration,
    temporary_validity: Duration,
    access_validity: Option<Duration>,
}

impl Options {
    /// The default policy: ssl required, ten minute grants, non-expiring access tokens.
    pub fn new() -> Options {
        Options::default()
    }

    /// Accept requests over insecure transports.
    ///
    /// This also admits `PLAINTEXT` signatures on such transports, use with care.
    pub fn allow_insecure_transport(mut self) -> Self {
        self.enforce_ssl = false;
        self
    }

    /// Bounds on the length of consumer keys and token strings.
    pub fn key_length(mut self, min: usize, max: usize) -> Self {
        self.key_length = (min, max);
        self
    }

    /// Realms attached to a grant when neither the request nor the client registration names
    /// any.
    pub fn default_realms(mut self, realms: Realm) -> Self {
        self.default_realms = realms;
        self
    }

    /// Tolerated difference between `oauth_timestamp` and the provider clock.
    pub fn timestamp_window(mut self, window: Duration) -> Self {
        self.timestamp_window = window;
        self
    }

    /// How long an unexchanged temporary grant stays valid.
    pub fn temporary_validity(mut self, validity: Duration) -> Self {
        self.temporary_validity = validity;
        self
    }

    /// Lifetime of issued access tokens, or `None` to never expire them.
    pub fn access_validity(mut self, validity: Option<Duration>) -> Self {
        self.access_validity = validity;
        self
    }

    pub(crate) fn temporary_until(&self) -> chrono::DateTime<Utc> {
        Utc::now() + self.temporary_validity
    }

    pub(crate) fn access_until(&self) -> Option<chrono::DateTime<Utc>> {
        self.access_validity.map(|validity| Utc::now() + validity)
    }

    pub(crate) fn fallback_realms(&self) -> &Realm {
        &self.default_realms
    }

    fn acceptable_key(&self, key: &str) -> bool {
        let (min, max) = self.key_length;
        (min..=max).contains(&key.len())
    }
}

impl Default for Options {
    fn default() -> Options {
        Options {
            enforce_ssl: true,
            key_length: (3, 30),
            default_realms: Realm::empty(),
            timestamp_window: Duration::seconds(600),
            temporary_validity: Duration::minutes(10),
            access_validity: None,
        }
    }
}

fn secure_transport(request: &dyn Request) -> bool {
    let uri = request.uri();
    matches!(uri.get(..8), Some(scheme) if scheme.eq_ignore_ascii_case("https://"))
}

/// The verification pipeline shared by every flow that accepts signed requests.
///
/// `token` and `token_secret` describe the credential the request claims to be signed with,
/// absent on temporary credential requests. On success the nonce tuple of the request is
/// recorded; rejected requests leave no trace, their nonce may be retried.
pub(crate) fn verify_signed_request(
    options: &Options, request: &dyn Request, params: &OauthParams, client: &Client,
    token: Option<&str>, token_secret: &str, nonces: &mut dyn NonceStore,
) -> Result<(), ProviderError> {
    let secure = secure_transport(request);
    if options.enforce_ssl && !secure {
        return Err(ProviderError::with(
            ErrorKind::InvalidRequest,
            "request must be made over a secure transport",
        ));
    }

    if !options.acceptable_key(&params.consumer_key) {
        return Err(ProviderError::with(
            ErrorKind::InvalidClient,
            "consumer key length out of bounds",
        ));
    }

    let age = (Utc::now().timestamp() - params.timestamp).abs();
    if age > options.timestamp_window.num_seconds() {
        log::debug!(
            "rejecting request of client {}, timestamp off by {}s",
            params.consumer_key,
            age
        );
        return Err(ProviderError::with(
            ErrorKind::ExpiredTimestamp,
            "timestamp outside the accepted window",
        ));
    }

    // Under the strict policy an insecure transport was already refused above, so a PLAINTEXT
    // signature only ever reaches verification over https or under the relaxed policy.
    let method: SignatureMethod = params.signature_method.parse()?;

    let base = signature::base_string(&request.method(), &request.uri(), params.signed_pairs())?;
    signature::verify(
        method,
        &base,
        &params.signature,
        client.secret(),
        token_secret,
        client.rsa_public_key(),
    )?;

    // Only now is the request proven authentic, record its nonce.
    let record = NonceRecord {
        client_key: params.consumer_key.clone(),
        token: token.map(str::to_string),
        nonce: params.nonce.clone(),
        timestamp: params.timestamp,
    };
    if !nonces.check_and_store(&record)? {
        log::warn!("replayed nonce from client {}", params.consumer_key);
        return Err(ProviderError::with(
            ErrorKind::ReplayedNonce,
            "nonce already used",
        ));
    }

    Ok(())
}

/// Resolve the `realm` parameter of a request into the typed realm set.
pub(crate) fn requested_realms(params: &OauthParams) -> Result<Option<Realm>, ProviderError> {
    match &params.realm {
        None => Ok(None),
        Some(raw) => raw
            .parse()
            .map(Some)
            .map_err(|_| ProviderError::with(ErrorKind::InvalidScope, "malformed realm parameter")),
    }
}
