//! The failure taxonomy shared by all protocol flows.
//!
//! Every failure is recoverable at the request boundary: flows return a typed error which the
//! embedding frontend maps to an HTTP status and body. Backend outages are a kind of their own,
//! so that callers can retry them instead of treating a datastore failure as a bad credential.

use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use std::vec;

use crate::primitives::StoreError;

/// Formal kinds of protocol failures.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorKind {
    /// The request is missing a required parameter, includes an invalid parameter value,
    /// includes a parameter more than once, or is otherwise malformed.
    InvalidRequest,

    /// The consumer key does not belong to any registered client.
    InvalidClient,

    /// The supplied signature does not match the expected one.
    InvalidSignature,

    /// The request token or verifier is bad, expired, already consumed, or was issued to
    /// another client.
    InvalidGrant,

    /// The requested realms are not permitted for this client.
    InvalidScope,

    /// The access token does not cover the realms required by the resource.
    InsufficientScope,

    /// The nonce tuple was already used by an accepted request.
    ReplayedNonce,

    /// The timestamp lies outside the tolerated window around the provider clock.
    ExpiredTimestamp,

    /// The declared `oauth_signature_method` is not one of the supported methods.
    UnsupportedSignatureMethod,

    /// Neither the request nor the client registration provides a redirect uri.
    MissingRedirectUri,

    /// The access token is unknown, expired or revoked.
    InvalidToken,

    /// A backing store could not be reached. Retryable, not a credential failure.
    BackendUnavailable,
}

impl ErrorKind {
    fn description(self) -> &'static str {
        match self {
            ErrorKind::InvalidRequest => "invalid_request",
            ErrorKind::InvalidClient => "invalid_client",
            ErrorKind::InvalidSignature => "invalid_signature",
            ErrorKind::InvalidGrant => "invalid_grant",
            ErrorKind::InvalidScope => "invalid_scope",
            ErrorKind::InsufficientScope => "insufficient_scope",
            ErrorKind::ReplayedNonce => "replayed_nonce",
            ErrorKind::ExpiredTimestamp => "expired_timestamp",
            ErrorKind::UnsupportedSignatureMethod => "unsupported_signature_method",
            ErrorKind::MissingRedirectUri => "missing_redirect_uri",
            ErrorKind::InvalidToken => "invalid_token",
            ErrorKind::BackendUnavailable => "backend_unavailable",
        }
    }

    /// The HTTP status code a boundary layer should answer with.
    pub fn status(self) -> u16 {
        match self {
            ErrorKind::InvalidRequest
            | ErrorKind::InvalidScope
            | ErrorKind::UnsupportedSignatureMethod
            | ErrorKind::MissingRedirectUri => 400,
            ErrorKind::InvalidClient
            | ErrorKind::InvalidSignature
            | ErrorKind::InvalidGrant
            | ErrorKind::ReplayedNonce
            | ErrorKind::ExpiredTimestamp
            | ErrorKind::InvalidToken => 401,
            ErrorKind::InsufficientScope => 403,
            ErrorKind::BackendUnavailable => 503,
        }
    }
}

impl AsRef<str> for ErrorKind {
    fn as_ref(&self) -> &str {
        self.description()
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_ref())
    }
}

/// A structured failure answered to the requesting party.
///
/// Carries the formal kind plus an optional human readable explanation. Flows never answer with
/// a partial token; a failed request produces exactly one of these.
#[derive(Clone, Debug)]
pub struct ProviderError {
    error: ErrorKind,
    description: Option<Cow<'static, str>>,
}

impl ProviderError {
    pub(crate) fn new(error: ErrorKind) -> Self {
        ProviderError {
            error,
            description: None,
        }
    }

    pub(crate) fn with(error: ErrorKind, description: impl Into<Cow<'static, str>>) -> Self {
        ProviderError {
            error,
            description: Some(description.into()),
        }
    }

    /// Get the formal kind of error.
    pub fn kind(&self) -> ErrorKind {
        self.error
    }

    /// Set the error kind.
    pub fn set_kind(&mut self, new_kind: ErrorKind) {
        self.error = new_kind;
    }

    /// Provide a short text explanation for the error.
    pub fn explain<D: Into<Cow<'static, str>>>(&mut self, description: D) {
        self.description = Some(description.into())
    }

    /// The HTTP status code a boundary layer should answer with.
    pub fn status(&self) -> u16 {
        self.error.status()
    }

    /// Iterate over the key value pairs that describe this error.
    ///
    /// These pairs must be added to the detailed description of an error, either as a json body
    /// or as form-encoded pairs depending on the endpoint.
    pub fn iter(&self) -> <&Self as IntoIterator>::IntoIter {
        self.into_iter()
    }

    /// Convert the error into a json string, viable for being sent over a network with
    /// `application/json` encoding.
    pub fn to_json(&self) -> String {
        let asmap = self
            .iter()
            .map(|(k, v)| (k.to_string(), v.into_owned()))
            .collect::<HashMap<String, String>>();
        serde_json::to_string(&asmap).unwrap()
    }

    /// Convert the error into a form-encoded body, the representation OAuth 1.0a token
    /// endpoints traditionally answer with.
    pub fn to_urlencoded(&self) -> String {
        let mut serializer = url::form_urlencoded::Serializer::new(String::new());
        for (key, value) in self.iter() {
            serializer.append_pair(key, value.as_ref());
        }
        serializer.finish()
    }
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.description {
            Some(description) => write!(f, "{}: {}", self.error, description),
            None => write!(f, "{}", self.error),
        }
    }
}

impl std::error::Error for ProviderError {}

impl From<ErrorKind> for ProviderError {
    fn from(error: ErrorKind) -> Self {
        ProviderError::new(error)
    }
}

impl From<StoreError> for ProviderError {
    fn from(_: StoreError) -> Self {
        ProviderError::with(ErrorKind::BackendUnavailable, "credential store unavailable")
    }
}

/// The error as key-value pairs.
impl IntoIterator for ProviderError {
    type Item = (&'static str, Cow<'static, str>);
    type IntoIter = vec::IntoIter<(&'static str, Cow<'static, str>)>;

    fn into_iter(self) -> Self::IntoIter {
        let mut vec = vec![("error", Cow::Borrowed(self.error.description()))];
        if let Some(description) = self.description {
            vec.push(("error_description", description));
        }
        vec.into_iter()
    }
}

impl IntoIterator for &'_ ProviderError {
    type Item = (&'static str, Cow<'static, str>);
    type IntoIter = vec::IntoIter<(&'static str, Cow<'static, str>)>;

    fn into_iter(self) -> Self::IntoIter {
        let mut vec = vec![("error", Cow::Borrowed(self.error.description()))];
        if let Some(description) = &self.description {
            vec.push(("error_description", description.clone()));
        }
        vec.into_iter()
    }
}
