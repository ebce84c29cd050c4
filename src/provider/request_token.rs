//! Issues temporary credentials, the first leg of the token dance.
//!
//! A client posts a signed request carrying no token; the signature is keyed on its consumer
//! secret alone. On success it receives a fresh request token and secret, and the callback for
//! the later consent redirect is fixed against the registered set.
use crate::primitives::authorizer::{Authorizer, TemporaryGrant};
use crate::primitives::generator::TokenGenerator;
use crate::primitives::nonce::NonceStore;
use crate::primitives::registrar::Registrar;

use super::error::{ErrorKind, ProviderError};
use super::params::{OauthParams, Request};
use super::{requested_realms, verify_signed_request, Options};

use url::Url;

/// Required functionality to handle temporary credential requests.
///
/// Each method returns an attribute that the flow needs for this request. The borrows are
/// split so that a single endpoint struct can hand out its primitives one by one.
pub trait Endpoint {
    /// The policy in effect.
    fn options(&self) -> &Options;

    /// Used to resolve the requesting client.
    fn registrar(&self) -> &dyn Registrar;

    /// Records the nonce tuples of accepted requests.
    fn nonces(&mut self) -> &mut dyn NonceStore;

    /// Persists the minted grant until the exchange.
    fn authorizer(&mut self) -> &mut dyn Authorizer;

    /// Produces the token and secret strings.
    fn generator(&mut self) -> &mut dyn TokenGenerator;
}

/// The freshly minted temporary credential.
#[derive(Clone, Debug)]
pub struct IssuedTemporary {
    /// The request token, to be presented at the consent page.
    pub token: String,

    /// The matching secret, keying the signature of the exchange request.
    pub secret: String,
}

impl IssuedTemporary {
    /// The traditional form-encoded response body of the endpoint.
    pub fn to_urlencoded(&self) -> String {
        url::form_urlencoded::Serializer::new(String::new())
            .append_pair("oauth_token", &self.token)
            .append_pair("oauth_token_secret", &self.secret)
            .append_pair("oauth_callback_confirmed", "true")
            .finish()
    }
}

/// Try to mint a temporary credential for the request.
pub fn request_token(
    endpoint: &mut dyn Endpoint, request: &dyn Request,
) -> Result<IssuedTemporary, ProviderError> {
    let params = OauthParams::from_request(request)?;

    if params.token.is_some() {
        return Err(ProviderError::with(
            ErrorKind::InvalidRequest,
            "temporary credential requests must not carry a token",
        ));
    }

    let client = endpoint
        .registrar()
        .client(&params.consumer_key)?
        .ok_or_else(|| {
            ProviderError::with(ErrorKind::InvalidClient, "unknown consumer key")
        })?;

    // Signed with the consumer secret alone, no token secret yet.
    let options = endpoint.options().clone();
    verify_signed_request(&options, request, &params, &client, None, "", endpoint.nonces())?;

    let callback = match params.callback.as_deref() {
        None => None,
        // There is no way to relay the verifier without a redirect.
        Some("oob") => {
            return Err(ProviderError::with(
                ErrorKind::MissingRedirectUri,
                "out-of-band callbacks are not supported",
            ))
        }
        Some(raw) => Some(raw.parse::<Url>().map_err(|_| {
            ProviderError::with(ErrorKind::InvalidRequest, "malformed oauth_callback")
        })?),
    };

    let redirect_uri = client.bound_redirect(callback.as_ref()).ok_or_else(|| {
        ProviderError::with(ErrorKind::InvalidRequest, "oauth_callback not registered")
    })?;

    let requested = requested_realms(&params)?;
    let mut realms = client.negotiate_realms(requested.as_ref()).ok_or_else(|| {
        ProviderError::with(ErrorKind::InvalidScope, "realms exceed the registered set")
    })?;
    if realms.is_empty() {
        realms = options.fallback_realms().clone();
    }

    let token = endpoint.generator().generate();
    let secret = endpoint.generator().generate();
    let until = options.temporary_until();

    endpoint.authorizer().issue(TemporaryGrant {
        token: token.clone(),
        secret: secret.clone(),
        client_key: client.client_key().to_string(),
        owner_id: None,
        realms,
        redirect_uri,
        verifier: None,
        until,
    })?;

    log::debug!("issued temporary credential to client {}", client.client_key());
    Ok(IssuedTemporary { token, secret })
}
