//! Guards protected resources behind a valid access token.
//!
//! The resource server names the realms a resource requires and hands the incoming request to
//! [`protect`]. A request passes only with an authentic signature keyed on a live access token
//! whose granted realms cover the requirement; what comes back is the authorization context the
//! resource can act on.
//!
//! [`protect`]: fn.protect.html
use chrono::Utc;

use crate::primitives::issuer::Issuer;
use crate::primitives::nonce::NonceStore;
use crate::primitives::realm::Realm;
use crate::primitives::registrar::Registrar;

use super::error::{ErrorKind, ProviderError};
use super::params::{OauthParams, Request};
use super::{verify_signed_request, Options};

/// Required functionality to guard resource requests.
pub trait Endpoint {
    /// The policy in effect.
    fn options(&self) -> &Options;

    /// Used to resolve the requesting client.
    fn registrar(&self) -> &dyn Registrar;

    /// Records the nonce tuples of accepted requests.
    fn nonces(&mut self) -> &mut dyn NonceStore;

    /// Holds the access tokens.
    fn issuer(&mut self) -> &mut dyn Issuer;
}

/// The authorization a request proved to hold.
#[derive(Clone, Debug)]
pub struct AuthContext {
    /// The consumer key of the requesting client.
    pub client_key: String,

    /// The resource owner the token acts for.
    pub owner_id: String,

    /// The realms granted to the token, at least the required set.
    pub realms: Realm,
}

/// Check a resource request against the realms the resource requires.
///
/// An expired token is revoked on sight. Tokens that are unknown, expired or revoked all answer
/// `invalid_token`, a live token short on realms answers `insufficient_scope`.
pub fn protect(
    endpoint: &mut dyn Endpoint, request: &dyn Request, required: &Realm,
) -> Result<AuthContext, ProviderError> {
    let params = OauthParams::from_request(request)?;

    let token = params.token.clone().ok_or_else(|| {
        ProviderError::with(ErrorKind::InvalidToken, "no access token presented")
    })?;

    let client = endpoint
        .registrar()
        .client(&params.consumer_key)?
        .ok_or_else(|| {
            ProviderError::with(ErrorKind::InvalidClient, "unknown consumer key")
        })?;

    let access = endpoint
        .issuer()
        .recover(&params.consumer_key, &token)?
        .ok_or_else(|| {
            ProviderError::with(ErrorKind::InvalidToken, "unknown access token")
        })?;

    if let Some(until) = access.until {
        if until < Utc::now() {
            endpoint.issuer().revoke(&params.consumer_key, &token)?;
            return Err(ProviderError::with(
                ErrorKind::InvalidToken,
                "access token expired",
            ));
        }
    }

    let options = endpoint.options().clone();
    verify_signed_request(
        &options,
        request,
        &params,
        &client,
        Some(&token),
        &access.secret,
        endpoint.nonces(),
    )?;

    if !required.allow_access(&access.realms) {
        log::debug!(
            "token of client {} lacks realms, has [{}] needs [{}]",
            access.client_key,
            access.realms,
            required
        );
        return Err(ProviderError::with(
            ErrorKind::InsufficientScope,
            "token does not cover the required realms",
        ));
    }

    Ok(AuthContext {
        client_key: access.client_key,
        owner_id: access.owner_id,
        realms: access.realms,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitives::issuer::{AccessToken, TokenMap};
    use crate::primitives::nonce::NonceLog;
    use crate::primitives::registrar::{Client, ClientMap};
    use crate::provider::tests::{oauth_body, Signed};

    use chrono::Duration;

    const URI: &str = "https://provider.example/api/contacts";

    struct Setup {
        options: Options,
        registrar: ClientMap,
        nonces: NonceLog,
        issuer: TokenMap,
    }

    impl Setup {
        /// A registered client plus an access token `A1` granting `email` for `alice`.
        fn new() -> Setup {
            let mut registrar = ClientMap::new();
            registrar.register_client(Client::new(
                "dev",
                "devsecret",
                "https://client.example/cb".parse().unwrap(),
                "email address".parse().unwrap(),
            ));

            let mut issuer = TokenMap::new();
            issuer
                .issue(AccessToken {
                    token: "A1".to_string(),
                    secret: "AS1".to_string(),
                    client_key: "dev".to_string(),
                    owner_id: "alice".to_string(),
                    realms: "email".parse().unwrap(),
                    until: None,
                })
                .unwrap();

            Setup {
                options: Options::new(),
                registrar,
                nonces: NonceLog::new(),
                issuer,
            }
        }
    }

    impl Endpoint for Setup {
        fn options(&self) -> &Options {
            &self.options
        }

        fn registrar(&self) -> &dyn Registrar {
            &self.registrar
        }

        fn nonces(&mut self) -> &mut dyn NonceStore {
            &mut self.nonces
        }

        fn issuer(&mut self) -> &mut dyn Issuer {
            &mut self.issuer
        }
    }

    fn resource_body(nonce: &str) -> Vec<(String, String)> {
        let mut body = oauth_body("dev", nonce, Utc::now().timestamp());
        body.push(("oauth_token".to_string(), "A1".to_string()));
        body
    }

    #[test]
    fn admits_covered_request() {
        let mut setup = Setup::new();
        let request = Signed::new(URI, resource_body("n1"), "devsecret", "AS1");

        let context = protect(&mut setup, &request, &"email".parse().unwrap())
            .expect("covered request refused");
        assert_eq!(context.client_key, "dev");
        assert_eq!(context.owner_id, "alice");
    }

    #[test]
    fn insufficient_realms() {
        let mut setup = Setup::new();
        let request = Signed::new(URI, resource_body("n1"), "devsecret", "AS1");

        let err = protect(&mut setup, &request, &"address".parse().unwrap()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InsufficientScope);
    }

    #[test]
    fn unknown_token() {
        let mut setup = Setup::new();
        let mut body = oauth_body("dev", "n1", Utc::now().timestamp());
        body.push(("oauth_token".to_string(), "ghost".to_string()));
        let request = Signed::new(URI, body, "devsecret", "AS1");

        let err = protect(&mut setup, &request, &"email".parse().unwrap()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidToken);
    }

    #[test]
    fn expired_token_revoked() {
        let mut setup = Setup::new();
        setup
            .issuer
            .issue(AccessToken {
                token: "A1".to_string(),
                secret: "AS1".to_string(),
                client_key: "dev".to_string(),
                owner_id: "alice".to_string(),
                realms: "email".parse().unwrap(),
                until: Some(Utc::now() - Duration::minutes(1)),
            })
            .unwrap();

        let request = Signed::new(URI, resource_body("n1"), "devsecret", "AS1");
        let err = protect(&mut setup, &request, &"email".parse().unwrap()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidToken);
        assert!(setup.issuer.recover("dev", "A1").unwrap().is_none());
    }

    #[test]
    fn replayed_resource_request() {
        let mut setup = Setup::new();
        let request = Signed::new(URI, resource_body("n1"), "devsecret", "AS1");

        protect(&mut setup, &request, &"email".parse().unwrap()).unwrap();
        let err = protect(&mut setup, &request, &"email".parse().unwrap()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ReplayedNonce);
    }

    #[test]
    fn revoked_token_refused() {
        let mut setup = Setup::new();
        setup.issuer.revoke("dev", "A1").unwrap();

        let request = Signed::new(URI, resource_body("n1"), "devsecret", "AS1");
        let err = protect(&mut setup, &request, &"email".parse().unwrap()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidToken);
    }
}
