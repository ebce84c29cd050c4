//! Exchanges an authorized temporary credential for an access token.
//!
//! The client returns with the request token and the verifier relayed through the consent
//! redirect, signing with its consumer secret joined with the request token secret. The grant
//! is consumed atomically so that of two concurrent exchanges at most one can win; the loser
//! receives `invalid_grant` like any other stale token.
use chrono::Utc;

use crate::primitives::authorizer::Authorizer;
use crate::primitives::generator::TokenGenerator;
use crate::primitives::issuer::{AccessToken, Issuer};
use crate::primitives::nonce::NonceStore;
use crate::primitives::registrar::Registrar;

use super::error::{ErrorKind, ProviderError};
use super::params::{OauthParams, Request};
use super::{verify_signed_request, Options};

/// Required functionality to handle access token requests.
pub trait Endpoint {
    /// The policy in effect.
    fn options(&self) -> &Options;

    /// Used to resolve the requesting client.
    fn registrar(&self) -> &dyn Registrar;

    /// Records the nonce tuples of accepted requests.
    fn nonces(&mut self) -> &mut dyn NonceStore;

    /// Holds the grant being exchanged.
    fn authorizer(&mut self) -> &mut dyn Authorizer;

    /// Persists the minted access token.
    fn issuer(&mut self) -> &mut dyn Issuer;

    /// Produces the token and secret strings.
    fn generator(&mut self) -> &mut dyn TokenGenerator;
}

/// The freshly minted access credential.
#[derive(Clone, Debug)]
pub struct IssuedAccess {
    /// The access token presented on resource requests.
    pub token: String,

    /// The matching secret, keying the signature of resource requests.
    pub secret: String,
}

impl IssuedAccess {
    /// The traditional form-encoded response body of the endpoint.
    pub fn to_urlencoded(&self) -> String {
        url::form_urlencoded::Serializer::new(String::new())
            .append_pair("oauth_token", &self.token)
            .append_pair("oauth_token_secret", &self.secret)
            .finish()
    }
}

/// Try to exchange an authorized grant for an access token.
pub fn access_token(
    endpoint: &mut dyn Endpoint, request: &dyn Request,
) -> Result<IssuedAccess, ProviderError> {
    let params = OauthParams::from_request(request)?;

    let token = params.token.clone().ok_or_else(|| {
        ProviderError::with(ErrorKind::InvalidRequest, "missing required parameter oauth_token")
    })?;
    let verifier = params.verifier.clone().ok_or_else(|| {
        ProviderError::with(ErrorKind::InvalidRequest, "missing required parameter oauth_verifier")
    })?;

    let client = endpoint
        .registrar()
        .client(&params.consumer_key)?
        .ok_or_else(|| {
            ProviderError::with(ErrorKind::InvalidClient, "unknown consumer key")
        })?;

    // The grant is only read here, its secret keys the signature. Consumption happens after
    // the request proved authentic.
    let grant = endpoint.authorizer().lookup(&token)?.ok_or_else(|| {
        ProviderError::with(ErrorKind::InvalidGrant, "unknown request token")
    })?;

    if grant.client_key != params.consumer_key {
        return Err(ProviderError::with(
            ErrorKind::InvalidGrant,
            "request token was issued to another client",
        ));
    }

    if grant.until < Utc::now() {
        endpoint.authorizer().cancel(&token)?;
        return Err(ProviderError::with(
            ErrorKind::InvalidGrant,
            "request token expired",
        ));
    }

    let options = endpoint.options().clone();
    verify_signed_request(
        &options,
        request,
        &params,
        &client,
        Some(&token),
        &grant.secret,
        endpoint.nonces(),
    )?;

    // Atomic consumption, a wrong verifier or a lost race both end up here.
    let grant = endpoint
        .authorizer()
        .extract(&token, &verifier)?
        .ok_or_else(|| {
            ProviderError::with(
                ErrorKind::InvalidGrant,
                "verifier mismatch or token already exchanged",
            )
        })?;

    let owner_id = grant.owner_id.ok_or_else(|| {
        ProviderError::with(ErrorKind::InvalidGrant, "grant was never authorized")
    })?;

    let token = endpoint.generator().generate();
    let secret = endpoint.generator().generate();
    let until = options.access_until();

    endpoint.issuer().issue(AccessToken {
        token: token.clone(),
        secret: secret.clone(),
        client_key: grant.client_key.clone(),
        owner_id,
        realms: grant.realms,
        until,
    })?;

    log::debug!("exchanged grant for access token, client {}", grant.client_key);
    Ok(IssuedAccess { token, secret })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitives::authorizer::{GrantMap, TemporaryGrant};
    use crate::primitives::generator::RandomGenerator;
    use crate::primitives::issuer::TokenMap;
    use crate::primitives::nonce::NonceLog;
    use crate::primitives::registrar::{Client, ClientMap};
    use crate::provider::tests::{oauth_body, Signed};

    use chrono::Duration;

    const URI: &str = "https://provider.example/oauth/access_token";

    struct Setup {
        options: Options,
        registrar: ClientMap,
        nonces: NonceLog,
        authorizer: GrantMap,
        issuer: TokenMap,
        generator: RandomGenerator,
    }

    impl Setup {
        /// A registered client plus an authorized grant `T1` with verifier `V1` for `alice`.
        fn new() -> Setup {
            let mut registrar = ClientMap::new();
            registrar.register_client(Client::new(
                "dev",
                "devsecret",
                "https://client.example/cb".parse().unwrap(),
                "email address".parse().unwrap(),
            ));

            let mut authorizer = GrantMap::new();
            authorizer
                .issue(TemporaryGrant {
                    token: "T1".to_string(),
                    secret: "S1".to_string(),
                    client_key: "dev".to_string(),
                    owner_id: Some("alice".to_string()),
                    realms: "email".parse().unwrap(),
                    redirect_uri: "https://client.example/cb".parse().unwrap(),
                    verifier: Some("V1".to_string()),
                    until: Utc::now() + Duration::minutes(10),
                })
                .unwrap();

            Setup {
                options: Options::new(),
                registrar,
                nonces: NonceLog::new(),
                authorizer,
                issuer: TokenMap::new(),
                generator: RandomGenerator::new(16),
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

        fn authorizer(&mut self) -> &mut dyn Authorizer {
            &mut self.authorizer
        }

        fn issuer(&mut self) -> &mut dyn Issuer {
            &mut self.issuer
        }

        fn generator(&mut self) -> &mut dyn TokenGenerator {
            &mut self.generator
        }
    }

    fn exchange_body(nonce: &str, verifier: &str) -> Vec<(String, String)> {
        let mut body = oauth_body("dev", nonce, Utc::now().timestamp());
        body.push(("oauth_token".to_string(), "T1".to_string()));
        body.push(("oauth_verifier".to_string(), verifier.to_string()));
        body
    }

    #[test]
    fn exchange_mints_access_token() {
        let mut setup = Setup::new();
        let request = Signed::new(URI, exchange_body("n1", "V1"), "devsecret", "S1");

        let issued = access_token(&mut setup, &request).expect("exchange refused");
        assert!(!issued.token.is_empty());

        let minted = setup
            .issuer
            .recover("dev", &issued.token)
            .unwrap()
            .expect("access token not persisted");
        assert_eq!(minted.owner_id, "alice");
        assert_eq!(minted.realms, "email".parse().unwrap());
        assert!(minted.until.is_none());

        // The grant is consumed.
        assert!(setup.authorizer.lookup("T1").unwrap().is_none());
    }

    #[test]
    fn wrong_verifier_leaves_grant() {
        let mut setup = Setup::new();
        let request = Signed::new(URI, exchange_body("n1", "V2"), "devsecret", "S1");

        let err = access_token(&mut setup, &request).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidGrant);
        assert!(setup.authorizer.lookup("T1").unwrap().is_some());
    }

    #[test]
    fn exchange_only_once() {
        let mut setup = Setup::new();
        let first = Signed::new(URI, exchange_body("n1", "V1"), "devsecret", "S1");
        access_token(&mut setup, &first).expect("first exchange refused");

        let second = Signed::new(URI, exchange_body("n2", "V1"), "devsecret", "S1");
        let err = access_token(&mut setup, &second).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidGrant);
    }

    #[test]
    fn foreign_client_refused() {
        let mut setup = Setup::new();
        setup.registrar.register_client(Client::new(
            "other",
            "othersecret",
            "https://other.example/cb".parse().unwrap(),
            "email".parse().unwrap(),
        ));

        let mut body = exchange_body("n1", "V1");
        body[0].1 = "other".to_string();
        let request = Signed::new(URI, body, "othersecret", "S1");

        let err = access_token(&mut setup, &request).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidGrant);
        assert!(setup.authorizer.lookup("T1").unwrap().is_some());
    }

    #[test]
    fn missing_verifier() {
        let mut setup = Setup::new();
        let mut body = oauth_body("dev", "n1", Utc::now().timestamp());
        body.push(("oauth_token".to_string(), "T1".to_string()));
        let request = Signed::new(URI, body, "devsecret", "S1");

        let err = access_token(&mut setup, &request).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidRequest);
    }

    #[test]
    fn signature_keyed_on_token_secret() {
        let mut setup = Setup::new();
        // Signed without the token secret half of the key.
        let request = Signed::new(URI, exchange_body("n1", "V1"), "devsecret", "");

        let err = access_token(&mut setup, &request).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidSignature);
        assert!(setup.authorizer.lookup("T1").unwrap().is_some());
    }
}
