//! The consent step between the two token endpoints.
//!
//! This flow is not driven by a signed client request but by the resource owner's user agent
//! arriving at the consent page with a request token. The embedding frontend authenticates the
//! owner, displays the client and the realms of the pending grant, and settles the decision
//! through the [`Pending`] handle. Either way the user agent ends up redirected to the callback
//! fixed at issuance.
//!
//! [`Pending`]: struct.Pending.html
use chrono::Utc;
use url::Url;

use crate::primitives::authorizer::{Authorizer, TemporaryGrant};
use crate::primitives::generator::TokenGenerator;
use crate::primitives::realm::Realm;

use super::error::{ErrorKind, ProviderError};
use super::Options;

/// Required functionality to drive the consent step.
pub trait Endpoint {
    /// The policy in effect.
    fn options(&self) -> &Options;

    /// Holds the pending grant the owner decides about.
    fn authorizer(&mut self) -> &mut dyn Authorizer;

    /// Produces the verifier string.
    fn generator(&mut self) -> &mut dyn TokenGenerator;
}

/// A pending grant awaiting the owner's decision.
///
/// Deliberately neither `Clone` nor `Copy`, consuming it through [`authorize`] or [`deny`] is
/// the only way forward and settles the decision exactly once.
///
/// [`authorize`]: #method.authorize
/// [`deny`]: #method.deny
#[derive(Debug)]
pub struct Pending {
    grant: TemporaryGrant,
}

impl Pending {
    /// The request token under decision.
    pub fn token(&self) -> &str {
        &self.grant.token
    }

    /// The consumer key of the requesting client, for display on the consent page.
    pub fn client_key(&self) -> &str {
        &self.grant.client_key
    }

    /// The realms the client asked for, for display on the consent page.
    pub fn realms(&self) -> &Realm {
        &self.grant.realms
    }

    /// Record the owner's approval and construct the callback redirect.
    ///
    /// A verifier is minted and bound to the grant; the returned url carries `oauth_token` and
    /// `oauth_verifier` back to the client.
    pub fn authorize(
        self, endpoint: &mut dyn Endpoint, owner_id: &str,
    ) -> Result<Url, ProviderError> {
        let verifier = endpoint.generator().generate();
        let bound = endpoint
            .authorizer()
            .bind(&self.grant.token, verifier.clone(), owner_id.to_string())?
            .ok_or_else(|| {
                ProviderError::with(
                    ErrorKind::InvalidGrant,
                    "grant vanished or was decided concurrently",
                )
            })?;

        log::debug!(
            "owner {} authorized grant of client {}",
            owner_id,
            bound.client_key
        );

        let mut url = self.grant.redirect_uri;
        url.query_pairs_mut()
            .append_pair("oauth_token", &self.grant.token)
            .append_pair("oauth_verifier", &verifier);
        Ok(url)
    }

    /// Record the owner's refusal and construct the callback redirect.
    ///
    /// The grant stays unauthorized and expires under the normal policy; without a bound
    /// verifier it can never be exchanged. The client is informed through a `denied` parameter
    /// carrying the token.
    pub fn deny(self) -> Url {
        let mut url = self.grant.redirect_uri;
        url.query_pairs_mut()
            .append_pair("denied", &self.grant.token);
        url
    }
}

/// Look up the pending grant behind a request token arriving at the consent page.
///
/// Fails with `invalid_grant` for an unknown, expired or already decided token.
pub fn authorization(
    endpoint: &mut dyn Endpoint, token: &str,
) -> Result<Pending, ProviderError> {
    let grant = endpoint
        .authorizer()
        .lookup(token)?
        .ok_or_else(|| ProviderError::with(ErrorKind::InvalidGrant, "unknown request token"))?;

    if grant.until < Utc::now() {
        endpoint.authorizer().cancel(token)?;
        return Err(ProviderError::with(
            ErrorKind::InvalidGrant,
            "request token expired",
        ));
    }

    if grant.authorized() {
        return Err(ProviderError::with(
            ErrorKind::InvalidGrant,
            "request token already decided",
        ));
    }

    Ok(Pending { grant })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitives::authorizer::GrantMap;
    use crate::primitives::generator::RandomGenerator;

    use chrono::Duration;

    struct Setup {
        options: Options,
        authorizer: GrantMap,
        generator: RandomGenerator,
    }

    impl Setup {
        fn new() -> Setup {
            Setup {
                options: Options::new(),
                authorizer: GrantMap::new(),
                generator: RandomGenerator::new(16),
            }
        }

        fn with_pending(token: &str) -> Setup {
            let mut setup = Setup::new();
            setup
                .authorizer
                .issue(TemporaryGrant {
                    token: token.to_string(),
                    secret: "Secret".to_string(),
                    client_key: "dev".to_string(),
                    owner_id: None,
                    realms: "email".parse().unwrap(),
                    redirect_uri: "https://client.example/cb".parse().unwrap(),
                    verifier: None,
                    until: Utc::now() + Duration::minutes(10),
                })
                .unwrap();
            setup
        }
    }

    impl Endpoint for Setup {
        fn options(&self) -> &Options {
            &self.options
        }

        fn authorizer(&mut self) -> &mut dyn Authorizer {
            &mut self.authorizer
        }

        fn generator(&mut self) -> &mut dyn TokenGenerator {
            &mut self.generator
        }
    }

    #[test]
    fn approval_binds_and_redirects() {
        let mut setup = Setup::with_pending("T1");

        let pending = authorization(&mut setup, "T1").expect("pending grant not found");
        assert_eq!(pending.client_key(), "dev");
        assert_eq!(pending.realms(), &"email".parse().unwrap());

        let redirect = pending.authorize(&mut setup, "alice").unwrap();
        assert_eq!(redirect.host_str(), Some("client.example"));

        let pairs: Vec<_> = redirect.query_pairs().collect();
        assert!(pairs.iter().any(|(k, v)| k == "oauth_token" && v == "T1"));
        let verifier = pairs
            .iter()
            .find(|(k, _)| k == "oauth_verifier")
            .map(|(_, v)| v.to_string())
            .expect("no verifier relayed");

        let bound = setup.authorizer.lookup("T1").unwrap().unwrap();
        assert!(bound.authorized());
        assert_eq!(bound.verifier.as_deref(), Some(verifier.as_str()));
        assert_eq!(bound.owner_id.as_deref(), Some("alice"));
    }

    #[test]
    fn denial_redirects_and_leaves_grant_unauthorized() {
        let mut setup = Setup::with_pending("T1");

        let pending = authorization(&mut setup, "T1").unwrap();
        let redirect = pending.deny();

        assert!(redirect
            .query_pairs()
            .any(|(k, v)| k == "denied" && v == "T1"));
        // The grant remains, unauthorized, and runs into its expiry.
        let grant = setup.authorizer.lookup("T1").unwrap().unwrap();
        assert!(!grant.authorized());
    }

    #[test]
    fn unknown_token() {
        let mut setup = Setup::new();
        let err = authorization(&mut setup, "nope").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidGrant);
    }

    #[test]
    fn expired_grant_refused() {
        let mut setup = Setup::with_pending("T1");
        if let Some(grant) = setup.authorizer.lookup("T1").unwrap() {
            setup
                .authorizer
                .issue(TemporaryGrant {
                    until: Utc::now() - Duration::minutes(1),
                    ..grant
                })
                .unwrap();
        }

        let err = authorization(&mut setup, "T1").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidGrant);
        // The expired grant is garbage collected on the way.
        assert!(setup.authorizer.lookup("T1").unwrap().is_none());
    }

    #[test]
    fn interleaved_consent_settles_once() {
        let mut setup = Setup::with_pending("T1");

        // Two consent pages opened before either decision lands.
        let first = authorization(&mut setup, "T1").unwrap();
        let second = authorization(&mut setup, "T1").unwrap();

        let redirect = first.authorize(&mut setup, "alice").unwrap();
        let verifier = redirect
            .query_pairs()
            .find(|(k, _)| k == "oauth_verifier")
            .map(|(_, v)| v.to_string())
            .unwrap();

        // The slower decision must not rebind the grant.
        let err = second.authorize(&mut setup, "mallory").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidGrant);

        let kept = setup.authorizer.lookup("T1").unwrap().unwrap();
        assert_eq!(kept.owner_id.as_deref(), Some("alice"));
        assert_eq!(kept.verifier.as_deref(), Some(verifier.as_str()));
    }

    #[test]
    fn decided_grant_not_redisplayed() {
        let mut setup = Setup::with_pending("T1");
        let pending = authorization(&mut setup, "T1").unwrap();
        pending.authorize(&mut setup, "alice").unwrap();

        let err = authorization(&mut setup, "T1").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidGrant);
    }
}
