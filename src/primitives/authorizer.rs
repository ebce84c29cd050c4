//! Authorizers store temporary credentials until they are exchanged for access tokens.
//!
//! The role of an authorizer is to ensure the consistency and security of the consent step in
//! which a client trades an authorized request token for an access token. It persists the grant
//! minted by the request-token flow, binds the resource owner's verifier to it exactly once, and
//! hands the grant out exactly once when it is consumed at the exchange.
use std::collections::HashMap;
use std::sync::{MutexGuard, RwLockWriteGuard};

use super::realm::Realm;
use super::{StoreError, Time};

use url::Url;

/// A temporary credential (request token) awaiting or carrying owner consent.
///
/// Created unauthorized by the request-token flow, mutated exactly once when the owner decides,
/// and consumed exactly once at the access-token exchange. A consumed grant must never reappear
/// from a store.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TemporaryGrant {
    /// The public token string identifying this grant.
    pub token: String,

    /// The token secret, used to key the signature of the exchange request.
    pub secret: String,

    /// The consumer key of the client the grant was issued to.
    pub client_key: String,

    /// The resource owner, bound at authorization time.
    pub owner_id: Option<String>,

    /// The realms negotiated for this grant.
    pub realms: Realm,

    /// The callback the user agent is redirected to after the consent decision.
    pub redirect_uri: Url,

    /// The verifier code, attached at authorization time.
    pub verifier: Option<String>,

    /// Expiration date of the grant (Utc).
    pub until: Time,
}

impl TemporaryGrant {
    /// Whether the owner has decided and a verifier is attached.
    pub fn authorized(&self) -> bool {
        self.verifier.is_some() && self.owner_id.is_some()
    }
}

/// Authorizers create, mutate and consume temporary grants.
///
/// `extract` is the security relevant operation: it must check the verifier and remove the grant
/// in one atomic step, so that of two concurrent exchanges with the same credentials at most one
/// can succeed (there is no stateless implementation of an authorizer for this reason).
pub trait Authorizer {
    /// Persist a freshly minted, unauthorized grant.
    fn issue(&mut self, grant: TemporaryGrant) -> Result<(), StoreError>;

    /// Retrieve the grant for a token without consuming it.
    fn lookup(&self, token: &str) -> Result<Option<TemporaryGrant>, StoreError>;

    /// Attach the verifier and owner decided at the consent step.
    ///
    /// A grant is decided at most once. Returns the updated grant, or `None` for an unknown
    /// token as well as for one that already carries a decision; the earlier verifier stays
    /// in place.
    fn bind(&mut self, token: &str, verifier: String, owner_id: String)
        -> Result<Option<TemporaryGrant>, StoreError>;

    /// Consume the grant if and only if it is still present and the verifier matches.
    ///
    /// In particular, a grant must not be extractable twice and a mismatched verifier must leave
    /// the store unchanged.
    fn extract(&mut self, token: &str, verifier: &str)
        -> Result<Option<TemporaryGrant>, StoreError>;

    /// Unconditionally remove the grant, used to clean up grants found expired.
    fn cancel(&mut self, token: &str) -> Result<(), StoreError>;
}

/// An in-memory hash map of tokens to pending grants.
#[derive(Default)]
pub struct GrantMap {
    grants: HashMap<String, TemporaryGrant>,
}

impl GrantMap {
    /// Create an empty store without any pending grants in it.
    pub fn new() -> GrantMap {
        GrantMap::default()
    }
}

impl Authorizer for GrantMap {
    fn issue(&mut self, grant: TemporaryGrant) -> Result<(), StoreError> {
        self.grants.insert(grant.token.clone(), grant);
        Ok(())
    }

    fn lookup(&self, token: &str) -> Result<Option<TemporaryGrant>, StoreError> {
        Ok(self.grants.get(token).cloned())
    }

    fn bind(&mut self, token: &str, verifier: String, owner_id: String)
        -> Result<Option<TemporaryGrant>, StoreError>
    {
        Ok(match self.grants.get_mut(token) {
            Some(grant) if !grant.authorized() => {
                grant.verifier = Some(verifier);
                grant.owner_id = Some(owner_id);
                Some(grant.clone())
            }
            _ => None,
        })
    }

    fn extract(&mut self, token: &str, verifier: &str)
        -> Result<Option<TemporaryGrant>, StoreError>
    {
        match self.grants.get(token) {
            Some(grant) if grant.verifier.as_deref() == Some(verifier) => (),
            _ => return Ok(None),
        }
        Ok(self.grants.remove(token))
    }

    fn cancel(&mut self, token: &str) -> Result<(), StoreError> {
        self.grants.remove(token);
        Ok(())
    }
}

impl<'a, A: Authorizer + ?Sized> Authorizer for &'a mut A {
    fn issue(&mut self, grant: TemporaryGrant) -> Result<(), StoreError> {
        (**self).issue(grant)
    }

    fn lookup(&self, token: &str) -> Result<Option<TemporaryGrant>, StoreError> {
        (**self).lookup(token)
    }

    fn bind(&mut self, token: &str, verifier: String, owner_id: String)
        -> Result<Option<TemporaryGrant>, StoreError>
    {
        (**self).bind(token, verifier, owner_id)
    }

    fn extract(&mut self, token: &str, verifier: &str)
        -> Result<Option<TemporaryGrant>, StoreError>
    {
        (**self).extract(token, verifier)
    }

    fn cancel(&mut self, token: &str) -> Result<(), StoreError> {
        (**self).cancel(token)
    }
}

impl<A: Authorizer + ?Sized> Authorizer for Box<A> {
    fn issue(&mut self, grant: TemporaryGrant) -> Result<(), StoreError> {
        (**self).issue(grant)
    }

    fn lookup(&self, token: &str) -> Result<Option<TemporaryGrant>, StoreError> {
        (**self).lookup(token)
    }

    fn bind(&mut self, token: &str, verifier: String, owner_id: String)
        -> Result<Option<TemporaryGrant>, StoreError>
    {
        (**self).bind(token, verifier, owner_id)
    }

    fn extract(&mut self, token: &str, verifier: &str)
        -> Result<Option<TemporaryGrant>, StoreError>
    {
        (**self).extract(token, verifier)
    }

    fn cancel(&mut self, token: &str) -> Result<(), StoreError> {
        (**self).cancel(token)
    }
}

impl<'a, A: Authorizer + ?Sized> Authorizer for MutexGuard<'a, A> {
    fn issue(&mut self, grant: TemporaryGrant) -> Result<(), StoreError> {
        (**self).issue(grant)
    }

    fn lookup(&self, token: &str) -> Result<Option<TemporaryGrant>, StoreError> {
        (**self).lookup(token)
    }

    fn bind(&mut self, token: &str, verifier: String, owner_id: String)
        -> Result<Option<TemporaryGrant>, StoreError>
    {
        (**self).bind(token, verifier, owner_id)
    }

    fn extract(&mut self, token: &str, verifier: &str)
        -> Result<Option<TemporaryGrant>, StoreError>
    {
        (**self).extract(token, verifier)
    }

    fn cancel(&mut self, token: &str) -> Result<(), StoreError> {
        (**self).cancel(token)
    }
}

impl<'a, A: Authorizer + ?Sized> Authorizer for RwLockWriteGuard<'a, A> {
    fn issue(&mut self, grant: TemporaryGrant) -> Result<(), StoreError> {
        (**self).issue(grant)
    }

    fn lookup(&self, token: &str) -> Result<Option<TemporaryGrant>, StoreError> {
        (**self).lookup(token)
    }

    fn bind(&mut self, token: &str, verifier: String, owner_id: String)
        -> Result<Option<TemporaryGrant>, StoreError>
    {
        (**self).bind(token, verifier, owner_id)
    }

    fn extract(&mut self, token: &str, verifier: &str)
        -> Result<Option<TemporaryGrant>, StoreError>
    {
        (**self).extract(token, verifier)
    }

    fn cancel(&mut self, token: &str) -> Result<(), StoreError> {
        (**self).cancel(token)
    }
}
