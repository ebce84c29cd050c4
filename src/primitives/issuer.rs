//! Issuers store the long-lived access tokens handed out at the exchange.
//!
//! Internally similar to the authorizer module, but tokens stored here live longer and are never
//! mutated after creation, except for revocation. An access token is created only from a valid,
//! verified temporary grant and inherits its realms and owner.
use std::collections::HashMap;
use std::sync::{MutexGuard, RwLockWriteGuard};

use super::realm::Realm;
use super::{StoreError, Time};

/// The credential granting actual resource access after consent.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AccessToken {
    /// The public token string presented by the client.
    pub token: String,

    /// The token secret, used to key the signature of resource requests.
    pub secret: String,

    /// The consumer key of the owning client.
    pub client_key: String,

    /// The resource owner that consented to the grant.
    pub owner_id: String,

    /// The realms granted to this token.
    pub realms: Realm,

    /// Expiration date (Utc), or `None` for a token without expiry.
    pub until: Option<Time>,
}

/// Issuers persist and recover access tokens.
///
/// Tokens are keyed by the pair of consumer key and token string, since a token string is only
/// meaningful for the client it was issued to. Recovering an unknown pair is a regular
/// `Ok(None)`.
pub trait Issuer {
    /// Persist a freshly minted access token.
    fn issue(&mut self, token: AccessToken) -> Result<(), StoreError>;

    /// Get the record corresponding to a token presented by a client.
    fn recover(&self, client_key: &str, token: &str) -> Result<Option<AccessToken>, StoreError>;

    /// Unconditionally delete the record associated with the token.
    ///
    /// This is the main advantage of a stateful issuer: the resource owner or other instances
    /// can revoke a token before it expires naturally.
    fn revoke(&mut self, client_key: &str, token: &str) -> Result<(), StoreError>;
}

/// Keeps track of access tokens by a hash-map.
#[derive(Default)]
pub struct TokenMap {
    tokens: HashMap<(String, String), AccessToken>,
}

impl TokenMap {
    /// Create an empty map without any tokens in it.
    pub fn new() -> TokenMap {
        TokenMap::default()
    }
}

impl Issuer for TokenMap {
    fn issue(&mut self, token: AccessToken) -> Result<(), StoreError> {
        let key = (token.client_key.clone(), token.token.clone());
        self.tokens.insert(key, token);
        Ok(())
    }

    fn recover(&self, client_key: &str, token: &str) -> Result<Option<AccessToken>, StoreError> {
        let key = (client_key.to_string(), token.to_string());
        Ok(self.tokens.get(&key).cloned())
    }

    fn revoke(&mut self, client_key: &str, token: &str) -> Result<(), StoreError> {
        let key = (client_key.to_string(), token.to_string());
        self.tokens.remove(&key);
        Ok(())
    }
}

impl<'a, I: Issuer + ?Sized> Issuer for &'a mut I {
    fn issue(&mut self, token: AccessToken) -> Result<(), StoreError> {
        (**self).issue(token)
    }

    fn recover(&self, client_key: &str, token: &str) -> Result<Option<AccessToken>, StoreError> {
        (**self).recover(client_key, token)
    }

    fn revoke(&mut self, client_key: &str, token: &str) -> Result<(), StoreError> {
        (**self).revoke(client_key, token)
    }
}

impl<I: Issuer + ?Sized> Issuer for Box<I> {
    fn issue(&mut self, token: AccessToken) -> Result<(), StoreError> {
        (**self).issue(token)
    }

    fn recover(&self, client_key: &str, token: &str) -> Result<Option<AccessToken>, StoreError> {
        (**self).recover(client_key, token)
    }

    fn revoke(&mut self, client_key: &str, token: &str) -> Result<(), StoreError> {
        (**self).revoke(client_key, token)
    }
}

impl<'a, I: Issuer + ?Sized> Issuer for MutexGuard<'a, I> {
    fn issue(&mut self, token: AccessToken) -> Result<(), StoreError> {
        (**self).issue(token)
    }

    fn recover(&self, client_key: &str, token: &str) -> Result<Option<AccessToken>, StoreError> {
        (**self).recover(client_key, token)
    }

    fn revoke(&mut self, client_key: &str, token: &str) -> Result<(), StoreError> {
        (**self).revoke(client_key, token)
    }
}

impl<'a, I: Issuer + ?Sized> Issuer for RwLockWriteGuard<'a, I> {
    fn issue(&mut self, token: AccessToken) -> Result<(), StoreError> {
        (**self).issue(token)
    }

    fn recover(&self, client_key: &str, token: &str) -> Result<Option<AccessToken>, StoreError> {
        (**self).recover(client_key, token)
    }

    fn revoke(&mut self, client_key: &str, token: &str) -> Result<(), StoreError> {
        (**self).revoke(client_key, token)
    }
}
