//! Registrars administer a database of known clients.
//!
//! A registrar governs the redirect urls a client may be sent back to and the realms it is
//! allowed to request tokens for. When a request turns up, it is the registrar's duty to resolve
//! the consumer key to the registered record so that the flows can verify the signature and
//! negotiate realms and callbacks for consistency with what was registered.
use super::realm::Realm;
use super::StoreError;

use std::collections::HashMap;
use std::sync::{Arc, MutexGuard, RwLockWriteGuard};

use url::Url;

/// Registrars provide a way to resolve clients.
///
/// In general, implementations of this trait will probably offer an interface for registering
/// new clients. This interface is not covered by this library. A lookup of an unknown consumer
/// key is a regular `Ok(None)`, not an error; the flows translate it to an authentication
/// failure. `Err` indicates that the backing store could not answer at all.
pub trait Registrar {
    /// Resolve the client registered under the consumer key.
    fn client(&self, client_key: &str) -> Result<Option<Client>, StoreError>;
}

/// A registered consumer of tokens.
///
/// Clients are immutable once registered. The shared secret is stored verbatim since OAuth 1.0a
/// signatures are keyed on the secret itself, so a one-way password policy can not apply here.
/// Confidentiality of the record is the registrar's duty.
#[derive(Clone, Debug)]
pub struct Client {
    client_key: String,
    secret: String,
    rsa_public_key: Option<String>,
    allowed_realms: Realm,
    redirect_uri: Url,
    additional_redirect_uris: Vec<Url>,
}

impl Client {
    /// Create a client signing with its shared secret (`HMAC-SHA1` or `PLAINTEXT`).
    pub fn new(client_key: &str, secret: &str, redirect_uri: Url, allowed_realms: Realm) -> Client {
        Client {
            client_key: client_key.to_string(),
            secret: secret.to_string(),
            rsa_public_key: None,
            allowed_realms,
            redirect_uri,
            additional_redirect_uris: vec![],
        }
    }

    /// Permit `RSA-SHA1` signatures verified against this public key.
    ///
    /// The key is kept in its PEM encoding (PKCS#8 `SubjectPublicKeyInfo` or PKCS#1) and parsed
    /// by the signature verifier on use.
    pub fn with_rsa_public_key(mut self, pem: &str) -> Self {
        self.rsa_public_key = Some(pem.to_string());
        self
    }

    /// Add additional redirect uris.
    ///
    /// The uri given at construction remains the default one, chosen whenever a request does not
    /// carry an `oauth_callback`.
    pub fn with_additional_redirect_uris(mut self, uris: Vec<Url>) -> Self {
        self.additional_redirect_uris = uris;
        self
    }

    /// The consumer key under which this client is registered.
    pub fn client_key(&self) -> &str {
        &self.client_key
    }

    /// The shared secret used to key signatures.
    pub fn secret(&self) -> &str {
        &self.secret
    }

    /// The PEM encoded RSA public key, if one was registered.
    pub fn rsa_public_key(&self) -> Option<&str> {
        self.rsa_public_key.as_deref()
    }

    /// The realms this client may request.
    pub fn allowed_realms(&self) -> &Realm {
        &self.allowed_realms
    }

    /// Choose the redirect uri for a request.
    ///
    /// A requested callback must match one of the registered uris verbatim, exact matching as
    /// motivated in the rfc. Without a requested callback the registered default is used.
    /// Returns `None` for an unregistered callback.
    pub fn bound_redirect(&self, requested: Option<&Url>) -> Option<Url> {
        match requested {
            None => Some(self.redirect_uri.clone()),
            Some(url) if url.as_str() == self.redirect_uri.as_str() => Some(url.clone()),
            Some(url) if self.additional_redirect_uris.contains(url) => Some(url.clone()),
            Some(_) => None,
        }
    }

    /// Negotiate the realms attached to a new grant.
    ///
    /// A request without realms receives the client's full allowed set. Requested realms must be
    /// a subset of the allowed set, anything else is refused with `None` and the flows answer
    /// with an `invalid_scope` failure.
    pub fn negotiate_realms(&self, requested: Option<&Realm>) -> Option<Realm> {
        match requested {
            None => Some(self.allowed_realms.clone()),
            Some(realms) if realms.allow_access(&self.allowed_realms) => Some(realms.clone()),
            Some(_) => None,
        }
    }
}

/// A very simple, in-memory hash map of consumer keys to client records.
#[derive(Default)]
pub struct ClientMap {
    clients: HashMap<String, Client>,
}

impl ClientMap {
    /// Create an empty map without any clients in it.
    pub fn new() -> ClientMap {
        ClientMap::default()
    }

    /// Insert or update the client record.
    pub fn register_client(&mut self, client: Client) {
        self.clients.insert(client.client_key.clone(), client);
    }
}

impl Extend<Client> for ClientMap {
    fn extend<I>(&mut self, iter: I)
    where
        I: IntoIterator<Item = Client>,
    {
        iter.into_iter().for_each(|client| self.register_client(client))
    }
}

impl Registrar for ClientMap {
    fn client(&self, client_key: &str) -> Result<Option<Client>, StoreError> {
        Ok(self.clients.get(client_key).cloned())
    }
}

impl<'s, R: Registrar + ?Sized> Registrar for &'s R {
    fn client(&self, client_key: &str) -> Result<Option<Client>, StoreError> {
        (**self).client(client_key)
    }
}

impl<'s, R: Registrar + ?Sized> Registrar for &'s mut R {
    fn client(&self, client_key: &str) -> Result<Option<Client>, StoreError> {
        (**self).client(client_key)
    }
}

impl<R: Registrar + ?Sized> Registrar for Box<R> {
    fn client(&self, client_key: &str) -> Result<Option<Client>, StoreError> {
        (**self).client(client_key)
    }
}

impl<R: Registrar + ?Sized> Registrar for Arc<R> {
    fn client(&self, client_key: &str) -> Result<Option<Client>, StoreError> {
        (**self).client(client_key)
    }
}

impl<'s, R: Registrar + ?Sized + 's> Registrar for MutexGuard<'s, R> {
    fn client(&self, client_key: &str) -> Result<Option<Client>, StoreError> {
        (**self).client(client_key)
    }
}

impl<'s, R: Registrar + ?Sized + 's> Registrar for RwLockWriteGuard<'s, R> {
    fn client(&self, client_key: &str) -> Result<Option<Client>, StoreError> {
        (**self).client(client_key)
    }
}
