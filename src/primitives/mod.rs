//! A collection of primitives useful for more than one protocol flow.
//!
//! A primitive is the smallest independent unit of policy used in the provider endpoints. For
//! example, an `authorizer` stores and consumes temporary credentials (request tokens).
//! Abstracting away the underlying primitives makes it possible to provide –e.g.– an independent
//! database based implementation, while the protocol flows stay untouched.
//!
//! Every lookup returns `Ok(None)` when a record does not exist; `Err(StoreError)` is reserved
//! for an unreachable backing store and is mapped to a retryable `backend_unavailable` failure
//! at the request boundary, never to a credential failure.

use std::fmt;

use chrono::DateTime;
use chrono::Utc;

pub mod authorizer;
pub mod generator;
pub mod issuer;
pub mod nonce;
pub mod realm;
pub mod registrar;

type Time = DateTime<Utc>;

/// The backing store of a primitive could not be reached.
///
/// This is deliberately distinct from a negative lookup. Flows surface it as
/// `backend_unavailable` so that callers can retry instead of treating a datastore outage as a
/// bad credential.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StoreError;

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("credential store unavailable")
    }
}

impl std::error::Error for StoreError {}

/// Commonly used primitives for frontends and backends.
pub mod prelude {
    pub use super::authorizer::{Authorizer, GrantMap, TemporaryGrant};
    pub use super::generator::{RandomGenerator, TokenGenerator};
    pub use super::issuer::{AccessToken, Issuer, TokenMap};
    pub use super::nonce::{NonceLog, NonceRecord, NonceStore};
    pub use super::realm::Realm;
    pub use super::registrar::{Client, ClientMap, Registrar};
    pub use super::StoreError;
}
