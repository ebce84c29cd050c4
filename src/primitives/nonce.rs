//! Replay protection through single-use nonces.
//!
//! Every accepted signed request leaves a record of its `(client, token, nonce, timestamp)`
//! tuple. A second request with an identical tuple is a replay and must be rejected, no matter
//! how valid its signature is. The check and the insert happen in one call so that stores can
//! make the pair atomic per tuple; otherwise two concurrent identical requests could both pass.
//!
//! Nonce tracking is mandatory. A store that always reports the tuple as fresh disables replay
//! protection entirely and must not be used outside of tests.
use std::collections::HashSet;
use std::sync::{MutexGuard, RwLockWriteGuard};

use super::StoreError;

/// The tuple recorded per accepted request.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct NonceRecord {
    /// The consumer key of the requesting client.
    pub client_key: String,

    /// The token the request was made with, if any. Request-token requests carry none.
    pub token: Option<String>,

    /// The client chosen unique-use marker.
    pub nonce: String,

    /// The `oauth_timestamp` of the request, seconds since the epoch.
    pub timestamp: i64,
}

/// Stores nonce tuples of accepted requests.
pub trait NonceStore {
    /// Record the tuple, unless it was already seen.
    ///
    /// Returns `true` if the tuple was fresh and is now recorded, `false` for a replay. Check
    /// and insert must be atomic per tuple.
    fn check_and_store(&mut self, record: &NonceRecord) -> Result<bool, StoreError>;
}

/// An in-memory set of seen nonce tuples.
///
/// Entries older than the timestamp window can never be accepted again anyway, so a caller may
/// periodically `retire` them to bound memory.
#[derive(Default)]
pub struct NonceLog {
    seen: HashSet<NonceRecord>,
}

impl NonceLog {
    /// Create an empty log.
    pub fn new() -> NonceLog {
        NonceLog::default()
    }

    /// Drop all entries with a timestamp before the given one.
    pub fn retire(&mut self, before: i64) {
        self.seen.retain(|record| record.timestamp >= before);
    }

    /// Number of recorded tuples.
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    /// Whether no tuple is recorded.
    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

impl NonceStore for NonceLog {
    fn check_and_store(&mut self, record: &NonceRecord) -> Result<bool, StoreError> {
        Ok(self.seen.insert(record.clone()))
    }
}

impl<'a, N: NonceStore + ?Sized> NonceStore for &'a mut N {
    fn check_and_store(&mut self, record: &NonceRecord) -> Result<bool, StoreError> {
        (**self).check_and_store(record)
    }
}

impl<N: NonceStore + ?Sized> NonceStore for Box<N> {
    fn check_and_store(&mut self, record: &NonceRecord) -> Result<bool, StoreError> {
        (**self).check_and_store(record)
    }
}

impl<'a, N: NonceStore + ?Sized> NonceStore for MutexGuard<'a, N> {
    fn check_and_store(&mut self, record: &NonceRecord) -> Result<bool, StoreError> {
        (**self).check_and_store(record)
    }
}

impl<'a, N: NonceStore + ?Sized> NonceStore for RwLockWriteGuard<'a, N> {
    fn check_and_store(&mut self, record: &NonceRecord) -> Result<bool, StoreError> {
        (**self).check_and_store(record)
    }
}
