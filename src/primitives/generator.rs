//! Generators produce the token, secret and verifier strings handed out by the flows.
//!
//! The provided implementation draws random bytes, depending on the entropy of the generated
//! string to make guessing infeasible. Deterministic implementations are possible and useful in
//! tests, but must never be used against real traffic.
use std::rc::Rc;
use std::sync::{Arc, MutexGuard, RwLockWriteGuard};

use base64::encode_config;
use rand::{thread_rng, RngCore};

/// Produces fresh credential strings.
///
/// ## Requirements on implementations
///
/// Outputs must be unpredictable and collision free for the overlapping lifetime of two
/// credentials. Tokens, secrets and verifiers travel inside urls and form-encoded bodies, so
/// the output should stick to url-safe characters.
pub trait TokenGenerator {
    /// Generate one fresh credential string.
    fn generate(&mut self) -> String;
}

/// Generates strings from random bytes.
///
/// Each byte is drawn from the thread local generator, the result is encoded url-safe without
/// padding. This generator will always succeed.
pub struct RandomGenerator {
    len: usize,
}

impl RandomGenerator {
    /// Generates strings with a specific amount of random bytes.
    pub fn new(length: usize) -> RandomGenerator {
        RandomGenerator { len: length }
    }

    fn random(&self) -> String {
        let mut result = vec![0; self.len];
        thread_rng().fill_bytes(result.as_mut_slice());
        encode_config(&result, base64::URL_SAFE_NO_PAD)
    }
}

impl TokenGenerator for RandomGenerator {
    fn generate(&mut self) -> String {
        self.random()
    }
}

impl<'a> TokenGenerator for &'a RandomGenerator {
    fn generate(&mut self) -> String {
        self.random()
    }
}

impl TokenGenerator for Rc<RandomGenerator> {
    fn generate(&mut self) -> String {
        self.random()
    }
}

impl TokenGenerator for Arc<RandomGenerator> {
    fn generate(&mut self) -> String {
        self.random()
    }
}

impl<'a, G: TokenGenerator + ?Sized + 'a> TokenGenerator for Box<G> {
    fn generate(&mut self) -> String {
        (&mut **self).generate()
    }
}

impl<'a, G: TokenGenerator + ?Sized + 'a> TokenGenerator for &'a mut G {
    fn generate(&mut self) -> String {
        (&mut **self).generate()
    }
}

impl<'a, G: TokenGenerator + ?Sized + 'a> TokenGenerator for MutexGuard<'a, G> {
    fn generate(&mut self) -> String {
        (&mut **self).generate()
    }
}

impl<'a, G: TokenGenerator + ?Sized + 'a> TokenGenerator for RwLockWriteGuard<'a, G> {
    fn generate(&mut self) -> String {
        (&mut **self).generate()
    }
}
