//! Reconstruction of the signature base string and verification of signatures.
//!
//! The base string commits the client to the method, the canonical uri and every transmitted
//! parameter of a request. Verification recomputes the expected signature under the declared
//! `oauth_signature_method` and compares in constant time; which secrets key the computation
//! depends on the flow (client secret alone, or joined with a token secret).
use std::borrow::Cow;
use std::str::FromStr;

use hmac::{Hmac, Mac};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use rsa::pkcs1::DecodeRsaPublicKey;
use rsa::pkcs8::DecodePublicKey;
use rsa::{Pkcs1v15Sign, RsaPublicKey};
use sha1::{Digest, Sha1};
use subtle::ConstantTimeEq;
use url::Url;

use crate::provider::error::{ErrorKind, ProviderError};

/// Everything except the unreserved characters of rfc 5849 is encoded.
const STRICT_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// The supported values of `oauth_signature_method`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SignatureMethod {
    /// Keyed hash over the base string, see rfc 5849 section 3.4.2.
    HmacSha1,

    /// PKCS#1 v1.5 signature over the SHA-1 digest of the base string.
    RsaSha1,

    /// The bare secrets, admissible only over a confirmed-secure transport.
    Plaintext,
}

impl FromStr for SignatureMethod {
    type Err = ProviderError;

    fn from_str(method: &str) -> Result<SignatureMethod, ProviderError> {
        match method {
            "HMAC-SHA1" => Ok(SignatureMethod::HmacSha1),
            "RSA-SHA1" => Ok(SignatureMethod::RsaSha1),
            "PLAINTEXT" => Ok(SignatureMethod::Plaintext),
            _ => Err(ProviderError::with(
                ErrorKind::UnsupportedSignatureMethod,
                "unsupported oauth_signature_method",
            )),
        }
    }
}

/// Percent encode a component of the base string.
pub fn encode(input: &str) -> Cow<str> {
    utf8_percent_encode(input, STRICT_ENCODE_SET).into()
}

/// The secrets keying a symmetric signature, `enc(client)&enc(token)`.
///
/// Requests without a token (temporary credential requests) use the empty token secret.
pub fn signing_key(client_secret: &str, token_secret: &str) -> String {
    format!("{}&{}", encode(client_secret), encode(token_secret))
}

/// Reconstruct the canonical signature base string of a request.
///
/// The uri is normalized to lowercase scheme and authority with default ports elided; the
/// parameters are the complete signed set, percent-encoded and sorted bytewise by key then
/// value. Fails with `invalid_request` when the uri does not parse.
pub fn base_string(
    method: &str, uri: &str, params: &[(String, String)],
) -> Result<String, ProviderError> {
    let uri: Url = uri
        .parse()
        .map_err(|_| ProviderError::with(ErrorKind::InvalidRequest, "malformed request uri"))?;

    let host = uri
        .host_str()
        .ok_or_else(|| ProviderError::with(ErrorKind::InvalidRequest, "request uri without host"))?;

    let base_uri = match uri.port() {
        Some(port) if Some(port) != default_port(uri.scheme()) => {
            format!("{}://{}:{}{}", uri.scheme(), host, port, uri.path())
        }
        _ => format!("{}://{}{}", uri.scheme(), host, uri.path()),
    };

    let mut encoded: Vec<(String, String)> = params
        .iter()
        .map(|(key, value)| (encode(key).into_owned(), encode(value).into_owned()))
        .collect();
    encoded.sort();

    let normalized = encoded
        .iter()
        .map(|(key, value)| format!("{}={}", key, value))
        .collect::<Vec<_>>()
        .join("&");

    Ok(format!(
        "{}&{}&{}",
        method.to_uppercase(),
        encode(&base_uri),
        encode(&normalized)
    ))
}

fn default_port(scheme: &str) -> Option<u16> {
    match scheme {
        "http" => Some(80),
        "https" => Some(443),
        _ => None,
    }
}

/// Compute the `HMAC-SHA1` signature of a base string, base64 encoded.
///
/// Exposed so that test clients can produce valid requests against the flows.
pub fn hmac_sha1_signature(base: &str, client_secret: &str, token_secret: &str) -> String {
    let key = signing_key(client_secret, token_secret);
    let mut mac = Hmac::<Sha1>::new_from_slice(key.as_bytes())
        .expect("Hmac accepts keys of any length");
    mac.update(base.as_bytes());
    base64::encode(mac.finalize().into_bytes())
}

/// Check a transmitted signature against the expectation for the declared method.
///
/// `rsa_public_key` is the client's registered PEM key, consulted for `RSA-SHA1` only. All
/// comparisons are constant time. The caller decides beforehand whether `PLAINTEXT` is
/// admissible for the transport in use.
pub fn verify(
    method: SignatureMethod, base: &str, signature: &str, client_secret: &str, token_secret: &str,
    rsa_public_key: Option<&str>,
) -> Result<(), ProviderError> {
    match method {
        SignatureMethod::HmacSha1 => {
            let key = signing_key(client_secret, token_secret);
            let mut mac = Hmac::<Sha1>::new_from_slice(key.as_bytes())
                .expect("Hmac accepts keys of any length");
            mac.update(base.as_bytes());
            let provided = base64::decode(signature).map_err(|_| invalid_signature())?;
            mac.verify_slice(&provided).map_err(|_| invalid_signature())
        }
        SignatureMethod::RsaSha1 => {
            let pem = rsa_public_key.ok_or_else(|| {
                ProviderError::with(ErrorKind::InvalidSignature, "client has no rsa key registered")
            })?;
            let key = RsaPublicKey::from_public_key_pem(pem)
                .or_else(|_| RsaPublicKey::from_pkcs1_pem(pem))
                .map_err(|_| {
                    ProviderError::with(ErrorKind::InvalidSignature, "registered rsa key unusable")
                })?;
            let provided = base64::decode(signature).map_err(|_| invalid_signature())?;
            let digest = Sha1::digest(base.as_bytes());
            key.verify(Pkcs1v15Sign::new::<Sha1>(), digest.as_slice(), &provided)
                .map_err(|_| invalid_signature())
        }
        SignatureMethod::Plaintext => {
            let expected = signing_key(client_secret, token_secret);
            if expected.as_bytes().ct_eq(signature.as_bytes()).into() {
                Ok(())
            } else {
                Err(invalid_signature())
            }
        }
    }
}

fn invalid_signature() -> ProviderError {
    ProviderError::with(ErrorKind::InvalidSignature, "signature verification failed")
}
