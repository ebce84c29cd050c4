//! Extraction and validation of the standard OAuth 1.0a wire parameters.
//!
//! Parameters may arrive in the `Authorization` header, the query string or a form-encoded
//! body, per the transport rules of the protocol. This module folds all three locations into
//! one validated view and keeps the complete signed parameter set around for the signature
//! base string.
use std::borrow::Cow;

use percent_encoding::percent_decode_str;

use crate::provider::error::{ErrorKind, ProviderError};

/// Abstraction of requests as seen by the protocol flows.
///
/// Frontends for specific server libraries implement this once; the flows never touch the
/// underlying request type. _WARNING_: implementations MUST report the effective scheme in
/// `uri` truthfully, the transport security checks depend on it.
pub trait Request {
    /// Received request might not be encoded correctly. This method gives implementors the
    /// chance to signal that a request was received but its encoding was generally malformed.
    /// If this is the case, then no other attribute will be queried.
    fn valid(&self) -> bool;

    /// The HTTP method of the request.
    fn method(&self) -> Cow<str>;

    /// The request uri without the query part, `scheme://authority/path`.
    fn uri(&self) -> Cow<str>;

    /// Contents of the authorization header or none if none exists.
    fn authorization_header(&self) -> Option<Cow<str>>;

    /// The decoded pairs of the url query.
    fn query_pairs(&self) -> Vec<(String, String)>;

    /// The decoded pairs of an `application/x-www-form-urlencoded` body.
    fn body_pairs(&self) -> Vec<(String, String)>;
}

/// The validated oauth parameters of a signed request.
///
/// `signed` retains every transmitted parameter except `oauth_signature` and the header `realm`,
/// exactly the set that the signature base string is built over.
#[derive(Clone, Debug)]
pub struct OauthParams {
    /// The consumer key identifying the client.
    pub consumer_key: String,

    /// The request or access token, absent on temporary credential requests.
    pub token: Option<String>,

    /// The transmitted signature.
    pub signature: String,

    /// The declared signature method, uninterpreted.
    pub signature_method: String,

    /// Seconds since the epoch as declared by the client.
    pub timestamp: i64,

    /// The client chosen unique-use marker.
    pub nonce: String,

    /// The callback requested for the consent redirect.
    pub callback: Option<String>,

    /// The verifier code presented at the exchange.
    pub verifier: Option<String>,

    /// The realms asked for, from the `realm` parameter.
    pub realm: Option<String>,

    signed: Vec<(String, String)>,
}

impl OauthParams {
    /// Gather and validate the oauth parameters of a request.
    ///
    /// Fails with `invalid_request` for a generally malformed request, a missing required
    /// parameter, a repeated oauth parameter, or an unsupported `oauth_version`.
    pub fn from_request(request: &dyn Request) -> Result<OauthParams, ProviderError> {
        if !request.valid() {
            return Err(ProviderError::with(ErrorKind::InvalidRequest, "malformed request"));
        }

        let mut signed = Vec::new();
        let mut realm = None;

        // A header of a foreign scheme is none of our business, parameters may still arrive in
        // the query or body.
        let oauth_header = request
            .authorization_header()
            .filter(|header| matches!(header.get(..5), Some(scheme) if scheme.eq_ignore_ascii_case("oauth")));

        if let Some(header) = oauth_header {
            let pairs = parse_authorization(&header).ok_or_else(|| {
                ProviderError::with(ErrorKind::InvalidRequest, "malformed authorization header")
            })?;
            for (key, value) in pairs {
                // The realm of the authorization header names the protection space, it is not
                // part of the signed parameter set.
                if key == "realm" {
                    realm = Some(value);
                } else {
                    signed.push((key, value));
                }
            }
        }

        for (key, value) in request
            .query_pairs()
            .into_iter()
            .chain(request.body_pairs())
        {
            if key == "realm" && realm.is_none() {
                realm = Some(value.clone());
            }
            signed.push((key, value));
        }

        let consumer_key = require(&signed, "oauth_consumer_key")?;
        let signature_method = require(&signed, "oauth_signature_method")?;
        let signature = require(&signed, "oauth_signature")?;
        let timestamp = require(&signed, "oauth_timestamp")?;
        let nonce = require(&signed, "oauth_nonce")?;

        let token = optional(&signed, "oauth_token")?;
        let callback = optional(&signed, "oauth_callback")?;
        let verifier = optional(&signed, "oauth_verifier")?;

        match optional(&signed, "oauth_version")?.as_deref() {
            None | Some("1.0") => (),
            Some(_) => {
                return Err(ProviderError::with(
                    ErrorKind::InvalidRequest,
                    "unsupported oauth_version",
                ))
            }
        }

        let timestamp = timestamp.parse::<i64>().ok().filter(|&ts| ts > 0).ok_or_else(|| {
            ProviderError::with(ErrorKind::InvalidRequest, "malformed oauth_timestamp")
        })?;

        // The transmitted signature never signs itself.
        signed.retain(|(key, _)| key != "oauth_signature");

        Ok(OauthParams {
            consumer_key,
            token,
            signature,
            signature_method,
            timestamp,
            nonce,
            callback,
            verifier,
            realm,
            signed,
        })
    }

    /// Every parameter covered by the signature.
    pub fn signed_pairs(&self) -> &[(String, String)] {
        &self.signed
    }
}

/// Split an `Authorization: OAuth …` header into decoded pairs.
///
/// Returns `None` for a header of a different scheme or one that does not parse.
fn parse_authorization(header: &str) -> Option<Vec<(String, String)>> {
    let scheme = header.get(..5)?;
    if !scheme.eq_ignore_ascii_case("oauth") {
        return None;
    }

    let rest = header[5..].trim_start();
    let mut pairs = Vec::new();
    for part in rest.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        let eq = part.find('=')?;
        let key = decode(part[..eq].trim_end())?;
        let value = part[eq + 1..].trim_start();
        let value = value.strip_prefix('"').and_then(|v| v.strip_suffix('"'))?;
        pairs.push((key, decode(value)?));
    }
    Some(pairs)
}

fn decode(encoded: &str) -> Option<String> {
    percent_decode_str(encoded)
        .decode_utf8()
        .ok()
        .map(Cow::into_owned)
}

fn lookup(pairs: &[(String, String)], name: &str) -> Result<Option<String>, ProviderError> {
    let mut found = pairs.iter().filter(|(key, _)| key == name);
    let first = found.next();
    if found.next().is_some() {
        return Err(ProviderError::with(
            ErrorKind::InvalidRequest,
            "oauth protocol parameter transmitted more than once",
        ));
    }
    Ok(first.map(|(_, value)| value.clone()))
}

fn require(pairs: &[(String, String)], name: &'static str) -> Result<String, ProviderError> {
    lookup(pairs, name)?.ok_or_else(|| {
        let mut error = ProviderError::new(ErrorKind::InvalidRequest);
        error.explain(format!("missing required parameter {}", name));
        error
    })
}

fn optional(pairs: &[(String, String)], name: &str) -> Result<Option<String>, ProviderError> {
    lookup(pairs, name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Crafted {
        header: Option<String>,
        query: Vec<(String, String)>,
        body: Vec<(String, String)>,
    }

    impl Request for Crafted {
        fn valid(&self) -> bool {
            true
        }

        fn method(&self) -> Cow<str> {
            "POST".into()
        }

        fn uri(&self) -> Cow<str> {
            "https://provider.example/oauth/request_token".into()
        }

        fn authorization_header(&self) -> Option<Cow<str>> {
            self.header.as_deref().map(Cow::Borrowed)
        }

        fn query_pairs(&self) -> Vec<(String, String)> {
            self.query.clone()
        }

        fn body_pairs(&self) -> Vec<(String, String)> {
            self.body.clone()
        }
    }

    fn base_header() -> String {
        concat!(
            "OAuth realm=\"email\", oauth_consumer_key=\"dev\", ",
            "oauth_signature_method=\"HMAC-SHA1\", oauth_timestamp=\"1000\", ",
            "oauth_nonce=\"abc\", oauth_signature=\"c2ln\", oauth_version=\"1.0\"",
        )
        .to_string()
    }

    #[test]
    fn header_extraction() {
        let request = Crafted {
            header: Some(base_header()),
            ..Crafted::default()
        };

        let params = OauthParams::from_request(&request).unwrap();
        assert_eq!(params.consumer_key, "dev");
        assert_eq!(params.signature_method, "HMAC-SHA1");
        assert_eq!(params.timestamp, 1000);
        assert_eq!(params.nonce, "abc");
        assert_eq!(params.signature, "c2ln");
        assert_eq!(params.realm.as_deref(), Some("email"));
        assert!(params.token.is_none());

        // Neither realm nor the signature are part of the signed set.
        assert!(params
            .signed_pairs()
            .iter()
            .all(|(key, _)| key != "realm" && key != "oauth_signature"));
    }

    #[test]
    fn body_parameters_are_signed(){
        let request = Crafted {
            header: Some(base_header()),
            body: vec![("extra".to_string(), "value".to_string())],
            ..Crafted::default()
        };

        let params = OauthParams::from_request(&request).unwrap();
        assert!(params
            .signed_pairs()
            .iter()
            .any(|(key, value)| key == "extra" && value == "value"));
    }

    #[test]
    fn missing_parameter() {
        let header = base_header().replace("oauth_nonce=\"abc\", ", "");
        let request = Crafted {
            header: Some(header),
            ..Crafted::default()
        };

        let err = OauthParams::from_request(&request).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidRequest);
    }

    #[test]
    fn duplicated_parameter() {
        let request = Crafted {
            header: Some(base_header()),
            query: vec![("oauth_nonce".to_string(), "other".to_string())],
            ..Crafted::default()
        };

        let err = OauthParams::from_request(&request).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidRequest);
    }

    #[test]
    fn bad_version() {
        let header = base_header().replace("oauth_version=\"1.0\"", "oauth_version=\"2.0\"");
        let request = Crafted {
            header: Some(header),
            ..Crafted::default()
        };

        let err = OauthParams::from_request(&request).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidRequest);
    }

    #[test]
    fn percent_decoded_header_values() {
        let header = base_header()
            .replace("oauth_nonce=\"abc\"", "oauth_nonce=\"a%20b\"");
        let request = Crafted {
            header: Some(header),
            ..Crafted::default()
        };

        let params = OauthParams::from_request(&request).unwrap();
        assert_eq!(params.nonce, "a b");
    }

    #[test]
    fn foreign_auth_scheme_is_ignored() {
        let request = Crafted {
            header: Some("Bearer abcdef".to_string()),
            ..Crafted::default()
        };

        // No oauth parameters at all, the first required one is reported missing.
        let err = OauthParams::from_request(&request).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidRequest);
    }
}
