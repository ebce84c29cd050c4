//! Defines the Realm type, the scope mechanism of OAuth 1.0a providers.
use std::{cmp, fmt, str};

use std::collections::HashSet;
use serde::{Deserialize, Serialize};

/// Realms of a grant or resource, a set of realm-tokens separated by spaces.
///
/// Realms are interpreted as a conjunction of named permissions. A request is admitted to a
/// protected resource only if the realms granted to its token are a superset of the realms the
/// resource requires. This induces a partial ordering on realm sets where `A` is less or equal
/// than `B` if all realm-tokens of `A` are also found in `B`:
/// > A token granted `B` may access a resource requiring `A` iff `A <= B`
///
/// Example
/// ------
///
/// ```
/// # use oauth1_provider::primitives::realm::Realm;
/// let granted  = "email address".parse::<Realm>().unwrap();
/// let required = "email".parse::<Realm>().unwrap();
/// let foreign  = "email photos".parse::<Realm>().unwrap();
///
/// // Holding a token granted `granted` covers the resource since:
/// assert!(required <= granted);
/// assert!(required.allow_access(&granted));
///
/// // But it would not be admitted to a resource requiring `foreign`:
/// assert!(!(foreign <= granted));
/// assert!(!foreign.allow_access(&granted));
/// ```
///
/// Realm-tokens are opaque but restricted to printable ascii without space, `"` and `\`, so
/// that they can be transported verbatim in urls and header parameters. Individual realm-tokens
/// are separated by spaces.
#[derive(Clone, PartialEq, Eq)]
pub struct Realm {
    tokens: HashSet<String>,
}

impl Serialize for Realm {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Realm {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let string: &str = Deserialize::deserialize(deserializer)?;
        str::FromStr::from_str(string).map_err(serde::de::Error::custom)
    }
}

impl Realm {
    fn invalid_realm_char(ch: char) -> bool {
        match ch {
            '\x21' => false,
            ch if ('\x23'..='\x5b').contains(&ch) => false,
            ch if ('\x5d'..='\x7e').contains(&ch) => false,
            ' ' => false, // Space separator is a valid char
            _ => true,
        }
    }

    /// An empty realm set, the bottom element of the ordering.
    pub fn empty() -> Realm {
        Realm {
            tokens: HashSet::new(),
        }
    }

    /// Determines if this realm set grants enough privileges for a resource requiring the realm
    /// set on the right side. This operation is equivalent to comparison via `>=`.
    pub fn privileged_to(&self, rhs: &Realm) -> bool {
        rhs <= self
    }

    /// Determines if a resource protected by this realm set should allow access to a token with
    /// the grant on the right side. This operation is equivalent to comparison via `<=`.
    pub fn allow_access(&self, rhs: &Realm) -> bool {
        self <= rhs
    }

    /// Whether no realm-token is contained.
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Create an iterator over the individual realm-tokens.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.tokens.iter().map(AsRef::as_ref)
    }
}

/// Error returned from parsing a realm set as encoded in a request.
#[derive(Debug)]
pub enum ParseRealmErr {
    /// A character was encountered which is not allowed to appear in realm strings.
    ///
    /// Realm-tokens are restricted to printable ascii without space, `"` and `\`. Individual
    /// realm-tokens are separated by spaces.
    InvalidCharacter(char),
}

impl str::FromStr for Realm {
    type Err = ParseRealmErr;

    fn from_str(string: &str) -> Result<Realm, ParseRealmErr> {
        if let Some(ch) = string.chars().find(|&ch| Realm::invalid_realm_char(ch)) {
            return Err(ParseRealmErr::InvalidCharacter(ch));
        }
        let tokens = string.split(' ').filter(|s| !s.is_empty());
        Ok(Realm {
            tokens: tokens.map(str::to_string).collect(),
        })
    }
}

impl fmt::Display for ParseRealmErr {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        match self {
            ParseRealmErr::InvalidCharacter(chr) => {
                write!(fmt, "Encountered invalid character in realm: {}", chr)
            }
        }
    }
}

impl fmt::Debug for Realm {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        fmt.debug_tuple("Realm").field(&self.tokens).finish()
    }
}

impl fmt::Display for Realm {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        let output = self
            .tokens
            .iter()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(" ");
        fmt.write_str(&output)
    }
}

impl cmp::PartialOrd for Realm {
    fn partial_cmp(&self, rhs: &Self) -> Option<cmp::Ordering> {
        let intersect_count = self.tokens.intersection(&rhs.tokens).count();
        if intersect_count == self.tokens.len() && intersect_count == rhs.tokens.len() {
            Some(cmp::Ordering::Equal)
        } else if intersect_count == self.tokens.len() {
            Some(cmp::Ordering::Less)
        } else if intersect_count == rhs.tokens.len() {
            Some(cmp::Ordering::Greater)
        } else {
            None
        }
    }
}
