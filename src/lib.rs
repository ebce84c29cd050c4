//! oauth1-provider
//! ==============
//! An OAuth 1.0a provider library for everyone, implemented without unsafe code.
//!
//! About
//! -----
//! `oauth1-provider` aims at providing a comprehensive and extensible interface to managing
//! OAuth 1.0a tokens on a server. The provider side of the protocol is split into three
//! endpoints plus a guard for protected resources:
//!
//! * a temporary credential endpoint handing out request tokens,
//! * a consent step where the resource owner approves or denies a pending request,
//! * a token endpoint exchanging an authorized request token for an access token,
//! * and [`protect`], admitting resource requests signed with a live access token.
//!
//! The flows in [`provider`] contain the protocol logic only. They operate on a [`Request`]
//! view of incoming http requests and a set of pluggable [`primitives`] holding the state:
//! registered clients, pending grants, issued tokens and the nonces of accepted requests.
//! In-memory implementations of all primitives are provided, production deployments will
//! typically implement the traits on top of their own datastore.
//!
//! Example
//! -----
//! A provider wires its backends into per-flow endpoint traits and hands incoming requests to
//! the matching flow function:
//!
//! ```no_run
//! use oauth1_provider::primitives::prelude::*;
//! use oauth1_provider::provider::Options;
//!
//! let mut registrar = ClientMap::new();
//! registrar.register_client(Client::new(
//!     "dev",
//!     "devsecret",
//!     "https://client.example/cb".parse().unwrap(),
//!     "email address".parse().unwrap(),
//! ));
//!
//! let options = Options::new();
//! let authorizer = GrantMap::new();
//! let issuer = TokenMap::new();
//! let nonces = NonceLog::new();
//! let generator = RandomGenerator::new(16);
//! // Implement the Endpoint trait of each flow over these and dispatch requests to
//! // provider::request_token, provider::authorization, provider::access_token and
//! // provider::resource.
//! ```
//!
//! [`provider`]: provider/index.html
//! [`primitives`]: primitives/index.html
//! [`protect`]: provider/resource/fn.protect.html
//! [`Request`]: provider/params/trait.Request.html
#![warn(missing_docs)]

pub mod primitives;
pub mod provider;
