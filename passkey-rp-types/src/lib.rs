//! # Passkey RP Types
//!
//! Rust type definitions for the data a [WebAuthn] Relying Party exchanges with browsers.
//!
//! The [`webauthn`] module holds the JSON shapes: the options a Relying Party hands to
//! `navigator.credentials.create()` / `navigator.credentials.get()` and the credentials the browser
//! sends back. The [`authenticator`] module decodes the binary structures nested inside those
//! responses: authenticator data, attested credential data and attestation objects.
//!
//! [WebAuthn]: https://w3c.github.io/webauthn/

mod utils;

pub mod authenticator;
pub mod webauthn;

// Re-exports
pub use utils::{
    bytes::{Bytes, NotBase64Encoded},
    crypto, encoding, rand,
};
