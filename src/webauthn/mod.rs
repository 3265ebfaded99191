//! # WebAuthn Module
//!
//! Security-key step of the login, for WebAuthn credentials and keys
//! registered through the legacy U2F API.
//!
//! ## Submodules
//! - `types`: JSON exchanged with the browser
//! - `challenge`: issuing challenges and keeping them in the session
//! - `authentication`: verifying the signed assertion
//! - `authenticator_data`, `cose`, `encoding`: binary formats
//!
//! ## Flow
//! 1. The user passes password login; the server calls
//!    `ChallengeGenerator::generate()` and stores the challenge in the session
//! 2. The browser passes `publicKey` to `navigator.credentials.get()`
//! 3. The authenticator signs `authenticatorData || SHA-256(clientDataJSON)`
//! 4. The browser posts the assertion; `AssertionVerifier` checks it against
//!    the stored challenge and deletes the challenge on success
//!
//! ## Legacy U2F keys
//! A U2F key signs over the hash of its *app id* (`https://localhost:8000`)
//! instead of the rp id (`localhost`). The challenge carries the app id in
//! the `appid` extension; when the browser reports the extension was used the
//! verifier checks the rp id hash against the key's stored app id.

pub mod authentication;
pub mod authenticator_data;
pub mod challenge;
pub mod cose;
pub mod encoding;
pub mod types;

pub use authentication::{AssertionVerifier, SignCountPolicy};
pub use challenge::{Challenge, ChallengeGenerator, RelyingParty};
