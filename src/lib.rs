//! # Second Factor Server
//!
//! Second step of a two-step login. After the password step has put a
//! pending user id in the session, the user proves possession of one of:
//! - a WebAuthn / legacy U2F security key
//! - a single-use backup code
//! - a TOTP authenticator app
//!
//! The verifiers live in the library so they can be driven without HTTP;
//! `main.rs` wires them into an axum server.

pub mod config;
pub mod db;
pub mod error;
pub mod factors;
pub mod handlers;
pub mod middleware;
pub mod session;
pub mod state;
pub mod webauthn;
