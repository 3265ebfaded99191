//! # HTTP Request Handlers
//!
//! ## Submodules
//! - `health`: Health check endpoint (for monitoring)
//! - `second_factor`: Challenge issuance and the three verification endpoints
//!
//! ## Handler Pattern
//! Handlers are async functions that:
//! 1. Extract data from request (JSON body, session, shared state)
//! 2. Call a verifier from `AppState`
//! 3. Return a response (JSON, status code)
//!
//! A rejected factor is an `AppError::Verification`, answered with
//! `{ "error": ..., "field": ... }` so a form can attach the message.

pub mod health;
pub mod second_factor;
