//! # Middleware Module
//!
//! ## Our Middleware
//! - `auth`: Rejects second-factor requests from sessions with no pending login

pub mod auth;
