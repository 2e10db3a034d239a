//! Authentication module for the Phemex WebSocket feed.
//!
//! This module provides:
//! - Credential management with secure secret storage
//! - HMAC-SHA256 signature generation for the `user.auth` request

mod credentials;
mod signature;

pub use credentials::{Credentials, CredentialsProvider, EnvCredentials, StaticCredentials};
pub use signature::{AuthPayload, auth_expiry, sign};
