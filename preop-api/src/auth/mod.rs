//! Session layer: PIN credentials and opaque bearer tokens.
//!
//! Tokens are capability-bearing strings with no embedded claims; every
//! request costs one lookup, and revocation is a single-row update. A
//! user holds at most one active token — login overwrites, logout clears.

mod extract;
mod pin;
mod session;

pub use extract::CurrentUser;
pub use pin::{generate_salt, hash_pin, verify_pin};
pub use session::{authenticate, invalidate, issue_token, AuthFailure};

use thiserror::Error;

/// Session-layer failure taxonomy. Everything here maps to HTTP 401.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum AuthError {
    /// No Authorization header was presented
    #[error("Credencial requerida")]
    MissingCredential,

    /// Header present but not in `Bearer <token>` shape
    #[error("Token inválido")]
    MalformedCredential,

    /// No user currently holds this token
    #[error("Sesión no válida")]
    InvalidSession,

    /// Token exists but its expiry is at or before now
    #[error("Sesión expirada")]
    ExpiredSession,

    /// Login failed. Deliberately does not say whether the name or the
    /// PIN was wrong.
    #[error("Credenciales incorrectas")]
    BadLogin,
}
