//! crates/auth-adapters/src/lib.rs
//!
//! Identity adapters: bearer-token verification behind `auth-jwt`.

#[cfg(feature = "auth-jwt")]
pub mod jwt;

#[cfg(feature = "auth-jwt")]
pub use jwt::{Claims, JwtIdentityProvider};
