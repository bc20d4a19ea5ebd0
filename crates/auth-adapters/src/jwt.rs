//! HS256 bearer tokens.

use chrono::{Duration, Utc};
use domains::{AppError, Identity, IdentityProvider, Result, Role, UserId};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

/// JWT claims carried by every bearer token.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Claims {
    pub sub: Uuid,
    pub email: String,
    pub role: Role,
    pub exp: i64,
    pub iat: i64,
    pub iss: String,
}

#[derive(Clone)]
pub struct JwtIdentityProvider {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    issuer: String,
    ttl: Duration,
}

impl JwtIdentityProvider {
    pub fn new(secret: &str, issuer: impl Into<String>, ttl_secs: i64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            issuer: issuer.into(),
            ttl: Duration::seconds(ttl_secs),
        }
    }

    /// Signs a token for `identity` that expires after the configured TTL.
    pub fn issue(&self, identity: &Identity) -> anyhow::Result<String> {
        let now = Utc::now();
        let claims = Claims {
            sub: identity.subject.0,
            email: identity.email.clone(),
            role: identity.role,
            exp: (now + self.ttl).timestamp(),
            iat: now.timestamp(),
            iss: self.issuer.clone(),
        };

        encode(&Header::default(), &claims, &self.encoding_key).map_err(Into::into)
    }

    pub fn decode_claims(&self, token: &str) -> Result<Claims> {
        let mut validation = Validation::default();
        validation.set_issuer(&[&self.issuer]);

        decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| {
                debug!(error = %e, "bearer token rejected");
                AppError::Unauthenticated
            })
    }
}

impl IdentityProvider for JwtIdentityProvider {
    fn verify(&self, credential: &str) -> Result<Identity> {
        let token = credential.strip_prefix("Bearer ").unwrap_or(credential).trim();
        if token.is_empty() {
            return Err(AppError::Unauthenticated);
        }
        let claims = self.decode_claims(token)?;
        Ok(Identity {
            subject: UserId(claims.sub),
            email: claims.email,
            role: claims.role,
        })
    }
}
