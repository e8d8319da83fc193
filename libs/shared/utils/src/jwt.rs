use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{TimeZone, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;
use tracing::debug;

use shared_models::auth::{JwtClaims, User};

type HmacSha256 = Hmac<Sha256>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("JWT secret is not set")]
    MissingSecret,

    #[error("Invalid token format")]
    Malformed,

    #[error("Invalid signature encoding")]
    SignatureEncoding,

    #[error("Invalid token signature")]
    BadSignature,

    #[error("Invalid claims: {0}")]
    Claims(String),

    #[error("Token expired")]
    Expired,
}

/// Validates an HS256 token issued by the identity provider and maps its claims
/// onto a [`User`]. Clinic staff carry their clinic id in `app_metadata`, which
/// takes precedence over `user_metadata` since users cannot edit it.
pub fn validate_token(token: &str, jwt_secret: &str) -> Result<User, TokenError> {
    if jwt_secret.is_empty() {
        return Err(TokenError::MissingSecret);
    }

    let mut parts = token.split('.');
    let (header_b64, claims_b64, signature_b64) =
        match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some(h), Some(c), Some(s), None) => (h, c, s),
            _ => return Err(TokenError::Malformed),
        };

    let signature = URL_SAFE_NO_PAD.decode(signature_b64).map_err(|e| {
        debug!("Failed to decode signature: {}", e);
        TokenError::SignatureEncoding
    })?;

    let mut mac = HmacSha256::new_from_slice(jwt_secret.as_bytes())
        .map_err(|_| TokenError::MissingSecret)?;
    mac.update(format!("{}.{}", header_b64, claims_b64).as_bytes());

    if mac.verify_slice(&signature).is_err() {
        debug!("Token signature verification failed");
        return Err(TokenError::BadSignature);
    }

    let claims_json = URL_SAFE_NO_PAD
        .decode(claims_b64)
        .map_err(|_| TokenError::Claims("invalid encoding".to_string()))?;

    let claims: JwtClaims = serde_json::from_slice(&claims_json).map_err(|e| {
        debug!("Failed to parse claims: {}", e);
        TokenError::Claims(e.to_string())
    })?;

    if let Some(exp) = claims.exp {
        let now = Utc::now().timestamp() as u64;
        if exp < now {
            debug!("Token expired at {} (now: {})", exp, now);
            return Err(TokenError::Expired);
        }
    }

    let created_at = claims.iat
        .and_then(|timestamp| Utc.timestamp_opt(timestamp as i64, 0).single());

    let metadata = match (claims.app_metadata, claims.user_metadata) {
        (Some(app), _) if app.get("clinic_id").is_some() => Some(app),
        (_, user_metadata) => user_metadata,
    };

    let user = User {
        id: claims.sub,
        email: claims.email,
        role: claims.role,
        metadata,
        created_at,
    };

    debug!("Token validated successfully for user: {}", user.id);
    Ok(user)
}
