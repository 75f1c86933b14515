//! Session management
//!
//! Uses HMAC-signed tokens carried as a bearer token or cookie.
//! No server-side session storage needed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::data::UserIdentity;

/// Verified identity claims
///
/// Issued by the identity provider. The claim fields are copied into the
/// users table whenever the token is presented.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// Stable user id from the identity provider
    pub user_id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub profile_image_url: Option<String>,
    /// When session was created
    pub created_at: DateTime<Utc>,
    /// When session expires
    pub expires_at: DateTime<Utc>,
}

impl Session {
    /// Check if session is expired
    pub fn is_expired(&self) -> bool {
        self.expires_at < Utc::now()
    }

    /// Claims to sync into the users table
    pub fn identity(&self, is_admin: bool) -> UserIdentity {
        UserIdentity {
            id: self.user_id.clone(),
            email: self.email.clone(),
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            profile_image_url: self.profile_image_url.clone(),
            is_admin,
        }
    }
}

/// Create a signed session token
///
/// Token format: base64(payload).base64(hmac_sha256(payload))
///
/// # Arguments
/// * `session` - Session data to encode
/// * `secret` - HMAC secret key
///
/// # Returns
/// Signed token string
pub fn create_session_token(
    session: &Session,
    secret: &str,
) -> Result<String, crate::error::AppError> {
    use base64::{Engine as _, engine::general_purpose};
    use hmac::{Hmac, Mac};
    use sha2::Sha256;

    // 1. Serialize session to JSON
    let payload =
        serde_json::to_string(session).map_err(|e| crate::error::AppError::Internal(e.into()))?;

    // 2. Base64 encode the payload
    let payload_b64 = general_purpose::URL_SAFE_NO_PAD.encode(payload.as_bytes());

    // 3. Create HMAC-SHA256 signature
    type HmacSha256 = Hmac<Sha256>;
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| crate::error::AppError::Encryption(e.to_string()))?;
    mac.update(payload_b64.as_bytes());
    let signature = mac.finalize().into_bytes();
    let signature_b64 = general_purpose::URL_SAFE_NO_PAD.encode(signature);

    // 4. Return "{payload}.{signature}"
    Ok(format!("{}.{}", payload_b64, signature_b64))
}

/// Verify and decode a session token
///
/// # Arguments
/// * `token` - Token string to verify
/// * `secret` - HMAC secret key
///
/// # Returns
/// Decoded session if valid
///
/// # Errors
/// Returns error if signature is invalid, token is malformed or expired
pub fn verify_session_token(token: &str, secret: &str) -> Result<Session, crate::error::AppError> {
    use base64::{Engine as _, engine::general_purpose};
    use hmac::{Hmac, Mac};
    use sha2::Sha256;

    // 1. Split token into payload and signature
    let Some((payload_b64, signature_b64)) = token.split_once('.') else {
        return Err(crate::error::AppError::Unauthorized);
    };
    if signature_b64.contains('.') {
        return Err(crate::error::AppError::Unauthorized);
    }

    // 2. Verify HMAC signature
    type HmacSha256 = Hmac<Sha256>;
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| crate::error::AppError::Encryption(e.to_string()))?;
    mac.update(payload_b64.as_bytes());

    let expected_signature = general_purpose::URL_SAFE_NO_PAD
        .decode(signature_b64)
        .map_err(|_| crate::error::AppError::Unauthorized)?;

    mac.verify_slice(&expected_signature)
        .map_err(|_| crate::error::AppError::InvalidSignature)?;

    // 3. Decode and deserialize payload
    let payload_bytes = general_purpose::URL_SAFE_NO_PAD
        .decode(payload_b64)
        .map_err(|_| crate::error::AppError::Unauthorized)?;

    let session: Session =
        serde_json::from_slice(&payload_bytes).map_err(|_| crate::error::AppError::Unauthorized)?;

    if session.user_id.trim().is_empty() {
        return Err(crate::error::AppError::Unauthorized);
    }

    // 4. Check if session is expired
    if session.is_expired() {
        return Err(crate::error::AppError::Unauthorized);
    }

    Ok(session)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use chrono::Duration;

    const SECRET: &str = "0123456789abcdef0123456789abcdef";

    fn session(expires_in: Duration) -> Session {
        let now = Utc::now();
        Session {
            user_id: "user-1".to_string(),
            email: Some("user@example.com".to_string()),
            first_name: Some("Ada".to_string()),
            last_name: None,
            profile_image_url: None,
            created_at: now,
            expires_at: now + expires_in,
        }
    }

    #[test]
    fn token_verifies_with_same_secret() {
        let original = session(Duration::hours(1));
        let token = create_session_token(&original, SECRET).unwrap();
        let decoded = verify_session_token(&token, SECRET).unwrap();
        assert_eq!(decoded.user_id, "user-1");
        assert_eq!(decoded.first_name.as_deref(), Some("Ada"));
    }

    #[test]
    fn wrong_secret_is_invalid_signature() {
        let token = create_session_token(&session(Duration::hours(1)), SECRET).unwrap();
        let error = verify_session_token(&token, "another-secret-another-secret-xx").unwrap_err();
        assert!(matches!(error, AppError::InvalidSignature));
    }

    #[test]
    fn expired_token_is_unauthorized() {
        let token = create_session_token(&session(Duration::hours(-1)), SECRET).unwrap();
        let error = verify_session_token(&token, SECRET).unwrap_err();
        assert!(matches!(error, AppError::Unauthorized));
    }

    #[test]
    fn malformed_tokens_are_unauthorized() {
        for token in ["", "no-dot", "a.b.c", "!!!.###"] {
            assert!(verify_session_token(token, SECRET).is_err(), "{token}");
        }
    }

    #[test]
    fn identity_copies_claims() {
        let identity = session(Duration::hours(1)).identity(true);
        assert_eq!(identity.id, "user-1");
        assert_eq!(identity.email.as_deref(), Some("user@example.com"));
        assert!(identity.is_admin);
    }
}
