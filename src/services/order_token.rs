//! Signed customer status tokens.
//!
//! An order's token lets the customer poll payment status without any other
//! credential. Claims are the order number, the contact email and the issue
//! time; the signature is HMAC-SHA256 over the claims JSON and the validity
//! window is enforced at verification time.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::time::Duration;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("token is malformed")]
    Malformed,

    #[error("token signature mismatch")]
    BadSignature,

    #[error("token expired for order {order_number}")]
    Expired { order_number: String },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenClaims {
    pub order_number: String,
    pub email: String,
    pub issued_at: i64,
}

/// Issues and verifies status tokens with a shared secret.
#[derive(Clone)]
pub struct OrderTokenSigner {
    secret: Vec<u8>,
    ttl: Duration,
}

impl OrderTokenSigner {
    pub fn new(secret: impl Into<Vec<u8>>, ttl: Duration) -> Self {
        Self {
            secret: secret.into(),
            ttl,
        }
    }

    pub fn issue(&self, order_number: &str, email: &str, issued_at: DateTime<Utc>) -> String {
        let claims = TokenClaims {
            order_number: order_number.to_string(),
            email: email.to_string(),
            issued_at: issued_at.timestamp(),
        };
        let payload = serde_json::to_vec(&claims).expect("claims serialize");
        let signature = self.sign(&payload);
        format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(&payload),
            URL_SAFE_NO_PAD.encode(signature)
        )
    }

    /// Verify signature and validity window, returning the claims.
    pub fn verify(&self, token: &str, now: DateTime<Utc>) -> Result<TokenClaims, TokenError> {
        let (payload_b64, signature_b64) = token.split_once('.').ok_or(TokenError::Malformed)?;
        let payload = URL_SAFE_NO_PAD
            .decode(payload_b64)
            .map_err(|_| TokenError::Malformed)?;
        let signature = URL_SAFE_NO_PAD
            .decode(signature_b64)
            .map_err(|_| TokenError::Malformed)?;

        let expected = self.sign(&payload);
        if !secure_eq(&expected, &signature) {
            return Err(TokenError::BadSignature);
        }

        let claims: TokenClaims =
            serde_json::from_slice(&payload).map_err(|_| TokenError::Malformed)?;

        let age = now.timestamp() - claims.issued_at;
        if age < 0 || age as u64 > self.ttl.as_secs() {
            return Err(TokenError::Expired {
                order_number: claims.order_number,
            });
        }

        Ok(claims)
    }

    fn sign(&self, payload: &[u8]) -> Vec<u8> {
        let mut mac = HmacSha256::new_from_slice(&self.secret).expect("hmac accepts any key size");
        mac.update(payload);
        mac.finalize().into_bytes().to_vec()
    }
}

/// Constant-time byte comparison.
pub fn secure_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter()
        .zip(b.iter())
        .fold(0_u8, |acc, (x, y)| acc | (x ^ y))
        == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;

    fn signer() -> OrderTokenSigner {
        OrderTokenSigner::new(b"0123456789abcdef0123456789abcdef".to_vec(), Duration::from_secs(3600))
    }

    #[test]
    fn issued_token_verifies() {
        let signer = signer();
        let now = Utc::now();
        let token = signer.issue("TO-2318", "customer@example.com", now);
        let claims = signer.verify(&token, now).expect("token should verify");
        assert_eq!(claims.order_number, "TO-2318");
        assert_eq!(claims.email, "customer@example.com");
    }

    #[test]
    fn tampered_token_is_rejected() {
        let signer = signer();
        let now = Utc::now();
        let token = signer.issue("TO-2318", "customer@example.com", now);

        let mut forged = token.clone();
        // Flip a character in the payload half.
        let flip = if forged.starts_with('A') { "B" } else { "A" };
        forged.replace_range(0..1, flip);
        assert!(matches!(
            signer.verify(&forged, now),
            Err(TokenError::BadSignature) | Err(TokenError::Malformed)
        ));
    }

    #[test]
    fn expired_token_is_rejected() {
        let signer = signer();
        let issued = Utc::now();
        let token = signer.issue("TO-2318", "customer@example.com", issued);
        let later = issued + ChronoDuration::hours(2);
        assert!(matches!(
            signer.verify(&token, later),
            Err(TokenError::Expired { .. })
        ));
    }

    #[test]
    fn wrong_secret_fails_verification() {
        let signer = signer();
        let other = OrderTokenSigner::new(b"another-secret-another-secret!!".to_vec(), Duration::from_secs(3600));
        let now = Utc::now();
        let token = signer.issue("TO-2318", "customer@example.com", now);
        assert!(other.verify(&token, now).is_err());
    }

    #[test]
    fn secure_eq_behaves_correctly() {
        assert!(secure_eq(b"abc", b"abc"));
        assert!(!secure_eq(b"abc", b"abd"));
        assert!(!secure_eq(b"abc", b"ab"));
    }
}
