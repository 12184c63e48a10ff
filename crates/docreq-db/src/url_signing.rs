//! HMAC-SHA256 signed URLs for the filesystem object store.
//!
//! A signed URL has the form
//! `{base}/files/{key}?method=GET&expires=<unix>&signature=<hex>`, where the
//! signature covers `"{method}\n{key}\n{expires}"`. The API's `/files/{key}`
//! route verifies it before serving or accepting bytes.

use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use docreq_core::{Error, PresignMethod, Result};

type HmacSha256 = Hmac<Sha256>;

/// Path prefix served by the API for signed object access.
pub const FILES_PATH: &str = "/files/";

/// Why a signed URL was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureError {
    Expired,
    Mismatch,
    Malformed,
}

impl std::fmt::Display for SignatureError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SignatureError::Expired => f.write_str("link has expired"),
            SignatureError::Mismatch => f.write_str("signature does not match"),
            SignatureError::Malformed => f.write_str("signature is malformed"),
        }
    }
}

/// Signs and verifies time-limited object URLs.
#[derive(Clone)]
pub struct UrlSigner {
    secret: Vec<u8>,
    public_base_url: String,
}

impl std::fmt::Debug for UrlSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UrlSigner")
            .field("public_base_url", &self.public_base_url)
            .finish_non_exhaustive()
    }
}

impl UrlSigner {
    pub fn new(secret: impl AsRef<[u8]>, public_base_url: impl Into<String>) -> Result<Self> {
        let secret = secret.as_ref().to_vec();
        if secret.is_empty() {
            return Err(Error::InvalidInput(
                "URL signing secret must not be empty".to_string(),
            ));
        }
        Ok(Self {
            secret,
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Build a signed URL for `key` valid for `expires_in` from now.
    pub fn sign(&self, key: &str, method: PresignMethod, expires_in: Duration) -> Result<String> {
        let expires = Self::expiry_timestamp(Utc::now(), expires_in).ok_or_else(|| {
            Error::InvalidInput(format!("URL lifetime out of range: {:?}", expires_in))
        })?;
        self.sign_until(key, method, expires)
    }

    /// Build a signed URL for `key` that expires at the given unix timestamp.
    pub fn sign_until(&self, key: &str, method: PresignMethod, expires: i64) -> Result<String> {
        let signature = self.signature(key, method, expires)?;
        Ok(format!(
            "{}{}{}?method={}&expires={}&signature={}",
            self.public_base_url,
            FILES_PATH,
            urlencoding::encode(key),
            method,
            expires,
            signature
        ))
    }

    /// Check a signature presented for `key`.
    ///
    /// `now` is passed in so callers and tests control the clock.
    pub fn verify(
        &self,
        key: &str,
        method: PresignMethod,
        expires: i64,
        signature: &str,
        now: DateTime<Utc>,
    ) -> std::result::Result<(), SignatureError> {
        if now.timestamp() > expires {
            return Err(SignatureError::Expired);
        }
        let presented = hex::decode(signature).map_err(|_| SignatureError::Malformed)?;
        let mut mac = self.mac().map_err(|_| SignatureError::Malformed)?;
        mac.update(Self::payload(key, method, expires).as_bytes());
        mac.verify_slice(&presented)
            .map_err(|_| SignatureError::Mismatch)
    }

    /// Expiry instant for a URL signed now with `expires_in`.
    ///
    /// Lifetimes past the representable range clamp to the latest instant.
    pub fn expires_at(expires_in: Duration) -> DateTime<Utc> {
        Self::expiry_timestamp(Utc::now(), expires_in)
            .and_then(|expires| Utc.timestamp_opt(expires, 0).single())
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// Unix timestamp `expires_in` after `now`, or `None` on overflow.
    fn expiry_timestamp(now: DateTime<Utc>, expires_in: Duration) -> Option<i64> {
        let secs = i64::try_from(expires_in.as_secs()).ok()?;
        now.timestamp().checked_add(secs)
    }

    fn signature(&self, key: &str, method: PresignMethod, expires: i64) -> Result<String> {
        let mut mac = self.mac()?;
        mac.update(Self::payload(key, method, expires).as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    fn mac(&self) -> Result<HmacSha256> {
        HmacSha256::new_from_slice(&self.secret)
            .map_err(|e| Error::Storage(format!("invalid signing key: {}", e)))
    }

    fn payload(key: &str, method: PresignMethod, expires: i64) -> String {
        format!("{}\n{}\n{}", method, key, expires)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signer() -> UrlSigner {
        UrlSigner::new("test-secret", "http://localhost:3000/").unwrap()
    }

    fn query_param<'a>(url: &'a str, name: &str) -> &'a str {
        let query = url.split_once('?').unwrap().1;
        query
            .split('&')
            .find_map(|pair| pair.strip_prefix(&format!("{}=", name)))
            .unwrap()
    }

    #[test]
    fn test_empty_secret_rejected() {
        assert!(UrlSigner::new("", "http://x").is_err());
    }

    #[test]
    fn test_out_of_range_lifetime() {
        let err = signer()
            .sign("k", PresignMethod::Get, Duration::from_secs(u64::MAX))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
        assert_eq!(
            UrlSigner::expires_at(Duration::from_secs(u64::MAX)),
            DateTime::<Utc>::MAX_UTC
        );
    }

    #[test]
    fn test_sign_url_shape() {
        let url = signer()
            .sign_until("abc-report.pdf", PresignMethod::Get, 1_900_000_000)
            .unwrap();
        assert!(url.starts_with(
            "http://localhost:3000/files/abc-report.pdf?method=GET&expires=1900000000&signature="
        ));
        assert_eq!(query_param(&url, "signature").len(), 64);
    }

    #[test]
    fn test_key_is_percent_encoded() {
        let url = signer()
            .sign_until("a b.pdf", PresignMethod::Get, 1_900_000_000)
            .unwrap();
        assert!(url.contains("/files/a%20b.pdf?"));
    }

    #[test]
    fn test_verify_accepts_own_signature() {
        let s = signer();
        let url = s.sign_until("k", PresignMethod::Put, 2_000).unwrap();
        let sig = query_param(&url, "signature");
        let now = Utc.timestamp_opt(1_000, 0).unwrap();
        assert_eq!(s.verify("k", PresignMethod::Put, 2_000, sig, now), Ok(()));
    }

    #[test]
    fn test_verify_rejects_tampering() {
        let s = signer();
        let url = s.sign_until("k", PresignMethod::Get, 2_000).unwrap();
        let sig = query_param(&url, "signature");
        let now = Utc.timestamp_opt(1_000, 0).unwrap();

        assert_eq!(
            s.verify("other", PresignMethod::Get, 2_000, sig, now),
            Err(SignatureError::Mismatch)
        );
        assert_eq!(
            s.verify("k", PresignMethod::Put, 2_000, sig, now),
            Err(SignatureError::Mismatch)
        );
        assert_eq!(
            s.verify("k", PresignMethod::Get, 3_000, sig, now),
            Err(SignatureError::Mismatch)
        );
        assert_eq!(
            s.verify("k", PresignMethod::Get, 2_000, "zz", now),
            Err(SignatureError::Malformed)
        );
    }

    #[test]
    fn test_verify_rejects_expired() {
        let s = signer();
        let url = s.sign_until("k", PresignMethod::Get, 2_000).unwrap();
        let sig = query_param(&url, "signature");
        let later = Utc.timestamp_opt(2_001, 0).unwrap();
        assert_eq!(
            s.verify("k", PresignMethod::Get, 2_000, sig, later),
            Err(SignatureError::Expired)
        );
    }

    #[test]
    fn test_different_secrets_disagree() {
        let a = signer();
        let b = UrlSigner::new("other-secret", "http://localhost:3000").unwrap();
        let url = a.sign_until("k", PresignMethod::Get, 2_000).unwrap();
        let sig = query_param(&url, "signature");
        let now = Utc.timestamp_opt(1_000, 0).unwrap();
        assert_eq!(
            b.verify("k", PresignMethod::Get, 2_000, sig, now),
            Err(SignatureError::Mismatch)
        );
    }
}
