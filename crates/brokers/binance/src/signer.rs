//! Request signing for Binance's `SIGNED` endpoints.

use futdesk_core::ExchangeError;
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Signs query strings with the account's API secret (HMAC-SHA256, hex).
#[derive(Clone)]
pub struct RequestSigner {
    secret: String,
}

impl RequestSigner {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// Signature over the exact query string that will be sent.
    pub fn sign(&self, query: &str) -> Result<String, ExchangeError> {
        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes())
            .map_err(|e| ExchangeError::Signing(format!("Failed to create HMAC: {e}")))?;
        mac.update(query.as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }
}

impl std::fmt::Debug for RequestSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestSigner").finish_non_exhaustive()
    }
}

/// URL-encode pairs into `k=v&k=v`, keeping their order. The result is
/// both what gets signed and what goes on the wire.
pub fn build_query_string(params: &[(&str, String)]) -> Result<String, ExchangeError> {
    serde_urlencoded::to_string(params)
        .map_err(|e| ExchangeError::Signing(format!("Failed to encode query: {e}")))
}
