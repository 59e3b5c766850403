//! Token encoding for lease internal state.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;

use super::ProviderToken;
use crate::BrokerResult;
use crate::error::BrokerError;

/// Encodes provider tokens to and from the opaque string stored in a lease.
///
/// The encoding is base64url (unpadded) over the token's JSON form.
pub struct TokenCodec;

impl TokenCodec {
    /// Encodes a token.
    ///
    /// # Errors
    ///
    /// Returns `BrokerError::Internal` if the token cannot be serialized.
    pub fn encode(token: &ProviderToken) -> BrokerResult<String> {
        let json = serde_json::to_vec(token)
            .map_err(|e| BrokerError::internal(format!("failed to encode token: {e}")))?;
        Ok(URL_SAFE_NO_PAD.encode(json))
    }

    /// Decodes a token previously produced by [`TokenCodec::encode`].
    ///
    /// # Errors
    ///
    /// Returns `BrokerError::MalformedLease` if the value is not a valid
    /// encoding or lacks an access token.
    pub fn decode(encoded: &str) -> BrokerResult<ProviderToken> {
        let bytes = URL_SAFE_NO_PAD
            .decode(encoded.trim())
            .map_err(|e| BrokerError::malformed_lease(format!("token is not base64url: {e}")))?;
        let token: ProviderToken = serde_json::from_slice(&bytes)
            .map_err(|e| BrokerError::malformed_lease(format!("token is not valid JSON: {e}")))?;
        if token.access_token.is_empty() {
            return Err(BrokerError::malformed_lease("token has no access_token"));
        }
        Ok(token)
    }
}
