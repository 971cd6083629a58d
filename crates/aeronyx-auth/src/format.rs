//! Signature format validation.

use crate::error::{AuthError, AuthResult};
use aeronyx_core::{SignatureScheme, WalletType};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;

/// Compact (EIP-2098) and full (r, s, v) ECDSA signature lengths.
const EVM_SIGNATURE_LENS: [usize; 2] = [64, 65];
/// ed25519 signature length.
const ED25519_SIGNATURE_LEN: usize = 64;

/// Check that `signature` is encoded the way `wallet_type` encodes signatures.
///
/// This is a shape check only; the backend verifies the signature itself.
pub fn validate_signature(wallet_type: WalletType, signature: &str) -> AuthResult<()> {
    let invalid = |reason: String| AuthError::InvalidSignatureFormat {
        wallet_type,
        reason,
    };

    match wallet_type.scheme() {
        SignatureScheme::HexPrefixed => {
            let body = signature
                .strip_prefix("0x")
                .ok_or_else(|| invalid("missing 0x prefix".to_string()))?;
            let bytes = hex::decode(body).map_err(|e| invalid(format!("not hex: {e}")))?;
            if !EVM_SIGNATURE_LENS.contains(&bytes.len()) {
                return Err(invalid(format!("expected 65 bytes, got {}", bytes.len())));
            }
        }
        SignatureScheme::Base64 => {
            let bytes = STANDARD
                .decode(signature)
                .map_err(|e| invalid(format!("not base64: {e}")))?;
            if bytes.len() != ED25519_SIGNATURE_LEN {
                return Err(invalid(format!(
                    "expected {ED25519_SIGNATURE_LEN} bytes, got {}",
                    bytes.len()
                )));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_signature() {
        let sig = format!("0x{}", "ab".repeat(65));
        assert!(validate_signature(WalletType::Okx, &sig).is_ok());
        assert!(validate_signature(WalletType::Metamask, &sig).is_ok());

        let compact = format!("0x{}", "ab".repeat(64));
        assert!(validate_signature(WalletType::Okx, &compact).is_ok());
    }

    #[test]
    fn test_hex_signature_rejects() {
        // No prefix
        assert!(validate_signature(WalletType::Okx, &"ab".repeat(65)).is_err());
        // Not hex
        assert!(validate_signature(WalletType::Okx, &format!("0x{}", "zz".repeat(65))).is_err());
        // Wrong length
        let err = validate_signature(WalletType::Okx, &format!("0x{}", "ab".repeat(32)))
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidSignatureFormat { wallet_type: WalletType::Okx, .. }));
    }

    #[test]
    fn test_base64_signature() {
        let sig = STANDARD.encode([7u8; 64]);
        assert!(validate_signature(WalletType::Phantom, &sig).is_ok());

        let short = STANDARD.encode([7u8; 32]);
        assert!(validate_signature(WalletType::Phantom, &short).is_err());
        assert!(validate_signature(WalletType::Phantom, "0xdeadbeef").is_err());
    }

    #[test]
    fn test_scheme_mismatch() {
        // A hex signature from an EVM wallet is not valid for phantom.
        let sig = format!("0x{}", "ab".repeat(65));
        assert!(validate_signature(WalletType::Phantom, &sig).is_err());
    }
}
