use crate::error::{LedgerError, Result};
use crate::utils::{hex_decode, hex_encode};
use ring::rand::SystemRandom;
use ring::signature::{
    EcdsaKeyPair, EcdsaSigningAlgorithm, EcdsaVerificationAlgorithm, KeyPair, UnparsedPublicKey,
    ECDSA_P256_SHA256_ASN1, ECDSA_P256_SHA256_ASN1_SIGNING, ECDSA_P384_SHA384_ASN1,
    ECDSA_P384_SHA384_ASN1_SIGNING,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Elliptic curves the key model can be configured with
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Curve {
    #[default]
    P256,
    P384,
}

impl Curve {
    fn signing_algorithm(&self) -> &'static EcdsaSigningAlgorithm {
        match self {
            Curve::P256 => &ECDSA_P256_SHA256_ASN1_SIGNING,
            Curve::P384 => &ECDSA_P384_SHA384_ASN1_SIGNING,
        }
    }

    fn verification_algorithm(&self) -> &'static EcdsaVerificationAlgorithm {
        match self {
            Curve::P256 => &ECDSA_P256_SHA256_ASN1,
            Curve::P384 => &ECDSA_P384_SHA384_ASN1,
        }
    }

    /// Length of an uncompressed SEC1 public key (0x04 || X || Y)
    pub fn public_key_len(&self) -> usize {
        match self {
            Curve::P256 => 65,
            Curve::P384 => 97,
        }
    }
}

impl FromStr for Curve {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "p256" | "p-256" | "prime256v1" | "secp256r1" => Ok(Curve::P256),
            "p384" | "p-384" | "secp384r1" => Ok(Curve::P384),
            _ => Err(LedgerError::Config(format!(
                "Unsupported curve: {s}. Valid options: p256, p384"
            ))),
        }
    }
}

impl fmt::Display for Curve {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Curve::P256 => write!(f, "p256"),
            Curve::P384 => write!(f, "p384"),
        }
    }
}

/// A registered wallet. The private key is never stored; holders prove
/// possession by presenting a key that derives `address`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, bincode::Encode, bincode::Decode)]
#[serde(rename_all = "camelCase")]
pub struct Wallet {
    pub(crate) id: String,
    pub(crate) address: String,
    pub(crate) user_id: String,
    pub(crate) created_at: i64,
}

impl Wallet {
    pub fn get_id(&self) -> &str {
        &self.id
    }

    pub fn get_address(&self) -> &str {
        &self.address
    }

    pub fn get_user_id(&self) -> &str {
        &self.user_id
    }

    pub fn get_created_at(&self) -> i64 {
        self.created_at
    }
}

/// Hex-encoded PKCS#8 private key. Wiped from memory on drop.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct PrivateKey(String);

impl PrivateKey {
    pub fn as_hex(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PrivateKey(<redacted>)")
    }
}

/// A freshly generated key pair. The only place a private key is handed out.
#[derive(Debug, Clone)]
pub struct GeneratedKeyPair {
    pub address: String,
    pub private_key: PrivateKey,
}

/// Curve-bound key operations: generation, address derivation, sign, verify.
#[derive(Clone)]
pub struct KeyContext {
    curve: Curve,
    rng: SystemRandom,
}

impl KeyContext {
    pub fn new(curve: Curve) -> KeyContext {
        KeyContext {
            curve,
            rng: SystemRandom::new(),
        }
    }

    pub fn curve(&self) -> Curve {
        self.curve
    }

    pub fn generate_key_pair(&self) -> Result<GeneratedKeyPair> {
        let pkcs8 = EcdsaKeyPair::generate_pkcs8(self.curve.signing_algorithm(), &self.rng)
            .map_err(|e| LedgerError::internal(format!("Failed to generate key pair: {e}")))?;
        let private_key = PrivateKey(hex_encode(pkcs8.as_ref()));
        let address = self.derive_public_address(private_key.as_hex())?;
        Ok(GeneratedKeyPair {
            address,
            private_key,
        })
    }

    /// Address (uncompressed public key hex) belonging to `private_key`
    pub fn derive_public_address(&self, private_key: &str) -> Result<String> {
        let key_pair = self.load_key_pair(private_key)?;
        Ok(hex_encode(key_pair.public_key().as_ref()))
    }

    /// DER-encoded ECDSA signature over `message`, as hex
    pub fn sign(&self, private_key: &str, message: &[u8]) -> Result<String> {
        let key_pair = self.load_key_pair(private_key)?;
        let signature = key_pair
            .sign(&self.rng, message)
            .map_err(|e| LedgerError::internal(format!("Failed to sign message: {e}")))?;
        Ok(hex_encode(signature.as_ref()))
    }

    pub fn verify(&self, address: &str, message: &[u8], signature: &str) -> bool {
        let (Some(public_key), Some(signature)) = (hex_decode(address), hex_decode(signature))
        else {
            return false;
        };
        UnparsedPublicKey::new(self.curve.verification_algorithm(), public_key)
            .verify(message, &signature)
            .is_ok()
    }

    /// True when `private_key` derives exactly `address`
    pub fn proves_possession(&self, private_key: &str, address: &str) -> bool {
        match self.derive_public_address(private_key) {
            Ok(derived) => derived.eq_ignore_ascii_case(address),
            Err(_) => false,
        }
    }

    pub fn is_valid_address(&self, address: &str) -> bool {
        match hex_decode(address) {
            Some(bytes) => bytes.len() == self.curve.public_key_len() && bytes[0] == 0x04,
            None => false,
        }
    }

    fn load_key_pair(&self, private_key: &str) -> Result<EcdsaKeyPair> {
        let mut pkcs8 = hex_decode(private_key)
            .ok_or_else(|| LedgerError::InvalidKey("private key is not hex".to_string()))?;
        let key_pair = EcdsaKeyPair::from_pkcs8(self.curve.signing_algorithm(), &pkcs8, &self.rng)
            .map_err(|e| LedgerError::InvalidKey(format!("{e}")));
        pkcs8.zeroize();
        key_pair
    }
}

impl fmt::Debug for KeyContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyContext")
            .field("curve", &self.curve)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_generated_address_is_uncompressed_public_key() {
        let keys = KeyContext::new(Curve::P256);
        let pair = keys.generate_key_pair().unwrap();

        assert!(pair.address.starts_with("04"));
        assert_eq!(pair.address.len(), 130);
        assert!(keys.is_valid_address(&pair.address));
    }

    #[test]
    fn test_derivation_is_deterministic() {
        let keys = KeyContext::new(Curve::P256);
        let pair = keys.generate_key_pair().unwrap();

        let first = keys.derive_public_address(pair.private_key.as_hex()).unwrap();
        let second = keys.derive_public_address(pair.private_key.as_hex()).unwrap();
        assert_eq!(first, pair.address);
        assert_eq!(first, second);
    }

    #[test]
    fn test_malformed_key_is_invalid_key() {
        let keys = KeyContext::new(Curve::P256);

        let err = keys.derive_public_address("wrong privatekey").unwrap_err();
        assert!(matches!(err, LedgerError::InvalidKey(_)));
        assert_eq!(err.kind(), ErrorKind::Unauthorized);

        let err = keys.derive_public_address("deadbeef").unwrap_err();
        assert!(matches!(err, LedgerError::InvalidKey(_)));
    }

    #[test]
    fn test_sign_and_verify() {
        let keys = KeyContext::new(Curve::P256);
        let pair = keys.generate_key_pair().unwrap();
        let other = keys.generate_key_pair().unwrap();

        let signature = keys.sign(pair.private_key.as_hex(), b"pay 10").unwrap();
        assert!(keys.verify(&pair.address, b"pay 10", &signature));
        assert!(!keys.verify(&pair.address, b"pay 11", &signature));
        assert!(!keys.verify(&other.address, b"pay 10", &signature));
        assert!(!keys.verify(&pair.address, b"pay 10", "zz"));
    }

    #[test]
    fn test_possession_check() {
        let keys = KeyContext::new(Curve::P256);
        let pair = keys.generate_key_pair().unwrap();
        let other = keys.generate_key_pair().unwrap();

        assert!(keys.proves_possession(pair.private_key.as_hex(), &pair.address));
        assert!(!keys.proves_possession(other.private_key.as_hex(), &pair.address));
        assert!(!keys.proves_possession("garbage", &pair.address));
    }

    #[test]
    fn test_p384_context() {
        let keys = KeyContext::new(Curve::P384);
        let pair = keys.generate_key_pair().unwrap();
        assert_eq!(pair.address.len(), 2 * Curve::P384.public_key_len());

        let signature = keys.sign(pair.private_key.as_hex(), b"hello").unwrap();
        assert!(keys.verify(&pair.address, b"hello", &signature));

        // A P-256 key is rejected by a P-384 context
        let p256 = KeyContext::new(Curve::P256).generate_key_pair().unwrap();
        assert!(keys.derive_public_address(p256.private_key.as_hex()).is_err());
    }

    #[test]
    fn test_private_key_debug_is_redacted() {
        let keys = KeyContext::new(Curve::P256);
        let pair = keys.generate_key_pair().unwrap();
        assert_eq!(format!("{:?}", pair.private_key), "PrivateKey(<redacted>)");
    }

    #[test]
    fn test_curve_parsing() {
        assert_eq!("P256".parse::<Curve>().unwrap(), Curve::P256);
        assert_eq!("secp384r1".parse::<Curve>().unwrap(), Curve::P384);
        assert!("secp256k1".parse::<Curve>().is_err());
    }
}
