//! Account address type for covault

use bech32::{Bech32, Hrp};
use ripemd::Ripemd160;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

/// Default human-readable prefix for rendered addresses
pub const DEFAULT_HRP: &str = "cov";

/// Account address - 20 bytes
///
/// Identifies both the shared smart-contract account and the individual
/// co-signers that confirm operations against it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccAddress([u8; 20]);

impl AccAddress {
    /// Create an address from a public key using the standard derivation
    /// ripemd160(sha256(pubkey_bytes))
    pub fn from_pubkey(pubkey_bytes: &[u8]) -> Self {
        let sha256_hash = Sha256::digest(pubkey_bytes);
        let ripemd160_hash = Ripemd160::digest(sha256_hash);
        let mut bytes = [0u8; 20];
        bytes.copy_from_slice(&ripemd160_hash);
        Self(bytes)
    }

    /// Build an address from raw bytes
    pub fn from_bytes(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    /// Convert to Bech32 string with the given prefix
    pub fn to_bech32(&self, hrp_str: &str) -> String {
        let hrp = Hrp::parse(hrp_str).expect("invalid hrp");
        bech32::encode::<Bech32>(hrp, &self.0).expect("encoding to bech32 should not fail")
    }

    /// Parse from Bech32 string, returning the prefix alongside the address
    pub fn from_bech32(s: &str) -> Result<(String, Self), String> {
        let (hrp, data) = bech32::decode(s).map_err(|e| e.to_string())?;
        if data.len() != 20 {
            return Err("invalid address length".to_string());
        }
        let mut addr_bytes = [0u8; 20];
        addr_bytes.copy_from_slice(&data);
        Ok((hrp.to_string(), Self(addr_bytes)))
    }

    /// Get the raw bytes
    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }
}

impl fmt::Display for AccAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_bech32(DEFAULT_HRP))
    }
}

impl FromStr for AccAddress {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (_, addr) = Self::from_bech32(s)?;
        Ok(addr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_roundtrip() {
        let addr = AccAddress::from_pubkey(&[7u8; 33]);
        let encoded = addr.to_bech32(DEFAULT_HRP);
        assert!(encoded.starts_with("cov1"));

        let (hrp, decoded) = AccAddress::from_bech32(&encoded).unwrap();
        assert_eq!(hrp, DEFAULT_HRP);
        assert_eq!(decoded, addr);
    }

    #[test]
    fn test_from_str_rejects_garbage() {
        assert!("not-an-address".parse::<AccAddress>().is_err());
        assert!("".parse::<AccAddress>().is_err());
    }

    #[test]
    fn test_derivation_is_deterministic() {
        let a = AccAddress::from_pubkey(&[1u8; 33]);
        let b = AccAddress::from_pubkey(&[1u8; 33]);
        assert_eq!(a, b);
        assert_ne!(a, AccAddress::from_pubkey(&[2u8; 33]));
    }
}
