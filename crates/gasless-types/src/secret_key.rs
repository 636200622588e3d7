//! Private keys read from configuration.
//!
//! A [`SecretKey`] holds the hex form of a secp256k1 key. The buffer is zeroed
//! on drop, and the key never appears in `Debug` output or in re-serialized
//! configuration.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use zeroize::Zeroizing;

const REDACTED: &str = "***REDACTED***";

/// A 32-byte private key as 64 lowercase hex characters, without `0x`.
#[derive(Clone, PartialEq, Eq)]
pub struct SecretKey(Zeroizing<String>);

impl SecretKey {
	/// Parses a hex key, with or without the `0x` prefix.
	pub fn parse(key: &str) -> Result<Self, String> {
		let digits = key.strip_prefix("0x").unwrap_or(key);
		if digits.len() != 64 {
			return Err("Private key must be 64 hex characters (32 bytes)".to_string());
		}
		if !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
			return Err("Private key must be valid hexadecimal".to_string());
		}
		Ok(Self(Zeroizing::new(digits.to_ascii_lowercase())))
	}

	/// Builds a key from its raw bytes.
	pub fn from_bytes(bytes: &[u8; 32]) -> Self {
		Self(Zeroizing::new(hex::encode(bytes)))
	}

	/// The key with its `0x` prefix. Must not be logged or persisted.
	pub fn expose_hex(&self) -> Zeroizing<String> {
		Zeroizing::new(format!("0x{}", self.0.as_str()))
	}

	/// Runs `f` over the unprefixed hex digits.
	pub fn with_exposed<F, R>(&self, f: F) -> R
	where
		F: FnOnce(&str) -> R,
	{
		f(&self.0)
	}
}

impl fmt::Debug for SecretKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_tuple("SecretKey").field(&REDACTED).finish()
	}
}

impl Serialize for SecretKey {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		serializer.serialize_str(REDACTED)
	}
}

impl<'de> Deserialize<'de> for SecretKey {
	fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
		let raw = Zeroizing::new(String::deserialize(deserializer)?);
		SecretKey::parse(&raw).map_err(serde::de::Error::custom)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	const KEY: &str = "0xAC0974BEC39A17E36BA4A6B4D238FF944BACB478CBED5EFCAE784D7BF4F2FF80";

	#[test]
	fn test_key_is_normalized() {
		let key = SecretKey::parse(KEY).unwrap();
		assert_eq!(key.expose_hex().as_str(), KEY.to_ascii_lowercase());
		assert_eq!(key.with_exposed(str::len), 64);
		assert_eq!(key, SecretKey::parse(&KEY[2..]).unwrap());
	}

	#[test]
	fn test_key_never_printed() {
		let key = SecretKey::parse(KEY).unwrap();
		assert_eq!(format!("{:?}", key), "SecretKey(\"***REDACTED***\")");
		assert_eq!(serde_json::to_string(&key).unwrap(), "\"***REDACTED***\"");
	}

	#[test]
	fn test_malformed_keys() {
		assert!(SecretKey::parse("0x1234").is_err());
		assert!(SecretKey::parse(&"zz".repeat(32)).is_err());
		assert!(serde_json::from_str::<SecretKey>("\"0x01\"").is_err());
	}

	#[test]
	fn test_from_bytes() {
		let key = SecretKey::from_bytes(&[0x11; 32]);
		assert_eq!(key.expose_hex().as_str(), format!("0x{}", "11".repeat(32)));
	}
}
