//! Local private-key account.
//!
//! The key is read from configuration and kept in memory by Alloy's
//! [`PrivateKeySigner`]. Suitable for development chains and tests.

use crate::{AccountError, AccountInterface};
use alloy_primitives::{Address, Bytes, B256};
use alloy_signer::Signer;
use alloy_signer_local::PrivateKeySigner;
use async_trait::async_trait;
use gasless_types::{ConfigSchema, Field, FieldType, Schema, SecretKey, ValidationError};

pub struct LocalWallet {
	signer: PrivateKeySigner,
}

impl LocalWallet {
	/// Creates a wallet from a hex-encoded private key, with or without 0x prefix.
	pub fn new(private_key_hex: &str) -> Result<Self, AccountError> {
		Self::from_key(&SecretKey::parse(private_key_hex).map_err(AccountError::InvalidKey)?)
	}

	pub fn from_key(key: &SecretKey) -> Result<Self, AccountError> {
		let signer = key
			.with_exposed(|hex| hex.parse::<PrivateKeySigner>())
			.map_err(|e| AccountError::InvalidKey(format!("Invalid private key: {}", e)))?;

		Ok(Self { signer })
	}
}

/// Configuration schema for LocalWallet.
pub struct LocalWalletSchema;

impl ConfigSchema for LocalWalletSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let schema = Schema::new(
			vec![Field::new("private_key", FieldType::HexBytes { len: Some(32) })],
			vec![Field::new("address", FieldType::Address)],
		);

		schema.validate(config)
	}
}

#[async_trait]
impl AccountInterface for LocalWallet {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(LocalWalletSchema)
	}

	async fn address(&self) -> Result<Address, AccountError> {
		Ok(self.signer.address())
	}

	async fn sign_hash(&self, hash: &B256) -> Result<Bytes, AccountError> {
		let signature = self
			.signer
			.sign_hash(hash)
			.await
			.map_err(|e| AccountError::SigningFailed(format!("Failed to sign hash: {}", e)))?;

		Ok(Bytes::copy_from_slice(&signature.as_bytes()))
	}

	fn get_private_key(&self) -> SecretKey {
		SecretKey::from_bytes(&self.signer.to_bytes().0)
	}
}

/// Creates a local wallet from its `[account.implementations.local]` table.
pub fn create_account(config: &toml::Value) -> Result<Box<dyn AccountInterface>, AccountError> {
	LocalWalletSchema
		.validate(config)
		.map_err(|e| AccountError::InvalidKey(format!("Invalid configuration: {}", e)))?;

	let private_key = config
		.get("private_key")
		.and_then(|v| v.as_str())
		.ok_or_else(|| AccountError::InvalidKey("private_key is required".to_string()))?;
	let wallet = LocalWallet::new(private_key)?;

	// An optional `address` pins the account the key must derive.
	if let Some(expected) = config.get("address").and_then(|v| v.as_str()) {
		let actual = wallet.signer.address();
		if expected.parse::<Address>().ok() != Some(actual) {
			return Err(AccountError::InvalidKey(format!(
				"Key derives {} but the configuration expects {}",
				actual, expected
			)));
		}
	}

	Ok(Box::new(wallet))
}

pub struct Registry;

impl gasless_types::ImplementationRegistry for Registry {
	const NAME: &'static str = "local";
	type Factory = crate::AccountFactory;

	fn factory() -> Self::Factory {
		create_account
	}
}

impl crate::AccountRegistry for Registry {}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::get_all_implementations;
	use alloy_primitives::address;

	fn table(key: &str) -> toml::Value {
		let mut table = toml::Table::new();
		table.insert("private_key".to_string(), toml::Value::String(key.to_string()));
		toml::Value::Table(table)
	}

	#[tokio::test]
	async fn test_create_from_config() {
		let key = "59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d";
		let (name, factory) = get_all_implementations()[0];
		assert_eq!(name, "local");

		let account = factory(&table(key)).unwrap();
		assert_eq!(
			account.address().await.unwrap(),
			address!("70997970c51812dc3a010c7d01b50e0d17dc79c8")
		);
		assert_eq!(account.get_private_key().expose_hex().as_str(), format!("0x{}", key));
		assert!(account.config_schema().validate(&table(key)).is_ok());
	}

	#[test]
	fn test_rejects_bad_keys() {
		assert!(matches!(
			create_account(&table("0x1234")),
			Err(AccountError::InvalidKey(_))
		));
		assert!(create_account(&table(&"zz".repeat(32))).is_err());
		assert!(create_account(&toml::Value::Table(toml::Table::new())).is_err());
	}

	#[test]
	fn test_pinned_address_must_match() {
		let key = "59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d";
		let mut config = table(key);
		pinned_address(&mut config, "0x70997970C51812dc3A010C7d01b50e0d17dc79C8");
		assert!(create_account(&config).is_ok());

		pinned_address(&mut config, "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266");
		assert!(matches!(create_account(&config), Err(AccountError::InvalidKey(_))));

		pinned_address(&mut config, "70997970C51812dc3A010C7d01b50e0d17dc79C8");
		assert!(create_account(&config).is_err());
	}

	fn pinned_address(config: &mut toml::Value, address: &str) {
		config
			.as_table_mut()
			.unwrap()
			.insert("address".to_string(), toml::Value::String(address.to_string()));
	}
}
