//! Signing accounts for the gasless relay system.
//!
//! An account owns a key and produces the 65-byte `r || s || v` signatures the
//! forwarder checks. Recovery lives here too, so signers and the forwarder
//! agree on exactly which signatures are acceptable.

use alloy_primitives::{uint, Address, Bytes, PrimitiveSignature, B256, U256};
use async_trait::async_trait;
use gasless_types::{ConfigSchema, ImplementationRegistry, SecretKey, TypedForwardRequest};
use thiserror::Error;

pub mod implementations {
	pub mod local;
}

/// Errors that can occur during account operations.
#[derive(Debug, Error)]
pub enum AccountError {
	#[error("Signing failed: {0}")]
	SigningFailed(String),
	#[error("Invalid key: {0}")]
	InvalidKey(String),
	/// The signature is malformed or does not recover to an address.
	#[error("Invalid signature: {0}")]
	InvalidSignature(String),
	#[error("Implementation error: {0}")]
	Implementation(String),
}

/// Interface every account implementation provides.
#[async_trait]
pub trait AccountInterface: Send + Sync {
	/// Schema of this implementation's `[account.implementations.<name>]` table.
	fn config_schema(&self) -> Box<dyn ConfigSchema>;

	async fn address(&self) -> Result<Address, AccountError>;

	/// Signs a 32-byte digest as-is, without any message prefix.
	async fn sign_hash(&self, hash: &B256) -> Result<Bytes, AccountError>;

	fn get_private_key(&self) -> SecretKey;
}

pub type AccountFactory = fn(&toml::Value) -> Result<Box<dyn AccountInterface>, AccountError>;

pub trait AccountRegistry: ImplementationRegistry<Factory = AccountFactory> {}

/// All account implementations, by configuration name.
pub fn get_all_implementations() -> Vec<(&'static str, AccountFactory)> {
	use implementations::local;

	vec![(local::Registry::NAME, local::Registry::factory())]
}

/// Upper bound of the `s` value accepted in a signature (secp256k1n / 2).
const SECP256K1N_HALF: U256 =
	uint!(0x7FFFFFFFFFFFFFFFFFFFFFFFFFFFFFFF5D576E7357A4501DDFE92F46681B20A0_U256);

/// Recovers the address that signed `hash`.
///
/// Only canonical signatures are accepted: exactly 65 bytes, `v` of 27 or 28,
/// and `s` in the lower half of the curve order.
pub fn recover_signer(hash: &B256, signature: &[u8]) -> Result<Address, AccountError> {
	if signature.len() != 65 {
		return Err(AccountError::InvalidSignature(format!(
			"expected 65 bytes, got {}",
			signature.len()
		)));
	}
	let r = U256::from_be_slice(&signature[..32]);
	let s = U256::from_be_slice(&signature[32..64]);
	let y_parity = match signature[64] {
		27 => false,
		28 => true,
		v => return Err(AccountError::InvalidSignature(format!("invalid v value {}", v))),
	};
	if s > SECP256K1N_HALF {
		return Err(AccountError::InvalidSignature("s value is not canonical".to_string()));
	}

	PrimitiveSignature::new(r, s, y_parity)
		.recover_address_from_prehash(hash)
		.map_err(|e| AccountError::InvalidSignature(e.to_string()))
}

/// Service that manages account operations.
pub struct AccountService {
	implementation: Box<dyn AccountInterface>,
}

impl AccountService {
	pub fn new(implementation: Box<dyn AccountInterface>) -> Self {
		Self { implementation }
	}

	pub async fn get_address(&self) -> Result<Address, AccountError> {
		self.implementation.address().await
	}

	pub async fn sign_hash(&self, hash: &B256) -> Result<Bytes, AccountError> {
		self.implementation.sign_hash(hash).await
	}

	/// Signs the EIP-712 digest of a forward request.
	///
	/// The request must name this account as `from`; the forwarder would reject
	/// the signature otherwise.
	pub async fn sign_forward_request(
		&self,
		typed: &TypedForwardRequest,
	) -> Result<Bytes, AccountError> {
		let address = self.get_address().await?;
		if typed.request.from != address {
			return Err(AccountError::SigningFailed(format!(
				"request is from {} but this account is {}",
				typed.request.from, address
			)));
		}
		let digest = typed
			.digest()
			.map_err(|e| AccountError::SigningFailed(e.to_string()))?;
		self.sign_hash(&digest).await
	}

	pub fn get_private_key(&self) -> SecretKey {
		self.implementation.get_private_key()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::implementations::local::LocalWallet;
	use alloy_primitives::{address, keccak256};
	use gasless_types::{DomainDescriptor, ForwardRequest, RequestTypeDescriptor};

	const ANVIL_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
	const ANVIL_ADDRESS: Address = address!("f39fd6e51aad88f6f4ce6ab8827279cfffb92266");

	fn service() -> AccountService {
		AccountService::new(Box::new(LocalWallet::new(ANVIL_KEY).unwrap()))
	}

	#[tokio::test]
	async fn test_sign_and_recover() {
		let service = service();
		assert_eq!(service.get_address().await.unwrap(), ANVIL_ADDRESS);

		let hash = keccak256(b"gasless");
		let signature = service.sign_hash(&hash).await.unwrap();
		assert_eq!(signature.len(), 65);
		assert!(signature[64] == 27 || signature[64] == 28);
		assert_eq!(recover_signer(&hash, &signature).unwrap(), ANVIL_ADDRESS);
		assert_ne!(
			recover_signer(&keccak256(b"other"), &signature).unwrap(),
			ANVIL_ADDRESS
		);
	}

	#[tokio::test]
	async fn test_rejects_non_canonical_signatures() {
		let hash = keccak256(b"gasless");
		let signature = service().sign_hash(&hash).await.unwrap();

		assert!(matches!(
			recover_signer(&hash, &signature[..64]),
			Err(AccountError::InvalidSignature(_))
		));

		let mut bad_v = signature.to_vec();
		bad_v[64] = 1;
		assert!(recover_signer(&hash, &bad_v).is_err());

		// Flip s to n - s and the parity with it: same signer, high s.
		let n = SECP256K1N_HALF * U256::from(2) + U256::from(1);
		let s = U256::from_be_slice(&signature[32..64]);
		let mut malleable = signature.to_vec();
		malleable[32..64].copy_from_slice(&(n - s).to_be_bytes::<32>());
		malleable[64] = if signature[64] == 27 { 28 } else { 27 };
		assert!(matches!(
			recover_signer(&hash, &malleable),
			Err(AccountError::InvalidSignature(_))
		));
	}

	#[tokio::test]
	async fn test_sign_forward_request_checks_from() {
		let service = service();
		let mut typed = TypedForwardRequest {
			domain: DomainDescriptor::new("my domain name", "1", 1337, Address::repeat_byte(0x11)),
			request_type: RequestTypeDescriptor::new("my type name", "bytes8 tag)").unwrap(),
			request: ForwardRequest {
				from: ANVIL_ADDRESS,
				to: Address::repeat_byte(0x22),
				..Default::default()
			},
			suffix_values: vec![Bytes::from_static(b"typeSuff")],
		};

		let signature = service.sign_forward_request(&typed).await.unwrap();
		assert_eq!(
			recover_signer(&typed.digest().unwrap(), &signature).unwrap(),
			ANVIL_ADDRESS
		);

		typed.request.from = Address::repeat_byte(0x33);
		assert!(matches!(
			service.sign_forward_request(&typed).await,
			Err(AccountError::SigningFailed(_))
		));
	}
}
