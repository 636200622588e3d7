//! EIP-712 encoding shared by signers and the forwarder.
//!
//! These helpers provide:
//! - Domain value and domain separator computation
//! - Forward-request struct hashing over a registered request type
//! - Final digest computation (0x1901 || domainHash || structHash)

use crate::{EncodingError, ForwardRequest, RequestTypeDescriptor};
use alloy_primitives::{keccak256, Address, B256, U256};

/// The domain type every registered domain is hashed under.
pub const DOMAIN_TYPE: &str =
	"EIP712Domain(string name,string version,uint256 chainId,address verifyingContract)";

/// `(name, type)` pairs of [`DOMAIN_TYPE`].
pub const DOMAIN_FIELDS: [(&str, &str); 4] = [
	("name", "string"),
	("version", "string"),
	("chainId", "uint256"),
	("verifyingContract", "address"),
];

/// Computes the ABI encoded domain value:
/// `abi.encode(typeHash, keccak256(name), keccak256(version), chainId, verifyingContract)`.
pub fn compute_domain_value(
	name: &str,
	version: &str,
	chain_id: U256,
	verifying_contract: &Address,
) -> Vec<u8> {
	let mut enc = Eip712AbiEncoder::new();
	enc.push_b256(&keccak256(DOMAIN_TYPE.as_bytes()));
	enc.push_hashed(name.as_bytes());
	enc.push_hashed(version.as_bytes());
	enc.push_u256(chain_id);
	enc.push_address(verifying_contract);
	enc.finish()
}

/// Hashes a forward request under `type_hash` with already encoded suffix words.
///
/// The caller is responsible for `suffix_data` matching the request type; use
/// [`forward_request_digest`] when the descriptor is at hand.
pub fn hash_forward_request(type_hash: &B256, request: &ForwardRequest, suffix_data: &[u8]) -> B256 {
	let mut enc = Eip712AbiEncoder::new();
	enc.push_b256(type_hash);
	enc.push_address(&request.from);
	enc.push_address(&request.to);
	enc.push_u256(request.value);
	enc.push_u256(request.gas);
	enc.push_u256(request.nonce);
	enc.push_hashed(&request.data);
	enc.push_u256(request.valid_until_time);
	enc.push_raw(suffix_data);
	keccak256(enc.finish())
}

/// Computes the digest a signer signs for `request` under a domain and request type.
pub fn forward_request_digest(
	domain_hash: &B256,
	request_type: &RequestTypeDescriptor,
	request: &ForwardRequest,
	suffix_data: &[u8],
) -> Result<B256, EncodingError> {
	request_type.validate_suffix_data(suffix_data)?;
	let struct_hash = hash_forward_request(&request_type.type_hash(), request, suffix_data);
	Ok(compute_final_digest(domain_hash, &struct_hash))
}

/// Compute the final EIP-712 digest: keccak256(0x1901 || domainHash || structHash).
pub fn compute_final_digest(domain_hash: &B256, struct_hash: &B256) -> B256 {
	let mut out = Vec::with_capacity(2 + 32 + 32);
	out.push(0x19);
	out.push(0x01);
	out.extend_from_slice(domain_hash.as_slice());
	out.extend_from_slice(struct_hash.as_slice());
	keccak256(out)
}

/// Word-by-word encoder for EIP-712 `encodeData`.
#[derive(Debug, Default)]
pub struct Eip712AbiEncoder {
	buf: Vec<u8>,
}

impl Eip712AbiEncoder {
	pub fn new() -> Self {
		Self { buf: Vec::new() }
	}

	pub fn push_b256(&mut self, v: &B256) {
		self.buf.extend_from_slice(v.as_slice());
	}

	pub fn push_address(&mut self, addr: &Address) {
		let mut word = [0u8; 32];
		word[12..].copy_from_slice(addr.as_slice());
		self.buf.extend_from_slice(&word);
	}

	pub fn push_u256(&mut self, v: U256) {
		let word: [u8; 32] = v.to_be_bytes::<32>();
		self.buf.extend_from_slice(&word);
	}

	/// Dynamic `bytes`/`string` members are encoded as their keccak256.
	pub fn push_hashed(&mut self, data: &[u8]) {
		self.push_b256(&keccak256(data));
	}

	/// Appends words that are already encoded.
	pub fn push_raw(&mut self, words: &[u8]) {
		self.buf.extend_from_slice(words);
	}

	pub fn finish(self) -> Vec<u8> {
		self.buf
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::{DomainDescriptor, TypedForwardRequest};
	use alloy_dyn_abi::TypedData;
	use alloy_sol_types::Eip712Domain;
	use alloy_primitives::{address, b256, hex, Bytes};

	fn sample() -> TypedForwardRequest {
		TypedForwardRequest {
			domain: DomainDescriptor::new(
				"AAAA Platform",
				"1",
				43113,
				address!("52c84043cd9c865236f11d9fc9f56aa003c1f922"),
			),
			request_type: RequestTypeDescriptor::new(
				"Message",
				"bytes32 ABCDEFGHIJKLMNOPQRSTGSN)",
			)
			.unwrap(),
			request: ForwardRequest {
				from: address!("c41cb13576ae51927435366dc2de8121d5d67266"),
				to: address!("5db9a7629912ebf95876228c24a848de0bfb43a9"),
				value: U256::ZERO,
				gas: U256::from(0x7b17),
				nonce: U256::ZERO,
				data: Bytes::from(hex!("d09de08a").to_vec()),
				valid_until_time: U256::MAX,
			},
			suffix_values: vec![Bytes::from_static(b"bytes32 ABCDEFGHIJKLMNOPQRSTGSN)")],
		}
	}

	#[test]
	fn test_domain_type_hash() {
		assert_eq!(
			keccak256(DOMAIN_TYPE),
			b256!("8b73c3c69bb8fe3d512ecc4cf759cc79239f7b179b0ffacaa9a75d522b39400f")
		);
	}

	#[test]
	fn test_domain_hash_matches_alloy() {
		let domain = sample().domain;
		let reference = Eip712Domain::new(
			Some(domain.name.clone().into()),
			Some(domain.version.clone().into()),
			Some(domain.chain_id),
			Some(domain.verifying_contract),
			None,
		);
		assert_eq!(domain.hash(), reference.separator());
		assert_eq!(domain.encode().len(), 5 * 32);
	}

	#[test]
	fn test_digest_matches_sign_typed_data_v4() {
		let typed = sample();
		let fields: Vec<serde_json::Value> = typed
			.request_type
			.eip712_fields()
			.into_iter()
			.map(|(name, ty)| serde_json::json!({ "name": name, "type": ty }))
			.collect();
		let json = serde_json::json!({
			"types": {
				"EIP712Domain": [
					{ "name": "name", "type": "string" },
					{ "name": "version", "type": "string" },
					{ "name": "chainId", "type": "uint256" },
					{ "name": "verifyingContract", "type": "address" },
				],
				"Message": fields,
			},
			"primaryType": "Message",
			"domain": {
				"name": "AAAA Platform",
				"version": "1",
				"chainId": "0xa869",
				"verifyingContract": "0x52c84043cd9c865236f11d9fc9f56aa003c1f922",
			},
			"message": {
				"from": "0xc41cb13576ae51927435366dc2de8121d5d67266",
				"to": "0x5db9a7629912ebf95876228c24a848de0bfb43a9",
				"value": "0x0",
				"gas": "0x7b17",
				"nonce": "0x0",
				"data": "0xd09de08a",
				"validUntilTime": "0xffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffff",
				"ABCDEFGHIJKLMNOPQRSTGSN": format!("0x{}", hex::encode(b"bytes32 ABCDEFGHIJKLMNOPQRSTGSN)")),
			},
		});
		let reference: TypedData = serde_json::from_value(json).unwrap();
		assert_eq!(typed.digest().unwrap(), reference.eip712_signing_hash().unwrap());
	}

	#[test]
	fn test_digest_is_deterministic() {
		let typed = sample();
		assert_eq!(typed.digest().unwrap(), typed.clone().digest().unwrap());

		let mut other = typed.clone();
		other.request.nonce = U256::from(1);
		assert_ne!(typed.digest().unwrap(), other.digest().unwrap());
	}

	#[test]
	fn test_digest_rejects_foreign_suffix() {
		let typed = sample();
		let result = forward_request_digest(
			&typed.domain.hash(),
			&typed.request_type,
			&typed.request,
			&typed.request.data,
		);
		assert!(matches!(result, Err(EncodingError::SuffixLength { .. })));
	}
}
