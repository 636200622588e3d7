//! Forward request model.
//!
//! A forward request is the message a signer authorises off-chain. Its EIP-712
//! schema is fixed: the seven generic parameters below, followed by the
//! trailing suffix fields declared by a registered request type.

use crate::{eip712, EncodingError};
use alloy_primitives::{keccak256, Address, Bytes, B256, U256};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Generic parameters shared by every request type, in signing order.
pub const GENERIC_PARAMS: &str = "address from,address to,uint256 value,uint256 gas,uint256 nonce,bytes data,uint256 validUntilTime";

/// `(name, type)` pairs of [`GENERIC_PARAMS`], in signing order.
pub const GENERIC_FIELDS: [(&str, &str); 7] = [
	("from", "address"),
	("to", "address"),
	("value", "uint256"),
	("gas", "uint256"),
	("nonce", "uint256"),
	("data", "bytes"),
	("validUntilTime", "uint256"),
];

/// A call authorised by `from` and executed by the forwarder on its behalf.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ForwardRequest {
	pub from: Address,
	pub to: Address,
	pub value: U256,
	pub gas: U256,
	pub nonce: U256,
	pub data: Bytes,
	/// Unix timestamp after which the request is void; zero means no expiry.
	pub valid_until_time: U256,
}

impl ForwardRequest {
	/// Returns true when the request can no longer be executed at `timestamp`.
	pub fn is_expired_at(&self, timestamp: u64) -> bool {
		!self.valid_until_time.is_zero() && self.valid_until_time < U256::from(timestamp)
	}
}

/// EIP-712 domain `(name, version, chainId, verifyingContract)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainDescriptor {
	pub name: String,
	pub version: String,
	pub chain_id: U256,
	pub verifying_contract: Address,
}

impl DomainDescriptor {
	pub fn new(
		name: impl Into<String>,
		version: impl Into<String>,
		chain_id: u64,
		verifying_contract: Address,
	) -> Self {
		Self {
			name: name.into(),
			version: version.into(),
			chain_id: U256::from(chain_id),
			verifying_contract,
		}
	}

	/// The ABI encoded domain value whose hash is the domain separator.
	pub fn encode(&self) -> Bytes {
		eip712::compute_domain_value(
			&self.name,
			&self.version,
			self.chain_id,
			&self.verifying_contract,
		)
		.into()
	}

	/// The domain separator.
	pub fn hash(&self) -> B256 {
		keccak256(self.encode())
	}
}

/// Solidity types a suffix field may declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuffixType {
	Address,
	Bool,
	/// `uintN`, with `N` in bits.
	Uint(u16),
	/// `bytesN`, with `N` in bytes.
	FixedBytes(u8),
	Bytes,
	String,
}

impl SuffixType {
	/// True for types whose value is hashed before inclusion.
	pub fn is_dynamic(&self) -> bool {
		matches!(self, SuffixType::Bytes | SuffixType::String)
	}

	/// Encodes a raw field value into its 32-byte EIP-712 word.
	pub fn encode_value(&self, raw: &[u8]) -> Result<B256, String> {
		let mut word = [0u8; 32];
		match self {
			SuffixType::Address => {
				if raw.len() != 20 {
					return Err(format!("expected 20 bytes, got {}", raw.len()));
				}
				word[12..].copy_from_slice(raw);
			},
			SuffixType::Bool => match raw {
				[0] | [1] => word[31] = raw[0],
				_ => return Err("expected a single 0x00 or 0x01 byte".to_string()),
			},
			SuffixType::Uint(_) => {
				if raw.len() > 32 {
					return Err(format!("{} bytes exceed a 32-byte word", raw.len()));
				}
				word[32 - raw.len()..].copy_from_slice(raw);
				self.check_word(&B256::from(word))?;
			},
			SuffixType::FixedBytes(n) => {
				if raw.len() != *n as usize {
					return Err(format!("expected {} bytes, got {}", n, raw.len()));
				}
				word[..raw.len()].copy_from_slice(raw);
			},
			SuffixType::Bytes => return Ok(keccak256(raw)),
			SuffixType::String => {
				std::str::from_utf8(raw).map_err(|e| format!("invalid utf-8: {}", e))?;
				return Ok(keccak256(raw));
			},
		}
		Ok(B256::from(word))
	}

	/// Checks that an already encoded word is a valid encoding for this type.
	pub fn check_word(&self, word: &B256) -> Result<(), String> {
		match self {
			SuffixType::Address if word[..12].iter().any(|b| *b != 0) => {
				Err("address word has dirty high bytes".to_string())
			},
			SuffixType::Bool if U256::from_be_bytes(word.0) > U256::from(1u8) => {
				Err("bool word must be 0 or 1".to_string())
			},
			SuffixType::Uint(bits)
				if *bits < 256 && !(U256::from_be_bytes(word.0) >> (*bits as usize)).is_zero() =>
			{
				Err(format!("value does not fit in uint{}", bits))
			},
			SuffixType::FixedBytes(n) if word[*n as usize..].iter().any(|b| *b != 0) => {
				Err(format!("bytes{} word has dirty low bytes", n))
			},
			_ => Ok(()),
		}
	}
}

impl fmt::Display for SuffixType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			SuffixType::Address => write!(f, "address"),
			SuffixType::Bool => write!(f, "bool"),
			SuffixType::Uint(bits) => write!(f, "uint{}", bits),
			SuffixType::FixedBytes(n) => write!(f, "bytes{}", n),
			SuffixType::Bytes => write!(f, "bytes"),
			SuffixType::String => write!(f, "string"),
		}
	}
}

impl FromStr for SuffixType {
	type Err = EncodingError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let unsupported = || EncodingError::MalformedRequestType(format!("unsupported type '{}'", s));
		match s {
			"address" => return Ok(SuffixType::Address),
			"bool" => return Ok(SuffixType::Bool),
			"bytes" => return Ok(SuffixType::Bytes),
			"string" => return Ok(SuffixType::String),
			_ => {},
		}
		if let Some(bits) = s.strip_prefix("uint") {
			let bits: u16 = bits.parse().map_err(|_| unsupported())?;
			if bits == 0 || bits > 256 || bits % 8 != 0 {
				return Err(unsupported());
			}
			return Ok(SuffixType::Uint(bits));
		}
		if let Some(len) = s.strip_prefix("bytes") {
			let len: u8 = len.parse().map_err(|_| unsupported())?;
			if len == 0 || len > 32 {
				return Err(unsupported());
			}
			return Ok(SuffixType::FixedBytes(len));
		}
		Err(unsupported())
	}
}

/// One trailing field declared by a request-type suffix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuffixField {
	pub ty: SuffixType,
	pub name: String,
}

/// A request type `name(GENERIC_PARAMS,suffix`, e.g. `suffix = "bytes8 tag)"`.
///
/// Construction parses and validates the suffix, so a descriptor that exists
/// is always well-formed and its hash is never computed over a garbage type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestTypeDescriptor {
	name: String,
	suffix: String,
	fields: Vec<SuffixField>,
}

impl RequestTypeDescriptor {
	pub fn new(name: impl Into<String>, suffix: impl Into<String>) -> Result<Self, EncodingError> {
		let name = name.into();
		let suffix = suffix.into();
		let malformed = |reason: String| Err(EncodingError::MalformedRequestType(reason));

		if name.is_empty() {
			return malformed("request type name is empty".into());
		}
		if name.contains(['(', ')']) {
			return malformed(format!("request type name '{}' contains a parenthesis", name));
		}
		if suffix.is_empty() {
			return malformed("suffix is empty".into());
		}
		let Some(body) = suffix.strip_suffix(')') else {
			return malformed(format!("suffix '{}' is missing its closing parenthesis", suffix));
		};
		if body.contains(['(', ')']) {
			return malformed(format!("suffix '{}' has unbalanced parentheses", suffix));
		}
		if body.is_empty() {
			return malformed("suffix declares no fields".into());
		}

		let mut fields: Vec<SuffixField> = Vec::new();
		for declaration in body.split(',') {
			let Some((ty, field_name)) = declaration.split_once(' ') else {
				return malformed(format!("field '{}' is not '<type> <name>'", declaration));
			};
			if !is_identifier(field_name) {
				return malformed(format!("field name '{}' is not an identifier", field_name));
			}
			if GENERIC_FIELDS.iter().any(|(generic, _)| *generic == field_name)
				|| fields.iter().any(|f| f.name == field_name)
			{
				return malformed(format!("field name '{}' is declared twice", field_name));
			}
			fields.push(SuffixField {
				ty: ty.parse()?,
				name: field_name.to_string(),
			});
		}

		Ok(Self {
			name,
			suffix,
			fields,
		})
	}

	/// Rebuilds a descriptor from its EIP-712 `(name, type)` suffix fields.
	pub fn from_fields<'a>(
		name: impl Into<String>,
		fields: impl IntoIterator<Item = (&'a str, &'a str)>,
	) -> Result<Self, EncodingError> {
		let declarations: Vec<String> = fields
			.into_iter()
			.map(|(field_name, ty)| format!("{} {}", ty, field_name))
			.collect();
		Self::new(name, format!("{})", declarations.join(",")))
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	pub fn suffix(&self) -> &str {
		&self.suffix
	}

	pub fn suffix_fields(&self) -> &[SuffixField] {
		&self.fields
	}

	/// The full EIP-712 type string.
	pub fn type_string(&self) -> String {
		format!("{}({},{}", self.name, GENERIC_PARAMS, self.suffix)
	}

	pub fn type_hash(&self) -> B256 {
		keccak256(self.type_string().as_bytes())
	}

	/// `(name, type)` pairs for every field of the type, in signing order.
	pub fn eip712_fields(&self) -> Vec<(String, String)> {
		GENERIC_FIELDS
			.iter()
			.map(|(name, ty)| (name.to_string(), ty.to_string()))
			.chain(self.fields.iter().map(|f| (f.name.clone(), f.ty.to_string())))
			.collect()
	}

	/// Encodes raw suffix values into the suffix data accepted by the forwarder.
	pub fn encode_suffix(&self, values: &[Bytes]) -> Result<Bytes, EncodingError> {
		if values.len() != self.fields.len() {
			return Err(EncodingError::SuffixArity {
				expected: self.fields.len(),
				actual: values.len(),
			});
		}
		let mut out = Vec::with_capacity(32 * values.len());
		for (field, value) in self.fields.iter().zip(values) {
			let word = field.ty.encode_value(value).map_err(|reason| EncodingError::SuffixValue {
				field: field.name.clone(),
				ty: field.ty.to_string(),
				reason,
			})?;
			out.extend_from_slice(word.as_slice());
		}
		Ok(out.into())
	}

	/// Checks encoded suffix data against the declared fields.
	pub fn validate_suffix_data(&self, data: &[u8]) -> Result<(), EncodingError> {
		let expected = 32 * self.fields.len();
		if data.len() != expected {
			return Err(EncodingError::SuffixLength {
				expected,
				actual: data.len(),
			});
		}
		for (field, chunk) in self.fields.iter().zip(data.chunks_exact(32)) {
			field
				.ty
				.check_word(&B256::from_slice(chunk))
				.map_err(|reason| EncodingError::SuffixValue {
					field: field.name.clone(),
					ty: field.ty.to_string(),
					reason,
				})?;
		}
		Ok(())
	}
}

fn is_identifier(s: &str) -> bool {
	let mut chars = s.chars();
	matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
		&& chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// A forward request bound to its domain and request type, with raw suffix values.
///
/// This is the signer-side view of a message; [`TypedForwardRequest::digest`]
/// is byte-for-byte what the forwarder recomputes before recovering the signer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypedForwardRequest {
	pub domain: DomainDescriptor,
	pub request_type: RequestTypeDescriptor,
	pub request: ForwardRequest,
	pub suffix_values: Vec<Bytes>,
}

impl TypedForwardRequest {
	pub fn suffix_data(&self) -> Result<Bytes, EncodingError> {
		self.request_type.encode_suffix(&self.suffix_values)
	}

	pub fn digest(&self) -> Result<B256, EncodingError> {
		eip712::forward_request_digest(
			&self.domain.hash(),
			&self.request_type,
			&self.request,
			&self.suffix_data()?,
		)
	}
}
