//! Common types module for the gasless relay system.
//!
//! This module defines the data model shared by every other crate: the
//! forward-request schema, the EIP-712 typed-data encoder that turns it into
//! a signable digest, and the relay envelope a signer hands to a relayer.

use thiserror::Error;

/// EIP-712 encoding of domains and forward requests.
pub mod eip712;
/// Relay envelope produced by signers and consumed by relayers.
pub mod envelope;
/// Forward request, domain and request-type descriptors.
pub mod forward;
/// Registry trait for pluggable implementations.
pub mod registry;
/// Private keys loaded from configuration.
pub mod secret_key;
/// Configuration validation types for ensuring type-safe configurations.
pub mod validation;

pub use alloy_primitives::{keccak256, Address, Bytes, B256, U256};
pub use eip712::{
	compute_final_digest, forward_request_digest, hash_forward_request, Eip712AbiEncoder,
	DOMAIN_FIELDS, DOMAIN_TYPE,
};
pub use envelope::{
	DecodedEnvelope, JsonRpcRequest, RelayEnvelope, RelayMetadata, TypedDataPayload, TypedField,
};
pub use forward::{
	DomainDescriptor, ForwardRequest, RequestTypeDescriptor, SuffixField, SuffixType,
	TypedForwardRequest, GENERIC_FIELDS, GENERIC_PARAMS,
};
pub use registry::ImplementationRegistry;
pub use secret_key::SecretKey;
pub use validation::*;

/// Errors raised while building or checking typed data.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EncodingError {
	/// The request-type name or suffix failed structural validation.
	#[error("Malformed request type: {0}")]
	MalformedRequestType(String),
	/// The number of suffix values differs from the declared suffix fields.
	#[error("Expected {expected} suffix value(s), got {actual}")]
	SuffixArity { expected: usize, actual: usize },
	/// The encoded suffix data does not have one word per declared field.
	#[error("Suffix data must be {expected} bytes, got {actual}")]
	SuffixLength { expected: usize, actual: usize },
	/// A suffix value cannot be represented by its declared type.
	#[error("Suffix field '{field}' of type {ty}: {reason}")]
	SuffixValue {
		field: String,
		ty: String,
		reason: String,
	},
	/// The relay envelope is structurally invalid.
	#[error("Invalid envelope: {0}")]
	Envelope(String),
}
