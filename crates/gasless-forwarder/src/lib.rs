//! Trusted forwarder for gasless meta-transactions.
//!
//! The forwarder keeps a registry of EIP-712 domains and request types, one
//! nonce per signer, and executes calls that a signer authorised off-chain.
//! Relayers pay for the transaction; the target contract sees the signer as
//! the sender through the ERC-2771 calldata suffix.

use alloy_primitives::{Address, B256, U256};
use alloy_sol_types::{sol, SolInterface};
use gasless_chain::{ChainError, Revert};
use gasless_types::EncodingError;
use thiserror::Error;

pub mod forwarder;
pub mod registry;

pub use forwarder::{Forwarder, RETURN_DATA_LOG_LIMIT};
pub use registry::TypeRegistry;

sol! {
	#[derive(Debug, PartialEq, Eq)]
	interface IForwarder {
		struct ForwardRequest {
			address from;
			address to;
			uint256 value;
			uint256 gas;
			uint256 nonce;
			bytes data;
			uint256 validUntilTime;
		}

		event DomainRegistered(bytes32 indexed domainSeparator, bytes domainValue);
		event RequestTypeRegistered(bytes32 indexed typeHash, string typeStr);
		event ExecutionResult(address indexed from, uint256 indexed nonce, bool success, bytes returnData);

		error UnregisteredDomain(bytes32 domainSeparator);
		error UnregisteredRequestType(bytes32 requestTypeHash);
		error RequestExpired(uint256 validUntilTime, uint256 blockTimestamp);
		error NonceMismatch(address from, uint256 expected, uint256 actual);
		error InvalidSignature(address from);
		error MalformedRequestType(string reason);
		error MalformedSuffixData(string reason);
		error InsufficientGas(uint256 requested, uint256 available);

		function getNonce(address from) external view returns (uint256);
		function registerDomainSeparator(string name, string version) external returns (bytes32);
		function registerRequestType(string typeName, string typeSuffix) external returns (bytes32);
		function isRegisteredDomain(bytes32 domainSeparator) external view returns (bool);
		function isRegisteredRequestType(bytes32 requestTypeHash) external view returns (bool);
		function verify(
			ForwardRequest req,
			bytes32 domainSeparator,
			bytes32 requestTypeHash,
			bytes suffixData,
			bytes sig
		) external view;
		function execute(
			ForwardRequest req,
			bytes32 domainSeparator,
			bytes32 requestTypeHash,
			bytes suffixData,
			bytes sig
		) external payable returns (bool success, bytes ret);
	}
}

impl From<gasless_types::ForwardRequest> for IForwarder::ForwardRequest {
	fn from(req: gasless_types::ForwardRequest) -> Self {
		Self {
			from: req.from,
			to: req.to,
			value: req.value,
			gas: req.gas,
			nonce: req.nonce,
			data: req.data,
			validUntilTime: req.valid_until_time,
		}
	}
}

impl From<IForwarder::ForwardRequest> for gasless_types::ForwardRequest {
	fn from(req: IForwarder::ForwardRequest) -> Self {
		Self {
			from: req.from,
			to: req.to,
			value: req.value,
			gas: req.gas,
			nonce: req.nonce,
			data: req.data,
			valid_until_time: req.validUntilTime,
		}
	}
}

/// Reasons the forwarder rejects a registration or a request.
#[derive(Debug, Error)]
pub enum ForwarderError {
	#[error("Unregistered domain {0}")]
	UnregisteredDomain(B256),
	#[error("Unregistered request type {0}")]
	UnregisteredRequestType(B256),
	#[error("Request expired at {valid_until_time}, block time is {block_timestamp}")]
	RequestExpired {
		valid_until_time: U256,
		block_timestamp: U256,
	},
	#[error("Nonce mismatch for {from}: expected {expected}, got {actual}")]
	NonceMismatch {
		from: Address,
		expected: U256,
		actual: U256,
	},
	#[error("Signature does not match {0}")]
	InvalidSignature(Address),
	#[error("Malformed request type: {0}")]
	MalformedRequestType(String),
	#[error("Malformed suffix data: {0}")]
	MalformedSuffixData(String),
	#[error("Insufficient gas: request needs {requested}, {available} available")]
	InsufficientGas { requested: U256, available: U256 },
	#[error(transparent)]
	Chain(#[from] ChainError),
}

impl ForwarderError {
	/// Recovers a forwarder error from revert data returned by the chain.
	pub fn from_revert(revert: Revert) -> Self {
		use IForwarder::IForwarderErrors as E;

		match E::abi_decode(&revert.data, true) {
			Ok(E::UnregisteredDomain(e)) => Self::UnregisteredDomain(e.domainSeparator),
			Ok(E::UnregisteredRequestType(e)) => Self::UnregisteredRequestType(e.requestTypeHash),
			Ok(E::RequestExpired(e)) => Self::RequestExpired {
				valid_until_time: e.validUntilTime,
				block_timestamp: e.blockTimestamp,
			},
			Ok(E::NonceMismatch(e)) => Self::NonceMismatch {
				from: e.from,
				expected: e.expected,
				actual: e.actual,
			},
			Ok(E::InvalidSignature(e)) => Self::InvalidSignature(e.from),
			Ok(E::MalformedRequestType(e)) => Self::MalformedRequestType(e.reason),
			Ok(E::MalformedSuffixData(e)) => Self::MalformedSuffixData(e.reason),
			Ok(E::InsufficientGas(e)) => Self::InsufficientGas {
				requested: e.requested,
				available: e.available,
			},
			Err(_) => Self::Chain(ChainError::Reverted(revert)),
		}
	}
}

impl From<Revert> for ForwarderError {
	fn from(revert: Revert) -> Self {
		Self::Chain(ChainError::Reverted(revert))
	}
}

impl From<EncodingError> for ForwarderError {
	fn from(err: EncodingError) -> Self {
		match err {
			EncodingError::MalformedRequestType(reason) => Self::MalformedRequestType(reason),
			other => Self::MalformedSuffixData(other.to_string()),
		}
	}
}

impl From<ForwarderError> for Revert {
	fn from(err: ForwarderError) -> Self {
		use IForwarder::*;

		match err {
			ForwarderError::UnregisteredDomain(hash) => Revert::error(&UnregisteredDomain {
				domainSeparator: hash,
			}),
			ForwarderError::UnregisteredRequestType(hash) => {
				Revert::error(&UnregisteredRequestType {
					requestTypeHash: hash,
				})
			},
			ForwarderError::RequestExpired {
				valid_until_time,
				block_timestamp,
			} => Revert::error(&RequestExpired {
				validUntilTime: valid_until_time,
				blockTimestamp: block_timestamp,
			}),
			ForwarderError::NonceMismatch {
				from,
				expected,
				actual,
			} => Revert::error(&NonceMismatch {
				from,
				expected,
				actual,
			}),
			ForwarderError::InvalidSignature(from) => Revert::error(&InvalidSignature { from }),
			ForwarderError::MalformedRequestType(reason) => {
				Revert::error(&MalformedRequestType { reason })
			},
			ForwarderError::MalformedSuffixData(reason) => {
				Revert::error(&MalformedSuffixData { reason })
			},
			ForwarderError::InsufficientGas {
				requested,
				available,
			} => Revert::error(&InsufficientGas {
				requested,
				available,
			}),
			ForwarderError::Chain(ChainError::Reverted(revert)) => revert,
			ForwarderError::Chain(other) => Revert::message(other.to_string()),
		}
	}
}
