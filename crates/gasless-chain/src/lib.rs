//! Deterministic execution environment for the gasless contracts.
//!
//! The chain hosts contracts as Rust objects behind [`ContractInterface`] and
//! gives them EVM-like semantics: Solidity ABI calldata, per-frame gas,
//! native value transfers, event logs and atomic rollback of every call
//! frame that reverts. A contract is detached from world state while it
//! executes, so a nested call back into it fails instead of observing a
//! half-updated state.

use alloy_primitives::{Address, Bytes, U256};
use alloy_sol_types::{sol, SolError, SolInterface};
use std::any::Any;
use std::fmt;
use thiserror::Error;

pub mod chain;
pub mod context;
pub mod erc20;
pub mod gas;
mod state;

pub mod implementations {
	pub mod counter;
	pub mod test_token;
}

pub use chain::{BlockEnv, Chain, Receipt};
pub use context::{CallContext, TrustedForwarderContext};
pub use erc20::{Erc20Ledger, Erc20Token, TokenError, IERC20};

sol! {
	/// The frame ran out of gas.
	error OutOfGas();
	/// A call targeted a contract that is already executing.
	error ReentrantCall(address target);
	/// The caller cannot cover the value attached to a call.
	error InsufficientNativeBalance(address account, uint256 balance, uint256 needed);
	error CallDepthExceeded();
	/// No function matches the calldata selector.
	error UnknownSelector(bytes4 selector);
}

/// Panic code of an arithmetic overflow or underflow.
pub const PANIC_ARITHMETIC: u64 = 0x11;

/// Revert data returned by a failed call frame.
///
/// The data is the ABI encoding of a Solidity custom error or of
/// `Error(string)`; it is carried untouched back to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Revert {
	pub data: Bytes,
}

impl Revert {
	pub fn new(data: impl Into<Bytes>) -> Self {
		Self { data: data.into() }
	}

	/// Reverts with a Solidity custom error.
	pub fn error<E: SolError>(error: &E) -> Self {
		Self::new(error.abi_encode())
	}

	/// Reverts with `Error(string)`.
	pub fn message(reason: impl Into<String>) -> Self {
		Self::error(&alloy_sol_types::Revert {
			reason: reason.into(),
		})
	}

	/// Reverts with `Panic(0x11)`, as checked arithmetic does on overflow.
	pub fn overflow() -> Self {
		Self::error(&alloy_sol_types::Panic {
			code: U256::from(PANIC_ARITHMETIC),
		})
	}

	/// Decodes the revert data as the custom error `E`.
	pub fn decode<E: SolError>(&self) -> Option<E> {
		E::abi_decode(&self.data, true).ok()
	}

	/// True when the data carries the selector of `E`.
	pub fn is<E: SolError>(&self) -> bool {
		self.data.len() >= 4 && self.data[..4] == E::SELECTOR
	}

	/// The `Error(string)` reason, if that is what the data encodes.
	pub fn reason(&self) -> Option<String> {
		self.decode::<alloy_sol_types::Revert>().map(|r| r.reason)
	}
}

impl fmt::Display for Revert {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self.reason() {
			Some(reason) => write!(f, "execution reverted: {}", reason),
			None if self.data.is_empty() => write!(f, "execution reverted"),
			None => write!(f, "execution reverted: 0x{}", hex::encode(&self.data)),
		}
	}
}

impl std::error::Error for Revert {}

/// Errors raised by the chain outside of contract execution.
#[derive(Debug, Error)]
pub enum ChainError {
	#[error(transparent)]
	Reverted(#[from] Revert),
	#[error("No contract deployed at {0}")]
	NoContract(Address),
	#[error("Contract at {address} is a {actual}")]
	ContractTypeMismatch {
		address: Address,
		actual: &'static str,
	},
	#[error("Contract at {0} is executing")]
	Busy(Address),
}

impl ChainError {
	/// The revert data, when the failure happened inside a contract.
	pub fn revert(&self) -> Option<&Revert> {
		match self {
			ChainError::Reverted(revert) => Some(revert),
			_ => None,
		}
	}
}

/// A contract hosted by the chain.
///
/// `call` receives Solidity ABI calldata and returns ABI encoded return data
/// or revert data. Everything the contract changed in world state during a
/// reverted call is rolled back by the chain; changes to `self` are dropped.
pub trait ContractInterface: ContractObject + Send + Sync + 'static {
	/// Short type name, used in logs and type-mismatch errors.
	fn kind(&self) -> &'static str;

	fn call(&mut self, ctx: &mut CallContext<'_>, input: &[u8]) -> Result<Bytes, Revert>;
}

/// Object-safe cloning and downcasting, implemented for every `Clone` contract.
pub trait ContractObject {
	fn box_clone(&self) -> Box<dyn ContractInterface>;
	fn as_any(&self) -> &dyn Any;
	fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: ContractInterface + Clone> ContractObject for T {
	fn box_clone(&self) -> Box<dyn ContractInterface> {
		Box::new(self.clone())
	}

	fn as_any(&self) -> &dyn Any {
		self
	}

	fn as_any_mut(&mut self) -> &mut dyn Any {
		self
	}
}

impl Clone for Box<dyn ContractInterface> {
	fn clone(&self) -> Self {
		self.box_clone()
	}
}

/// Decodes calldata addressed to interface `I`.
///
/// Returns `Ok(None)` when the selector belongs to none of its functions and
/// a revert when it does but the arguments are malformed.
pub fn decode_call<I: SolInterface>(input: &[u8]) -> Result<Option<I>, Revert> {
	let Some(selector) = input.get(..4) else {
		return Ok(None);
	};
	let mut word = [0u8; 4];
	word.copy_from_slice(selector);
	if !I::valid_selector(word) {
		return Ok(None);
	}
	I::abi_decode(input, true)
		.map(Some)
		.map_err(|e| Revert::message(format!("malformed calldata: {}", e)))
}

/// Reverts with [`UnknownSelector`] for calldata no function matches.
pub fn unknown_selector(input: &[u8]) -> Revert {
	let mut selector = [0u8; 4];
	let len = input.len().min(4);
	selector[..len].copy_from_slice(&input[..len]);
	Revert::error(&UnknownSelector {
		selector: selector.into(),
	})
}

#[cfg(test)]
mod tests {
	use super::*;
	use alloy_primitives::U256;

	#[test]
	fn test_revert_display() {
		assert_eq!(
			Revert::message("ERC20: nope").to_string(),
			"execution reverted: ERC20: nope"
		);
		assert_eq!(Revert::new(Bytes::new()).to_string(), "execution reverted");

		let custom = Revert::error(&InsufficientNativeBalance {
			account: Address::ZERO,
			balance: U256::ZERO,
			needed: U256::from(1),
		});
		assert!(custom.is::<InsufficientNativeBalance>());
		assert!(!custom.is::<OutOfGas>());
		assert_eq!(custom.decode::<InsufficientNativeBalance>().unwrap().needed, U256::from(1));
		assert!(custom.to_string().starts_with("execution reverted: 0x"));
	}

	#[test]
	fn test_unknown_selector_pads_short_input() {
		let revert = unknown_selector(&[0xab]);
		let decoded = revert.decode::<UnknownSelector>().unwrap();
		assert_eq!(decoded.selector.as_slice(), &[0xab, 0, 0, 0]);
	}
}
