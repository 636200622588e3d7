//! Gasless vault tokens.
//!
//! A vault takes custody of one underlying asset, an ERC-20 token or the
//! chain's native currency, and mints a 1:1 ERC-20 representation of it
//! that trusts the forwarder, so holders can move it without paying gas.
//! The vault registry deploys one vault per underlying token.

use alloy_primitives::{Address, U256};
use alloy_sol_types::{sol, SolInterface};
use gasless_chain::{ChainError, Revert, TokenError, IERC20};
use thiserror::Error;

pub mod registry;
pub mod vault;

pub use registry::VaultRegistry;
pub use vault::{Backing, GaslessVault};

sol! {
	#[derive(Debug, PartialEq, Eq)]
	interface IGaslessVault {
		event Deposit(address indexed account, uint256 amount);
		event Withdrawal(address indexed account, address indexed to, uint256 amount);

		function deposit(uint256 amount) external;
		function withdraw(address to, uint256 amount) external;
		function underlying() external view returns (address);
		function trustedForwarder() external view returns (address);
		function isTrustedForwarder(address forwarder) external view returns (bool);
	}

	#[derive(Debug, PartialEq, Eq)]
	interface INativeVault {
		function deposit() external payable;
	}

	#[derive(Debug, PartialEq, Eq)]
	interface IVaultRegistry {
		event VaultCreated(address indexed underlying, address indexed vault, string name, string symbol);
		event NativeVaultProxied(address indexed vault);

		error AlreadyRegistered(address underlying, address vault);
		error AlreadyProxied(address vault);
		error InvalidUnderlying(address underlying);
		error Unauthorized(address caller);
		error UnderlyingCallFailed(address underlying, bytes reason);

		function createVault(address underlying) external returns (address);
		function proxyNativeVault(address vault) external;
		function gaslessTokens(address underlying) external view returns (address);
		function nativeVault() external view returns (address);
		function forwarder() external view returns (address);
		function owner() external view returns (address);
	}
}

/// Errors raised by vaults and the vault registry.
#[derive(Debug, Error)]
pub enum VaultError {
	#[error("{underlying} already has vault {vault}")]
	AlreadyRegistered { underlying: Address, vault: Address },
	#[error("Native vault already proxied to {0}")]
	AlreadyProxied(Address),
	#[error("Insufficient balance: {account} has {balance}, needs {needed}")]
	InsufficientBalance {
		account: Address,
		balance: U256,
		needed: U256,
	},
	#[error("Insufficient allowance: {spender} may spend {allowance}, needs {needed}")]
	InsufficientAllowance {
		spender: Address,
		allowance: U256,
		needed: U256,
	},
	#[error("Invalid underlying asset {0}")]
	InvalidUnderlying(Address),
	#[error("{0} is not allowed to do this")]
	Unauthorized(Address),
	#[error("Call to underlying {underlying} failed: {reason}")]
	UnderlyingCallFailed { underlying: Address, reason: Revert },
	#[error(transparent)]
	Token(TokenError),
	#[error(transparent)]
	Chain(#[from] ChainError),
}

impl VaultError {
	/// Recovers a vault error from revert data returned by the chain.
	pub fn from_revert(revert: Revert) -> Self {
		use IVaultRegistry::IVaultRegistryErrors as R;
		use IERC20::IERC20Errors as T;

		if let Ok(err) = R::abi_decode(&revert.data, true) {
			return match err {
				R::AlreadyRegistered(e) => Self::AlreadyRegistered {
					underlying: e.underlying,
					vault: e.vault,
				},
				R::AlreadyProxied(e) => Self::AlreadyProxied(e.vault),
				R::InvalidUnderlying(e) => Self::InvalidUnderlying(e.underlying),
				R::Unauthorized(e) => Self::Unauthorized(e.caller),
				R::UnderlyingCallFailed(e) => Self::UnderlyingCallFailed {
					underlying: e.underlying,
					reason: Revert::new(e.reason),
				},
			};
		}
		match T::abi_decode(&revert.data, true) {
			Ok(T::ERC20InsufficientBalance(e)) => Self::InsufficientBalance {
				account: e.sender,
				balance: e.balance,
				needed: e.needed,
			},
			Ok(T::ERC20InsufficientAllowance(e)) => Self::InsufficientAllowance {
				spender: e.spender,
				allowance: e.allowance,
				needed: e.needed,
			},
			_ => Self::Chain(ChainError::Reverted(revert)),
		}
	}
}

impl From<TokenError> for VaultError {
	fn from(err: TokenError) -> Self {
		match err {
			TokenError::InsufficientBalance {
				sender,
				balance,
				needed,
			} => Self::InsufficientBalance {
				account: sender,
				balance,
				needed,
			},
			TokenError::InsufficientAllowance {
				spender,
				allowance,
				needed,
			} => Self::InsufficientAllowance {
				spender,
				allowance,
				needed,
			},
			TokenError::Reverted(revert) => Self::Chain(ChainError::Reverted(revert)),
			other => Self::Token(other),
		}
	}
}

impl From<Revert> for VaultError {
	fn from(revert: Revert) -> Self {
		Self::Chain(ChainError::Reverted(revert))
	}
}

impl From<VaultError> for Revert {
	fn from(err: VaultError) -> Self {
		use IVaultRegistry::*;

		match err {
			VaultError::AlreadyRegistered { underlying, vault } => {
				Revert::error(&AlreadyRegistered { underlying, vault })
			},
			VaultError::AlreadyProxied(vault) => Revert::error(&AlreadyProxied { vault }),
			VaultError::InsufficientBalance {
				account,
				balance,
				needed,
			} => Revert::from(TokenError::InsufficientBalance {
				sender: account,
				balance,
				needed,
			}),
			VaultError::InsufficientAllowance {
				spender,
				allowance,
				needed,
			} => Revert::from(TokenError::InsufficientAllowance {
				spender,
				allowance,
				needed,
			}),
			VaultError::InvalidUnderlying(underlying) => {
				Revert::error(&InvalidUnderlying { underlying })
			},
			VaultError::Unauthorized(caller) => Revert::error(&Unauthorized { caller }),
			VaultError::UnderlyingCallFailed { underlying, reason } => {
				Revert::error(&UnderlyingCallFailed {
					underlying,
					reason: reason.data,
				})
			},
			VaultError::Token(err) => err.into(),
			VaultError::Chain(ChainError::Reverted(revert)) => revert,
			VaultError::Chain(other) => Revert::message(other.to_string()),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use alloy_primitives::address;

	#[test]
	fn test_errors_survive_revert_data() {
		let underlying = address!("5FbDB2315678afecb367f032d93F642f64180aa3");
		let vault = address!("e7f1725E7734CE288F8367e1Bb143E90bb3F0512");
		let revert = Revert::from(VaultError::AlreadyRegistered { underlying, vault });
		assert!(matches!(
			VaultError::from_revert(revert),
			VaultError::AlreadyRegistered { vault: v, .. } if v == vault
		));

		let revert = Revert::from(VaultError::InsufficientBalance {
			account: underlying,
			balance: U256::from(1),
			needed: U256::from(2),
		});
		assert!(revert.is::<IERC20::ERC20InsufficientBalance>());
		assert!(matches!(
			VaultError::from_revert(revert),
			VaultError::InsufficientBalance { needed, .. } if needed == U256::from(2)
		));
	}

	#[test]
	fn test_token_errors_are_classified() {
		let err: VaultError = TokenError::InsufficientAllowance {
			spender: Address::ZERO,
			allowance: U256::ZERO,
			needed: U256::from(5),
		}
		.into();
		assert!(matches!(err, VaultError::InsufficientAllowance { .. }));

		let err: VaultError = TokenError::InvalidReceiver(Address::ZERO).into();
		assert!(Revert::from(err).is::<IERC20::ERC20InvalidReceiver>());
	}
}
