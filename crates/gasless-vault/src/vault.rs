//! Vault contract: custody of one underlying asset behind a 1:1 ERC-20.

use crate::{IGaslessVault, INativeVault, VaultError};
use alloy_primitives::{Address, Bytes, U256};
use alloy_sol_types::SolCall;
use gasless_chain::{
	decode_call, unknown_selector, CallContext, ContractInterface, Erc20Token, Revert,
	TrustedForwarderContext, IERC20,
};

/// What a vault holds in custody.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backing {
	/// An ERC-20 token at this address.
	Erc20(Address),
	/// The chain's native currency.
	Native,
}

/// ERC-20 vault token pegged 1:1 to its underlying asset.
///
/// `total_supply` always equals the amount of underlying held: deposits mint
/// exactly what they pull in and withdrawals burn exactly what they release.
/// Calls from the trusted forwarder act on behalf of the signer appended to
/// the calldata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GaslessVault {
	backing: Backing,
	forwarder: Address,
	token: Erc20Token,
}

impl GaslessVault {
	pub fn erc20(
		underlying: Address,
		forwarder: Address,
		name: impl Into<String>,
		symbol: impl Into<String>,
		decimals: u8,
	) -> Self {
		Self {
			backing: Backing::Erc20(underlying),
			forwarder,
			token: Erc20Token::new(name, symbol, decimals),
		}
	}

	pub fn native(forwarder: Address, name: impl Into<String>, symbol: impl Into<String>) -> Self {
		Self {
			backing: Backing::Native,
			forwarder,
			token: Erc20Token::new(name, symbol, 18),
		}
	}

	pub fn backing(&self) -> Backing {
		self.backing
	}

	/// The underlying token, or the zero address for the native vault.
	pub fn underlying(&self) -> Address {
		match self.backing {
			Backing::Erc20(underlying) => underlying,
			Backing::Native => Address::ZERO,
		}
	}

	pub fn token(&self) -> &Erc20Token {
		&self.token
	}

	pub fn total_supply(&self) -> U256 {
		self.token.ledger.total_supply()
	}

	pub fn balance_of(&self, account: &Address) -> U256 {
		self.token.ledger.balance_of(account)
	}

	/// Pulls `amount` of the underlying token from `sender` and mints the
	/// same amount to it. `sender` must have approved the vault.
	pub fn deposit(
		&mut self,
		ctx: &mut CallContext<'_>,
		sender: Address,
		amount: U256,
	) -> Result<(), VaultError> {
		let Backing::Erc20(underlying) = self.backing else {
			return Err(VaultError::InvalidUnderlying(Address::ZERO));
		};

		self.token.ledger.mint(ctx, sender, amount)?;
		let pulled = ctx.call_sol(
			underlying,
			U256::ZERO,
			&IERC20::transferFromCall {
				from: sender,
				to: ctx.this(),
				value: amount,
			},
		)?;
		if !pulled._0 {
			return Err(VaultError::UnderlyingCallFailed {
				underlying,
				reason: Revert::message("transferFrom returned false"),
			});
		}

		ctx.emit(&IGaslessVault::Deposit {
			account: sender,
			amount,
		})?;
		tracing::debug!(component = "vault", vault = %ctx.this(), account = %sender, amount = %amount, "deposit");
		Ok(())
	}

	/// Mints the native currency attached to the call to `sender`.
	pub fn deposit_native(
		&mut self,
		ctx: &mut CallContext<'_>,
		sender: Address,
	) -> Result<(), VaultError> {
		if self.backing != Backing::Native {
			return Err(VaultError::InvalidUnderlying(self.underlying()));
		}
		let amount = ctx.msg_value();
		self.token.ledger.mint(ctx, sender, amount)?;
		ctx.emit(&IGaslessVault::Deposit {
			account: sender,
			amount,
		})?;
		tracing::debug!(component = "vault", vault = %ctx.this(), account = %sender, amount = %amount, "native deposit");
		Ok(())
	}

	/// Burns `amount` from `sender` and releases the same amount of the
	/// underlying asset to `to`.
	pub fn withdraw(
		&mut self,
		ctx: &mut CallContext<'_>,
		sender: Address,
		to: Address,
		amount: U256,
	) -> Result<(), VaultError> {
		self.token.ledger.burn(ctx, sender, amount)?;
		match self.backing {
			Backing::Erc20(underlying) => {
				let sent = ctx.call_sol(
					underlying,
					U256::ZERO,
					&IERC20::transferCall { to, value: amount },
				)?;
				if !sent._0 {
					return Err(VaultError::UnderlyingCallFailed {
						underlying,
						reason: Revert::message("transfer returned false"),
					});
				}
			},
			Backing::Native => ctx.transfer_native(to, amount)?,
		}

		ctx.emit(&IGaslessVault::Withdrawal {
			account: sender,
			to,
			amount,
		})?;
		tracing::debug!(component = "vault", vault = %ctx.this(), account = %sender, to = %to, amount = %amount, "withdrawal");
		Ok(())
	}

	fn dispatch(
		&mut self,
		ctx: &mut CallContext<'_>,
		sender: Address,
		data: &[u8],
	) -> Result<Bytes, VaultError> {
		use IGaslessVault::IGaslessVaultCalls as Calls;

		// A plain value transfer into the native vault is a deposit.
		if data.is_empty() && self.backing == Backing::Native {
			self.deposit_native(ctx, sender)?;
			return Ok(Bytes::new());
		}
		if let Some(INativeVault::INativeVaultCalls::deposit(_)) =
			decode_call::<INativeVault::INativeVaultCalls>(data)?
		{
			self.deposit_native(ctx, sender)?;
			return Ok(Bytes::new());
		}

		if !ctx.msg_value().is_zero() {
			return Err(Revert::message("function is not payable").into());
		}
		if let Some(call) = decode_call::<IERC20::IERC20Calls>(data)? {
			return Ok(self.token.handle(ctx, sender, call)?);
		}
		let Some(call) = decode_call::<Calls>(data)? else {
			return Err(unknown_selector(data).into());
		};
		let output = match call {
			Calls::deposit(c) => {
				self.deposit(ctx, sender, c.amount)?;
				Vec::new()
			},
			Calls::withdraw(c) => {
				self.withdraw(ctx, sender, c.to, c.amount)?;
				Vec::new()
			},
			Calls::underlying(_) => {
				IGaslessVault::underlyingCall::abi_encode_returns(&(self.underlying(),))
			},
			Calls::trustedForwarder(_) => {
				IGaslessVault::trustedForwarderCall::abi_encode_returns(&(self.forwarder,))
			},
			Calls::isTrustedForwarder(c) => {
				IGaslessVault::isTrustedForwarderCall::abi_encode_returns(&(self
					.is_trusted_forwarder(c.forwarder),))
			},
		};
		Ok(output.into())
	}
}

impl TrustedForwarderContext for GaslessVault {
	fn trusted_forwarder(&self) -> Address {
		self.forwarder
	}
}

impl ContractInterface for GaslessVault {
	fn kind(&self) -> &'static str {
		"GaslessVault"
	}

	fn call(&mut self, ctx: &mut CallContext<'_>, input: &[u8]) -> Result<Bytes, Revert> {
		let sender = self.msg_sender(ctx);
		let data = self.msg_data(ctx, input);
		Ok(self.dispatch(ctx, sender, data)?)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use gasless_chain::implementations::test_token::{ITestERC20, TestErc20};
	use gasless_chain::{Chain, ChainError};
	use alloy_primitives::address;
	use alloy_sol_types::SolEvent;

	const DEPLOYER: Address = address!("90F79bf6EB2c4f870365E785982E1f101E93b906");
	const FORWARDER: Address = address!("f000000000000000000000000000000000000001");
	const ACCOUNT1: Address = address!("70997970C51812dc3A010C7d01b50e0d17dc79C8");
	const ACCOUNT2: Address = address!("3C44CdDdB6a900fa2b585dd299e03d12FA4293BC");

	struct Setup {
		chain: Chain,
		token: Address,
		vault: Address,
	}

	fn setup() -> Setup {
		let mut chain = Chain::new(1337, 1_700_000_000, 30_000_000);
		let token = chain.deploy(DEPLOYER, Box::new(TestErc20::new()));
		let vault = chain.deploy(
			DEPLOYER,
			Box::new(GaslessVault::erc20(token, FORWARDER, "Gasless TestERC20", "gTEST", 18)),
		);
		for account in [ACCOUNT1, ACCOUNT2] {
			send(&mut chain, account, token, ITestERC20::mintCall {
				to: account,
				amount: U256::from(10_000),
			})
			.unwrap();
			send(&mut chain, account, token, IERC20::approveCall {
				spender: vault,
				value: U256::MAX,
			})
			.unwrap();
		}
		Setup { chain, token, vault }
	}

	fn send<C: SolCall>(chain: &mut Chain, from: Address, to: Address, call: C) -> Result<(), VaultError> {
		chain
			.transact(from, to, U256::ZERO, call.abi_encode())
			.map(|_| ())
			.map_err(|e| match e {
				ChainError::Reverted(revert) => VaultError::from_revert(revert),
				other => other.into(),
			})
	}

	impl Setup {
		fn underlying_balance(&self, account: &Address) -> U256 {
			self.chain.view(self.token, |t: &TestErc20| t.balance_of(account)).unwrap()
		}

		fn vault_state(&self) -> GaslessVault {
			self.chain.view(self.vault, |v: &GaslessVault| v.clone()).unwrap()
		}

		fn assert_pegged(&self) {
			assert_eq!(self.vault_state().total_supply(), self.underlying_balance(&self.vault));
		}
	}

	#[test]
	fn test_deposit_and_withdraw_round_trip() {
		let mut s = setup();
		send(&mut s.chain, ACCOUNT1, s.vault, IGaslessVault::depositCall {
			amount: U256::from(1_000),
		})
		.unwrap();

		assert_eq!(s.underlying_balance(&s.vault), U256::from(1_000));
		assert_eq!(s.vault_state().balance_of(&ACCOUNT1), U256::from(1_000));
		assert_eq!(s.vault_state().total_supply(), U256::from(1_000));

		send(&mut s.chain, ACCOUNT1, s.vault, IGaslessVault::withdrawCall {
			to: ACCOUNT1,
			amount: U256::from(1_000),
		})
		.unwrap();
		assert_eq!(s.underlying_balance(&s.vault), U256::ZERO);
		assert_eq!(s.vault_state().balance_of(&ACCOUNT1), U256::ZERO);
		assert_eq!(s.underlying_balance(&ACCOUNT1), U256::from(10_000));
	}

	#[test]
	fn test_deposit_emits_transfer_and_deposit_events() {
		let mut s = setup();
		let receipt = s
			.chain
			.transact(
				ACCOUNT1,
				s.vault,
				U256::ZERO,
				IGaslessVault::depositCall {
					amount: U256::from(5),
				}
				.abi_encode(),
			)
			.unwrap();
		let deposit = receipt
			.logs
			.iter()
			.filter(|log| log.address == s.vault)
			.find_map(|log| IGaslessVault::Deposit::decode_log_data(&log.data, true).ok())
			.unwrap();
		assert_eq!((deposit.account, deposit.amount), (ACCOUNT1, U256::from(5)));
	}

	#[test]
	fn test_withdraw_more_than_balance_fails() {
		let mut s = setup();
		send(&mut s.chain, ACCOUNT1, s.vault, IGaslessVault::depositCall {
			amount: U256::from(100),
		})
		.unwrap();
		let err = send(&mut s.chain, ACCOUNT1, s.vault, IGaslessVault::withdrawCall {
			to: ACCOUNT1,
			amount: U256::from(101),
		})
		.unwrap_err();
		assert!(matches!(
			err,
			VaultError::InsufficientBalance { account, balance, .. }
				if account == ACCOUNT1 && balance == U256::from(100)
		));
		s.assert_pegged();
	}

	#[test]
	fn test_deposit_without_allowance_leaves_no_trace() {
		let mut s = setup();
		let stranger = address!("a0Ee7A142d267C1f36714E4a8F75612F20a79720");
		send(&mut s.chain, stranger, s.token, ITestERC20::mintCall {
			to: stranger,
			amount: U256::from(50),
		})
		.unwrap();

		let err = send(&mut s.chain, stranger, s.vault, IGaslessVault::depositCall {
			amount: U256::from(50),
		})
		.unwrap_err();
		assert!(matches!(err, VaultError::InsufficientAllowance { .. }));
		assert_eq!(s.vault_state().balance_of(&stranger), U256::ZERO);
		s.assert_pegged();
	}

	#[test]
	fn test_supply_tracks_custody_across_operations() {
		let mut s = setup();
		let steps: [(Address, &str, u64); 8] = [
			(ACCOUNT1, "deposit", 700),
			(ACCOUNT2, "deposit", 300),
			(ACCOUNT1, "transfer", 250),
			(ACCOUNT2, "withdraw", 400),
			(ACCOUNT1, "withdraw", 450),
			(ACCOUNT2, "deposit", 1),
			(ACCOUNT2, "withdraw", 1_000),
			(ACCOUNT2, "withdraw", 151),
		];
		for (account, op, amount) in steps {
			let amount = U256::from(amount);
			let other = if account == ACCOUNT1 { ACCOUNT2 } else { ACCOUNT1 };
			let result = match op {
				"deposit" => send(&mut s.chain, account, s.vault, IGaslessVault::depositCall { amount }),
				"withdraw" => send(&mut s.chain, account, s.vault, IGaslessVault::withdrawCall {
					to: account,
					amount,
				}),
				_ => send(&mut s.chain, account, s.vault, IERC20::transferCall {
					to: other,
					value: amount,
				}),
			};
			// Only the oversized withdrawal is expected to fail.
			assert_eq!(result.is_err(), amount == U256::from(1_000), "{op} {amount}");
			s.assert_pegged();
		}
		assert_eq!(s.vault_state().total_supply(), U256::ZERO);
		assert_eq!(s.underlying_balance(&ACCOUNT1), U256::from(10_000 - 250));
		assert_eq!(s.underlying_balance(&ACCOUNT2), U256::from(10_000 + 250));
	}

	#[test]
	fn test_forwarded_transfer_moves_signer_funds() {
		let mut s = setup();
		send(&mut s.chain, ACCOUNT1, s.vault, IGaslessVault::depositCall {
			amount: U256::from(1_000),
		})
		.unwrap();

		let mut data = IERC20::transferCall {
			to: ACCOUNT2,
			value: U256::from(600),
		}
		.abi_encode();
		data.extend_from_slice(ACCOUNT1.as_slice());
		s.chain.transact(FORWARDER, s.vault, U256::ZERO, data.clone()).unwrap();

		let vault = s.vault_state();
		assert_eq!(vault.balance_of(&ACCOUNT1), U256::from(400));
		assert_eq!(vault.balance_of(&ACCOUNT2), U256::from(600));

		// The same bytes from anyone else do not speak for ACCOUNT1.
		let _ = s.chain.transact(ACCOUNT2, s.vault, U256::ZERO, data);
		assert_eq!(s.vault_state().balance_of(&ACCOUNT1), U256::from(400));
	}

	#[test]
	fn test_native_vault_deposits_and_withdraws_value() {
		let mut chain = Chain::new(1337, 0, 30_000_000);
		let vault = chain.deploy(DEPLOYER, Box::new(GaslessVault::native(FORWARDER, "Gasless AVAX", "gAVAX")));
		chain.set_balance(ACCOUNT1, U256::from(1_000));

		chain
			.transact(ACCOUNT1, vault, U256::from(300), INativeVault::depositCall {}.abi_encode())
			.unwrap();
		// A plain transfer deposits too.
		chain.transact(ACCOUNT1, vault, U256::from(200), Bytes::new()).unwrap();

		let state = chain.view(vault, |v: &GaslessVault| v.clone()).unwrap();
		assert_eq!(state.balance_of(&ACCOUNT1), U256::from(500));
		assert_eq!(state.total_supply(), chain.balance(&vault));
		assert_eq!(state.underlying(), Address::ZERO);

		chain
			.transact(
				ACCOUNT1,
				vault,
				U256::ZERO,
				IGaslessVault::withdrawCall {
					to: ACCOUNT2,
					amount: U256::from(500),
				}
				.abi_encode(),
			)
			.unwrap();
		assert_eq!(chain.balance(&ACCOUNT2), U256::from(500));
		assert_eq!(chain.balance(&vault), U256::ZERO);
		assert_eq!(chain.view(vault, |v: &GaslessVault| v.total_supply()).unwrap(), U256::ZERO);
	}

	#[test]
	fn test_backing_specific_entry_points() {
		let mut s = setup();
		s.chain.set_balance(ACCOUNT1, U256::from(10));
		// Value cannot be deposited into a token-backed vault.
		assert!(s
			.chain
			.transact(ACCOUNT1, s.vault, U256::from(10), INativeVault::depositCall {}.abi_encode())
			.is_err());
		assert!(s.chain.transact(ACCOUNT1, s.vault, U256::from(10), Bytes::new()).is_err());
		assert_eq!(s.chain.balance(&ACCOUNT1), U256::from(10));

		let native = s.chain.deploy(DEPLOYER, Box::new(GaslessVault::native(FORWARDER, "Gasless AVAX", "gAVAX")));
		let err = send(&mut s.chain, ACCOUNT1, native, IGaslessVault::depositCall {
			amount: U256::from(1),
		})
		.unwrap_err();
		assert!(matches!(err, VaultError::InvalidUnderlying(_)));
	}

	#[test]
	fn test_metadata_views() {
		let s = setup();
		assert_eq!(
			s.chain.call_sol(ACCOUNT1, s.vault, &IERC20::nameCall {}).unwrap()._0,
			"Gasless TestERC20"
		);
		assert_eq!(
			s.chain.call_sol(ACCOUNT1, s.vault, &IGaslessVault::underlyingCall {}).unwrap()._0,
			s.token
		);
		assert!(
			s.chain
				.call_sol(
					ACCOUNT1,
					s.vault,
					&IGaslessVault::isTrustedForwarderCall { forwarder: FORWARDER }
				)
				.unwrap()
				._0
		);
		assert_eq!(
			s.chain
				.call_sol(ACCOUNT1, s.vault, &IGaslessVault::trustedForwarderCall {})
				.unwrap()
				._0,
			FORWARDER
		);
	}
}
