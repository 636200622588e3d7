//! ERC-20 token surface shared by every fungible contract on the chain.

use crate::{CallContext, ContractInterface, Revert};
use alloy_primitives::{Address, Bytes, U256};
use alloy_sol_types::{sol, SolCall};
use std::collections::HashMap;
use thiserror::Error;

sol! {
	#[derive(Debug, PartialEq, Eq)]
	interface IERC20 {
		event Transfer(address indexed from, address indexed to, uint256 value);
		event Approval(address indexed owner, address indexed spender, uint256 value);

		error ERC20InsufficientBalance(address sender, uint256 balance, uint256 needed);
		error ERC20InsufficientAllowance(address spender, uint256 allowance, uint256 needed);
		error ERC20InvalidSender(address sender);
		error ERC20InvalidReceiver(address receiver);
		error ERC20InvalidApprover(address approver);
		error ERC20InvalidSpender(address spender);

		function name() external view returns (string);
		function symbol() external view returns (string);
		function decimals() external view returns (uint8);
		function totalSupply() external view returns (uint256);
		function balanceOf(address account) external view returns (uint256);
		function allowance(address owner, address spender) external view returns (uint256);
		function transfer(address to, uint256 value) external returns (bool);
		function transferFrom(address from, address to, uint256 value) external returns (bool);
		function approve(address spender, uint256 value) external returns (bool);
	}
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenError {
	#[error("Insufficient balance: {sender} has {balance}, needs {needed}")]
	InsufficientBalance {
		sender: Address,
		balance: U256,
		needed: U256,
	},
	#[error("Insufficient allowance: {spender} may spend {allowance}, needs {needed}")]
	InsufficientAllowance {
		spender: Address,
		allowance: U256,
		needed: U256,
	},
	#[error("Invalid sender {0}")]
	InvalidSender(Address),
	#[error("Invalid receiver {0}")]
	InvalidReceiver(Address),
	#[error("Invalid approver {0}")]
	InvalidApprover(Address),
	#[error("Invalid spender {0}")]
	InvalidSpender(Address),
	#[error("Arithmetic overflow")]
	Overflow,
	#[error(transparent)]
	Reverted(#[from] Revert),
}

impl From<TokenError> for Revert {
	fn from(err: TokenError) -> Self {
		match err {
			TokenError::InsufficientBalance {
				sender,
				balance,
				needed,
			} => Revert::error(&IERC20::ERC20InsufficientBalance {
				sender,
				balance,
				needed,
			}),
			TokenError::InsufficientAllowance {
				spender,
				allowance,
				needed,
			} => Revert::error(&IERC20::ERC20InsufficientAllowance {
				spender,
				allowance,
				needed,
			}),
			TokenError::InvalidSender(sender) => {
				Revert::error(&IERC20::ERC20InvalidSender { sender })
			},
			TokenError::InvalidReceiver(receiver) => {
				Revert::error(&IERC20::ERC20InvalidReceiver { receiver })
			},
			TokenError::InvalidApprover(approver) => {
				Revert::error(&IERC20::ERC20InvalidApprover { approver })
			},
			TokenError::InvalidSpender(spender) => {
				Revert::error(&IERC20::ERC20InvalidSpender { spender })
			},
			TokenError::Overflow => Revert::overflow(),
			TokenError::Reverted(revert) => revert,
		}
	}
}

/// Balances, allowances and supply of one token.
///
/// Every mutation charges storage gas and emits the matching ERC-20 event
/// through the calling frame.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Erc20Ledger {
	balances: HashMap<Address, U256>,
	allowances: HashMap<(Address, Address), U256>,
	total_supply: U256,
}

impl Erc20Ledger {
	pub fn new() -> Self {
		Self::default()
	}

	/// Genesis allocation, outside of any transaction.
	pub fn with_balance(mut self, holder: Address, amount: U256) -> Result<Self, TokenError> {
		self.credit(holder, amount)?;
		Ok(self)
	}

	pub fn total_supply(&self) -> U256 {
		self.total_supply
	}

	pub fn balance_of(&self, account: &Address) -> U256 {
		self.balances.get(account).copied().unwrap_or_default()
	}

	pub fn allowance(&self, owner: &Address, spender: &Address) -> U256 {
		self.allowances
			.get(&(*owner, *spender))
			.copied()
			.unwrap_or_default()
	}

	pub fn transfer(
		&mut self,
		ctx: &mut CallContext<'_>,
		from: Address,
		to: Address,
		amount: U256,
	) -> Result<(), TokenError> {
		if from.is_zero() {
			return Err(TokenError::InvalidSender(from));
		}
		if to.is_zero() {
			return Err(TokenError::InvalidReceiver(to));
		}
		let balance = self.balance_of(&from);
		if balance < amount {
			return Err(TokenError::InsufficientBalance {
				sender: from,
				balance,
				needed: amount,
			});
		}

		ctx.charge_sstore(false)?;
		ctx.charge_sstore(self.balance_of(&to).is_zero())?;
		if from != to {
			let credited = self
				.balance_of(&to)
				.checked_add(amount)
				.ok_or(TokenError::Overflow)?;
			self.balances.insert(from, balance - amount);
			self.balances.insert(to, credited);
		}
		ctx.emit(&IERC20::Transfer {
			from,
			to,
			value: amount,
		})?;
		Ok(())
	}

	pub fn approve(
		&mut self,
		ctx: &mut CallContext<'_>,
		owner: Address,
		spender: Address,
		amount: U256,
	) -> Result<(), TokenError> {
		if owner.is_zero() {
			return Err(TokenError::InvalidApprover(owner));
		}
		if spender.is_zero() {
			return Err(TokenError::InvalidSpender(spender));
		}
		ctx.charge_sstore(self.allowance(&owner, &spender).is_zero())?;
		self.allowances.insert((owner, spender), amount);
		ctx.emit(&IERC20::Approval {
			owner,
			spender,
			value: amount,
		})?;
		Ok(())
	}

	/// Consumes `amount` of the allowance `owner` gave `spender`.
	/// An allowance of `U256::MAX` never decreases.
	pub fn spend_allowance(
		&mut self,
		ctx: &mut CallContext<'_>,
		owner: Address,
		spender: Address,
		amount: U256,
	) -> Result<(), TokenError> {
		let allowance = self.allowance(&owner, &spender);
		if allowance == U256::MAX {
			return Ok(());
		}
		if allowance < amount {
			return Err(TokenError::InsufficientAllowance {
				spender,
				allowance,
				needed: amount,
			});
		}
		ctx.charge_sstore(false)?;
		self.allowances.insert((owner, spender), allowance - amount);
		Ok(())
	}

	pub fn mint(
		&mut self,
		ctx: &mut CallContext<'_>,
		to: Address,
		amount: U256,
	) -> Result<(), TokenError> {
		if to.is_zero() {
			return Err(TokenError::InvalidReceiver(to));
		}
		ctx.charge_sstore(self.balance_of(&to).is_zero())?;
		ctx.charge_sstore(self.total_supply.is_zero())?;
		self.credit(to, amount)?;
		ctx.emit(&IERC20::Transfer {
			from: Address::ZERO,
			to,
			value: amount,
		})?;
		Ok(())
	}

	/// Adds `amount` to both `holder` and the supply, or neither.
	fn credit(&mut self, holder: Address, amount: U256) -> Result<(), TokenError> {
		let supply = self
			.total_supply
			.checked_add(amount)
			.ok_or(TokenError::Overflow)?;
		let balance = self
			.balance_of(&holder)
			.checked_add(amount)
			.ok_or(TokenError::Overflow)?;
		self.total_supply = supply;
		self.balances.insert(holder, balance);
		Ok(())
	}

	pub fn burn(
		&mut self,
		ctx: &mut CallContext<'_>,
		from: Address,
		amount: U256,
	) -> Result<(), TokenError> {
		if from.is_zero() {
			return Err(TokenError::InvalidSender(from));
		}
		let balance = self.balance_of(&from);
		if balance < amount {
			return Err(TokenError::InsufficientBalance {
				sender: from,
				balance,
				needed: amount,
			});
		}
		ctx.charge_sstore(false)?;
		ctx.charge_sstore(false)?;
		self.balances.insert(from, balance - amount);
		self.total_supply -= amount;
		ctx.emit(&IERC20::Transfer {
			from,
			to: Address::ZERO,
			value: amount,
		})?;
		Ok(())
	}
}

/// A plain ERC-20 token: metadata plus a ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Erc20Token {
	pub name: String,
	pub symbol: String,
	pub decimals: u8,
	pub ledger: Erc20Ledger,
}

impl Erc20Token {
	pub fn new(name: impl Into<String>, symbol: impl Into<String>, decimals: u8) -> Self {
		Self {
			name: name.into(),
			symbol: symbol.into(),
			decimals,
			ledger: Erc20Ledger::new(),
		}
	}

	/// Executes a standard ERC-20 call on behalf of `sender`.
	///
	/// `sender` is passed explicitly so that tokens honouring a trusted
	/// forwarder can substitute the original signer for `msg.sender`.
	pub fn handle(
		&mut self,
		ctx: &mut CallContext<'_>,
		sender: Address,
		call: IERC20::IERC20Calls,
	) -> Result<Bytes, Revert> {
		use IERC20::IERC20Calls;

		let output = match call {
			IERC20Calls::name(_) => IERC20::nameCall::abi_encode_returns(&(self.name.clone(),)),
			IERC20Calls::symbol(_) => {
				IERC20::symbolCall::abi_encode_returns(&(self.symbol.clone(),))
			},
			IERC20Calls::decimals(_) => IERC20::decimalsCall::abi_encode_returns(&(self.decimals,)),
			IERC20Calls::totalSupply(_) => {
				IERC20::totalSupplyCall::abi_encode_returns(&(self.ledger.total_supply(),))
			},
			IERC20Calls::balanceOf(c) => {
				IERC20::balanceOfCall::abi_encode_returns(&(self.ledger.balance_of(&c.account),))
			},
			IERC20Calls::allowance(c) => IERC20::allowanceCall::abi_encode_returns(&(self
				.ledger
				.allowance(&c.owner, &c.spender),)),
			IERC20Calls::transfer(c) => {
				self.ledger.transfer(ctx, sender, c.to, c.value)?;
				IERC20::transferCall::abi_encode_returns(&(true,))
			},
			IERC20Calls::transferFrom(c) => {
				self.ledger.spend_allowance(ctx, c.from, sender, c.value)?;
				self.ledger.transfer(ctx, c.from, c.to, c.value)?;
				IERC20::transferFromCall::abi_encode_returns(&(true,))
			},
			IERC20Calls::approve(c) => {
				self.ledger.approve(ctx, sender, c.spender, c.value)?;
				IERC20::approveCall::abi_encode_returns(&(true,))
			},
		};
		Ok(output.into())
	}
}

impl ContractInterface for Erc20Token {
	fn kind(&self) -> &'static str {
		"ERC20"
	}

	fn call(&mut self, ctx: &mut CallContext<'_>, input: &[u8]) -> Result<Bytes, Revert> {
		match crate::decode_call::<IERC20::IERC20Calls>(input)? {
			Some(call) => {
				let sender = ctx.msg_sender();
				self.handle(ctx, sender, call)
			},
			None => Err(crate::unknown_selector(input)),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::{Chain, ChainError};
	use alloy_primitives::address;
	use alloy_sol_types::SolEvent;

	const ALICE: Address = address!("1000000000000000000000000000000000000001");
	const BOB: Address = address!("2000000000000000000000000000000000000002");

	fn token_chain() -> (Chain, Address) {
		let mut chain = Chain::new(1337, 1_700_000_000, 30_000_000);
		let mut token = Erc20Token::new("Token", "TKN", 6);
		token.ledger = Erc20Ledger::new()
			.with_balance(ALICE, U256::from(1_000))
			.unwrap();
		let address = chain.deploy(ALICE, Box::new(token));
		(chain, address)
	}

	#[test]
	fn test_metadata() {
		let (chain, token) = token_chain();
		assert_eq!(chain.call_sol(BOB, token, &IERC20::nameCall {}).unwrap()._0, "Token");
		assert_eq!(chain.call_sol(BOB, token, &IERC20::symbolCall {}).unwrap()._0, "TKN");
		assert_eq!(chain.call_sol(BOB, token, &IERC20::decimalsCall {}).unwrap()._0, 6);
		assert_eq!(
			chain.call_sol(BOB, token, &IERC20::totalSupplyCall {}).unwrap()._0,
			U256::from(1_000)
		);
	}

	#[test]
	fn test_transfer_emits_event() {
		let (mut chain, token) = token_chain();
		let receipt = chain
			.transact(
				ALICE,
				token,
				U256::ZERO,
				IERC20::transferCall {
					to: BOB,
					value: U256::from(400),
				}
				.abi_encode(),
			)
			.unwrap();

		let event = IERC20::Transfer::decode_log_data(&receipt.logs[0].data, true).unwrap();
		assert_eq!((event.from, event.to, event.value), (ALICE, BOB, U256::from(400)));
		let ledger = chain.view(token, |t: &Erc20Token| t.ledger.clone()).unwrap();
		assert_eq!(ledger.balance_of(&ALICE), U256::from(600));
		assert_eq!(ledger.balance_of(&BOB), U256::from(400));
	}

	#[test]
	fn test_transfer_over_balance_reverts() {
		let (mut chain, token) = token_chain();
		let err = chain
			.transact(
				BOB,
				token,
				U256::ZERO,
				IERC20::transferCall {
					to: ALICE,
					value: U256::from(1),
				}
				.abi_encode(),
			)
			.unwrap_err();
		let decoded = err
			.revert()
			.and_then(|r| r.decode::<IERC20::ERC20InsufficientBalance>())
			.unwrap();
		assert_eq!(decoded.sender, BOB);
		assert_eq!(decoded.needed, U256::from(1));
	}

	#[test]
	fn test_transfer_from_spends_allowance() {
		let (mut chain, token) = token_chain();
		chain
			.transact(
				ALICE,
				token,
				U256::ZERO,
				IERC20::approveCall {
					spender: BOB,
					value: U256::from(300),
				}
				.abi_encode(),
			)
			.unwrap();

		let transfer_from = |value: u64| {
			IERC20::transferFromCall {
				from: ALICE,
				to: BOB,
				value: U256::from(value),
			}
			.abi_encode()
		};
		chain.transact(BOB, token, U256::ZERO, transfer_from(200)).unwrap();
		let remaining = chain
			.call_sol(
				BOB,
				token,
				&IERC20::allowanceCall {
					owner: ALICE,
					spender: BOB,
				},
			)
			.unwrap()
			._0;
		assert_eq!(remaining, U256::from(100));

		let err = chain.transact(BOB, token, U256::ZERO, transfer_from(101)).unwrap_err();
		assert!(err
			.revert()
			.unwrap()
			.is::<IERC20::ERC20InsufficientAllowance>());
	}

	#[test]
	fn test_infinite_allowance_is_not_spent() {
		let (mut chain, token) = token_chain();
		let result: Result<U256, ChainError> =
			chain.invoke(ALICE, token, U256::ZERO, |t: &mut Erc20Token, ctx| {
				t.ledger.approve(ctx, ALICE, BOB, U256::MAX).map_err(Revert::from)?;
				t.ledger
					.spend_allowance(ctx, ALICE, BOB, U256::from(999))
					.map_err(Revert::from)?;
				Ok(t.ledger.allowance(&ALICE, &BOB))
			});
		assert_eq!(result.unwrap(), U256::MAX);
	}

	#[test]
	fn test_mint_and_burn_track_supply() {
		let (mut chain, token) = token_chain();
		let result: Result<(), ChainError> =
			chain.invoke(ALICE, token, U256::ZERO, |t: &mut Erc20Token, ctx| {
				t.ledger.mint(ctx, BOB, U256::from(50)).map_err(Revert::from)?;
				t.ledger.burn(ctx, ALICE, U256::from(25)).map_err(Revert::from)?;
				Ok(())
			});
		result.unwrap();
		let ledger = chain.view(token, |t: &Erc20Token| t.ledger.clone()).unwrap();
		assert_eq!(ledger.total_supply(), U256::from(1_025));
		assert_eq!(ledger.balance_of(&ALICE), U256::from(975));

		let burn_too_much: Result<(), ChainError> =
			chain.invoke(BOB, token, U256::ZERO, |t: &mut Erc20Token, ctx| {
				Ok(t.ledger.burn(ctx, BOB, U256::from(51)).map_err(Revert::from)?)
			});
		assert!(burn_too_much.is_err());
	}

	#[test]
	fn test_zero_receiver_rejected() {
		let (mut chain, token) = token_chain();
		let err = chain
			.transact(
				ALICE,
				token,
				U256::ZERO,
				IERC20::transferCall {
					to: Address::ZERO,
					value: U256::from(1),
				}
				.abi_encode(),
			)
			.unwrap_err();
		assert!(err.revert().unwrap().is::<IERC20::ERC20InvalidReceiver>());
	}

	#[test]
	fn test_mint_overflow_reverts_and_keeps_state() {
		use crate::implementations::test_token::{ITestERC20, TestErc20};

		let mut chain = Chain::new(1337, 1_700_000_000, 30_000_000);
		let token = chain.deploy(ALICE, Box::new(TestErc20::new()));
		let mint = ITestERC20::mintCall {
			to: BOB,
			amount: U256::MAX,
		}
		.abi_encode();
		chain.transact(ALICE, token, U256::ZERO, mint.clone()).unwrap();

		let err = chain.transact(ALICE, token, U256::ZERO, mint).unwrap_err();
		let panic = err
			.revert()
			.and_then(|r| r.decode::<alloy_sol_types::Panic>())
			.unwrap();
		assert_eq!(panic.code, U256::from(crate::PANIC_ARITHMETIC));

		let (supply, balance) = chain
			.view(token, |t: &TestErc20| {
				(t.token().ledger.total_supply(), t.balance_of(&BOB))
			})
			.unwrap();
		assert_eq!(supply, U256::MAX);
		assert_eq!(balance, U256::MAX);
	}

	#[test]
	fn test_genesis_allocation_overflow() {
		let ledger = Erc20Ledger::new().with_balance(ALICE, U256::MAX).unwrap();
		assert_eq!(
			ledger.clone().with_balance(BOB, U256::from(1)).unwrap_err(),
			TokenError::Overflow
		);
		assert_eq!(ledger.total_supply(), U256::MAX);
	}
}
