//! Freely mintable ERC-20 used by local deployments and tests.

use crate::erc20::{Erc20Token, IERC20};
use crate::{decode_call, unknown_selector, CallContext, ContractInterface, Revert};
use alloy_primitives::{Address, Bytes, U256};
use alloy_sol_types::sol;

sol! {
	#[derive(Debug, PartialEq, Eq)]
	interface ITestERC20 {
		function mint(address to, uint256 amount) external;
	}
}

pub const NAME: &str = "TestERC20";
pub const SYMBOL: &str = "TEST";

/// ERC-20 where anyone can mint to anyone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestErc20 {
	token: Erc20Token,
}

impl Default for TestErc20 {
	fn default() -> Self {
		Self::new()
	}
}

impl TestErc20 {
	pub fn new() -> Self {
		Self {
			token: Erc20Token::new(NAME, SYMBOL, 18),
		}
	}

	pub fn token(&self) -> &Erc20Token {
		&self.token
	}

	pub fn balance_of(&self, account: &Address) -> U256 {
		self.token.ledger.balance_of(account)
	}
}

impl ContractInterface for TestErc20 {
	fn kind(&self) -> &'static str {
		"TestERC20"
	}

	fn call(&mut self, ctx: &mut CallContext<'_>, input: &[u8]) -> Result<Bytes, Revert> {
		let sender = ctx.msg_sender();
		if let Some(call) = decode_call::<IERC20::IERC20Calls>(input)? {
			return self.token.handle(ctx, sender, call);
		}
		match decode_call::<ITestERC20::ITestERC20Calls>(input)? {
			Some(ITestERC20::ITestERC20Calls::mint(c)) => {
				self.token.ledger.mint(ctx, c.to, c.amount)?;
				Ok(Bytes::new())
			},
			None => Err(unknown_selector(input)),
		}
	}
}
