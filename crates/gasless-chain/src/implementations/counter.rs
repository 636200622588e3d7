//! Counter that records who incremented it, honouring a trusted forwarder.

use crate::{
	decode_call, unknown_selector, CallContext, ContractInterface, Revert,
	TrustedForwarderContext,
};
use alloy_primitives::{Address, Bytes, U256};
use alloy_sol_types::{sol, SolCall};

sol! {
	#[derive(Debug, PartialEq, Eq)]
	interface IGaslessCounter {
		event Incremented(address indexed caller, uint256 number);

		function increment() external;
		function number() external view returns (uint256);
		function lastCaller() external view returns (address);
		function getTrustedForwarder() external view returns (address);
		function isTrustedForwarder(address forwarder) external view returns (bool);
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GaslessCounter {
	forwarder: Address,
	number: U256,
	last_caller: Address,
}

impl GaslessCounter {
	pub fn new(forwarder: Address) -> Self {
		Self {
			forwarder,
			number: U256::ZERO,
			last_caller: Address::ZERO,
		}
	}

	pub fn number(&self) -> U256 {
		self.number
	}

	pub fn last_caller(&self) -> Address {
		self.last_caller
	}
}

impl TrustedForwarderContext for GaslessCounter {
	fn trusted_forwarder(&self) -> Address {
		self.forwarder
	}
}

impl ContractInterface for GaslessCounter {
	fn kind(&self) -> &'static str {
		"GaslessCounter"
	}

	fn call(&mut self, ctx: &mut CallContext<'_>, input: &[u8]) -> Result<Bytes, Revert> {
		use IGaslessCounter::IGaslessCounterCalls as Calls;

		let sender = self.msg_sender(ctx);
		let Some(call) = decode_call::<Calls>(self.msg_data(ctx, input))? else {
			return Err(unknown_selector(input));
		};
		let output = match call {
			Calls::increment(_) => {
				ctx.charge_sstore(self.number.is_zero())?;
				ctx.charge_sstore(self.last_caller.is_zero())?;
				self.number = self
					.number
					.checked_add(U256::from(1))
					.ok_or_else(Revert::overflow)?;
				self.last_caller = sender;
				ctx.emit(&IGaslessCounter::Incremented {
					caller: sender,
					number: self.number,
				})?;
				Vec::new()
			},
			Calls::number(_) => IGaslessCounter::numberCall::abi_encode_returns(&(self.number,)),
			Calls::lastCaller(_) => {
				IGaslessCounter::lastCallerCall::abi_encode_returns(&(self.last_caller,))
			},
			Calls::getTrustedForwarder(_) => {
				IGaslessCounter::getTrustedForwarderCall::abi_encode_returns(&(self.forwarder,))
			},
			Calls::isTrustedForwarder(c) => {
				IGaslessCounter::isTrustedForwarderCall::abi_encode_returns(&(self
					.is_trusted_forwarder(c.forwarder),))
			},
		};
		Ok(output.into())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::Chain;
	use alloy_primitives::address;

	const FORWARDER: Address = address!("f000000000000000000000000000000000000001");
	const ALICE: Address = address!("1000000000000000000000000000000000000001");
	const BOB: Address = address!("2000000000000000000000000000000000000002");

	fn counter_chain() -> (Chain, Address) {
		let mut chain = Chain::new(1, 0, 30_000_000);
		let counter = chain.deploy(ALICE, Box::new(GaslessCounter::new(FORWARDER)));
		(chain, counter)
	}

	#[test]
	fn test_direct_increment() {
		let (mut chain, counter) = counter_chain();
		chain
			.transact(BOB, counter, U256::ZERO, IGaslessCounter::incrementCall {}.abi_encode())
			.unwrap();

		let (number, last) = chain
			.view(counter, |c: &GaslessCounter| (c.number(), c.last_caller()))
			.unwrap();
		assert_eq!(number, U256::from(1));
		assert_eq!(last, BOB);
	}

	#[test]
	fn test_forwarded_increment_uses_appended_sender() {
		let (mut chain, counter) = counter_chain();
		let mut data = IGaslessCounter::incrementCall {}.abi_encode();
		data.extend_from_slice(ALICE.as_slice());
		chain.transact(FORWARDER, counter, U256::ZERO, data).unwrap();

		assert_eq!(
			chain
				.call_sol(BOB, counter, &IGaslessCounter::lastCallerCall {})
				.unwrap()
				._0,
			ALICE
		);
		assert_eq!(
			chain.call_sol(BOB, counter, &IGaslessCounter::numberCall {}).unwrap()._0,
			U256::from(1)
		);
	}

	#[test]
	fn test_trusted_forwarder_views() {
		let (chain, counter) = counter_chain();
		assert_eq!(
			chain
				.call_sol(BOB, counter, &IGaslessCounter::getTrustedForwarderCall {})
				.unwrap()
				._0,
			FORWARDER
		);
		assert!(
			chain
				.call_sol(
					BOB,
					counter,
					&IGaslessCounter::isTrustedForwarderCall { forwarder: FORWARDER }
				)
				.unwrap()
				._0
		);
		assert!(
			!chain
				.call_sol(BOB, counter, &IGaslessCounter::isTrustedForwarderCall { forwarder: BOB })
				.unwrap()
				._0
		);
	}
}
