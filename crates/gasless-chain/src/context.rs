//! The view a running contract has of the chain.

use crate::gas::{self, GasMeter};
use crate::state::{self, Env, Frame, WorldState};
use crate::{ContractInterface, Revert};
use alloy_primitives::{Address, Bytes, Log, U256};
use alloy_sol_types::{SolCall, SolEvent};

/// Execution context of one call frame.
///
/// Gives the running contract its call parameters (`msg.sender`,
/// `msg.value`, calldata), the block environment, and the operations that
/// touch shared state: nested calls, value transfers, deployments and logs.
pub struct CallContext<'a> {
	state: &'a mut WorldState,
	env: &'a Env,
	caller: Address,
	this: Address,
	value: U256,
	input: Bytes,
	gas: GasMeter,
	depth: usize,
}

impl<'a> CallContext<'a> {
	pub(crate) fn new(state: &'a mut WorldState, env: &'a Env, frame: Frame) -> Self {
		Self {
			state,
			env,
			caller: frame.caller,
			this: frame.to,
			value: frame.value,
			input: frame.input,
			gas: GasMeter::new(frame.gas_limit),
			depth: frame.depth,
		}
	}

	/// The immediate caller.
	pub fn msg_sender(&self) -> Address {
		self.caller
	}

	pub fn msg_value(&self) -> U256 {
		self.value
	}

	/// Address of the running contract.
	pub fn this(&self) -> Address {
		self.this
	}

	/// Calldata of this frame.
	pub fn input(&self) -> &Bytes {
		&self.input
	}

	pub fn chain_id(&self) -> u64 {
		self.env.chain_id
	}

	pub fn block_number(&self) -> u64 {
		self.env.block.number
	}

	pub fn block_timestamp(&self) -> u64 {
		self.env.block.timestamp
	}

	pub fn depth(&self) -> usize {
		self.depth
	}

	pub fn gas_left(&self) -> u64 {
		self.gas.remaining()
	}

	pub(crate) fn gas_used(&self) -> u64 {
		self.gas.used()
	}

	pub fn charge_gas(&mut self, amount: u64) -> Result<(), Revert> {
		self.gas.charge(amount)
	}

	/// Charges a storage write; writing a previously zero slot costs more.
	pub fn charge_sstore(&mut self, was_zero: bool) -> Result<(), Revert> {
		self.gas.charge(if was_zero {
			gas::SSTORE_SET
		} else {
			gas::SSTORE_RESET
		})
	}

	pub fn balance(&self, account: &Address) -> U256 {
		self.state.balance(account)
	}

	pub fn self_balance(&self) -> U256 {
		self.state.balance(&self.this)
	}

	/// Calls `to` with `data`, attaching `value` from this contract's balance.
	///
	/// The callee gets at most 63/64 of the remaining gas, less when `gas`
	/// asks for less. A callee revert is returned as `Err` after its state
	/// changes have been rolled back; this frame keeps running.
	pub fn call(
		&mut self,
		to: Address,
		value: U256,
		data: impl Into<Bytes>,
		gas: Option<u64>,
	) -> Result<Bytes, Revert> {
		let mut cost = gas::CALL;
		if !value.is_zero() {
			cost += gas::CALL_VALUE;
		}
		self.gas.charge(cost)?;

		let available = gas::max_call_gas(self.gas.remaining());
		let frame = Frame {
			caller: self.this,
			to,
			value,
			input: data.into(),
			gas_limit: gas.map_or(available, |requested| requested.min(available)),
			depth: self.depth + 1,
		};
		let (result, used) = state::run_frame(
			&mut *self.state,
			self.env,
			frame,
			|revert| revert,
			|contract, ctx| match contract {
				Some(contract) => {
					let input = ctx.input().clone();
					contract.call(ctx, &input)
				},
				None => Ok(Bytes::new()),
			},
		);
		self.gas.charge(used)?;
		result
	}

	/// Calls a typed function on `to` and decodes its return values.
	pub fn call_sol<C: SolCall>(
		&mut self,
		to: Address,
		value: U256,
		call: &C,
	) -> Result<C::Return, Revert> {
		let output = self.call(to, value, call.abi_encode(), None)?;
		C::abi_decode_returns(&output, true).map_err(|e| {
			Revert::message(format!(
				"{} on {} returned malformed data: {}",
				C::SIGNATURE,
				to,
				e
			))
		})
	}

	/// Sends native currency to `to`, running its code if it has any.
	pub fn transfer_native(&mut self, to: Address, amount: U256) -> Result<(), Revert> {
		self.call(to, amount, Bytes::new(), None).map(|_| ())
	}

	/// Emits `event` from the running contract.
	pub fn emit<E: SolEvent>(&mut self, event: &E) -> Result<(), Revert> {
		let data = event.encode_log_data();
		self.gas.charge(
			gas::LOG
				+ gas::LOG_TOPIC * data.topics().len() as u64
				+ gas::LOG_DATA_BYTE * data.data.len() as u64,
		)?;
		self.state.logs.push(Log {
			address: self.this,
			data,
		});
		Ok(())
	}

	/// The address [`CallContext::deploy`] will use next.
	pub fn next_deploy_address(&self) -> Address {
		self.state.next_deploy_address(&self.this)
	}

	/// Deploys `contract` with the running contract as deployer.
	pub fn deploy(&mut self, contract: Box<dyn ContractInterface>) -> Result<Address, Revert> {
		self.gas.charge(gas::CREATE)?;
		let kind = contract.kind();
		let address = self.state.install(self.this, contract);
		tracing::debug!(
			component = "chain",
			deployer = %self.this,
			address = %address,
			kind,
			"contract deployed"
		);
		Ok(address)
	}
}

/// ERC-2771 sender resolution for contracts that trust a forwarder.
///
/// When the immediate caller is the trusted forwarder, the last 20 bytes of
/// calldata carry the original signer and are not part of the call itself.
pub trait TrustedForwarderContext {
	fn trusted_forwarder(&self) -> Address;

	fn is_trusted_forwarder(&self, forwarder: Address) -> bool {
		forwarder == self.trusted_forwarder()
	}

	/// The original signer of a forwarded call, or the immediate caller.
	fn msg_sender(&self, ctx: &CallContext<'_>) -> Address {
		let input = ctx.input();
		if self.is_trusted_forwarder(ctx.msg_sender()) && input.len() >= 20 {
			Address::from_slice(&input[input.len() - 20..])
		} else {
			ctx.msg_sender()
		}
	}

	/// Calldata without the forwarder's sender suffix.
	fn msg_data<'b>(&self, ctx: &CallContext<'_>, input: &'b [u8]) -> &'b [u8] {
		if self.is_trusted_forwarder(ctx.msg_sender()) && input.len() >= 20 {
			&input[..input.len() - 20]
		} else {
			input
		}
	}
}
