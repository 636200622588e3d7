//! The chain: world state plus the entry points transactions come through.

use crate::gas::{self, GasMeter};
use crate::state::{self, Env, Frame, Slot, WorldState};
use crate::{CallContext, ChainError, ContractInterface, Revert};
use alloy_primitives::{Address, Bytes, Log, U256};
use alloy_sol_types::SolCall;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockEnv {
	pub number: u64,
	/// Unix seconds.
	pub timestamp: u64,
}

/// Result of a successful top-level transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
	pub output: Bytes,
	pub gas_used: u64,
	pub logs: Vec<Log>,
}

/// A single-node chain executing transactions one at a time.
///
/// Every transaction is atomic: it either commits all of its effects or,
/// when its outermost frame reverts, none of them.
#[derive(Clone)]
pub struct Chain {
	env: Env,
	block_gas_limit: u64,
	state: WorldState,
}

impl Chain {
	pub fn new(chain_id: u64, genesis_timestamp: u64, block_gas_limit: u64) -> Self {
		Self {
			env: Env {
				chain_id,
				block: BlockEnv {
					number: 0,
					timestamp: genesis_timestamp,
				},
			},
			block_gas_limit,
			state: WorldState::default(),
		}
	}

	pub fn chain_id(&self) -> u64 {
		self.env.chain_id
	}

	pub fn block(&self) -> BlockEnv {
		self.env.block
	}

	pub fn block_gas_limit(&self) -> u64 {
		self.block_gas_limit
	}

	/// Opens the next block `seconds` after the current one.
	pub fn advance(&mut self, seconds: u64) {
		self.env.block.number += 1;
		self.env.block.timestamp += seconds;
	}

	pub fn balance(&self, account: &Address) -> U256 {
		self.state.balance(account)
	}

	/// Sets a native balance directly, as genesis allocation does.
	pub fn set_balance(&mut self, account: Address, amount: U256) {
		self.state.balances.insert(account, amount);
	}

	/// Every log emitted by committed transactions, in order.
	pub fn logs(&self) -> &[Log] {
		&self.state.logs
	}

	pub fn has_code(&self, address: &Address) -> bool {
		self.state.contracts.contains_key(address)
	}

	pub fn contract_kind(&self, address: &Address) -> Option<&'static str> {
		match self.state.contracts.get(address)? {
			Slot::Idle(contract) => Some(contract.kind()),
			Slot::Executing(kind) => Some(*kind),
		}
	}

	pub fn next_deploy_address(&self, deployer: &Address) -> Address {
		self.state.next_deploy_address(deployer)
	}

	/// Deploys `contract` outside of any transaction, as at genesis.
	pub fn deploy(&mut self, deployer: Address, contract: Box<dyn ContractInterface>) -> Address {
		let kind = contract.kind();
		let address = self.state.install(deployer, contract);
		tracing::info!(
			component = "chain",
			deployer = %deployer,
			address = %address,
			kind,
			"contract deployed"
		);
		address
	}

	/// Executes an ABI transaction with the block gas limit.
	pub fn transact(
		&mut self,
		from: Address,
		to: Address,
		value: U256,
		input: impl Into<Bytes>,
	) -> Result<Receipt, ChainError> {
		self.transact_with_gas(from, to, value, input, self.block_gas_limit)
	}

	/// Executes an ABI transaction. A revert of the outermost frame is
	/// returned as [`ChainError::Reverted`] and leaves no trace in state.
	pub fn transact_with_gas(
		&mut self,
		from: Address,
		to: Address,
		value: U256,
		input: impl Into<Bytes>,
		gas_limit: u64,
	) -> Result<Receipt, ChainError> {
		let mut meter = GasMeter::new(gas_limit.min(self.block_gas_limit));
		meter.charge(gas::TX_BASE)?;

		let logs_before = self.state.logs.len();
		let frame = Frame {
			caller: from,
			to,
			value,
			input: input.into(),
			gas_limit: meter.remaining(),
			depth: 0,
		};
		let (result, used) = state::run_frame(
			&mut self.state,
			&self.env,
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

		match result {
			Ok(output) => Ok(Receipt {
				output,
				gas_used: gas::TX_BASE + used,
				logs: self.state.logs[logs_before..].to_vec(),
			}),
			Err(revert) => {
				tracing::debug!(
					component = "chain",
					from = %from,
					to = %to,
					gas_used = gas::TX_BASE + used,
					reason = %revert,
					"transaction reverted"
				);
				Err(ChainError::Reverted(revert))
			},
		}
	}

	/// Runs an ABI call against a copy of the state and discards its effects.
	pub fn call_static(
		&self,
		from: Address,
		to: Address,
		input: impl Into<Bytes>,
	) -> Result<Bytes, ChainError> {
		let mut scratch = self.clone();
		scratch
			.transact(from, to, U256::ZERO, input)
			.map(|receipt| receipt.output)
	}

	/// Typed form of [`Chain::call_static`].
	pub fn call_sol<C: SolCall>(
		&self,
		from: Address,
		to: Address,
		call: &C,
	) -> Result<C::Return, ChainError> {
		let output = self.call_static(from, to, call.abi_encode())?;
		C::abi_decode_returns(&output, true).map_err(|e| {
			ChainError::Reverted(Revert::message(format!(
				"{} on {} returned malformed data: {}",
				C::SIGNATURE,
				to,
				e
			)))
		})
	}

	/// Runs `f` against the contract of type `C` at `to` as a top-level
	/// transaction from `from`, attaching `value`.
	///
	/// State is committed when `f` returns `Ok` and rolled back otherwise.
	pub fn invoke<C, R, E, F>(&mut self, from: Address, to: Address, value: U256, f: F) -> Result<R, E>
	where
		C: ContractInterface,
		E: From<ChainError>,
		F: FnOnce(&mut C, &mut CallContext<'_>) -> Result<R, E>,
	{
		let frame = Frame {
			caller: from,
			to,
			value,
			input: Bytes::new(),
			gas_limit: self.block_gas_limit.saturating_sub(gas::TX_BASE),
			depth: 0,
		};
		let (result, _) = state::run_frame(
			&mut self.state,
			&self.env,
			frame,
			|revert| E::from(ChainError::Reverted(revert)),
			|contract, ctx| {
				let Some(contract) = contract else {
					return Err(E::from(ChainError::NoContract(to)));
				};
				let actual = contract.kind();
				match contract.as_any_mut().downcast_mut::<C>() {
					Some(contract) => f(contract, ctx),
					None => Err(E::from(ChainError::ContractTypeMismatch {
						address: to,
						actual,
					})),
				}
			},
		);
		result
	}

	/// [`Chain::invoke`] against a copy of the state; effects are discarded.
	pub fn invoke_static<C, R, E, F>(&self, from: Address, to: Address, f: F) -> Result<R, E>
	where
		C: ContractInterface,
		E: From<ChainError>,
		F: FnOnce(&mut C, &mut CallContext<'_>) -> Result<R, E>,
	{
		self.clone().invoke(from, to, U256::ZERO, f)
	}

	/// Reads the contract of type `C` at `at`.
	pub fn view<C: ContractInterface, R>(
		&self,
		at: Address,
		f: impl FnOnce(&C) -> R,
	) -> Result<R, ChainError> {
		match self.state.contracts.get(&at) {
			None => Err(ChainError::NoContract(at)),
			Some(Slot::Executing(_)) => Err(ChainError::Busy(at)),
			Some(Slot::Idle(contract)) => (**contract)
				.as_any()
				.downcast_ref::<C>()
				.map(f)
				.ok_or(ChainError::ContractTypeMismatch {
					address: at,
					actual: contract.kind(),
				}),
		}
	}
}
