//! World state and call-frame execution.

use crate::context::CallContext;
use crate::gas::MAX_CALL_DEPTH;
use crate::{
	BlockEnv, CallDepthExceeded, ContractInterface, InsufficientNativeBalance, ReentrantCall,
	Revert,
};
use alloy_primitives::{keccak256, Address, Bytes, Log, U256};
use std::collections::HashMap;

/// Chain-wide execution parameters visible to every frame.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Env {
	pub(crate) chain_id: u64,
	pub(crate) block: BlockEnv,
}

#[derive(Clone)]
pub(crate) enum Slot {
	Idle(Box<dyn ContractInterface>),
	/// The contract is detached and running higher up the call stack.
	Executing(&'static str),
}

/// Everything a reverted frame rolls back.
#[derive(Clone, Default)]
pub(crate) struct WorldState {
	pub(crate) contracts: HashMap<Address, Slot>,
	pub(crate) balances: HashMap<Address, U256>,
	pub(crate) logs: Vec<Log>,
	pub(crate) deploy_counters: HashMap<Address, u64>,
}

impl WorldState {
	pub(crate) fn balance(&self, account: &Address) -> U256 {
		self.balances.get(account).copied().unwrap_or_default()
	}

	pub(crate) fn move_value(&mut self, from: Address, to: Address, amount: U256) -> Result<(), Revert> {
		if amount.is_zero() {
			return Ok(());
		}
		let balance = self.balance(&from);
		if balance < amount {
			return Err(Revert::error(&InsufficientNativeBalance {
				account: from,
				balance,
				needed: amount,
			}));
		}
		if from != to {
			let credited = self
				.balance(&to)
				.checked_add(amount)
				.ok_or_else(Revert::overflow)?;
			self.balances.insert(from, balance - amount);
			self.balances.insert(to, credited);
		}
		Ok(())
	}

	/// The address the next deployment by `deployer` lands at.
	pub(crate) fn next_deploy_address(&self, deployer: &Address) -> Address {
		let counter = self.deploy_counters.get(deployer).copied().unwrap_or_default();
		let mut preimage = [0u8; 28];
		preimage[..20].copy_from_slice(deployer.as_slice());
		preimage[20..].copy_from_slice(&counter.to_be_bytes());
		Address::from_slice(&keccak256(preimage)[12..])
	}

	pub(crate) fn install(&mut self, deployer: Address, contract: Box<dyn ContractInterface>) -> Address {
		let address = self.next_deploy_address(&deployer);
		*self.deploy_counters.entry(deployer).or_default() += 1;
		self.contracts.insert(address, Slot::Idle(contract));
		address
	}
}

/// A call about to be executed.
pub(crate) struct Frame {
	pub(crate) caller: Address,
	pub(crate) to: Address,
	pub(crate) value: U256,
	pub(crate) input: Bytes,
	pub(crate) gas_limit: u64,
	pub(crate) depth: usize,
}

/// Runs `run` inside a new frame and returns its result with the gas it used.
///
/// Value moves to the callee before `run` starts. The callee is detached from
/// world state for the duration and handed to `run` (`None` when the target
/// has no code). If `run` fails, world state is restored to what it was before
/// the frame, including the value transfer and any logs.
pub(crate) fn run_frame<R, E, F>(
	state: &mut WorldState,
	env: &Env,
	frame: Frame,
	on_revert: impl FnOnce(Revert) -> E,
	run: F,
) -> (Result<R, E>, u64)
where
	F: FnOnce(Option<&mut (dyn ContractInterface + 'static)>, &mut CallContext<'_>) -> Result<R, E>,
{
	if frame.depth > MAX_CALL_DEPTH {
		return (
			Err(on_revert(Revert::error(&CallDepthExceeded {}))),
			frame.gas_limit,
		);
	}

	let snapshot = state.clone();
	if let Err(revert) = state.move_value(frame.caller, frame.to, frame.value) {
		return (Err(on_revert(revert)), 0);
	}

	let mut contract = match state.contracts.remove(&frame.to) {
		Some(Slot::Idle(contract)) => {
			state
				.contracts
				.insert(frame.to, Slot::Executing(contract.kind()));
			Some(contract)
		},
		Some(Slot::Executing(kind)) => {
			tracing::debug!(
				component = "chain",
				target = %frame.to,
				kind,
				"rejected re-entrant call"
			);
			*state = snapshot;
			return (
				Err(on_revert(Revert::error(&ReentrantCall { target: frame.to }))),
				0,
			);
		},
		None => None,
	};

	let to = frame.to;
	let mut ctx = CallContext::new(state, env, frame);
	let result = run(contract.as_deref_mut(), &mut ctx);
	let gas_used = ctx.gas_used();

	match (&result, contract) {
		(Ok(_), Some(contract)) => {
			state.contracts.insert(to, Slot::Idle(contract));
		},
		(Ok(_), None) => {},
		(Err(_), _) => *state = snapshot,
	}
	(result, gas_used)
}
