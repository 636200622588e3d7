//! Relayer side: takes signed envelopes and submits them to the forwarder.
//!
//! The relayer pays for the transaction and attaches the request's value.
//! Every envelope is checked with a read-only `verify` before it is
//! submitted, under the same node lock as the submission, so two envelopes
//! carrying the same nonce can never both reach `execute`.

use crate::node::GaslessNode;
use alloy_primitives::{Address, Bytes, B256, U256};
use alloy_sol_types::SolCall;
use gasless_account::AccountError;
use gasless_chain::{ChainError, Revert};
use gasless_forwarder::{ForwarderError, IForwarder};
use gasless_types::{DecodedEnvelope, EncodingError, JsonRpcRequest, RelayEnvelope};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;

#[derive(Debug, Error)]
pub enum RelayError {
	#[error("Invalid envelope: {0}")]
	Envelope(#[from] EncodingError),
	#[error("Request rejected: {0}")]
	Forwarder(#[from] ForwarderError),
	#[error("Account error: {0}")]
	Account(#[from] AccountError),
	#[error("Domain targets chain {chain_id} contract {verifying_contract}, not this node's forwarder")]
	ForeignDomain {
		chain_id: U256,
		verifying_contract: Address,
	},
	#[error("Not registered on this node: {0}")]
	NotRegistered(String),
}

impl From<ChainError> for RelayError {
	fn from(err: ChainError) -> Self {
		match err {
			ChainError::Reverted(revert) => Self::Forwarder(ForwarderError::from_revert(revert)),
			other => Self::Forwarder(ForwarderError::Chain(other)),
		}
	}
}

/// What happened to a relayed request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayOutcome {
	pub from: Address,
	pub nonce: U256,
	/// Whether the target call succeeded. The nonce is consumed either way.
	pub success: bool,
	/// Return data of the target call, or its revert data.
	pub return_data: Bytes,
	pub gas_used: u64,
}

/// Submits envelopes to a node's forwarder from a relayer account.
#[derive(Clone)]
pub struct RelayService {
	node: Arc<Mutex<GaslessNode>>,
	relayer: Address,
}

impl RelayService {
	pub fn new(node: Arc<Mutex<GaslessNode>>, relayer: Address) -> Self {
		Self { node, relayer }
	}

	pub fn node(&self) -> &Arc<Mutex<GaslessNode>> {
		&self.node
	}

	pub fn relayer(&self) -> Address {
		self.relayer
	}

	/// Checks an envelope against the node without submitting it.
	pub async fn verify(&self, envelope: &RelayEnvelope) -> Result<DecodedEnvelope, RelayError> {
		let decoded = envelope.decode()?;
		let node = self.node.lock().await;
		self.verify_with(&node, &decoded)?;
		Ok(decoded)
	}

	/// Verifies and executes an envelope.
	pub async fn relay(&self, envelope: &RelayEnvelope) -> Result<RelayOutcome, RelayError> {
		let decoded = envelope.decode()?;
		let mut node = self.node.lock().await;
		let call = self.verify_with(&node, &decoded)?;

		let request = &decoded.typed.request;
		let forwarder = node.forwarder();
		let receipt = node.chain_mut().transact(
			self.relayer,
			forwarder,
			request.value,
			IForwarder::executeCall {
				req: call.req,
				domainSeparator: call.domainSeparator,
				requestTypeHash: call.requestTypeHash,
				suffixData: call.suffixData,
				sig: call.sig,
			}
			.abi_encode(),
		)?;
		let result = IForwarder::executeCall::abi_decode_returns(&receipt.output, true).map_err(|e| {
			ChainError::Reverted(Revert::message(format!("malformed execute result: {}", e)))
		})?;

		tracing::info!(
			component = "relayer",
			relayer = %self.relayer,
			from = %request.from,
			nonce = %request.nonce,
			success = result.success,
			gas_used = receipt.gas_used,
			"request relayed"
		);
		Ok(RelayOutcome {
			from: request.from,
			nonce: request.nonce,
			success: result.success,
			return_data: result.ret,
			gas_used: receipt.gas_used,
		})
	}

	/// Relays the envelope carried by an `eth_sendRawTransaction` parameter.
	pub async fn handle_raw_transaction(&self, raw: &str) -> Result<RelayOutcome, RelayError> {
		self.relay(&RelayEnvelope::from_raw_transaction(raw)?).await
	}

	/// Relays the envelope of an `eth_sendRawTransaction` JSON-RPC request.
	pub async fn handle_rpc(&self, request: &JsonRpcRequest) -> Result<RelayOutcome, RelayError> {
		let envelope = request.envelope().inspect_err(|e| {
			tracing::warn!(component = "relayer", id = request.id, error = %e, "rejected rpc request");
		})?;
		self.relay(&envelope).await
	}

	fn verify_with(
		&self,
		node: &GaslessNode,
		decoded: &DecodedEnvelope,
	) -> Result<IForwarder::verifyCall, RelayError> {
		let domain = &decoded.typed.domain;
		if domain.chain_id != U256::from(node.chain().chain_id())
			|| domain.verifying_contract != node.forwarder()
		{
			return Err(RelayError::ForeignDomain {
				chain_id: domain.chain_id,
				verifying_contract: domain.verifying_contract,
			});
		}

		let domain_separator: B256 = domain.hash();
		let call = IForwarder::verifyCall {
			req: decoded.typed.request.clone().into(),
			domainSeparator: domain_separator,
			requestTypeHash: decoded.typed.request_type.type_hash(),
			suffixData: decoded.typed.suffix_data()?,
			sig: decoded.signature.clone(),
		};
		if let Err(e) = node
			.chain()
			.call_static(self.relayer, node.forwarder(), call.abi_encode())
		{
			let err = RelayError::from(e);
			tracing::debug!(
				component = "relayer",
				from = %decoded.typed.request.from,
				error = %err,
				"envelope failed verification"
			);
			return Err(err);
		}
		Ok(call)
	}
}
