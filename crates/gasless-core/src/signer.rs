//! Signer side of a relay: builds forward requests, signs them and wraps
//! them in envelopes.

use crate::node::GaslessNode;
use crate::relayer::RelayError;
use alloy_primitives::{Address, Bytes, U256};
use gasless_account::AccountService;
use gasless_config::RelayConfig;
use gasless_types::{
	DomainDescriptor, EncodingError, ForwardRequest, JsonRpcRequest, RelayEnvelope,
	RequestTypeDescriptor, TypedForwardRequest,
};
use std::sync::Arc;

/// A call the signer wants executed, before nonce and expiry are assigned.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallRequest {
	pub to: Address,
	pub value: U256,
	pub data: Bytes,
	/// Gas for the inner call; the relay default when unset.
	pub gas: Option<U256>,
	/// Raw values of the request type's suffix fields, in declaration order.
	pub suffix_values: Vec<Bytes>,
}

/// A forward request together with its signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedRequest {
	pub typed: TypedForwardRequest,
	pub signature: Bytes,
}

impl SignedRequest {
	pub fn envelope(&self) -> Result<RelayEnvelope, EncodingError> {
		RelayEnvelope::new(&self.typed, &self.signature)
	}

	/// The `eth_sendRawTransaction` body carrying the envelope.
	pub fn json_rpc(&self) -> Result<JsonRpcRequest, EncodingError> {
		JsonRpcRequest::send_raw_transaction(&self.envelope()?)
	}
}

/// Signs calls for one account under one domain and request type.
pub struct RequestSigner {
	account: Arc<AccountService>,
	domain: DomainDescriptor,
	request_type: RequestTypeDescriptor,
	default_gas: U256,
	validity_seconds: u64,
}

impl RequestSigner {
	pub fn new(
		account: Arc<AccountService>,
		domain: DomainDescriptor,
		request_type: RequestTypeDescriptor,
		relay: &RelayConfig,
	) -> Self {
		Self {
			account,
			domain,
			request_type,
			default_gas: U256::from(relay.default_gas),
			validity_seconds: relay.validity_seconds,
		}
	}

	/// A signer for `account` using the node's first domain and request type.
	pub fn for_node(node: &GaslessNode, account: Arc<AccountService>) -> Result<Self, RelayError> {
		let domain = node
			.domains()
			.first()
			.ok_or_else(|| RelayError::NotRegistered("no domain".to_string()))?;
		let request_type = node
			.request_types()
			.first()
			.ok_or_else(|| RelayError::NotRegistered("no request type".to_string()))?;
		Ok(Self::new(
			account,
			domain.clone(),
			request_type.clone(),
			node.relay_config(),
		))
	}

	pub fn domain(&self) -> &DomainDescriptor {
		&self.domain
	}

	pub fn request_type(&self) -> &RequestTypeDescriptor {
		&self.request_type
	}

	/// The `validUntilTime` of a request signed at `now`.
	pub fn valid_until(&self, now: u64) -> U256 {
		match self.validity_seconds {
			0 => U256::MAX,
			seconds => U256::from(now.saturating_add(seconds)),
		}
	}

	/// Builds and signs the forward request for `call`.
	pub async fn sign(
		&self,
		call: CallRequest,
		nonce: U256,
		now: u64,
	) -> Result<SignedRequest, RelayError> {
		let from = self.account.get_address().await?;
		let typed = TypedForwardRequest {
			domain: self.domain.clone(),
			request_type: self.request_type.clone(),
			request: ForwardRequest {
				from,
				to: call.to,
				value: call.value,
				gas: call.gas.unwrap_or(self.default_gas),
				nonce,
				data: call.data,
				valid_until_time: self.valid_until(now),
			},
			suffix_values: call.suffix_values,
		};
		typed.suffix_data()?;
		let signature = self.account.sign_forward_request(&typed).await?;
		tracing::debug!(
			component = "signer",
			from = %from,
			to = %typed.request.to,
			nonce = %nonce,
			"forward request signed"
		);
		Ok(SignedRequest { typed, signature })
	}
}
