//! The forwarder contract.

use crate::{registry::TypeRegistry, ForwarderError, IForwarder};
use alloy_primitives::{Address, Bytes, B256, U256};
use alloy_sol_types::SolCall;
use gasless_account::recover_signer;
use gasless_chain::{decode_call, gas, unknown_selector, CallContext, ContractInterface, Revert};
use gasless_types::{forward_request_digest, DomainDescriptor, ForwardRequest, RequestTypeDescriptor};
use std::collections::HashMap;

/// Bytes of callee return data kept in the `ExecutionResult` event.
pub const RETURN_DATA_LOG_LIMIT: usize = 256;

/// Verifies signed forward requests and executes them for their signers.
///
/// Owns the domain and request-type registry and the per-signer nonces.
/// Registration is open to anyone: a registered entry only says that a
/// hash is known, it grants no authority.
#[derive(Debug, Clone, Default)]
pub struct Forwarder {
	registry: TypeRegistry,
	nonces: HashMap<Address, U256>,
}

impl Forwarder {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn registry(&self) -> &TypeRegistry {
		&self.registry
	}

	/// The nonce the next request from `from` must carry.
	pub fn get_nonce(&self, from: &Address) -> U256 {
		self.nonces.get(from).copied().unwrap_or_default()
	}

	pub fn is_registered_domain(&self, hash: &B256) -> bool {
		self.registry.is_registered_domain(hash)
	}

	pub fn is_registered_request_type(&self, hash: &B256) -> bool {
		self.registry.is_registered_request_type(hash)
	}

	/// Registers the domain `(name, version)` bound to this chain and this
	/// forwarder. Registering an existing domain returns the same separator
	/// and leaves the registry untouched.
	pub fn register_domain_separator(
		&mut self,
		ctx: &mut CallContext<'_>,
		name: &str,
		version: &str,
	) -> Result<B256, ForwarderError> {
		let domain = DomainDescriptor::new(name, version, ctx.chain_id(), ctx.this());
		let (hash, inserted) = self.registry.register_domain(&domain);
		if inserted {
			ctx.charge_sstore(true)?;
			tracing::info!(
				component = "forwarder",
				name,
				version,
				domain_separator = %hash,
				"domain registered"
			);
		}
		ctx.emit(&IForwarder::DomainRegistered {
			domainSeparator: hash,
			domainValue: domain.encode(),
		})?;
		Ok(hash)
	}

	/// Registers the request type `name(GENERIC_PARAMS,suffix`.
	pub fn register_request_type(
		&mut self,
		ctx: &mut CallContext<'_>,
		name: &str,
		suffix: &str,
	) -> Result<B256, ForwarderError> {
		let descriptor = RequestTypeDescriptor::new(name, suffix)?;
		let type_string = descriptor.type_string();
		let (hash, inserted) = self.registry.register_request_type(descriptor);
		if inserted {
			ctx.charge_sstore(true)?;
			tracing::info!(
				component = "forwarder",
				type_string = %type_string,
				type_hash = %hash,
				"request type registered"
			);
		}
		ctx.emit(&IForwarder::RequestTypeRegistered {
			typeHash: hash,
			typeStr: type_string,
		})?;
		Ok(hash)
	}

	/// Checks a request without executing it: registered domain and type,
	/// expiry, nonce, and that `signature` recovers to `req.from`.
	pub fn verify(
		&self,
		ctx: &CallContext<'_>,
		req: &ForwardRequest,
		domain_separator: &B256,
		request_type_hash: &B256,
		suffix_data: &[u8],
		signature: &[u8],
	) -> Result<(), ForwarderError> {
		if !self.registry.is_registered_domain(domain_separator) {
			return Err(ForwarderError::UnregisteredDomain(*domain_separator));
		}
		let Some(request_type) = self.registry.request_type(request_type_hash) else {
			return Err(ForwarderError::UnregisteredRequestType(*request_type_hash));
		};
		if req.is_expired_at(ctx.block_timestamp()) {
			return Err(ForwarderError::RequestExpired {
				valid_until_time: req.valid_until_time,
				block_timestamp: U256::from(ctx.block_timestamp()),
			});
		}
		let expected = self.get_nonce(&req.from);
		if req.nonce != expected {
			return Err(ForwarderError::NonceMismatch {
				from: req.from,
				expected,
				actual: req.nonce,
			});
		}

		let digest = forward_request_digest(domain_separator, request_type, req, suffix_data)?;
		match recover_signer(&digest, signature) {
			Ok(signer) if signer == req.from => Ok(()),
			Ok(signer) => {
				tracing::debug!(
					component = "forwarder",
					from = %req.from,
					recovered = %signer,
					"signature belongs to another account"
				);
				Err(ForwarderError::InvalidSignature(req.from))
			},
			Err(e) => {
				tracing::debug!(component = "forwarder", from = %req.from, error = %e, "unrecoverable signature");
				Err(ForwarderError::InvalidSignature(req.from))
			},
		}
	}

	/// Verifies `req`, consumes its nonce and calls `req.to` on behalf of
	/// `req.from`.
	///
	/// A failing callee does not fail the execution: the nonce stays consumed
	/// and the callee's revert data comes back as `(false, data)`. Native
	/// currency left on the forwarder afterwards is refunded to `req.from`.
	pub fn execute(
		&mut self,
		ctx: &mut CallContext<'_>,
		req: &ForwardRequest,
		domain_separator: &B256,
		request_type_hash: &B256,
		suffix_data: &[u8],
		signature: &[u8],
	) -> Result<(bool, Bytes), ForwarderError> {
		self.verify(
			ctx,
			req,
			domain_separator,
			request_type_hash,
			suffix_data,
			signature,
		)?;

		// The nonce is consumed before the target runs, so the target cannot
		// replay the request from within.
		ctx.charge_sstore(req.nonce.is_zero())?;
		self.nonces.insert(req.from, req.nonce + U256::from(1));

		let mut overhead = gas::CALL;
		if !req.value.is_zero() {
			overhead += gas::CALL_VALUE;
		}
		let available = gas::max_call_gas(ctx.gas_left().saturating_sub(overhead));
		let call_gas = u64::try_from(req.gas)
			.ok()
			.filter(|requested| *requested <= available)
			.ok_or(ForwarderError::InsufficientGas {
				requested: req.gas,
				available: U256::from(available),
			})?;

		let mut data = Vec::with_capacity(req.data.len() + 20);
		data.extend_from_slice(&req.data);
		data.extend_from_slice(req.from.as_slice());
		let (success, ret) = match ctx.call(req.to, req.value, data, Some(call_gas)) {
			Ok(ret) => (true, ret),
			Err(revert) => (false, revert.data),
		};

		let leftover = ctx.self_balance();
		if !leftover.is_zero() {
			ctx.transfer_native(req.from, leftover)?;
		}

		let logged = Bytes::from(ret[..ret.len().min(RETURN_DATA_LOG_LIMIT)].to_vec());
		ctx.emit(&IForwarder::ExecutionResult {
			from: req.from,
			nonce: req.nonce,
			success,
			returnData: logged,
		})?;
		tracing::info!(
			component = "forwarder",
			from = %req.from,
			to = %req.to,
			nonce = %req.nonce,
			success,
			"forward request executed"
		);
		Ok((success, ret))
	}
}

impl ContractInterface for Forwarder {
	fn kind(&self) -> &'static str {
		"Forwarder"
	}

	fn call(&mut self, ctx: &mut CallContext<'_>, input: &[u8]) -> Result<Bytes, Revert> {
		use IForwarder::IForwarderCalls as Calls;

		let Some(call) = decode_call::<Calls>(input)? else {
			return Err(unknown_selector(input));
		};
		if !ctx.msg_value().is_zero() && !matches!(call, Calls::execute(_)) {
			return Err(Revert::message("function is not payable"));
		}

		let output = match call {
			Calls::getNonce(c) => IForwarder::getNonceCall::abi_encode_returns(&(self.get_nonce(&c.from),)),
			Calls::registerDomainSeparator(c) => {
				let hash = self.register_domain_separator(ctx, &c.name, &c.version)?;
				IForwarder::registerDomainSeparatorCall::abi_encode_returns(&(hash,))
			},
			Calls::registerRequestType(c) => {
				let hash = self.register_request_type(ctx, &c.typeName, &c.typeSuffix)?;
				IForwarder::registerRequestTypeCall::abi_encode_returns(&(hash,))
			},
			Calls::isRegisteredDomain(c) => IForwarder::isRegisteredDomainCall::abi_encode_returns(
				&(self.is_registered_domain(&c.domainSeparator),),
			),
			Calls::isRegisteredRequestType(c) => {
				IForwarder::isRegisteredRequestTypeCall::abi_encode_returns(&(self
					.is_registered_request_type(&c.requestTypeHash),))
			},
			Calls::verify(c) => {
				self.verify(
					ctx,
					&c.req.into(),
					&c.domainSeparator,
					&c.requestTypeHash,
					&c.suffixData,
					&c.sig,
				)?;
				Vec::new()
			},
			Calls::execute(c) => {
				let (success, ret) = self.execute(
					ctx,
					&c.req.into(),
					&c.domainSeparator,
					&c.requestTypeHash,
					&c.suffixData,
					&c.sig,
				)?;
				IForwarder::executeCall::abi_encode_returns(&(success, ret))
			},
		};
		Ok(output.into())
	}
}
