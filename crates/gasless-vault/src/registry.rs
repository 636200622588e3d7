//! Vault registry: one vault per underlying asset.

use crate::{vault::GaslessVault, IVaultRegistry, VaultError};
use alloy_primitives::{Address, Bytes, U256};
use alloy_sol_types::SolCall;
use gasless_chain::{decode_call, unknown_selector, CallContext, ContractInterface, Revert, IERC20};
use std::collections::HashMap;

/// Decimals assumed for an underlying token that does not report them.
pub const DEFAULT_DECIMALS: u8 = 18;

/// Deploys and indexes gasless vaults.
///
/// ERC-20 vaults are created here, keyed by their underlying token. The
/// native vault has no token address to key on: it is deployed elsewhere and
/// linked in once by the owner, after which it is listed under the zero
/// address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VaultRegistry {
	owner: Address,
	forwarder: Address,
	gasless_tokens: HashMap<Address, Address>,
	native_vault: Address,
}

impl VaultRegistry {
	pub fn new(owner: Address, forwarder: Address) -> Self {
		Self {
			owner,
			forwarder,
			gasless_tokens: HashMap::new(),
			native_vault: Address::ZERO,
		}
	}

	pub fn owner(&self) -> Address {
		self.owner
	}

	/// The forwarder every vault created here trusts.
	pub fn forwarder(&self) -> Address {
		self.forwarder
	}

	/// The vault of `underlying`, or the zero address if there is none.
	pub fn gasless_token(&self, underlying: &Address) -> Address {
		self.gasless_tokens
			.get(underlying)
			.copied()
			.unwrap_or_default()
	}

	pub fn native_vault(&self) -> Address {
		self.native_vault
	}

	/// Deploys the vault of `underlying`, named after it.
	///
	/// The mapping is written before the underlying token is called for its
	/// metadata, so the token cannot get a second vault registered meanwhile.
	pub fn create_vault(
		&mut self,
		ctx: &mut CallContext<'_>,
		underlying: Address,
	) -> Result<Address, VaultError> {
		if underlying.is_zero() {
			return Err(VaultError::InvalidUnderlying(underlying));
		}
		let existing = self.gasless_token(&underlying);
		if !existing.is_zero() {
			return Err(VaultError::AlreadyRegistered {
				underlying,
				vault: existing,
			});
		}

		let vault = ctx.next_deploy_address();
		ctx.charge_sstore(true)?;
		self.gasless_tokens.insert(underlying, vault);

		let failed = |reason| VaultError::UnderlyingCallFailed { underlying, reason };
		let name = ctx
			.call_sol(underlying, U256::ZERO, &IERC20::nameCall {})
			.map_err(failed)?
			._0;
		let symbol = ctx
			.call_sol(underlying, U256::ZERO, &IERC20::symbolCall {})
			.map_err(failed)?
			._0;
		let decimals = ctx
			.call_sol(underlying, U256::ZERO, &IERC20::decimalsCall {})
			.map(|r| r._0)
			.unwrap_or(DEFAULT_DECIMALS);

		let vault_name = format!("Gasless {}", name);
		let vault_symbol = format!("g{}", symbol);
		let deployed = ctx.deploy(Box::new(GaslessVault::erc20(
			underlying,
			self.forwarder,
			vault_name.clone(),
			vault_symbol.clone(),
			decimals,
		)))?;
		if deployed != vault {
			return Err(Revert::message(format!(
				"vault deployed at {} instead of {}",
				deployed, vault
			))
			.into());
		}

		ctx.emit(&IVaultRegistry::VaultCreated {
			underlying,
			vault,
			name: vault_name.clone(),
			symbol: vault_symbol.clone(),
		})?;
		tracing::info!(
			component = "vault_registry",
			underlying = %underlying,
			vault = %vault,
			name = %vault_name,
			symbol = %vault_symbol,
			"vault created"
		);
		Ok(vault)
	}

	/// Links the externally deployed native vault. Owner only, once.
	pub fn proxy_native_vault(
		&mut self,
		ctx: &mut CallContext<'_>,
		vault: Address,
	) -> Result<(), VaultError> {
		let caller = ctx.msg_sender();
		if caller != self.owner {
			return Err(VaultError::Unauthorized(caller));
		}
		if !self.native_vault.is_zero() {
			return Err(VaultError::AlreadyProxied(self.native_vault));
		}

		ctx.charge_sstore(true)?;
		ctx.charge_sstore(true)?;
		self.native_vault = vault;
		self.gasless_tokens.insert(Address::ZERO, vault);
		ctx.emit(&IVaultRegistry::NativeVaultProxied { vault })?;
		tracing::info!(component = "vault_registry", vault = %vault, "native vault proxied");
		Ok(())
	}
}

impl ContractInterface for VaultRegistry {
	fn kind(&self) -> &'static str {
		"VaultRegistry"
	}

	fn call(&mut self, ctx: &mut CallContext<'_>, input: &[u8]) -> Result<Bytes, Revert> {
		use IVaultRegistry::IVaultRegistryCalls as Calls;

		let Some(call) = decode_call::<Calls>(input)? else {
			return Err(unknown_selector(input));
		};
		if !ctx.msg_value().is_zero() {
			return Err(Revert::message("function is not payable"));
		}
		let output = match call {
			Calls::createVault(c) => {
				let vault = self.create_vault(ctx, c.underlying)?;
				IVaultRegistry::createVaultCall::abi_encode_returns(&(vault,))
			},
			Calls::proxyNativeVault(c) => {
				self.proxy_native_vault(ctx, c.vault)?;
				Vec::new()
			},
			Calls::gaslessTokens(c) => IVaultRegistry::gaslessTokensCall::abi_encode_returns(&(
				self.gasless_token(&c.underlying),
			)),
			Calls::nativeVault(_) => {
				IVaultRegistry::nativeVaultCall::abi_encode_returns(&(self.native_vault,))
			},
			Calls::forwarder(_) => {
				IVaultRegistry::forwarderCall::abi_encode_returns(&(self.forwarder,))
			},
			Calls::owner(_) => IVaultRegistry::ownerCall::abi_encode_returns(&(self.owner,)),
		};
		Ok(output.into())
	}
}
