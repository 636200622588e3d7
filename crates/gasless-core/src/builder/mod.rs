//! Builder that boots a node from configuration.
//!
//! Creates the chain, loads the signing account through its factory, then
//! deploys and wires the system contracts: the forwarder with every
//! configured domain and request type, the vault registry, the native vault
//! and one vault per configured underlying token.

use crate::node::GaslessNode;
use alloy_primitives::{Address, U256};
use gasless_account::{AccountError, AccountInterface, AccountService};
use gasless_chain::Chain;
use gasless_config::Config;
use gasless_forwarder::{Forwarder, ForwarderError};
use gasless_types::DomainDescriptor;
use gasless_vault::{GaslessVault, VaultError, VaultRegistry};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

/// Errors that can occur while booting a node.
#[derive(Debug, Error)]
pub enum BuilderError {
	#[error("Configuration error: {0}")]
	Config(String),
	#[error("Forwarder setup failed: {0}")]
	Forwarder(#[from] ForwarderError),
	#[error("Vault setup failed: {0}")]
	Vault(#[from] VaultError),
}

/// Builder for a [`GaslessNode`].
pub struct GaslessBuilder {
	config: Config,
}

impl GaslessBuilder {
	pub fn new(config: Config) -> Self {
		Self { config }
	}

	/// Boots the node, creating accounts with `account_factories`.
	pub async fn build<AF>(
		self,
		account_factories: HashMap<String, AF>,
	) -> Result<GaslessNode, BuilderError>
	where
		AF: Fn(&toml::Value) -> Result<Box<dyn AccountInterface>, AccountError>,
	{
		let chain_config = &self.config.chain;
		let mut chain = Chain::new(
			chain_config.chain_id,
			chain_config.genesis_timestamp,
			chain_config.block_gas_limit,
		);
		for prefund in &chain_config.prefund {
			chain.set_balance(prefund.address, prefund.amount);
		}

		let account = Arc::new(AccountService::new(self.load_account(&account_factories)?));
		let operator = match account.get_address().await {
			Ok(address) => address,
			Err(e) => {
				tracing::error!(component = "account", error = %e, "Failed to get operator address");
				return Err(BuilderError::Config(format!(
					"Failed to get operator address: {}",
					e
				)));
			},
		};

		let forwarder = chain.deploy(operator, Box::new(Forwarder::new()));
		let mut domains = Vec::new();
		for domain in &self.config.forwarder.domains {
			let separator = chain.invoke::<Forwarder, _, ForwarderError, _>(
				operator,
				forwarder,
				U256::ZERO,
				|f, ctx| f.register_domain_separator(ctx, &domain.name, &domain.version),
			)?;
			let descriptor = DomainDescriptor::new(
				domain.name.clone(),
				domain.version.clone(),
				chain.chain_id(),
				forwarder,
			);
			debug_assert_eq!(descriptor.hash(), separator);
			domains.push(descriptor);
		}
		let request_types = self
			.config
			.request_types()
			.map_err(|e| BuilderError::Config(e.to_string()))?;
		for descriptor in &request_types {
			chain.invoke::<Forwarder, _, ForwarderError, _>(
				operator,
				forwarder,
				U256::ZERO,
				|f, ctx| f.register_request_type(ctx, descriptor.name(), descriptor.suffix()),
			)?;
		}

		let vault_registry = chain.deploy(operator, Box::new(VaultRegistry::new(operator, forwarder)));
		let vaults = &self.config.vaults;
		let native_vault = chain.deploy(
			operator,
			Box::new(GaslessVault::native(
				forwarder,
				vaults.native_name.clone(),
				vaults.native_symbol.clone(),
			)),
		);
		chain.invoke::<VaultRegistry, _, VaultError, _>(
			operator,
			vault_registry,
			U256::ZERO,
			|r, ctx| r.proxy_native_vault(ctx, native_vault),
		)?;

		let mut node = GaslessNode {
			chain,
			account,
			operator,
			forwarder,
			vault_registry,
			native_vault,
			test_token: None,
			domains,
			request_types,
			relay: self.config.relay.clone(),
		};

		let mut underlying: Vec<Address> = Vec::new();
		if vaults.test_token {
			let token = node.deploy_test_token();
			node.test_token = Some(token);
			underlying.push(token);
		}
		underlying.extend(vaults.underlying.iter().copied());
		for token in underlying {
			if let Err(e) = node.create_vault(token) {
				tracing::error!(
					component = "vault_registry",
					underlying = %token,
					error = %e,
					"Failed to create vault"
				);
				return Err(e.into());
			}
		}

		tracing::info!(
			component = "builder",
			chain_id = node.chain.chain_id(),
			operator = %operator,
			forwarder = %forwarder,
			vault_registry = %vault_registry,
			native_vault = %native_vault,
			"Node ready"
		);
		Ok(node)
	}

	fn load_account<AF>(
		&self,
		account_factories: &HashMap<String, AF>,
	) -> Result<Box<dyn AccountInterface>, BuilderError>
	where
		AF: Fn(&toml::Value) -> Result<Box<dyn AccountInterface>, AccountError>,
	{
		let primary = self.config.account.primary.as_str();
		let config = self
			.config
			.primary_account()
			.map_err(|e| BuilderError::Config(e.to_string()))?;
		let factory = account_factories.get(primary).ok_or_else(|| {
			BuilderError::Config(format!("Unknown account implementation '{}'", primary))
		})?;

		match factory(config) {
			Ok(implementation) => {
				tracing::info!(component = "account", implementation = %primary, "Loaded");
				Ok(implementation)
			},
			Err(e) => {
				tracing::error!(
					component = "account",
					implementation = %primary,
					error = %e,
					"Failed to create account implementation"
				);
				Err(BuilderError::Config(format!(
					"Failed to create account implementation '{}': {}",
					primary, e
				)))
			},
		}
	}
}
