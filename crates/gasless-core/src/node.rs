//! A booted node: the chain plus the addresses of its system contracts.

use alloy_primitives::{Address, U256};
use alloy_sol_types::SolCall;
use gasless_account::AccountService;
use gasless_chain::implementations::counter::GaslessCounter;
use gasless_chain::implementations::test_token::{ITestERC20, TestErc20};
use gasless_chain::{Chain, ChainError};
use gasless_config::RelayConfig;
use gasless_forwarder::Forwarder;
use gasless_types::{DomainDescriptor, RequestTypeDescriptor};
use gasless_vault::{GaslessVault, VaultError, VaultRegistry};
use std::sync::Arc;

/// Everything [`GaslessBuilder`](crate::GaslessBuilder) deployed.
pub struct GaslessNode {
	pub(crate) chain: Chain,
	pub(crate) account: Arc<AccountService>,
	pub(crate) operator: Address,
	pub(crate) forwarder: Address,
	pub(crate) vault_registry: Address,
	pub(crate) native_vault: Address,
	pub(crate) test_token: Option<Address>,
	pub(crate) domains: Vec<DomainDescriptor>,
	pub(crate) request_types: Vec<RequestTypeDescriptor>,
	pub(crate) relay: RelayConfig,
}

impl GaslessNode {
	pub fn chain(&self) -> &Chain {
		&self.chain
	}

	pub fn chain_mut(&mut self) -> &mut Chain {
		&mut self.chain
	}

	/// The primary account, which deployed and owns the system contracts.
	pub fn account(&self) -> &Arc<AccountService> {
		&self.account
	}

	pub fn operator(&self) -> Address {
		self.operator
	}

	pub fn forwarder(&self) -> Address {
		self.forwarder
	}

	pub fn vault_registry(&self) -> Address {
		self.vault_registry
	}

	pub fn native_vault(&self) -> Address {
		self.native_vault
	}

	/// The mintable test token, when the node was configured with one.
	pub fn test_token(&self) -> Option<Address> {
		self.test_token
	}

	pub fn relay_config(&self) -> &RelayConfig {
		&self.relay
	}

	/// Registered domains, in configuration order.
	pub fn domains(&self) -> &[DomainDescriptor] {
		&self.domains
	}

	pub fn domain(&self, name: &str, version: &str) -> Option<&DomainDescriptor> {
		self.domains
			.iter()
			.find(|d| d.name == name && d.version == version)
	}

	/// Registered request types, in configuration order.
	pub fn request_types(&self) -> &[RequestTypeDescriptor] {
		&self.request_types
	}

	pub fn request_type(&self, name: &str) -> Option<&RequestTypeDescriptor> {
		self.request_types.iter().find(|t| t.name() == name)
	}

	/// The nonce the forwarder expects next from `from`.
	pub fn nonce(&self, from: &Address) -> Result<U256, ChainError> {
		self.chain
			.view::<Forwarder, _>(self.forwarder, |f| f.get_nonce(from))
	}

	/// The vault of `underlying`; zero when none exists.
	pub fn gasless_token(&self, underlying: &Address) -> Result<Address, ChainError> {
		self.chain
			.view::<VaultRegistry, _>(self.vault_registry, |r| r.gasless_token(underlying))
	}

	/// Balance of `account` in the vault at `vault`.
	pub fn vault_balance(&self, vault: Address, account: &Address) -> Result<U256, ChainError> {
		self.chain
			.view::<GaslessVault, _>(vault, |v| v.balance_of(account))
	}

	/// Creates the vault of `underlying` from the operator account.
	pub fn create_vault(&mut self, underlying: Address) -> Result<Address, VaultError> {
		self.chain.invoke::<VaultRegistry, _, VaultError, _>(
			self.operator,
			self.vault_registry,
			U256::ZERO,
			|registry, ctx| registry.create_vault(ctx, underlying),
		)
	}

	/// Deploys a counter trusting this node's forwarder.
	pub fn deploy_counter(&mut self) -> Address {
		self.chain
			.deploy(self.operator, Box::new(GaslessCounter::new(self.forwarder)))
	}

	/// Deploys another mintable test token.
	pub fn deploy_test_token(&mut self) -> Address {
		self.chain.deploy(self.operator, Box::new(TestErc20::new()))
	}

	/// Mints `amount` of the test token at `token` to `to`.
	pub fn mint(&mut self, token: Address, to: Address, amount: U256) -> Result<(), ChainError> {
		self.chain
			.transact(
				self.operator,
				token,
				U256::ZERO,
				ITestERC20::mintCall { to, amount }.abi_encode(),
			)
			.map(|_| ())
	}
}

impl std::fmt::Debug for GaslessNode {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("GaslessNode")
			.field("chain_id", &self.chain.chain_id())
			.field("operator", &self.operator)
			.field("forwarder", &self.forwarder)
			.field("vault_registry", &self.vault_registry)
			.field("native_vault", &self.native_vault)
			.field("test_token", &self.test_token)
			.finish_non_exhaustive()
	}
}
