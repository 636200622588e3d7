//! Configuration builder for tests and local tooling.

use crate::{
	AccountConfig, ChainConfig, Config, DomainConfig, ForwarderConfig, PrefundConfig,
	RelayConfig, RequestTypeConfig, VaultsConfig,
};
use gasless_types::{Address, U256};
use std::collections::HashMap;

/// Builds a [`Config`] with defaults suitable for a local node.
///
/// The defaults register the `("my domain name", "1")` domain and the
/// `"my type name"` request type with an eight-byte suffix, and sign with the
/// first well-known development key.
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
	chain_id: u64,
	genesis_timestamp: u64,
	block_gas_limit: u64,
	prefund: Vec<PrefundConfig>,
	domains: Vec<DomainConfig>,
	request_types: Vec<RequestTypeConfig>,
	vaults: VaultsConfig,
	private_key: String,
	relay: RelayConfig,
}

impl Default for ConfigBuilder {
	fn default() -> Self {
		Self::new()
	}
}

impl ConfigBuilder {
	pub fn new() -> Self {
		Self {
			chain_id: 1337,
			genesis_timestamp: 1_700_000_000,
			block_gas_limit: 30_000_000,
			prefund: Vec::new(),
			domains: vec![DomainConfig {
				name: "my domain name".to_string(),
				version: "1".to_string(),
			}],
			request_types: vec![RequestTypeConfig {
				name: "my type name".to_string(),
				suffix: "bytes8 typeSuffixDatadatadatada)".to_string(),
			}],
			vaults: VaultsConfig::default(),
			private_key: "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80"
				.to_string(),
			relay: RelayConfig::default(),
		}
	}

	pub fn chain_id(mut self, chain_id: u64) -> Self {
		self.chain_id = chain_id;
		self
	}

	pub fn genesis_timestamp(mut self, timestamp: u64) -> Self {
		self.genesis_timestamp = timestamp;
		self
	}

	pub fn block_gas_limit(mut self, gas: u64) -> Self {
		self.block_gas_limit = gas;
		self
	}

	pub fn prefund(mut self, address: Address, amount: U256) -> Self {
		self.prefund.push(PrefundConfig { address, amount });
		self
	}

	/// Adds a domain to the default one.
	pub fn domain(mut self, name: impl Into<String>, version: impl Into<String>) -> Self {
		self.domains.push(DomainConfig {
			name: name.into(),
			version: version.into(),
		});
		self
	}

	/// Adds a request type to the default one.
	pub fn request_type(mut self, name: impl Into<String>, suffix: impl Into<String>) -> Self {
		self.request_types.push(RequestTypeConfig {
			name: name.into(),
			suffix: suffix.into(),
		});
		self
	}

	pub fn test_token(mut self, enabled: bool) -> Self {
		self.vaults.test_token = enabled;
		self
	}

	pub fn private_key(mut self, key: impl Into<String>) -> Self {
		self.private_key = key.into();
		self
	}

	pub fn default_gas(mut self, gas: u64) -> Self {
		self.relay.default_gas = gas;
		self
	}

	pub fn validity_seconds(mut self, seconds: u64) -> Self {
		self.relay.validity_seconds = seconds;
		self
	}

	pub fn build(self) -> Config {
		let mut local = toml::Table::new();
		local.insert(
			"private_key".to_string(),
			toml::Value::String(self.private_key),
		);
		let mut implementations = HashMap::new();
		implementations.insert("local".to_string(), toml::Value::Table(local));

		Config {
			chain: ChainConfig {
				chain_id: self.chain_id,
				genesis_timestamp: self.genesis_timestamp,
				block_gas_limit: self.block_gas_limit,
				prefund: self.prefund,
			},
			forwarder: ForwarderConfig {
				domains: self.domains,
				request_types: self.request_types,
			},
			vaults: self.vaults,
			account: AccountConfig {
				primary: "local".to_string(),
				implementations,
			},
			relay: self.relay,
		}
	}
}
