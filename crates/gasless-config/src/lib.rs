//! Configuration module for the gasless relay system.
//!
//! A node is described by a TOML file: the simulated chain it boots, the
//! domains and request types registered on its forwarder, the vaults it
//! provisions, the signing account and relay defaults.
//!
//! ## Modular Configuration Support
//!
//! Configurations can be split into multiple files:
//! - Use `include = ["file1.toml", "file2.toml"]` to include other config files
//! - Each top-level section must be unique across all files (no duplicates allowed)
//!
//! String values may reference environment variables as `${VAR}` or
//! `${VAR:-default}`.

mod loader;

pub mod builders {
	pub mod config;
}

use gasless_types::{Address, RequestTypeDescriptor, U256};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

pub use loader::ConfigLoader;

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),
	#[error("Configuration error: {0}")]
	Parse(String),
	#[error("Validation error: {0}")]
	Validation(String),
}

impl From<toml::de::Error> for ConfigError {
	fn from(err: toml::de::Error) -> Self {
		// Keep the message only; the default rendering dumps the input.
		ConfigError::Parse(err.message().to_string())
	}
}

/// Top-level node configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
	pub chain: ChainConfig,
	pub forwarder: ForwarderConfig,
	#[serde(default)]
	pub vaults: VaultsConfig,
	pub account: AccountConfig,
	#[serde(default)]
	pub relay: RelayConfig,
}

/// The simulated chain a node boots.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChainConfig {
	pub chain_id: u64,
	/// Block timestamp of the genesis block, in Unix seconds.
	#[serde(default = "default_genesis_timestamp")]
	pub genesis_timestamp: u64,
	/// Gas available to a single top-level transaction.
	#[serde(default = "default_block_gas_limit")]
	pub block_gas_limit: u64,
	/// Native balances credited at genesis.
	#[serde(default)]
	pub prefund: Vec<PrefundConfig>,
}

fn default_genesis_timestamp() -> u64 {
	1_700_000_000
}

fn default_block_gas_limit() -> u64 {
	30_000_000
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PrefundConfig {
	pub address: Address,
	/// Amount in wei, as a decimal or 0x-prefixed string.
	pub amount: U256,
}

/// Domains and request types registered on the forwarder at boot.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ForwarderConfig {
	pub domains: Vec<DomainConfig>,
	pub request_types: Vec<RequestTypeConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct DomainConfig {
	pub name: String,
	pub version: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct RequestTypeConfig {
	pub name: String,
	/// Trailing field list closing the type, e.g. `bytes8 typeSuffixDatadatadatada)`.
	pub suffix: String,
}

impl RequestTypeConfig {
	pub fn descriptor(&self) -> Result<RequestTypeDescriptor, ConfigError> {
		RequestTypeDescriptor::new(self.name.clone(), self.suffix.clone()).map_err(|e| {
			ConfigError::Validation(format!("Request type '{}': {}", self.name, e))
		})
	}
}

/// Vaults provisioned at boot.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct VaultsConfig {
	#[serde(default = "default_native_name")]
	pub native_name: String,
	#[serde(default = "default_native_symbol")]
	pub native_symbol: String,
	/// Deploys a mintable `TestERC20` and creates its vault.
	#[serde(default)]
	pub test_token: bool,
	/// Underlying token contracts to create vaults for.
	#[serde(default)]
	pub underlying: Vec<Address>,
}

impl Default for VaultsConfig {
	fn default() -> Self {
		Self {
			native_name: default_native_name(),
			native_symbol: default_native_symbol(),
			test_token: false,
			underlying: Vec::new(),
		}
	}
}

fn default_native_name() -> String {
	"Gasless AVAX".to_string()
}

fn default_native_symbol() -> String {
	"gAVAX".to_string()
}

/// Configuration for account management.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AccountConfig {
	/// Which implementation to use as primary.
	pub primary: String,
	/// Map of account implementation names to their configurations.
	pub implementations: HashMap<String, toml::Value>,
}

/// Defaults applied when building requests for relay.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RelayConfig {
	/// Endpoint the JSON-RPC body is addressed to.
	#[serde(default = "default_rpc_url")]
	pub rpc_url: String,
	/// Gas limit signed into requests that do not set one.
	#[serde(default = "default_gas")]
	pub default_gas: u64,
	/// Seconds a signed request stays valid; 0 signs requests that never expire.
	#[serde(default)]
	pub validity_seconds: u64,
}

impl Default for RelayConfig {
	fn default() -> Self {
		Self {
			rpc_url: default_rpc_url(),
			default_gas: default_gas(),
			validity_seconds: 0,
		}
	}
}

fn default_rpc_url() -> String {
	"http://127.0.0.1:8545".to_string()
}

fn default_gas() -> u64 {
	0x1d0f6
}

/// Resolves environment variables in a string.
///
/// Replaces ${VAR_NAME} with the value of the environment variable VAR_NAME.
/// Supports default values with ${VAR_NAME:-default_value}.
///
/// Input strings are limited to 1MB to prevent ReDoS attacks.
pub(crate) fn resolve_env_vars(input: &str) -> Result<String, ConfigError> {
	const MAX_INPUT_SIZE: usize = 1024 * 1024;
	if input.len() > MAX_INPUT_SIZE {
		return Err(ConfigError::Validation(format!(
			"Configuration file too large: {} bytes (max: {} bytes)",
			input.len(),
			MAX_INPUT_SIZE
		)));
	}

	let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]{0,127})(?::-([^}]{0,256}))?\}")
		.map_err(|e| ConfigError::Parse(format!("Regex error: {}", e)))?;

	let mut result = String::with_capacity(input.len());
	let mut last = 0;
	for cap in re.captures_iter(input) {
		let (Some(full_match), Some(var_name)) = (cap.get(0), cap.get(1)) else {
			continue;
		};
		let value = match std::env::var(var_name.as_str()) {
			Ok(v) => v,
			Err(_) => match cap.get(2) {
				Some(default) => default.as_str().to_string(),
				None => {
					return Err(ConfigError::Validation(format!(
						"Environment variable '{}' not found",
						var_name.as_str()
					)))
				},
			},
		};
		result.push_str(&input[last..full_match.start()]);
		result.push_str(&value);
		last = full_match.end();
	}
	result.push_str(&input[last..]);

	Ok(result)
}

impl Config {
	/// Loads configuration from a file, following `include` directives.
	pub async fn from_file(path: &str) -> Result<Self, ConfigError> {
		let path_buf = Path::new(path);
		let base_dir = path_buf.parent().unwrap_or_else(|| Path::new("."));

		let mut loader = loader::ConfigLoader::new(base_dir);
		let file_name = path_buf
			.file_name()
			.ok_or_else(|| ConfigError::Validation(format!("Invalid path: {}", path)))?;
		loader.load_config(file_name).await
	}

	/// Parsed request-type descriptors, in configuration order.
	pub fn request_types(&self) -> Result<Vec<RequestTypeDescriptor>, ConfigError> {
		self.forwarder
			.request_types
			.iter()
			.map(RequestTypeConfig::descriptor)
			.collect()
	}

	/// The primary account implementation's table.
	pub fn primary_account(&self) -> Result<&toml::Value, ConfigError> {
		self.account
			.implementations
			.get(&self.account.primary)
			.ok_or_else(|| {
				ConfigError::Validation(format!(
					"Primary account implementation '{}' is not configured",
					self.account.primary
				))
			})
	}

	fn validate(&self) -> Result<(), ConfigError> {
		if self.chain.chain_id == 0 {
			return Err(ConfigError::Validation("Chain ID cannot be 0".into()));
		}
		if self.chain.block_gas_limit == 0 {
			return Err(ConfigError::Validation(
				"Block gas limit must be greater than 0".into(),
			));
		}

		if self.forwarder.domains.is_empty() {
			return Err(ConfigError::Validation(
				"At least one forwarder domain must be configured".into(),
			));
		}
		let mut domains = HashSet::new();
		for domain in &self.forwarder.domains {
			if domain.name.is_empty() || domain.version.is_empty() {
				return Err(ConfigError::Validation(
					"Domain name and version cannot be empty".into(),
				));
			}
			if !domains.insert(domain) {
				return Err(ConfigError::Validation(format!(
					"Domain ('{}', '{}') is configured twice",
					domain.name, domain.version
				)));
			}
		}

		if self.forwarder.request_types.is_empty() {
			return Err(ConfigError::Validation(
				"At least one request type must be configured".into(),
			));
		}
		let mut type_hashes = HashSet::new();
		for descriptor in self.request_types()? {
			if !type_hashes.insert(descriptor.type_hash()) {
				return Err(ConfigError::Validation(format!(
					"Request type '{}' is configured twice",
					descriptor.type_string()
				)));
			}
		}

		if self.vaults.native_name.is_empty() || self.vaults.native_symbol.is_empty() {
			return Err(ConfigError::Validation(
				"Native vault name and symbol cannot be empty".into(),
			));
		}
		if self.vaults.underlying.contains(&Address::ZERO) {
			return Err(ConfigError::Validation(
				"The zero address is reserved for the native vault".into(),
			));
		}

		if self.account.primary.is_empty() {
			return Err(ConfigError::Validation(
				"Account primary implementation cannot be empty".into(),
			));
		}
		self.primary_account()?;

		if self.relay.default_gas == 0 {
			return Err(ConfigError::Validation(
				"Relay default gas must be greater than 0".into(),
			));
		}
		if self.relay.default_gas > self.chain.block_gas_limit {
			return Err(ConfigError::Validation(format!(
				"Relay default gas {} exceeds the block gas limit {}",
				self.relay.default_gas, self.chain.block_gas_limit
			)));
		}

		Ok(())
	}
}

/// Parses a TOML string, resolving environment variables and validating the result.
impl FromStr for Config {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let resolved = resolve_env_vars(s)?;
		let config: Config = toml::from_str(&resolved)?;
		config.validate()?;
		Ok(config)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	pub(crate) const SAMPLE: &str = r#"
[chain]
chain_id = 43113

[forwarder]
domains = [{ name = "my domain name", version = "1" }]
request_types = [{ name = "my type name", suffix = "bytes8 typeSuffixDatadatadatada)" }]

[account]
primary = "local"
[account.implementations.local]
private_key = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80"
"#;

	#[test]
	fn test_env_var_resolution() {
		std::env::set_var("GASLESS_TEST_HOST", "localhost");
		std::env::set_var("GASLESS_TEST_PORT", "8545");

		let input = "rpc_url = \"http://${GASLESS_TEST_HOST}:${GASLESS_TEST_PORT}\"";
		let result = resolve_env_vars(input).unwrap();
		assert_eq!(result, "rpc_url = \"http://localhost:8545\"");

		std::env::remove_var("GASLESS_TEST_HOST");
		std::env::remove_var("GASLESS_TEST_PORT");
	}

	#[test]
	fn test_env_var_with_default() {
		let input = "value = \"${GASLESS_MISSING_VAR:-fallback}\"";
		assert_eq!(resolve_env_vars(input).unwrap(), "value = \"fallback\"");
	}

	#[test]
	fn test_missing_env_var_error() {
		let result = resolve_env_vars("value = \"${GASLESS_MISSING_VAR}\"");
		assert!(result.unwrap_err().to_string().contains("GASLESS_MISSING_VAR"));
	}

	#[test]
	fn test_defaults_applied() {
		let config: Config = SAMPLE.parse().unwrap();
		assert_eq!(config.chain.chain_id, 43113);
		assert_eq!(config.chain.block_gas_limit, 30_000_000);
		assert_eq!(config.vaults.native_symbol, "gAVAX");
		assert_eq!(config.relay.default_gas, 0x1d0f6);
		assert_eq!(config.relay.validity_seconds, 0);
		assert_eq!(config.request_types().unwrap()[0].name(), "my type name");
		assert!(config.primary_account().unwrap().get("private_key").is_some());
	}

	#[test]
	fn test_private_key_from_env() {
		std::env::set_var(
			"GASLESS_TEST_KEY",
			"0x59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d",
		);
		let source = SAMPLE.replace(
			"0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80",
			"${GASLESS_TEST_KEY}",
		);
		let config: Config = source.parse().unwrap();
		assert_eq!(
			config.primary_account().unwrap()["private_key"].as_str(),
			Some("0x59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d")
		);
		std::env::remove_var("GASLESS_TEST_KEY");
	}

	#[test]
	fn test_malformed_request_type_rejected() {
		let source = SAMPLE.replace("bytes8 typeSuffixDatadatadatada)", "bytes8 typeSuffixDatadatadatada");
		let err = source.parse::<Config>().unwrap_err();
		assert!(matches!(err, ConfigError::Validation(_)));
		assert!(err.to_string().contains("my type name"));
	}

	#[test]
	fn test_duplicate_domain_rejected() {
		let source = SAMPLE.replace(
			"domains = [{ name = \"my domain name\", version = \"1\" }]",
			"domains = [{ name = \"a\", version = \"1\" }, { name = \"a\", version = \"1\" }]",
		);
		assert!(source.parse::<Config>().is_err());
	}

	#[test]
	fn test_missing_primary_account_rejected() {
		let source = SAMPLE.replace("primary = \"local\"", "primary = \"kms\"");
		let err = source.parse::<Config>().unwrap_err();
		assert!(err.to_string().contains("kms"));
	}

	#[test]
	fn test_prefund_amounts() {
		let source = SAMPLE.replace(
			"chain_id = 43113\n",
			"chain_id = 43113\nprefund = [\n\t{ address = \"0x70997970c51812dc3a010c7d01b50e0d17dc79c8\", amount = \"1000\" },\n\t{ address = \"0x3c44cdddb6a900fa2b585dd299e03d12fa4293bc\", amount = \"0x3e8\" },\n]\n",
		);
		let config: Config = source.parse().unwrap();
		assert_eq!(config.chain.prefund.len(), 2);
		assert_eq!(config.chain.prefund[0].amount, U256::from(1000));
		assert_eq!(config.chain.prefund[1].amount, U256::from(1000));
	}
}
