//! Subcommands of the `gasless` binary.

use alloy_primitives::{Address, Bytes, B256, U256};
use alloy_sol_types::SolCall;
use clap::Args;
use gasless_account::implementations::local::create_account;
use gasless_account::{recover_signer, AccountError, AccountInterface};
use gasless_chain::implementations::counter::IGaslessCounter;
use gasless_config::Config;
use gasless_core::{CallRequest, GaslessBuilder, GaslessNode, RelayService, RequestSigner};
use gasless_types::{JsonRpcRequest, RelayEnvelope};
use serde::Serialize;
use std::error::Error;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

type CommandResult = Result<String, Box<dyn Error>>;

/// Macro to create a factory HashMap with the appropriate type aliases
macro_rules! create_factory_map {
	($interface:path, $error:path, $( $name:literal => $factory:expr ),* $(,)?) => {{
		let mut factories = std::collections::HashMap::new();
		$(
			factories.insert(
				$name.to_string(),
				$factory as fn(&toml::Value) -> Result<Box<dyn $interface>, $error>,
			);
		)*
		factories
	}};
}

#[derive(Args, Debug, Clone, Default)]
pub struct SignArgs {
	/// Target contract
	#[arg(long, required_unless_present = "counter")]
	pub to: Option<Address>,

	/// Target a freshly deployed counter and call `increment`
	#[arg(long, conflicts_with = "to")]
	pub counter: bool,

	/// Calldata, hex encoded
	#[arg(long)]
	pub data: Option<Bytes>,

	/// Native value forwarded with the call, in wei
	#[arg(long, default_value = "0")]
	pub value: U256,

	/// Gas for the inner call; the configured default when omitted
	#[arg(long)]
	pub gas: Option<U256>,

	/// Nonce to sign; the forwarder's current nonce when omitted
	#[arg(long)]
	pub nonce: Option<U256>,

	/// Raw suffix field value, hex encoded; repeat once per field
	#[arg(long = "suffix")]
	pub suffix_values: Vec<Bytes>,

	/// Domain name; the first configured domain when omitted
	#[arg(long, requires = "domain_version")]
	pub domain_name: Option<String>,

	#[arg(long, requires = "domain_name")]
	pub domain_version: Option<String>,

	/// Request type name; the first configured type when omitted
	#[arg(long)]
	pub request_type: Option<String>,

	/// Print only the raw transaction parameter
	#[arg(long)]
	pub raw: bool,
}

#[derive(Args, Debug, Clone)]
pub struct InspectArgs {
	/// Raw transaction hex, a JSON-RPC request, or a file holding either
	pub input: String,
}

#[derive(Args, Debug, Clone)]
pub struct SimulateArgs {
	/// Raw transaction hex, a JSON-RPC request, or a file holding either
	pub input: String,

	/// Deploy the counter `sign --counter` targets before relaying
	#[arg(long)]
	pub counter: bool,
}

/// A decoded envelope, as printed by `inspect`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Inspection {
	pub from: Address,
	pub signer: Option<Address>,
	pub signature_valid: bool,
	pub to: Address,
	pub value: U256,
	pub gas: U256,
	pub nonce: U256,
	pub valid_until_time: U256,
	pub data: Bytes,
	pub domain_separator: B256,
	pub request_type: String,
	pub type_hash: B256,
	pub suffix_data: Bytes,
	pub digest: B256,
	/// Whether the domain names the forwarder the configured node deploys.
	pub matches_node: bool,
}

async fn boot(config: Config) -> Result<GaslessNode, Box<dyn Error>> {
	let factories = create_factory_map!(
		AccountInterface,
		AccountError,
		"local" => create_account,
	);
	Ok(GaslessBuilder::new(config).build(factories).await?)
}

fn unix_now() -> u64 {
	u64::try_from(chrono::Utc::now().timestamp()).unwrap_or_default()
}

/// Reads an envelope given inline or as a file path.
fn read_envelope(input: &str) -> Result<RelayEnvelope, Box<dyn Error>> {
	let text = if Path::new(input).is_file() {
		std::fs::read_to_string(input)?
	} else {
		input.to_string()
	};
	let text = text.trim();
	if text.starts_with('{') {
		let request: JsonRpcRequest = serde_json::from_str(text)?;
		Ok(request.envelope()?)
	} else {
		Ok(RelayEnvelope::from_raw_transaction(text)?)
	}
}

pub async fn sign(config: Config, args: &SignArgs) -> CommandResult {
	let mut node = boot(config).await?;

	let (to, data) = if args.counter {
		let counter = node.deploy_counter();
		let data = args
			.data
			.clone()
			.unwrap_or_else(|| IGaslessCounter::incrementCall {}.abi_encode().into());
		(counter, data)
	} else {
		let to = args.to.ok_or("either --to or --counter is required")?;
		(to, args.data.clone().unwrap_or_default())
	};

	let domain = match (&args.domain_name, &args.domain_version) {
		(Some(name), Some(version)) => node
			.domain(name, version)
			.ok_or_else(|| format!("Domain ('{}', '{}') is not configured", name, version))?,
		_ => node.domains().first().ok_or("No domain configured")?,
	}
	.clone();
	let request_type = match &args.request_type {
		Some(name) => node
			.request_type(name)
			.ok_or_else(|| format!("Request type '{}' is not configured", name))?,
		None => node.request_types().first().ok_or("No request type configured")?,
	}
	.clone();

	let signer = RequestSigner::new(
		node.account().clone(),
		domain,
		request_type,
		node.relay_config(),
	);
	let nonce = match args.nonce {
		Some(nonce) => nonce,
		None => node.nonce(&node.operator())?,
	};
	let call = CallRequest {
		to,
		value: args.value,
		data,
		gas: args.gas,
		suffix_values: args.suffix_values.clone(),
	};
	let signed = signer.sign(call, nonce, unix_now()).await?;
	let body = signed.json_rpc()?;
	tracing::info!(
		from = %signed.typed.request.from,
		to = %signed.typed.request.to,
		nonce = %nonce,
		rpc_url = %node.relay_config().rpc_url,
		"Signed forward request"
	);

	if args.raw {
		return Ok(signed.envelope()?.to_raw_transaction()?);
	}
	Ok(serde_json::to_string_pretty(&body)?)
}

pub async fn inspect(config: Config, args: &InspectArgs) -> CommandResult {
	let decoded = read_envelope(&args.input)?.decode()?;
	let node = boot(config).await?;

	let typed = &decoded.typed;
	let digest = typed.digest()?;
	let signer = recover_signer(&digest, &decoded.signature).ok();
	let request = &typed.request;
	let inspection = Inspection {
		from: request.from,
		signer,
		signature_valid: signer == Some(request.from),
		to: request.to,
		value: request.value,
		gas: request.gas,
		nonce: request.nonce,
		valid_until_time: request.valid_until_time,
		data: request.data.clone(),
		domain_separator: typed.domain.hash(),
		request_type: typed.request_type.type_string(),
		type_hash: typed.request_type.type_hash(),
		suffix_data: typed.suffix_data()?,
		digest,
		matches_node: typed.domain.verifying_contract == node.forwarder()
			&& typed.domain.chain_id == U256::from(node.chain().chain_id()),
	};
	Ok(serde_json::to_string_pretty(&inspection)?)
}

pub async fn simulate(config: Config, args: &SimulateArgs) -> CommandResult {
	let envelope = read_envelope(&args.input)?;
	let mut node = boot(config).await?;
	if args.counter {
		node.deploy_counter();
	}

	let relayer = node.operator();
	let relay = RelayService::new(Arc::new(Mutex::new(node)), relayer);
	let outcome = relay.relay(&envelope).await?;
	Ok(serde_json::to_string_pretty(&outcome)?)
}
