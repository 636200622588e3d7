//! Relay envelope exchanged between a signer and a relayer.
//!
//! The envelope carries the full `eth_signTypedData_v4` payload of a forward
//! request plus the signature. Its hex-encoded JSON travels as the single
//! parameter of an `eth_sendRawTransaction` JSON-RPC call.

use crate::eip712::DOMAIN_FIELDS;
use crate::forward::GENERIC_FIELDS;
use crate::{
	DomainDescriptor, EncodingError, ForwardRequest, RequestTypeDescriptor, SuffixType,
	TypedForwardRequest,
};
use alloy_primitives::{Address, Bytes, U256};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

const DOMAIN_TYPE_NAME: &str = "EIP712Domain";
const SEND_RAW_TRANSACTION: &str = "eth_sendRawTransaction";

/// One `{ name, type }` entry of an EIP-712 type definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypedField {
	pub name: String,
	#[serde(rename = "type")]
	pub ty: String,
}

impl TypedField {
	fn new(name: impl Into<String>, ty: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			ty: ty.into(),
		}
	}
}

/// The typed-data payload a wallet signs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypedDataPayload {
	pub domain: DomainDescriptor,
	pub types: BTreeMap<String, Vec<TypedField>>,
	pub primary_type: String,
	pub message: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayMetadata {
	/// 65-byte `r || s || v` signature, hex without the 0x prefix.
	pub signature: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayEnvelope {
	pub forward_request: TypedDataPayload,
	pub metadata: RelayMetadata,
}

/// A checked envelope, ready for submission to the forwarder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedEnvelope {
	pub typed: TypedForwardRequest,
	pub signature: Bytes,
}

impl RelayEnvelope {
	/// Wraps a signed forward request.
	pub fn new(typed: &TypedForwardRequest, signature: &[u8]) -> Result<Self, EncodingError> {
		let request_type = &typed.request_type;
		if typed.suffix_values.len() != request_type.suffix_fields().len() {
			return Err(EncodingError::SuffixArity {
				expected: request_type.suffix_fields().len(),
				actual: typed.suffix_values.len(),
			});
		}

		let mut types = BTreeMap::new();
		types.insert(
			DOMAIN_TYPE_NAME.to_string(),
			DOMAIN_FIELDS
				.iter()
				.map(|(name, ty)| TypedField::new(*name, *ty))
				.collect(),
		);
		types.insert(
			request_type.name().to_string(),
			request_type
				.eip712_fields()
				.into_iter()
				.map(|(name, ty)| TypedField::new(name, ty))
				.collect(),
		);

		let mut message = match serde_json::to_value(&typed.request) {
			Ok(Value::Object(map)) => map,
			Ok(other) => {
				return Err(EncodingError::Envelope(format!(
					"request serialized to {}",
					other
				)))
			},
			Err(e) => return Err(EncodingError::Envelope(e.to_string())),
		};
		for (field, raw) in request_type.suffix_fields().iter().zip(&typed.suffix_values) {
			// Reject values the forwarder could never accept before they are signed over.
			field
				.ty
				.encode_value(raw)
				.map_err(|reason| EncodingError::SuffixValue {
					field: field.name.clone(),
					ty: field.ty.to_string(),
					reason,
				})?;
			message.insert(field.name.clone(), suffix_to_json(field.ty, raw));
		}

		Ok(Self {
			forward_request: TypedDataPayload {
				domain: typed.domain.clone(),
				types,
				primary_type: request_type.name().to_string(),
				message,
			},
			metadata: RelayMetadata {
				signature: hex::encode(signature),
			},
		})
	}

	/// Checks the payload against the forward-request schema and extracts the request.
	///
	/// Every suffix field declared in `types` must also carry a value in
	/// `message`; envelopes that omit suffix values are rejected.
	pub fn decode(&self) -> Result<DecodedEnvelope, EncodingError> {
		let payload = &self.forward_request;
		let envelope_err = |msg: String| EncodingError::Envelope(msg);

		for name in payload.types.keys() {
			if name != DOMAIN_TYPE_NAME && *name != payload.primary_type {
				return Err(envelope_err(format!("unexpected type '{}'", name)));
			}
		}
		if let Some(domain_fields) = payload.types.get(DOMAIN_TYPE_NAME) {
			let expected: Vec<TypedField> = DOMAIN_FIELDS
				.iter()
				.map(|(name, ty)| TypedField::new(*name, *ty))
				.collect();
			if *domain_fields != expected {
				return Err(envelope_err("EIP712Domain fields do not match".to_string()));
			}
		}
		let fields = payload.types.get(&payload.primary_type).ok_or_else(|| {
			envelope_err(format!("primary type '{}' is not defined", payload.primary_type))
		})?;
		if fields.len() <= GENERIC_FIELDS.len() {
			return Err(envelope_err("request type declares no suffix fields".to_string()));
		}
		for (field, (name, ty)) in fields.iter().zip(GENERIC_FIELDS.iter()) {
			if field.name != *name || field.ty != *ty {
				return Err(envelope_err(format!(
					"expected generic field '{} {}', got '{} {}'",
					ty, name, field.ty, field.name
				)));
			}
		}
		let request_type = RequestTypeDescriptor::from_fields(
			payload.primary_type.clone(),
			fields[GENERIC_FIELDS.len()..]
				.iter()
				.map(|f| (f.name.as_str(), f.ty.as_str())),
		)?;

		for key in payload.message.keys() {
			if !fields.iter().any(|f| f.name == *key) {
				return Err(envelope_err(format!("message has undeclared field '{}'", key)));
			}
		}
		let generic: Map<String, Value> = GENERIC_FIELDS
			.iter()
			.filter_map(|(name, _)| {
				payload
					.message
					.get(*name)
					.map(|value| (name.to_string(), value.clone()))
			})
			.collect();
		let request: ForwardRequest = serde_json::from_value(Value::Object(generic))
			.map_err(|e| envelope_err(format!("invalid message: {}", e)))?;

		let suffix_values = request_type
			.suffix_fields()
			.iter()
			.map(|field| {
				let value = payload.message.get(&field.name).ok_or_else(|| {
					envelope_err(format!("message is missing field '{}'", field.name))
				})?;
				suffix_from_json(field.ty, value).map_err(|reason| EncodingError::SuffixValue {
					field: field.name.clone(),
					ty: field.ty.to_string(),
					reason,
				})
			})
			.collect::<Result<Vec<_>, _>>()?;

		let signature = self.metadata.signature.as_str();
		let signature = hex::decode(signature.strip_prefix("0x").unwrap_or(signature))
			.map_err(|e| envelope_err(format!("invalid signature hex: {}", e)))?;

		let typed = TypedForwardRequest {
			domain: payload.domain.clone(),
			request_type,
			request,
			suffix_values,
		};
		// Fails early on values that cannot be encoded under the declared types.
		typed.suffix_data()?;

		Ok(DecodedEnvelope {
			typed,
			signature: signature.into(),
		})
	}

	/// The `eth_sendRawTransaction` parameter: `0x` followed by the hex of the JSON.
	pub fn to_raw_transaction(&self) -> Result<String, EncodingError> {
		let json = serde_json::to_vec(self).map_err(|e| EncodingError::Envelope(e.to_string()))?;
		Ok(format!("0x{}", hex::encode(json)))
	}

	pub fn from_raw_transaction(raw: &str) -> Result<Self, EncodingError> {
		let bytes = hex::decode(raw.strip_prefix("0x").unwrap_or(raw))
			.map_err(|e| EncodingError::Envelope(format!("invalid raw transaction hex: {}", e)))?;
		serde_json::from_slice(&bytes)
			.map_err(|e| EncodingError::Envelope(format!("invalid envelope JSON: {}", e)))
	}
}

/// JSON-RPC 2.0 request carrying an envelope to a relayer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcRequest {
	pub id: u64,
	pub jsonrpc: String,
	pub method: String,
	pub params: Vec<Value>,
}

impl JsonRpcRequest {
	pub fn send_raw_transaction(envelope: &RelayEnvelope) -> Result<Self, EncodingError> {
		Ok(Self {
			id: 1,
			jsonrpc: "2.0".to_string(),
			method: SEND_RAW_TRANSACTION.to_string(),
			params: vec![Value::String(envelope.to_raw_transaction()?)],
		})
	}

	/// Extracts the envelope from an `eth_sendRawTransaction` request.
	pub fn envelope(&self) -> Result<RelayEnvelope, EncodingError> {
		if self.method != SEND_RAW_TRANSACTION {
			return Err(EncodingError::Envelope(format!(
				"unsupported method '{}'",
				self.method
			)));
		}
		match self.params.as_slice() {
			[Value::String(raw)] => RelayEnvelope::from_raw_transaction(raw),
			_ => Err(EncodingError::Envelope(
				"expected a single hex string parameter".to_string(),
			)),
		}
	}
}

fn suffix_to_json(ty: SuffixType, raw: &[u8]) -> Value {
	match ty {
		SuffixType::Address => Value::String(Address::from_slice(raw).to_checksum(None)),
		SuffixType::Bool => Value::Bool(raw == [1]),
		SuffixType::Uint(_) => Value::String(format!("{:#x}", U256::from_be_slice(raw))),
		SuffixType::String => Value::String(String::from_utf8_lossy(raw).into_owned()),
		SuffixType::FixedBytes(_) | SuffixType::Bytes => {
			Value::String(format!("0x{}", hex::encode(raw)))
		},
	}
}

fn suffix_from_json(ty: SuffixType, value: &Value) -> Result<Bytes, String> {
	let as_str = || {
		value
			.as_str()
			.ok_or_else(|| format!("expected a string, got {}", value))
	};
	let raw = match ty {
		SuffixType::Address => {
			let address: Address = as_str()?.parse().map_err(|e| format!("{}", e))?;
			address.to_vec()
		},
		SuffixType::Bool => {
			let flag = value
				.as_bool()
				.ok_or_else(|| format!("expected a boolean, got {}", value))?;
			vec![flag as u8]
		},
		SuffixType::Uint(_) => {
			let n: U256 = serde_json::from_value(value.clone()).map_err(|e| e.to_string())?;
			n.to_be_bytes::<32>().to_vec()
		},
		SuffixType::String => as_str()?.as_bytes().to_vec(),
		SuffixType::FixedBytes(_) | SuffixType::Bytes => {
			let s = as_str()?;
			let hex_str = s
				.strip_prefix("0x")
				.ok_or_else(|| format!("'{}' is not 0x-prefixed hex", s))?;
			hex::decode(hex_str).map_err(|e| e.to_string())?
		},
	};
	Ok(raw.into())
}

#[cfg(test)]
mod tests {
	use super::*;
	use alloy_primitives::{address, hex};

	fn counter_request() -> TypedForwardRequest {
		TypedForwardRequest {
			domain: DomainDescriptor::new(
				"my domain name",
				"1",
				1337,
				address!("52c84043cd9c865236f11d9fc9f56aa003c1f922"),
			),
			request_type: RequestTypeDescriptor::new(
				"my type name",
				"bytes8 typeSuffixDatadatadatada)",
			)
			.unwrap(),
			request: ForwardRequest {
				from: address!("c41cb13576ae51927435366dc2de8121d5d67266"),
				to: address!("5db9a7629912ebf95876228c24a848de0bfb43a9"),
				value: U256::ZERO,
				gas: U256::from(0x1d0f6),
				nonce: U256::ZERO,
				data: Bytes::from(hex!("d09de08a").to_vec()),
				valid_until_time: U256::MAX,
			},
			suffix_values: vec![Bytes::from_static(b"typeSuff")],
		}
	}

	#[test]
	fn test_envelope_layout() {
		let envelope = RelayEnvelope::new(&counter_request(), &[0xab; 65]).unwrap();
		let json = serde_json::to_value(&envelope).unwrap();

		assert_eq!(json["forwardRequest"]["primaryType"], "my type name");
		assert_eq!(json["forwardRequest"]["domain"]["name"], "my domain name");
		assert_eq!(json["forwardRequest"]["domain"]["chainId"], "0x539");
		assert_eq!(json["forwardRequest"]["types"]["EIP712Domain"][2]["name"], "chainId");
		assert_eq!(json["forwardRequest"]["types"]["my type name"][7]["type"], "bytes8");
		assert_eq!(
			json["forwardRequest"]["message"]["typeSuffixDatadatadatada"],
			"0x7479706553756666"
		);
		assert_eq!(json["metadata"]["signature"], "ab".repeat(65));
	}

	#[test]
	fn test_envelope_decodes_to_same_digest() {
		let typed = counter_request();
		let envelope = RelayEnvelope::new(&typed, &[7u8; 65]).unwrap();

		let rpc = JsonRpcRequest::send_raw_transaction(&envelope).unwrap();
		let wire = serde_json::to_string(&rpc).unwrap();
		let rpc: JsonRpcRequest = serde_json::from_str(&wire).unwrap();
		assert_eq!(rpc.method, "eth_sendRawTransaction");
		assert_eq!(rpc.jsonrpc, "2.0");
		assert_eq!(rpc.id, 1);

		let decoded = rpc.envelope().unwrap().decode().unwrap();
		assert_eq!(decoded.typed, typed);
		assert_eq!(decoded.typed.digest().unwrap(), typed.digest().unwrap());
		assert_eq!(decoded.signature.as_ref(), &[7u8; 65]);
	}

	#[test]
	fn test_typed_suffix_values_survive_json() {
		let mut typed = counter_request();
		typed.request_type =
			RequestTypeDescriptor::new("Order", "address payer,bool urgent,uint64 fee,string memo)")
				.unwrap();
		typed.suffix_values = vec![
			Bytes::copy_from_slice(address!("1111111111111111111111111111111111111111").as_slice()),
			Bytes::from(vec![1u8]),
			Bytes::from(vec![0x01, 0x00]),
			Bytes::from_static(b"coffee"),
		];

		let envelope = RelayEnvelope::new(&typed, &[1u8; 65]).unwrap();
		let message = &envelope.forward_request.message;
		assert_eq!(message["urgent"], true);
		assert_eq!(message["fee"], "0x100");
		assert_eq!(message["memo"], "coffee");

		let decoded = envelope.decode().unwrap();
		assert_eq!(decoded.typed.digest().unwrap(), typed.digest().unwrap());
	}

	#[test]
	fn test_decode_rejects_foreign_schemas() {
		let envelope = RelayEnvelope::new(&counter_request(), &[0u8; 65]).unwrap();

		let mut extra_type = envelope.clone();
		extra_type
			.forward_request
			.types
			.insert("Mail".to_string(), vec![TypedField::new("to", "address")]);
		assert!(matches!(extra_type.decode(), Err(EncodingError::Envelope(_))));

		let mut reordered = envelope.clone();
		if let Some(fields) = reordered.forward_request.types.get_mut("my type name") {
			fields.swap(0, 1);
		}
		assert!(matches!(reordered.decode(), Err(EncodingError::Envelope(_))));

		let mut undeclared = envelope.clone();
		undeclared
			.forward_request
			.message
			.insert("extra".to_string(), Value::from(1));
		assert!(matches!(undeclared.decode(), Err(EncodingError::Envelope(_))));

		let mut wrong_width = envelope.clone();
		wrong_width
			.forward_request
			.message
			.insert("typeSuffixDatadatadatada".to_string(), Value::from("0x01"));
		assert!(matches!(wrong_width.decode(), Err(EncodingError::SuffixValue { .. })));

		let mut bad_signature = envelope;
		bad_signature.metadata.signature = "zz".to_string();
		assert!(matches!(bad_signature.decode(), Err(EncodingError::Envelope(_))));
	}

	#[test]
	fn test_decode_requires_suffix_values() {
		let mut envelope = RelayEnvelope::new(&counter_request(), &[0u8; 65]).unwrap();
		envelope
			.forward_request
			.message
			.remove("typeSuffixDatadatadatada");

		let err = envelope.decode().unwrap_err();
		assert!(matches!(&err, EncodingError::Envelope(msg) if msg.contains("typeSuffixDatadatadatada")));
	}

	#[test]
	fn test_rpc_rejects_other_methods() {
		let envelope = RelayEnvelope::new(&counter_request(), &[0u8; 65]).unwrap();
		let mut rpc = JsonRpcRequest::send_raw_transaction(&envelope).unwrap();
		rpc.method = "eth_sendTransaction".to_string();
		assert!(rpc.envelope().is_err());
		assert!(RelayEnvelope::from_raw_transaction("0xzz").is_err());
	}
}
