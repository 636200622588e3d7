//! Schema validation for TOML configuration sections.
//!
//! Account implementations and the node configuration describe the shape they
//! expect with a [`Schema`], so a bad key or a malformed address is reported
//! with the dotted path of the offending field before anything is deployed.

use alloy_primitives::Address;
use thiserror::Error;

/// Errors that can occur during configuration validation.
#[derive(Debug, Error)]
pub enum ValidationError {
	#[error("Missing required field: {0}")]
	MissingField(String),
	#[error("Invalid value for field '{field}': {message}")]
	InvalidValue { field: String, message: String },
	#[error("Type mismatch for field '{field}': expected {expected}, got {actual}")]
	TypeMismatch {
		field: String,
		expected: String,
		actual: String,
	},
	#[error("Failed to deserialize config: {0}")]
	DeserializationError(String),
}

impl ValidationError {
	/// Prefixes the field path with `parent`, for errors raised in nested tables.
	fn nested(self, parent: &str) -> Self {
		match self {
			ValidationError::MissingField(f) => {
				ValidationError::MissingField(format!("{}.{}", parent, f))
			},
			ValidationError::InvalidValue { field, message } => ValidationError::InvalidValue {
				field: format!("{}.{}", parent, field),
				message,
			},
			ValidationError::TypeMismatch {
				field,
				expected,
				actual,
			} => ValidationError::TypeMismatch {
				field: format!("{}.{}", parent, field),
				expected,
				actual,
			},
			other => other,
		}
	}
}

/// The type of a configuration field.
#[derive(Debug)]
pub enum FieldType {
	String,
	/// An integer with optional inclusive bounds.
	Integer {
		min: Option<i64>,
		max: Option<i64>,
	},
	Boolean,
	/// A 0x-prefixed 20-byte hex address.
	Address,
	/// Hex data, optionally 0x-prefixed, of an exact byte length when `len` is set.
	HexBytes { len: Option<usize> },
	Array(Box<FieldType>),
	Table(Schema),
}

/// Custom check run after the type check passes.
pub type FieldValidator = Box<dyn Fn(&toml::Value) -> Result<(), String> + Send + Sync>;

pub struct Field {
	pub name: String,
	pub field_type: FieldType,
	pub validator: Option<FieldValidator>,
}

impl std::fmt::Debug for Field {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Field")
			.field("name", &self.name)
			.field("field_type", &self.field_type)
			.field("validator", &self.validator.is_some())
			.finish()
	}
}

impl Field {
	pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
		Self {
			name: name.into(),
			field_type,
			validator: None,
		}
	}

	/// Adds a custom validator to this field.
	pub fn with_validator<F>(mut self, validator: F) -> Self
	where
		F: Fn(&toml::Value) -> Result<(), String> + Send + Sync + 'static,
	{
		self.validator = Some(Box::new(validator));
		self
	}

	fn check(&self, value: &toml::Value) -> Result<(), ValidationError> {
		validate_field_type(&self.name, value, &self.field_type)?;
		if let Some(validator) = &self.validator {
			validator(value).map_err(|message| ValidationError::InvalidValue {
				field: self.name.clone(),
				message,
			})?;
		}
		Ok(())
	}
}

/// Required and optional fields of a TOML table.
#[derive(Debug)]
pub struct Schema {
	pub required: Vec<Field>,
	pub optional: Vec<Field>,
}

impl Schema {
	pub fn new(required: Vec<Field>, optional: Vec<Field>) -> Self {
		Self { required, optional }
	}

	/// Validates a TOML table against this schema, recursing into nested tables.
	pub fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let table = config
			.as_table()
			.ok_or_else(|| ValidationError::TypeMismatch {
				field: "root".to_string(),
				expected: "table".to_string(),
				actual: config.type_str().to_string(),
			})?;

		for field in &self.required {
			let value = table
				.get(&field.name)
				.ok_or_else(|| ValidationError::MissingField(field.name.clone()))?;
			field.check(value)?;
		}

		for field in &self.optional {
			if let Some(value) = table.get(&field.name) {
				field.check(value)?;
			}
		}

		Ok(())
	}
}

fn mismatch(field_name: &str, expected: &str, value: &toml::Value) -> ValidationError {
	ValidationError::TypeMismatch {
		field: field_name.to_string(),
		expected: expected.to_string(),
		actual: value.type_str().to_string(),
	}
}

fn invalid(field_name: &str, message: String) -> ValidationError {
	ValidationError::InvalidValue {
		field: field_name.to_string(),
		message,
	}
}

fn validate_field_type(
	field_name: &str,
	value: &toml::Value,
	expected_type: &FieldType,
) -> Result<(), ValidationError> {
	match expected_type {
		FieldType::String => {
			if !value.is_str() {
				return Err(mismatch(field_name, "string", value));
			}
		},
		FieldType::Integer { min, max } => {
			let int_val = value
				.as_integer()
				.ok_or_else(|| mismatch(field_name, "integer", value))?;
			if let Some(min_val) = min {
				if int_val < *min_val {
					return Err(invalid(
						field_name,
						format!("Value {} is less than minimum {}", int_val, min_val),
					));
				}
			}
			if let Some(max_val) = max {
				if int_val > *max_val {
					return Err(invalid(
						field_name,
						format!("Value {} is greater than maximum {}", int_val, max_val),
					));
				}
			}
		},
		FieldType::Boolean => {
			if !value.is_bool() {
				return Err(mismatch(field_name, "boolean", value));
			}
		},
		FieldType::Address => {
			let s = value
				.as_str()
				.ok_or_else(|| mismatch(field_name, "address", value))?;
			if !s.starts_with("0x") {
				return Err(invalid(field_name, "Address must start with 0x".to_string()));
			}
			s.parse::<Address>()
				.map_err(|e| invalid(field_name, format!("Invalid address '{}': {}", s, e)))?;
		},
		FieldType::HexBytes { len } => {
			let s = value
				.as_str()
				.ok_or_else(|| mismatch(field_name, "hex string", value))?;
			let bytes = hex::decode(s.strip_prefix("0x").unwrap_or(s))
				.map_err(|e| invalid(field_name, format!("Invalid hex: {}", e)))?;
			if let Some(len) = len {
				if bytes.len() != *len {
					return Err(invalid(
						field_name,
						format!("Expected {} bytes, got {}", len, bytes.len()),
					));
				}
			}
		},
		FieldType::Array(inner_type) => {
			let array = value
				.as_array()
				.ok_or_else(|| mismatch(field_name, "array", value))?;
			for (i, item) in array.iter().enumerate() {
				validate_field_type(&format!("{}[{}]", field_name, i), item, inner_type)?;
			}
		},
		FieldType::Table(schema) => {
			schema.validate(value).map_err(|e| e.nested(field_name))?;
		},
	}

	Ok(())
}

/// A configuration schema that implementations expose for their TOML section.
pub trait ConfigSchema: Send + Sync {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError>;
}

#[cfg(test)]
mod tests {
	use super::*;

	fn domain_schema() -> Schema {
		Schema::new(
			vec![
				Field::new("name", FieldType::String),
				Field::new("version", FieldType::String).with_validator(|v| {
					match v.as_str() {
						Some("") => Err("version must not be empty".to_string()),
						_ => Ok(()),
					}
				}),
			],
			vec![],
		)
	}

	fn parse(s: &str) -> toml::Value {
		toml::Value::Table(toml::from_str::<toml::Table>(s).unwrap())
	}

	#[test]
	fn test_nested_errors_carry_field_path() {
		let schema = Schema::new(
			vec![Field::new(
				"domains",
				FieldType::Array(Box::new(FieldType::Table(domain_schema()))),
			)],
			vec![Field::new("chain_id", FieldType::Integer { min: Some(1), max: None })],
		);

		let ok = parse("domains = [{ name = \"my domain name\", version = \"1\" }]");
		schema.validate(&ok).unwrap();

		let missing = parse("domains = [{ name = \"my domain name\" }]");
		match schema.validate(&missing) {
			Err(ValidationError::MissingField(f)) => assert_eq!(f, "domains[0].version"),
			other => panic!("unexpected {:?}", other),
		}

		let empty = parse("domains = [{ name = \"a\", version = \"\" }]");
		assert!(matches!(
			schema.validate(&empty),
			Err(ValidationError::InvalidValue { field, .. }) if field == "domains[0].version"
		));

		let zero = parse("domains = []\nchain_id = 0");
		assert!(matches!(
			schema.validate(&zero),
			Err(ValidationError::InvalidValue { .. })
		));
	}

	#[test]
	fn test_address_and_hex_fields() {
		let schema = Schema::new(
			vec![Field::new("asset", FieldType::Address)],
			vec![Field::new("key", FieldType::HexBytes { len: Some(32) })],
		);

		schema
			.validate(&parse("asset = \"0x5db9a7629912ebf95876228c24a848de0bfb43a9\""))
			.unwrap();
		assert!(schema.validate(&parse("asset = \"5db9a7629912ebf95876228c24a848de0bfb43a9\"")).is_err());
		assert!(schema.validate(&parse("asset = \"0x1234\"")).is_err());
		assert!(matches!(
			schema.validate(&parse("asset = 7")),
			Err(ValidationError::TypeMismatch { .. })
		));

		let short_key = "asset = \"0x5db9a7629912ebf95876228c24a848de0bfb43a9\"\nkey = \"0xabcd\"";
		assert!(schema.validate(&parse(short_key)).is_err());
	}
}
