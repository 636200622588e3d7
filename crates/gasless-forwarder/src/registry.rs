//! Append-only registry of domains and request types.

use alloy_primitives::{Bytes, B256};
use gasless_types::{DomainDescriptor, RequestTypeDescriptor};
use std::collections::HashMap;

/// Domains and request types a forwarder accepts, keyed by their hash.
///
/// Entries are stored on first registration and never replaced, so a hash
/// always resolves to the value that was hashed when it was registered.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TypeRegistry {
	domains: HashMap<B256, Bytes>,
	request_types: HashMap<B256, RequestTypeDescriptor>,
}

impl TypeRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	/// Registers `domain`; returns its separator and whether it was new.
	pub fn register_domain(&mut self, domain: &DomainDescriptor) -> (B256, bool) {
		let value = domain.encode();
		let hash = alloy_primitives::keccak256(&value);
		let inserted = !self.domains.contains_key(&hash);
		if inserted {
			self.domains.insert(hash, value);
		}
		(hash, inserted)
	}

	/// Registers `request_type`; returns its type hash and whether it was new.
	pub fn register_request_type(&mut self, request_type: RequestTypeDescriptor) -> (B256, bool) {
		let hash = request_type.type_hash();
		let inserted = !self.request_types.contains_key(&hash);
		if inserted {
			self.request_types.insert(hash, request_type);
		}
		(hash, inserted)
	}

	pub fn is_registered_domain(&self, hash: &B256) -> bool {
		self.domains.contains_key(hash)
	}

	pub fn is_registered_request_type(&self, hash: &B256) -> bool {
		self.request_types.contains_key(hash)
	}

	/// The ABI encoded domain value stored under `hash`.
	pub fn domain_value(&self, hash: &B256) -> Option<&Bytes> {
		self.domains.get(hash)
	}

	pub fn request_type(&self, hash: &B256) -> Option<&RequestTypeDescriptor> {
		self.request_types.get(hash)
	}

	pub fn domain_count(&self) -> usize {
		self.domains.len()
	}

	pub fn request_type_count(&self) -> usize {
		self.request_types.len()
	}
}
