//! Node assembly and relaying for the gasless meta-transaction system.
//!
//! [`GaslessBuilder`] boots a [`GaslessNode`] from configuration. Signers use
//! [`RequestSigner`] to turn calls into signed relay envelopes, and
//! [`RelayService`] submits those envelopes to the node's forwarder on a
//! relayer's behalf.

pub mod builder;
pub mod node;
pub mod relayer;
pub mod signer;

pub use builder::{BuilderError, GaslessBuilder};
pub use node::GaslessNode;
pub use relayer::{RelayError, RelayOutcome, RelayService};
pub use signer::{CallRequest, RequestSigner, SignedRequest};

#[cfg(test)]
pub(crate) mod test_support {
	use gasless_account::AccountFactory;
	use std::collections::HashMap;

	pub fn factories() -> HashMap<String, AccountFactory> {
		gasless_account::get_all_implementations()
			.into_iter()
			.map(|(name, factory)| (name.to_string(), factory))
			.collect()
	}
}
