//! Gas schedule and per-frame metering.
//!
//! The schedule is a flat approximation of the EVM's: enough to bound
//! forwarded calls and to make runaway frames fail, not to price them.

use crate::{OutOfGas, Revert};

/// Intrinsic cost of a top-level transaction.
pub const TX_BASE: u64 = 21_000;
/// Cost of entering a call frame.
pub const CALL: u64 = 2_600;
/// Surcharge for a call that moves native value.
pub const CALL_VALUE: u64 = 9_000;
/// Writing a zero slot.
pub const SSTORE_SET: u64 = 20_000;
/// Writing a non-zero slot.
pub const SSTORE_RESET: u64 = 5_000;
pub const SLOAD: u64 = 2_100;
pub const LOG: u64 = 375;
pub const LOG_TOPIC: u64 = 375;
pub const LOG_DATA_BYTE: u64 = 8;
pub const CREATE: u64 = 32_000;
/// Maximum nesting of call frames.
pub const MAX_CALL_DEPTH: usize = 1024;

/// Largest share of its remaining gas a frame can pass to a callee.
pub fn max_call_gas(remaining: u64) -> u64 {
	remaining - remaining / 64
}

/// Gas accounting of a single frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GasMeter {
	limit: u64,
	used: u64,
}

impl GasMeter {
	pub fn new(limit: u64) -> Self {
		Self { limit, used: 0 }
	}

	pub fn limit(&self) -> u64 {
		self.limit
	}

	pub fn used(&self) -> u64 {
		self.used
	}

	pub fn remaining(&self) -> u64 {
		self.limit - self.used
	}

	/// Charges `amount`; on exhaustion the whole limit is consumed.
	pub fn charge(&mut self, amount: u64) -> Result<(), Revert> {
		if amount > self.remaining() {
			self.used = self.limit;
			return Err(Revert::error(&OutOfGas {}));
		}
		self.used += amount;
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_out_of_gas_consumes_everything() {
		let mut meter = GasMeter::new(10_000);
		meter.charge(SSTORE_RESET).unwrap();
		assert_eq!(meter.remaining(), 5_000);

		let err = meter.charge(SSTORE_SET).unwrap_err();
		assert!(err.is::<OutOfGas>());
		assert_eq!(meter.used(), meter.limit());
	}

	#[test]
	fn test_call_gas_keeps_one_64th() {
		assert_eq!(max_call_gas(64_000), 63_000);
		assert_eq!(max_call_gas(63), 63);
		assert_eq!(max_call_gas(0), 0);
	}
}
