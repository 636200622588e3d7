//! Self-registration of pluggable implementations.

/// Implemented by the `Registry` marker of every pluggable implementation.
///
/// `NAME` is the key the implementation is selected by in configuration, for
/// example `local` for `[account.implementations.local]`.
pub trait ImplementationRegistry {
	const NAME: &'static str;

	/// The factory function type of the owning module.
	type Factory;

	fn factory() -> Self::Factory;
}
