pub mod host;
pub mod numeric;
pub mod object;

use crate::runtime::linker::strategy::LinkedStrategy;
use crate::runtime::linker::{CallSite, OpKind};
use crate::runtime::value::Value;

pub use host::HostProvider;
pub use numeric::NumericProvider;
pub use object::NativeObjectProvider;

/// One source of linking strategies. Providers are consulted in order at
/// resolution time; the first whose `matches` accepts the operation builds
/// the strategy.
pub trait LinkProvider: Send + Sync {
    fn name(&self) -> &'static str;

    /// Cheap shape test over the actual operands.
    fn matches(&self, kind: &OpKind, operands: &[Value]) -> bool;

    /// Build the strategy for operands that `matches` accepted. May be
    /// expensive; the resulting strategy is cached at the call site.
    fn build(&self, site: &CallSite, operands: &[Value]) -> LinkedStrategy;
}

/// Engine objects first, host values second, primitive arithmetic last.
pub fn default_providers() -> Vec<Box<dyn LinkProvider>> {
    vec![
        Box::new(NativeObjectProvider),
        Box::new(HostProvider),
        Box::new(NumericProvider),
    ]
}
