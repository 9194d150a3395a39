#[cfg(feature = "core")]
#[doc(inline)]
pub use svchain_core as core;

#[cfg(feature = "chaining")]
#[doc(inline)]
pub use svchain_chaining as chaining;
