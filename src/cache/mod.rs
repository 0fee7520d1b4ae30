//! Generic in-memory primitives: an expiring store and a per-key async lock.

pub mod keyed_lock;
pub mod ttl;

pub use keyed_lock::{KeyedGuard, KeyedMutex};
pub use ttl::TtlCache;
