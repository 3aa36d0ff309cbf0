//! Default constants for engine configuration.

/// Records kept per `(node, slot)` by the debug recorder before the oldest is dropped.
pub const DEFAULT_DEBUG_RECORDS_PER_SLOT: usize = 64;

/// Maximum chained-instance depth followed before a descriptor is considered cyclic.
pub const DEFAULT_MAX_CHAIN_DEPTH: usize = 32;

/// Segment name that addresses a constructor on the final path segment.
pub const CONSTRUCTOR_SEGMENT: &str = "ctor";

/// Environment variable switching strict resolution (`0`/`false` disables it).
pub const ENV_STRICT: &str = "GRAPHBIND_STRICT";

/// Environment variable enabling debug instrumentation (`1`/`true` enables it).
pub const ENV_DEBUG: &str = "GRAPHBIND_DEBUG";
