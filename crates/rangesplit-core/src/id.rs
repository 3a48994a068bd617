//! Strongly-typed identifiers used across the splitter.
//!
//! Downstream crates should *not* pass raw integers around for chunk or index IDs.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! new_id {
    ($name:ident, $repr:ty) => {
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Ord, PartialOrd,
        )]
        #[serde(transparent)]
        pub struct $name($repr);

        impl $name {
            pub const fn new(v: $repr) -> Self {
                Self(v)
            }
            pub const fn get(self) -> $repr {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }
    };
}

// Global across one iteration; assigned in strictly increasing order.
new_id!(ChunkId, u64);
// Stable catalog ID of an index (as stored in table metadata).
new_id!(IndexId, i64);

impl ChunkId {
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }
}
