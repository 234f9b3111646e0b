//! Named constants for configuration values.
//!
//! This module centralizes magic numbers and default values used throughout
//! the harness, making them easier to find, document, and tune.

/// Constants for the binary codec.
pub mod codec {
    /// Width in bytes of every scalar field (u32 and f32).
    pub const FIELD_WIDTH: usize = 4;

    /// Size of the vector-batch header: `count` and `dimension`.
    pub const VECTOR_HEADER_SIZE: usize = 2 * FIELD_WIDTH;

    /// Upper bound on elements reserved up front from an untrusted header.
    /// Larger arrays still decode, they just grow as bytes actually arrive.
    pub const MAX_PREALLOC_ELEMENTS: usize = 1 << 20;
}

/// Constants for query execution.
pub mod executor {
    /// Log progress every this many queries.
    pub const PROGRESS_INTERVAL: usize = 1000;
}

/// Constants for recall evaluation.
pub mod evaluation {
    /// Store ids start one above the ground-truth numbering.
    pub const DEFAULT_ID_OFFSET: i64 = 1;
}

/// Constants for SQL rendering.
pub mod sql {
    /// Default table holding the indexed vectors.
    pub const DEFAULT_TABLE: &str = "sift1m";

    /// Default identifier column.
    pub const DEFAULT_ID_COLUMN: &str = "id";

    /// Default vector column.
    pub const DEFAULT_VECTOR_COLUMN: &str = "embedding";

    /// Index-accelerated range predicate exposed by the store extension.
    pub const RANGE_FUNCTION: &str = "ANN_DWithin";

    /// L2 distance operator.
    pub const L2_OPERATOR: &str = "<->";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codec_constants() {
        assert_eq!(codec::VECTOR_HEADER_SIZE, 8);
        assert!(codec::MAX_PREALLOC_ELEMENTS.is_power_of_two());
    }

    #[test]
    fn test_default_offset() {
        assert_eq!(evaluation::DEFAULT_ID_OFFSET, 1);
    }
}
