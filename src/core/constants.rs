// ============================================================================
// spark-tracked - Constants
// Flag constants for cells and scope blocks
// ============================================================================

// =============================================================================
// CELL TYPE FLAGS
// =============================================================================

/// Plain tracked cell
pub const TRACKED: u32 = 1 << 0;

/// Derived (computed) cell
pub const DERIVED: u32 = 1 << 1;

// =============================================================================
// BLOCK TYPE FLAGS
// =============================================================================

/// Detached root of an ownership tree. Runs once, untracked.
pub const ROOT_BLOCK: u32 = 1 << 2;

/// Render block - tracked, re-runs inline while the tree is walked
pub const RENDER_BLOCK: u32 = 1 << 3;

/// Effect block - tracked, collected during the walk and run afterwards
pub const EFFECT_BLOCK: u32 = 1 << 4;

/// Branch block - untracked, survives re-runs of its parent
pub const BRANCH_BLOCK: u32 = 1 << 5;

// =============================================================================
// BLOCK STATE FLAGS
// =============================================================================

/// Block (or one of its descendants) has a pending update
pub const CONTAINS_UPDATE: u32 = 1 << 6;

/// Block function has executed at least once
pub const BLOCK_HAS_RUN: u32 = 1 << 8;

/// Block subtree is skipped by the flush
pub const PAUSED: u32 = 1 << 9;

/// Block has been disposed
pub const DESTROYED: u32 = 1 << 10;

// =============================================================================
// CELL STATE FLAGS
// =============================================================================

/// Derived must recompute on next read regardless of dependency versions.
/// Set before a computation starts and cleared only when it returns.
pub const DIRTY: u32 = 1 << 11;

/// Derived is currently computing
pub const COMPUTING: u32 = 1 << 12;

/// Bits that identify the kind of a block
pub const BLOCK_KIND_MASK: u32 = ROOT_BLOCK | RENDER_BLOCK | EFFECT_BLOCK | BRANCH_BLOCK;

// =============================================================================
// LIMITS
// =============================================================================

/// Maximum consecutive flush passes before assuming an update loop
pub const MAX_FLUSH_COUNT: u32 = 1000;

/// Largest magnitude a date's epoch millisecond value may take
pub const MAX_TIME_MS: i64 = 8_640_000_000_000_000;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_are_distinct_bits() {
        let all = [
            TRACKED,
            DERIVED,
            ROOT_BLOCK,
            RENDER_BLOCK,
            EFFECT_BLOCK,
            BRANCH_BLOCK,
            CONTAINS_UPDATE,
            BLOCK_HAS_RUN,
            PAUSED,
            DESTROYED,
            DIRTY,
            COMPUTING,
        ];
        let mut seen = 0u32;
        for flag in all {
            assert_eq!(flag.count_ones(), 1);
            assert_eq!(seen & flag, 0);
            seen |= flag;
        }
    }

    #[test]
    fn kind_mask_covers_block_kinds_only() {
        assert_eq!(BLOCK_KIND_MASK & CONTAINS_UPDATE, 0);
        assert_ne!(BLOCK_KIND_MASK & EFFECT_BLOCK, 0);
    }
}
