// ============================================================================
// spark-tracked - Core Module
// Foundational types, constants, and context
// ============================================================================

pub mod constants;
pub mod context;
pub mod types;
