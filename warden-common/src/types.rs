//! Identifier types shared between the IR and the passes.

/// Temporary value identifier (SSA result)
pub type TempId = u32;

/// Basic block identifier
pub type LabelId = u32;
