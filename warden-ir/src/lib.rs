//! Warden - Intermediate Representation
//!
//! This crate defines the IR the instrumentation passes consume and mutate:
//! modules, functions, basic blocks, SSA-style instructions, and the target
//! data layout. The host compiler framework constructs these structures;
//! Warden only rewrites them.

pub mod ir;
pub mod layout;

pub use ir::{
    BasicBlock, Function, GlobalVariable, Instruction, IrBinaryOp, IrBuilder, IrType, IrUnaryOp,
    Linkage, Module, Value,
};
pub use layout::{StructLayout, TargetLayout};
pub use warden_common::{LabelId, TempId};
