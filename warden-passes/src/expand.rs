//! Set-bounds expansion
//!
//! The set-bounds primitive is opaque to every pass; this final step
//! lowers it to the fixed trap sequence the bounds-checking mechanism
//! decodes: the reserved operation code in the call-number register, the
//! three operands moved register-to-register, then a single trap. The
//! register names and the operation code live only in this module.
//!
//! Registers x10-x12 carry pointer, base, and size; x17 holds the
//! operation code. The whole set is reserved across the trap and the
//! sequence must not be reordered relative to the store that precedes it.

use log::debug;
use warden_ir::{Instruction, Module};

/// Reserved trap operation code identifying a set-bounds request
const SETBOUNDS_CODE: u32 = 98;

/// Replace every set-bounds primitive in `module` with its inline-assembly
/// trap sequence. Returns the number of primitives expanded.
pub fn expand_setbounds(module: &mut Module) -> usize {
    let mut expanded = 0;
    for function in &mut module.functions {
        for block in &mut function.blocks {
            for instr in &mut block.instructions {
                if let Instruction::SetBounds { ptr, base, size } = instr {
                    let assembly = format!(
                        "li x17, {}\nmv x10, {}\nmv x11, {}\nmv x12, {}\necall",
                        SETBOUNDS_CODE, ptr, base, size
                    );
                    *instr = Instruction::InlineAsm { assembly };
                    expanded += 1;
                }
            }
        }
    }
    if expanded > 0 {
        debug!("expanded {} set-bounds primitive(s)", expanded);
    }
    expanded
}
