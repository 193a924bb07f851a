//! Per-function definition map
//!
//! SSA-style lookup from a temporary to the instruction that defines it.
//! Both passes and the provenance classifier resolve operand chains through
//! this map instead of re-scanning the function.

use std::collections::HashMap;
use warden_ir::{Function, Instruction, IrType, TempId, Value};

/// Maps each temporary to a snapshot of its defining instruction.
///
/// Built once per pass over a function; rewrites that manufacture fresh
/// temporaries do not need to be reflected here, since fresh ids are never
/// referenced by pre-existing instructions.
#[derive(Debug, Default)]
pub struct DefMap {
    map: HashMap<TempId, Instruction>,
}

impl DefMap {
    pub fn build(function: &Function) -> Self {
        let mut map = HashMap::new();
        for block in &function.blocks {
            for instr in &block.instructions {
                if let Some(result) = instr.result() {
                    map.insert(result, instr.clone());
                }
            }
        }
        Self { map }
    }

    /// The instruction defining `temp`, if `temp` is an instruction result
    /// (function parameters have no defining instruction).
    pub fn get(&self, temp: TempId) -> Option<&Instruction> {
        self.map.get(&temp)
    }
}

/// Fresh temporary allocator for a function being rewritten
#[derive(Debug)]
pub struct TempAlloc {
    next: TempId,
}

impl TempAlloc {
    pub fn new(function: &Function) -> Self {
        Self {
            next: function.max_temp_id() + 1,
        }
    }

    pub fn fresh(&mut self) -> TempId {
        let id = self.next;
        self.next += 1;
        id
    }
}

/// Whether `value` denotes a pointer.
///
/// Temporaries are resolved through the definition map or the parameter
/// table; globals and folded element addresses are addresses by
/// construction; plain constants never are.
pub fn is_pointer_value(value: &Value, defs: &DefMap, params: &[(TempId, IrType)]) -> bool {
    match value {
        Value::Temp(t) => {
            let ty = defs.get(*t).and_then(Instruction::result_type).or_else(|| {
                params
                    .iter()
                    .find(|(id, _)| id == t)
                    .map(|(_, ty)| ty)
            });
            ty.is_some_and(|ty| ty.is_pointer())
        }
        Value::Global(_) => true,
        Value::ConstElem { .. } => true,
        Value::Constant(_) | Value::Function(_) | Value::Undef => false,
    }
}
