//! Pointer redundancy classifier
//!
//! Decides whether a pointer value already inherits a bounds tag from an
//! earlier tagged pointer, by walking its direct syntactic derivation. This
//! is deliberately not alias analysis: the walk covers a closed set of
//! derivation shapes (cast, zero-index re-addressing, single-level pointer
//! step) and nothing else. A pointer reconstructed through integer
//! arithmetic is opaque to it.
//!
//! The result is used only to suppress redundant tagging, never to prove
//! the absence of a needed tag.

use crate::defs::DefMap;
use warden_ir::{Instruction, Value};

fn is_zero_index(value: &Value) -> bool {
    matches!(value, Value::Constant(0))
}

/// Whether `instr` is a pure re-addressing wrapper: a GEP whose indices are
/// all zero computes the same address as its base, possibly at a decayed
/// type.
pub fn is_zero_gep(instr: &Instruction) -> bool {
    match instr {
        Instruction::GetElementPtr { indices, .. } => indices.iter().all(is_zero_index),
        _ => false,
    }
}

/// Strip pure casts and zero-index re-addressing wrappers, yielding the
/// value's direct syntactic origin.
pub fn strip_wrappers<'a>(value: &'a Value, defs: &'a DefMap) -> &'a Value {
    let mut current = value;
    loop {
        let Value::Temp(t) = current else {
            return current;
        };
        match defs.get(*t) {
            Some(Instruction::Cast { value, .. }) => current = value,
            Some(gep @ Instruction::GetElementPtr { base, .. }) if is_zero_gep(gep) => {
                current = base;
            }
            _ => return current,
        }
    }
}

/// Whether `value` is a derivation of an already-tagged pointer.
///
/// True when the stripped origin is plain single-level pointer arithmetic:
/// the bounds-checking mechanism propagates the base's tag across such
/// steps, so re-tagging would be redundant. An origin that descends two or
/// more levels into a struct/array member addresses a distinct sub-object
/// and does not inherit.
pub fn inherits_bounds(value: &Value, defs: &DefMap) -> bool {
    let origin = strip_wrappers(value, defs);
    let Value::Temp(t) = origin else {
        return false;
    };
    match defs.get(*t) {
        Some(Instruction::GetElementPtr { indices, .. }) => indices.len() == 1,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use warden_ir::{Function, IrBuilder, IrType, Value};

    fn defs_of(function: &Function) -> DefMap {
        DefMap::build(function)
    }

    /// alloca [10 x i16]; decay to element 0; cast; offset by one element
    fn derivation_chain() -> Function {
        let arr_ty = IrType::array_of(IrType::I16, 10);
        let mut builder = IrBuilder::new();
        builder.create_function("f", IrType::Void);
        builder.create_block();
        let arr = builder.build_alloca(arr_ty.clone(), None).unwrap(); // %0
        let zero = builder
            .build_gep(
                Value::Temp(arr),
                arr_ty,
                vec![Value::Constant(0), Value::Constant(0)],
                IrType::I16.ptr_to(),
            )
            .unwrap(); // %1
        let cast = builder
            .build_cast(Value::Temp(zero), IrType::I8.ptr_to())
            .unwrap(); // %2
        let step = builder
            .build_gep(
                Value::Temp(cast),
                IrType::I8,
                vec![Value::Constant(2)],
                IrType::I8.ptr_to(),
            )
            .unwrap(); // %3
        builder.build_return(None).unwrap();
        let _ = step;
        builder.finish_function().unwrap()
    }

    #[test]
    fn test_strip_cast_and_zero_gep() {
        let function = derivation_chain();
        let defs = defs_of(&function);

        // %2 (cast of zero-gep) strips back to the alloca %0
        assert_eq!(strip_wrappers(&Value::Temp(2), &defs), &Value::Temp(0));
        // %3 (single-level step) is its own origin
        assert_eq!(strip_wrappers(&Value::Temp(3), &defs), &Value::Temp(3));
    }

    #[test]
    fn test_single_level_step_inherits() {
        let function = derivation_chain();
        let defs = defs_of(&function);

        assert!(inherits_bounds(&Value::Temp(3), &defs));
        // The materialized element-0 pointer is a creation, not a derivation.
        assert!(!inherits_bounds(&Value::Temp(2), &defs));
        assert!(!inherits_bounds(&Value::Temp(0), &defs));
    }

    #[test]
    fn test_multi_level_descent_does_not_inherit() {
        let struct_ty = IrType::Struct {
            name: Some("pair".to_string()),
            fields: vec![IrType::I16, IrType::array_of(IrType::I16, 4)],
            packed: false,
        };
        let mut builder = IrBuilder::new();
        builder.create_function("f", IrType::Void);
        builder.create_block();
        let s = builder.build_alloca(struct_ty.clone(), None).unwrap();
        let field = builder
            .build_gep(
                Value::Temp(s),
                struct_ty,
                vec![Value::Constant(0), Value::Constant(1)],
                IrType::array_of(IrType::I16, 4).ptr_to(),
            )
            .unwrap();
        builder.build_return(None).unwrap();
        let function = builder.finish_function().unwrap();
        let defs = defs_of(&function);

        assert!(!inherits_bounds(&Value::Temp(field), &defs));
    }

    #[test]
    fn test_non_temp_values_do_not_inherit() {
        let function = derivation_chain();
        let defs = defs_of(&function);

        assert!(!inherits_bounds(&Value::Global("g".to_string()), &defs));
        assert!(!inherits_bounds(
            &Value::const_elem(Value::Global("g".to_string()), 2),
            &defs
        ));
    }
}
