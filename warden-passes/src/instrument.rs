//! Bounds tagging instrumentor
//!
//! Runs after normalization. Every store of a freshly created pointer is
//! followed by a set-bounds primitive carrying the referent object's base
//! address and full byte extent; the bounds-checking mechanism rejects
//! out-of-range dereferences through that tag. Pointers that merely derive
//! from an already-tagged pointer are left alone.
//!
//! Sizing is whole-object throughout: a pointer into the middle of a
//! buffer is tagged with the buffer's base and total size, and a pointer
//! to a struct member inherits the enclosing aggregate's extent.

use log::{debug, trace};
use warden_common::PassError;
use warden_ir::{
    Function, GlobalVariable, Instruction, IrUnaryOp, TargetLayout, Value,
};

use crate::defs::{is_pointer_value, DefMap, TempAlloc};
use crate::provenance;

/// Reject functions with variable-length stack frames.
///
/// Size computation is unsound for dynamically sized stack allocations, so
/// this is a whole-compilation bailout, not a per-site skip.
pub fn check_no_dynamic_alloca(function: &Function) -> Result<(), PassError> {
    for block in &function.blocks {
        for instr in &block.instructions {
            if let Instruction::Alloca {
                count: Some(count), ..
            } = instr
            {
                if !matches!(count, Value::Constant(_)) {
                    return Err(PassError::DynamicStackAllocation {
                        function: function.name.clone(),
                    });
                }
            }
        }
    }
    Ok(())
}

/// Instrument every pointer-creating store in `function`. Returns the
/// number of set-bounds primitives inserted.
pub fn instrument_function(
    function: &mut Function,
    globals: &[GlobalVariable],
    layout: &TargetLayout,
) -> Result<usize, PassError> {
    check_no_dynamic_alloca(function)?;

    let defs = DefMap::build(function);
    let mut temps = TempAlloc::new(function);
    let params = function.parameters.clone();
    let mut inserted = 0;

    for block in &mut function.blocks {
        let old = std::mem::take(&mut block.instructions);
        block.instructions = Vec::with_capacity(old.len());

        for instr in old {
            let mut tag: Option<[Instruction; 3]> = None;

            if let Instruction::Store { value, .. } = &instr {
                if is_pointer_value(value, &defs, &params) {
                    if let Some((base, size)) = referent_bounds(value, &defs, globals, layout)? {
                        if provenance::inherits_bounds(value, &defs) {
                            trace!("store of {} inherits its tag; not re-tagged", value);
                        } else {
                            debug!(
                                "tagging store of {} in '{}': base {}, {} bytes",
                                value, function.name, base, size
                            );
                            let addr_ty = layout.address_type();
                            let ptr_int = temps.fresh();
                            let base_int = temps.fresh();
                            tag = Some([
                                Instruction::Unary {
                                    result: ptr_int,
                                    op: IrUnaryOp::PtrToInt,
                                    operand: value.clone(),
                                    result_type: addr_ty.clone(),
                                },
                                Instruction::Unary {
                                    result: base_int,
                                    op: IrUnaryOp::PtrToInt,
                                    operand: base,
                                    result_type: addr_ty,
                                },
                                Instruction::SetBounds {
                                    ptr: Value::Temp(ptr_int),
                                    base: Value::Temp(base_int),
                                    size: Value::Constant(size as i64),
                                },
                            ]);
                            inserted += 1;
                        }
                    }
                }
            }

            // The primitive lands immediately after the store it depends
            // on, before any use of the pointer.
            block.instructions.push(instr);
            if let Some(tag) = tag {
                block.instructions.extend(tag);
            }
        }
    }

    Ok(inserted)
}

/// Classify the stored pointer's origin and compute the referent's base
/// and whole-object byte size.
///
/// `None` means the origin is not a creation site this pass recognizes
/// (parameters, call results, loaded pointers): such pointers carry a tag
/// from their own creation point elsewhere.
fn referent_bounds(
    value: &Value,
    defs: &DefMap,
    globals: &[GlobalVariable],
    layout: &TargetLayout,
) -> Result<Option<(Value, u64)>, PassError> {
    let origin = provenance::strip_wrappers(value, defs);
    match origin {
        Value::Temp(t) => match defs.get(*t) {
            // Pointer to a stack object: the stored pointer addresses the
            // object start.
            Some(Instruction::Alloca {
                alloc_type, count, ..
            }) => {
                let mut size = layout.size_of(alloc_type)?;
                if let Some(Value::Constant(n)) = count {
                    size *= *n as u64;
                }
                Ok(Some((value.clone(), size)))
            }
            // Pointer produced by indexing a buffer: whole-buffer bounds,
            // based at the indexing base.
            Some(Instruction::GetElementPtr {
                base, source_ty, ..
            }) => Ok(Some((base.clone(), layout.size_of(source_ty)?))),
            _ => Ok(None),
        },
        // Folded element address into a global aggregate: the whole
        // aggregate's extent, based at the global.
        Value::ConstElem { base, .. } => match base.as_ref() {
            Value::Global(name) => {
                let global = lookup_global(globals, name)?;
                Ok(Some((
                    Value::Global(name.clone()),
                    layout.size_of(&global.var_type)?,
                )))
            }
            _ => Ok(None),
        },
        // Address of a global taken directly.
        Value::Global(name) => {
            let global = lookup_global(globals, name)?;
            Ok(Some((origin.clone(), layout.size_of(&global.var_type)?)))
        }
        _ => Ok(None),
    }
}

fn lookup_global<'a>(
    globals: &'a [GlobalVariable],
    name: &str,
) -> Result<&'a GlobalVariable, PassError> {
    globals
        .iter()
        .find(|g| g.name == name)
        .ok_or_else(|| PassError::internal(format!("store references unknown global @{}", name)))
}
