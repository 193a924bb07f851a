//! Array-to-pointer normalizer
//!
//! Rewrites every implicit array-element address computation into an
//! explicit, observable pointer-creation event. The rewrite stores the
//! object's element-zero address into a fresh stack slot and reloads it;
//! the store is the signal the bounds instrumentor detects. The reloaded
//! pointer then reaches the original element through plain single-level
//! pointer arithmetic.
//!
//! Materialization happens once per base object per function, at the
//! object's definition point; every rewritten access re-loads the slot, so
//! the rewrite is valid in every block the object dominates.

use std::collections::HashMap;

use log::{debug, trace, warn};
use warden_common::{PassError, Reporter, Site};
use warden_ir::{Function, GlobalVariable, Instruction, IrType, TargetLayout, TempId, Value};

use crate::defs::{DefMap, TempAlloc};

/// Identity of a base object whose element-zero pointer has been
/// materialized
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum BaseKey {
    Temp(TempId),
    Global(String),
}

/// Where a materialization sequence is spliced in
#[derive(Debug)]
enum InsertAt {
    /// Right after the instruction defining this temporary
    AfterDef(TempId),
    /// At the top of the entry block (globals have no in-function
    /// definition)
    EntryTop,
}

/// Explicit rewrite context for one pass over one function.
///
/// Holds the fresh-temp allocator, the per-object slot cache, and the
/// deferred definition-point insertions; threaded through the planning
/// calls so the pass stays reentrant.
struct Rewriter<'a> {
    layout: &'a TargetLayout,
    globals: &'a [GlobalVariable],
    defs: DefMap,
    temps: TempAlloc,
    slots: HashMap<BaseKey, TempId>,
    insertions: Vec<(InsertAt, Vec<Instruction>)>,
    replacements: HashMap<(usize, usize), Vec<Instruction>>,
    rewritten: usize,
}

/// Run the normalizer until it reports no further change.
///
/// Diagnostics for sites left unrewritten are taken from the final, stable
/// round, so each surviving site is reported exactly once.
pub fn normalize_to_fixed_point(
    function: &mut Function,
    globals: &[GlobalVariable],
    layout: &TargetLayout,
    reporter: &mut Reporter,
) -> Result<usize, PassError> {
    let mut total = 0;
    loop {
        let mut round = Reporter::new();
        let rewritten = normalize_function(function, globals, layout, &mut round)?;
        if rewritten == 0 {
            reporter.extend(round.into_diagnostics());
            return Ok(total);
        }
        total += rewritten;
    }
}

/// One normalization pass over `function`. Returns the number of sites
/// rewritten.
pub fn normalize_function(
    function: &mut Function,
    globals: &[GlobalVariable],
    layout: &TargetLayout,
    reporter: &mut Reporter,
) -> Result<usize, PassError> {
    let mut rewriter = Rewriter {
        layout,
        globals,
        defs: DefMap::build(function),
        temps: TempAlloc::new(function),
        slots: HashMap::new(),
        insertions: Vec::new(),
        replacements: HashMap::new(),
        rewritten: 0,
    };

    for (block_idx, block) in function.blocks.iter().enumerate() {
        for (instr_idx, instr) in block.instructions.iter().enumerate() {
            let site = Site::new(function.name.clone(), block.id, instr_idx);
            rewriter.plan_instruction(instr, block_idx, instr_idx, &site, reporter)?;
        }
    }

    let Rewriter {
        rewritten,
        replacements,
        insertions,
        ..
    } = rewriter;

    apply(function, replacements, insertions)?;
    if rewritten > 0 {
        debug!("normalized {} site(s) in '{}'", rewritten, function.name);
    }
    Ok(rewritten)
}

/// Whether this GEP addresses into array-typed memory: the target shape of
/// the pass. All-zero index lists are pure re-addressing wrappers (the
/// materialization's own form); a non-zero leading index steps over whole
/// arrays rather than addressing elements of the pointee.
fn is_array_element_access(source_ty: &IrType, indices: &[Value]) -> bool {
    source_ty.is_array()
        && indices.len() >= 2
        && matches!(indices[0], Value::Constant(0))
        && !indices.iter().all(|idx| matches!(idx, Value::Constant(0)))
}

impl Rewriter<'_> {
    fn plan_instruction(
        &mut self,
        instr: &Instruction,
        block_idx: usize,
        instr_idx: usize,
        site: &Site,
        reporter: &mut Reporter,
    ) -> Result<(), PassError> {
        if let Instruction::GetElementPtr {
            result,
            base,
            source_ty,
            indices,
            ..
        } = instr
        {
            if is_array_element_access(source_ty, indices) {
                if let Some(seq) =
                    self.plan_element_access(*result, base, source_ty, indices, site, reporter)?
                {
                    self.replacements.insert((block_idx, instr_idx), seq);
                    self.rewritten += 1;
                }
                return Ok(());
            }
        }

        // Instrumentation operands are not program addressing.
        if matches!(instr, Instruction::SetBounds { .. }) {
            return Ok(());
        }

        self.plan_operand_flattening(instr, block_idx, instr_idx, site, reporter)
    }

    /// Rewrite one direct array element access into
    /// materialize-load-then-step form. Returns the replacement sequence,
    /// or `None` when the site is a known-unsupported pattern that must be
    /// skipped.
    fn plan_element_access(
        &mut self,
        result: TempId,
        base: &Value,
        source_ty: &IrType,
        indices: &[Value],
        site: &Site,
        reporter: &mut Reporter,
    ) -> Result<Option<Vec<Instruction>>, PassError> {
        let IrType::Array { element_type, .. } = source_ty else {
            return Err(PassError::malformed(
                site.clone(),
                "element access on non-array",
            ));
        };
        let elem_ty = element_type.as_ref().clone();

        let Some(slot) = self.materialize(base, source_ty, &elem_ty, site, reporter)? else {
            return Ok(None);
        };

        // Reload the materialized element-zero pointer at the use site.
        let loaded = self.temps.fresh();
        let mut seq = vec![Instruction::Load {
            result: loaded,
            ptr: Value::Temp(slot),
            result_type: elem_ty.clone().ptr_to(),
        }];

        let mut cursor = Value::Temp(loaded);
        let mut cursor_ty = elem_ty;
        let remaining = &indices[1..];

        for (pos, index) in remaining.iter().enumerate() {
            let is_last = pos + 1 == remaining.len();

            if pos > 0 {
                let descended = cursor_ty.clone();
                match descended {
                    IrType::Array { element_type, .. } => {
                        // Decay to the nested element pointer before
                        // stepping; multi-index forms into array memory
                        // must not survive.
                        let decayed = self.temps.fresh();
                        seq.push(Instruction::GetElementPtr {
                            result: decayed,
                            base: cursor,
                            source_ty: cursor_ty.clone(),
                            indices: vec![Value::Constant(0), Value::Constant(0)],
                            in_bounds: true,
                            result_type: element_type.as_ref().clone().ptr_to(),
                        });
                        cursor = Value::Temp(decayed);
                        cursor_ty = element_type.as_ref().clone();
                    }
                    IrType::Struct { ref fields, .. } => {
                        // Field selection; structs are not array-typed
                        // memory, so the two-index form stays.
                        let Value::Constant(field_idx) = index else {
                            return Err(PassError::malformed(
                                site.clone(),
                                "non-constant struct field index",
                            ));
                        };
                        let field_ty = fields
                            .get(*field_idx as usize)
                            .ok_or_else(|| {
                                PassError::malformed(site.clone(), "struct field out of range")
                            })?
                            .clone();
                        let selected = if is_last { result } else { self.temps.fresh() };
                        seq.push(Instruction::GetElementPtr {
                            result: selected,
                            base: cursor,
                            source_ty: cursor_ty.clone(),
                            indices: vec![Value::Constant(0), index.clone()],
                            in_bounds: true,
                            result_type: field_ty.clone().ptr_to(),
                        });
                        cursor = Value::Temp(selected);
                        cursor_ty = field_ty;
                        continue;
                    }
                    other => {
                        return Err(PassError::malformed(
                            site.clone(),
                            format!("cannot index into {}", other),
                        ));
                    }
                }
            }

            // Plain single-level pointer step, scaled by the element size.
            let stepped = if is_last { result } else { self.temps.fresh() };
            seq.push(Instruction::GetElementPtr {
                result: stepped,
                base: cursor,
                source_ty: cursor_ty.clone(),
                indices: vec![index.clone()],
                in_bounds: true,
                result_type: cursor_ty.clone().ptr_to(),
            });
            cursor = Value::Temp(stepped);
        }

        trace!("rewrote element access at {}", site);
        Ok(Some(seq))
    }

    /// Flatten folded constant addressing expressions carried in operand
    /// position. The stored-value operand of a `Store` is exempt: pointer
    /// creation through a store is exactly what the instrumentor detects.
    fn plan_operand_flattening(
        &mut self,
        instr: &Instruction,
        block_idx: usize,
        instr_idx: usize,
        site: &Site,
        reporter: &mut Reporter,
    ) -> Result<(), PassError> {
        let is_store = matches!(instr, Instruction::Store { .. });
        let is_merge = matches!(instr, Instruction::Phi { .. });

        let mut rewritten_instr = instr.clone();
        let mut preamble = Vec::new();

        for (operand_idx, operand) in rewritten_instr.operands_mut().into_iter().enumerate() {
            let (folded_base, folded_index) = match &*operand {
                Value::ConstElem { base, index } => (base.as_ref().clone(), *index),
                _ => continue,
            };
            if is_store && operand_idx == 0 {
                continue;
            }
            if is_merge {
                warn!(
                    "{}: folded element address reaches a control-flow merge",
                    site
                );
                reporter.warning(
                    "folded element address reaches a control-flow merge; site left unrewritten"
                        .to_string(),
                    site.clone(),
                );
                continue;
            }

            match folded_base {
                Value::ConstElem { .. } => {
                    warn!("{}: nested folded element address", site);
                    reporter.warning(
                        "nested folded element address; site left unrewritten".to_string(),
                        site.clone(),
                    );
                }
                Value::Global(ref name) => {
                    let Some(global) = self.globals.iter().find(|g| g.name == *name) else {
                        return Err(PassError::malformed(
                            site.clone(),
                            format!("folded address of unknown global @{}", name),
                        ));
                    };
                    let global_ty = global.var_type.clone();
                    let IrType::Array { ref element_type, .. } = global_ty else {
                        // Not array-typed memory; the instrumentor sizes
                        // such addresses directly if they are stored.
                        continue;
                    };
                    let elem_ty = element_type.as_ref().clone();

                    let Some(slot) =
                        self.materialize(&folded_base, &global_ty, &elem_ty, site, reporter)?
                    else {
                        continue;
                    };

                    let loaded = self.temps.fresh();
                    preamble.push(Instruction::Load {
                        result: loaded,
                        ptr: Value::Temp(slot),
                        result_type: elem_ty.clone().ptr_to(),
                    });
                    let stepped = self.temps.fresh();
                    preamble.push(Instruction::GetElementPtr {
                        result: stepped,
                        base: Value::Temp(loaded),
                        source_ty: elem_ty.clone(),
                        indices: vec![Value::Constant(folded_index)],
                        in_bounds: true,
                        result_type: elem_ty.clone().ptr_to(),
                    });
                    *operand = Value::Temp(stepped);
                }
                _ => {}
            }
        }

        if !preamble.is_empty() {
            preamble.push(rewritten_instr);
            self.replacements.insert((block_idx, instr_idx), preamble);
            self.rewritten += 1;
        }
        Ok(())
    }

    /// Ensure the element-zero pointer of `base` is materialized: a
    /// pointer-sized stack slot holding the address of element zero, stored
    /// at the object's definition point. Cached per object. Returns the
    /// slot, or `None` for a known-unsupported site that was skipped.
    fn materialize(
        &mut self,
        base: &Value,
        array_ty: &IrType,
        elem_ty: &IrType,
        site: &Site,
        reporter: &mut Reporter,
    ) -> Result<Option<TempId>, PassError> {
        let (key, insert_at) = match base {
            Value::Temp(t) => match self.defs.get(*t) {
                Some(Instruction::Phi { .. }) => {
                    warn!("{}: address computation fed by control-flow merge", site);
                    reporter.warning(
                        "address computation fed by a control-flow merge; site left unrewritten"
                            .to_string(),
                        site.clone(),
                    );
                    return Ok(None);
                }
                Some(_) => (BaseKey::Temp(*t), InsertAt::AfterDef(*t)),
                None => {
                    return Err(PassError::malformed(
                        site.clone(),
                        format!(
                            "array base %{} is neither an instruction result nor a global",
                            t
                        ),
                    ));
                }
            },
            Value::Global(name) => (BaseKey::Global(name.clone()), InsertAt::EntryTop),
            other => {
                return Err(PassError::malformed(
                    site.clone(),
                    format!("unsupported array base operand {}", other),
                ));
            }
        };

        if let Some(slot) = self.slots.get(&key) {
            return Ok(Some(*slot));
        }

        // The element must be a concrete sized object before addresses into
        // it can be rebuilt.
        let elem_size = self.layout.size_of(elem_ty)?;
        trace!(
            "materializing element-zero pointer for {} ({}-byte elements)",
            base,
            elem_size
        );

        let slot = self.temps.fresh();
        let zero = self.temps.fresh();
        let sequence = vec![
            Instruction::Alloca {
                result: slot,
                alloc_type: elem_ty.clone().ptr_to(),
                count: None,
                result_type: elem_ty.clone().ptr_to().ptr_to(),
            },
            Instruction::GetElementPtr {
                result: zero,
                base: base.clone(),
                source_ty: array_ty.clone(),
                indices: vec![Value::Constant(0), Value::Constant(0)],
                in_bounds: true,
                result_type: elem_ty.clone().ptr_to(),
            },
            Instruction::Store {
                value: Value::Temp(zero),
                ptr: Value::Temp(slot),
            },
        ];
        self.insertions.push((insert_at, sequence));
        self.slots.insert(key, slot);
        Ok(Some(slot))
    }
}

/// Apply the planned rewrites: rebuild each block with its replacement
/// sequences, then splice the deferred definition-point insertions. Blocks
/// are rebuilt rather than edited under iteration.
fn apply(
    function: &mut Function,
    mut replacements: HashMap<(usize, usize), Vec<Instruction>>,
    insertions: Vec<(InsertAt, Vec<Instruction>)>,
) -> Result<(), PassError> {
    if !replacements.is_empty() {
        for (block_idx, block) in function.blocks.iter_mut().enumerate() {
            let old = std::mem::take(&mut block.instructions);
            block.instructions = Vec::with_capacity(old.len());
            for (instr_idx, instr) in old.into_iter().enumerate() {
                match replacements.remove(&(block_idx, instr_idx)) {
                    Some(sequence) => block.instructions.extend(sequence),
                    None => block.instructions.push(instr),
                }
            }
        }
    }

    let mut entry_cursor = 0;
    for (at, sequence) in insertions {
        match at {
            InsertAt::EntryTop => {
                let entry = function.blocks.first_mut().ok_or_else(|| {
                    PassError::internal("materialization in a function with no blocks")
                })?;
                let len = sequence.len();
                entry
                    .instructions
                    .splice(entry_cursor..entry_cursor, sequence);
                entry_cursor += len;
            }
            InsertAt::AfterDef(temp) => {
                let position = function.blocks.iter().enumerate().find_map(|(bi, block)| {
                    block
                        .instructions
                        .iter()
                        .position(|instr| instr.result() == Some(temp))
                        .map(|ii| (bi, ii))
                });
                let Some((block_idx, instr_idx)) = position else {
                    return Err(PassError::internal(format!(
                        "definition of %{} vanished during rewrite",
                        temp
                    )));
                };
                let insert_at = instr_idx + 1;
                function.blocks[block_idx]
                    .instructions
                    .splice(insert_at..insert_at, sequence);
            }
        }
    }
    Ok(())
}
