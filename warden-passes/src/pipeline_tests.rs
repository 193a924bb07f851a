// End-to-end tests for the normalize-then-instrument pipeline

#[cfg(test)]
mod tests {
    use crate::{expand_setbounds, run_module};
    use pretty_assertions::assert_eq;
    use warden_common::PassError;
    use warden_ir::{
        Function, GlobalVariable, Instruction, IrBuilder, IrType, Linkage, Module, TargetLayout,
        Value,
    };

    fn init_logs() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn module_with(functions: Vec<Function>, globals: Vec<GlobalVariable>) -> Module {
        let mut module = Module::new("unit".to_string(), TargetLayout::default());
        for f in functions {
            module.add_function(f);
        }
        for g in globals {
            module.add_global(g);
        }
        module
    }

    fn array_global(name: &str, elem: IrType, size: u64) -> GlobalVariable {
        GlobalVariable {
            name: name.to_string(),
            var_type: IrType::array_of(elem, size),
            is_constant: false,
            initializer: None,
            linkage: Linkage::External,
        }
    }

    fn setbounds_of(function: &Function) -> Vec<&Instruction> {
        function
            .blocks
            .iter()
            .flat_map(|b| b.instructions.iter())
            .filter(|i| matches!(i, Instruction::SetBounds { .. }))
            .collect()
    }

    /// A ten-element array with element 3 assigned a scalar: the implicit
    /// element store becomes materialize + reload + step, the
    /// materialization store is tagged with whole-array bounds, and the
    /// scalar store is not tagged.
    #[test]
    fn test_array_element_assignment() {
        init_logs();
        let arr_ty = IrType::array_of(IrType::I16, 10);
        let mut builder = IrBuilder::new();
        builder.create_function("f", IrType::Void);
        builder.create_block();
        let arr = builder.build_alloca(arr_ty.clone(), None).unwrap(); // %0
        let addr = builder
            .build_gep(
                Value::Temp(arr),
                arr_ty,
                vec![Value::Constant(0), Value::Constant(3)],
                IrType::I16.ptr_to(),
            )
            .unwrap(); // %1
        builder
            .build_store(Value::Constant(7), Value::Temp(addr))
            .unwrap();
        builder.build_return(None).unwrap();
        let function = builder.finish_function().unwrap();

        let mut module = module_with(vec![function], vec![]);
        let report = run_module(&mut module).unwrap();

        assert_eq!(report.sites_rewritten, 1);
        assert_eq!(report.bounds_inserted, 1);
        assert!(report.diagnostics.is_empty());

        let function = module.get_function("f").unwrap();
        let instrs = &function.blocks[0].instructions;

        // alloca, slot, element-zero gep, store, ptrtoint x2, setbounds,
        // reload, step, scalar store, ret
        assert_eq!(instrs.len(), 11);
        assert!(matches!(&instrs[3], Instruction::Store { .. }));
        let Instruction::SetBounds { size, .. } = &instrs[6] else {
            panic!("expected setbounds, got {}", instrs[6]);
        };
        // 10 elements of 2 bytes: whole-object extent.
        assert_eq!(size, &Value::Constant(20));

        // The primitive sits between the materialization store and the
        // first use of the materialized pointer.
        assert!(matches!(&instrs[7], Instruction::Load { .. }));

        // The rewritten scalar store is untouched and untagged.
        assert_eq!(
            instrs[9],
            Instruction::Store {
                value: Value::Constant(7),
                ptr: Value::Temp(addr),
            }
        );
    }

    /// The address of element 2 of a global array, stored into a pointer
    /// variable: tagged with the array's base and whole-array size.
    #[test]
    fn test_global_array_element_address() {
        init_logs();
        let mut builder = IrBuilder::new();
        builder.create_function("f", IrType::Void);
        builder.create_block();
        let p = builder.build_alloca(IrType::I16.ptr_to(), None).unwrap();
        builder
            .build_store(
                Value::const_elem(Value::Global("tbl".to_string()), 2),
                Value::Temp(p),
            )
            .unwrap();
        builder.build_return(None).unwrap();
        let function = builder.finish_function().unwrap();

        let mut module = module_with(
            vec![function],
            vec![array_global("tbl", IrType::I16, 10)],
        );
        let report = run_module(&mut module).unwrap();
        assert_eq!(report.bounds_inserted, 1);

        let function = module.get_function("f").unwrap();
        let Instruction::SetBounds { size, .. } = setbounds_of(function)[0] else {
            unreachable!();
        };
        assert_eq!(size, &Value::Constant(20));

        // Base operand resolves to the array itself, not element 2.
        let base_operand = function.blocks[0].instructions.iter().find_map(|i| match i {
            Instruction::Unary {
                operand: Value::Global(name),
                ..
            } => Some(name.clone()),
            _ => None,
        });
        assert_eq!(base_operand.as_deref(), Some("tbl"));
    }

    /// Plain pointer arithmetic on an already-tagged pointer: no new
    /// primitive for the derived pointer's store.
    #[test]
    fn test_offset_pointer_is_not_retagged() {
        init_logs();
        let mut builder = IrBuilder::new();
        builder.create_function("f", IrType::Void);
        builder.create_block();
        let pp = builder
            .build_alloca(IrType::I16.ptr_to().ptr_to(), None)
            .unwrap();
        let p = builder
            .build_load(Value::Temp(pp), IrType::I16.ptr_to())
            .unwrap();
        let q = builder
            .build_gep(
                Value::Temp(p),
                IrType::I16,
                vec![Value::Constant(1)],
                IrType::I16.ptr_to(),
            )
            .unwrap();
        let q_slot = builder.build_alloca(IrType::I16.ptr_to(), None).unwrap();
        builder
            .build_store(Value::Temp(q), Value::Temp(q_slot))
            .unwrap();
        builder.build_return(None).unwrap();
        let function = builder.finish_function().unwrap();

        let mut module = module_with(vec![function], vec![]);
        let report = run_module(&mut module).unwrap();

        assert_eq!(report.sites_rewritten, 0);
        assert_eq!(report.bounds_inserted, 0);
        assert!(setbounds_of(module.get_function("f").unwrap()).is_empty());
    }

    /// A variable-length stack allocation aborts the whole unit before
    /// anything is rewritten.
    #[test]
    fn test_dynamic_stack_allocation_aborts_unit() {
        init_logs();
        let mut builder = IrBuilder::new();
        builder.create_function("vla", IrType::Void);
        let n = builder.add_parameter(IrType::I32);
        builder.create_block();
        builder
            .build_alloca(IrType::I16, Some(Value::Temp(n)))
            .unwrap();
        builder.build_return(None).unwrap();
        let vla = builder.finish_function().unwrap();

        // A second, rewritable function that must stay untouched.
        let arr_ty = IrType::array_of(IrType::I16, 4);
        builder.create_function("ok", IrType::Void);
        builder.create_block();
        let arr = builder.build_alloca(arr_ty.clone(), None).unwrap();
        let addr = builder
            .build_gep(
                Value::Temp(arr),
                arr_ty,
                vec![Value::Constant(0), Value::Constant(1)],
                IrType::I16.ptr_to(),
            )
            .unwrap();
        builder
            .build_store(Value::Constant(1), Value::Temp(addr))
            .unwrap();
        builder.build_return(None).unwrap();
        let ok = builder.finish_function().unwrap();

        let mut module = module_with(vec![ok, vla], vec![]);
        let snapshot = module.clone();

        let err = run_module(&mut module).unwrap_err();
        assert_eq!(
            err,
            PassError::DynamicStackAllocation {
                function: "vla".to_string()
            }
        );
        assert_eq!(module, snapshot);
    }

    /// Storing the address of an element: exactly one primitive exists for
    /// the whole chain (on the materialization store), since the stored
    /// step pointer inherits its tag.
    #[test]
    fn test_exactly_one_tag_per_creation() {
        init_logs();
        let arr_ty = IrType::array_of(IrType::I16, 10);
        let mut builder = IrBuilder::new();
        builder.create_function("f", IrType::Void);
        builder.create_block();
        let arr = builder.build_alloca(arr_ty.clone(), None).unwrap();
        let addr = builder
            .build_gep(
                Value::Temp(arr),
                arr_ty,
                vec![Value::Constant(0), Value::Constant(3)],
                IrType::I16.ptr_to(),
            )
            .unwrap();
        let p_slot = builder.build_alloca(IrType::I16.ptr_to(), None).unwrap();
        builder
            .build_store(Value::Temp(addr), Value::Temp(p_slot))
            .unwrap();
        builder.build_return(None).unwrap();
        let function = builder.finish_function().unwrap();

        let mut module = module_with(vec![function], vec![]);
        let report = run_module(&mut module).unwrap();

        assert_eq!(report.bounds_inserted, 1);
        assert_eq!(setbounds_of(module.get_function("f").unwrap()).len(), 1);
    }

    /// A merge-fed site is skipped with a notice while the rest of the
    /// function is still rewritten and tagged.
    #[test]
    fn test_merge_site_skipped_rest_processed() {
        init_logs();
        let arr_ty = IrType::array_of(IrType::I16, 4);
        let mut builder = IrBuilder::new();
        builder.create_function("f", IrType::Void);
        let cond = builder.add_parameter(IrType::I1);
        let entry = builder.create_block();
        let left = builder.create_block();
        let right = builder.create_block();
        let join = builder.create_block();

        builder.select_block(entry);
        let a = builder.build_alloca(arr_ty.clone(), None).unwrap();
        let b = builder.build_alloca(arr_ty.clone(), None).unwrap();
        builder
            .build_branch_cond(Value::Temp(cond), left, right)
            .unwrap();
        builder.select_block(left);
        builder.build_branch(join).unwrap();
        builder.select_block(right);
        builder.build_branch(join).unwrap();
        builder.select_block(join);
        let merged = builder
            .build_phi(
                vec![(Value::Temp(a), left), (Value::Temp(b), right)],
                arr_ty.clone().ptr_to(),
            )
            .unwrap();
        let bad = builder
            .build_gep(
                Value::Temp(merged),
                arr_ty.clone(),
                vec![Value::Constant(0), Value::Constant(1)],
                IrType::I16.ptr_to(),
            )
            .unwrap();
        builder
            .build_store(Value::Constant(5), Value::Temp(bad))
            .unwrap();
        let good = builder
            .build_gep(
                Value::Temp(a),
                arr_ty,
                vec![Value::Constant(0), Value::Constant(2)],
                IrType::I16.ptr_to(),
            )
            .unwrap();
        builder
            .build_store(Value::Constant(6), Value::Temp(good))
            .unwrap();
        builder.build_return(None).unwrap();
        let function = builder.finish_function().unwrap();

        let mut module = module_with(vec![function], vec![]);
        let report = run_module(&mut module).unwrap();

        assert_eq!(report.sites_rewritten, 1);
        assert_eq!(report.bounds_inserted, 1);
        assert_eq!(report.diagnostics.len(), 1);
        assert!(report.diagnostics[0].message.contains("control-flow merge"));

        // The merge-fed site survives untouched.
        let function = module.get_function("f").unwrap();
        let join_block = function.blocks.last().unwrap();
        assert!(join_block.instructions.iter().any(|i| matches!(
            i,
            Instruction::GetElementPtr { result, indices, .. }
                if *result == bad && indices.len() == 2
        )));
    }

    /// Folded call arguments are flattened and the resulting creation is
    /// tagged once.
    #[test]
    fn test_folded_call_argument_pipeline() {
        init_logs();
        let mut builder = IrBuilder::new();
        builder.create_function("f", IrType::Void);
        builder.create_block();
        builder
            .build_call(
                Value::Function("use".to_string()),
                vec![Value::const_elem(Value::Global("tbl".to_string()), 2)],
                IrType::Void,
            )
            .unwrap();
        builder.build_return(None).unwrap();
        let function = builder.finish_function().unwrap();

        let mut module = module_with(
            vec![function],
            vec![array_global("tbl", IrType::I32, 4)],
        );
        let report = run_module(&mut module).unwrap();

        assert_eq!(report.sites_rewritten, 1);
        assert_eq!(report.bounds_inserted, 1);

        let function = module.get_function("f").unwrap();
        let Instruction::SetBounds { size, .. } = setbounds_of(function)[0] else {
            unreachable!();
        };
        assert_eq!(size, &Value::Constant(16));

        let Some(Instruction::Call { args, .. }) = function.blocks[0]
            .instructions
            .iter()
            .find(|i| matches!(i, Instruction::Call { .. }))
        else {
            panic!("call disappeared");
        };
        assert!(matches!(args[0], Value::Temp(_)));
    }

    /// After expansion no primitive survives; only the fixed trap sequence
    /// remains.
    #[test]
    fn test_expansion_after_pipeline() {
        init_logs();
        let arr_ty = IrType::array_of(IrType::I16, 10);
        let mut builder = IrBuilder::new();
        builder.create_function("f", IrType::Void);
        builder.create_block();
        let arr = builder.build_alloca(arr_ty.clone(), None).unwrap();
        let addr = builder
            .build_gep(
                Value::Temp(arr),
                arr_ty,
                vec![Value::Constant(0), Value::Constant(3)],
                IrType::I16.ptr_to(),
            )
            .unwrap();
        builder
            .build_store(Value::Constant(7), Value::Temp(addr))
            .unwrap();
        builder.build_return(None).unwrap();
        let function = builder.finish_function().unwrap();

        let mut module = module_with(vec![function], vec![]);
        let report = run_module(&mut module).unwrap();
        let expanded = expand_setbounds(&mut module);

        assert_eq!(expanded, report.bounds_inserted);
        let function = module.get_function("f").unwrap();
        assert!(setbounds_of(function).is_empty());
        assert!(function.blocks[0].instructions.iter().any(|i| matches!(
            i,
            Instruction::InlineAsm { assembly } if assembly.contains("ecall")
        )));
    }

    /// External declarations are left alone.
    #[test]
    fn test_external_functions_untouched() {
        init_logs();
        let mut external = Function::new("memcpy".to_string(), IrType::Void);
        external.is_external = true;
        let mut module = module_with(vec![external], vec![]);
        let snapshot = module.clone();

        let report = run_module(&mut module).unwrap();
        assert_eq!(report.sites_rewritten, 0);
        assert_eq!(report.bounds_inserted, 0);
        assert_eq!(module, snapshot);
    }
}
