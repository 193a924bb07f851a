//! IR object model
//!
//! This module defines the instruction set the Warden passes operate on.
//! It is SSA-style: every instruction result has exactly one definition,
//! identified by a `TempId`, and operands are `Value`s referencing earlier
//! results, constants, or globals.

use serde::{Deserialize, Serialize};
use std::fmt;
use warden_common::{LabelId, TempId};

use crate::layout::TargetLayout;

/// IR Value - represents operands in IR instructions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// Temporary variable
    Temp(TempId),

    /// Constant integer
    Constant(i64),

    /// Global variable reference (the address of the global)
    Global(String),

    /// Function reference
    Function(String),

    /// Folded constant addressing expression: the address of element
    /// `index` of `base`, carried in operand position instead of as a
    /// real instruction. `base` is normally a `Global`.
    ConstElem { base: Box<Value>, index: i64 },

    /// Undefined value (for uninitialized variables)
    Undef,
}

impl Value {
    /// Shorthand for a folded element address over a global.
    pub fn const_elem(base: Value, index: i64) -> Self {
        Value::ConstElem {
            base: Box::new(base),
            index,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Temp(id) => write!(f, "%{}", id),
            Value::Constant(val) => write!(f, "{}", val),
            Value::Global(name) => write!(f, "@{}", name),
            Value::Function(name) => write!(f, "@{}", name),
            Value::ConstElem { base, index } => write!(f, "{}[{}]", base, index),
            Value::Undef => write!(f, "undef"),
        }
    }
}

/// IR Type system
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum IrType {
    /// Void type
    Void,

    /// Integer types with bit width
    I1,
    I8,
    I16,
    I32,
    I64,

    /// Pointer type
    Ptr(Box<IrType>),

    /// Array type [size x element_type]
    Array { size: u64, element_type: Box<IrType> },

    /// Struct type with ordered fields
    Struct {
        name: Option<String>,
        fields: Vec<IrType>,
        packed: bool,
    },
}

impl IrType {
    /// Check if this is an integer type
    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            IrType::I1 | IrType::I8 | IrType::I16 | IrType::I32 | IrType::I64
        )
    }

    /// Check if this is a pointer type
    pub fn is_pointer(&self) -> bool {
        matches!(self, IrType::Ptr(_))
    }

    /// Check if this is an array type
    pub fn is_array(&self) -> bool {
        matches!(self, IrType::Array { .. })
    }

    /// The type a pointer refers to
    pub fn pointee(&self) -> Option<&IrType> {
        match self {
            IrType::Ptr(target) => Some(target),
            _ => None,
        }
    }

    /// The element type for pointers and arrays
    pub fn element_type(&self) -> Option<&IrType> {
        match self {
            IrType::Ptr(elem) => Some(elem),
            IrType::Array { element_type, .. } => Some(element_type),
            _ => None,
        }
    }

    /// Convenience constructor for pointer-to-self
    pub fn ptr_to(self) -> IrType {
        IrType::Ptr(Box::new(self))
    }

    /// Convenience constructor for arrays
    pub fn array_of(element_type: IrType, size: u64) -> IrType {
        IrType::Array {
            size,
            element_type: Box::new(element_type),
        }
    }
}

impl fmt::Display for IrType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IrType::Void => write!(f, "void"),
            IrType::I1 => write!(f, "i1"),
            IrType::I8 => write!(f, "i8"),
            IrType::I16 => write!(f, "i16"),
            IrType::I32 => write!(f, "i32"),
            IrType::I64 => write!(f, "i64"),
            IrType::Ptr(target) => write!(f, "{}*", target),
            IrType::Array { size, element_type } => write!(f, "[{} x {}]", size, element_type),
            IrType::Struct {
                name: Some(name), ..
            } => write!(f, "%{}", name),
            IrType::Struct { name: None, .. } => write!(f, "%struct"),
        }
    }
}

/// Binary operations in IR
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IrBinaryOp {
    Add,
    Sub,
    Mul,
    SDiv,
    UDiv,
    And,
    Or,
    Xor,
    Shl,
    LShr,
    AShr,
    Eq,
    Ne,
    Slt,
    Sle,
    Sgt,
    Sge,
    Ult,
    Ule,
    Ugt,
    Uge,
}

impl fmt::Display for IrBinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op_str = match self {
            IrBinaryOp::Add => "add",
            IrBinaryOp::Sub => "sub",
            IrBinaryOp::Mul => "mul",
            IrBinaryOp::SDiv => "sdiv",
            IrBinaryOp::UDiv => "udiv",
            IrBinaryOp::And => "and",
            IrBinaryOp::Or => "or",
            IrBinaryOp::Xor => "xor",
            IrBinaryOp::Shl => "shl",
            IrBinaryOp::LShr => "lshr",
            IrBinaryOp::AShr => "ashr",
            IrBinaryOp::Eq => "eq",
            IrBinaryOp::Ne => "ne",
            IrBinaryOp::Slt => "slt",
            IrBinaryOp::Sle => "sle",
            IrBinaryOp::Sgt => "sgt",
            IrBinaryOp::Sge => "sge",
            IrBinaryOp::Ult => "ult",
            IrBinaryOp::Ule => "ule",
            IrBinaryOp::Ugt => "ugt",
            IrBinaryOp::Uge => "uge",
        };
        write!(f, "{}", op_str)
    }
}

/// Unary operations in IR
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IrUnaryOp {
    Not,
    Neg,
    ZExt,
    SExt,
    Trunc,
    PtrToInt,
    IntToPtr,
}

impl fmt::Display for IrUnaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op_str = match self {
            IrUnaryOp::Not => "not",
            IrUnaryOp::Neg => "neg",
            IrUnaryOp::ZExt => "zext",
            IrUnaryOp::SExt => "sext",
            IrUnaryOp::Trunc => "trunc",
            IrUnaryOp::PtrToInt => "ptrtoint",
            IrUnaryOp::IntToPtr => "inttoptr",
        };
        write!(f, "{}", op_str)
    }
}

/// IR Instruction
///
/// `GetElementPtr` address arithmetic: `base` is pointer-typed with pointee
/// `source_ty`; `indices[0]` steps over whole `source_ty`-sized units, and
/// each subsequent index descends one level into the current type (array
/// element selection, or constant struct field selection). A GEP whose
/// indices are all zero computes the same address as its base (a pure
/// re-addressing wrapper); a GEP with a single index is plain pointer
/// arithmetic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Instruction {
    /// Binary operation: result = op lhs, rhs
    Binary {
        result: TempId,
        op: IrBinaryOp,
        lhs: Value,
        rhs: Value,
        result_type: IrType,
    },

    /// Unary operation: result = op operand
    Unary {
        result: TempId,
        op: IrUnaryOp,
        operand: Value,
        result_type: IrType,
    },

    /// Load from memory: result = load ptr
    Load {
        result: TempId,
        ptr: Value,
        result_type: IrType,
    },

    /// Store to memory: store value, ptr
    Store { value: Value, ptr: Value },

    /// Address arithmetic: result = getelementptr base, indices
    GetElementPtr {
        result: TempId,
        base: Value,
        source_ty: IrType,
        indices: Vec<Value>,
        in_bounds: bool,
        result_type: IrType,
    },

    /// Allocate stack memory: result = alloca type[, count]
    ///
    /// A non-constant `count` marks a variable-length stack frame.
    Alloca {
        result: TempId,
        alloc_type: IrType,
        count: Option<Value>,
        result_type: IrType,
    },

    /// Function call: result = call func(args...)
    Call {
        result: Option<TempId>,
        function: Value,
        args: Vec<Value>,
        result_type: IrType,
    },

    /// Return: ret value or ret void
    Return(Option<Value>),

    /// Unconditional branch: br label
    Branch(LabelId),

    /// Conditional branch: br condition, true_label, false_label
    BranchCond {
        condition: Value,
        true_label: LabelId,
        false_label: LabelId,
    },

    /// Phi node: result = phi [val1, label1], [val2, label2], ...
    Phi {
        result: TempId,
        incoming: Vec<(Value, LabelId)>,
        result_type: IrType,
    },

    /// Type cast: result = cast value to target_type
    Cast {
        result: TempId,
        value: Value,
        target_type: IrType,
    },

    /// Bounds tagging primitive: setbounds ptr, base, size
    ///
    /// Associates the pointer with the (base, size) region checked on
    /// dereference. All three operands are address-width integers. Opaque
    /// to every pass; expanded to its trap sequence only at the very end.
    SetBounds { ptr: Value, base: Value, size: Value },

    /// Inline assembly
    InlineAsm { assembly: String },

    /// Comment (for debugging)
    Comment(String),
}

impl Instruction {
    /// The temporary this instruction defines, if any
    pub fn result(&self) -> Option<TempId> {
        match self {
            Instruction::Binary { result, .. }
            | Instruction::Unary { result, .. }
            | Instruction::Load { result, .. }
            | Instruction::GetElementPtr { result, .. }
            | Instruction::Alloca { result, .. }
            | Instruction::Phi { result, .. }
            | Instruction::Cast { result, .. } => Some(*result),
            Instruction::Call { result, .. } => *result,
            _ => None,
        }
    }

    /// The type of the defined temporary, if any
    pub fn result_type(&self) -> Option<&IrType> {
        match self {
            Instruction::Binary { result_type, .. }
            | Instruction::Unary { result_type, .. }
            | Instruction::Load { result_type, .. }
            | Instruction::GetElementPtr { result_type, .. }
            | Instruction::Alloca { result_type, .. }
            | Instruction::Phi { result_type, .. } => Some(result_type),
            Instruction::Call {
                result: Some(_),
                result_type,
                ..
            } => Some(result_type),
            Instruction::Cast { target_type, .. } => Some(target_type),
            _ => None,
        }
    }

    pub fn is_terminator(&self) -> bool {
        matches!(
            self,
            Instruction::Return(_) | Instruction::Branch(_) | Instruction::BranchCond { .. }
        )
    }

    /// All value operands, in operand order
    pub fn operands(&self) -> Vec<&Value> {
        match self {
            Instruction::Binary { lhs, rhs, .. } => vec![lhs, rhs],
            Instruction::Unary { operand, .. } => vec![operand],
            Instruction::Load { ptr, .. } => vec![ptr],
            Instruction::Store { value, ptr } => vec![value, ptr],
            Instruction::GetElementPtr { base, indices, .. } => {
                let mut ops = vec![base];
                ops.extend(indices.iter());
                ops
            }
            Instruction::Alloca { count, .. } => count.iter().collect(),
            Instruction::Call { function, args, .. } => {
                let mut ops = vec![function];
                ops.extend(args.iter());
                ops
            }
            Instruction::Return(value) => value.iter().collect(),
            Instruction::BranchCond { condition, .. } => vec![condition],
            Instruction::Phi { incoming, .. } => incoming.iter().map(|(v, _)| v).collect(),
            Instruction::Cast { value, .. } => vec![value],
            Instruction::SetBounds { ptr, base, size } => vec![ptr, base, size],
            _ => Vec::new(),
        }
    }

    /// Mutable access to all value operands, in operand order
    pub fn operands_mut(&mut self) -> Vec<&mut Value> {
        match self {
            Instruction::Binary { lhs, rhs, .. } => vec![lhs, rhs],
            Instruction::Unary { operand, .. } => vec![operand],
            Instruction::Load { ptr, .. } => vec![ptr],
            Instruction::Store { value, ptr } => vec![value, ptr],
            Instruction::GetElementPtr { base, indices, .. } => {
                let mut ops = vec![base];
                ops.extend(indices.iter_mut());
                ops
            }
            Instruction::Alloca { count, .. } => count.iter_mut().collect(),
            Instruction::Call { function, args, .. } => {
                let mut ops = vec![function];
                ops.extend(args.iter_mut());
                ops
            }
            Instruction::Return(value) => value.iter_mut().collect(),
            Instruction::BranchCond { condition, .. } => vec![condition],
            Instruction::Phi { incoming, .. } => incoming.iter_mut().map(|(v, _)| v).collect(),
            Instruction::Cast { value, .. } => vec![value],
            Instruction::SetBounds { ptr, base, size } => vec![ptr, base, size],
            _ => Vec::new(),
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instruction::Binary {
                result,
                op,
                lhs,
                rhs,
                result_type,
            } => {
                write!(f, "%{} = {} {} {}, {}", result, op, result_type, lhs, rhs)
            }
            Instruction::Unary {
                result,
                op,
                operand,
                result_type,
            } => {
                write!(f, "%{} = {} {} to {}", result, op, operand, result_type)
            }
            Instruction::Load {
                result,
                ptr,
                result_type,
            } => {
                write!(f, "%{} = load {}, {}", result, result_type, ptr)
            }
            Instruction::Store { value, ptr } => {
                write!(f, "store {}, {}", value, ptr)
            }
            Instruction::GetElementPtr {
                result,
                base,
                source_ty,
                indices,
                in_bounds,
                ..
            } => {
                write!(f, "%{} = getelementptr ", result)?;
                if *in_bounds {
                    write!(f, "inbounds ")?;
                }
                write!(f, "{}, {}", source_ty, base)?;
                for index in indices {
                    write!(f, ", {}", index)?;
                }
                Ok(())
            }
            Instruction::Alloca {
                result,
                alloc_type,
                count,
                ..
            } => {
                write!(f, "%{} = alloca {}", result, alloc_type)?;
                if let Some(count) = count {
                    write!(f, ", {}", count)?;
                }
                Ok(())
            }
            Instruction::Call {
                result,
                function,
                args,
                ..
            } => {
                if let Some(result) = result {
                    write!(f, "%{} = ", result)?;
                }
                write!(f, "call {}(", function)?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                write!(f, ")")
            }
            Instruction::Return(Some(value)) => write!(f, "ret {}", value),
            Instruction::Return(None) => write!(f, "ret void"),
            Instruction::Branch(label) => write!(f, "br label %bb{}", label),
            Instruction::BranchCond {
                condition,
                true_label,
                false_label,
            } => {
                write!(
                    f,
                    "br {}, label %bb{}, label %bb{}",
                    condition, true_label, false_label
                )
            }
            Instruction::Phi {
                result,
                incoming,
                result_type,
            } => {
                write!(f, "%{} = phi {} ", result, result_type)?;
                for (i, (value, label)) in incoming.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "[{}, %bb{}]", value, label)?;
                }
                Ok(())
            }
            Instruction::Cast {
                result,
                value,
                target_type,
            } => {
                write!(f, "%{} = cast {} to {}", result, value, target_type)
            }
            Instruction::SetBounds { ptr, base, size } => {
                write!(f, "setbounds {}, {}, {}", ptr, base, size)
            }
            Instruction::InlineAsm { assembly } => write!(f, "asm \"{}\"", assembly.escape_debug()),
            Instruction::Comment(text) => write!(f, "; {}", text),
        }
    }
}

/// Basic Block - an ordered instruction sequence with a single entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BasicBlock {
    pub id: LabelId,
    pub instructions: Vec<Instruction>,
    pub predecessors: Vec<LabelId>,
    pub successors: Vec<LabelId>,
}

impl BasicBlock {
    pub fn new(id: LabelId) -> Self {
        Self {
            id,
            instructions: Vec::new(),
            predecessors: Vec::new(),
            successors: Vec::new(),
        }
    }

    pub fn add_instruction(&mut self, instr: Instruction) {
        self.instructions.push(instr);
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    pub fn has_terminator(&self) -> bool {
        self.instructions
            .last()
            .is_some_and(Instruction::is_terminator)
    }
}

/// Function in IR
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Function {
    pub name: String,
    pub return_type: IrType,
    pub parameters: Vec<(TempId, IrType)>,
    pub blocks: Vec<BasicBlock>,
    pub is_external: bool,
}

impl Function {
    pub fn new(name: String, return_type: IrType) -> Self {
        Self {
            name,
            return_type,
            parameters: Vec::new(),
            blocks: Vec::new(),
            is_external: false,
        }
    }

    pub fn add_parameter(&mut self, param_id: TempId, param_type: IrType) {
        self.parameters.push((param_id, param_type));
    }

    pub fn add_block(&mut self, block: BasicBlock) {
        self.blocks.push(block);
    }

    pub fn get_block(&self, id: LabelId) -> Option<&BasicBlock> {
        self.blocks.iter().find(|b| b.id == id)
    }

    pub fn get_block_mut(&mut self, id: LabelId) -> Option<&mut BasicBlock> {
        self.blocks.iter_mut().find(|b| b.id == id)
    }

    pub fn entry_block(&self) -> Option<&BasicBlock> {
        self.blocks.first()
    }

    pub fn entry_block_mut(&mut self) -> Option<&mut BasicBlock> {
        self.blocks.first_mut()
    }

    /// The type of a parameter temporary, if `temp` names one
    pub fn param_type(&self, temp: TempId) -> Option<&IrType> {
        self.parameters
            .iter()
            .find(|(id, _)| *id == temp)
            .map(|(_, ty)| ty)
    }

    /// Highest temporary id in use across parameters and results.
    ///
    /// Passes that manufacture new temporaries start counting past this.
    pub fn max_temp_id(&self) -> TempId {
        let param_max = self.parameters.iter().map(|(id, _)| *id).max();
        let result_max = self
            .blocks
            .iter()
            .flat_map(|b| b.instructions.iter())
            .filter_map(Instruction::result)
            .max();
        param_max.into_iter().chain(result_max).max().unwrap_or(0)
    }
}

/// Global variable definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalVariable {
    pub name: String,
    pub var_type: IrType,
    pub is_constant: bool,
    pub initializer: Option<Value>,
    pub linkage: Linkage,
}

/// Linkage types for global symbols
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Linkage {
    External,
    Internal,
    Private,
}

/// IR Module - a complete compilation unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Module {
    pub name: String,
    pub functions: Vec<Function>,
    pub globals: Vec<GlobalVariable>,
    /// Target data-layout facts: pointer width, struct padding rules
    pub layout: TargetLayout,
}

impl Module {
    pub fn new(name: String, layout: TargetLayout) -> Self {
        Self {
            name,
            functions: Vec::new(),
            globals: Vec::new(),
            layout,
        }
    }

    pub fn add_function(&mut self, function: Function) {
        self.functions.push(function);
    }

    pub fn add_global(&mut self, global: GlobalVariable) {
        self.globals.push(global);
    }

    pub fn get_function(&self, name: &str) -> Option<&Function> {
        self.functions.iter().find(|f| f.name == name)
    }

    pub fn get_function_mut(&mut self, name: &str) -> Option<&mut Function> {
        self.functions.iter_mut().find(|f| f.name == name)
    }

    pub fn get_global(&self, name: &str) -> Option<&GlobalVariable> {
        self.globals.iter().find(|g| g.name == name)
    }
}

/// Builder for constructing IR
///
/// Used by the host frontend and by tests; the passes themselves splice
/// instructions positionally instead.
pub struct IrBuilder {
    current_function: Option<Function>,
    current_block: Option<LabelId>,
    next_temp_id: TempId,
    next_label_id: LabelId,
}

impl IrBuilder {
    pub fn new() -> Self {
        Self {
            current_function: None,
            current_block: None,
            next_temp_id: 0,
            next_label_id: 0,
        }
    }

    pub fn new_temp(&mut self) -> TempId {
        let temp = self.next_temp_id;
        self.next_temp_id += 1;
        temp
    }

    pub fn new_label(&mut self) -> LabelId {
        let label = self.next_label_id;
        self.next_label_id += 1;
        label
    }

    pub fn create_function(&mut self, name: &str, return_type: IrType) {
        self.current_function = Some(Function::new(name.to_string(), return_type));
        self.next_temp_id = 0;
        self.next_label_id = 0;
    }

    pub fn add_parameter(&mut self, param_type: IrType) -> TempId {
        let param_id = self.new_temp();
        if let Some(ref mut function) = self.current_function {
            function.add_parameter(param_id, param_type);
        }
        param_id
    }

    pub fn create_block(&mut self) -> LabelId {
        let label = self.new_label();
        if let Some(ref mut function) = self.current_function {
            function.add_block(BasicBlock::new(label));
        }
        self.current_block = Some(label);
        label
    }

    pub fn build_alloca(
        &mut self,
        alloc_type: IrType,
        count: Option<Value>,
    ) -> Result<TempId, String> {
        let result = self.new_temp();
        let result_type = alloc_type.clone().ptr_to();
        self.push(Instruction::Alloca {
            result,
            alloc_type,
            count,
            result_type,
        })?;
        Ok(result)
    }

    pub fn build_load(&mut self, ptr: Value, result_type: IrType) -> Result<TempId, String> {
        let result = self.new_temp();
        self.push(Instruction::Load {
            result,
            ptr,
            result_type,
        })?;
        Ok(result)
    }

    pub fn build_store(&mut self, value: Value, ptr: Value) -> Result<(), String> {
        self.push(Instruction::Store { value, ptr })
    }

    pub fn build_gep(
        &mut self,
        base: Value,
        source_ty: IrType,
        indices: Vec<Value>,
        result_type: IrType,
    ) -> Result<TempId, String> {
        let result = self.new_temp();
        self.push(Instruction::GetElementPtr {
            result,
            base,
            source_ty,
            indices,
            in_bounds: false,
            result_type,
        })?;
        Ok(result)
    }

    pub fn build_binary(
        &mut self,
        op: IrBinaryOp,
        lhs: Value,
        rhs: Value,
        result_type: IrType,
    ) -> Result<TempId, String> {
        let result = self.new_temp();
        self.push(Instruction::Binary {
            result,
            op,
            lhs,
            rhs,
            result_type,
        })?;
        Ok(result)
    }

    pub fn build_cast(&mut self, value: Value, target_type: IrType) -> Result<TempId, String> {
        let result = self.new_temp();
        self.push(Instruction::Cast {
            result,
            value,
            target_type,
        })?;
        Ok(result)
    }

    pub fn build_call(
        &mut self,
        function: Value,
        args: Vec<Value>,
        result_type: IrType,
    ) -> Result<Option<TempId>, String> {
        let result = if matches!(result_type, IrType::Void) {
            None
        } else {
            Some(self.new_temp())
        };
        self.push(Instruction::Call {
            result,
            function,
            args,
            result_type,
        })?;
        Ok(result)
    }

    pub fn build_phi(
        &mut self,
        incoming: Vec<(Value, LabelId)>,
        result_type: IrType,
    ) -> Result<TempId, String> {
        let result = self.new_temp();
        self.push(Instruction::Phi {
            result,
            incoming,
            result_type,
        })?;
        Ok(result)
    }

    pub fn build_return(&mut self, value: Option<Value>) -> Result<(), String> {
        self.push(Instruction::Return(value))
    }

    pub fn build_branch(&mut self, label: LabelId) -> Result<(), String> {
        self.push(Instruction::Branch(label))
    }

    pub fn build_branch_cond(
        &mut self,
        condition: Value,
        true_label: LabelId,
        false_label: LabelId,
    ) -> Result<(), String> {
        self.push(Instruction::BranchCond {
            condition,
            true_label,
            false_label,
        })
    }

    /// Switch the insertion point to an existing block
    pub fn select_block(&mut self, label: LabelId) {
        self.current_block = Some(label);
    }

    fn push(&mut self, instr: Instruction) -> Result<(), String> {
        let function = self
            .current_function
            .as_mut()
            .ok_or_else(|| "no current function".to_string())?;
        let block_id = self.current_block.ok_or_else(|| "no current block".to_string())?;
        function
            .get_block_mut(block_id)
            .ok_or_else(|| "current block not found".to_string())?
            .add_instruction(instr);
        Ok(())
    }

    pub fn finish_function(&mut self) -> Option<Function> {
        self.current_block = None;
        self.current_function.take()
    }
}

impl Default for IrBuilder {
    fn default() -> Self {
        Self::new()
    }
}
