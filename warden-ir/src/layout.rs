//! Target data layout
//!
//! The type layout oracle: exact in-memory byte sizes for every addressable
//! type, honoring the target ABI's struct padding rules. Every caller must
//! already know its value is a concrete addressable object, so asking for
//! the size of an unsized type is an invariant violation, not a recoverable
//! error.

use serde::{Deserialize, Serialize};
use warden_common::PassError;

use crate::ir::IrType;

/// Target data-layout facts carried by a module
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetLayout {
    /// Pointer width in bytes. Addresses are 32-bit on this target.
    pub pointer_size: u64,
}

impl Default for TargetLayout {
    fn default() -> Self {
        Self { pointer_size: 4 }
    }
}

/// Computed layout of a struct type: per-field offsets plus padded totals
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructLayout {
    pub offsets: Vec<u64>,
    pub size: u64,
    pub align: u64,
}

fn round_up(value: u64, align: u64) -> u64 {
    debug_assert!(align > 0);
    value.div_ceil(align) * align
}

impl TargetLayout {
    pub fn new(pointer_size: u64) -> Self {
        Self { pointer_size }
    }

    /// The integer type wide enough to hold an address on this target
    pub fn address_type(&self) -> IrType {
        match self.pointer_size {
            2 => IrType::I16,
            8 => IrType::I64,
            _ => IrType::I32,
        }
    }

    /// Exact byte size of `ty`.
    ///
    /// Arrays multiply out recursively; structs follow the target's padding
    /// rules, not a naive field sum. Fails on types with no static size.
    pub fn size_of(&self, ty: &IrType) -> Result<u64, PassError> {
        match ty {
            IrType::Void => Err(PassError::unsized_type(ty.to_string())),
            IrType::I1 => Ok(1),
            IrType::I8 => Ok(1),
            IrType::I16 => Ok(2),
            IrType::I32 => Ok(4),
            IrType::I64 => Ok(8),
            IrType::Ptr(_) => Ok(self.pointer_size),
            IrType::Array { size, element_type } => {
                Ok(*size * self.size_of(element_type)?)
            }
            IrType::Struct { fields, packed, .. } => {
                Ok(self.layout_fields(fields, *packed)?.size)
            }
        }
    }

    /// ABI alignment of `ty` in bytes
    pub fn align_of(&self, ty: &IrType) -> Result<u64, PassError> {
        match ty {
            IrType::Void => Err(PassError::unsized_type(ty.to_string())),
            IrType::I1 | IrType::I8 => Ok(1),
            IrType::I16 => Ok(2),
            IrType::I32 => Ok(4),
            IrType::I64 => Ok(8),
            IrType::Ptr(_) => Ok(self.pointer_size),
            IrType::Array { element_type, .. } => self.align_of(element_type),
            IrType::Struct { fields, packed, .. } => {
                if *packed {
                    return Ok(1);
                }
                let mut align = 1;
                for field in fields {
                    align = align.max(self.align_of(field)?);
                }
                Ok(align)
            }
        }
    }

    /// Padded layout of a struct type: field offsets, total size, alignment
    pub fn struct_layout(&self, ty: &IrType) -> Result<StructLayout, PassError> {
        match ty {
            IrType::Struct { fields, packed, .. } => self.layout_fields(fields, *packed),
            _ => Err(PassError::internal(format!(
                "struct_layout on non-struct type {}",
                ty
            ))),
        }
    }

    fn layout_fields(&self, fields: &[IrType], packed: bool) -> Result<StructLayout, PassError> {
        let mut offsets = Vec::with_capacity(fields.len());
        let mut offset = 0u64;
        let mut align = 1u64;

        for field in fields {
            let field_align = if packed { 1 } else { self.align_of(field)? };
            align = align.max(field_align);
            offset = round_up(offset, field_align);
            offsets.push(offset);
            offset += self.size_of(field)?;
        }

        Ok(StructLayout {
            offsets,
            size: round_up(offset, align),
            align,
        })
    }
}
