//! Function signatures.
//!
//! The `Signature` data structure describes the arguments and return values
//! of a function at the ABI level: in addition to plain SSA value types it
//! can describe aggregate (struct) parameters, which the AArch64 ABI engine
//! classifies as HFA/HVA, small general aggregates, or indirect.

use crate::ir::Type;
use crate::isa::CallConv;
use std::fmt;

/// A field of a struct parameter: a value type at a byte offset.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StructField {
    /// The field's type.
    pub ty: Type,
    /// Byte offset of the field from the start of the struct.
    pub offset: u32,
}

/// The type of one function parameter or return value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ParamType {
    /// A plain SSA value type (scalar int/float/ref or vector).
    Value(Type),
    /// An aggregate with ordered fields.
    Struct(Vec<StructField>),
}

impl ParamType {
    /// Total size of this parameter in bytes.
    pub fn bytes(&self) -> u32 {
        match self {
            ParamType::Value(ty) => ty.bytes(),
            ParamType::Struct(fields) => fields
                .last()
                .map(|f| f.offset + f.ty.bytes())
                .unwrap_or(0),
        }
    }
}

/// Function parameter or return value descriptor.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AbiParam {
    /// Type of the parameter value.
    pub value_type: ParamType,
}

impl AbiParam {
    /// Create a parameter with a plain value type.
    pub fn new(ty: Type) -> Self {
        Self {
            value_type: ParamType::Value(ty),
        }
    }

    /// Create a struct parameter from its fields.
    pub fn strukt(fields: Vec<StructField>) -> Self {
        Self {
            value_type: ParamType::Struct(fields),
        }
    }
}

/// Function signature.
///
/// The function signature describes the types of formal parameters and
/// return values along with other details that are needed to call a
/// function correctly.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Signature {
    /// The arguments passed to the function.
    pub params: Vec<AbiParam>,
    /// Values returned from the function.
    pub returns: Vec<AbiParam>,
    /// Calling convention.
    pub call_conv: CallConv,
    /// Is this a C-style variadic function? When set, the prologue saves
    /// the full argument register file so `va_arg` can find anonymous
    /// arguments.
    pub variadic: bool,
}

impl Signature {
    /// Create a new blank signature with the given calling convention.
    pub fn new(call_conv: CallConv) -> Self {
        Self {
            params: Vec::new(),
            returns: Vec::new(),
            call_conv,
            variadic: false,
        }
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "(")?;
        for (i, p) in self.params.iter().enumerate() {
            if i != 0 {
                write!(f, ", ")?;
            }
            match &p.value_type {
                ParamType::Value(ty) => write!(f, "{}", ty)?,
                ParamType::Struct(fields) => write!(f, "struct[{}]", fields.len())?,
            }
        }
        if self.variadic {
            write!(f, ", ...")?;
        }
        write!(f, ") -> (")?;
        for (i, r) in self.returns.iter().enumerate() {
            if i != 0 {
                write!(f, ", ")?;
            }
            match &r.value_type {
                ParamType::Value(ty) => write!(f, "{}", ty)?,
                ParamType::Struct(fields) => write!(f, "struct[{}]", fields.len())?,
            }
        }
        write!(f, ") {}", self.call_conv)
    }
}
