//! Representation for values and operations in a circuit module.
use crate::Bits;
use crate::types::Type;
use esi_idx::impl_index;
use esi_utils::Id;
use smallvec::SmallVec;
use std::fmt;

/// Handle to a value inside a [crate::Module].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ValueIdx(u32);
impl_index!(ValueIdx);

/// Handle to an operation inside a [crate::Module].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OpIdx(u32);
impl_index!(OpIdx);

/// Where a value comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueDef {
    /// The n-th input port of the module.
    Arg(usize),
    /// The n-th result of an operation.
    Result(OpIdx, usize),
}

#[derive(Debug, Clone)]
pub struct ValueData {
    pub ty: Type,
    pub def: ValueDef,
    /// Optional name used when printing the module.
    pub name: Option<Id>,
}

/// Predicates for integer comparisons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ICmpPredicate {
    Eq,
    Ne,
    Ult,
    Ule,
    Ugt,
    Uge,
}

impl fmt::Display for ICmpPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ICmpPredicate::Eq => "eq",
            ICmpPredicate::Ne => "ne",
            ICmpPredicate::Ult => "ult",
            ICmpPredicate::Ule => "ule",
            ICmpPredicate::Ugt => "ugt",
            ICmpPredicate::Uge => "uge",
        };
        f.write_str(s)
    }
}

/// The operations a circuit module is made of.
///
/// Operands are stored on the [Operation]; the variants only carry the
/// attributes of each operation.
#[derive(Debug, Clone)]
pub enum OpKind {
    /// A constant of the result type.
    Constant(Bits),
    /// Reinterpret the operand bits as the result type. Widths must agree.
    Bitcast,
    /// Extract the result width of bits from an integer, starting at `low`.
    Extract { low: u64 },
    /// Concatenate integers. The first operand is the most significant.
    Concat,
    /// Wrapping integer addition.
    Add,
    ICmp(ICmpPredicate),
    /// `(array, index)`: the sub-array of the result size starting at `index`.
    ArraySlice,
    /// `(array, index)`: a single element.
    ArrayGet,
    /// Build an array. Operand `k` is element `k`.
    ArrayCreate,
    /// Concatenate arrays. The first operand occupies the highest indices.
    ArrayConcat,
    StructExtract { field: Id },
    /// Build a struct from one operand per field, in field order.
    StructCreate,
    /// Instantiate module `module`. Operands are its inputs, results its
    /// outputs.
    Instance { module: Id, name: Id },
    /// `(clock)`: run the region on the rising edge of `clock`.
    Always { region: Vec<OpIdx> },
    /// `(cond)`: run the region when `cond` holds.
    If { region: Vec<OpIdx> },
    /// `(cond)`: report `message` if `cond` does not hold.
    Assert { message: String },
}

impl OpKind {
    /// Name of the operation as printed.
    pub fn mnemonic(&self) -> &'static str {
        match self {
            OpKind::Constant(_) => "hw.constant",
            OpKind::Bitcast => "hw.bitcast",
            OpKind::Extract { .. } => "comb.extract",
            OpKind::Concat => "comb.concat",
            OpKind::Add => "comb.add",
            OpKind::ICmp(_) => "comb.icmp",
            OpKind::ArraySlice => "hw.array_slice",
            OpKind::ArrayGet => "hw.array_get",
            OpKind::ArrayCreate => "hw.array_create",
            OpKind::ArrayConcat => "hw.array_concat",
            OpKind::StructExtract { .. } => "hw.struct_extract",
            OpKind::StructCreate => "hw.struct_create",
            OpKind::Instance { .. } => "hw.instance",
            OpKind::Always { .. } => "sv.always",
            OpKind::If { .. } => "sv.if",
            OpKind::Assert { .. } => "sv.assert",
        }
    }

    /// The nested region of the operation, if it has one.
    pub fn region(&self) -> Option<&[OpIdx]> {
        match self {
            OpKind::Always { region } | OpKind::If { region } => Some(region),
            _ => None,
        }
    }

    pub(crate) fn region_mut(&mut self) -> Option<&mut Vec<OpIdx>> {
        match self {
            OpKind::Always { region } | OpKind::If { region } => Some(region),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Operation {
    pub kind: OpKind,
    pub operands: SmallVec<[ValueIdx; 4]>,
    pub results: SmallVec<[ValueIdx; 1]>,
}

impl Operation {
    /// The single result of the operation.
    ///
    /// # Panics
    /// Panics if the operation does not have exactly one result.
    pub fn result(&self) -> ValueIdx {
        assert!(
            self.results.len() == 1,
            "`{}' has {} results",
            self.kind.mnemonic(),
            self.results.len()
        );
        self.results[0]
    }
}
