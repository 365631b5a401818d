//! An in-process compiler for the subset of the Cap'n Proto schema language
//! the gasket generators emit: a file ID followed by structs whose fields are
//! primitive integers, `Bool`, `Void` or lists of those.
//!
//! Field offsets, data word counts and pointer counts are computed with the
//! same allocation rules as the reference Cap'n Proto compiler, so they match
//! what any other Cap'n Proto implementation expects on the wire.
mod layout;
mod parser;

pub use layout::StructLayout;
pub use parser::SchemaParser;

use esi_utils::Id;
use std::fmt;

/// The `element size` codes of list pointers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ElementSize {
    Void = 0,
    Bit = 1,
    Byte = 2,
    TwoBytes = 3,
    FourBytes = 4,
    EightBytes = 5,
    Pointer = 6,
    InlineComposite = 7,
}

impl ElementSize {
    /// The 3-bit code stored in a list pointer.
    pub fn code(self) -> u64 {
        self as u64
    }

    /// Bits used by one element of this size.
    pub fn bits(self) -> u64 {
        match self {
            ElementSize::Void => 0,
            ElementSize::Bit => 1,
            ElementSize::Pointer | ElementSize::InlineComposite => 64,
            other => 1 << (other.code() + 1),
        }
    }
}

/// The tag stored in the two low bits of every pointer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WirePointerKind {
    Struct = 0,
    List = 1,
    Far = 2,
    Other = 3,
}

/// The 30-bit offset of a pointer to a struct with no data and no pointers:
/// -1, so the struct sits on its own pointer.
pub const EMPTY_STRUCT_OFFSET: u64 = 0x3fff_ffff;

impl WirePointerKind {
    pub fn tag(self) -> u64 {
        self as u64
    }
}

/// The types a field in the schema subset can have.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CapnpType {
    Void,
    Bool,
    Int(u64),
    UInt(u64),
    List(Box<CapnpType>),
}

impl CapnpType {
    pub fn element_size(&self) -> ElementSize {
        match self {
            CapnpType::Void => ElementSize::Void,
            CapnpType::Bool => ElementSize::Bit,
            CapnpType::Int(w) | CapnpType::UInt(w) => match w {
                8 => ElementSize::Byte,
                16 => ElementSize::TwoBytes,
                32 => ElementSize::FourBytes,
                _ => ElementSize::EightBytes,
            },
            CapnpType::List(_) => ElementSize::Pointer,
        }
    }

    /// Bits used by a value of this type in a struct or list. Pointers use a
    /// full word.
    pub fn bits(&self) -> u64 {
        self.element_size().bits()
    }

    /// True if values of this type live in the pointer section.
    pub fn is_pointer(&self) -> bool {
        matches!(self, CapnpType::List(_))
    }

    /// Element type of a list.
    pub fn list_element(&self) -> Option<&CapnpType> {
        match self {
            CapnpType::List(elem) => Some(elem),
            _ => None,
        }
    }
}

impl fmt::Display for CapnpType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CapnpType::Void => write!(f, "Void"),
            CapnpType::Bool => write!(f, "Bool"),
            CapnpType::Int(w) => write!(f, "Int{w}"),
            CapnpType::UInt(w) => write!(f, "UInt{w}"),
            CapnpType::List(elem) => write!(f, "List({elem})"),
        }
    }
}

/// A compiled struct field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub name: Id,
    /// Position of the field in the struct declaration.
    pub code_order: usize,
    /// The `@n` ordinal of the field.
    pub ordinal: u64,
    pub ty: CapnpType,
    /// Offset in units of the field's size, within the data section for data
    /// fields or within the pointer section for pointer fields.
    pub offset: u64,
}

impl Field {
    /// Bit offset of the field from the start of its section.
    pub fn bit_offset(&self) -> u64 {
        self.offset * self.ty.bits()
    }
}

/// A compiled struct.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructNode {
    pub name: Id,
    pub id: u64,
    pub data_word_count: u64,
    pub pointer_count: u64,
    /// Fields in code order.
    pub fields: Vec<Field>,
}

/// The result of compiling one schema file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedSchema {
    pub file_id: u64,
    pub nodes: Vec<StructNode>,
}

impl StructNode {
    /// True if the struct has neither data words nor pointers.
    pub fn is_empty(&self) -> bool {
        self.data_word_count + self.pointer_count == 0
    }
}

impl ParsedSchema {
    /// The struct with ID `id`, if there is one.
    pub fn find(&self, id: u64) -> Option<&StructNode> {
        self.nodes.iter().find(|n| n.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn element_sizes() {
        let sizes = [
            (ElementSize::Void, 0),
            (ElementSize::Bit, 1),
            (ElementSize::Byte, 8),
            (ElementSize::TwoBytes, 16),
            (ElementSize::FourBytes, 32),
            (ElementSize::EightBytes, 64),
            (ElementSize::Pointer, 64),
        ];
        for (size, bits) in sizes {
            assert_eq!(size.bits(), bits, "{size:?}");
        }
        assert_eq!(CapnpType::UInt(16).element_size().code(), 3);
        assert_eq!(
            CapnpType::List(Box::new(CapnpType::Bool)).to_string(),
            "List(Bool)"
        );
    }
}
