//! The hardware type system.
//!
//! Packing rules, used by bitcasts and by the simulator:
//! * integer bit `i` is bit `i` of the packed value;
//! * array element `k` occupies bits `[k * w, (k + 1) * w)`;
//! * the first struct field occupies the most significant bits.
use crate::type_parser::TypeParser;
use esi_utils::{EsiResult, Id};
use itertools::Itertools;
use std::fmt;
use std::str::FromStr;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Signedness {
    Signless,
    Signed,
    Unsigned,
}

/// A named element of a struct type.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct FieldInfo {
    pub name: Id,
    pub ty: Type,
}

impl FieldInfo {
    pub fn new<S: Into<Id>>(name: S, ty: Type) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}

/// A hardware type.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Type {
    Int {
        width: u64,
        signedness: Signedness,
    },
    Array {
        elem: Box<Type>,
        size: u64,
    },
    Struct(Vec<FieldInfo>),
    /// A named alias for another type.
    Alias {
        name: Id,
        inner: Box<Type>,
    },
    /// An ESI channel carrying values of the inner type.
    Channel(Box<Type>),
}

impl Type {
    pub fn int(width: u64) -> Self {
        Type::Int {
            width,
            signedness: Signedness::Signless,
        }
    }

    pub fn sint(width: u64) -> Self {
        Type::Int {
            width,
            signedness: Signedness::Signed,
        }
    }

    pub fn uint(width: u64) -> Self {
        Type::Int {
            width,
            signedness: Signedness::Unsigned,
        }
    }

    pub fn i1() -> Self {
        Type::int(1)
    }

    pub fn array(elem: Type, size: u64) -> Self {
        Type::Array {
            elem: Box::new(elem),
            size,
        }
    }

    /// An array of `size` single bits.
    pub fn bit_array(size: u64) -> Self {
        Type::array(Type::i1(), size)
    }

    pub fn structure(fields: Vec<FieldInfo>) -> Self {
        Type::Struct(fields)
    }

    pub fn alias<S: Into<Id>>(name: S, inner: Type) -> Self {
        Type::Alias {
            name: name.into(),
            inner: Box::new(inner),
        }
    }

    pub fn channel(inner: Type) -> Self {
        Type::Channel(Box::new(inner))
    }

    /// The type with all top-level aliases resolved.
    pub fn canonical(&self) -> &Type {
        match self {
            Type::Alias { inner, .. } => inner.canonical(),
            _ => self,
        }
    }

    /// Number of bits in the packed representation of this type.
    pub fn bit_width(&self) -> u64 {
        match self {
            Type::Int { width, .. } => *width,
            Type::Array { elem, size } => elem.bit_width() * size,
            Type::Struct(fields) => {
                fields.iter().map(|f| f.ty.bit_width()).sum()
            }
            Type::Alias { inner, .. } | Type::Channel(inner) => {
                inner.bit_width()
            }
        }
    }

    pub fn is_integer(&self) -> bool {
        matches!(self.canonical(), Type::Int { .. })
    }

    /// Returns the width and signedness if this is (an alias of) an integer.
    pub fn as_int(&self) -> Option<(u64, Signedness)> {
        match self.canonical() {
            Type::Int { width, signedness } => Some((*width, *signedness)),
            _ => None,
        }
    }

    /// Returns the element type and size if this is (an alias of) an array.
    pub fn as_array(&self) -> Option<(&Type, u64)> {
        match self.canonical() {
            Type::Array { elem, size } => Some((elem, *size)),
            _ => None,
        }
    }

    /// Returns the fields if this is (an alias of) a struct.
    pub fn as_struct(&self) -> Option<&[FieldInfo]> {
        match self.canonical() {
            Type::Struct(fields) => Some(fields),
            _ => None,
        }
    }

    pub fn is_signed(&self) -> bool {
        matches!(self.as_int(), Some((_, Signedness::Signed)))
    }

    pub fn is_signless_int(&self) -> bool {
        matches!(self.as_int(), Some((_, Signedness::Signless)))
    }

    /// True if this is an array of single signless bits.
    pub fn is_bit_array(&self) -> bool {
        self.as_array()
            .is_some_and(|(elem, _)| *elem.canonical() == Type::i1())
    }

    /// Bit offset and type of the struct field `name`, counted from the least
    /// significant bit of the packed struct.
    pub fn field_offset(&self, name: Id) -> Option<(u64, &Type)> {
        let fields = self.as_struct()?;
        let pos = fields.iter().position(|f| f.name == name)?;
        let below: u64 =
            fields[pos + 1..].iter().map(|f| f.ty.bit_width()).sum();
        Some((below, &fields[pos].ty))
    }
}

/// Width of the integer used to index into an array of `size` elements.
pub fn array_index_width(size: u64) -> u64 {
    esi_utils::clog2(size).max(1)
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Int { width, signedness } => match signedness {
                Signedness::Signless => write!(f, "i{width}"),
                Signedness::Signed => write!(f, "si{width}"),
                Signedness::Unsigned => write!(f, "ui{width}"),
            },
            Type::Array { elem, size } => {
                write!(f, "!hw.array<{size}x{elem}>")
            }
            Type::Struct(fields) => write!(
                f,
                "!hw.struct<{}>",
                fields
                    .iter()
                    .map(|field| format!("{}: {}", field.name, field.ty))
                    .join(", ")
            ),
            Type::Alias { name, inner } => {
                write!(f, "!hw.typealias<@{name}, {inner}>")
            }
            Type::Channel(inner) => write!(f, "!esi.channel<{inner}>"),
        }
    }
}

impl FromStr for Type {
    type Err = esi_utils::Error;

    fn from_str(s: &str) -> EsiResult<Self> {
        TypeParser::parse_type(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn example_struct() -> Type {
        Type::structure(vec![
            FieldInfo::new("a", Type::uint(8)),
            FieldInfo::new("b", Type::uint(32)),
        ])
    }

    #[test]
    fn display_uses_dialect_syntax() {
        assert_eq!(Type::int(8).to_string(), "i8");
        assert_eq!(Type::sint(5).to_string(), "si5");
        assert_eq!(Type::array(Type::int(16), 4).to_string(), "!hw.array<4xi16>");
        assert_eq!(example_struct().to_string(), "!hw.struct<a: ui8, b: ui32>");
        assert_eq!(
            Type::alias("Word", Type::uint(64)).to_string(),
            "!hw.typealias<@Word, ui64>"
        );
        assert_eq!(Type::channel(Type::i1()).to_string(), "!esi.channel<i1>");
    }

    #[test]
    fn aliases_resolve_to_canonical() {
        let inner = Type::array(Type::int(16), 4);
        let alias = Type::alias("Outer", Type::alias("Inner", inner.clone()));
        assert_eq!(alias.canonical(), &inner);
        assert_eq!(alias.bit_width(), 64);
        assert_eq!(alias.as_array().map(|(_, n)| n), Some(4));
        assert_ne!(alias, inner);
    }

    #[test]
    fn struct_fields_pack_first_field_high() {
        let st = example_struct();
        assert_eq!(st.bit_width(), 40);
        assert_eq!(st.field_offset("a".into()).map(|(o, _)| o), Some(32));
        assert_eq!(st.field_offset("b".into()).map(|(o, _)| o), Some(0));
        assert!(st.field_offset("c".into()).is_none());
    }

    #[test]
    fn bit_arrays() {
        assert!(Type::bit_array(64).is_bit_array());
        assert!(!Type::array(Type::uint(1), 64).is_bit_array());
        assert!(Type::alias("B", Type::bit_array(3)).is_bit_array());
    }
}
