//! Derivation of a Cap'n Proto schema from a hardware type.
use crate::compiler::{CapnpType, ParsedSchema, SchemaParser, StructNode};
use crate::emit::{self, format_id};
use crate::hash;
use esi_ir::{FieldInfo, Type};
use esi_utils::{Error, EsiResult, Id, words_for_bits};
use once_cell::sync::OnceCell;
use serde::Serialize;
use std::fmt;
use std::io;

/// Lists longer than this cannot be described by a list pointer.
const MAX_LIST_LEN: u64 = (1 << 29) - 1;

/// The Cap'n Proto view of one hardware type.
///
/// Cap'n Proto messages must be structs, so non-struct types are wrapped in a
/// struct with a single field: `i` for integers and `l` for arrays. Struct
/// types map to a struct with one field per element, in declaration order,
/// so the Cap'n Proto code order of a field is its index in [Self::fields].
///
/// Everything derived from the generated schema text is computed on first use
/// and cached.
pub struct TypeSchema {
    ty: Type,
    fields: Vec<FieldInfo>,
    id: OnceCell<u64>,
    name: OnceCell<Id>,
    parsed: OnceCell<ParsedSchema>,
    node: OnceCell<StructNode>,
}

impl TypeSchema {
    /// Schema for values of `ty`. Channels are unwrapped.
    pub fn new(ty: Type) -> Self {
        let ty = match ty {
            Type::Channel(inner) => *inner,
            ty => ty,
        };
        let fields = match ty.canonical() {
            Type::Int { .. } => vec![FieldInfo::new("i", ty.clone())],
            Type::Array { .. } => vec![FieldInfo::new("l", ty.clone())],
            Type::Struct(fields) => fields.clone(),
            Type::Alias { .. } | Type::Channel(_) => vec![],
        };
        Self {
            ty,
            fields,
            id: OnceCell::new(),
            name: OnceCell::new(),
            parsed: OnceCell::new(),
            node: OnceCell::new(),
        }
    }

    /// The hardware type, possibly an alias.
    pub fn ty(&self) -> &Type {
        &self.ty
    }

    /// The hardware type with aliases resolved.
    pub fn canonical(&self) -> &Type {
        self.ty.canonical()
    }

    /// Fields of the wrapping Cap'n Proto struct, in code order.
    pub fn fields(&self) -> &[FieldInfo] {
        &self.fields
    }

    /// Deterministic Cap'n Proto ID of this type.
    pub fn capnp_type_id(&self) -> u64 {
        *self
            .id
            .get_or_init(|| hash::fingerprint(&self.ty.to_string()))
    }

    pub fn is_supported(&self) -> bool {
        self.check_supported().is_ok()
    }

    /// Explain why the type cannot be encoded, if it cannot.
    pub fn check_supported(&self) -> EsiResult<()> {
        let mut alias = &self.ty;
        while let Type::Alias { name, inner } = alias {
            check_alias_name(&self.ty, *name)?;
            alias = inner;
        }
        check_supported(&self.ty, true)
    }

    /// Name of the generated Cap'n Proto struct.
    pub fn name(&self) -> Id {
        *self.name.get_or_init(|| {
            Id::new(emit::type_name(&self.ty, self.capnp_type_id()))
        })
    }

    /// Write the struct definition of this type.
    pub fn write<F: io::Write>(&self, out: &mut F) -> EsiResult<()> {
        self.check_supported()?;
        emit::write_struct(out, self.name(), self.capnp_type_id(), &self.fields)
    }

    /// Write the name and ID of this type, as they appear in the schema.
    pub fn write_metadata<F: io::Write>(&self, out: &mut F) -> EsiResult<()> {
        write!(out, "{} {}", self.name(), format_id(self.capnp_type_id()))?;
        Ok(())
    }

    /// The generated schema, compiled.
    pub fn schema(&self) -> EsiResult<&ParsedSchema> {
        self.parsed.get_or_try_init(|| {
            let mut text = format!("{};\n", format_id(u64::MAX)).into_bytes();
            self.write(&mut text)?;
            let text = String::from_utf8(text).map_err(|e| {
                Error::internal_schema(format!("schema text is not UTF-8: {e}"))
            })?;
            SchemaParser::parse(&text, "schema.capnp").map_err(|e| {
                Error::internal_schema(format!(
                    "schema generated for `{}' does not compile: {}",
                    self.ty,
                    e.message()
                ))
            })
        })
    }

    /// The compiled struct describing this type.
    pub fn type_schema(&self) -> EsiResult<&StructNode> {
        self.node.get_or_try_init(|| {
            let id = self.capnp_type_id();
            self.schema()?.find(id).cloned().ok_or_else(|| {
                Error::internal_schema(format!(
                    "no struct with ID 0x{id:016x} in the schema generated for `{}'",
                    self.ty
                ))
            })
        })
    }

    /// Size of an encoded message in bits: the root pointer, the data and
    /// pointer sections, and every list payload rounded up to whole words.
    pub fn size(&self) -> EsiResult<u64> {
        let node = self.type_schema()?;
        let payload: u64 = node
            .fields
            .iter()
            .map(|f| list_payload_words(&f.ty, &self.fields[f.code_order].ty))
            .sum();
        Ok((1 + node.data_word_count + node.pointer_count + payload) * 64)
    }

    /// Where every field lives in an encoded message.
    pub fn layout(&self) -> EsiResult<LayoutReport> {
        let node = self.type_schema()?;
        let data_start = 64;
        let ptr_start = data_start + node.data_word_count * 64;
        let fields = node
            .fields
            .iter()
            .map(|f| {
                let hw = &self.fields[f.code_order];
                let (section, base) = match &f.ty {
                    CapnpType::Void => (Section::None, data_start),
                    ty if ty.is_pointer() => (Section::Pointer, ptr_start),
                    _ => (Section::Data, data_start),
                };
                FieldLayout {
                    name: f.name.to_string(),
                    hw_type: hw.ty.to_string(),
                    capnp_type: f.ty.to_string(),
                    section,
                    bit_offset: f.bit_offset(),
                    message_offset: base + f.bit_offset(),
                    payload_words: list_payload_words(&f.ty, &hw.ty),
                }
            })
            .collect();
        Ok(LayoutReport {
            name: self.name().to_string(),
            id: format!("0x{:016x}", self.capnp_type_id()),
            hw_type: self.ty.to_string(),
            size: self.size()?,
            data_words: node.data_word_count,
            pointers: node.pointer_count,
            fields,
        })
    }
}

/// Words taken by the payload of a list field of hardware type `hw`.
fn list_payload_words(capnp: &CapnpType, hw: &Type) -> u64 {
    match (capnp.list_element(), hw.as_array()) {
        (Some(elem), Some((_, len))) => words_for_bits(elem.bits() * len),
        _ => 0,
    }
}

fn check_alias_name(ty: &Type, name: Id) -> EsiResult<()> {
    if name.is_plain_identifier() {
        Ok(())
    } else {
        Err(Error::unsupported_type(
            ty,
            format!("alias name `{name}' is not a valid identifier"),
        ))
    }
}

fn check_supported(ty: &Type, outer: bool) -> EsiResult<()> {
    match ty.canonical() {
        Type::Int { width, .. } if *width > 64 => Err(Error::unsupported_type(
            ty,
            "integers wider than 64 bits are not supported",
        )),
        Type::Int { .. } => Ok(()),
        Type::Array { elem, size } => {
            if let Type::Alias { name, .. } = elem.as_ref() {
                check_alias_name(ty, *name)?;
            }
            match elem.canonical() {
                Type::Array { .. } => Err(Error::unsupported_type(
                    ty,
                    "arrays of arrays are not supported",
                )),
                Type::Struct(_) => Err(Error::unsupported_type(
                    ty,
                    "arrays of structs are not supported",
                )),
                _ if *size == 0 => Err(Error::unsupported_type(
                    ty,
                    "zero-length arrays are not supported",
                )),
                _ if *size > MAX_LIST_LEN => Err(Error::unsupported_type(
                    ty,
                    format!("arrays are limited to {MAX_LIST_LEN} elements"),
                )),
                _ => check_supported(elem, false),
            }
        }
        Type::Struct(_) if !outer => Err(Error::unsupported_type(
            ty,
            "structs containing structs are not supported",
        )),
        Type::Struct(fields) if fields.is_empty() => Err(
            Error::unsupported_type(ty, "empty structs are not supported"),
        ),
        Type::Struct(fields) => {
            for field in fields {
                let name = field.name;
                if !name.is_plain_identifier()
                    || !name.as_str().starts_with(|c: char| c.is_ascii_lowercase())
                {
                    return Err(Error::unsupported_type(
                        ty,
                        format!(
                            "field name `{name}' must be an identifier starting with a lower-case letter"
                        ),
                    ));
                }
                check_supported(&field.ty, false)?;
            }
            Ok(())
        }
        Type::Channel(_) => Err(Error::unsupported_type(
            ty,
            "channels cannot be carried inside a message",
        )),
        Type::Alias { .. } => unreachable!("canonical type is never an alias"),
    }
}

impl PartialEq for TypeSchema {
    fn eq(&self, other: &Self) -> bool {
        self.ty == other.ty
    }
}

impl Eq for TypeSchema {}

impl fmt::Debug for TypeSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeSchema")
            .field("ty", &self.ty.to_string())
            .field("fields", &self.fields)
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Section {
    Data,
    Pointer,
    /// Zero-width fields take no space.
    None,
}

/// Placement of one field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldLayout {
    pub name: String,
    pub hw_type: String,
    pub capnp_type: String,
    pub section: Section,
    /// Offset from the start of the section.
    pub bit_offset: u64,
    /// Offset from the start of the message.
    pub message_offset: u64,
    /// Out of line words used by list fields.
    pub payload_words: u64,
}

/// Wire layout of a type, as reported by `esic --emit layout`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LayoutReport {
    pub name: String,
    pub id: String,
    pub hw_type: String,
    pub size: u64,
    pub data_words: u64,
    pub pointers: u64,
    pub fields: Vec<FieldLayout>,
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
    fn single_byte() {
        let schema = TypeSchema::new(Type::uint(8));
        assert_eq!(schema.fields().len(), 1);
        assert_eq!(schema.fields()[0].name, "i");
        assert_eq!(schema.capnp_type_id(), 0xe6be_6627_11f2_59ef);
        assert_eq!(schema.name(), "Ui8");
        let node = schema.type_schema().unwrap();
        assert_eq!((node.data_word_count, node.pointer_count), (1, 0));
        assert_eq!(node.fields[0].ty, CapnpType::UInt(8));
        assert_eq!(schema.size().unwrap(), 128);
    }

    #[test]
    fn array_of_shorts() {
        let schema = TypeSchema::new(Type::array(Type::int(16), 4));
        assert_eq!(schema.fields()[0].name, "l");
        assert_eq!(schema.name(), "ArrayOf4xI16");
        let node = schema.type_schema().unwrap();
        assert_eq!(
            node.fields[0].ty,
            CapnpType::List(Box::new(CapnpType::UInt(16)))
        );
        assert_eq!((node.data_word_count, node.pointer_count), (0, 1));
        // root pointer, list pointer and one word of payload
        assert_eq!(schema.size().unwrap(), 192);
    }

    #[test]
    fn struct_fields_keep_declaration_order() {
        let schema = TypeSchema::new(example_struct());
        let mut text = Vec::new();
        schema.write(&mut text).unwrap();
        let text = String::from_utf8(text).unwrap();
        let a = text.find("a @0 :UInt8;").unwrap();
        let b = text.find("b @1 :UInt32;").unwrap();
        assert!(a < b, "{text}");
        assert!(text.starts_with(&format!(
            "struct Struct{} @0x9d47a2847245e415 {{",
            0x9d47_a284_7245_e415u64
        )));
        let node = schema.type_schema().unwrap();
        assert_eq!(node.fields[0].code_order, 0);
        assert_eq!(node.fields[1].code_order, 1);
        assert_eq!(node.fields[1].bit_offset(), 32);
        assert_eq!(schema.size().unwrap(), 128);
    }

    #[test]
    fn channels_are_unwrapped() {
        let schema = TypeSchema::new(Type::channel(Type::uint(8)));
        assert_eq!(schema.ty(), &Type::uint(8));
        assert_eq!(schema, TypeSchema::new(Type::uint(8)));
        assert_ne!(schema, TypeSchema::new(Type::int(8)));
    }

    #[test]
    fn ids_and_text_are_deterministic() {
        let text = |ty: Type| {
            let mut out = Vec::new();
            TypeSchema::new(ty).write(&mut out).unwrap();
            out
        };
        assert_eq!(text(example_struct()), text(example_struct()));
        assert_eq!(
            TypeSchema::new(example_struct()).capnp_type_id(),
            TypeSchema::new(example_struct()).capnp_type_id()
        );
    }

    #[test]
    fn aliases() {
        let schema = TypeSchema::new(Type::alias("pixel", example_struct()));
        assert_eq!(schema.name(), "Pixel");
        assert_eq!(schema.canonical(), &example_struct());
        assert_eq!(schema.fields().len(), 2);
        let mut meta = Vec::new();
        schema.write_metadata(&mut meta).unwrap();
        assert!(String::from_utf8(meta).unwrap().starts_with("Pixel @0x"));
        assert!(schema.type_schema().is_ok());

        let bad = TypeSchema::new(Type::alias("not-ok", Type::uint(8)));
        assert!(bad.check_supported().unwrap_err().is_unsupported_type());
    }

    #[test]
    fn unsupported_types_never_reach_emission() {
        let nested = Type::structure(vec![FieldInfo::new("inner", example_struct())]);
        let cases = [
            Type::int(65),
            nested,
            Type::array(Type::array(Type::int(8), 2), 2),
            Type::array(example_struct(), 2),
            Type::array(Type::int(8), 0),
            Type::structure(vec![]),
            Type::structure(vec![FieldInfo::new("Upper", Type::int(8))]),
            Type::structure(vec![FieldInfo::new("c", Type::channel(Type::i1()))]),
        ];
        for ty in cases {
            let schema = TypeSchema::new(ty.clone());
            assert!(!schema.is_supported(), "{ty}");
            let mut out = Vec::new();
            assert!(schema.write(&mut out).unwrap_err().is_unsupported_type());
            assert!(out.is_empty());
            assert!(schema.type_schema().unwrap_err().is_unsupported_type());
        }
    }

    #[test]
    fn layout_report() {
        let ty = Type::structure(vec![
            FieldInfo::new("flag", Type::i1()),
            FieldInfo::new("samples", Type::array(Type::sint(12), 5)),
            FieldInfo::new("count", Type::uint(64)),
        ]);
        let report = TypeSchema::new(ty).layout().unwrap();
        assert_eq!((report.data_words, report.pointers), (2, 1));
        // root, 2 data words, 1 pointer, 2 words of payload
        assert_eq!(report.size, 6 * 64);
        let samples = &report.fields[1];
        assert_eq!(samples.capnp_type, "List(Int16)");
        assert_eq!(samples.section, Section::Pointer);
        assert_eq!(samples.message_offset, 192);
        assert_eq!(samples.payload_words, 2);
        assert_eq!(report.fields[2].message_offset, 128);
    }
}
