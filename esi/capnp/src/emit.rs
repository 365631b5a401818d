//! Textual Cap'n Proto schema output.
use crate::compiler::CapnpType;
use esi_ir::{FieldInfo, Signedness, Type};
use esi_utils::{Error, EsiResult, Id};
use std::io;

/// An ID in schema syntax.
pub fn format_id(id: u64) -> String {
    format!("@0x{id:016x}")
}

/// The Cap'n Proto type used to carry values of `ty`.
pub fn capnp_type(ty: &Type) -> EsiResult<CapnpType> {
    match ty.canonical() {
        Type::Int { width, signedness } => {
            let signed = *signedness == Signedness::Signed;
            Ok(match *width {
                0 => CapnpType::Void,
                1 => CapnpType::Bool,
                w if w > 64 => {
                    return Err(Error::unsupported_type(
                        ty,
                        "integers wider than 64 bits are not supported",
                    ));
                }
                w => {
                    let rounded = w.next_power_of_two().max(8);
                    if signed {
                        CapnpType::Int(rounded)
                    } else {
                        CapnpType::UInt(rounded)
                    }
                }
            })
        }
        Type::Array { elem, .. } => match elem.canonical() {
            Type::Int { .. } => Ok(CapnpType::List(Box::new(capnp_type(elem)?))),
            _ => Err(Error::unsupported_type(
                ty,
                "only arrays of integers are supported",
            )),
        },
        Type::Struct(_) => Err(Error::unsupported_type(
            ty,
            "structs containing structs are not supported",
        )),
        Type::Channel(_) => Err(Error::unsupported_type(
            ty,
            "channels cannot be carried inside a message",
        )),
        Type::Alias { .. } => unreachable!("canonical type is never an alias"),
    }
}

/// Upper-case the first letter. Cap'n Proto type names must be capitalized.
fn capitalize(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
        None => String::new(),
    }
}

/// A valid Cap'n Proto struct name for `ty`. Structs are named after their
/// type ID `id`.
pub fn type_name(ty: &Type, id: u64) -> String {
    match ty {
        Type::Int { .. } => capitalize(&ty.to_string()),
        Type::Array { elem, size } => {
            format!("ArrayOf{size}x{}", type_name(elem, 0))
        }
        Type::Struct(_) => format!("Struct{id}"),
        Type::Alias { name, .. } => capitalize(name.as_str()),
        Type::Channel(inner) => type_name(inner, id),
    }
}

/// Write the struct `name` wrapping `fields`, followed by a blank line.
pub fn write_struct<F: io::Write>(
    out: &mut F,
    name: Id,
    id: u64,
    fields: &[FieldInfo],
) -> EsiResult<()> {
    writeln!(out, "struct {name} {} {{", format_id(id))?;
    let max_len = fields
        .iter()
        .map(|f| f.name.as_str().len())
        .max()
        .unwrap_or(0);
    for (idx, field) in fields.iter().enumerate() {
        writeln!(
            out,
            "  {:<max_len$} @{idx} :{};  # Actual type is {}.",
            field.name.as_str(),
            capnp_type(&field.ty)?,
            field.ty,
        )?;
    }
    writeln!(out, "}}")?;
    writeln!(out)?;
    Ok(())
}
