#![allow(clippy::upper_case_acronyms)]

//! Parser for the Cap'n Proto schema subset.
use super::{CapnpType, Field, ParsedSchema, StructLayout, StructNode};
use crate::hash::CAPNP_ID_TAG;
use esi_utils::{self, EsiResult, Id};
use pest_consume::{Error, Parser, match_nodes};
use std::collections::HashSet;

type ParseResult<T> = Result<T, Error<Rule>>;
type Node<'i> = pest_consume::Node<'i, Rule, ()>;

// include the grammar file so that Cargo knows to rebuild this file on grammar changes
const _GRAMMAR: &str = include_str!("capnp.pest");

#[derive(Parser)]
#[grammar = "compiler/capnp.pest"]
pub struct SchemaParser;

/// A field as written, before layout.
struct RawField {
    name: Id,
    ordinal: u64,
    ty: CapnpType,
}

impl SchemaParser {
    /// Compile the schema `text`. `file_name` is only used in error messages.
    pub fn parse(text: &str, file_name: &str) -> EsiResult<ParsedSchema> {
        let time = std::time::Instant::now();
        let inputs = SchemaParser::parse_with_userdata(Rule::file, text, ())
            .map_err(|e| e.with_path(file_name))
            .map_err(|e| {
                esi_utils::Error::parse_error(format!(
                    "Failed to parse `{file_name}`: {e}"
                ))
            })?;
        let input = inputs.single().map_err(|e| {
            esi_utils::Error::parse_error(format!(
                "Failed to parse `{file_name}`: {e}"
            ))
        })?;
        let out = SchemaParser::file(input)
            .map_err(|e| e.with_path(file_name))
            .map_err(|e| {
                esi_utils::Error::parse_error(format!(
                    "Failed to parse `{file_name}`: {e}"
                ))
            })?;
        log::info!(
            "Compiled schema `{file_name}` ({} structs) in {}us",
            out.nodes.len(),
            time.elapsed().as_micros()
        );
        Ok(out)
    }

    /// Assign offsets to `fields`, in ordinal order.
    fn layout(fields: Vec<RawField>) -> (Vec<Field>, StructLayout) {
        let mut layout = StructLayout::new();
        let mut offsets = vec![0; fields.len()];
        let mut by_ordinal: Vec<usize> = (0..fields.len()).collect();
        by_ordinal.sort_by_key(|idx| fields[*idx].ordinal);
        for idx in by_ordinal {
            let ty = &fields[idx].ty;
            offsets[idx] = match ty {
                CapnpType::Void => 0,
                CapnpType::List(_) => layout.add_pointer(),
                _ => layout.add_data(ty.bits().trailing_zeros() as usize),
            };
        }
        let fields = fields
            .into_iter()
            .zip(offsets)
            .enumerate()
            .map(|(code_order, (f, offset))| Field {
                name: f.name,
                code_order,
                ordinal: f.ordinal,
                ty: f.ty,
                offset,
            })
            .collect();
        (fields, layout)
    }
}

#[pest_consume::parser]
impl SchemaParser {
    fn EOI(_input: Node) -> ParseResult<()> {
        Ok(())
    }

    fn identifier(input: Node) -> ParseResult<Id> {
        Ok(Id::new(input.as_str()))
    }

    fn id_literal(input: Node) -> ParseResult<u64> {
        let id = u64::from_str_radix(&input.as_str()[2..], 16)
            .map_err(|_| input.error("ID does not fit in 64 bits"))?;
        if id & CAPNP_ID_TAG == 0 {
            return Err(input.error(format!(
                "Invalid ID 0x{id:016x}: the high bit must be set"
            )));
        }
        Ok(id)
    }

    fn ordinal(input: Node) -> ParseResult<u64> {
        input
            .as_str()
            .parse::<u64>()
            .map_err(|_| input.error("Expected valid ordinal"))
    }

    fn prim_type(input: Node) -> ParseResult<CapnpType> {
        let s = input.as_str();
        Ok(match s {
            "Void" => CapnpType::Void,
            "Bool" => CapnpType::Bool,
            _ if s.starts_with("UInt") => CapnpType::UInt(
                s[4..].parse().map_err(|_| input.error("Invalid width"))?,
            ),
            _ => CapnpType::Int(
                s[3..].parse().map_err(|_| input.error("Invalid width"))?,
            ),
        })
    }

    fn list_type(input: Node) -> ParseResult<CapnpType> {
        Ok(match_nodes!(
            input.into_children();
            [field_type(elem)] => CapnpType::List(Box::new(elem)),
        ))
    }

    fn field_type(input: Node) -> ParseResult<CapnpType> {
        Ok(match_nodes!(
            input.into_children();
            [list_type(t)] => t,
            [prim_type(t)] => t,
        ))
    }

    fn field(input: Node) -> ParseResult<RawField> {
        let field = match_nodes!(
            input.clone().into_children();
            [identifier(name), ordinal(ordinal), field_type(ty)] => RawField { name, ordinal, ty },
        );
        if !field.name.as_str().starts_with(|c: char| c.is_ascii_lowercase()) {
            return Err(input.error(format!(
                "Field name `{}' must begin with a lower-case letter",
                field.name
            )));
        }
        Ok(field)
    }

    fn struct_def(input: Node) -> ParseResult<StructNode> {
        let (name, id, raw_fields) = match_nodes!(
            input.clone().into_children();
            [identifier(name), id_literal(id), field(fields)..] => (name, id, fields.collect::<Vec<_>>()),
        );
        if !name.as_str().starts_with(|c: char| c.is_ascii_uppercase()) {
            return Err(input.error(format!(
                "Type name `{name}' must begin with a capital letter"
            )));
        }
        let mut names = HashSet::new();
        for f in &raw_fields {
            if !names.insert(f.name) {
                return Err(input.error(format!(
                    "`{}' is already defined in struct `{name}'",
                    f.name
                )));
            }
        }
        let mut ordinals: Vec<u64> = raw_fields.iter().map(|f| f.ordinal).collect();
        ordinals.sort_unstable();
        for (expected, ordinal) in ordinals.iter().enumerate() {
            let expected = expected as u64;
            if *ordinal < expected {
                return Err(input.error(format!(
                    "Duplicate ordinal @{ordinal} in struct `{name}'"
                )));
            } else if *ordinal > expected {
                return Err(input.error(format!(
                    "Skipped ordinal @{expected} in struct `{name}': ordinals must be sequential"
                )));
            }
        }
        let (fields, layout) = SchemaParser::layout(raw_fields);
        Ok(StructNode {
            name,
            id,
            data_word_count: layout.data_word_count(),
            pointer_count: layout.pointer_count(),
            fields,
        })
    }

    fn file_id(input: Node) -> ParseResult<u64> {
        Ok(match_nodes!(
            input.into_children();
            [id_literal(id)] => id,
        ))
    }

    fn file(input: Node) -> ParseResult<ParsedSchema> {
        let (file_id, nodes) = match_nodes!(
            input.clone().into_children();
            [file_id(id), struct_def(structs).., EOI(_)] => (id, structs.collect::<Vec<_>>()),
        );
        let mut ids = HashSet::from([file_id]);
        let mut names = HashSet::new();
        for node in &nodes {
            if !ids.insert(node.id) {
                return Err(input.error(format!(
                    "Duplicate ID 0x{:016x} on struct `{}'",
                    node.id, node.name
                )));
            }
            if !names.insert(node.name) {
                return Err(input.error(format!(
                    "`{}' is already defined in this file",
                    node.name
                )));
            }
        }
        Ok(ParsedSchema { file_id, nodes })
    }
}
