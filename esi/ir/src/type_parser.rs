#![allow(clippy::upper_case_acronyms)]

//! Parser for the textual form of hardware types.
use crate::types::{FieldInfo, Type};
use esi_utils::{self, EsiResult, Id};
use pest_consume::{Error, Parser, match_nodes};

type ParseResult<T> = Result<T, Error<Rule>>;
type Node<'i> = pest_consume::Node<'i, Rule, ()>;

// include the grammar file so that Cargo knows to rebuild this file on grammar changes
const _GRAMMAR: &str = include_str!("types.pest");

#[derive(Parser)]
#[grammar = "types.pest"]
pub struct TypeParser;

impl TypeParser {
    /// Parse a single type such as `!hw.array<4xi16>`.
    pub fn parse_type(input: &str) -> EsiResult<Type> {
        let inputs = TypeParser::parse(Rule::type_def, input).map_err(|e| {
            esi_utils::Error::parse_error(format!(
                "Failed to parse type `{input}`: {e}"
            ))
        })?;
        let node = inputs.single().map_err(|e| {
            esi_utils::Error::parse_error(format!(
                "Failed to parse type `{input}`: {e}"
            ))
        })?;
        TypeParser::type_def(node).map_err(|e| {
            esi_utils::Error::parse_error(format!(
                "Failed to parse type `{input}`: {e}"
            ))
        })
    }
}

#[pest_consume::parser]
impl TypeParser {
    fn EOI(_input: Node) -> ParseResult<()> {
        Ok(())
    }

    fn identifier(input: Node) -> ParseResult<Id> {
        Ok(Id::new(input.as_str()))
    }

    fn width(input: Node) -> ParseResult<u64> {
        input
            .as_str()
            .parse::<u64>()
            .map_err(|_| input.error("Expected valid bitwidth"))
    }

    fn signed_int(input: Node) -> ParseResult<Type> {
        Ok(match_nodes!(
            input.into_children();
            [width(w)] => Type::sint(w),
        ))
    }

    fn unsigned_int(input: Node) -> ParseResult<Type> {
        Ok(match_nodes!(
            input.into_children();
            [width(w)] => Type::uint(w),
        ))
    }

    fn signless_int(input: Node) -> ParseResult<Type> {
        Ok(match_nodes!(
            input.into_children();
            [width(w)] => Type::int(w),
        ))
    }

    fn int_type(input: Node) -> ParseResult<Type> {
        Ok(match_nodes!(
            input.into_children();
            [signed_int(t)] => t,
            [unsigned_int(t)] => t,
            [signless_int(t)] => t,
        ))
    }

    fn array_type(input: Node) -> ParseResult<Type> {
        Ok(match_nodes!(
            input.into_children();
            [width(size), ty(elem)] => Type::array(elem, size),
        ))
    }

    fn field(input: Node) -> ParseResult<FieldInfo> {
        Ok(match_nodes!(
            input.into_children();
            [identifier(name), ty(t)] => FieldInfo::new(name, t),
        ))
    }

    fn struct_type(input: Node) -> ParseResult<Type> {
        let fields = match_nodes!(
            input.clone().into_children();
            [field(fields)..] => fields.collect::<Vec<_>>(),
        );
        for (i, f) in fields.iter().enumerate() {
            if fields[..i].iter().any(|prev| prev.name == f.name) {
                return Err(
                    input.error(format!("Duplicate struct field `{}'", f.name))
                );
            }
        }
        Ok(Type::structure(fields))
    }

    fn alias_type(input: Node) -> ParseResult<Type> {
        Ok(match_nodes!(
            input.into_children();
            [identifier(name), ty(inner)] => Type::alias(name, inner),
        ))
    }

    fn channel_type(input: Node) -> ParseResult<Type> {
        Ok(match_nodes!(
            input.into_children();
            [ty(inner)] => Type::channel(inner),
        ))
    }

    fn ty(input: Node) -> ParseResult<Type> {
        Ok(match_nodes!(
            input.into_children();
            [array_type(t)] => t,
            [struct_type(t)] => t,
            [alias_type(t)] => t,
            [channel_type(t)] => t,
            [int_type(t)] => t,
        ))
    }

    fn type_def(input: Node) -> ParseResult<Type> {
        Ok(match_nodes!(
            input.into_children();
            [ty(t), EOI(_)] => t,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_every_type_form() {
        let cases = [
            "i8",
            "si5",
            "ui64",
            "!hw.array<4xi16>",
            "!hw.struct<a: ui8, b: ui32>",
            "!hw.struct<>",
            "!hw.typealias<@Word, !hw.array<2xsi3>>",
            "!esi.channel<!hw.struct<valid_bit: i1>>",
        ];
        for case in cases {
            let ty = TypeParser::parse_type(case).unwrap();
            assert_eq!(ty.to_string(), case);
        }
    }

    #[test]
    fn tolerates_whitespace() {
        let ty: Type = " !hw.array< 4 x ui16 > ".parse().unwrap();
        assert_eq!(ty, Type::array(Type::uint(16), 4));
    }

    #[test]
    fn rejects_malformed_types() {
        for case in ["", "u8", "!hw.array<xi8>", "!hw.struct<a: i8, a: i8>"] {
            let err = TypeParser::parse_type(case).unwrap_err();
            assert!(
                matches!(err.kind(), esi_utils::ErrorKind::Parse(_)),
                "{case}: {err}"
            );
        }
    }
}
