//! Encoded messages must be exactly what a canonical Cap'n Proto writer
//! produces, and decoders must flag messages they cannot have come from.
mod common;

use common::Gaskets;
use esi_capnp::TypeSchema;
use esi_ir::{Bits, FieldInfo, Type};

fn elements(width: u64, values: &[u64]) -> Bits {
    Bits::from_elements(
        &values
            .iter()
            .map(|v| Bits::from_u64(width, *v))
            .collect::<Vec<_>>(),
    )
}

fn shorts() -> Type {
    Type::array(Type::int(16), 4)
}

#[test]
fn single_byte_message() {
    let g = Gaskets::new(&Type::uint(8));
    let msg = g.encode(Bits::from_u64(8, 0x5a));
    // struct pointer: offset 0, one data word, no pointers
    assert_eq!(msg.to_words(), vec![1 << 32, 0x5a]);
    assert_eq!(g.decode(msg), Bits::from_u64(8, 0x5a));
}

#[test]
fn list_message() {
    let g = Gaskets::new(&shorts());
    let value = elements(16, &[1, 2, 3, 4]);
    let msg = g.encode(value.clone());
    assert_eq!(msg.width(), 192);
    assert_eq!(
        msg.to_words(),
        vec![
            1 << 48,
            // list pointer: offset 0, two byte elements, four of them
            1 | 3 << 32 | 4 << 35,
            1 | 2 << 16 | 3 << 32 | 4 << 48,
        ]
    );
    assert_eq!(g.decode(msg), value);
}

#[test]
fn struct_message() {
    let ty = Type::structure(vec![
        FieldInfo::new("a", Type::uint(8)),
        FieldInfo::new("b", Type::uint(32)),
    ]);
    let g = Gaskets::new(&ty);
    // the first field is the most significant in the packed value
    let value = Bits::concat(&[Bits::from_u64(8, 0x12), Bits::from_u64(32, 0xdead_beef)]);
    let msg = g.encode(value.clone());
    assert_eq!(msg.to_words(), vec![1 << 32, 0x12 | 0xdead_beef << 32]);
    assert_eq!(g.decode(msg), value);
}

#[test]
fn mixed_struct_message() {
    let ty = Type::structure(vec![
        FieldInfo::new("x", Type::sint(4)),
        FieldInfo::new("samples", Type::array(Type::uint(8), 3)),
        FieldInfo::new("flag", Type::i1()),
    ]);
    assert_eq!(TypeSchema::new(ty.clone()).size().unwrap(), 256);
    let g = Gaskets::new(&ty);
    let value = Bits::concat(&[
        Bits::from_i64(4, -3),
        elements(8, &[7, 8, 9]),
        Bits::from_u64(1, 1),
    ]);
    let msg = g.encode(value.clone());
    assert_eq!(
        msg.to_words(),
        vec![
            1 << 32 | 1 << 48,
            // x is sign extended to a full byte, flag fills the next hole
            0xfd | 1 << 8,
            1 | 2 << 32 | 3 << 35,
            7 | 8 << 8 | 9 << 16,
        ]
    );
    assert_eq!(g.decode(msg), value);
}

#[test]
fn empty_struct_message() {
    let g = Gaskets::new(&Type::int(0));
    let msg = g.encode(Bits::zero(0));
    // offset -1: the empty root struct sits on its own pointer
    assert_eq!(msg.to_words(), vec![0xffff_fffc]);
    assert_eq!(g.decode(msg), Bits::zero(0));

    // a null root pointer is not an empty struct
    let res = g.decode_with(Bits::from_words(&[0]), true);
    assert!(res.violated("typeAndOffset"));
}

#[test]
fn bad_root_pointer_is_flagged() {
    let g = Gaskets::new(&Type::uint(8));
    let res = g.decode_with(Bits::from_words(&[2 << 32, 0x5a]), true);
    assert!(res.violated("dataSectionSize"));
    assert!(!res.violated("ptrSectionSize"));

    let res = g.decode_with(Bits::from_words(&[1 << 32 | 1 << 2, 0x5a]), true);
    assert!(res.violated("typeAndOffset"));
}

#[test]
fn bad_list_pointer_is_flagged() {
    let g = Gaskets::new(&shorts());
    let payload = 1 | 2 << 16 | 3 << 32 | 4 << 48;

    let too_long = Bits::from_words(&[1 << 48, 1 | 3 << 32 | 5 << 35, payload]);
    let res = g.decode_with(too_long.clone(), true);
    assert!(res.violated("l: list length"));
    assert!(!res.violated("l: list pointer tag"));

    let not_a_list = Bits::from_words(&[1 << 48, 3 << 32 | 4 << 35, payload]);
    assert!(g.decode_with(not_a_list, true).violated("l: list pointer tag"));

    let wrong_size = Bits::from_words(&[1 << 48, 1 | 4 << 32 | 4 << 35, payload]);
    assert!(g.decode_with(wrong_size, true).violated("l: element size"));

    // nothing is checked while the input is not valid
    assert!(!g.decode_with(too_long, false).has_violations());
}

#[test]
fn shorter_lists_are_accepted() {
    let g = Gaskets::new(&shorts());
    let msg = Bits::from_words(&[1 << 48, 1 | 3 << 32 | 2 << 35, 1 | 2 << 16]);
    let res = g.decode_with(msg, true);
    assert!(!res.has_violations(), "{:?}", res.violations);
}
