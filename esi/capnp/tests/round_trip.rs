//! Decoding an encoded value gives the value back, for every supported shape.
mod common;

use common::{Gaskets, shapes, values};
use esi_ir::{Bits, Type};
use proptest::prelude::*;
use proptest::test_runner::{Config, TestRunner};

#[test]
fn decode_inverts_encode() {
    for ty in shapes() {
        let g = Gaskets::new(&ty);
        let mut runner = TestRunner::new(Config::with_cases(64));
        runner
            .run(&values(ty.bit_width()), |value| {
                let msg = g.encode(value.clone());
                prop_assert_eq!(g.decode(msg), value);
                Ok(())
            })
            .unwrap_or_else(|e| panic!("`{ty}': {e}"));
    }
}

proptest! {
    #[test]
    fn signed_values_survive(v in -16i64..16) {
        let g = Gaskets::new(&Type::sint(5));
        let msg = g.encode(Bits::from_i64(5, v));
        // negative values are sign extended to the full byte on the wire
        prop_assert_eq!(msg.slice(64, 8).to_i64(), v);
        prop_assert_eq!(g.decode(msg).to_i64(), v);
    }
}
