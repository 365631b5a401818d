#![allow(dead_code)]

use esi_capnp::GasketCache;
use esi_ir::{Bits, Context, FieldInfo, SimResult, Simulator, Type};
use proptest::prelude::*;

/// A context holding the encoder and decoder of one type.
pub struct Gaskets {
    pub ctx: Context,
    pub encoder: String,
    pub decoder: String,
}

impl Gaskets {
    pub fn new(ty: &Type) -> Self {
        let cache = GasketCache::new();
        let mut ctx = Context::new();
        let encoder = cache.encoder_module(&mut ctx, ty).unwrap().to_string();
        let decoder = cache.decoder_module(&mut ctx, ty).unwrap().to_string();
        Self {
            ctx,
            encoder,
            decoder,
        }
    }

    pub fn encode(&self, value: Bits) -> Bits {
        let res = Simulator::new(&self.ctx)
            .run(
                self.encoder.as_str(),
                &[
                    ("clk", Bits::from_u64(1, 1)),
                    ("valid", Bits::from_u64(1, 1)),
                    ("unencodedInput", value),
                ],
            )
            .unwrap();
        assert!(!res.has_violations(), "{:?}", res.violations);
        res.output("encoded").clone()
    }

    pub fn decode_with(&self, message: Bits, valid: bool) -> SimResult {
        Simulator::new(&self.ctx)
            .run(
                self.decoder.as_str(),
                &[
                    ("clk", Bits::from_u64(1, 1)),
                    ("valid", Bits::from_u64(1, valid as u64)),
                    ("encodedInput", message),
                ],
            )
            .unwrap()
    }

    pub fn decode(&self, message: Bits) -> Bits {
        let res = self.decode_with(message, true);
        assert!(!res.has_violations(), "{:?}", res.violations);
        res.output("decoded").clone()
    }
}

/// One type of every shape a gasket can be generated for.
pub fn shapes() -> Vec<Type> {
    vec![
        Type::i1(),
        Type::uint(8),
        Type::sint(8),
        Type::sint(5),
        Type::uint(33),
        Type::int(64),
        Type::sint(64),
        Type::array(Type::int(16), 4),
        Type::array(Type::sint(5), 3),
        Type::array(Type::i1(), 5),
        Type::array(Type::uint(64), 2),
        Type::array(Type::alias("Sample", Type::uint(12)), 6),
        Type::structure(vec![
            FieldInfo::new("a", Type::uint(8)),
            FieldInfo::new("b", Type::uint(32)),
        ]),
        Type::alias(
            "Packet",
            Type::structure(vec![
                FieldInfo::new("x", Type::sint(4)),
                FieldInfo::new("samples", Type::array(Type::uint(8), 3)),
                FieldInfo::new("flag", Type::i1()),
                FieldInfo::new("wide", Type::uint(64)),
                FieldInfo::new("deltas", Type::array(Type::sint(16), 2)),
            ]),
        ),
    ]
}

/// Arbitrary values of `width` bits.
pub fn values(width: u64) -> impl Strategy<Value = Bits> {
    let words = width.div_ceil(64) as usize;
    prop::collection::vec(any::<u64>(), words)
        .prop_map(move |w| Bits::from_words(&w).slice(0, width))
}
