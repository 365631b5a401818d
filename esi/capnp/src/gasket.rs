//! The vocabulary the encoders and decoders are built with: values, bit array
//! slices that remember where they came from, casts and concatenations.
//!
//! Bit arrays (`!hw.array<N x i1>`) are indexed from the least significant
//! bit, so index `k` of a message slice is bit `k` of the Cap'n Proto segment.
use esi_idx::{IndexedMap, impl_index};
use esi_ir::{
    Block, Builder, ICmpPredicate, Module, OpIdx, Type, ValueIdx,
    array_index_width,
};
use esi_utils::Id;

/// A value in the module under construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Component(pub(crate) ValueIdx);

impl Component {
    pub fn value(self) -> ValueIdx {
        self.0
    }
}

/// A bit array, together with its position in the array it was sliced out
/// of. Slices live in an arena owned by the [Gasket] that made them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slice(u32);
impl_index!(Slice);

#[derive(Debug)]
struct SliceData {
    value: ValueIdx,
    parent: Option<Slice>,
    /// Offset into the parent. Unknown when sliced at a dynamic offset.
    offset: Option<u64>,
    size: u64,
}

/// Something backed by a value of the module under construction.
pub trait GasketValue: Copy {
    fn value_idx(self, g: &Gasket) -> ValueIdx;
}

impl GasketValue for Component {
    fn value_idx(self, _: &Gasket) -> ValueIdx {
        self.0
    }
}

impl GasketValue for Slice {
    fn value_idx(self, g: &Gasket) -> ValueIdx {
        g.slices[self].value
    }
}

/// Builds gasket logic into one module.
pub struct Gasket<'a> {
    pub b: Builder<'a>,
    slices: IndexedMap<Slice, SliceData>,
}

impl<'a> Gasket<'a> {
    pub fn new(module: &'a mut Module) -> Self {
        Self {
            b: Builder::new(module),
            slices: IndexedMap::new(),
        }
    }

    /// Value of the input port `name`.
    pub fn arg(&self, name: &str) -> Component {
        Component(self.b.arg(name))
    }

    pub fn ty<V: GasketValue>(&self, v: V) -> &Type {
        self.b.ty(v.value_idx(self))
    }

    pub fn width<V: GasketValue>(&self, v: V) -> u64 {
        self.ty(v).bit_width()
    }

    pub fn component<V: GasketValue>(&self, v: V) -> Component {
        Component(v.value_idx(self))
    }

    /// Name the operation that defines `v`. Empty names are ignored.
    pub fn name<V: GasketValue, S: AsRef<str>>(&mut self, v: V, name: S) -> V {
        let name = name.as_ref();
        if !name.is_empty() {
            let value = v.value_idx(self);
            self.b.set_name(value, name);
        }
        v
    }

    /// Name `v` after a field: `<field><suffix>`.
    pub fn name_field<V: GasketValue>(&mut self, v: V, field: Id, suffix: &str) -> V {
        self.name(v, format!("{field}{suffix}"))
    }

    pub fn zero(&mut self, width: u64) -> Component {
        self.constant(width, 0)
    }

    pub fn constant(&mut self, width: u64, value: u64) -> Component {
        Component(self.b.constant_int(width, value))
    }

    /// `bits` bits of zeros, as a bit array.
    pub fn padding(&mut self, bits: u64) -> Slice {
        let zero = self.zero(bits);
        self.cast_bit_array(zero)
    }

    /// Reinterpret `v` as `ty`.
    pub fn cast<V: GasketValue>(&mut self, v: V, ty: Type) -> Component {
        let value = v.value_idx(self);
        if self.b.ty(value) == &ty {
            return Component(value);
        }
        Component(self.b.bitcast(value, ty))
    }

    /// Reinterpret `v` as a bit array. The result is the root of a new slice
    /// hierarchy.
    pub fn cast_bit_array<V: GasketValue>(&mut self, v: V) -> Slice {
        let width = self.width(v);
        let arr = self.cast(v, Type::bit_array(width));
        self.root(arr)
    }

    /// Reinterpret `v` as an array of `size` elements of type `elem`. The
    /// result is the root of a new slice hierarchy.
    pub fn cast_to_slice<V: GasketValue>(&mut self, v: V, elem: Type, size: u64) -> Slice {
        let arr = self.cast(v, Type::array(elem, size));
        self.root(arr)
    }

    /// Start a slice hierarchy at the array `v`.
    pub fn root(&mut self, v: Component) -> Slice {
        let size = self
            .ty(v)
            .as_array()
            .map(|(_, n)| n)
            .unwrap_or_else(|| panic!("Slices must be arrays, got `{}'", self.ty(v)));
        self.slices.push(SliceData {
            value: v.0,
            parent: None,
            offset: Some(0),
            size,
        })
    }

    /// Truncate the integer `v` to its low `ty` bits, keeping the sign of
    /// signed targets.
    pub fn downcast(&mut self, v: Component, ty: &Type) -> Component {
        let (width, _) = ty
            .as_int()
            .unwrap_or_else(|| panic!("Cannot downcast to `{ty}'"));
        let from = self.width(v);
        let signless = self.cast(v, Type::int(from));
        let result = if ty.is_signed() && width > 1 {
            let magnitude = self.b.extract(signless.0, 0, width - 1);
            let sign = self.b.extract(signless.0, width - 1, 1);
            self.b.concat(&[sign, magnitude])
        } else {
            self.b.extract(signless.0, 0, width)
        };
        self.cast(Component(result), ty.clone())
    }

    /// Widen the signless integer `v` to `width` bits by replicating its top
    /// bit.
    pub fn sign_extend(&mut self, v: Component, width: u64) -> Component {
        let from = self.width(v);
        if from == 0 || from >= width {
            return v;
        }
        let sign = self.b.extract(v.0, from - 1, 1);
        let mut parts = vec![sign; (width - from) as usize];
        parts.push(v.0);
        Component(self.b.concat(&parts))
    }

    /// Concatenate values into one bit array. The first value ends up in the
    /// lowest bits, which is the reverse of `array_concat`.
    pub fn concat(&mut self, values: &[Component]) -> Component {
        assert!(!values.is_empty(), "Cannot concatenate nothing");
        let arrays: Vec<_> = values
            .iter()
            .rev()
            .map(|v| {
                let arr = self.cast_bit_array(*v);
                arr.value_idx(self)
            })
            .collect();
        Component(self.b.array_concat(&arrays))
    }

    /// `size` elements of `s` starting at element `low`.
    pub fn slice(&mut self, s: Slice, low: u64, size: u64) -> Slice {
        let total = self.slices[s].size;
        assert!(
            low + size <= total,
            "Slicing [{low}, {}) out of {total} elements",
            low + size
        );
        let idx = self.constant(array_index_width(total), low);
        self.push_slice(s, idx, Some(low), size)
    }

    /// `size` elements of `s` starting at the element given by the integer
    /// `low`. `low` is truncated or zero extended to the index width of `s`.
    /// The offset of the result is unknown.
    pub fn slice_dyn(&mut self, s: Slice, low: Component, size: u64) -> Slice {
        let total = self.slices[s].size;
        let expected = array_index_width(total);
        let width = self.width(low);
        let low = if width > expected {
            Component(self.b.extract(low.0, 0, expected))
        } else if width < expected {
            let pad = self.zero(expected - width);
            Component(self.b.concat(&[pad.0, low.0]))
        } else {
            low
        };
        self.push_slice(s, low, None, size)
    }

    fn push_slice(
        &mut self,
        parent: Slice,
        idx: Component,
        offset: Option<u64>,
        size: u64,
    ) -> Slice {
        let value = self.b.array_slice(self.slices[parent].value, idx.0, size);
        self.slices.push(SliceData {
            value,
            parent: Some(parent),
            offset,
            size,
        })
    }

    /// Element `idx` of `s`.
    pub fn get(&mut self, s: Slice, idx: u64) -> Component {
        let width = array_index_width(self.slices[s].size);
        let idx = self.constant(width, idx);
        Component(self.b.array_get(self.slices[s].value, idx.0))
    }

    /// The array `s` was ultimately sliced out of.
    pub fn root_slice(&self, s: Slice) -> Slice {
        match self.slices[s].parent {
            Some(parent) => self.root_slice(parent),
            None => s,
        }
    }

    /// Offset of `s` into its root, if every offset along the way is known.
    pub fn offset_from_root(&self, s: Slice) -> Option<u64> {
        let data = &self.slices[s];
        match data.parent {
            None => Some(0),
            Some(parent) => Some(data.offset? + self.offset_from_root(parent)?),
        }
    }
}

/// Builds runtime checks into an `always @(posedge clk) if (valid)` region.
pub struct AssertBuilder {
    region: OpIdx,
}

impl AssertBuilder {
    pub fn new(g: &mut Gasket, clk: Component, valid: Component) -> Self {
        let prev = g.b.block();
        let always = g.b.always(clk.0);
        g.b.set_block(Block::Region(always));
        let region = g.b.if_op(valid.0);
        g.b.set_block(prev);
        Self { region }
    }

    pub fn assert_eq<V: GasketValue>(&self, g: &mut Gasket, v: V, expected: u64, what: &str) {
        self.assert_pred(g, v, ICmpPredicate::Eq, expected, what)
    }

    /// Assert `v pred expected`. `v` is an integer or a bit array; `what`
    /// describes it in the failure message.
    pub fn assert_pred<V: GasketValue>(
        &self,
        g: &mut Gasket,
        v: V,
        pred: ICmpPredicate,
        expected: u64,
        what: &str,
    ) {
        let ty = g.ty(v);
        assert!(
            ty.is_integer() || ty.is_bit_array(),
            "Can only compare integers and bit arrays, not `{ty}'"
        );
        let width = ty.bit_width();
        let val = g.cast(v, Type::int(width));

        let prev = g.b.block();
        g.b.set_block(Block::Region(self.region));
        let expected_val = g.constant(width, expected);
        let cond = g.b.icmp(pred, val.0, expected_val.0);
        g.b.assert(cond, format!("{what} {pred} {expected}"));
        g.b.set_block(prev);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use esi_ir::{Bits, Context, PortInfo, Simulator};

    fn harness<F>(input: Type, output: Type, body: F) -> Context
    where
        F: FnOnce(&mut Gasket, Component) -> Component,
    {
        let mut m = Module::new(
            "harness",
            vec![PortInfo::input("x", input), PortInfo::output("y", output)],
        );
        let mut g = Gasket::new(&mut m);
        let x = g.arg("x");
        let y = body(&mut g, x);
        g.b.output(&[y.value()]);
        let mut ctx = Context::new();
        ctx.add_module(m).unwrap();
        ctx
    }

    fn eval(ctx: &Context, x: Bits) -> Bits {
        Simulator::new(ctx)
            .run("harness", &[("x", x)])
            .unwrap()
            .output("y")
            .clone()
    }

    #[test]
    fn concat_puts_first_value_lowest() {
        let ctx = harness(Type::int(8), Type::bit_array(16), |g, x| {
            let tag = g.constant(2, 0b01);
            let hi = g.constant(6, 0b101010);
            g.concat(&[tag, hi, x])
        });
        let out = eval(&ctx, Bits::from_u64(8, 0xff));
        assert_eq!(out.to_u64(), 0xff << 8 | 0b101010 << 2 | 0b01);
    }

    #[test]
    fn offsets_are_tracked_through_slices() {
        let mut m = Module::new("m", vec![PortInfo::input("x", Type::bit_array(256))]);
        let mut g = Gasket::new(&mut m);
        let x = g.arg("x");
        let root = g.root(x);
        let a = g.slice(root, 64, 128);
        let b = g.slice(a, 8, 16);
        assert_eq!(g.offset_from_root(b), Some(72));
        assert_eq!(g.root_slice(b), root);

        let off = g.constant(30, 3);
        let dynamic = g.slice_dyn(root, off, 8);
        let inner = g.slice(dynamic, 0, 4);
        assert_eq!(g.offset_from_root(inner), None);
        assert_eq!(g.root_slice(inner), root);
        assert_eq!(g.ty(dynamic), &Type::bit_array(8));
    }

    #[test]
    fn downcast_keeps_sign() {
        let ctx = harness(Type::int(8), Type::sint(5), |g, x| g.downcast(x, &Type::sint(5)));
        assert_eq!(eval(&ctx, Bits::from_i64(8, -3)).to_i64(), -3);
        assert_eq!(eval(&ctx, Bits::from_u64(8, 0x0f)).to_u64(), 0x0f);
    }

    #[test]
    fn sign_extension() {
        let ctx = harness(Type::int(5), Type::int(8), |g, x| g.sign_extend(x, 8));
        assert_eq!(eval(&ctx, Bits::from_i64(5, -2)).to_u64(), 0xfe);
        assert_eq!(eval(&ctx, Bits::from_u64(5, 7)).to_u64(), 7);
    }

    #[test]
    fn dynamic_slices_are_truncated() {
        let ctx = harness(Type::int(36), Type::bit_array(4), |g, x| {
            let data = g.constant(16, 0xabcd);
            let arr = g.cast_bit_array(data);
            let s = g.slice_dyn(arr, x, 4);
            g.component(s)
        });
        // index width is 4, so bit 32 of the offset is dropped
        assert_eq!(eval(&ctx, Bits::from_u64(36, (1 << 32) | 4)).to_u64(), 0xc);
        // reads past the end are zero
        assert_eq!(eval(&ctx, Bits::from_u64(36, 14)).to_u64(), 0b10);
    }

    #[test]
    fn asserts_land_in_the_valid_region() {
        let mut m = Module::new(
            "checked",
            vec![
                PortInfo::input("clk", Type::i1()),
                PortInfo::input("valid", Type::i1()),
                PortInfo::input("x", Type::bit_array(4)),
            ],
        );
        let mut g = Gasket::new(&mut m);
        let (clk, valid, x) = (g.arg("clk"), g.arg("valid"), g.arg("x"));
        let asserts = AssertBuilder::new(&mut g, clk, valid);
        let x = g.root(x);
        let low = g.slice(x, 0, 2);
        asserts.assert_eq(&mut g, low, 1, "tag");
        asserts.assert_pred(&mut g, x, ICmpPredicate::Ule, 9, "x");
        assert_eq!(g.b.block(), Block::Body);
        let mut ctx = Context::new();
        ctx.add_module(m).unwrap();

        let sim = Simulator::new(&ctx);
        let run = |valid: u64, x: u64| {
            sim.run(
                "checked",
                &[
                    ("clk", Bits::from_u64(1, 1)),
                    ("valid", Bits::from_u64(1, valid)),
                    ("x", Bits::from_u64(4, x)),
                ],
            )
            .unwrap()
        };
        assert!(!run(1, 0b0101).has_violations());
        assert!(run(1, 0b0110).violated("tag eq 1"));
        assert!(run(1, 0b1101).violated("x ule 9"));
        assert!(!run(0, 0b1110).has_violations());
    }
}
