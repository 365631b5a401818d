//! IR Builder. Provides convenience methods to construct operations inside a
//! module while checking operand types.
use crate::structure::{
    ICmpPredicate, OpIdx, OpKind, Operation, ValueData, ValueDef, ValueIdx,
};
use crate::types::{Type, array_index_width};
use crate::{Bits, Module, PortInfo};
use esi_utils::Id;
use smallvec::SmallVec;

/// Where newly created operations are appended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Block {
    /// The top level of the module.
    Body,
    /// The region of an `always` or `if` operation.
    Region(OpIdx),
}

/// IR builder.
/// Uses internal references to the module to construct and validate
/// operations. Type errors in operands are bugs in the caller and panic.
pub struct Builder<'a> {
    /// Module for which this builder is constructing.
    pub module: &'a mut Module,
    /// Current insertion block.
    block: Block,
}

impl<'a> Builder<'a> {
    /// Instantiate a new builder appending to the body of `module`.
    pub fn new(module: &'a mut Module) -> Self {
        Self {
            module,
            block: Block::Body,
        }
    }

    pub fn block(&self) -> Block {
        self.block
    }

    /// Move the insertion point to the end of `block`.
    pub fn set_block(&mut self, block: Block) {
        if let Block::Region(op) = block {
            assert!(
                self.module.ops[op].kind.region().is_some(),
                "Operation does not have a region"
            );
        }
        self.block = block;
    }

    /// Value of the input port `name`.
    ///
    /// # Panics
    /// Panics if the module has no such input port.
    pub fn arg<S: AsRef<str>>(&self, name: S) -> ValueIdx {
        let name = name.as_ref();
        self.module
            .arg(name)
            .unwrap_or_else(|| panic!("No input port named `{name}'"))
    }

    pub fn ty(&self, value: ValueIdx) -> &Type {
        self.module.value_ty(value)
    }

    /// Attach a name to `value`, uniquified within the module.
    pub fn set_name<S: Into<Id>>(&mut self, value: ValueIdx, name: S) -> Id {
        let name = self.module.generate_name(name);
        self.module.values[value].name = Some(name);
        name
    }

    fn push_op(
        &mut self,
        kind: OpKind,
        operands: &[ValueIdx],
        result_tys: Vec<Type>,
    ) -> OpIdx {
        let op_idx = self.module.ops.peek_next_idx();
        let results = result_tys
            .into_iter()
            .enumerate()
            .map(|(n, ty)| {
                self.module.values.push(ValueData {
                    ty,
                    def: ValueDef::Result(op_idx, n),
                    name: None,
                })
            })
            .collect();
        let idx = self.module.ops.push(Operation {
            kind,
            operands: SmallVec::from_slice(operands),
            results,
        });
        match self.block {
            Block::Body => self.module.body.push(idx),
            Block::Region(parent) => self.module.ops[parent]
                .kind
                .region_mut()
                .expect("insertion block has a region")
                .push(idx),
        }
        idx
    }

    fn push_value_op(
        &mut self,
        kind: OpKind,
        operands: &[ValueIdx],
        result: Type,
    ) -> ValueIdx {
        let op = self.push_op(kind, operands, vec![result]);
        self.module.ops[op].result()
    }

    fn assert_signless(&self, value: ValueIdx, op: &str) -> u64 {
        let ty = self.ty(value);
        assert!(
            ty.is_signless_int(),
            "{op}: expected a signless integer, got `{ty}'"
        );
        ty.bit_width()
    }

    /// A constant of type `ty`.
    pub fn constant(&mut self, ty: Type, value: Bits) -> ValueIdx {
        assert_eq!(
            ty.bit_width(),
            value.width(),
            "Constant width does not match `{ty}'"
        );
        self.push_value_op(OpKind::Constant(value), &[], ty)
    }

    /// A signless integer constant.
    pub fn constant_int(&mut self, width: u64, value: u64) -> ValueIdx {
        self.constant(Type::int(width), Bits::from_u64(width, value))
    }

    /// Reinterpret the bits of `value` as `ty`.
    pub fn bitcast(&mut self, value: ValueIdx, ty: Type) -> ValueIdx {
        let from = self.ty(value);
        assert_eq!(
            from.bit_width(),
            ty.bit_width(),
            "Cannot bitcast `{from}' to `{ty}'"
        );
        self.push_value_op(OpKind::Bitcast, &[value], ty)
    }

    /// `width` bits of the signless integer `value` starting at `low`.
    pub fn extract(&mut self, value: ValueIdx, low: u64, width: u64) -> ValueIdx {
        let from = self.assert_signless(value, "extract");
        assert!(
            low + width <= from,
            "Extracting bits [{low}, {}) out of an i{from}",
            low + width
        );
        self.push_value_op(OpKind::Extract { low }, &[value], Type::int(width))
    }

    /// Concatenate signless integers, the first one most significant.
    pub fn concat(&mut self, values: &[ValueIdx]) -> ValueIdx {
        let width = values
            .iter()
            .map(|v| self.assert_signless(*v, "concat"))
            .sum();
        self.push_value_op(OpKind::Concat, values, Type::int(width))
    }

    pub fn add(&mut self, lhs: ValueIdx, rhs: ValueIdx) -> ValueIdx {
        self.assert_signless(lhs, "add");
        let ty = self.ty(lhs).clone();
        assert_eq!(&ty, self.ty(rhs), "add: operand types differ");
        self.push_value_op(OpKind::Add, &[lhs, rhs], ty)
    }

    pub fn icmp(
        &mut self,
        pred: ICmpPredicate,
        lhs: ValueIdx,
        rhs: ValueIdx,
    ) -> ValueIdx {
        self.assert_signless(lhs, "icmp");
        assert_eq!(self.ty(lhs), self.ty(rhs), "icmp: operand types differ");
        self.push_value_op(OpKind::ICmp(pred), &[lhs, rhs], Type::i1())
    }

    fn assert_index(&self, array_size: u64, index: ValueIdx) {
        let width = self.assert_signless(index, "array index");
        assert_eq!(
            width,
            array_index_width(array_size),
            "Index into an array of {array_size} elements has the wrong width"
        );
    }

    /// `size` elements of `array` starting at the element `index`.
    pub fn array_slice(
        &mut self,
        array: ValueIdx,
        index: ValueIdx,
        size: u64,
    ) -> ValueIdx {
        let (elem, total) = self
            .ty(array)
            .as_array()
            .map(|(e, n)| (e.clone(), n))
            .unwrap_or_else(|| panic!("array_slice of a non-array"));
        assert!(size <= total, "Slice of {size} out of {total} elements");
        self.assert_index(total, index);
        self.push_value_op(
            OpKind::ArraySlice,
            &[array, index],
            Type::array(elem, size),
        )
    }

    pub fn array_get(&mut self, array: ValueIdx, index: ValueIdx) -> ValueIdx {
        let (elem, total) = self
            .ty(array)
            .as_array()
            .map(|(e, n)| (e.clone(), n))
            .unwrap_or_else(|| panic!("array_get of a non-array"));
        self.assert_index(total, index);
        self.push_value_op(OpKind::ArrayGet, &[array, index], elem)
    }

    /// Build an array whose element `k` is `elems[k]`.
    pub fn array_create(&mut self, elems: &[ValueIdx]) -> ValueIdx {
        assert!(!elems.is_empty(), "Cannot create an empty array");
        let elem = self.ty(elems[0]).clone();
        for e in elems {
            assert_eq!(self.ty(*e), &elem, "array_create: element types differ");
        }
        self.push_value_op(
            OpKind::ArrayCreate,
            elems,
            Type::array(elem, elems.len() as u64),
        )
    }

    /// Concatenate arrays. The first array occupies the highest indices.
    pub fn array_concat(&mut self, arrays: &[ValueIdx]) -> ValueIdx {
        assert!(!arrays.is_empty(), "Cannot concatenate zero arrays");
        let mut elem: Option<Type> = None;
        let mut size = 0;
        for arr in arrays {
            let (e, n) = self
                .ty(*arr)
                .as_array()
                .unwrap_or_else(|| panic!("array_concat of a non-array"));
            match &elem {
                Some(prev) => assert_eq!(prev, e, "array_concat: element types differ"),
                None => elem = Some(e.clone()),
            }
            size += n;
        }
        let elem = elem.expect("at least one array");
        self.push_value_op(OpKind::ArrayConcat, arrays, Type::array(elem, size))
    }

    pub fn struct_extract<S: Into<Id>>(
        &mut self,
        value: ValueIdx,
        field: S,
    ) -> ValueIdx {
        let field = field.into();
        let ty = self
            .ty(value)
            .as_struct()
            .and_then(|fields| fields.iter().find(|f| f.name == field))
            .map(|f| f.ty.clone())
            .unwrap_or_else(|| panic!("No struct field named `{field}'"));
        self.push_value_op(OpKind::StructExtract { field }, &[value], ty)
    }

    /// Build a struct of type `ty` from one value per field.
    pub fn struct_create(&mut self, ty: Type, values: &[ValueIdx]) -> ValueIdx {
        let fields = ty
            .as_struct()
            .unwrap_or_else(|| panic!("struct_create of non-struct `{ty}'"));
        assert_eq!(fields.len(), values.len(), "struct_create: wrong arity");
        for (f, v) in fields.iter().zip(values) {
            assert_eq!(
                &f.ty,
                self.ty(*v),
                "struct_create: wrong type for field `{}'",
                f.name
            );
        }
        self.push_value_op(OpKind::StructCreate, values, ty)
    }

    /// Instantiate the module `callee` whose ports are `ports`. The instance
    /// name is uniquified within the module. Returns the values of the
    /// callee's outputs.
    pub fn instance<S: Into<Id>>(
        &mut self,
        callee: Id,
        ports: &[PortInfo],
        name: S,
        inputs: &[ValueIdx],
    ) -> Vec<ValueIdx> {
        let input_tys: Vec<_> = ports
            .iter()
            .filter(|p| p.direction == crate::Direction::Input)
            .collect();
        assert_eq!(
            input_tys.len(),
            inputs.len(),
            "Instance of `{callee}': wrong number of inputs"
        );
        for (port, v) in input_tys.iter().zip(inputs) {
            assert_eq!(
                &port.ty,
                self.ty(*v),
                "Instance of `{callee}': wrong type for port `{}'",
                port.name
            );
        }
        let name = self.module.generate_name(name);
        let outputs = ports
            .iter()
            .filter(|p| p.direction == crate::Direction::Output)
            .map(|p| p.ty.clone())
            .collect();
        let op = self.push_op(
            OpKind::Instance {
                module: callee,
                name,
            },
            inputs,
            outputs,
        );
        self.module.ops[op].results.to_vec()
    }

    /// Instantiate `callee`. See [Builder::instance].
    pub fn instance_of<S: Into<Id>>(
        &mut self,
        callee: &Module,
        name: S,
        inputs: &[ValueIdx],
    ) -> Vec<ValueIdx> {
        self.instance(callee.name, &callee.ports, name, inputs)
    }

    /// An `always` block triggered on the rising edge of `clock`. Use
    /// [Builder::set_block] with [Block::Region] to fill it.
    pub fn always(&mut self, clock: ValueIdx) -> OpIdx {
        assert_eq!(self.ty(clock), &Type::i1(), "Clock must be an i1");
        self.push_op(OpKind::Always { region: Vec::new() }, &[clock], vec![])
    }

    /// A conditional region.
    pub fn if_op(&mut self, cond: ValueIdx) -> OpIdx {
        assert_eq!(self.ty(cond), &Type::i1(), "Condition must be an i1");
        self.push_op(OpKind::If { region: Vec::new() }, &[cond], vec![])
    }

    /// Report `message` whenever `cond` is false.
    pub fn assert<S: ToString>(&mut self, cond: ValueIdx, message: S) -> OpIdx {
        assert_eq!(self.ty(cond), &Type::i1(), "Assertion must be an i1");
        self.push_op(
            OpKind::Assert {
                message: message.to_string(),
            },
            &[cond],
            vec![],
        )
    }

    /// Set the values driven onto the output ports, in port order.
    pub fn output(&mut self, values: &[ValueIdx]) {
        let expected: Vec<_> = self.module.output_ports().cloned().collect();
        assert_eq!(
            expected.len(),
            values.len(),
            "Module `{}' has {} outputs",
            self.module.name,
            expected.len()
        );
        for (port, v) in expected.iter().zip(values) {
            assert_eq!(
                &port.ty,
                self.ty(*v),
                "Wrong type for output `{}'",
                port.name
            );
        }
        self.module.outputs = values.to_vec();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FieldInfo;

    #[test]
    fn regions_collect_nested_ops() {
        let mut m = Module::new(
            "m",
            vec![
                PortInfo::input("clk", Type::i1()),
                PortInfo::input("x", Type::int(8)),
            ],
        );
        let mut b = Builder::new(&mut m);
        let clk = b.arg("clk");
        let always = b.always(clk);
        b.set_block(Block::Region(always));
        let x = b.arg("x");
        let zero = b.constant_int(8, 0);
        let cond = b.icmp(ICmpPredicate::Ne, x, zero);
        b.assert(cond, "x must be nonzero");
        b.set_block(Block::Body);
        b.output(&[]);
        assert_eq!(m.body().len(), 1);
        assert_eq!(m.op(always).kind.region().map(|r| r.len()), Some(3));
    }

    #[test]
    fn result_types_are_inferred() {
        let st = Type::structure(vec![
            FieldInfo::new("a", Type::uint(8)),
            FieldInfo::new("b", Type::array(Type::int(4), 3)),
        ]);
        let mut m = Module::new("m", vec![PortInfo::input("s", st.clone())]);
        let mut b = Builder::new(&mut m);
        let s = b.arg("s");
        let arr = b.struct_extract(s, "b");
        assert_eq!(b.ty(arr), &Type::array(Type::int(4), 3));
        let idx = b.constant_int(2, 1);
        let sl = b.array_slice(arr, idx, 2);
        assert_eq!(b.ty(sl), &Type::array(Type::int(4), 2));
        let cat = b.array_concat(&[sl, arr]);
        assert_eq!(b.ty(cat), &Type::array(Type::int(4), 5));
        let flat = b.bitcast(cat, Type::int(20));
        let hi = b.extract(flat, 12, 8);
        let both = b.concat(&[hi, flat]);
        assert_eq!(b.ty(both), &Type::int(28));
    }

    #[test]
    #[should_panic(expected = "Cannot bitcast")]
    fn bitcast_checks_widths() {
        let mut m = Module::new("m", vec![PortInfo::input("x", Type::int(8))]);
        let mut b = Builder::new(&mut m);
        let x = b.arg("x");
        b.bitcast(x, Type::int(9));
    }

    #[test]
    fn instance_names_are_unique() {
        let callee = Module::new(
            "callee",
            vec![PortInfo::output("y", Type::int(2))],
        );
        let mut m = Module::new("m", vec![]);
        let mut b = Builder::new(&mut m);
        b.instance_of(&callee, "inst", &[]);
        b.instance_of(&callee, "inst", &[]);
        let names: Vec<_> = m
            .body()
            .iter()
            .filter_map(|op| match &m.op(*op).kind {
                OpKind::Instance { name, .. } => Some(*name),
                _ => None,
            })
            .collect();
        assert_eq!(names, vec![Id::new("inst"), Id::new("inst0")]);
    }
}
