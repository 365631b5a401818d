use crate::structure::{OpIdx, Operation, ValueData, ValueDef, ValueIdx};
use crate::types::Type;
use esi_idx::IndexedMap;
use esi_utils::{Id, NameGenerator};
use std::collections::HashSet;

/// Direction of a port from the perspective of the module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Input,
    Output,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortInfo {
    pub name: Id,
    pub direction: Direction,
    pub ty: Type,
}

impl PortInfo {
    pub fn input<S: Into<Id>>(name: S, ty: Type) -> Self {
        Self {
            name: name.into(),
            direction: Direction::Input,
            ty,
        }
    }

    pub fn output<S: Into<Id>>(name: S, ty: Type) -> Self {
        Self {
            name: name.into(),
            direction: Direction::Output,
            ty,
        }
    }
}

/// In memory representation of a circuit module.
///
/// Values and operations live in arenas owned by the module and are referred
/// to by [ValueIdx] and [OpIdx]. Operations in `body` run in order; nested
/// operations hang off the region of their parent.
#[derive(Debug, Clone)]
pub struct Module {
    /// Name of the module.
    pub name: Id,
    /// Ports in declaration order.
    pub ports: Vec<PortInfo>,
    pub(crate) values: IndexedMap<ValueIdx, ValueData>,
    pub(crate) ops: IndexedMap<OpIdx, Operation>,
    /// Top level operations.
    pub(crate) body: Vec<OpIdx>,
    /// One value per input port.
    args: Vec<ValueIdx>,
    /// One value per output port, set by [crate::Builder::output].
    pub(crate) outputs: Vec<ValueIdx>,
    namegen: NameGenerator,
}

impl Module {
    /// Construct an empty module with the given ports.
    ///
    /// # Panics
    /// Panics if two ports share a name.
    pub fn new<S: Into<Id>>(name: S, ports: Vec<PortInfo>) -> Self {
        let mut seen = HashSet::new();
        for port in &ports {
            assert!(
                seen.insert(port.name),
                "Duplicate port `{}'",
                port.name
            );
        }
        let namegen = NameGenerator::with_prev_defined_names(seen);
        let mut values = IndexedMap::new();
        let args = ports
            .iter()
            .filter(|p| p.direction == Direction::Input)
            .enumerate()
            .map(|(idx, p)| {
                values.push(ValueData {
                    ty: p.ty.clone(),
                    def: ValueDef::Arg(idx),
                    name: Some(p.name),
                })
            })
            .collect();
        Self {
            name: name.into(),
            ports,
            values,
            ops: IndexedMap::new(),
            body: Vec::new(),
            args,
            outputs: Vec::new(),
            namegen,
        }
    }

    pub fn input_ports(&self) -> impl Iterator<Item = &PortInfo> {
        self.ports
            .iter()
            .filter(|p| p.direction == Direction::Input)
    }

    pub fn output_ports(&self) -> impl Iterator<Item = &PortInfo> {
        self.ports
            .iter()
            .filter(|p| p.direction == Direction::Output)
    }

    /// The value of the input port `name`.
    pub fn arg<S: AsRef<str>>(&self, name: S) -> Option<ValueIdx> {
        self.input_ports()
            .position(|p| p.name == name.as_ref())
            .map(|idx| self.args[idx])
    }

    pub fn args(&self) -> &[ValueIdx] {
        &self.args
    }

    pub fn outputs(&self) -> &[ValueIdx] {
        &self.outputs
    }

    pub fn body(&self) -> &[OpIdx] {
        &self.body
    }

    pub fn value(&self, idx: ValueIdx) -> &ValueData {
        &self.values[idx]
    }

    pub fn value_ty(&self, idx: ValueIdx) -> &Type {
        &self.values[idx].ty
    }

    pub fn op(&self, idx: OpIdx) -> &Operation {
        &self.ops[idx]
    }

    pub fn num_ops(&self) -> usize {
        self.ops.len()
    }

    /// Operation defining `value`, if it is not a port.
    pub fn defining_op(&self, value: ValueIdx) -> Option<&Operation> {
        match self.values[value].def {
            ValueDef::Result(op, _) => Some(&self.ops[op]),
            ValueDef::Arg(_) => None,
        }
    }

    /// Generate a name unique within this module that starts with `prefix`.
    pub fn generate_name<S: Into<Id>>(&mut self, prefix: S) -> Id {
        self.namegen.gen_name(prefix)
    }

    /// Names of the modules instantiated by this module, in order of first
    /// appearance.
    pub fn instantiated_modules(&self) -> Vec<Id> {
        let mut out: Vec<Id> = Vec::new();
        for op in self.ops.values() {
            if let crate::OpKind::Instance { module, .. } = &op.kind {
                if !out.contains(module) {
                    out.push(*module);
                }
            }
        }
        out
    }
}
