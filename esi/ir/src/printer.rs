//! Implements a formatter for the in-memory representation of modules.
//! The output uses an MLIR-like syntax and is meant for inspection; nothing
//! parses it back.
use crate::structure::{OpIdx, OpKind, ValueIdx};
use crate::{Context, Direction, Module};
use esi_idx::IndexRef;
use itertools::Itertools;
use std::io;

/// Printer for the IR.
pub struct Printer;

impl Printer {
    /// Prints every module of the context, callees first.
    pub fn write_context<F: io::Write>(
        ctx: &Context,
        f: &mut F,
    ) -> io::Result<()> {
        let order = ctx
            .dependency_order()
            .map_err(|e| io::Error::other(e.to_string()))?;
        for name in order {
            if let Some(module) = ctx.get_module(name) {
                Self::write_module(module, f)?;
                writeln!(f)?;
            }
        }
        Ok(())
    }

    fn format_value(module: &Module, value: ValueIdx) -> String {
        match module.value(value).name {
            Some(name) => format!("%{name}"),
            None => format!("%{}", value.index()),
        }
    }

    fn format_values(module: &Module, values: &[ValueIdx]) -> String {
        values
            .iter()
            .map(|v| Self::format_value(module, *v))
            .join(", ")
    }

    fn format_types(module: &Module, values: &[ValueIdx]) -> String {
        values
            .iter()
            .map(|v| module.value_ty(*v).to_string())
            .join(", ")
    }

    /// Formats and writes the module to the formatter.
    pub fn write_module<F: io::Write>(
        module: &Module,
        f: &mut F,
    ) -> io::Result<()> {
        let ports = module
            .ports
            .iter()
            .map(|p| match p.direction {
                Direction::Input => format!("in %{}: {}", p.name, p.ty),
                Direction::Output => format!("out {}: {}", p.name, p.ty),
            })
            .join(", ");
        writeln!(f, "hw.module @{}({}) {{", module.name, ports)?;
        for op in module.body() {
            Self::write_op(module, *op, 2, f)?;
        }
        let outputs = module.outputs();
        if outputs.is_empty() {
            writeln!(f, "  hw.output")?;
        } else {
            writeln!(
                f,
                "  hw.output {} : {}",
                Self::format_values(module, outputs),
                Self::format_types(module, outputs)
            )?;
        }
        writeln!(f, "}}")
    }

    fn write_op<F: io::Write>(
        module: &Module,
        idx: OpIdx,
        indent_level: usize,
        f: &mut F,
    ) -> io::Result<()> {
        let op = module.op(idx);
        write!(f, "{}", " ".repeat(indent_level))?;
        if !op.results.is_empty() {
            write!(f, "{} = ", Self::format_values(module, &op.results))?;
        }
        let operands = Self::format_values(module, &op.operands);
        let mnemonic = op.kind.mnemonic();
        match &op.kind {
            OpKind::Constant(bits) => {
                writeln!(
                    f,
                    "{mnemonic} {bits} : {}",
                    module.value_ty(op.result())
                )
            }
            OpKind::Extract { low } => writeln!(
                f,
                "{mnemonic} {operands} from {low} : ({}) -> {}",
                Self::format_types(module, &op.operands),
                module.value_ty(op.result())
            ),
            OpKind::ICmp(pred) => writeln!(
                f,
                "{mnemonic} {pred} {operands} : {}",
                module.value_ty(op.operands[0])
            ),
            OpKind::StructExtract { field } => writeln!(
                f,
                "{mnemonic} {operands}[\"{field}\"] : {}",
                module.value_ty(op.operands[0])
            ),
            OpKind::Instance { module: callee, name } => writeln!(
                f,
                "{mnemonic} \"{name}\" @{callee}({operands}) : ({}) -> ({})",
                Self::format_types(module, &op.operands),
                Self::format_types(module, &op.results)
            ),
            OpKind::Always { region } => {
                writeln!(f, "{mnemonic} posedge {operands} {{")?;
                Self::write_region(module, region, indent_level, f)
            }
            OpKind::If { region } => {
                writeln!(f, "{mnemonic} {operands} {{")?;
                Self::write_region(module, region, indent_level, f)
            }
            OpKind::Assert { message } => {
                writeln!(f, "{mnemonic} {operands}, \"{message}\"")
            }
            OpKind::Bitcast
            | OpKind::Concat
            | OpKind::Add
            | OpKind::ArraySlice
            | OpKind::ArrayGet
            | OpKind::ArrayCreate
            | OpKind::ArrayConcat
            | OpKind::StructCreate => writeln!(
                f,
                "{mnemonic} {operands} : ({}) -> {}",
                Self::format_types(module, &op.operands),
                module.value_ty(op.result())
            ),
        }
    }

    fn write_region<F: io::Write>(
        module: &Module,
        region: &[OpIdx],
        indent_level: usize,
        f: &mut F,
    ) -> io::Result<()> {
        for op in region {
            Self::write_op(module, *op, indent_level + 2, f)?;
        }
        writeln!(f, "{}}}", " ".repeat(indent_level))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Builder, PortInfo, Type};

    #[test]
    fn prints_ports_and_ops() {
        let mut m = Module::new(
            "adder",
            vec![
                PortInfo::input("a", Type::int(8)),
                PortInfo::output("sum", Type::int(8)),
            ],
        );
        let mut b = Builder::new(&mut m);
        let a = b.arg("a");
        let one = b.constant_int(8, 1);
        let sum = b.add(a, one);
        b.set_name(sum, "sum");
        b.output(&[sum]);

        let mut buf = Vec::new();
        Printer::write_module(&m, &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.starts_with("hw.module @adder(in %a: i8, out sum: i8) {"));
        assert!(text.contains("hw.constant 8'b00000001 : i8"));
        assert!(text.contains("%sum0 = comb.add %a, %1 : (i8, i8) -> i8"));
        assert!(text.contains("hw.output %sum0 : i8"));
    }
}
