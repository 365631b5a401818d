//! A cycle-level evaluator for circuit modules.
//!
//! [Simulator::run] evaluates a module for a single rising clock edge:
//! combinational values are computed on demand, `always` regions whose clock
//! samples high are executed, and failing assertions are recorded instead of
//! aborting the run.
use crate::structure::{ICmpPredicate, OpIdx, OpKind, ValueDef, ValueIdx};
use crate::types::Type;
use crate::{Bits, Context, Module};
use esi_idx::IndexRef;
use esi_utils::{Error, EsiResult, Id};
use std::cmp::Ordering;
use std::collections::HashMap;

/// An assertion that did not hold during a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssertionFailure {
    /// Instance path from the simulated module down to the asserting module.
    pub path: Vec<Id>,
    pub message: String,
}

#[derive(Debug, Clone, Default)]
pub struct SimResult {
    /// Output port values by name.
    pub outputs: HashMap<Id, Bits>,
    pub violations: Vec<AssertionFailure>,
}

impl SimResult {
    /// The value of output port `name`.
    ///
    /// # Panics
    /// Panics if the module has no such output.
    pub fn output<S: AsRef<str>>(&self, name: S) -> &Bits {
        let name = name.as_ref();
        self.outputs
            .get(&Id::new(name))
            .unwrap_or_else(|| panic!("No output named `{name}'"))
    }

    pub fn has_violations(&self) -> bool {
        !self.violations.is_empty()
    }

    /// True if some violation message contains `needle`.
    pub fn violated(&self, needle: &str) -> bool {
        self.violations.iter().any(|v| v.message.contains(needle))
    }
}

/// Evaluates modules of a [Context].
pub struct Simulator<'a> {
    ctx: &'a Context,
}

/// Evaluation state of one module instance.
struct Frame<'m> {
    module: &'m Module,
    values: Vec<Option<Bits>>,
    path: Vec<Id>,
}

impl<'a> Simulator<'a> {
    pub fn new(ctx: &'a Context) -> Self {
        Self { ctx }
    }

    /// Evaluate module `name` with the given input port values.
    pub fn run<S: Into<Id>>(
        &self,
        name: S,
        inputs: &[(&str, Bits)],
    ) -> EsiResult<SimResult> {
        let name = name.into();
        let module = self.ctx.get_module(name).ok_or_else(|| {
            Error::malformed_structure(format!("No module named `{name}'"))
        })?;
        let mut args = Vec::new();
        for port in module.input_ports() {
            let Some((_, val)) = inputs.iter().find(|(n, _)| port.name == *n)
            else {
                return Err(Error::malformed_structure(format!(
                    "No value given for input `{}'",
                    port.name
                )));
            };
            if val.width() != port.ty.bit_width() {
                return Err(Error::malformed_structure(format!(
                    "Input `{}' expects {} bits, got {}",
                    port.name,
                    port.ty.bit_width(),
                    val.width()
                )));
            }
            args.push(val.clone());
        }
        for (n, _) in inputs {
            if !module.input_ports().any(|p| p.name == *n) {
                return Err(Error::malformed_structure(format!(
                    "Module `{name}' has no input `{n}'"
                )));
            }
        }
        let mut violations = Vec::new();
        let outputs = self.eval_module(module, args, vec![name], &mut violations)?;
        let outputs = module
            .output_ports()
            .map(|p| p.name)
            .zip(outputs)
            .collect();
        Ok(SimResult {
            outputs,
            violations,
        })
    }

    fn eval_module(
        &self,
        module: &Module,
        args: Vec<Bits>,
        path: Vec<Id>,
        violations: &mut Vec<AssertionFailure>,
    ) -> EsiResult<Vec<Bits>> {
        let mut frame = Frame {
            module,
            values: vec![None; module.values.len()],
            path,
        };
        for (idx, arg) in module.args().iter().zip(args) {
            frame.values[idx.index()] = Some(arg);
        }
        for op in module.body() {
            self.exec(&mut frame, *op, violations)?;
        }
        module
            .outputs()
            .iter()
            .map(|v| self.value(&mut frame, *v, violations))
            .collect()
    }

    /// Execute an operation for its side effects.
    fn exec(
        &self,
        frame: &mut Frame,
        idx: OpIdx,
        violations: &mut Vec<AssertionFailure>,
    ) -> EsiResult<()> {
        let module = frame.module;
        let op = module.op(idx);
        match &op.kind {
            OpKind::Always { region } => {
                let clock = self.value(frame, op.operands[0], violations)?;
                if clock.bit(0) {
                    for inner in region {
                        self.exec(frame, *inner, violations)?;
                    }
                }
            }
            OpKind::If { region } => {
                let cond = self.value(frame, op.operands[0], violations)?;
                if cond.bit(0) {
                    for inner in region {
                        self.exec(frame, *inner, violations)?;
                    }
                }
            }
            OpKind::Assert { message } => {
                let cond = self.value(frame, op.operands[0], violations)?;
                if !cond.bit(0) {
                    log::trace!("Assertion failed: {message}");
                    violations.push(AssertionFailure {
                        path: frame.path.clone(),
                        message: message.clone(),
                    });
                }
            }
            _ => match op.results.first() {
                Some(res) => {
                    self.value(frame, *res, violations)?;
                }
                // Instances without outputs still run for their assertions.
                None => {
                    let operands = op
                        .operands
                        .iter()
                        .map(|v| self.value(frame, *v, violations))
                        .collect::<EsiResult<Vec<_>>>()?;
                    self.eval_instance(frame, &op.kind, operands, violations)?;
                }
            },
        }
        Ok(())
    }

    fn eval_instance(
        &self,
        frame: &Frame,
        kind: &OpKind,
        operands: Vec<Bits>,
        violations: &mut Vec<AssertionFailure>,
    ) -> EsiResult<Vec<Bits>> {
        let OpKind::Instance { module, name } = kind else {
            return Ok(vec![]);
        };
        let callee = self.ctx.get_module(*module).ok_or_else(|| {
            Error::malformed_structure(format!(
                "Instance `{name}' of undefined module `{module}'"
            ))
        })?;
        let mut path = frame.path.clone();
        path.push(*name);
        self.eval_module(callee, operands, path, violations)
    }

    /// The value of `idx`, evaluating its defining operation if needed.
    fn value(
        &self,
        frame: &mut Frame,
        idx: ValueIdx,
        violations: &mut Vec<AssertionFailure>,
    ) -> EsiResult<Bits> {
        if let Some(v) = &frame.values[idx.index()] {
            return Ok(v.clone());
        }
        let module = frame.module;
        let ValueDef::Result(op_idx, _) = module.value(idx).def else {
            return Err(Error::malformed_structure(format!(
                "Port value {} has not been set",
                idx.index()
            )));
        };
        let op = module.op(op_idx);
        let operands = op
            .operands
            .iter()
            .map(|v| self.value(frame, *v, violations))
            .collect::<EsiResult<Vec<_>>>()?;
        let results = match &op.kind {
            kind @ OpKind::Instance { .. } => {
                self.eval_instance(frame, kind, operands, violations)?
            }
            kind => {
                let ty = module.value_ty(op.result());
                vec![Self::eval_comb(kind, ty, module, &op.operands, &operands)]
            }
        };
        for (res, val) in op.results.iter().zip(results) {
            frame.values[res.index()] = Some(val);
        }
        frame.values[idx.index()]
            .clone()
            .ok_or_else(|| Error::malformed_structure("Operation produced no value"))
    }

    /// Evaluate a combinational operation producing a value of type `ty`.
    fn eval_comb(
        kind: &OpKind,
        ty: &Type,
        module: &Module,
        operand_idxs: &[ValueIdx],
        operands: &[Bits],
    ) -> Bits {
        match kind {
            OpKind::Constant(bits) => bits.clone(),
            OpKind::Bitcast => operands[0].clone(),
            OpKind::Extract { low } => {
                operands[0].slice(*low, ty.bit_width())
            }
            OpKind::Concat => Bits::concat(operands),
            OpKind::Add => operands[0].wrapping_add(&operands[1]),
            OpKind::ICmp(pred) => {
                let ord = operands[0].cmp_unsigned(&operands[1]);
                let res = match pred {
                    ICmpPredicate::Eq => ord == Ordering::Equal,
                    ICmpPredicate::Ne => ord != Ordering::Equal,
                    ICmpPredicate::Ult => ord == Ordering::Less,
                    ICmpPredicate::Ule => ord != Ordering::Greater,
                    ICmpPredicate::Ugt => ord == Ordering::Greater,
                    ICmpPredicate::Uge => ord != Ordering::Less,
                };
                Bits::from_u64(1, res as u64)
            }
            OpKind::ArraySlice | OpKind::ArrayGet => {
                let elem_width = module
                    .value_ty(operand_idxs[0])
                    .as_array()
                    .map(|(e, _)| e.bit_width())
                    .unwrap_or(0);
                let start = operands[1].to_u64().saturating_mul(elem_width);
                // Reads past the end of the array yield zeros.
                operands[0].slice(start, ty.bit_width())
            }
            OpKind::ArrayCreate => Bits::from_elements(operands),
            OpKind::ArrayConcat => {
                let parts: Vec<_> = operands.iter().rev().cloned().collect();
                Bits::from_elements(&parts)
            }
            OpKind::StructExtract { field } => {
                let (offset, fty) = module
                    .value_ty(operand_idxs[0])
                    .field_offset(*field)
                    .map(|(o, t)| (o, t.bit_width()))
                    .unwrap_or((0, 0));
                operands[0].slice(offset, fty)
            }
            OpKind::StructCreate => Bits::concat(operands),
            OpKind::Instance { .. }
            | OpKind::Always { .. }
            | OpKind::If { .. }
            | OpKind::Assert { .. } => {
                unreachable!("`{}' is not combinational", kind.mnemonic())
            }
        }
    }
}
