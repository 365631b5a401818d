//! Circuit IR used by the gasket generators: hardware types, modules made of
//! typed operations, a builder, a printer and a simulator for testing
//! generated circuits.
mod bits;
mod builder;
mod context;
mod module;
mod printer;
mod sim;
mod structure;
mod type_parser;
mod types;

pub use bits::Bits;
pub use builder::{Block, Builder};
pub use context::Context;
pub use module::{Direction, Module, PortInfo};
pub use printer::Printer;
pub use sim::{AssertionFailure, SimResult, Simulator};
pub use structure::{
    ICmpPredicate, OpIdx, OpKind, Operation, ValueData, ValueDef, ValueIdx,
};
pub use type_parser::TypeParser;
pub use types::{FieldInfo, Signedness, Type, array_index_width};
