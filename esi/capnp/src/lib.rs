//! Cap'n Proto gaskets for ESI channels.
//!
//! Given a hardware type, this crate derives a Cap'n Proto schema for it and
//! synthesizes circuits converting between the packed hardware value and a
//! canonical single-segment Cap'n Proto message:
//! * [TypeSchema] derives the schema, its ID and the encoded message size.
//! * [build_encoder] and [build_decoder] generate the converter modules.
//! * [GasketCache] shares one encoder and one decoder per type between all
//!   use sites in a [esi_ir::Context].
//! * [export_cosim_schema] writes the schema file consumed by software.
mod cache;
pub mod compiler;
mod decoder;
mod emit;
mod encoder;
mod export;
mod gasket;
pub mod hash;
mod schema;
mod segment;

pub use cache::GasketCache;
pub use decoder::{build_decoder, decoder_name};
pub use emit::{capnp_type, format_id};
pub use encoder::{build_encoder, encoder_name};
pub use export::export_cosim_schema;
pub use schema::{FieldLayout, LayoutReport, Section, TypeSchema};
