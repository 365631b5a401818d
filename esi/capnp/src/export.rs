//! Export of one schema file describing every type crossing the cosim
//! boundary, for the software side of the link.
use crate::compiler::SchemaParser;
use crate::emit::format_id;
use crate::hash::{self, ESI_COSIM_SCHEMA_VERSION};
use crate::schema::TypeSchema;
use esi_ir::Type;
use esi_utils::{Error, EsiResult, Id};
use itertools::Itertools;
use std::collections::HashMap;
use std::io::{self, Write};

/// Write a schema file with one struct per distinct type in `types`, in the
/// order types first appear. With `verify`, the written text is compiled
/// again as a self-check.
pub fn export_cosim_schema<F: io::Write>(
    types: &[Type],
    out: &mut F,
    verify: bool,
) -> EsiResult<()> {
    let schemas: Vec<TypeSchema> = types
        .iter()
        .map(|ty| TypeSchema::new(ty.clone()))
        .unique_by(|s| s.ty().clone())
        .collect();

    let mut names: HashMap<Id, &Type> = HashMap::new();
    for schema in &schemas {
        schema.check_supported()?;
        if let Some(other) = names.insert(schema.name(), schema.ty()) {
            return Err(Error::misc(format!(
                "`{other}' and `{}' would both be exported as struct `{}'",
                schema.ty(),
                schema.name()
            )));
        }
    }

    let file_id = hash::fingerprint(
        &schemas
            .iter()
            .map(|s| format!("{:016x}", s.capnp_type_id()))
            .join(""),
    );

    let mut text = Vec::new();
    writeln!(
        text,
        "#########################################################\n\
         ## ESI generated schema. For use with CosimDpi.capnp\n\
         ## Schema version {ESI_COSIM_SCHEMA_VERSION}\n\
         #########################################################\n"
    )?;
    writeln!(text, "{};\n", format_id(file_id))?;
    for schema in &schemas {
        schema.write(&mut text)?;
    }

    if verify {
        let source = std::str::from_utf8(&text)?;
        SchemaParser::parse(source, "cosim.capnp").map_err(|e| {
            Error::internal_schema(format!(
                "exported schema does not compile: {}",
                e.message()
            ))
        })?;
        log::debug!("Exported schema for {} types verified", schemas.len());
    }

    out.write_all(&text)?;
    Ok(())
}
