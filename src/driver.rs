//! Driver for esic.
use crate::cmdline::{EmitMode, Opts};
use esi_capnp::{GasketCache, TypeSchema, export_cosim_schema};
use esi_ir::{Context, Printer, Type};
use esi_utils::{Error, EsiResult};
use itertools::Itertools;
use std::io::Write;

/// Run esic from the command line.
pub fn run_esic() -> EsiResult<()> {
    let opts = Opts::get_opts();

    env_logger::Builder::new()
        .format_timestamp(None)
        .filter_level(opts.log_level)
        .target(env_logger::Target::Stderr)
        .init();

    let types = opts.parse_types()?;
    let mut out = opts.output.get_write()?;
    let pretty = opts.output.isatty();
    emit(&types, opts.emit, !opts.no_verify, pretty, &mut out)?;
    out.flush()?;
    Ok(())
}

/// Write what `mode` asks for about `types`. JSON is indented when `pretty`.
pub fn emit<W: Write>(
    types: &[Type],
    mode: EmitMode,
    verify: bool,
    pretty: bool,
    out: &mut W,
) -> EsiResult<()> {
    match mode {
        EmitMode::Schema => export_cosim_schema(types, out, verify),
        EmitMode::Layout => {
            let reports = types
                .iter()
                .map(|ty| TypeSchema::new(ty.clone()))
                .unique_by(|s| s.ty().clone())
                .map(|s| s.layout())
                .collect::<EsiResult<Vec<_>>>()?;
            if pretty {
                serde_json::to_writer_pretty(&mut *out, &reports)
            } else {
                serde_json::to_writer(&mut *out, &reports)
            }
            .map_err(|e| Error::write_error(e.to_string()))?;
            writeln!(out)?;
            Ok(())
        }
        EmitMode::Ir => {
            let cache = GasketCache::new();
            let mut ctx = Context::new();
            for ty in types {
                cache.encoder_module(&mut ctx, ty)?;
                cache.decoder_module(&mut ctx, ty)?;
            }
            log::info!("Generated {} modules", ctx.len());
            Printer::write_context(&ctx, out)?;
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn emit_str(types: &[Type], mode: EmitMode) -> String {
        let mut out = Vec::new();
        emit(types, mode, true, false, &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn layout_is_json() {
        let text = emit_str(&[Type::uint(8), Type::uint(8)], EmitMode::Layout);
        let json: serde_json::Value = serde_json::from_str(&text).unwrap();
        let reports = json.as_array().unwrap();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0]["name"], "Ui8");
        assert_eq!(reports[0]["size"], 128);
        assert_eq!(reports[0]["fields"][0]["section"], "data");
    }

    #[test]
    fn ir_has_both_directions() {
        let text = emit_str(&[Type::array(Type::int(16), 4)], EmitMode::Ir);
        assert!(text.contains("encodeArrayOf4xI16"));
        assert!(text.contains("decodeArrayOf4xI16"));
    }

    #[test]
    fn unsupported_types_fail() {
        let mut out = Vec::new();
        let err = emit(&[Type::int(65)], EmitMode::Ir, true, false, &mut out).unwrap_err();
        assert!(err.is_unsupported_type());
    }
}
