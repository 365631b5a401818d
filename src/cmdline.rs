//! Command line parsing for esic.
use argh::FromArgs;
use esi_ir::{Type, TypeParser};
use esi_utils::{Error, EsiResult, OutputFile};
use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;

/// What to write to the output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmitMode {
    /// A Cap'n Proto schema file describing every type.
    Schema,
    /// A JSON description of where each field lives in a message.
    Layout,
    /// The generated encoder and decoder modules.
    Ir,
}

impl FromStr for EmitMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "schema" => Ok(EmitMode::Schema),
            "layout" => Ok(EmitMode::Layout),
            "ir" => Ok(EmitMode::Ir),
            _ => Err(format!(
                "unknown emit mode `{s}'. Expected one of: schema, layout, ir"
            )),
        }
    }
}

impl Display for EmitMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EmitMode::Schema => write!(f, "schema"),
            EmitMode::Layout => write!(f, "layout"),
            EmitMode::Ir => write!(f, "ir"),
        }
    }
}

#[derive(FromArgs, Debug)]
/// Cap'n Proto schemas and gaskets for ESI channel types.
pub struct Opts {
    /// hardware types, e.g. `!hw.array<4xi16>`
    #[argh(positional)]
    pub types: Vec<String>,

    /// file with one hardware type per line
    #[argh(option, short = 'f', long = "file")]
    pub file: Option<PathBuf>,

    /// what to emit (schema, layout, ir). default = schema
    #[argh(option, short = 'e', long = "emit", default = "EmitMode::Schema")]
    pub emit: EmitMode,

    /// output file, default is stdout
    #[argh(option, short = 'o', long = "output", default = "OutputFile::Stdout")]
    pub output: OutputFile,

    /// logging level
    #[argh(option, long = "log-level", default = "log::LevelFilter::Warn")]
    pub log_level: log::LevelFilter,

    /// do not compile the exported schema again to check it
    #[argh(switch, long = "no-verify")]
    pub no_verify: bool,
}

impl Opts {
    pub fn get_opts() -> Self {
        argh::from_env()
    }

    /// Every type named on the command line or in `--file`, in order.
    pub fn parse_types(&self) -> EsiResult<Vec<Type>> {
        let from_file = match &self.file {
            Some(path) => std::fs::read_to_string(path).map_err(|e| {
                Error::invalid_file(format!("{}: {e}", path.to_string_lossy()))
            })?,
            None => String::new(),
        };
        let types: Vec<Type> = self
            .types
            .iter()
            .map(String::as_str)
            .chain(from_file.lines().map(str::trim))
            .filter(|line| !line.is_empty() && !line.starts_with("//"))
            .map(TypeParser::parse_type)
            .collect::<EsiResult<_>>()?;
        if types.is_empty() {
            return Err(Error::misc(
                "No types given. Pass them as arguments or with --file",
            ));
        }
        Ok(types)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opts(types: &[&str]) -> Opts {
        Opts {
            types: types.iter().map(|s| s.to_string()).collect(),
            file: None,
            emit: EmitMode::Schema,
            output: OutputFile::Null,
            log_level: log::LevelFilter::Off,
            no_verify: false,
        }
    }

    #[test]
    fn emit_modes_round_trip() {
        for mode in [EmitMode::Schema, EmitMode::Layout, EmitMode::Ir] {
            assert_eq!(mode.to_string().parse::<EmitMode>(), Ok(mode));
        }
        assert!("verilog".parse::<EmitMode>().is_err());
    }

    #[test]
    fn types_are_parsed_in_order() {
        let types = opts(&["ui8", "!hw.array<4xi16>"]).parse_types().unwrap();
        assert_eq!(types, vec![Type::uint(8), Type::array(Type::int(16), 4)]);
    }

    #[test]
    fn no_types_is_an_error() {
        assert!(opts(&[]).parse_types().is_err());
        let err = opts(&["ui8", "!hw.nope"]).parse_types().unwrap_err();
        assert!(matches!(err.kind(), esi_utils::ErrorKind::Parse(_)));
    }
}
