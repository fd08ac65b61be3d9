use miette::Diagnostic;
use nom_miette::LabeledError;
use thiserror::Error;

use crate::{mass_spec::MassSpecErrorKind, parsers::errors::ReactionErrorKind};

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Clone, Eq, PartialEq, Debug, Diagnostic, Error)]
pub enum Error {
    #[diagnostic(transparent)]
    #[error(transparent)]
    Reaction(#[from] LabeledError<ReactionErrorKind>),

    #[diagnostic(transparent)]
    #[error(transparent)]
    MassSpec(#[from] LabeledError<MassSpecErrorKind>),

    #[diagnostic(help(
        "reactions are only read after a line starting with `// Reactions` (in any case)"
    ))]
    #[error("the network has no `// Reactions` section")]
    SectionNotFound,

    #[diagnostic(help(
        "the converter must emit a `MASS_SPECTROMETRY` line for measurements to be added to"
    ))]
    #[error("the converted FTBL has no MASS_SPECTROMETRY section")]
    MassSpecSectionNotFound,

    #[error("{}", converter_failure(.program, .status, .stderr))]
    ExternalConverter {
        program: String,
        status: Option<i32>,
        stderr: String,
    },

    #[diagnostic(help("check that the converter is installed and on your PATH"))]
    #[error("failed to run the converter {program:?}: {reason}")]
    ConverterSpawn { program: String, reason: String },
}

impl Error {
    pub(crate) fn converter_spawn(program: &str, error: &std::io::Error) -> Self {
        let program = program.to_owned();
        let reason = error.to_string();

        Self::ConverterSpawn { program, reason }
    }
}

fn converter_failure(program: &str, status: &Option<i32>, stderr: &str) -> String {
    let status = status.map_or_else(
        || "was terminated by a signal".to_owned(),
        |code| format!("exited with status {code}"),
    );
    let stderr = stderr.trim_end();
    if stderr.is_empty() {
        format!("the converter {program:?} {status}")
    } else {
        format!("the converter {program:?} {status}:\n{stderr}")
    }
}
