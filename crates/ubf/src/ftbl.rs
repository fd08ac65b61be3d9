//! The boundary with the external FTBL converter, and the splicing of measurements into its output

use std::{
    io::{self, Write},
    process::{Command, Stdio},
    thread,
};

use itertools::Itertools;
use log::{info, warn};

use crate::{Error, MassSpecSection, Result};

/// The header line of the FTBL section holding mass-spectrometry measurements
pub const MASS_SPECTROMETRY: &str = "MASS_SPECTROMETRY";
pub const MASS_SPECTROMETRY_COLUMNS: &str = "\tMETA_NAME\tFRAGMENT\tWEIGHT\tVALUE\tDEVIATION";

/// Turns compiled network text into a full FTBL file
pub trait Converter {
    /// # Errors
    ///
    /// Returns an error if the text could not be converted. Conversion is deterministic, so failures are never
    /// retried.
    fn convert(&self, txt: &str) -> Result<String>;
}

impl<F: Fn(&str) -> Result<String>> Converter for F {
    fn convert(&self, txt: &str) -> Result<String> {
        self(txt)
    }
}

/// A converter program that reads the compiled text on its stdin and writes the FTBL to its stdout
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct ExternalConverter {
    program: String,
    args: Vec<String>,
}

impl ExternalConverter {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }
}

impl Converter for ExternalConverter {
    fn convert(&self, txt: &str) -> Result<String> {
        info!("running the converter {:?}", self.program);
        let spawn_error = |e: &io::Error| Error::converter_spawn(&self.program, e);

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| spawn_error(&e))?;

        // NOTE: stdin is written from another thread while stdout and stderr are drained, otherwise a converter that
        // fills its output pipe before reading all of its input would never finish
        let stdin = child.stdin.take();
        let (written, output) = thread::scope(|scope| {
            let writer = scope.spawn(move || match stdin {
                Some(mut stdin) => stdin.write_all(txt.as_bytes()),
                None => Ok(()),
            });
            let output = child.wait_with_output();
            let written = writer
                .join()
                .unwrap_or_else(|_| Err(io::Error::other("the stdin writer panicked")));
            (written, output)
        });

        let output = output.map_err(|e| spawn_error(&e))?;
        let stderr = String::from_utf8_lossy(&output.stderr);
        if !output.status.success() {
            return Err(Error::ExternalConverter {
                program: self.program.clone(),
                status: output.status.code(),
                stderr: stderr.into_owned(),
            });
        }
        written.map_err(|e| spawn_error(&e))?;

        for line in stderr.lines().filter(|line| !line.trim().is_empty()) {
            warn!("{}: {line}", self.program);
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Inserts the rows of `section` into the `MASS_SPECTROMETRY` section of `ftbl`, replacing any rows already there
///
/// # Errors
///
/// Fails if `ftbl` has no `MASS_SPECTROMETRY` line.
pub fn splice_mass_spec(ftbl: &str, section: &MassSpecSection) -> Result<String> {
    let lines: Vec<_> = ftbl.lines().collect();
    let header = lines
        .iter()
        .position(|line| line.trim_end() == MASS_SPECTROMETRY)
        .ok_or(Error::MassSpecSectionNotFound)?;

    // The header is followed by a line of column names, then (possibly) placeholder rows
    let rows_start = (header + 2).min(lines.len());
    let placeholders = lines[rows_start..]
        .iter()
        .take_while(|line| line.starts_with('\t'))
        .count();
    let rows_end = rows_start + placeholders;

    let rows = section.rows().collect_vec();
    info!(
        "replaced {placeholders} placeholder rows with {} measurement rows",
        rows.len()
    );

    let mut spliced = lines[..rows_start]
        .iter()
        .copied()
        .chain(rows.iter().map(String::as_str))
        .chain(lines[rows_end..].iter().copied())
        .join("\n");
    if ftbl.ends_with('\n') {
        spliced.push('\n');
    }
    Ok(spliced)
}
