use anyhow::{Context, Result};
use std::fmt::Display;
use std::io::{self, Stderr, Stdout, Write};
use std::process::ExitCode;

use crate::credentials::CredentialBundle;
use crate::sts::ExchangeFailure;

/// Process exit status for the outcomes automation can rely on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    Success,
    AuthorizationFailure,
    MissingCredentials,
}

impl ExitStatus {
    pub fn code(self) -> u8 {
        match self {
            ExitStatus::Success => 0,
            ExitStatus::AuthorizationFailure => 2,
            ExitStatus::MissingCredentials => 3,
        }
    }
}

impl From<ExitStatus> for ExitCode {
    fn from(status: ExitStatus) -> Self {
        ExitCode::from(status.code())
    }
}

/// Sends status lines, credentials and errors to the right place.
///
/// With `machine_readable` set, status lines are dropped and standard output only
/// ever carries the credentials JSON. Errors are always written.
pub struct Router<O, E> {
    out: O,
    err: E,
    machine_readable: bool,
}

impl Router<Stdout, Stderr> {
    pub fn stdio(machine_readable: bool) -> Self {
        Self::new(io::stdout(), io::stderr(), machine_readable)
    }
}

impl<O: Write, E: Write> Router<O, E> {
    pub fn new(out: O, err: E, machine_readable: bool) -> Self {
        Self {
            out,
            err,
            machine_readable,
        }
    }

    pub fn machine_readable(&self) -> bool {
        self.machine_readable
    }

    pub fn status(&mut self, line: impl Display) -> Result<()> {
        if self.machine_readable {
            return Ok(());
        }
        writeln!(self.out, "{line}").context("Failed to write to stdout")
    }

    /// Emits `creds` as a single JSON line.
    pub fn credentials(&mut self, creds: &CredentialBundle) -> Result<()> {
        serde_json::to_writer(&mut self.out, creds).context("Failed to serialize credentials")?;
        writeln!(self.out).context("Failed to write to stdout")?;
        self.out.flush().context("Failed to write to stdout")
    }

    /// Reports `failure` and returns the exit status it maps to.
    pub fn failure(&mut self, failure: &ExchangeFailure) -> Result<ExitStatus> {
        writeln!(self.err, "Error: {failure}").context("Failed to write to stderr")?;
        Ok(match failure {
            ExchangeFailure::Authorization { .. } => ExitStatus::AuthorizationFailure,
            ExchangeFailure::MissingCredentials { .. } => ExitStatus::MissingCredentials,
        })
    }

    pub fn into_inner(self) -> (O, E) {
        (self.out, self.err)
    }
}
