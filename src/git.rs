use failure::{Error, ResultExt};
use std::ffi::OsString;
use std::io::Read;
use std::path::Path;
use std::process::{Command, ExitStatus, Stdio};

/// The operations needed to keep a working copy in sync with its remote.
pub trait Vcs {
    /// Create a fresh working copy of `url` at `dest_dir`.
    fn clone_repo(&self, url: &str, dest_dir: &Path) -> Outcome;

    /// Bring an existing working copy up to date.
    fn update(&self, dest_dir: &Path) -> Outcome;
}

/// What happened when a version control command was run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Success,
    /// The command failed, along with whatever it printed.
    Failure(String),
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        *self == Outcome::Success
    }

    fn from_output(status: ExitStatus, output: &[u8]) -> Outcome {
        trace!("Exit Status: {}", status);

        if status.success() {
            return Outcome::Success;
        }

        let diagnostics = String::from_utf8_lossy(output);
        let diagnostics = diagnostics.trim();

        if diagnostics.is_empty() {
            Outcome::Failure(format!("exited with {}", status))
        } else {
            Outcome::Failure(diagnostics.to_string())
        }
    }

    fn from_error(err: &Error) -> Outcome {
        let msg = err
            .iter_chain()
            .map(|cause| cause.to_string())
            .collect::<Vec<_>>()
            .join(": ");

        Outcome::Failure(msg)
    }
}

/// Shells out to the `git` executable.
#[derive(Debug, Clone, PartialEq)]
pub struct Git {
    program: OsString,
}

impl Git {
    pub fn new() -> Git {
        Git::with_program("git")
    }

    pub fn with_program<S: Into<OsString>>(program: S) -> Git {
        Git {
            program: program.into(),
        }
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.stdin(Stdio::null()).env("GIT_TERMINAL_PROMPT", "0");
        cmd
    }

    fn run(&self, cmd: Command) -> Outcome {
        debug!("Running {:?}", cmd);

        match self.run_combined(cmd) {
            Ok((status, output)) => Outcome::from_output(status, &output),
            Err(e) => Outcome::from_error(&e),
        }
    }

    /// Run the command with stdout and stderr sharing one pipe, so the
    /// output reads in the order it was written.
    fn run_combined(
        &self,
        mut cmd: Command,
    ) -> Result<(ExitStatus, Vec<u8>), Error> {
        let (mut reader, writer) =
            os_pipe::pipe().context("Unable to create a pipe")?;
        let writer_clone =
            writer.try_clone().context("Unable to create a pipe")?;
        cmd.stdout(writer).stderr(writer_clone);

        let mut child = cmd.spawn().with_context(|_| {
            format!("Unable to invoke {}", self.program.to_string_lossy())
        })?;
        // The command still holds the write ends, reading won't hit EOF
        // until they are closed.
        drop(cmd);

        let mut output = Vec::new();
        reader
            .read_to_end(&mut output)
            .context("Unable to read the command's output")?;
        let status = child.wait().context("Unable to wait for the command")?;

        Ok((status, output))
    }
}

impl Default for Git {
    fn default() -> Git {
        Git::new()
    }
}

impl Vcs for Git {
    fn clone_repo(&self, url: &str, dest_dir: &Path) -> Outcome {
        let mut cmd = self.command();
        cmd.arg("clone").arg(url).arg(dest_dir);

        self.run(cmd)
    }

    fn update(&self, dest_dir: &Path) -> Outcome {
        let mut cmd = self.command();
        cmd.arg("-C").arg(dest_dir).arg("pull").arg("--rebase");

        self.run(cmd)
    }
}
