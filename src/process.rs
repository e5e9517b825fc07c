//! External command runner.
//!
//! Every collaborator tool (yt-dlp, demucs, the aligner, ffmpeg, ffprobe) is
//! run through here so that a failing tool's stdout and stderr end up in the
//! error text verbatim.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};
use std::thread;

use thiserror::Error;

// ---------------------------------------------------------------------------
// CommandError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("command not found on PATH: {program}")]
    Missing { program: String },

    #[error("command failed ({status}): {command}{}", output_suffix(.stdout, .stderr))]
    Failed {
        command: String,
        status: String,
        stdout: String,
        stderr: String,
    },

    #[error("could not run {command}: {source}")]
    Io {
        command: String,
        #[source]
        source: std::io::Error,
    },
}

fn output_suffix(stdout: &str, stderr: &str) -> String {
    let mut suffix = String::new();
    let stderr = stderr.trim();
    if !stderr.is_empty() {
        suffix.push_str("\nstderr:\n");
        suffix.push_str(stderr);
    }
    let stdout = stdout.trim();
    if !stdout.is_empty() {
        suffix.push_str("\nstdout:\n");
        suffix.push_str(stdout);
    }
    suffix
}

// ---------------------------------------------------------------------------
// CommandOutput
// ---------------------------------------------------------------------------

/// Decoded output of a successful command.
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
}

// ---------------------------------------------------------------------------
// Runner
// ---------------------------------------------------------------------------

#[must_use]
pub fn command_exists(program: &str) -> bool {
    resolve_program(program).is_some()
}

fn resolve_program(program: &str) -> Option<PathBuf> {
    which::which(program).ok()
}

fn render(program: &str, args: &[String]) -> String {
    if args.is_empty() {
        program.to_owned()
    } else {
        format!("{} {}", program, args.join(" "))
    }
}

/// Run `program` to completion with captured output.
///
/// # Errors
///
/// * [`CommandError::Missing`] when `program` is not on `PATH`.
/// * [`CommandError::Failed`] on a non-zero exit, carrying stdout and stderr.
pub fn run_command(
    program: &str,
    args: &[String],
    cwd: Option<&Path>,
) -> Result<CommandOutput, CommandError> {
    let rendered = render(program, args);
    let mut command = prepare(program, args, cwd)?;
    log::debug!("process: running {rendered}");

    let output = command.output().map_err(|source| CommandError::Io {
        command: rendered.clone(),
        source,
    })?;
    validate(rendered, output)
}

/// Run `program`, streaming `input` to its stdin.
///
/// stdin is fed from a separate thread so a tool that writes a lot of output
/// before draining its input cannot deadlock the pipes.
pub fn run_command_with_input(
    program: &str,
    args: &[String],
    input: Vec<u8>,
) -> Result<CommandOutput, CommandError> {
    let rendered = render(program, args);
    let mut command = prepare(program, args, None)?;
    command.stdin(Stdio::piped());
    log::debug!("process: running {rendered} with {} byte(s) on stdin", input.len());

    let io_err = |source| CommandError::Io {
        command: rendered.clone(),
        source,
    };

    let mut child = command.spawn().map_err(io_err)?;
    let writer = child.stdin.take().map(|mut stdin| {
        thread::spawn(move || {
            // A broken pipe here means the tool exited early; its exit status
            // reports the actual failure.
            let _ = stdin.write_all(&input);
        })
    });

    let output = child.wait_with_output().map_err(io_err)?;
    if let Some(handle) = writer {
        let _ = handle.join();
    }
    validate(rendered, output)
}

fn prepare(program: &str, args: &[String], cwd: Option<&Path>) -> Result<Command, CommandError> {
    let resolved = resolve_program(program).ok_or_else(|| CommandError::Missing {
        program: program.to_owned(),
    })?;

    let mut command = Command::new(resolved);
    command.args(args);
    command.stdin(Stdio::null());
    command.stdout(Stdio::piped());
    command.stderr(Stdio::piped());
    if let Some(dir) = cwd {
        command.current_dir(dir);
    }
    Ok(command)
}

fn validate(rendered: String, output: Output) -> Result<CommandOutput, CommandError> {
    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

    if output.status.success() {
        return Ok(CommandOutput { stdout, stderr });
    }

    let status = match output.status.code() {
        Some(code) => format!("exit status {code}"),
        None => "terminated by signal".to_owned(),
    };
    Err(CommandError::Failed {
        command: rendered,
        status,
        stdout,
        stderr,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
