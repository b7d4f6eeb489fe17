//! Runs one external process synchronously and captures its output.
//!
//! The analyzer is assumed to terminate; there is no timeout, and a hung
//! process blocks the harness indefinitely. There are also no retries,
//! since transient failures are indistinguishable from deterministic ones
//! for a deterministic analyzer.

use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use tracing::debug;

use crate::error::{HarnessError, HarnessErrorKind};

/// One external invocation: executable, ordered arguments, working
/// directory.
#[derive(Debug, Clone)]
pub struct CommandSpec {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub cwd: PathBuf,
}

impl CommandSpec {
    pub fn new(
        program: impl Into<PathBuf>,
        args: Vec<String>,
        cwd: impl Into<PathBuf>,
    ) -> Self {
        Self {
            program: program.into(),
            args,
            cwd: cwd.into(),
        }
    }

    /// The full argv, for error messages and reproduction.
    pub fn argv(&self) -> Vec<String> {
        let mut argv = vec![self.program.display().to_string()];
        argv.extend(self.args.iter().cloned());
        argv
    }

    /// Runs the process to completion, capturing stdout.
    ///
    /// Returns an error if the process cannot be started or exits non-zero;
    /// the error carries the full command line.
    pub fn run(&self) -> Result<CommandOutput, HarnessError> {
        self.run_inner(None)
    }

    /// Runs the process, streaming each stdout line to `consumer` while the
    /// process is still running. The full output is still captured and
    /// returned, so extraction sees exactly what the consumer saw.
    pub fn run_streaming(
        &self,
        consumer: &mut dyn FnMut(&str),
    ) -> Result<CommandOutput, HarnessError> {
        self.run_inner(Some(consumer))
    }

    fn run_inner(
        &self,
        mut consumer: Option<&mut dyn FnMut(&str)>,
    ) -> Result<CommandOutput, HarnessError> {
        debug!(
            program = %self.program.display(),
            args = ?self.args,
            cwd = %self.cwd.display(),
            "running external command"
        );

        let started = Instant::now();
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .current_dir(&self.cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .spawn()
            .map_err(|source| {
                HarnessError::new(HarnessErrorKind::Spawn {
                    args: self.argv(),
                    source,
                })
            })?;

        // stdout is piped above, so take() cannot return None here.
        let mut stdout_pipe = child.stdout.take().ok_or_else(|| {
            HarnessError::new(HarnessErrorKind::Spawn {
                args: self.argv(),
                source: std::io::Error::other("stdout pipe unavailable"),
            })
        })?;

        let mut stdout = String::new();
        match consumer.as_deref_mut() {
            Some(consumer) => {
                let reader = BufReader::new(&mut stdout_pipe);
                for line in reader.lines() {
                    let line = line?;
                    consumer(&line);
                    stdout.push_str(&line);
                    stdout.push('\n');
                }
            }
            None => {
                stdout_pipe.read_to_string(&mut stdout)?;
            }
        }

        let status = child.wait()?;
        let duration = started.elapsed();

        if !status.success() {
            return Err(HarnessError::new(HarnessErrorKind::Process {
                args: self.argv(),
                code: status.code(),
            }));
        }

        debug!(
            program = %self.program.display(),
            duration_ms = duration.as_millis() as u64,
            "command finished"
        );

        Ok(CommandOutput {
            exit_code: status.code().unwrap_or(0),
            stdout,
            duration,
        })
    }
}

/// Result of a successful invocation.
#[derive(Debug)]
pub struct CommandOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub duration: Duration,
}

impl CommandOutput {
    /// Wall-clock time of the invocation in whole milliseconds, as the
    /// harness measured it (not parsed from analyzer output).
    pub fn duration_ms(&self) -> i64 {
        self.duration.as_millis() as i64
    }
}

/// Runs a sequence of opaque build commands in `cwd`, in order, failing on
/// the first non-zero exit. Used for the analyzer's build step.
pub fn run_build_commands(
    commands: &[Vec<String>],
    cwd: &Path,
) -> Result<(), HarnessError> {
    for argv in commands {
        let Some((program, args)) = argv.split_first() else {
            continue;
        };
        let spec = CommandSpec::new(program, args.to_vec(), cwd);
        spec.run()?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sh(script: &str) -> CommandSpec {
        CommandSpec::new(
            "/bin/sh",
            vec!["-c".to_string(), script.to_string()],
            std::env::temp_dir(),
        )
    }

    #[test]
    fn run_captures_stdout_and_duration() {
        let out = sh("printf 'Found 3 races.\\n'").run().unwrap();
        assert_eq!(out.exit_code, 0);
        assert_eq!(out.stdout, "Found 3 races.\n");
        assert!(out.duration_ms() >= 0);
    }

    #[test]
    fn nonzero_exit_is_a_process_error_with_argv() {
        let err = sh("exit 3").run().unwrap_err();
        assert!(err.is_process());
        assert!(
            err.to_string().contains("status 3"),
            "exit code must be reported: {err}"
        );
        assert!(err.to_string().contains("/bin/sh"));
    }

    #[test]
    fn missing_binary_is_a_process_error() {
        let spec = CommandSpec::new(
            "/nonexistent/analyzer",
            vec![],
            std::env::temp_dir(),
        );
        let err = spec.run().unwrap_err();
        assert!(err.is_process());
        assert!(err.to_string().contains("/nonexistent/analyzer"));
    }

    #[test]
    fn streaming_delivers_lines_and_captures_everything() {
        let mut seen = Vec::new();
        let out = sh("printf 'one\\ntwo\\n'")
            .run_streaming(&mut |line| seen.push(line.to_string()))
            .unwrap();
        assert_eq!(seen, vec!["one", "two"]);
        assert_eq!(out.stdout, "one\ntwo\n");
    }

    #[test]
    fn build_commands_stop_at_first_failure() {
        let tmp = tempfile::tempdir().unwrap();
        let commands = vec![
            vec![
                "/bin/sh".to_string(),
                "-c".to_string(),
                "touch first".to_string(),
            ],
            vec!["/bin/sh".to_string(), "-c".to_string(), "exit 1".to_string()],
            vec![
                "/bin/sh".to_string(),
                "-c".to_string(),
                "touch third".to_string(),
            ],
        ];
        let err = run_build_commands(&commands, tmp.path()).unwrap_err();
        assert!(err.is_process());
        assert!(tmp.path().join("first").exists());
        assert!(
            !tmp.path().join("third").exists(),
            "commands after a failure must not run"
        );
    }
}
