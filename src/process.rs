use std::path::Path;
use std::process::{Command, Output, Stdio};
use std::time::{Duration, Instant};

use crate::error::{PackError, PackResult};

/// Captured result of a successful external tool invocation.
#[derive(Debug)]
pub struct ToolRun {
    pub output: Output,
    pub elapsed: Duration,
}

impl ToolRun {
    #[must_use]
    pub fn stdout_lossy(&self) -> String {
        String::from_utf8_lossy(&self.output.stdout).into_owned()
    }

    #[must_use]
    pub fn elapsed_ms(&self) -> u64 {
        saturating_duration_ms(self.elapsed)
    }
}

#[must_use]
pub fn command_exists(program: &str) -> bool {
    which::which(program).is_ok()
}

/// Run `program` to completion and time it.
///
/// Blocks until the child exits. There is no timeout: a hung tool hangs the
/// caller.
pub fn run_command(program: &str, args: &[String], cwd: Option<&Path>) -> PackResult<ToolRun> {
    if !command_exists(program) {
        return Err(PackError::CommandMissing {
            command: program.to_owned(),
        });
    }

    let rendered = format!("{} {}", program, args.join(" "));
    let mut command = Command::new(program);
    command.args(args);
    command.stdin(Stdio::null());
    command.stdout(Stdio::piped());
    command.stderr(Stdio::piped());
    if let Some(dir) = cwd {
        command.current_dir(dir);
    }

    tracing::debug!(command = %rendered, "spawning external tool");
    let started_at = Instant::now();
    let output = command.output()?;
    let elapsed = started_at.elapsed();

    let output = validate_command_output(&rendered, output)?;
    Ok(ToolRun { output, elapsed })
}

/// First line of `<program> -version`, e.g. `ffmpeg version 7.1 Copyright ...`.
pub fn tool_version(program: &str) -> PackResult<String> {
    let run = run_command(program, &["-version".to_owned()], None)?;
    let stdout = run.stdout_lossy();
    Ok(stdout.lines().next().unwrap_or_default().trim().to_owned())
}

fn validate_command_output(rendered: &str, output: Output) -> PackResult<Output> {
    if output.status.success() {
        return Ok(output);
    }

    let status = output.status.code().unwrap_or(-1);
    let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
    Err(PackError::from_command_failure(
        rendered.to_owned(),
        status,
        stderr,
    ))
}

pub(crate) fn saturating_duration_ms(duration: Duration) -> u64 {
    duration.as_millis().try_into().unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use std::os::unix::process::ExitStatusExt;
    use std::process::ExitStatus;
    use std::time::Duration;

    use super::{
        command_exists, run_command, saturating_duration_ms, tool_version,
        validate_command_output,
    };
    use crate::error::PackError;

    fn fake_output(code: i32, stderr: &str) -> std::process::Output {
        std::process::Output {
            status: ExitStatus::from_raw(code << 8),
            stdout: Vec::new(),
            stderr: stderr.as_bytes().to_vec(),
        }
    }

    #[test]
    fn run_command_succeeds_for_true() {
        let run = run_command("true", &[], None).expect("true should succeed");
        assert!(run.output.status.success());
    }

    #[test]
    fn run_command_records_elapsed_time() {
        let run = run_command("sleep", &["0.05".to_owned()], None).expect("sleep");
        assert!(run.elapsed >= Duration::from_millis(40), "{:?}", run.elapsed);
        assert!(run.elapsed_ms() >= 40);
    }

    #[test]
    fn run_command_missing_program_returns_command_missing() {
        let err = run_command("nonexistent_binary_xyz_12345", &[], None)
            .expect_err("nonexistent binary should fail");
        assert!(
            matches!(err, PackError::CommandMissing { .. }),
            "expected CommandMissing, got: {err:?}"
        );
    }

    #[test]
    fn run_command_nonzero_exit_returns_command_failed() {
        let err = run_command("false", &[], None).expect_err("false should fail");
        assert!(matches!(err, PackError::CommandFailed { .. }), "{err:?}");
    }

    #[test]
    fn run_command_failure_carries_program_args_and_stderr() {
        let err = run_command("ls", &["/nonexistent_path_xyz_99999".to_owned()], None)
            .expect_err("ls on nonexistent should fail");
        let text = err.to_string();
        assert!(text.contains("ls /nonexistent_path_xyz_99999"), "{text}");
        assert!(
            text.contains("No such file") || text.contains("nonexistent_path"),
            "expected stderr content, got: {text}"
        );
    }

    #[test]
    fn run_command_with_cwd() {
        let dir = tempfile::tempdir().expect("tempdir");
        let run = run_command("pwd", &[], Some(dir.path())).expect("pwd should succeed");
        let stdout = run.stdout_lossy();
        assert!(
            stdout.contains(dir.path().to_str().unwrap()),
            "expected cwd in stdout, got: {stdout}"
        );
    }

    #[test]
    fn run_command_with_args() {
        let run = run_command("echo", &["hello".to_owned(), "world".to_owned()], None)
            .expect("echo should succeed");
        assert!(run.stdout_lossy().contains("hello world"));
    }

    #[test]
    fn tool_version_returns_first_line() {
        let dir = tempfile::tempdir().expect("tempdir");
        let script = dir.path().join("fake_tool.sh");
        std::fs::write(
            &script,
            "#!/bin/sh\necho 'faketool version 9.9'\necho 'built with nothing'\n",
        )
        .expect("write");
        {
            use std::os::unix::fs::PermissionsExt;
            let mut perms = std::fs::metadata(&script).unwrap().permissions();
            perms.set_mode(0o755);
            std::fs::set_permissions(&script, perms).unwrap();
        }
        let version = tool_version(script.to_str().unwrap()).expect("version");
        assert_eq!(version, "faketool version 9.9");
    }

    #[test]
    fn command_exists_true_for_known_binary() {
        assert!(command_exists("ls"));
        assert!(command_exists("true"));
    }

    #[test]
    fn command_exists_false_for_absent_binary() {
        assert!(!command_exists("definitely_not_a_real_binary_abc_xyz_99999"));
    }

    #[test]
    fn validate_command_output_success_returns_ok() {
        assert!(validate_command_output("cmd", fake_output(0, "")).is_ok());
    }

    #[test]
    fn validate_command_output_preserves_exit_code_in_error() {
        let err = validate_command_output("my-tool --flag", fake_output(42, "exit code 42"))
            .unwrap_err();
        let text = err.to_string();
        assert!(text.contains("42"), "{text}");
        assert!(text.contains("my-tool --flag"), "{text}");
    }

    #[test]
    fn validate_command_output_empty_stderr_still_fails_on_nonzero() {
        assert!(validate_command_output("cmd", fake_output(2, "")).is_err());
    }

    #[test]
    fn validate_command_output_signal_terminated_uses_negative_one() {
        let output = std::process::Output {
            status: ExitStatus::from_raw(9),
            stdout: Vec::new(),
            stderr: b"killed".to_vec(),
        };
        let text = validate_command_output("signaled-cmd", output)
            .unwrap_err()
            .to_string();
        assert!(text.contains("-1"), "{text}");
    }

    #[test]
    fn saturating_duration_ms_cases() {
        assert_eq!(saturating_duration_ms(Duration::ZERO), 0);
        assert_eq!(saturating_duration_ms(Duration::from_millis(1234)), 1234);
        assert_eq!(saturating_duration_ms(Duration::from_secs(u64::MAX)), u64::MAX);
    }
}
