use std::env;
use std::io::Read;
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};

use arboard::Clipboard;
use chrono::{DateTime, Local};
use tracing::debug;

use crate::error::ProviderError;

/// Clock source for date/time variables; injectable for tests.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Local>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }
}

/// System clipboard access for `#{clipboard}`.
pub trait ClipboardProvider: Send + Sync {
    fn read_text(&self) -> Result<String, ProviderError>;
    fn write_text(&self, text: &str) -> Result<(), ProviderError>;
}

pub struct SystemClipboard;

impl ClipboardProvider for SystemClipboard {
    fn read_text(&self) -> Result<String, ProviderError> {
        let mut clipboard = Clipboard::new().map_err(|e| ProviderError(e.to_string()))?;
        clipboard.get_text().map_err(|e| ProviderError(e.to_string()))
    }

    fn write_text(&self, text: &str) -> Result<(), ProviderError> {
        let mut clipboard = Clipboard::new().map_err(|e| ProviderError(e.to_string()))?;
        clipboard
            .set_text(text)
            .map_err(|e| ProviderError(e.to_string()))
    }
}

/// Environment lookup for `#{envVar:...}`.
pub trait EnvProvider: Send + Sync {
    fn get(&self, name: &str) -> Option<String>;
}

pub struct SystemEnv;

impl EnvProvider for SystemEnv {
    fn get(&self, name: &str) -> Option<String> {
        env::var(name).ok()
    }
}

/// Captured result of a `#{shell:...}` command.
#[derive(Debug, Clone)]
pub struct ScriptOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: Option<i32>,
}

impl ScriptOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Runs `#{shell:...}` commands with a bounded wait.
pub trait ScriptRunner: Send + Sync {
    fn run(&self, command: &str, timeout: Duration) -> Result<ScriptOutput, ProviderError>;
}

/// Executes commands through the user's shell (`cmd /C` on Windows).
pub struct ShellScriptRunner;

impl ScriptRunner for ShellScriptRunner {
    fn run(&self, command: &str, timeout: Duration) -> Result<ScriptOutput, ProviderError> {
        debug!(command, "running shell variable");
        let mut child = spawn_shell(command).map_err(|e| ProviderError(e.to_string()))?;

        let deadline = Instant::now() + timeout;
        loop {
            match child.try_wait() {
                Ok(Some(status)) => {
                    let (stdout, stderr) = drain_output(&mut child);
                    return Ok(ScriptOutput {
                        stdout,
                        stderr,
                        exit_code: status.code(),
                    });
                }
                Ok(None) => {
                    if Instant::now() >= deadline {
                        let _ = child.kill();
                        let _ = child.wait();
                        return Err(ProviderError(format!(
                            "command timed out after {}ms",
                            timeout.as_millis()
                        )));
                    }
                    std::thread::sleep(Duration::from_millis(10));
                }
                Err(err) => return Err(ProviderError(err.to_string())),
            }
        }
    }
}

fn spawn_shell(command: &str) -> std::io::Result<Child> {
    #[cfg(target_os = "windows")]
    let mut cmd = {
        let mut cmd = Command::new("cmd");
        cmd.args(["/C", command]);
        cmd
    };

    #[cfg(not(target_os = "windows"))]
    let mut cmd = {
        let shell = env::var("SHELL").unwrap_or_else(|_| "/bin/sh".to_string());
        let mut cmd = Command::new(shell);
        cmd.args(["-c", command]);
        cmd
    };

    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
}

fn drain_output(child: &mut Child) -> (String, String) {
    let mut stdout = String::new();
    let mut stderr = String::new();
    if let Some(mut pipe) = child.stdout.take() {
        let _ = pipe.read_to_string(&mut stdout);
    }
    if let Some(mut pipe) = child.stderr.take() {
        let _ = pipe.read_to_string(&mut stderr);
    }
    (stdout, stderr)
}

/// Interactive prompt for `#{input:...}`; `Ok(None)` means the user
/// cancelled.
pub trait PromptProvider: Send + Sync {
    fn prompt(&self, label: &str, default: Option<&str>) -> Result<Option<String>, ProviderError>;
}

/// Placeholder prompt for embeddings without a UI collaborator; always
/// cancels, so `#{input:...}` combos abort cleanly.
pub struct NoPrompt;

impl PromptProvider for NoPrompt {
    fn prompt(&self, _label: &str, _default: Option<&str>) -> Result<Option<String>, ProviderError> {
        Ok(None)
    }
}

/// Bundle of collaborators the template evaluator resolves variables
/// against.
pub struct VariableProviders {
    pub clipboard: Box<dyn ClipboardProvider>,
    pub clock: Box<dyn Clock>,
    pub env: Box<dyn EnvProvider>,
    pub scripts: Box<dyn ScriptRunner>,
    pub prompt: Box<dyn PromptProvider>,
}

impl VariableProviders {
    /// OS-backed providers; the prompt still needs a UI collaborator.
    pub fn system() -> Self {
        Self {
            clipboard: Box::new(SystemClipboard),
            clock: Box::new(SystemClock),
            env: Box::new(SystemEnv),
            scripts: Box::new(ShellScriptRunner),
            prompt: Box::new(NoPrompt),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[cfg(unix)]
    #[test]
    fn shell_runner_captures_stdout_and_exit_code() {
        let out = ShellScriptRunner
            .run("echo hello", Duration::from_secs(5))
            .unwrap();
        assert!(out.success());
        assert_eq!(out.stdout.trim_end(), "hello");
    }

    #[cfg(unix)]
    #[test]
    fn shell_runner_reports_nonzero_exit() {
        let out = ShellScriptRunner
            .run("exit 3", Duration::from_secs(5))
            .unwrap();
        assert!(!out.success());
        assert_eq!(out.exit_code, Some(3));
    }

    #[cfg(unix)]
    #[test]
    fn shell_runner_kills_on_timeout() {
        let err = ShellScriptRunner
            .run("sleep 10", Duration::from_millis(100))
            .unwrap_err();
        assert!(err.0.contains("timed out"));
    }

    #[cfg(unix)]
    #[test]
    fn shell_runner_executes_script_files() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "#!/bin/sh").unwrap();
        writeln!(file, "echo from-script").unwrap();
        file.flush().unwrap();
        let command = format!("sh {}", file.path().display());
        let out = ShellScriptRunner.run(&command, Duration::from_secs(5)).unwrap();
        assert!(out.success());
        assert_eq!(out.stdout.trim_end(), "from-script");
    }

    #[test]
    fn system_env_reads_the_process_environment() {
        env::set_var("COMBOFLOW_TEST_VAR", "42");
        assert_eq!(SystemEnv.get("COMBOFLOW_TEST_VAR").as_deref(), Some("42"));
        assert_eq!(SystemEnv.get("COMBOFLOW_MISSING_VAR"), None);
    }
}
