use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use crate::directory::{DirectoryError, SessionDirectory, SessionManager, SessionManagerFactory};

/// Thin wrapper over the `tmux` binary, optionally bound to a socket.
#[derive(Debug, Clone, Default)]
pub struct TmuxClient {
    socket: Option<PathBuf>,
    binary: Option<PathBuf>,
}

impl TmuxClient {
    /// Client for the default tmux server.
    pub fn new() -> Self {
        Self::default()
    }

    /// Client for the tmux server listening on `socket`.
    pub fn with_socket(socket: impl Into<PathBuf>) -> Self {
        Self {
            socket: Some(socket.into()),
            binary: None,
        }
    }

    /// Use a specific tmux executable instead of the one on `$PATH`.
    pub fn with_binary(mut self, binary: impl Into<PathBuf>) -> Self {
        self.binary = Some(binary.into());
        self
    }

    fn command(&self, args: &[&str]) -> Command {
        let mut cmd = Command::new(self.binary.as_deref().unwrap_or(Path::new("tmux")));
        if let Some(socket) = &self.socket {
            cmd.arg("-S").arg(socket);
        }
        cmd.args(args);
        cmd
    }

    fn run(&self, args: &[&str]) -> Result<Output, DirectoryError> {
        tracing::trace!(?args, socket = ?self.socket, "running tmux");
        self.command(args).output().map_err(DirectoryError::Spawn)
    }

    fn run_checked(&self, args: &[&str]) -> Result<Output, DirectoryError> {
        let output = self.run(args)?;
        if !output.status.success() {
            return Err(command_failed(args, &output));
        }
        Ok(output)
    }
}

fn command_failed(args: &[&str], output: &Output) -> DirectoryError {
    DirectoryError::CommandFailed {
        command: format!("tmux {}", args.join(" ")),
        stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
    }
}

/// True if tmux failed only because no server is listening, which means
/// there are no sessions. Any other socket error (permissions, bad path
/// type) must surface, or an unreadable server would look empty.
fn is_no_server(stderr: &str) -> bool {
    stderr.lines().any(|line| {
        line.starts_with("no server running")
            || (line.starts_with("error connecting to")
                && (line.ends_with("(No such file or directory)")
                    || line.ends_with("(Connection refused)")))
    })
}

/// Exact-match target, so `foo` doesn't resolve to `foobar`.
fn exact(name: &str) -> String {
    format!("={name}")
}

pub(crate) fn parse_session_list(stdout: &str, prefix: &str) -> Vec<String> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && line.starts_with(prefix))
        .map(str::to_string)
        .collect()
}

impl SessionDirectory for TmuxClient {
    fn session_exists(&self, name: &str) -> Result<bool, DirectoryError> {
        let target = exact(name);
        let output = self.run(&["has-session", "-t", &target])?;
        if output.status.success() {
            return Ok(true);
        }
        let stderr = String::from_utf8_lossy(&output.stderr);
        if is_no_server(&stderr) || stderr.contains("can't find session") {
            return Ok(false);
        }
        Err(command_failed(&["has-session", "-t", &target], &output))
    }

    fn list_sessions(&self, prefix: &str) -> Result<Vec<String>, DirectoryError> {
        let args = ["list-sessions", "-F", "#{session_name}"];
        let output = self.run(&args)?;
        if !output.status.success() {
            if is_no_server(&String::from_utf8_lossy(&output.stderr)) {
                return Ok(Vec::new());
            }
            return Err(command_failed(&args, &output));
        }
        Ok(parse_session_list(
            &String::from_utf8_lossy(&output.stdout),
            prefix,
        ))
    }
}

impl SessionManager for TmuxClient {
    fn create_session(&self, name: &str) -> Result<(), DirectoryError> {
        self.run_checked(&["new-session", "-d", "-s", name])?;
        Ok(())
    }

    fn kill_session(&self, name: &str) -> Result<(), DirectoryError> {
        self.run_checked(&["kill-session", "-t", &exact(name)])?;
        Ok(())
    }
}

/// Binds [`TmuxClient`]s to arbitrary sockets.
#[derive(Debug, Clone, Default)]
pub struct TmuxFactory {
    binary: Option<PathBuf>,
}

impl TmuxFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind clients that run `binary` instead of the `tmux` on `$PATH`.
    pub fn with_binary(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: Some(binary.into()),
        }
    }
}

impl SessionManagerFactory for TmuxFactory {
    fn bind(&self, transport: &Path) -> Result<Box<dyn SessionManager>, DirectoryError> {
        if let Some(parent) = transport.parent().filter(|p| !p.as_os_str().is_empty()) {
            if !parent.is_dir() {
                return Err(DirectoryError::Unavailable(format!(
                    "socket directory {} does not exist",
                    parent.display()
                )));
            }
        }
        let mut client = TmuxClient::with_socket(transport);
        if let Some(binary) = &self.binary {
            client = client.with_binary(binary);
        }
        Ok(Box::new(client))
    }
}
