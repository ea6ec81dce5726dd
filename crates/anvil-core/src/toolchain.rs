//! External toolchain invocation.
//!
//! Runs `arduino-cli` (or a compatible program) as a subprocess. Output is
//! captured up to a fixed bound per stream; exit status alone decides success.
//!
//! The toolchain starts helper processes of its own (gcc, avrdude). On unix
//! each invocation gets its own process group, and the whole group is killed
//! once the invocation is over, however it ended. Nothing it started can keep
//! writing into a workspace after the call returns.

use std::ffi::OsStr;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;

use crate::error::{Error, Result};

/// Program name looked up on `PATH` when nothing else is configured.
pub const DEFAULT_PROGRAM: &str = "arduino-cli";

/// Bytes of stdout and of stderr kept per invocation.
pub const DEFAULT_OUTPUT_LIMIT: usize = 1024 * 1024;

/// How often, and how many times, to check that a killed group has exited.
#[cfg(unix)]
const GROUP_EXIT_POLL: Duration = Duration::from_millis(10);
#[cfg(unix)]
const GROUP_EXIT_POLLS: u32 = 200;

/// How to run the toolchain.
#[derive(Debug, Clone)]
pub struct ToolchainConfig {
    /// Program to execute.
    pub program: PathBuf,

    /// Arguments placed before every subcommand (e.g. `--config-file`).
    pub global_args: Vec<String>,

    /// Capture bound per output stream, in bytes.
    pub output_limit: usize,

    /// Kill the toolchain if a single invocation runs longer than this.
    /// `None` waits indefinitely.
    pub timeout: Option<Duration>,
}

impl Default for ToolchainConfig {
    fn default() -> Self {
        Self {
            program: PathBuf::from(DEFAULT_PROGRAM),
            global_args: Vec::new(),
            output_limit: DEFAULT_OUTPUT_LIMIT,
            timeout: None,
        }
    }
}

impl ToolchainConfig {
    /// Resolve a program name against `PATH`.
    ///
    /// Falls back to the bare name when it cannot be found, so a missing
    /// toolchain surfaces per request instead of at startup.
    pub fn resolve_program(name: &str) -> PathBuf {
        match which::which(name) {
            Ok(path) => path,
            Err(e) => {
                tracing::warn!("{} not found in PATH ({}), using it as given", name, e);
                PathBuf::from(name)
            }
        }
    }
}

/// Captured result of one toolchain invocation.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    /// Process exit status.
    pub status: ExitStatus,
    /// Captured standard output, lossily decoded.
    pub stdout: String,
    /// Captured standard error, lossily decoded.
    pub stderr: String,
    /// Whether either stream exceeded the capture bound.
    pub truncated: bool,
}

impl CommandOutput {
    /// Toolchain-authored text explaining a failure: stderr, else stdout.
    pub fn diagnostic(&self) -> Option<&str> {
        if !self.stderr.is_empty() {
            Some(&self.stderr)
        } else if !self.stdout.is_empty() {
            Some(&self.stdout)
        } else {
            None
        }
    }
}

/// Why an invocation did not succeed.
#[derive(Debug)]
enum Failure {
    /// The process could not be started or waited on.
    Io(io::Error),
    /// The configured timeout elapsed.
    TimedOut(Duration),
    /// The process exited unsuccessfully.
    Exited(CommandOutput),
}

/// Handle to the external toolchain.
#[derive(Debug, Clone)]
pub struct Toolchain {
    config: ToolchainConfig,
}

impl Toolchain {
    /// Create a toolchain handle.
    pub fn new(config: ToolchainConfig) -> Self {
        Self { config }
    }

    /// The program being run.
    pub fn program(&self) -> &Path {
        &self.config.program
    }

    /// Compile the sketch in `sketch_dir` for `board`, placing output in `build_dir`.
    ///
    /// # Errors
    /// Returns [`Error::Compilation`] with the toolchain's diagnostic text if
    /// the compiler exits non-zero, cannot be started, or times out.
    pub async fn compile(
        &self,
        sketch_dir: &Path,
        board: &str,
        build_dir: &Path,
    ) -> Result<CommandOutput> {
        let args = [
            OsStr::new("compile"),
            OsStr::new("--fqbn"),
            OsStr::new(board),
            sketch_dir.as_os_str(),
            OsStr::new("--output-dir"),
            build_dir.as_os_str(),
        ];

        self.run(&args)
            .await
            .map_err(|failure| Error::Compilation {
                details: self.describe(&failure),
            })
    }

    /// Install one library into the toolchain's shared library directory.
    ///
    /// # Errors
    /// Returns [`Error::LibraryInstall`] naming the library on failure.
    pub async fn install_library(&self, library: &str) -> Result<CommandOutput> {
        let args = [OsStr::new("lib"), OsStr::new("install"), OsStr::new(library)];

        self.run(&args)
            .await
            .map_err(|failure| Error::LibraryInstall {
                library: library.to_string(),
                details: self.describe(&failure),
            })
    }

    /// Toolchain version string, if the program runs at all.
    pub async fn version(&self) -> Option<String> {
        let output = self.run(&[OsStr::new("version")]).await.ok()?;
        let version = output.stdout.trim();
        (!version.is_empty()).then(|| version.to_string())
    }

    async fn run(&self, args: &[&OsStr]) -> std::result::Result<CommandOutput, Failure> {
        let mut command = Command::new(&self.config.program);
        command
            .args(&self.config.global_args)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        command.process_group(0);

        let mut child = command.spawn().map_err(Failure::Io)?;
        let group = ProcessGroup::of(&child);

        tracing::debug!("Running {} {:?}", self.config.program.display(), args);

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let limit = self.config.output_limit;

        let collect = async {
            tokio::try_join!(
                read_bounded(stdout, limit),
                read_bounded(stderr, limit),
                child.wait(),
            )
        };

        let collected = match self.config.timeout {
            Some(timeout) => tokio::time::timeout(timeout, collect)
                .await
                .map_err(|_| timeout),
            None => Ok(collect.await),
        };
        let collected = match collected {
            Ok(collected) => collected,
            Err(timeout) => {
                group.kill();
                let _ = child.kill().await;
                group.terminate().await;
                return Err(Failure::TimedOut(timeout));
            }
        };
        group.terminate().await;

        let ((stdout, stdout_truncated), (stderr, stderr_truncated), status) =
            collected.map_err(Failure::Io)?;

        let output = CommandOutput {
            status,
            stdout: String::from_utf8_lossy(&stdout).into_owned(),
            stderr: String::from_utf8_lossy(&stderr).into_owned(),
            truncated: stdout_truncated || stderr_truncated,
        };

        if output.truncated {
            tracing::debug!("Toolchain output exceeded {} bytes and was truncated", limit);
        }

        if output.status.success() {
            Ok(output)
        } else {
            Err(Failure::Exited(output))
        }
    }

    fn describe(&self, failure: &Failure) -> String {
        let program = self.config.program.display();
        match failure {
            Failure::Io(e) => format!("failed to run {}: {}", program, e),
            Failure::TimedOut(timeout) => format!(
                "{} did not finish within {}s and was killed",
                program,
                timeout.as_secs_f64()
            ),
            Failure::Exited(output) => match output.diagnostic() {
                Some(text) => text.to_string(),
                None => format!("{} exited with {}", program, output.status),
            },
        }
    }
}

/// Every process in one invocation's process group.
///
/// Dropping the handle kills the group, which covers the request future being
/// cancelled mid-invocation.
#[cfg(unix)]
struct ProcessGroup {
    pgid: Option<libc::pid_t>,
}

#[cfg(unix)]
impl ProcessGroup {
    /// The group led by `child`, which was spawned with `process_group(0)`.
    fn of(child: &tokio::process::Child) -> Self {
        Self {
            pgid: child.id().and_then(|id| libc::pid_t::try_from(id).ok()),
        }
    }

    fn kill(&self) {
        if let Some(pgid) = self.pgid {
            // SAFETY: killpg only sends a signal; an empty group yields ESRCH.
            unsafe {
                libc::killpg(pgid, libc::SIGKILL);
            }
        }
    }

    fn is_alive(&self) -> bool {
        match self.pgid {
            // SAFETY: signal 0 only checks that the group still has members.
            Some(pgid) => unsafe { libc::killpg(pgid, 0) == 0 },
            None => false,
        }
    }

    /// Kill whatever is left of the group and wait for it to go away.
    ///
    /// Must only be called once the group leader has been reaped.
    async fn terminate(mut self) {
        self.kill();
        for _ in 0..GROUP_EXIT_POLLS {
            if !self.is_alive() {
                break;
            }
            tokio::time::sleep(GROUP_EXIT_POLL).await;
        }
        if self.is_alive() {
            tracing::warn!(
                "Toolchain process group {:?} still alive after SIGKILL",
                self.pgid
            );
        }
        self.pgid = None;
    }
}

#[cfg(unix)]
impl Drop for ProcessGroup {
    fn drop(&mut self) {
        self.kill();
    }
}

#[cfg(not(unix))]
struct ProcessGroup;

#[cfg(not(unix))]
impl ProcessGroup {
    fn of(_child: &tokio::process::Child) -> Self {
        Self
    }

    fn kill(&self) {}

    async fn terminate(self) {}
}

/// Read a stream to its end, keeping at most `limit` bytes.
///
/// The stream is drained past the limit so the child never blocks on a full
/// pipe.
async fn read_bounded<R>(reader: Option<R>, limit: usize) -> io::Result<(Vec<u8>, bool)>
where
    R: AsyncRead + Unpin,
{
    let Some(mut reader) = reader else {
        return Ok((Vec::new(), false));
    };

    let mut captured = Vec::new();
    let mut truncated = false;
    let mut chunk = [0u8; 8192];

    loop {
        let n = reader.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        let room = limit.saturating_sub(captured.len());
        if n > room {
            truncated = true;
        }
        captured.extend_from_slice(&chunk[..n.min(room)]);
    }

    Ok((captured, truncated))
}
