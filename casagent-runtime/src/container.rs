//! Container session lifecycle
//!
//! One session owns exactly one long-lived podman container. The container is
//! created at startup with fixed bind mounts and a no-op foreground process,
//! and torn down (kill, then remove) when the session closes. Setup failures
//! are fatal; teardown failures are logged and swallowed.

use casagent_error::{Error, Result};
use rand::RngCore;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};

/// Naming scheme for session containers
pub const CONTAINER_NAME_PREFIX: &str = "casa-agent-";

/// Mount point of the working directory inside the container
pub const WORKING_MOUNT: &str = "/working";

/// Mount point of the CASA installation inside the container
pub const CASA_MOUNT: &str = "/opt/casa";

/// Mount point of the analysisUtils scripts inside the container
pub const ANALYSIS_UTILS_MOUNT: &str = "/opt/analysisUtils";

/// How the session container is launched.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    /// Container engine binary ("podman")
    pub engine: String,
    /// Image to run
    pub image: String,
    /// Host CASA installation directory, mounted read-only
    pub casa_dir: PathBuf,
    /// Host analysisUtils directory, mounted read-only
    pub analysis_utils_dir: PathBuf,
    /// Host working directory, mounted read-write
    pub working_dir: PathBuf,
    /// Forward the host X11 display into the container
    pub x11: bool,
}

impl SessionSettings {
    /// Path of the CASA launcher binary on the host
    pub fn casa_binary(&self) -> PathBuf {
        self.casa_dir.join("bin").join("casa")
    }
}

/// Check that a binary exists and answers its version command.
pub fn probe_version(binary: &Path) -> Result<()> {
    let output = Command::new(binary)
        .arg("--version")
        .stdin(Stdio::null())
        .output();

    match output {
        Ok(out) if out.status.success() => Ok(()),
        Ok(out) => Err(Error::unexpected(format!(
            "'{}' --version exited with {}",
            binary.display(),
            out.status
        ))
        .with_operation("container::probe_version")),
        Err(e) => Err(Error::unexpected(format!(
            "cannot run '{}': {}",
            binary.display(),
            e
        ))
        .with_operation("container::probe_version")
        .set_source(e)),
    }
}

/// Generate a randomized container name: `casa-agent-` + 8 hex chars.
pub fn random_container_name() -> String {
    let mut bytes = [0u8; 4];
    rand::thread_rng().fill_bytes(&mut bytes);
    let hex: String = bytes.iter().map(|b| format!("{:02x}", b)).collect();
    format!("{}{}", CONTAINER_NAME_PREFIX, hex)
}

/// Build the `podman run` argument vector for a session container.
///
/// The container idles on `tail -f /dev/null`; all real work happens through
/// `podman exec`.
pub fn run_args(settings: &SessionSettings, name: &str, display: Option<&str>) -> Vec<String> {
    let mut args: Vec<String> = vec![
        "run".into(),
        "-d".into(),
        "--name".into(),
        name.into(),
    ];

    if settings.x11 {
        args.push("-e".into());
        args.push(format!("DISPLAY={}", display.unwrap_or("")));
        args.push("-e".into());
        args.push("QT_X11_NO_MITSHM=1".into());
        args.push("-v".into());
        args.push("/tmp/.X11-unix:/tmp/.X11-unix".into());
        // FUSE is needed for the casaviewer AppImage
        args.push("--device".into());
        args.push("/dev/fuse".into());
        args.push("--cap-add=SYS_ADMIN".into());
        args.push("--security-opt".into());
        args.push("label=disable".into());
    }

    args.push("-v".into());
    args.push(format!("{}:{}:rw", settings.working_dir.display(), WORKING_MOUNT));
    args.push("-v".into());
    args.push(format!("{}:{}:ro", settings.casa_dir.display(), CASA_MOUNT));
    args.push("-v".into());
    args.push(format!(
        "{}:{}:ro",
        settings.analysis_utils_dir.display(),
        ANALYSIS_UTILS_MOUNT
    ));

    // Keep host uid inside the container so files in /working stay owned
    args.push("--userns=keep-id".into());
    args.push("--workdir".into());
    args.push(WORKING_MOUNT.into());
    args.push(settings.image.clone());
    args.push("tail".into());
    args.push("-f".into());
    args.push("/dev/null".into());

    args
}

/// A running session container, exclusively owned for the process lifetime.
///
/// `close` is idempotent; `Drop` closes as a fallback so the container is
/// released on every exit path.
#[derive(Debug)]
pub struct ContainerSession {
    engine: String,
    name: String,
    closed: bool,
}

impl ContainerSession {
    /// Validate the engine and toolchain, then start the idle container.
    ///
    /// Any failure here is fatal for the whole session; no container is left
    /// behind if the probes fail because they run before `podman run`.
    pub fn launch(settings: &SessionSettings, display: Option<&str>) -> Result<Self> {
        probe_version(Path::new(&settings.engine)).map_err(|e| {
            Error::engine_missing(settings.engine.clone())
                .with_operation("session::launch")
                .set_source(e)
        })?;

        let casa = settings.casa_binary();
        probe_version(&casa).map_err(|e| {
            Error::toolchain_missing(casa.display().to_string())
                .with_operation("session::launch")
                .set_source(e)
        })?;

        let name = random_container_name();
        let args = run_args(settings, &name, display);

        let output = Command::new(&settings.engine)
            .args(&args)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| {
                Error::container_create_failed(name.clone(), e.to_string())
                    .with_operation("session::launch")
                    .set_source(e)
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
            return Err(Error::container_create_failed(
                name.clone(),
                format!("'{} run' exited with {}: {}", settings.engine, output.status, stderr),
            )
            .with_operation("session::launch")
            .with_context("image", settings.image.clone()));
        }

        tracing::info!(container = %name, image = %settings.image, "session container started");

        Ok(Self {
            engine: settings.engine.clone(),
            name,
            closed: false,
        })
    }

    /// Attach to an already-running container without probing or launching.
    pub fn attach(engine: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            engine: engine.into(),
            name: name.into(),
            closed: false,
        }
    }

    /// Name of the owned container
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the session has been closed
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Run a shell command inside the container, capturing both streams.
    ///
    /// A non-zero exit of the inner command is not an error; the caller folds
    /// the captured streams into text regardless.
    pub fn exec_shell(&self, command: &str) -> std::io::Result<Output> {
        Command::new(&self.engine)
            .args(["exec", "-i", &self.name, "bash", "-c", command])
            .stdin(Stdio::null())
            .output()
    }

    /// Run an exec argv inside the container, feeding `input` on stdin.
    ///
    /// Stdin is fed from a separate thread while the output pipes are drained;
    /// writing inline would deadlock once the pipes fill, since commands like
    /// `tee` echo the content back and stop reading when stdout backs up.
    pub fn exec_with_stdin(&self, argv: &[String], input: &str) -> std::io::Result<Output> {
        use std::io::Write;

        let mut child = Command::new(&self.engine)
            .arg("exec")
            .arg("-i")
            .arg(&self.name)
            .args(argv)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        let stdin = child.stdin.take();
        let payload = input.as_bytes().to_vec();
        let writer = std::thread::spawn(move || {
            if let Some(mut stdin) = stdin {
                // A broken pipe here means the command exited early; its
                // status and stderr carry the story.
                let _ = stdin.write_all(&payload);
            }
        });

        let output = child.wait_with_output();
        let _ = writer.join();
        output
    }

    /// Stop and remove the container.
    ///
    /// Teardown failures are logged as warnings, never raised; calling close
    /// again is a no-op.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        match Command::new(&self.engine)
            .args(["kill", &self.name])
            .stdin(Stdio::null())
            .output()
        {
            Ok(out) if out.status.success() => {}
            Ok(out) => tracing::warn!(
                container = %self.name,
                status = %out.status,
                "cannot stop container"
            ),
            Err(e) => tracing::warn!(container = %self.name, error = %e, "cannot stop container"),
        }

        match Command::new(&self.engine)
            .args(["rm", "-f", &self.name])
            .stdin(Stdio::null())
            .output()
        {
            Ok(out) if out.status.success() => {}
            Ok(out) => tracing::warn!(
                container = %self.name,
                status = %out.status,
                "cannot remove container"
            ),
            Err(e) => tracing::warn!(container = %self.name, error = %e, "cannot remove container"),
        }
    }
}

impl Drop for ContainerSession {
    fn drop(&mut self) {
        if !self.closed {
            tracing::warn!(container = %self.name, "session dropped without close; tearing down");
            self.close();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use casagent_error::ErrorKind;

    fn settings() -> SessionSettings {
        SessionSettings {
            engine: "podman".into(),
            image: "casa-skeleton-python".into(),
            casa_dir: PathBuf::from("/usr/local/casa/casa-6.6.1-17-pipeline-2024.1.0.8"),
            analysis_utils_dir: PathBuf::from("/home/user/analysis_scripts"),
            working_dir: PathBuf::from("./test_dir"),
            x11: false,
        }
    }

    #[test]
    fn test_random_container_name_format() {
        let name = random_container_name();
        assert!(name.starts_with(CONTAINER_NAME_PREFIX));
        let suffix = &name[CONTAINER_NAME_PREFIX.len()..];
        assert_eq!(suffix.len(), 8);
        assert!(suffix.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_random_container_names_differ() {
        assert_ne!(random_container_name(), random_container_name());
    }

    #[test]
    fn test_run_args_mounts_and_idle_process() {
        let args = run_args(&settings(), "casa-agent-00000000", None);

        assert_eq!(args[0], "run");
        assert_eq!(args[1], "-d");
        assert!(args.contains(&"--name".to_string()));
        assert!(args.contains(&"casa-agent-00000000".to_string()));
        assert!(args.contains(&"./test_dir:/working:rw".to_string()));
        assert!(args.contains(
            &"/usr/local/casa/casa-6.6.1-17-pipeline-2024.1.0.8:/opt/casa:ro".to_string()
        ));
        assert!(args.contains(&"/home/user/analysis_scripts:/opt/analysisUtils:ro".to_string()));
        assert!(args.contains(&"--userns=keep-id".to_string()));

        // Idle foreground process keeps the container alive
        let n = args.len();
        assert_eq!(&args[n - 3..], &["tail", "-f", "/dev/null"]);
    }

    #[test]
    fn test_run_args_x11_capability() {
        let mut s = settings();
        s.x11 = true;
        let args = run_args(&s, "casa-agent-00000000", Some(":0"));

        assert!(args.contains(&"DISPLAY=:0".to_string()));
        assert!(args.contains(&"QT_X11_NO_MITSHM=1".to_string()));
        assert!(args.contains(&"/tmp/.X11-unix:/tmp/.X11-unix".to_string()));
        assert!(args.contains(&"/dev/fuse".to_string()));
        assert!(args.contains(&"--cap-add=SYS_ADMIN".to_string()));
        assert!(args.contains(&"label=disable".to_string()));
    }

    #[test]
    fn test_run_args_without_x11_has_no_display() {
        let args = run_args(&settings(), "casa-agent-00000000", Some(":0"));
        assert!(!args.iter().any(|a| a.starts_with("DISPLAY=")));
        assert!(!args.contains(&"--cap-add=SYS_ADMIN".to_string()));
    }

    #[test]
    fn test_probe_version_missing_binary() {
        let err = probe_version(Path::new("/nonexistent/binary")).unwrap_err();
        assert!(err.to_string().contains("cannot run"));
    }

    #[test]
    fn test_launch_fails_fast_when_engine_missing() {
        let mut s = settings();
        s.engine = "/nonexistent/podman".into();
        let err = ContainerSession::launch(&s, None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::EngineMissing);
    }

    #[cfg(unix)]
    #[test]
    fn test_exec_with_stdin_survives_large_content() {
        use std::io::Write;
        use std::os::unix::fs::PermissionsExt;

        // Stub engine that behaves like `podman exec -i`: swallow the argv,
        // pipe stdin straight back out. Content larger than the pipe buffers
        // must still round-trip instead of wedging on a full stdout pipe.
        let dir = tempfile::tempdir().unwrap();
        let engine = dir.path().join("engine");
        {
            let mut f = std::fs::File::create(&engine).unwrap();
            writeln!(f, "#!/bin/sh").unwrap();
            writeln!(f, "exec cat").unwrap();
        }
        let mut perms = std::fs::metadata(&engine).unwrap().permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(&engine, perms).unwrap();

        let mut session =
            ContainerSession::attach(engine.to_str().unwrap(), "casa-agent-test");
        let content = "x".repeat(2 * 1024 * 1024);
        let argv = vec!["tee".to_string(), "/dev/null".to_string()];

        let output = session.exec_with_stdin(&argv, &content).unwrap();
        assert!(output.status.success());
        assert_eq!(output.stdout.len(), content.len());

        session.close();
    }

    #[test]
    fn test_close_is_idempotent() {
        // Bogus engine: both teardown commands fail, which must only warn.
        let mut session = ContainerSession::attach("/nonexistent/podman", "casa-agent-test");
        session.close();
        assert!(session.is_closed());
        session.close();
        assert!(session.is_closed());
    }

    #[test]
    fn test_casa_binary_path() {
        let s = settings();
        assert_eq!(
            s.casa_binary(),
            PathBuf::from("/usr/local/casa/casa-6.6.1-17-pipeline-2024.1.0.8/bin/casa")
        );
    }
}
