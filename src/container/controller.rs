//! Docker-backed implementation of the container control surface.

use std::collections::HashMap;
use std::path::Path;

use bollard::Docker;
use bollard::container::{
    Config, CreateContainerOptions, ListContainersOptions, LogOutput, LogsOptions,
    RemoveContainerOptions, StartContainerOptions, StopContainerOptions, UploadToContainerOptions,
};
use bollard::exec::{CreateExecOptions, StartExecResults};
use bollard::image::CreateImageOptions;
use bollard::models::{HostConfig, PortBinding};
use futures::StreamExt;
use tokio::sync::oneshot;

use crate::container::detect::Platform;
use crate::container::error::{ContainerError, Result};
use crate::container::spec::{ContainerHandle, ExecOutput, ExecSpec, RunSpec};

/// Connect to the Docker daemon, trying the environment default first and
/// falling back to well-known per-user socket locations.
pub async fn connect_docker() -> Result<Docker> {
    if let Ok(docker) = Docker::connect_with_local_defaults()
        && docker.ping().await.is_ok()
    {
        return Ok(docker);
    }

    // Rootless / Docker Desktop sockets that the environment default misses.
    #[cfg(unix)]
    {
        let mut candidates = Vec::new();
        if let Ok(home) = std::env::var("HOME") {
            candidates.push(format!("{home}/.docker/run/docker.sock"));
        }
        if let Ok(uid) = std::env::var("UID") {
            candidates.push(format!("/run/user/{uid}/docker.sock"));
        }
        for socket in candidates {
            if std::path::Path::new(&socket).exists()
                && let Ok(docker) = Docker::connect_with_unix(
                    &socket,
                    120,
                    bollard::API_DEFAULT_VERSION,
                )
                && docker.ping().await.is_ok()
            {
                return Ok(docker);
            }
        }
    }

    let platform = Platform::current();
    Err(ContainerError::DockerNotAvailable {
        reason: "no responsive Docker daemon found".to_string(),
        hints: vec![
            platform.install_hint().to_string(),
            platform.start_hint().to_string(),
        ],
    })
}

/// Thin client over one Docker daemon connection.
///
/// Cheap to clone; all state lives in the daemon.
#[derive(Clone)]
pub struct ContainerController {
    docker: Docker,
}

impl ContainerController {
    /// Wrap an existing daemon connection.
    pub fn new(docker: Docker) -> Self {
        Self { docker }
    }

    /// Connect to the local daemon.
    pub async fn connect() -> Result<Self> {
        Ok(Self::new(connect_docker().await?))
    }

    /// Pull an image, streaming layer progress at trace level.
    ///
    /// A pull failure is terminal; the error carries platform hints so the
    /// caller can print something actionable.
    pub async fn ensure_image(&self, image: &str) -> Result<()> {
        tracing::info!("Pulling image: {image}");

        let options = CreateImageOptions {
            from_image: image.to_string(),
            ..Default::default()
        };

        let mut stream = self.docker.create_image(Some(options), None, None);
        while let Some(result) = stream.next().await {
            match result {
                Ok(info) => {
                    if let Some(status) = info.status {
                        tracing::trace!("Pull status: {status}");
                    }
                }
                Err(e) => {
                    let platform = Platform::current();
                    return Err(ContainerError::ImagePullFailed {
                        image: image.to_string(),
                        reason: e.to_string(),
                        hints: vec![
                            platform.install_hint().to_string(),
                            platform.start_hint().to_string(),
                            "Check the image reference for typos".to_string(),
                        ],
                    });
                }
            }
        }

        tracing::info!("Pulled image: {image}");
        Ok(())
    }

    /// Create a container from the spec and start it.
    ///
    /// If start fails the just-created container is removed before the start
    /// error is re-raised: nothing has been persisted yet, so an orphan would
    /// be unreachable by any later cleanup.
    pub async fn create_and_start(&self, spec: &RunSpec) -> Result<ContainerHandle> {
        let internal = format!("{}/tcp", spec.port_internal);

        let mut port_bindings = HashMap::new();
        port_bindings.insert(
            internal.clone(),
            Some(vec![PortBinding {
                host_ip: Some("0.0.0.0".to_string()),
                host_port: Some(spec.port.to_string()),
            }]),
        );

        let mut exposed_ports = HashMap::new();
        exposed_ports.insert(internal, HashMap::new());

        let host_config = HostConfig {
            port_bindings: Some(port_bindings),
            ..Default::default()
        };

        let config = Config {
            tty: Some(true),
            image: Some(spec.image.clone()),
            cmd: spec.command.clone(),
            env: if spec.env.is_empty() {
                None
            } else {
                Some(spec.env.clone())
            },
            hostname: if spec.hostname.is_empty() {
                None
            } else {
                Some(spec.hostname.clone())
            },
            exposed_ports: Some(exposed_ports),
            host_config: Some(host_config),
            ..Default::default()
        };

        let options = CreateContainerOptions {
            name: spec.name.clone(),
            platform: Some(spec.platform()),
        };

        let response = self
            .docker
            .create_container(Some(options), config)
            .await
            .map_err(|e| ContainerError::CreationFailed {
                name: spec.name.clone(),
                reason: e.to_string(),
            })?;

        let handle = ContainerHandle::new(response.id);

        if let Err(e) = self
            .docker
            .start_container(handle.id(), None::<StartContainerOptions<String>>)
            .await
        {
            // Not yet persisted anywhere, so remove rather than orphan.
            let _ = self
                .docker
                .remove_container(
                    handle.id(),
                    Some(RemoveContainerOptions {
                        force: true,
                        ..Default::default()
                    }),
                )
                .await;

            return Err(ContainerError::StartFailed {
                name: spec.name.clone(),
                reason: e.to_string(),
            });
        }

        tracing::info!("Started container {handle}");
        Ok(handle)
    }

    /// Run a command inside the container and capture its output.
    ///
    /// The attached stream is drained by a dedicated reader task that
    /// demultiplexes stdout and stderr into separate buffers; completion is
    /// signalled back over a single-slot channel the caller blocks on.
    pub async fn exec(&self, handle: &ContainerHandle, spec: &ExecSpec) -> Result<ExecOutput> {
        tracing::trace!("Running command in container: {}", spec.cmd.join(" "));

        let exec = self
            .docker
            .create_exec(
                handle.id(),
                CreateExecOptions {
                    attach_stdout: Some(true),
                    attach_stderr: Some(true),
                    cmd: Some(spec.cmd.clone()),
                    user: spec.user.clone(),
                    env: spec.env.clone(),
                    ..Default::default()
                },
            )
            .await
            .map_err(|e| ContainerError::ExecFailed {
                id: handle.id().to_string(),
                reason: e.to_string(),
            })?;

        let results = self
            .docker
            .start_exec(&exec.id, None)
            .await
            .map_err(|e| ContainerError::ExecFailed {
                id: handle.id().to_string(),
                reason: e.to_string(),
            })?;

        let (mut stdout, mut stderr) = (Vec::new(), Vec::new());

        if let StartExecResults::Attached { mut output, .. } = results {
            let (done_tx, done_rx) = oneshot::channel();

            let reader = tokio::spawn(async move {
                let (mut out_buf, mut err_buf) = (Vec::new(), Vec::new());
                let mut stream_err = None;
                while let Some(item) = output.next().await {
                    match item {
                        Ok(LogOutput::StdOut { message }) => out_buf.extend_from_slice(&message),
                        Ok(LogOutput::StdErr { message }) => err_buf.extend_from_slice(&message),
                        Ok(LogOutput::Console { message }) => out_buf.extend_from_slice(&message),
                        Ok(LogOutput::StdIn { .. }) => {}
                        Err(e) => {
                            stream_err = Some(e);
                            break;
                        }
                    }
                }
                let _ = done_tx.send((out_buf, err_buf, stream_err));
            });

            match done_rx.await {
                Ok((out_buf, err_buf, stream_err)) => {
                    stdout = out_buf;
                    stderr = err_buf;
                    if let Some(e) = stream_err {
                        return Err(ContainerError::Runtime(e));
                    }
                }
                Err(_) => {
                    reader.abort();
                    return Err(ContainerError::ExecFailed {
                        id: handle.id().to_string(),
                        reason: "exec output reader task dropped".to_string(),
                    });
                }
            }
        }

        let inspect = self.docker.inspect_exec(&exec.id).await?;

        tracing::trace!("Stdout: {}", String::from_utf8_lossy(&stdout));
        tracing::trace!("Stderr: {}", String::from_utf8_lossy(&stderr));
        tracing::trace!("ExitCode: {:?}", inspect.exit_code);

        Ok(ExecOutput {
            stdout,
            stderr,
            exit_code: inspect.exit_code,
        })
    }

    /// Copy a local file into a folder inside the container.
    ///
    /// The file is wrapped in an in-memory tar stream, which is how the
    /// runtime's upload endpoint expects its payload.
    pub async fn copy_file(
        &self,
        handle: &ContainerHandle,
        src: &Path,
        dest_folder: &str,
    ) -> Result<()> {
        tracing::debug!("Copying file {} to {dest_folder}", src.display());

        let contents = tokio::fs::read(src).await?;
        let filename = src
            .file_name()
            .map(|f| f.to_string_lossy().into_owned())
            .ok_or_else(|| ContainerError::CopyFailed {
                src: src.display().to_string(),
                reason: "source path has no filename".to_string(),
            })?;

        let mut builder = tar::Builder::new(Vec::new());
        let mut header = tar::Header::new_gnu();
        header.set_path(&filename).map_err(ContainerError::Io)?;
        header.set_size(contents.len() as u64);
        header.set_mode(0o600);
        header.set_cksum();
        builder
            .append(&header, contents.as_slice())
            .map_err(ContainerError::Io)?;
        let archive = builder.into_inner().map_err(ContainerError::Io)?;

        self.exec(handle, &ExecSpec::new(["mkdir", "-p", dest_folder]))
            .await?;

        self.docker
            .upload_to_container(
                handle.id(),
                Some(UploadToContainerOptions {
                    path: dest_folder.to_string(),
                    ..Default::default()
                }),
                bytes::Bytes::from(archive).into(),
            )
            .await
            .map_err(|e| ContainerError::CopyFailed {
                src: src.display().to_string(),
                reason: e.to_string(),
            })?;

        Ok(())
    }

    /// Download a remote file directly into the container filesystem.
    ///
    /// The source may be multi-gigabyte and the container already has network
    /// access, so the transfer runs in-container (`wget`, with a `curl -L`
    /// fallback when wget is absent) rather than streaming through the host.
    pub async fn download_file(
        &self,
        handle: &ContainerHandle,
        src: &str,
        dest_folder: &str,
    ) -> Result<()> {
        tracing::debug!("Downloading {src} to {dest_folder} in container");

        self.exec(handle, &ExecSpec::new(["mkdir", "-p", dest_folder]))
            .await?;

        let filename = src.rsplit('/').next().unwrap_or(src);
        // Always '/' here: the path is inside the Linux container.
        let dest = format!("{dest_folder}/{filename}");

        let wget = self
            .exec(handle, &ExecSpec::new(["wget", "-O", &dest, src]))
            .await?;
        tracing::trace!("wget exit code: {:?}", wget.exit_code);

        if wget.exit_code == Some(126) {
            tracing::debug!("wget not found in container, trying curl");
            let curl = self
                .exec(handle, &ExecSpec::new(["curl", "-o", &dest, "-L", src]))
                .await?;
            tracing::trace!("curl exit code: {:?}", curl.exit_code);

            if !curl.success() {
                return Err(ContainerError::CopyFailed {
                    src: src.to_string(),
                    reason: format!("curl exited with {:?}", curl.exit_code),
                });
            }
        } else if !wget.success() {
            return Err(ContainerError::CopyFailed {
                src: src.to_string(),
                reason: format!("wget exited with {:?}", wget.exit_code),
            });
        }

        Ok(())
    }

    /// Follow the container log stream until a line containing `text` appears.
    ///
    /// Unbounded wait: returns only on a match or when the stream closes.
    /// Useful for engine readiness ("Recovery is complete" and the like).
    pub async fn wait_for_log_entry(&self, handle: &ContainerHandle, text: &str) -> Result<()> {
        let options = LogsOptions::<String> {
            follow: true,
            stdout: true,
            stderr: false,
            ..Default::default()
        };

        let mut stream = self.docker.logs(handle.id(), Some(options));
        let mut pending = String::new();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            pending.push_str(&String::from_utf8_lossy(&chunk.into_bytes()));

            while let Some(newline) = pending.find('\n') {
                let line: String = pending.drain(..=newline).collect();
                tracing::trace!("LOG: {}", line.trim_end());
                if line.contains(text) {
                    return Ok(());
                }
            }
        }

        // Stream ended; a partial final line may still hold the pattern.
        if pending.contains(text) {
            return Ok(());
        }

        Err(ContainerError::LogPatternNotFound {
            id: handle.id().to_string(),
            pattern: text.to_string(),
        })
    }

    /// Stop the container. Errors from the runtime are surfaced verbatim.
    pub async fn stop(&self, handle: &ContainerHandle) -> Result<()> {
        self.docker
            .stop_container(handle.id(), None::<StopContainerOptions>)
            .await?;
        Ok(())
    }

    /// Start a previously created container.
    pub async fn start(&self, handle: &ContainerHandle) -> Result<()> {
        self.docker
            .start_container(handle.id(), None::<StartContainerOptions<String>>)
            .await?;
        Ok(())
    }

    /// Remove the container. Removing an already-removed container is an
    /// error surfaced to the caller, not swallowed.
    pub async fn remove(&self, handle: &ContainerHandle) -> Result<()> {
        self.docker
            .remove_container(
                handle.id(),
                Some(RemoveContainerOptions {
                    force: false,
                    ..Default::default()
                }),
            )
            .await?;
        Ok(())
    }

    /// Whether the container is currently running.
    pub async fn running(&self, handle: &ContainerHandle) -> Result<bool> {
        let info = self.docker.inspect_container(handle.id(), None).await?;
        Ok(info.state.and_then(|s| s.running).unwrap_or(false))
    }

    /// Whether a container with this id exists at all (running or not).
    pub async fn exists(&self, handle: &ContainerHandle) -> Result<bool> {
        let mut filters = HashMap::new();
        filters.insert("id".to_string(), vec![handle.id().to_string()]);

        let list = self
            .docker
            .list_containers(Some(ListContainersOptions {
                all: true,
                filters,
                ..Default::default()
            }))
            .await?;
        Ok(!list.is_empty())
    }

    /// Find a container by its exact name, running or not.
    pub async fn find_by_name(&self, name: &str) -> Result<Option<ContainerHandle>> {
        let mut filters = HashMap::new();
        // The runtime reports names with a leading slash; the filter takes
        // an anchored regex.
        filters.insert("name".to_string(), vec![format!("^/{name}$")]);

        let list = self
            .docker
            .list_containers(Some(ListContainersOptions {
                all: true,
                filters,
                ..Default::default()
            }))
            .await?;
        Ok(list
            .into_iter()
            .next()
            .and_then(|c| c.id)
            .map(ContainerHandle::new))
    }

    /// The runtime-assigned container name, without the leading `/`.
    pub async fn container_name(&self, handle: &ContainerHandle) -> Result<String> {
        let info = self.docker.inspect_container(handle.id(), None).await?;
        Ok(info
            .name
            .map(|n| n.trim_start_matches('/').to_string())
            .unwrap_or_default())
    }

    /// List files in the container matching a filespec (case-insensitive).
    pub async fn container_files(
        &self,
        handle: &ContainerHandle,
        filespec: &str,
    ) -> Result<Vec<String>> {
        let output = self
            .exec(handle, &ExecSpec::new(["find", "/", "-iname", filespec]))
            .await?;
        Ok(output
            .stdout_str()
            .lines()
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Anything touching the daemon is ignored by default; run with
    // `cargo test -- --ignored` on a machine with Docker available.

    #[tokio::test]
    #[ignore = "requires a running Docker daemon"]
    async fn test_connect_and_ping() {
        let controller = ContainerController::connect().await.unwrap();
        let handle = ContainerHandle::new("does-not-exist");
        assert!(!controller.exists(&handle).await.unwrap());
    }

    #[tokio::test]
    #[ignore = "requires a running Docker daemon"]
    async fn test_exec_demultiplexes_streams() {
        let controller = ContainerController::connect().await.unwrap();
        controller.ensure_image("alpine:latest").await.unwrap();

        let spec = RunSpec {
            image: "alpine:latest".to_string(),
            name: "sqldock-test-exec".to_string(),
            command: Some(vec!["sleep".to_string(), "60".to_string()]),
            ..Default::default()
        };
        let handle = controller.create_and_start(&spec).await.unwrap();

        let out = controller
            .exec(
                &handle,
                &ExecSpec::new(["sh", "-c", "echo out; echo err 1>&2; exit 3"]),
            )
            .await
            .unwrap();

        assert_eq!(out.exit_code, Some(3));
        assert_eq!(out.stdout_str().trim(), "out");
        assert_eq!(out.stderr_str().trim(), "err");

        controller.stop(&handle).await.unwrap();
        controller.remove(&handle).await.unwrap();
    }

    #[tokio::test]
    #[ignore = "requires a running Docker daemon"]
    async fn test_copy_file_then_remove() {
        let controller = ContainerController::connect().await.unwrap();
        controller.ensure_image("alpine:latest").await.unwrap();

        let spec = RunSpec {
            image: "alpine:latest".to_string(),
            name: "sqldock-test-copy".to_string(),
            command: Some(vec!["sleep".to_string(), "60".to_string()]),
            ..Default::default()
        };
        let handle = controller.create_and_start(&spec).await.unwrap();

        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("payload.bak");
        std::fs::write(&file, b"backup bytes").unwrap();

        controller
            .copy_file(&handle, &file, "/var/opt/staging")
            .await
            .unwrap();
        let out = controller
            .exec(&handle, &ExecSpec::new(["cat", "/var/opt/staging/payload.bak"]))
            .await
            .unwrap();
        assert_eq!(out.stdout_str(), "backup bytes");

        controller.stop(&handle).await.unwrap();
        controller.remove(&handle).await.unwrap();
        assert!(!controller.exists(&handle).await.unwrap());
    }
}
