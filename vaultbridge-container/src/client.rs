//! Scoped Container Client: a thin, non-general-purpose wrapper
//! around a Docker-API-compatible engine. Internally stateless except for
//! the engine handle and the (immutable, post-construction) scope map
//! — per-operation deadlines come from the caller or the
//! configured low-latency default.

use std::collections::HashMap;
use std::time::Duration;

use bollard::container::{
    Config, CreateContainerOptions, ListContainersOptions, LogOutput, LogsOptions, RemoveContainerOptions,
    StartContainerOptions, WaitContainerOptions,
};
use bollard::exec::{CreateExecOptions, StartExecResults};
use bollard::models::{ContainerCreateResponse, ContainerInspectResponse, ContainerSummary, EventMessage, HostConfig};
use bollard::system::EventsOptions;
use bollard::Docker;
use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use vaultbridge_audit::{Actor, AuditEntry, Compliance, Resource};

use crate::error::ContainerError;
use crate::hardening;
use crate::retry;
use crate::scope::{Scope, ScopeSet};

fn audit(entry: AuditEntry) {
    vaultbridge_audit::record(entry);
}

/// Per-operation deadline. Intentionally tight — container operations are
/// local IPC over a Unix socket.
pub const DEFAULT_DEADLINE: Duration = Duration::from_millis(15);

#[derive(Clone)]
pub struct CreateSpec {
    pub image: String,
    pub env: Vec<String>,
    pub cmd: Option<Vec<String>>,
    pub host_config: HostConfig,
    pub platform: Option<String>,
}

pub struct ExecResult {
    pub exit_code: i64,
    pub output: String,
}

/// A non-general-purpose Docker-API client: every operation checks its
/// required [`Scope`] before touching the engine. Cheaply `Clone` (the
/// underlying `bollard::Docker` handle is itself a cheap handle clone) so
/// callers needing a detached cleanup task can hand a clone to `tokio::spawn`.
#[derive(Clone)]
pub struct ScopedClient {
    docker: Docker,
    scopes: ScopeSet,
    deadline: Duration,
}

impl ScopedClient {
    /// Connects to `socket` (default `unix:///var/run/docker.sock`),
    /// negotiating API version 1.45.
    pub fn connect(socket: Option<&str>, scopes: ScopeSet) -> Result<Self, ContainerError> {
        let docker = match socket {
            Some(path) => Docker::connect_with_unix(path, 30, bollard::API_DEFAULT_VERSION)?,
            None => Docker::connect_with_unix_defaults()?,
        };
        Ok(Self { docker, scopes, deadline: DEFAULT_DEADLINE })
    }

    pub fn with_operation_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    /// Connects over plain HTTP instead of the unix socket. Exists for
    /// tests driving this client against a local mock engine; the
    /// production path is always [`ScopedClient::connect`].
    #[cfg(test)]
    pub(crate) fn connect_http_for_test(addr: &str, scopes: ScopeSet) -> Result<Self, ContainerError> {
        let docker = Docker::connect_with_http(addr, 30, bollard::API_DEFAULT_VERSION)?;
        Ok(Self { docker, scopes, deadline: Duration::from_secs(5) })
    }

    fn require(&self, scope: Scope, op: &'static str) -> Result<(), ContainerError> {
        if self.scopes.contains(scope) {
            Ok(())
        } else {
            Err(ContainerError::ScopeViolation(op))
        }
    }

    async fn bounded<T, F>(&self, fut: F) -> Result<T, ContainerError>
    where
        F: std::future::Future<Output = Result<T, ContainerError>>,
    {
        match tokio::time::timeout(self.deadline, fut).await {
            Ok(result) => result,
            Err(_) => Err(ContainerError::Timeout),
        }
    }

    // -----------------------------------------------------------------------
    // Create / start / remove
    // -----------------------------------------------------------------------

    /// Applies mandatory hardening unconditionally before
    /// talking to the engine.
    pub async fn create_container(&self, name: &str, mut spec: CreateSpec) -> Result<String, ContainerError> {
        self.require(Scope::Create, "create_container")?;
        hardening::apply(&mut spec.host_config);

        let options = CreateContainerOptions { name: name.to_string(), platform: spec.platform.clone() };
        let config = Config {
            image: Some(spec.image),
            env: Some(spec.env),
            cmd: spec.cmd,
            host_config: Some(spec.host_config),
            ..Default::default()
        };

        self.bounded(async {
            let resp: ContainerCreateResponse = self.docker.create_container(Some(options), config).await?;
            Ok(resp.id)
        })
        .await
    }

    pub async fn start_container(&self, id: &str) -> Result<(), ContainerError> {
        self.require(Scope::Create, "start_container")?;
        self.bounded(async { Ok(self.docker.start_container(id, None::<StartContainerOptions<String>>).await?) })
            .await
    }

    pub async fn remove_container(&self, id: &str, force: bool) -> Result<(), ContainerError> {
        self.require(Scope::Remove, "remove_container")?;
        let exit_code = self
            .inspect_container(id)
            .await
            .ok()
            .and_then(|info| info.state.and_then(|s| s.exit_code));
        let options = RemoveContainerOptions { force, ..Default::default() };
        let result = self.bounded(async { Ok(self.docker.remove_container(id, Some(options)).await?) }).await;
        audit(
            AuditEntry::new("container.stop", Actor::system(), "remove_container", Compliance::routine("container"))
                .with_resource(Resource::new("container", id))
                .with_detail("force", force)
                .with_detail("success", result.is_ok())
                .with_detail("exit_code", exit_code.map(|c| c.to_string()).unwrap_or_default()),
        );
        result
    }

    /// Atomic for the caller: on any start failure, cleanup uses a
    /// detached, short-timeout context so cancellation of the outer call
    /// does not orphan a container.
    pub async fn create_and_start_container(&self, name: &str, spec: CreateSpec) -> Result<String, ContainerError> {
        let id = self.create_container(name, spec).await?;
        match self.start_container(&id).await {
            Ok(()) => {
                audit(
                    AuditEntry::new("container.start", Actor::system(), "create_and_start_container", Compliance::routine("container"))
                        .with_resource(Resource::new("container", &id).with_name(name)),
                );
                Ok(id)
            }
            Err(start_err) => {
                audit(
                    AuditEntry::new("container.error", Actor::system(), "create_and_start_container", Compliance::critical("container"))
                        .with_resource(Resource::new("container", &id).with_name(name))
                        .with_detail("phase", "start"),
                );
                let cleanup_id = id.clone();
                let docker = self.docker.clone();
                // Detached, bounded cleanup: independent of the caller's
                // own cancellation so a cancelled outer call still removes
                // the half-started container.
                tokio::spawn(async move {
                    let _ = tokio::time::timeout(
                        Duration::from_secs(1),
                        docker.remove_container(&cleanup_id, Some(RemoveContainerOptions { force: true, ..Default::default() })),
                    )
                    .await;
                });
                Err(ContainerError::StartFailed(start_err.to_string()))
            }
        }
    }

    /// Exponential backoff (base 100ms, doubling) up to 3 attempts for
    /// retryable errors; respects `cancel`.
    pub async fn create_container_with_retry(
        &self,
        name: &str,
        spec: CreateSpec,
        max_attempts: u32,
        cancel: &CancellationToken,
    ) -> Result<String, ContainerError> {
        retry::with_backoff(max_attempts, cancel, || {
            let spec = spec.clone();
            async move { self.create_container(name, spec).await }
        })
        .await
    }

    // -----------------------------------------------------------------------
    // Exec
    // -----------------------------------------------------------------------

    pub async fn exec_create(&self, id: &str, cmd: Vec<String>) -> Result<String, ContainerError> {
        self.require(Scope::Exec, "exec_create")?;
        let options = CreateExecOptions {
            cmd: Some(cmd),
            attach_stdout: Some(true),
            attach_stderr: Some(true),
            ..Default::default()
        };
        self.bounded(async { Ok(self.docker.create_exec(id, options).await?.id) }).await
    }

    pub async fn exec_start(&self, exec_id: &str) -> Result<String, ContainerError> {
        self.require(Scope::Exec, "exec_start")?;
        self.bounded(async {
            let mut output = String::new();
            if let StartExecResults::Attached { mut output: stream, .. } = self.docker.start_exec(exec_id, None).await? {
                while let Some(chunk) = stream.next().await {
                    match chunk? {
                        LogOutput::StdOut { message } | LogOutput::StdErr { message } => {
                            output.push_str(&String::from_utf8_lossy(&message));
                        }
                        _ => {}
                    }
                }
            }
            Ok(output)
        })
        .await
    }

    /// Creates an exec with stdin attached, for callers that need to stream
    /// bytes into the container's entrypoint rather than pass them as `cmd`
    /// arguments (used by the secret-injection pipeline: the bytes transit
    /// the exec API's attached stdin stream, never `Env` or `cmd`).
    pub async fn exec_create_with_stdin(&self, id: &str, cmd: Vec<String>) -> Result<String, ContainerError> {
        self.require(Scope::Exec, "exec_create_with_stdin")?;
        let options = CreateExecOptions {
            cmd: Some(cmd),
            attach_stdin: Some(true),
            attach_stdout: Some(true),
            attach_stderr: Some(true),
            ..Default::default()
        };
        self.bounded(async { Ok(self.docker.create_exec(id, options).await?.id) }).await
    }

    /// Starts `exec_id` and writes `payload` to its attached stdin, then
    /// closes the stream. Drains stdout/stderr to completion so the
    /// underlying HTTP/1.1 hijacked connection is released cleanly.
    pub async fn exec_start_with_stdin(&self, exec_id: &str, payload: &[u8]) -> Result<(), ContainerError> {
        self.require(Scope::Exec, "exec_start_with_stdin")?;
        self.bounded(async {
            if let StartExecResults::Attached { mut output, mut input } = self.docker.start_exec(exec_id, None).await? {
                use tokio::io::AsyncWriteExt;
                input.write_all(payload).await.map_err(|e| ContainerError::Generic(e.to_string()))?;
                input.shutdown().await.map_err(|e| ContainerError::Generic(e.to_string()))?;
                while let Some(chunk) = output.next().await {
                    chunk?;
                }
            }
            Ok(())
        })
        .await
    }

    /// Convenience composite: create, start, and inspect the exit code,
    /// reporting per-phase failures distinctly.
    pub async fn exec_in_container(&self, id: &str, cmd: Vec<String>) -> Result<ExecResult, ContainerError> {
        let exec_id = self
            .exec_create(id, cmd)
            .await
            .map_err(|e| ContainerError::ExecFailed(format!("create: {e}")))?;
        let output = self
            .exec_start(&exec_id)
            .await
            .map_err(|e| ContainerError::ExecFailed(format!("start: {e}")))?;
        let inspect = self
            .docker
            .inspect_exec(&exec_id)
            .await
            .map_err(|e| ContainerError::ExecFailed(format!("inspect: {e}")))?;
        Ok(ExecResult { exit_code: inspect.exit_code.unwrap_or(-1), output })
    }

    // -----------------------------------------------------------------------
    // Introspection
    // -----------------------------------------------------------------------

    pub async fn inspect_container(&self, id: &str) -> Result<ContainerInspectResponse, ContainerError> {
        self.bounded(async { Ok(self.docker.inspect_container(id, None).await?) }).await
    }

    pub async fn container_logs(&self, id: &str) -> Result<Vec<String>, ContainerError> {
        let options = LogsOptions::<String> { stdout: true, stderr: true, ..Default::default() };
        let mut stream = self.docker.logs(id, Some(options));
        let mut lines = Vec::new();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            lines.push(chunk.to_string());
        }
        Ok(lines)
    }

    /// Owns the reader until cancellation or EOF: every
    /// non-EOF read error is delivered on `err_tx` exactly once; payload
    /// strings are delivered on `log_tx`; on cancellation the reader is
    /// dropped and both channels close cleanly.
    pub async fn stream_container_logs(
        &self,
        id: &str,
        log_tx: mpsc::UnboundedSender<String>,
        err_tx: mpsc::UnboundedSender<ContainerError>,
        cancel: CancellationToken,
    ) {
        let options = LogsOptions::<String> { stdout: true, stderr: true, follow: true, ..Default::default() };
        let mut stream = self.docker.logs(id, Some(options));
        loop {
            tokio::select! {
                _ = cancel.cancelled() => return,
                next = stream.next() => {
                    match next {
                        Some(Ok(chunk)) => {
                            if log_tx.send(chunk.to_string()).is_err() {
                                return;
                            }
                        }
                        Some(Err(e)) => {
                            let _ = err_tx.send(e.into());
                            return;
                        }
                        None => return, // EOF
                    }
                }
            }
        }
    }

    pub async fn wait_container(&self, id: &str) -> Result<i64, ContainerError> {
        let mut stream = self.docker.wait_container(id, None::<WaitContainerOptions<String>>);
        match stream.next().await {
            Some(Ok(result)) => Ok(result.status_code),
            Some(Err(e)) => Err(e.into()),
            None => Err(ContainerError::Generic("wait stream closed with no result".into())),
        }
    }

    pub async fn list_containers(&self, all: bool) -> Result<Vec<ContainerSummary>, ContainerError> {
        let options = ListContainersOptions::<String> { all, ..Default::default() };
        Ok(self.docker.list_containers(Some(options)).await?)
    }

    pub async fn get_container_events(&self, since_unix_secs: Option<i64>) -> Result<Vec<EventMessage>, ContainerError> {
        let mut filters: HashMap<String, Vec<String>> = HashMap::new();
        filters.insert("type".into(), vec!["container".into()]);
        let options = EventsOptions::<String> { since: since_unix_secs, until: None, filters };
        let mut stream = self.docker.events(Some(options));
        let mut events = Vec::new();
        // Bounded drain: callers polling for events expect a finite batch,
        // not an indefinite follow.
        while let Ok(Some(event)) = tokio::time::timeout(self.deadline, stream.next()).await {
            events.push(event?);
        }
        Ok(events)
    }

    pub async fn ping(&self) -> Result<(), ContainerError> {
        self.bounded(async {
            self.docker.ping().await?;
            Ok(())
        })
        .await
    }

    pub async fn image_exists(&self, image: &str) -> Result<bool, ContainerError> {
        match self.docker.inspect_image(image).await {
            Ok(_) => Ok(true),
            Err(bollard::errors::Error::DockerResponseServerError { status_code: 404, .. }) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// 5s timeout.
    pub async fn health_check(&self) -> Result<(), ContainerError> {
        match tokio::time::timeout(Duration::from_secs(5), self.docker.ping()).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(e.into()),
            Err(_) => Err(ContainerError::Timeout),
        }
    }

    pub async fn is_running(&self, id: &str) -> Result<bool, ContainerError> {
        let inspect = self.inspect_container(id).await?;
        Ok(inspect.state.and_then(|s| s.running).unwrap_or(false))
    }

    /// No persistent resources beyond the engine handle to release; exists
    /// for API symmetry with `vaultbridge-store::Store::close`.
    pub async fn close(self) -> Result<(), ContainerError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path_regex};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn full_scopes() -> ScopeSet {
        ScopeSet::new([Scope::Create, Scope::Exec, Scope::Remove])
    }

    /// S5: create-and-start a container against a faked engine and verify
    /// the hardening fields land in the create request the engine actually
    /// receives, that inspect reports them back, and that list excludes the
    /// container once removed.
    #[tokio::test]
    async fn create_start_inspect_remove_round_trip_carries_mandatory_hardening() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path_regex(r"^/v[\d.]+/containers/create$"))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({ "Id": "fakecontainerid" })))
            .mount(&mock_server)
            .await;
        Mock::given(method("POST"))
            .and(path_regex(r"^/v[\d.]+/containers/fakecontainerid/start$"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path_regex(r"^/v[\d.]+/containers/fakecontainerid/json$"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "Id": "fakecontainerid",
                "State": { "Running": true, "ExitCode": 0 },
                "HostConfig": {
                    "ReadonlyRootfs": true,
                    "CapDrop": ["ALL"],
                    "NetworkMode": "none",
                    "SecurityOpt": ["seccomp={\"defaultAction\":\"SCMP_ACT_ALLOW\"}"]
                }
            })))
            .mount(&mock_server)
            .await;
        Mock::given(method("DELETE"))
            .and(path_regex(r"^/v[\d.]+/containers/fakecontainerid$"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path_regex(r"^/v[\d.]+/containers/json$"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
            .mount(&mock_server)
            .await;

        let client = ScopedClient::connect_http_for_test(&mock_server.uri(), full_scopes()).unwrap();

        let spec = CreateSpec { image: "busybox".into(), env: vec![], cmd: None, host_config: HostConfig::default(), platform: None };
        let id = client.create_and_start_container("s5-test", spec).await.unwrap();
        assert_eq!(id, "fakecontainerid");

        let create_requests: Vec<_> = mock_server
            .received_requests()
            .await
            .unwrap()
            .into_iter()
            .filter(|r| r.url.path().ends_with("/containers/create"))
            .collect();
        assert_eq!(create_requests.len(), 1);
        let body: serde_json::Value = serde_json::from_slice(&create_requests[0].body).unwrap();
        assert_eq!(body["HostConfig"]["ReadonlyRootfs"], serde_json::json!(true));
        assert_eq!(body["HostConfig"]["NetworkMode"], serde_json::json!("none"));
        assert_eq!(body["HostConfig"]["CapDrop"], serde_json::json!(["ALL"]));
        assert!(body["HostConfig"]["SecurityOpt"].as_array().unwrap().iter().any(|v| v.as_str().unwrap().starts_with("seccomp=")));

        let inspect = client.inspect_container(&id).await.unwrap();
        let host_config = inspect.host_config.unwrap();
        assert_eq!(host_config.readonly_rootfs, Some(true));
        assert_eq!(host_config.network_mode.as_deref(), Some("none"));
        assert_eq!(host_config.cap_drop, Some(vec!["ALL".to_string()]));
        assert!(host_config.security_opt.unwrap().iter().any(|s| s.starts_with("seccomp=")));

        client.remove_container(&id, true).await.unwrap();
        let remaining = client.list_containers(true).await.unwrap();
        assert!(remaining.is_empty());
    }
}
