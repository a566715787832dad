use std::env;
use std::net::{TcpStream, ToSocketAddrs};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use dashmap::DashMap;
use ssh2::{CheckResult, KnownHostFileKind, Session, Sftp};

use crate::constants::{network, retry};
use crate::errors::{HostError, Result};
use crate::host::ssh::SshRemote;
use crate::services::logger::Logger;

// libssh2 error for a rejected channel open (remote concurrent-session cap)
const LIBSSH2_ERROR_CHANNEL_FAILURE: i32 = -21;

/// Establishes an authenticated transport session for a remote. The pool
/// owns one of these; tests swap in counting or failing implementations.
pub trait Connector: Send + Sync {
    fn connect(&self, remote: &SshRemote) -> Result<Session>;
}

/// Per-identity cache of transport and file-transfer sessions. Sessions are
/// created lazily on first need and destroyed only by explicit close; there
/// is no idle eviction. The pool is an injected object rather than process
/// state, so independent configurations can coexist in one process.
pub struct SessionPool {
    logger: Logger,
    connector: Box<dyn Connector>,
    sessions: DashMap<String, Arc<Mutex<Session>>>,
    sftp_sessions: DashMap<String, Arc<Mutex<Sftp>>>,
    dial_guards: DashMap<String, Arc<Mutex<()>>>,
}

impl SessionPool {
    pub fn new() -> Self {
        Self::with_connector(Box::new(SshConnector))
    }

    pub fn with_connector(connector: Box<dyn Connector>) -> Self {
        Self {
            logger: Logger::new("pool"),
            connector,
            sessions: DashMap::new(),
            sftp_sessions: DashMap::new(),
            dial_guards: DashMap::new(),
        }
    }

    /// Return the cached transport session for a remote, establishing one if
    /// needed. A failure recorded within the backoff window is replayed
    /// without a network attempt; a per-identity guard ensures concurrent
    /// first callers open exactly one connection.
    pub fn dial(&self, remote: &SshRemote) -> Result<Arc<Mutex<Session>>> {
        remote.check_backoff()?;

        if let Some(cached) = self.sessions.get(remote.name()) {
            return Ok(cached.value().clone());
        }

        let guard = self.dial_guard(remote.name());
        let _flight = lock_or_recover(&guard);

        if let Some(cached) = self.sessions.get(remote.name()) {
            return Ok(cached.value().clone());
        }

        self.logger.debug(
            "dialing",
            Some(&serde_json::json!({ "host": remote.name() })),
        );
        match self.connector.connect(remote) {
            Ok(session) => {
                remote.clear_failure();
                let handle = Arc::new(Mutex::new(session));
                self.sessions
                    .insert(remote.name().to_string(), handle.clone());
                Ok(handle)
            }
            Err(err) => {
                remote.record_failure(&err);
                Err(err)
            }
        }
    }

    /// Return the cached file-transfer session for a remote, layering one on
    /// a successful `dial` if needed.
    pub fn dial_sftp(&self, remote: &SshRemote) -> Result<Arc<Mutex<Sftp>>> {
        if let Some(cached) = self.sftp_sessions.get(remote.name()) {
            return Ok(cached.value().clone());
        }

        let guard = self.dial_guard(&format!("sftp\u{0}{}", remote.name()));
        let _flight = lock_or_recover(&guard);

        if let Some(cached) = self.sftp_sessions.get(remote.name()) {
            return Ok(cached.value().clone());
        }

        let session = self.dial(remote)?;
        let sftp = {
            let session = lock_or_recover(&session);
            session.sftp()
        };
        match sftp {
            Ok(sftp) => {
                let handle = Arc::new(Mutex::new(sftp));
                self.sftp_sessions
                    .insert(remote.name().to_string(), handle.clone());
                Ok(handle)
            }
            Err(err) => {
                let err = HostError::ssh(format!("sftp subsystem: {}", err));
                remote.record_failure(&err);
                Err(err)
            }
        }
    }

    /// Open a per-command session channel, retrying when the remote rejects
    /// the open because of its concurrent-session cap. Any other error class
    /// fails immediately.
    pub fn open_channel(&self, remote: &SshRemote) -> Result<ssh2::Channel> {
        let session = self.dial(remote)?;
        let mut last_err: Option<ssh2::Error> = None;
        for attempt in 0..retry::SESSION_OPEN_ATTEMPTS {
            let result = {
                let session = lock_or_recover(&session);
                session.channel_session()
            };
            match result {
                Ok(channel) => return Ok(channel),
                Err(err) => {
                    let retryable = matches!(
                        err.code(),
                        ssh2::ErrorCode::Session(LIBSSH2_ERROR_CHANNEL_FAILURE)
                    );
                    last_err = Some(err);
                    if !retryable {
                        break;
                    }
                    if attempt + 1 < retry::SESSION_OPEN_ATTEMPTS {
                        std::thread::sleep(Duration::from_millis(retry::SESSION_OPEN_DELAY_MS));
                    }
                }
            }
        }
        Err(HostError::ssh(format!(
            "channel open on {}: {}",
            remote.name(),
            last_err.map(|e| e.to_string()).unwrap_or_default()
        )))
    }

    /// Tear down the file-transfer session, then the transport session, for
    /// one identity. Idempotent.
    pub fn close(&self, name: &str) {
        if let Some((_, sftp)) = self.sftp_sessions.remove(name) {
            drop(sftp);
        }
        if let Some((_, session)) = self.sessions.remove(name) {
            let session = lock_or_recover(&session);
            let _ = session.disconnect(None, "closing", None);
        }
        self.logger
            .debug("closed", Some(&serde_json::json!({ "host": name })));
    }

    pub fn close_all(&self) {
        let names: Vec<String> = self.sessions.iter().map(|e| e.key().clone()).collect();
        for name in names {
            self.close(&name);
        }
        self.sftp_sessions.clear();
    }

    pub fn is_cached(&self, name: &str) -> bool {
        self.sessions.contains_key(name)
    }

    fn dial_guard(&self, key: &str) -> Arc<Mutex<()>> {
        self.dial_guards
            .entry(key.to_string())
            .or_default()
            .value()
            .clone()
    }
}

impl Default for SessionPool {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) fn lock_or_recover<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|err| err.into_inner())
}

/// Default connector: TCP with a fixed dial timeout, handshake, host-key
/// verification against the user's known_hosts (fail closed), then agent,
/// key-file and password authentication.
pub struct SshConnector;

impl Connector for SshConnector {
    fn connect(&self, remote: &SshRemote) -> Result<Session> {
        let hostname = remote.ssh_hostname();
        if hostname.is_empty() {
            return Err(HostError::invalid_args(format!(
                "hostname not set for remote {}",
                remote.name()
            )));
        }
        let port = remote.port();
        let addr = format!("{}:{}", hostname, port);
        let sock_addr = addr
            .to_socket_addrs()
            .map_err(|err| HostError::not_available(remote.name(), err.to_string()))?
            .next()
            .ok_or_else(|| {
                HostError::not_available(remote.name(), format!("no address for {}", addr))
            })?;

        let tcp = TcpStream::connect_timeout(
            &sock_addr,
            Duration::from_millis(network::DIAL_TIMEOUT_MS),
        )
        .map_err(|err| HostError::not_available(remote.name(), err.to_string()))?;

        let mut session =
            Session::new().map_err(|err| HostError::ssh(format!("session init: {}", err)))?;
        session.set_tcp_stream(tcp);
        session.set_timeout(network::DIAL_TIMEOUT_MS as u32);
        session
            .handshake()
            .map_err(|err| HostError::ssh(format!("handshake with {}: {}", addr, err)))?;

        verify_known_host(&session, &hostname, port)?;
        authenticate(&session, remote, &hostname)?;

        Ok(session)
    }
}

/// Check the server's host key against `$HOME/.ssh/known_hosts`. Unknown
/// hosts fail closed; there is no trust-on-first-use prompt.
fn verify_known_host(session: &Session, hostname: &str, port: u16) -> Result<()> {
    let home = env::var("HOME")
        .map_err(|_| HostError::ssh("HOME not set, cannot locate known_hosts"))?;
    let path = Path::new(&home).join(network::KNOWN_HOSTS_REL_PATH);

    let mut known_hosts = session
        .known_hosts()
        .map_err(|err| HostError::ssh(format!("known_hosts init: {}", err)))?;
    known_hosts
        .read_file(&path, KnownHostFileKind::OpenSSH)
        .map_err(|err| {
            HostError::ssh(format!(
                "cannot read {}: {} (remote host keys must be added manually)",
                path.display(),
                err
            ))
        })?;

    let (key, _key_type) = session
        .host_key()
        .ok_or_else(|| HostError::ssh(format!("no host key presented by {}", hostname)))?;

    match known_hosts.check_port(hostname, port, key) {
        CheckResult::Match => Ok(()),
        CheckResult::NotFound => Err(HostError::ssh(format!(
            "{} not in known_hosts (add the host key manually; trust-on-first-use is not supported)",
            hostname
        ))),
        CheckResult::Mismatch => Err(HostError::ssh(format!(
            "host key mismatch for {}",
            hostname
        ))),
        CheckResult::Failure => Err(HostError::ssh(format!(
            "host key check failed for {}",
            hostname
        ))),
    }
}

/// Try every available method: agent identities when the agent socket is
/// present, then supplied private keys (no passphrase support), then the
/// password enclave.
fn authenticate(session: &Session, remote: &SshRemote, hostname: &str) -> Result<()> {
    let username = remote.ssh_username();

    if env::var(network::AGENT_SOCK_ENV).is_ok() {
        if let Ok(mut agent) = session.agent() {
            if agent.connect().is_ok() && agent.list_identities().is_ok() {
                if let Ok(identities) = agent.identities() {
                    for identity in identities {
                        if agent.userauth(&username, &identity).is_ok()
                            && session.authenticated()
                        {
                            break;
                        }
                    }
                }
            }
        }
    }

    if !session.authenticated() {
        for key_file in remote.key_files() {
            if session
                .userauth_pubkey_file(&username, None, key_file, None)
                .is_ok()
                && session.authenticated()
            {
                break;
            }
        }
    }

    if !session.authenticated() {
        if let Some(password) = remote.ssh_password() {
            let _ = session.userauth_password(&username, password.reveal_str());
        }
    }

    if !session.authenticated() {
        return Err(HostError::ssh(format!(
            "authentication failed for {}@{}",
            username, hostname
        )));
    }
    Ok(())
}
