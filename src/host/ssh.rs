use std::env;
use std::fmt;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use ssh2::{OpenFlags, OpenType, RenameFlags};

use crate::constants::network;
use crate::errors::{HostError, Result};
use crate::host::{DirEntry, Host, Metadata, ProcessSpec};
use crate::pool::{lock_or_recover, SessionPool};
use crate::services::logger::Logger;
use crate::services::secret::Secret;
use crate::utils::{glob, paths, shellquote};

#[derive(Debug, Clone)]
struct Failure {
    error: HostError,
    at: Instant,
}

/// A machine reached over SSH. Identity is the logical `name`, which keys
/// the session pool; the transport and file-transfer sessions themselves
/// live in the injected [`SessionPool`].
pub struct SshRemote {
    name: String,
    username: String,
    hostname: String,
    port: u16,
    password: Option<Secret>,
    key_files: Vec<PathBuf>,
    pool: Arc<SessionPool>,
    failure: Mutex<Option<Failure>>,
    logger: Logger,
}

pub struct SshRemoteBuilder {
    name: String,
    username: Option<String>,
    hostname: String,
    port: u16,
    password: Option<Secret>,
    key_files: Vec<PathBuf>,
}

impl SshRemoteBuilder {
    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    pub fn hostname(mut self, hostname: impl Into<String>) -> Self {
        self.hostname = hostname.into();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn password(mut self, password: Secret) -> Self {
        self.password = Some(password);
        self
    }

    /// Add a private-key file to offer during authentication. Additive;
    /// passphrase-protected keys are not supported.
    pub fn key_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.key_files.push(path.into());
        self
    }

    pub fn build(self, pool: Arc<SessionPool>) -> SshRemote {
        let username = self
            .username
            .unwrap_or_else(|| env::var("USER").unwrap_or_default());
        let logger = Logger::new("ssh").child(&self.name);
        SshRemote {
            name: self.name,
            username,
            hostname: self.hostname,
            port: self.port,
            password: self.password,
            key_files: self.key_files,
            pool,
            failure: Mutex::new(None),
            logger,
        }
    }
}

impl SshRemote {
    pub fn builder(name: impl Into<String>) -> SshRemoteBuilder {
        SshRemoteBuilder {
            name: name.into(),
            username: None,
            hostname: String::new(),
            port: network::SSH_DEFAULT_PORT,
            password: None,
            key_files: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub(crate) fn ssh_hostname(&self) -> String {
        self.hostname.clone()
    }

    pub(crate) fn ssh_username(&self) -> String {
        self.username.clone()
    }

    pub(crate) fn ssh_password(&self) -> Option<&Secret> {
        self.password.as_ref()
    }

    pub(crate) fn key_files(&self) -> &[PathBuf] {
        &self.key_files
    }

    /// Replay the recorded dial failure while it is inside the backoff
    /// window; outside the window a fresh attempt is allowed.
    pub(crate) fn check_backoff(&self) -> Result<()> {
        let failure = lock_or_recover(&self.failure);
        if let Some(f) = failure.as_ref() {
            if f.at.elapsed() < Duration::from_millis(network::BACKOFF_WINDOW_MS) {
                return Err(f.error.clone());
            }
        }
        Ok(())
    }

    pub(crate) fn record_failure(&self, error: &HostError) {
        self.logger.debug(
            "dial failed",
            Some(&serde_json::json!({ "error": error.to_string() })),
        );
        let mut failure = lock_or_recover(&self.failure);
        *failure = Some(Failure {
            error: error.clone(),
            at: Instant::now(),
        });
    }

    pub(crate) fn clear_failure(&self) {
        let mut failure = lock_or_recover(&self.failure);
        *failure = None;
    }

    /// Close this remote's cached sessions in the pool.
    pub fn close(&self) {
        self.pool.close(&self.name);
    }

    fn sftp(&self) -> Result<Arc<Mutex<ssh2::Sftp>>> {
        self.pool.dial_sftp(self)
    }

    fn is_windows(&self) -> bool {
        self.server_version().to_ascii_lowercase().contains("windows")
    }

    fn resolve_err_file(&self, spec: &ProcessSpec) -> String {
        match spec.err_file.as_deref() {
            None | Some("") => "/dev/null".to_string(),
            Some(p) if paths::is_abs(p) => p.to_string(),
            Some(p) => paths::join(&spec.dir, p),
        }
    }

    fn walk_inner(
        &self,
        dir: &str,
        rel: &str,
        meta: &Metadata,
        f: &mut dyn FnMut(&str, &Metadata) -> Result<()>,
    ) -> Result<()> {
        f(rel, meta)?;
        if meta.is_dir() {
            let full = paths::join(dir, rel);
            for entry in self.read_dir(&full)? {
                let child_rel = paths::join(rel, &entry.name);
                self.walk_inner(dir, &child_rel, &entry.meta, f)?;
            }
        }
        Ok(())
    }
}

impl fmt::Display for SshRemote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

impl fmt::Debug for SshRemote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SshRemote")
            .field("name", &self.name)
            .field("username", &self.username)
            .field("hostname", &self.hostname)
            .field("port", &self.port)
            .field("key_files", &self.key_files)
            .finish_non_exhaustive()
    }
}

impl Host for SshRemote {
    fn name(&self) -> &str {
        &self.name
    }

    fn hostname(&self) -> String {
        self.hostname.clone()
    }

    fn username(&self) -> String {
        self.username.clone()
    }

    fn server_version(&self) -> String {
        match self.pool.dial(self) {
            Ok(session) => {
                let session = lock_or_recover(&session);
                session.banner().unwrap_or_default().to_string()
            }
            Err(_) => String::new(),
        }
    }

    fn is_local(&self) -> bool {
        false
    }

    /// A full dial, subject to backoff; not a lightweight ping.
    fn is_available(&self) -> Result<()> {
        self.pool.dial(self).map(drop)
    }

    fn last_error(&self) -> Option<HostError> {
        let recorded = {
            let failure = lock_or_recover(&self.failure);
            failure.clone()
        };
        match recorded {
            None => None,
            Some(f) if f.at.elapsed() < Duration::from_millis(network::BACKOFF_WINDOW_MS) => {
                Some(f.error)
            }
            // stale failure: see whether the host has come back
            Some(_) => self.pool.dial(self).err(),
        }
    }

    fn host_path(&self, path: &str) -> String {
        format!("{}:{}", self.name, path)
    }

    fn temp_dir(&self) -> String {
        if self.is_windows() {
            "C:\\TEMP".to_string()
        } else {
            "/tmp".to_string()
        }
    }

    fn abs(&self, path: &str) -> Result<String> {
        let sftp = self.sftp()?;
        let sftp = lock_or_recover(&sftp);
        sftp.realpath(Path::new(path))
            .map(|p| paths::to_slash(&p))
            .map_err(|err| HostError::from_ssh2(path, err))
    }

    fn getwd(&self) -> Result<String> {
        self.abs(".")
    }

    fn glob(&self, pattern: &str) -> Result<Vec<String>> {
        glob::expand(self, pattern)
    }

    fn stat(&self, path: &str) -> Result<Metadata> {
        let sftp = self.sftp()?;
        let sftp = lock_or_recover(&sftp);
        sftp.stat(Path::new(path))
            .map(|s| Metadata::from(&s))
            .map_err(|err| HostError::from_ssh2(path, err))
    }

    fn lstat(&self, path: &str) -> Result<Metadata> {
        let sftp = self.sftp()?;
        let sftp = lock_or_recover(&sftp);
        sftp.lstat(Path::new(path))
            .map(|s| Metadata::from(&s))
            .map_err(|err| HostError::from_ssh2(path, err))
    }

    fn symlink(&self, target: &str, link: &str) -> Result<()> {
        let sftp = self.sftp()?;
        let sftp = lock_or_recover(&sftp);
        sftp.symlink(Path::new(target), Path::new(link))
            .map_err(|err| HostError::from_ssh2(link, err))
    }

    fn readlink(&self, path: &str) -> Result<String> {
        let sftp = self.sftp()?;
        let sftp = lock_or_recover(&sftp);
        sftp.readlink(Path::new(path))
            .map(|p| paths::to_slash(&p))
            .map_err(|err| HostError::from_ssh2(path, err))
    }

    fn open(&self, path: &str) -> Result<Box<dyn Read>> {
        let sftp = self.sftp()?;
        let file = {
            let sftp = lock_or_recover(&sftp);
            sftp.open(Path::new(path))
                .map_err(|err| HostError::from_ssh2(path, err))?
        };
        Ok(Box::new(file))
    }

    fn create(&self, path: &str, mode: u32) -> Result<Box<dyn Write>> {
        let sftp = self.sftp()?;
        let file = {
            let sftp = lock_or_recover(&sftp);
            sftp.open_mode(
                Path::new(path),
                OpenFlags::WRITE | OpenFlags::CREATE | OpenFlags::TRUNCATE,
                mode as i32,
                OpenType::File,
            )
            .map_err(|err| HostError::from_ssh2(path, err))?
        };
        Ok(Box::new(file))
    }

    fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        let mut reader = self.open(path)?;
        let mut data = Vec::new();
        reader
            .read_to_end(&mut data)
            .map_err(|err| HostError::from_io(path, err))?;
        Ok(data)
    }

    fn write_file(&self, path: &str, data: &[u8], mode: u32) -> Result<()> {
        let mut writer = self.create(path, mode)?;
        writer
            .write_all(data)
            .map_err(|err| HostError::from_io(path, err))
    }

    fn read_dir(&self, path: &str) -> Result<Vec<DirEntry>> {
        let sftp = self.sftp()?;
        let listing = {
            let sftp = lock_or_recover(&sftp);
            sftp.readdir(Path::new(path))
                .map_err(|err| HostError::from_ssh2(path, err))?
        };
        let mut entries: Vec<DirEntry> = listing
            .iter()
            .filter_map(|(p, stat)| {
                let name = p.file_name()?.to_string_lossy().into_owned();
                if name == "." || name == ".." {
                    return None;
                }
                Some(DirEntry {
                    name,
                    meta: Metadata::from(stat),
                })
            })
            .collect();
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    fn mkdir_all(&self, path: &str, mode: u32) -> Result<()> {
        let sftp = self.sftp()?;
        let sftp = lock_or_recover(&sftp);
        let mut acc = if path.starts_with('/') {
            "/".to_string()
        } else {
            String::new()
        };
        for comp in path.split('/').filter(|c| !c.is_empty()) {
            acc = paths::join(&acc, comp);
            match sftp.stat(Path::new(&acc)) {
                Ok(stat) if stat.is_dir() => continue,
                Ok(_) => {
                    return Err(HostError::Io {
                        path: acc,
                        message: "not a directory".to_string(),
                    })
                }
                Err(_) => {
                    if let Err(err) = sftp.mkdir(Path::new(&acc), mode as i32) {
                        // tolerate a concurrent create of the same component
                        match sftp.stat(Path::new(&acc)) {
                            Ok(stat) if stat.is_dir() => continue,
                            _ => return Err(HostError::from_ssh2(&acc, err)),
                        }
                    }
                }
            }
        }
        Ok(())
    }

    fn rename(&self, old: &str, new: &str) -> Result<()> {
        let sftp = self.sftp()?;
        let sftp = lock_or_recover(&sftp);
        // overwrite-permitting rename, matching local semantics
        sftp.rename(
            Path::new(old),
            Path::new(new),
            Some(RenameFlags::ATOMIC | RenameFlags::OVERWRITE | RenameFlags::NATIVE),
        )
        .map_err(|err| HostError::from_ssh2(old, err))
    }

    fn remove(&self, path: &str) -> Result<()> {
        let meta = self.lstat(path)?;
        let sftp = self.sftp()?;
        let sftp = lock_or_recover(&sftp);
        let result = if meta.is_dir() {
            sftp.rmdir(Path::new(path))
        } else {
            sftp.unlink(Path::new(path))
        };
        result.map_err(|err| HostError::from_ssh2(path, err))
    }

    /// SFTP has no remove-tree primitive: walk the tree collecting paths,
    /// then remove children before parents.
    fn remove_all(&self, path: &str) -> Result<()> {
        let mut entries: Vec<(String, bool)> = Vec::new();
        match self.walk_dir(path, &mut |rel, meta| {
            entries.push((paths::join(path, rel), meta.is_dir()));
            Ok(())
        }) {
            Ok(()) => {}
            Err(HostError::NotFound(_)) => return Ok(()),
            Err(err) => return Err(err),
        }

        let sftp = self.sftp()?;
        let sftp = lock_or_recover(&sftp);
        for (entry_path, is_dir) in entries.iter().rev() {
            let result = if *is_dir {
                sftp.rmdir(Path::new(entry_path))
            } else {
                sftp.unlink(Path::new(entry_path))
            };
            result.map_err(|err| HostError::from_ssh2(entry_path, err))?;
        }
        Ok(())
    }

    fn chown(&self, path: &str, uid: u32, gid: u32) -> Result<()> {
        if self.is_windows() {
            return Err(HostError::not_supported("chown"));
        }
        let sftp = self.sftp()?;
        let sftp = lock_or_recover(&sftp);
        sftp.setstat(
            Path::new(path),
            ssh2::FileStat {
                size: None,
                uid: Some(uid),
                gid: Some(gid),
                perm: None,
                atime: None,
                mtime: None,
            },
        )
        .map_err(|err| HostError::from_ssh2(path, err))
    }

    // SFTP has no lchown; plain chown is issued for symlinks too
    fn lchown(&self, path: &str, uid: u32, gid: u32) -> Result<()> {
        self.chown(path, uid, gid)
    }

    fn chtimes(&self, path: &str, atime: SystemTime, mtime: SystemTime) -> Result<()> {
        let to_secs = |t: SystemTime| {
            t.duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or(0)
        };
        let sftp = self.sftp()?;
        let sftp = lock_or_recover(&sftp);
        sftp.setstat(
            Path::new(path),
            ssh2::FileStat {
                size: None,
                uid: None,
                gid: None,
                perm: None,
                atime: Some(to_secs(atime)),
                mtime: Some(to_secs(mtime)),
            },
        )
        .map_err(|err| HostError::from_ssh2(path, err))
    }

    fn walk_dir(
        &self,
        dir: &str,
        f: &mut dyn FnMut(&str, &Metadata) -> Result<()>,
    ) -> Result<()> {
        let meta = self.lstat(dir)?;
        self.walk_inner(dir, "", &meta, f)
    }

    /// Runs `kill` in a short-lived session. An unreachable remote degrades
    /// to a connection error rather than a no-such-process error.
    fn signal(&self, pid: i32, signal: i32) -> Result<()> {
        if self.is_windows() {
            return Err(HostError::not_supported("signal"));
        }
        let mut channel = self.pool.open_channel(self)?;
        let _ = channel.exec(&format!("kill -s {} {}", signal, pid));
        let mut sink = Vec::new();
        let _ = channel.read_to_end(&mut sink);
        let _ = channel.wait_close();
        Ok(())
    }

    /// Drives an interactive shell so the remote shell keeps the child
    /// alive after the SSH session closes. Lossy by design: no PID or wait
    /// handle comes back; rediscovery is by scanning command lines later.
    fn start(&self, spec: &ProcessSpec) -> Result<()> {
        if self.is_windows() {
            return Err(HostError::not_supported("detached start"));
        }
        let err_file = self.resolve_err_file(spec);
        let script = detach_script(spec, &err_file);

        let mut channel = self.pool.open_channel(self)?;
        channel
            .shell()
            .map_err(|err| HostError::ssh(format!("shell on {}: {}", self.name, err)))?;
        channel
            .write_all(script.as_bytes())
            .map_err(|err| HostError::ssh(format!("shell write on {}: {}", self.name, err)))?;
        channel
            .send_eof()
            .map_err(|err| HostError::ssh(format!("shell eof on {}: {}", self.name, err)))?;
        channel
            .wait_close()
            .map_err(|err| HostError::ssh(format!("shell close on {}: {}", self.name, err)))?;
        Ok(())
    }

    fn run(&self, spec: &ProcessSpec) -> Result<Vec<u8>> {
        if self.is_windows() {
            return Err(HostError::not_supported("run"));
        }
        let cmdline = run_command_line(spec);

        let mut channel = self.pool.open_channel(self)?;
        channel
            .exec(&cmdline)
            .map_err(|err| HostError::ssh(format!("exec on {}: {}", self.name, err)))?;

        let mut stdout = Vec::new();
        channel
            .read_to_end(&mut stdout)
            .map_err(|err| HostError::ssh(format!("read on {}: {}", self.name, err)))?;
        let mut stderr = Vec::new();
        let _ = channel.stderr().read_to_end(&mut stderr);
        let _ = channel.wait_close();
        let status = channel
            .exit_status()
            .map_err(|err| HostError::ssh(format!("exit status on {}: {}", self.name, err)))?;

        match spec.err_file.as_deref() {
            Some(p) if !p.is_empty() => {
                let err_file = self.resolve_err_file(spec);
                self.write_file(&err_file, &stderr, crate::constants::perms::DEFAULT_FILE_MODE)?;
            }
            _ => stdout.extend_from_slice(&stderr),
        }

        if status != 0 {
            return Err(HostError::ExitStatus {
                code: status,
                output: stdout,
            });
        }
        Ok(stdout)
    }
}

/// Shell script sent to a remote interactive shell for a detached start:
/// change directory, export environment, launch backgrounded with output
/// redirected, exit. Every value goes through the quoting function.
pub(crate) fn detach_script(spec: &ProcessSpec, err_file: &str) -> String {
    let mut script = String::new();
    if !spec.dir.is_empty() {
        script.push_str(&format!("cd {}\n", shellquote::quote(&spec.dir)));
    }
    for (key, value) in &spec.env {
        script.push_str(&format!("export {}={}\n", key, shellquote::quote(value)));
    }
    script.push_str(&format!(
        "{} >> {} 2>&1 &\n",
        shellquote::join(&spec.command_line()),
        shellquote::quote(err_file)
    ));
    script.push_str("exit\n");
    script
}

/// Single command line for a synchronous remote run.
pub(crate) fn run_command_line(spec: &ProcessSpec) -> String {
    let mut parts: Vec<String> = Vec::new();
    for (key, value) in &spec.env {
        parts.push(format!("{}={}", key, shellquote::quote(value)));
    }
    parts.push(shellquote::join(&spec.command_line()));
    let body = parts.join(" ");
    if spec.dir.is_empty() {
        body
    } else {
        format!("cd {} && {}", shellquote::quote(&spec.dir), body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::Connector;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FailingConnector {
        calls: AtomicUsize,
    }

    impl Connector for FailingConnector {
        fn connect(&self, remote: &SshRemote) -> Result<ssh2::Session> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(HostError::not_available(
                remote.name(),
                "connection refused",
            ))
        }
    }

    struct SlowConnector {
        calls: AtomicUsize,
    }

    impl Connector for SlowConnector {
        fn connect(&self, _remote: &SshRemote) -> Result<ssh2::Session> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(100));
            ssh2::Session::new().map_err(|err| HostError::ssh(err.to_string()))
        }
    }

    fn failing_pool() -> (Arc<SessionPool>, &'static FailingConnector) {
        let connector: &'static FailingConnector = Box::leak(Box::new(FailingConnector {
            calls: AtomicUsize::new(0),
        }));
        struct Fwd(&'static FailingConnector);
        impl Connector for Fwd {
            fn connect(&self, remote: &SshRemote) -> Result<ssh2::Session> {
                self.0.connect(remote)
            }
        }
        (
            Arc::new(SessionPool::with_connector(Box::new(Fwd(connector)))),
            connector,
        )
    }

    #[test]
    fn builder_defaults() {
        let pool = Arc::new(SessionPool::new());
        let remote = SshRemote::builder("web1")
            .hostname("web1.example.com")
            .build(pool);
        assert_eq!(remote.name(), "web1");
        assert_eq!(remote.port(), 22);
        assert_eq!(Host::hostname(&remote), "web1.example.com");
        assert_eq!(remote.host_path("/opt/app"), "web1:/opt/app");
        assert!(!remote.is_local());
    }

    #[test]
    fn missing_hostname_is_invalid_args() {
        let pool = Arc::new(SessionPool::new());
        let remote = SshRemote::builder("bare").build(pool.clone());
        match pool.dial(&remote).err() {
            Some(HostError::InvalidArgs(msg)) => assert!(msg.contains("bare")),
            other => panic!("expected InvalidArgs, got {other:?}"),
        }
    }

    #[test]
    fn unresolvable_hostname_is_not_available() {
        let pool = Arc::new(SessionPool::new());
        let remote = SshRemote::builder("noaddr")
            .hostname("256.256.256.256")
            .port(2222)
            .build(pool.clone());
        match pool.dial(&remote).err() {
            Some(HostError::NotAvailable { host, .. }) => assert_eq!(host, "noaddr"),
            other => panic!("expected NotAvailable, got {other:?}"),
        }
    }

    #[test]
    fn backoff_replays_recorded_error_without_new_attempt() {
        let (pool, connector) = failing_pool();
        let remote = SshRemote::builder("down")
            .hostname("down.example.com")
            .build(pool.clone());

        let first = pool.dial(&remote).err().expect("dial should fail");
        let second = pool.dial(&remote).err().expect("dial should fail");
        assert_eq!(first, second);
        assert_eq!(connector.calls.load(Ordering::SeqCst), 1);

        assert!(remote.is_available().is_err());
        assert_eq!(connector.calls.load(Ordering::SeqCst), 1);
        assert_eq!(remote.last_error(), Some(first));
    }

    #[test]
    fn expired_backoff_allows_fresh_attempt() {
        let (pool, connector) = failing_pool();
        let remote = SshRemote::builder("flaky")
            .hostname("flaky.example.com")
            .build(pool.clone());

        assert!(pool.dial(&remote).is_err());
        assert_eq!(connector.calls.load(Ordering::SeqCst), 1);

        // age the failure record past the backoff window
        {
            let mut failure = lock_or_recover(&remote.failure);
            if let Some(f) = failure.as_mut() {
                f.at = Instant::now() - Duration::from_secs(6);
            }
        }

        assert!(pool.dial(&remote).is_err());
        assert_eq!(connector.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn concurrent_first_dials_open_one_connection() {
        let connector: &'static SlowConnector = Box::leak(Box::new(SlowConnector {
            calls: AtomicUsize::new(0),
        }));
        struct Fwd(&'static SlowConnector);
        impl Connector for Fwd {
            fn connect(&self, remote: &SshRemote) -> Result<ssh2::Session> {
                self.0.connect(remote)
            }
        }
        let pool = Arc::new(SessionPool::with_connector(Box::new(Fwd(connector))));
        let remote = Arc::new(
            SshRemote::builder("busy")
                .hostname("busy.example.com")
                .build(pool.clone()),
        );

        let mut handles = Vec::new();
        for _ in 0..4 {
            let pool = pool.clone();
            let remote = remote.clone();
            handles.push(std::thread::spawn(move || pool.dial(&remote).is_ok()));
        }
        for handle in handles {
            assert!(handle.join().expect("dial thread"));
        }
        assert_eq!(connector.calls.load(Ordering::SeqCst), 1);
        assert!(pool.is_cached("busy"));

        pool.close("busy");
        assert!(!pool.is_cached("busy"));
        // idempotent
        pool.close("busy");
    }

    #[test]
    fn detach_script_quotes_every_argument() {
        let spec = ProcessSpec::new("/opt/app/bin/server")
            .arg("-name")
            .arg("Demo Gateway")
            .dir("/opt/app")
            .env("APP_HOME", "/opt/app")
            .err_file("server.log");
        let script = detach_script(&spec, "/opt/app/server.log");
        assert_eq!(
            script,
            "cd '/opt/app'\n\
             export APP_HOME='/opt/app'\n\
             '/opt/app/bin/server' '-name' 'Demo Gateway' >> '/opt/app/server.log' 2>&1 &\n\
             exit\n"
        );
    }

    #[test]
    fn run_command_line_includes_env_and_dir() {
        let spec = ProcessSpec::new("uname")
            .arg("-a")
            .dir("/tmp")
            .env("LANG", "C");
        assert_eq!(run_command_line(&spec), "cd '/tmp' && LANG='C' 'uname' '-a'");
    }

    #[test]
    fn run_command_line_without_dir() {
        let spec = ProcessSpec::new("true");
        assert_eq!(run_command_line(&spec), "'true'");
    }

    #[test]
    fn debug_omits_password() {
        let pool = Arc::new(SessionPool::new());
        let remote = SshRemote::builder("sec")
            .hostname("sec.example.com")
            .password(Secret::new("hunter2"))
            .build(pool);
        let rendered = format!("{:?}", remote);
        assert!(!rendered.contains("hunter2"));
    }
}
