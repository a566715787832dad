pub mod local;
pub mod ssh;

use std::fmt;
use std::io::{Read, Write};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::errors::{HostError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Dir,
    Symlink,
    Other,
}

/// Host-agnostic file metadata, built from `std::fs::Metadata` locally and
/// from SFTP attributes remotely. `mode` carries permission bits only.
#[derive(Debug, Clone)]
pub struct Metadata {
    pub size: u64,
    pub mode: u32,
    pub kind: EntryKind,
    pub modified: Option<SystemTime>,
    pub uid: Option<u32>,
    pub gid: Option<u32>,
}

impl Metadata {
    pub fn len(&self) -> u64 {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Dir
    }

    pub fn is_file(&self) -> bool {
        self.kind == EntryKind::File
    }

    pub fn is_symlink(&self) -> bool {
        self.kind == EntryKind::Symlink
    }
}

impl From<std::fs::Metadata> for Metadata {
    fn from(meta: std::fs::Metadata) -> Self {
        use std::os::unix::fs::PermissionsExt;

        let ft = meta.file_type();
        let kind = if ft.is_symlink() {
            EntryKind::Symlink
        } else if ft.is_dir() {
            EntryKind::Dir
        } else if ft.is_file() {
            EntryKind::File
        } else {
            EntryKind::Other
        };
        Metadata {
            size: meta.len(),
            mode: meta.permissions().mode() & 0o7777,
            kind,
            modified: meta.modified().ok(),
            uid: None,
            gid: None,
        }
    }
}

impl From<&ssh2::FileStat> for Metadata {
    fn from(stat: &ssh2::FileStat) -> Self {
        let raw = stat.perm.unwrap_or(0);
        let kind = match raw & 0o170000 {
            0o040000 => EntryKind::Dir,
            0o120000 => EntryKind::Symlink,
            0o100000 => EntryKind::File,
            _ => EntryKind::Other,
        };
        Metadata {
            size: stat.size.unwrap_or(0),
            mode: raw & 0o7777,
            kind,
            modified: stat
                .mtime
                .map(|secs| UNIX_EPOCH + Duration::from_secs(secs)),
            uid: stat.uid,
            gid: stat.gid,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DirEntry {
    pub name: String,
    pub meta: Metadata,
}

/// Description of a process to start or run on a host. `err_file` receives
/// the child's output; when unset the null device is used. A relative
/// `err_file` resolves against `dir`.
#[derive(Debug, Clone, Default)]
pub struct ProcessSpec {
    pub program: String,
    pub args: Vec<String>,
    pub dir: String,
    pub env: Vec<(String, String)>,
    pub err_file: Option<String>,
}

impl ProcessSpec {
    pub fn new(program: impl Into<String>) -> Self {
        ProcessSpec {
            program: program.into(),
            ..Default::default()
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn dir(mut self, dir: impl Into<String>) -> Self {
        self.dir = dir.into();
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn err_file(mut self, path: impl Into<String>) -> Self {
        self.err_file = Some(path.into());
        self
    }

    /// Command line as `program` followed by `args`.
    pub fn command_line(&self) -> Vec<String> {
        let mut line = Vec::with_capacity(1 + self.args.len());
        line.push(self.program.clone());
        line.extend(self.args.iter().cloned());
        line
    }
}

/// The operation surface every target supports, whether local or reached
/// over SSH. Callers hold a `&dyn Host` and never branch on locality; every
/// operation returns a typed error rather than panicking.
pub trait Host: Send + Sync + fmt::Display {
    // informational
    fn name(&self) -> &str;
    fn hostname(&self) -> String;
    fn username(&self) -> String;
    fn server_version(&self) -> String;
    fn is_local(&self) -> bool;
    fn is_available(&self) -> Result<()>;
    fn last_error(&self) -> Option<HostError>;
    /// Path string for display, prefixed `name:` when the host is remote.
    fn host_path(&self, path: &str) -> String;
    fn temp_dir(&self) -> String;

    // path and metadata
    fn abs(&self, path: &str) -> Result<String>;
    fn getwd(&self) -> Result<String>;
    fn glob(&self, pattern: &str) -> Result<Vec<String>>;
    fn stat(&self, path: &str) -> Result<Metadata>;
    fn lstat(&self, path: &str) -> Result<Metadata>;
    fn symlink(&self, target: &str, link: &str) -> Result<()>;
    fn readlink(&self, path: &str) -> Result<String>;

    // file content
    fn open(&self, path: &str) -> Result<Box<dyn Read>>;
    fn create(&self, path: &str, mode: u32) -> Result<Box<dyn Write>>;
    fn read_file(&self, path: &str) -> Result<Vec<u8>>;
    fn write_file(&self, path: &str, data: &[u8], mode: u32) -> Result<()>;
    /// Directory entries sorted by name.
    fn read_dir(&self, path: &str) -> Result<Vec<DirEntry>>;
    fn mkdir_all(&self, path: &str, mode: u32) -> Result<()>;
    fn rename(&self, old: &str, new: &str) -> Result<()>;
    fn remove(&self, path: &str) -> Result<()>;
    fn remove_all(&self, path: &str) -> Result<()>;
    fn chown(&self, path: &str, uid: u32, gid: u32) -> Result<()>;
    fn lchown(&self, path: &str, uid: u32, gid: u32) -> Result<()>;
    fn chtimes(&self, path: &str, atime: SystemTime, mtime: SystemTime) -> Result<()>;

    /// Depth-first traversal, parents strictly before descendants; symlinks
    /// are reported, not followed. `f` receives the path relative to `dir`
    /// (empty string for `dir` itself).
    fn walk_dir(
        &self,
        dir: &str,
        f: &mut dyn FnMut(&str, &Metadata) -> Result<()>,
    ) -> Result<()>;

    // process control
    fn signal(&self, pid: i32, signal: i32) -> Result<()>;
    /// Start a detached process that outlives the caller. No PID or wait
    /// handle is returned.
    fn start(&self, spec: &ProcessSpec) -> Result<()>;
    /// Run a process synchronously, returning captured output.
    fn run(&self, spec: &ProcessSpec) -> Result<Vec<u8>>;
}
