use std::env;
use std::fmt;
use std::fs;
use std::io::{Read, Write};
use std::os::unix::fs::{DirBuilderExt, OpenOptionsExt};
use std::process::{Command, Stdio};
use std::time::SystemTime;

use once_cell::sync::Lazy;

use crate::constants::perms;
use crate::errors::{HostError, Result};
use crate::host::{DirEntry, Host, Metadata, ProcessSpec};
use crate::utils::{glob, paths};

/// The local machine. Stateless; every operation maps directly to an OS
/// call.
#[derive(Debug, Default, Clone, Copy)]
pub struct Local;

pub static LOCALHOST: Lazy<Local> = Lazy::new(|| Local);

impl Local {
    pub fn new() -> Self {
        Local
    }

    fn resolve_err_file(&self, spec: &ProcessSpec) -> String {
        match spec.err_file.as_deref() {
            None | Some("") => "/dev/null".to_string(),
            Some(p) if paths::is_abs(p) => p.to_string(),
            Some(p) => paths::join(&spec.dir, p),
        }
    }

    fn build_command(&self, spec: &ProcessSpec) -> Command {
        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args);
        if !spec.dir.is_empty() {
            cmd.current_dir(&spec.dir);
        }
        for (key, value) in &spec.env {
            cmd.env(key, value);
        }
        cmd
    }
}

impl fmt::Display for Local {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("localhost")
    }
}

impl Host for Local {
    fn name(&self) -> &str {
        "localhost"
    }

    fn hostname(&self) -> String {
        os_hostname()
    }

    fn username(&self) -> String {
        env::var("USER").unwrap_or_default()
    }

    fn server_version(&self) -> String {
        env::consts::OS.to_string()
    }

    fn is_local(&self) -> bool {
        true
    }

    fn is_available(&self) -> Result<()> {
        Ok(())
    }

    fn last_error(&self) -> Option<HostError> {
        None
    }

    fn host_path(&self, path: &str) -> String {
        path.to_string()
    }

    fn temp_dir(&self) -> String {
        paths::to_slash(&env::temp_dir())
    }

    fn abs(&self, path: &str) -> Result<String> {
        let abs = std::path::absolute(path).map_err(|err| HostError::from_io(path, err))?;
        Ok(paths::to_slash(&abs))
    }

    fn getwd(&self) -> Result<String> {
        let cwd = env::current_dir().map_err(|err| HostError::from_io(".", err))?;
        Ok(paths::to_slash(&cwd))
    }

    fn glob(&self, pattern: &str) -> Result<Vec<String>> {
        glob::expand(self, pattern)
    }

    fn stat(&self, path: &str) -> Result<Metadata> {
        fs::metadata(path)
            .map(Metadata::from)
            .map_err(|err| HostError::from_io(path, err))
    }

    fn lstat(&self, path: &str) -> Result<Metadata> {
        fs::symlink_metadata(path)
            .map(Metadata::from)
            .map_err(|err| HostError::from_io(path, err))
    }

    fn symlink(&self, target: &str, link: &str) -> Result<()> {
        std::os::unix::fs::symlink(target, link).map_err(|err| HostError::from_io(link, err))
    }

    fn readlink(&self, path: &str) -> Result<String> {
        let target = fs::read_link(path).map_err(|err| HostError::from_io(path, err))?;
        Ok(paths::to_slash(&target))
    }

    fn open(&self, path: &str) -> Result<Box<dyn Read>> {
        let f = fs::File::open(path).map_err(|err| HostError::from_io(path, err))?;
        Ok(Box::new(f))
    }

    fn create(&self, path: &str, mode: u32) -> Result<Box<dyn Write>> {
        let f = fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(mode)
            .open(path)
            .map_err(|err| HostError::from_io(path, err))?;
        Ok(Box::new(f))
    }

    fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        fs::read(path).map_err(|err| HostError::from_io(path, err))
    }

    fn write_file(&self, path: &str, data: &[u8], mode: u32) -> Result<()> {
        let mut f = fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(mode)
            .open(path)
            .map_err(|err| HostError::from_io(path, err))?;
        f.write_all(data).map_err(|err| HostError::from_io(path, err))
    }

    fn read_dir(&self, path: &str) -> Result<Vec<DirEntry>> {
        let mut entries = Vec::new();
        for entry in fs::read_dir(path).map_err(|err| HostError::from_io(path, err))? {
            let entry = entry.map_err(|err| HostError::from_io(path, err))?;
            let meta = entry
                .metadata()
                .map_err(|err| HostError::from_io(path, err))?;
            entries.push(DirEntry {
                name: entry.file_name().to_string_lossy().into_owned(),
                meta: Metadata::from(meta),
            });
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    fn mkdir_all(&self, path: &str, mode: u32) -> Result<()> {
        fs::DirBuilder::new()
            .recursive(true)
            .mode(mode)
            .create(path)
            .map_err(|err| HostError::from_io(path, err))
    }

    fn rename(&self, old: &str, new: &str) -> Result<()> {
        fs::rename(old, new).map_err(|err| HostError::from_io(old, err))
    }

    fn remove(&self, path: &str) -> Result<()> {
        let meta = self.lstat(path)?;
        let res = if meta.is_dir() {
            fs::remove_dir(path)
        } else {
            fs::remove_file(path)
        };
        res.map_err(|err| HostError::from_io(path, err))
    }

    fn remove_all(&self, path: &str) -> Result<()> {
        match fs::remove_dir_all(path) {
            Ok(()) => Ok(()),
            // match remove-tree semantics: nothing there is success
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            // a plain file still gets removed
            Err(_) if self.lstat(path).map(|m| !m.is_dir()).unwrap_or(false) => self.remove(path),
            Err(err) => Err(HostError::from_io(path, err)),
        }
    }

    fn chown(&self, path: &str, uid: u32, gid: u32) -> Result<()> {
        std::os::unix::fs::chown(path, Some(uid), Some(gid))
            .map_err(|err| HostError::from_io(path, err))
    }

    fn lchown(&self, path: &str, uid: u32, gid: u32) -> Result<()> {
        std::os::unix::fs::lchown(path, Some(uid), Some(gid))
            .map_err(|err| HostError::from_io(path, err))
    }

    fn chtimes(&self, path: &str, atime: SystemTime, mtime: SystemTime) -> Result<()> {
        filetime::set_file_times(
            path,
            filetime::FileTime::from_system_time(atime),
            filetime::FileTime::from_system_time(mtime),
        )
        .map_err(|err| HostError::from_io(path, err))
    }

    fn walk_dir(
        &self,
        dir: &str,
        f: &mut dyn FnMut(&str, &Metadata) -> Result<()>,
    ) -> Result<()> {
        for entry in walkdir::WalkDir::new(dir).follow_links(false) {
            let entry = entry.map_err(|err| {
                let path = err
                    .path()
                    .map(paths::to_slash)
                    .unwrap_or_else(|| dir.to_string());
                match err.into_io_error() {
                    Some(io) => HostError::from_io(&path, io),
                    None => HostError::Io {
                        path,
                        message: "filesystem loop detected".to_string(),
                    },
                }
            })?;
            let rel = entry
                .path()
                .strip_prefix(dir)
                .map(paths::to_slash)
                .unwrap_or_default();
            let meta = entry
                .metadata()
                .map(Metadata::from)
                .map_err(|err| HostError::Io {
                    path: paths::to_slash(entry.path()),
                    message: err.to_string(),
                })?;
            f(&rel, &meta)?;
        }
        Ok(())
    }

    fn signal(&self, pid: i32, signal: i32) -> Result<()> {
        let rc = unsafe { libc::kill(pid, signal) };
        if rc == 0 {
            return Ok(());
        }
        let err = std::io::Error::last_os_error();
        match err.raw_os_error() {
            Some(libc::ESRCH) => Err(HostError::NotFound(format!("pid {}", pid))),
            _ => Err(HostError::Io {
                path: format!("pid {}", pid),
                message: err.to_string(),
            }),
        }
    }

    fn start(&self, spec: &ProcessSpec) -> Result<()> {
        use std::os::unix::process::CommandExt;

        let err_file = self.resolve_err_file(spec);
        let out = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .mode(perms::DEFAULT_LOG_MODE)
            .open(&err_file)
            .map_err(|err| HostError::from_io(&err_file, err))?;
        let out_clone = out
            .try_clone()
            .map_err(|err| HostError::from_io(&err_file, err))?;

        let mut cmd = self.build_command(spec);
        cmd.stdin(Stdio::null())
            .stdout(Stdio::from(out))
            .stderr(Stdio::from(out_clone));
        unsafe {
            // new session so the child survives this process exiting
            cmd.pre_exec(|| {
                if libc::setsid() == -1 {
                    return Err(std::io::Error::last_os_error());
                }
                Ok(())
            });
        }
        let child = cmd
            .spawn()
            .map_err(|err| HostError::from_io(&spec.program, err))?;
        // release the handle immediately; the caller never waits
        drop(child);
        Ok(())
    }

    fn run(&self, spec: &ProcessSpec) -> Result<Vec<u8>> {
        let err_file = self.resolve_err_file(spec);
        let out = fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .mode(perms::DEFAULT_LOG_MODE)
            .open(&err_file)
            .map_err(|err| HostError::from_io(&err_file, err))?;

        let mut cmd = self.build_command(spec);
        cmd.stdin(Stdio::null()).stderr(Stdio::from(out));
        let output = cmd
            .output()
            .map_err(|err| HostError::from_io(&spec.program, err))?;
        if !output.status.success() {
            return Err(HostError::ExitStatus {
                code: output.status.code().unwrap_or(-1),
                output: output.stdout,
            });
        }
        Ok(output.stdout)
    }
}

fn os_hostname() -> String {
    let mut buf = [0u8; 256];
    let rc = unsafe { libc::gethostname(buf.as_mut_ptr() as *mut libc::c_char, buf.len()) };
    if rc != 0 {
        return String::new();
    }
    let end = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
    String::from_utf8_lossy(&buf[..end]).into_owned()
}
