//! Cross-host copy: any combination of local and remote endpoints works,
//! because both sides are driven through the capability interface.

use std::io;

use crate::constants::perms;
use crate::errors::{HostError, Result};
use crate::host::{Host, Metadata};
use crate::utils::paths;

/// Copy a single file between hosts, streaming the content rather than
/// buffering it. A destination that already exists as a directory receives
/// the file under the source's base name. Parent directories are created as
/// needed; the source's permission bits carry over.
pub fn copy_file(
    src_host: &dyn Host,
    src_path: &str,
    dst_host: &dyn Host,
    dst_path: &str,
) -> Result<()> {
    let src_meta = src_host.stat(src_path)?;
    if src_meta.is_dir() {
        return Err(HostError::invalid_args(format!(
            "{} is a directory, not a file",
            src_host.host_path(src_path)
        )));
    }

    let dst_path = match dst_host.stat(dst_path) {
        Ok(meta) if meta.is_dir() => paths::join(dst_path, paths::base_name(src_path)),
        _ => dst_path.to_string(),
    };

    let parent = paths::parent(&dst_path);
    if parent != "." {
        dst_host.mkdir_all(parent, perms::DEFAULT_DIR_MODE)?;
    }

    stream(src_host, src_path, dst_host, &dst_path, &src_meta)
}

/// Copy a tree between hosts. The source is walked parents-first and each
/// entry is dispatched by kind: directories are created with their source
/// mode, symlinks are recreated with their target unmodified, regular files
/// are streamed. Entries of any other kind are skipped.
pub fn copy_all(
    src_host: &dyn Host,
    src_dir: &str,
    dst_host: &dyn Host,
    dst_dir: &str,
) -> Result<()> {
    src_host.walk_dir(src_dir, &mut |rel, meta| {
        let src_path = paths::join(src_dir, rel);
        let dst_path = paths::join(dst_dir, rel);
        if meta.is_dir() {
            dst_host.mkdir_all(&dst_path, meta.mode)
        } else if meta.is_symlink() {
            let target = src_host.readlink(&src_path)?;
            dst_host.symlink(&target, &dst_path)
        } else if meta.is_file() {
            stream(src_host, &src_path, dst_host, &dst_path, meta)
        } else {
            Ok(())
        }
    })
}

fn stream(
    src_host: &dyn Host,
    src_path: &str,
    dst_host: &dyn Host,
    dst_path: &str,
    src_meta: &Metadata,
) -> Result<()> {
    let mut reader = src_host.open(src_path)?;
    let mut writer = dst_host.create(dst_path, src_meta.mode)?;
    io::copy(&mut reader, &mut writer).map_err(|err| HostError::Io {
        path: format!(
            "{} -> {}",
            src_host.host_path(src_path),
            dst_host.host_path(dst_path)
        ),
        message: err.to_string(),
    })?;
    writer.flush().map_err(|err| HostError::from_io(dst_path, err))
}
