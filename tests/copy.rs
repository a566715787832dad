mod common;

use common::TempDir;
use crosshost::{copy_all, copy_file, Host, HostError, Local};

#[test]
fn copy_file_preserves_content_and_mode() {
    let tmp = TempDir::new();
    let host = Local::new();
    let src = tmp.join("src.bin");
    let dst = tmp.join("dst.bin");

    host.write_file(&src, b"payload", 0o640).unwrap();
    copy_file(&host, &src, &host, &dst).unwrap();

    assert_eq!(host.read_file(&dst).unwrap(), b"payload");
    assert_eq!(host.stat(&dst).unwrap().mode, 0o640);
    // source untouched
    assert_eq!(host.read_file(&src).unwrap(), b"payload");
}

#[test]
fn copy_file_into_existing_directory_uses_base_name() {
    let tmp = TempDir::new();
    let host = Local::new();
    let src = tmp.join("report.txt");
    let dst_dir = tmp.join("out");

    host.write_file(&src, b"r", 0o644).unwrap();
    host.mkdir_all(&dst_dir, 0o755).unwrap();
    copy_file(&host, &src, &host, &dst_dir).unwrap();

    assert_eq!(host.read_file(&tmp.join("out/report.txt")).unwrap(), b"r");
}

#[test]
fn copy_file_creates_missing_parents() {
    let tmp = TempDir::new();
    let host = Local::new();
    let src = tmp.join("a.txt");
    let dst = tmp.join("deep/er/a.txt");

    host.write_file(&src, b"a", 0o644).unwrap();
    copy_file(&host, &src, &host, &dst).unwrap();
    assert_eq!(host.read_file(&dst).unwrap(), b"a");
}

#[test]
fn copy_file_rejects_directory_source() {
    let tmp = TempDir::new();
    let host = Local::new();
    let dir = tmp.join("adir");
    host.mkdir_all(&dir, 0o755).unwrap();

    let err = copy_file(&host, &dir, &host, &tmp.join("dst")).unwrap_err();
    assert!(matches!(err, HostError::InvalidArgs(_)));
}

#[test]
fn copy_file_missing_source_is_not_found() {
    let tmp = TempDir::new();
    let host = Local::new();
    let err = copy_file(&host, &tmp.join("ghost"), &host, &tmp.join("dst")).unwrap_err();
    assert!(err.is_not_found());
}

#[test]
fn copy_all_replicates_tree() {
    let tmp = TempDir::new();
    let host = Local::new();
    let src = tmp.join("src");
    let dst = tmp.join("dst");

    host.mkdir_all(&format!("{src}/conf"), 0o750).unwrap();
    host.write_file(&format!("{src}/app.bin"), b"binary", 0o755)
        .unwrap();
    host.write_file(&format!("{src}/conf/app.conf"), b"key=value", 0o640)
        .unwrap();

    copy_all(&host, &src, &host, &dst).unwrap();

    assert!(host.stat(&dst).unwrap().is_dir());
    assert_eq!(host.stat(&format!("{dst}/conf")).unwrap().mode, 0o750);
    assert_eq!(host.read_file(&format!("{dst}/app.bin")).unwrap(), b"binary");
    assert_eq!(host.stat(&format!("{dst}/app.bin")).unwrap().mode, 0o755);
    assert_eq!(
        host.read_file(&format!("{dst}/conf/app.conf")).unwrap(),
        b"key=value"
    );
}

#[test]
fn copy_all_recreates_symlinks_with_unmodified_target() {
    let tmp = TempDir::new();
    let host = Local::new();
    let src = tmp.join("src");
    let dst = tmp.join("dst");

    host.mkdir_all(&src, 0o755).unwrap();
    host.write_file(&format!("{src}/real.txt"), b"real", 0o644)
        .unwrap();
    host.symlink("real.txt", &format!("{src}/rel-link")).unwrap();
    // dangling targets are copied as-is, not resolved
    host.symlink("/nonexistent/target", &format!("{src}/dangling"))
        .unwrap();

    copy_all(&host, &src, &host, &dst).unwrap();

    assert_eq!(host.readlink(&format!("{dst}/rel-link")).unwrap(), "real.txt");
    assert_eq!(
        host.readlink(&format!("{dst}/dangling")).unwrap(),
        "/nonexistent/target"
    );
    assert!(host.lstat(&format!("{dst}/dangling")).unwrap().is_symlink());
}

#[test]
fn copy_all_missing_source_is_not_found() {
    let tmp = TempDir::new();
    let host = Local::new();
    let err = copy_all(&host, &tmp.join("absent"), &host, &tmp.join("dst")).unwrap_err();
    assert!(err.is_not_found());
}
