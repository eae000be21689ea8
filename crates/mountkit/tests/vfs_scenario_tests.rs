//! End-to-end tests through the `Vfs` façade

mod common;

use common::{memfs, root};
use mountkit::{Credentials, Errno, OpenFlags, Vfs, VfsConfig};
use pretty_assertions::assert_eq;

#[tokio::test]
async fn test_directory_lifecycle() {
    let vfs = Vfs::builder().root(memfs()).build().await.unwrap();
    let cred = root();

    vfs.mkdir("/a", 0o755, &cred).await.unwrap();
    vfs.write_file("/a/b.txt", b"hi", &cred).await.unwrap();
    assert_eq!(vfs.stat("/a/b.txt", &cred).await.unwrap().size, 2.0);

    vfs.rename("/a", "/c", &cred).await.unwrap();
    assert!(!vfs.exists("/a", &cred).await.unwrap());
    assert_eq!(vfs.read_file("/c/b.txt", &cred).await.unwrap(), b"hi");

    let err = vfs.rmdir("/c", &cred).await.unwrap_err();
    assert!(err.is(Errno::ENOTEMPTY));
    assert_eq!(err.syscall, Some("rmdir"));

    vfs.unlink("/c/b.txt", &cred).await.unwrap();
    vfs.rmdir("/c", &cred).await.unwrap();
    assert!(vfs.readdir("/", &cred).await.unwrap().is_empty());
}

#[test]
fn test_directory_lifecycle_sync() {
    let vfs = Vfs::new();
    let cred = root();

    vfs.mkdir_sync("/a", 0o755, &cred).unwrap();
    vfs.write_file_sync("/a/b.txt", b"hi", &cred).unwrap();
    assert_eq!(vfs.stat_sync("/a/b.txt", &cred).unwrap().size, 2.0);

    vfs.rename_sync("/a", "/c", &cred).unwrap();
    assert!(!vfs.exists_sync("/a", &cred).unwrap());
    assert_eq!(vfs.read_file_sync("/c/b.txt", &cred).unwrap(), b"hi");

    let err = vfs.rmdir_sync("/c", &cred).unwrap_err();
    assert!(err.is(Errno::ENOTEMPTY));

    vfs.unlink_sync("/c/b.txt", &cred).unwrap();
    vfs.rmdir_sync("/c", &cred).unwrap();
}

#[tokio::test]
async fn test_sync_and_async_forms_agree_on_errors() {
    let vfs = Vfs::new();
    let cred = root();
    vfs.write_file("/file", b"x", &cred).await.unwrap();
    vfs.mkdir("/dir", 0o755, &cred).await.unwrap();

    let cases: Vec<(mountkit::Error, mountkit::Error)> = vec![
        (
            vfs.stat("/missing", &cred).await.unwrap_err(),
            vfs.stat_sync("/missing", &cred).unwrap_err(),
        ),
        (
            vfs.mkdir("/file", 0o755, &cred).await.unwrap_err(),
            vfs.mkdir_sync("/file", 0o755, &cred).unwrap_err(),
        ),
        (
            vfs.unlink("/dir", &cred).await.unwrap_err(),
            vfs.unlink_sync("/dir", &cred).unwrap_err(),
        ),
        (
            vfs.readdir("/file", &cred).await.unwrap_err(),
            vfs.readdir_sync("/file", &cred).unwrap_err(),
        ),
        (
            vfs.rmdir("/file", &cred).await.unwrap_err(),
            vfs.rmdir_sync("/file", &cred).unwrap_err(),
        ),
        (
            vfs.link("/dir", "/dir2", &cred).await.unwrap_err(),
            vfs.link_sync("/dir", "/dir2", &cred).unwrap_err(),
        ),
    ];
    for (async_err, sync_err) in cases {
        assert_eq!(async_err.errno, sync_err.errno, "{}", async_err);
        assert_eq!(async_err.path, sync_err.path);
    }
}

#[tokio::test]
async fn test_invalid_paths() {
    let vfs = Vfs::new();
    assert!(vfs.stat("", &root()).await.unwrap_err().is(Errno::EINVAL));
    assert!(vfs.stat("/a\0b", &root()).await.unwrap_err().is(Errno::EINVAL));
    // `..` above the root stays at the root
    assert!(vfs.stat("/../..", &root()).await.unwrap().is_directory());
}

#[tokio::test]
async fn test_permissions_follow_mode_bits() {
    let vfs = Vfs::new();
    let owner = Credentials::new(1, 1);
    let other = Credentials::new(2, 2);

    vfs.mkdir("/shared", 0o777, &root()).await.unwrap();
    vfs.write_file("/shared/f", b"secret", &owner).await.unwrap();
    vfs.chmod("/shared/f", 0o644, &owner).await.unwrap();

    assert_eq!(vfs.read_file("/shared/f", &other).await.unwrap(), b"secret");
    let err = vfs
        .write_file("/shared/f", b"changed", &other)
        .await
        .unwrap_err();
    assert!(err.is(Errno::EACCES));

    vfs.write_file("/shared/f", b"mine", &owner).await.unwrap();
    vfs.write_file("/shared/f", b"root", &root()).await.unwrap();

    vfs.mkdir("/private", 0o700, &root()).await.unwrap();
    let err = vfs.readdir("/private", &other).await.unwrap_err();
    assert!(err.is(Errno::EACCES));
}

#[tokio::test]
async fn test_chown_ignores_out_of_range_ids() {
    let vfs = Vfs::new();
    vfs.write_file("/f", b"", &root()).await.unwrap();
    vfs.chown("/f", 42, -1, &root()).await.unwrap();
    vfs.chown("/f", i64::from(u32::MAX) + 1, 7, &root())
        .await
        .unwrap();
    let stats = vfs.stat("/f", &root()).await.unwrap();
    assert_eq!((stats.uid, stats.gid), (42.0, 7.0));
}

#[tokio::test]
async fn test_descriptor_reuse_and_append() {
    let vfs = Vfs::new();
    let cred = root();
    let fd = vfs
        .open("/log", OpenFlags::parse("a+").unwrap(), 0o644, &cred)
        .await
        .unwrap();
    vfs.write(fd, b"one,", None).await.unwrap();
    // Explicit positions are ignored in append mode.
    vfs.write(fd, b"two", Some(0)).await.unwrap();
    let mut buf = [0u8; 7];
    assert_eq!(vfs.read(fd, &mut buf, Some(0)).await.unwrap(), 7);
    assert_eq!(&buf, b"one,two");
    vfs.close(fd).await.unwrap();

    let fd2 = vfs.open("/log", OpenFlags::READ, 0, &cred).await.unwrap();
    assert_eq!(fd2, fd);
    assert!(vfs.write(fd2, b"x", None).await.unwrap_err().is(Errno::EBADF));
    vfs.close(fd2).await.unwrap();
}

#[tokio::test]
async fn test_truncate_and_append_helpers() {
    let vfs = Vfs::new();
    vfs.write_file("/f", b"hello world", &root()).await.unwrap();
    vfs.truncate("/f", 5, &root()).await.unwrap();
    assert_eq!(vfs.read_file("/f", &root()).await.unwrap(), b"hello");
    vfs.truncate("/f", 7, &root()).await.unwrap();
    assert_eq!(vfs.read_file("/f", &root()).await.unwrap(), b"hello\0\0");
    vfs.append_file("/f", b"!", &root()).await.unwrap();
    assert_eq!(vfs.stat("/f", &root()).await.unwrap().size, 8.0);
}

#[tokio::test]
async fn test_update_on_read_toggle() {
    let config = VfsConfig {
        update_on_read: false,
        ..VfsConfig::default()
    };
    let vfs = Vfs::builder().config(config).build().await.unwrap();
    vfs.write_file("/f", b"data", &root()).await.unwrap();
    vfs.utimes("/f", 10.0, 20.0, &root()).await.unwrap();
    vfs.read_file("/f", &root()).await.unwrap();
    assert_eq!(vfs.stat("/f", &root()).await.unwrap().atime_ms, 10.0);

    let vfs = Vfs::new();
    vfs.write_file("/f", b"data", &root()).await.unwrap();
    vfs.utimes("/f", 10.0, 20.0, &root()).await.unwrap();
    vfs.read_file("/f", &root()).await.unwrap();
    assert!(vfs.stat("/f", &root()).await.unwrap().atime_ms > 10.0);
}

#[tokio::test]
async fn test_config_from_json() -> anyhow::Result<()> {
    let config = VfsConfig::from_json(
        r#"{"credentials": {"uid": 1000, "gid": 1000, "euid": 1000, "egid": 1000}, "sync_immediately": true}"#,
    )?;
    let vfs = Vfs::builder().config(config).build().await?;
    assert_eq!(vfs.credentials().uid, 1000);
    assert!(!vfs.credentials().is_privileged());
    assert!(vfs.config().sync_immediately);

    // Written through before close when flushing immediately.
    let fd = vfs
        .open("/f", OpenFlags::parse("w")?, 0o644, &root())
        .await?;
    vfs.write(fd, b"now", None).await?;
    assert_eq!(vfs.stat("/f", &root()).await?.size, 3.0);
    vfs.close(fd).await?;
    Ok(())
}

#[tokio::test]
async fn test_directories_cannot_be_opened() {
    let vfs = Vfs::new();
    let cred = root();
    vfs.mkdir("/d", 0o755, &cred).await.unwrap();
    vfs.mkdir("/d/child", 0o755, &cred).await.unwrap();

    let err = vfs.read_file("/d", &cred).await.unwrap_err();
    assert!(err.is(Errno::EISDIR));
    assert_eq!(err.path.as_deref(), Some(std::path::Path::new("/d")));
    assert!(vfs.read_file_sync("/d", &cred).unwrap_err().is(Errno::EISDIR));

    let err = vfs.open("/d", OpenFlags::READ, 0, &cred).await.unwrap_err();
    assert!(err.is(Errno::EISDIR));
    let err = vfs.open_sync("/d/child", OpenFlags::READ, 0, &cred).unwrap_err();
    assert!(err.is(Errno::EISDIR));
    assert_eq!(vfs.open_descriptors(), 0);
}

#[tokio::test]
async fn test_directory_metadata_updates_keep_listing() {
    let vfs = Vfs::new();
    let owner = Credentials::new(1000, 1000);
    vfs.mkdir("/home", 0o777, &root()).await.unwrap();
    vfs.mkdir("/home/u", 0o755, &owner).await.unwrap();
    vfs.mkdir("/home/u/sub", 0o755, &owner).await.unwrap();
    vfs.write_file("/home/u/notes", b"keep me", &owner).await.unwrap();

    vfs.chmod("/home/u", 0o750, &owner).await.unwrap();
    vfs.chown("/home/u", 1000, 2000, &root()).await.unwrap();
    vfs.utimes("/home/u", 1_000.0, 2_000.0, &owner).await.unwrap();

    let stats = vfs.stat("/home/u", &root()).await.unwrap();
    assert!(stats.is_directory());
    assert_eq!(stats.mode_bits() & 0o7777, 0o750);
    assert_eq!((stats.uid, stats.gid), (1000.0, 2000.0));
    assert_eq!(stats.mtime_ms, 2_000.0);
    assert_eq!(
        vfs.readdir("/home/u", &owner).await.unwrap(),
        vec!["notes".to_string(), "sub".to_string()]
    );
    assert_eq!(vfs.read_file("/home/u/notes", &owner).await.unwrap(), b"keep me");
    assert!(vfs.stat("/home/u/sub", &owner).await.unwrap().is_directory());
}
