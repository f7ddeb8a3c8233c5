use crate::error::Error;
use crate::fs::FileSystem;
use crate::memory::MemoryBackend;
use crate::metadata::{DIRECTORY_SIZE, NodeKind};
use crate::open::{AccessMode, OpenPolicy};
use tokio_test::assert_ok;

fn new_fs() -> FileSystem {
    FileSystem::new(MemoryBackend::new())
}

#[tokio::test]
async fn test_create_then_stat_reports_empty_file() {
    let fs = new_fs();
    fs.create_file("/a").await.unwrap();

    let md = fs.stat("/a").await.unwrap();
    assert_eq!(md.kind, NodeKind::File);
    assert_eq!(md.size, 0);
}

#[tokio::test]
async fn test_stat_root_is_synthesized() {
    let fs = new_fs();
    let md = fs.stat("/").await.unwrap();
    assert_eq!(md.kind, NodeKind::Directory);
    assert_eq!(md.size, DIRECTORY_SIZE);
}

#[tokio::test]
async fn test_stat_missing_is_not_found() {
    let fs = new_fs();
    let err = fs.stat("/missing").await.unwrap_err();
    assert_eq!(err, Error::not_found("/missing"));
}

#[tokio::test]
async fn test_write_then_read_roundtrip() {
    let fs = new_fs();
    let handle = fs.create_file("/a").await.unwrap();

    let written = fs.write(&handle, b"hello", 0).await.unwrap();
    assert_eq!(written, 5);

    let md = fs.stat("/a").await.unwrap();
    assert_eq!(md.size, 5);

    let content = fs.read(&handle, 0, 5).await.unwrap();
    assert_eq!(content, b"hello");
}

#[tokio::test]
async fn test_read_at_offset() {
    let fs = new_fs();
    let handle = fs.create_file("/a").await.unwrap();
    fs.write(&handle, b"hello world", 0).await.unwrap();

    let content = fs.read(&handle, 6, 5).await.unwrap();
    assert_eq!(content, b"world");

    // Reads past the end clamp instead of failing
    let content = fs.read(&handle, 6, 100).await.unwrap();
    assert_eq!(content, b"world");
}

#[tokio::test]
async fn test_write_at_offset_zero_fills_gap() {
    let fs = new_fs();
    let handle = fs.create_file("/a").await.unwrap();
    fs.write(&handle, b"ab", 4).await.unwrap();

    let md = fs.stat("/a").await.unwrap();
    assert_eq!(md.size, 6);
    let content = fs.read(&handle, 0, 6).await.unwrap();
    assert_eq!(content, vec![0, 0, 0, 0, b'a', b'b']);
}

#[tokio::test]
async fn test_read_requires_readable_handle() {
    let fs = new_fs();
    let handle = fs
        .open("/a", OpenPolicy::TRUNCATE_OR_CREATE, AccessMode::Write)
        .await
        .unwrap();
    assert!(matches!(
        fs.read(&handle, 0, 1).await.unwrap_err(),
        Error::Io(_, _)
    ));
}

#[tokio::test]
async fn test_whole_file_helpers() {
    let fs = new_fs();
    fs.write_file("/a", b"first").await.unwrap();
    assert_eq!(fs.read_file("/a").await.unwrap(), b"first");

    // write_file truncates the previous content
    fs.write_file("/a", b"2nd").await.unwrap();
    assert_eq!(fs.read_file("/a").await.unwrap(), b"2nd");
}

#[tokio::test]
async fn test_empty_file_roundtrip() {
    let fs = new_fs();
    fs.write_file("/empty", b"").await.unwrap();
    assert_eq!(fs.read_file("/empty").await.unwrap(), b"");
}

#[tokio::test]
async fn test_large_file_roundtrip() {
    let fs = new_fs();
    let data: Vec<u8> = (0..1_000_000u32).map(|i| (i % 251) as u8).collect();
    fs.write_file("/big", &data).await.unwrap();
    assert_eq!(fs.read_file("/big").await.unwrap(), data);
}

#[tokio::test]
async fn test_mkdir_and_readdir() {
    let fs = new_fs();
    fs.mkdir("/dir").await.unwrap();
    fs.create_file("/dir/one").await.unwrap();
    fs.create_file("/dir/two").await.unwrap();
    fs.mkdir("/dir/sub").await.unwrap();
    fs.create_file("/dir/sub/deep").await.unwrap();

    let mut names = fs.readdir("/dir").await.unwrap();
    names.sort();
    assert_eq!(names, vec!["one", "sub", "two"]);

    let md = fs.stat("/dir").await.unwrap();
    assert_eq!(md.kind, NodeKind::Directory);
    assert_eq!(md.size, DIRECTORY_SIZE);
}

#[tokio::test]
async fn test_mkdir_existing_fails() {
    let fs = new_fs();
    fs.mkdir("/dir").await.unwrap();
    assert_eq!(
        fs.mkdir("/dir").await.unwrap_err(),
        Error::already_exists("/dir")
    );
}

#[tokio::test]
async fn test_mkdir_under_missing_parent_fails() {
    let fs = new_fs();
    let err = fs.mkdir("/no/such").await.unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
}

#[tokio::test]
async fn test_readdir_on_file_is_not_a_directory() {
    let fs = new_fs();
    fs.create_file("/a").await.unwrap();
    assert_eq!(
        fs.readdir("/a").await.unwrap_err(),
        Error::not_a_directory("/a")
    );
}

#[tokio::test]
async fn test_unlink() {
    let fs = new_fs();
    fs.create_file("/a").await.unwrap();
    fs.unlink("/a").await.unwrap();
    assert!(!fs.exists("/a").await.unwrap());
}

#[tokio::test]
async fn test_unlink_directory_is_is_a_directory() {
    let fs = new_fs();
    fs.mkdir("/dir").await.unwrap();
    assert_eq!(
        fs.unlink("/dir").await.unwrap_err(),
        Error::is_a_directory("/dir")
    );
}

#[tokio::test]
async fn test_rmdir_non_empty_fails() {
    let fs = new_fs();
    fs.mkdir("/dir").await.unwrap();
    fs.create_file("/dir/child").await.unwrap();
    assert_eq!(
        fs.rmdir("/dir").await.unwrap_err(),
        Error::directory_not_empty("/dir")
    );

    fs.unlink("/dir/child").await.unwrap();
    fs.rmdir("/dir").await.unwrap();
    assert!(!fs.exists("/dir").await.unwrap());
}

#[tokio::test]
async fn test_rename_file() {
    let fs = new_fs();
    fs.write_file("/from", b"payload").await.unwrap();
    fs.rename("/from", "/to").await.unwrap();

    assert!(!fs.exists("/from").await.unwrap());
    assert_eq!(fs.read_file("/to").await.unwrap(), b"payload");
}

#[tokio::test]
async fn test_rename_directory_moves_children() {
    let fs = new_fs();
    fs.mkdir("/old").await.unwrap();
    fs.write_file("/old/f", b"x").await.unwrap();
    fs.rename("/old", "/new").await.unwrap();

    assert_eq!(fs.read_file("/new/f").await.unwrap(), b"x");
    assert!(!fs.exists("/old").await.unwrap());
}

#[tokio::test]
async fn test_rename_root_rejected() {
    let fs = new_fs();
    assert!(matches!(
        fs.rename("/", "/stolen").await.unwrap_err(),
        Error::Io(_, _)
    ));
    fs.create_file("/a").await.unwrap();
    assert_eq!(
        fs.rename("/a", "/").await.unwrap_err(),
        Error::already_exists("/")
    );
    // The tree is untouched and the root still accepts creates.
    fs.create_file("/after").await.unwrap();
    assert!(fs.exists("/a").await.unwrap());
}

#[tokio::test]
async fn test_rename_into_own_subtree_rejected() {
    let fs = new_fs();
    fs.mkdir("/a").await.unwrap();
    fs.write_file("/a/f", b"x").await.unwrap();
    assert!(matches!(
        fs.rename("/a", "/a/b").await.unwrap_err(),
        Error::Io(_, _)
    ));
    assert_eq!(fs.read_file("/a/f").await.unwrap(), b"x");
}

#[tokio::test]
async fn test_rename_missing_source() {
    let fs = new_fs();
    let err = fs.rename("/ghost", "/to").await.unwrap_err();
    assert_eq!(err, Error::not_found("/ghost"));
}

#[tokio::test]
async fn test_truncate_extends_and_shrinks() {
    let fs = new_fs();
    fs.write_file("/a", b"hello").await.unwrap();

    fs.truncate("/a", 2).await.unwrap();
    assert_eq!(fs.read_file("/a").await.unwrap(), b"he");

    fs.truncate("/a", 4).await.unwrap();
    assert_eq!(fs.read_file("/a").await.unwrap(), vec![b'h', b'e', 0, 0]);
}

#[tokio::test]
async fn test_utimes() {
    let fs = new_fs();
    fs.create_file("/a").await.unwrap();
    fs.utimes("/a", 1000, 2000).await.unwrap();

    let md = fs.stat("/a").await.unwrap();
    assert_eq!(md.atime, 1000);
    assert_eq!(md.mtime, 2000);
}

#[tokio::test]
async fn test_symlink_roundtrip() {
    let fs = new_fs();
    fs.write_file("/target", b"data").await.unwrap();
    fs.symlink("/link", "/target").await.unwrap();

    let md = fs.stat("/link").await.unwrap();
    assert_eq!(md.kind, NodeKind::Symlink);
    assert_eq!(fs.readlink("/link").await.unwrap(), "/target");
}

#[tokio::test]
async fn test_read_through_symlink_handle_is_invalid() {
    let fs = new_fs();
    fs.write_file("/target", b"data").await.unwrap();
    fs.symlink("/link", "/target").await.unwrap();

    let handle = fs
        .open("/link", OpenPolicy::OPEN_EXISTING, AccessMode::Read)
        .await
        .unwrap();
    assert!(matches!(
        fs.read(&handle, 0, 4).await.unwrap_err(),
        Error::Io(_, _)
    ));
}

#[tokio::test]
async fn test_fsync_is_noop_without_buffering() {
    let fs = new_fs();
    fs.create_file("/a").await.unwrap();
    assert_ok!(fs.fsync("/a").await);
}

#[tokio::test]
async fn test_exists_folds_absence_only() {
    let fs = new_fs();
    assert!(!fs.exists("/nope").await.unwrap());
    fs.create_file("/yes").await.unwrap();
    assert!(fs.exists("/yes").await.unwrap());
}
