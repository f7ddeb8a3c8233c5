use crate::error::Error;
use crate::fs::FileSystem;
use crate::memory::MemoryBackend;
use crate::open::{AccessMode, OpenPolicy};
use crate::backend::BackendFailure;
use crate::testing::{FaultInjector, RecordingBackend};
use std::sync::Arc;

fn recorded_fs() -> (FileSystem, Arc<RecordingBackend<MemoryBackend>>) {
    let backend = Arc::new(RecordingBackend::new(MemoryBackend::new()));
    (FileSystem::with_shared(backend.clone()), backend)
}

#[tokio::test]
async fn test_open_existing_takes_one_probe() {
    let (fs, backend) = recorded_fs();
    fs.create_file("/a").await.unwrap();

    let before = backend.calls().len();
    let handle = fs
        .open("/a", OpenPolicy::OPEN_EXISTING, AccessMode::Read)
        .await
        .unwrap();
    assert!(handle.mode().readable());

    let calls = backend.calls();
    assert_eq!(&calls[before..], &["probe a".to_string()]);
}

#[tokio::test]
async fn test_when_exists_fail_mutates_nothing() {
    let (fs, backend) = recorded_fs();
    fs.create_file("/a").await.unwrap();

    let before = backend.mutation_count();
    let err = fs.create_file("/a").await.unwrap_err();
    assert_eq!(err, Error::already_exists("/a"));
    assert_eq!(backend.mutation_count(), before);
}

#[tokio::test]
async fn test_when_not_exists_fail_issues_no_create() {
    let (fs, backend) = recorded_fs();

    let err = fs
        .open("/missing", OpenPolicy::OPEN_EXISTING, AccessMode::Read)
        .await
        .unwrap_err();
    assert_eq!(err, Error::not_found("/missing"));
    assert_eq!(backend.mutation_count(), 0);
    assert!(!backend.calls().iter().any(|c| c.starts_with("create")));
}

#[tokio::test]
async fn test_fail_fail_policy_on_missing_path() {
    let (fs, backend) = recorded_fs();

    let policy = OpenPolicy {
        when_exists: crate::open::WhenExists::Fail,
        when_not_exists: crate::open::WhenNotExists::Fail,
    };
    let err = fs.open("/missing", policy, AccessMode::Read).await.unwrap_err();
    assert_eq!(err, Error::not_found("/missing"));
    assert_eq!(backend.mutation_count(), 0);
}

#[tokio::test]
async fn test_truncate_policy_empties_existing_file() {
    let fs = FileSystem::new(MemoryBackend::new());
    fs.write_file("/a", b"previous content").await.unwrap();

    fs.open("/a", OpenPolicy::TRUNCATE_OR_CREATE, AccessMode::Write)
        .await
        .unwrap();

    assert_eq!(fs.stat("/a").await.unwrap().size, 0);
}

#[tokio::test]
async fn test_create_new_on_missing_path() {
    let (fs, backend) = recorded_fs();

    fs.create_file("/fresh").await.unwrap();
    let calls = backend.calls();
    assert_eq!(calls, vec!["probe fresh".to_string(), "create fresh".to_string()]);
    assert_eq!(fs.stat("/fresh").await.unwrap().size, 0);
}

#[tokio::test]
async fn test_truncate_race_reenters_once_as_create() {
    // Seed a file, then have the backend lose it between probe and truncate.
    let memory = MemoryBackend::new();
    let fs_seed = FileSystem::new(memory.clone());
    fs_seed.write_file("/racy", b"old").await.unwrap();

    let backend = Arc::new(RecordingBackend::new(FaultInjector::vanishing_truncate(
        memory, 1,
    )));
    let fs = FileSystem::with_shared(backend.clone());

    let handle = fs
        .open("/racy", OpenPolicy::TRUNCATE_OR_CREATE, AccessMode::ReadWrite)
        .await
        .unwrap();

    // probe saw it, truncate lost it, one re-entry resolved as create
    assert_eq!(
        backend.calls(),
        vec![
            "probe racy".to_string(),
            "truncate racy".to_string(),
            "probe racy".to_string(),
            "create racy".to_string(),
        ]
    );
    assert_eq!(fs.read(&handle, 0, 16).await.unwrap(), b"");
    assert_eq!(fs.stat("/racy").await.unwrap().size, 0);
}

#[tokio::test]
async fn test_truncate_race_never_loops() {
    // A backend that keeps flapping gets exactly one retry, then the error
    // surfaces.
    let memory = MemoryBackend::new();
    let fs_seed = FileSystem::new(memory.clone());
    fs_seed.write_file("/flappy", b"old").await.unwrap();

    let backend = Arc::new(RecordingBackend::new(FaultInjector::persistent_truncate(
        memory, 100,
    )));
    let fs = FileSystem::with_shared(backend.clone());

    let err = fs
        .open("/flappy", OpenPolicy::TRUNCATE_OR_CREATE, AccessMode::Write)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));

    let truncates = backend
        .calls()
        .iter()
        .filter(|c| c.starts_with("truncate"))
        .count();
    assert_eq!(truncates, 2);
}

#[tokio::test]
async fn test_probe_error_surfaces_without_further_calls() {
    // A probe failure other than absence stops the resolver immediately,
    // even under a create-on-absence policy.
    let backend = Arc::new(RecordingBackend::new(FaultInjector::failing_probe(
        MemoryBackend::new(),
        BackendFailure::code("EACCES"),
    )));
    let fs = FileSystem::with_shared(backend.clone());

    let err = fs
        .open("/a", OpenPolicy::OPEN_OR_CREATE, AccessMode::Write)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Io(_, _)));
    assert_eq!(backend.mutation_count(), 0);
}
