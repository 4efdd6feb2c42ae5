mod common;

use std::time::Duration;

use common::{
    CountingBackend, FakeEngine, encrypt_body, encrypt_name, init_tracing, read_to_string,
    router_over, sample_backend,
};
use vaultsh::storage::MemoryBackend;
use vaultsh::volume::UnlockError;
use vaultsh::{VaultError, VirtualPath};

fn p(path: &str) -> VirtualPath {
    VirtualPath::parse(path)
}

fn strings(paths: &[VirtualPath]) -> Vec<String> {
    paths.iter().map(|p| p.to_string()).collect()
}

#[tokio::test]
async fn test_accessors_reflect_resolution() {
    init_tracing();
    let backend = sample_backend();
    let router = router_over(&backend, &FakeEngine::default());

    let entry = router.resolve(&p("/readme.txt")).await.unwrap();
    assert!(!entry.is_directory);

    assert_eq!(router.size(&p("/readme.txt")).unwrap(), 10);
    assert_eq!(router.name(&p("/readme.txt")).unwrap(), "readme.txt");
    assert!(!router.is_directory(&p("/readme.txt")).unwrap());
    assert!(router.last_modified(&p("/readme.txt")).unwrap().is_some());
    assert_eq!(router.parent_path(&p("/readme.txt")).unwrap(), VirtualPath::root());

    // Second resolve is served from the cache
    router.resolve(&p("/readme.txt")).await.unwrap();
    assert_eq!(backend.count("get_info", "/readme.txt"), 1);
}

#[tokio::test]
async fn test_list_is_fetched_once() {
    init_tracing();
    let backend = sample_backend();
    let router = router_over(&backend, &FakeEngine::default());

    let first = router.list(&VirtualPath::root()).await.unwrap();
    let second = router.list(&VirtualPath::root()).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(strings(&first), vec!["/docs", "/docs2", "/readme.txt"]);
    assert_eq!(backend.count("list", "/"), 1);

    // Children were resolved by the listing itself
    assert!(router.is_directory(&p("/docs2")).unwrap());
    assert_eq!(backend.count("get_info", "/docs2"), 0);
}

#[tokio::test]
async fn test_marker_drives_root_detection() {
    init_tracing();
    let backend = sample_backend();
    let router = router_over(&backend, &FakeEngine::default());

    router.list(&VirtualPath::root()).await.unwrap();
    assert_eq!(router.is_encrypted_root(&p("/docs")).unwrap(), None);
    assert_eq!(router.is_encrypted_root(&p("/docs2")).unwrap(), None);

    router.list(&p("/docs")).await.unwrap();
    router.list(&p("/docs2")).await.unwrap();
    assert_eq!(router.is_encrypted_root(&p("/docs")).unwrap(), Some(true));
    assert_eq!(router.is_encrypted_root(&p("/docs2")).unwrap(), Some(false));
}

#[tokio::test]
async fn test_unlock_shows_plaintext() {
    init_tracing();
    let backend = sample_backend();
    let router = router_over(&backend, &FakeEngine::default());
    let docs = p("/docs");
    let cipher_notes = format!("/docs/{}", encrypt_name("notes.txt"));

    let raw = router.list(&docs).await.unwrap();
    assert!(strings(&raw).contains(&cipher_notes));
    assert!(!router.is_volume_unlocked(&docs));

    router.unlock(&docs, "secret").await.unwrap();
    assert!(router.is_volume_unlocked(&docs));
    assert_eq!(router.unlocked_roots(), vec![docs.clone()]);

    // Nothing fetched before the unlock survives below the root
    assert!(router.cached(&p(&cipher_notes)).is_none());
    assert!(router.cached(&p("/docs/.encfs6.xml")).is_none());
    let root_entry = router.cached(&docs).unwrap();
    assert!(!root_entry.is_listed());

    let plain = router.list(&docs).await.unwrap();
    assert_eq!(strings(&plain), vec!["/docs/projects", "/docs/notes.txt"]);
    assert_eq!(backend.count("list", "/docs"), 2);
    // The volume hides its own marker, so the plaintext listing has none
    assert_eq!(router.is_encrypted_root(&docs).unwrap(), Some(false));
    assert!(router.is_volume_unlocked(&docs));

    assert_eq!(router.size(&p("/docs/notes.txt")).unwrap(), 20);
    assert_eq!(read_to_string(&router, "/docs/notes.txt").await, "hello from the vault");

    let nested = router.list(&p("/docs/projects")).await.unwrap();
    assert_eq!(strings(&nested), vec!["/docs/projects/plan.md"]);
    assert_eq!(read_to_string(&router, "/docs/projects/plan.md").await, "# plan");
}

#[tokio::test]
async fn test_resolve_inside_volume_without_listing() {
    init_tracing();
    let backend = sample_backend();
    let engine = FakeEngine::default();
    let router = router_over(&backend, &engine);

    router.unlock(&p("/docs"), "secret").await.unwrap();

    let entry = router.resolve(&p("/docs/projects/plan.md")).await.unwrap();
    assert!(!entry.is_directory);
    assert_eq!(read_to_string(&router, "/docs/projects/plan.md").await, "# plan");
    assert_eq!(engine.reads(), vec!["secret:/projects/plan.md"]);

    let missing = router.resolve(&p("/docs/absent.txt")).await;
    assert!(matches!(missing, Err(VaultError::NotFound(path)) if path == p("/docs/absent.txt")));
}

#[tokio::test]
async fn test_wrong_password_leaves_state_untouched() {
    init_tracing();
    let backend = sample_backend();
    let router = router_over(&backend, &FakeEngine::default());
    let docs = p("/docs");

    let before = router.list(&docs).await.unwrap();

    let err = router.unlock(&docs, "wrong").await.unwrap_err();
    assert!(matches!(
        err,
        VaultError::UnlockFailed { ref root, source: UnlockError::InvalidPassword } if *root == docs
    ));
    assert!(err.is_retryable());
    assert!(router.unlocked_roots().is_empty());

    let after = router.list(&docs).await.unwrap();
    assert_eq!(before, after);
    assert_eq!(backend.count("list", "/docs"), 1);
}

#[tokio::test]
async fn test_unlock_without_volume_config() {
    init_tracing();
    let backend = sample_backend();
    let router = router_over(&backend, &FakeEngine::default());

    let err = router.unlock(&p("/docs2"), "secret").await.unwrap_err();
    assert!(matches!(
        err,
        VaultError::UnlockFailed { source: UnlockError::CorruptHeader(_), .. }
    ));
}

#[tokio::test]
async fn test_unlock_twice_is_a_no_op() {
    init_tracing();
    let backend = sample_backend();
    let engine = FakeEngine::default();
    let router = router_over(&backend, &engine);
    let docs = p("/docs");

    router.unlock(&docs, "secret").await.unwrap();
    router.list(&docs).await.unwrap();
    router.unlock(&docs, "secret").await.unwrap();

    assert_eq!(engine.unlock_count(), 1);
    // The listing through the volume is still cached
    assert!(router.cached(&docs).unwrap().is_listed());
}

#[tokio::test]
async fn test_sibling_with_shared_prefix_is_untouched() {
    init_tracing();
    let backend = sample_backend();
    let router = router_over(&backend, &FakeEngine::default());

    router.list(&p("/docs2")).await.unwrap();
    router.unlock(&p("/docs"), "secret").await.unwrap();

    assert!(router.cached(&p("/docs2/other.txt")).is_some());
    assert!(router.cached(&p("/docs2")).unwrap().is_listed());
    assert_eq!(read_to_string(&router, "/docs2/other.txt").await, "not encrypted");
}

fn nested_backend() -> CountingBackend {
    let memory = MemoryBackend::new();
    memory.insert_file("/vault/.encfs6.xml", "outer");
    memory.insert_file(
        format!("/vault/{}", encrypt_name("top.txt")).as_str(),
        encrypt_body("outer file"),
    );
    memory.insert_file("/vault/inner/.encfs6.xml", "inner");
    memory.insert_file(
        format!("/vault/inner/{}", encrypt_name("x")).as_str(),
        encrypt_body("inner file"),
    );
    CountingBackend::new(memory)
}

#[tokio::test]
async fn test_nested_volume_routes_to_inner_handle() {
    init_tracing();
    let backend = nested_backend();
    let engine = FakeEngine::default();
    let router = router_over(&backend, &engine);
    let vault = p("/vault");
    let inner = p("/vault/inner");

    router.unlock(&vault, "outer").await.unwrap();
    let listing = router.list(&vault).await.unwrap();
    assert_eq!(strings(&listing), vec!["/vault/inner", "/vault/top.txt"]);

    // The outer volume sees the inner marker, so the inner root is detected
    router.list(&inner).await.unwrap();
    assert_eq!(router.is_encrypted_root(&inner).unwrap(), Some(true));
    assert!(!router.is_volume_unlocked(&inner));

    assert_eq!(read_to_string(&router, "/vault/inner/x").await, "inner file");
    assert_eq!(engine.reads().last().unwrap(), "outer:/inner/x");

    router.unlock(&inner, "inner").await.unwrap();
    assert_eq!(router.unlocked_roots(), vec![vault.clone(), inner.clone()]);
    assert!(router.cached(&p("/vault/inner/x")).is_none());
    assert!(router.cached(&p("/vault/top.txt")).is_some());

    assert_eq!(read_to_string(&router, "/vault/inner/x").await, "inner file");
    assert_eq!(engine.reads().last().unwrap(), "inner:/x");

    let inner_listing = router.list(&inner).await.unwrap();
    assert_eq!(strings(&inner_listing), vec!["/vault/inner/x"]);
    assert_eq!(router.is_encrypted_root(&inner).unwrap(), Some(false));

    // Paths outside the inner root still go through the outer volume
    assert_eq!(read_to_string(&router, "/vault/top.txt").await, "outer file");
    assert_eq!(engine.reads().last().unwrap(), "outer:/top.txt");
}

#[tokio::test]
async fn test_reverse_decrypt_finds_cached_paths_only() {
    init_tracing();
    let backend = sample_backend();
    let router = router_over(&backend, &FakeEngine::default());
    let cipher_plan = format!("s3://bucket/docs/projects/{}", encrypt_name("plan.md"));

    router.unlock(&p("/docs"), "secret").await.unwrap();
    assert_eq!(router.reverse_decrypt(&cipher_plan), None);

    router.list(&p("/docs")).await.unwrap();
    router.list(&p("/docs/projects")).await.unwrap();

    assert_eq!(
        router.reverse_decrypt(&cipher_plan),
        Some(p("/docs/projects/plan.md"))
    );
    assert_eq!(router.reverse_decrypt("/docs/unknown.enc"), None);
}

#[tokio::test]
async fn test_read_errors() {
    init_tracing();
    let backend = sample_backend();
    let router = router_over(&backend, &FakeEngine::default());

    let dir = router.open_read(&p("/docs")).await;
    assert!(matches!(dir, Err(VaultError::IsADirectory(_))));

    let missing = router.open_read(&p("/nope")).await;
    assert!(matches!(missing, Err(VaultError::NotFound(_))));

    let file = router.list(&p("/readme.txt")).await;
    assert!(matches!(file, Err(VaultError::NotADirectory(_))));
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_listings_share_one_call() {
    init_tracing();
    let backend = sample_backend().with_delay(Duration::from_millis(50));
    let router = router_over(&backend, &FakeEngine::default());
    let docs = p("/docs");

    let (a, b, c) = tokio::join!(router.list(&docs), router.list(&docs), router.list(&docs));
    let a = a.unwrap();
    assert_eq!(a, b.unwrap());
    assert_eq!(a, c.unwrap());

    assert_eq!(backend.count("get_info", "/docs"), 1);
    assert_eq!(backend.count("list", "/docs"), 1);
}

#[tokio::test(start_paused = true)]
async fn test_listing_in_flight_during_unlock_is_not_cached() {
    init_tracing();
    let backend = sample_backend().with_delay(Duration::from_millis(30));
    let router = router_over(&backend, &FakeEngine::default());
    let docs = p("/docs");
    let cipher_notes = format!("/docs/{}", encrypt_name("notes.txt"));

    // The listing resolves /docs by 30ms and its backend listing ends at 60ms;
    // the unlock lands in between.
    let (stale, unlocked) = tokio::join!(router.list(&docs), async {
        tokio::time::sleep(Duration::from_millis(40)).await;
        router.unlock(&docs, "secret").await
    });
    unlocked.unwrap();

    // The caller still gets the listing it asked for
    assert!(strings(&stale.unwrap()).contains(&cipher_notes));
    assert!(router.cached(&p(&cipher_notes)).is_none());

    let fresh = router.list(&docs).await.unwrap();
    assert_eq!(strings(&fresh), vec!["/docs/projects", "/docs/notes.txt"]);
}

#[tokio::test]
async fn test_disconnect_forgets_volumes() {
    init_tracing();
    let backend = sample_backend();
    let router = router_over(&backend, &FakeEngine::default());

    router.unlock(&p("/docs"), "secret").await.unwrap();
    router.list(&p("/docs")).await.unwrap();
    router.disconnect().await;

    assert!(router.unlocked_roots().is_empty());
    assert!(router.cached(&p("/docs")).is_none());

    let raw = router.list(&p("/docs")).await.unwrap();
    assert!(strings(&raw).contains(&format!("/docs/{}", encrypt_name("notes.txt"))));
}
