use gpukv_core::backend::{Backend, SledBackend};

#[test]
fn put_get_delete_round_trip_through_sled() {
    let dir = tempfile::tempdir().expect("tempdir");
    let backend = SledBackend::open(dir.path().join("db")).expect("open sled backend");

    assert_eq!(backend.put(b"key", b"value"), 0);
    let (code, value) = backend.get(b"key");
    assert_eq!(code, 0);
    assert_eq!(value, b"value");

    assert_eq!(backend.delete(b"key"), 0);
    let (code, _) = backend.get(b"key");
    assert_eq!(code, 5);
}

#[test]
fn get_of_missing_key_reports_not_found() {
    let dir = tempfile::tempdir().expect("tempdir");
    let backend = SledBackend::open(dir.path().join("db")).expect("open sled backend");

    let (code, value) = backend.get(b"missing");
    assert_eq!(code, 5);
    assert!(value.is_empty());
}
