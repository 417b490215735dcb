use std::fs::File;

use diztrace_host::{
    shared, ApiContainer, InMemoryUserData, ServiceProvider, UserDataStore, UserDataValue,
};

#[test]
fn store_survives_save_and_reload_through_the_api() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("userdata.json");

    let store = shared(InMemoryUserData::new());
    let container = ApiContainer::register(&ServiceProvider::new().with_user_data(store));
    let api = container.user_data().unwrap();
    api.set("stage", "1-2");
    api.set("lives", 5i64);
    api.set("big", true);
    assert!(api.remove("big"));

    let mut snapshot = InMemoryUserData::new();
    for key in api.keys() {
        snapshot.set(&key, api.get(&key).unwrap());
    }
    snapshot.save_json(File::create(&path).unwrap()).unwrap();

    let reloaded = InMemoryUserData::load_json(File::open(&path).unwrap()).unwrap();
    assert_eq!(reloaded.keys(), vec!["lives".to_string(), "stage".to_string()]);
    assert_eq!(reloaded.get("lives"), Some(UserDataValue::Integer(5)));
    assert_eq!(reloaded.get("stage"), Some(UserDataValue::Text("1-2".into())));
}

#[test]
fn malformed_file_is_rejected() {
    let err = InMemoryUserData::load_json(&b"[1, 2"[..]).unwrap_err();
    assert!(err.to_string().starts_with("invalid user data file"));
}

struct FailingReader;

impl std::io::Read for FailingReader {
    fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
        Err(std::io::Error::new(std::io::ErrorKind::Other, "disk gone"))
    }
}

#[test]
fn read_failure_is_reported_as_invalid_file() {
    let err = InMemoryUserData::load_json(FailingReader).unwrap_err();
    assert!(matches!(err, diztrace_host::UserDataError::Json(ref e) if e.is_io()));
    assert!(err.to_string().contains("disk gone"));
}
