use depot_fs::{NormalizedPath, io};
use std::fs;
use tempfile::TempDir;

#[test]
fn test_write_atomic_creates_file_and_parents() {
    let temp = TempDir::new().unwrap();
    let path = NormalizedPath::new(temp.path().join("nested/dir/registry.toml"));

    io::write_atomic(&path, b"schema_version = \"1\"").unwrap();

    let content = fs::read_to_string(path.to_native()).unwrap();
    assert_eq!(content, "schema_version = \"1\"");
}

#[test]
fn test_write_atomic_overwrites_existing() {
    let temp = TempDir::new().unwrap();
    let file_path = temp.path().join("registry.toml");
    fs::write(&file_path, "original").unwrap();

    let path = NormalizedPath::new(&file_path);
    io::write_atomic(&path, b"updated").unwrap();

    let content = fs::read_to_string(&file_path).unwrap();
    assert_eq!(content, "updated");
}

#[test]
fn test_read_text_nonexistent_file_is_error() {
    let temp = TempDir::new().unwrap();
    let path = NormalizedPath::new(temp.path().join("missing.txt"));

    let err = io::read_text(&path).unwrap_err();
    assert!(err.is_not_found());
}

#[test]
fn test_read_text_if_exists_distinguishes_missing() {
    let temp = TempDir::new().unwrap();
    let present = NormalizedPath::new(temp.path().join("present.txt"));
    fs::write(present.to_native(), "hello").unwrap();
    let missing = NormalizedPath::new(temp.path().join("missing.txt"));

    assert_eq!(io::read_text_if_exists(&present).unwrap().as_deref(), Some("hello"));
    assert_eq!(io::read_text_if_exists(&missing).unwrap(), None);
}

#[test]
fn test_copy_file_creates_destination_tree() {
    let temp = TempDir::new().unwrap();
    let src = temp.path().join("src.txt");
    fs::write(&src, "payload").unwrap();
    let dest = NormalizedPath::new(temp.path().join("out/a/b/dest.txt"));

    let copied = io::copy_file(&src, &dest).unwrap();

    assert_eq!(copied, 7);
    assert_eq!(fs::read_to_string(dest.to_native()).unwrap(), "payload");
}

#[test]
fn test_list_dir_names_ignores_files() {
    let temp = TempDir::new().unwrap();
    fs::create_dir_all(temp.path().join("zeta")).unwrap();
    fs::create_dir_all(temp.path().join("alpha")).unwrap();
    fs::write(temp.path().join("file.txt"), "").unwrap();

    let names = io::list_dir_names(&NormalizedPath::new(temp.path())).unwrap();
    assert_eq!(names, vec!["alpha".to_string(), "zeta".to_string()]);
}

#[test]
fn test_dir_size_sums_nested_files() {
    let temp = TempDir::new().unwrap();
    fs::create_dir_all(temp.path().join("a/b")).unwrap();
    fs::write(temp.path().join("a/one"), "12345").unwrap();
    fs::write(temp.path().join("a/b/two"), "123").unwrap();

    let size = io::dir_size(&NormalizedPath::new(temp.path())).unwrap();
    assert_eq!(size, 8);
}
