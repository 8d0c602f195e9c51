use pretty_assertions::assert_eq;
use serde::{Deserialize, Serialize};
use tagsync_fs::{ConfigStore, Error, NormalizedPath};
use tempfile::TempDir;

#[derive(Debug, PartialEq, Serialize, Deserialize)]
struct Settings {
    music_root: String,
    extensions: Vec<String>,
}

fn sample() -> Settings {
    Settings {
        music_root: "/srv/Музыка".to_string(),
        extensions: vec!["mp3".to_string()],
    }
}

#[test]
fn toml_round_trip() {
    let temp = TempDir::new().unwrap();
    let path = NormalizedPath::new(temp.path().join("tagsync.toml"));
    let store = ConfigStore::new();

    store.save(&path, &sample()).unwrap();
    let loaded: Settings = store.load(&path).unwrap();

    assert_eq!(loaded, sample());
}

#[test]
fn json_is_indented_and_keeps_unicode() {
    let temp = TempDir::new().unwrap();
    let path = NormalizedPath::new(temp.path().join("data.json"));
    let store = ConfigStore::new();

    store.save(&path, &sample()).unwrap();
    let raw = std::fs::read_to_string(path.to_native()).unwrap();

    assert!(raw.contains("\n    \"music_root\": \"/srv/Музыка\""));
    assert!(raw.ends_with("}\n"));
    let loaded: Settings = store.load(&path).unwrap();
    assert_eq!(loaded, sample());
}

#[test]
fn unknown_extension_is_rejected() {
    let temp = TempDir::new().unwrap();
    let path = NormalizedPath::new(temp.path().join("settings.ini"));

    let err = ConfigStore::new().save(&path, &sample()).unwrap_err();
    assert!(matches!(err, Error::UnsupportedFormat { extension } if extension == "ini"));
}

#[test]
fn malformed_json_reports_parse_error() {
    let temp = TempDir::new().unwrap();
    let file = temp.path().join("broken.json");
    std::fs::write(&file, "{ not json").unwrap();

    let result: tagsync_fs::Result<Settings> = ConfigStore::new().load(&NormalizedPath::new(&file));
    assert!(matches!(result, Err(Error::ConfigParse { .. })));
}
