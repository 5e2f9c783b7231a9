use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use std::fs;
use std::path::PathBuf;
use tempfile::tempdir;
use thumbcache::cache::SizeClass;
use thumbcache::config::Config;

#[test]
fn test_config_load_defaults() {
    let config: Config = Figment::from(Serialized::defaults(Config::default()))
        .extract()
        .unwrap();
    assert_eq!(config, Config::default());
}

#[test]
fn test_config_load_from_toml() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(
        &path,
        r#"
cache_dir = "/var/cache/thumbs"
app_id = "viewer"
size = "large"
disable_all = true
disabled_mime_types = ["application/pdf", "video/mp4"]
thumbnailer_dirs = ["/opt/thumbnailers"]
builtin_decoders = false
"#,
    )
    .unwrap();

    let config: Config = Figment::from(Serialized::defaults(Config::default()))
        .merge(Toml::file(&path))
        .extract()
        .unwrap();

    assert_eq!(config.cache_dir, Some(PathBuf::from("/var/cache/thumbs")));
    assert_eq!(config.app_id, "viewer");
    assert_eq!(config.size, SizeClass::Large);
    assert!(config.disable_all);
    assert_eq!(config.disabled_mime_types.len(), 2);
    assert_eq!(
        config.thumbnailer_dirs,
        Some(vec![PathBuf::from("/opt/thumbnailers")])
    );
    assert!(!config.builtin_decoders);
}

#[test]
fn test_config_load_from_env() {
    std::env::set_var("THUMBCACHE_TEST_APP_ID", "from-env");
    std::env::set_var("THUMBCACHE_TEST_SIZE", "large");

    let config: Config = Figment::from(Serialized::defaults(Config::default()))
        .merge(Env::prefixed("THUMBCACHE_TEST_"))
        .extract()
        .unwrap();

    assert_eq!(config.app_id, "from-env");
    assert_eq!(config.size, SizeClass::Large);

    std::env::remove_var("THUMBCACHE_TEST_APP_ID");
    std::env::remove_var("THUMBCACHE_TEST_SIZE");
}

#[test]
fn test_config_invalid_toml_is_error() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(&path, "size = \"enormous\"").unwrap();
    assert!(Config::load_from(Some(&path)).is_err());
}

#[test]
fn test_config_save_and_reload() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("nested").join("config.toml");
    let config = Config {
        app_id: "saved".to_string(),
        disabled_mime_types: vec!["image/gif".to_string()],
        ..Config::default()
    };
    config.save(&path).unwrap();

    let content = fs::read_to_string(&path).unwrap();
    assert!(content.contains("app_id = \"saved\""));

    let loaded = Config::load_from(Some(&path)).unwrap();
    assert_eq!(loaded.app_id, "saved");
    assert_eq!(loaded.disabled_mime_types, vec!["image/gif".to_string()]);
}

#[test]
fn test_factory_from_config_honours_disabled_types() {
    let dir = tempdir().unwrap();
    let config = Config {
        cache_dir: Some(dir.path().to_path_buf()),
        thumbnailer_dirs: Some(vec![dir.path().join("none")]),
        disabled_mime_types: vec!["image/png".to_string()],
        ..Config::default()
    };
    let factory = config.build_factory(None).unwrap();
    assert!(!factory.can_generate("file:///tmp/a.png", Some("image/png"), 1));
    assert!(factory.can_generate("file:///tmp/a.gif", Some("image/gif"), 1));
    assert_eq!(factory.paths().root(), dir.path());
}
