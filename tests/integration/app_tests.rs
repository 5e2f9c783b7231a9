use clap::Parser;
use image::RgbaImage;
use std::ffi::OsString;
use std::fs;
use tempfile::tempdir;
use thumbcache::cache::{CachePaths, SizeClass, DEFAULT_APP_ID};
use thumbcache::cli::Cli;
use thumbcache::error::ExitCode;

#[test]
fn test_generate_continues_past_unreadable_files() {
    let dir = tempdir().unwrap();
    let cache_root = dir.path().join("cache");
    let config = dir.path().join("config.toml");
    fs::write(
        &config,
        format!(
            "cache_dir = {:?}\nthumbnailer_dirs = [{:?}]\n",
            cache_root,
            dir.path().join("thumbnailers")
        ),
    )
    .unwrap();

    let missing = dir.path().join("missing.png");
    let good = dir.path().join("good.png");
    RgbaImage::new(300, 200).save(&good).unwrap();

    let args: Vec<OsString> = vec![
        "thumbcache".into(),
        "-q".into(),
        "--config".into(),
        config.into_os_string(),
        "generate".into(),
        missing.into_os_string(),
        good.clone().into_os_string(),
    ];
    let cli = Cli::try_parse_from(args).unwrap();
    let code = thumbcache::run_app(cli).unwrap();
    assert_eq!(code, ExitCode::NotAvailable);

    let uri = url::Url::from_file_path(good.canonicalize().unwrap())
        .unwrap()
        .to_string();
    let paths = CachePaths::new(&cache_root, DEFAULT_APP_ID);
    assert!(paths.thumbnail_path(&uri, SizeClass::Normal).exists());
}
