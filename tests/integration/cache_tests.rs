use image::{Rgba, RgbaImage};
use std::fs;
use tempfile::tempdir;
use thumbcache::cache::{
    codec::read_thumbnail, create_failed_thumbnail, fingerprint, has_failed, lookup, save,
    validate, CachePaths, SaveOutcome, SizeClass, Thumbnail, DEFAULT_APP_ID,
};

fn thumbnail() -> Thumbnail {
    Thumbnail::new(RgbaImage::from_pixel(32, 24, Rgba([10, 20, 30, 255])))
}

#[test]
fn test_save_lookup_round_trip() {
    let dir = tempdir().unwrap();
    let paths = CachePaths::new(dir.path(), DEFAULT_APP_ID);
    let uri = "file:///tmp/a.jpg";

    let outcome = save(&paths, &thumbnail(), uri, 1000, SizeClass::Normal);
    assert!(matches!(outcome, SaveOutcome::Saved(_)));

    let found = lookup(&paths, uri, 1000, SizeClass::Normal).unwrap();
    assert_eq!(validate(&found, uri, 1000), Some(found.clone()));
    assert!(lookup(&paths, uri, 1001, SizeClass::Normal).is_none());

    let (read_back, provenance) = read_thumbnail(&found).unwrap();
    assert_eq!((read_back.width(), read_back.height()), (32, 24));
    assert_eq!(read_back.image().get_pixel(5, 5).0, [10, 20, 30, 255]);
    assert_eq!(provenance.mtime.as_deref(), Some("1000"));
}

#[test]
fn test_cache_file_is_named_by_fingerprint() {
    let dir = tempdir().unwrap();
    let paths = CachePaths::new(dir.path(), DEFAULT_APP_ID);
    let uri = "file:///home/user/photo.png";

    let outcome = save(&paths, &thumbnail(), uri, 1, SizeClass::Large);
    let saved = outcome.saved_path().unwrap();
    assert_eq!(
        saved,
        dir.path()
            .join("thumbnails")
            .join("large")
            .join(format!("{}.png", fingerprint(uri)))
    );
}

#[test]
fn test_double_save_is_idempotent() {
    let dir = tempdir().unwrap();
    let paths = CachePaths::new(dir.path(), DEFAULT_APP_ID);
    let uri = "file:///tmp/twice.png";

    let first = save(&paths, &thumbnail(), uri, 9, SizeClass::Normal);
    let second = save(&paths, &thumbnail(), uri, 9, SizeClass::Normal);
    assert_eq!(first, second);
    assert!(lookup(&paths, uri, 9, SizeClass::Normal).is_some());

    let files = fs::read_dir(paths.size_dir(SizeClass::Normal)).unwrap().count();
    assert_eq!(files, 1);
}

#[test]
fn test_failure_marker_memoizes() {
    let dir = tempdir().unwrap();
    let paths = CachePaths::new(dir.path(), "test-app");
    let uri = "file:///tmp/broken.pdf";

    assert!(!has_failed(&paths, uri, 50));
    let marker = create_failed_thumbnail(&paths, uri, 50).unwrap();
    assert_eq!(marker, paths.failed_path(uri));
    assert!(marker.starts_with(dir.path().join("thumbnails/fail/test-app")));

    assert!(has_failed(&paths, uri, 50));
    assert!(!has_failed(&paths, uri, 51));
    // A failure marker is not a thumbnail.
    assert!(lookup(&paths, uri, 50, SizeClass::Normal).is_none());

    let (pixel, _) = read_thumbnail(&marker).unwrap();
    assert_eq!((pixel.width(), pixel.height()), (1, 1));
    assert_eq!(pixel.image().get_pixel(0, 0).0[3], 0);
}

#[test]
fn test_corrupted_cache_file_is_a_miss_and_gets_replaced() {
    let dir = tempdir().unwrap();
    let paths = CachePaths::new(dir.path(), DEFAULT_APP_ID);
    let uri = "file:///tmp/c.png";
    let target = paths.thumbnail_path(uri, SizeClass::Normal);

    fs::create_dir_all(target.parent().unwrap()).unwrap();
    fs::write(&target, b"\x89PNG\r\n\x1a\ntruncated").unwrap();
    assert!(lookup(&paths, uri, 1, SizeClass::Normal).is_none());

    save(&paths, &thumbnail(), uri, 1, SizeClass::Normal);
    assert_eq!(lookup(&paths, uri, 1, SizeClass::Normal), Some(target));
}

#[test]
fn test_concurrent_saves_of_different_uris() {
    let dir = tempdir().unwrap();
    let paths = CachePaths::new(dir.path(), DEFAULT_APP_ID);

    std::thread::scope(|scope| {
        for i in 0..8 {
            let paths = &paths;
            scope.spawn(move || {
                let uri = format!("file:///tmp/{i}.png");
                save(paths, &thumbnail(), &uri, i, SizeClass::Normal);
            });
        }
    });

    for i in 0..8 {
        let uri = format!("file:///tmp/{i}.png");
        assert!(lookup(&paths, &uri, i, SizeClass::Normal).is_some());
    }
}

#[test]
fn test_touching_the_source_invalidates_its_thumbnail() {
    use filetime::{set_file_mtime, FileTime};

    let dir = tempdir().unwrap();
    let source = dir.path().join("photo.png");
    fs::write(&source, b"not really a png").unwrap();
    set_file_mtime(&source, FileTime::from_unix_time(1_600_000_000, 0)).unwrap();

    let mtime_of = |path: &std::path::Path| {
        FileTime::from_last_modification_time(&fs::metadata(path).unwrap()).unix_seconds()
    };
    let paths = CachePaths::new(dir.path().join("cache"), DEFAULT_APP_ID);
    let uri = url::Url::from_file_path(&source).unwrap().to_string();

    save(&paths, &thumbnail(), &uri, mtime_of(&source), SizeClass::Normal);
    assert!(lookup(&paths, &uri, mtime_of(&source), SizeClass::Normal).is_some());

    set_file_mtime(&source, FileTime::from_unix_time(1_600_000_060, 0)).unwrap();
    assert_eq!(mtime_of(&source), 1_600_000_060);
    assert!(lookup(&paths, &uri, mtime_of(&source), SizeClass::Normal).is_none());
}
