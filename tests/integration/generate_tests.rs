use image::RgbaImage;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tempfile::tempdir;
use thumbcache::cache::{CachePaths, SaveOutcome, SizeClass, DEFAULT_APP_ID};
use thumbcache::generate::expand_thumbnailing_script;
use thumbcache::registry::{MemorySettings, Registry};
use thumbcache::ThumbnailFactory;

fn factory_with(root: &Path, definition: Option<&str>) -> ThumbnailFactory {
    let thumbnailers = root.join("thumbnailers");
    fs::create_dir_all(&thumbnailers).unwrap();
    if let Some(text) = definition {
        fs::write(thumbnailers.join("test.thumbnailer"), text).unwrap();
    }
    let registry = Arc::new(
        Registry::with_dirs(vec![thumbnailers], Arc::new(MemorySettings::default()))
            .without_watching(),
    );
    ThumbnailFactory::new(
        CachePaths::new(root.join("cache"), DEFAULT_APP_ID),
        SizeClass::Normal,
        registry,
    )
}

fn file_uri(path: &Path) -> String {
    url::Url::from_file_path(path).unwrap().to_string()
}

#[test]
fn test_template_without_input_is_invalid() {
    let result = expand_thumbnailing_script(
        "convert -o %o",
        128,
        "file:///tmp/a.svg",
        Path::new("/tmp/out.png"),
    );
    assert!(result.is_err());
}

#[test]
fn test_invalid_template_generates_nothing() {
    let dir = tempdir().unwrap();
    let factory = factory_with(
        dir.path(),
        Some("[Thumbnailer Entry]\nExec=convert -o %o\nMimeType=image/svg+xml;\n"),
    );
    assert!(factory.generate("file:///tmp/a.svg", "image/svg+xml").is_none());
}

#[cfg(unix)]
#[test]
fn test_full_flow_with_external_thumbnailer() {
    let dir = tempdir().unwrap();
    let factory = factory_with(
        dir.path(),
        Some("[Thumbnailer Entry]\nTryExec=cp\nExec=cp %i %o\nMimeType=image/x-copy;\n"),
    );
    let source = dir.path().join("input.bin");
    RgbaImage::new(200, 400).save_with_format(&source, image::ImageFormat::Png).unwrap();
    let uri = file_uri(&source);

    assert!(factory.can_generate(&uri, Some("image/x-copy"), 77));
    let thumbnail = factory.generate(&uri, "image/x-copy").unwrap();
    assert_eq!((thumbnail.width(), thumbnail.height()), (64, 128));

    let outcome = factory.save(&thumbnail, &uri, 77);
    let saved = outcome.saved_path().unwrap().to_path_buf();
    assert_eq!(factory.lookup(&uri, 77), Some(saved));
    assert!(factory.lookup(&uri, 78).is_none());
}

#[cfg(unix)]
#[test]
fn test_failing_thumbnailer_is_not_retried() {
    let dir = tempdir().unwrap();
    let counter = dir.path().join("runs");
    let exec = format!("sh -c 'echo run >> {}; exit 1' %u %o", counter.display());
    let factory = factory_with(
        dir.path(),
        Some(&format!(
            "[Thumbnailer Entry]\nExec={exec}\nMimeType=application/x-broken;\n"
        )),
    );
    let uri = "file:///tmp/whatever.broken";

    assert!(factory.thumbnail_for(uri, Some("application/x-broken"), 3).is_none());
    assert!(factory.has_failed(uri, 3));
    assert!(!factory.can_generate(uri, Some("application/x-broken"), 3));
    assert!(factory.thumbnail_for(uri, Some("application/x-broken"), 3).is_none());

    let runs = fs::read_to_string(&counter).unwrap();
    assert_eq!(runs.lines().count(), 1);
}

#[test]
fn test_builtin_generation_and_save() {
    let dir = tempdir().unwrap();
    let factory = factory_with(dir.path(), None);
    let source = dir.path().join("photo.png");
    RgbaImage::new(1000, 500).save(&source).unwrap();
    let uri = file_uri(&source);

    let thumbnail = factory.generate(&uri, "image/png").unwrap();
    assert_eq!(thumbnail.original_size(), Some((1000, 500)));
    match factory.save(&thumbnail, &uri, 10) {
        SaveOutcome::Saved(path) => assert!(path.exists()),
        other => panic!("unexpected outcome: {other:?}"),
    }
}

#[test]
fn test_cache_files_are_never_thumbnailed() {
    let dir = tempdir().unwrap();
    let factory = factory_with(dir.path(), None);
    let uri = "file:///home/user/.cache/thumbnails/normal/0123.png";
    assert!(!factory.can_generate(uri, Some("image/png"), 1));
    assert!(factory.thumbnail_for(uri, Some("image/png"), 1).is_none());
    assert!(!factory.has_failed(uri, 1));
}
