use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempfile::tempdir;
use thumbcache::registry::{MemorySettings, Registry, WatchEvent};

const SVG_THUMBNAILER: &str =
    "[Thumbnailer Entry]\nExec=convert %i -o %o\nMimeType=image/svg+xml\n";

fn wait_for(registry: &Registry, mut done: impl FnMut(&Registry) -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(10);
    while Instant::now() < deadline {
        registry.pump_events();
        if done(registry) {
            return true;
        }
        std::thread::sleep(Duration::from_millis(50));
    }
    false
}

fn write_atomically(path: &Path, contents: &str) {
    let staging = path.with_extension("partial");
    fs::write(&staging, contents).unwrap();
    fs::rename(&staging, path).unwrap();
}

#[test]
fn test_dropped_definition_is_picked_up_by_watcher() {
    let dir = tempdir().unwrap();
    let registry = Registry::with_dirs(
        vec![dir.path().to_path_buf()],
        Arc::new(MemorySettings::default()),
    );
    registry.load();
    assert!(registry.lookup("image/svg+xml").is_none());
    assert_eq!(registry.watched_dirs(), vec![dir.path().to_path_buf()]);

    let path = dir.path().join("svg.thumbnailer");
    write_atomically(&path, SVG_THUMBNAILER);
    assert!(
        wait_for(&registry, |r| r.lookup("image/svg+xml").is_some()),
        "definition was not picked up"
    );
    assert_eq!(
        registry.lookup("image/svg+xml").unwrap().command(),
        "convert %i -o %o"
    );

    fs::remove_file(&path).unwrap();
    assert!(
        wait_for(&registry, |r| r.lookup("image/svg+xml").is_none()),
        "deleted definition is still registered"
    );
}

#[test]
fn test_event_driven_scenario_without_watcher() {
    let dir = tempdir().unwrap();
    let registry = Registry::with_dirs(
        vec![dir.path().to_path_buf()],
        Arc::new(MemorySettings::default()),
    )
    .without_watching();

    let path = dir.path().join("svg.thumbnailer");
    fs::write(&path, SVG_THUMBNAILER).unwrap();
    registry.handle_event(&WatchEvent::Created(path.clone()));
    let record = registry.lookup("image/svg+xml").unwrap();
    assert_eq!(record.path(), path.as_path());

    fs::remove_file(&path).unwrap();
    registry.handle_event(&WatchEvent::Deleted(path));
    assert!(registry.lookup("image/svg+xml").is_none());
}

#[test]
fn test_records_are_shared_not_copied() {
    let dir = tempdir().unwrap();
    fs::write(
        dir.path().join("multi.thumbnailer"),
        "[Thumbnailer Entry]\nExec=t %u %o\nMimeType=image/a;image/b;\n",
    )
    .unwrap();
    let registry = Registry::with_dirs(
        vec![dir.path().to_path_buf()],
        Arc::new(MemorySettings::default()),
    )
    .without_watching();

    let a = registry.lookup("image/a").unwrap();
    let b = registry.lookup("image/b").unwrap();
    assert!(Arc::ptr_eq(&a, &b));
    assert!(Arc::ptr_eq(&a, &registry.thumbnailers()[0]));
}

#[test]
fn test_reload_picks_up_new_files() {
    let dir = tempdir().unwrap();
    let registry = Registry::with_dirs(
        vec![dir.path().to_path_buf()],
        Arc::new(MemorySettings::default()),
    )
    .without_watching();
    registry.load();
    assert!(registry.thumbnailers().is_empty());

    fs::write(dir.path().join("svg.thumbnailer"), SVG_THUMBNAILER).unwrap();
    registry.reload();
    assert_eq!(registry.thumbnailers().len(), 1);
}

#[test]
fn test_registry_is_usable_across_threads() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("svg.thumbnailer"), SVG_THUMBNAILER).unwrap();
    let registry = Arc::new(
        Registry::with_dirs(
            vec![dir.path().to_path_buf()],
            Arc::new(MemorySettings::default()),
        )
        .without_watching(),
    );

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let registry = Arc::clone(&registry);
            std::thread::spawn(move || registry.lookup("image/svg+xml").is_some())
        })
        .collect();
    for handle in handles {
        assert!(handle.join().unwrap());
    }
}
