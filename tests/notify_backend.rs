// tests/notify_backend.rs

use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::time::{Duration, Instant};

use notify::event::{AccessKind, CreateKind, DataChange, Event, EventKind, ModifyKind, RemoveKind};
use tempfile::TempDir;

use buildwatch::engine::WatcherOptions;
use buildwatch::watch::notify_backend::file_events;
use buildwatch::watch::{
    BackendKind, FileEvent, FileEventKind, NotifyBackend, TriggerSink, WatchBackend, select_backend,
};

#[test]
fn create_modify_remove_map_to_file_events() {
    let path = PathBuf::from("/tmp/x/a.txt");

    let created = Event::new(EventKind::Create(CreateKind::File)).add_path(path.clone());
    let modified = Event::new(EventKind::Modify(ModifyKind::Data(DataChange::Content)))
        .add_path(path.clone());
    let removed = Event::new(EventKind::Remove(RemoveKind::File)).add_path(path.clone());

    assert_eq!(
        file_events(&created),
        vec![FileEvent::new(FileEventKind::Created, &path)]
    );
    assert_eq!(
        file_events(&modified),
        vec![FileEvent::new(FileEventKind::Changed, &path)]
    );
    assert_eq!(
        file_events(&removed),
        vec![FileEvent::new(FileEventKind::Deleted, &path)]
    );
}

#[test]
fn access_and_unclassified_events_are_dropped() {
    let access = Event::new(EventKind::Access(AccessKind::Any)).add_path("/tmp/x/a.txt".into());
    let any = Event::new(EventKind::Any).add_path("/tmp/x/a.txt".into());
    let other = Event::new(EventKind::Other);

    assert!(file_events(&access).is_empty());
    assert!(file_events(&any).is_empty());
    assert!(file_events(&other).is_empty());
}

#[test]
fn one_event_per_path() {
    let rename = Event::new(EventKind::Modify(ModifyKind::Any))
        .add_path("/tmp/x/old.txt".into())
        .add_path("/tmp/x/new.txt".into());

    let events = file_events(&rename);
    assert_eq!(events.len(), 2);
    assert!(events.iter().all(|e| e.kind == FileEventKind::Changed));
}

#[test]
fn event_kinds_display_as_change_add_delete() {
    assert_eq!(FileEventKind::Changed.to_string(), "changed");
    assert_eq!(FileEventKind::Created.to_string(), "added");
    assert_eq!(FileEventKind::Deleted.to_string(), "deleted");
}

#[test]
fn backend_kind_follows_options() {
    let native = WatcherOptions::default();
    assert_eq!(BackendKind::from_options(&native), BackendKind::Native);
    assert_eq!(select_backend(&native).name(), "native");

    let polling = WatcherOptions {
        poll: true,
        poll_interval: Duration::from_millis(250),
        ..WatcherOptions::default()
    };
    assert_eq!(
        BackendKind::from_options(&polling),
        BackendKind::Polling {
            interval: Duration::from_millis(250)
        }
    );
    assert_eq!(select_backend(&polling).name(), "polling");
}

fn channel_sink() -> (TriggerSink, mpsc::Receiver<FileEvent>) {
    let (tx, rx) = mpsc::channel();
    let sink = TriggerSink::new(move |event| {
        let _ = tx.send(event);
    });
    (sink, rx)
}

/// Wait until an event for `path` shows up.
fn wait_for_path(rx: &mpsc::Receiver<FileEvent>, path: &Path, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    while let Some(left) = deadline.checked_duration_since(Instant::now()) {
        match rx.recv_timeout(left) {
            Ok(event) if event.path == path => return true,
            Ok(_) => continue,
            Err(_) => return false,
        }
    }
    false
}

fn temp_root() -> (TempDir, PathBuf) {
    let dir = TempDir::new().unwrap();
    // macOS reports events under the canonical /private/... path.
    let root = dir.path().canonicalize().unwrap();
    (dir, root)
}

#[test]
fn native_backend_reports_new_files_until_stopped() {
    let (_guard, root) = temp_root();
    let (sink, rx) = channel_sink();

    let backend = NotifyBackend::new(BackendKind::Native);
    let mut handle = backend.watch(&root, sink).unwrap();

    // Give the OS watch a moment to be in place.
    std::thread::sleep(Duration::from_millis(100));
    let file = root.join("created.txt");
    std::fs::write(&file, "hello").unwrap();
    assert!(wait_for_path(&rx, &file, Duration::from_secs(5)));

    handle.stop();
    handle.stop();
    while rx.try_recv().is_ok() {}

    let late = root.join("late.txt");
    std::fs::write(&late, "too late").unwrap();
    assert!(!wait_for_path(&rx, &late, Duration::from_millis(500)));
}

#[test]
fn polling_backend_reports_new_files() {
    let (_guard, root) = temp_root();
    let (sink, rx) = channel_sink();

    let backend = NotifyBackend::new(BackendKind::Polling {
        interval: Duration::from_millis(50),
    });
    let mut handle = backend.watch(&root, sink).unwrap();

    std::thread::sleep(Duration::from_millis(100));
    let file = root.join("polled.txt");
    std::fs::write(&file, "hello").unwrap();
    assert!(wait_for_path(&rx, &file, Duration::from_secs(5)));

    handle.stop();
}

#[test]
fn watching_a_missing_directory_fails() {
    let (_guard, root) = temp_root();
    let (sink, _rx) = channel_sink();

    let backend = NotifyBackend::new(BackendKind::Native);
    assert!(backend.watch(&root.join("does-not-exist"), sink).is_err());
}
