// tests/watch_trigger.rs

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use taskweave::fs::{mock::MockFileSystem, FileSystem, RealFileSystem};
use taskweave::watch::path_utils::relative_str;
use taskweave::watch::{Debouncer, WatchRule, WatchTrigger};

const WINDOW: Duration = Duration::from_millis(100);

fn rule(name: &str, files: &[&str], tasks: &[&str], use_hash: bool) -> WatchRule {
    let files: Vec<String> = files.iter().map(|s| s.to_string()).collect();
    let tasks = tasks.iter().map(|s| s.to_string()).collect();
    WatchRule::new(name, &files, &[], tasks, use_hash).unwrap()
}

fn trigger(rules: Vec<WatchRule>, queue_length: usize) -> WatchTrigger {
    let fs: Arc<dyn FileSystem> = Arc::new(MockFileSystem::new());
    WatchTrigger::new(rules, WINDOW, queue_length, fs, "/proj")
}

fn fired_rules(trigger: &mut WatchTrigger, now: Instant) -> Vec<String> {
    trigger.fire_due(now).into_iter().map(|r| r.rule).collect()
}

#[test]
fn test_debouncer_collapses_events_within_window() {
    let t0 = Instant::now();
    let mut deb = Debouncer::new(WINDOW);

    deb.record("a.js", t0);
    deb.record("a.js", t0 + Duration::from_millis(60));

    // Re-armed by the second event.
    assert_eq!(deb.next_deadline(), Some(t0 + Duration::from_millis(160)));
    assert!(deb.take_due(t0 + Duration::from_millis(120)).is_empty());
    assert_eq!(deb.take_due(t0 + Duration::from_millis(160)), vec!["a.js"]);
    assert!(deb.is_empty());
    assert_eq!(deb.next_deadline(), None);
}

#[test]
fn test_debouncer_returns_due_paths_oldest_first() {
    let t0 = Instant::now();
    let mut deb = Debouncer::new(WINDOW);

    deb.record("b.js", t0 + Duration::from_millis(10));
    deb.record("a.js", t0);
    deb.record("c.js", t0 + Duration::from_millis(90));

    let due = deb.take_due(t0 + Duration::from_millis(115));
    assert_eq!(due, vec!["a.js", "b.js"]);
    assert!(!deb.is_empty());
}

#[test]
fn test_unmatched_path_is_ignored() {
    let mut trig = trigger(vec![rule("scripts", &["client/**/*.js"], &["build"], false)], 4);

    assert!(!trig.record_change("README.md", Instant::now()));
    assert!(trig.is_idle());
    assert_eq!(trig.next_deadline(), None);
}

#[test]
fn test_rapid_changes_fire_once() {
    let t0 = Instant::now();
    let mut trig = trigger(vec![rule("scripts", &["client/**/*.js"], &["build"], false)], 4);

    assert!(trig.record_change("client/app.js", t0));
    assert!(trig.record_change("client/app.js", t0 + Duration::from_millis(30)));
    assert!(trig.fire_due(t0 + Duration::from_millis(100)).is_empty());

    let runs = trig.fire_due(t0 + Duration::from_millis(130));
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].rule, "scripts");
    assert_eq!(runs[0].tasks, vec!["build"]);
    assert_eq!(runs[0].path, "client/app.js");

    assert_eq!(trig.next_run().map(|r| r.rule).as_deref(), Some("scripts"));
    assert!(trig.is_idle());
}

#[test]
fn test_matching_rules_queue_in_declaration_order() {
    let t0 = Instant::now();
    let mut trig = trigger(
        vec![
            rule("lint", &["**/*.js"], &["jshint"], false),
            rule("docs", &["**/*.md"], &["docs"], false),
            rule("scripts", &["client/**/*.js"], &["build"], false),
        ],
        4,
    );

    trig.record_change("client/app.js", t0);
    assert_eq!(fired_rules(&mut trig, t0 + WINDOW), vec!["lint", "scripts"]);
    assert_eq!(trig.queued(), 2);
    assert_eq!(trig.next_run().unwrap().rule, "lint");
    assert_eq!(trig.next_run().unwrap().rule, "scripts");
    assert!(trig.next_run().is_none());
}

#[test]
fn test_queued_rule_is_not_queued_twice() {
    let t0 = Instant::now();
    let mut trig = trigger(vec![rule("scripts", &["client/**/*.js"], &["build"], false)], 4);

    trig.record_change("client/a.js", t0);
    trig.record_change("client/b.js", t0);
    let runs = trig.fire_due(t0 + WINDOW);

    assert_eq!(runs.len(), 1);
    assert_eq!(trig.queued(), 1);
}

#[test]
fn test_full_queue_drops_triggers() {
    let t0 = Instant::now();
    let mut trig = trigger(
        vec![
            rule("a", &["a/*"], &["ta"], false),
            rule("b", &["b/*"], &["tb"], false),
        ],
        1,
    );

    trig.record_change("a/x", t0);
    trig.record_change("b/x", t0 + Duration::from_millis(1));
    let fired = fired_rules(&mut trig, t0 + Duration::from_millis(200));

    assert_eq!(fired, vec!["a"]);
    assert_eq!(trig.queued(), 1);
}

#[test]
fn test_zero_queue_length_is_clamped() {
    let t0 = Instant::now();
    let mut trig = trigger(vec![rule("a", &["a/*"], &["ta"], false)], 0);

    trig.record_change("a/x", t0);
    assert_eq!(fired_rules(&mut trig, t0 + WINDOW), vec!["a"]);
}

#[test]
fn test_use_hash_skips_unchanged_content() {
    let t0 = Instant::now();
    let mock = MockFileSystem::new();
    mock.add_file("/proj/less/site.less", "body {}");
    mock.add_file("/proj/less/theme.less", "a {}");
    let fs: Arc<dyn FileSystem> = Arc::new(mock.clone());

    let mut trig = WatchTrigger::new(
        vec![
            rule("less", &["less/**/*.less"], &["less"], true),
            rule("any", &["less/**/*.less"], &["log"], false),
        ],
        WINDOW,
        4,
        fs,
        "/proj",
    );
    trig.prime_hashes();

    // Touched but not modified: only the plain rule fires.
    trig.record_change("less/site.less", t0);
    assert_eq!(fired_rules(&mut trig, t0 + WINDOW), vec!["any"]);
    while trig.next_run().is_some() {}

    // Real edit: both fire.
    mock.add_file("/proj/less/site.less", "body { color: red }");
    let t1 = t0 + Duration::from_secs(1);
    trig.record_change("less/site.less", t1);
    assert_eq!(fired_rules(&mut trig, t1 + WINDOW), vec!["less", "any"]);
    while trig.next_run().is_some() {}

    // Saved again with the same content.
    let t2 = t1 + Duration::from_secs(1);
    trig.record_change("less/site.less", t2);
    assert_eq!(fired_rules(&mut trig, t2 + WINDOW), vec!["any"]);
}

#[test]
fn test_use_hash_treats_deleted_file_as_changed() {
    let t0 = Instant::now();
    let mock = MockFileSystem::new();
    mock.add_file("/proj/less/site.less", "body {}");
    let fs: Arc<dyn FileSystem> = Arc::new(mock.clone());

    let mut trig = WatchTrigger::new(
        vec![rule("less", &["less/*.less"], &["less"], true)],
        WINDOW,
        4,
        fs,
        "/proj",
    );
    trig.prime_hashes();

    mock.remove(Path::new("/proj/less/site.less")).unwrap();
    trig.record_change("less/site.less", t0);
    assert_eq!(fired_rules(&mut trig, t0 + WINDOW), vec!["less"]);
}

#[test]
fn test_relative_str_strips_root() {
    let root = Path::new("/proj");
    assert_eq!(
        relative_str(root, Path::new("/proj/client/app.js")).as_deref(),
        Some("client/app.js")
    );
    assert_eq!(relative_str(root, Path::new("/elsewhere/x.js")), None);
}

#[cfg(unix)]
#[test]
fn test_relative_str_falls_back_to_canonical_paths() {
    let dir = tempfile::tempdir().unwrap();
    let real_root = dir.path().join("project");
    let file = real_root.join("src").join("main.js");
    std::fs::create_dir_all(file.parent().unwrap()).unwrap();
    std::fs::write(&file, "x").unwrap();
    assert!(RealFileSystem.is_file(&file));

    // The watcher may report paths under the real directory while the root
    // was given through a symlink.
    let link = dir.path().join("link");
    std::os::unix::fs::symlink(&real_root, &link).unwrap();

    assert_eq!(relative_str(&link, &file).as_deref(), Some("src/main.js"));
}
