// tests/config_loading.rs

use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Parser;
use tempfile::NamedTempFile;
use tracing_subscriber::filter::LevelFilter;

use buildwatch::{apply_cli_overrides, config_root_dir};
use buildwatch::cli::{CliArgs, LogLevel};
use buildwatch::config::model::DEFAULT_STEP_NAME;
use buildwatch::config::{BuildStep, ConfigFile, load_and_validate, load_from_path, load_with_fs};
use buildwatch::engine::WatcherOptions;
use buildwatch::errors::BuildwatchError;
use buildwatch::fs::mock::MockFileSystem;
use buildwatch::logging::build_filter;
use buildwatch_test_utils::builders::ConfigFileBuilder;

fn write_config(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "{contents}").unwrap();
    file
}

fn expect_config_error(result: Result<ConfigFile, BuildwatchError>, needle: &str) {
    match result {
        Err(BuildwatchError::ConfigError(msg)) => {
            assert!(msg.contains(needle), "message {msg:?} should mention {needle:?}");
        }
        Err(e) => panic!("Expected ConfigError, got: {:?}", e),
        Ok(_) => panic!("Expected error, got Ok"),
    }
}

#[test]
fn cmd_shorthand_becomes_single_default_step() {
    let file = write_config(
        r#"
[watch]
debounce_ms = 250
dirs = ["src"]

[build]
cmd = "make"
"#,
    );

    let cfg = load_and_validate(file.path()).unwrap();
    assert_eq!(
        cfg.steps,
        vec![BuildStep {
            name: DEFAULT_STEP_NAME.to_string(),
            cmd: "make".to_string(),
        }]
    );

    let options = cfg.watcher_options();
    assert_eq!(options.debounce, Duration::from_millis(250));
    assert!(!options.poll);
    assert!(!options.verbose);
}

#[test]
fn named_steps_keep_their_order() {
    let file = write_config(
        r#"
[watch]
poll = true
poll_interval_ms = 300
verbose = true

[[build.step]]
name = "compile"
cmd = "cargo build"

[[build.step]]
name = "test"
cmd = "cargo test"
"#,
    );

    let cfg = load_and_validate(file.path()).unwrap();
    let names: Vec<_> = cfg.steps.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["compile", "test"]);

    let options = cfg.watcher_options();
    assert!(options.poll);
    assert!(options.verbose);
    assert_eq!(options.poll_interval, Duration::from_millis(300));
}

#[test]
fn missing_watch_section_uses_defaults() {
    let file = write_config(
        r#"
[build]
cmd = "true"
"#,
    );

    let cfg = load_and_validate(file.path()).unwrap();
    assert_eq!(cfg.watcher_options(), WatcherOptions::default());
    assert!(cfg.watch.dirs.is_empty());
}

#[test]
fn load_from_path_skips_validation() {
    let file = write_config("[watch]\ndebounce_ms = 5\n");

    let raw = load_from_path(file.path()).unwrap();
    assert_eq!(raw.watch.debounce_ms, 5);
    assert!(raw.build.cmd.is_none());

    expect_config_error(load_and_validate(file.path()), "[build]");
}

#[test]
fn cmd_and_steps_together_are_rejected() {
    let file = write_config(
        r#"
[build]
cmd = "make"

[[build.step]]
name = "other"
cmd = "make other"
"#,
    );

    expect_config_error(load_and_validate(file.path()), "not both");
}

#[test]
fn duplicate_step_names_are_rejected() {
    let raw = ConfigFileBuilder::new()
        .with_step("compile", "make")
        .with_step("compile", "make again")
        .build_raw();

    expect_config_error(ConfigFile::try_from(raw), "duplicate build step name 'compile'");
}

#[test]
fn empty_step_cmd_is_rejected() {
    let raw = ConfigFileBuilder::new().with_step("lint", "   ").build_raw();
    expect_config_error(ConfigFile::try_from(raw), "'lint'");
}

#[test]
fn zero_poll_interval_is_rejected() {
    let raw = ConfigFileBuilder::new().with_cmd("make").poll(0).build_raw();
    expect_config_error(ConfigFile::try_from(raw), "poll_interval_ms");
}

#[test]
fn empty_dir_entry_is_rejected() {
    let raw = ConfigFileBuilder::new().with_cmd("make").with_dir(" ").build_raw();
    expect_config_error(ConfigFile::try_from(raw), "empty entries");
}

#[test]
fn invalid_toml_is_a_toml_error() {
    let file = write_config("[build\ncmd = ");
    assert!(matches!(
        load_and_validate(file.path()),
        Err(BuildwatchError::TomlError(_))
    ));
}

#[cfg(unix)]
#[test]
fn relative_dirs_resolve_against_root() {
    let cfg = ConfigFileBuilder::new()
        .with_cmd("make")
        .with_dir("src")
        .with_dir("/abs/assets")
        .build();

    let dirs = cfg.resolved_dirs(Path::new("/project"));
    assert_eq!(
        dirs,
        vec![PathBuf::from("/project/src"), PathBuf::from("/abs/assets")]
    );
}

#[test]
fn load_with_mock_fs() {
    let fs = MockFileSystem::new();
    fs.add_file(
        "/cfg/Buildwatch.toml",
        "[watch]\ndirs = [\"src\"]\n[build]\ncmd = \"make\"\n",
    );

    let cfg = load_with_fs(&fs, "/cfg/Buildwatch.toml").unwrap();
    assert_eq!(cfg.watch.dirs, vec!["src".to_string()]);

    assert!(matches!(
        load_with_fs(&fs, "/cfg/missing.toml"),
        Err(BuildwatchError::Other(_))
    ));
}

#[test]
fn cli_flags_override_watch_section() {
    let cfg = ConfigFileBuilder::new()
        .with_cmd("make")
        .debounce_ms(100)
        .build();

    let args = CliArgs::parse_from(["buildwatch", "--poll", "--verbose", "--debounce", "40"]);
    let options = apply_cli_overrides(cfg.watcher_options(), &args);

    assert!(options.poll);
    assert!(options.verbose);
    assert_eq!(options.debounce, Duration::from_millis(40));
}

#[test]
fn absent_cli_flags_keep_config_values() {
    let cfg = ConfigFileBuilder::new()
        .with_cmd("make")
        .debounce_ms(75)
        .poll(500)
        .verbose(true)
        .build();

    let args = CliArgs::parse_from(["buildwatch"]);
    assert_eq!(args.config, "Buildwatch.toml");

    let options = apply_cli_overrides(cfg.watcher_options(), &args);
    assert_eq!(options, cfg.watcher_options());
}

#[test]
fn cli_log_level_beats_environment() {
    let (filter, rejected) = build_filter(Some(LogLevel::Warn), Some("trace"));
    assert_eq!(filter.max_level_hint(), Some(LevelFilter::WARN));
    assert!(rejected.is_none());
}

#[test]
fn environment_accepts_filter_directives() {
    let (filter, rejected) = build_filter(None, Some(" buildwatch=debug,notify=warn "));
    assert_eq!(filter.max_level_hint(), Some(LevelFilter::DEBUG));
    assert!(rejected.is_none());

    let (filter, _) = build_filter(None, None);
    assert_eq!(filter.max_level_hint(), Some(LevelFilter::INFO));
}

#[test]
fn invalid_environment_filter_falls_back_to_info() {
    let (filter, rejected) = build_filter(None, Some("buildwatch=loud"));
    assert_eq!(filter.max_level_hint(), Some(LevelFilter::INFO));
    assert_eq!(rejected.as_deref(), Some("buildwatch=loud"));
}

#[test]
fn config_root_is_absolute_for_relative_config_paths() {
    let root = config_root_dir(Path::new("configs/Buildwatch.toml"));
    assert!(root.is_absolute(), "got {root:?}");
    assert!(root.ends_with("configs"));

    let bare = config_root_dir(Path::new("Buildwatch.toml"));
    assert_eq!(bare, std::env::current_dir().unwrap());

    let cfg = ConfigFileBuilder::new().with_cmd("make").with_dir("src").build();
    assert!(cfg.resolved_dirs(&root).iter().all(|d| d.is_absolute()));
}
