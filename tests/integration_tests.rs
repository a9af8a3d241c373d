/// Integration tests for springclean
///
/// These tests drive the library the way a front end does: real directories in a
/// temporary location, a category mapping, an organize run, then assertions on
/// both the returned report and the resulting filesystem layout.
///
/// Test categories:
/// 1. Basic organization workflows
/// 2. Progress notifications
/// 3. Failures and re-runs
/// 4. External category definitions
/// 5. Background runs and the command line
use clap::Parser;
use springclean::category::{CategoryMapping, DefinitionSource, OTHERS};
use springclean::cli::{Cli, run};
use springclean::organizer::{MoveStatus, NoProgress, OrganizeError, organize};
use springclean::settings::{AppSettings, Theme};
use springclean::worker::spawn_run;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

// ============================================================================
// Test Utilities
// ============================================================================

/// A temporary directory with helpers to build and inspect file layouts.
struct TestFixture {
    temp_dir: TempDir,
}

impl TestFixture {
    fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        TestFixture { temp_dir }
    }

    fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Create a file with content, relative to the fixture root.
    fn create_file(&self, rel_path: &str, content: &str) {
        let file_path = self.path().join(rel_path);
        if let Some(parent) = file_path.parent() {
            fs::create_dir_all(parent).expect("Failed to create parent directory");
        }
        fs::write(&file_path, content).expect("Failed to write file");
    }

    fn create_files(&self, names: &[&str]) {
        for name in names {
            self.create_file(name, name);
        }
    }

    fn create_subdir(&self, name: &str) {
        fs::create_dir(self.path().join(name)).expect("Failed to create subdirectory");
    }

    fn assert_dir_exists(&self, rel_path: &str) {
        let path = self.path().join(rel_path);
        assert!(path.is_dir(), "Directory should exist: {}", path.display());
    }

    fn assert_file_exists(&self, rel_path: &str) {
        let path = self.path().join(rel_path);
        assert!(path.is_file(), "File should exist: {}", path.display());
    }

    fn assert_file_not_exists(&self, rel_path: &str) {
        let path = self.path().join(rel_path);
        assert!(!path.exists(), "File should not exist: {}", path.display());
    }

    fn read(&self, rel_path: &str) -> String {
        fs::read_to_string(self.path().join(rel_path)).expect("Failed to read file")
    }

    /// Count regular files directly in the fixture root.
    fn count_files(&self) -> usize {
        self.entries().filter(|path| path.is_file()).count()
    }

    /// Count directories directly in the fixture root.
    fn count_dirs(&self) -> usize {
        self.entries().filter(|path| path.is_dir()).count()
    }

    fn entries(&self) -> impl Iterator<Item = PathBuf> {
        fs::read_dir(self.path())
            .expect("Failed to read directory")
            .filter_map(|entry| entry.ok().map(|e| e.path()))
    }
}

// ============================================================================
// Test Suite 1: Basic Organization
// ============================================================================

#[test]
fn test_organize_default_scenario() {
    let fixture = TestFixture::new();
    fixture.create_files(&["a.pdf", "b.png", "c.xyz"]);

    let report = organize(fixture.path(), &CategoryMapping::builtin(), &mut NoProgress)
        .expect("Run should succeed");

    assert_eq!(report.total(), 3);
    assert_eq!(report.moved(), 3);
    assert_eq!(report.errored(), 0);

    let expected = [("a.pdf", "DOCUMENTS"), ("b.png", "IMAGES"), ("c.xyz", OTHERS)];
    for (name, category) in expected {
        let outcome = report.outcome_for(name).expect("Outcome should be recorded");
        assert_eq!(outcome.category(), category);
        assert_eq!(
            outcome.destination(),
            Some(fixture.path().join(category).join(name).as_path())
        );
        fixture.assert_file_exists(&format!("{category}/{name}"));
        fixture.assert_file_not_exists(name);
    }

    for category in ["DOCUMENTS", "IMAGES", OTHERS] {
        fixture.assert_dir_exists(category);
    }
    assert_eq!(fixture.count_dirs(), 3, "Three category directories expected");
    assert_eq!(fixture.count_files(), 0, "Root should hold no files");
}

#[test]
fn test_organize_empty_directory() {
    let fixture = TestFixture::new();

    let mut calls = 0;
    let report = organize(
        fixture.path(),
        &CategoryMapping::builtin(),
        &mut |_: usize, _: usize| calls += 1,
    )
    .expect("Run should succeed on empty directory");

    assert_eq!(report.total(), 0);
    assert_eq!(report.moved(), 0);
    assert_eq!(report.errored(), 0);
    assert!(report.outcomes().is_empty());
    assert_eq!(calls, 0, "Progress sink should not be invoked");
    assert_eq!(fixture.count_dirs(), 0, "No directories should be created");
}

#[test]
fn test_directory_with_only_subdirectories_is_a_no_op() {
    let fixture = TestFixture::new();
    fixture.create_file("projects/readme.txt", "nested");
    fixture.create_subdir("empty");

    let report = organize(fixture.path(), &CategoryMapping::builtin(), &mut NoProgress)
        .expect("Run should succeed");

    assert_eq!(report.total(), 0);
    fixture.assert_file_exists("projects/readme.txt");
    assert_eq!(fixture.count_dirs(), 2);
}

#[test]
fn test_subdirectories_are_left_untouched() {
    let fixture = TestFixture::new();
    fixture.create_files(&["one.mp3", "two.docx", "three.rs", "four"]);
    fixture.create_file("music/inner.mp3", "inner");
    fixture.create_file("work/notes.txt", "inner");

    let report = organize(fixture.path(), &CategoryMapping::builtin(), &mut NoProgress)
        .expect("Run should succeed");

    assert_eq!(report.total(), 4);
    assert_eq!(report.moved() + report.errored(), 4);
    fixture.assert_file_exists("music/inner.mp3");
    fixture.assert_file_exists("work/notes.txt");
    fixture.assert_file_not_exists("AUDIO/inner.mp3");
    fixture.assert_file_exists("AUDIO/one.mp3");
    fixture.assert_file_exists("DOCUMENTS/two.docx");
    fixture.assert_file_exists("CODE/three.rs");
    fixture.assert_file_exists("OTHERS/four");
}

#[test]
fn test_every_regular_file_appears_exactly_once() {
    let fixture = TestFixture::new();
    let extensions = ["jpg", "txt", "zip", "bin"];
    let names: Vec<String> = (0..40)
        .map(|i| format!("file_{i}.{}", extensions[i % 4]))
        .collect();
    for name in &names {
        fixture.create_file(name, "content");
    }

    let report = organize(fixture.path(), &CategoryMapping::builtin(), &mut NoProgress)
        .expect("Run should succeed");

    let seen: Vec<&str> = report.outcomes().iter().map(|o| o.file_name()).collect();
    let unique: HashSet<&str> = seen.iter().copied().collect();
    assert_eq!(seen.len(), names.len());
    assert_eq!(unique.len(), names.len());
    for name in &names {
        assert!(unique.contains(name.as_str()), "Missing outcome for {name}");
    }
}

#[test]
fn test_extension_case_does_not_change_category() {
    let fixture = TestFixture::new();
    fixture.create_files(&["Photo.JPG", "scan.jpeg", "Movie.MP4"]);

    let report = organize(fixture.path(), &CategoryMapping::builtin(), &mut NoProgress)
        .expect("Run should succeed");

    assert_eq!(report.moved(), 3);
    fixture.assert_file_exists("IMAGES/Photo.JPG");
    fixture.assert_file_exists("IMAGES/scan.jpeg");
    fixture.assert_file_exists("VIDEOS/Movie.MP4");
}

#[test]
fn test_existing_unrelated_folder_is_merged_into() {
    let fixture = TestFixture::new();
    fixture.create_file("IMAGES/holiday-plan.txt", "not an image");
    fixture.create_file("cat.gif", "gif");

    let report = organize(fixture.path(), &CategoryMapping::builtin(), &mut NoProgress)
        .expect("Run should succeed");

    assert_eq!(report.moved(), 1);
    fixture.assert_file_exists("IMAGES/cat.gif");
    fixture.assert_file_exists("IMAGES/holiday-plan.txt");
}

#[cfg(unix)]
#[test]
fn test_symlinks_are_skipped() {
    let fixture = TestFixture::new();
    fixture.create_file("real.txt", "real");
    std::os::unix::fs::symlink(fixture.path().join("real.txt"), fixture.path().join("link.txt"))
        .expect("Failed to create symlink");

    let report = organize(fixture.path(), &CategoryMapping::builtin(), &mut NoProgress)
        .expect("Run should succeed");

    assert_eq!(report.total(), 1);
    assert_eq!(report.outcomes()[0].file_name(), "real.txt");
    assert!(fixture.path().join("link.txt").symlink_metadata().is_ok());
}

// ============================================================================
// Test Suite 2: Progress
// ============================================================================

#[test]
fn test_progress_is_determinate_and_monotonic() {
    let fixture = TestFixture::new();
    fixture.create_files(&["a.pdf", "b.png", "c.xyz", "d.mp3", "e.zip"]);
    fixture.create_subdir("keep");

    let mut updates = Vec::new();
    let report = organize(
        fixture.path(),
        &CategoryMapping::builtin(),
        &mut |processed: usize, total: usize| updates.push((processed, total)),
    )
    .expect("Run should succeed");

    assert_eq!(updates, vec![(1, 5), (2, 5), (3, 5), (4, 5), (5, 5)]);
    assert_eq!(report.total(), 5);
}

#[test]
fn test_progress_counts_failed_files() {
    let fixture = TestFixture::new();
    fixture.create_file("DOCUMENTS/a.pdf", "existing");
    fixture.create_files(&["a.pdf", "b.png"]);

    let mut last = None;
    let report = organize(
        fixture.path(),
        &CategoryMapping::builtin(),
        &mut |processed: usize, total: usize| last = Some((processed, total)),
    )
    .expect("Run should succeed");

    assert_eq!(report.errored(), 1);
    assert_eq!(last, Some((2, 2)));
}

// ============================================================================
// Test Suite 3: Failures and Re-runs
// ============================================================================

#[test]
fn test_collision_fails_only_that_file() {
    let fixture = TestFixture::new();
    fixture.create_file("IMAGES/b.png", "already organized");
    fixture.create_files(&["a.pdf", "b.png", "c.xyz", "d.mp3"]);

    let report = organize(fixture.path(), &CategoryMapping::builtin(), &mut NoProgress)
        .expect("Run should succeed");

    assert_eq!(report.total(), 4);
    assert_eq!(report.errored(), 1);
    assert_eq!(report.moved(), 3);

    let failed = report.outcome_for("b.png").expect("Outcome should be recorded");
    assert_eq!(failed.category(), "IMAGES");
    assert!(matches!(failed.status(), MoveStatus::Failed { .. }));
    assert!(
        failed.error().is_some_and(|e| e.contains("already exists")),
        "Unexpected error: {:?}",
        failed.error()
    );

    let failures: Vec<_> = report.failures().map(|o| o.file_name()).collect();
    assert_eq!(failures, vec!["b.png"]);

    // Neither copy of b.png was lost or overwritten.
    assert_eq!(fixture.read("IMAGES/b.png"), "already organized");
    assert_eq!(fixture.read("b.png"), "b.png");
    fixture.assert_file_exists("DOCUMENTS/a.pdf");
    fixture.assert_file_exists("OTHERS/c.xyz");
    fixture.assert_file_exists("AUDIO/d.mp3");
}

#[test]
fn test_missing_target_is_fatal_and_touches_nothing() {
    let fixture = TestFixture::new();
    let missing = fixture.path().join("does-not-exist");

    let result = organize(&missing, &CategoryMapping::builtin(), &mut NoProgress);

    assert!(matches!(result, Err(OrganizeError::TargetNotFound { .. })));
    assert!(!missing.exists());
    assert_eq!(fixture.count_dirs(), 0);
}

#[test]
fn test_rerun_reuses_existing_category_directories() {
    let fixture = TestFixture::new();
    fixture.create_files(&["a.pdf", "b.png"]);

    let first = organize(fixture.path(), &CategoryMapping::builtin(), &mut NoProgress)
        .expect("First run should succeed");
    assert_eq!(first.moved(), 2);

    let second = organize(fixture.path(), &CategoryMapping::builtin(), &mut NoProgress)
        .expect("Second run should succeed");
    assert_eq!(second.total(), 0);
    assert_eq!(second.errored(), 0);

    fixture.create_files(&["c.pdf", "d.png"]);
    let third = organize(fixture.path(), &CategoryMapping::builtin(), &mut NoProgress)
        .expect("Third run should succeed");
    assert_eq!(third.moved(), 2);
    assert_eq!(third.errored(), 0);
    fixture.assert_file_exists("DOCUMENTS/a.pdf");
    fixture.assert_file_exists("DOCUMENTS/c.pdf");
    fixture.assert_file_exists("IMAGES/d.png");
}

// ============================================================================
// Test Suite 4: External Category Definitions
// ============================================================================

#[test]
fn test_custom_definition_drives_the_run() {
    let fixture = TestFixture::new();
    fixture.create_file(
        "defs/categories.json",
        r#"{"PHOTOS": [".jpg", ".CR2"], "PAPERS": ["pdf"]}"#,
    );
    fixture.create_files(&["raw.cr2", "paper.PDF", "song.mp3"]);

    let source = DefinitionSource::File(fixture.path().join("defs/categories.json"));
    let mapping = CategoryMapping::load(&source).expect("Definition should load");
    let report = organize(fixture.path(), &mapping, &mut NoProgress).expect("Run should succeed");

    assert_eq!(report.moved(), 3);
    fixture.assert_file_exists("PHOTOS/raw.cr2");
    fixture.assert_file_exists("PAPERS/paper.PDF");
    fixture.assert_file_exists("OTHERS/song.mp3");
    fixture.assert_file_exists("defs/categories.json");
}

#[test]
fn test_malformed_definition_falls_back_to_defaults() {
    let fixture = TestFixture::new();
    fixture.create_file("defs/categories.json", r#"{"PHOTOS": ".jpg"}"#);
    fixture.create_files(&["a.pdf", "b.png", "c.xyz"]);

    let source = DefinitionSource::File(fixture.path().join("defs/categories.json"));
    assert!(CategoryMapping::load(&source).is_err());

    let mapping = CategoryMapping::load_or_default(&source);
    let report = organize(fixture.path(), &mapping, &mut NoProgress).expect("Run should succeed");

    assert_eq!(report.moved(), 3);
    fixture.assert_file_exists("DOCUMENTS/a.pdf");
    fixture.assert_file_exists("IMAGES/b.png");
    fixture.assert_file_exists("OTHERS/c.xyz");
}

// ============================================================================
// Test Suite 5: Background Runs and the Command Line
// ============================================================================

#[test]
fn test_background_run_returns_report() {
    let fixture = TestFixture::new();
    fixture.create_files(&["a.pdf", "b.png", "c.xyz"]);

    let handle = spawn_run(fixture.path().to_path_buf(), CategoryMapping::builtin())
        .expect("Worker should start");
    let mut last = (0, 0);
    let report = handle
        .wait(|processed, total| last = (processed, total))
        .expect("Run should succeed");

    assert_eq!(last, (3, 3));
    assert_eq!(report.moved(), 3);
}

fn cli(args: &[&str]) -> Cli {
    Cli::parse_from(std::iter::once("springclean").chain(args.iter().copied()))
}

#[test]
fn test_cli_organize_remembers_folder() {
    let fixture = TestFixture::new();
    let settings_dir = TempDir::new().expect("Failed to create temp directory");
    let config = settings_dir.path().join("settings.toml");
    let config_arg = config.to_str().expect("UTF-8 path");
    let target = fixture.path().to_str().expect("UTF-8 path");
    fixture.create_files(&["a.pdf", "b.png"]);

    run(cli(&["--config", config_arg, "organize", target])).expect("Organize should succeed");

    fixture.assert_file_exists("DOCUMENTS/a.pdf");
    fixture.assert_file_exists("IMAGES/b.png");
    let settings = AppSettings::load(Some(&config)).expect("Settings should load");
    assert_eq!(settings.last_folder.as_deref(), Some(fixture.path()));

    // Without a path the remembered folder is organized again.
    fixture.create_files(&["c.mp4"]);
    run(cli(&["--config", config_arg, "organize"])).expect("Organize should succeed");
    fixture.assert_file_exists("VIDEOS/c.mp4");
}

#[test]
fn test_cli_remembers_relative_folder_as_absolute() {
    let first = TestFixture::new();
    let second = TestFixture::new();
    let settings_dir = TempDir::new().expect("Failed to create temp directory");
    let config = settings_dir.path().join("settings.toml");
    let config_arg = config.to_str().expect("UTF-8 path");
    first.create_file("defs/categories.json", r#"{"NOTES": [".md"]}"#);
    let definition = first.path().join("defs").join("categories.json");
    second.create_files(&["keep.pdf"]);

    let original_dir = std::env::current_dir().expect("Current directory should be readable");
    std::env::set_current_dir(first.path()).expect("Failed to enter first folder");
    let organized = run(cli(&["--config", config_arg, "organize", "."]));
    let configured = run(cli(&[
        "--config",
        config_arg,
        "settings",
        "categories",
        "defs/categories.json",
    ]));

    // A bare organize from another folder must go back to the first one.
    std::env::set_current_dir(second.path()).expect("Failed to enter second folder");
    first.create_files(&["c.mp4"]);
    let rerun = run(cli(&["--config", config_arg, "organize"]));
    std::env::set_current_dir(&original_dir).expect("Failed to restore current directory");

    organized.expect("Organize should succeed");
    configured.expect("Settings should be saved");
    rerun.expect("Organize should succeed");

    let settings = AppSettings::load(Some(&config)).expect("Settings should load");
    let last_folder = settings.last_folder.expect("Folder should be remembered");
    assert!(last_folder.is_absolute());
    assert_eq!(
        fs::canonicalize(&last_folder).unwrap(),
        fs::canonicalize(first.path()).unwrap()
    );
    let categories_file = settings.categories_file.expect("Categories should be set");
    assert!(categories_file.is_absolute());
    assert_eq!(
        fs::canonicalize(&categories_file).unwrap(),
        fs::canonicalize(&definition).unwrap()
    );

    first.assert_file_exists("OTHERS/c.mp4");
    second.assert_file_exists("keep.pdf");
    assert_eq!(second.count_dirs(), 0, "Unrelated folder should be untouched");
}

#[test]
fn test_cli_dry_run_with_json_changes_nothing() {
    let fixture = TestFixture::new();
    let settings_dir = TempDir::new().expect("Failed to create temp directory");
    let config = settings_dir.path().join("settings.toml");
    fixture.create_files(&["a.pdf"]);

    run(cli(&[
        "--config",
        config.to_str().unwrap(),
        "organize",
        fixture.path().to_str().unwrap(),
        "--dry-run",
        "--json",
    ]))
    .expect("Dry run should succeed");

    fixture.assert_file_exists("a.pdf");
    assert!(!config.exists());
}

#[test]
fn test_cli_organize_without_folder_fails() {
    let settings_dir = TempDir::new().expect("Failed to create temp directory");
    let config = settings_dir.path().join("settings.toml");

    let result = run(cli(&["--config", config.to_str().unwrap(), "organize"]));

    assert!(result.is_err());
}

#[test]
fn test_cli_dry_run_changes_nothing() {
    let fixture = TestFixture::new();
    let settings_dir = TempDir::new().expect("Failed to create temp directory");
    let config = settings_dir.path().join("settings.toml");
    fixture.create_files(&["a.pdf", "b.png"]);

    run(cli(&[
        "--config",
        config.to_str().unwrap(),
        "organize",
        fixture.path().to_str().unwrap(),
        "--dry-run",
    ]))
    .expect("Dry run should succeed");

    assert_eq!(fixture.count_files(), 2);
    assert_eq!(fixture.count_dirs(), 0);
    assert!(!config.exists(), "Dry run should not save settings");
}

#[test]
fn test_cli_missing_target_is_an_error() {
    let fixture = TestFixture::new();
    let config = fixture.path().join("settings.toml");
    let missing = fixture.path().join("nowhere");

    let result = run(cli(&[
        "--config",
        config.to_str().unwrap(),
        "organize",
        missing.to_str().unwrap(),
    ]));

    assert!(result.is_err());
    assert!(!config.exists(), "Failed run should not remember the folder");
}

#[test]
fn test_cli_settings_commands() {
    let settings_dir = TempDir::new().expect("Failed to create temp directory");
    let config = settings_dir.path().join("settings.toml");
    let config_arg = config.to_str().unwrap();
    let definition = settings_dir.path().join("categories.json");
    fs::write(&definition, r#"{"NOTES": [".md"]}"#).expect("Failed to write definition");

    run(cli(&["--config", config_arg, "settings", "theme", "dark"])).expect("theme");
    run(cli(&["--config", config_arg, "settings", "window", "800", "640"])).expect("window");
    run(cli(&[
        "--config",
        config_arg,
        "settings",
        "categories",
        definition.to_str().unwrap(),
    ]))
    .expect("categories");

    let settings = AppSettings::load(Some(&config)).expect("Settings should load");
    assert_eq!(settings.theme, Theme::Dark);
    assert_eq!((settings.window.width, settings.window.height), (800, 640));
    assert_eq!(settings.categories_file.as_deref(), Some(definition.as_path()));

    run(cli(&["--config", config_arg, "settings", "theme", "toggle"])).expect("toggle");
    run(cli(&["--config", config_arg, "settings", "categories", "--clear"])).expect("clear");

    let settings = AppSettings::load(Some(&config)).expect("Settings should load");
    assert_eq!(settings.theme, Theme::Light);
    assert!(settings.categories_file.is_none());
}

#[test]
fn test_cli_rejects_broken_category_file_in_settings() {
    let settings_dir = TempDir::new().expect("Failed to create temp directory");
    let config = settings_dir.path().join("settings.toml");
    let definition = settings_dir.path().join("categories.json");
    fs::write(&definition, "[1, 2, 3]").expect("Failed to write definition");

    let result = run(cli(&[
        "--config",
        config.to_str().unwrap(),
        "settings",
        "categories",
        definition.to_str().unwrap(),
    ]));

    assert!(result.is_err());
    assert!(!config.exists());
}

#[test]
fn test_cli_exports_categories() {
    let settings_dir = TempDir::new().expect("Failed to create temp directory");
    let config = settings_dir.path().join("settings.toml");
    let export = settings_dir.path().join("out").join("categories.json");

    run(cli(&[
        "--config",
        config.to_str().unwrap(),
        "categories",
        "--export",
        export.to_str().unwrap(),
    ]))
    .expect("Export should succeed");

    let loaded = CategoryMapping::load(&DefinitionSource::File(export)).expect("Export should load");
    assert_eq!(loaded, CategoryMapping::builtin());
}

#[test]
fn test_cli_legacy_entry_point() {
    let fixture = TestFixture::new();
    fixture.create_files(&["report.docx", "setup.msi"]);

    run(cli(&["legacy", fixture.path().to_str().unwrap()])).expect("Legacy run should succeed");

    fixture.assert_file_exists("DOCUMENTS/report.docx");
    fixture.assert_file_exists("APPS/setup.msi");
}
