/// Organize runs: moving the files of one directory into category subdirectories.
///
/// A run lists the immediate children of a target directory once, keeps the regular
/// files, and moves each into `target/<CATEGORY>/` where the category comes from a
/// [`CategoryMapping`]. Per-file failures are recorded and counted without stopping
/// the run; only a missing or unreadable target aborts it.
use crate::category::CategoryMapping;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Write};
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Errors that end a run before or while listing the target.
#[derive(Debug, Error)]
pub enum OrganizeError {
    /// The target does not exist or is not a directory. Nothing was touched.
    #[error("target directory not found: {}", .path.display())]
    TargetNotFound { path: PathBuf },
    /// The target exists but its entries could not be listed.
    #[error("failed to read directory {}: {source}", .path.display())]
    ReadDirectory {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// [`OrganizeEngine::run`] was called on an engine that already ran.
    #[error("this engine has already run; start a new run with a fresh engine")]
    AlreadyRun,
    /// Writing the line-oriented output of [`organize_downloads`] failed.
    #[error("failed to write output: {0}")]
    Output(#[source] io::Error),
}

/// Result type for organize runs.
pub type OrganizeResult<T> = Result<T, OrganizeError>;

/// Why a single file could not be moved. Recorded in the report; never aborts a run.
#[derive(Debug, Error)]
pub enum MoveError {
    /// Something with the same name is already in the category directory.
    #[error("destination already exists: {}", .0.display())]
    DestinationExists(PathBuf),
    /// The category directory could not be created.
    #[error("failed to create directory {}: {source}", .path.display())]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// The move itself failed (permissions, source vanished, ...).
    #[error("failed to move to {}: {source}", .destination.display())]
    Io {
        destination: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Lifecycle of one run. `Completed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    NotStarted,
    Counting,
    Processing,
    Completed,
}

/// Receives `(processed, total)` after every processed file.
///
/// Implemented for any `FnMut(usize, usize)`. A sink runs on the thread performing
/// the run; collaborators owning UI state must marshal updates themselves.
pub trait ProgressSink {
    fn progress(&mut self, processed: usize, total: usize);
}

impl<F> ProgressSink for F
where
    F: FnMut(usize, usize),
{
    fn progress(&mut self, processed: usize, total: usize) {
        self(processed, total)
    }
}

/// Sink that ignores progress.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn progress(&mut self, _processed: usize, _total: usize) {}
}

/// What happened to a single file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum MoveStatus {
    Moved { destination: PathBuf },
    Failed { error: String },
}

/// The recorded result for one regular file of the target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MoveOutcome {
    file_name: String,
    category: String,
    #[serde(flatten)]
    status: MoveStatus,
}

impl MoveOutcome {
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn status(&self) -> &MoveStatus {
        &self.status
    }

    pub fn is_moved(&self) -> bool {
        matches!(self.status, MoveStatus::Moved { .. })
    }

    /// Final location, when the move succeeded.
    pub fn destination(&self) -> Option<&Path> {
        match &self.status {
            MoveStatus::Moved { destination } => Some(destination),
            MoveStatus::Failed { .. } => None,
        }
    }

    /// Failure description, when the move failed.
    pub fn error(&self) -> Option<&str> {
        match &self.status {
            MoveStatus::Moved { .. } => None,
            MoveStatus::Failed { error } => Some(error),
        }
    }
}

/// Summary of a finished run.
///
/// `moved + errored == total` always holds, and `outcomes` lists every regular file
/// of the target exactly once, in the order the directory listing produced them.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    target: PathBuf,
    started_at: DateTime<Utc>,
    finished_at: DateTime<Utc>,
    total: usize,
    moved: usize,
    errored: usize,
    outcomes: Vec<MoveOutcome>,
}

impl RunReport {
    pub fn target(&self) -> &Path {
        &self.target
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn finished_at(&self) -> DateTime<Utc> {
        self.finished_at
    }

    /// Number of regular files found in the target.
    pub fn total(&self) -> usize {
        self.total
    }

    pub fn moved(&self) -> usize {
        self.moved
    }

    pub fn errored(&self) -> usize {
        self.errored
    }

    pub fn outcomes(&self) -> &[MoveOutcome] {
        &self.outcomes
    }

    /// Outcomes whose move failed.
    pub fn failures(&self) -> impl Iterator<Item = &MoveOutcome> {
        self.outcomes.iter().filter(|outcome| !outcome.is_moved())
    }

    /// Number of moved files per category.
    pub fn moved_by_category(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for outcome in self.outcomes.iter().filter(|outcome| outcome.is_moved()) {
            *counts.entry(outcome.category.clone()).or_insert(0) += 1;
        }
        counts
    }

    /// Looks up the outcome recorded for `file_name`.
    pub fn outcome_for(&self, file_name: &str) -> Option<&MoveOutcome> {
        self.outcomes
            .iter()
            .find(|outcome| outcome.file_name == file_name)
    }
}

/// Accumulates outcomes while a run is processing.
struct ReportBuilder {
    target: PathBuf,
    started_at: DateTime<Utc>,
    total: usize,
    moved: usize,
    errored: usize,
    outcomes: Vec<MoveOutcome>,
}

impl ReportBuilder {
    fn new(target: &Path, started_at: DateTime<Utc>, total: usize) -> Self {
        Self {
            target: target.to_path_buf(),
            started_at,
            total,
            moved: 0,
            errored: 0,
            outcomes: Vec::with_capacity(total),
        }
    }

    fn record(&mut self, outcome: MoveOutcome) {
        if outcome.is_moved() {
            self.moved += 1;
        } else {
            self.errored += 1;
        }
        self.outcomes.push(outcome);
    }

    fn finish(self) -> RunReport {
        RunReport {
            target: self.target,
            started_at: self.started_at,
            finished_at: Utc::now(),
            total: self.total,
            moved: self.moved,
            errored: self.errored,
            outcomes: self.outcomes,
        }
    }
}

/// A move that a run would perform, produced by [`OrganizeEngine::plan`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedMove {
    pub file_name: String,
    pub category: String,
    pub destination: PathBuf,
}

/// A regular file found directly under the target.
struct FileEntry {
    path: PathBuf,
    file_name: OsString,
}

/// Isolates the caller's sink: a panicking sink is silenced for the rest of the run
/// instead of unwinding through the move loop.
struct GuardedSink<'s> {
    inner: &'s mut dyn ProgressSink,
    faulted: bool,
}

impl<'s> GuardedSink<'s> {
    fn new(inner: &'s mut dyn ProgressSink) -> Self {
        Self {
            inner,
            faulted: false,
        }
    }

    fn notify(&mut self, processed: usize, total: usize) {
        if self.faulted {
            return;
        }
        let inner = &mut *self.inner;
        if panic::catch_unwind(AssertUnwindSafe(|| inner.progress(processed, total))).is_err() {
            warn!(processed, total, "progress sink panicked, suppressing further updates");
            self.faulted = true;
        }
    }
}

/// Performs one organize run with a borrowed [`CategoryMapping`].
///
/// An engine runs at most once; a failed or finished run is repeated by building a
/// new engine. Files already moved by an earlier run stay where they are.
///
/// # Examples
///
/// ```no_run
/// use springclean::category::CategoryMapping;
/// use springclean::organizer::OrganizeEngine;
/// use std::path::Path;
///
/// let mapping = CategoryMapping::builtin();
/// let mut engine = OrganizeEngine::new(&mapping);
/// let report = engine
///     .run(Path::new("/home/user/Downloads"), &mut |done: usize, total: usize| {
///         println!("{done}/{total}");
///     })
///     .expect("target should exist");
/// println!("moved {} of {}", report.moved(), report.total());
/// ```
pub struct OrganizeEngine<'m> {
    mapping: &'m CategoryMapping,
    state: RunState,
}

impl<'m> OrganizeEngine<'m> {
    pub fn new(mapping: &'m CategoryMapping) -> Self {
        Self {
            mapping,
            state: RunState::NotStarted,
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn mapping(&self) -> &CategoryMapping {
        self.mapping
    }

    /// Moves every regular file directly under `target` into its category directory.
    ///
    /// Regular files are counted before anything moves, so each call of `sink`
    /// carries the final total. The sink is not called when there is nothing to do.
    ///
    /// # Errors
    ///
    /// [`OrganizeError::TargetNotFound`] when `target` is not an existing directory,
    /// [`OrganizeError::ReadDirectory`] when it cannot be listed, and
    /// [`OrganizeError::AlreadyRun`] on a second call.
    pub fn run(
        &mut self,
        target: &Path,
        sink: &mut dyn ProgressSink,
    ) -> OrganizeResult<RunReport> {
        if self.state != RunState::NotStarted {
            return Err(OrganizeError::AlreadyRun);
        }
        let result = self.execute(target, sink);
        self.state = RunState::Completed;
        result
    }

    /// Lists what [`run`](Self::run) would do without touching the filesystem.
    pub fn plan(&self, target: &Path) -> OrganizeResult<Vec<PlannedMove>> {
        ensure_target(target)?;
        let planned = regular_files(target)?
            .into_iter()
            .map(|entry| {
                let file_name = entry.file_name.to_string_lossy().into_owned();
                let category = self.mapping.resolve(&file_name).to_string();
                let destination = target.join(&category).join(&entry.file_name);
                PlannedMove {
                    file_name,
                    category,
                    destination,
                }
            })
            .collect();
        Ok(planned)
    }

    fn execute(
        &mut self,
        target: &Path,
        sink: &mut dyn ProgressSink,
    ) -> OrganizeResult<RunReport> {
        ensure_target(target)?;
        let started_at = Utc::now();

        self.state = RunState::Counting;
        let files = regular_files(target)?;
        let total = files.len();
        debug!(dir = %target.display(), total, "counted regular files");

        self.state = RunState::Processing;
        let mut report = ReportBuilder::new(target, started_at, total);
        let mut sink = GuardedSink::new(sink);
        for (index, entry) in files.iter().enumerate() {
            report.record(self.organize_file(target, entry));
            sink.notify(index + 1, total);
        }

        let report = report.finish();
        info!(
            dir = %target.display(),
            total = report.total(),
            moved = report.moved(),
            errored = report.errored(),
            "organize run complete"
        );
        Ok(report)
    }

    fn organize_file(&self, target: &Path, entry: &FileEntry) -> MoveOutcome {
        let file_name = entry.file_name.to_string_lossy().into_owned();
        let category = self.mapping.resolve(&file_name).to_string();

        let status = match move_into_category(target, entry, &category) {
            Ok(destination) => {
                debug!(file = %file_name, %category, "moved");
                MoveStatus::Moved { destination }
            }
            Err(error) => {
                debug!(file = %file_name, %category, %error, "move failed");
                MoveStatus::Failed {
                    error: error.to_string(),
                }
            }
        };

        MoveOutcome {
            file_name,
            category,
            status,
        }
    }
}

/// Runs a fresh engine over `target`.
pub fn organize(
    target: &Path,
    mapping: &CategoryMapping,
    sink: &mut dyn ProgressSink,
) -> OrganizeResult<RunReport> {
    OrganizeEngine::new(mapping).run(target, sink)
}

/// Organizes `path` with the built-in categories, writing one line per file to `out`.
///
/// Kept for scripts written against the original single-function interface.
pub fn organize_downloads<W: Write>(path: &Path, out: &mut W) -> OrganizeResult<RunReport> {
    let mapping = CategoryMapping::builtin();
    let report = organize(path, &mapping, &mut NoProgress)?;

    for outcome in report.outcomes() {
        match outcome.status() {
            MoveStatus::Moved { .. } => writeln!(
                out,
                "Moved: {} → {}",
                outcome.file_name(),
                outcome.category()
            ),
            MoveStatus::Failed { error } => {
                writeln!(out, "Error moving {}: {}", outcome.file_name(), error)
            }
        }
        .map_err(OrganizeError::Output)?;
    }

    Ok(report)
}

fn ensure_target(target: &Path) -> OrganizeResult<()> {
    match fs::metadata(target) {
        Ok(metadata) if metadata.is_dir() => Ok(()),
        _ => Err(OrganizeError::TargetNotFound {
            path: target.to_path_buf(),
        }),
    }
}

/// Lists the regular files directly under `target`, in directory order.
///
/// Directories, symlinks, special files and entries that cannot be inspected are
/// left out.
fn regular_files(target: &Path) -> OrganizeResult<Vec<FileEntry>> {
    let entries = fs::read_dir(target).map_err(|source| OrganizeError::ReadDirectory {
        path: target.to_path_buf(),
        source,
    })?;

    let mut files = Vec::new();
    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(error) => {
                debug!(%error, "skipping unreadable directory entry");
                continue;
            }
        };
        if let Ok(file_type) = entry.file_type()
            && file_type.is_file()
        {
            files.push(FileEntry {
                path: entry.path(),
                file_name: entry.file_name(),
            });
        }
    }
    Ok(files)
}

/// Moves `entry` into `target/category/`, creating the directory when needed.
///
/// An existing category directory is reused as is, whatever it already holds.
fn move_into_category(
    target: &Path,
    entry: &FileEntry,
    category: &str,
) -> Result<PathBuf, MoveError> {
    let category_dir = target.join(category);
    fs::create_dir_all(&category_dir).map_err(|source| MoveError::CreateDirectory {
        path: category_dir.clone(),
        source,
    })?;

    let destination = category_dir.join(&entry.file_name);
    // rename replaces existing files on Unix
    if fs::symlink_metadata(&destination).is_ok() {
        return Err(MoveError::DestinationExists(destination));
    }

    match fs::rename(&entry.path, &destination) {
        Ok(()) => Ok(destination),
        Err(error) if error.kind() == io::ErrorKind::CrossesDevices => {
            copy_then_remove(&entry.path, &destination)
        }
        Err(source) => Err(MoveError::Io {
            destination,
            source,
        }),
    }
}

fn copy_then_remove(source: &Path, destination: &Path) -> Result<PathBuf, MoveError> {
    let to_move_error = |error: io::Error| MoveError::Io {
        destination: destination.to_path_buf(),
        source: error,
    };

    let mut reader = File::open(source).map_err(to_move_error)?;
    let permissions = reader.metadata().map_err(to_move_error)?.permissions();
    write_new_file(&mut reader, destination).map_err(to_move_error)?;
    if let Err(error) = fs::set_permissions(destination, permissions) {
        debug!(file = %destination.display(), %error, "could not carry permissions over");
    }
    if let Err(error) = fs::remove_file(source) {
        let _ = fs::remove_file(destination);
        return Err(to_move_error(error));
    }
    Ok(destination.to_path_buf())
}

/// Copies `reader` into a file created at `destination`, which must not exist yet.
///
/// A copy that fails part way removes the truncated file again.
fn write_new_file(reader: &mut impl Read, destination: &Path) -> io::Result<u64> {
    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(destination)?;
    let copied = io::copy(reader, &mut file).and_then(|bytes| file.sync_all().map(|()| bytes));
    if copied.is_err() {
        drop(file);
        let _ = fs::remove_file(destination);
    }
    copied
}
