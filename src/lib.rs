//! springclean - sort a folder's files into category subfolders
//!
//! This library classifies files by extension into coarse categories (documents,
//! images, videos, ...), moves each regular file of a directory into a subdirectory
//! named after its category, and reports what happened. Category tables can be
//! loaded from JSON side files; application settings persist as TOML.

pub mod category;
pub mod cli;
pub mod organizer;
pub mod output;
pub mod settings;
pub mod worker;

pub use category::{CategoryMapping, DefinitionError, DefinitionSource, OTHERS};
pub use organizer::{
    MoveError, MoveOutcome, MoveStatus, NoProgress, OrganizeEngine, OrganizeError, ProgressSink,
    RunReport, RunState, organize, organize_downloads,
};
pub use settings::{AppSettings, SettingsError, Theme};
pub use worker::{RunEvent, RunHandle, WorkerError, spawn_run};

pub use cli::{Cli, run};
