//! Command-line interface for springclean.
//!
//! This module is the front end that owns the terminal:
//! - Argument parsing
//! - Settings resolution (remembered folder, external categories)
//! - Running the organize engine on a worker and drawing its progress
//! - Category and settings management commands

use crate::category::{CategoryMapping, DefinitionSource};
use crate::organizer::{OrganizeEngine, organize_downloads};
use crate::output::OutputFormatter;
use crate::settings::{AppSettings, Theme};
use crate::worker::spawn_run;
use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::io;
use std::path::{Path, PathBuf};

#[derive(Debug, Parser)]
#[command(
    name = "springclean",
    version,
    about = "Sort the files of a folder into category subfolders by extension."
)]
pub struct Cli {
    /// Settings file to use instead of the default lookup.
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase diagnostic output (-v info, -vv debug).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Move every file of a folder into a subfolder named after its category.
    Organize(OrganizeArgs),
    /// Show the active categories or export them to a JSON file.
    Categories(CategoriesArgs),
    /// Show or change persisted settings.
    #[command(subcommand)]
    Settings(SettingsCommand),
    /// Organize with built-in categories, printing one line per file.
    Legacy {
        /// Folder to organize.
        path: PathBuf,
    },
}

#[derive(Debug, Args)]
pub struct OrganizeArgs {
    /// Folder to organize. Defaults to the last organized folder.
    pub path: Option<PathBuf>,

    /// JSON category definition overriding the configured one.
    #[arg(long, value_name = "FILE")]
    pub categories: Option<PathBuf>,

    /// Show what would be moved without touching anything.
    #[arg(long)]
    pub dry_run: bool,

    /// Print the run report as JSON.
    #[arg(long)]
    pub json: bool,

    /// Do not remember this folder for next time.
    #[arg(long)]
    pub forget: bool,
}

#[derive(Debug, Args)]
pub struct CategoriesArgs {
    /// JSON category definition overriding the configured one.
    #[arg(long, value_name = "FILE")]
    pub categories: Option<PathBuf>,

    /// Write the active categories to this JSON file.
    #[arg(long, value_name = "FILE")]
    pub export: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
pub enum SettingsCommand {
    /// Print the current settings.
    Show,
    /// Set the colour theme.
    Theme {
        #[arg(value_enum)]
        choice: ThemeChoice,
    },
    /// Remember a window size.
    Window { width: u32, height: u32 },
    /// Use a JSON category definition by default.
    Categories {
        /// Definition file; omit with --clear.
        #[arg(required_unless_present = "clear")]
        file: Option<PathBuf>,
        /// Go back to the built-in categories.
        #[arg(long, conflicts_with = "file")]
        clear: bool,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ThemeChoice {
    System,
    Light,
    Dark,
    /// Switch between light and dark.
    Toggle,
}

/// Runs the parsed command line.
///
/// # Examples
///
/// ```no_run
/// use clap::Parser;
/// use springclean::cli::{Cli, run};
///
/// let cli = Cli::parse_from(["springclean", "organize", "/home/user/Downloads"]);
/// if let Err(e) = run(cli) {
///     eprintln!("Error: {e:#}");
/// }
/// ```
pub fn run(cli: Cli) -> Result<()> {
    let config = cli.config.as_deref();
    match cli.command {
        Command::Organize(args) => organize_command(config, args),
        Command::Categories(args) => categories_command(config, args),
        Command::Settings(command) => settings_command(config, command),
        Command::Legacy { path } => {
            let stdout = io::stdout();
            organize_downloads(&path, &mut stdout.lock())?;
            Ok(())
        }
    }
}

fn organize_command(config: Option<&Path>, args: OrganizeArgs) -> Result<()> {
    let mut settings = AppSettings::load(config).context("Error loading settings")?;

    let target = match args.path.or_else(|| settings.last_folder.clone()) {
        Some(path) => absolute(&path)?,
        None => bail!("No folder given and no previously organized folder to fall back to"),
    };
    let mapping = active_mapping(&settings, args.categories.as_deref());

    if args.dry_run {
        let planned = OrganizeEngine::new(&mapping).plan(&target)?;
        if args.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&planned).context("Error serializing plan")?
            );
        } else if planned.is_empty() {
            OutputFormatter::info("No files found to organize.");
        } else {
            OutputFormatter::plan(&planned);
            OutputFormatter::success("Dry run complete. No files were modified.");
        }
        return Ok(());
    }

    if !args.json {
        OutputFormatter::info(&format!("Organizing contents of: {}", target.display()));
    }

    let handle = spawn_run(target.clone(), mapping)?;
    let pb = OutputFormatter::create_progress_bar(0);
    if args.json {
        pb.set_draw_target(indicatif::ProgressDrawTarget::hidden());
    }
    let result = handle.wait(|processed, total| {
        pb.set_length(total as u64);
        pb.set_position(processed as u64);
    });
    pb.finish_and_clear();
    let report = result?;

    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&report).context("Error serializing report")?
        );
    } else if report.total() == 0 {
        OutputFormatter::info("No files found to organize.");
    } else {
        OutputFormatter::outcomes(&report);
        OutputFormatter::summary_table(&report);
        if report.errored() > 0 {
            OutputFormatter::warning("Some files could not be organized. See the errors above.");
        }
    }

    if !args.forget {
        settings.last_folder = Some(target);
        if let Err(e) = settings.save_to(config) {
            let message = format!("Could not remember folder: {e}");
            if args.json {
                OutputFormatter::warning_stderr(&message);
            } else {
                OutputFormatter::warning(&message);
            }
        }
    }

    Ok(())
}

fn categories_command(config: Option<&Path>, args: CategoriesArgs) -> Result<()> {
    let settings = AppSettings::load(config).context("Error loading settings")?;
    let mapping = active_mapping(&settings, args.categories.as_deref());

    match args.export {
        Some(path) => {
            mapping
                .save(&path)
                .with_context(|| format!("Error exporting categories to {}", path.display()))?;
            OutputFormatter::success(&format!("Categories written to {}", path.display()));
        }
        None => OutputFormatter::categories(&mapping),
    }
    Ok(())
}

fn settings_command(config: Option<&Path>, command: SettingsCommand) -> Result<()> {
    let mut settings = AppSettings::load(config).context("Error loading settings")?;

    match command {
        SettingsCommand::Show => {
            let path = AppSettings::locate(config);
            OutputFormatter::header("SETTINGS");
            if let Some(path) = path {
                OutputFormatter::plain(&format!("File:       {}", path.display()));
            }
            OutputFormatter::plain(&format!("Theme:      {}", settings.theme.as_str()));
            OutputFormatter::plain(&format!(
                "Window:     {}x{}",
                settings.window.width, settings.window.height
            ));
            OutputFormatter::plain(&format!(
                "Folder:     {}",
                display_optional(settings.last_folder.as_deref())
            ));
            OutputFormatter::plain(&format!(
                "Categories: {}",
                settings
                    .categories_file
                    .as_deref()
                    .map(|path| path.display().to_string())
                    .unwrap_or_else(|| "built-in".to_string())
            ));
            return Ok(());
        }
        SettingsCommand::Theme { choice } => {
            settings.theme = match choice {
                ThemeChoice::System => Theme::System,
                ThemeChoice::Light => Theme::Light,
                ThemeChoice::Dark => Theme::Dark,
                ThemeChoice::Toggle => settings.theme.toggled(),
            };
        }
        SettingsCommand::Window { width, height } => {
            if width == 0 || height == 0 {
                bail!("Window size must be at least 1x1");
            }
            settings.window.width = width;
            settings.window.height = height;
        }
        SettingsCommand::Categories { file, clear } => {
            if clear {
                settings.categories_file = None;
            } else if let Some(file) = file {
                // Reject a broken definition now rather than at the next run.
                CategoryMapping::load(&DefinitionSource::File(file.clone()))
                    .with_context(|| format!("Error loading categories from {}", file.display()))?;
                settings.categories_file = Some(absolute(&file)?);
            }
        }
    }

    let path = settings.save_to(config).context("Error saving settings")?;
    OutputFormatter::success(&format!("Settings saved to {}", path.display()));
    Ok(())
}

/// The mapping for a run: `override_file`, else the configured file, else built-in.
fn active_mapping(settings: &AppSettings, override_file: Option<&Path>) -> CategoryMapping {
    let file = override_file.or(settings.categories_file.as_deref());
    CategoryMapping::load_or_default(&DefinitionSource::from_optional_path(file))
}

/// Anchors a relative path at the current directory so it stays valid when saved.
fn absolute(path: &Path) -> Result<PathBuf> {
    std::path::absolute(path).with_context(|| format!("Invalid path: {}", path.display()))
}

fn display_optional(path: Option<&Path>) -> String {
    path.map(|path| path.display().to_string())
        .unwrap_or_else(|| "(none)".to_string())
}
