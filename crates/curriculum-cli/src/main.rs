//! `curriculum`: operator CLI for the curriculum store.
//!
//! Reads `curriculum.toml` (or the path given with `--config`) and
//! `CURRICULUM_*` environment variables, opens the SQLite store and prints
//! each command's result as JSON on stdout. Logs go to stderr.
//!
//! # Usage
//!
//! ```
//! curriculum sectors --course-year 1
//! curriculum check --course-year 1 edits.json
//! curriculum commit --course-year 1 edits.json --sever
//! curriculum assign --teacher 3 --course-year 1 10 11 14
//! ```

use std::{
  collections::BTreeSet,
  path::{Path, PathBuf},
  sync::Arc,
};

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use curriculum_cli::CliConfig;
use curriculum_core::{
  curriculum::{CourseYearId, SubjectId, TeacherId},
  session::CommitReport,
};
use curriculum_store_sqlite::SqliteStore;
use serde::Serialize;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

// ─── CLI args ─────────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "curriculum", author, version, about = "Curriculum planning CLI")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "curriculum.toml")]
  config: PathBuf,

  /// Use this database instead of the configured `store_path`.
  #[arg(long, value_name = "FILE")]
  store: Option<PathBuf>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand)]
enum Command {
  /// List a course year's sectors in curriculum order.
  Sectors {
    #[arg(long)]
    course_year: CourseYearId,
  },

  /// Report the prerequisite conflicts an edit file would introduce.
  Check {
    #[arg(long)]
    course_year: CourseYearId,
    /// JSON array of `{"subject_id": …, "sector_id": …}` moves.
    edits:       PathBuf,
  },

  /// Apply an edit file.
  Commit {
    #[arg(long)]
    course_year: CourseYearId,
    edits:       PathBuf,
    /// Clear conflicting prerequisite links instead of refusing.
    #[arg(long)]
    sever:       bool,
  },

  /// Set the subjects a teacher teaches in a course year.
  Assign {
    #[arg(long)]
    teacher:     TeacherId,
    #[arg(long)]
    course_year: CourseYearId,
    subjects:    Vec<SubjectId>,
  },
}

// ─── Entry point ──────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .with_writer(std::io::stderr)
    .init();

  let cli = Cli::parse();

  let settings = config::Config::builder()
    .add_source(config::File::from(cli.config).required(false))
    .add_source(config::Environment::with_prefix("CURRICULUM"))
    .build()
    .context("failed to read config file")?;
  let cfg: CliConfig = settings
    .try_deserialize()
    .context("failed to deserialise CliConfig")?;

  let store_path = expand_tilde(cli.store.as_deref().unwrap_or(&cfg.store_path));
  if let Some(parent) = store_path.parent()
    && !parent.as_os_str().is_empty()
  {
    std::fs::create_dir_all(parent)
      .with_context(|| format!("failed to create {parent:?}"))?;
  }
  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;
  tracing::debug!(?store_path, "store opened");

  match cli.command {
    Command::Sectors { course_year } => {
      print_json(&curriculum_cli::sectors(&store, course_year).await?)
    }
    Command::Check { course_year, edits } => {
      let json = read_edits(&edits)?;
      let conflicts = curriculum_cli::check(&store, course_year, &json).await?;
      print_json(&conflicts)?;
      if !conflicts.is_empty() {
        anyhow::bail!("{} prerequisite conflict(s)", conflicts.len());
      }
      Ok(())
    }
    Command::Commit { course_year, edits, sever } => {
      let json = read_edits(&edits)?;
      let report = curriculum_cli::commit(&store, course_year, &json, sever).await?;
      print_json(&report)?;
      match report {
        CommitReport::Blocked { conflicts } => anyhow::bail!(
          "commit blocked by {} prerequisite conflict(s); rerun with --sever",
          conflicts.len()
        ),
        CommitReport::Committed { failures, .. } if !failures.is_empty() => {
          anyhow::bail!("{} subject update(s) failed", failures.len())
        }
        CommitReport::Committed { .. } => Ok(()),
      }
    }
    Command::Assign { teacher, course_year, subjects } => {
      let subjects: BTreeSet<SubjectId> = subjects.into_iter().collect();
      let report =
        curriculum_cli::assign(Arc::new(store), teacher, course_year, &subjects)
          .await?;
      print_json(&report)?;
      if !report.is_success() {
        anyhow::bail!("{} assignment operation(s) failed", report.failures.len());
      }
      Ok(())
    }
  }
}

fn read_edits(path: &Path) -> anyhow::Result<String> {
  std::fs::read_to_string(path)
    .with_context(|| format!("reading edit file {}", path.display()))
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
  println!("{}", serde_json::to_string_pretty(value)?);
  Ok(())
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
