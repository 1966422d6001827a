//! Command implementations behind the `curriculum` binary.
//!
//! Every command is generic over [`CurriculumStore`] and returns a
//! serialisable value; `main.rs` only parses arguments, opens the store and
//! prints the result as JSON.

use std::{collections::BTreeSet, path::PathBuf, sync::Arc};

use anyhow::Context as _;
use serde::Deserialize;

use curriculum_core::{
  conflict::{Catalog, Conflict, Resolution, detect_conflicts},
  curriculum::{CourseYearId, Sector, SubjectId, TeacherId},
  edit::{EditBatch, SubjectEditRequest},
  session::{AssignmentSession, CommitReport, SaveReport, commit_subject_edits},
  store::CurriculumStore,
};

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime configuration, deserialised from `curriculum.toml` and
/// `CURRICULUM_*` environment variables.
#[derive(Debug, Deserialize, Clone)]
pub struct CliConfig {
  #[serde(default = "default_store_path")]
  pub store_path: PathBuf,
}

fn default_store_path() -> PathBuf {
  PathBuf::from("~/.local/share/curriculum/curriculum.db")
}

// ─── Commands ─────────────────────────────────────────────────────────────────

/// A course year's sectors in curriculum order.
pub async fn sectors<S: CurriculumStore>(
  store: &S,
  course_year_id: CourseYearId,
) -> anyhow::Result<Vec<Sector>> {
  store
    .list_sectors(course_year_id)
    .await
    .with_context(|| format!("failed to list sectors of course year {course_year_id}"))
}

/// Conflicts an edit file would introduce. Writes nothing.
pub async fn check<S: CurriculumStore>(
  store: &S,
  course_year_id: CourseYearId,
  edits_json: &str,
) -> anyhow::Result<Vec<Conflict>> {
  let sectors = sectors(store, course_year_id).await?;
  let catalog = Catalog::new(
    store
      .list_subjects(course_year_id)
      .await
      .context("failed to load subjects")?,
  );
  let batch = EditBatch::from_json(edits_json, &catalog, &sectors)
    .context("invalid edit file")?;

  let conflicts = detect_conflicts(&batch, &catalog);
  tracing::debug!(
    course_year_id,
    edits = batch.len(),
    conflicts = conflicts.len(),
    "checked subject edits"
  );
  Ok(conflicts)
}

/// Apply an edit file. Conflicts block the commit unless `sever` is set.
pub async fn commit<S: CurriculumStore>(
  store: &S,
  course_year_id: CourseYearId,
  edits_json: &str,
  sever: bool,
) -> anyhow::Result<CommitReport> {
  let requests: Vec<SubjectEditRequest> =
    serde_json::from_str(edits_json).context("invalid edit file")?;
  let resolution = if sever {
    Resolution::SeverLinks
  } else {
    Resolution::Block
  };

  commit_subject_edits(store, course_year_id, requests, resolution)
    .await
    .context("failed to commit subject edits")
}

/// Make `subjects` exactly the set of subjects `teacher_id` teaches in a
/// course year.
pub async fn assign<S: CurriculumStore>(
  store: Arc<S>,
  teacher_id: TeacherId,
  course_year_id: CourseYearId,
  subjects: &BTreeSet<SubjectId>,
) -> anyhow::Result<SaveReport> {
  let mut session = AssignmentSession::new(store, teacher_id);
  session
    .open(course_year_id)
    .await
    .with_context(|| format!("failed to open course year {course_year_id}"))?;

  for &subject_id in subjects {
    session.set_checked(course_year_id, subject_id, true)?;
  }
  let unwanted: Vec<SubjectId> = session
    .persisted(course_year_id)
    .into_iter()
    .flat_map(|persisted| persisted.keys().copied())
    .filter(|id| !subjects.contains(id))
    .collect();
  for subject_id in unwanted {
    session.set_checked(course_year_id, subject_id, false)?;
  }

  session.save().await.context("failed to save assignments")
}
