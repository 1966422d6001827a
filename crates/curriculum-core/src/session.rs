//! Editing sessions: the glue between the pure planners and a
//! [`CurriculumStore`].
//!
//! [`AssignmentSession`] edits one teacher's teaching assignments, one course
//! year (partition) at a time. [`commit_subject_edits`] applies a batch of
//! subject moves after conflict detection.
//!
//! Plans are executed concurrently and never atomically. Every failure is
//! collected and reported together, and the affected partitions are re-read
//! from the store before the next edit pass.

use std::{
  collections::{BTreeMap, BTreeSet},
  sync::Arc,
};

use futures::future::join_all;
use serde::Serialize;

use crate::{
  Error, Result,
  conflict::{Catalog, CommitOutcome, Conflict, Resolution, prepare_commit},
  curriculum::{
    AssignmentId, CourseYearId, SubjectId, SubjectUpdate, TeacherId,
    TeachingAssignment,
  },
  edit::{EditBatch, SubjectEditRequest},
  reconcile::{PartitionState, ReconcilePlan, reconcile},
  store::CurriculumStore,
};

// ─── Failure reporting ───────────────────────────────────────────────────────

/// The storage call that failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FailedOperation {
  CreateAssignment { subject_id: SubjectId },
  DeleteAssignment { assignment_id: AssignmentId },
  UpdateSubject { subject_id: SubjectId },
  /// Re-reading the course year after a save.
  Refresh,
}

#[derive(Debug, Clone, Serialize)]
pub struct OperationFailure {
  pub course_year_id: CourseYearId,
  pub operation:      FailedOperation,
  pub message:        String,
}

// ─── Assignment session ──────────────────────────────────────────────────────

/// Last state read from the store for one course year.
#[derive(Debug, Clone, Default)]
struct Snapshot {
  persisted:  BTreeMap<SubjectId, AssignmentId>,
  candidates: BTreeSet<SubjectId>,
}

/// Outcome of [`AssignmentSession::save`].
#[derive(Debug, Clone, Default, Serialize)]
pub struct SaveReport {
  pub created:  Vec<TeachingAssignment>,
  pub deleted:  Vec<AssignmentId>,
  pub failures: Vec<OperationFailure>,
}

impl SaveReport {
  pub fn is_success(&self) -> bool { self.failures.is_empty() }

  /// Course years with at least one failed operation.
  pub fn failed_partitions(&self) -> BTreeSet<CourseYearId> {
    self.failures.iter().map(|f| f.course_year_id).collect()
  }
}

/// One teacher's "who teaches what" editor.
///
/// Holds, per course year, the last persisted snapshot and the desired set
/// the user is editing. Nothing is shared with other sessions.
pub struct AssignmentSession<S> {
  store:      Arc<S>,
  teacher_id: TeacherId,
  snapshots:  BTreeMap<CourseYearId, Snapshot>,
  desired:    BTreeMap<CourseYearId, BTreeSet<SubjectId>>,
  touched:    BTreeSet<CourseYearId>,
}

impl<S: CurriculumStore> AssignmentSession<S> {
  pub fn new(store: Arc<S>, teacher_id: TeacherId) -> Self {
    Self {
      store,
      teacher_id,
      snapshots: BTreeMap::new(),
      desired: BTreeMap::new(),
      touched: BTreeSet::new(),
    }
  }

  pub fn teacher_id(&self) -> TeacherId { self.teacher_id }

  /// Make a course year editable.
  ///
  /// Storage is only read when no snapshot is cached. The desired set is
  /// seeded from the persisted assignments only when the user has no edits
  /// in progress for that course year; existing edits are kept as they are.
  pub async fn open(&mut self, course_year_id: CourseYearId) -> Result<()> {
    if !self.snapshots.contains_key(&course_year_id) {
      self.refresh(course_year_id).await?;
    }
    if !self.desired.contains_key(&course_year_id)
      && let Some(snapshot) = self.snapshots.get(&course_year_id)
    {
      self
        .desired
        .insert(course_year_id, snapshot.persisted.keys().copied().collect());
    }
    Ok(())
  }

  /// Drop the cached snapshot so the next [`open`](Self::open) re-reads
  /// storage. Edits in progress are kept.
  pub fn invalidate(&mut self, course_year_id: CourseYearId) {
    self.snapshots.remove(&course_year_id);
  }

  /// Throw away edits in progress for a course year.
  pub fn discard(&mut self, course_year_id: CourseYearId) {
    self.touched.remove(&course_year_id);
    if let Some(snapshot) = self.snapshots.get(&course_year_id) {
      self
        .desired
        .insert(course_year_id, snapshot.persisted.keys().copied().collect());
    } else {
      self.desired.remove(&course_year_id);
    }
  }

  /// Check or uncheck a subject in an opened course year.
  pub fn set_checked(
    &mut self,
    course_year_id: CourseYearId,
    subject_id: SubjectId,
    checked: bool,
  ) -> Result<()> {
    let snapshot = self
      .snapshots
      .get(&course_year_id)
      .ok_or(Error::PartitionNotOpen(course_year_id))?;
    if !snapshot.candidates.contains(&subject_id)
      && !snapshot.persisted.contains_key(&subject_id)
    {
      return Err(Error::SubjectNotInPartition { subject_id, course_year_id });
    }

    let desired = self.desired.entry(course_year_id).or_default();
    let changed = if checked {
      desired.insert(subject_id)
    } else {
      desired.remove(&subject_id)
    };
    if changed {
      self.touched.insert(course_year_id);
    }
    Ok(())
  }

  /// The subjects currently checked for a course year.
  pub fn desired(&self, course_year_id: CourseYearId) -> Option<&BTreeSet<SubjectId>> {
    self.desired.get(&course_year_id)
  }

  /// Subjects the teacher can be assigned in a course year.
  pub fn candidates(
    &self,
    course_year_id: CourseYearId,
  ) -> Option<&BTreeSet<SubjectId>> {
    self.snapshots.get(&course_year_id).map(|s| &s.candidates)
  }

  /// The last persisted assignments read for a course year.
  pub fn persisted(
    &self,
    course_year_id: CourseYearId,
  ) -> Option<&BTreeMap<SubjectId, AssignmentId>> {
    self.snapshots.get(&course_year_id).map(|s| &s.persisted)
  }

  /// Whether any course year has edits not yet saved.
  pub fn is_dirty(&self) -> bool { !self.touched.is_empty() }

  /// The operations [`save`](Self::save) would issue right now.
  pub fn plan(&self) -> ReconcilePlan<CourseYearId, SubjectId, AssignmentId> {
    let partitions: BTreeMap<_, _> = self
      .touched
      .iter()
      .filter_map(|&key| {
        let snapshot = self.snapshots.get(&key)?;
        let desired = self.desired.get(&key)?;
        Some((key, PartitionState {
          desired:   desired.clone(),
          persisted: snapshot.persisted.clone(),
        }))
      })
      .collect();
    reconcile(&partitions)
  }

  /// Reconcile every touched course year, execute the plan, and re-read the
  /// touched course years from storage.
  ///
  /// Course years that saved cleanly have their desired set reset to what
  /// storage now holds. Course years with a failed operation keep the
  /// user's desired set against the refreshed snapshot, so saving again only
  /// plans what is still missing. A course year that cannot be re-read is
  /// reported as a [`FailedOperation::Refresh`] failure and stays dirty with
  /// no snapshot; [`open`](Self::open) it again before editing.
  pub async fn save(&mut self) -> Result<SaveReport> {
    let plan = self.plan();
    let touched = std::mem::take(&mut self.touched);
    tracing::debug!(
      teacher_id = self.teacher_id,
      creates = plan.creates.len(),
      deletes = plan.deletes.len(),
      "saving teaching assignments"
    );

    let store = &*self.store;
    let teacher_id = self.teacher_id;
    let creates = join_all(plan.creates.iter().map(|c| async move {
      (c, store.create_assignment(c.target, teacher_id).await)
    }));
    let deletes = join_all(plan.deletes.iter().map(|d| async move {
      (d, store.delete_assignment(d.assignment).await)
    }));
    let (created, deleted) = futures::join!(creates, deletes);

    let mut report = SaveReport::default();
    for (op, result) in created {
      match result {
        Ok(assignment) => report.created.push(assignment),
        Err(e) => report.failures.push(OperationFailure {
          course_year_id: op.partition,
          operation:      FailedOperation::CreateAssignment {
            subject_id: op.target,
          },
          message:        e.to_string(),
        }),
      }
    }
    for (op, result) in deleted {
      match result {
        Ok(()) => report.deleted.push(op.assignment),
        Err(e) => report.failures.push(OperationFailure {
          course_year_id: op.partition,
          operation:      FailedOperation::DeleteAssignment {
            assignment_id: op.assignment,
          },
          message:        e.to_string(),
        }),
      }
    }

    for failure in &report.failures {
      tracing::warn!(
        course_year_id = failure.course_year_id,
        operation = ?failure.operation,
        "assignment operation failed: {}",
        failure.message
      );
    }

    // Nothing cached for these course years can be trusted any more. They
    // stay dirty until a refresh succeeds.
    for &key in &touched {
      self.snapshots.remove(&key);
      self.touched.insert(key);
    }

    let failed = report.failed_partitions();
    for &key in &touched {
      if let Err(e) = self.refresh(key).await {
        tracing::warn!(course_year_id = key, "re-reading course year failed: {e}");
        report.failures.push(OperationFailure {
          course_year_id: key,
          operation:      FailedOperation::Refresh,
          message:        e.to_string(),
        });
        continue;
      }
      if failed.contains(&key) {
        continue;
      }
      self.touched.remove(&key);
      if let Some(snapshot) = self.snapshots.get(&key) {
        self
          .desired
          .insert(key, snapshot.persisted.keys().copied().collect());
      }
    }

    tracing::info!(
      teacher_id = self.teacher_id,
      created = report.created.len(),
      deleted = report.deleted.len(),
      failed = report.failures.len(),
      "teaching assignments saved"
    );
    Ok(report)
  }

  async fn refresh(&mut self, course_year_id: CourseYearId) -> Result<()> {
    let assignments = self
      .store
      .list_assignments(self.teacher_id, course_year_id)
      .await
      .map_err(Error::store)?;
    let subjects = self
      .store
      .list_subjects(course_year_id)
      .await
      .map_err(Error::store)?;

    tracing::debug!(
      course_year_id,
      assignments = assignments.len(),
      candidates = subjects.len(),
      "loaded course year"
    );

    self.snapshots.insert(course_year_id, Snapshot {
      persisted:  assignments
        .into_iter()
        .map(|a| (a.subject_id, a.assignment_id))
        .collect(),
      candidates: subjects.into_iter().map(|s| s.subject_id).collect(),
    });
    Ok(())
  }
}

// ─── Subject edits ───────────────────────────────────────────────────────────

/// Outcome of [`commit_subject_edits`].
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CommitReport {
  /// Nothing was written.
  Blocked { conflicts: Vec<Conflict> },
  Committed {
    updated:      Vec<SubjectId>,
    severed:      Vec<SubjectId>,
    self_cleared: Vec<SubjectId>,
    /// Moves not attempted because a link could not be severed.
    skipped:      Vec<SubjectId>,
    failures:     Vec<OperationFailure>,
  },
}

/// Move subjects of one course year between sectors.
///
/// Loads the course year's sectors and subjects, validates the requests, and
/// runs conflict detection. A conflicting batch is either refused as a whole
/// or, with [`Resolution::SeverLinks`], committed with the conflicting
/// prerequisite links cleared.
///
/// Severing happens first and on its own: every conflicting dependent loses
/// its link before any subject moves. If one of those writes fails, no move
/// is attempted and the moves are reported as `skipped`.
pub async fn commit_subject_edits<S: CurriculumStore>(
  store: &S,
  course_year_id: CourseYearId,
  requests: Vec<SubjectEditRequest>,
  resolution: Resolution,
) -> Result<CommitReport> {
  let sectors = store
    .list_sectors(course_year_id)
    .await
    .map_err(Error::store)?;
  let catalog = Catalog::new(
    store
      .list_subjects(course_year_id)
      .await
      .map_err(Error::store)?,
  );
  let batch = EditBatch::resolve(requests, &catalog, &sectors)?;

  let plan = match prepare_commit(&batch, &catalog, resolution) {
    CommitOutcome::Blocked(conflicts) => {
      tracing::info!(
        course_year_id,
        conflicts = conflicts.len(),
        "subject edits blocked by prerequisite conflicts"
      );
      return Ok(CommitReport::Blocked { conflicts });
    }
    CommitOutcome::Ready(plan) => plan,
  };

  // Severing keeps the dependent where it is stored.
  let cuts: Vec<SubjectUpdate> = plan
    .severed
    .iter()
    .filter_map(|&subject_id| {
      let subject = catalog.get(subject_id)?;
      Some(SubjectUpdate {
        subject_id,
        placement: subject.placement,
        prerequisite_id: None,
      })
    })
    .collect();
  let moves: Vec<SubjectUpdate> = plan
    .updates
    .iter()
    .filter(|update| !cuts.contains(update))
    .cloned()
    .collect();

  let (cut, mut failures) = apply_updates(store, course_year_id, &cuts).await;
  let mut updated: BTreeSet<SubjectId> = cut.into_iter().collect();
  let mut skipped = Vec::new();

  if failures.is_empty() {
    let (moved, move_failures) =
      apply_updates(store, course_year_id, &moves).await;
    updated.extend(moved);
    failures.extend(move_failures);
  } else {
    skipped = moves.iter().map(|update| update.subject_id).collect();
    tracing::warn!(
      course_year_id,
      skipped = skipped.len(),
      "prerequisite links not severed; subject moves skipped"
    );
  }

  tracing::info!(
    course_year_id,
    updated = updated.len(),
    severed = plan.severed.len(),
    skipped = skipped.len(),
    failed = failures.len(),
    "subject edits committed"
  );
  Ok(CommitReport::Committed {
    updated: updated.into_iter().collect(),
    severed: plan.severed,
    self_cleared: plan.self_cleared,
    skipped,
    failures,
  })
}

/// Run `updates` concurrently; returns the ids written and the failures.
async fn apply_updates<S: CurriculumStore>(
  store: &S,
  course_year_id: CourseYearId,
  updates: &[SubjectUpdate],
) -> (Vec<SubjectId>, Vec<OperationFailure>) {
  let results = join_all(updates.iter().map(|update| async move {
    (update.subject_id, store.update_subject(update.clone()).await)
  }))
  .await;

  let mut updated = Vec::new();
  let mut failures = Vec::new();
  for (subject_id, result) in results {
    match result {
      Ok(_) => updated.push(subject_id),
      Err(e) => {
        tracing::warn!(subject_id, "subject update failed: {e}");
        failures.push(OperationFailure {
          course_year_id,
          operation: FailedOperation::UpdateSubject { subject_id },
          message: e.to_string(),
        });
      }
    }
  }
  (updated, failures)
}
