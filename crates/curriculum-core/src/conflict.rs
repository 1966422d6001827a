//! Prerequisite conflict detection for subject edit batches.
//!
//! A prerequisite must be taught strictly before every subject that depends
//! on it. Moving subjects between sectors can break that; this module finds
//! every broken link a batch would introduce and, once the caller has chosen
//! how to resolve them, turns the batch into the concrete subject updates to
//! commit.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::{
  curriculum::{Subject, SubjectId, SubjectUpdate},
  edit::EditBatch,
  ordering::order_of,
};

// ─── Catalog ─────────────────────────────────────────────────────────────────

/// A snapshot of the known subjects with the inverse prerequisite edge
/// (who depends on whom) precomputed.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
  subjects:   BTreeMap<SubjectId, Subject>,
  dependents: BTreeMap<SubjectId, BTreeSet<SubjectId>>,
}

impl Catalog {
  pub fn new(subjects: impl IntoIterator<Item = Subject>) -> Self {
    let mut catalog = Self::default();
    for subject in subjects {
      if let Some(prereq) = subject.prerequisite_id {
        catalog
          .dependents
          .entry(prereq)
          .or_default()
          .insert(subject.subject_id);
      }
      catalog.subjects.insert(subject.subject_id, subject);
    }
    catalog
  }

  pub fn get(&self, id: SubjectId) -> Option<&Subject> { self.subjects.get(&id) }

  /// Subjects listing `id` as their prerequisite, in ascending id order.
  pub fn dependents_of(
    &self,
    id: SubjectId,
  ) -> impl Iterator<Item = SubjectId> + '_ {
    self.dependents.get(&id).into_iter().flatten().copied()
  }

  pub fn subjects(&self) -> impl Iterator<Item = &Subject> {
    self.subjects.values()
  }

  pub fn len(&self) -> usize { self.subjects.len() }

  pub fn is_empty(&self) -> bool { self.subjects.is_empty() }
}

// ─── Detection ───────────────────────────────────────────────────────────────

/// A prerequisite link that would no longer point strictly backwards in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conflict {
  pub prerequisite_id: SubjectId,
  pub dependent_id:    SubjectId,
}

/// Every conflict the batch would introduce, in batch order and then by
/// dependent id. Never mutates anything; the same input always yields the
/// same list.
///
/// For each edited subject `A` and each dependent `B` of `A`, `B`'s effective
/// slot is its proposed slot when `B` is also in the batch, its persisted
/// slot otherwise. The link conflicts unless `A` orders strictly before `B`.
/// An elective prerequisite therefore always conflicts.
pub fn detect_conflicts(batch: &EditBatch, catalog: &Catalog) -> Vec<Conflict> {
  let mut conflicts = Vec::new();

  for edit in batch.edits() {
    let prerequisite_key = order_of(edit.placement.slot().as_ref());

    for dependent_id in catalog.dependents_of(edit.subject_id) {
      let Some(dependent_slot) = batch.effective_slot(dependent_id, catalog)
      else {
        continue;
      };
      if prerequisite_key >= order_of(dependent_slot.as_ref()) {
        conflicts.push(Conflict {
          prerequisite_id: edit.subject_id,
          dependent_id,
        });
      }
    }
  }

  conflicts
}

// ─── Commit planning ─────────────────────────────────────────────────────────

/// How the caller wants conflicts handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
  /// Refuse to commit while any conflict exists.
  #[default]
  Block,
  /// The user confirmed: clear the prerequisite of every conflicting
  /// dependent and commit.
  SeverLinks,
}

/// The updates that carry a batch into storage.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CommitPlan {
  /// One update per touched subject, ascending by id. Edits that change
  /// nothing are dropped.
  pub updates:      Vec<SubjectUpdate>,
  /// The conflicts that were resolved by severing.
  pub conflicts:    Vec<Conflict>,
  /// Dependents whose prerequisite link is cleared to resolve `conflicts`.
  pub severed:      Vec<SubjectId>,
  /// Edited subjects whose own prerequisite would have ended up at or after
  /// their new slot; their link is cleared without asking.
  pub self_cleared: Vec<SubjectId>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", content = "detail", rename_all = "snake_case")]
pub enum CommitOutcome {
  /// Nothing may be written; show all of these to the user at once.
  Blocked(Vec<Conflict>),
  Ready(CommitPlan),
}

/// Detect conflicts and, unless they block the batch, build the updates.
pub fn prepare_commit(
  batch: &EditBatch,
  catalog: &Catalog,
  resolution: Resolution,
) -> CommitOutcome {
  let conflicts = detect_conflicts(batch, catalog);
  if !conflicts.is_empty() && resolution == Resolution::Block {
    return CommitOutcome::Blocked(conflicts);
  }

  let severed: BTreeSet<SubjectId> =
    conflicts.iter().map(|c| c.dependent_id).collect();
  let mut self_cleared = Vec::new();
  let mut updates: BTreeMap<SubjectId, SubjectUpdate> = BTreeMap::new();

  for edit in batch.edits() {
    let Some(subject) = catalog.get(edit.subject_id) else {
      continue;
    };
    let own_key = order_of(edit.placement.slot().as_ref());

    let prerequisite_id = match subject.prerequisite_id {
      _ if severed.contains(&subject.subject_id) => None,
      Some(prereq) => {
        let still_valid = batch
          .effective_slot(prereq, catalog)
          .is_none_or(|slot| order_of(slot.as_ref()) < own_key);
        if still_valid {
          Some(prereq)
        } else {
          self_cleared.push(subject.subject_id);
          None
        }
      }
      None => None,
    };

    updates.insert(subject.subject_id, SubjectUpdate {
      subject_id: subject.subject_id,
      placement: edit.placement,
      prerequisite_id,
    });
  }

  for &dependent_id in &severed {
    if updates.contains_key(&dependent_id) {
      continue;
    }
    if let Some(subject) = catalog.get(dependent_id) {
      updates.insert(dependent_id, SubjectUpdate {
        subject_id:      dependent_id,
        placement:       subject.placement,
        prerequisite_id: None,
      });
    }
  }

  let updates = updates
    .into_values()
    .filter(|u| {
      catalog.get(u.subject_id).is_none_or(|s| {
        s.placement != u.placement || s.prerequisite_id != u.prerequisite_id
      })
    })
    .collect();

  CommitOutcome::Ready(CommitPlan {
    updates,
    conflicts,
    severed: severed.into_iter().collect(),
    self_cleared,
  })
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{
    curriculum::{Placement, Sector, SectorId, TimeSlot},
    edit::SubjectEdit,
  };

  const COURSE_YEAR: i64 = 1;

  fn sector(sector_id: SectorId, year: i64, semester: i64) -> Sector {
    Sector {
      sector_id,
      course_year_id: COURSE_YEAR,
      slot: TimeSlot::new(year, semester).unwrap(),
    }
  }

  fn required(sector: Sector) -> Placement { Placement::Required { sector } }

  fn subject(
    subject_id: SubjectId,
    placement: Placement,
    prerequisite_id: Option<SubjectId>,
  ) -> Subject {
    Subject {
      subject_id,
      code: None,
      name: format!("S{subject_id}"),
      credits: 3,
      language: "en".into(),
      placement,
      prerequisite_id,
    }
  }

  fn batch(catalog: &Catalog, edits: &[(SubjectId, Placement)]) -> EditBatch {
    EditBatch::new(
      edits
        .iter()
        .map(|&(subject_id, placement)| SubjectEdit { subject_id, placement }),
      catalog,
    )
    .unwrap()
  }

  const A: SubjectId = 1;
  const B: SubjectId = 2;

  /// A at (1,1) is the prerequisite of B at (1,2).
  fn pair() -> (Catalog, Sector, Sector, Sector) {
    let y1s1 = sector(11, 1, 1);
    let y1s2 = sector(12, 1, 2);
    let y2s1 = sector(21, 2, 1);
    let catalog = Catalog::new(vec![
      subject(A, required(y1s1), None),
      subject(B, required(y1s2), Some(A)),
    ]);
    (catalog, y1s1, y1s2, y2s1)
  }

  #[test]
  fn catalog_indexes_dependents() {
    let (catalog, ..) = pair();
    assert_eq!(catalog.dependents_of(A).collect::<Vec<_>>(), vec![B]);
    assert_eq!(catalog.dependents_of(B).count(), 0);
    assert_eq!(catalog.len(), 2);
  }

  #[test]
  fn moving_dependent_onto_prerequisite_slot_conflicts() {
    let (catalog, y1s1, ..) = pair();
    let a_unchanged = catalog.get(A).unwrap().placement;
    let edits = batch(&catalog, &[(A, a_unchanged), (B, required(y1s1))]);
    assert_eq!(detect_conflicts(&edits, &catalog), vec![Conflict {
      prerequisite_id: A,
      dependent_id:    B,
    }]);
  }

  #[test]
  fn moving_prerequisite_after_dependent_conflicts() {
    let (catalog, _, _, y2s1) = pair();
    let edits = batch(&catalog, &[(A, required(y2s1))]);
    assert_eq!(detect_conflicts(&edits, &catalog), vec![Conflict {
      prerequisite_id: A,
      dependent_id:    B,
    }]);
  }

  #[test]
  fn unchanged_batch_has_no_conflicts_and_is_idempotent() {
    let (catalog, y1s1, y1s2, _) = pair();
    let edits = batch(&catalog, &[(A, required(y1s1)), (B, required(y1s2))]);
    assert!(detect_conflicts(&edits, &catalog).is_empty());

    let moved = batch(&catalog, &[(A, required(y1s2))]);
    let first = detect_conflicts(&moved, &catalog);
    let second = detect_conflicts(&moved, &catalog);
    assert_eq!(first, second);
    assert_eq!(first.len(), 1);
  }

  #[test]
  fn subject_without_dependents_never_conflicts() {
    let (catalog, _, _, y2s1) = pair();
    let edits = batch(&catalog, &[(B, required(y2s1))]);
    assert!(detect_conflicts(&edits, &catalog).is_empty());
  }

  #[test]
  fn elective_dependent_never_conflicts() {
    let (catalog, _, _, y2s1) = pair();
    let elective = Placement::Elective { course_year_id: COURSE_YEAR };
    let edits = batch(&catalog, &[(A, required(y2s1)), (B, elective)]);
    assert!(detect_conflicts(&edits, &catalog).is_empty());
  }

  #[test]
  fn elective_prerequisite_always_conflicts() {
    let (catalog, ..) = pair();
    let elective = Placement::Elective { course_year_id: COURSE_YEAR };
    let edits = batch(&catalog, &[(A, elective)]);
    assert_eq!(detect_conflicts(&edits, &catalog).len(), 1);

    let edits = batch(&catalog, &[(A, elective), (B, elective)]);
    assert_eq!(detect_conflicts(&edits, &catalog).len(), 1);
  }

  #[test]
  fn reports_every_dependent_at_once() {
    let early = sector(11, 1, 1);
    let mid = sector(12, 1, 2);
    let late = sector(21, 2, 1);
    let catalog = Catalog::new(vec![
      subject(1, required(early), None),
      subject(2, required(mid), Some(1)),
      subject(3, required(mid), Some(1)),
      subject(4, required(late), Some(1)),
    ]);
    let edits = batch(&catalog, &[(1, required(late))]);
    let conflicts = detect_conflicts(&edits, &catalog);
    let dependents: Vec<_> = conflicts.iter().map(|c| c.dependent_id).collect();
    assert_eq!(dependents, vec![2, 3, 4]);
  }

  #[test]
  fn block_resolution_refuses_conflicting_batch() {
    let (catalog, _, _, y2s1) = pair();
    let edits = batch(&catalog, &[(A, required(y2s1))]);
    match prepare_commit(&edits, &catalog, Resolution::Block) {
      CommitOutcome::Blocked(conflicts) => assert_eq!(conflicts.len(), 1),
      CommitOutcome::Ready(_) => panic!("expected blocked"),
    }
  }

  #[test]
  fn sever_resolution_clears_dependent_links() {
    let (catalog, _, y1s2, y2s1) = pair();
    let edits = batch(&catalog, &[(A, required(y2s1))]);
    let CommitOutcome::Ready(plan) =
      prepare_commit(&edits, &catalog, Resolution::SeverLinks)
    else {
      panic!("expected ready");
    };

    assert_eq!(plan.severed, vec![B]);
    assert_eq!(plan.conflicts.len(), 1);
    assert_eq!(plan.updates, vec![
      SubjectUpdate {
        subject_id:      A,
        placement:       required(y2s1),
        prerequisite_id: None,
      },
      SubjectUpdate {
        subject_id:      B,
        placement:       required(y1s2),
        prerequisite_id: None,
      },
    ]);
  }

  #[test]
  fn own_prerequisite_is_cleared_silently() {
    let (catalog, y1s1, ..) = pair();
    // Only B moves, onto A's slot: no dependent-facing conflict, but B's own
    // link to A is no longer valid.
    let edits = batch(&catalog, &[(B, required(y1s1))]);
    assert!(detect_conflicts(&edits, &catalog).is_empty());

    let CommitOutcome::Ready(plan) =
      prepare_commit(&edits, &catalog, Resolution::Block)
    else {
      panic!("expected ready");
    };
    assert_eq!(plan.self_cleared, vec![B]);
    assert!(plan.severed.is_empty());
    assert_eq!(plan.updates, vec![SubjectUpdate {
      subject_id:      B,
      placement:       required(y1s1),
      prerequisite_id: None,
    }]);
  }

  #[test]
  fn valid_move_keeps_own_prerequisite() {
    let (catalog, _, _, y2s1) = pair();
    let edits = batch(&catalog, &[(B, required(y2s1))]);
    let CommitOutcome::Ready(plan) =
      prepare_commit(&edits, &catalog, Resolution::Block)
    else {
      panic!("expected ready");
    };
    assert!(plan.self_cleared.is_empty());
    assert_eq!(plan.updates[0].prerequisite_id, Some(A));
  }

  #[test]
  fn no_op_edits_produce_no_updates() {
    let (catalog, y1s1, y1s2, _) = pair();
    let edits = batch(&catalog, &[(A, required(y1s1)), (B, required(y1s2))]);
    let CommitOutcome::Ready(plan) =
      prepare_commit(&edits, &catalog, Resolution::Block)
    else {
      panic!("expected ready");
    };
    assert!(plan.updates.is_empty());
  }
}
