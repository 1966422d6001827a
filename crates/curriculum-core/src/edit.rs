//! Typed subject edit batches.
//!
//! Requests arrive as loose `{subject_id, sector_id}` pairs (JSON from the
//! CLI, or whatever a caller's transport delivers). They are resolved against
//! the catalog and the course year's sectors into an [`EditBatch`] before the
//! conflict detector ever sees them.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{
  Error, Result,
  conflict::Catalog,
  curriculum::{Placement, Sector, SectorId, SubjectId, TimeSlot},
};

/// One requested move, as received at the boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectEditRequest {
  pub subject_id: SubjectId,
  /// Target sector; `None` turns the subject into an elective of its current
  /// course year.
  #[serde(default)]
  pub sector_id:  Option<SectorId>,
}

/// A validated proposed placement for one subject.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SubjectEdit {
  pub subject_id: SubjectId,
  pub placement:  Placement,
}

/// A set of proposed placements, at most one per subject, all referring to
/// subjects known to the catalog it was built against.
#[derive(Debug, Clone, Default)]
pub struct EditBatch {
  edits: Vec<SubjectEdit>,
  index: BTreeMap<SubjectId, usize>,
}

impl EditBatch {
  /// Build a batch from already-typed edits.
  pub fn new(
    edits: impl IntoIterator<Item = SubjectEdit>,
    catalog: &Catalog,
  ) -> Result<Self> {
    let mut batch = Self::default();
    for edit in edits {
      if catalog.get(edit.subject_id).is_none() {
        return Err(Error::UnknownSubject(edit.subject_id));
      }
      if batch.index.contains_key(&edit.subject_id) {
        return Err(Error::DuplicateEdit(edit.subject_id));
      }
      batch.index.insert(edit.subject_id, batch.edits.len());
      batch.edits.push(edit);
    }
    Ok(batch)
  }

  /// Resolve boundary requests: every sector must exist and belong to the
  /// course year of the subject being moved.
  pub fn resolve(
    requests: impl IntoIterator<Item = SubjectEditRequest>,
    catalog: &Catalog,
    sectors: &[Sector],
  ) -> Result<Self> {
    let edits = requests
      .into_iter()
      .map(|req| -> Result<SubjectEdit> {
        let subject = catalog
          .get(req.subject_id)
          .ok_or(Error::UnknownSubject(req.subject_id))?;
        let course_year_id = subject.course_year_id();

        let placement = match req.sector_id {
          None => Placement::Elective { course_year_id },
          Some(sector_id) => {
            let sector = sectors
              .iter()
              .find(|s| s.sector_id == sector_id)
              .copied()
              .ok_or(Error::UnknownSector(sector_id))?;
            if sector.course_year_id != course_year_id {
              return Err(Error::CourseYearMismatch {
                subject_id: req.subject_id,
                subject_course_year: course_year_id,
                sector_id,
                sector_course_year: sector.course_year_id,
              });
            }
            Placement::Required { sector }
          }
        };

        Ok(SubjectEdit { subject_id: req.subject_id, placement })
      })
      .collect::<Result<Vec<_>>>()?;

    Self::new(edits, catalog)
  }

  /// Parse a JSON array of [`SubjectEditRequest`] and resolve it.
  pub fn from_json(
    json: &str,
    catalog: &Catalog,
    sectors: &[Sector],
  ) -> Result<Self> {
    let requests: Vec<SubjectEditRequest> = serde_json::from_str(json)?;
    Self::resolve(requests, catalog, sectors)
  }

  pub fn edits(&self) -> &[SubjectEdit] { &self.edits }

  pub fn get(&self, subject_id: SubjectId) -> Option<&SubjectEdit> {
    self.index.get(&subject_id).map(|&i| &self.edits[i])
  }

  pub fn is_empty(&self) -> bool { self.edits.is_empty() }

  pub fn len(&self) -> usize { self.edits.len() }

  /// The slot `subject_id` would occupy once the batch is applied: its
  /// proposed slot if edited here, else its persisted slot. The outer `None`
  /// means the subject is unknown to both.
  pub fn effective_slot(
    &self,
    subject_id: SubjectId,
    catalog: &Catalog,
  ) -> Option<Option<TimeSlot>> {
    match self.get(subject_id) {
      Some(edit) => Some(edit.placement.slot()),
      None => catalog.get(subject_id).map(|s| s.slot()),
    }
  }
}
