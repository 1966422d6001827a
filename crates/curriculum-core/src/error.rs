//! Error types for `curriculum-core`.

use thiserror::Error;

use crate::curriculum::{CourseYearId, SectorId, SubjectId};

#[derive(Debug, Error)]
pub enum Error {
  #[error("subject not found: {0}")]
  UnknownSubject(SubjectId),

  #[error("sector not found: {0}")]
  UnknownSector(SectorId),

  #[error("subject {0} appears more than once in the edit batch")]
  DuplicateEdit(SubjectId),

  #[error(
    "sector {sector_id} belongs to course year {sector_course_year}, but \
     subject {subject_id} belongs to course year {subject_course_year}"
  )]
  CourseYearMismatch {
    subject_id:          SubjectId,
    subject_course_year: CourseYearId,
    sector_id:           SectorId,
    sector_course_year:  CourseYearId,
  },

  /// Only two numbered terms plus summer (`0`) are supported.
  #[error("unsupported semester value: {0}")]
  UnsupportedSemester(i64),

  #[error("invalid academic year: {0}")]
  InvalidYear(i64),

  #[error("subject {subject_id} is not a candidate in course year {course_year_id}")]
  SubjectNotInPartition {
    subject_id:     SubjectId,
    course_year_id: CourseYearId,
  },

  #[error("course year {0} has not been opened in this session")]
  PartitionNotOpen(CourseYearId),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
  /// Wrap a backend error.
  pub fn store<E>(err: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::Store(Box::new(err))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
