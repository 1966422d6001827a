//! Error type for `curriculum-store-sqlite`.

use curriculum_core::curriculum::{
  AssignmentId, CourseYearId, SectorId, SubjectId, TeacherId,
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] curriculum_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  /// A stored value could not be turned back into a domain value.
  #[error("decode error: {0}")]
  Decode(String),

  #[error("course year not found: {0}")]
  CourseYearNotFound(CourseYearId),

  #[error("sector not found: {0}")]
  SectorNotFound(SectorId),

  #[error("subject not found: {0}")]
  SubjectNotFound(SubjectId),

  #[error("teacher not found: {0}")]
  TeacherNotFound(TeacherId),

  #[error("teaching assignment not found: {0}")]
  AssignmentNotFound(AssignmentId),

  #[error("course year {course_year_id} already has a sector for year {year}, semester {semester}")]
  DuplicateSector {
    course_year_id: CourseYearId,
    year:           i64,
    semester:       i64,
  },

  #[error("sector {0} still has required subjects")]
  SectorInUse(SectorId),

  #[error("subject {0} cannot be its own prerequisite")]
  SelfPrerequisite(SubjectId),

  /// Prerequisite links never cross course years.
  #[error(
    "subject {prerequisite_id} belongs to course year \
     {prerequisite_course_year} and cannot be a prerequisite in course year \
     {course_year_id}"
  )]
  ForeignPrerequisite {
    prerequisite_id:          SubjectId,
    prerequisite_course_year: CourseYearId,
    course_year_id:           CourseYearId,
  },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
