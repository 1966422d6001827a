//! The `CurriculumStore` trait: the persistence collaborator the editing
//! session reads from and writes to.
//!
//! The trait is implemented by storage backends (e.g.
//! `curriculum-store-sqlite`). The session and the CLI depend on this
//! abstraction, not on any concrete backend.

use std::future::Future;

use crate::curriculum::{
  AssignmentId, CourseYear, CourseYearId, Fee, FeeKind, NewSubject, Sector,
  SectorId, Subject, SubjectId, SubjectUpdate, Teacher, TeacherId,
  TeachingAssignment, TimeSlot,
};

/// Abstraction over a curriculum store backend.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes.
pub trait CurriculumStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Course years ──────────────────────────────────────────────────────

  fn add_course_year(
    &self,
    name: String,
  ) -> impl Future<Output = Result<CourseYear, Self::Error>> + Send + '_;

  fn get_course_year(
    &self,
    id: CourseYearId,
  ) -> impl Future<Output = Result<Option<CourseYear>, Self::Error>> + Send + '_;

  // ── Teachers ──────────────────────────────────────────────────────────

  fn add_teacher(
    &self,
    name: String,
    email: String,
  ) -> impl Future<Output = Result<Teacher, Self::Error>> + Send + '_;

  // ── Sectors ───────────────────────────────────────────────────────────

  /// Open a new term in a course year. Fails if the course year already has
  /// a sector for `slot`.
  fn add_sector(
    &self,
    course_year_id: CourseYearId,
    slot: TimeSlot,
  ) -> impl Future<Output = Result<Sector, Self::Error>> + Send + '_;

  fn list_sectors(
    &self,
    course_year_id: CourseYearId,
  ) -> impl Future<Output = Result<Vec<Sector>, Self::Error>> + Send + '_;

  /// Remove a sector together with its fees. Fails while required subjects
  /// are still taught in it.
  fn delete_sector(
    &self,
    id: SectorId,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  // ── Subjects ──────────────────────────────────────────────────────────

  fn add_subject(
    &self,
    input: NewSubject,
  ) -> impl Future<Output = Result<Subject, Self::Error>> + Send + '_;

  fn get_subject(
    &self,
    id: SubjectId,
  ) -> impl Future<Output = Result<Option<Subject>, Self::Error>> + Send + '_;

  /// All subjects of a course year, required and elective.
  fn list_subjects(
    &self,
    course_year_id: CourseYearId,
  ) -> impl Future<Output = Result<Vec<Subject>, Self::Error>> + Send + '_;

  /// Replace a subject's placement and prerequisite link. The course year is
  /// derived from the sector for required placements.
  fn update_subject(
    &self,
    update: SubjectUpdate,
  ) -> impl Future<Output = Result<Subject, Self::Error>> + Send + '_;

  // ── Teaching assignments ──────────────────────────────────────────────

  /// The teacher's assignments on subjects of one course year.
  fn list_assignments(
    &self,
    teacher_id: TeacherId,
    course_year_id: CourseYearId,
  ) -> impl Future<Output = Result<Vec<TeachingAssignment>, Self::Error>>
  + Send
  + '_;

  fn create_assignment(
    &self,
    subject_id: SubjectId,
    teacher_id: TeacherId,
  ) -> impl Future<Output = Result<TeachingAssignment, Self::Error>> + Send + '_;

  fn delete_assignment(
    &self,
    id: AssignmentId,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  // ── Fees ──────────────────────────────────────────────────────────────

  fn add_fee(
    &self,
    sector_id: SectorId,
    kind: FeeKind,
    amount_cents: i64,
  ) -> impl Future<Output = Result<Fee, Self::Error>> + Send + '_;

  fn list_fees(
    &self,
    sector_id: SectorId,
  ) -> impl Future<Output = Result<Vec<Fee>, Self::Error>> + Send + '_;
}
