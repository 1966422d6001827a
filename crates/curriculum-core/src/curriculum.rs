//! Curriculum records: course years, education sectors, subjects, teachers,
//! teaching assignments and fees.
//!
//! A required subject is pinned to an education sector (one academic year
//! and semester of a course year); an elective hangs off the course year
//! directly. [`Placement`] makes the two mutually exclusive, and a required
//! subject's course year is always read from its sector.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

// ─── Identifiers ─────────────────────────────────────────────────────────────

pub type CourseYearId = i64;
pub type SectorId = i64;
pub type SubjectId = i64;
pub type TeacherId = i64;
pub type AssignmentId = i64;
pub type FeeId = i64;

// ─── Time slots ──────────────────────────────────────────────────────────────

/// A teaching term within an academic year.
///
/// On the wire and in storage a semester is a small integer: `1` and `2` are
/// the numbered terms, `0` is the summer term.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum Semester {
  First,
  Second,
  Summer,
}

impl TryFrom<i64> for Semester {
  type Error = Error;

  fn try_from(value: i64) -> Result<Self> {
    match value {
      0 => Ok(Self::Summer),
      1 => Ok(Self::First),
      2 => Ok(Self::Second),
      other => Err(Error::UnsupportedSemester(other)),
    }
  }
}

impl From<Semester> for i64 {
  fn from(s: Semester) -> Self {
    match s {
      Semester::Summer => 0,
      Semester::First => 1,
      Semester::Second => 2,
    }
  }
}

/// One `(academic year, semester)` teaching period.
///
/// Ordering follows [`crate::ordering::order_of`]: by year, then first,
/// second, summer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawTimeSlot")]
pub struct TimeSlot {
  pub year:     u16,
  pub semester: Semester,
}

impl TimeSlot {
  /// Build a slot from raw integers, rejecting year `0`, years that do not
  /// fit, and semesters other than 0, 1, 2.
  pub fn new(year: i64, semester: i64) -> Result<Self> {
    let year = u16::try_from(year)
      .ok()
      .filter(|y| *y >= 1)
      .ok_or(Error::InvalidYear(year))?;
    Ok(Self { year, semester: Semester::try_from(semester)? })
  }
}

#[derive(Deserialize)]
struct RawTimeSlot {
  year:     i64,
  semester: i64,
}

impl TryFrom<RawTimeSlot> for TimeSlot {
  type Error = Error;

  fn try_from(raw: RawTimeSlot) -> Result<Self> {
    Self::new(raw.year, raw.semester)
  }
}

impl PartialOrd for TimeSlot {
  fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
    Some(self.cmp(other))
  }
}

impl Ord for TimeSlot {
  fn cmp(&self, other: &Self) -> std::cmp::Ordering {
    crate::ordering::order_of(Some(self))
      .cmp(&crate::ordering::order_of(Some(other)))
  }
}

// ─── Course years and sectors ────────────────────────────────────────────────

/// A curriculum intake, e.g. "2024".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CourseYear {
  pub course_year_id: CourseYearId,
  pub name:           String,
  pub created_at:     DateTime<Utc>,
}

/// An education sector: one time slot inside a course year.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sector {
  pub sector_id:      SectorId,
  pub course_year_id: CourseYearId,
  pub slot:           TimeSlot,
}

// ─── Subjects ────────────────────────────────────────────────────────────────

/// Where a subject sits in the curriculum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Placement {
  /// A required subject taught in a specific sector.
  Required { sector: Sector },
  /// An elective, attached to the course year but to no time slot.
  Elective { course_year_id: CourseYearId },
}

impl Placement {
  pub fn slot(&self) -> Option<TimeSlot> {
    match self {
      Self::Required { sector } => Some(sector.slot),
      Self::Elective { .. } => None,
    }
  }

  pub fn course_year_id(&self) -> CourseYearId {
    match self {
      Self::Required { sector } => sector.course_year_id,
      Self::Elective { course_year_id } => *course_year_id,
    }
  }

  pub fn sector_id(&self) -> Option<SectorId> {
    match self {
      Self::Required { sector } => Some(sector.sector_id),
      Self::Elective { .. } => None,
    }
  }
}

/// A course offering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subject {
  pub subject_id:      SubjectId,
  pub code:            Option<String>,
  pub name:            String,
  pub credits:         u32,
  /// Language of instruction.
  pub language:        String,
  pub placement:       Placement,
  pub prerequisite_id: Option<SubjectId>,
}

impl Subject {
  pub fn is_required(&self) -> bool {
    matches!(self.placement, Placement::Required { .. })
  }

  pub fn slot(&self) -> Option<TimeSlot> { self.placement.slot() }

  pub fn course_year_id(&self) -> CourseYearId {
    self.placement.course_year_id()
  }
}

/// Input to [`crate::store::CurriculumStore::add_subject`].
#[derive(Debug, Clone)]
pub struct NewSubject {
  pub code:            Option<String>,
  pub name:            String,
  pub credits:         u32,
  pub language:        String,
  pub placement:       Placement,
  pub prerequisite_id: Option<SubjectId>,
}

impl NewSubject {
  /// Convenience constructor: three credits, English, no code or prerequisite.
  pub fn new(name: impl Into<String>, placement: Placement) -> Self {
    Self {
      code: None,
      name: name.into(),
      credits: 3,
      language: "en".to_owned(),
      placement,
      prerequisite_id: None,
    }
  }
}

/// A full replacement of a subject's placement and prerequisite link.
///
/// The store derives the subject's course year from the sector for required
/// placements; the `course_year_id` carried inside [`Sector`] is not trusted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectUpdate {
  pub subject_id:      SubjectId,
  pub placement:       Placement,
  pub prerequisite_id: Option<SubjectId>,
}

// ─── Teachers and assignments ────────────────────────────────────────────────

/// The minimal user record a teaching assignment points at.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Teacher {
  pub teacher_id: TeacherId,
  pub name:       String,
  pub email:      String,
}

/// "Teacher teaches subject." Scoped implicitly by the subject's course year.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeachingAssignment {
  pub assignment_id: AssignmentId,
  pub subject_id:    SubjectId,
  pub teacher_id:    TeacherId,
  pub assigned_at:   DateTime<Utc>,
}

// ─── Fees ────────────────────────────────────────────────────────────────────

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
  strum::Display,
  strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum FeeKind {
  Tuition,
  Late,
}

/// A fee charged for a sector; removed together with its sector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fee {
  pub fee_id:       FeeId,
  pub sector_id:    SectorId,
  pub kind:         FeeKind,
  pub amount_cents: i64,
}
