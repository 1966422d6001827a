//! Encoding and decoding helpers between domain types and the plain values
//! stored in SQLite columns.
//!
//! Timestamps are stored as RFC 3339 strings, semesters as their wire integer
//! (0 = summer), fee kinds as lowercase strings.

use chrono::{DateTime, Utc};
use curriculum_core::curriculum::{
  CourseYear, Fee, FeeKind, Placement, Sector, Subject, TeachingAssignment,
  TimeSlot,
};

use crate::{Error, Result};

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::Decode(e.to_string()))
}

// ─── FeeKind ─────────────────────────────────────────────────────────────────

pub fn decode_fee_kind(s: &str) -> Result<FeeKind> {
  s.parse()
    .map_err(|_| Error::Decode(format!("unknown fee kind: {s:?}")))
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Column list shared by every subject query; pairs with
/// [`RawSubject::from_row`].
pub const SUBJECT_SELECT: &str = "
  SELECT s.subject_id, s.code, s.name, s.credits, s.language,
         s.course_year_id, s.prerequisite_id,
         s.sector_id, sec.year, sec.semester
  FROM subjects s
  LEFT JOIN sectors sec ON sec.sector_id = s.sector_id";

/// A `subjects` row joined with its sector, if any.
pub struct RawSubject {
  pub subject_id:      i64,
  pub code:            Option<String>,
  pub name:            String,
  pub credits:         i64,
  pub language:        String,
  pub course_year_id:  i64,
  pub prerequisite_id: Option<i64>,
  // sectors join
  pub sector_id:       Option<i64>,
  pub year:            Option<i64>,
  pub semester:        Option<i64>,
}

impl RawSubject {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      subject_id:      row.get(0)?,
      code:            row.get(1)?,
      name:            row.get(2)?,
      credits:         row.get(3)?,
      language:        row.get(4)?,
      course_year_id:  row.get(5)?,
      prerequisite_id: row.get(6)?,
      sector_id:       row.get(7)?,
      year:            row.get(8)?,
      semester:        row.get(9)?,
    })
  }

  pub fn into_subject(self) -> Result<Subject> {
    let placement = match (self.sector_id, self.year, self.semester) {
      (Some(sector_id), Some(year), Some(semester)) => Placement::Required {
        sector: Sector {
          sector_id,
          course_year_id: self.course_year_id,
          slot: TimeSlot::new(year, semester)?,
        },
      },
      (None, ..) => Placement::Elective { course_year_id: self.course_year_id },
      (Some(sector_id), ..) => {
        return Err(Error::Decode(format!(
          "subject {} points at missing sector {sector_id}",
          self.subject_id
        )));
      }
    };

    Ok(Subject {
      subject_id: self.subject_id,
      code: self.code,
      name: self.name,
      credits: u32::try_from(self.credits)
        .map_err(|e| Error::Decode(e.to_string()))?,
      language: self.language,
      placement,
      prerequisite_id: self.prerequisite_id,
    })
  }
}

/// A `sectors` row.
pub struct RawSector {
  pub sector_id:      i64,
  pub course_year_id: i64,
  pub year:           i64,
  pub semester:       i64,
}

impl RawSector {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      sector_id:      row.get(0)?,
      course_year_id: row.get(1)?,
      year:           row.get(2)?,
      semester:       row.get(3)?,
    })
  }

  pub fn into_sector(self) -> Result<Sector> {
    Ok(Sector {
      sector_id:      self.sector_id,
      course_year_id: self.course_year_id,
      slot:           TimeSlot::new(self.year, self.semester)?,
    })
  }
}

/// A `course_years` row.
pub struct RawCourseYear {
  pub course_year_id: i64,
  pub name:           String,
  pub created_at:     String,
}

impl RawCourseYear {
  pub fn into_course_year(self) -> Result<CourseYear> {
    Ok(CourseYear {
      course_year_id: self.course_year_id,
      name:           self.name,
      created_at:     decode_dt(&self.created_at)?,
    })
  }
}

/// A `teaching_assignments` row.
pub struct RawAssignment {
  pub assignment_id: i64,
  pub subject_id:    i64,
  pub teacher_id:    i64,
  pub assigned_at:   String,
}

impl RawAssignment {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      assignment_id: row.get(0)?,
      subject_id:    row.get(1)?,
      teacher_id:    row.get(2)?,
      assigned_at:   row.get(3)?,
    })
  }

  pub fn into_assignment(self) -> Result<TeachingAssignment> {
    Ok(TeachingAssignment {
      assignment_id: self.assignment_id,
      subject_id:    self.subject_id,
      teacher_id:    self.teacher_id,
      assigned_at:   decode_dt(&self.assigned_at)?,
    })
  }
}

/// A `fees` row.
pub struct RawFee {
  pub fee_id:       i64,
  pub sector_id:    i64,
  pub kind:         String,
  pub amount_cents: i64,
}

impl RawFee {
  pub fn into_fee(self) -> Result<Fee> {
    Ok(Fee {
      fee_id:       self.fee_id,
      sector_id:    self.sector_id,
      kind:         decode_fee_kind(&self.kind)?,
      amount_cents: self.amount_cents,
    })
  }
}
