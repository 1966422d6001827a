//! [`SqliteStore`]: the SQLite implementation of [`CurriculumStore`].

use std::path::Path;

use chrono::Utc;
use rusqlite::OptionalExtension as _;

use curriculum_core::{
  curriculum::{
    AssignmentId, CourseYear, CourseYearId, Fee, FeeKind, NewSubject, Placement,
    Sector, SectorId, Subject, SubjectId, SubjectUpdate, Teacher, TeacherId,
    TeachingAssignment, TimeSlot,
  },
  ordering::sort_sectors,
  store::CurriculumStore,
};

use crate::{
  Error, Result,
  encode::{
    RawAssignment, RawCourseYear, RawFee, RawSector, RawSubject, SUBJECT_SELECT,
    encode_dt,
  },
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A curriculum store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, mostly for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    tracing::debug!("curriculum schema initialised");
    Ok(())
  }

  /// Run a `SELECT 1 … WHERE <id> = ?1` existence check.
  async fn exists(&self, sql: &'static str, id: i64) -> Result<bool> {
    let found = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(sql, rusqlite::params![id], |_| Ok(()))
            .optional()?
            .is_some(),
        )
      })
      .await?;
    Ok(found)
  }

  async fn require_course_year(&self, id: CourseYearId) -> Result<()> {
    let sql = "SELECT 1 FROM course_years WHERE course_year_id = ?1";
    if !self.exists(sql, id).await? {
      return Err(Error::CourseYearNotFound(id));
    }
    Ok(())
  }

  async fn require_subject(&self, id: SubjectId) -> Result<()> {
    let sql = "SELECT 1 FROM subjects WHERE subject_id = ?1";
    if !self.exists(sql, id).await? {
      return Err(Error::SubjectNotFound(id));
    }
    Ok(())
  }

  async fn require_teacher(&self, id: TeacherId) -> Result<()> {
    let sql = "SELECT 1 FROM teachers WHERE teacher_id = ?1";
    if !self.exists(sql, id).await? {
      return Err(Error::TeacherNotFound(id));
    }
    Ok(())
  }

  async fn get_sector(&self, id: SectorId) -> Result<Option<Sector>> {
    let raw: Option<RawSector> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT sector_id, course_year_id, year, semester
               FROM sectors WHERE sector_id = ?1",
              rusqlite::params![id],
              RawSector::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawSector::into_sector).transpose()
  }

  /// Turn a placement into the `(sector_id, course_year_id)` column pair.
  /// For required placements the course year is read from the stored sector.
  async fn resolve_placement(
    &self,
    placement: Placement,
  ) -> Result<(Option<SectorId>, CourseYearId)> {
    match placement {
      Placement::Required { sector } => {
        let stored = self
          .get_sector(sector.sector_id)
          .await?
          .ok_or(Error::SectorNotFound(sector.sector_id))?;
        Ok((Some(stored.sector_id), stored.course_year_id))
      }
      Placement::Elective { course_year_id } => {
        self.require_course_year(course_year_id).await?;
        Ok((None, course_year_id))
      }
    }
  }

  async fn check_prerequisite(
    &self,
    subject_id: Option<SubjectId>,
    course_year_id: CourseYearId,
    prerequisite_id: Option<SubjectId>,
  ) -> Result<()> {
    let Some(prereq) = prerequisite_id else {
      return Ok(());
    };
    if subject_id == Some(prereq) {
      return Err(Error::SelfPrerequisite(prereq));
    }

    let prereq_course_year: Option<CourseYearId> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT course_year_id FROM subjects WHERE subject_id = ?1",
              rusqlite::params![prereq],
              |r| r.get(0),
            )
            .optional()?,
        )
      })
      .await?;

    match prereq_course_year {
      None => Err(Error::SubjectNotFound(prereq)),
      Some(other) if other != course_year_id => Err(Error::ForeignPrerequisite {
        prerequisite_id: prereq,
        prerequisite_course_year: other,
        course_year_id,
      }),
      Some(_) => Ok(()),
    }
  }

  /// A subject moving to `course_year_id` must not leave dependents behind in
  /// another course year.
  async fn check_dependents(
    &self,
    subject_id: SubjectId,
    course_year_id: CourseYearId,
  ) -> Result<()> {
    let stranded: Option<CourseYearId> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT course_year_id FROM subjects
               WHERE prerequisite_id = ?1 AND course_year_id != ?2
               LIMIT 1",
              rusqlite::params![subject_id, course_year_id],
              |r| r.get(0),
            )
            .optional()?,
        )
      })
      .await?;

    match stranded {
      Some(dependent_course_year) => Err(Error::ForeignPrerequisite {
        prerequisite_id:          subject_id,
        prerequisite_course_year: course_year_id,
        course_year_id:           dependent_course_year,
      }),
      None => Ok(()),
    }
  }
}

// ─── CurriculumStore impl ────────────────────────────────────────────────────

impl CurriculumStore for SqliteStore {
  type Error = Error;

  // ── Course years ──────────────────────────────────────────────────────────

  async fn add_course_year(&self, name: String) -> Result<CourseYear> {
    let created_at = Utc::now();
    let at_str = encode_dt(created_at);
    let name_col = name.clone();

    let course_year_id = self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO course_years (name, created_at) VALUES (?1, ?2)",
          rusqlite::params![name_col, at_str],
        )?;
        Ok(conn.last_insert_rowid())
      })
      .await?;

    Ok(CourseYear { course_year_id, name, created_at })
  }

  async fn get_course_year(&self, id: CourseYearId) -> Result<Option<CourseYear>> {
    let raw: Option<RawCourseYear> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT course_year_id, name, created_at
               FROM course_years WHERE course_year_id = ?1",
              rusqlite::params![id],
              |row| {
                Ok(RawCourseYear {
                  course_year_id: row.get(0)?,
                  name:           row.get(1)?,
                  created_at:     row.get(2)?,
                })
              },
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawCourseYear::into_course_year).transpose()
  }

  // ── Teachers ──────────────────────────────────────────────────────────────

  async fn add_teacher(&self, name: String, email: String) -> Result<Teacher> {
    let (name_col, email_col) = (name.clone(), email.clone());

    let teacher_id = self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO teachers (name, email) VALUES (?1, ?2)",
          rusqlite::params![name_col, email_col],
        )?;
        Ok(conn.last_insert_rowid())
      })
      .await?;

    Ok(Teacher { teacher_id, name, email })
  }

  // ── Sectors ───────────────────────────────────────────────────────────────

  async fn add_sector(
    &self,
    course_year_id: CourseYearId,
    slot: TimeSlot,
  ) -> Result<Sector> {
    self.require_course_year(course_year_id).await?;

    let year     = i64::from(slot.year);
    let semester = i64::from(slot.semester);

    let sector_id: Option<i64> = self
      .conn
      .call(move |conn| {
        let taken = conn
          .query_row(
            "SELECT 1 FROM sectors
             WHERE course_year_id = ?1 AND year = ?2 AND semester = ?3",
            rusqlite::params![course_year_id, year, semester],
            |_| Ok(()),
          )
          .optional()?
          .is_some();
        if taken {
          return Ok(None);
        }

        conn.execute(
          "INSERT INTO sectors (course_year_id, year, semester) VALUES (?1, ?2, ?3)",
          rusqlite::params![course_year_id, year, semester],
        )?;
        Ok(Some(conn.last_insert_rowid()))
      })
      .await?;

    let sector_id = sector_id.ok_or(Error::DuplicateSector {
      course_year_id,
      year,
      semester,
    })?;
    Ok(Sector { sector_id, course_year_id, slot })
  }

  async fn list_sectors(&self, course_year_id: CourseYearId) -> Result<Vec<Sector>> {
    let raws: Vec<RawSector> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT sector_id, course_year_id, year, semester
           FROM sectors WHERE course_year_id = ?1",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![course_year_id], RawSector::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    let mut sectors = raws
      .into_iter()
      .map(RawSector::into_sector)
      .collect::<Result<Vec<_>>>()?;
    sort_sectors(&mut sectors);
    Ok(sectors)
  }

  async fn delete_sector(&self, id: SectorId) -> Result<()> {
    if self.get_sector(id).await?.is_none() {
      return Err(Error::SectorNotFound(id));
    }

    let in_use = self
      .conn
      .call(move |conn| {
        let subjects: i64 = conn.query_row(
          "SELECT COUNT(*) FROM subjects WHERE sector_id = ?1",
          rusqlite::params![id],
          |r| r.get(0),
        )?;
        if subjects > 0 {
          return Ok(true);
        }
        // Fees go with the sector (ON DELETE CASCADE).
        conn.execute("DELETE FROM sectors WHERE sector_id = ?1", rusqlite::params![id])?;
        Ok(false)
      })
      .await?;

    if in_use {
      return Err(Error::SectorInUse(id));
    }
    tracing::debug!(sector_id = id, "sector deleted");
    Ok(())
  }

  // ── Subjects ──────────────────────────────────────────────────────────────

  async fn add_subject(&self, input: NewSubject) -> Result<Subject> {
    let (sector_id, course_year_id) = self.resolve_placement(input.placement).await?;
    self
      .check_prerequisite(None, course_year_id, input.prerequisite_id)
      .await?;

    let is_required     = sector_id.is_some();
    let code            = input.code;
    let name            = input.name;
    let credits         = i64::from(input.credits);
    let language        = input.language;
    let prerequisite_id = input.prerequisite_id;

    let subject_id = self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO subjects (
             code, name, credits, language,
             is_required, sector_id, course_year_id, prerequisite_id
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
          rusqlite::params![
            code,
            name,
            credits,
            language,
            is_required,
            sector_id,
            course_year_id,
            prerequisite_id,
          ],
        )?;
        Ok(conn.last_insert_rowid())
      })
      .await?;

    self
      .get_subject(subject_id)
      .await?
      .ok_or(Error::SubjectNotFound(subject_id))
  }

  async fn get_subject(&self, id: SubjectId) -> Result<Option<Subject>> {
    let raw: Option<RawSubject> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("{SUBJECT_SELECT} WHERE s.subject_id = ?1"),
              rusqlite::params![id],
              RawSubject::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawSubject::into_subject).transpose()
  }

  async fn list_subjects(&self, course_year_id: CourseYearId) -> Result<Vec<Subject>> {
    let raws: Vec<RawSubject> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "{SUBJECT_SELECT} WHERE s.course_year_id = ?1 ORDER BY s.subject_id"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![course_year_id], RawSubject::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawSubject::into_subject).collect()
  }

  async fn update_subject(&self, update: SubjectUpdate) -> Result<Subject> {
    let subject_id = update.subject_id;
    self.require_subject(subject_id).await?;
    let (sector_id, course_year_id) = self.resolve_placement(update.placement).await?;
    self
      .check_prerequisite(Some(subject_id), course_year_id, update.prerequisite_id)
      .await?;
    self.check_dependents(subject_id, course_year_id).await?;

    let is_required     = sector_id.is_some();
    let prerequisite_id = update.prerequisite_id;

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "UPDATE subjects
           SET is_required = ?1, sector_id = ?2, course_year_id = ?3,
               prerequisite_id = ?4
           WHERE subject_id = ?5",
          rusqlite::params![
            is_required,
            sector_id,
            course_year_id,
            prerequisite_id,
            subject_id,
          ],
        )?;
        Ok(())
      })
      .await?;

    self
      .get_subject(subject_id)
      .await?
      .ok_or(Error::SubjectNotFound(subject_id))
  }

  // ── Teaching assignments ──────────────────────────────────────────────────

  async fn list_assignments(
    &self,
    teacher_id:     TeacherId,
    course_year_id: CourseYearId,
  ) -> Result<Vec<TeachingAssignment>> {
    let raws: Vec<RawAssignment> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT a.assignment_id, a.subject_id, a.teacher_id, a.assigned_at
           FROM teaching_assignments a
           JOIN subjects s ON s.subject_id = a.subject_id
           WHERE a.teacher_id = ?1 AND s.course_year_id = ?2
           ORDER BY a.assignment_id",
        )?;
        let rows = stmt
          .query_map(
            rusqlite::params![teacher_id, course_year_id],
            RawAssignment::from_row,
          )?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawAssignment::into_assignment).collect()
  }

  async fn create_assignment(
    &self,
    subject_id: SubjectId,
    teacher_id: TeacherId,
  ) -> Result<TeachingAssignment> {
    self.require_subject(subject_id).await?;
    self.require_teacher(teacher_id).await?;

    let assigned_at = Utc::now();
    let at_str      = encode_dt(assigned_at);

    let assignment_id = self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO teaching_assignments (subject_id, teacher_id, assigned_at)
           VALUES (?1, ?2, ?3)",
          rusqlite::params![subject_id, teacher_id, at_str],
        )?;
        Ok(conn.last_insert_rowid())
      })
      .await?;

    Ok(TeachingAssignment { assignment_id, subject_id, teacher_id, assigned_at })
  }

  async fn delete_assignment(&self, id: AssignmentId) -> Result<()> {
    let removed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "DELETE FROM teaching_assignments WHERE assignment_id = ?1",
          rusqlite::params![id],
        )?)
      })
      .await?;

    if removed == 0 {
      return Err(Error::AssignmentNotFound(id));
    }
    Ok(())
  }

  // ── Fees ──────────────────────────────────────────────────────────────────

  async fn add_fee(
    &self,
    sector_id:    SectorId,
    kind:         FeeKind,
    amount_cents: i64,
  ) -> Result<Fee> {
    if self.get_sector(sector_id).await?.is_none() {
      return Err(Error::SectorNotFound(sector_id));
    }

    let kind_str = kind.to_string();
    let fee_id = self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO fees (sector_id, kind, amount_cents) VALUES (?1, ?2, ?3)",
          rusqlite::params![sector_id, kind_str, amount_cents],
        )?;
        Ok(conn.last_insert_rowid())
      })
      .await?;

    Ok(Fee { fee_id, sector_id, kind, amount_cents })
  }

  async fn list_fees(&self, sector_id: SectorId) -> Result<Vec<Fee>> {
    let raws: Vec<RawFee> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT fee_id, sector_id, kind, amount_cents
           FROM fees WHERE sector_id = ?1 ORDER BY fee_id",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![sector_id], |row| {
            Ok(RawFee {
              fee_id:       row.get(0)?,
              sector_id:    row.get(1)?,
              kind:         row.get(2)?,
              amount_cents: row.get(3)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawFee::into_fee).collect()
  }
}
