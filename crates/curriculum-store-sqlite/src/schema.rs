//! SQL schema for the curriculum SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS course_years (
    course_year_id INTEGER PRIMARY KEY AUTOINCREMENT,
    name           TEXT NOT NULL,
    created_at     TEXT NOT NULL
);

-- One row per (academic year, semester) of a course year.
-- semester 0 is the summer term.
CREATE TABLE IF NOT EXISTS sectors (
    sector_id      INTEGER PRIMARY KEY AUTOINCREMENT,
    course_year_id INTEGER NOT NULL REFERENCES course_years(course_year_id),
    year           INTEGER NOT NULL CHECK (year >= 1),
    semester       INTEGER NOT NULL CHECK (semester IN (0, 1, 2)),
    UNIQUE (course_year_id, year, semester)
);

-- Required subjects carry a sector; electives do not.
-- course_year_id is copied from the sector on every write.
CREATE TABLE IF NOT EXISTS subjects (
    subject_id      INTEGER PRIMARY KEY AUTOINCREMENT,
    code            TEXT,
    name            TEXT NOT NULL,
    credits         INTEGER NOT NULL CHECK (credits >= 0),
    language        TEXT NOT NULL,
    is_required     INTEGER NOT NULL,
    sector_id       INTEGER REFERENCES sectors(sector_id),
    course_year_id  INTEGER NOT NULL REFERENCES course_years(course_year_id),
    prerequisite_id INTEGER REFERENCES subjects(subject_id) ON DELETE SET NULL,
    CHECK ((is_required = 1) = (sector_id IS NOT NULL)),
    CHECK (prerequisite_id IS NULL OR prerequisite_id != subject_id)
);

CREATE TABLE IF NOT EXISTS teachers (
    teacher_id INTEGER PRIMARY KEY AUTOINCREMENT,
    name       TEXT NOT NULL,
    email      TEXT NOT NULL UNIQUE
);

-- No uniqueness on (subject_id, teacher_id): duplicates are avoided by
-- diffing before writing.
CREATE TABLE IF NOT EXISTS teaching_assignments (
    assignment_id INTEGER PRIMARY KEY AUTOINCREMENT,
    subject_id    INTEGER NOT NULL REFERENCES subjects(subject_id) ON DELETE CASCADE,
    teacher_id    INTEGER NOT NULL REFERENCES teachers(teacher_id) ON DELETE CASCADE,
    assigned_at   TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS fees (
    fee_id       INTEGER PRIMARY KEY AUTOINCREMENT,
    sector_id    INTEGER NOT NULL REFERENCES sectors(sector_id) ON DELETE CASCADE,
    kind         TEXT NOT NULL,    -- 'tuition' | 'late'
    amount_cents INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS subjects_course_year_idx  ON subjects(course_year_id);
CREATE INDEX IF NOT EXISTS subjects_sector_idx       ON subjects(sector_id);
CREATE INDEX IF NOT EXISTS assignments_teacher_idx   ON teaching_assignments(teacher_id);
CREATE INDEX IF NOT EXISTS fees_sector_idx           ON fees(sector_id);

PRAGMA user_version = 1;
";
