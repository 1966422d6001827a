//! Integration tests for `SqliteStore` against an in-memory database.

use std::sync::Arc;

use curriculum_core::{
  conflict::{Conflict, Resolution},
  curriculum::{
    CourseYearId, FeeKind, NewSubject, Placement, Sector, Semester, Subject,
    SubjectUpdate, TimeSlot,
  },
  edit::SubjectEditRequest,
  session::{AssignmentSession, CommitReport, commit_subject_edits},
  store::CurriculumStore,
};

use crate::{Error, SqliteStore};

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn slot(year: i64, semester: i64) -> TimeSlot {
  TimeSlot::new(year, semester).unwrap()
}

/// Course year "2024" with sectors (2024, 1) and (2024, 2), plus Intro in
/// the first and Advanced (prerequisite Intro) in the second.
struct Fixture {
  course_year_id: CourseYearId,
  first:          Sector,
  second:         Sector,
  intro:          Subject,
  advanced:       Subject,
}

async fn fixture(s: &SqliteStore) -> Fixture {
  let cy = s.add_course_year("2024".into()).await.unwrap();
  let first = s.add_sector(cy.course_year_id, slot(2024, 1)).await.unwrap();
  let second = s.add_sector(cy.course_year_id, slot(2024, 2)).await.unwrap();

  let intro = s
    .add_subject(NewSubject::new("Intro", Placement::Required { sector: first }))
    .await
    .unwrap();
  let mut advanced =
    NewSubject::new("Advanced", Placement::Required { sector: second });
  advanced.prerequisite_id = Some(intro.subject_id);
  let advanced = s.add_subject(advanced).await.unwrap();

  Fixture {
    course_year_id: cy.course_year_id,
    first,
    second,
    intro,
    advanced,
  }
}

// ─── Course years & sectors ──────────────────────────────────────────────────

#[tokio::test]
async fn add_and_get_course_year() {
  let s = store().await;
  let cy = s.add_course_year("2024".into()).await.unwrap();

  let fetched = s.get_course_year(cy.course_year_id).await.unwrap().unwrap();
  assert_eq!(fetched.name, "2024");
  assert!(s.get_course_year(9999).await.unwrap().is_none());
}

#[tokio::test]
async fn sectors_listed_in_curriculum_order() {
  let s = store().await;
  let cy = s.add_course_year("2024".into()).await.unwrap().course_year_id;

  // Inserted out of order on purpose.
  s.add_sector(cy, slot(2025, 1)).await.unwrap();
  s.add_sector(cy, slot(2024, 0)).await.unwrap();
  s.add_sector(cy, slot(2024, 2)).await.unwrap();
  s.add_sector(cy, slot(2024, 1)).await.unwrap();

  let slots: Vec<_> = s
    .list_sectors(cy)
    .await
    .unwrap()
    .into_iter()
    .map(|sec| (sec.slot.year, sec.slot.semester))
    .collect();
  assert_eq!(slots, vec![
    (2024, Semester::First),
    (2024, Semester::Second),
    (2024, Semester::Summer),
    (2025, Semester::First),
  ]);
}

#[tokio::test]
async fn sectors_are_scoped_to_course_year() {
  let s = store().await;
  let a = s.add_course_year("2024".into()).await.unwrap().course_year_id;
  let b = s.add_course_year("2025".into()).await.unwrap().course_year_id;
  s.add_sector(a, slot(2024, 1)).await.unwrap();
  // Same slot in another course year is fine.
  s.add_sector(b, slot(2024, 1)).await.unwrap();

  assert_eq!(s.list_sectors(a).await.unwrap().len(), 1);
  assert_eq!(s.list_sectors(b).await.unwrap().len(), 1);
}

#[tokio::test]
async fn duplicate_sector_rejected() {
  let s = store().await;
  let cy = s.add_course_year("2024".into()).await.unwrap().course_year_id;
  s.add_sector(cy, slot(2024, 1)).await.unwrap();

  let err = s.add_sector(cy, slot(2024, 1)).await.unwrap_err();
  assert!(
    matches!(err, Error::DuplicateSector { year: 2024, semester: 1, .. }),
    "unexpected error: {err}"
  );
}

#[tokio::test]
async fn sector_for_missing_course_year_rejected() {
  let s = store().await;
  let err = s.add_sector(42, slot(2024, 1)).await.unwrap_err();
  assert!(matches!(err, Error::CourseYearNotFound(42)));
}

#[tokio::test]
async fn delete_sector_removes_fees() {
  let s = store().await;
  let cy = s.add_course_year("2024".into()).await.unwrap().course_year_id;
  let sector = s.add_sector(cy, slot(2024, 0)).await.unwrap();

  s.add_fee(sector.sector_id, FeeKind::Tuition, 120_000).await.unwrap();
  s.add_fee(sector.sector_id, FeeKind::Late, 5_000).await.unwrap();
  let fees = s.list_fees(sector.sector_id).await.unwrap();
  assert_eq!(fees.len(), 2);
  assert_eq!(fees[1].kind, FeeKind::Late);

  s.delete_sector(sector.sector_id).await.unwrap();
  assert!(s.list_sectors(cy).await.unwrap().is_empty());
  assert!(s.list_fees(sector.sector_id).await.unwrap().is_empty());
}

#[tokio::test]
async fn delete_sector_in_use_rejected() {
  let s = store().await;
  let f = fixture(&s).await;

  let err = s.delete_sector(f.first.sector_id).await.unwrap_err();
  assert!(matches!(err, Error::SectorInUse(id) if id == f.first.sector_id));
  assert_eq!(s.list_sectors(f.course_year_id).await.unwrap().len(), 2);
}

#[tokio::test]
async fn delete_missing_sector_rejected() {
  let s = store().await;
  let err = s.delete_sector(7).await.unwrap_err();
  assert!(matches!(err, Error::SectorNotFound(7)));
}

// ─── Subjects ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn add_and_get_required_subject() {
  let s = store().await;
  let f = fixture(&s).await;

  let fetched = s.get_subject(f.advanced.subject_id).await.unwrap().unwrap();
  assert!(fetched.is_required());
  assert_eq!(fetched.slot(), Some(slot(2024, 2)));
  assert_eq!(fetched.course_year_id(), f.course_year_id);
  assert_eq!(fetched.prerequisite_id, Some(f.intro.subject_id));
  assert_eq!(fetched.credits, 3);
}

#[tokio::test]
async fn add_elective_subject() {
  let s = store().await;
  let f = fixture(&s).await;

  let poetry = s
    .add_subject(NewSubject::new("Poetry", Placement::Elective {
      course_year_id: f.course_year_id,
    }))
    .await
    .unwrap();
  assert!(!poetry.is_required());
  assert_eq!(poetry.slot(), None);

  let all = s.list_subjects(f.course_year_id).await.unwrap();
  assert_eq!(all.len(), 3);
}

#[tokio::test]
async fn subject_course_year_comes_from_sector() {
  let s = store().await;
  let f = fixture(&s).await;
  let other = s.add_course_year("2025".into()).await.unwrap().course_year_id;

  // The sector claims the wrong course year; the stored sector row wins.
  let forged = Sector { course_year_id: other, ..f.first };
  let subject = s
    .add_subject(NewSubject::new("Labs", Placement::Required { sector: forged }))
    .await
    .unwrap();

  assert_eq!(subject.course_year_id(), f.course_year_id);
  assert!(s.list_subjects(other).await.unwrap().is_empty());
}

#[tokio::test]
async fn subject_with_missing_prerequisite_rejected() {
  let s = store().await;
  let f = fixture(&s).await;

  let mut input = NewSubject::new("Orphan", Placement::Required { sector: f.second });
  input.prerequisite_id = Some(9999);
  let err = s.add_subject(input).await.unwrap_err();
  assert!(matches!(err, Error::SubjectNotFound(9999)));
}

#[tokio::test]
async fn prerequisite_from_another_course_year_rejected() {
  let s = store().await;
  let f = fixture(&s).await;
  let other = s.add_course_year("2025".into()).await.unwrap().course_year_id;

  let mut input = NewSubject::new("Elsewhere", Placement::Elective {
    course_year_id: other,
  });
  input.prerequisite_id = Some(f.intro.subject_id);
  let err = s.add_subject(input).await.unwrap_err();
  assert!(
    matches!(
      err,
      Error::ForeignPrerequisite { prerequisite_id, prerequisite_course_year, course_year_id }
        if prerequisite_id == f.intro.subject_id
          && prerequisite_course_year == f.course_year_id
          && course_year_id == other
    ),
    "unexpected error: {err}"
  );
  assert!(s.list_subjects(other).await.unwrap().is_empty());
}

#[tokio::test]
async fn moving_a_prerequisite_out_of_its_course_year_rejected() {
  let s = store().await;
  let f = fixture(&s).await;
  let other = s.add_course_year("2025".into()).await.unwrap().course_year_id;

  // Advanced still depends on Intro in the original course year.
  let err = s
    .update_subject(SubjectUpdate {
      subject_id:      f.intro.subject_id,
      placement:       Placement::Elective { course_year_id: other },
      prerequisite_id: None,
    })
    .await
    .unwrap_err();
  assert!(matches!(err, Error::ForeignPrerequisite { .. }), "unexpected error: {err}");

  let intro = s.get_subject(f.intro.subject_id).await.unwrap().unwrap();
  assert_eq!(intro.course_year_id(), f.course_year_id);
}

#[tokio::test]
async fn update_subject_moves_and_clears_link() {
  let s = store().await;
  let f = fixture(&s).await;

  let updated = s
    .update_subject(SubjectUpdate {
      subject_id:      f.advanced.subject_id,
      placement:       Placement::Elective { course_year_id: f.course_year_id },
      prerequisite_id: None,
    })
    .await
    .unwrap();

  assert!(!updated.is_required());
  assert_eq!(updated.prerequisite_id, None);
  // The sector is free again.
  s.delete_sector(f.second.sector_id).await.unwrap();
}

#[tokio::test]
async fn update_subject_self_prerequisite_rejected() {
  let s = store().await;
  let f = fixture(&s).await;

  let err = s
    .update_subject(SubjectUpdate {
      subject_id:      f.intro.subject_id,
      placement:       f.intro.placement,
      prerequisite_id: Some(f.intro.subject_id),
    })
    .await
    .unwrap_err();
  assert!(matches!(err, Error::SelfPrerequisite(_)));
}

// ─── Teaching assignments ────────────────────────────────────────────────────

#[tokio::test]
async fn assignments_listed_per_course_year() {
  let s = store().await;
  let f = fixture(&s).await;
  let teacher = s
    .add_teacher("Ada".into(), "ada@example.edu".into())
    .await
    .unwrap();

  let other_cy = s.add_course_year("2025".into()).await.unwrap().course_year_id;
  let other = s
    .add_subject(NewSubject::new("Elsewhere", Placement::Elective {
      course_year_id: other_cy,
    }))
    .await
    .unwrap();

  s.create_assignment(f.intro.subject_id, teacher.teacher_id).await.unwrap();
  s.create_assignment(other.subject_id, teacher.teacher_id).await.unwrap();

  let here = s
    .list_assignments(teacher.teacher_id, f.course_year_id)
    .await
    .unwrap();
  assert_eq!(here.len(), 1);
  assert_eq!(here[0].subject_id, f.intro.subject_id);

  let there = s.list_assignments(teacher.teacher_id, other_cy).await.unwrap();
  assert_eq!(there.len(), 1);
  assert_eq!(there[0].subject_id, other.subject_id);
}

#[tokio::test]
async fn create_assignment_for_missing_teacher_rejected() {
  let s = store().await;
  let f = fixture(&s).await;

  let err = s.create_assignment(f.intro.subject_id, 77).await.unwrap_err();
  assert!(matches!(err, Error::TeacherNotFound(77)));
}

#[tokio::test]
async fn delete_assignment_twice_fails() {
  let s = store().await;
  let f = fixture(&s).await;
  let teacher = s
    .add_teacher("Ada".into(), "ada@example.edu".into())
    .await
    .unwrap();

  let a = s
    .create_assignment(f.intro.subject_id, teacher.teacher_id)
    .await
    .unwrap();
  s.delete_assignment(a.assignment_id).await.unwrap();

  let err = s.delete_assignment(a.assignment_id).await.unwrap_err();
  assert!(matches!(err, Error::AssignmentNotFound(id) if id == a.assignment_id));
}

// ─── Editing sessions end to end ─────────────────────────────────────────────

#[tokio::test]
async fn unchanged_batch_commits_nothing() {
  let s = store().await;
  let f = fixture(&s).await;

  let report = commit_subject_edits(
    &s,
    f.course_year_id,
    vec![SubjectEditRequest {
      subject_id: f.intro.subject_id,
      sector_id:  Some(f.first.sector_id),
    }],
    Resolution::Block,
  )
  .await
  .unwrap();

  match report {
    CommitReport::Committed { updated, severed, failures, .. } => {
      assert!(updated.is_empty());
      assert!(severed.is_empty());
      assert!(failures.is_empty());
    }
    CommitReport::Blocked { conflicts } => panic!("blocked: {conflicts:?}"),
  }
}

#[tokio::test]
async fn moving_prerequisite_alongside_dependent_is_blocked() {
  let s = store().await;
  let f = fixture(&s).await;

  let report = commit_subject_edits(
    &s,
    f.course_year_id,
    vec![SubjectEditRequest {
      subject_id: f.intro.subject_id,
      sector_id:  Some(f.second.sector_id),
    }],
    Resolution::Block,
  )
  .await
  .unwrap();

  let CommitReport::Blocked { conflicts } = report else {
    panic!("expected the batch to be blocked");
  };
  assert_eq!(conflicts, vec![Conflict {
    prerequisite_id: f.intro.subject_id,
    dependent_id:    f.advanced.subject_id,
  }]);

  // Nothing was written.
  let intro = s.get_subject(f.intro.subject_id).await.unwrap().unwrap();
  assert_eq!(intro.slot(), Some(slot(2024, 1)));
}

#[tokio::test]
async fn severing_links_commits_the_move() {
  let s = store().await;
  let f = fixture(&s).await;

  let report = commit_subject_edits(
    &s,
    f.course_year_id,
    vec![SubjectEditRequest {
      subject_id: f.intro.subject_id,
      sector_id:  Some(f.second.sector_id),
    }],
    Resolution::SeverLinks,
  )
  .await
  .unwrap();

  let CommitReport::Committed { severed, failures, .. } = report else {
    panic!("expected a commit");
  };
  assert_eq!(severed, vec![f.advanced.subject_id]);
  assert!(failures.is_empty());

  let intro = s.get_subject(f.intro.subject_id).await.unwrap().unwrap();
  assert_eq!(intro.slot(), Some(slot(2024, 2)));
  let advanced = s.get_subject(f.advanced.subject_id).await.unwrap().unwrap();
  assert_eq!(advanced.prerequisite_id, None);
  assert_eq!(advanced.slot(), Some(slot(2024, 2)));
}

#[tokio::test]
async fn assignment_session_round_trip() {
  let s = Arc::new(store().await);
  let f = fixture(&s).await;
  let teacher = s
    .add_teacher("Ada".into(), "ada@example.edu".into())
    .await
    .unwrap();
  s.create_assignment(f.intro.subject_id, teacher.teacher_id)
    .await
    .unwrap();

  let mut session = AssignmentSession::new(Arc::clone(&s), teacher.teacher_id);
  session.open(f.course_year_id).await.unwrap();
  session
    .set_checked(f.course_year_id, f.intro.subject_id, false)
    .unwrap();
  session
    .set_checked(f.course_year_id, f.advanced.subject_id, true)
    .unwrap();

  let report = session.save().await.unwrap();
  assert!(report.is_success());
  assert_eq!(report.created.len(), 1);
  assert_eq!(report.deleted.len(), 1);
  assert!(!session.is_dirty());

  let stored: Vec<_> = s
    .list_assignments(teacher.teacher_id, f.course_year_id)
    .await
    .unwrap()
    .into_iter()
    .map(|a| a.subject_id)
    .collect();
  assert_eq!(stored, vec![f.advanced.subject_id]);

  // A second save has nothing left to do.
  assert!(session.plan().is_empty());
}
