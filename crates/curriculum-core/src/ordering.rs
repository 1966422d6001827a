//! Total order over time slots.
//!
//! A slot's key is `year * 100 + rank`, where the rank of the first and
//! second terms is their number and the summer term ranks 3, so summer
//! follows both numbered terms of the same year. Electives have no slot and
//! take [`OrderKey::ELECTIVE`], which sorts after every real slot.
//!
//! The formula only works for two numbered terms plus summer; [`Semester`]
//! cannot represent anything else.

use serde::Serialize;

use crate::curriculum::{Sector, Semester, TimeSlot};

/// Comparable position of a slot. Never persisted.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize,
)]
pub struct OrderKey(u32);

impl OrderKey {
  /// Key for a subject without a time slot.
  pub const ELECTIVE: Self = Self(u32::MAX);

  pub fn is_elective(self) -> bool { self == Self::ELECTIVE }
}

fn rank(semester: Semester) -> u32 {
  match semester {
    Semester::First => 1,
    Semester::Second => 2,
    Semester::Summer => 3,
  }
}

/// The order key of `slot`; `None` means elective.
pub fn order_of(slot: Option<&TimeSlot>) -> OrderKey {
  match slot {
    Some(s) => OrderKey(u32::from(s.year) * 100 + rank(s.semester)),
    None => OrderKey::ELECTIVE,
  }
}

/// Sort sectors chronologically, breaking ties (sectors of different course
/// years sharing a slot) by id.
pub fn sort_sectors(sectors: &mut [Sector]) {
  sectors.sort_by_key(|s| (order_of(Some(&s.slot)), s.sector_id));
}
