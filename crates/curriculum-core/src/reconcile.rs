//! Association reconciliation: persisted state → minimal create/delete plan.
//!
//! Associations are grouped by a partition key (the course year, for
//! teaching assignments) and each partition is diffed on its own. The plan
//! is only a plan: executing it, and re-reading storage afterwards, is the
//! caller's job.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

/// Desired and persisted associations for one partition.
///
/// `persisted` maps the associated entity id (e.g. a subject) to the id of
/// the association row linking it (e.g. the teaching assignment).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionState<T, A> {
  pub desired:   BTreeSet<T>,
  pub persisted: BTreeMap<T, A>,
}

impl<T, A> Default for PartitionState<T, A> {
  fn default() -> Self {
    Self { desired: BTreeSet::new(), persisted: BTreeMap::new() }
  }
}

/// Create an association to `target` within `partition`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Create<K, T> {
  pub partition: K,
  pub target:    T,
}

/// Delete the association row `assignment`, which lives in `partition`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Delete<K, A> {
  pub partition:  K,
  pub assignment: A,
}

/// The operations that move every partition from persisted to desired.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReconcilePlan<K, T, A> {
  pub creates: Vec<Create<K, T>>,
  pub deletes: Vec<Delete<K, A>>,
}

impl<K, T, A> ReconcilePlan<K, T, A> {
  pub fn is_empty(&self) -> bool {
    self.creates.is_empty() && self.deletes.is_empty()
  }

  /// Total number of operations.
  pub fn len(&self) -> usize { self.creates.len() + self.deletes.len() }

  /// Target ids to create, in plan order.
  pub fn create_targets(&self) -> impl Iterator<Item = &T> {
    self.creates.iter().map(|c| &c.target)
  }

  /// Association ids to delete, in plan order.
  pub fn delete_assignments(&self) -> impl Iterator<Item = &A> {
    self.deletes.iter().map(|d| &d.assignment)
  }
}

/// Diff every partition independently.
///
/// A target appearing in `desired` of several partitions while persisted in
/// none of them is only created once, in the first partition (by key order)
/// that asks for it. Likewise an association id is only deleted once.
pub fn reconcile<K, T, A>(
  partitions: &BTreeMap<K, PartitionState<T, A>>,
) -> ReconcilePlan<K, T, A>
where
  K: Ord + Clone,
  T: Ord + Clone,
  A: Ord + Clone,
{
  let mut creates = Vec::new();
  let mut deletes = Vec::new();
  let mut created: BTreeSet<&T> = BTreeSet::new();
  let mut deleted: BTreeSet<&A> = BTreeSet::new();

  for (key, state) in partitions {
    for target in &state.desired {
      if !state.persisted.contains_key(target) && created.insert(target) {
        creates.push(Create { partition: key.clone(), target: target.clone() });
      }
    }

    for (target, assignment) in &state.persisted {
      if !state.desired.contains(target) && deleted.insert(assignment) {
        deletes.push(Delete {
          partition:  key.clone(),
          assignment: assignment.clone(),
        });
      }
    }
  }

  ReconcilePlan { creates, deletes }
}
