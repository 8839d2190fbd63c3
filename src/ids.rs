//! Uniqueness tokens for generated record ids.
//!
//! Ids only need to be unique, never meaningful, so the source is injected:
//! the server uses a clock-seeded counter, tests use a fixed sequence.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

pub trait IdSource: Send + Sync {
  /// A token strictly larger than every token previously returned.
  fn next_token(&self) -> u64;
}

/// Counter seeded from wall-clock milliseconds, so tokens stay unique across restarts.
pub struct MonotonicIds {
  next: AtomicU64,
}

impl MonotonicIds {
  pub fn new() -> Self {
    let millis = SystemTime::now()
      .duration_since(UNIX_EPOCH)
      .map(|d| d.as_millis() as u64)
      .unwrap_or(0);
    Self { next: AtomicU64::new(millis) }
  }
}

impl Default for MonotonicIds {
  fn default() -> Self { Self::new() }
}

impl IdSource for MonotonicIds {
  fn next_token(&self) -> u64 {
    self.next.fetch_add(1, Ordering::Relaxed)
  }
}

/// Deterministic counter starting at a chosen value.
#[allow(dead_code)]
pub struct SequentialIds {
  next: AtomicU64,
}

#[allow(dead_code)]
impl SequentialIds {
  pub fn starting_at(start: u64) -> Self {
    Self { next: AtomicU64::new(start) }
  }
}

impl IdSource for SequentialIds {
  fn next_token(&self) -> u64 {
    self.next.fetch_add(1, Ordering::Relaxed)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn sequential_ids_count_up() {
    let ids = SequentialIds::starting_at(7);
    assert_eq!(ids.next_token(), 7);
    assert_eq!(ids.next_token(), 8);
  }

  #[test]
  fn monotonic_ids_strictly_increase() {
    let ids = MonotonicIds::new();
    let a = ids.next_token();
    let b = ids.next_token();
    assert!(b > a);
  }
}
