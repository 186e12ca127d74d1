//! Bounded counter-suffix naming.

use crate::{Error, Result};

/// How many suffixed candidates are tried before giving up.
pub const MAX_NAME_ATTEMPTS: u32 = 1000;

/// Return `base` if free, otherwise the first free `base_1`, `base_2`, ….
///
/// `is_taken` is consulted for every candidate. Running out of attempts is
/// reported as [`Error::NamesExhausted`], which callers should treat as a bug
/// rather than a normal outcome.
pub fn unique_name(base: &str, mut is_taken: impl FnMut(&str) -> bool) -> Result<String> {
  if !is_taken(base) {
    return Ok(base.to_owned());
  }
  for n in 1..=MAX_NAME_ATTEMPTS {
    let candidate = format!("{base}_{n}");
    if !is_taken(&candidate) {
      return Ok(candidate);
    }
  }
  Err(Error::NamesExhausted { base: base.to_owned(), attempts: MAX_NAME_ATTEMPTS })
}

#[cfg(test)]
mod tests {
  use std::collections::HashSet;

  use super::*;

  #[test]
  fn free_base_is_kept() {
    assert_eq!(unique_name("orders", |_| false).unwrap(), "orders");
  }

  #[test]
  fn first_free_suffix_wins() {
    let taken: HashSet<&str> = ["orders", "orders_1", "orders_3"].into();
    assert_eq!(unique_name("orders", |n| taken.contains(n)).unwrap(), "orders_2");
  }

  #[test]
  fn exhaustion_is_an_operation_failure() {
    let err = unique_name("t", |_| true).unwrap_err();
    assert!(matches!(err, Error::NamesExhausted { attempts: MAX_NAME_ATTEMPTS, .. }));
    assert_eq!(err.kind(), crate::ErrorKind::OperationFailed);
  }
}
