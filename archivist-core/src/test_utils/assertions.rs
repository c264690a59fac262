//! Assertions with descriptive failure messages

use crate::core_event::{Event, EventKind};
use crate::error::{Error, Result};
use std::fmt::Debug;

/// Assert that a Result is Ok and return the value
pub fn assert_ok<T>(result: Result<T>) -> T {
    match result {
        Ok(value) => value,
        Err(e) => panic!("Expected Ok, got Err: {:?}", e),
    }
}

/// Assert that the operation was refused for lack of permission
pub fn assert_denied<T: Debug>(result: Result<T>) {
    match result {
        Err(Error::AuthorizationDenied(_)) => {}
        other => panic!("Expected AuthorizationDenied, got {:?}", other),
    }
}

/// Assert that an event of `kind` carrying `detail` was recorded
pub fn assert_event_with_detail(events: &[Event], kind: EventKind, detail: &str) {
    if !events
        .iter()
        .any(|e| e.kind() == kind && e.detail() == Some(detail))
    {
        panic!(
            "Expected a {} event with detail {:?}. Events: {:?}",
            kind, detail, events
        );
    }
}

/// Assert that two collections have the same elements (order doesn't matter)
pub fn assert_same_elements<T: PartialEq + Debug>(a: &[T], b: &[T]) {
    assert_eq!(
        a.len(),
        b.len(),
        "Collections have different lengths: {:?} vs {:?}",
        a,
        b
    );
    for item in a {
        assert!(b.contains(item), "Element {:?} missing from {:?}", item, b);
    }
}
