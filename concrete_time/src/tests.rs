// Copyright 2024 Pants project contributors (see CONTRIBUTORS.md).
// Licensed under the Apache License, Version 2.0 (see LICENSE).
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::ModTime;

#[test]
fn convert_from_system_time_truncates() {
    let time = UNIX_EPOCH + Duration::new(3, 141_592_653);
    let concrete: ModTime = time.into();
    assert_eq!(concrete, ModTime::new(3));
}

#[test]
fn convert_into_system_time() {
    let concrete = ModTime::new(1_722_470_400);
    let time: SystemTime = concrete.into();
    assert_eq!(time, UNIX_EPOCH + Duration::from_secs(1_722_470_400));
}

#[test]
fn before_the_epoch_is_zero() {
    let time = UNIX_EPOCH - Duration::from_secs(42);
    assert_eq!(ModTime::from(time), ModTime::new(0));
}

#[test]
fn equal_in_whole_seconds() {
    // Sub-second differences must not make two ModTimes unequal.
    let a = UNIX_EPOCH + Duration::new(100, 1);
    let b = UNIX_EPOCH + Duration::new(100, 999_999_999);
    assert_eq!(ModTime::from(a), ModTime::from(b));
    assert!(ModTime::from(a) < ModTime::new(101));
}
