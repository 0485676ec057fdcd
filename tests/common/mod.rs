// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2025 Daniel Negri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Deadlock detection shared by the concurrency test binaries.
//!
//! parking_lot's detector only sees parking_lot locks: the per-book
//! `Mutex` and the manual clock. DashMap's shard `RwLock`s are its own and
//! are not covered; a cycle through them shows up as a hung test instead.

#![allow(dead_code)]

use parking_lot::deadlock;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Background thread polling parking_lot for lock cycles.
pub struct DeadlockDetector {
    running: Arc<AtomicBool>,
    handle: JoinHandle<Result<(), String>>,
}

impl DeadlockDetector {
    pub fn start() -> Self {
        let running = Arc::new(AtomicBool::new(true));
        let running_clone = running.clone();

        let handle = thread::spawn(move || {
            while running_clone.load(Ordering::SeqCst) {
                thread::sleep(Duration::from_millis(100));
                let deadlocks = deadlock::check_deadlock();
                if !deadlocks.is_empty() {
                    let mut report = String::from("=== DEADLOCK DETECTED ===\n");
                    for (i, threads) in deadlocks.iter().enumerate() {
                        report.push_str(&format!("\nDeadlock #{}\n", i + 1));
                        for t in threads {
                            report.push_str(&format!("Thread ID: {:?}\n", t.thread_id()));
                            report.push_str(&format!("Backtrace:\n{:#?}\n", t.backtrace()));
                        }
                    }
                    return Err(report);
                }
            }
            Ok(())
        });

        Self { running, handle }
    }

    /// Stops polling and returns what the detector saw.
    pub fn finish(self) -> Result<(), String> {
        self.running.store(false, Ordering::SeqCst);
        match self.handle.join() {
            Ok(result) => result,
            Err(_) => Err("deadlock detector thread panicked".to_owned()),
        }
    }
}

/// Starts a background thread that checks for deadlocks.
pub fn start_deadlock_detector() -> DeadlockDetector {
    DeadlockDetector::start()
}

/// Stops the detector, failing the calling test if it found a deadlock.
pub fn stop_deadlock_detector(detector: DeadlockDetector) {
    if let Err(report) = detector.finish() {
        panic!("{report}");
    }
}
