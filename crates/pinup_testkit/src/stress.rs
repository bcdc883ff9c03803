//! Stress tests for the vault.
//!
//! These helpers drive the vault under heavy and concurrent load and report
//! throughput plus failure counts.

use pinup_core::{AdmissionControl, NewSnippet, SearchOptions, SnippetPatch, Vault};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Result of a stress test run.
#[derive(Debug, Clone)]
pub struct StressTestResult {
    /// Total operations performed.
    pub total_ops: usize,
    /// Successful operations.
    pub successful_ops: usize,
    /// Failed operations.
    pub failed_ops: usize,
    /// Total duration.
    pub duration: Duration,
    /// Operations per second.
    pub ops_per_second: f64,
}

impl StressTestResult {
    /// Creates a new result.
    pub fn new(successful: usize, failed: usize, duration: Duration) -> Self {
        let total = successful + failed;
        let ops_per_second = if duration.as_secs_f64() > 0.0 {
            total as f64 / duration.as_secs_f64()
        } else {
            0.0
        };

        Self {
            total_ops: total,
            successful_ops: successful,
            failed_ops: failed,
            duration,
            ops_per_second,
        }
    }

    /// Prints a summary of the test.
    pub fn print_summary(&self, name: &str) {
        println!("\n=== {} ===", name);
        println!("Total operations: {}", self.total_ops);
        println!("Successful: {}", self.successful_ops);
        println!("Failed: {}", self.failed_ops);
        println!("Duration: {:?}", self.duration);
        println!("Throughput: {:.2} ops/sec", self.ops_per_second);
    }
}

/// Configuration for stress tests.
#[derive(Debug, Clone)]
pub struct StressConfig {
    /// Number of operations to perform.
    pub operations: usize,
    /// Number of concurrent threads (for concurrent tests).
    pub threads: usize,
    /// Words per snippet body.
    pub body_words: usize,
    /// Distinct tags cycled through.
    pub tag_count: usize,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            operations: 1_000,
            threads: 4,
            body_words: 16,
            tag_count: 8,
        }
    }
}

fn body(i: usize, words: usize) -> String {
    (0..words.max(1))
        .map(|w| format!("w{}x{}", i % 97, w))
        .collect::<Vec<_>>()
        .join(" ")
        + &format!(" unique{i}")
}

fn tally(result: bool, successful: &AtomicUsize, failed: &AtomicUsize) {
    if result {
        successful.fetch_add(1, Ordering::Relaxed);
    } else {
        failed.fetch_add(1, Ordering::Relaxed);
    }
}

/// Sequential snippet creation.
pub fn stress_sequential_creates(vault: &Vault, config: &StressConfig) -> StressTestResult {
    let start = Instant::now();
    let mut successful = 0usize;
    let mut failed = 0usize;

    for i in 0..config.operations {
        let input = NewSnippet::new(body(i, config.body_words))
            .tag(format!("t{}", i % config.tag_count.max(1)));
        match vault.create_snippet(input) {
            Ok(_) => successful += 1,
            Err(_) => failed += 1,
        }
    }

    StressTestResult::new(successful, failed, start.elapsed())
}

/// Mixed create/update/search/delete from one thread.
pub fn stress_mixed_operations(vault: &Vault, config: &StressConfig) -> StressTestResult {
    let start = Instant::now();
    let mut successful = 0usize;
    let mut failed = 0usize;
    let mut live: Vec<String> = Vec::new();

    for i in 0..config.operations {
        let ok = match (i % 4, live.is_empty()) {
            (0, _) | (_, true) => match vault.create_snippet(NewSnippet::new(body(i, config.body_words))) {
                Ok(s) => {
                    live.push(s.id);
                    true
                }
                Err(_) => false,
            },
            (1, false) => {
                let id = &live[i % live.len()];
                let patch = SnippetPatch {
                    body: Some(body(i + 1, config.body_words)),
                    ..SnippetPatch::default()
                };
                vault.update_snippet(id, patch).is_ok()
            }
            (2, false) => vault
                .search(&format!("unique{}", i - 2), &SearchOptions::default())
                .is_ok(),
            _ => {
                let id = live.swap_remove(i % live.len());
                vault.delete_snippet(&id).is_ok()
            }
        };
        if ok {
            successful += 1;
        } else {
            failed += 1;
        }
    }

    StressTestResult::new(successful, failed, start.elapsed())
}

/// Writers and searchers running at the same time.
///
/// Half the threads create snippets, half search. Every operation is
/// expected to succeed: writers serialize on the store, readers never block
/// on them.
pub fn stress_concurrent_write_search(vault: Arc<Vault>, config: &StressConfig) -> StressTestResult {
    let successful = Arc::new(AtomicUsize::new(0));
    let failed = Arc::new(AtomicUsize::new(0));
    let threads = config.threads.max(2);
    let ops_per_thread = config.operations / threads;

    let start = Instant::now();

    let handles: Vec<_> = (0..threads)
        .map(|t| {
            let vault = Arc::clone(&vault);
            let successful = Arc::clone(&successful);
            let failed = Arc::clone(&failed);
            let words = config.body_words;

            thread::spawn(move || {
                for i in 0..ops_per_thread {
                    let ok = if t % 2 == 0 {
                        let n = t * ops_per_thread + i;
                        vault.create_snippet(NewSnippet::new(body(n, words))).is_ok()
                    } else {
                        vault
                            .search(&format!("w{}x0", i % 97), &SearchOptions::default())
                            .is_ok()
                    };
                    tally(ok, &successful, &failed);
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("Thread panicked");
    }

    StressTestResult::new(
        successful.load(Ordering::Relaxed),
        failed.load(Ordering::Relaxed),
        start.elapsed(),
    )
}

/// Hammers one admission key from many threads.
///
/// `successful_ops` is the number admitted, `failed_ops` the number
/// rejected.
pub fn stress_admission(control: Arc<AdmissionControl>, key: &str, config: &StressConfig) -> StressTestResult {
    let admitted = Arc::new(AtomicUsize::new(0));
    let rejected = Arc::new(AtomicUsize::new(0));
    let ops_per_thread = config.operations / config.threads.max(1);

    let start = Instant::now();
    let handles: Vec<_> = (0..config.threads.max(1))
        .map(|_| {
            let control = Arc::clone(&control);
            let admitted = Arc::clone(&admitted);
            let rejected = Arc::clone(&rejected);
            let key = key.to_string();
            thread::spawn(move || {
                for _ in 0..ops_per_thread {
                    tally(control.admit(&key).is_ok(), &admitted, &rejected);
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("Thread panicked");
    }

    StressTestResult::new(
        admitted.load(Ordering::Relaxed),
        rejected.load(Ordering::Relaxed),
        start.elapsed(),
    )
}
