// tests/common/mod.rs
#![allow(dead_code)] // Allow unused code in this common test module

use std::sync::atomic::AtomicUsize;
use std::sync::Arc;
use tracing::Level;

// --- Common Sources ---

/// The terminal-operation walkthrough source: reduce(+) = 31, min = 2,
/// any(>3) = true.
pub fn terminal_numbers() -> Vec<i32> {
  vec![2, 4, 5, 6, 8, 6]
}

/// The stage-chain walkthrough source: filter(>=3), negate, sort.
pub fn chain_numbers() -> Vec<i32> {
  vec![2, 1, 4, 7, 5]
}

pub fn nested_words() -> Vec<Vec<&'static str>> {
  vec![vec!["I", "Love", "Java"], vec!["Concepts", "are", "fun"]]
}

/// Normalizes a result for membership-only comparisons: parallel chunk
/// emission order is unspecified, so tests compare multisets, never the
/// observed order.
pub fn multiset(mut items: Vec<i32>) -> Vec<i32> {
  items.sort_unstable();
  items
}

/// A shared counter handed to peek taps, to observe how many elements
/// actually flowed through a point in the chain.
pub fn shared_counter() -> Arc<AtomicUsize> {
  Arc::new(AtomicUsize::new(0))
}

// --- Helper for Tracing Setup (call once per test run if needed) ---
use once_cell::sync::Lazy;
static TRACING_INIT: Lazy<()> = Lazy::new(|| {
  tracing_subscriber::fmt()
    .with_max_level(Level::DEBUG)
    .with_test_writer() // Important for tests to capture output
    .try_init()
    .ok(); // Allow multiple initializations in tests (ok if fails)
});

pub fn setup_tracing() {
  Lazy::force(&TRACING_INIT);
}
