use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use storydag::exec::{RegenerateFuture, Regenerator};
use storydag::types::Metadata;

/// A fake regenerator that:
/// - records which nodes were "regenerated", in call order
/// - fails nodes configured as failing (always, or a fixed number of times)
/// - optionally sleeps to simulate slow generation
/// - tracks the highest number of concurrent calls it observed.
#[derive(Default)]
pub struct FakeRegenerator {
    calls: Arc<Mutex<Vec<String>>>,
    fail_always: HashSet<String>,
    fail_times: Mutex<HashMap<String, u32>>,
    delay: Duration,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl FakeRegenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(mut self, node_id: &str) -> Self {
        self.fail_always.insert(node_id.to_string());
        self
    }

    /// Fail the first `times` calls for `node_id`, then succeed.
    pub fn failing_times(self, node_id: &str, times: u32) -> Self {
        self.fail_times
            .lock()
            .unwrap()
            .insert(node_id.to_string(), times);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self, node_id: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| *c == node_id)
            .count()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn should_fail(&self, node_id: &str) -> bool {
        if self.fail_always.contains(node_id) {
            return true;
        }
        let mut remaining = self.fail_times.lock().unwrap();
        match remaining.get_mut(node_id) {
            Some(n) if *n > 0 => {
                *n -= 1;
                true
            }
            _ => false,
        }
    }
}

impl Regenerator for FakeRegenerator {
    fn regenerate<'a>(&'a self, node_id: &'a str, _metadata: &'a Metadata) -> RegenerateFuture<'a> {
        Box::pin(async move {
            self.calls.lock().unwrap().push(node_id.to_string());

            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);

            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }

            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(!self.should_fail(node_id))
        })
    }
}
