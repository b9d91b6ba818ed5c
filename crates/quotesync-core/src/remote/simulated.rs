//! In-process server used for local runs and tests

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::RemoteSource;
use crate::error::{Error, Result};
use crate::models::Record;

/// When the simulated server should fail a request.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum FaultPlan {
    /// Never fail
    #[default]
    None,
    /// Fail the next `n` requests, then recover
    FailNext(u32),
    /// Fail every `n`th request (1-based)
    FailEvery(u32),
    /// Fail each request with probability `rate`, from a seeded generator
    FailureRate { rate: f64, seed: u64 },
}

#[derive(Debug)]
struct FaultInjector {
    plan: FaultPlan,
    requests: u64,
    remaining: u32,
    rng: Option<StdRng>,
}

impl FaultInjector {
    fn new(plan: FaultPlan) -> Self {
        let remaining = match plan {
            FaultPlan::FailNext(n) => n,
            _ => 0,
        };
        let rng = match plan {
            FaultPlan::FailureRate { seed, .. } => Some(StdRng::seed_from_u64(seed)),
            _ => None,
        };
        Self {
            plan,
            requests: 0,
            remaining,
            rng,
        }
    }

    fn should_fail(&mut self) -> bool {
        self.requests += 1;
        match self.plan {
            FaultPlan::None => false,
            FaultPlan::FailNext(_) => {
                if self.remaining == 0 {
                    false
                } else {
                    self.remaining -= 1;
                    true
                }
            }
            FaultPlan::FailEvery(n) => n != 0 && self.requests % u64::from(n) == 0,
            FaultPlan::FailureRate { rate, .. } => self
                .rng
                .as_mut()
                .is_some_and(|rng| rng.gen_bool(rate.clamp(0.0, 1.0))),
        }
    }
}

/// Server simulated in-process, holding one collection.
pub struct SimulatedServer<P> {
    records: Mutex<Vec<Record<P>>>,
    faults: Mutex<FaultInjector>,
    latency: Option<Duration>,
    fetches: AtomicUsize,
    pushes: AtomicUsize,
}

impl<P: Clone> SimulatedServer<P> {
    pub fn new(records: Vec<Record<P>>) -> Self {
        Self {
            records: Mutex::new(records),
            faults: Mutex::new(FaultInjector::new(FaultPlan::None)),
            latency: None,
            fetches: AtomicUsize::new(0),
            pushes: AtomicUsize::new(0),
        }
    }

    /// Delay every request by `latency`
    #[must_use]
    pub const fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    #[must_use]
    pub fn with_faults(self, plan: FaultPlan) -> Self {
        self.set_faults(plan);
        self
    }

    /// Replace the fault plan, resetting its counters
    pub fn set_faults(&self, plan: FaultPlan) {
        *self.faults.lock() = FaultInjector::new(plan);
    }

    /// Replace the server-side collection (no validation, for test setup)
    pub fn set_records(&self, records: Vec<Record<P>>) {
        *self.records.lock() = records;
    }

    /// Insert or replace a single record by id
    pub fn upsert(&self, record: Record<P>) {
        let mut records = self.records.lock();
        if let Some(existing) = records.iter_mut().find(|r| r.id == record.id) {
            *existing = record;
        } else {
            records.push(record);
        }
    }

    pub fn records(&self) -> Vec<Record<P>> {
        self.records.lock().clone()
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn push_count(&self) -> usize {
        self.pushes.load(Ordering::SeqCst)
    }

    async fn simulate_request(&self, operation: &str) -> Result<()> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        if self.faults.lock().should_fail() {
            tracing::debug!("Simulated server failing {}", operation);
            return Err(Error::Fetch(format!(
                "server temporarily unavailable ({operation})"
            )));
        }
        Ok(())
    }
}

impl<P: Clone> RemoteSource<P> for SimulatedServer<P> {
    async fn fetch_collection(&self) -> Result<Vec<Record<P>>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.simulate_request("fetch").await?;
        Ok(self.records())
    }

    async fn push_collection(&self, records: &[Record<P>]) -> Result<()> {
        self.pushes.fetch_add(1, Ordering::SeqCst);
        self.simulate_request("push").await?;
        self.set_records(records.to_vec());
        Ok(())
    }
}
