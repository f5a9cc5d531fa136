//! Round-robin load balancing strategy.
//!
//! Weights are expanded once at construction into a smooth weighted schedule
//! (each slot picks the target with the highest running credit), so selection at
//! request time is a single atomic increment. Equal weights give plain rotation.
//! Weights are divided by their gcd first, so the schedule is as short as the
//! ratio allows.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::load_balancer::{target::ProxyTarget, LoadBalancer};

/// Round-robin selector.
#[derive(Debug)]
pub struct RoundRobin {
    counter: AtomicUsize,
    schedule: Vec<usize>,
}

impl RoundRobin {
    /// Build the schedule for targets with the given weights.
    pub fn new(weights: &[u32]) -> Self {
        Self {
            counter: AtomicUsize::new(0),
            schedule: smooth_schedule(weights),
        }
    }
}

fn smooth_schedule(weights: &[u32]) -> Vec<usize> {
    let weights: Vec<u32> = weights.iter().map(|w| (*w).max(1)).collect();
    let divisor = weights.iter().copied().fold(0, gcd).max(1);
    let weights: Vec<i64> = weights.iter().map(|w| i64::from(w / divisor)).collect();
    let total: i64 = weights.iter().sum();
    let mut credit = vec![0i64; weights.len()];
    let mut schedule = Vec::with_capacity(total as usize);

    for _ in 0..total {
        for (c, w) in credit.iter_mut().zip(&weights) {
            *c += w;
        }
        let mut best = 0;
        for i in 1..credit.len() {
            if credit[i] > credit[best] {
                best = i;
            }
        }
        credit[best] -= total;
        schedule.push(best);
    }
    schedule
}

fn gcd(a: u32, b: u32) -> u32 {
    if b == 0 {
        a
    } else {
        gcd(b, a % b)
    }
}

impl LoadBalancer for RoundRobin {
    fn next_target(&self, targets: &[Arc<ProxyTarget>]) -> Option<Arc<ProxyTarget>> {
        if targets.is_empty() || self.schedule.is_empty() {
            return None;
        }
        let slot = self.counter.fetch_add(1, Ordering::Relaxed) % self.schedule.len();
        targets.get(self.schedule[slot]).cloned()
    }
}
