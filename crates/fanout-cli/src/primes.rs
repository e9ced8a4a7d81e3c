//! `fanout primes`: primality testing across the worker pool.
//!
//! Generates random integers, tests each one on a [`BlockingWorker`], and
//! collects the primes through `on_process`. With `--transfer` the values
//! travel as 8-byte big-endian buffers so the run exercises transfer mode.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use bytes::Bytes;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use stupid_fanout::{
    AbortController, BlockingWorker, PoolSettings, ProcessorBuilder, Read, RunState, RunSummary,
};
use tracing::info;

/// What a worker reports for one number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PrimeTestResult {
    pub number: u64,
    pub is_prime: bool,
}

/// Outcome of a `fanout primes` run.
#[derive(Debug, Serialize)]
pub struct PrimeReport {
    pub run_id: String,
    pub state: RunState,
    pub workers: usize,
    pub tested: usize,
    pub untested: usize,
    pub primes: Vec<u64>,
}

/// Witnesses that make Miller-Rabin deterministic for every `u64`.
const WITNESSES: [u64; 12] = [2, 3, 5, 7, 11, 13, 17, 19, 23, 29, 31, 37];

/// Deterministic Miller-Rabin over the full `u64` range.
pub fn is_prime(value: u64) -> bool {
    if value < 2 {
        return false;
    }
    for p in WITNESSES {
        if value % p == 0 {
            return value == p;
        }
    }

    let mut d = value - 1;
    let mut s = 0;
    while d % 2 == 0 {
        d /= 2;
        s += 1;
    }

    'witness: for a in WITNESSES {
        let mut x = pow_mod(a, d, value);
        if x == 1 || x == value - 1 {
            continue;
        }
        for _ in 1..s {
            x = mul_mod(x, x, value);
            if x == value - 1 {
                continue 'witness;
            }
        }
        return false;
    }
    true
}

fn mul_mod(a: u64, b: u64, m: u64) -> u64 {
    ((a as u128 * b as u128) % m as u128) as u64
}

fn pow_mod(mut base: u64, mut exp: u64, m: u64) -> u64 {
    let mut acc = 1;
    base %= m;
    while exp > 0 {
        if exp & 1 == 1 {
            acc = mul_mod(acc, base, m);
        }
        base = mul_mod(base, base, m);
        exp >>= 1;
    }
    acc
}

fn test_number(number: u64) -> PrimeTestResult {
    PrimeTestResult {
        number,
        is_prime: is_prime(number),
    }
}

fn test_buffer(buffer: Bytes) -> PrimeTestResult {
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&buffer[..8]);
    test_number(u64::from_be_bytes(raw))
}

/// `count` integers in `[0, max_value)`, reproducible when `seed` is set.
pub fn generate_values(count: usize, max_value: u64, seed: Option<u64>) -> Vec<u64> {
    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    (0..count).map(|_| rng.gen_range(0..max_value.max(1))).collect()
}

/// Everything `run` needs, already resolved from args, env and config.
pub struct PrimesJob {
    pub values: Vec<u64>,
    pub pool: PoolSettings,
    pub cancel_after: Option<usize>,
    pub transfer: bool,
}

/// Run the primality test, aborting through `controller` if asked to.
pub async fn run(job: PrimesJob, controller: AbortController) -> Result<PrimeReport> {
    let primes = Arc::new(Mutex::new(Vec::new()));
    let received = Arc::new(AtomicUsize::new(0));

    let on_process = {
        let primes = Arc::clone(&primes);
        let received = Arc::clone(&received);
        let controller = controller.clone();
        let cancel_after = job.cancel_after;
        move |result: PrimeTestResult| {
            if result.is_prime {
                if let Ok(mut primes) = primes.lock() {
                    primes.push(result.number);
                }
            }
            let seen = received.fetch_add(1, Ordering::Relaxed) + 1;
            if cancel_after.is_some_and(|limit| seen >= limit) {
                controller.abort();
            }
        }
    };

    let summary = if job.transfer {
        let test = Arc::new(test_buffer);
        ProcessorBuilder::with_reader(
            move |_| BlockingWorker::shared(Arc::clone(&test)),
            |number: u64| Read::ready(Bytes::copy_from_slice(&number.to_be_bytes())),
        )
        .transfer(true)
        .values(job.values)
        .settings(job.pool)
        .signal(controller.signal())
        .on_process(on_process)
        .build()?
        .run()
        .await
        .context("prime test failed")?
    } else {
        ProcessorBuilder::new(|_| BlockingWorker::new(test_number))
            .values(job.values)
            .settings(job.pool)
            .signal(controller.signal())
            .on_process(on_process)
            .build()?
            .run()
            .await
            .context("prime test failed")?
    };

    let mut primes = primes
        .lock()
        .map(|p| p.clone())
        .unwrap_or_default();
    primes.sort_unstable();

    info!(primes = primes.len(), tested = summary.processed, "prime test finished");
    Ok(report(summary, primes))
}

fn report(summary: RunSummary<u64>, primes: Vec<u64>) -> PrimeReport {
    PrimeReport {
        run_id: summary.run_id.to_string(),
        state: summary.state,
        workers: summary.workers,
        tested: summary.processed,
        untested: summary.remaining.len(),
        primes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_primes() {
        let primes: Vec<u64> = (0..30).filter(|n| is_prime(*n)).collect();
        assert_eq!(primes, vec![2, 3, 5, 7, 11, 13, 17, 19, 23, 29]);
    }

    #[test]
    fn large_values() {
        assert!(is_prime(1_000_000_007));
        assert!(!is_prime(1_000_000_007 * 3));
        assert!(is_prime(2_147_483_647));
    }

    #[test]
    fn values_near_u64_max_do_not_overflow() {
        assert!(is_prime(18_446_744_073_709_551_557));
        assert!(!is_prime(u64::MAX));
        assert!(!is_prime(4_294_967_291 * 4_294_967_279));
    }

    #[test]
    fn strong_pseudoprimes_are_rejected() {
        // Composite, but passes a base-2 strong probable-prime test.
        assert!(!is_prime(3_215_031_751));
        assert!(!is_prime(561));
    }

    #[test]
    fn buffers_round_trip_the_number() {
        let result = test_buffer(Bytes::copy_from_slice(&97u64.to_be_bytes()));
        assert_eq!(result, PrimeTestResult { number: 97, is_prime: true });
    }

    #[test]
    fn seeded_generation_is_reproducible() {
        let a = generate_values(50, 1_000, Some(7));
        let b = generate_values(50, 1_000, Some(7));
        assert_eq!(a, b);
        assert!(a.iter().all(|v| *v < 1_000));
    }

    fn job(values: Vec<u64>, transfer: bool) -> PrimesJob {
        PrimesJob {
            values,
            pool: PoolSettings {
                concurrency: Some(2),
                ..Default::default()
            },
            cancel_after: None,
            transfer,
        }
    }

    #[tokio::test]
    async fn collects_primes() {
        let report = run(job((0..50).collect(), false), AbortController::new())
            .await
            .unwrap();
        assert_eq!(report.state, RunState::Completed);
        assert_eq!(report.tested, 50);
        assert_eq!(report.primes, vec![2, 3, 5, 7, 11, 13, 17, 19, 23, 29, 31, 37, 41, 43, 47]);
    }

    #[tokio::test]
    async fn transfer_mode_gives_the_same_answer() {
        let report = run(job((0..50).collect(), true), AbortController::new())
            .await
            .unwrap();
        assert_eq!(report.tested, 50);
        assert_eq!(report.primes.len(), 15);
    }

    #[tokio::test]
    async fn cancel_after_stops_early() {
        let mut job = job((0..200).collect(), false);
        job.pool.concurrency = Some(1);
        job.cancel_after = Some(5);

        let report = run(job, AbortController::new()).await.unwrap();
        assert_eq!(report.state, RunState::Cancelled);
        assert_eq!(report.tested, 5);
        assert_eq!(report.untested, 195);
    }
}
