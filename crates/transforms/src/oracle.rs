//! Background producers of arithmetic predicates with a known outcome.
//!
//! Two tokio tasks generate random comparisons such as `12 * 7 - 3 > 400 / 8 + 1`,
//! fold them with the core constant evaluator and keep only those with a definite
//! answer. Verified predicates are queued in two bounded channels, one per answer.
//! The walker pulls from them synchronously and blocks while a queue is empty.

use crate::{Error, Result};
use murk_core::arith::{compare, evaluate_comparison};
use murk_core::parser::parse_expression;
use murk_core::Seed;
use rand::{rngs::StdRng, Rng};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, trace};

/// Capacity of each predicate queue.
pub const QUEUE_CAPACITY: usize = 10;

const OPERATORS: [&str; 4] = ["+", "-", "*", "/"];

/// Relative distance under which two sides are treated as equal.
const TIE_TOLERANCE: f64 = 1e-6;

/// Handle to the two predicate queues and their producers.
#[derive(Debug)]
pub struct Oracle {
    truths: mpsc::Receiver<String>,
    falsehoods: mpsc::Receiver<String>,
    shutdown: watch::Sender<bool>,
    producers: Vec<JoinHandle<()>>,
}

impl Oracle {
    /// Starts both producers. Must be called from within a tokio runtime.
    pub fn spawn(seed: &Seed) -> Self {
        let (shutdown, _) = watch::channel(false);
        let (true_tx, truths) = mpsc::channel(QUEUE_CAPACITY);
        let (false_tx, falsehoods) = mpsc::channel(QUEUE_CAPACITY);

        let producers = vec![
            tokio::spawn(produce(
                seed.stream_rng("oracle-true"),
                true,
                true_tx,
                shutdown.subscribe(),
            )),
            tokio::spawn(produce(
                seed.stream_rng("oracle-false"),
                false,
                false_tx,
                shutdown.subscribe(),
            )),
        ];
        debug!("condition oracle started");

        Self {
            truths,
            falsehoods,
            shutdown,
            producers,
        }
    }

    /// Next predicate that evaluates to true. Blocks while the queue is empty.
    ///
    /// Must not be called from an async context.
    pub fn next_true(&mut self) -> Result<String> {
        self.truths.blocking_recv().ok_or(Error::OracleExhausted)
    }

    /// Next predicate that evaluates to false. Blocks while the queue is empty.
    pub fn next_false(&mut self) -> Result<String> {
        self.falsehoods.blocking_recv().ok_or(Error::OracleExhausted)
    }

    /// Async counterpart of [`Oracle::next_true`].
    pub async fn recv_true(&mut self) -> Result<String> {
        self.truths.recv().await.ok_or(Error::OracleExhausted)
    }

    /// Async counterpart of [`Oracle::next_false`].
    pub async fn recv_false(&mut self) -> Result<String> {
        self.falsehoods.recv().await.ok_or(Error::OracleExhausted)
    }

    /// Stops both producers after their current iteration. Already queued
    /// predicates can still be read.
    pub fn shutdown(&self) {
        // Both receivers may already be gone; that is fine.
        let _ = self.shutdown.send(true);
    }

    /// True once both producer tasks have returned.
    pub fn is_stopped(&self) -> bool {
        self.producers.iter().all(JoinHandle::is_finished)
    }
}

impl Drop for Oracle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

async fn produce(
    mut rng: StdRng,
    wanted: bool,
    tx: mpsc::Sender<String>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut discarded = 0usize;
    loop {
        if *shutdown.borrow() {
            break;
        }
        let candidate = random_predicate(&mut rng);
        match classify(&candidate) {
            Some(outcome) if outcome == wanted => {}
            Some(_) => continue,
            None => {
                discarded += 1;
                trace!(candidate = %candidate, "discarding non-definite predicate");
                continue;
            }
        }

        tokio::select! {
            _ = shutdown.changed() => break,
            permit = tx.reserve() => match permit {
                Ok(permit) => permit.send(candidate),
                // Receiver dropped.
                Err(_) => break,
            },
        }
    }
    debug!(wanted, discarded, "predicate producer stopped");
}

/// A random comparison between two arithmetic chains.
pub fn random_predicate(rng: &mut StdRng) -> String {
    let left_len = rng.random_range(2..7);
    let left = random_arithmetic(rng, left_len);
    let right_len = rng.random_range(2..7);
    let right = random_arithmetic(rng, right_len);
    let op = if rng.random_bool(0.5) { ">" } else { "<" };
    format!("{left} {op} {right}")
}

/// `len` integers in [1, 1000] joined by random arithmetic operators.
fn random_arithmetic(rng: &mut StdRng, len: usize) -> String {
    let mut text = String::new();
    for index in 0..len {
        if index > 0 {
            text.push(' ');
            text.push_str(OPERATORS[rng.random_range(0..OPERATORS.len())]);
            text.push(' ');
        }
        text.push_str(&rng.random_range(1..=1000).to_string());
    }
    text
}

/// The definite outcome of a predicate, or `None` when it cannot be evaluated
/// or its two sides are too close for the answer to be trusted.
pub fn classify(predicate: &str) -> Option<bool> {
    let expr = parse_expression(predicate).ok()?;
    let (op, left, right) = evaluate_comparison(&expr).ok()?;
    if !left.is_finite() || !right.is_finite() {
        return None;
    }
    let scale = 1f64.max(left.abs()).max(right.abs());
    if (left - right).abs() < TIE_TOLERANCE * scale {
        return None;
    }
    compare(op, left, right).ok()
}
