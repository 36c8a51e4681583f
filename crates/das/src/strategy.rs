//! Reader-selection strategies for the retrieval path.
//!
//! A strategy produces one [`StrategyInstance`] per retrieval. The instance
//! is a fixed plan of reader batches computed from a snapshot of the reader
//! list and statistics; later updates never affect a plan in progress.

use crate::config::{RestfulClientAggregatorConfig, SIMPLE_EXPLORE_EXPLOIT_STRATEGY, TESTING_SEQUENTIAL_STRATEGY};
use crate::reader_stats::{ReaderId, ReaderStats};
use das_schema::{DasError, DataAvailabilityReader, Result};
use parking_lot::RwLock;
use rand::seq::SliceRandom;
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

/// A reader together with the id its statistics are recorded under.
#[derive(Clone)]
pub struct TrackedReader {
    pub id: ReaderId,
    pub reader: Arc<dyn DataAvailabilityReader>,
}

impl fmt::Debug for TrackedReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TrackedReader{{id:{}, reader:{}}}", self.id, self.reader)
    }
}

/// Produces per-retrieval reader plans.
pub trait AggregatorStrategy: Send + Sync + fmt::Debug {
    fn new_instance(&self) -> StrategyInstance;

    /// Replace the reader list and statistics future plans are built from.
    fn update(&self, readers: &[TrackedReader], stats: HashMap<ReaderId, ReaderStats>);
}

/// Build the strategy named in `config`.
pub fn strategy_from_config(
    config: &RestfulClientAggregatorConfig,
) -> Result<Box<dyn AggregatorStrategy>> {
    match config.strategy.as_str() {
        SIMPLE_EXPLORE_EXPLOIT_STRATEGY => Ok(Box::new(SimpleExploreExploitStrategy::new(
            config.simple_explore_exploit.explore_iterations,
            config.simple_explore_exploit.exploit_iterations,
        )?)),
        TESTING_SEQUENTIAL_STRATEGY => Ok(Box::new(TestingSequentialStrategy::default())),
        other => Err(DasError::Config(format!("unknown reader strategy {:?}", other))),
    }
}

#[derive(Debug, Default)]
struct StrategyState {
    readers: Vec<TrackedReader>,
    stats: HashMap<ReaderId, ReaderStats>,
}

impl StrategyState {
    fn replace(&mut self, readers: &[TrackedReader], stats: HashMap<ReaderId, ReaderStats>) {
        self.readers = readers.to_vec();
        self.stats = stats;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Explore,
    Exploit,
}

/// Alternates between exploring readers in random order and exploiting the
/// best ranked ones, with exponentially growing batches.
#[derive(Debug)]
pub struct SimpleExploreExploitStrategy {
    iterations: AtomicU32,
    explore_iterations: u32,
    exploit_iterations: u32,
    state: RwLock<StrategyState>,
}

impl SimpleExploreExploitStrategy {
    pub fn new(explore_iterations: u32, exploit_iterations: u32) -> Result<Self> {
        if explore_iterations.checked_add(exploit_iterations).unwrap_or(0) == 0 {
            return Err(DasError::Config(
                "explore and exploit iterations must sum to a positive u32".into(),
            ));
        }
        Ok(Self {
            iterations: AtomicU32::new(0),
            explore_iterations,
            exploit_iterations,
            state: RwLock::new(StrategyState::default()),
        })
    }

    pub fn phase(&self, iteration: u32) -> Phase {
        if iteration % (self.explore_iterations + self.exploit_iterations) < self.explore_iterations {
            Phase::Explore
        } else {
            Phase::Exploit
        }
    }
}

impl AggregatorStrategy for SimpleExploreExploitStrategy {
    fn new_instance(&self) -> StrategyInstance {
        let iteration = self.iterations.fetch_add(1, Ordering::SeqCst).wrapping_add(1);
        let state = self.state.read();
        let mut readers = state.readers.clone();

        match self.phase(iteration) {
            Phase::Explore => readers.shuffle(&mut rand::thread_rng()),
            Phase::Exploit => readers.sort_by(|a, b| {
                let score = |r: &TrackedReader| {
                    state
                        .stats
                        .get(&r.id)
                        .map(ReaderStats::success_ratio_weighted_mean_latency)
                        .unwrap_or(f64::MAX)
                };
                score(a).total_cmp(&score(b))
            }),
        }

        StrategyInstance::new(exponential_batches(readers))
    }

    fn update(&self, readers: &[TrackedReader], stats: HashMap<ReaderId, ReaderStats>) {
        self.state.write().replace(readers, stats);
    }
}

/// One reader per batch in configured order.
#[derive(Debug, Default)]
pub struct TestingSequentialStrategy {
    state: RwLock<StrategyState>,
}

impl AggregatorStrategy for TestingSequentialStrategy {
    fn new_instance(&self) -> StrategyInstance {
        let state = self.state.read();
        StrategyInstance::new(state.readers.iter().map(|r| vec![r.clone()]).collect())
    }

    fn update(&self, readers: &[TrackedReader], stats: HashMap<ReaderId, ReaderStats>) {
        self.state.write().replace(readers, stats);
    }
}

/// Partition `items` into batches of 1, 2, 4, ... with the remainder last.
pub fn exponential_batches<T>(items: Vec<T>) -> Vec<Vec<T>> {
    let mut batches = Vec::new();
    let mut remaining = items.into_iter().peekable();
    let mut size = 1usize;
    while remaining.peek().is_some() {
        batches.push(remaining.by_ref().take(size).collect());
        size = size.saturating_mul(2);
    }
    batches
}

/// The batches planned for a single retrieval.
#[derive(Debug)]
pub struct StrategyInstance {
    batches: VecDeque<Vec<TrackedReader>>,
}

impl StrategyInstance {
    pub fn new(batches: Vec<Vec<TrackedReader>>) -> Self {
        Self {
            batches: batches.into(),
        }
    }

    /// The next batch to query concurrently; empty once the plan is exhausted.
    pub fn next_readers(&mut self) -> Vec<TrackedReader> {
        self.batches.pop_front().unwrap_or_default()
    }
}

impl Iterator for StrategyInstance {
    type Item = Vec<TrackedReader>;

    fn next(&mut self) -> Option<Self::Item> {
        self.batches.pop_front()
    }
}
