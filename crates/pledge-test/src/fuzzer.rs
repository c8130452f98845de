//! Settlement Fuzzer - Randomised operation sequences against a model
//!
//! Drives a deferred with random register / progress / resolve / reject
//! sequences and compares every notification and every refusal with a
//! reference model of the settlement rules.
//!
//! Tests:
//! - Exactly-once terminal delivery per observer
//! - Registration-order fan-out
//! - Progress only between registration and settlement
//! - Late registration replay
//! - Refusal of every operation after settlement

use pledge_core::{Deferred, Status};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use thiserror::Error;

use crate::{Notification, Recorder};

/// Notification shape used by the fuzzer
pub type FuzzNotification = Notification<u32, u32, u32>;

/// Fuzzer configuration
#[derive(Clone, Debug)]
pub struct FuzzerConfig {
    /// Number of sequences to run
    pub rounds: usize,
    /// Operations per sequence
    pub op_count: usize,
    /// Probability that an operation registers an observer
    pub register_prob: f64,
    /// Probability that an operation emits progress
    pub progress_prob: f64,
    /// Probability that a settlement is a rejection
    pub reject_prob: f64,
    /// Random seed
    pub seed: u64,
}

impl Default for FuzzerConfig {
    fn default() -> Self {
        FuzzerConfig {
            rounds: 200,
            op_count: 40,
            register_prob: 0.35,
            progress_prob: 0.35,
            reject_prob: 0.5,
            seed: 42,
        }
    }
}

impl FuzzerConfig {
    /// Light fuzzing for quick tests
    pub fn light() -> Self {
        FuzzerConfig {
            rounds: 20,
            op_count: 12,
            register_prob: 0.4,
            progress_prob: 0.3,
            reject_prob: 0.5,
            seed: 42,
        }
    }

    /// Heavy fuzzing for thorough testing
    pub fn heavy() -> Self {
        FuzzerConfig {
            rounds: 5000,
            op_count: 120,
            register_prob: 0.3,
            progress_prob: 0.4,
            reject_prob: 0.5,
            seed: 42,
        }
    }
}

/// One producer or consumer operation
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FuzzOp {
    Register,
    Progress(u32),
    Resolve(u32),
    Reject(u32),
}

/// A disagreement between the deferred and the model
#[derive(Error, Clone, Debug, PartialEq, Eq)]
pub enum Violation {
    #[error("Observer {observer} received {count} terminal notifications")]
    TerminalCount { observer: usize, count: usize },

    #[error("Operation {index} ({op:?}) was refused while pending")]
    UnexpectedRefusal { index: usize, op: FuzzOp },

    #[error("Operation {index} ({op:?}) was accepted after settlement")]
    MissingRefusal { index: usize, op: FuzzOp },

    #[error("Notification {index}: expected {expected:?}, got {actual:?}")]
    LogMismatch {
        index: usize,
        expected: Option<FuzzNotification>,
        actual: Option<FuzzNotification>,
    },

    #[error("Final status {actual}, expected {expected}")]
    StatusMismatch { expected: Status, actual: Status },
}

/// Outcome of fuzzing
#[derive(Clone, Debug, Default)]
pub struct FuzzResult {
    pub sequences: usize,
    pub ops_applied: usize,
    pub refusals: usize,
    pub notifications: usize,
    pub violations: Vec<Violation>,
}

impl FuzzResult {
    pub fn is_clean(&self) -> bool {
        self.violations.is_empty()
    }

    fn absorb(&mut self, other: FuzzResult) {
        self.sequences += other.sequences;
        self.ops_applied += other.ops_applied;
        self.refusals += other.refusals;
        self.notifications += other.notifications;
        self.violations.extend(other.violations);
    }
}

/// Settlement fuzzer
pub struct SettlementFuzzer {
    config: FuzzerConfig,
    rng: StdRng,
}

impl SettlementFuzzer {
    pub fn new(config: FuzzerConfig) -> Self {
        let rng = StdRng::seed_from_u64(config.seed);
        SettlementFuzzer { config, rng }
    }

    /// Generate one random operation sequence
    pub fn generate(&mut self) -> Vec<FuzzOp> {
        (0..self.config.op_count)
            .map(|_| {
                let payload = self.rng.gen_range(0..1000);
                if self.rng.gen_bool(self.config.register_prob) {
                    FuzzOp::Register
                } else if self.rng.gen_bool(self.config.progress_prob) {
                    FuzzOp::Progress(payload)
                } else if self.rng.gen_bool(self.config.reject_prob) {
                    FuzzOp::Reject(payload)
                } else {
                    FuzzOp::Resolve(payload)
                }
            })
            .collect()
    }

    /// Run all configured rounds
    pub fn run(&mut self) -> FuzzResult {
        let mut result = FuzzResult::default();
        for _ in 0..self.config.rounds {
            let ops = self.generate();
            result.absorb(check(&ops));
        }
        result
    }
}

/// Reference model of a single deferred
#[derive(Default)]
struct Model {
    settled: Option<Result<u32, u32>>,
    observers: usize,
    log: Vec<FuzzNotification>,
}

impl Model {
    fn terminal(observer: usize, outcome: Result<u32, u32>) -> FuzzNotification {
        match outcome {
            Ok(value) => Notification::Fulfilled { observer, value },
            Err(reason) => Notification::Rejected { observer, reason },
        }
    }

    /// Apply an operation. Returns whether it should be accepted.
    fn apply(&mut self, op: FuzzOp) -> bool {
        match (op, self.settled) {
            (FuzzOp::Register, settled) => {
                let observer = self.observers;
                self.observers += 1;
                if let Some(outcome) = settled {
                    self.log.push(Self::terminal(observer, outcome));
                }
                true
            }
            (_, Some(_)) => false,
            (FuzzOp::Progress(update), None) => {
                for observer in 0..self.observers {
                    self.log.push(Notification::Progress { observer, update });
                }
                true
            }
            (FuzzOp::Resolve(v), None) => self.settle(Ok(v)),
            (FuzzOp::Reject(r), None) => self.settle(Err(r)),
        }
    }

    fn settle(&mut self, outcome: Result<u32, u32>) -> bool {
        self.settled = Some(outcome);
        for observer in 0..self.observers {
            self.log.push(Self::terminal(observer, outcome));
        }
        true
    }

    fn status(&self) -> Status {
        match self.settled {
            None => Status::Pending,
            Some(Ok(_)) => Status::Fulfilled,
            Some(Err(_)) => Status::Rejected,
        }
    }
}

/// Replay `ops` against a fresh deferred and the model
pub fn check(ops: &[FuzzOp]) -> FuzzResult {
    let deferred: Deferred<u32, u32, u32> = Deferred::new();
    let recorder = Recorder::new();
    let mut model = Model::default();
    let mut result = FuzzResult {
        sequences: 1,
        ..FuzzResult::default()
    };
    let mut next_observer = 0;

    for (index, &op) in ops.iter().enumerate() {
        let accepted = match op {
            FuzzOp::Register => {
                recorder.attach(&deferred.promise(), next_observer);
                next_observer += 1;
                true
            }
            FuzzOp::Progress(update) => deferred.progress(update).is_ok(),
            FuzzOp::Resolve(value) => deferred.resolve(value).is_ok(),
            FuzzOp::Reject(reason) => deferred.reject(reason).is_ok(),
        };
        let expected = model.apply(op);

        if accepted {
            result.ops_applied += 1;
        } else {
            result.refusals += 1;
        }
        match (expected, accepted) {
            (true, false) => result.violations.push(Violation::UnexpectedRefusal { index, op }),
            (false, true) => result.violations.push(Violation::MissingRefusal { index, op }),
            _ => {}
        }
    }

    let actual = recorder.notifications();
    result.notifications = actual.len();
    let len = actual.len().max(model.log.len());
    if let Some(index) = (0..len).find(|&i| actual.get(i) != model.log.get(i)) {
        result.violations.push(Violation::LogMismatch {
            index,
            expected: model.log.get(index).cloned(),
            actual: actual.get(index).cloned(),
        });
    }

    for observer in 0..next_observer {
        let count = recorder.terminal_count(observer);
        let expected = usize::from(model.settled.is_some());
        if count != expected {
            result.violations.push(Violation::TerminalCount { observer, count });
        }
    }

    if deferred.status() != model.status() {
        result.violations.push(Violation::StatusMismatch {
            expected: model.status(),
            actual: deferred.status(),
        });
    }

    result
}
