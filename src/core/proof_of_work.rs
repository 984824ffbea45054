use crate::config::MiningConfig;
use crate::core::Block;
use crate::utils::{leading_zero_digits, sha256_hex};
use std::fmt::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

// Deadline and cancellation are polled once per this many nonces
const CHECK_INTERVAL: u64 = 1024;

/// Shared flag that stops a running proof-of-work search
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> CancelToken {
        CancelToken::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_canceled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Limits for one search. An empty budget searches until a hash is found.
#[derive(Debug, Clone, Default)]
pub struct MiningBudget {
    pub deadline: Option<Instant>,
    pub max_iterations: Option<u64>,
    pub cancel: Option<CancelToken>,
}

impl MiningBudget {
    pub fn unlimited() -> MiningBudget {
        MiningBudget::default()
    }

    pub fn from_config(config: &MiningConfig) -> MiningBudget {
        MiningBudget {
            deadline: config
                .timeout_ms
                .map(|ms| Instant::now() + Duration::from_millis(ms)),
            max_iterations: config.max_iterations,
            cancel: None,
        }
    }

    pub fn with_cancel(mut self, token: CancelToken) -> MiningBudget {
        self.cancel = Some(token);
        self
    }

    fn stop_reason(&self) -> Option<&'static str> {
        if self.cancel.as_ref().is_some_and(CancelToken::is_canceled) {
            return Some("canceled");
        }
        if self.deadline.is_some_and(|d| Instant::now() >= d) {
            return Some("deadline exceeded");
        }
        None
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PowOutcome {
    Found { nonce: u64, hash: String },
    Exhausted(String),
}

/// Nonce search over one block candidate. The cursor survives an exhausted
/// run, so calling `run` again continues where the last run stopped.
pub struct ProofOfWork {
    // index + previous hash + timestamp + transaction payload
    prefix: String,
    difficulty: u32,
    nonce: u64,
}

impl ProofOfWork {
    pub fn new_proof_of_work(
        index: u64,
        previous_hash: &str,
        timestamp: i64,
        payload: &str,
        difficulty: u32,
    ) -> ProofOfWork {
        ProofOfWork {
            prefix: format!("{index}{previous_hash}{timestamp}{payload}"),
            difficulty,
            nonce: 0,
        }
    }

    /// Last nonce tried
    pub fn get_nonce(&self) -> u64 {
        self.nonce
    }

    pub fn get_difficulty(&self) -> u32 {
        self.difficulty
    }

    pub fn run(&mut self, budget: &MiningBudget) -> PowOutcome {
        if let Some(reason) = budget.stop_reason() {
            return PowOutcome::Exhausted(reason.to_string());
        }
        let mut data = String::with_capacity(self.prefix.len() + 20);
        let mut iterations: u64 = 0;
        loop {
            if budget.max_iterations.is_some_and(|max| iterations >= max) {
                return PowOutcome::Exhausted(format!(
                    "no hash found within {iterations} iterations"
                ));
            }
            if iterations > 0 && iterations % CHECK_INTERVAL == 0 {
                if let Some(reason) = budget.stop_reason() {
                    return PowOutcome::Exhausted(reason.to_string());
                }
            }
            let Some(next) = self.nonce.checked_add(1) else {
                return PowOutcome::Exhausted("nonce space exhausted".to_string());
            };
            self.nonce = next;
            iterations += 1;

            data.clear();
            data.push_str(&self.prefix);
            // Writing into a String cannot fail
            let _ = write!(data, "{}", self.nonce);
            let hash = sha256_hex(data.as_bytes());
            if meets_difficulty(&hash, self.difficulty) {
                log::debug!("Found nonce {} after {iterations} iterations", self.nonce);
                return PowOutcome::Found {
                    nonce: self.nonce,
                    hash,
                };
            }
        }
    }

    /// Recomputes a stored block's hash from its fields and transaction payload
    pub fn validate(block: &Block, payload: &str) -> bool {
        let hash = compute_hash(
            block.index,
            &block.previous_hash,
            block.timestamp,
            payload,
            block.nonce,
        );
        hash == block.hash && meets_difficulty(&hash, block.difficulty)
    }
}

/// SHA-256 hex of index, previous hash, timestamp, payload and nonce, concatenated
pub fn compute_hash(
    index: u64,
    previous_hash: &str,
    timestamp: i64,
    payload: &str,
    nonce: u64,
) -> String {
    sha256_hex(format!("{index}{previous_hash}{timestamp}{payload}{nonce}").as_bytes())
}

/// True when the hex hash starts with at least `difficulty` zero digits
pub fn meets_difficulty(hash: &str, difficulty: u32) -> bool {
    leading_zero_digits(hash) >= difficulty as usize
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn found(outcome: PowOutcome) -> (u64, String) {
        match outcome {
            PowOutcome::Found { nonce, hash } => (nonce, hash),
            PowOutcome::Exhausted(reason) => panic!("search exhausted: {reason}"),
        }
    }

    #[test]
    fn test_difficulty_zero_accepts_first_nonce() {
        let mut pow = ProofOfWork::new_proof_of_work(1, "abc", 42, "[]", 0);
        let (nonce, hash) = found(pow.run(&MiningBudget::unlimited()));
        assert_eq!(nonce, 1);
        assert_eq!(hash, compute_hash(1, "abc", 42, "[]", 1));
    }

    #[test]
    fn test_found_hash_meets_difficulty() {
        let mut pow = ProofOfWork::new_proof_of_work(3, "00ff", 1_700_000_000_000, "[{}]", 2);
        let (nonce, hash) = found(pow.run(&MiningBudget::unlimited()));
        assert!(hash.starts_with("00"));
        assert_eq!(hash, compute_hash(3, "00ff", 1_700_000_000_000, "[{}]", nonce));
    }

    #[test]
    fn test_iteration_budget_then_resume() {
        let mut pow = ProofOfWork::new_proof_of_work(1, "prev", 7, "payload", 3);
        let (expected_nonce, _) = found(
            ProofOfWork::new_proof_of_work(1, "prev", 7, "payload", 3)
                .run(&MiningBudget::unlimited()),
        );

        let budget = MiningBudget {
            max_iterations: Some(1),
            ..MiningBudget::default()
        };
        let mut outcome = pow.run(&budget);
        while let PowOutcome::Exhausted(_) = outcome {
            outcome = pow.run(&budget);
        }
        let (nonce, _) = found(outcome);
        assert_eq!(nonce, expected_nonce);
    }

    #[test]
    fn test_canceled_search_stops() {
        let token = CancelToken::new();
        token.cancel();
        let budget = MiningBudget::unlimited().with_cancel(token);

        let mut pow = ProofOfWork::new_proof_of_work(1, "prev", 7, "payload", 64);
        assert_eq!(pow.run(&budget), PowOutcome::Exhausted("canceled".to_string()));
        assert_eq!(pow.get_nonce(), 0);
    }

    #[test]
    fn test_deadline_stops_impossible_search() {
        let budget = MiningBudget {
            deadline: Some(Instant::now() + Duration::from_millis(20)),
            ..MiningBudget::default()
        };
        let mut pow = ProofOfWork::new_proof_of_work(1, "prev", 7, "payload", 64);
        assert_eq!(
            pow.run(&budget),
            PowOutcome::Exhausted("deadline exceeded".to_string())
        );
        assert!(pow.get_nonce() >= CHECK_INTERVAL);
    }

    #[test]
    fn test_meets_difficulty() {
        assert!(meets_difficulty("00ab", 2));
        assert!(meets_difficulty("000b", 2));
        assert!(!meets_difficulty("0a0b", 2));
        assert!(meets_difficulty("ffff", 0));
    }

    proptest! {
        #[test]
        fn prop_mined_hash_recomputes(
            index in 0u64..1_000,
            previous in "[0-9a-f]{0,16}",
            timestamp in 0i64..2_000_000_000_000,
            payload in "[ -~]{0,32}",
        ) {
            let mut pow = ProofOfWork::new_proof_of_work(index, &previous, timestamp, &payload, 1);
            let (nonce, hash) = found(pow.run(&MiningBudget::unlimited()));
            prop_assert!(hash.starts_with('0'));
            prop_assert_eq!(hash, compute_hash(index, &previous, timestamp, &payload, nonce));
        }
    }
}
