//! Snowflake-style identifiers for catalog rows.
//!
//! Layout (most significant bit first): 1 unused sign bit, 41 bits of
//! milliseconds since [`EPOCH_MS`], 10 bits of worker id, 12 bits of
//! per-millisecond sequence.

use parking_lot::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

/// 2024-01-01T00:00:00Z
pub const EPOCH_MS: u64 = 1_704_067_200_000;

const WORKER_BITS: u64 = 10;
const SEQUENCE_BITS: u64 = 12;
const MAX_WORKER: u64 = (1 << WORKER_BITS) - 1;
const SEQUENCE_MASK: u64 = (1 << SEQUENCE_BITS) - 1;

#[derive(Debug, Default)]
struct State {
    last_ms: u64,
    sequence: u64,
}

/// Thread-safe generator of unique, roughly time-ordered `i64` ids.
#[derive(Debug)]
pub struct IdGenerator {
    worker_id: u64,
    state: Mutex<State>,
}

impl IdGenerator {
    /// Create a generator for `worker_id` (masked to 10 bits).
    pub fn new(worker_id: u16) -> Self {
        Self {
            worker_id: u64::from(worker_id) & MAX_WORKER,
            state: Mutex::new(State::default()),
        }
    }

    /// Produce the next id. Spins into the next millisecond when the
    /// sequence for the current one is exhausted, and never goes backwards
    /// if the wall clock does.
    pub fn next_id(&self) -> i64 {
        let mut state = self.state.lock();
        let mut now = now_ms().max(state.last_ms);
        if now == state.last_ms {
            state.sequence = (state.sequence + 1) & SEQUENCE_MASK;
            if state.sequence == 0 {
                while now <= state.last_ms {
                    now = now_ms().max(state.last_ms);
                    if now == state.last_ms {
                        std::hint::spin_loop();
                    }
                }
            }
        } else {
            state.sequence = 0;
        }
        state.last_ms = now;
        let elapsed = now.saturating_sub(EPOCH_MS);
        let id = (elapsed << (WORKER_BITS + SEQUENCE_BITS))
            | (self.worker_id << SEQUENCE_BITS)
            | state.sequence;
        (id & (i64::MAX as u64)) as i64
    }
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::new(1)
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(EPOCH_MS)
}
