//! Snowflake-style holder id generator.
//!
//! Layout (most significant first): 41 bits of milliseconds since
//! 2024-01-01T00:00:00Z, 10 bits of node id, 12 bits of sequence. Ids are
//! strictly increasing per generator; when the sequence overflows within
//! one millisecond the generator borrows the next millisecond instead of
//! blocking.

use std::sync::Mutex;

use chrono::Utc;

use lockward_core::config::lock::MAX_NODE_ID;
use lockward_core::error::AppError;
use lockward_core::traits::id::IdGenerator;

/// 2024-01-01T00:00:00Z in Unix milliseconds.
const EPOCH_MS: i64 = 1_704_067_200_000;
const NODE_BITS: u32 = 10;
const SEQUENCE_BITS: u32 = 12;
const SEQUENCE_MASK: i64 = (1 << SEQUENCE_BITS) - 1;

#[derive(Debug, Default)]
struct State {
    last_ms: i64,
    sequence: i64,
}

/// Holder id generator unique per (node id, millisecond, sequence).
#[derive(Debug)]
pub struct SnowflakeIdGenerator {
    node_id: i64,
    state: Mutex<State>,
}

impl SnowflakeIdGenerator {
    /// Create a generator for `node_id` (0..=1023).
    pub fn new(node_id: u16) -> Result<Self, AppError> {
        if node_id > MAX_NODE_ID {
            return Err(AppError::validation(format!(
                "node id {node_id} exceeds {MAX_NODE_ID}"
            )));
        }
        Ok(Self {
            node_id: i64::from(node_id),
            state: Mutex::new(State::default()),
        })
    }

    /// Node id embedded in every id.
    pub fn node_id(&self) -> u16 {
        self.node_id as u16
    }

    /// Split an id into (milliseconds since epoch, node id, sequence).
    pub fn decompose(id: i64) -> (i64, u16, u16) {
        let sequence = id & SEQUENCE_MASK;
        let node = (id >> SEQUENCE_BITS) & ((1 << NODE_BITS) - 1);
        let millis = id >> (SEQUENCE_BITS + NODE_BITS);
        (millis, node as u16, sequence as u16)
    }
}

impl IdGenerator for SnowflakeIdGenerator {
    fn next_id(&self) -> i64 {
        let mut state = self
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let now = (Utc::now().timestamp_millis() - EPOCH_MS).max(state.last_ms);
        if now == state.last_ms {
            state.sequence = (state.sequence + 1) & SEQUENCE_MASK;
            if state.sequence == 0 {
                state.last_ms = now + 1;
            }
        } else {
            state.sequence = 0;
            state.last_ms = now;
        }

        (state.last_ms << (SEQUENCE_BITS + NODE_BITS))
            | (self.node_id << SEQUENCE_BITS)
            | state.sequence
    }
}
