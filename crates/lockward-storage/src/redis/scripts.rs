//! Lua scripts giving Redis the compare-and-swap primitives it lacks.
//!
//! Each script runs atomically on the server, so the read and the write
//! below can never interleave with another client's command.

use redis::Script;

/// Replace the holder and reset the TTL if the current holder matches.
///
/// KEYS[1] = lock key
/// ARGV[1] = expected holder
/// ARGV[2] = new holder
/// ARGV[3] = new TTL in milliseconds
///
/// Returns 1 if replaced, 0 otherwise.
const REPLACE_IF_HOLDER: &str = r#"
    if redis.call('GET', KEYS[1]) == ARGV[1] then
        redis.call('SET', KEYS[1], ARGV[2], 'PX', ARGV[3])
        return 1
    end
    return 0
"#;

/// Delete the key if the current holder matches.
///
/// KEYS[1] = lock key
/// ARGV[1] = expected holder
///
/// Returns 1 if deleted, 0 otherwise.
const REMOVE_IF_HOLDER: &str = r#"
    if redis.call('GET', KEYS[1]) == ARGV[1] then
        return redis.call('DEL', KEYS[1])
    end
    return 0
"#;

/// Increment a windowed counter while it is below the limit.
///
/// The counter is a hash: `count` plus the `window` tag written by the
/// increment that opened the window.
///
/// KEYS[1] = counter key
/// ARGV[1] = limit
/// ARGV[2] = window in milliseconds
/// ARGV[3] = tag for a newly opened window
///
/// Returns `{count, window}`, or `{-1, ''}` when the limit is reached.
const TRY_INCREMENT: &str = r#"
    local current = tonumber(redis.call('HGET', KEYS[1], 'count') or '0')
    if current >= tonumber(ARGV[1]) then
        return {-1, ''}
    end
    local window = redis.call('HGET', KEYS[1], 'window')
    if not window then
        window = ARGV[3]
        redis.call('HSET', KEYS[1], 'window', window)
    end
    local count = redis.call('HINCRBY', KEYS[1], 'count', 1)
    if count == 1 or redis.call('PTTL', KEYS[1]) < 0 then
        redis.call('PEXPIRE', KEYS[1], ARGV[2])
    end
    return {count, window}
"#;

/// Decrement a counter if it still counts the given window; delete it at zero.
///
/// KEYS[1] = counter key
/// ARGV[1] = window tag
///
/// Returns the remaining count, or -1 when the window is gone.
const DECREMENT: &str = r#"
    if redis.call('HGET', KEYS[1], 'window') ~= ARGV[1] then
        return -1
    end
    local count = redis.call('HINCRBY', KEYS[1], 'count', -1)
    if count <= 0 then
        redis.call('DEL', KEYS[1])
        return 0
    end
    return count
"#;

/// Pre-hashed scripts shared by every call on one storage instance.
#[derive(Debug, Clone)]
pub struct LockScripts {
    /// See [`REPLACE_IF_HOLDER`].
    pub replace_if_holder: Script,
    /// See [`REMOVE_IF_HOLDER`].
    pub remove_if_holder: Script,
    /// See [`TRY_INCREMENT`].
    pub try_increment: Script,
    /// See [`DECREMENT`].
    pub decrement: Script,
}

impl LockScripts {
    /// Hash every script once.
    pub fn new() -> Self {
        Self {
            replace_if_holder: Script::new(REPLACE_IF_HOLDER),
            remove_if_holder: Script::new(REMOVE_IF_HOLDER),
            try_increment: Script::new(TRY_INCREMENT),
            decrement: Script::new(DECREMENT),
        }
    }
}

impl Default for LockScripts {
    fn default() -> Self {
        Self::new()
    }
}
