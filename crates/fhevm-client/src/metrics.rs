//! Client-side metrics
//!
//! Only operation and outcome labels are recorded, never values, handles or
//! addresses. Installing an exporter is left to the application.

use metrics::counter;

pub const OP_CONNECT: &str = "connect";
pub const OP_ENCRYPT: &str = "encrypt";
pub const OP_DECRYPT: &str = "decrypt";
pub const OP_KEY_FETCH: &str = "key_fetch";

pub const OUTCOME_OK: &str = "ok";
pub const OUTCOME_ERROR: &str = "error";

pub const CACHE_HIT: &str = "hit";
pub const CACHE_MISS: &str = "miss";
pub const CACHE_COALESCED: &str = "coalesced";

pub fn record_engine_call(op: &'static str, ok: bool) {
    let outcome = if ok { OUTCOME_OK } else { OUTCOME_ERROR };
    counter!("fhevm_engine_calls_total", "op" => op, "outcome" => outcome).increment(1);
}

pub fn record_key_lookup(outcome: &'static str) {
    counter!("fhevm_key_cache_lookups_total", "outcome" => outcome).increment(1);
}

pub fn record_retry(op: &'static str) {
    counter!("fhevm_retries_total", "op" => op).increment(1);
}
