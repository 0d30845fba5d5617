#[cfg(any(test, feature = "metrics"))]
pub mod counters;
#[cfg(any(test, feature = "metrics"))]
use counters::*;

#[cfg(any(test, feature = "metrics"))]
#[inline(always)]
/// Increment `imt_leaf_write_count` if metrics are enabled. No-op otherwise.
pub fn inc_leaf_write() {
    IMT_LEAF_WRITE_COUNT.inc()
}

#[cfg(not(any(test, feature = "metrics")))]
#[inline(always)]
/// Increment `imt_leaf_write_count` if metrics are enabled. No-op otherwise.
pub fn inc_leaf_write() {}

#[cfg(any(test, feature = "metrics"))]
#[inline(always)]
/// Increment `imt_over_capacity_count` if metrics are enabled. No-op otherwise.
pub fn inc_over_capacity() {
    IMT_OVER_CAPACITY_COUNT.inc()
}

#[cfg(not(any(test, feature = "metrics")))]
#[inline(always)]
/// Increment `imt_over_capacity_count` if metrics are enabled. No-op otherwise.
pub fn inc_over_capacity() {}

#[cfg(any(test, feature = "metrics"))]
#[inline(always)]
/// Increment `imt_commit_count` if metrics are enabled. No-op otherwise.
pub fn inc_commits() {
    IMT_COMMIT_COUNT.inc()
}

#[cfg(not(any(test, feature = "metrics")))]
#[inline(always)]
/// Increment `imt_commit_count` if metrics are enabled. No-op otherwise.
pub fn inc_commits() {}

#[cfg(any(test, feature = "metrics"))]
#[inline(always)]
/// Set `imt_leaf_count` to the tree's current size if metrics are enabled. No-op otherwise.
pub fn set_leaf_count(count: u64) {
    IMT_LEAF_COUNT.set(count as i64)
}

#[cfg(not(any(test, feature = "metrics")))]
#[inline(always)]
/// Set `imt_leaf_count` to the tree's current size if metrics are enabled. No-op otherwise.
pub fn set_leaf_count(_count: u64) {}

#[cfg(any(test, feature = "metrics"))]
#[inline(always)]
/// Increment `imt_insert_count` if metrics are enabled. No-op otherwise.
pub fn inc_inserts() {
    IMT_INSERT_COUNT.inc()
}

#[cfg(not(any(test, feature = "metrics")))]
#[inline(always)]
/// Increment `imt_insert_count` if metrics are enabled. No-op otherwise.
pub fn inc_inserts() {}

#[cfg(any(test, feature = "metrics"))]
#[inline(always)]
/// Increment `imt_update_count` if metrics are enabled. No-op otherwise.
pub fn inc_updates() {
    IMT_UPDATE_COUNT.inc()
}

#[cfg(not(any(test, feature = "metrics")))]
#[inline(always)]
/// Increment `imt_update_count` if metrics are enabled. No-op otherwise.
pub fn inc_updates() {}

#[cfg(any(test, feature = "metrics"))]
#[inline(always)]
/// Record a proof/witness verification outcome if metrics are enabled. No-op otherwise.
pub fn record_proof_verify(passed: bool) {
    if passed {
        IMT_PROOF_VERIFY_PASS_COUNT.inc();
    } else {
        IMT_PROOF_VERIFY_FAIL_COUNT.inc();
    }
}

#[cfg(not(any(test, feature = "metrics")))]
#[inline(always)]
/// Record a proof/witness verification outcome if metrics are enabled. No-op otherwise.
pub fn record_proof_verify(_passed: bool) {}
