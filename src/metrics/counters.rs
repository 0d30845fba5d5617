use once_cell::sync::Lazy;
use prometheus::{register_int_counter, register_int_gauge, IntCounter, IntGauge};

pub static IMT_LEAF_WRITE_COUNT: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "imt_leaf_write_count",
        "Total number of leaf paths rewritten (insert + update)"
    )
    .unwrap()
});

pub static IMT_OVER_CAPACITY_COUNT: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "imt_over_capacity_count",
        "Number of insert attempts rejected for exceeding tree capacity"
    )
    .unwrap()
});

pub static IMT_COMMIT_COUNT: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "imt_commit_count",
        "Number of transactions committed"
    )
    .unwrap()
});

pub static IMT_LEAF_COUNT: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!(
        "imt_leaf_count",
        "Most recently observed leaf count (tree size)"
    )
    .unwrap()
});

pub static IMT_INSERT_COUNT: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!("imt_insert_count", "Number of leaves inserted").unwrap()
});

pub static IMT_UPDATE_COUNT: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!("imt_update_count", "Number of in-place value updates").unwrap()
});

pub static IMT_PROOF_VERIFY_PASS_COUNT: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "imt_proof_verify_pass_count",
        "Number of proofs/witnesses that passed verification"
    )
    .unwrap()
});

pub static IMT_PROOF_VERIFY_FAIL_COUNT: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "imt_proof_verify_fail_count",
        "Number of proofs/witnesses that failed verification"
    )
    .unwrap()
});
