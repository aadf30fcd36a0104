pub mod common_tests;
pub mod data_structures;

pub use data_structures::{
    AtomicData, AtomicList, Cursor, DEFAULT_BUDGET, Iter, ListNode, MutexData, SharedData,
    UpdateFailure,
};

/*

cargo test --release -- --nocapture

cargo bench --package atomic-data-core --bench shared_data_benchmark

*/
