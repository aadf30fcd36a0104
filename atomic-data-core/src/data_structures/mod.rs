//! Shared-value containers and the structures built on them.
//!
//! # Organization
//!
//! - [`shared_data`] - The `SharedData` contract and `UpdateFailure`
//! - [`atomic_data`] - Lock-free container (copy-update-publish)
//! - [`mutex_data`] - Mutex baseline with the same contract
//! - [`atomic_list`] - Singly linked list of `AtomicData` nodes

pub mod atomic_data;
pub mod atomic_list;
pub mod mutex_data;
pub mod shared_data;

pub use atomic_data::{AtomicData, DEFAULT_BUDGET};
pub use atomic_list::{AtomicList, AtomicNode, Cursor, Iter, ListNode};
pub use mutex_data::MutexData;
pub use shared_data::{SharedData, UpdateFailure};
