//! Test bodies shared by the integration tests.
//!
//! Every function is generic over a [`SharedData`] implementation, so the
//! same body runs against `AtomicData` and the `MutexData` baseline.
//!
//! [`SharedData`]: crate::data_structures::SharedData
