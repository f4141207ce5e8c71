//! Empty by design: this crate exists only to host the workspace's
//! cross-crate integration tests (`tests/scenarios.rs`), which exercise
//! the §8 end-to-end scenarios over the public `dart-runtime` API and the
//! in-process local transport.
