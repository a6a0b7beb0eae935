// src/retry/mod.rs
mod policy;

pub use policy::{RetryPolicy, Transition};
