//! Property-based tests for scoring and scheduling guarantees

mod scoring;
