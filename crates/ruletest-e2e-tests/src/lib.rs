//! End-to-end tests for the rule-test engine.
//!
//! These tests exercise the full stack:
//! - Value-pattern expansion into seeded sample stores
//! - Query evaluation over replayed timelines
//! - Recording and alerting rules driven by the virtual clock
//! - Whole-file runs through the harness and the CLI

#![cfg(test)]
