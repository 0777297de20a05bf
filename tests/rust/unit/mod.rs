//! Unit tests - Tests of single components through the public API
//!
//! These tests need nothing beyond the in-repo catalog fixtures.

mod path_grammar_tests;
mod property_map_tests;
