//! Integration tests - Tests that drive several components together
//!
//! A catalog is loaded from the fixture file, mapped, and read back through
//! the JSON reader against a mocked statement executor.

mod catalog_mapping_tests;
mod json_reader_tests;
