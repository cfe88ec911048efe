//! End-to-end CLI tests for the `mythos` binary.

mod cli_tests;
