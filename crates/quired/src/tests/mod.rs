//! Test suites for the Quire daemon.

mod serve_tests;
mod support;
