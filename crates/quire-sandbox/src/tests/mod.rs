//! Crate-level tests driving a scripted stand-in for the container runtime.

#![cfg(unix)]

mod support;
