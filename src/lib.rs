//! Warden - Per-caller Admission Control
//!
//! This crate decides whether a caller may access a resource right now, based
//! on a set of time-windowed rules evaluated against that caller's history of
//! admitted requests. The core lives in [`admission`]; [`grpc`] exposes it as a
//! gate that transport layers can call.

pub mod admission;
pub mod config;
pub mod error;
pub mod grpc;
