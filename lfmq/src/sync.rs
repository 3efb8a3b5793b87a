//! Synchronization primitives for in-process communication.
//!
//! This module provides the thread-safe queue handles used to move
//! messages between a controller thread and a real-time thread.

pub mod spsc;
