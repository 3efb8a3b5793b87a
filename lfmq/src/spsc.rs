//! Core SPSC (Single-Producer Single-Consumer) queue primitives.
//!
//! This module contains the ring buffer algorithm behind [`crate::sync::spsc`].

pub(crate) mod ring;
