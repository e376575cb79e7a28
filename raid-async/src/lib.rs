#![cfg_attr(not(test), no_std)]

//! Minimal cooperative-async primitives for a RAID engine's own executor
//! threads: a single-threaded task queue (one per reactor), a spinlock for
//! the brief, data-plane-visible critical sections membership mutation
//! needs, and a wait-queue for the back-pressure retry protocol.
//!
//! None of this is a general-purpose async runtime. There is one queue, no
//! timers, no I/O reactor integration — a caller wanting those links this
//! crate's `Executor` into whatever actually drives I/O completion.

extern crate alloc;

pub mod executor;
pub mod sync;
pub mod waitqueue;
