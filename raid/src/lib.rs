#![cfg_attr(not(test), no_std)]

//! Software RAID virtual block device engine.
//!
//! Composes several base block devices into one virtual RAID device: a flat
//! LBA space, a pluggable geometry (striping/mirroring/concatenation), and a
//! lifecycle that runs arrays from first configuration through degraded
//! operation, member replacement, and teardown. The host block-device
//! framework (channel registration, I/O queuing, quiesce) is an external
//! collaborator represented here by the [`host::HostOps`] trait; production
//! code plugs in a real implementation, tests plug in [`host::mock`].

extern crate alloc;

pub mod base;
pub mod channel;
pub mod crc;
pub mod device;
pub mod error;
pub mod examine;
pub mod host;
pub mod io;
pub mod level;
pub mod management;
pub mod membership;
pub mod options;
pub mod registry;
pub mod superblock;

pub use device::{RaidDevice, RaidState};
pub use error::{RaidError, RaidResult};
pub use options::RaidSetOptions;
pub use registry::RaidEngine;
