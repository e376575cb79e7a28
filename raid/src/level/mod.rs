//! Level-module interface and registry.
//!
//! A level module is a capability set resolved once at array creation, not a
//! full object hierarchy, matching a "dynamic dispatch on level" design.
//! Required entries are plain trait methods; optional ones
//! (`submit_null_payload`, `get_io_channel`, `resize`) have `false`/no-op
//! defaults so a module only overrides what it actually supports.

pub mod concat;
pub mod mirror;
pub mod stripe0;

use alloc::boxed::Box;
use alloc::collections::BTreeMap;
use alloc::sync::Arc;

use crate::device::RaidDevice;
use crate::error::RaidResult;
use crate::host::HostOps;
use crate::io::{RaidIoCtx, SharedChannel, SharedDevice};

/// Pluggable RAID level tag. Not a closed enum: the registry is the source
/// of truth for which levels exist, so new levels (e.g. parity schemes)
/// register without touching this type. `RAID0`/`RAID1`/`CONCAT` are the
/// three levels this repository ships reference modules for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RaidLevel(pub u32);

impl RaidLevel {
    pub const RAID0: RaidLevel = RaidLevel(0);
    pub const RAID1: RaidLevel = RaidLevel(1);
    pub const CONCAT: RaidLevel = RaidLevel(100);
}

/// Determines `min_operational` at array creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Constraint {
    MaxRemoved(u32),
    MinOperational(u32),
    Unset,
}

impl Constraint {
    pub fn min_operational(self, n: u32) -> RaidResult<u32> {
        match self {
            Constraint::MaxRemoved(max_removed) => n
                .checked_sub(max_removed)
                .ok_or(crate::error::RaidError::InvalidArgument(
                    "max_removed exceeds member count",
                )),
            Constraint::MinOperational(value) => {
                if value == 0 || value > n {
                    return Err(crate::error::RaidError::InvalidArgument(
                        "min_operational out of range",
                    ));
                }
                Ok(value)
            }
            Constraint::Unset => Ok(n),
        }
    }
}

/// One "part" in the partial-completion aggregator: a level module decides
/// what unit it fans a request into, the core only counts parts and rolls
/// up status.
pub trait LevelModule<H: HostOps>: Send + Sync {
    fn level(&self) -> RaidLevel;
    fn base_bdevs_min(&self) -> u32;
    fn constraint(&self) -> Constraint;

    /// Logical block count the array presents once `device.slots` holds its
    /// full configured membership. Not specified by name in the data model,
    /// but every level needs its own formula (sum for striping/concat, min
    /// for mirroring) so the core asks the module rather than guessing.
    fn total_blocks(&self, device: &RaidDevice<H>) -> u64;

    fn start(&self, device: &RaidDevice<H>) -> RaidResult<()>;

    /// `true` = stopped synchronously, `false` = asynchronous (module will
    /// signal completion out of band; this repository's reference modules
    /// are always synchronous).
    fn stop(&self, device: &RaidDevice<H>) -> bool {
        let _ = device;
        true
    }

    fn submit_rw(&self, device: &SharedDevice<H>, channel: &SharedChannel<H>, host: &Arc<H>, io: &RaidIoCtx);

    fn supports_null_payload(&self) -> bool {
        false
    }

    fn submit_null_payload(&self, device: &SharedDevice<H>, channel: &SharedChannel<H>, host: &Arc<H>, io: &RaidIoCtx) {
        let _ = (device, channel, host, io);
        unreachable!("submit_null_payload called on a module that does not support it");
    }

    fn memory_domains_supported(&self) -> bool {
        false
    }

    /// The module-private, per-executor channel `RaidChannel::create`
    /// stores as `module_channel`. Most levels need nothing of their own
    /// beyond the per-slot base channels.
    fn get_io_channel(&self, device: &RaidDevice<H>) -> Option<()> {
        let _ = device;
        None
    }

    /// Notified after the core has updated a slot's `block_count` from a
    /// resize. The hook owns the policy (grow the array, reject, ignore);
    /// the core does nothing on its own beyond recording the new count.
    fn resize(&self, device: &RaidDevice<H>) -> RaidResult<()> {
        let _ = device;
        Ok(())
    }
}

/// Process-wide level-module table: append-only, mutated only on the app
/// thread. A real process would keep exactly one of these behind a global;
/// this crate hangs it off [`crate::RaidEngine`] instead, since a bare
/// `static` cannot be generic over the host type `H` — see DESIGN.md.
pub struct LevelRegistry<H: HostOps> {
    modules: BTreeMap<RaidLevel, Box<dyn LevelModule<H>>>,
}

impl<H: HostOps> Default for LevelRegistry<H> {
    fn default() -> Self {
        LevelRegistry {
            modules: BTreeMap::new(),
        }
    }
}

impl<H: HostOps> LevelRegistry<H> {
    pub fn register(&mut self, module: Box<dyn LevelModule<H>>) -> RaidResult<()> {
        let level = module.level();
        if self.modules.contains_key(&level) {
            return Err(crate::error::RaidError::AlreadyExists(
                "level module already registered",
            ));
        }
        self.modules.insert(level, module);
        Ok(())
    }

    pub fn get(&self, level: RaidLevel) -> Option<&dyn LevelModule<H>> {
        self.modules.get(&level).map(|b| b.as_ref())
    }
}
