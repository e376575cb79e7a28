//! The two process-wide registries: the level-module table and the list of
//! RAID devices. Both are append/remove-only on the app thread and
//! read-mostly on the data path.
//!
//! A bare `static` cannot be generic over the host type `H`, so instead of
//! `OnceCell<SpinLock<...>>` globals this crate hangs both registries off a
//! single [`RaidEngine<H>`] that the embedder constructs once and owns for
//! the life of the process — see DESIGN.md.

use alloc::boxed::Box;
use alloc::sync::Arc;
use alloc::vec::Vec;

use raid_async::sync::spin::SpinLock;
use uuid::Uuid;

use crate::device::RaidDevice;
use crate::error::{RaidError, RaidResult};
use crate::host::HostOps;
use crate::io::SharedDevice;
use crate::level::{LevelModule, LevelRegistry, RaidLevel};
use crate::options::RaidSetOptions;

/// A cheap, process-unique-enough identifier used only so tests can
/// generate superblock UUIDs without a real RNG source (`no_std` has none
/// built in). Production embedders are expected to supply real UUIDs
/// up front via `raid_create`'s `uuid` parameter.
fn next_uuid() -> Uuid {
    use core::sync::atomic::{AtomicU64, Ordering};
    static COUNTER: AtomicU64 = AtomicU64::new(1);
    let n = COUNTER.fetch_add(1, Ordering::Relaxed);
    Uuid::from_u128(0x5241_4944_0000_0000_0000_0000_0000_0000 | n as u128)
}

pub struct RaidEngine<H: HostOps> {
    pub host: Arc<H>,
    levels: SpinLock<LevelRegistry<H>>,
    devices: SpinLock<Vec<SharedDevice<H>>>,
    options: SpinLock<RaidSetOptions>,
}

impl<H: HostOps> RaidEngine<H> {
    pub fn new(host: H) -> Self {
        Self::from_shared_host(Arc::new(host))
    }

    /// Rebuilds an engine against a host framework instance that already
    /// exists: a process restart re-runs examine over every base the still
    /// -running host framework already knows about.
    pub fn from_shared_host(host: Arc<H>) -> Self {
        RaidEngine {
            host,
            levels: SpinLock::new(LevelRegistry::default()),
            devices: SpinLock::new(Vec::new()),
            options: SpinLock::new(RaidSetOptions::default()),
        }
    }

    pub fn register_level(&self, module: Box<dyn LevelModule<H>>) -> RaidResult<()> {
        self.levels.lock().register(module)
    }

    pub fn with_level<R>(&self, level: RaidLevel, f: impl FnOnce(&dyn LevelModule<H>) -> RaidResult<R>) -> RaidResult<R> {
        let levels = self.levels.lock();
        let module = levels
            .get(level)
            .ok_or(RaidError::InvalidArgument("raid level has no registered module"))?;
        f(module)
    }

    pub fn set_options(&self, options: RaidSetOptions) {
        *self.options.lock() = options;
    }

    pub fn options(&self) -> RaidSetOptions {
        *self.options.lock()
    }

    pub fn generate_uuid(&self) -> Uuid {
        next_uuid()
    }

    pub fn insert_device(&self, device: RaidDevice<H>) -> SharedDevice<H> {
        let shared = Arc::new(SpinLock::new(device));
        self.devices.lock().push(shared.clone());
        shared
    }

    pub fn remove_device(&self, uuid: Uuid) {
        self.devices.lock().retain(|d| d.lock().uuid != uuid);
    }

    pub fn find_by_name(&self, name: &str) -> Option<SharedDevice<H>> {
        self.devices.lock().iter().find(|d| d.lock().name.as_str() == name).cloned()
    }

    pub fn find_by_uuid(&self, uuid: Uuid) -> Option<SharedDevice<H>> {
        self.devices.lock().iter().find(|d| d.lock().uuid == uuid).cloned()
    }

    pub fn devices(&self) -> Vec<SharedDevice<H>> {
        self.devices.lock().clone()
    }
}
