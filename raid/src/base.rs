//! Base-device adapter ("base slot"). Holds everything the array needs to
//! know about one member: identity, the open descriptor once bound, and
//! the app-thread I/O handle used to read/write its superblock region.
//! Grounded on `hal::storage::HalStorageDevice` (device handle + queue)
//! generalized away from one hardwired device type.

use alloc::boxed::Box;

use raid_async::waitqueue::WaitQueue;
use uuid::Uuid;

use crate::error::Name;
use crate::host::HostOps;

pub struct BaseSlot<H: HostOps> {
    pub name: Option<Name>,
    pub uuid: Option<Uuid>,
    pub desc: Option<H::Desc>,
    pub app_channel: Option<H::Channel>,
    pub data_offset: u64,
    pub data_size: u64,
    pub block_count: u64,
    pub is_configured: bool,
    pub remove_scheduled: bool,
    /// One embedded wait entry per base device: at most one pending retry
    /// closure lives here at a time.
    pub wait_queue: WaitQueue,
    /// Fires once [`crate::membership::free_slot`] has fully released this
    /// slot — set by whichever caller (`remove_base`, `delete`) asked for
    /// notice of when the member is truly gone.
    pub remove_cb: Option<Box<dyn FnOnce() + Send>>,
}

impl<H: HostOps> BaseSlot<H> {
    pub const fn vacant() -> Self {
        BaseSlot {
            name: None,
            uuid: None,
            desc: None,
            app_channel: None,
            data_offset: 0,
            data_size: 0,
            block_count: 0,
            is_configured: false,
            remove_scheduled: false,
            wait_queue: WaitQueue::new(),
            remove_cb: None,
        }
    }

    /// A slot is addable only while both name and UUID are unset.
    pub fn is_vacant(&self) -> bool {
        self.name.is_none() && self.uuid.is_none()
    }

    pub fn has_channel(&self) -> bool {
        self.app_channel.is_some()
    }
}
