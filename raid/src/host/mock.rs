//! In-memory [`HostOps`] implementation used by this repository's own
//! tests. Stands in for the host block-device framework: a `Vec<u8>`-backed
//! "device" per base, a trivial channel registry, and nothing resembling
//! real asynchrony — every submit calls `complete` before returning, which
//! is enough to exercise the aggregator, back-pressure, and membership
//! state machine without real hardware.

use alloc::collections::BTreeMap;
use alloc::string::{String, ToString};
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::sync::atomic::{AtomicU64, Ordering};

use raid_async::sync::spin::SpinLock;
use uuid::Uuid;

use super::{Completion, HostOps};
use crate::channel::RaidChannel;
use crate::error::{IoStatus, RaidError, RaidResult};
use crate::io::SharedChannel;
use crate::superblock::RaidSuperblock;

fn fresh_uuid(id: u64) -> Uuid {
    Uuid::from_u128(0xB0B0_0000_0000_0000_0000_0000_0000_0000 | id as u128)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct MockDesc(u64);

pub struct MockChannel(u64);

struct MockBase {
    name: String,
    uuid: Uuid,
    block_len: u32,
    block_count: u64,
    claimed: bool,
    sb_region: Vec<u8>,
    allow_nomem_once: bool,
    supports_flush: bool,
    supports_unmap: bool,
    supports_reset: bool,
    has_md: bool,
}

struct Inner {
    bases: BTreeMap<u64, MockBase>,
    by_name: BTreeMap<String, u64>,
    open_channels: u64,
    channels: BTreeMap<u64, Vec<SharedChannel<MockHost>>>,
    fail_next_buffer: bool,
}

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

pub struct MockHost {
    inner: SpinLock<Inner>,
}

impl MockHost {
    pub fn new() -> Self {
        MockHost {
            inner: SpinLock::new(Inner {
                bases: BTreeMap::new(),
                by_name: BTreeMap::new(),
                open_channels: 0,
                channels: BTreeMap::new(),
                fail_next_buffer: false,
            }),
        }
    }

    /// Registers a base as present in the system without opening it —
    /// mirrors a real bdev that simply exists, used to exercise
    /// [`HostOps::open_ext`] through the membership/examine code paths.
    pub fn register_base(&self, name: &str, block_count: u64, block_len: u32) -> u64 {
        let id = NEXT_ID.fetch_add(1, Ordering::Relaxed);
        let mut inner = self.inner.lock();
        inner.bases.insert(
            id,
            MockBase {
                name: name.to_string(),
                uuid: fresh_uuid(id),
                block_len,
                block_count,
                claimed: false,
                sb_region: alloc::vec![0u8; crate::superblock::RESERVED_MIN_OFFSET as usize],
                allow_nomem_once: false,
                supports_flush: true,
                supports_unmap: true,
                supports_reset: true,
                has_md: false,
            },
        );
        inner.by_name.insert(name.to_string(), id);
        id
    }

    /// Convenience for unit tests that only care about a ready-to-use
    /// descriptor and do not exercise the open/claim sequence themselves.
    pub fn add_base(&self, name: &str, block_count: u64, block_len: u32) -> MockDesc {
        let id = self.register_base(name, block_count, block_len);
        self.inner.lock().bases.get_mut(&id).unwrap().claimed = true;
        MockDesc(id)
    }

    pub fn set_has_md(&self, desc: MockDesc, has_md: bool) {
        self.inner.lock().bases.get_mut(&desc.0).unwrap().has_md = has_md;
    }

    pub fn set_reset_unsupported(&self, desc: MockDesc) {
        self.inner.lock().bases.get_mut(&desc.0).unwrap().supports_reset = false;
    }

    /// Makes the *next* `submit_reset` on this base fail with `NoMem`, then
    /// succeed on retry — used to drive the back-pressure scenario.
    pub fn queue_nomem_once(&self, desc: MockDesc) {
        self.inner.lock().bases.get_mut(&desc.0).unwrap().allow_nomem_once = true;
    }

    pub fn open_channel_count(&self) -> u64 {
        self.inner.lock().open_channels
    }

    pub fn uuid_of(&self, desc: MockDesc) -> Uuid {
        self.inner.lock().bases[&desc.0].uuid
    }

    /// Makes the *next* [`HostOps::get_io_buf`] call fail, exercising the
    /// buffer-exhaustion path.
    pub fn fail_next_buffer(&self) {
        self.inner.lock().fail_next_buffer = true;
    }

    pub fn registered_channel_count(&self, device_id: u64) -> usize {
        self.inner.lock().channels.get(&device_id).map(|v| v.len()).unwrap_or(0)
    }
}

impl Default for MockHost {
    fn default() -> Self {
        Self::new()
    }
}

impl HostOps for MockHost {
    type Desc = MockDesc;
    type Channel = MockChannel;

    fn open_ext(&self, name: &str, _write: bool) -> RaidResult<Self::Desc> {
        let inner = self.inner.lock();
        inner
            .by_name
            .get(name)
            .copied()
            .map(MockDesc)
            .ok_or(RaidError::NotFound("base name not known"))
    }

    fn close(&self, _desc: Self::Desc) {}

    fn claim(&self, desc: &Self::Desc) -> RaidResult<()> {
        let mut inner = self.inner.lock();
        let base = inner.bases.get_mut(&desc.0).ok_or(RaidError::NotFound("base name not known"))?;
        if base.claimed {
            return Err(RaidError::Busy("base already claimed"));
        }
        base.claimed = true;
        Ok(())
    }

    fn release(&self, desc: &Self::Desc) {
        if let Some(base) = self.inner.lock().bases.get_mut(&desc.0) {
            base.claimed = false;
        }
    }

    fn get_io_channel(&self, desc: &Self::Desc) -> RaidResult<Self::Channel> {
        let mut inner = self.inner.lock();
        if !inner.bases.contains_key(&desc.0) {
            return Err(RaidError::NotFound("base name not known"));
        }
        inner.open_channels += 1;
        Ok(MockChannel(desc.0))
    }

    fn put_io_channel(&self, _channel: Self::Channel) {
        self.inner.lock().open_channels -= 1;
    }

    fn block_len(&self, desc: &Self::Desc) -> u32 {
        self.inner.lock().bases[&desc.0].block_len
    }

    fn block_count(&self, desc: &Self::Desc) -> u64 {
        self.inner.lock().bases[&desc.0].block_count
    }

    fn optimal_io_boundary(&self, _desc: &Self::Desc) -> u64 {
        0
    }

    fn has_md(&self, desc: &Self::Desc) -> bool {
        self.inner.lock().bases[&desc.0].has_md
    }

    fn base_uuid(&self, desc: &Self::Desc) -> Uuid {
        self.inner.lock().bases[&desc.0].uuid
    }

    fn read_superblock(&self, desc: &Self::Desc) -> RaidResult<Option<RaidSuperblock>> {
        let inner = self.inner.lock();
        let base = inner.bases.get(&desc.0).ok_or(RaidError::NotFound("base name not known"))?;
        RaidSuperblock::from_bytes(&base.sb_region)
    }

    fn write_superblock(&self, desc: &Self::Desc, sb: &RaidSuperblock) -> RaidResult<()> {
        let bytes = sb.to_bytes()?;
        let mut inner = self.inner.lock();
        let base = inner.bases.get_mut(&desc.0).ok_or(RaidError::NotFound("base name not known"))?;
        base.sb_region = bytes;
        Ok(())
    }

    fn submit_read(&self, channel: &Self::Channel, _offset: u64, _len: u64, complete: Completion) -> Result<(), IoStatus> {
        let _ = channel;
        complete(IoStatus::Success);
        Ok(())
    }

    fn submit_write(&self, channel: &Self::Channel, _offset: u64, _len: u64, complete: Completion) -> Result<(), IoStatus> {
        let _ = channel;
        complete(IoStatus::Success);
        Ok(())
    }

    fn submit_flush(&self, channel: &Self::Channel, complete: Completion) -> Result<(), IoStatus> {
        let _ = channel;
        complete(IoStatus::Success);
        Ok(())
    }

    fn submit_unmap(&self, channel: &Self::Channel, _offset: u64, _len: u64, complete: Completion) -> Result<(), IoStatus> {
        let _ = channel;
        complete(IoStatus::Success);
        Ok(())
    }

    fn submit_reset(&self, channel: &Self::Channel, complete: Completion) -> Result<(), IoStatus> {
        let mut inner = self.inner.lock();
        if let Some(base) = inner.bases.get_mut(&channel.0) {
            if base.allow_nomem_once {
                base.allow_nomem_once = false;
                return Err(IoStatus::NoMem);
            }
        }
        drop(inner);
        complete(IoStatus::Success);
        Ok(())
    }

    fn supports_flush(&self, desc: &Self::Desc) -> bool {
        self.inner.lock().bases[&desc.0].supports_flush
    }

    fn supports_unmap(&self, desc: &Self::Desc) -> bool {
        self.inner.lock().bases[&desc.0].supports_unmap
    }

    fn supports_reset(&self, desc: &Self::Desc) -> bool {
        self.inner.lock().bases[&desc.0].supports_reset
    }

    fn quiesce(&self, _device_id: u64) {}
    fn unquiesce(&self, _device_id: u64) {}
    fn bdev_register(&self, _device_id: u64) {}
    fn bdev_unregister(&self, _device_id: u64) {}

    fn get_io_buf(&self, _len: u64) -> Result<(), ()> {
        let mut inner = self.inner.lock();
        if inner.fail_next_buffer {
            inner.fail_next_buffer = false;
            return Err(());
        }
        Ok(())
    }

    fn register_channel(&self, device_id: u64, channel: SharedChannel<Self>) {
        self.inner.lock().channels.entry(device_id).or_default().push(channel);
    }

    fn unregister_channel(&self, device_id: u64, channel: &SharedChannel<Self>) {
        if let Some(channels) = self.inner.lock().channels.get_mut(&device_id) {
            channels.retain(|c| !Arc::ptr_eq(c, channel));
        }
    }

    fn for_each_channel(&self, device_id: u64, f: &mut dyn FnMut(&mut RaidChannel<Self>)) {
        let channels = self.inner.lock().channels.get(&device_id).cloned().unwrap_or_default();
        for channel in channels {
            f(&mut channel.lock());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_ext_fails_for_unknown_name() {
        let host = MockHost::new();
        assert_eq!(host.open_ext("ghost", false), Err(RaidError::NotFound("base name not known")));
    }

    #[test]
    fn claim_is_exclusive() {
        let host = MockHost::new();
        host.register_base("b0", 100, 512);
        let desc = host.open_ext("b0", true).unwrap();
        host.claim(&desc).unwrap();
        assert_eq!(host.claim(&desc), Err(RaidError::Busy("base already claimed")));
    }

    #[test]
    fn reset_fails_once_then_succeeds() {
        let host = MockHost::new();
        let desc = host.add_base("b0", 100, 512);
        let channel = host.get_io_channel(&desc).unwrap();
        host.queue_nomem_once(desc);
        let done = Arc::new(SpinLock::new(None));
        let done2 = done.clone();
        let complete: Completion = Arc::new(move |s| *done2.lock() = Some(s));
        assert_eq!(host.submit_reset(&channel, complete.clone()), Err(IoStatus::NoMem));
        assert!(done.lock().is_none());
        assert_eq!(host.submit_reset(&channel, complete), Ok(()));
        assert_eq!(*done.lock(), Some(IoStatus::Success));
    }
}
