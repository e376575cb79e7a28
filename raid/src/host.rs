//! The host block-device framework contract, expressed as a Rust
//! trait instead of free functions against one hardwired device type. The
//! engine (`RaidDevice`, the I/O path, examine) is generic over `H:
//! HostOps` so production code links a real host crate while tests link
//! [`mock`].
//!
//! Every submit method is asynchronous in spirit even though [`mock`]
//! invokes `complete` synchronously: a real host queues the operation and
//! calls `complete` from whatever context the underlying device completes
//! on. `Err(IoStatus::NoMem)` means "not submitted, try again later" and is
//! the only retryable failure (the back-pressure rule below); any other
//! `Err` is an immediate, non-retryable submission failure.

use alloc::sync::Arc;

use uuid::Uuid;

use crate::channel::RaidChannel;
use crate::error::{IoStatus, RaidResult};
use crate::io::SharedChannel;
use crate::superblock::RaidSuperblock;

/// Invoked exactly once per accepted submission, regardless of how many
/// underlying device operations it decomposes into.
pub type Completion = Arc<dyn Fn(IoStatus) + Send + Sync>;

pub trait HostOps: Send + Sync {
    type Desc: Clone + Send;
    type Channel: Send;

    fn open_ext(&self, name: &str, write: bool) -> RaidResult<Self::Desc>;
    fn close(&self, desc: Self::Desc);

    fn claim(&self, desc: &Self::Desc) -> RaidResult<()>;
    fn release(&self, desc: &Self::Desc);

    fn get_io_channel(&self, desc: &Self::Desc) -> RaidResult<Self::Channel>;
    fn put_io_channel(&self, channel: Self::Channel);

    fn block_len(&self, desc: &Self::Desc) -> u32;
    fn block_count(&self, desc: &Self::Desc) -> u64;
    fn optimal_io_boundary(&self, desc: &Self::Desc) -> u64;
    fn has_md(&self, desc: &Self::Desc) -> bool;

    /// The bdev's own intrinsic identity (e.g. its GPT/partition UUID),
    /// independent of any RAID array — the value examine matches superblock
    /// entries against and a pre-declared slot UUID is cross-checked against.
    fn base_uuid(&self, desc: &Self::Desc) -> Uuid;

    fn read_superblock(&self, desc: &Self::Desc) -> RaidResult<Option<RaidSuperblock>>;
    fn write_superblock(&self, desc: &Self::Desc, sb: &RaidSuperblock) -> RaidResult<()>;

    fn submit_read(
        &self,
        channel: &Self::Channel,
        offset: u64,
        len: u64,
        complete: Completion,
    ) -> Result<(), IoStatus>;
    fn submit_write(
        &self,
        channel: &Self::Channel,
        offset: u64,
        len: u64,
        complete: Completion,
    ) -> Result<(), IoStatus>;
    fn submit_flush(&self, channel: &Self::Channel, complete: Completion) -> Result<(), IoStatus>;
    fn submit_unmap(
        &self,
        channel: &Self::Channel,
        offset: u64,
        len: u64,
        complete: Completion,
    ) -> Result<(), IoStatus>;
    fn submit_reset(&self, channel: &Self::Channel, complete: Completion) -> Result<(), IoStatus>;

    fn supports_flush(&self, desc: &Self::Desc) -> bool;
    fn supports_unmap(&self, desc: &Self::Desc) -> bool;
    fn supports_reset(&self, desc: &Self::Desc) -> bool;

    /// Pauses the data plane for the array identified by `device_id` until
    /// [`HostOps::unquiesce`]: no in-flight submissions remain across any
    /// executor once this returns.
    fn quiesce(&self, device_id: u64);
    fn unquiesce(&self, device_id: u64);

    fn bdev_register(&self, device_id: u64);
    fn bdev_unregister(&self, device_id: u64);

    /// Obtains a read buffer of `len` blocks. Named `get_io_buf(req, cb,
    /// len)` in the data model as an asynchronous call; this contract
    /// resolves it synchronously, the same simplification every other
    /// submit primitive here already makes (`Err` is the only failure a
    /// caller needs: a buffer-exhaustion failure completes the request
    /// FAILED outright, it is not on the `-ENOMEM` retry path).
    fn get_io_buf(&self, len: u64) -> Result<(), ()>;

    /// Registers a per-executor channel so [`HostOps::for_each_channel`]
    /// can reach it later, e.g. when a slot is removed while the array
    /// stays online. Called once by [`RaidChannel::create`].
    fn register_channel(&self, device_id: u64, channel: SharedChannel<Self>)
    where
        Self: Sized;

    /// Reverses [`HostOps::register_channel`]. Called once by
    /// [`RaidChannel::destroy`].
    fn unregister_channel(&self, device_id: u64, channel: &SharedChannel<Self>)
    where
        Self: Sized;

    /// Invokes `f` once per channel currently registered for `device_id` —
    /// every executor's [`RaidChannel`], in registration order. Used to
    /// drop a removed slot's handle everywhere while the array is
    /// quiesced.
    fn for_each_channel(&self, device_id: u64, f: &mut dyn FnMut(&mut RaidChannel<Self>))
    where
        Self: Sized;
}

#[cfg(test)]
pub mod mock;
