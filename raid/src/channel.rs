//! Per-executor resource topology.
//!
//! One [`RaidChannel`] exists per executor thread per RAID device, created
//! and destroyed by the host framework as executors start and stop. It
//! holds no pointer back to the owning [`crate::device::RaidDevice`] — the
//! design notes rule out shared/cyclic ownership, and the data plane never
//! needs one: `submit_rw` is handed both the device and the channel
//! explicitly by the core.

use alloc::sync::Arc;
use alloc::vec::Vec;

use raid_async::sync::spin::SpinLock;

use crate::device::RaidDevice;
use crate::error::RaidResult;
use crate::host::HostOps;
use crate::io::SharedChannel;
use crate::level::LevelModule;

pub struct RaidChannel<H: HostOps> {
    pub base_channels: Vec<Option<H::Channel>>,
    pub module_channel: Option<()>,
}

impl<H: HostOps> RaidChannel<H> {
    /// Iterates slots under the array lock; for each slot with a
    /// descriptor, obtains a base channel; leaves vacant slots null. Asks
    /// `level` for its own module-private channel, if any. On any failure,
    /// releases everything already acquired and returns the error.
    /// Registers the result with the host so [`HostOps::for_each_channel`]
    /// can reach it later, e.g. on slot removal.
    pub fn create(device: &RaidDevice<H>, host: &Arc<H>, level: &dyn LevelModule<H>) -> RaidResult<SharedChannel<H>> {
        let mut base_channels = Vec::with_capacity(device.slots.len());
        for slot in device.slots.iter() {
            match &slot.desc {
                Some(desc) => match host.get_io_channel(desc) {
                    Ok(channel) => base_channels.push(Some(channel)),
                    Err(err) => {
                        for channel in base_channels.into_iter().flatten() {
                            host.put_io_channel(channel);
                        }
                        return Err(err);
                    }
                },
                None => base_channels.push(None),
            }
        }
        let module_channel = level.get_io_channel(device);
        let shared = Arc::new(SpinLock::new(RaidChannel {
            base_channels,
            module_channel,
        }));
        host.register_channel(device.device_id, shared.clone());
        Ok(shared)
    }

    /// Unregisters `shared` from the host and releases every base channel
    /// it still holds.
    pub fn destroy(shared: &SharedChannel<H>, device_id: u64, host: &Arc<H>) {
        host.unregister_channel(device_id, shared);
        let base_channels = core::mem::take(&mut shared.lock().base_channels);
        for channel in base_channels.into_iter().flatten() {
            host.put_io_channel(channel);
        }
    }

    /// Releases and nulls the handle for `slot`, the way the host's
    /// per-channel iterator drives member removal (testable
    /// property 4): called on every executor's channel while the array is
    /// quiesced.
    pub fn release_slot(&mut self, slot: usize, host: &H) {
        if let Some(channel) = self.base_channels[slot].take() {
            host.put_io_channel(channel);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::mock::MockHost;
    use crate::level::concat::Concat;
    use crate::level::RaidLevel;
    use crate::membership::add_base;
    use crate::registry::RaidEngine;

    #[test]
    fn create_leaves_vacant_slots_null() {
        let engine = RaidEngine::new(MockHost::new());
        engine.register_level(alloc::boxed::Box::new(Concat)).unwrap();
        engine.host.register_base("b0", 1024, 512);
        let uuid = engine.generate_uuid();
        let device = RaidDevice::new_configuring("r0", uuid, RaidLevel::CONCAT, 2, 1, 0).unwrap();
        let shared = engine.insert_device(device);
        add_base(&engine, &shared, 0, "b0", None).unwrap();

        let device_id = shared.lock().device_id;
        let device = shared.lock();
        let channel = RaidChannel::create(&device, &engine.host, &Concat).unwrap();
        drop(device);
        assert!(channel.lock().base_channels[0].is_some());
        assert!(channel.lock().base_channels[1].is_none());
        RaidChannel::destroy(&channel, device_id, &engine.host);
    }
}
