//! Membership lifecycle: add-by-slot, binding, remove, delete, and resize
//! notification. `bind` is shared between a fresh "add" (which must pass
//! the superblock-presence guard) and examine's "existing" mode (which
//! skips it — see [`crate::examine`]).

use alloc::boxed::Box;
use alloc::sync::Arc;

use uuid::Uuid;

use crate::device::{RaidDevice, RaidState};
use crate::error::{name_from_str, RaidError, RaidResult};
use crate::host::HostOps;
use crate::io::SharedDevice;
use crate::level::LevelModule;
use crate::registry::RaidEngine;
use crate::superblock::{RaidSuperblock, SbBaseEntry, SbEntryState};

/// Computes the on-base data region for a newly bound slot: the reserved
/// header occupies the first `RESERVED_MIN_OFFSET` bytes, rounded up to the
/// device's optimal I/O boundary when it declares one.
fn default_data_offset(block_len: u32, optimal_io_boundary: u64) -> u64 {
    let mut offset = (crate::superblock::RESERVED_MIN_OFFSET + u64::from(block_len) - 1) / u64::from(block_len);
    if optimal_io_boundary > 0 && offset % optimal_io_boundary != 0 {
        offset += optimal_io_boundary - (offset % optimal_io_boundary);
    }
    offset
}

/// Binds an opened, claimed base into `slot_index`. `existing_mode` skips
/// the superblock-presence guard (examine's "existing" mode); a fresh add
/// enforces it.
fn bind<H: HostOps + 'static>(
    engine: &RaidEngine<H>,
    shared: &SharedDevice<H>,
    slot_index: usize,
    desc: H::Desc,
    declared_uuid: Option<Uuid>,
    existing_mode: bool,
) -> RaidResult<()> {
    let host = engine.host.clone();

    host.claim(&desc).map_err(|e| {
        host.close(desc.clone());
        e
    })?;

    let channel = match host.get_io_channel(&desc) {
        Ok(c) => c,
        Err(e) => {
            host.release(&desc);
            host.close(desc);
            return Err(e);
        }
    };

    let rollback = |host: &Arc<H>, desc: H::Desc, channel: H::Channel| {
        host.put_io_channel(channel);
        host.release(&desc);
        host.close(desc);
    };

    let block_len = host.block_len(&desc);
    let block_count = host.block_count(&desc);
    if host.has_md(&desc) {
        rollback(&host, desc, channel);
        return Err(RaidError::Unsupported("DIF/DIX metadata is not supported"));
    }

    let data_offset = default_data_offset(block_len, host.optimal_io_boundary(&desc));
    if data_offset >= block_count {
        rollback(&host, desc, channel);
        return Err(RaidError::InvalidArgument("base device too small for the reserved header"));
    }
    let data_size = block_count - data_offset;

    let base_uuid = host.base_uuid(&desc);
    if let Some(declared) = declared_uuid {
        if declared != base_uuid {
            rollback(&host, desc, channel);
            return Err(RaidError::InvalidArgument("pre-declared uuid does not match resolved base"));
        }
    }

    let mut device = shared.lock();

    if !existing_mode {
        match host.read_superblock(&desc) {
            Ok(Some(sb)) if device.superblock.as_ref().map(|cur| cur.uuid) != Some(sb.uuid) => {
                drop(device);
                rollback(&host, desc, channel);
                return Err(RaidError::AlreadyExists("base device already belongs to another array"));
            }
            Ok(_) => {}
            Err(e) => {
                drop(device);
                rollback(&host, desc, channel);
                return Err(e);
            }
        }
    }

    {
        let slot = &mut device.slots[slot_index];
        slot.uuid = Some(base_uuid);
        slot.desc = Some(desc);
        slot.app_channel = Some(channel);
        slot.data_offset = data_offset;
        slot.data_size = data_size;
        slot.block_count = block_count;
        slot.is_configured = true;
        slot.remove_scheduled = false;
    }
    device.discovered += 1;

    if device.state == RaidState::Configuring && device.is_ready_to_configure() {
        configure_array(engine, &mut *device)?;
    }
    Ok(())
}

/// Builds a fresh superblock, writes it to every configured member, and
/// flips the array ONLINE. The sequence number is bumped before the write,
/// never after.
fn configure_array<H: HostOps + 'static>(engine: &RaidEngine<H>, device: &mut RaidDevice<H>) -> RaidResult<()> {
    engine.with_level(device.level, |module| {
        let is_mirror = module.level() == crate::level::RaidLevel::RAID1;
        device.derive_geometry(engine.host.as_ref(), is_mirror)?;
        device.total_blocks = module.total_blocks(device);
        module.start(device)
    })?;

    if device.superblock_enabled {
        let seq = device.superblock.as_ref().map(|sb| sb.seq + 1).unwrap_or(1);
        let mut sb = RaidSuperblock::new(
            device.uuid,
            device.name.as_str(),
            device.level,
            device.strip_size_blocks,
            device.block_len,
            device.total_blocks,
            device.n,
        )?;
        sb.seq = seq;
        for (i, slot) in device.slots.iter().enumerate() {
            let Some(slot_uuid) = slot.uuid else { continue };
            let state = if slot.is_configured { SbEntryState::Configured } else { SbEntryState::Failed };
            sb.set_entry(SbBaseEntry::new(i as u32, state, slot_uuid, slot.data_offset, slot.data_size))?;
        }
        for slot in device.slots.iter() {
            if let Some(desc) = &slot.desc {
                engine.host.write_superblock(desc, &sb)?;
            }
        }
        device.superblock = Some(sb);
    }

    device.state = RaidState::Online;
    engine.host.bdev_register(device.device_id);
    raid_term::log!("array {} ({}) online with {} members", device.name.as_str(), device.uuid, device.n);
    Ok(())
}

/// Add-by-slot. Returns `Ok(())` both when the base is bound immediately
/// and when it is merely recorded pending (base not yet present in the
/// system — examine completes it later).
pub fn add_base<H: HostOps + 'static>(
    engine: &RaidEngine<H>,
    shared: &SharedDevice<H>,
    slot_index: u32,
    name: &str,
    uuid: Option<Uuid>,
) -> RaidResult<()> {
    let slot_index = slot_index as usize;
    let stored_name = name_from_str(name)?;

    {
        let mut device = shared.lock();
        let slot = device
            .slots
            .get(slot_index)
            .ok_or(RaidError::InvalidArgument("slot index out of range"))?;
        if !slot.is_vacant() {
            return Err(RaidError::InvalidArgument("slot is not vacant"));
        }
        let slot = &mut device.slots[slot_index];
        slot.name = Some(stored_name);
        slot.uuid = uuid;
    }

    match engine.host.open_ext(name, true) {
        Ok(desc) => bind(engine, shared, slot_index, desc, uuid, false).map_err(|e| {
            let mut device = shared.lock();
            device.slots[slot_index].name = None;
            device.slots[slot_index].uuid = None;
            e
        }),
        Err(RaidError::NotFound(_)) => Ok(()),
        Err(e) => {
            let mut device = shared.lock();
            device.slots[slot_index].name = None;
            device.slots[slot_index].uuid = None;
            Err(e)
        }
    }
}

/// Binds a base already resolved by examine (its "existing" mode): skips
/// the superblock-presence guard since the caller already matched the
/// candidate against a known array.
pub fn bind_existing<H: HostOps + 'static>(
    engine: &RaidEngine<H>,
    shared: &SharedDevice<H>,
    slot_index: usize,
    desc: H::Desc,
    uuid: Uuid,
) -> RaidResult<()> {
    bind(engine, shared, slot_index, desc, Some(uuid), true)
}

/// Deconfigures the array: drops it out of service without tearing down
/// in-memory state, used by both a fatal remove and delete.
fn deconfigure<H: HostOps + 'static>(engine: &RaidEngine<H>, device: &mut RaidDevice<H>) {
    engine.host.bdev_unregister(device.device_id);
    device.state = RaidState::Offline;
}

/// Removes a base from a slot. `slot_index` must name a currently
/// configured slot; removing an already-vacant/removed slot is the
/// idempotent "double remove" case and returns `Ok(())`. `remove_cb`, if
/// given, fires once the slot has been fully freed — on the benign path
/// that is synchronous within this call; on the fatal (deconfigure) path
/// it fires once [`delete`] or a later benign remove actually frees the
/// slot.
pub fn remove_base<H: HostOps + 'static>(
    engine: &RaidEngine<H>,
    shared: &SharedDevice<H>,
    slot_index: u32,
    remove_cb: Option<Box<dyn FnOnce() + Send>>,
) -> RaidResult<()> {
    let slot_index = slot_index as usize;
    let host = engine.host.clone();
    let mut device = shared.lock();
    let slot = device
        .slots
        .get(slot_index)
        .ok_or(RaidError::InvalidArgument("slot index out of range"))?;
    if !slot.is_configured {
        return Ok(());
    }
    if let Some(cb) = remove_cb {
        device.slots[slot_index].remove_cb = Some(cb);
    }

    if device.state != RaidState::Online {
        free_slot(&host, &mut *device, slot_index);
        if device.discovered == 0 {
            deconfigure(engine, &mut *device);
        }
        return Ok(());
    }

    let would_be = device.operational - 1;
    let required = engine.with_level(device.level, |m| m.constraint().min_operational(device.n))?;
    if would_be < required {
        raid_term::log!("array {} falls below min_operational on slot {} removal, taking offline", device.name.as_str(), slot_index);
        device.slots[slot_index].remove_scheduled = true;
        deconfigure(engine, &mut *device);
        return Ok(());
    }

    device.operational = would_be;
    let device_id = device.device_id;
    host.quiesce(device_id);
    host.for_each_channel(device_id, &mut |channel| channel.release_slot(slot_index, host.as_ref()));
    host.unquiesce(device_id);
    let had_superblock = device.superblock.is_some();
    free_slot(&host, &mut *device, slot_index);

    if had_superblock {
        let mut sb = device.superblock.take().unwrap();
        sb.mark_failed(slot_index as u32)?;
        for slot in device.slots.iter() {
            if let Some(desc) = &slot.desc {
                host.write_superblock(desc, &sb)?;
            }
        }
        device.superblock = Some(sb);
    }
    Ok(())
}

fn free_slot<H: HostOps>(host: &Arc<H>, device: &mut RaidDevice<H>, slot_index: usize) {
    let slot = &mut device.slots[slot_index];
    if let Some(channel) = slot.app_channel.take() {
        host.put_io_channel(channel);
    }
    if let Some(desc) = slot.desc.take() {
        host.release(&desc);
        host.close(desc);
    }
    slot.name = None;
    slot.uuid = None;
    slot.data_offset = 0;
    slot.data_size = 0;
    slot.block_count = 0;
    slot.is_configured = false;
    slot.remove_scheduled = false;
    device.discovered = device.discovered.saturating_sub(1);
    if let Some(cb) = slot.remove_cb.take() {
        cb();
    }
}

/// Deletes the array: idempotent, schedules removal of every slot, and
/// frees everything synchronously unless the array is ONLINE.
pub fn delete<H: HostOps + 'static>(engine: &RaidEngine<H>, shared: &SharedDevice<H>) -> RaidResult<()> {
    let host = engine.host.clone();
    let mut device = shared.lock();
    if device.destroy_started {
        return Err(RaidError::AlreadyExists("delete already in progress"));
    }
    device.destroy_started = true;
    raid_term::log!("array {} ({}) delete requested", device.name.as_str(), device.uuid);

    let online = device.state == RaidState::Online;
    let n = device.slots.len();
    for i in 0..n {
        if device.slots[i].is_configured {
            device.slots[i].remove_scheduled = true;
            if !online {
                free_slot(&host, &mut *device, i);
            }
        }
    }
    if online {
        deconfigure(engine, &mut *device);
    } else {
        device.state = RaidState::Offline;
    }
    drop(device);
    engine.remove_device(shared.lock().uuid);
    Ok(())
}

/// Resize notification: the core only observes the new block count and
/// forwards to the level module's resize hook, if any.
pub fn notify_resize<H: HostOps + 'static>(engine: &RaidEngine<H>, shared: &SharedDevice<H>, slot_index: u32, new_block_count: u64) -> RaidResult<()> {
    let mut device = shared.lock();
    let slot_index = slot_index as usize;
    device
        .slots
        .get_mut(slot_index)
        .ok_or(RaidError::InvalidArgument("slot index out of range"))?
        .block_count = new_block_count;
    engine.with_level(device.level, |module| module.resize(&device))
}
