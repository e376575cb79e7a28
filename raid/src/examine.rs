//! Examine / assembly: the host framework calls [`examine`] once per base
//! device it discovers. A valid superblock is reconciled against any
//! in-memory device sharing its array UUID by sequence number; absent a
//! superblock, a base is matched to a pending slot by pre-declared name.

use crate::device::{RaidDevice, RaidState};
use crate::error::RaidResult;
use crate::host::HostOps;
use crate::io::SharedDevice;
use crate::membership::bind_existing;
use crate::registry::RaidEngine;
use crate::superblock::{RaidSuperblock, SbEntryState};
use uuid::Uuid;

enum Verdict {
    UseCandidate,
    UseCurrent,
    ReplaceCurrent,
    Ignore,
}

/// Examines one base device by name. The candidate superblock is read
/// through a transient, read-only descriptor that is closed as soon as
/// that read is done; binding a member permanently always happens through
/// a second, write-capable descriptor opened fresh for that purpose, the
/// same two-descriptor split a claiming open performs.
pub fn examine<H: HostOps + 'static>(engine: &RaidEngine<H>, name: &str) -> RaidResult<()> {
    let probe = engine.host.open_ext(name, false)?;
    let base_uuid = engine.host.base_uuid(&probe);
    let sb_result = engine.host.read_superblock(&probe);
    engine.host.close(probe);

    match sb_result {
        Ok(Some(sb)) => {
            let desc = engine.host.open_ext(name, true)?;
            reconcile(engine, base_uuid, desc, sb)
        }
        Ok(None) => {
            let desc = engine.host.open_ext(name, true)?;
            bind_by_declared_name(engine, name, base_uuid, desc)
        }
        Err(_) => Ok(()),
    }
}

fn reconcile<H: HostOps + 'static>(engine: &RaidEngine<H>, base_uuid: Uuid, desc: H::Desc, sb: RaidSuperblock) -> RaidResult<()> {
    let existing = engine.find_by_uuid(sb.uuid);

    let (shared, reference) = match existing {
        None => {
            let shared = synthesize(engine, &sb)?;
            (shared, sb)
        }
        Some(shared) => {
            let verdict = {
                let device = shared.lock();
                match &device.superblock {
                    None => Verdict::UseCandidate,
                    Some(current) if sb.seq > current.seq && device.state == RaidState::Configuring => Verdict::ReplaceCurrent,
                    Some(current) if sb.seq > current.seq => Verdict::Ignore,
                    Some(_) => Verdict::UseCurrent,
                }
            };
            match verdict {
                Verdict::Ignore => {
                    engine.host.close(desc);
                    return Ok(());
                }
                Verdict::ReplaceCurrent => {
                    let uuid = shared.lock().uuid;
                    raid_term::log!("examine: superblock seq {} supersedes in-memory array {}", sb.seq, uuid);
                    engine.remove_device(uuid);
                    let fresh = synthesize(engine, &sb)?;
                    (fresh, sb)
                }
                Verdict::UseCandidate => (shared, sb),
                Verdict::UseCurrent => {
                    let current = shared.lock().superblock.clone().unwrap();
                    (shared, current)
                }
            }
        }
    };

    let Some(entry) = reference.entries.iter().find(|e| e.uuid() == base_uuid).copied() else {
        engine.host.close(desc);
        return Ok(());
    };
    if entry.state() != Ok(SbEntryState::Configured) {
        engine.host.close(desc);
        return Ok(());
    }
    bind_existing(engine, &shared, entry.slot as usize, desc, base_uuid)
}

/// No in-memory device shares this superblock's array UUID: build one,
/// pre-declaring every currently-CONFIGURED member's slot so later
/// `examine` calls for sibling bases resolve by UUID immediately.
fn synthesize<H: HostOps + 'static>(engine: &RaidEngine<H>, sb: &RaidSuperblock) -> RaidResult<SharedDevice<H>> {
    raid_term::log!("examine: synthesizing array {} ({}) from superblock, seq {}", sb.uuid, sb.name.as_str(), sb.seq);
    let operational = sb.entries.iter().filter(|e| e.state() == Ok(SbEntryState::Configured)).count() as u32;
    let min_operational = engine.with_level(sb.level, |m| m.constraint().min_operational(sb.base_slot_count))?;
    let mut device = RaidDevice::from_superblock(sb, operational, min_operational)?;
    for entry in sb.entries.iter() {
        if entry.state() == Ok(SbEntryState::Configured) {
            if let Some(slot) = device.slots.get_mut(entry.slot as usize) {
                slot.uuid = Some(entry.uuid());
                slot.data_offset = entry.data_offset;
                slot.data_size = entry.data_size;
            }
        }
    }
    Ok(engine.insert_device(device))
}

/// No valid superblock on this base: look for a vacant slot across every
/// in-memory device that pre-declared this base's name, and bind it there.
fn bind_by_declared_name<H: HostOps + 'static>(engine: &RaidEngine<H>, name: &str, base_uuid: Uuid, desc: H::Desc) -> RaidResult<()> {
    for shared in engine.devices() {
        let slot_index = {
            let device = shared.lock();
            device
                .slots
                .iter()
                .position(|s| !s.is_configured && s.name.as_ref().map(|n| n.as_str()) == Some(name))
        };
        if let Some(slot_index) = slot_index {
            return bind_existing(engine, &shared, slot_index, desc, base_uuid);
        }
    }
    engine.host.close(desc);
    Ok(())
}
