//! Concatenation / linear (`UNSET` constraint, `min_operational = N`
//! — any single member loss takes the array offline). No parity, no
//! striping: `submit_rw` maps an LBA range to exactly one member by
//! cumulative size.

use alloc::sync::Arc;

use crate::device::RaidDevice;
use crate::error::{IoStatus, RaidResult};
use crate::host::HostOps;
use crate::io::{submit_slot, IoKind, RaidIoCtx, SharedChannel, SharedDevice};
use crate::level::{Constraint, LevelModule, RaidLevel};

pub struct Concat;

/// Locates the slot owning logical block `offset` and the block offset
/// within that slot, walking slots in index order and summing `data_size`.
fn locate<H: HostOps>(device: &RaidDevice<H>, offset: u64) -> Option<(usize, u64)> {
    let mut base = 0u64;
    for (i, slot) in device.slots.iter().enumerate() {
        if !slot.is_configured {
            continue;
        }
        if offset < base + slot.data_size {
            return Some((i, offset - base));
        }
        base += slot.data_size;
    }
    None
}

impl<H: HostOps> LevelModule<H> for Concat {
    fn level(&self) -> RaidLevel {
        RaidLevel::CONCAT
    }

    fn base_bdevs_min(&self) -> u32 {
        1
    }

    fn constraint(&self) -> Constraint {
        Constraint::Unset
    }

    fn total_blocks(&self, device: &RaidDevice<H>) -> u64 {
        device.configured_slots().map(|s| s.data_size).sum()
    }

    fn start(&self, _device: &RaidDevice<H>) -> RaidResult<()> {
        Ok(())
    }

    fn submit_rw(&self, device: &SharedDevice<H>, channel: &SharedChannel<H>, host: &Arc<H>, io: &RaidIoCtx) {
        let located = locate(&device.lock(), io.offset);
        let Some((slot, local_offset)) = located else {
            io.fail(IoStatus::Failed);
            return;
        };
        io.set_remaining(1);
        let len = io.len;
        let kind = io.kind;
        submit_slot(device, channel, host, io, slot, move |h: &H, c, completion| match kind {
            IoKind::Read => h.submit_read(c, local_offset, len, completion),
            IoKind::Write => h.submit_write(c, local_offset, len, completion),
            _ => unreachable!("submit_rw only handles Read/Write"),
        });
    }

    fn supports_null_payload(&self) -> bool {
        true
    }

    fn submit_null_payload(&self, device: &SharedDevice<H>, channel: &SharedChannel<H>, host: &Arc<H>, io: &RaidIoCtx) {
        let located = locate(&device.lock(), io.offset);
        let Some((slot, local_offset)) = located else {
            io.fail(IoStatus::Failed);
            return;
        };
        io.set_remaining(1);
        let len = io.len;
        let kind = io.kind;
        submit_slot(device, channel, host, io, slot, move |h: &H, c, completion| match kind {
            IoKind::Flush => h.submit_flush(c, completion),
            IoKind::Unmap => h.submit_unmap(c, local_offset, len, completion),
            _ => unreachable!("submit_null_payload only handles Flush/Unmap"),
        });
    }
}
