//! Full mirroring (`strip_size_kb == 0`).
//!
//! Reads go to the first operational member; writes fan out to every
//! operational member and ride the same partial-completion aggregator as
//! everything else — here one "part" is one member write, since the
//! aggregator is unit-agnostic.

use alloc::sync::Arc;
use alloc::vec::Vec;

use crate::device::RaidDevice;
use crate::error::{IoStatus, RaidResult};
use crate::host::HostOps;
use crate::io::{submit_slot, IoKind, RaidIoCtx, SharedChannel, SharedDevice};
use crate::level::{Constraint, LevelModule, RaidLevel};

pub struct Mirror;

/// Every slot with both a live base channel and a configured member —
/// the fan-out target set for a mirror write, flush, or unmap.
fn mirror_targets<H: HostOps>(device: &SharedDevice<H>, channel: &SharedChannel<H>) -> Vec<usize> {
    let dev = device.lock();
    let chan = channel.lock();
    chan.base_channels
        .iter()
        .enumerate()
        .filter(|(i, c)| c.is_some() && dev.slots[*i].is_configured)
        .map(|(i, _)| i)
        .collect()
}

impl<H: HostOps> LevelModule<H> for Mirror {
    fn level(&self) -> RaidLevel {
        RaidLevel::RAID1
    }

    fn base_bdevs_min(&self) -> u32 {
        1
    }

    fn constraint(&self) -> Constraint {
        Constraint::MinOperational(1)
    }

    fn total_blocks(&self, device: &RaidDevice<H>) -> u64 {
        device.configured_slots().map(|s| s.data_size).min().unwrap_or(0)
    }

    fn start(&self, _device: &RaidDevice<H>) -> RaidResult<()> {
        Ok(())
    }

    fn submit_rw(&self, device: &SharedDevice<H>, channel: &SharedChannel<H>, host: &Arc<H>, io: &RaidIoCtx) {
        match io.kind {
            IoKind::Read => {
                let first = mirror_targets(device, channel).into_iter().next();
                match first {
                    None => io.fail(IoStatus::Failed),
                    Some(slot) => {
                        io.set_remaining(1);
                        let offset = io.offset;
                        let len = io.len;
                        submit_slot(device, channel, host, io, slot, move |h: &H, c, completion| h.submit_read(c, offset, len, completion));
                    }
                }
            }
            IoKind::Write => {
                let targets = mirror_targets(device, channel);
                if targets.is_empty() {
                    io.fail(IoStatus::Failed);
                    return;
                }
                io.set_remaining(targets.len() as u32);
                let offset = io.offset;
                let len = io.len;
                for slot in targets {
                    submit_slot(device, channel, host, io, slot, move |h: &H, c, completion| h.submit_write(c, offset, len, completion));
                }
            }
            _ => io.fail(IoStatus::Failed),
        }
    }

    fn supports_null_payload(&self) -> bool {
        true
    }

    fn submit_null_payload(&self, device: &SharedDevice<H>, channel: &SharedChannel<H>, host: &Arc<H>, io: &RaidIoCtx) {
        let targets = mirror_targets(device, channel);
        if targets.is_empty() {
            io.fail(IoStatus::Failed);
            return;
        }
        io.set_remaining(targets.len() as u32);
        let kind = io.kind;
        let offset = io.offset;
        let len = io.len;
        for slot in targets {
            submit_slot(device, channel, host, io, slot, move |h: &H, c, completion| match kind {
                IoKind::Flush => h.submit_flush(c, completion),
                IoKind::Unmap => h.submit_unmap(c, offset, len, completion),
                _ => unreachable!("submit_null_payload only handles Flush/Unmap"),
            });
        }
    }
}
