//! Striping, no redundancy (`UNSET` constraint — any member loss
//! takes the array offline). `submit_rw` splits a request at strip
//! boundaries and issues one sub-I/O per strip touched, each being one
//! "part" in the aggregator.

use alloc::sync::Arc;
use alloc::vec::Vec;

use crate::device::RaidDevice;
use crate::error::{IoStatus, RaidResult};
use crate::host::HostOps;
use crate::io::{submit_slot, IoKind, RaidIoCtx, SharedChannel, SharedDevice};
use crate::level::{Constraint, LevelModule, RaidLevel};

pub struct Stripe0;

struct Segment {
    slot: usize,
    local_offset: u64,
    len: u64,
}

/// Splits a `[offset, offset+len)` logical range into one segment per strip
/// boundary crossed, round-robining across `n` members of `strip_blocks`
/// each.
fn split(offset: u64, len: u64, strip_blocks: u32, n: u32) -> Vec<Segment> {
    let strip_blocks = strip_blocks as u64;
    let n = n as u64;
    let mut segments = Vec::new();
    let mut cur = offset;
    let mut remaining = len;
    while remaining > 0 {
        let stripe_index = cur / strip_blocks;
        let slot = (stripe_index % n) as usize;
        let pos_in_strip = cur % strip_blocks;
        let room = strip_blocks - pos_in_strip;
        let seg_len = remaining.min(room);
        let local_offset = (stripe_index / n) * strip_blocks + pos_in_strip;
        segments.push(Segment { slot, local_offset, len: seg_len });
        cur += seg_len;
        remaining -= seg_len;
    }
    segments
}

impl<H: HostOps> LevelModule<H> for Stripe0 {
    fn level(&self) -> RaidLevel {
        RaidLevel::RAID0
    }

    fn base_bdevs_min(&self) -> u32 {
        1
    }

    fn constraint(&self) -> Constraint {
        Constraint::Unset
    }

    fn total_blocks(&self, device: &RaidDevice<H>) -> u64 {
        let per_member = device.configured_slots().map(|s| s.data_size).min().unwrap_or(0);
        per_member * device.n as u64
    }

    fn start(&self, _device: &RaidDevice<H>) -> RaidResult<()> {
        Ok(())
    }

    fn submit_rw(&self, device: &SharedDevice<H>, channel: &SharedChannel<H>, host: &Arc<H>, io: &RaidIoCtx) {
        let (strip_size_blocks, n) = {
            let dev = device.lock();
            (dev.strip_size_blocks, dev.n)
        };
        if strip_size_blocks == 0 {
            io.fail(IoStatus::Failed);
            return;
        }
        let segments = split(io.offset, io.len, strip_size_blocks, n);
        io.set_remaining(segments.len() as u32);
        let kind = io.kind;
        for segment in segments {
            let local_offset = segment.local_offset;
            let len = segment.len;
            submit_slot(device, channel, host, io, segment.slot, move |h: &H, c, completion| match kind {
                IoKind::Read => h.submit_read(c, local_offset, len, completion),
                IoKind::Write => h.submit_write(c, local_offset, len, completion),
                _ => unreachable!("submit_rw only handles Read/Write"),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_segment_within_one_strip() {
        let segments = split(4, 4, 16, 3);
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].slot, 0);
        assert_eq!(segments[0].local_offset, 4);
        assert_eq!(segments[0].len, 4);
    }

    #[test]
    fn crossing_a_strip_boundary_splits_across_members() {
        // strip = 16 blocks, 2 members: request [12, 12+8) crosses from
        // strip 0 (member 0) into strip 1 (member 1).
        let segments = split(12, 8, 16, 2);
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].slot, 0);
        assert_eq!(segments[0].local_offset, 12);
        assert_eq!(segments[0].len, 4);
        assert_eq!(segments[1].slot, 1);
        assert_eq!(segments[1].local_offset, 0);
        assert_eq!(segments[1].len, 4);
    }

    #[test]
    fn round_robins_across_members_on_successive_strips() {
        let segments = split(0, 16 * 3, 16, 2);
        assert_eq!(segments.len(), 3);
        assert_eq!((segments[0].slot, segments[0].local_offset), (0, 0));
        assert_eq!((segments[1].slot, segments[1].local_offset), (1, 0));
        assert_eq!((segments[2].slot, segments[2].local_offset), (0, 16));
    }
}
