//! RAID device core: membership array, state machine, geometry, and the
//! array-wide lock covering membership mutation.
//!
//! A single device's fields are almost always accessed through
//! `SpinLock<RaidDevice<H>>` (see [`crate::registry::RaidEngine`]); nothing
//! in this module takes that lock itself, since callers already hold it for
//! the duration of a control-plane operation and the data plane only peeks
//! at slot descriptors briefly while building a [`crate::channel::RaidChannel`].

use alloc::vec::Vec;
use core::sync::atomic::{AtomicU64, Ordering};

use uuid::Uuid;

use crate::base::BaseSlot;
use crate::error::{name_from_str, Name, RaidError, RaidResult};
use crate::host::HostOps;
use crate::level::RaidLevel;
use crate::superblock::RaidSuperblock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RaidState {
    Configuring,
    Online,
    Offline,
}

static NEXT_DEVICE_ID: AtomicU64 = AtomicU64::new(1);

pub struct RaidDevice<H: HostOps> {
    pub device_id: u64,
    pub name: Name,
    pub uuid: Uuid,
    pub level: RaidLevel,

    pub block_len: u32,
    pub block_len_shift: u32,
    pub total_blocks: u64,

    pub strip_size_kb: u32,
    pub strip_size_blocks: u32,
    pub strip_size_shift: u32,

    pub n: u32,
    pub discovered: u32,
    pub operational: u32,
    pub min_operational: u32,

    pub destroy_started: bool,
    pub state: RaidState,
    pub has_md: bool,

    pub slots: Vec<BaseSlot<H>>,
    pub superblock_enabled: bool,
    pub superblock: Option<RaidSuperblock>,
}

fn log2_u32(v: u32) -> RaidResult<u32> {
    if v == 0 || !v.is_power_of_two() {
        return Err(RaidError::InvalidArgument("value is not a positive power of two"));
    }
    Ok(v.trailing_zeros())
}

impl<H: HostOps> RaidDevice<H> {
    pub fn new_configuring(
        name: &str,
        uuid: Uuid,
        level: RaidLevel,
        n: u32,
        min_operational: u32,
        strip_size_kb: u32,
    ) -> RaidResult<Self> {
        if n == 0 {
            return Err(RaidError::InvalidArgument("array must declare at least one member"));
        }
        if min_operational == 0 || min_operational > n {
            return Err(RaidError::InvalidArgument("min_operational out of range"));
        }
        let mut slots = Vec::with_capacity(n as usize);
        for _ in 0..n {
            slots.push(BaseSlot::vacant());
        }
        Ok(RaidDevice {
            device_id: NEXT_DEVICE_ID.fetch_add(1, Ordering::Relaxed),
            name: name_from_str(name)?,
            uuid,
            level,
            block_len: 0,
            block_len_shift: 0,
            total_blocks: 0,
            strip_size_kb,
            strip_size_blocks: 0,
            strip_size_shift: 0,
            n,
            discovered: 0,
            operational: n,
            min_operational,
            destroy_started: false,
            state: RaidState::Configuring,
            has_md: false,
            slots,
            superblock_enabled: false,
            superblock: None,
        })
    }

    pub fn is_ready_to_configure(&self) -> bool {
        self.discovered == self.operational
    }

    /// Synthesizes a CONFIGURING device from a candidate superblock (the
    /// "no in-memory device" branch of examine): geometry is already known
    /// from the disk image, so unlike [`Self::new_configuring`] it is not
    /// re-derived until the first bind completes the array.
    pub fn from_superblock(sb: &RaidSuperblock, operational: u32, min_operational: u32) -> RaidResult<Self> {
        if sb.base_slot_count == 0 {
            return Err(RaidError::Corrupt("superblock declares zero base slots"));
        }
        let mut slots = Vec::with_capacity(sb.base_slot_count as usize);
        for _ in 0..sb.base_slot_count {
            slots.push(BaseSlot::vacant());
        }
        Ok(RaidDevice {
            device_id: NEXT_DEVICE_ID.fetch_add(1, Ordering::Relaxed),
            name: sb.name.clone(),
            uuid: sb.uuid,
            level: sb.level,
            block_len: sb.block_size,
            block_len_shift: log2_u32(sb.block_size)?,
            total_blocks: sb.total_blocks,
            strip_size_kb: 0,
            strip_size_blocks: sb.strip_size_blocks,
            strip_size_shift: if sb.strip_size_blocks == 0 { 0 } else { log2_u32(sb.strip_size_blocks)? },
            n: sb.base_slot_count,
            discovered: 0,
            operational,
            min_operational,
            destroy_started: false,
            state: RaidState::Configuring,
            has_md: false,
            slots,
            superblock_enabled: true,
            superblock: Some(sb.clone()),
        })
    }

    /// Geometry derivation, run once at CONFIGURING→ONLINE. `is_mirror`
    /// selects the one level-specific rule the core itself must enforce
    /// (strip size zero iff mirroring); everything else here is
    /// level-agnostic.
    pub fn derive_geometry(&mut self, host: &H, is_mirror: bool) -> RaidResult<()> {
        let mut block_len = None;
        let mut has_md = None;
        for slot in self.slots.iter() {
            let Some(desc) = &slot.desc else { continue };
            let len = host.block_len(desc);
            match block_len {
                None => block_len = Some(len),
                Some(existing) if existing == len => {}
                Some(_) => return Err(RaidError::InvalidArgument("members have differing block lengths")),
            }
            let md = host.has_md(desc);
            match has_md {
                None => has_md = Some(md),
                Some(existing) if existing == md => {}
                Some(_) => return Err(RaidError::Unsupported("metadata mode is not uniform across members")),
            }
            if md {
                return Err(RaidError::Unsupported("DIF/DIX metadata is not supported"));
            }
        }
        let block_len = block_len.ok_or(RaidError::InvalidArgument("no configured members"))?;
        self.block_len = block_len;
        self.block_len_shift = log2_u32(block_len)?;
        self.has_md = has_md.unwrap_or(false);

        if is_mirror {
            if self.strip_size_kb != 0 {
                return Err(RaidError::InvalidArgument("mirror level requires strip_size_kb == 0"));
            }
            self.strip_size_blocks = 0;
            self.strip_size_shift = 0;
        } else {
            let strip_size_blocks = (self.strip_size_kb as u64 * 1024 / block_len as u64) as u32;
            if strip_size_blocks == 0 {
                return Err(RaidError::InvalidArgument("strip size is smaller than one block"));
            }
            self.strip_size_shift = log2_u32(strip_size_blocks)?;
            self.strip_size_blocks = strip_size_blocks;
        }
        Ok(())
    }

    pub fn configured_slots(&self) -> impl Iterator<Item = &BaseSlot<H>> {
        self.slots.iter().filter(|s| s.is_configured)
    }

    /// Capability query: READ/WRITE always; FLUSH/UNMAP need module support
    /// *and* every configured base to support the type; vacant slots are
    /// skipped in the quorum.
    pub fn supports_flush(&self, host: &H, module_has_null_payload: bool) -> bool {
        module_has_null_payload && self.configured_slots().all(|s| host.supports_flush(s.desc.as_ref().unwrap()))
    }

    pub fn supports_unmap(&self, host: &H, module_has_null_payload: bool) -> bool {
        module_has_null_payload && self.configured_slots().all(|s| host.supports_unmap(s.desc.as_ref().unwrap()))
    }

    pub fn supports_reset(&self, host: &H) -> bool {
        self.configured_slots().all(|s| host.supports_reset(s.desc.as_ref().unwrap()))
    }
}
