//! On-disk array descriptor (persisted layout).
//!
//! Hand-encoded rather than `#[derive(RaidCodec)]`-ed end to end, because the
//! entry vector is variable-length up to [`MAX_BASE_SLOTS`] — the same shape
//! `hal::gpt::GPTHeader` is in (fixed header, `to_buf`/`try_from` built up
//! field by field). [`SbBaseEntry`] itself, being fully fixed-size, does use
//! the derive.

use raid_codec::{Decode, Encode, EncodeError, Endianness};
use uuid::Uuid;

use crate::error::{name_from_str, Name, RaidError, RaidResult, MAX_NAME_SIZE};
use crate::level::RaidLevel;

pub const SB_MAGIC: u32 = 0x5241_4944; // "RAID"
pub const SB_VERSION: u32 = 1;
pub const MAX_BASE_SLOTS: usize = 32;

/// Bytes of the 0-offset region reserved for the superblock on every member;
/// `data_offset` for a freshly added base defaults to this divided by the
/// base's block length, then rounded up to `optimal_io_boundary`.
pub const RESERVED_MIN_OFFSET: u64 = 32 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SbEntryState {
    Configured,
    Failed,
}

impl From<SbEntryState> for u8 {
    fn from(s: SbEntryState) -> u8 {
        match s {
            SbEntryState::Configured => 0,
            SbEntryState::Failed => 1,
        }
    }
}

impl TryFrom<u8> for SbEntryState {
    type Error = RaidError;

    fn try_from(v: u8) -> RaidResult<Self> {
        match v {
            0 => Ok(SbEntryState::Configured),
            1 => Ok(SbEntryState::Failed),
            _ => Err(RaidError::Corrupt("sb entry state out of range")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, raid_codec::RaidCodec)]
pub struct SbBaseEntry {
    pub slot: u32,
    pub state: u8,
    pub uuid_hi: u64,
    pub uuid_lo: u64,
    pub data_offset: u64,
    pub data_size: u64,
}

impl SbBaseEntry {
    pub fn new(slot: u32, state: SbEntryState, uuid: Uuid, data_offset: u64, data_size: u64) -> Self {
        let bytes = uuid.as_u128();
        SbBaseEntry {
            slot,
            state: state.into(),
            uuid_hi: (bytes >> 64) as u64,
            uuid_lo: bytes as u64,
            data_offset,
            data_size,
        }
    }

    pub fn uuid(&self) -> Uuid {
        Uuid::from_u128(((self.uuid_hi as u128) << 64) | self.uuid_lo as u128)
    }

    pub fn state(&self) -> RaidResult<SbEntryState> {
        SbEntryState::try_from(self.state)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RaidSuperblock {
    pub version: u32,
    pub seq: u64,
    pub uuid: Uuid,
    pub name: Name,
    pub level: RaidLevel,
    pub strip_size_blocks: u32,
    pub block_size: u32,
    pub total_blocks: u64,
    pub base_slot_count: u32,
    pub entries: heapless::Vec<SbBaseEntry, MAX_BASE_SLOTS>,
}

impl RaidSuperblock {
    pub fn new(
        uuid: Uuid,
        name: &str,
        level: RaidLevel,
        strip_size_blocks: u32,
        block_size: u32,
        total_blocks: u64,
        base_slot_count: u32,
    ) -> RaidResult<Self> {
        Ok(RaidSuperblock {
            version: SB_VERSION,
            seq: 0,
            uuid,
            name: name_from_str(name)?,
            level,
            strip_size_blocks,
            block_size,
            total_blocks,
            base_slot_count,
            entries: heapless::Vec::new(),
        })
    }

    pub fn entry_for_slot(&self, slot: u32) -> Option<&SbBaseEntry> {
        self.entries.iter().find(|e| e.slot == slot)
    }

    pub fn entry_for_uuid(&self, uuid: Uuid) -> Option<&SbBaseEntry> {
        self.entries.iter().find(|e| e.uuid() == uuid)
    }

    pub fn set_entry(&mut self, entry: SbBaseEntry) -> RaidResult<()> {
        if let Some(existing) = self.entries.iter_mut().find(|e| e.slot == entry.slot) {
            *existing = entry;
            return Ok(());
        }
        self.entries
            .push(entry)
            .map_err(|_| RaidError::ResourceExhausted("superblock entry table full"))
    }

    pub fn mark_failed(&mut self, slot: u32) -> RaidResult<()> {
        let entry = self
            .entries
            .iter_mut()
            .find(|e| e.slot == slot)
            .ok_or(RaidError::NotFound("no sb entry for slot"))?;
        entry.state = SbEntryState::Failed.into();
        Ok(())
    }

    fn encode_header(&self, target: &mut [u8]) -> Result<usize, EncodeError> {
        let mut written = 0;
        written += SB_MAGIC.encode(Endianness::Little, &mut target[written..])?;
        written += self.version.encode(Endianness::Little, &mut target[written..])?;
        written += self.seq.encode(Endianness::Little, &mut target[written..])?;
        let uuid_bytes = self.uuid.as_u128();
        written += ((uuid_bytes >> 64) as u64).encode(Endianness::Little, &mut target[written..])?;
        written += (uuid_bytes as u64).encode(Endianness::Little, &mut target[written..])?;

        let mut name_buf = [0u8; MAX_NAME_SIZE];
        let name_bytes = self.name.as_bytes();
        name_buf[..name_bytes.len()].copy_from_slice(name_bytes);
        written += (name_bytes.len() as u32).encode(Endianness::Little, &mut target[written..])?;
        written += name_buf.encode(Endianness::Little, &mut target[written..])?;

        written += self.level.0.encode(Endianness::Little, &mut target[written..])?;
        written += self.strip_size_blocks.encode(Endianness::Little, &mut target[written..])?;
        written += self.block_size.encode(Endianness::Little, &mut target[written..])?;
        written += self.total_blocks.encode(Endianness::Little, &mut target[written..])?;
        written += self.base_slot_count.encode(Endianness::Little, &mut target[written..])?;
        written += (self.entries.len() as u32).encode(Endianness::Little, &mut target[written..])?;
        for entry in self.entries.iter() {
            written += entry.encode(Endianness::Little, &mut target[written..])?;
        }
        Ok(written)
    }

    /// Encodes the superblock with a trailing CRC-32 over every byte that
    /// precedes it. Returns the full on-disk image, including reserved
    /// padding out to [`RESERVED_MIN_OFFSET`].
    pub fn to_bytes(&self) -> RaidResult<alloc::vec::Vec<u8>> {
        let mut buf = alloc::vec![0u8; RESERVED_MIN_OFFSET as usize];
        let written = self
            .encode_header(&mut buf)
            .map_err(|_| RaidError::ResourceExhausted("superblock exceeds reserved region"))?;
        let checksum = crate::crc::crc32(&buf[..written]);
        checksum
            .encode(Endianness::Little, &mut buf[written..])
            .map_err(|_| RaidError::ResourceExhausted("superblock exceeds reserved region"))?;
        Ok(buf)
    }

    /// Decodes a superblock previously written by [`RaidSuperblock::to_bytes`].
    /// Absence of a valid superblock is reported as `Ok(None)`; a
    /// structurally-present but corrupt block is `Err(RaidError::Corrupt)`.
    pub fn from_bytes(input: &[u8]) -> RaidResult<Option<Self>> {
        if input.len() < 16 {
            return Ok(None);
        }
        let (magic, mut read) = u32::decode(Endianness::Little, input)
            .map_err(|_| RaidError::Corrupt("short superblock"))?;
        if magic != SB_MAGIC {
            return Ok(None);
        }
        let (version, n) = u32::decode(Endianness::Little, &input[read..])
            .map_err(|_| RaidError::Corrupt("short superblock"))?;
        read += n;
        if version != SB_VERSION {
            return Err(RaidError::Corrupt("unsupported superblock version"));
        }
        let (seq, n) = u64::decode(Endianness::Little, &input[read..])
            .map_err(|_| RaidError::Corrupt("short superblock"))?;
        read += n;
        let (uuid_hi, n) = u64::decode(Endianness::Little, &input[read..])
            .map_err(|_| RaidError::Corrupt("short superblock"))?;
        read += n;
        let (uuid_lo, n) = u64::decode(Endianness::Little, &input[read..])
            .map_err(|_| RaidError::Corrupt("short superblock"))?;
        read += n;
        let uuid = Uuid::from_u128(((uuid_hi as u128) << 64) | uuid_lo as u128);

        let (name_len, n) = u32::decode(Endianness::Little, &input[read..])
            .map_err(|_| RaidError::Corrupt("short superblock"))?;
        read += n;
        let (name_buf, n) = <[u8; MAX_NAME_SIZE]>::decode(Endianness::Little, &input[read..])
            .map_err(|_| RaidError::Corrupt("short superblock"))?;
        read += n;
        let name_len = name_len as usize;
        if name_len > MAX_NAME_SIZE {
            return Err(RaidError::Corrupt("superblock name length out of range"));
        }
        let name_str = core::str::from_utf8(&name_buf[..name_len])
            .map_err(|_| RaidError::Corrupt("superblock name is not utf-8"))?;
        let name = name_from_str(name_str)?;

        let (level, n) = u32::decode(Endianness::Little, &input[read..])
            .map_err(|_| RaidError::Corrupt("short superblock"))?;
        read += n;
        let (strip_size_blocks, n) = u32::decode(Endianness::Little, &input[read..])
            .map_err(|_| RaidError::Corrupt("short superblock"))?;
        read += n;
        let (block_size, n) = u32::decode(Endianness::Little, &input[read..])
            .map_err(|_| RaidError::Corrupt("short superblock"))?;
        read += n;
        let (total_blocks, n) = u64::decode(Endianness::Little, &input[read..])
            .map_err(|_| RaidError::Corrupt("short superblock"))?;
        read += n;
        let (base_slot_count, n) = u32::decode(Endianness::Little, &input[read..])
            .map_err(|_| RaidError::Corrupt("short superblock"))?;
        read += n;
        let (entry_count, n) = u32::decode(Endianness::Little, &input[read..])
            .map_err(|_| RaidError::Corrupt("short superblock"))?;
        read += n;
        if entry_count as usize > MAX_BASE_SLOTS {
            return Err(RaidError::Corrupt("superblock entry count out of range"));
        }
        let mut entries = heapless::Vec::new();
        for _ in 0..entry_count {
            let (entry, n) = SbBaseEntry::decode(Endianness::Little, &input[read..])
                .map_err(|_| RaidError::Corrupt("short superblock"))?;
            read += n;
            entries
                .push(entry)
                .map_err(|_| RaidError::Corrupt("superblock entry count out of range"))?;
        }

        let computed = crate::crc::crc32(&input[..read]);
        let (checksum, _) = u32::decode(Endianness::Little, &input[read..])
            .map_err(|_| RaidError::Corrupt("missing superblock checksum"))?;
        if checksum != computed {
            return Err(RaidError::Corrupt("superblock checksum mismatch"));
        }

        Ok(Some(RaidSuperblock {
            version,
            seq,
            uuid,
            name,
            level: RaidLevel(level),
            strip_size_blocks,
            block_size,
            total_blocks,
            base_slot_count,
            entries,
        }))
    }
}
