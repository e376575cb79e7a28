//! External management-operation surface: `raid_list`, `raid_create`,
//! `raid_delete`, `raid_add_base_bdev`, `raid_remove_base_bdev`,
//! `raid_set_options`, exposed as plain functions over [`RaidEngine`] rather
//! than a JSON-RPC server (the request/response shapes are stable regardless
//! of transport; wiring an RPC layer on top is left to the embedder).

use alloc::vec::Vec;

use uuid::Uuid;

use crate::device::RaidState;
use crate::error::{Name, RaidError, RaidResult};
use crate::host::HostOps;
use crate::io::SharedDevice;
use crate::level::RaidLevel;
use crate::membership;
use crate::options::RaidSetOptions;
use crate::registry::RaidEngine;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListCategory {
    All,
    Online,
    Configuring,
    Offline,
}

#[derive(Debug, Clone)]
pub struct BaseBdevInfo {
    pub name: Option<Name>,
    pub uuid: Option<Uuid>,
    pub is_configured: bool,
    pub data_offset: u64,
    pub data_size: u64,
}

#[derive(Debug, Clone)]
pub struct RaidInfo {
    pub name: Name,
    pub uuid: Uuid,
    pub strip_size_kb: u32,
    pub state: RaidState,
    pub raid_level: RaidLevel,
    pub superblock: bool,
    pub num_base_bdevs: u32,
    pub num_base_bdevs_discovered: u32,
    pub num_base_bdevs_operational: u32,
    pub base_bdevs_list: Vec<BaseBdevInfo>,
}

fn matches_category(state: RaidState, category: ListCategory) -> bool {
    match category {
        ListCategory::All => true,
        ListCategory::Online => state == RaidState::Online,
        ListCategory::Configuring => state == RaidState::Configuring,
        ListCategory::Offline => state == RaidState::Offline,
    }
}

pub fn raid_list<H: HostOps>(engine: &RaidEngine<H>, category: ListCategory) -> Vec<RaidInfo> {
    engine
        .devices()
        .into_iter()
        .filter_map(|shared| {
            let device = shared.lock();
            if !matches_category(device.state, category) {
                return None;
            }
            let base_bdevs_list = device
                .slots
                .iter()
                .map(|slot| BaseBdevInfo {
                    name: slot.name.clone(),
                    uuid: slot.uuid,
                    is_configured: slot.is_configured,
                    data_offset: slot.data_offset,
                    data_size: slot.data_size,
                })
                .collect();
            Some(RaidInfo {
                name: device.name.clone(),
                uuid: device.uuid,
                strip_size_kb: device.strip_size_kb,
                state: device.state,
                raid_level: device.level,
                superblock: device.superblock_enabled,
                num_base_bdevs: device.n,
                num_base_bdevs_discovered: device.discovered,
                num_base_bdevs_operational: device.operational,
                base_bdevs_list,
            })
        })
        .collect()
}

/// Creates a CONFIGURING array and schedules `add` for each base in order.
/// Any add failure rolls the whole array back (delete) and surfaces the
/// single error that caused it.
#[allow(clippy::too_many_arguments)]
pub fn raid_create<H: HostOps + 'static>(
    engine: &RaidEngine<H>,
    name: &str,
    strip_size_kb: u32,
    raid_level: RaidLevel,
    base_bdevs: &[&str],
    uuid: Option<Uuid>,
    superblock: bool,
) -> RaidResult<SharedDevice<H>> {
    if engine.find_by_name(name).is_some() {
        return Err(RaidError::AlreadyExists("duplicate array name"));
    }
    if base_bdevs.is_empty() {
        return Err(RaidError::InvalidArgument("empty base list"));
    }
    let n = base_bdevs.len() as u32;

    let (is_mirror, min_operational) = engine.with_level(raid_level, |m| {
        let is_mirror = m.level() == RaidLevel::RAID1;
        if n < m.base_bdevs_min() {
            return Err(RaidError::InvalidArgument("fewer members than the level requires"));
        }
        Ok((is_mirror, m.constraint().min_operational(n)?))
    })?;

    if is_mirror {
        if strip_size_kb != 0 {
            return Err(RaidError::InvalidArgument("mirror level requires strip_size_kb == 0"));
        }
    } else if strip_size_kb == 0 || !strip_size_kb.is_power_of_two() {
        return Err(RaidError::InvalidArgument("strip_size_kb must be a positive power of two"));
    }

    let uuid = match uuid {
        Some(u) if !u.is_nil() => u,
        _ if superblock => engine.generate_uuid(),
        _ => Uuid::nil(),
    };

    let mut device = crate::device::RaidDevice::new_configuring(name, uuid, raid_level, n, min_operational, strip_size_kb)?;
    device.superblock_enabled = superblock;
    let shared = engine.insert_device(device);

    for (i, base_name) in base_bdevs.iter().enumerate() {
        if let Err(e) = membership::add_base(engine, &shared, i as u32, base_name, None) {
            raid_term::log!("raid_create: rolling back array {} after add_base({}) failed: {}", name, base_name, e);
            let _ = membership::delete(engine, &shared);
            return Err(e);
        }
    }

    Ok(shared)
}

pub fn raid_delete<H: HostOps + 'static>(engine: &RaidEngine<H>, name: &str) -> RaidResult<()> {
    let shared = engine.find_by_name(name).ok_or(RaidError::NotFound("array name not known"))?;
    membership::delete(engine, &shared)
}

pub fn raid_add_base_bdev<H: HostOps + 'static>(engine: &RaidEngine<H>, raid: &str, base: &str) -> RaidResult<()> {
    let shared = engine.find_by_name(raid).ok_or(RaidError::NotFound("array name not known"))?;
    let slot_index = {
        let device = shared.lock();
        device
            .slots
            .iter()
            .position(|s| s.is_vacant())
            .ok_or(RaidError::ResourceExhausted("no vacant slot"))?
    };
    membership::add_base(engine, &shared, slot_index as u32, base, None)
}

pub fn raid_remove_base_bdev<H: HostOps + 'static>(engine: &RaidEngine<H>, base: &str) -> RaidResult<()> {
    for shared in engine.devices() {
        let slot_index = {
            let device = shared.lock();
            device
                .slots
                .iter()
                .position(|s| s.is_configured && s.name.as_ref().map(|n| n.as_str()) == Some(base))
        };
        if let Some(slot_index) = slot_index {
            return membership::remove_base(engine, &shared, slot_index as u32, None);
        }
    }
    Err(RaidError::NotFound("removed base not owned by any array"))
}

pub fn raid_set_options<H: HostOps>(engine: &RaidEngine<H>, options: RaidSetOptions) {
    engine.set_options(options)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::mock::MockHost;
    use crate::level::concat::Concat;
    use crate::level::mirror::Mirror;

    fn engine_with_levels() -> RaidEngine<MockHost> {
        let engine = RaidEngine::new(MockHost::new());
        engine.register_level(alloc::boxed::Box::new(Concat)).unwrap();
        engine.register_level(alloc::boxed::Box::new(Mirror)).unwrap();
        engine
    }

    #[test]
    fn create_and_list_round_trip() {
        let engine = engine_with_levels();
        engine.host.register_base("c0", 1024, 512);
        engine.host.register_base("c1", 1024, 512);

        raid_create(&engine, "r0", 0, RaidLevel::CONCAT, &["c0", "c1"], None, false).unwrap();

        let listed = raid_list(&engine, ListCategory::Online);
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].name.as_str(), "r0");
        assert_eq!(listed[0].num_base_bdevs_discovered, 2);

        assert!(raid_list(&engine, ListCategory::Configuring).is_empty());
    }

    #[test]
    fn create_rejects_duplicate_name() {
        let engine = engine_with_levels();
        engine.host.register_base("c0", 1024, 512);
        raid_create(&engine, "r0", 0, RaidLevel::CONCAT, &["c0"], None, false).unwrap();
        assert_eq!(
            raid_create(&engine, "r0", 0, RaidLevel::CONCAT, &["c0"], None, false),
            Err(RaidError::AlreadyExists("duplicate array name"))
        );
    }

    #[test]
    fn create_rejects_non_power_of_two_strip_for_striping_level() {
        let engine = RaidEngine::new(MockHost::new());
        engine.register_level(alloc::boxed::Box::new(crate::level::stripe0::Stripe0)).unwrap();
        engine.host.register_base("s0", 1024, 512);
        engine.host.register_base("s1", 1024, 512);
        assert_eq!(
            raid_create(&engine, "r0", 96, RaidLevel::RAID0, &["s0", "s1"], None, false),
            Err(RaidError::InvalidArgument("strip_size_kb must be a positive power of two"))
        );
    }

    #[test]
    fn create_rolls_back_when_a_base_is_already_claimed() {
        let engine = engine_with_levels();
        engine.host.register_base("shared", 1024, 512);
        engine.host.register_base("other", 1024, 512);
        raid_create(&engine, "a", 0, RaidLevel::CONCAT, &["shared"], None, false).unwrap();

        let err = raid_create(&engine, "b", 0, RaidLevel::CONCAT, &["other", "shared"], None, false).unwrap_err();
        assert_eq!(err, RaidError::Busy("base already claimed"));
        assert!(engine.find_by_name("b").is_none());
    }

    #[test]
    fn deferred_add_keeps_array_configuring_until_base_appears() {
        let engine = engine_with_levels();
        raid_create(&engine, "pending", 0, RaidLevel::CONCAT, &["later"], None, false).unwrap();

        let listed = raid_list(&engine, ListCategory::Configuring);
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].num_base_bdevs_discovered, 0);

        engine.host.register_base("later", 1024, 512);
        crate::examine::examine(&engine, "later").unwrap();
        assert_eq!(raid_list(&engine, ListCategory::Online).len(), 1);
    }

    #[test]
    fn remove_base_bdev_locates_by_name_across_arrays() {
        let engine = engine_with_levels();
        engine.host.register_base("m0", 1024, 512);
        engine.host.register_base("m1", 1024, 512);
        raid_create(&engine, "mir", 0, RaidLevel::RAID1, &["m0", "m1"], None, false).unwrap();

        raid_remove_base_bdev(&engine, "m0").unwrap();
        assert_eq!(
            raid_remove_base_bdev(&engine, "ghost"),
            Err(RaidError::NotFound("removed base not owned by any array"))
        );
    }

    #[test]
    fn set_options_is_observable_through_the_engine() {
        let engine = engine_with_levels();
        raid_set_options(&engine, RaidSetOptions { process_window_size_kb: 64, process_max_bandwidth_mb_sec: 10 });
        assert_eq!(engine.options().process_window_size_kb, 64);
    }
}
