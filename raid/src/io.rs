//! I/O orchestration: front-end dispatch, the partial-completion
//! aggregator, RESET's core-driven fan-out to every base slot, and
//! [`submit_slot`] — the one back-pressure retry path every level module
//! routes a single-slot submission through.
//!
//! A READ first asks the host for a buffer ([`HostOps::get_io_buf`]);
//! buffer exhaustion completes the request FAILED before any level module
//! sees it. Every other kind reaches the level module directly.

use alloc::sync::Arc;

use raid_async::sync::spin::SpinLock;

use crate::channel::RaidChannel;
use crate::device::RaidDevice;
use crate::error::IoStatus;
use crate::host::{Completion, HostOps};
use crate::level::LevelModule;

pub type SharedDevice<H> = Arc<SpinLock<RaidDevice<H>>>;
pub type SharedChannel<H> = Arc<SpinLock<RaidChannel<H>>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoKind {
    Read,
    Write,
    Unmap,
    Flush,
    Reset,
}

struct State {
    remaining: u32,
    submitted: u32,
    status: IoStatus,
}

/// Per-I/O context. A real host framework embeds this directly in
/// the front-end request object; here the aggregator state lives behind an
/// `Arc<SpinLock<_>>` so the original submission path and a later
/// wait-queue retry can share the same counters safely.
pub struct RaidIoCtx {
    pub kind: IoKind,
    pub offset: u64,
    pub len: u64,
    state: Arc<SpinLock<State>>,
    completion: Completion,
}

impl Clone for RaidIoCtx {
    fn clone(&self) -> Self {
        RaidIoCtx {
            kind: self.kind,
            offset: self.offset,
            len: self.len,
            state: self.state.clone(),
            completion: self.completion.clone(),
        }
    }
}

impl RaidIoCtx {
    pub fn new(kind: IoKind, offset: u64, len: u64, completion: Completion) -> Self {
        RaidIoCtx {
            kind,
            offset,
            len,
            state: Arc::new(SpinLock::new(State {
                remaining: 0,
                submitted: 0,
                status: IoStatus::Success,
            })),
            completion,
        }
    }

    pub fn remaining(&self) -> u32 {
        self.state.lock().remaining
    }

    pub fn set_remaining(&self, n: u32) {
        self.state.lock().remaining = n;
    }

    pub fn submitted(&self) -> u32 {
        self.state.lock().submitted
    }

    pub fn set_submitted(&self, n: u32) {
        self.state.lock().submitted = n;
    }

    pub fn status(&self) -> IoStatus {
        self.state.lock().status
    }

    /// Completes the request immediately with `s`, bypassing the
    /// aggregator — used for the handful of cases that are immediate
    /// failures (unsupported type, buffer failure, non-NoMem submission
    /// error).
    pub fn fail(&self, s: IoStatus) {
        let mut state = self.state.lock();
        state.status = s;
        state.remaining = 0;
        drop(state);
        (self.completion)(s);
    }

    /// The partial-completion aggregator: asserts `remaining >= n`,
    /// subtracts, and downgrades `status` only the first time a
    /// non-success arrives (sticky; successes never upgrade a failure).
    /// Once `remaining` reaches zero, completes the front-end request
    /// exactly once with the rolled-up status.
    pub fn complete_part(&self, n: u32, s: IoStatus) {
        let mut state = self.state.lock();
        assert!(state.remaining >= n, "complete_part: n exceeds remaining");
        state.remaining -= n;
        if s != IoStatus::Success && state.status == IoStatus::Success {
            state.status = s;
        }
        let done = state.remaining == 0;
        let status = state.status;
        drop(state);
        if done {
            (self.completion)(status);
        }
    }
}

/// Front-end submit path. READ/WRITE and FLUSH/UNMAP delegate to the level
/// module; RESET is fanned out by the core itself, independent of level,
/// to every slot including vacant ones.
pub fn submit<H: HostOps + 'static>(
    device: &SharedDevice<H>,
    channel: &SharedChannel<H>,
    host: &Arc<H>,
    level: &dyn LevelModule<H>,
    io: &RaidIoCtx,
) {
    match io.kind {
        IoKind::Read => {
            if host.get_io_buf(io.len).is_err() {
                io.fail(IoStatus::Failed);
                return;
            }
            level.submit_rw(device, channel, host, io);
        }
        IoKind::Write => level.submit_rw(device, channel, host, io),
        IoKind::Flush | IoKind::Unmap => {
            if !level.supports_null_payload() {
                io.fail(IoStatus::Failed);
                return;
            }
            level.submit_null_payload(device, channel, host, io);
        }
        IoKind::Reset => submit_reset_fanout(device, channel, host, io),
    }
}

/// Submits one sub-I/O against `slot`'s base channel. On `-ENOMEM` the
/// request is parked on that slot's wait queue and retried from scratch
/// once woken — the same back-pressure rule [`submit_reset_fanout`]
/// applies to RESET, centralized here so every level module's `submit_rw`/
/// `submit_null_payload` gets it for free instead of reimplementing it.
/// `attempt` performs the actual `host.submit_*` call; `io.remaining` must
/// already account for this part before calling.
pub fn submit_slot<H, F>(
    device: &SharedDevice<H>,
    channel: &SharedChannel<H>,
    host: &Arc<H>,
    io: &RaidIoCtx,
    slot: usize,
    attempt: F,
) where
    H: HostOps + 'static,
    F: Fn(&H, &H::Channel, Completion) -> Result<(), IoStatus> + Send + Sync + Clone + 'static,
{
    let chan = channel.lock();
    let Some(base_channel) = chan.base_channels.get(slot).and_then(|c| c.as_ref()) else {
        drop(chan);
        io.complete_part(1, IoStatus::Failed);
        return;
    };
    let io_for_completion = io.clone();
    let completion: Completion = Arc::new(move |status| io_for_completion.complete_part(1, status));
    let result = attempt(host.as_ref(), base_channel, completion);
    drop(chan);

    match result {
        Ok(()) => {}
        Err(IoStatus::NoMem) => {
            let device2 = device.clone();
            let channel2 = channel.clone();
            let host2 = host.clone();
            let io2 = io.clone();
            let dev = device.lock();
            dev.slots[slot].wait_queue.push(move || {
                submit_slot(&device2, &channel2, &host2, &io2, slot, attempt);
            });
        }
        Err(_) => io.complete_part(1, IoStatus::Failed),
    }
}

/// RESET fan-out: initializes `remaining := N` on first entry, walks
/// slots `submitted..N`, vacuously completes slots with no channel, and
/// on `-ENOMEM` parks the request on that slot's wait queue, returning so
/// the executor is free to run other work — the retry resumes at the
/// saved `submitted` cursor.
pub fn submit_reset_fanout<H: HostOps + 'static>(
    device: &SharedDevice<H>,
    channel: &SharedChannel<H>,
    host: &Arc<H>,
    io: &RaidIoCtx,
) {
    let n = device.lock().n;
    if io.submitted() == 0 && io.remaining() == 0 {
        io.set_remaining(n);
    }

    let mut cursor = io.submitted();
    while cursor < n {
        let mut chan = channel.lock();
        if chan.base_channels[cursor as usize].is_none() {
            drop(chan);
            io.complete_part(1, IoStatus::Success);
            cursor += 1;
            io.set_submitted(cursor);
            continue;
        }

        let io_for_completion = io.clone();
        let completion: Completion = Arc::new(move |status| io_for_completion.complete_part(1, status));
        let base_channel = chan.base_channels[cursor as usize].as_ref().unwrap();
        let result = host.submit_reset(base_channel, completion);
        drop(chan);

        match result {
            Ok(()) => {
                cursor += 1;
                io.set_submitted(cursor);
            }
            Err(IoStatus::NoMem) => {
                io.set_submitted(cursor);
                let device2 = device.clone();
                let channel2 = channel.clone();
                let host2 = host.clone();
                let io2 = io.clone();
                let dev = device.lock();
                dev.slots[cursor as usize].wait_queue.push(move || {
                    submit_reset_fanout(&device2, &channel2, &host2, &io2);
                });
                return;
            }
            Err(_unreachable) => {
                io.fail(IoStatus::Failed);
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::mock::MockHost;
    use crate::level::concat::Concat;

    fn completion(slot: &Arc<SpinLock<Option<IoStatus>>>) -> Completion {
        let slot = slot.clone();
        Arc::new(move |s| *slot.lock() = Some(s))
    }

    #[test]
    fn complete_part_is_first_failure_wins() {
        let result = Arc::new(SpinLock::new(None));
        let io = RaidIoCtx::new(IoKind::Reset, 0, 0, completion(&result));
        io.set_remaining(3);
        io.complete_part(1, IoStatus::Success);
        io.complete_part(1, IoStatus::Failed);
        io.complete_part(1, IoStatus::Success);
        assert_eq!(*result.lock(), Some(IoStatus::Failed));
    }

    #[test]
    #[should_panic(expected = "n exceeds remaining")]
    fn complete_part_overdraw_panics() {
        let result = Arc::new(SpinLock::new(None));
        let io = RaidIoCtx::new(IoKind::Reset, 0, 0, completion(&result));
        io.set_remaining(1);
        io.complete_part(2, IoStatus::Success);
    }

    #[test]
    fn reset_fanout_skips_vacant_slots_and_back_pressures() {
        let host = Arc::new(MockHost::new());
        let desc0 = host.add_base("b0", 1024, 512);
        let chan0 = host.get_io_channel(&desc0).unwrap();

        let mut device = RaidDevice::new_configuring("r0", uuid::Uuid::nil(), crate::level::RaidLevel::CONCAT, 2, 2, 0).unwrap();
        device.slots[0].desc = Some(desc0);
        device.slots[0].is_configured = true;
        let device = Arc::new(SpinLock::new(device));

        let channel = Arc::new(SpinLock::new(RaidChannel {
            base_channels: alloc::vec![Some(chan0), None],
            module_channel: None,
        }));

        let result = Arc::new(SpinLock::new(None));
        let io = RaidIoCtx::new(IoKind::Reset, 0, 0, completion(&result));

        // force -ENOMEM on the configured slot's first attempt
        let desc_for_nomem = device.lock().slots[0].desc.unwrap();
        host.queue_nomem_once(desc_for_nomem);

        submit_reset_fanout(&device, &channel, &host, &io);
        assert!(result.lock().is_none(), "request should be parked, not completed");
        assert_eq!(io.submitted(), 0);

        device.lock().slots[0].wait_queue.drain();
        assert_eq!(*result.lock(), Some(IoStatus::Success));
    }

    #[test]
    fn read_fails_immediately_on_buffer_exhaustion() {
        let host = Arc::new(MockHost::new());
        let desc = host.add_base("b0", 1024, 512);
        let chan = host.get_io_channel(&desc).unwrap();

        let mut device = RaidDevice::new_configuring("r0", uuid::Uuid::nil(), crate::level::RaidLevel::CONCAT, 1, 1, 0).unwrap();
        device.slots[0].desc = Some(desc);
        device.slots[0].is_configured = true;
        device.slots[0].data_size = 1024;
        let device = Arc::new(SpinLock::new(device));

        let channel = Arc::new(SpinLock::new(RaidChannel {
            base_channels: alloc::vec![Some(chan)],
            module_channel: None,
        }));

        let result = Arc::new(SpinLock::new(None));
        let io = RaidIoCtx::new(IoKind::Read, 0, 1, completion(&result));

        host.fail_next_buffer();
        submit(&device, &channel, &host, &Concat, &io);
        assert_eq!(*result.lock(), Some(IoStatus::Failed));
    }

    #[test]
    fn read_reaches_the_level_module_once_a_buffer_is_available() {
        let host = Arc::new(MockHost::new());
        let desc = host.add_base("b0", 1024, 512);
        let chan = host.get_io_channel(&desc).unwrap();

        let mut device = RaidDevice::new_configuring("r0", uuid::Uuid::nil(), crate::level::RaidLevel::CONCAT, 1, 1, 0).unwrap();
        device.slots[0].desc = Some(desc);
        device.slots[0].is_configured = true;
        device.slots[0].data_size = 1024;
        let device = Arc::new(SpinLock::new(device));

        let channel = Arc::new(SpinLock::new(RaidChannel {
            base_channels: alloc::vec![Some(chan)],
            module_channel: None,
        }));

        let result = Arc::new(SpinLock::new(None));
        let io = RaidIoCtx::new(IoKind::Read, 0, 1, completion(&result));

        submit(&device, &channel, &host, &Concat, &io);
        assert_eq!(*result.lock(), Some(IoStatus::Success));
    }
}
