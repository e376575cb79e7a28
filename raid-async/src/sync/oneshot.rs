use alloc::sync::Arc;
use core::future::Future;
use core::pin::Pin;
use core::task::{Context, Poll, Waker};

use super::spin::SpinLock;

struct Cell<T> {
    value: Option<T>,
    waker: Option<Waker>,
}

/// The other half of a [`sender`]/receiver pair; consumed by the one task
/// awaiting a single value.
pub struct Receiver<T> {
    cell: Arc<SpinLock<Cell<T>>>,
}

/// Sets the value exactly once. Dropping a `Sender` without calling
/// [`Sender::send`] leaves the receiver pending forever — callers that need
/// "sender dropped" to unblock the receiver should send an explicit
/// sentinel instead.
pub struct Sender<T> {
    cell: Arc<SpinLock<Cell<T>>>,
}

impl<T> Sender<T> {
    pub fn send(self, value: T) {
        let mut cell = self.cell.lock();
        cell.value = Some(value);
        if let Some(waker) = cell.waker.take() {
            waker.wake();
        }
    }
}

impl<T> Future for Receiver<T> {
    type Output = T;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<T> {
        let mut cell = self.cell.lock();
        if let Some(value) = cell.value.take() {
            return Poll::Ready(value);
        }
        cell.waker = Some(cx.waker().clone());
        Poll::Pending
    }
}

/// A single-producer/single-consumer cell that can be awaited exactly once.
/// Used by the I/O path to let a front-end request await its own
/// completion, and by tests driving `HostOps::mock` end to end.
pub fn channel<T>() -> (Sender<T>, Receiver<T>) {
    let cell = Arc::new(SpinLock::new(Cell {
        value: None,
        waker: None,
    }));
    (
        Sender { cell: cell.clone() },
        Receiver { cell },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::task::{RawWaker, RawWakerVTable};

    fn noop_raw_waker() -> RawWaker {
        fn clone(_: *const ()) -> RawWaker {
            noop_raw_waker()
        }
        fn noop(_: *const ()) {}
        static VTABLE: RawWakerVTable = RawWakerVTable::new(clone, noop, noop, noop);
        RawWaker::new(core::ptr::null(), &VTABLE)
    }

    #[test]
    fn delivers_value_sent_before_poll() {
        let (tx, rx) = channel::<u32>();
        tx.send(42);
        let waker = unsafe { Waker::from_raw(noop_raw_waker()) };
        let mut cx = Context::from_waker(&waker);
        let mut rx = core::pin::pin!(rx);
        assert_eq!(rx.as_mut().poll(&mut cx), Poll::Ready(42));
    }

    #[test]
    fn wakes_pending_receiver_on_send() {
        let (tx, rx) = channel::<&'static str>();
        let waker = unsafe { Waker::from_raw(noop_raw_waker()) };
        let mut cx = Context::from_waker(&waker);
        let mut rx = core::pin::pin!(rx);
        assert_eq!(rx.as_mut().poll(&mut cx), Poll::Pending);
        tx.send("done");
        assert_eq!(rx.as_mut().poll(&mut cx), Poll::Ready("done"));
    }
}
