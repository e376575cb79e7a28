use alloc::collections::VecDeque;
use alloc::sync::Arc;
use core::future::Future;
use core::pin::Pin;
use core::task::{Context, Poll, Waker};

use super::spin::SpinLock;

struct Channel<T> {
    buffer: VecDeque<T>,
    rx_waker: Option<Waker>,
    senders: u64,
}

/// Used by the reference/test host to model a base device's per-request
/// command queue; clone freely, one per submitter.
pub struct Sender<T> {
    channel: Arc<SpinLock<Channel<T>>>,
}

impl<T> Clone for Sender<T> {
    fn clone(&self) -> Self {
        self.channel.lock().senders += 1;
        Sender {
            channel: self.channel.clone(),
        }
    }
}

impl<T> Drop for Sender<T> {
    fn drop(&mut self) {
        self.channel.lock().senders -= 1;
    }
}

impl<T> Sender<T> {
    pub fn send(&self, value: T) {
        let mut channel = self.channel.lock();
        channel.buffer.push_back(value);
        if let Some(waker) = channel.rx_waker.take() {
            waker.wake();
        }
    }
}

pub struct Receiver<T> {
    channel: Arc<SpinLock<Channel<T>>>,
}

impl<T> Receiver<T> {
    pub fn recv(&self) -> Recv<'_, T> {
        Recv { receiver: self }
    }

    pub fn try_recv(&self) -> Option<T> {
        self.channel.lock().buffer.pop_front()
    }
}

pub struct Recv<'a, T> {
    receiver: &'a Receiver<T>,
}

/// `None` means every [`Sender`] has been dropped and the queue is empty —
/// there is nothing left to wait for.
impl<'a, T> Future for Recv<'a, T> {
    type Output = Option<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<T>> {
        let mut channel = self.receiver.channel.lock();
        if let Some(value) = channel.buffer.pop_front() {
            return Poll::Ready(Some(value));
        }
        if channel.senders == 0 {
            return Poll::Ready(None);
        }
        channel.rx_waker = Some(cx.waker().clone());
        Poll::Pending
    }
}

pub fn unbounded<T>() -> (Sender<T>, Receiver<T>) {
    let channel = Arc::new(SpinLock::new(Channel {
        buffer: VecDeque::new(),
        rx_waker: None,
        senders: 1,
    }));
    (
        Sender {
            channel: channel.clone(),
        },
        Receiver { channel },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fifo_order() {
        let (tx, rx) = unbounded::<u32>();
        tx.send(1);
        tx.send(2);
        assert_eq!(rx.try_recv(), Some(1));
        assert_eq!(rx.try_recv(), Some(2));
        assert_eq!(rx.try_recv(), None);
    }

    #[test]
    fn closes_when_last_sender_dropped() {
        let (tx, rx) = unbounded::<u32>();
        drop(tx);
        assert_eq!(rx.try_recv(), None);
    }
}
