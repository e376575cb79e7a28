use alloc::boxed::Box;
use alloc::collections::{BTreeMap, VecDeque};
use alloc::sync::Arc;
use alloc::task::Wake;
use core::future::Future;
use core::pin::Pin;
use core::task::{Context, Poll, Waker};

use spin::Mutex;

#[derive(Debug, Clone, Copy, Ord, PartialEq, Eq, PartialOrd)]
pub struct TaskId(u64);

struct Task {
    future: Pin<Box<dyn Future<Output = ()>>>,
}

impl Task {
    fn poll(&mut self, ctx: &mut Context) -> Poll<()> {
        self.future.as_mut().poll(ctx)
    }
}

struct TaskWaker {
    id: TaskId,
    runnable: Arc<Mutex<VecDeque<TaskId>>>,
}

impl Wake for TaskWaker {
    fn wake(self: Arc<Self>) {
        self.runnable.lock().push_back(self.id);
    }

    fn wake_by_ref(self: &Arc<Self>) {
        self.runnable.lock().push_back(self.id);
    }
}

/// A single reactor's task queue: one of these lives on each executor
/// thread. It owns no base-device handles itself — those live in the
/// `RaidChannel` the caller registers once this executor starts.
#[derive(Default)]
pub struct Executor {
    next_id: Mutex<u64>,
    runnable: Arc<Mutex<VecDeque<TaskId>>>,
    tasks: Mutex<BTreeMap<TaskId, Task>>,
    wakers: Mutex<BTreeMap<TaskId, Arc<TaskWaker>>>,
}

impl Executor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn spawn(&self, future: impl Future<Output = ()> + 'static) -> TaskId {
        let mut next_id = self.next_id.lock();
        let id = TaskId(*next_id);
        *next_id = next_id.wrapping_add(1);
        drop(next_id);

        self.tasks.lock().insert(
            id,
            Task {
                future: Box::pin(future),
            },
        );
        self.runnable.lock().push_back(id);
        id
    }

    pub fn has_work(&self) -> bool {
        !self.runnable.lock().is_empty() || !self.tasks.lock().is_empty()
    }

    /// Polls every currently-runnable task once. Returns the number of
    /// tasks that completed. Callers drive this in a loop (optionally with
    /// an idle hint between empty iterations); it never blocks itself.
    pub fn run_once(&self) -> usize {
        let mut completed = 0;

        while let Some(id) = self.runnable.lock().pop_front() {
            let mut tasks = self.tasks.lock();
            let Some(task) = tasks.get_mut(&id) else {
                continue;
            };

            let waker = self
                .wakers
                .lock()
                .entry(id)
                .or_insert_with(|| {
                    Arc::new(TaskWaker {
                        id,
                        runnable: self.runnable.clone(),
                    })
                })
                .clone();
            let waker = Waker::from(waker);
            let mut ctx = Context::from_waker(&waker);

            match task.poll(&mut ctx) {
                Poll::Ready(()) => {
                    tasks.remove(&id);
                    self.wakers.lock().remove(&id);
                    completed += 1;
                }
                Poll::Pending => {}
            }
        }

        completed
    }

    /// Runs until no task is runnable and the queue is empty, spin-waiting
    /// between polls. Intended for tests and simple embeddings; a real
    /// reactor integrates `run_once` into its own event loop instead.
    pub fn run_to_completion(&self) {
        while !self.tasks.lock().is_empty() {
            if self.runnable.lock().is_empty() {
                core::hint::spin_loop();
                continue;
            }
            self.run_once();
        }
    }
}
