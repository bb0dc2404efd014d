use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::time::{Duration, Instant};

use slotmap::{SlotMap, new_key_type};

new_key_type! {
    /// Handle of a job queued on a [`TaskScheduler`].
    pub struct TaskId;
}

/// Default per-turn budget for bounded jobs.
pub const DEFAULT_BUDGET: Duration = Duration::from_millis(5);

type Callback = Box<dyn FnOnce() + Send + 'static>;

/// A resumable queue of work items. Each call processes items until the
/// queue is empty or `deadline` has passed, always making progress on at
/// least one item.
trait BoundedWork: Send {
    /// Returns how many items were processed.
    fn run_until(&mut self, deadline: Instant) -> usize;

    fn remaining(&self) -> usize;
}

struct Bounded<T, F> {
    items: VecDeque<T>,
    step: F,
}

impl<T, F> BoundedWork for Bounded<T, F>
where
    T: Send,
    F: FnMut(T) + Send,
{
    fn run_until(&mut self, deadline: Instant) -> usize {
        let mut done = 0;
        while let Some(item) = self.items.pop_front() {
            (self.step)(item);
            done += 1;
            if Instant::now() >= deadline {
                break;
            }
        }
        done
    }

    fn remaining(&self) -> usize {
        self.items.len()
    }
}

enum Kind {
    Once(Callback),
    Bounded {
        work: Box<dyn BoundedWork>,
        budget: Duration,
        on_complete: Option<Callback>,
    },
}

struct Job {
    due: u64,
    kind: Kind,
}

/// Work handed to the scheduler from a [`TaskSpawner`].
struct Submission {
    delay: u64,
    kind: Kind,
}

/// Summary of one scheduler turn.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    pub tick: u64,
    /// Jobs that ran this turn (one-shots and bounded turns).
    pub ran: usize,
    /// Work items stepped by bounded jobs this turn.
    pub items: usize,
    /// Jobs fully finished this turn.
    pub completed: usize,
    /// Jobs still queued after the turn.
    pub remaining: usize,
    pub elapsed: Duration,
}

/// Cooperative, tick-driven job queue.
///
/// Owned by the single worker that mutates the plot grid; call [`tick`] once
/// per host tick. Jobs are submitted from anywhere through cloned
/// [`TaskSpawner`]s and become visible at the start of the next turn.
///
/// [`tick`]: TaskScheduler::tick
pub struct TaskScheduler {
    tick: u64,
    jobs: SlotMap<TaskId, Job>,
    order: VecDeque<TaskId>,
    rx: Receiver<Submission>,
    tx: Sender<Submission>,
    in_flight: Arc<AtomicUsize>,
}

impl TaskScheduler {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            tick: 0,
            jobs: SlotMap::with_key(),
            order: VecDeque::new(),
            rx,
            tx,
            in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn spawner(&self) -> TaskSpawner {
        TaskSpawner {
            tx: self.tx.clone(),
            in_flight: Arc::clone(&self.in_flight),
        }
    }

    pub fn current_tick(&self) -> u64 {
        self.tick
    }

    /// Jobs queued on the scheduler, including ones submitted but not yet
    /// picked up.
    pub fn pending(&mut self) -> usize {
        self.drain_submissions();
        self.jobs.len()
    }

    /// No queued jobs and no asynchronous work outstanding.
    pub fn is_idle(&mut self) -> bool {
        self.pending() == 0 && self.in_flight.load(Ordering::Acquire) == 0
    }

    pub fn contains(&self, id: TaskId) -> bool {
        self.jobs.contains_key(id)
    }

    fn drain_submissions(&mut self) {
        while let Ok(sub) = self.rx.try_recv() {
            self.enqueue(sub.delay, sub.kind);
        }
    }

    fn enqueue(&mut self, delay: u64, kind: Kind) -> TaskId {
        let id = self.jobs.insert(Job {
            due: self.tick + delay,
            kind,
        });
        self.order.push_back(id);
        id
    }

    /// Run one scheduler turn.
    ///
    /// Every one-shot due at this tick runs to completion. Bounded jobs share
    /// one turn deadline, set by the tightest budget among them and measured
    /// from the start of the turn: each steps items until its queue empties
    /// or the deadline passes. The first bounded job always steps at least
    /// one item; jobs left without a slice wait for the next turn. Bounded
    /// jobs that ran move to the back of the queue so every job gets its
    /// share. A bounded job whose queue emptied schedules its completion
    /// callback for the following turn.
    pub fn tick(&mut self) -> TickReport {
        let started = Instant::now();
        self.tick += 1;
        self.drain_submissions();

        let now = self.tick;
        let due: Vec<TaskId> = self
            .order
            .iter()
            .copied()
            .filter(|id| self.jobs.get(*id).is_some_and(|job| job.due <= now))
            .collect();

        let deadline = due
            .iter()
            .filter_map(|id| match self.jobs.get(*id).map(|job| &job.kind) {
                Some(Kind::Bounded { budget, .. }) => Some(*budget),
                _ => None,
            })
            .min()
            .map(|budget| started + budget);

        let mut report = TickReport {
            tick: now,
            ..Default::default()
        };
        let mut stepped: Vec<TaskId> = Vec::new();
        for id in due {
            let is_once = match self.jobs.get(id) {
                Some(job) => matches!(job.kind, Kind::Once(_)),
                None => continue,
            };
            if is_once {
                if let Some(Job {
                    kind: Kind::Once(run),
                    ..
                }) = self.jobs.remove(id)
                {
                    run();
                }
                report.ran += 1;
                report.completed += 1;
                continue;
            }

            let Some(deadline) = deadline else {
                continue;
            };
            let mut left = 0;
            let mut completion = None;
            if let Some(Job {
                due,
                kind: Kind::Bounded { work, on_complete, .. },
            }) = self.jobs.get_mut(id)
            {
                if !stepped.is_empty() && Instant::now() >= deadline {
                    *due = now + 1;
                    continue;
                }
                report.items += work.run_until(deadline);
                report.ran += 1;
                stepped.push(id);
                left = work.remaining();
                if left > 0 {
                    *due = now + 1;
                } else {
                    completion = on_complete.take();
                }
            }
            if left > 0 {
                tracing::trace!("bounded job {:?} yielded with {} items left", id, left);
                continue;
            }
            self.jobs.remove(id);
            report.completed += 1;
            if let Some(callback) = completion {
                self.enqueue(1, Kind::Once(callback));
            }
        }

        self.order
            .retain(|id| self.jobs.contains_key(*id) && !stepped.contains(id));
        for id in stepped {
            if self.jobs.contains_key(id) {
                self.order.push_back(id);
            }
        }
        report.remaining = self.jobs.len();
        report.elapsed = started.elapsed();
        report
    }

    /// Tick until nothing is queued or in flight, or `max_ticks` have run.
    /// Returns the number of ticks taken.
    pub fn run_until_idle(&mut self, max_ticks: u64) -> u64 {
        let mut ticks = 0;
        while ticks < max_ticks && !self.is_idle() {
            if self.pending() == 0 {
                std::thread::yield_now();
            }
            self.tick();
            ticks += 1;
        }
        ticks
    }
}

impl Default for TaskScheduler {
    fn default() -> Self {
        Self::new()
    }
}

/// Cloneable submission handle for a [`TaskScheduler`]. Safe to move to other
/// threads; submissions take effect at the scheduler's next turn.
#[derive(Clone)]
pub struct TaskSpawner {
    tx: Sender<Submission>,
    in_flight: Arc<AtomicUsize>,
}

impl TaskSpawner {
    fn submit(&self, delay: u64, kind: Kind) {
        if self.tx.send(Submission { delay, kind }).is_err() {
            tracing::warn!("task scheduler is gone, dropping submitted job");
        }
    }

    /// Run `f` on the scheduler's next turn.
    pub fn run_now(&self, f: impl FnOnce() + Send + 'static) {
        self.submit(0, Kind::Once(Box::new(f)));
    }

    /// Run `f` `ticks` turns after the scheduler picks it up.
    pub fn run_later(&self, ticks: u64, f: impl FnOnce() + Send + 'static) {
        self.submit(ticks, Kind::Once(Box::new(f)));
    }

    /// Compute `work` on the rayon pool and hand its result to `then` on the
    /// scheduler's thread.
    pub fn run_async<R, W, T>(&self, work: W, then: T)
    where
        R: Send + 'static,
        W: FnOnce() -> R + Send + 'static,
        T: FnOnce(R) + Send + 'static,
    {
        self.in_flight.fetch_add(1, Ordering::AcqRel);
        let spawner = self.clone();
        rayon::spawn(move || {
            let result = work();
            spawner.run_now(move || then(result));
            spawner.in_flight.fetch_sub(1, Ordering::AcqRel);
        });
    }

    /// Feed `items` through `step` a slice at a time, never spending more
    /// than `budget` per turn, then run `on_complete` exactly once on the
    /// turn after the last item. An empty item list completes on the next
    /// turn.
    pub fn run_bounded<T, F, C>(&self, items: impl IntoIterator<Item = T>, step: F, on_complete: C, budget: Duration)
    where
        T: Send + 'static,
        F: FnMut(T) + Send + 'static,
        C: FnOnce() + Send + 'static,
    {
        let items: VecDeque<T> = items.into_iter().collect();
        if items.is_empty() {
            self.run_now(on_complete);
            return;
        }
        self.submit(
            0,
            Kind::Bounded {
                work: Box::new(Bounded { items, step }),
                budget,
                on_complete: Some(Box::new(on_complete)),
            },
        );
    }
}
