use crate::core::constants::{DEFAULT_QUEUE_SIZE, DEFAULT_QUEUE_TRACK};
use crate::prelude::LocalBoxFuture;
use futures::stream::{FuturesUnordered, StreamExt};
use futures::FutureExt;
use std::collections::VecDeque;

/// A unit of work the queue can schedule.
///
/// Requests are matched by `PartialEq`: adding a request equal to one that is
/// still waiting moves it instead of queueing it twice.
pub trait FetchRequest: PartialEq {
    /// Whether the work is still wanted. Requests that say no are dropped
    /// without being started.
    fn is_needed(&self) -> bool {
        true
    }
}

/// Produces the future that performs a request's work
pub type StartFn<T> = Box<dyn FnOnce() -> LocalBoxFuture<'static, T>>;

/// How a request left the queue.
#[derive(Debug)]
pub enum Completion<R, T> {
    /// The work ran to completion (successfully or not, as `output` tells)
    Finished { request: R, output: T },
    /// The request was no longer needed and never started
    Rejected { request: R },
}

impl<R, T> Completion<R, T> {
    pub fn request(&self) -> &R {
        match self {
            Completion::Finished { request, .. } | Completion::Rejected { request } => request,
        }
    }
}

struct Entry<R, T> {
    request: R,
    start: StartFn<T>,
    batch: Option<u64>,
}

/// A bounded, reprioritisable scheduler for asynchronous work.
///
/// At most `size` requests run at once. Waiting requests are started from the
/// front; new requests go to the front (newest view first) unless a batch is
/// open, in which case they follow the other members of that batch. Running
/// work is driven by awaiting [`FetchQueue::next_completion`].
pub struct FetchQueue<R, T> {
    queue: VecDeque<Entry<R, T>>,
    running: FuturesUnordered<LocalBoxFuture<'static, (R, T)>>,
    in_flight: Vec<R>,
    rejected: VecDeque<R>,
    size: usize,
    track: usize,
    processing: usize,
    batch: Option<u64>,
    next_batch: u64,
}

impl<R, T> FetchQueue<R, T>
where
    R: FetchRequest + Clone + 'static,
    T: 'static,
{
    /// Create a queue running up to `size` requests (0 selects the default)
    pub fn new(size: usize) -> Self {
        Self::with_track(size, DEFAULT_QUEUE_TRACK)
    }

    /// Create a queue that prunes unneeded requests once more than `track`
    /// are waiting
    pub fn with_track(size: usize, track: usize) -> Self {
        Self {
            queue: VecDeque::new(),
            running: FuturesUnordered::new(),
            in_flight: Vec::new(),
            rejected: VecDeque::new(),
            size: if size == 0 { DEFAULT_QUEUE_SIZE } else { size },
            track,
            processing: 0,
            batch: None,
            next_batch: 1,
        }
    }

    /// Queues `request`, or moves it if it is already waiting.
    ///
    /// A moved request keeps the start function it was first queued with.
    /// Returns `false` when the request is already running and was ignored.
    pub fn add<F>(&mut self, request: R, start: F, at_end: bool) -> bool
    where
        F: FnOnce() -> LocalBoxFuture<'static, T> + 'static,
    {
        if self.in_flight.contains(&request) {
            return false;
        }
        let entry = match self.get(&request) {
            Some(pos) => match self.queue.remove(pos) {
                Some(entry) => entry,
                None => return false,
            },
            None => Entry {
                request,
                start: Box::new(start),
                batch: None,
            },
        };
        self.enqueue(entry, at_end);
        self.next_item();
        true
    }

    fn enqueue(&mut self, mut entry: Entry<R, T>, at_end: bool) {
        entry.batch = self.batch;
        if at_end {
            self.queue.push_back(entry);
        } else if self.batch.is_none() {
            self.queue.push_front(entry);
        } else {
            let pos = self
                .queue
                .iter()
                .position(|e| e.batch != self.batch)
                .unwrap_or(self.queue.len());
            self.queue.insert(pos, entry);
        }
    }

    /// Position of a waiting request
    pub fn get(&self, request: &R) -> Option<usize> {
        self.queue.iter().position(|e| &e.request == request)
    }

    /// Drops a waiting request without starting or rejecting it
    pub fn remove(&mut self, request: &R) -> bool {
        match self.get(request) {
            Some(pos) => self.queue.remove(pos).is_some(),
            None => false,
        }
    }

    /// Opens a new batch (`true`) or stops batching (`false`)
    pub fn batch(&mut self, start: bool) -> &mut Self {
        if start {
            self.batch = Some(self.next_batch);
            self.next_batch += 1;
        } else {
            self.batch = None;
        }
        self
    }

    /// The open batch, if any
    pub fn current_batch(&self) -> Option<u64> {
        self.batch
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Changes the concurrency limit; a larger limit starts work at once
    pub fn set_size(&mut self, size: usize) {
        self.size = if size == 0 { DEFAULT_QUEUE_SIZE } else { size };
        self.next_item();
    }

    pub fn track(&self) -> usize {
        self.track
    }

    pub fn set_track(&mut self, track: usize) {
        self.track = track;
        self.next_item();
    }

    /// Number of waiting requests
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Number of running requests
    pub fn processing(&self) -> usize {
        self.processing
    }

    /// Nothing waiting, running or left to report
    pub fn is_idle(&self) -> bool {
        self.queue.is_empty() && self.running.is_empty() && self.rejected.is_empty()
    }

    /// Drops waiting and running work.
    ///
    /// Running futures are dropped, which is the only cancellation there is;
    /// whatever external operation they started is not aborted.
    pub fn clear(&mut self) {
        self.queue.clear();
        self.running = FuturesUnordered::new();
        self.in_flight.clear();
        self.rejected.clear();
        self.processing = 0;
    }

    /// Waits for the next request to leave the queue.
    ///
    /// Rejections are reported before running work is polled. Returns `None`
    /// when nothing is waiting or running. Dropping the returned future before
    /// it resolves loses nothing.
    pub async fn next_completion(&mut self) -> Option<Completion<R, T>> {
        self.next_item();
        if let Some(request) = self.rejected.pop_front() {
            return Some(Completion::Rejected { request });
        }

        let (request, output) = self.running.next().await?;
        self.processing = self.processing.saturating_sub(1);
        if let Some(pos) = self.in_flight.iter().position(|r| r == &request) {
            self.in_flight.swap_remove(pos);
        }
        self.next_item();
        Some(Completion::Finished { request, output })
    }

    /// Prunes stale requests and starts work while there is capacity.
    fn next_item(&mut self) {
        if self.queue.len() > self.track {
            let mut i = self.queue.len();
            while i > 0 {
                i -= 1;
                if !self.queue[i].request.is_needed() {
                    if let Some(entry) = self.queue.remove(i) {
                        log::debug!("fetch queue dropped a stale request while pruning");
                        self.rejected.push_back(entry.request);
                    }
                }
            }
        }

        while self.processing < self.size {
            let Some(entry) = self.queue.pop_front() else {
                break;
            };
            if entry.request.is_needed() {
                let fut = (entry.start)();
                let request = entry.request.clone();
                self.in_flight.push(entry.request);
                self.running
                    .push(async move { (request, fut.await) }.boxed_local());
                self.processing += 1;
            } else {
                self.rejected.push_back(entry.request);
            }
        }
    }
}

impl<R, T> Default for FetchQueue<R, T>
where
    R: FetchRequest + Clone + 'static,
    T: 'static,
{
    fn default() -> Self {
        Self::new(DEFAULT_QUEUE_SIZE)
    }
}

impl<R: std::fmt::Debug, T> std::fmt::Debug for FetchQueue<R, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchQueue")
            .field("size", &self.size)
            .field("track", &self.track)
            .field("queued", &self.queue.len())
            .field("processing", &self.processing)
            .field("batch", &self.batch)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prelude::{Cell, Rc};

    #[derive(Debug, Clone)]
    struct Job {
        id: u32,
        needed: Rc<Cell<bool>>,
    }

    impl PartialEq for Job {
        fn eq(&self, other: &Self) -> bool {
            self.id == other.id
        }
    }

    impl FetchRequest for Job {
        fn is_needed(&self) -> bool {
            self.needed.get()
        }
    }

    fn job(id: u32) -> Job {
        Job {
            id,
            needed: Rc::new(Cell::new(true)),
        }
    }

    fn pending() -> LocalBoxFuture<'static, u32> {
        futures::future::pending().boxed_local()
    }

    fn order(queue: &FetchQueue<Job, u32>) -> Vec<u32> {
        queue.queue.iter().map(|e| e.request.id).collect()
    }

    /// A queue whose single slot is taken, so everything else waits
    fn blocked() -> FetchQueue<Job, u32> {
        let mut queue = FetchQueue::new(1);
        queue.add(job(0), pending, false);
        queue
    }

    #[test]
    fn test_unbatched_adds_go_to_front() {
        let mut queue = blocked();
        for id in 1..=3 {
            queue.add(job(id), pending, false);
        }
        assert_eq!(order(&queue), vec![3, 2, 1]);
        assert_eq!(queue.processing(), 1);
    }

    #[test]
    fn test_batches_stay_contiguous() {
        let mut queue = blocked();
        queue.batch(true);
        for id in 1..=3 {
            queue.add(job(id), pending, false);
        }
        assert_eq!(order(&queue), vec![1, 2, 3]);

        // A newer batch runs before the older one, FIFO inside itself.
        queue.batch(true);
        queue.add(job(4), pending, false);
        queue.add(job(5), pending, false);
        assert_eq!(order(&queue), vec![4, 5, 1, 2, 3]);
    }

    #[test]
    fn test_at_end_ignores_batching() {
        let mut queue = blocked();
        queue.batch(true);
        queue.add(job(1), pending, false);
        queue.add(job(2), pending, true);
        queue.add(job(3), pending, false);
        assert_eq!(order(&queue), vec![1, 3, 2]);
    }

    #[test]
    fn test_readd_moves_instead_of_duplicating() {
        let mut queue = blocked();
        for id in 1..=3 {
            queue.add(job(id), pending, false);
        }
        queue.add(job(1), pending, false);
        assert_eq!(order(&queue), vec![1, 3, 2]);
        assert_eq!(queue.len(), 3);
        assert_eq!(queue.get(&job(1)), Some(0));
    }

    #[test]
    fn test_running_request_is_not_added_again() {
        let mut queue = blocked();
        assert!(!queue.add(job(0), pending, false));
        assert_eq!(queue.len(), 0);
        assert_eq!(queue.processing(), 1);
    }

    #[test]
    fn test_remove() {
        let mut queue = blocked();
        queue.add(job(1), pending, false);
        assert!(queue.remove(&job(1)));
        assert!(!queue.remove(&job(1)));
        assert_eq!(queue.get(&job(1)), None);
    }

    #[test]
    fn test_batch_state() {
        let mut queue: FetchQueue<Job, u32> = FetchQueue::default();
        assert_eq!(queue.current_batch(), None);
        let first = queue.batch(true).current_batch();
        let second = queue.batch(true).current_batch();
        assert!(first < second);
        assert_eq!(queue.batch(false).current_batch(), None);
    }

    #[test]
    fn test_clear_resets_processing() {
        let mut queue = blocked();
        queue.add(job(1), pending, false);
        queue.clear();
        assert_eq!(queue.processing(), 0);
        assert!(queue.is_idle());
    }

    #[test]
    fn test_growing_size_starts_waiting_work() {
        let mut queue = blocked();
        queue.add(job(1), pending, false);
        queue.add(job(2), pending, false);
        queue.set_size(3);
        assert_eq!(queue.processing(), 3);
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn test_unneeded_request_is_rejected_not_started() {
        let started = Rc::new(Cell::new(false));
        let stale = job(1);
        stale.needed.set(false);

        let mut queue: FetchQueue<Job, u32> = FetchQueue::new(1);
        let flag = Rc::clone(&started);
        queue.add(
            stale,
            move || {
                flag.set(true);
                async { 1 }.boxed_local()
            },
            false,
        );
        assert!(!started.get());

        match queue.next_completion().await {
            Some(Completion::Rejected { request }) => assert_eq!(request.id, 1),
            other => panic!("expected a rejection, got {:?}", other),
        }
        assert_eq!(queue.processing(), 0);
        assert!(queue.next_completion().await.is_none());
        assert!(!started.get());
    }

    #[tokio::test]
    async fn test_pruning_above_track() {
        let mut queue: FetchQueue<Job, u32> = FetchQueue::with_track(1, 2);
        queue.add(job(0), pending, false);
        let jobs: Vec<Job> = (1..=3).map(job).collect();
        for j in &jobs {
            queue.add(j.clone(), pending, false);
        }
        jobs[0].needed.set(false);
        jobs[2].needed.set(false);

        // Pruning runs on the next state change.
        queue.add(job(4), pending, true);
        assert_eq!(order(&queue), vec![2, 4]);

        let mut rejected = Vec::new();
        for _ in 0..2 {
            if let Some(Completion::Rejected { request }) = queue.next_completion().await {
                rejected.push(request.id);
            }
        }
        rejected.sort();
        assert_eq!(rejected, vec![1, 3]);
    }
}
