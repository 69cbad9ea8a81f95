//! A FIFO that marshals events from connection workers onto one consumer.

use std::collections::VecDeque;
use std::ops::ControlFlow;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

struct Queue<E> {
    events: Mutex<VecDeque<E>>,
    ready: Condvar,
    closed: AtomicBool,
}

impl<E> Queue<E> {
    fn lock(&self) -> MutexGuard<'_, VecDeque<E>> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// The consuming end of the queue.
///
/// Events posted through any [`EventSender`] are delivered in posting order,
/// one at a time, on the thread that calls [`poll_event`], [`next_event`] or
/// [`run`].
///
/// ```
/// use std::ops::ControlFlow;
/// use xmppstream::EventLoop;
///
/// let mut event_loop = EventLoop::new();
/// let sender = event_loop.sender();
/// std::thread::spawn(move || {
///     for i in 0..3 {
///         sender.post(i);
///     }
/// });
///
/// let mut seen = Vec::new();
/// event_loop.run(|i: u32| {
///     seen.push(i);
///     if i == 2 { ControlFlow::Break(()) } else { ControlFlow::Continue(()) }
/// });
/// assert_eq!(seen, [0, 1, 2]);
/// ```
///
/// [`EventSender`]: struct.EventSender.html
/// [`poll_event`]: #method.poll_event
/// [`next_event`]: #method.next_event
/// [`run`]: #method.run
pub struct EventLoop<E> {
    queue: Arc<Queue<E>>,
}

/// The posting end of an [`EventLoop`]; cheap to clone and `Send`.
///
/// [`EventLoop`]: struct.EventLoop.html
pub struct EventSender<E> {
    queue: Arc<Queue<E>>,
}

impl<E> Clone for EventSender<E> {
    fn clone(&self) -> Self {
        EventSender {
            queue: self.queue.clone(),
        }
    }
}

impl<E> EventSender<E> {
    /// Appends `event` to the queue. Returns `false` if the event loop is gone.
    pub fn post(&self, event: E) -> bool {
        {
            // `closed` only changes under the queue lock.
            let mut events = self.queue.lock();
            if self.queue.closed.load(Ordering::Acquire) {
                return false;
            }
            events.push_back(event);
        }
        self.queue.ready.notify_one();
        true
    }
}

impl<E> Default for EventLoop<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> EventLoop<E> {
    pub fn new() -> Self {
        EventLoop {
            queue: Arc::new(Queue {
                events: Mutex::new(VecDeque::new()),
                ready: Condvar::new(),
                closed: AtomicBool::new(false),
            }),
        }
    }

    pub fn sender(&self) -> EventSender<E> {
        EventSender {
            queue: self.queue.clone(),
        }
    }

    /// Takes the oldest queued event without waiting.
    pub fn poll_event(&mut self) -> Option<E> {
        self.queue.lock().pop_front()
    }

    /// Waits up to `timeout` for the next event.
    pub fn next_event(&mut self, timeout: Duration) -> Option<E> {
        let deadline = Instant::now() + timeout;
        let mut events = self.queue.lock();
        loop {
            if let Some(event) = events.pop_front() {
                return Some(event);
            }
            let now = Instant::now();
            if now >= deadline {
                return None;
            }
            events = self
                .queue
                .ready
                .wait_timeout(events, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }

    fn wait_event(&mut self) -> E {
        let mut events = self.queue.lock();
        loop {
            if let Some(event) = events.pop_front() {
                return event;
            }
            events = self
                .queue
                .ready
                .wait(events)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Delivers events to `handler` until it returns `ControlFlow::Break`.
    pub fn run<F>(&mut self, mut handler: F)
    where
        F: FnMut(E) -> ControlFlow<()>,
    {
        loop {
            let event = self.wait_event();
            if handler(event).is_break() {
                return;
            }
        }
    }

    /// Drops every queued event matching `predicate`, returning how many were removed.
    pub fn remove_events<P>(&mut self, mut predicate: P) -> usize
    where
        P: FnMut(&E) -> bool,
    {
        let mut events = self.queue.lock();
        let before = events.len();
        events.retain(|e| !predicate(e));
        before - events.len()
    }

    pub fn len(&self) -> usize {
        self.queue.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<E> Drop for EventLoop<E> {
    fn drop(&mut self) {
        let mut events = self.queue.lock();
        self.queue.closed.store(true, Ordering::Release);
        events.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use static_assertions::assert_impl_all;
    use std::thread;

    assert_impl_all!(EventSender<Vec<u8>>: Send, Sync, Clone);
    assert_impl_all!(EventLoop<Vec<u8>>: Send);

    #[test]
    fn test_fifo_across_threads() {
        let mut event_loop = EventLoop::new();
        let a = event_loop.sender();
        let b = a.clone();
        let ta = thread::spawn(move || (0..100).for_each(|i| assert!(a.post(("a", i)))));
        let tb = thread::spawn(move || (0..100).for_each(|i| assert!(b.post(("b", i)))));
        ta.join().unwrap();
        tb.join().unwrap();

        let mut last_a = None;
        let mut last_b = None;
        let mut count = 0;
        while let Some((who, i)) = event_loop.poll_event() {
            let last = if who == "a" { &mut last_a } else { &mut last_b };
            assert!(last.map_or(true, |l| l < i));
            *last = Some(i);
            count += 1;
        }
        assert_eq!(count, 200);
    }

    #[test]
    fn test_next_event_timeout() {
        let mut event_loop: EventLoop<u8> = EventLoop::new();
        assert_eq!(event_loop.next_event(Duration::from_millis(10)), None);

        let sender = event_loop.sender();
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            sender.post(7);
        });
        assert_eq!(event_loop.next_event(Duration::from_secs(5)), Some(7));
    }

    #[test]
    fn test_remove_events() {
        let mut event_loop = EventLoop::new();
        let sender = event_loop.sender();
        for i in 0..10u32 {
            sender.post(i);
        }
        assert_eq!(event_loop.remove_events(|i| i % 2 == 1), 5);
        assert_eq!(event_loop.len(), 5);
        assert_eq!(event_loop.poll_event(), Some(0));
        assert_eq!(event_loop.poll_event(), Some(2));
    }

    #[test]
    fn test_post_after_drop() {
        let event_loop: EventLoop<u8> = EventLoop::new();
        let sender = event_loop.sender();
        assert!(sender.post(1));
        drop(event_loop);
        assert!(!sender.post(2));
    }

    #[test]
    fn test_post_racing_drop_leaves_nothing_queued() {
        for _ in 0..20 {
            let token = Arc::new(());
            let event_loop: EventLoop<Arc<()>> = EventLoop::new();
            let sender = event_loop.sender();
            let poster = {
                let token = token.clone();
                thread::spawn(move || {
                    while sender.post(token.clone()) {}
                    sender
                })
            };
            thread::sleep(Duration::from_millis(1));
            drop(event_loop);

            // The sender is still alive, so anything left queued would
            // still hold a reference.
            let _sender = poster.join().unwrap();
            assert_eq!(Arc::strong_count(&token), 1);
        }
    }
}
