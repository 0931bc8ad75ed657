use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::time::Duration;

/// Identifies one scheduled task until it runs or is cancelled.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) struct TaskHandle(u64);

/// Tasks filed under a group can be cancelled together.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) enum TaskGroup {
    Generation,
    Explosion,
    Shake,
}

struct Pending<T> {
    group: Option<TaskGroup>,
    task: T,
}

/// Virtual-time task queue. Nothing here sleeps: the owner moves the clock
/// forward and drains whatever became due.
pub(crate) struct Scheduler<T> {
    now: Duration,
    next_id: u64,
    // (due, id); id doubles as insertion order for ties
    queue: BinaryHeap<Reverse<(Duration, u64)>>,
    pending: HashMap<u64, Pending<T>>,
}

impl<T> Scheduler<T> {
    pub(crate) fn new() -> Self {
        Self {
            now: Duration::ZERO,
            next_id: 0,
            queue: BinaryHeap::new(),
            pending: HashMap::new(),
        }
    }

    pub(crate) fn now(&self) -> Duration {
        self.now
    }

    pub(crate) fn schedule_in(
        &mut self,
        delay: Duration,
        group: Option<TaskGroup>,
        task: T,
    ) -> TaskHandle {
        let id = self.next_id;
        self.next_id += 1;
        self.queue.push(Reverse((self.now + delay, id)));
        self.pending.insert(id, Pending { group, task });
        TaskHandle(id)
    }

    /// Returns false if the task already ran or was cancelled.
    pub(crate) fn cancel(&mut self, handle: TaskHandle) -> bool {
        let removed = self.pending.remove(&handle.0).is_some();
        if removed {
            tracing::debug!(task = handle.0, "task cancelled");
        }
        removed
    }

    pub(crate) fn cancel_group(&mut self, group: TaskGroup) -> usize {
        let before = self.pending.len();
        self.pending.retain(|_, p| p.group != Some(group));
        let dropped = before - self.pending.len();
        if dropped > 0 {
            tracing::debug!(?group, dropped, "task group cancelled");
        }
        dropped
    }

    #[cfg(test)]
    pub(crate) fn is_pending(&self, handle: TaskHandle) -> bool {
        self.pending.contains_key(&handle.0)
    }

    pub(crate) fn pending_in(&self, group: TaskGroup) -> usize {
        self.pending
            .values()
            .filter(|p| p.group == Some(group))
            .count()
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.pending.len()
    }

    /// Pops the earliest live task due at or before `until` and moves the
    /// clock to its due time. Cancelled entries are discarded on the way.
    pub(crate) fn pop_due(&mut self, until: Duration) -> Option<(TaskHandle, T)> {
        while let Some(&Reverse((due, id))) = self.queue.peek() {
            if due > until {
                return None;
            }
            self.queue.pop();
            if let Some(p) = self.pending.remove(&id) {
                self.now = self.now.max(due);
                return Some((TaskHandle(id), p.task));
            }
        }
        None
    }

    /// Moves the clock to `until` once everything due has been drained.
    pub(crate) fn settle(&mut self, until: Duration) {
        self.now = self.now.max(until);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    fn drain(s: &mut Scheduler<&'static str>, until: Duration) -> Vec<&'static str> {
        let mut out = Vec::new();
        while let Some((_, t)) = s.pop_due(until) {
            out.push(t);
        }
        s.settle(until);
        out
    }

    #[test]
    fn runs_in_due_order_then_insertion_order() {
        let mut s = Scheduler::new();
        s.schedule_in(ms(30), None, "c");
        s.schedule_in(ms(10), None, "a");
        s.schedule_in(ms(10), None, "b");
        assert_eq!(drain(&mut s, ms(100)), vec!["a", "b", "c"]);
        assert_eq!(s.now(), ms(100));
    }

    #[test]
    fn leaves_future_tasks_queued() {
        let mut s = Scheduler::new();
        s.schedule_in(ms(10), None, "soon");
        s.schedule_in(ms(500), None, "later");
        assert_eq!(drain(&mut s, ms(50)), vec!["soon"]);
        assert_eq!(s.len(), 1);
        assert_eq!(drain(&mut s, ms(500)), vec!["later"]);
    }

    #[test]
    fn delay_is_relative_to_current_clock() {
        let mut s = Scheduler::new();
        drain(&mut s, ms(1000));
        s.schedule_in(ms(5), None, "x");
        assert!(drain(&mut s, ms(1004)).is_empty());
        assert_eq!(drain(&mut s, ms(1005)), vec!["x"]);
    }

    #[test]
    fn cancelled_task_never_runs() {
        let mut s = Scheduler::new();
        let h = s.schedule_in(ms(10), None, "gone");
        s.schedule_in(ms(20), None, "kept");
        assert!(s.is_pending(h));
        assert!(s.cancel(h));
        assert!(!s.cancel(h));
        assert_eq!(drain(&mut s, ms(100)), vec!["kept"]);
    }

    #[test]
    fn cancel_group_only_touches_that_group() {
        let mut s = Scheduler::new();
        s.schedule_in(ms(10), Some(TaskGroup::Explosion), "boom1");
        s.schedule_in(ms(20), Some(TaskGroup::Explosion), "boom2");
        s.schedule_in(ms(15), Some(TaskGroup::Shake), "shake");
        s.schedule_in(ms(5), None, "free");
        assert_eq!(s.pending_in(TaskGroup::Explosion), 2);
        assert_eq!(s.cancel_group(TaskGroup::Explosion), 2);
        assert_eq!(s.pending_in(TaskGroup::Explosion), 0);
        assert_eq!(drain(&mut s, ms(100)), vec!["free", "shake"]);
    }

    #[test]
    fn handle_is_stale_after_running() {
        let mut s = Scheduler::new();
        let h = s.schedule_in(ms(1), None, "once");
        drain(&mut s, ms(1));
        assert!(!s.is_pending(h));
        assert!(!s.cancel(h));
    }
}
