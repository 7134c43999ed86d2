//! Relay task registry
//!
//! Tracks at most one task per requester from START to its terminal event,
//! plus the feed cursor: the requester whose START most recently opened the
//! helper stream. Content arriving from the helper is attributed to the task
//! under the cursor.

use std::collections::HashMap;
use std::fmt;
use tokio::time::Instant;
use tracing::{debug, warn};
use uuid::Uuid;

/// Chat id of the user a task relays to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequesterId(pub i64);

impl fmt::Display for RequesterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for RequesterId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// Generation tag distinguishing a task from a later one for the same requester.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskId(Uuid);

impl TaskId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.as_simple())
    }
}

/// In-flight relay bookkeeping for one requester.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    /// Generation tag.
    pub id: TaskId,
    /// Who receives the items.
    pub requester: RequesterId,
    /// Items announced by START.
    pub expected: u64,
    /// Items delivered so far.
    pub relayed: u64,
    /// Label used in notices.
    pub label: String,
    /// Whether the completion notice went out.
    pub completion_notified: bool,
    /// When the reaper may close the task. Pushed forward by every relayed item.
    pub deadline: Instant,
}

impl Task {
    /// Whether the task still waits for items.
    #[must_use]
    pub const fn wants_more(&self) -> bool {
        self.relayed < self.expected
    }
}

/// Snapshot of the task content should be relayed to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedTarget {
    /// Recipient.
    pub requester: RequesterId,
    /// Generation the item is credited to.
    pub task_id: TaskId,
}

/// Result of crediting a relayed item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayProgress {
    /// More items expected.
    InProgress {
        /// Items delivered so far.
        relayed: u64,
        /// Items announced.
        expected: u64,
    },
    /// Last item delivered; the task has been removed.
    Completed(Task),
    /// The task was replaced or closed while the item was in flight.
    Stale,
}

/// Requester-keyed task table.
#[derive(Debug, Default)]
pub struct TaskRegistry {
    tasks: HashMap<RequesterId, Task>,
    feed: Option<RequesterId>,
}

impl TaskRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a task for `requester`. An existing task is replaced and returned.
    pub fn start(
        &mut self,
        requester: RequesterId,
        expected: u64,
        label: String,
        deadline: Instant,
    ) -> Option<Task> {
        let task = Task {
            id: TaskId::new(),
            requester,
            expected,
            relayed: 0,
            label,
            completion_notified: false,
            deadline,
        };
        debug!(requester = %requester, task = %task.id, expected, "Task opened");
        self.feed = Some(requester);
        let replaced = self.tasks.insert(requester, task);
        if let Some(old) = &replaced {
            warn!(
                requester = %requester,
                relayed = old.relayed,
                expected = old.expected,
                "START replaced an active task"
            );
        }
        replaced
    }

    /// Task under the feed cursor, if it still wants items.
    #[must_use]
    pub fn feed_target(&self) -> Option<FeedTarget> {
        let requester = self.feed?;
        self.tasks
            .get(&requester)
            .filter(|task| task.wants_more())
            .map(|task| FeedTarget {
                requester,
                task_id: task.id,
            })
    }

    /// Credit one delivered item to the task generation `task_id` and move its
    /// deadline to `next_deadline`.
    pub fn record_relayed(
        &mut self,
        requester: RequesterId,
        task_id: TaskId,
        next_deadline: Instant,
    ) -> RelayProgress {
        let Some(task) = self.tasks.get_mut(&requester) else {
            return RelayProgress::Stale;
        };
        if task.id != task_id || !task.wants_more() {
            return RelayProgress::Stale;
        }

        task.relayed += 1;
        task.deadline = task.deadline.max(next_deadline);
        if task.relayed < task.expected {
            return RelayProgress::InProgress {
                relayed: task.relayed,
                expected: task.expected,
            };
        }

        match self.remove_entry(requester) {
            Some(mut task) => {
                task.completion_notified = true;
                RelayProgress::Completed(task)
            }
            None => RelayProgress::Stale,
        }
    }

    /// Close the task of `requester` on END.
    pub fn end(&mut self, requester: RequesterId) -> Option<Task> {
        let task = self.remove_entry(requester);
        if self.feed == Some(requester) {
            self.feed = None;
        }
        task
    }

    /// Close generation `task_id` of `requester` (relay failure).
    pub fn remove(&mut self, requester: RequesterId, task_id: TaskId) -> Option<Task> {
        if self.tasks.get(&requester).is_some_and(|t| t.id == task_id) {
            self.remove_entry(requester)
        } else {
            None
        }
    }

    /// Remove and return every task whose deadline is at or before `now`.
    pub fn expire(&mut self, now: Instant) -> Vec<Task> {
        let overdue: Vec<RequesterId> = self
            .tasks
            .values()
            .filter(|t| t.deadline <= now)
            .map(|t| t.requester)
            .collect();
        overdue
            .into_iter()
            .filter_map(|requester| self.remove_entry(requester))
            .collect()
    }

    /// Active task of `requester`.
    #[must_use]
    pub fn get(&self, requester: RequesterId) -> Option<&Task> {
        self.tasks.get(&requester)
    }

    /// Number of active tasks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Whether no task is active.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    fn remove_entry(&mut self, requester: RequesterId) -> Option<Task> {
        let task = self.tasks.remove(&requester);
        // The helper stream for this requester is over once its task is gone.
        if task.is_some() && self.feed == Some(requester) {
            self.feed = None;
        }
        task
    }
}
