//! The pending-task queue.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::task::{Task, TaskId};

/// Pending tasks, ordered by id.
///
/// Ids are never reused while their task is queued; the next id is one past
/// the current maximum, so removing the newest task frees its id again.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskQueue {
    tasks: BTreeMap<TaskId, Task>,
}

impl TaskQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    #[must_use]
    pub fn contains(&self, id: TaskId) -> bool {
        self.tasks.contains_key(&id)
    }

    #[must_use]
    pub fn get(&self, id: TaskId) -> Option<&Task> {
        self.tasks.get(&id)
    }

    pub fn ids(&self) -> impl Iterator<Item = TaskId> + '_ {
        self.tasks.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Task> {
        self.tasks.values()
    }

    #[must_use]
    pub fn next_id(&self) -> TaskId {
        self.tasks
            .keys()
            .next_back()
            .map_or(TaskId::new(0), |id| id.next())
    }

    /// Insert a task under its own id, replacing any task already there.
    pub fn insert(&mut self, task: Task) {
        self.tasks.insert(task.id, task);
    }

    pub fn remove(&mut self, id: TaskId) -> Option<Task> {
        self.tasks.remove(&id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Instruction;
    use crate::tasks::Player;

    fn task(id: u32) -> Task {
        Task::new(TaskId::new(id), Player::engine(), Instruction::NoOp)
    }

    #[test]
    fn test_ids_grow_from_the_max() {
        let mut queue = TaskQueue::new();
        assert_eq!(queue.next_id(), TaskId::new(0));
        queue.insert(task(0));
        queue.insert(task(1));
        assert_eq!(queue.next_id(), TaskId::new(2));

        queue.remove(TaskId::new(0));
        assert_eq!(queue.next_id(), TaskId::new(2));
        queue.remove(TaskId::new(1));
        assert_eq!(queue.next_id(), TaskId::new(0));
    }

    #[test]
    fn test_ordered_iteration() {
        let mut queue = TaskQueue::new();
        queue.insert(task(2));
        queue.insert(task(0));
        queue.insert(task(1));
        let ids: Vec<TaskId> = queue.ids().collect();
        assert_eq!(ids, vec![TaskId::new(0), TaskId::new(1), TaskId::new(2)]);
    }
}
