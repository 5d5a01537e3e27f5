//! The game façade: one table, one graph, one log, one queue.

use std::rc::Rc;

use crate::ast::{Expression, Instruction, Metric, Requirement, Trigger};
use crate::error::{ExecutionError, ResolutionError};
use crate::exec::{apply_defaults, CustomRegistry, Executor, Transformers};
use crate::state::{Cause, Checkpoint, ComponentGraph, EventLog, GameEvent, StateChange};
use crate::tasks::{Player, Task, TaskId, TaskQueue};
use crate::types::{ClassTable, Type};

use super::reader::{GameReader, GameWriter};

/// A game in progress.
///
/// Every mutation flows through [`Game::record_change`] or the task
/// operations, each of which appends to the event log; the log is therefore
/// a complete account of how the current state came to be, and
/// [`Game::roll_back`] can return to any earlier [`Checkpoint`].
pub struct Game {
    table: Rc<ClassTable>,
    graph: ComponentGraph,
    log: EventLog,
    queue: TaskQueue,
    customs: Rc<CustomRegistry>,
    transformers: Transformers,
}

impl Game {
    #[must_use]
    pub fn new(table: ClassTable) -> Self {
        Self {
            table: Rc::new(table),
            graph: ComponentGraph::new(),
            log: EventLog::new(),
            queue: TaskQueue::new(),
            customs: Rc::new(CustomRegistry::new()),
            transformers: Transformers::new(),
        }
    }

    #[must_use]
    pub fn with_customs(mut self, customs: CustomRegistry) -> Self {
        self.customs = Rc::new(customs);
        self
    }

    #[must_use]
    pub fn with_transformers(mut self, transformers: Transformers) -> Self {
        self.transformers = transformers;
        self
    }

    #[must_use]
    pub fn table(&self) -> &ClassTable {
        &self.table
    }

    #[must_use]
    pub fn graph(&self) -> &ComponentGraph {
        &self.graph
    }

    #[must_use]
    pub fn events(&self) -> &EventLog {
        &self.log
    }

    #[must_use]
    pub fn tasks(&self) -> &TaskQueue {
        &self.queue
    }

    #[must_use]
    pub fn task(&self, id: TaskId) -> Option<&Task> {
        self.queue.get(id)
    }

    pub(crate) fn customs(&self) -> Rc<CustomRegistry> {
        Rc::clone(&self.customs)
    }

    // ----- reads -----

    pub fn resolve(&self, expr: &Expression) -> Result<Type, ResolutionError> {
        self.table.resolve(expr)
    }

    /// Count components matching `t`. A refined query counts its structural
    /// part, and only while the refinement holds.
    #[must_use]
    pub fn count(&self, t: &Type) -> i64 {
        if let Some(refinement) = &t.refinement {
            if !matches!(self.has(refinement), Ok(true)) {
                return 0;
            }
            let stripped = Type {
                refinement: None,
                ..t.clone()
            };
            return self.graph.count(&self.table, &stripped);
        }
        self.graph.count(&self.table, t)
    }

    pub fn count_metric(&self, metric: &Metric) -> Result<i64, ResolutionError> {
        let t = self.resolve(&metric.expression)?;
        Ok(self.count(&t) / metric.unit)
    }

    pub fn has(&self, requirement: &Requirement) -> Result<bool, ResolutionError> {
        Ok(match requirement {
            Requirement::Min(s) => self.count(&self.resolve(&s.expression)?) >= s.scalar,
            Requirement::Max(s) => self.count(&self.resolve(&s.expression)?) <= s.scalar,
            Requirement::Exact(s) => self.count(&self.resolve(&s.expression)?) == s.scalar,
            Requirement::Or(parts) => {
                let mut any = false;
                for part in parts {
                    if self.has(part)? {
                        any = true;
                        break;
                    }
                }
                any
            }
            Requirement::And(parts) => {
                let mut all = true;
                for part in parts {
                    if !self.has(part)? {
                        all = false;
                        break;
                    }
                }
                all
            }
        })
    }

    #[must_use]
    pub fn components(&self, t: &Type) -> Vec<(Type, i64)> {
        self.graph.components_matching(&self.table, t)
    }

    // ----- writes -----

    /// Apply a change to the graph, log it, then fire every effect the
    /// change triggers. The single funnel for every component mutation.
    pub(crate) fn record_change(
        &mut self,
        change: StateChange,
        owner: &Player,
        cause: Option<&Cause>,
    ) -> Result<usize, ExecutionError> {
        let before = self.graph.clone();
        self.graph.apply(&change)?;
        let ordinal = self.log.push(GameEvent::Change {
            change: change.clone(),
            owner: owner.clone(),
            cause: cause.cloned(),
        });
        self.fire_effects(&before, &change, ordinal, owner)?;
        Ok(ordinal)
    }

    /// Dispatch the effects listening for one logged change.
    ///
    /// The changed components notice their own arrival or departure; every
    /// other component on the board listens with its full count (taken
    /// before the change for a gain, after it for a removal, so nothing
    /// hears itself twice). `::` effects execute inline, `:` effects enter
    /// the task queue, and each firing carries a [`Cause`] naming the
    /// listener and the ordinal of the triggering event.
    fn fire_effects(
        &mut self,
        before: &ComponentGraph,
        change: &StateChange,
        ordinal: usize,
        owner: &Player,
    ) -> Result<(), ExecutionError> {
        let mut firings: Vec<(bool, Instruction, Cause)> = Vec::new();
        for (changed, removing) in [(&change.gaining, false), (&change.removing, true)] {
            let Some(changed) = changed else { continue };
            self.collect_firings(changed, changed, change.count, removing, ordinal, &mut firings)?;
            let listeners = if removing { &self.graph } else { before };
            for (listener, held) in listeners.all(&self.table) {
                self.collect_firings(
                    &listener,
                    changed,
                    change.count * held,
                    removing,
                    ordinal,
                    &mut firings,
                )?;
            }
        }
        for (automatic, instruction, cause) in firings {
            if automatic {
                let normalized = self.normalize(&instruction)?;
                Executor::execute(self, &normalized, owner, Some(&cause))?;
            } else {
                self.enqueue(&instruction, owner.clone(), Some(cause))?;
            }
        }
        Ok(())
    }

    fn collect_firings(
        &self,
        listener: &Type,
        changed: &Type,
        times: i64,
        removing: bool,
        ordinal: usize,
        out: &mut Vec<(bool, Instruction, Cause)>,
    ) -> Result<(), ExecutionError> {
        for effect in self.table.effects_of(listener.class) {
            let trigger = match (&effect.trigger, removing) {
                (Trigger::OnGain(e), false) | (Trigger::OnRemove(e), true) => e,
                _ => continue,
            };
            let target = self.resolve(trigger)?;
            if !self.table.is_subtype(changed, &target) {
                continue;
            }
            let cause = Cause {
                context: self.table.expression_of(listener),
                trigger_event: Some(ordinal),
            };
            out.push((effect.automatic, effect.instruction.times(times), cause));
        }
        Ok(())
    }

    fn normalize(&self, instruction: &Instruction) -> Result<Instruction, ExecutionError> {
        let rewritten = self.transformers.apply(&self.table, instruction)?;
        Ok(apply_defaults(&self.table, &rewritten)?)
    }

    /// Execute an instruction immediately, without queueing it.
    ///
    /// No automatic rollback: parts that completed before a failure stay
    /// done. Wrap in [`Game::atomic`] for all-or-nothing.
    pub fn execute_instruction(
        &mut self,
        instruction: &Instruction,
        owner: Player,
        cause: Option<Cause>,
    ) -> Result<(), ExecutionError> {
        let normalized = self.normalize(instruction)?;
        Executor::execute(self, &normalized, &owner, cause.as_ref())
    }

    // ----- tasks -----

    /// Add an instruction to the queue.
    ///
    /// The instruction is normalized, then split: each independent part of a
    /// `Multi` becomes its own task, and a `THEN` sequence is stored as its
    /// head with the tail deferred until the head completes. No-op parts are
    /// not queued.
    pub fn enqueue(
        &mut self,
        instruction: &Instruction,
        owner: Player,
        cause: Option<Cause>,
    ) -> Result<Vec<TaskId>, ExecutionError> {
        let normalized = self.normalize(instruction)?;
        let mut ids = Vec::new();
        for part in normalized.split() {
            let (head, then) = match part {
                Instruction::Then(mut seq) => {
                    let head = if seq.is_empty() {
                        Instruction::NoOp
                    } else {
                        seq.remove(0)
                    };
                    let then = if seq.is_empty() {
                        None
                    } else {
                        Some(Instruction::then(seq))
                    };
                    (head, then)
                }
                other => (other, None),
            };
            if head == Instruction::NoOp && then.is_none() {
                continue;
            }
            let id = self.queue.next_id();
            let task = Task {
                id,
                owner: owner.clone(),
                instruction: head,
                then,
                cause: cause.clone(),
                why_pending: None,
            };
            self.queue.insert(task.clone());
            self.log.push(GameEvent::TaskAdded(task));
            ids.push(id);
        }
        Ok(ids)
    }

    /// Execute a queued task, all-or-nothing.
    ///
    /// On success the task is removed (logged) and its deferred `then`, if
    /// any, is enqueued. On failure every effect of the attempt is rolled
    /// back and the task stays queued unchanged.
    pub fn execute_task(&mut self, id: TaskId) -> Result<(), ExecutionError> {
        let task = self
            .queue
            .get(id)
            .cloned()
            .ok_or(ExecutionError::UnknownTask(id))?;
        let checkpoint = self.checkpoint();
        let result = Executor::execute(self, &task.instruction, &task.owner, task.cause.as_ref())
            .and_then(|()| self.finish_task(&task));
        if result.is_err() {
            self.roll_back(checkpoint);
        }
        result
    }

    fn finish_task(&mut self, task: &Task) -> Result<(), ExecutionError> {
        if let Some(removed) = self.queue.remove(task.id) {
            self.log.push(GameEvent::TaskRemoved(removed));
        }
        if let Some(then) = &task.then {
            self.enqueue(then, task.owner.clone(), task.cause.clone())?;
        }
        Ok(())
    }

    /// Withdraw a task without executing it. Its deferred `then` is
    /// discarded with it.
    pub fn drop_task(&mut self, id: TaskId) -> Result<(), ExecutionError> {
        let removed = self
            .queue
            .remove(id)
            .ok_or(ExecutionError::UnknownTask(id))?;
        self.log.push(GameEvent::TaskRemoved(removed));
        Ok(())
    }

    /// Revise a queued task to a narrower instruction.
    ///
    /// A proposal equal to the current instruction is a no-op and logs
    /// nothing. Narrowing to `Ok` withdraws the task (releasing its `then`).
    /// Narrowing to a `Multi` replaces the task by one sibling per part, the
    /// `then` staying with the last sibling. Anything else edits the task in
    /// place, logging a single edit event.
    pub fn narrow_task(
        &mut self,
        id: TaskId,
        proposal: &Instruction,
    ) -> Result<(), ExecutionError> {
        let task = self
            .queue
            .get(id)
            .cloned()
            .ok_or(ExecutionError::UnknownTask(id))?;
        let proposal = self.normalize(proposal)?;
        if proposal == task.instruction {
            return Ok(());
        }
        crate::exec::narrowing::check_narrows(&self.table, &proposal, &task.instruction)?;

        if proposal == Instruction::NoOp {
            if let Some(removed) = self.queue.remove(id) {
                self.log.push(GameEvent::TaskRemoved(removed));
            }
            if let Some(then) = &task.then {
                self.enqueue(then, task.owner.clone(), task.cause.clone())?;
            }
            return Ok(());
        }

        if let Instruction::Multi(parts) = &proposal {
            // Sibling ids start past the original's, so the freed id never
            // resolves to a different instruction.
            let mut next = self.queue.next_id();
            if let Some(removed) = self.queue.remove(id) {
                self.log.push(GameEvent::TaskRemoved(removed));
            }
            for (i, part) in parts.iter().enumerate() {
                let sibling = Task {
                    id: next,
                    owner: task.owner.clone(),
                    instruction: part.clone(),
                    then: if i + 1 == parts.len() {
                        task.then.clone()
                    } else {
                        None
                    },
                    cause: task.cause.clone(),
                    why_pending: None,
                };
                next = next.next();
                self.queue.insert(sibling.clone());
                self.log.push(GameEvent::TaskAdded(sibling));
            }
            return Ok(());
        }

        let after = Task {
            instruction: proposal,
            ..task.clone()
        };
        self.queue.insert(after.clone());
        self.log.push(GameEvent::TaskEdited {
            before: task,
            after,
        });
        Ok(())
    }

    // ----- history -----

    #[must_use]
    pub fn checkpoint(&self) -> Checkpoint {
        self.log.checkpoint()
    }

    /// Undo everything after the checkpoint by replaying inverses, newest
    /// first, then truncate the log back to it.
    pub fn roll_back(&mut self, checkpoint: Checkpoint) {
        let undo: Vec<GameEvent> = self.log.events_since(checkpoint).cloned().collect();
        for event in undo.iter().rev() {
            match event {
                GameEvent::Change { change, .. } => self
                    .graph
                    .apply(&change.inverse())
                    .expect("event log out of sync with component graph"),
                GameEvent::TaskAdded(task) => {
                    self.queue.remove(task.id);
                }
                GameEvent::TaskRemoved(task) => self.queue.insert(task.clone()),
                GameEvent::TaskEdited { before, .. } => self.queue.insert(before.clone()),
            }
        }
        self.log.truncate(checkpoint);
    }

    /// Run `f`; on `Err`, roll back everything it did and propagate.
    pub fn atomic<T>(
        &mut self,
        f: impl FnOnce(&mut Game) -> Result<T, ExecutionError>,
    ) -> Result<T, ExecutionError> {
        let checkpoint = self.checkpoint();
        let result = f(self);
        if result.is_err() {
            self.roll_back(checkpoint);
        }
        result
    }
}

impl GameReader for Game {
    fn table(&self) -> &ClassTable {
        Game::table(self)
    }

    fn resolve(&self, expr: &Expression) -> Result<Type, ResolutionError> {
        Game::resolve(self, expr)
    }

    fn count(&self, t: &Type) -> i64 {
        Game::count(self, t)
    }

    fn count_metric(&self, metric: &Metric) -> Result<i64, ResolutionError> {
        Game::count_metric(self, metric)
    }

    fn has(&self, requirement: &Requirement) -> Result<bool, ResolutionError> {
        Game::has(self, requirement)
    }

    fn components(&self, t: &Type) -> Vec<(Type, i64)> {
        Game::components(self, t)
    }
}

/// Write handle scoped to one owner, given to directly-executing custom
/// instructions.
pub struct PlayerWriter<'a> {
    game: &'a mut Game,
    owner: Player,
    cause: Option<Cause>,
}

impl<'a> PlayerWriter<'a> {
    #[must_use]
    pub fn new(game: &'a mut Game, owner: Player, cause: Option<Cause>) -> Self {
        Self { game, owner, cause }
    }
}

impl GameReader for PlayerWriter<'_> {
    fn table(&self) -> &ClassTable {
        self.game.table()
    }

    fn resolve(&self, expr: &Expression) -> Result<Type, ResolutionError> {
        self.game.resolve(expr)
    }

    fn count(&self, t: &Type) -> i64 {
        self.game.count(t)
    }

    fn count_metric(&self, metric: &Metric) -> Result<i64, ResolutionError> {
        self.game.count_metric(metric)
    }

    fn has(&self, requirement: &Requirement) -> Result<bool, ResolutionError> {
        self.game.has(requirement)
    }

    fn components(&self, t: &Type) -> Vec<(Type, i64)> {
        self.game.components(t)
    }
}

impl GameWriter for PlayerWriter<'_> {
    fn apply_change(
        &mut self,
        count: i64,
        gaining: Option<Type>,
        removing: Option<Type>,
    ) -> Result<(), ExecutionError> {
        let change = StateChange::new(count, gaining, removing)?;
        self.game
            .record_change(change, &self.owner, self.cause.as_ref())?;
        Ok(())
    }
}
