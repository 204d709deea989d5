//! # Scenario Simulation
//!
//! Runs a scenario on a simulated clock.
//!
//! The agenda holds two kinds of events, ordered by `(tick, sequence)`:
//! scheduled commands and deferred stage completions. A participant with a
//! delay reports its stage pending and books a completion `delay` ticks
//! later; when the completion fires its stage work is applied and the
//! callback is handed back to the controller, which may start the next stage
//! and book further completions.
//!
//! Commands are booked before the run starts, so on a shared tick they come
//! before any completion.

use crate::scenario::{Scenario, ScheduledCommand};
use serde::Serialize;
use stagewise_core::{
    Command, ComponentTree, DoneCallback, Lifecycle, LifecycleController, LifecycleError,
    Operation, OperationRegistry, Process, ProcessId, ProcessSnapshot, Progress, StageEffect,
    StageResult, StatusChange, StatusListener,
};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

type SharedEffect = Rc<RefCell<Box<dyn StageEffect>>>;

// =============================================================================
// AGENDA
// =============================================================================

enum Event {
    Command(usize),
    Completion(Completion),
}

struct Completion {
    callback: DoneCallback,
    effect: SharedEffect,
    operation: Operation,
    stage: usize,
}

#[derive(Default)]
struct AgendaState {
    now: u64,
    sequence: u64,
    events: BTreeMap<(u64, u64), Event>,
}

/// Shared handle on the simulated clock and its pending events.
#[derive(Clone, Default)]
pub struct Agenda {
    state: Rc<RefCell<AgendaState>>,
}

impl std::fmt::Debug for Agenda {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("Agenda")
            .field("now", &state.now)
            .field("pending", &state.events.len())
            .finish()
    }
}

impl Agenda {
    /// Create an agenda at tick 0.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current tick.
    #[must_use]
    pub fn now(&self) -> u64 {
        self.state.borrow().now
    }

    /// Number of events not yet delivered.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.borrow().events.len()
    }

    /// Whether every event has been delivered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.state.borrow().events.is_empty()
    }

    fn schedule(&self, at: u64, event: Event) {
        let mut state = self.state.borrow_mut();
        let key = (at, state.sequence);
        state.sequence = state.sequence.saturating_add(1);
        state.events.insert(key, event);
    }

    /// Pop the next event and move the clock to its tick.
    fn pop_next(&self) -> Option<Event> {
        let mut state = self.state.borrow_mut();
        let ((tick, _), event) = state.events.pop_first()?;
        state.now = tick;
        Some(event)
    }
}

// =============================================================================
// DELAYED PARTICIPANT
// =============================================================================

/// Wraps stage work so that it completes on the agenda.
struct Delayed {
    effect: SharedEffect,
    delay: u64,
    hold: bool,
    agenda: Agenda,
    /// Latest callback kept by a holding participant. It is never handed
    /// back, so its process stalls; an older token is dropped on purpose.
    held: Option<DoneCallback>,
}

impl Lifecycle for Delayed {
    fn initiate_state_change(
        &mut self,
        operation: &Operation,
        stage: usize,
        done: DoneCallback,
    ) -> StageResult {
        if self.hold {
            let component = done.component();
            let replaced = self.held.replace(done).is_some();
            tracing::warn!(
                component = %component,
                stage,
                replaced,
                "participant holds its callback"
            );
            return StageResult::Pending;
        }

        if self.delay == 0 {
            self.effect.borrow_mut().apply(operation, stage);
            return StageResult::Done;
        }

        let due = self.agenda.now().saturating_add(self.delay);
        tracing::debug!(component = %done.component(), stage, due, "stage deferred");
        self.agenda.schedule(
            due,
            Event::Completion(Completion {
                callback: done,
                effect: Rc::clone(&self.effect),
                operation: operation.clone(),
                stage,
            }),
        );
        StageResult::Pending
    }

    fn status_name(&self) -> Option<&'static str> {
        Some(self.effect.borrow().current_status())
    }
}

// =============================================================================
// REPORT
// =============================================================================

/// How a scheduled command ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum CommandOutcome {
    /// Every stage resolved within the command's tick.
    Done,
    /// Went pending and retired later.
    Deferred,
    /// Went pending and never retired.
    Stalled,
    /// Rejected before a process was created.
    Failed,
}

/// Outcome of one scheduled command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandReport {
    /// Tick the command ran at.
    pub at: u64,
    /// Target path.
    pub target: String,
    /// Operation name.
    pub operation: String,
    /// How it ended.
    pub outcome: CommandOutcome,
    /// Process created for it, if it went pending.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub process: Option<ProcessId>,
    /// Tick its process retired.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<u64>,
    /// Rejection message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// A status transition stamped with the tick it happened at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimelineEntry {
    /// Tick of the transition.
    pub tick: u64,
    /// The transition itself.
    #[serde(flatten)]
    pub change: StatusChange,
}

/// A process still waiting when the agenda ran dry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StalledProcess {
    /// Controller view of the process.
    #[serde(flatten)]
    pub snapshot: ProcessSnapshot,
    /// Path of the targeted subtree.
    pub target: String,
    /// Paths of the components whose callbacks never came back.
    pub waiting_on: Vec<String>,
}

/// Final status of one participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComponentReport {
    /// Component path.
    pub path: String,
    /// Status name.
    pub status: Option<&'static str>,
}

/// Everything a run produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunReport {
    /// Tick of the last delivered event.
    pub final_tick: u64,
    /// One entry per scheduled command, in declaration order.
    pub commands: Vec<CommandReport>,
    /// Processes that never retired.
    pub stalled: Vec<StalledProcess>,
    /// Status transitions in the order they happened.
    pub timeline: Vec<TimelineEntry>,
    /// Final status of every participant, in tree order.
    pub components: Vec<ComponentReport>,
}

impl RunReport {
    /// Whether every command completed.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.stalled.is_empty()
            && self
                .commands
                .iter()
                .all(|c| matches!(c.outcome, CommandOutcome::Done | CommandOutcome::Deferred))
    }

    /// Final status of the participant at `path`.
    #[must_use]
    pub fn status_of(&self, path: &str) -> Option<&'static str> {
        self.components
            .iter()
            .find(|c| c.path == path)
            .and_then(|c| c.status)
    }
}

// =============================================================================
// SIMULATION
// =============================================================================

/// A scenario ready to run.
pub struct Simulation {
    tree: ComponentTree,
    registry: OperationRegistry,
    controller: LifecycleController,
    agenda: Agenda,
    commands: Vec<ScheduledCommand>,
    timeline: Rc<RefCell<Vec<TimelineEntry>>>,
}

impl std::fmt::Debug for Simulation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Simulation")
            .field("components", &self.tree.len())
            .field("commands", &self.commands.len())
            .field("agenda", &self.agenda)
            .finish()
    }
}

impl Simulation {
    /// Build the tree of `scenario`, wiring every participant to the agenda.
    pub fn new(scenario: &Scenario, registry: OperationRegistry) -> Result<Self, LifecycleError> {
        let agenda = Agenda::new();
        let timeline: Rc<RefCell<Vec<TimelineEntry>>> = Rc::default();

        let tree = scenario.build_tree(|spec| {
            let listener = timeline_listener(&agenda, &timeline);
            let Some(effect) = spec.effect(Some(listener))? else {
                return Ok(None);
            };
            Ok(Some(Box::new(Delayed {
                effect: Rc::new(RefCell::new(effect)),
                delay: spec.delay,
                hold: spec.hold,
                agenda: agenda.clone(),
                held: None,
            }) as Box<dyn Lifecycle>))
        })?;

        tracing::info!(
            components = tree.len(),
            commands = scenario.commands.len(),
            "simulation ready"
        );

        Ok(Self {
            tree,
            registry,
            controller: LifecycleController::new(),
            agenda,
            commands: scenario.commands.clone(),
            timeline,
        })
    }

    /// Deliver every event and report.
    ///
    /// Commands that fail lookup are reported and the run goes on. A usage
    /// fault while handing back a completion aborts the run.
    pub fn run(mut self) -> Result<RunReport, LifecycleError> {
        for (index, command) in self.commands.iter().enumerate() {
            self.agenda.schedule(command.at, Event::Command(index));
        }

        let mut executed: BTreeMap<usize, Result<Progress, LifecycleError>> = BTreeMap::new();
        let mut retired: BTreeMap<ProcessId, u64> = BTreeMap::new();

        while let Some(event) = self.agenda.pop_next() {
            let now = self.agenda.now();
            match event {
                Event::Command(index) => {
                    let Some(scheduled) = self.commands.get(index) else {
                        continue;
                    };
                    let command = Command::new(&scheduled.target, &scheduled.operation);
                    let result = self
                        .controller
                        .execute(&mut self.tree, &self.registry, &command);
                    if let Err(e) = &result {
                        tracing::warn!(tick = now, command = %command, "command rejected: {}", e);
                    }
                    executed.insert(index, result);
                }
                Event::Completion(completion) => {
                    let process = completion.callback.process();
                    completion
                        .effect
                        .borrow_mut()
                        .apply(&completion.operation, completion.stage);
                    let progress = self
                        .controller
                        .callback_invoked(&mut self.tree, completion.callback)?;
                    if progress.is_done() {
                        tracing::debug!(tick = now, process = %process, "process retired");
                        retired.insert(process, now);
                    }
                }
            }
        }

        let commands = self
            .commands
            .iter()
            .enumerate()
            .map(|(index, scheduled)| {
                command_report(scheduled, executed.remove(&index), &retired)
            })
            .collect();

        let stalled = self
            .controller
            .processes()
            .map(|process| self.stalled(process))
            .collect();

        let components = self
            .tree
            .roots()
            .iter()
            .flat_map(|root| self.tree.descendants(*root))
            .filter(|id| self.tree.is_participant(*id))
            .map(|id| ComponentReport {
                path: self.tree.path_of(id).unwrap_or_default(),
                status: self.tree.status_of(id),
            })
            .collect();

        let timeline = std::mem::take(&mut *self.timeline.borrow_mut());

        Ok(RunReport {
            final_tick: self.agenda.now(),
            commands,
            stalled,
            timeline,
            components,
        })
    }

    fn stalled(&self, process: &Process) -> StalledProcess {
        StalledProcess {
            snapshot: process.snapshot(),
            target: self.tree.path_of(process.root()).unwrap_or_default(),
            waiting_on: process
                .outstanding()
                .filter_map(|id| self.tree.path_of(id))
                .collect(),
        }
    }
}

fn timeline_listener(agenda: &Agenda, timeline: &Rc<RefCell<Vec<TimelineEntry>>>) -> StatusListener {
    let agenda = agenda.clone();
    let timeline = Rc::clone(timeline);
    Box::new(move |change: &StatusChange| {
        timeline.borrow_mut().push(TimelineEntry {
            tick: agenda.now(),
            change: change.clone(),
        });
    })
}

fn command_report(
    scheduled: &ScheduledCommand,
    result: Option<Result<Progress, LifecycleError>>,
    retired: &BTreeMap<ProcessId, u64>,
) -> CommandReport {
    let mut report = CommandReport {
        at: scheduled.at,
        target: scheduled.target.clone(),
        operation: scheduled.operation.clone(),
        outcome: CommandOutcome::Failed,
        process: None,
        completed_at: None,
        error: None,
    };

    match result {
        Some(Ok(Progress::Done)) => {
            report.outcome = CommandOutcome::Done;
            report.completed_at = Some(scheduled.at);
        }
        Some(Ok(Progress::Pending(process))) => {
            report.process = Some(process);
            report.completed_at = retired.get(&process).copied();
            report.outcome = if report.completed_at.is_some() {
                CommandOutcome::Deferred
            } else {
                CommandOutcome::Stalled
            };
        }
        Some(Err(e)) => report.error = Some(e.to_string()),
        None => report.error = Some("command was never delivered".to_string()),
    }

    report
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use stagewise_core::{Layer, LayeredService, OperationKind};

    fn run(text: &str) -> RunReport {
        let scenario = Scenario::from_toml_str(text).expect("parse");
        Simulation::new(&scenario, OperationRegistry::with_defaults())
            .expect("build")
            .run()
            .expect("run")
    }

    #[test]
    fn agenda_orders_by_tick_then_sequence() {
        let agenda = Agenda::new();
        agenda.schedule(5, Event::Command(0));
        agenda.schedule(2, Event::Command(1));
        agenda.schedule(5, Event::Command(2));
        assert_eq!(agenda.len(), 3);

        let mut order = Vec::new();
        while let Some(event) = agenda.pop_next() {
            if let Event::Command(index) = event {
                order.push((agenda.now(), index));
            }
        }
        assert_eq!(order, vec![(2, 1), (5, 0), (5, 2)]);
        assert!(agenda.is_empty());
    }

    #[test]
    fn synchronous_command_completes_on_its_tick() {
        let report = run(
            r#"
            [[component]]
            path = "h"
            kind = "node-status"

            [[command]]
            at = 3
            target = "h"
            operation = "turn-node-off"
            "#,
        );
        assert_eq!(report.commands[0].outcome, CommandOutcome::Done);
        assert_eq!(report.commands[0].completed_at, Some(3));
        assert_eq!(report.status_of("h"), Some("off"));
        assert!(report.is_clean());
    }

    #[test]
    fn delay_is_paid_once_per_stage() {
        let report = run(
            r#"
            [[component]]
            path = "h"
            kind = "node-status"
            delay = 2

            [[command]]
            target = "h"
            operation = "turn-node-off"
            "#,
        );
        // six stages, two ticks each
        assert_eq!(report.commands[0].outcome, CommandOutcome::Deferred);
        assert_eq!(report.commands[0].completed_at, Some(12));
        assert_eq!(report.final_tick, 12);

        let ticks: Vec<(u64, &str)> = report.timeline.iter().map(|e| (e.tick, e.change.to)).collect();
        assert_eq!(ticks, vec![(2, "turning off"), (12, "off")]);
    }

    #[test]
    fn held_callback_stalls_the_process() {
        let report = run(
            r#"
            [[component]]
            path = "net.a"
            kind = "link-status"
            hold = true

            [[component]]
            path = "net.b"
            kind = "link-status"

            [[command]]
            target = "net"
            operation = "unplug-link"
            "#,
        );
        assert_eq!(report.commands[0].outcome, CommandOutcome::Stalled);
        assert_eq!(report.stalled.len(), 1);
        assert_eq!(report.stalled[0].target, "net");
        assert_eq!(report.stalled[0].waiting_on, vec!["net.a".to_string()]);
        assert_eq!(report.status_of("net.a"), Some("plugged in"));
        assert_eq!(report.status_of("net.b"), Some("unplugged"));
        assert!(!report.is_clean());
    }

    /// Lends a participant to the tree while the test keeps a handle on it.
    struct Lent(Rc<RefCell<Delayed>>);

    impl Lifecycle for Lent {
        fn initiate_state_change(
            &mut self,
            operation: &Operation,
            stage: usize,
            done: DoneCallback,
        ) -> StageResult {
            self.0.borrow_mut().initiate_state_change(operation, stage, done)
        }
    }

    #[test]
    fn holding_participant_keeps_only_its_latest_callback() {
        let service: Box<dyn StageEffect> =
            Box::new(LayeredService::new("svc", Layer::Application, true));
        let delayed = Rc::new(RefCell::new(Delayed {
            effect: Rc::new(RefCell::new(service)),
            delay: 0,
            hold: true,
            agenda: Agenda::new(),
            held: None,
        }));
        let mut tree = ComponentTree::new();
        let root = tree
            .add_root("svc", Some(Box::new(Lent(Rc::clone(&delayed)))))
            .expect("root");
        let mut controller = LifecycleController::new();

        let mut pending = Vec::new();
        for _ in 0..3 {
            let progress = controller
                .initiate(&mut tree, root, Operation::new(OperationKind::FailNode))
                .expect("initiate");
            let Progress::Pending(id) = progress else {
                panic!("a holding participant never completes");
            };
            pending.push(id);
        }

        assert_eq!(controller.active_count(), 3);
        let held = delayed.borrow().held.as_ref().map(DoneCallback::process);
        assert_eq!(held, pending.last().copied());
    }

    #[test]
    fn rejected_command_does_not_abort_the_run() {
        let report = run(
            r#"
            [[component]]
            path = "h"
            kind = "node-status"

            [[command]]
            target = "nowhere"
            operation = "turn-node-off"

            [[command]]
            at = 1
            target = "h"
            operation = "turn-node-off"
            "#,
        );
        assert_eq!(report.commands[0].outcome, CommandOutcome::Failed);
        assert_eq!(
            report.commands[0].error.as_deref(),
            Some("Component 'nowhere' not found")
        );
        assert_eq!(report.commands[1].outcome, CommandOutcome::Done);
    }
}
