//! The self-evolving PhoneAgent: retrieval, the plan/act/evaluate loop, and curation.

use std::mem;

use thiserror::Error;
use uuid::Uuid;

use super::actor::Actor;
use super::evaluator::OutcomeEvaluator;
use super::memory_writer::MemoryWriter;
use super::planner::Planner;
use super::sections::is_none_answer;
use super::state::{Outcome, SessionState, StepRecord, DEFAULT_ERR_TO_MANAGER_THRESH};
use super::unit::{consult, UnitError};
use crate::actions::{ActionHandler, Dispatched};
use crate::config::get_messages;
use crate::device::{DeviceController, DeviceError, Perceiver, PerceptionItem, Screenshot};
use crate::experience::{
    Experience, ExperienceQuery, ExperienceStore, ShortcutMiner, ShortcutSelector, StoreError,
    TipMiner, TipSelector,
};
use crate::model::{ChatModel, ModelError};

/// Agent errors.
///
/// Only collaborator failures are fatal. Unusable model replies and failed
/// actions are handled inside the loop.
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Model error: {0}")]
    Model(#[from] ModelError),
    #[error("Device error: {0}")]
    Device(#[from] DeviceError),
    #[error("Experience store error: {0}")]
    Store(#[from] StoreError),
}

/// Configuration for the PhoneAgent.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Maximum number of cycles before stopping.
    pub max_steps: u32,
    /// Trailing non-A outcomes that escalate to the Planner.
    pub err_to_manager_thresh: usize,
    /// Trailing non-A outcomes that end the task.
    pub max_consecutive_failures: usize,
    /// Identical consecutive actions that end the task.
    pub max_repetitive_actions: usize,
    /// Filter stored experience per instruction before the loop.
    pub enable_retrieval: bool,
    /// Mine new shortcuts and tips after the loop.
    pub enable_curation: bool,
    /// Multiplier for post-action settle delays; 0 disables waiting.
    pub settle_scale: f64,
    /// Optional ADB device ID for multi-device setups.
    pub device_id: Option<String>,
    /// Language code ("cn" for Chinese, "en" for English).
    pub lang: String,
    /// Whether to print verbose output.
    pub verbose: bool,
    /// Tasks the curators should keep in mind.
    pub future_tasks: Vec<String>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_steps: 40,
            err_to_manager_thresh: DEFAULT_ERR_TO_MANAGER_THRESH,
            max_consecutive_failures: 3,
            max_repetitive_actions: 3,
            enable_retrieval: true,
            enable_curation: true,
            settle_scale: 1.0,
            device_id: None,
            lang: "cn".to_string(),
            verbose: true,
            future_tasks: Vec::new(),
        }
    }
}

impl AgentConfig {
    pub fn with_device_id(mut self, device_id: impl Into<String>) -> Self {
        self.device_id = Some(device_id.into());
        self
    }

    pub fn with_lang(mut self, lang: impl Into<String>) -> Self {
        self.lang = lang.into();
        self
    }

    pub fn with_max_steps(mut self, max_steps: u32) -> Self {
        self.max_steps = max_steps;
        self
    }

    pub fn with_err_threshold(mut self, threshold: usize) -> Self {
        self.err_to_manager_thresh = threshold;
        self
    }

    pub fn with_guards(mut self, max_consecutive_failures: usize, max_repetitive_actions: usize) -> Self {
        self.max_consecutive_failures = max_consecutive_failures;
        self.max_repetitive_actions = max_repetitive_actions;
        self
    }

    pub fn with_retrieval(mut self, enabled: bool) -> Self {
        self.enable_retrieval = enabled;
        self
    }

    pub fn with_curation(mut self, enabled: bool) -> Self {
        self.enable_curation = enabled;
        self
    }

    pub fn with_settle_scale(mut self, scale: f64) -> Self {
        self.settle_scale = scale;
        self
    }

    pub fn with_future_tasks(mut self, tasks: Vec<String>) -> Self {
        self.future_tasks = tasks;
        self
    }

    /// Create a new AgentConfig with verbose output disabled.
    pub fn quiet(mut self) -> Self {
        self.verbose = false;
        self
    }
}

/// Why the loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationReason {
    /// The Planner declared the task done.
    Completed,
    /// The Actor emitted a finish token.
    Finished,
    MaxStepsReached,
    TooManyFailures,
    RepetitiveActions,
}

impl TerminationReason {
    /// Whether the agent itself believes the task is done.
    pub fn is_success(self) -> bool {
        matches!(self, TerminationReason::Completed | TerminationReason::Finished)
    }
}

/// Summary of one task.
#[derive(Debug, Clone)]
pub struct TaskReport {
    pub task_id: String,
    pub reason: TerminationReason,
    /// Loop cycles run, including no-op cycles.
    pub cycles: u32,
    /// Steps that made it into the history.
    pub steps: usize,
    pub plan: String,
    pub progress_status: String,
    pub important_notes: String,
    pub finish_thought: String,
    /// Name of the shortcut curation registered, if any.
    pub new_shortcut: Option<String>,
    pub tips_updated: bool,
}

/// One capture of the screen and what perception made of it.
struct Observation {
    screenshot: Screenshot,
    perception: Vec<PerceptionItem>,
    keyboard: bool,
}

#[derive(Default)]
struct Curated {
    new_shortcut: Option<String>,
    tips_updated: bool,
}

/// Agent that drives an Android phone toward a goal and learns shortcuts
/// from what worked.
///
/// Each task runs retrieval, then Planner → Actor → dispatcher →
/// Outcome-Evaluator → Memory-Writer cycles until the Planner declares the
/// task done, the Actor finishes, or a guard trips. Curation then mines the
/// trace into the experience store.
///
/// # Example
///
/// ```rust,no_run
/// use phone_agent_e::{AdbDevice, AgentConfig, JsonExperienceStore, ModelClient, ModelConfig, PhoneAgent};
///
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     let agent = PhoneAgent::new(
///         ModelClient::new(ModelConfig::default()),
///         AdbDevice::new(None),
///         JsonExperienceStore::new("experience.json"),
///         AgentConfig::default(),
///     );
///     let report = agent.run("Search for coffee in Maps").await?;
///     println!("{:?}", report.reason);
///     Ok(())
/// }
/// ```
pub struct PhoneAgent<M, D, S> {
    model: M,
    device: D,
    store: S,
    config: AgentConfig,
    action_handler: ActionHandler,
}

impl<M, D, S> PhoneAgent<M, D, S>
where
    M: ChatModel,
    D: DeviceController + Perceiver,
    S: ExperienceStore,
{
    pub fn new(model: M, device: D, store: S, config: AgentConfig) -> Self {
        let action_handler = ActionHandler::new(config.settle_scale);
        Self {
            model,
            device,
            store,
            config,
            action_handler,
        }
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Run one task to completion.
    pub async fn run(&self, instruction: &str) -> Result<TaskReport, AgentError> {
        let task_id = Uuid::new_v4().to_string();
        tracing::info!(task_id = %task_id, instruction, "Starting task");
        if self.config.verbose {
            let msgs = get_messages(&self.config.lang);
            println!("\n{}", "=".repeat(50));
            println!("📱 {}: {}", msgs.starting_task, instruction);
            println!("{}", "=".repeat(50));
        }

        let experience = self.store.load()?;
        let mut state = self.retrieve(instruction, experience).await?;

        let (reason, cycles) = self.control_loop(&task_id, &mut state).await?;
        tracing::info!(task_id = %task_id, reason = ?reason, cycles, steps = state.steps(), "Loop ended");

        let curated = if self.config.enable_curation {
            self.curate(&task_id, &mut state).await?
        } else {
            Curated::default()
        };

        if self.config.verbose {
            self.print_report(reason, &state, &curated);
        }

        Ok(TaskReport {
            task_id,
            reason,
            cycles,
            steps: state.steps(),
            plan: state.plan.clone(),
            progress_status: state.progress_status.clone(),
            important_notes: state.important_notes().to_string(),
            finish_thought: state.finish_thought.clone(),
            new_shortcut: curated.new_shortcut,
            tips_updated: curated.tips_updated,
        })
    }

    /// Pick the shortcuts and tips for this instruction and build the session.
    async fn retrieve(&self, instruction: &str, experience: Experience) -> Result<SessionState, AgentError> {
        let (shortcuts, tips) = if !self.config.enable_retrieval || experience.is_empty() {
            (experience.shortcuts.into_values().collect::<Vec<_>>(), experience.tips)
        } else {
            let query = ExperienceQuery::new(instruction, experience);
            let names = match consult(&self.model, &ShortcutSelector, &query, Vec::new()).await {
                Ok(names) => names,
                Err(UnitError::Model(e)) => return Err(e.into()),
                Err(UnitError::Parse(_)) => Vec::new(),
            };
            let tips = match consult(&self.model, &TipSelector, &query, Vec::new()).await {
                Ok(tips) => tips,
                Err(UnitError::Model(e)) => return Err(e.into()),
                Err(UnitError::Parse(_)) => {
                    tracing::warn!("Tip selection unusable, starting without tips");
                    String::new()
                }
            };
            (query.experience.select_shortcuts(&names), tips)
        };
        tracing::info!(shortcuts = shortcuts.len(), has_tips = !tips.is_empty(), "Retrieved experience");

        let order = shortcuts.iter().map(|def| def.name.clone()).collect();
        let shortcuts = shortcuts.into_iter().map(|def| (def.name.clone(), def)).collect();
        Ok(SessionState::new(instruction, tips, shortcuts)
            .with_shortcut_order(order)
            .with_future_tasks(self.config.future_tasks.clone())
            .with_err_threshold(self.config.err_to_manager_thresh))
    }

    async fn control_loop(
        &self,
        task_id: &str,
        state: &mut SessionState,
    ) -> Result<(TerminationReason, u32), AgentError> {
        let mut before = self.observe(state)?;
        state.perception_pre = mem::take(&mut before.perception);
        state.keyboard_pre = before.keyboard;

        let mut skip_planner = false;
        let mut cycles = 0;
        while cycles < self.config.max_steps {
            cycles += 1;
            tracing::debug!(task_id, cycle = cycles, "Starting cycle");

            if !mem::take(&mut skip_planner) {
                let decision = match consult(&self.model, &Planner, &*state, vec![before.screenshot.base64_data.clone()]).await {
                    Ok(decision) => decision,
                    Err(UnitError::Model(e)) => return Err(e.into()),
                    Err(UnitError::Parse(_)) => continue,
                };
                if state.error_flag_plan() {
                    state.acknowledge_error_flag();
                }
                state.plan = decision.plan;
                state.prev_subgoal = mem::replace(&mut state.current_subgoal, decision.current_subgoal);
                tracing::info!(task_id, cycle = cycles, subgoal = %state.current_subgoal, "Planned");
                if self.config.verbose {
                    self.print_plan(&decision.thought, state);
                }
                if state.is_done() {
                    return Ok((TerminationReason::Completed, cycles));
                }
            }

            let decision = match consult(&self.model, &Actor, &*state, vec![before.screenshot.base64_data.clone()]).await {
                Ok(decision) => decision,
                Err(UnitError::Model(e)) => return Err(e.into()),
                Err(UnitError::Parse(_)) => continue,
            };
            state.last_action_thought = decision.thought.clone();
            if self.config.verbose {
                let msgs = get_messages(&self.config.lang);
                println!("💭 {}: {}", msgs.thinking, decision.thought);
                println!("🎯 {}: {}", msgs.action, decision.action);
                println!("🔮 {}: {}", msgs.expectation, decision.description);
            }

            let dispatched = self.action_handler.execute(&self.device, &decision.action, state);
            match &dispatched {
                Dispatched::Finish => return Ok((TerminationReason::Finished, cycles)),
                Dispatched::Invalid { .. } | Dispatched::Unparseable => {
                    skip_planner = true;
                    continue;
                }
                _ => {}
            }
            tracing::info!(task_id, cycle = cycles, executed = dispatched.executed_count(), "Dispatched action");
            state.last_action = dispatched.decision().cloned();
            state.last_summary = decision.description;
            state.last_dispatch_error = dispatched.failure();

            let mut after = self.observe(state)?;
            state.perception_post = mem::take(&mut after.perception);
            state.keyboard_post = after.keyboard;

            let images = vec![before.screenshot.base64_data.clone(), after.screenshot.base64_data.clone()];
            match consult(&self.model, &OutcomeEvaluator, &*state, images).await {
                Ok(evaluation) => {
                    let outcome = evaluation.outcome;
                    if let Some(action) = state.last_action.clone() {
                        let summary = state.last_summary.clone();
                        state.record_step(StepRecord {
                            action,
                            summary,
                            outcome,
                            error_description: evaluation.error_description,
                            progress_status: evaluation.progress_status,
                        });
                    }
                    tracing::info!(outcome = %outcome, failures = state.consecutive_failures(), "Evaluated step");
                    if self.config.verbose {
                        self.print_outcome(outcome, state);
                    }
                    if outcome == Outcome::A {
                        self.write_memory(state, &after.screenshot).await?;
                    }
                }
                Err(UnitError::Model(e)) => return Err(e.into()),
                Err(UnitError::Parse(_)) => {}
            }

            state.perception_pre = mem::take(&mut state.perception_post);
            state.keyboard_pre = state.keyboard_post;
            before = after;

            if state.consecutive_failures() >= self.config.max_consecutive_failures {
                tracing::warn!(failures = state.consecutive_failures(), "Too many consecutive failures");
                return Ok((TerminationReason::TooManyFailures, cycles));
            }
            if state.trailing_repeats() >= self.config.max_repetitive_actions {
                tracing::warn!(repeats = state.trailing_repeats(), "Repetitive actions detected");
                return Ok((TerminationReason::RepetitiveActions, cycles));
            }
        }

        tracing::warn!(max_steps = self.config.max_steps, "Max steps reached");
        Ok((TerminationReason::MaxStepsReached, cycles))
    }

    async fn write_memory(&self, state: &mut SessionState, screenshot: &Screenshot) -> Result<(), AgentError> {
        match consult(&self.model, &MemoryWriter, &*state, vec![screenshot.base64_data.clone()]).await {
            Ok(notes) => {
                if !is_none_answer(&notes) {
                    state.merge_notes(&notes);
                }
                Ok(())
            }
            Err(UnitError::Model(e)) => Err(e.into()),
            Err(UnitError::Parse(_)) => Ok(()),
        }
    }

    /// Mine the finished trace against the freshly loaded store, then save it.
    async fn curate(&self, task_id: &str, state: &mut SessionState) -> Result<Curated, AgentError> {
        let mut experience = self.store.load()?;
        state.shortcuts = experience.shortcuts.clone();
        state.tips = experience.tips.clone();

        let mut curated = Curated::default();
        match consult(&self.model, &ShortcutMiner, &*state, Vec::new()).await {
            Ok(Some(shortcut)) => {
                let name = shortcut.name.clone();
                match experience.add_shortcut(shortcut) {
                    Ok(()) => {
                        tracing::info!(task_id, shortcut = %name, "Registered new shortcut");
                        curated.new_shortcut = Some(name);
                    }
                    Err(e) => tracing::warn!(task_id, "Shortcut rejected: {}", e),
                }
            }
            Ok(None) => tracing::info!(task_id, "No new shortcut proposed"),
            Err(UnitError::Model(e)) => return Err(e.into()),
            Err(UnitError::Parse(_)) => {}
        }

        match consult(&self.model, &TipMiner, &*state, Vec::new()).await {
            Ok(Some(tips)) if tips != experience.tips => {
                experience.update_tips(tips);
                curated.tips_updated = true;
            }
            Ok(_) => {}
            Err(UnitError::Model(e)) => return Err(e.into()),
            Err(UnitError::Parse(_)) => {}
        }

        self.store.save(&experience)?;
        Ok(curated)
    }

    /// Capture the screen; perception failures degrade to an empty listing.
    fn observe(&self, state: &mut SessionState) -> Result<Observation, AgentError> {
        let screenshot = self.device.capture_screenshot()?;
        state.width = screenshot.width;
        state.height = screenshot.height;
        let perception = self.device.detect(&screenshot).unwrap_or_else(|e| {
            tracing::warn!("Perception failed, continuing without it: {}", e);
            Vec::new()
        });
        let keyboard = self.device.keyboard_active();
        Ok(Observation {
            screenshot,
            perception,
            keyboard,
        })
    }

    fn print_plan(&self, thought: &str, state: &SessionState) {
        let msgs = get_messages(&self.config.lang);
        println!("\n{}", "=".repeat(50));
        if !thought.is_empty() {
            println!("💭 {}: {}", msgs.thinking, thought);
        }
        println!("📋 {}:\n{}", msgs.plan, state.plan);
        println!("📍 {}: {}", msgs.subgoal, state.current_subgoal);
        println!("{}", "-".repeat(50));
    }

    fn print_outcome(&self, outcome: Outcome, state: &SessionState) {
        let msgs = get_messages(&self.config.lang);
        println!("📊 {} {} | {}: {}", msgs.step, state.steps(), msgs.outcome, outcome);
        if let Some(error) = state.error_descriptions().last().filter(|_| !outcome.is_success()) {
            println!("⚠️ {}: {}", msgs.error, error);
        }
        println!("📈 {}: {}", msgs.progress, state.progress_status);
    }

    fn print_report(&self, reason: TerminationReason, state: &SessionState, curated: &Curated) {
        let msgs = get_messages(&self.config.lang);
        println!("\n{}", "=".repeat(50));
        let label = if reason.is_success() { msgs.task_completed } else { msgs.task_stopped };
        println!("✅ {} ({:?})", label, reason);
        println!("{}: {}", msgs.task, state.instruction);
        if !state.finish_thought.is_empty() {
            println!("{}: {}", msgs.result, state.finish_thought);
        }
        if !state.important_notes().is_empty() {
            println!("📝 {}:\n{}", msgs.notes, state.important_notes());
        }
        if let Some(name) = &curated.new_shortcut {
            println!("🧩 {}: {}", msgs.new_shortcut, name);
        }
        println!("{}\n", "=".repeat(50));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::{ArgumentBinding, ShortcutDef};
    use crate::agent::Role;
    use crate::device::Coordinates;
    use crate::experience::InMemoryExperienceStore;
    use crate::testing::{DeviceCall, FakeDevice, ScriptedModel};

    fn plan(subgoal: &str) -> String {
        format!("### Thought ###\nKeep going.\n### Plan ###\n1. Search for X\n### Current Subgoal ###\n{}", subgoal)
    }

    fn act(action: &str) -> String {
        format!("### Thought ###\nDo it.\n### Action ###\n{}\n### Description ###\nexpected change", action)
    }

    fn evaluate(outcome: &str, progress: &str) -> String {
        format!(
            "### Outcome ###\n{}\n### Error Description ###\nNone\n### Progress Status ###\n{}",
            outcome, progress
        )
    }

    fn notes(text: &str) -> String {
        format!("### Important Notes ###\n{}", text)
    }

    fn store_without_shortcuts() -> InMemoryExperienceStore {
        InMemoryExperienceStore::new(Experience {
            tips: "Close pop-ups.".to_string(),
            ..Experience::default()
        })
    }

    fn config() -> AgentConfig {
        AgentConfig::default().quiet().with_settle_scale(0.0).with_retrieval(false)
    }

    const PROPOSAL: &str = r#"### New Shortcut ###
{
  "name": "Tap_Type_and_Enter",
  "arguments": ["x", "y", "text"],
  "description": "Tap an input box, type text and press Enter.",
  "precondition": "There is a text input box on the screen.",
  "atomic_action_sequence": [
    {"name": "Tap", "arguments_map": {"x": "x", "y": "y"}},
    {"name": "Type", "arguments_map": {"text": "text"}},
    {"name": "Enter", "arguments_map": {}}
  ]
}"#;

    #[tokio::test]
    async fn test_search_task_end_to_end() {
        let model = ScriptedModel::new()
            .respond(Role::Planner, plan("Search for X"))
            .respond(Role::Actor, act(r#"{"name": "Tap", "arguments": {"x": 540, "y": 150}}"#))
            .respond(Role::OutcomeEvaluator, evaluate("A", "Search bar focused."))
            .respond(Role::MemoryWriter, notes("The search bar is at the top."))
            .respond(Role::Planner, plan("Search for X"))
            .respond(Role::Actor, act(r#"{"name": "Type", "arguments": {"text": "X"}}"#))
            .respond(Role::OutcomeEvaluator, evaluate("A", "Typed the query."))
            .respond(Role::MemoryWriter, notes("The search bar is at the top."))
            .respond(Role::Planner, plan("Search for X"))
            .respond(Role::Actor, act(r#"{"name": "Enter", "arguments": null}"#))
            .respond(Role::OutcomeEvaluator, evaluate("A", "Results are shown."))
            .respond(Role::MemoryWriter, notes("The search bar is at the top.\nResults list X first."))
            .respond(Role::Planner, plan("已完成"))
            .respond(Role::ShortcutMiner, PROPOSAL)
            .respond(Role::TipMiner, "### Updated Tips ###\nNone");

        let agent = PhoneAgent::new(model, FakeDevice::new(), store_without_shortcuts(), config());
        let report = agent.run("search for X").await.unwrap();

        assert_eq!(report.reason, TerminationReason::Completed);
        assert_eq!(report.steps, 3);
        assert_eq!(report.cycles, 4);
        assert_eq!(report.new_shortcut.as_deref(), Some("Tap_Type_and_Enter"));
        assert!(!report.tips_updated);
        assert_eq!(
            report.important_notes,
            "The search bar is at the top.\nResults list X first."
        );
        assert_eq!(
            agent.device().calls(),
            vec![
                DeviceCall::Tap(540, 150),
                DeviceCall::Type("X".to_string()),
                DeviceCall::Enter,
            ]
        );

        let stored = agent.store().snapshot().unwrap();
        let shortcut = &stored.shortcuts["Tap_Type_and_Enter"];
        let names: Vec<_> = shortcut.atomic_action_sequence.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Tap", "Type", "Enter"]);
        assert_eq!(shortcut.atomic_action_sequence[0].arguments_map["x"], ArgumentBinding::param("x"));
        assert_eq!(shortcut.atomic_action_sequence[1].arguments_map["text"], ArgumentBinding::param("text"));
        assert!(shortcut.atomic_action_sequence[2].arguments_map.is_empty());
        assert_eq!(stored.tips, "Close pop-ups.");
    }

    #[tokio::test]
    async fn test_duplicate_proposal_leaves_registry_unchanged() {
        let mut existing = ShortcutDef::tap_type_and_enter();
        existing.name = "Foo".to_string();
        let mut experience = Experience::default();
        experience.add_shortcut(existing.clone()).unwrap();
        let store = InMemoryExperienceStore::new(experience);

        let proposal = PROPOSAL
            .replace("\"Tap_Type_and_Enter\"", "\"Foo\"")
            .replace("press Enter", "press Enter again");
        let model = ScriptedModel::new()
            .respond(Role::Planner, plan("已完成"))
            .respond(Role::ShortcutMiner, proposal)
            .respond(Role::TipMiner, "### Updated Tips ###\nNone");

        let agent = PhoneAgent::new(model, FakeDevice::new(), store, config());
        let report = agent.run("anything").await.unwrap();

        assert_eq!(report.new_shortcut, None);
        let stored = agent.store().snapshot().unwrap();
        assert_eq!(stored.shortcuts.len(), 1);
        assert_eq!(stored.shortcuts["Foo"], existing);
    }

    #[tokio::test]
    async fn test_invalid_action_reasks_actor_without_replanning() {
        let model = ScriptedModel::new()
            .respond(Role::Planner, plan("Scroll the feed"))
            .respond(Role::Actor, act(r#"{"name": "Scroll", "arguments": {"direction": "down"}}"#))
            .respond(Role::Actor, act(r#"{"name": "finish", "arguments": null}"#));

        let agent = PhoneAgent::new(model, FakeDevice::new(), store_without_shortcuts(), config().with_curation(false));
        let report = agent.run("scroll").await.unwrap();

        assert_eq!(report.reason, TerminationReason::Finished);
        assert_eq!(report.steps, 0);
        assert_eq!(report.finish_thought, "Do it.");
        assert!(agent.device().calls().is_empty());
    }

    #[tokio::test]
    async fn test_error_flag_escalates_once_and_scroll_hint_appears() {
        let model = ScriptedModel::new()
            .respond(Role::Planner, plan("Open settings"))
            .respond(Role::Actor, act(r#"{"name": "Tap", "arguments": {"x": 10, "y": 10}}"#))
            .respond(Role::OutcomeEvaluator, evaluate("C", "Nothing yet."))
            .respond(Role::Planner, plan("Open settings"))
            .respond(Role::Actor, act(r#"{"name": "Tap", "arguments": {"x": 20, "y": 20}}"#))
            .respond(Role::OutcomeEvaluator, evaluate("C", "Nothing yet."))
            .respond(Role::Planner, plan("Open settings another way"))
            .respond(Role::Actor, act(r#"{"name": "Home", "arguments": {}}"#))
            .respond(Role::OutcomeEvaluator, evaluate("A", "At home screen."))
            .respond(Role::MemoryWriter, notes("None"))
            .respond(Role::Planner, plan("已完成"));

        let agent = PhoneAgent::new(model, FakeDevice::new(), store_without_shortcuts(), config().with_curation(false));
        let report = agent.run("open settings").await.unwrap();
        assert_eq!(report.reason, TerminationReason::Completed);
        assert_eq!(report.steps, 3);

        let planner_prompts = agent.model.prompts(Role::Planner);
        assert_eq!(planner_prompts.len(), 4);
        assert!(!planner_prompts[1].contains("Potentially Stuck"));
        assert!(planner_prompts[2].contains("Potentially Stuck"));
        assert!(!planner_prompts[3].contains("Potentially Stuck"));

        let actor_prompts = agent.model.prompts(Role::Actor);
        assert!(!actor_prompts[1].contains("HINT:"));
        assert!(actor_prompts[2].contains("HINT:"));
    }

    #[tokio::test]
    async fn test_memory_writer_runs_only_after_success() {
        let model = ScriptedModel::new()
            .respond(Role::Planner, plan("Go back"))
            .respond(Role::Actor, act(r#"{"name": "Back", "arguments": {}}"#))
            .respond(Role::OutcomeEvaluator, evaluate("B", "Wrong page."))
            .respond(Role::Planner, plan("Go home"))
            .respond(Role::Actor, act(r#"{"name": "Home", "arguments": {}}"#))
            .respond(Role::OutcomeEvaluator, evaluate("A", "Home."))
            .respond(Role::MemoryWriter, notes("Home has a Maps icon."))
            .respond(Role::Planner, plan("已完成"));

        let agent = PhoneAgent::new(model, FakeDevice::new(), store_without_shortcuts(), config().with_curation(false));
        let report = agent.run("go home").await.unwrap();

        assert_eq!(agent.model.prompts(Role::MemoryWriter).len(), 1);
        assert_eq!(report.important_notes, "Home has a Maps icon.");
        assert_eq!(agent.device().calls(), vec![DeviceCall::Back, DeviceCall::Home]);
    }

    #[tokio::test]
    async fn test_unparseable_evaluation_does_not_record_step() {
        let model = ScriptedModel::new()
            .respond(Role::Planner, plan("Go home"))
            .respond(Role::Actor, act(r#"{"name": "Home", "arguments": {}}"#))
            .respond(Role::OutcomeEvaluator, "I think it worked")
            .respond(Role::Planner, plan("已完成"));

        let agent = PhoneAgent::new(model, FakeDevice::new(), store_without_shortcuts(), config().with_curation(false));
        let report = agent.run("go home").await.unwrap();

        assert_eq!(report.reason, TerminationReason::Completed);
        assert_eq!(report.steps, 0);
        assert_eq!(agent.device().calls(), vec![DeviceCall::Home]);
    }

    #[tokio::test]
    async fn test_consecutive_failures_stop_the_loop_and_still_curate() {
        let model = ScriptedModel::new()
            .respond(Role::Planner, plan("Open it"))
            .respond(Role::Actor, act(r#"{"name": "Tap", "arguments": {"x": 1, "y": 1}}"#))
            .respond(Role::OutcomeEvaluator, evaluate("C", "Nothing."))
            .respond(Role::Planner, plan("Open it"))
            .respond(Role::Actor, act(r#"{"name": "Back", "arguments": {}}"#))
            .respond(Role::OutcomeEvaluator, evaluate("B", "Wrong."))
            .respond(Role::Planner, plan("Open it"))
            .respond(Role::Actor, act(r#"{"name": "Home", "arguments": {}}"#))
            .respond(Role::OutcomeEvaluator, evaluate("C", "Nothing."))
            .respond(Role::ShortcutMiner, "### New Shortcut ###\nNone")
            .respond(Role::TipMiner, "### Updated Tips ###\n1. Close pop-ups.\n2. Try the app drawer.");

        let agent = PhoneAgent::new(model, FakeDevice::new(), store_without_shortcuts(), config());
        let report = agent.run("open it").await.unwrap();

        assert_eq!(report.reason, TerminationReason::TooManyFailures);
        assert_eq!(report.steps, 3);
        assert!(report.tips_updated);
        assert_eq!(
            agent.store().snapshot().unwrap().tips,
            "1. Close pop-ups.\n2. Try the app drawer."
        );
    }

    #[tokio::test]
    async fn test_successful_scrolling_continues() {
        let mut model = ScriptedModel::new();
        for _ in 0..3 {
            model = model
                .respond(Role::Planner, plan("Swipe"))
                .respond(Role::Actor, act(r#"{"name": "Swipe", "arguments": {"x1": 1, "y1": 900, "x2": 1, "y2": 100}}"#))
                .respond(Role::OutcomeEvaluator, evaluate("A", "Scrolled."))
                .respond(Role::MemoryWriter, notes("None"));
        }
        model = model.respond(Role::Planner, plan("已完成"));

        let agent = PhoneAgent::new(model, FakeDevice::new(), store_without_shortcuts(), config().with_curation(false));
        let report = agent.run("scroll down").await.unwrap();
        assert_eq!(report.reason, TerminationReason::Completed);
        assert_eq!(report.steps, 3);
        assert_eq!(agent.device().calls().len(), 3);
        assert!(report.important_notes.is_empty());
    }

    #[tokio::test]
    async fn test_repeated_ineffective_taps_stop_the_loop() {
        let mut model = ScriptedModel::new();
        for _ in 0..3 {
            model = model
                .respond(Role::Planner, plan("Tap the search bar"))
                .respond(Role::Actor, act(r#"{"name": "Tap", "arguments": {"x": 300, "y": 120}}"#))
                .respond(Role::OutcomeEvaluator, evaluate("C", "Nothing changed."));
        }

        let agent = PhoneAgent::new(
            model,
            FakeDevice::new(),
            store_without_shortcuts(),
            config().with_curation(false).with_guards(5, 3),
        );
        let report = agent.run("search").await.unwrap();
        assert_eq!(report.reason, TerminationReason::RepetitiveActions);
        assert_eq!(report.steps, 3);
        assert_eq!(agent.device().calls(), vec![DeviceCall::Tap(300, 120); 3]);
    }

    #[tokio::test]
    async fn test_max_steps() {
        let model = ScriptedModel::new()
            .respond(Role::Planner, "no sections here")
            .respond(Role::Planner, "still nothing");

        let agent = PhoneAgent::new(
            model,
            FakeDevice::new(),
            store_without_shortcuts(),
            config().with_curation(false).with_max_steps(2),
        );
        let report = agent.run("task").await.unwrap();
        assert_eq!(report.reason, TerminationReason::MaxStepsReached);
        assert_eq!(report.cycles, 2);
        assert_eq!(report.steps, 0);
    }

    #[tokio::test]
    async fn test_retrieval_filters_shortcuts_and_tips() {
        let model = ScriptedModel::new()
            .respond(Role::ShortcutSelector, "### Selected Shortcuts ###\n[\"Tap_Type_and_Enter\", \"Unknown\"]")
            .respond(Role::TipSelector, "### Selected Tips ###\nClose pop-ups.")
            .respond(Role::Planner, plan("Search"))
            .respond(Role::Actor, act(r#"{"name": "finish", "arguments": null}"#));

        let agent = PhoneAgent::new(
            model,
            FakeDevice::new(),
            InMemoryExperienceStore::default(),
            AgentConfig::default().quiet().with_settle_scale(0.0).with_curation(false),
        );
        agent.run("search for coffee").await.unwrap();

        let actor_prompt = &agent.model.prompts(Role::Actor)[0];
        assert!(actor_prompt.contains("- Tap_Type_and_Enter(x, y, text):"));
        assert!(actor_prompt.contains("### Tips ###"));
        assert!(actor_prompt.contains("Close pop-ups."));
        assert!(!actor_prompt.contains("Do not add any payment information"));
    }

    #[tokio::test]
    async fn test_retrieved_shortcuts_listed_in_selection_order() {
        let def = |name: &str| ShortcutDef {
            name: name.to_string(),
            arguments: Vec::new(),
            description: format!("{} things.", name),
            precondition: "Any screen.".to_string(),
            atomic_action_sequence: Vec::new(),
        };
        let experience = Experience {
            shortcuts: ["Archive_All", "Zoom_Map"].iter().map(|n| (n.to_string(), def(n))).collect(),
            tips: "Close pop-ups.".to_string(),
            ..Experience::default()
        };
        let model = ScriptedModel::new()
            .respond(Role::ShortcutSelector, "### Selected Shortcuts ###\n[\"Zoom_Map\", \"Archive_All\"]")
            .respond(Role::TipSelector, "### Selected Tips ###\nNone")
            .respond(Role::Planner, plan("Zoom in"))
            .respond(Role::Actor, act(r#"{"name": "finish", "arguments": null}"#));

        let agent = PhoneAgent::new(
            model,
            FakeDevice::new(),
            InMemoryExperienceStore::new(experience),
            AgentConfig::default().quiet().with_settle_scale(0.0).with_curation(false),
        );
        agent.run("zoom the map").await.unwrap();

        for prompt in [&agent.model.prompts(Role::Actor)[0], &agent.model.prompts(Role::Planner)[0]] {
            let zoom = prompt.find("- Zoom_Map").unwrap();
            let archive = prompt.find("- Archive_All").unwrap();
            assert!(zoom < archive);
        }
    }

    #[tokio::test]
    async fn test_open_app_uses_current_perception() {
        let screen = vec![PerceptionItem::new(Coordinates::BoundingBox([100, 500, 200, 540]), "Maps")];
        let device = FakeDevice::new()
            .with_screen(screen, false)
            .fail_on("detect", DeviceError::Perception("ignored".into()));
        let model = ScriptedModel::new()
            .respond(Role::Planner, plan("Open Maps"))
            .respond(Role::Actor, act(r#"{"name": "Open_App", "arguments": {"app_name": "Maps"}}"#))
            .respond(Role::OutcomeEvaluator, evaluate("C", "Maps did not open."))
            .respond(Role::Planner, plan("已完成"));

        // Perception failures degrade to an empty screen, so the label is never found.
        let agent = PhoneAgent::new(model, device, store_without_shortcuts(), config().with_curation(false));
        let report = agent.run("open maps").await.unwrap();
        assert_eq!(report.steps, 1);
        assert!(agent.device().calls().is_empty());
        assert!(agent.model.prompts(Role::OutcomeEvaluator)[0].contains("Maps"));

        let screen = vec![PerceptionItem::new(Coordinates::BoundingBox([100, 500, 200, 540]), "Maps")];
        let model = ScriptedModel::new()
            .respond(Role::Planner, plan("Open Maps"))
            .respond(Role::Actor, act(r#"{"name": "Open_App", "arguments": {"app_name": "Maps"}}"#))
            .respond(Role::OutcomeEvaluator, evaluate("A", "Maps is open."))
            .respond(Role::MemoryWriter, notes("None"))
            .respond(Role::Planner, plan("已完成"));
        let agent = PhoneAgent::new(
            model,
            FakeDevice::new().with_screen(screen, false),
            store_without_shortcuts(),
            config().with_curation(false),
        );
        agent.run("open maps").await.unwrap();
        assert_eq!(agent.device().calls(), vec![DeviceCall::Tap(150, 520)]);
        assert!(agent.model.prompts(Role::Actor)[0].contains("Maps"));
    }

    #[tokio::test]
    async fn test_screenshot_failure_is_fatal() {
        let device = FakeDevice::new().fail_on("capture_screenshot", DeviceError::Screenshot("no device".into()));
        let agent = PhoneAgent::new(ScriptedModel::new(), device, store_without_shortcuts(), config());
        let err = agent.run("task").await.unwrap_err();
        assert!(matches!(err, AgentError::Device(DeviceError::Screenshot(_))));
    }

    #[tokio::test]
    async fn test_exhausted_model_is_fatal() {
        let agent = PhoneAgent::new(ScriptedModel::new(), FakeDevice::new(), store_without_shortcuts(), config());
        assert!(matches!(agent.run("task").await, Err(AgentError::Model(_))));
    }

    #[test]
    fn test_agent_config_default() {
        let config = AgentConfig::default();
        assert_eq!(config.max_steps, 40);
        assert_eq!(config.err_to_manager_thresh, 2);
        assert_eq!(config.lang, "cn");
        assert!(config.verbose);
        assert!(config.enable_retrieval && config.enable_curation);
    }

    #[test]
    fn test_agent_config_builder() {
        let config = AgentConfig::default()
            .with_device_id("emulator-5554")
            .with_lang("en")
            .with_max_steps(10)
            .with_guards(5, 4)
            .quiet();
        assert_eq!(config.device_id.as_deref(), Some("emulator-5554"));
        assert_eq!(config.lang, "en");
        assert_eq!(config.max_steps, 10);
        assert_eq!(config.max_consecutive_failures, 5);
        assert_eq!(config.max_repetitive_actions, 4);
        assert!(!config.verbose);
    }
}
