//! Session state shared by every decision unit during one task.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::actions::{ActionDecision, AtomicKind, ShortcutDef};
use crate::device::{PerceptionItem, DEFAULT_SCREEN_HEIGHT, DEFAULT_SCREEN_WIDTH};

/// The subgoal a Planner sets once the instruction is satisfied.
pub const DONE_SENTINEL: &str = "已完成";

/// Error description recorded for successful steps.
pub const NO_ERROR: &str = "None";

/// Default number of consecutive failures before the Planner is alerted.
pub const DEFAULT_ERR_TO_MANAGER_THRESH: usize = 2;

static OUTCOME_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b([ABC])\b").expect("valid regex"));

/// Whether a subgoal marks the task as complete.
pub fn is_done_subgoal(subgoal: &str) -> bool {
    let subgoal = subgoal.trim();
    subgoal.contains(DONE_SENTINEL)
        || subgoal.eq_ignore_ascii_case("finished")
        || subgoal.eq_ignore_ascii_case("done")
}

/// How the last action turned out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    /// Successful or partially successful.
    A,
    /// Landed on a wrong page; going back is advisable.
    B,
    /// Nothing changed.
    C,
}

impl Outcome {
    pub fn is_success(self) -> bool {
        self == Outcome::A
    }

    /// Parse the evaluator's answer: the first standalone `A`, `B` or `C` it mentions.
    pub fn from_answer(answer: &str) -> Option<Self> {
        let answer = answer.replace(['*', '_'], " ");
        let letter = OUTCOME_RE.captures(&answer)?;
        match &letter[1] {
            "A" => Some(Outcome::A),
            "B" => Some(Outcome::B),
            _ => Some(Outcome::C),
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Outcome::A => "A",
            Outcome::B => "B",
            Outcome::C => "C",
        };
        f.write_str(s)
    }
}

/// What happened in one completed step, before bookkeeping rules are applied.
#[derive(Debug, Clone)]
pub struct StepRecord {
    pub action: ActionDecision,
    pub summary: String,
    pub outcome: Outcome,
    pub error_description: String,
    pub progress_status: String,
}

/// Failure of one step inside a shortcut, surfaced to the evaluator.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchFailure {
    pub step: usize,
    pub action: String,
    pub message: String,
}

impl fmt::Display for DispatchFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Error in executing step {}: {} ({})",
            self.step, self.action, self.message
        )
    }
}

/// A read-only view of one history entry.
#[derive(Debug, Clone, Copy)]
pub struct HistoryEntry<'a> {
    pub action: &'a ActionDecision,
    pub summary: &'a str,
    pub outcome: Outcome,
    pub error_description: &'a str,
    pub progress_status: &'a str,
}

/// The single mutable record threaded through one task.
///
/// The five histories only grow through [`SessionState::record_step`], so
/// they always have the same length.
#[derive(Debug, Clone)]
pub struct SessionState {
    pub instruction: String,
    pub tips: String,
    pub shortcuts: BTreeMap<String, ShortcutDef>,
    shortcut_order: Vec<String>,
    pub future_tasks: Vec<String>,

    pub width: u32,
    pub height: u32,
    pub perception_pre: Vec<PerceptionItem>,
    pub perception_post: Vec<PerceptionItem>,
    pub keyboard_pre: bool,
    pub keyboard_post: bool,

    summary_history: Vec<String>,
    action_history: Vec<ActionDecision>,
    action_outcomes: Vec<Outcome>,
    error_descriptions: Vec<String>,
    progress_status_history: Vec<String>,

    important_notes: String,

    pub plan: String,
    pub progress_status: String,
    pub current_subgoal: String,
    pub prev_subgoal: String,

    pub last_action: Option<ActionDecision>,
    pub last_summary: String,
    pub last_action_thought: String,
    pub last_dispatch_error: Option<DispatchFailure>,
    pub finish_thought: String,

    error_flag_plan: bool,
    pub err_to_manager_thresh: usize,
}

impl SessionState {
    pub fn new(
        instruction: impl Into<String>,
        tips: impl Into<String>,
        shortcuts: BTreeMap<String, ShortcutDef>,
    ) -> Self {
        Self {
            instruction: instruction.into(),
            tips: tips.into(),
            shortcuts,
            shortcut_order: Vec::new(),
            future_tasks: Vec::new(),
            width: DEFAULT_SCREEN_WIDTH,
            height: DEFAULT_SCREEN_HEIGHT,
            perception_pre: Vec::new(),
            perception_post: Vec::new(),
            keyboard_pre: false,
            keyboard_post: false,
            summary_history: Vec::new(),
            action_history: Vec::new(),
            action_outcomes: Vec::new(),
            error_descriptions: Vec::new(),
            progress_status_history: Vec::new(),
            important_notes: String::new(),
            plan: String::new(),
            progress_status: String::new(),
            current_subgoal: String::new(),
            prev_subgoal: String::new(),
            last_action: None,
            last_summary: String::new(),
            last_action_thought: String::new(),
            last_dispatch_error: None,
            finish_thought: String::new(),
            error_flag_plan: false,
            err_to_manager_thresh: DEFAULT_ERR_TO_MANAGER_THRESH,
        }
    }

    /// List these shortcut names first, in this order.
    pub fn with_shortcut_order(mut self, names: Vec<String>) -> Self {
        self.shortcut_order = names;
        self
    }

    /// Shortcuts in retrieval rank, then any unranked ones by name.
    pub fn ranked_shortcuts(&self) -> impl Iterator<Item = &ShortcutDef> + '_ {
        let ranked = self
            .shortcut_order
            .iter()
            .filter_map(|name| self.shortcuts.get(name));
        let rest = self
            .shortcuts
            .values()
            .filter(|def| !self.shortcut_order.contains(&def.name));
        ranked.chain(rest)
    }

    pub fn with_future_tasks(mut self, future_tasks: Vec<String>) -> Self {
        self.future_tasks = future_tasks;
        self
    }

    pub fn with_err_threshold(mut self, threshold: usize) -> Self {
        self.err_to_manager_thresh = threshold.max(1);
        self
    }

    /// Append one completed step to all five histories.
    ///
    /// Successful steps record the fixed [`NO_ERROR`] token and their new
    /// progress. Failed steps keep the previous progress and always carry a
    /// non-empty error description.
    pub fn record_step(&mut self, record: StepRecord) {
        let StepRecord {
            action,
            summary,
            outcome,
            error_description,
            progress_status,
        } = record;

        let error_description = match outcome {
            Outcome::A => NO_ERROR.to_string(),
            _ if error_description.trim().is_empty() || error_description.trim() == NO_ERROR => {
                format!("Outcome {}: no description was given.", outcome)
            }
            _ => error_description,
        };
        if outcome.is_success() {
            self.progress_status = progress_status;
        }

        self.action_history.push(action);
        self.summary_history.push(summary);
        self.action_outcomes.push(outcome);
        self.error_descriptions.push(error_description);
        self.progress_status_history.push(self.progress_status.clone());

        let thresh = self.err_to_manager_thresh;
        if self.action_outcomes.len() >= thresh
            && self.action_outcomes[self.action_outcomes.len() - thresh..]
                .iter()
                .all(|o| !o.is_success())
        {
            self.error_flag_plan = true;
        }
    }

    /// Number of completed steps.
    pub fn steps(&self) -> usize {
        self.action_history.len()
    }

    pub fn error_flag_plan(&self) -> bool {
        self.error_flag_plan
    }

    /// Lower the error flag once the Planner has seen it.
    pub fn acknowledge_error_flag(&mut self) {
        self.error_flag_plan = false;
    }

    /// The most recent `n` history entries, oldest first.
    pub fn recent_history(&self, n: usize) -> impl Iterator<Item = HistoryEntry<'_>> {
        let start = self.steps().saturating_sub(n);
        (start..self.steps()).map(move |i| self.entry(i))
    }

    pub fn history(&self) -> impl Iterator<Item = HistoryEntry<'_>> {
        self.recent_history(self.steps())
    }

    fn entry(&self, i: usize) -> HistoryEntry<'_> {
        HistoryEntry {
            action: &self.action_history[i],
            summary: &self.summary_history[i],
            outcome: self.action_outcomes[i],
            error_description: &self.error_descriptions[i],
            progress_status: &self.progress_status_history[i],
        }
    }

    pub fn action_history(&self) -> &[ActionDecision] {
        &self.action_history
    }

    pub fn summary_history(&self) -> &[String] {
        &self.summary_history
    }

    pub fn action_outcomes(&self) -> &[Outcome] {
        &self.action_outcomes
    }

    pub fn error_descriptions(&self) -> &[String] {
        &self.error_descriptions
    }

    pub fn progress_status_history(&self) -> &[String] {
        &self.progress_status_history
    }

    /// Whether the last two steps were both taps that changed nothing.
    pub fn should_hint_scroll(&self) -> bool {
        let recent: Vec<_> = self.recent_history(2).collect();
        recent.len() == 2
            && recent
                .iter()
                .all(|e| e.action.name == AtomicKind::Tap.name() && e.outcome == Outcome::C)
    }

    /// Length of the trailing run of non-A outcomes.
    pub fn consecutive_failures(&self) -> usize {
        self.action_outcomes
            .iter()
            .rev()
            .take_while(|o| !o.is_success())
            .count()
    }

    /// Length of the trailing run of identical actions that made no progress.
    ///
    /// Swipes and Back presses never count: repeating them is how lists are
    /// scrolled and nested pages are left.
    pub fn trailing_repeats(&self) -> usize {
        let Some(last) = self.action_history.last() else {
            return 0;
        };
        if last.name == AtomicKind::Swipe.name() || last.name == AtomicKind::Back.name() {
            return 0;
        }
        self.action_history
            .iter()
            .zip(&self.action_outcomes)
            .rev()
            .take_while(|(action, outcome)| *action == last && !outcome.is_success())
            .count()
    }

    pub fn important_notes(&self) -> &str {
        &self.important_notes
    }

    /// Fold new notes in without ever losing what is already there.
    pub fn merge_notes(&mut self, notes: &str) {
        self.important_notes = merge_notes(&self.important_notes, notes);
    }

    pub fn is_done(&self) -> bool {
        is_done_subgoal(&self.current_subgoal)
    }
}

/// Monotonic note merge.
///
/// A response that already contains the old notes replaces them; one that
/// is already contained in them changes nothing; anything else is appended.
pub fn merge_notes(old: &str, new: &str) -> String {
    let old_trimmed = old.trim();
    let new_trimmed = new.trim();
    if new_trimmed.is_empty() || old_trimmed.contains(new_trimmed) {
        old.to_string()
    } else if old_trimmed.is_empty() || new_trimmed.contains(old_trimmed) {
        new_trimmed.to_string()
    } else {
        format!("{} {}", old_trimmed, new_trimmed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Map};

    fn tap(x: i64, y: i64) -> ActionDecision {
        let args = json!({"x": x, "y": y}).as_object().cloned().unwrap();
        ActionDecision::new("Tap", args)
    }

    fn record(state: &mut SessionState, action: ActionDecision, outcome: Outcome) {
        state.record_step(StepRecord {
            action,
            summary: "summary".to_string(),
            outcome,
            error_description: if outcome.is_success() { String::new() } else { "nothing happened".to_string() },
            progress_status: format!("progress after {}", state.steps() + 1),
        });
    }

    #[test]
    fn test_histories_stay_equal_length() {
        let mut state = SessionState::new("task", "", BTreeMap::new());
        for (i, outcome) in [Outcome::A, Outcome::C, Outcome::B, Outcome::A].into_iter().enumerate() {
            record(&mut state, tap(i as i64, 0), outcome);
            let n = state.steps();
            assert_eq!(n, i + 1);
            assert_eq!(state.summary_history().len(), n);
            assert_eq!(state.action_outcomes().len(), n);
            assert_eq!(state.error_descriptions().len(), n);
            assert_eq!(state.progress_status_history().len(), n);
        }
    }

    #[test]
    fn test_progress_copied_forward_on_failure() {
        let mut state = SessionState::new("task", "", BTreeMap::new());
        record(&mut state, tap(1, 1), Outcome::A);
        assert_eq!(state.progress_status, "progress after 1");
        record(&mut state, tap(2, 2), Outcome::C);
        assert_eq!(state.progress_status, "progress after 1");
        assert_eq!(state.progress_status_history()[1], "progress after 1");
        assert_eq!(state.error_descriptions()[0], NO_ERROR);
        assert_eq!(state.error_descriptions()[1], "nothing happened");
    }

    #[test]
    fn test_failure_without_description_gets_one() {
        let mut state = SessionState::new("task", "", BTreeMap::new());
        state.record_step(StepRecord {
            action: ActionDecision::new("Back", Map::new()),
            summary: String::new(),
            outcome: Outcome::B,
            error_description: "None".to_string(),
            progress_status: String::new(),
        });
        assert!(!state.error_descriptions()[0].is_empty());
        assert_ne!(state.error_descriptions()[0], NO_ERROR);
    }

    #[test]
    fn test_error_flag_raised_and_only_cleared_by_acknowledge() {
        let mut state = SessionState::new("task", "", BTreeMap::new());
        record(&mut state, tap(1, 1), Outcome::B);
        assert!(!state.error_flag_plan());
        record(&mut state, tap(2, 2), Outcome::C);
        assert!(state.error_flag_plan());

        record(&mut state, tap(3, 3), Outcome::A);
        assert!(state.error_flag_plan());

        state.acknowledge_error_flag();
        assert!(!state.error_flag_plan());
    }

    #[test]
    fn test_scroll_hint_after_two_failed_taps() {
        let mut state = SessionState::new("task", "", BTreeMap::new());
        record(&mut state, tap(1, 1), Outcome::C);
        assert!(!state.should_hint_scroll());
        record(&mut state, tap(2, 2), Outcome::C);
        assert!(state.should_hint_scroll());

        let mut state = SessionState::new("task", "", BTreeMap::new());
        record(&mut state, tap(1, 1), Outcome::A);
        record(&mut state, tap(2, 2), Outcome::C);
        assert!(!state.should_hint_scroll());
    }

    #[test]
    fn test_guard_counters() {
        let mut state = SessionState::new("task", "", BTreeMap::new());
        record(&mut state, tap(1, 1), Outcome::A);
        record(&mut state, tap(5, 5), Outcome::C);
        record(&mut state, tap(5, 5), Outcome::B);
        assert_eq!(state.consecutive_failures(), 2);
        assert_eq!(state.trailing_repeats(), 2);
    }

    #[test]
    fn test_repeats_ignore_progress_and_scrolling() {
        let mut state = SessionState::new("task", "", BTreeMap::new());
        for _ in 0..3 {
            record(&mut state, tap(5, 5), Outcome::A);
        }
        assert_eq!(state.trailing_repeats(), 0);
        record(&mut state, tap(5, 5), Outcome::C);
        assert_eq!(state.trailing_repeats(), 1);

        let swipe = ActionDecision::new(
            "Swipe",
            json!({"x1": 500, "y1": 1500, "x2": 500, "y2": 500}).as_object().cloned().unwrap(),
        );
        for _ in 0..3 {
            record(&mut state, swipe.clone(), Outcome::C);
        }
        assert_eq!(state.trailing_repeats(), 0);

        for _ in 0..3 {
            record(&mut state, ActionDecision::new("Back", Map::new()), Outcome::B);
        }
        assert_eq!(state.trailing_repeats(), 0);
    }

    #[test]
    fn test_merge_notes_is_monotonic_and_idempotent() {
        assert_eq!(merge_notes("", "Price is $5."), "Price is $5.");
        assert_eq!(merge_notes("Price is $5.", "Price is $5."), "Price is $5.");
        assert_eq!(
            merge_notes("Price is $5.", "Price is $5. Store closes at 9."),
            "Price is $5. Store closes at 9."
        );
        assert_eq!(
            merge_notes("Price is $5.", "Store closes at 9."),
            "Price is $5. Store closes at 9."
        );
        assert_eq!(merge_notes("Price is $5.", ""), "Price is $5.");

        let mut state = SessionState::new("task", "", BTreeMap::new());
        state.merge_notes("A fact.");
        state.merge_notes("Another fact.");
        assert!(state.important_notes().contains("A fact."));
        assert!(state.important_notes().contains("Another fact."));
    }

    #[test]
    fn test_ranked_shortcuts_keep_retrieval_order() {
        let def = |name: &str| ShortcutDef {
            name: name.to_string(),
            arguments: Vec::new(),
            description: String::new(),
            precondition: String::new(),
            atomic_action_sequence: Vec::new(),
        };
        let shortcuts: BTreeMap<String, ShortcutDef> =
            ["Alpha", "Mid", "Zulu"].iter().map(|n| (n.to_string(), def(n))).collect();

        let state = SessionState::new("task", "", shortcuts.clone());
        let names: Vec<_> = state.ranked_shortcuts().map(|d| d.name.as_str()).collect();
        assert_eq!(names, ["Alpha", "Mid", "Zulu"]);

        let state = SessionState::new("task", "", shortcuts)
            .with_shortcut_order(vec!["Zulu".into(), "Gone".into(), "Alpha".into()]);
        let names: Vec<_> = state.ranked_shortcuts().map(|d| d.name.as_str()).collect();
        assert_eq!(names, ["Zulu", "Alpha", "Mid"]);
    }

    #[test]
    fn test_done_sentinel() {
        assert!(is_done_subgoal("已完成"));
        assert!(is_done_subgoal(" Finished "));
        assert!(!is_done_subgoal("Open Maps"));
    }

    #[test]
    fn test_outcome_from_answer() {
        assert_eq!(Outcome::from_answer("A"), Some(Outcome::A));
        assert_eq!(Outcome::from_answer("\"B\" wrong page"), Some(Outcome::B));
        assert_eq!(Outcome::from_answer("C: no change"), Some(Outcome::C));
        assert_eq!(Outcome::from_answer("D"), None);
        assert_eq!(Outcome::from_answer(""), None);
    }

    #[test]
    fn test_outcome_from_decorated_answer() {
        assert_eq!(Outcome::from_answer("Answer: B"), Some(Outcome::B));
        assert_eq!(Outcome::from_answer("**B**"), Some(Outcome::B));
        assert_eq!(Outcome::from_answer("Option C"), Some(Outcome::C));
        assert_eq!(Outcome::from_answer("`A` - the search page opened"), Some(Outcome::A));
        assert_eq!(Outcome::from_answer("(C) nothing changed"), Some(Outcome::C));
        assert_eq!(Outcome::from_answer("__A__"), Some(Outcome::A));
        assert_eq!(Outcome::from_answer("none"), None);
        assert_eq!(Outcome::from_answer("Answered"), None);
    }
}
