//! Scripted collaborators for driving the agent in tests.

use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::agent::Role;
use crate::device::{
    DeviceController, DeviceError, Perceiver, PerceptionItem, Screenshot, DEFAULT_SCREEN_HEIGHT,
    DEFAULT_SCREEN_WIDTH,
};
use crate::model::{ChatModel, ChatRequest, ModelError};

/// Replies from per-role queues and remembers every prompt it was sent.
///
/// An exhausted queue answers with a `ModelError`.
#[derive(Debug, Default)]
pub struct ScriptedModel {
    responses: Mutex<HashMap<Role, VecDeque<String>>>,
    prompts: Mutex<Vec<(Role, String)>>,
}

impl ScriptedModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(self, role: Role, response: impl Into<String>) -> Self {
        self.responses
            .lock()
            .unwrap()
            .entry(role)
            .or_default()
            .push_back(response.into());
        self
    }

    /// Prompts sent for `role`, oldest first.
    pub fn prompts(&self, role: Role) -> Vec<String> {
        self.prompts
            .lock()
            .unwrap()
            .iter()
            .filter(|(r, _)| *r == role)
            .map(|(_, prompt)| prompt.clone())
            .collect()
    }
}

#[async_trait]
impl ChatModel for ScriptedModel {
    async fn complete(&self, request: ChatRequest) -> Result<String, ModelError> {
        self.prompts
            .lock()
            .unwrap()
            .push((request.role, request.prompt.clone()));
        self.responses
            .lock()
            .unwrap()
            .get_mut(&request.role)
            .and_then(VecDeque::pop_front)
            .ok_or_else(|| ModelError::ParseError(format!("no scripted response for {}", request.role)))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DeviceCall {
    Tap(i32, i32),
    Swipe(i32, i32, i32, i32),
    Type(String),
    Enter,
    Back,
    Home,
    SwitchApp,
}

/// Records input calls and shows a fixed screen.
#[derive(Debug, Default)]
pub struct FakeDevice {
    calls: Mutex<Vec<DeviceCall>>,
    failures: HashMap<&'static str, DeviceError>,
    screen: Vec<PerceptionItem>,
    keyboard: bool,
}

impl FakeDevice {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the named trait method fail every time.
    pub fn fail_on(mut self, method: &'static str, error: DeviceError) -> Self {
        self.failures.insert(method, error);
        self
    }

    pub fn with_screen(mut self, items: Vec<PerceptionItem>, keyboard: bool) -> Self {
        self.screen = items;
        self.keyboard = keyboard;
        self
    }

    pub fn calls(&self) -> Vec<DeviceCall> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, method: &'static str, call: DeviceCall) -> Result<(), DeviceError> {
        self.check(method)?;
        self.calls.lock().unwrap().push(call);
        Ok(())
    }

    fn check(&self, method: &'static str) -> Result<(), DeviceError> {
        match self.failures.get(method) {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }
}

impl DeviceController for FakeDevice {
    fn tap(&self, x: i32, y: i32) -> Result<(), DeviceError> {
        self.record("tap", DeviceCall::Tap(x, y))
    }

    fn swipe(&self, x1: i32, y1: i32, x2: i32, y2: i32) -> Result<(), DeviceError> {
        self.record("swipe", DeviceCall::Swipe(x1, y1, x2, y2))
    }

    fn type_text(&self, text: &str) -> Result<(), DeviceError> {
        self.record("type_text", DeviceCall::Type(text.to_string()))
    }

    fn enter(&self) -> Result<(), DeviceError> {
        self.record("enter", DeviceCall::Enter)
    }

    fn back(&self) -> Result<(), DeviceError> {
        self.record("back", DeviceCall::Back)
    }

    fn home(&self) -> Result<(), DeviceError> {
        self.record("home", DeviceCall::Home)
    }

    fn switch_app(&self) -> Result<(), DeviceError> {
        self.record("switch_app", DeviceCall::SwitchApp)
    }

    fn capture_screenshot(&self) -> Result<Screenshot, DeviceError> {
        self.check("capture_screenshot")?;
        Ok(Screenshot::new(
            "ZmFrZQ==".to_string(),
            DEFAULT_SCREEN_WIDTH,
            DEFAULT_SCREEN_HEIGHT,
            false,
        ))
    }
}

impl Perceiver for FakeDevice {
    fn detect(&self, _screenshot: &Screenshot) -> Result<Vec<PerceptionItem>, DeviceError> {
        self.check("detect")?;
        Ok(self.screen.clone())
    }

    fn keyboard_active(&self) -> bool {
        self.keyboard
    }
}

/// A fresh path under the system temp dir.
pub fn temp_path(name: &str) -> PathBuf {
    std::env::temp_dir()
        .join(format!("phone-agent-e-{}", uuid::Uuid::new_v4()))
        .join(name)
}
