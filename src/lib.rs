// Copyright 2025 Zhipu AI (Original Python implementation)
// Copyright 2025 ModerRAS (Rust implementation)
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! # Phone Agent E
//!
//! Self-evolving agent for automating Android phone interactions.
//!
//! A task runs as a loop of role-specialized model calls over one shared
//! session state: the Planner keeps a plan and a current subgoal, the Actor
//! picks an atomic action or a learned shortcut, the dispatcher drives the
//! device over ADB, the Outcome-Evaluator grades the step and the
//! Memory-Writer keeps task-relevant notes. After the loop, curation mines
//! the trace for new shortcuts and tips; before the next task, retrieval
//! picks the relevant ones.
//!
//! ## Example
//!
//! ```rust,no_run
//! use phone_agent_e::{AdbDevice, AgentConfig, JsonExperienceStore, ModelClient, ModelConfig, PhoneAgent};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let agent = PhoneAgent::new(
//!         ModelClient::new(ModelConfig::default()),
//!         AdbDevice::new(None),
//!         JsonExperienceStore::new("experience.json"),
//!         AgentConfig::default(),
//!     );
//!
//!     let report = agent.run("打开地图搜索咖啡").await?;
//!     println!("Task result: {:?}", report.reason);
//!     Ok(())
//! }
//! ```

pub mod actions;
pub mod adb;
pub mod agent;
pub mod config;
pub mod device;
pub mod experience;
pub mod model;
pub mod settings;

#[cfg(test)]
mod testing;

pub use actions::{ActionDecision, ActionHandler, AtomicKind, Dispatched, ShortcutDef};
pub use adb::AdbDevice;
pub use agent::{
    AgentConfig, AgentError, Outcome, PhoneAgent, SessionState, TaskReport, TerminationReason,
};
pub use device::{DeviceController, DeviceError, Perceiver, PerceptionItem, Screenshot};
pub use experience::{
    Experience, ExperienceStore, InMemoryExperienceStore, JsonExperienceStore,
};
pub use model::{ChatModel, ModelClient, ModelConfig};
pub use settings::AppSettings;
