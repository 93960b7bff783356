//! Configuration module for Phone Agent.

mod i18n;
mod prompts;

pub use i18n::{get_messages, Messages};
pub use prompts::{system_prompt, today_line};
