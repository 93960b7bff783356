//! Internationalization (i18n) module for Phone Agent console messages.

/// Console messages structure
#[derive(Debug, Clone)]
pub struct Messages {
    pub thinking: &'static str,
    pub action: &'static str,
    pub expectation: &'static str,
    pub outcome: &'static str,
    pub error: &'static str,
    pub progress: &'static str,
    pub plan: &'static str,
    pub subgoal: &'static str,
    pub notes: &'static str,
    pub task_completed: &'static str,
    pub task_stopped: &'static str,
    pub starting_task: &'static str,
    pub new_shortcut: &'static str,
    pub shortcuts: &'static str,
    pub tips: &'static str,
    pub no_experience: &'static str,
    pub connection_failed: &'static str,
    pub connection_successful: &'static str,
    pub step: &'static str,
    pub task: &'static str,
    pub result: &'static str,
}

/// Chinese messages
pub static MESSAGES_ZH: Messages = Messages {
    thinking: "思考过程",
    action: "执行动作",
    expectation: "预期结果",
    outcome: "动作结果",
    error: "错误描述",
    progress: "进度状态",
    plan: "计划",
    subgoal: "当前子目标",
    notes: "重要笔记",
    task_completed: "任务完成",
    task_stopped: "任务终止",
    starting_task: "开始执行任务",
    new_shortcut: "新增快捷方式",
    shortcuts: "快捷方式",
    tips: "经验提示",
    no_experience: "暂无经验",
    connection_failed: "连接失败",
    connection_successful: "连接成功",
    step: "步骤",
    task: "任务",
    result: "结果",
};

/// English messages
pub static MESSAGES_EN: Messages = Messages {
    thinking: "Thinking",
    action: "Action",
    expectation: "Expectation",
    outcome: "Outcome",
    error: "Error",
    progress: "Progress",
    plan: "Plan",
    subgoal: "Current Subgoal",
    notes: "Important Notes",
    task_completed: "Task Completed",
    task_stopped: "Task Stopped",
    starting_task: "Starting task",
    new_shortcut: "New Shortcut",
    shortcuts: "Shortcuts",
    tips: "Tips",
    no_experience: "No experience yet",
    connection_failed: "Connection Failed",
    connection_successful: "Connection Successful",
    step: "Step",
    task: "Task",
    result: "Result",
};

/// Get console messages by language.
///
/// # Arguments
/// * `lang` - Language code, "cn" for Chinese, "en" for English.
pub fn get_messages(lang: &str) -> &'static Messages {
    match lang {
        "en" => &MESSAGES_EN,
        _ => &MESSAGES_ZH,
    }
}
