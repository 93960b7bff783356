//! Phone Agent E - self-evolving Android phone automation
//!
//! This is the CLI entry point for the phone-agent-e tool.
//! Run with: cargo run --bin phone-agent-e -- "<task>"

use phone_agent_e::adb::ADBConnection;
use phone_agent_e::config::{get_messages, Messages};
use phone_agent_e::{
    AdbDevice, AppSettings, ExperienceStore, JsonExperienceStore, ModelClient, PhoneAgent,
};
use std::env;
use std::io::{self, BufRead, Write};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (ignore errors if file doesn't exist)
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args: Vec<String> = env::args().skip(1).collect();
    let settings = AppSettings::load_with_env();
    let store = JsonExperienceStore::new(settings.experience_path());

    if args.iter().any(|arg| arg == "--save-settings") {
        let path = settings.save().map_err(anyhow::Error::msg)?;
        println!("Settings saved to {}", path.display());
        return Ok(());
    }

    let msgs = get_messages(&settings.lang);

    if args.iter().any(|arg| arg == "--experience") {
        print_experience(&store, msgs)?;
        return Ok(());
    }

    let model_config = settings.model_config();
    let agent_config = settings.agent_config();

    println!("🤖 Phone Agent E - Self-evolving Android Automation");
    println!("================================================");
    println!("Model: {} @ {}", model_config.model_name, model_config.base_url);
    println!("Language: {}", agent_config.lang);
    println!(
        "Retry: max {} attempts, {}s delay",
        model_config.max_retries, model_config.retry_delay_secs
    );
    println!("Experience: {}", store.path().display());
    match ADBConnection::new().list_devices() {
        Ok(devices) if devices.is_empty() => println!("⚠️ {}: no ADB devices", msgs.connection_failed),
        Ok(devices) => {
            println!("✅ {}", msgs.connection_successful);
            for device in devices {
                println!(
                    "Device: {} ({}) {}",
                    device.device_id,
                    device.status,
                    device.model.unwrap_or_default()
                );
            }
        }
        Err(e) => println!("⚠️ {}: {}", msgs.connection_failed, e),
    }
    if let Some(ref id) = agent_config.device_id {
        println!("Using device: {}", id);
    }
    println!("================================================\n");

    let device = AdbDevice::new(agent_config.device_id.clone());
    let agent = PhoneAgent::new(ModelClient::new(model_config), device, store, agent_config);

    let task_args: Vec<&str> = args
        .iter()
        .filter(|arg| !arg.starts_with("--"))
        .map(String::as_str)
        .collect();

    if !task_args.is_empty() {
        let task = task_args.join(" ");
        println!("📝 Task: {}\n", task);
        run_task(&agent, &task).await;
        return Ok(());
    }

    // Interactive mode
    println!("Interactive mode. Type your task and press Enter.");
    println!("Type 'quit' or 'exit' to exit.\n");

    let stdin = io::stdin();
    loop {
        print!("📝 Task: ");
        io::stdout().flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let task = line.trim();

        if task.is_empty() {
            continue;
        }

        if task == "quit" || task == "exit" {
            println!("Goodbye! 👋");
            break;
        }

        run_task(&agent, task).await;
    }

    Ok(())
}

async fn run_task(agent: &PhoneAgent<ModelClient, AdbDevice, JsonExperienceStore>, task: &str) {
    match agent.run(task).await {
        Ok(report) => {
            println!("\n✅ Result: {:?} after {} steps", report.reason, report.steps);
            if !report.finish_thought.is_empty() {
                println!("{}", report.finish_thought);
            }
            if let Some(name) = report.new_shortcut {
                println!("🧩 Learned shortcut: {}", name);
            }
            println!();
        }
        Err(e) => eprintln!("\n❌ Error: {}\n", e),
    }
}

fn print_experience(store: &JsonExperienceStore, msgs: &Messages) -> anyhow::Result<()> {
    let experience = store.load()?;
    println!("Experience store: {}", store.path().display());
    println!("Last updated: {}\n", experience.last_updated);
    if experience.is_empty() {
        println!("{}", msgs.no_experience);
        return Ok(());
    }
    println!("{} ({}):", msgs.shortcuts, experience.shortcuts.len());
    for shortcut in experience.shortcuts.values() {
        println!("- {}", shortcut.summary_line());
    }
    println!("\n{}:\n{}", msgs.tips, experience.tips);
    Ok(())
}
