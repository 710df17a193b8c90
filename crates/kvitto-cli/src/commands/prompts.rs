//! Prompt commands
//!
//! Every prompt belongs to one workflow stage and is served by the model the
//! router assigns to that stage's task.

use std::collections::BTreeSet;

use anyhow::{anyhow, Context, Result};
use kvitto_core::model_router::{ModelRouter, TaskType};
use kvitto_core::prompts::{default_prompts_dir, PromptId, PromptLibrary};
use kvitto_core::workflow::Stage;

/// The workflow stage that sends a prompt, and the routed task that picks its model
pub fn workflow_use(id: PromptId) -> (Stage, TaskType) {
    match id {
        PromptId::ExtractReceipt => (Stage::Extracting, TaskType::Vision),
        PromptId::ClassifyExpense => (Stage::Classifying, TaskType::Classification),
        PromptId::ReviseExpense => (Stage::Revising, TaskType::Revision),
    }
}

/// `{{name}}` placeholders in a template, sorted and deduplicated
pub fn template_vars(content: &str) -> Vec<String> {
    let mut vars = BTreeSet::new();
    for chunk in content.split("{{").skip(1) {
        if let Some((name, _)) = chunk.split_once("}}") {
            let name = name.trim();
            if !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
                vars.insert(name.to_string());
            }
        }
    }
    vars.into_iter().collect()
}

fn load_router() -> Result<ModelRouter> {
    ModelRouter::new().context("Failed to load model routing config")
}

/// List prompts in workflow order with the model each one is sent to
pub fn cmd_prompts_list() -> Result<()> {
    let mut library = PromptLibrary::new();
    let router = load_router()?;

    println!("\n🧠 Workflow prompts\n");
    println!(
        "{:<12} {:<18} {:<24} {:>3}  {}",
        "STAGE", "PROMPT", "MODEL", "V", "SOURCE"
    );
    println!("{}", "─".repeat(72));

    for info in library.list() {
        let Ok(id) = info.id.parse::<PromptId>() else {
            continue;
        };
        let (stage, task) = workflow_use(id);
        let source = match &info.override_path {
            Some(path) => format!("override ({})", path.display()),
            None => "built-in".to_string(),
        };
        println!(
            "{:<12} {:<18} {:<24} {:>3}  {}",
            stage.as_str(),
            info.id,
            router.model_for_task(task),
            info.version,
            source
        );
    }

    let alternates = &router.config().vision_alternates;
    if !alternates.is_empty() {
        println!();
        println!("Change-model cycles through: {}", alternates.join(", "));
    }

    println!();
    println!("Override a prompt with 'kvitto prompts path' and a file named <prompt>.md there.");
    println!("The next 'kvitto process' run picks it up.");

    Ok(())
}

/// Show one prompt, where it is used and what it expects to be filled in
pub fn cmd_prompts_show(prompt_id: &str) -> Result<()> {
    let id: PromptId = prompt_id.parse().map_err(|e: String| {
        let known: Vec<&str> = PromptId::all().iter().map(|id| id.as_str()).collect();
        anyhow!("{} (known prompts: {})", e, known.join(", "))
    })?;
    let (stage, task) = workflow_use(id);
    let router = load_router()?;

    let mut library = PromptLibrary::new();
    let prompt = library.get(id)?;

    println!("Prompt:       {} (v{})", prompt.metadata.id, prompt.metadata.version);
    println!("Stage:        {}", stage);
    println!(
        "Model:        {} ({} task)",
        router.model_for_task(task),
        task.as_str()
    );
    match &prompt.override_path {
        Some(path) if prompt.is_override => println!("Source:       {}", path.display()),
        _ => println!("Source:       built-in"),
    }

    let vars = template_vars(&prompt.content);
    if !vars.is_empty() {
        println!("Placeholders: {}", vars.join(", "));
    }

    println!();
    println!("{}", prompt.content);

    Ok(())
}

/// Print the override directory and the file each prompt would be read from
pub fn cmd_prompts_path() -> Result<()> {
    let dir = default_prompts_dir()
        .ok_or_else(|| anyhow!("The data directory is not available on this system"))?;
    println!("{}", dir.display());

    let library = PromptLibrary::with_override_dir(dir.clone());
    for &id in PromptId::all() {
        if library.has_override(id) {
            if let Some(path) = library.override_path(id) {
                println!("  {:<18} {}", id.as_str(), path.display());
            }
        }
    }

    if !dir.exists() {
        eprintln!();
        eprintln!("This directory does not exist yet; create it to add overrides.");
    }

    Ok(())
}
