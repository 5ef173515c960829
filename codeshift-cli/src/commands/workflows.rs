//! Workflows command - list the workflow catalog

use clap::Args;

use crate::app::App;

/// List configured workflows
#[derive(Args, Debug)]
pub struct WorkflowsArgs {
    /// Show each workflow's steps
    #[arg(short, long)]
    pub steps: bool,
}

impl WorkflowsArgs {
    /// Execute the workflows command
    pub fn execute(&self, app: &App) -> anyhow::Result<()> {
        let catalog = app.orchestrator.catalog();

        println!("Workflows ({})", app.config.workflows_path()?.display());
        println!();
        for (key, workflow) in &catalog.workflows {
            let extensions = catalog.extensions.extensions_for(key).unwrap_or_default();
            if workflow.description.is_empty() {
                println!("  {}", key);
            } else {
                println!("  {} - {}", key, workflow.description);
            }
            if !extensions.is_empty() {
                println!("      files: {}", extensions.join(" "));
            }

            if self.steps {
                for (index, step) in workflow.steps.iter().enumerate() {
                    let gate = if step.requires_approval { " [approval]" } else { "" };
                    let model = step
                        .model_name
                        .as_deref()
                        .map(|m| format!(" model={}", m))
                        .unwrap_or_default();
                    println!(
                        "      {}. {} ({}){}{}",
                        index,
                        step.status_label(index),
                        step.agent_type,
                        model,
                        gate
                    );
                }
            }
        }

        let problems = catalog.validate();
        if !problems.is_empty() {
            println!();
            println!("Problems:");
            for problem in problems {
                println!("  - {}", problem);
            }
        }
        Ok(())
    }
}
