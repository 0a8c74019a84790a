use anyhow::{bail, Context as _};
use clap::Subcommand;
use serde_json::json;
use std::path::{Path, PathBuf};

use crate::cli::utils::{output_empty_collection, output_success, print_json};
use crate::cli::{Context, OutputFormat};
use crate::services::{FormBuilder, FormCatalog};
use crate::survey::definition::FormDefinition;

#[derive(Subcommand)]
pub enum FormsCommands {
    #[command(about = "List all forms, hidden ones included")]
    List,

    #[command(about = "Create a form from a YAML or JSON definition file")]
    Import {
        #[arg(help = "Path to the definition (.yaml, .yml or .json)")]
        file: PathBuf,
    },
}

pub async fn handle(cmd: FormsCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        FormsCommands::List => list(output_format).await,
        FormsCommands::Import { file } => import(&file, output_format).await,
    }
}

async fn list(output_format: OutputFormat) -> anyhow::Result<()> {
    let ctx = Context::connect().await?;
    let forms = FormCatalog::new(ctx.db).list_forms(&ctx.identity).await?;

    if forms.is_empty() {
        return output_empty_collection(output_format, "No forms found");
    }
    match output_format {
        OutputFormat::Json => print_json(&forms),
        OutputFormat::Text => {
            for form in &forms {
                let flag = if form.hidden { " (hidden)" } else { "" };
                println!("{:>5}  {}{}", form.id, form.title, flag);
            }
            Ok(())
        }
    }
}

async fn import(file: &Path, output_format: OutputFormat) -> anyhow::Result<()> {
    let content = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read {}", file.display()))?;
    let definition = parse_definition(file, &content)?;

    let ctx = Context::connect().await?;
    let id = FormBuilder::new(ctx.db).create_form(&ctx.identity, &definition).await?;

    output_success(
        output_format,
        &format!("Imported form {} '{}' with {} questions", id, definition.title, definition.questions.len()),
        &json!({ "id": id }),
    )
}

/// YAML for .yaml/.yml files, JSON otherwise
pub fn parse_definition(file: &Path, content: &str) -> anyhow::Result<FormDefinition> {
    let ext = file.extension().and_then(|e| e.to_str()).unwrap_or_default();
    let definition = match ext.to_ascii_lowercase().as_str() {
        "yaml" | "yml" => serde_yaml::from_str(content)?,
        "json" => serde_json::from_str(content)?,
        other => bail!("unsupported definition format '{}', expected yaml or json", other),
    };
    Ok(definition)
}
