pub mod commands;
pub mod utils;

use clap::{Parser, Subcommand};
use std::sync::Arc;

use crate::config;
use crate::database::{DatabaseManager, PgSurveyStore};
use crate::services::Persistence;
use crate::types::{Identity, UserId};

/// Operator tasks run with admin rights under this user id
pub const OPERATOR_USER_ID: UserId = 0;

#[derive(Parser)]
#[command(name = "alumnihub")]
#[command(about = "AlumniHub CLI - survey administration and database migrations")]
#[command(version)]
pub struct Cli {
    #[arg(long, global = true, help = "Output in JSON format")]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Apply pending database migrations")]
    Migrate,

    #[command(about = "Survey form management")]
    Forms {
        #[command(subcommand)]
        cmd: commands::forms::FormsCommands,
    },

    #[command(about = "Print the answer breakdown of a form")]
    Answers {
        #[arg(help = "Form id")]
        form_id: i32,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn from_cli(cli: &Cli) -> Self {
        if cli.json {
            OutputFormat::Json
        } else {
            OutputFormat::Text
        }
    }
}

/// Services wired against DATABASE_URL, acting as the operator
pub struct Context {
    pub db: Persistence,
    pub identity: Identity,
}

impl Context {
    pub async fn connect() -> anyhow::Result<Self> {
        let pool = DatabaseManager::main_pool().await?;
        let store = Arc::new(PgSurveyStore::new(pool));
        Ok(Self {
            db: Persistence::from_config(store, &config::config().database),
            identity: Identity::admin(OPERATOR_USER_ID),
        })
    }
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let output_format = OutputFormat::from_cli(&cli);

    let result = match cli.command {
        Commands::Migrate => commands::migrate::handle(output_format).await,
        Commands::Forms { cmd } => commands::forms::handle(cmd, output_format).await,
        Commands::Answers { form_id } => commands::answers::handle(form_id, output_format).await,
    };

    DatabaseManager::close_all().await;
    result
}
