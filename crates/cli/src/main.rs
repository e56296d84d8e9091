use std::io::{self, Read};
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use helpdesk_api::{build_dispatcher, serve, ServiceConfig};
use helpdesk_core::{DispatcherConfig, IntentRequest, LexEvent, LexResponse};
use helpdesk_observability::{init_cli_tracing, AppMetrics};
use helpdesk_storage::{
    import_articles, load_seed_file, Article, KnowledgeAdmin, KnowledgeBase, KnowledgeStore,
    LookupOutcome,
};

#[derive(Debug, Parser)]
#[command(name = "helpdesk")]
#[command(about = "IT helpdesk fulfillment hook")]
struct Cli {
    #[arg(long, env = "HELPDESK_DATABASE_URL")]
    database_url: Option<String>,

    #[arg(long, env = "FAQ_TABLE_NAME")]
    table: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    Serve {
        #[arg(long)]
        bind: Option<String>,
    },
    /// Runs one fulfillment event (JSON file, or `-` for stdin).
    Invoke {
        #[arg(long, default_value = "-")]
        event: String,
    },
    Ask {
        intent: String,
        #[arg(long = "slot", value_parser = parse_slot)]
        slots: Vec<(String, String)>,
    },
    Kb {
        #[command(subcommand)]
        command: KbCommand,
    },
}

#[derive(Debug, Subcommand)]
enum KbCommand {
    Init,
    Put {
        question: String,
        #[arg(long)]
        answer: Option<String>,
    },
    Get {
        question: String,
    },
    List,
    Import {
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    init_cli_tracing("helpdesk_cli");
    let cli = Cli::parse();

    let mut config = ServiceConfig::from_env()?;
    config.database_url = cli.database_url.clone();
    config.dispatcher = DispatcherConfig::new(
        cli.table.clone(),
        config.dispatcher.support_address.clone(),
    )
    .context("invalid --table value")?;

    match cli.command {
        Command::Serve { bind } => {
            if let Some(bind) = bind {
                config = config.with_bind(bind);
            }
            serve(config).await?;
        }
        Command::Invoke { event } => {
            let raw = read_event(&event)?;
            let event: LexEvent =
                serde_json::from_str(&raw).context("event is not a fulfillment event")?;

            let dispatcher = build_dispatcher(&config, AppMetrics::shared()).await?;
            let reply = dispatcher.dispatch(&event.to_intent_request()).await;
            let response = LexResponse::close(&reply, event.session_state.session_attributes);
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        Command::Ask { intent, slots } => {
            let request = slots
                .into_iter()
                .fold(IntentRequest::new(intent), |request, (name, value)| {
                    request.with_slot(name, value)
                });

            let dispatcher = build_dispatcher(&config, AppMetrics::shared()).await?;
            let reply = dispatcher.dispatch(&request).await;
            println!("{}", reply.text);
        }
        Command::Kb { command } => run_kb(&config, command).await?,
    }

    Ok(())
}

async fn run_kb(config: &ServiceConfig, command: KbCommand) -> Result<()> {
    let Some(database_url) = config.database_url.as_deref() else {
        bail!("kb commands need --database-url or HELPDESK_DATABASE_URL");
    };
    let Some(table) = config.dispatcher.store_table_name.as_deref() else {
        bail!("kb commands need --table or FAQ_TABLE_NAME");
    };
    let store = KnowledgeBase::sqlite(database_url).await?;

    match command {
        KbCommand::Init => {
            store.ensure_table(table).await?;
            println!("table {table} ready");
        }
        KbCommand::Put { question, answer } => {
            store.ensure_table(table).await?;
            store.put_article(table, Article { question, answer }).await?;
        }
        KbCommand::Get { question } => match store.lookup(table, &question).await {
            LookupOutcome::Answer(answer) => println!("{answer}"),
            LookupOutcome::EmptyArticle => println!("(article has no answer)"),
            LookupOutcome::NotFound => bail!("no article for {question}"),
            LookupOutcome::Failed(error) => return Err(error.into()),
        },
        KbCommand::List => {
            let articles = store.list_articles(table).await?;
            println!("{}", serde_json::to_string_pretty(&articles)?);
        }
        KbCommand::Import { file } => {
            let articles = load_seed_file(&file)?;
            let imported = import_articles(&store, table, articles).await?;
            println!("imported {imported} articles into {table}");
        }
    }

    Ok(())
}

fn read_event(source: &str) -> Result<String> {
    if source == "-" {
        let mut raw = String::new();
        io::stdin().read_to_string(&mut raw)?;
        return Ok(raw);
    }
    std::fs::read_to_string(source).with_context(|| format!("failed reading event {source}"))
}

fn parse_slot(value: &str) -> Result<(String, String), String> {
    let (name, slot_value) = value
        .split_once('=')
        .ok_or_else(|| format!("expected name=value, got {value:?}"))?;
    if name.trim().is_empty() {
        return Err("slot name is empty".to_string());
    }
    Ok((name.trim().to_string(), slot_value.to_string()))
}
