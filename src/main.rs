use aihelper_rs::clipboard::{ClipboardAccess, MemoryClipboard, SystemClipboard};
use aihelper_rs::completion::OpenAiClient;
use aihelper_rs::dispatch::clip_text;
use aihelper_rs::journal::ActionJournal;
use aihelper_rs::logging::AppFormatter;
use aihelper_rs::prompt::PromptStore;
use aihelper_rs::shell::render_prompt_table;
use aihelper_rs::{Action, AppContext, ConfigManager, Invocation, TerminalShell};
use anyhow::{Context, Result};
use std::env;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr; stdout belongs to the panes.
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "aihelper_rs=info,aihelper=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .event_format(AppFormatter::new()),
        )
        .init();

    let args: Vec<String> = env::args().collect();
    let program = args
        .first()
        .map(String::as_str)
        .unwrap_or("aihelper-rs")
        .to_string();

    let invocation = match Invocation::from_args(args.iter().skip(1)) {
        Ok(invocation) => invocation,
        Err(err) => {
            eprintln!("{}", err);
            eprintln!("{}", Invocation::usage(&program));
            std::process::exit(libc::EPERM);
        }
    };

    let config_manager = ConfigManager::load()?;
    let prompts = PromptStore::new(config_manager.get_prompts_dir());

    match invocation {
        Invocation::ListPrompts => {
            println!("{}", render_prompt_table(&prompts)?);
            Ok(())
        }
        Invocation::Run(action) => run(action, config_manager, prompts).await,
    }
}

async fn run(action: Action, config_manager: ConfigManager, prompts: PromptStore) -> Result<()> {
    let config = config_manager.get();
    info!("Action: {}", action);
    info!("   Model: {}", action.model_settings(&config).model);
    info!("   Max input chars: {}", config.max_input_chars);

    let backend = OpenAiClient::from_config(&config)
        .context("Failed to configure completion client")?;

    let clipboard: Arc<dyn ClipboardAccess> = match SystemClipboard::new() {
        Ok(clipboard) => Arc::new(clipboard),
        Err(err) => {
            warn!("System clipboard unavailable, using an in-memory one: {:#}", err);
            Arc::new(MemoryClipboard::default())
        }
    };

    let journal = if config.journal.enabled {
        let path = config_manager.get_journal_path();
        info!("   Journal: {:?}", path);
        ActionJournal::new(path, config.journal.max_bytes)
    } else {
        ActionJournal::disabled()
    };

    let initial_input = match action {
        Action::CustomPrompt(slot) => prompts
            .load(slot)
            .context("Failed to load custom prompt")?
            .into_inner(),
        Action::Rewrite | Action::Ask => {
            clip_text(&action.seed_input(&clipboard.read_text()), config.max_input_chars)
        }
    };

    let context = Arc::new(AppContext {
        config,
        backend: Arc::new(backend),
        clipboard,
        prompts,
        journal,
    });

    TerminalShell::new(action, context, initial_input).run().await?;

    info!("👋 Bye");
    Ok(())
}
