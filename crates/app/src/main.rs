mod render;

use biochat_core::chunking::{DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE};
use biochat_core::config::{DEFAULT_DOCS_DIR, DEFAULT_INDEX_DIR, DEFAULT_KEY_FILE};
use biochat_core::gemini::{
    DEFAULT_BASE_URL, DEFAULT_EMBEDDING_MODEL, DEFAULT_GENERATIVE_MODEL,
};
use biochat_core::retriever::DEFAULT_TOP_K;
use biochat_core::{
    read_manifest, ui_text, Assistant, BatchOptions, ChunkingConfig, ConversationSession,
    CredentialCheck, CredentialStore, GeminiClient, GeminiConfig, Language, PipelineConfig,
    UiText,
};
use chrono::Utc;
use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

type GeminiAssistant = Assistant<GeminiClient, GeminiClient>;

#[derive(Parser)]
#[command(name = "biochat", version, about = "Ask questions answered from a folder of PDFs")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Folder holding the PDF corpus
    #[arg(long, env = "BIOCHAT_DOCS_DIR", default_value = DEFAULT_DOCS_DIR, global = true)]
    docs_dir: PathBuf,

    /// Folder where the vector index is persisted
    #[arg(long, env = "BIOCHAT_INDEX_DIR", default_value = DEFAULT_INDEX_DIR, global = true)]
    index_dir: PathBuf,

    /// Google AI API key; falls back to the stored key
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true, global = true)]
    api_key: Option<String>,

    /// File used by set-key / clear-key
    #[arg(long, env = "BIOCHAT_KEY_FILE", default_value = DEFAULT_KEY_FILE, global = true)]
    key_file: PathBuf,

    /// Maximum chunk length in characters
    #[arg(long, env = "BIOCHAT_CHUNK_SIZE", default_value_t = DEFAULT_CHUNK_SIZE, global = true)]
    chunk_size: usize,

    /// Characters shared by consecutive chunks
    #[arg(long, env = "BIOCHAT_CHUNK_OVERLAP", default_value_t = DEFAULT_CHUNK_OVERLAP, global = true)]
    chunk_overlap: usize,

    /// Chunks retrieved per question
    #[arg(long, env = "BIOCHAT_TOP_K", default_value_t = DEFAULT_TOP_K, global = true)]
    top_k: usize,

    /// Texts per embedding request
    #[arg(long, env = "BIOCHAT_BATCH_SIZE", default_value = "100", global = true)]
    batch_size: usize,

    /// Pause between embedding requests
    #[arg(long, env = "BIOCHAT_BATCH_DELAY_MS", default_value = "1000", global = true)]
    batch_delay_ms: u64,

    #[arg(long, env = "BIOCHAT_EMBEDDING_MODEL", default_value = DEFAULT_EMBEDDING_MODEL, global = true)]
    embedding_model: String,

    #[arg(long, env = "BIOCHAT_GENERATIVE_MODEL", default_value = DEFAULT_GENERATIVE_MODEL, global = true)]
    generative_model: String,

    #[arg(long, env = "BIOCHAT_API_BASE_URL", default_value = DEFAULT_BASE_URL, global = true, hide = true)]
    api_base_url: String,

    /// Per-request timeout for the AI service
    #[arg(long, env = "BIOCHAT_TIMEOUT_SECS", default_value = "60", global = true)]
    timeout_secs: u64,

    /// Answer language (ISO code or English name, e.g. `es` or `German`)
    #[arg(long, env = "BIOCHAT_LANGUAGE", global = true)]
    language: Option<Language>,
}

#[derive(Subcommand)]
enum Command {
    /// Validate the key, then load the persisted index or build it from the PDFs.
    Build,
    /// Delete the persisted index and build it again.
    Rebuild,
    /// Answer one question and exit.
    Ask {
        #[arg(long)]
        question: String,
    },
    /// Interactive question loop on stdin.
    Chat,
    /// Print metadata of the persisted index.
    Status,
    /// Store an API key for later runs.
    SetKey { key: String },
    /// Remove the stored API key.
    ClearKey,
}

impl Cli {
    fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            docs_dir: self.docs_dir.clone(),
            index_dir: self.index_dir.clone(),
            chunking: ChunkingConfig {
                chunk_size: self.chunk_size,
                chunk_overlap: self.chunk_overlap,
            },
            batch: BatchOptions {
                batch_size: self.batch_size,
                delay: Duration::from_millis(self.batch_delay_ms),
            },
            top_k: self.top_k,
        }
    }

    fn connect(&self, ui: &UiText) -> anyhow::Result<(GeminiAssistant, GeminiClient)> {
        let store = CredentialStore::new(&self.key_file);
        let Some(api_key) = store.resolve(self.api_key.as_deref())? else {
            anyhow::bail!("{}", ui.key_missing);
        };

        let client = GeminiClient::new(GeminiConfig {
            api_key,
            base_url: self.api_base_url.clone(),
            embedding_model: self.embedding_model.clone(),
            generative_model: self.generative_model.clone(),
            timeout: Duration::from_secs(self.timeout_secs),
        })?;
        let assistant = Assistant::new(self.pipeline_config(), client.clone(), client.clone());
        Ok((assistant, client))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer())
        .init();

    let cli = Cli::parse();
    info!(
        version = env!("CARGO_PKG_VERSION"),
        started_at = %Utc::now().to_rfc3339(),
        "biochat boot"
    );

    let ui = ui_text(cli.language.unwrap_or(Language::English));

    match &cli.command {
        Command::SetKey { key } => {
            let store = CredentialStore::new(&cli.key_file);
            store.save(key)?;
            println!("API key stored in {}", store.path().display());
        }
        Command::ClearKey => {
            let store = CredentialStore::new(&cli.key_file);
            if store.clear()? {
                println!("removed {}", store.path().display());
            } else {
                println!("no stored API key");
            }
        }
        Command::Status => {
            let manifest = read_manifest(&cli.index_dir)?;
            render::manifest(manifest.as_ref());
        }
        Command::Build => {
            let (mut assistant, client) = cli.connect(ui)?;
            let report = assistant.start(&client).await?;
            render::report(&report);
        }
        Command::Rebuild => {
            let (mut assistant, client) = cli.connect(ui)?;
            client.validate_credential().await?;
            assistant.rebuild()?;
            println!("{}", ui.rebuild_done);
            let report = assistant.initialize().await?;
            render::report(&report);
        }
        Command::Ask { question } => {
            let (mut assistant, client) = cli.connect(ui)?;
            assistant.start(&client).await?;
            let answer = assistant.answer(question, cli.language).await?;
            render::answer(&answer);
        }
        Command::Chat => {
            let (mut assistant, client) = cli.connect(ui)?;
            let report = assistant.start(&client).await?;
            render::report(&report);
            chat(&mut assistant, ConversationSession::new(cli.language), ui).await?;
        }
    }

    Ok(())
}

#[derive(Debug, PartialEq, Eq)]
enum ChatCommand<'a> {
    Ask(&'a str),
    Clear,
    Rebuild,
    Language(&'a str),
    History,
    Help,
    Quit,
}

fn parse_chat_command(line: &str) -> ChatCommand<'_> {
    let line = line.trim();
    let Some(command) = line.strip_prefix('/') else {
        return ChatCommand::Ask(line);
    };

    let (name, argument) = command
        .split_once(char::is_whitespace)
        .map(|(name, rest)| (name, rest.trim()))
        .unwrap_or((command, ""));

    match name {
        "clear" => ChatCommand::Clear,
        "rebuild" => ChatCommand::Rebuild,
        "lang" => ChatCommand::Language(argument),
        "history" => ChatCommand::History,
        "quit" | "exit" => ChatCommand::Quit,
        "help" => ChatCommand::Help,
        _ => ChatCommand::Ask(line),
    }
}

const CHAT_HELP: &str = "/clear    forget the conversation\n\
                         /rebuild  delete the index and build it again\n\
                         /lang XX  answer in another language (e.g. /lang es)\n\
                         /history  show the conversation\n\
                         /quit     leave";

async fn chat(
    assistant: &mut GeminiAssistant,
    mut session: ConversationSession,
    mut ui: &'static UiText,
) -> anyhow::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    println!("{}", ui.title);
    info!(session = %session.id(), "chat session started");

    loop {
        print!("{}> ", ui.input_hint);
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        if line.trim().is_empty() {
            continue;
        }

        match parse_chat_command(&line) {
            ChatCommand::Quit => break,
            ChatCommand::Help => println!("{CHAT_HELP}"),
            ChatCommand::History => render::history(&session),
            ChatCommand::Clear => {
                session.reset();
                println!("{}", ui.history_cleared);
            }
            ChatCommand::Language(code) => match code.parse::<Language>() {
                Ok(language) => {
                    session.set_language(Some(language));
                    ui = ui_text(language);
                    println!("answer language: {language}");
                }
                Err(error) => eprintln!("{error}"),
            },
            ChatCommand::Rebuild => match assistant.rebuild() {
                Ok(_) => {
                    println!("{}", ui.rebuild_done);
                    match assistant.initialize().await {
                        Ok(report) => render::report(&report),
                        Err(error) => render::error(&error),
                    }
                }
                Err(error) => render::error(&error),
            },
            ChatCommand::Ask(question) => {
                println!("{}", ui.thinking);
                match assistant.handle_turn(&mut session, question).await {
                    Ok(answer) => render::answer(&answer),
                    Err(error) => render::error(&error),
                }
            }
        }
    }

    println!("{}", ui.goodbye);
    Ok(())
}
