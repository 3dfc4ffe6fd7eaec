//! CLI entry point for the MRO manual assistant.

mod shell;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use colored::Colorize;
use indicatif::ProgressBar;
use mro_core::config::{config_path, StoreProvider};
use mro_core::index::{setup_index, verify_index, watch_and_ingest};
use mro_core::voice::{capture, PcmSource};
use mro_core::{
    app_data_dir, chunk_documents, load_config, load_dotenv, scan_documents, services, set_documents_dir, status,
    Answer, Chatbot, Config, Error, Secret, Secrets,
};
use tokio::io::AsyncRead;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "mro")]
#[command(about = "MRO: question answering over aircraft maintenance manuals")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Show backend status.
    Status,
    /// Show where MRO stores its config (app data directory).
    DataDir,
    /// Show the config file location, or the effective config.
    Config {
        /// Print the effective config and which secrets are set.
        #[arg(long)]
        show: bool,
        #[command(subcommand)]
        action: Option<ConfigAction>,
    },
    /// Split, embed and upload the manuals to the vector index.
    Ingest {
        /// Manuals folder; defaults to the configured one.
        #[arg(value_name = "DIR")]
        dir: Option<PathBuf>,
        /// Keep running and re-ingest whenever a file changes.
        #[arg(long)]
        watch: bool,
    },
    /// Report how many vectors the index holds.
    Verify,
    /// Answer a single question and exit.
    Ask {
        #[arg(value_name = "QUESTION", required = true, num_args = 1..)]
        question: Vec<String>,
        /// Print the answer, sources and figure as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Interactive chat with conversation memory.
    Chat,
    /// Transcribe raw 16 kHz mono s16le audio from stdin (or a file).
    Listen {
        #[arg(long, value_name = "FILE")]
        input: Option<PathBuf>,
    },
    /// List the documents, pages and chunks under a directory, without calling any service.
    Scan {
        #[arg(value_name = "PATH")]
        path: PathBuf,
    },
}

#[derive(clap::Subcommand)]
enum ConfigAction {
    /// Persist the manuals folder.
    SetDocumentsDir {
        #[arg(value_name = "PATH")]
        path: PathBuf,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();
    load_dotenv();

    let cli = Cli::parse();
    let result = match cli.command.unwrap_or(Commands::Status) {
        Commands::Status => {
            println!("MRO backend");
            println!("  core: {}", status());
            Ok(())
        }
        Commands::DataDir => {
            match app_data_dir() {
                Some(p) => println!("{}", p.display()),
                None => eprintln!("Could not determine app data directory."),
            }
            Ok(())
        }
        Commands::Config { show, action } => run_config(show, action),
        Commands::Ingest { dir, watch } => run_ingest(dir, watch).await,
        Commands::Verify => run_verify().await,
        Commands::Ask { question, json } => run_ask(&question.join(" "), json).await,
        Commands::Chat => run_chat().await,
        Commands::Listen { input } => run_listen(input).await,
        Commands::Scan { path } => run_scan(&path),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}: {e}", "error".red());
            ExitCode::FAILURE
        }
    }
}

fn run_config(show: bool, action: Option<ConfigAction>) -> Result<(), Error> {
    if let Some(ConfigAction::SetDocumentsDir { path }) = action {
        set_documents_dir(&path)?;
        println!("Documents folder set to {}", load_config().documents_dir);
        return Ok(());
    }
    match config_path() {
        Some(p) => println!("Config file: {}", p.display()),
        None => eprintln!("Could not determine app data directory."),
    }
    if show {
        let config = load_config();
        println!();
        print!("{}", config.to_toml()?);
        println!();
        let secrets = Secrets::from_env();
        for s in Secret::ALL {
            let state = if secrets.get(s).is_some() { "set".green() } else { "missing".yellow() };
            println!("{} = {}", s.env_var(), state);
        }
    }
    Ok(())
}

async fn run_ingest(dir: Option<PathBuf>, watch: bool) -> Result<(), Error> {
    let config = load_config();
    config.validate()?;
    let secrets = Secrets::from_env();
    let dir = dir.unwrap_or_else(|| config.documents_dir());
    let embedder = services::embedder(&config, &secrets)?;
    let store = services::vector_store(&config, &secrets)?;
    let opts = services::ingest_options(&config)?;
    if config.vector_store == StoreProvider::Memory {
        tracing::warn!("memory vector store selected: ingested vectors are dropped on exit");
    }

    if watch {
        watch_and_ingest(&dir, embedder.as_ref(), store.as_ref(), &opts).await?;
    } else {
        let report = setup_index(&dir, embedder.as_ref(), store.as_ref(), &opts).await?;
        println!(
            "Ingested {} chunk(s) from {} document(s) into {}/{} ({} figure page(s), {} with images)",
            report.chunks,
            report.documents,
            config.index_name,
            opts.namespace,
            report.figure_pages,
            report.figures_resolved,
        );
    }
    Ok(())
}

async fn run_verify() -> Result<(), Error> {
    let config = load_config();
    let store = services::vector_store(&config, &Secrets::from_env())?;
    let stats = verify_index(store.as_ref(), &config.namespace).await?;
    println!("Index {}: {} vector(s)", config.index_name, stats.total_vector_count);
    if let Some(dim) = stats.dimension {
        println!("  dimension: {dim}");
    }
    for (ns, count) in &stats.namespaces {
        println!("  {ns}: {count}");
    }
    Ok(())
}

/// Builds the chatbot. With the in-process store the manuals are ingested first.
pub(crate) async fn prepare_chatbot(config: &Config) -> Result<Chatbot, Error> {
    let bot = services::chatbot(config, &Secrets::from_env())?;
    if config.vector_store == StoreProvider::Memory {
        let opts = services::ingest_options(config)?;
        setup_index(&config.documents_dir(), bot.embedder(), bot.store(), &opts).await?;
    }
    Ok(bot)
}

async fn run_ask(question: &str, json: bool) -> Result<(), Error> {
    let config = load_config();
    let bot = prepare_chatbot(&config).await?;
    let mut session = bot.new_session(config.memory_window);
    let answer = with_spinner(bot.ask(&mut session, question)).await?;
    if json {
        match serde_json::to_string_pretty(&answer) {
            Ok(s) => println!("{s}"),
            Err(e) => eprintln!("{}: {e}", "error".red()),
        }
    } else {
        print_answer(&answer);
    }
    Ok(())
}

async fn run_chat() -> Result<(), Error> {
    let config = load_config();
    let bot = prepare_chatbot(&config).await?;
    shell::run(&bot, &config).await
}

async fn run_listen(input: Option<PathBuf>) -> Result<(), Error> {
    let config = load_config();
    let transcriber = services::transcriber(&config, &Secrets::from_env())?;
    match input {
        Some(path) => {
            let file = tokio::fs::File::open(&path).await.map_err(mro_core::VoiceError::Io)?;
            listen(file, transcriber.as_ref()).await
        }
        None => {
            eprintln!("{}", "Listening on stdin; Ctrl+C to stop.".dimmed());
            listen(tokio::io::stdin(), transcriber.as_ref()).await
        }
    }
}

async fn listen<R: AsyncRead + Unpin>(reader: R, transcriber: &dyn mro_core::Transcriber) -> Result<(), Error> {
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    let printer = tokio::spawn(async move {
        while let Some(text) = rx.recv().await {
            println!("{text}");
        }
    });
    let mut source = PcmSource::new(reader);
    let sent = capture(&mut source, transcriber, &tx, stop_on(tokio::signal::ctrl_c())).await;
    drop(tx);
    let _ = printer.await;
    let sent = sent?;
    tracing::info!(transcripts = sent, "capture finished");
    Ok(())
}

/// Resolves when `signal` fires. A signal that cannot be installed never
/// resolves, so capture runs to the end of input.
async fn stop_on(signal: impl std::future::Future<Output = std::io::Result<()>>) {
    if let Err(e) = signal.await {
        tracing::warn!(error = %e, "cannot listen for Ctrl+C; stopping at end of input");
        std::future::pending::<()>().await;
    }
}

fn run_scan(path: &Path) -> Result<(), Error> {
    let config = load_config();
    let opts = config.chunk_options()?;
    let docs = scan_documents(path).map_err(mro_core::IndexError::from)?;
    let chunks = chunk_documents(&docs, &opts);
    println!(
        "Scanned {} document(s), {} chunk(s) under {}",
        docs.len(),
        chunks.len(),
        path.display()
    );
    for doc in &docs {
        let n = chunks.iter().filter(|c| c.source == doc.path).count();
        println!(
            "  {}  {} page(s), {} chars, {} chunk(s)",
            doc.path.display(),
            doc.pages.len(),
            doc.char_count(),
            n
        );
        for c in chunks.iter().filter(|c| c.source == doc.path) {
            if let Some(fig) = &c.figure_reference {
                println!("    page {}: {}", c.page.unwrap_or_default(), fig.cyan());
            }
        }
    }
    Ok(())
}

pub(crate) async fn with_spinner<T>(fut: impl std::future::Future<Output = T>) -> T {
    let pb = ProgressBar::new_spinner();
    pb.set_message("Thinking...");
    pb.enable_steady_tick(Duration::from_millis(100));
    let out = fut.await;
    pb.finish_and_clear();
    out
}

pub(crate) fn print_answer(answer: &Answer) {
    println!("{}", answer.text);
    if let Some(fig) = &answer.figure {
        match &fig.image {
            Some(image) => println!("{} {} ({})", "Figure:".bold(), fig.citation, image.display()),
            None => println!("{} {} {}", "Figure:".bold(), fig.citation, "(image not available)".dimmed()),
        }
    }
    if !answer.sources.is_empty() {
        let sources: Vec<String> = answer
            .sources
            .iter()
            .map(|s| match s.page {
                Some(p) => format!("{} p.{p} ({:.2})", s.source, s.score),
                None => format!("{} ({:.2})", s.source, s.score),
            })
            .collect();
        println!("{}", format!("Sources: {}", sources.join(", ")).dimmed());
    }
}

#[cfg(test)]
mod tests {
    use clap::error::ErrorKind;

    use super::*;

    #[tokio::test]
    async fn stop_waits_for_the_signal() {
        stop_on(std::future::ready(Ok(()))).await;

        let failed = stop_on(std::future::ready(Err(std::io::Error::other("no handler"))));
        tokio::select! {
            biased;
            _ = failed => panic!("a failed signal handler must not stop capture"),
            _ = tokio::task::yield_now() => {}
        }
    }

    #[test]
    fn no_subcommand_defaults_to_status() {
        let cli = Cli::try_parse_from(["mro"]).unwrap();
        assert!(cli.command.is_none());
    }

    #[test]
    fn ingest_takes_optional_dir_and_watch() {
        let cli = Cli::try_parse_from(["mro", "ingest"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Ingest { dir: None, watch: false })));

        let cli = Cli::try_parse_from(["mro", "ingest", "manuals", "--watch"]).unwrap();
        match cli.command {
            Some(Commands::Ingest { dir, watch }) => {
                assert_eq!(dir, Some(PathBuf::from("manuals")));
                assert!(watch);
            }
            _ => panic!("expected ingest"),
        }
    }

    #[test]
    fn ask_joins_words_and_takes_json() {
        let cli = Cli::try_parse_from(["mro", "ask", "brake", "wear", "pin", "--json"]).unwrap();
        match cli.command {
            Some(Commands::Ask { question, json }) => {
                assert_eq!(question.join(" "), "brake wear pin");
                assert!(json);
            }
            _ => panic!("expected ask"),
        }
    }

    #[test]
    fn ask_requires_a_question() {
        let err = Cli::try_parse_from(["mro", "ask"]).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn config_set_documents_dir() {
        let cli = Cli::try_parse_from(["mro", "config", "set-documents-dir", "/manuals"]).unwrap();
        match cli.command {
            Some(Commands::Config {
                show: false,
                action: Some(ConfigAction::SetDocumentsDir { path }),
            }) => assert_eq!(path, PathBuf::from("/manuals")),
            _ => panic!("expected config set-documents-dir"),
        }
        let cli = Cli::try_parse_from(["mro", "config", "--show"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Config { show: true, action: None })));
    }

    #[test]
    fn listen_input_file() {
        let cli = Cli::try_parse_from(["mro", "listen", "--input", "cockpit.raw"]).unwrap();
        match cli.command {
            Some(Commands::Listen { input }) => assert_eq!(input, Some(PathBuf::from("cockpit.raw"))),
            _ => panic!("expected listen"),
        }
    }

    #[test]
    fn unknown_subcommand_is_rejected() {
        assert!(Cli::try_parse_from(["mro", "serve"]).is_err());
    }
}
