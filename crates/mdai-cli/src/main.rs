//! mdai CLI: Ask chat models questions from inside markdown files

use clap::{Parser, Subcommand};
use mdai_engine::{
    append_answer, init_config, run_append, run_ask, run_transform, watch_file, AppendOutcome,
    ChatClient, Config, InitOutcome, WatchExit, WatchOptions, ANSWER_OPERATION, MODELS,
};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Answer the quoted question at the end of a markdown file
#[derive(Parser)]
#[command(name = "mdai")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Config file (default: ~/.mdai/config.yml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ask the last quoted question of a file (or stdin) and print or append the answer
    Ask {
        /// Markdown file; reads stdin when omitted
        path: Option<PathBuf>,
    },

    /// Append the answer to the live question at the end of a markdown file
    Answer {
        /// Markdown file
        path: PathBuf,

        /// Keep watching the file and answer on every save
        #[arg(long)]
        watch: bool,

        /// Write the answer only once it is complete
        #[arg(long)]
        no_stream: bool,

        /// Delay after a change before answering (watch mode)
        #[arg(long)]
        debounce_ms: Option<u64>,

        /// Stop watching after this many answers
        #[arg(long)]
        max_cycles: Option<u32>,
    },

    /// Summarize a markdown file into <name>_sum.md
    Summarize {
        /// Markdown file
        path: PathBuf,
    },

    /// Translate a markdown file into <name>_<lang>.md
    Translate {
        /// Markdown file
        path: PathBuf,

        /// Target language code (e.g. en, ja, zh)
        lang: String,
    },

    /// Write the default config file
    Init,

    /// List known models and their prices
    Models,
}

fn main() {
    let cli = Cli::parse();

    let config_path = match cli.config {
        Some(path) => path,
        None => Config::default_path().unwrap_or_else(|e| fail(&e)),
    };

    match cli.command {
        Commands::Init => cmd_init(&config_path),
        Commands::Models => cmd_models(),
        command => {
            let config = Config::load_or_default(&config_path).unwrap_or_else(|e| fail(&e));
            init_logging(&config);

            let rt = tokio::runtime::Runtime::new().expect("Failed to create tokio runtime");
            if let Err(e) = rt.block_on(run_command(command, &config)) {
                fail(&e);
            }
        }
    }
}

fn init_logging(config: &Config) {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(config.default.level())
        .with_target(false)
        .init();
}

fn fail(err: &dyn std::fmt::Display) -> ! {
    eprintln!("Error: {err}");
    std::process::exit(1);
}

async fn run_command(
    command: Commands,
    config: &Config,
) -> Result<(), Box<dyn std::error::Error>> {
    let client = ChatClient::from_config(&config.default)?;

    match command {
        Commands::Ask { path } => cmd_ask(config, &client, path.as_deref()).await,
        Commands::Answer {
            path,
            watch,
            no_stream,
            debounce_ms,
            max_cycles,
        } => {
            let stream = !(config.default.disable_stream || no_stream);
            if watch {
                let mut options = WatchOptions::from(&config.watch);
                if let Some(ms) = debounce_ms {
                    options.debounce = Duration::from_millis(ms);
                }
                if let Some(n) = max_cycles {
                    options.max_cycles = n;
                }
                cmd_watch(config, &client, &path, options, stream).await
            } else {
                cmd_answer(config, &client, &path, stream).await
            }
        }
        Commands::Summarize { path } => {
            let outcome = run_transform(config, &client, &path, "summarize", &[]).await?;
            println!("Wrote {}", outcome.output.display());
            Ok(())
        }
        Commands::Translate { path, lang } => {
            let outcome = run_transform(config, &client, &path, "translate", &[lang]).await?;
            println!("Wrote {}", outcome.output.display());
            Ok(())
        }
        Commands::Init | Commands::Models => Ok(()),
    }
}

async fn cmd_ask(
    config: &Config,
    client: &ChatClient,
    path: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let content = match path {
        Some(path) => std::fs::read_to_string(path)?,
        None => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            buf
        }
    };

    let result = run_ask(config, client, &content).await?;
    match path {
        Some(path) => {
            append_answer(path, &result.content)?;
            println!("Answer appended to {}", path.display());
        }
        None => println!("{}", result.content),
    }
    Ok(())
}

async fn cmd_answer(
    config: &Config,
    client: &ChatClient,
    path: &Path,
    stream: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    match run_append(config, client, path, ANSWER_OPERATION, &[], stream).await? {
        AppendOutcome::Appended(_) => println!("Answer appended to {}", path.display()),
        AppendOutcome::Skipped => println!("No question found in {}", path.display()),
    }
    Ok(())
}

async fn cmd_watch(
    config: &Config,
    client: &ChatClient,
    path: &Path,
    options: WatchOptions,
    stream: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let exit = watch_file(path, options, move || async move {
        run_append(config, client, path, ANSWER_OPERATION, &[], stream)
            .await
            .map(|_| ())
    })
    .await?;

    match exit {
        WatchExit::MaxCycles(n) => println!("Stopped after {n} answers"),
        WatchExit::Interrupted => println!("Stopped watching {}", path.display()),
        WatchExit::WatcherClosed => println!("File watcher closed"),
    }
    Ok(())
}

fn cmd_init(config_path: &Path) {
    match init_config(config_path) {
        Ok(InitOutcome::Created) => println!("Created {}", config_path.display()),
        Ok(InitOutcome::AlreadyExists) => {
            println!("Config already exists at {}", config_path.display());
        }
        Err(e) => {
            eprintln!("Failed to write config: {e}");
            std::process::exit(1);
        }
    }
}

fn cmd_models() {
    println!(
        "{:<30} {:<10} {:>10} {:>12} {:>12}",
        "MODEL", "PROVIDER", "CONTEXT", "INPUT/1M", "OUTPUT/1M"
    );
    for model in MODELS {
        println!(
            "{:<30} {:<10} {:>10} {:>12} {:>12}",
            model.id,
            model.provider,
            model.context_size,
            format!("${:.2}", model.prompt_per_million),
            format!("${:.2}", model.completion_per_million),
        );
    }
}
