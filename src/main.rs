use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::rc::Rc;
use std::sync::Arc;
use tracing::{error, info};

use envi_translate::catalog::LanguageCatalog;
use envi_translate::config::Config;
use envi_translate::controller::PageTranslationController;
use envi_translate::dom::Page;
use envi_translate::provider::{GoogleWebProvider, MockMode, MockProvider, TranslationProvider};
use envi_translate::server::{self, AppState};
use envi_translate::settings::{MemorySettings, KEY_DEFAULT_TARGET};
use envi_translate::{TranslationEngine, TranslationRequest};

/// Exit status when neither `--text` nor `--input` was given.
const EXIT_MISSING_INPUT: u8 = 2;

#[derive(Parser)]
#[command(name = "envi", version, about = "English ↔ Vietnamese translator")]
struct Cli {
    /// Translation backend
    #[arg(long, value_enum, default_value_t = ProviderKind::Google, global = true)]
    provider: ProviderKind,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, ValueEnum)]
enum ProviderKind {
    Google,
    /// Offline provider that tags text with the target language
    Mock,
}

#[derive(Subcommand)]
enum Command {
    /// English → Vietnamese
    En2vi(TranslateArgs),
    /// Vietnamese → English
    Vi2en(TranslateArgs),
    /// Any language pair
    Translate {
        #[command(flatten)]
        args: TranslateArgs,
        /// Source language name or code
        #[arg(long, default_value = "auto")]
        source: String,
        /// Target language name or code
        #[arg(long, default_value = "vi")]
        target: String,
    },
    /// List supported languages
    Languages {
        /// Print "code<TAB>name" instead of names only
        #[arg(long)]
        codes: bool,
        /// Only languages whose name or code contains this
        #[arg(long)]
        search: Option<String>,
    },
    /// Run the HTTP API
    Serve {
        #[arg(long)]
        host: Option<String>,
        #[arg(long)]
        port: Option<u16>,
    },
    /// Translate the text of an HTML document in place
    Page {
        #[arg(short, long)]
        input: PathBuf,
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Target language name or code
        #[arg(long)]
        target: Option<String>,
    },
}

#[derive(Args)]
struct TranslateArgs {
    /// Text to translate
    #[arg(short, long, conflicts_with = "input")]
    text: Option<String>,
    /// UTF-8 file to translate
    #[arg(short, long)]
    input: Option<PathBuf>,
    /// Write the translation here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,
    /// Join chunks with the configured policy instead of their original separators
    #[arg(long)]
    no_preserve_format: bool,
    #[arg(long)]
    max_chars: Option<usize>,
    #[arg(long)]
    retries: Option<u32>,
    /// Base backoff in seconds; doubles on every retry
    #[arg(long)]
    retry_backoff: Option<f64>,
}

impl TranslateArgs {
    fn request(&self, base: TranslationRequest) -> TranslationRequest {
        let mut request = base;
        if let Some(max_chars) = self.max_chars {
            request = request.with_max_chars(max_chars);
        }
        if let Some(retries) = self.retries {
            request = request.with_retries(retries);
        }
        if let Some(seconds) = self.retry_backoff {
            request = request.with_backoff_base_seconds(seconds);
        }
        if self.no_preserve_format {
            request = request.with_preserve_format(false);
        }
        request
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env file (ignored when absent)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    if let Err(e) = init_logging() {
        eprintln!("Failed to initialize logging: {}", e);
        return ExitCode::FAILURE;
    }

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_logging() -> Result<()> {
    // Logs go to stderr so translations can be piped from stdout
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("envi_translate=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let config = Config::from_env()?;
    let provider = build_provider(cli.provider, &config)?;
    let engine = TranslationEngine::new(provider.clone()).with_concurrency(config.concurrency);
    let catalog = LanguageCatalog::builtin();

    match cli.command {
        Command::En2vi(args) => {
            let request = args.request(config.translation_request().with_languages("en", "vi"));
            translate(&engine, &request, &args).await
        }
        Command::Vi2en(args) => {
            let request = args.request(config.translation_request().with_languages("vi", "en"));
            translate(&engine, &request, &args).await
        }
        Command::Translate {
            args,
            source,
            target,
        } => {
            let request = args.request(
                config
                    .translation_request()
                    .with_languages(catalog.resolve(&source), catalog.resolve(&target)),
            );
            translate(&engine, &request, &args).await
        }
        Command::Languages { codes, search } => {
            let catalog = LanguageCatalog::load(provider.supported_languages()).await;
            let entries = match &search {
                Some(query) => catalog.search(query),
                None => catalog.entries().iter().collect(),
            };
            for entry in entries {
                if codes {
                    println!("{}\t{}", entry.code, entry.name);
                } else {
                    println!("{}", entry.name);
                }
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Serve { host, port } => {
            let catalog = LanguageCatalog::load(provider.supported_languages()).await;
            let state = Arc::new(AppState {
                engine,
                catalog,
                defaults: config.translation_request(),
            });
            let host = host.unwrap_or_else(|| config.host.clone());
            server::serve(state, &host, port.unwrap_or(config.port)).await?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Page {
            input,
            output,
            target,
        } => {
            let target = catalog.resolve(target.as_deref().unwrap_or(&config.target_lang));
            translate_page(engine, &config, &input, output.as_deref(), target).await
        }
    }
}

fn build_provider(kind: ProviderKind, config: &Config) -> Result<Arc<dyn TranslationProvider>> {
    Ok(match kind {
        ProviderKind::Google => Arc::new(
            GoogleWebProvider::new(&config.provider_url, config.http_timeout)
                .context("Failed to create Google provider")?,
        ),
        ProviderKind::Mock => Arc::new(MockProvider::new(MockMode::Suffix)),
    })
}

async fn translate(
    engine: &TranslationEngine,
    request: &TranslationRequest,
    args: &TranslateArgs,
) -> Result<ExitCode> {
    info!(
        "Translating {} → {} with {}",
        request.source_lang,
        request.target_lang,
        engine.provider_name()
    );

    match (&args.text, &args.input, &args.output) {
        (None, Some(input), Some(output)) => {
            engine.translate_file(input, output, request).await?;
        }
        (text, input, output) => {
            let text = match (text, input) {
                (Some(text), _) => text.clone(),
                (None, Some(input)) => tokio::fs::read_to_string(input)
                    .await
                    .with_context(|| format!("Failed to read {}", input.display()))?,
                (None, None) => {
                    eprintln!("Nothing to translate: pass --text or --input");
                    return Ok(ExitCode::from(EXIT_MISSING_INPUT));
                }
            };

            let translated = engine.translate(&text, request).await?;
            write_output(output.as_deref(), &translated).await?;
        }
    }

    Ok(ExitCode::SUCCESS)
}

/// Run one controller pass over an HTML file.
async fn translate_page(
    engine: TranslationEngine,
    config: &Config,
    input: &Path,
    output: Option<&Path>,
    target: String,
) -> Result<ExitCode> {
    let html = tokio::fs::read_to_string(input)
        .await
        .with_context(|| format!("Failed to read {}", input.display()))?;

    let settings = Arc::new(MemorySettings::new().with(KEY_DEFAULT_TARGET, target));
    let controller = PageTranslationController::new(
        Rc::new(Page::parse(&html)),
        Arc::new(engine),
        settings,
        config.controller_config(),
    )
    .with_request(config.translation_request());

    let report = controller.translate_page().await;
    if report.failed > 0 {
        info!("{} text node(s) left untranslated", report.failed);
    }

    let html = controller
        .page()
        .to_html()
        .context("Failed to serialize page")?;
    write_output(output, &html).await?;

    Ok(ExitCode::SUCCESS)
}

async fn write_output(output: Option<&Path>, content: &str) -> Result<()> {
    match output {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                tokio::fs::create_dir_all(parent)
                    .await
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
            tokio::fs::write(path, content)
                .await
                .with_context(|| format!("Failed to write {}", path.display()))?;
            info!("Wrote {}", path.display());
        }
        None => println!("{}", content),
    }
    Ok(())
}
