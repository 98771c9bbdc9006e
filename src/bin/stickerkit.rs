use std::path::{Path, PathBuf};

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use tracing::warn;

use stickerkit::encode::ffmpeg::is_available;

#[derive(Parser, Debug)]
#[command(name = "stickerkit", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Download a sticker pack and convert it to WebP stickers.
    Fetch(FetchArgs),
    /// Print dimensions and embedded pack metadata of a WebP sticker.
    Inspect(InspectArgs),
}

#[derive(Parser, Debug)]
struct FetchArgs {
    /// Pack name or `https://t.me/addstickers/<name>` link.
    pack: String,

    /// Output directory.
    #[arg(long)]
    out: PathBuf,

    /// Pipeline configuration JSON.
    #[arg(long)]
    config: Option<PathBuf>,

    /// API token; repeat for fallbacks, tried in order.
    #[arg(
        long = "token",
        env = stickerkit::TOKENS_ENV,
        value_delimiter = ',',
        hide_env_values = true
    )]
    tokens: Vec<String>,
}

#[derive(Parser, Debug)]
struct InspectArgs {
    /// WebP file to inspect.
    file: PathBuf,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Command::Fetch(args) => cmd_fetch(args),
        Command::Inspect(args) => cmd_inspect(&args.file),
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<stickerkit::PipelineConfig> {
    match path {
        Some(p) => Ok(stickerkit::PipelineConfig::load(p)?),
        None => Ok(stickerkit::PipelineConfig::default()),
    }
}

fn cmd_fetch(args: FetchArgs) -> anyhow::Result<()> {
    let config = load_config(args.config.as_deref())?;
    let request = stickerkit::PackRequest::parse(&args.pack)?;
    let credentials = stickerkit::StaticCredentials::new(args.tokens);

    if !is_available(&config.ffmpeg_program) {
        warn!(
            program = %config.ffmpeg_program.display(),
            "ffmpeg not found; only stickers already in WebP can be delivered"
        );
    }

    let source = stickerkit::BotApiSource::new(config.api_base.clone(), config.http_timeout())?;
    let engine = stickerkit::ExternalEngine::from_config(&config);
    let mut orchestrator = stickerkit::Orchestrator::new(&source, &engine, config)?;
    let mut sink = stickerkit::DirectorySink::new(&args.out);

    let report = orchestrator
        .run(&request, &credentials, &mut sink)
        .with_context(|| format!("fetch pack '{}'", request.pack_id))?;

    for (index, outcome) in &report.outcomes {
        if let stickerkit::AssetOutcome::Skipped(reason) = outcome {
            eprintln!("  #{}: skipped: {reason}", index + 1);
        }
    }
    println!("{}", report.summary);
    eprintln!("wrote {}", sink.dir().display());
    Ok(())
}

fn cmd_inspect(path: &Path) -> anyhow::Result<()> {
    let bytes = std::fs::read(path).with_context(|| format!("read '{}'", path.display()))?;
    let webp = stickerkit::WebpContainer::parse(&bytes)
        .with_context(|| format!("parse '{}'", path.display()))?;

    println!("file:     {}", path.display());
    println!("bytes:    {}", bytes.len());
    println!("canvas:   {}", webp.canvas()?);
    println!("animated: {}", webp.is_animated());
    match stickerkit::read_metadata(&bytes)? {
        Some(meta) => {
            println!("pack:     {}", meta.pack_name);
            println!("pack id:  {}", meta.pack_id);
            if let Some(publisher) = &meta.publisher {
                println!("publisher: {publisher}");
            }
            println!("emojis:   {}", meta.emojis.join(" "));
        }
        None => println!("metadata: none"),
    }
    Ok(())
}
