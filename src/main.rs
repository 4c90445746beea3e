//! Command-line front end: generate, copy and download QR codes.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use qrbatch::batch::{BatchCoordinator, Viewport};
use qrbatch::config::{config_path, load_config, save_config, Config};
use qrbatch::host::{CommandClipboard, DirectoryDownloads, HostServices};
use qrbatch::item::{ItemRenderer, RenderContext};
use qrbatch::render::{preview_string, QrSvgRenderer};
use qrbatch::sanitize::download_filename;
use tracing_subscriber::EnvFilter;

/// A terminal has no viewport; enlarged sizes are computed against this one.
const TERMINAL_VIEWPORT: Viewport = Viewport {
    width: 1280.0,
    height: 800.0,
};

#[derive(Parser)]
#[command(name = "qrbatch")]
#[command(about = "Batch QR code generator: one code per input line")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Generate one code per non-blank input line and download each as PNG.
    Generate {
        /// Read lines from this file instead of stdin.
        #[arg(short, long, value_name = "FILE")]
        input: Option<PathBuf>,
        /// Directory to download into.
        #[arg(short, long, value_name = "DIR")]
        out: Option<PathBuf>,
        /// Code size in pixels.
        #[arg(long)]
        size: Option<f64>,
    },
    /// Copy a text to the clipboard.
    CopyText { text: String },
    /// Copy the code for a text to the clipboard as PNG.
    CopyImage {
        text: String,
        /// Code size in pixels.
        #[arg(long)]
        size: Option<f64>,
    },
    /// Print the code for a text to the terminal.
    Show { text: String },
    /// Show where the config file is read from.
    ConfigPath,
    /// Write the effective config to the config file.
    ConfigInit {
        /// Replace an existing config file.
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = load_config();

    match cli.command {
        Commands::Generate { input, out, size } => {
            if let Some(size) = size {
                config.list_size = size;
            }
            if let Some(out) = out {
                config.download_dir = Some(out);
            }
            let text = match input {
                Some(path) => std::fs::read_to_string(&path).with_context(|| format!("reading {}", path.display()))?,
                None => std::io::read_to_string(std::io::stdin()).context("reading stdin")?,
            };
            generate(&config, text).await
        }
        Commands::CopyText { text } => {
            let item = mount_single(&config, &text, config.list_size)?;
            item.actions().copy_text().await?;
            println!("copied text");
            Ok(())
        }
        Commands::CopyImage { text, size } => {
            let item = mount_single(&config, &text, size.unwrap_or(config.list_size))?;
            item.actions().copy_image().await?;
            println!("copied {}px image", item.size());
            Ok(())
        }
        Commands::Show { text } => {
            print!("{}", preview_string(&text)?);
            Ok(())
        }
        Commands::ConfigPath => {
            match config_path() {
                Some(p) => println!("{}", p.display()),
                None => eprintln!("Could not determine config directory."),
            }
            Ok(())
        }
        Commands::ConfigInit { force } => {
            if let Some(path) = config_path().filter(|p| p.exists() && !force) {
                bail!("{} already exists (use --force to replace it)", path.display());
            }
            let path = save_config(&config)?;
            println!("wrote {}", path.display());
            Ok(())
        }
    }
}

fn render_context(config: &Config) -> RenderContext {
    let clipboard = CommandClipboard::new(
        config.clipboard.text_command.clone(),
        config.clipboard.image_command.clone(),
    );
    let dir = config.download_dir.clone().unwrap_or_else(|| PathBuf::from("."));
    let host = HostServices::new(Arc::new(clipboard), Arc::new(DirectoryDownloads::new(dir)));
    let mut ctx = RenderContext::new(Arc::new(QrSvgRenderer::default()), host);
    ctx.feedback_duration = config.feedback_duration();
    ctx
}

fn mount_single(config: &Config, text: &str, size: f64) -> Result<ItemRenderer> {
    match ItemRenderer::mount(text.trim(), size, &render_context(config)) {
        Some(item) => Ok(item),
        None => bail!("nothing to encode: text is empty"),
    }
}

async fn generate(config: &Config, text: String) -> Result<()> {
    let mut batch = BatchCoordinator::with_policy(render_context(config), config.size_policy(), TERMINAL_VIEWPORT);
    batch.set_input_text(text);

    let mut failed = 0usize;
    let items = batch.generate();
    for item in items {
        match item.actions().download_image().await {
            Ok(()) => println!("ok    {}  ->  {}", item.text(), download_filename(item.text())),
            Err(_) => {
                failed += 1;
                let message = item.actions().message().unwrap_or_default();
                println!("error {}  ({message})", item.text());
            }
        }
    }
    println!("{} code(s), {failed} failed", items.len());
    if failed > 0 {
        bail!("{failed} of {} downloads failed", items.len());
    }
    Ok(())
}
