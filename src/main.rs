use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use slide_gallery::config::Configuration;
use slide_gallery::events::{FetchImage, GalleryCommand, GalleryEvent, ImageFetched, PictureSet};
use slide_gallery::tasks;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::Level;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(
    name = "slide-gallery",
    version,
    about = "Sliding picture gallery driven from a directory"
)]
struct Args {
    /// Path to YAML config
    #[arg(value_name = "CONFIG")]
    config: PathBuf,
    /// Print the discovered picture order and exit
    #[arg(long)]
    list: bool,
    /// Increase log verbosity (repeatable)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    verbose: u8,
}

fn init_tracing(verbosity: u8) -> Result<()> {
    let level = match verbosity {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"))
        .add_directive(format!("slide_gallery={level}").parse()?);
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let Args {
        config,
        list,
        verbose,
    } = Args::parse();
    init_tracing(verbose)?;

    let cfg = Configuration::from_yaml_file(&config)
        .with_context(|| format!("failed to load configuration from {}", config.display()))?
        .validated()
        .context("invalid configuration values")?;
    tracing::debug!("Loaded configuration from {}:\n{:#?}", config.display(), cfg);

    if list {
        let pictures = tasks::files::discover_pictures(&cfg)?;
        println!("# pictures: {}", pictures.len());
        for (idx, url) in pictures.iter().enumerate() {
            println!("  {:>4}: {url}", idx + 1);
        }
        return Ok(());
    }

    // Channels (small/bounded)
    let (pictures_tx, pictures_rx) = mpsc::channel::<PictureSet>(4); // Files -> Viewer
    let (command_tx, command_rx) = mpsc::channel::<GalleryCommand>(16); // Control -> Viewer
    let (fetch_tx, fetch_rx) = mpsc::channel::<FetchImage>(16); // Viewer -> Loader
    let (fetched_tx, fetched_rx) = mpsc::channel::<ImageFetched>(16); // Loader -> Viewer
    let (events_tx, mut events_rx) = mpsc::channel::<GalleryEvent>(64); // Viewer -> log

    let cancel = CancellationToken::new();

    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if let Err(err) = tokio::signal::ctrl_c().await {
                tracing::warn!("ctrl-c handler failed: {err}");
                return;
            }
            tracing::info!("ctrl-c received; initiating shutdown");
            cancel.cancel();
        });
    }

    let mut tasks = JoinSet::new();

    tasks.spawn({
        let cfg = cfg.clone();
        let cancel = cancel.clone();
        async move {
            tasks::files::run(cfg, pictures_tx, cancel)
                .await
                .context("files task failed")
        }
    });

    tasks.spawn({
        let root = cfg.picture_library_path.clone();
        let cancel = cancel.clone();
        async move {
            tasks::loader::run(root, fetch_rx, fetched_tx, cancel)
                .await
                .context("loader task failed")
        }
    });

    tasks.spawn({
        let cfg = cfg.clone();
        let cancel = cancel.clone();
        async move {
            tasks::viewer::run(
                cfg,
                pictures_rx,
                command_rx,
                fetched_rx,
                fetch_tx,
                events_tx,
                cancel,
            )
            .await
            .context("viewer task failed")
        }
    });

    #[cfg(unix)]
    tasks.spawn({
        let socket = cfg.control_socket_path.clone();
        let cancel = cancel.clone();
        async move {
            tasks::control::run(socket, command_tx, cancel)
                .await
                .context("control task failed")
        }
    });
    #[cfg(not(unix))]
    drop(command_tx);

    tasks.spawn(async move {
        while let Some(event) = events_rx.recv().await {
            tracing::info!(event = event.name(), "{event:?}");
        }
        Ok(())
    });

    // Any task ending stops the rest.
    while let Some(res) = tasks.join_next().await {
        match res {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::error!("task error: {e:?}"),
            Err(e) => tracing::error!("join error: {e}"),
        }
        cancel.cancel();
    }

    Ok(())
}
