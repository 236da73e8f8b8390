use crate::config::Configuration;
use crate::events::PictureSet;
use anyhow::{Context, Result};
use notify::event::{CreateKind, ModifyKind, RemoveKind};
use notify::{recommended_watcher, Event, EventKind, RecursiveMode, Watcher};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::ffi::OsStr;
use std::path::Path;
use tokio::sync::mpsc::{self, Sender};
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};
use walkdir::WalkDir;

const PICTURE_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "webp", "gif"];

/// Scans the library, publishes the picture set and republishes it whenever
/// the library changes.
#[instrument(
    skip(cfg, to_viewer, cancel),
    fields(root = %cfg.picture_library_path.display())
)]
pub async fn run(
    cfg: Configuration,
    to_viewer: Sender<PictureSet>,
    cancel: CancellationToken,
) -> Result<()> {
    // 1) Startup scan
    let mut current = discover_pictures(&cfg)?;
    info!(discovered = current.len(), "startup scan complete");
    if current.is_empty() {
        warn!("no pictures found; waiting for the library to change");
    } else if to_viewer.send(PictureSet(current.clone())).await.is_err() {
        return Ok(());
    }

    // 2) Bridge notify callback -> async channel
    let (watch_tx, mut watch_rx) = mpsc::channel::<notify::Result<Event>>(128);
    let mut watcher = recommended_watcher(move |res| {
        let _ = watch_tx.blocking_send(res);
    })?;
    watcher
        .watch(&cfg.picture_library_path, RecursiveMode::Recursive)
        .with_context(|| {
            format!(
                "failed to watch {}",
                cfg.picture_library_path.display()
            )
        })?;
    info!("notify watcher initialized (recursive)");

    // 3) Event loop; bursts of changes collapse into one rescan.
    let mut rescan_at: Option<Instant> = None;
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                info!("cancel received; exiting files task");
                break;
            }

            Some(res) = watch_rx.recv() => match res {
                Ok(event) if is_relevant(&event) => {
                    debug!(kind = ?event.kind, paths = ?event.paths, "library changed");
                    rescan_at = Some(Instant::now() + cfg.rescan_debounce);
                }
                Ok(event) => debug!(kind = ?event.kind, "fs: ignored"),
                Err(err) => error!("watch error: {err}"),
            },

            _ = sleep_until(rescan_at.unwrap_or_else(Instant::now)), if rescan_at.is_some() => {
                rescan_at = None;
                let pictures = match discover_pictures(&cfg) {
                    Ok(pictures) => pictures,
                    Err(err) => {
                        warn!("rescan failed: {err:#}");
                        continue;
                    }
                };
                if pictures == current {
                    debug!("rescan produced an identical picture set");
                    continue;
                }
                info!(before = current.len(), after = pictures.len(), "picture set changed");
                current = pictures;
                if current.is_empty() {
                    warn!("library is empty; keeping the previous picture set on screen");
                    continue;
                }
                if to_viewer.send(PictureSet(current.clone())).await.is_err() {
                    break;
                }
            }
        }
    }
    Ok(())
}

/// Recursively lists pictures under the library root as forward-slash paths
/// relative to it. Sorted by path, or shuffled when a seed is configured.
pub fn discover_pictures(cfg: &Configuration) -> Result<Vec<String>> {
    let root = &cfg.picture_library_path;
    let mut pictures = Vec::new();
    for entry in WalkDir::new(root)
        .follow_links(true)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
    {
        if !is_picture(entry.path()) {
            continue;
        }
        let Ok(relative) = entry.path().strip_prefix(root) else {
            continue;
        };
        let url = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        pictures.push(url);
    }

    pictures.sort();
    if let Some(seed) = cfg.shuffle_seed {
        pictures.shuffle(&mut StdRng::seed_from_u64(seed));
    }
    Ok(pictures)
}

fn is_relevant(event: &Event) -> bool {
    let touches_picture = event.paths.iter().any(|p| is_picture(p));
    match event.kind {
        EventKind::Create(CreateKind::File | CreateKind::Any) => touches_picture,
        EventKind::Remove(RemoveKind::File | RemoveKind::Any) => touches_picture,
        EventKind::Modify(ModifyKind::Name(_)) => touches_picture,
        // Directory moves do not name the pictures inside them.
        EventKind::Create(CreateKind::Folder) | EventKind::Remove(RemoveKind::Folder) => true,
        _ => false,
    }
}

#[inline]
fn is_picture(p: &Path) -> bool {
    matches!(
        p.extension()
            .and_then(OsStr::to_str)
            .map(|s| s.to_ascii_lowercase()),
        Some(ref e) if PICTURE_EXTENSIONS.contains(&e.as_str())
    )
}
