use crate::error::LoadFailure;
use crate::events::{FetchImage, ImageFetched, ImageSize, SlideId};
use anyhow::Result;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tokio::select;
use tokio::sync::mpsc::{Receiver, Sender};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

/// Reads the pixel dimensions of an image without decoding it, swapped when
/// the EXIF orientation rotates the picture by 90 degrees.
pub fn read_display_size(path: &Path) -> Result<ImageSize, LoadFailure> {
    let (width, height) = image::ImageReader::open(path)?
        .with_guessed_format()?
        .into_dimensions()?;

    let size = match read_orientation(path).unwrap_or(1) {
        5..=8 => ImageSize {
            width: height,
            height: width,
        },
        _ => ImageSize { width, height },
    };
    Ok(size)
}

fn read_orientation(path: &Path) -> Option<u16> {
    let file = File::open(path).ok()?;
    let mut buf = BufReader::new(file);
    let exif = exif::Reader::new().read_from_container(&mut buf).ok()?;
    let field = exif.get_field(exif::Tag::Orientation, exif::In::PRIMARY)?;
    let orientation = u16::try_from(field.value.get_uint(0)?).ok()?;
    debug!(orientation, path = %path.display(), "exif orientation");
    Some(orientation)
}

/// Serves fetch requests from the viewer. Every request is answered exactly
/// once unless the task is cancelled first.
#[instrument(skip_all, fields(root = %root.display()))]
pub async fn run(
    root: PathBuf,
    mut fetch_rx: Receiver<FetchImage>,
    to_viewer: Sender<ImageFetched>,
    cancel: CancellationToken,
) -> Result<()> {
    let mut tasks: JoinSet<(SlideId, Result<ImageSize, LoadFailure>)> = JoinSet::new();

    loop {
        select! {
            _ = cancel.cancelled() => break,

            Some(FetchImage { slide, url }) = fetch_rx.recv() => {
                let path = root.join(&url);
                debug!(%slide, path = %path.display(), "fetch");
                tasks.spawn(async move {
                    let res = tokio::task::spawn_blocking(move || read_display_size(&path)).await;
                    // A panicked or cancelled worker counts as an abort.
                    (slide, res.unwrap_or(Err(LoadFailure::Aborted)))
                });
            }

            Some(join_res) = tasks.join_next() => {
                let Ok((slide, outcome)) = join_res else {
                    warn!("fetch worker vanished");
                    continue;
                };
                if let Err(err) = &outcome {
                    debug!(%slide, "fetch failed: {err}");
                }
                if to_viewer.send(ImageFetched { slide, outcome }).await.is_err() {
                    break;
                }
            }

            else => break,
        }
    }
    Ok(())
}
