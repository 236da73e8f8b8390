use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::net::UnixListener;
use tokio::sync::mpsc::Sender;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::events::GalleryCommand;

/// Accepts newline-delimited JSON commands such as `{"command":"next"}` on a
/// unix socket and forwards them to the viewer.
///
/// A socket that cannot be set up is logged and the task idles until
/// shutdown; the gallery keeps running without remote control.
#[instrument(skip_all, fields(socket = %socket_path.display()))]
pub async fn run(
    socket_path: PathBuf,
    to_viewer: Sender<GalleryCommand>,
    cancel: CancellationToken,
) -> Result<()> {
    if let Err(err) = listen(&socket_path, to_viewer, &cancel).await {
        warn!("control socket unavailable; continuing without it: {err:#}");
        cancel.cancelled().await;
    }
    Ok(())
}

async fn listen(
    socket_path: &Path,
    to_viewer: Sender<GalleryCommand>,
    cancel: &CancellationToken,
) -> Result<()> {
    if let Some(parent) = socket_path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    match tokio::fs::remove_file(socket_path).await {
        Ok(()) => debug!("removed stale control socket"),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
        Err(err) => return Err(err).context("failed to remove stale control socket"),
    }
    let listener = UnixListener::bind(socket_path)
        .with_context(|| format!("failed to bind {}", socket_path.display()))?;
    info!("control socket listening");

    let mut connections = JoinSet::new();
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, _)) => {
                    connections.spawn(serve_connection(stream, to_viewer.clone()));
                }
                Err(err) => warn!("control accept failed: {err}"),
            },
            Some(_) = connections.join_next() => {}
        }
    }

    connections.shutdown().await;
    let _ = std::fs::remove_file(socket_path);
    Ok(())
}

/// Forwards every well-formed command line from `reader`; malformed lines are
/// logged and skipped.
pub async fn serve_connection<R>(reader: R, to_viewer: Sender<GalleryCommand>)
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(err) => {
                warn!("control connection read failed: {err}");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }
        match parse_command(&line) {
            Ok(command) => {
                if to_viewer.send(command).await.is_err() {
                    break;
                }
            }
            Err(err) => warn!(line = %line.trim(), "ignoring malformed control command: {err:#}"),
        }
    }
}

pub fn parse_command(line: &str) -> Result<GalleryCommand> {
    serde_json::from_str(line.trim()).context("invalid control command")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::Direction;
    use tokio::io::AsyncWriteExt;
    use std::time::Duration;
    use tokio::sync::mpsc;
    use tokio::time::timeout;

    #[test]
    fn parses_navigation_commands() {
        assert_eq!(
            parse_command(r#"{"command":"next"}"#).unwrap(),
            GalleryCommand::Next {
                skip_animation: false
            }
        );
        assert_eq!(
            parse_command(r#"{"command":"slide-to","index":3,"direction":"prev","skip-animation":true}"#)
                .unwrap(),
            GalleryCommand::SlideTo {
                index: 3,
                direction: Direction::Prev,
                skip_animation: true
            }
        );
        assert!(parse_command(r#"{"command":"toggle-state"}"#).is_err());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn forwards_commands_from_socket_clients() {
        let dir = tempfile::tempdir().unwrap();
        let socket = dir.path().join("run").join("control.sock");
        let (tx, mut rx) = mpsc::channel(4);
        let cancel = CancellationToken::new();
        let server = tokio::spawn(run(socket.clone(), tx, cancel.clone()));

        let mut client = timeout(Duration::from_secs(5), async {
            loop {
                match tokio::net::UnixStream::connect(&socket).await {
                    Ok(stream) => break stream,
                    Err(_) => tokio::time::sleep(Duration::from_millis(10)).await,
                }
            }
        })
        .await
        .expect("control socket never came up");
        client.write_all(b"{\"command\":\"prev\"}\n").await.unwrap();

        let command = timeout(Duration::from_secs(5), rx.recv()).await.unwrap();
        assert_eq!(
            command,
            Some(GalleryCommand::Prev {
                skip_animation: false
            })
        );

        cancel.cancel();
        timeout(Duration::from_secs(5), server)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert!(!socket.exists());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn unusable_socket_path_waits_for_shutdown() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, b"").unwrap();
        let (tx, _rx) = mpsc::channel(4);
        let cancel = CancellationToken::new();
        let server = tokio::spawn(run(blocker.join("control.sock"), tx, cancel.clone()));

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!server.is_finished());

        cancel.cancel();
        let result = timeout(Duration::from_secs(5), server).await.unwrap().unwrap();
        assert!(result.is_ok());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn skips_malformed_lines() {
        let (mut client, server) = tokio::io::duplex(256);
        let (tx, mut rx) = mpsc::channel(4);
        let serve = tokio::spawn(serve_connection(server, tx));

        client
            .write_all(b"not json\n\n{\"command\":\"start-slideshow\"}\n")
            .await
            .unwrap();
        drop(client);

        assert_eq!(rx.recv().await, Some(GalleryCommand::StartSlideshow));
        serve.await.unwrap();
        assert_eq!(rx.recv().await, None);
    }
}
