//! Transfer of a chosen option's streams to local files.

use crate::assembler::{StreamBundle, StreamOption};
use crate::error::{Error, Result};
use crate::fetch::HttpFetcher;
use futures_util::{Stream, StreamExt};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

/// Writes a byte stream to `path`, creating parent directories as needed.
///
/// `on_progress` is called after every chunk with the bytes written so far and the expected total.
/// Returns the number of bytes written. A partly written file is removed when the transfer fails.
///
/// # Errors
///
/// This function will return an error if the stream yields an error or the file cannot be written.
pub async fn persist<S, B, E>(
    stream: S,
    path: impl AsRef<Path>,
    total: Option<u64>,
    mut on_progress: impl FnMut(u64, Option<u64>),
) -> Result<u64>
where
    S: Stream<Item = std::result::Result<B, E>>,
    B: AsRef<[u8]>,
    E: Into<Error>,
{
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let mut file = tokio::fs::File::create(path).await?;
    let mut stream = std::pin::pin!(stream);

    let transfer = async {
        let mut written = 0u64;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(Into::<Error>::into)?;
            let bytes = chunk.as_ref();
            file.write_all(bytes).await?;

            written += bytes.len() as u64;
            on_progress(written, total);
        }
        file.flush().await?;
        Ok::<_, Error>(written)
    }
    .await;
    drop(file);

    match transfer {
        Ok(written) => {
            log::debug!("Wrote {} bytes to {}", written, path.display());
            Ok(written)
        }
        Err(e) => {
            discard(&[path]).await;
            Err(e)
        }
    }
}

/// Removes files left behind by a failed download.
async fn discard(paths: &[impl AsRef<Path>]) {
    for path in paths {
        let path = path.as_ref();
        if let Err(e) = tokio::fs::remove_file(path).await {
            log::warn!("Could not remove {}: {}", path.display(), e);
        }
    }
}

/// Downloads every stream of `option` into `dir`, named after the bundle's stem.
///
/// `on_progress` receives the file being written, the bytes written so far and the expected total.
/// If any file fails, the files already finished for this option are removed as well.
///
/// # Errors
///
/// Returns [`Error::DescramblingRequired`] before any transfer if a stream of the option is still
/// signature-protected. Transfer and file errors are returned as they occur.
pub async fn download_option(
    fetcher: &HttpFetcher,
    bundle: &StreamBundle,
    option: &StreamOption,
    dir: impl AsRef<Path>,
    mut on_progress: impl FnMut(&Path, u64, Option<u64>),
) -> Result<Vec<PathBuf>> {
    if let Some(stream) = option.streams().into_iter().find(|s| s.cipher_resolution) {
        return Err(Error::DescramblingRequired {
            itag: stream.itag,
            player_script: bundle.player_script.clone(),
        });
    }

    let mut paths = Vec::new();
    for (stream, name) in option.files(&bundle.stem) {
        let path = dir.as_ref().join(name);
        log::info!("Downloading format {} to {}", stream.itag, path.display());

        if let Err(e) = fetch_into(fetcher, &stream.url, &path, &mut on_progress).await {
            discard(paths.as_slice()).await;
            return Err(e);
        }
        paths.push(path);
    }

    Ok(paths)
}

async fn fetch_into(
    fetcher: &HttpFetcher,
    url: &str,
    path: &Path,
    on_progress: &mut impl FnMut(&Path, u64, Option<u64>),
) -> Result<u64> {
    let response = fetcher.fetch_bytes(url).await?;
    let total = response.content_length();
    persist(response.bytes_stream(), path, total, |written, total| {
        on_progress(path, written, total)
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembler;
    use crate::catalog;
    use crate::config::Config;
    use crate::resolver::ResolvedStream;
    use bytes::Bytes;
    use futures_util::stream;
    use std::collections::{BTreeMap, HashMap};
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    /// Serves the given bodies over plain HTTP; any other path answers 404.
    async fn serve(routes: HashMap<&'static str, &'static [u8]>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let mut request = Vec::new();
                let mut buf = [0u8; 1024];
                while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                    match socket.read(&mut buf).await {
                        Ok(0) | Err(_) => break,
                        Ok(n) => request.extend_from_slice(&buf[..n]),
                    }
                }
                let head = String::from_utf8_lossy(&request).to_string();
                let target = head.split_whitespace().nth(1).unwrap_or("/");
                let response = match routes.get(target) {
                    Some(body) => {
                        let mut response = format!(
                            "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                            body.len()
                        )
                        .into_bytes();
                        response.extend_from_slice(body);
                        response
                    }
                    None => b"HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n".to_vec(),
                };
                let _ = socket.write_all(&response).await;
                let _ = socket.shutdown().await;
            }
        });
        format!("http://{}", addr)
    }

    fn adaptive_bundle(base: &str) -> assembler::StreamBundle {
        let streams: BTreeMap<u32, ResolvedStream> = [(247, "video"), (251, "audio")]
            .into_iter()
            .map(|(itag, route)| {
                let stream = ResolvedStream {
                    itag,
                    spec: catalog::lookup(itag).unwrap(),
                    url: format!("{}/{}", base, route),
                    cipher_resolution: false,
                    signature: None,
                };
                (itag, stream)
            })
            .collect();
        assembler::assemble("Clip", &streams)
    }

    #[tokio::test]
    async fn persist_writes_every_chunk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("clip.mp4");
        let chunks = stream::iter(vec![
            Ok::<_, std::io::Error>(Bytes::from_static(b"abc")),
            Ok(Bytes::from_static(b"defg")),
        ]);

        let mut reports = Vec::new();
        let written = persist(chunks, &path, Some(7), |done, total| reports.push((done, total)))
            .await
            .unwrap();

        assert_eq!(written, 7);
        assert_eq!(reports, vec![(3, Some(7)), (7, Some(7))]);
        assert_eq!(std::fs::read(&path).unwrap(), b"abcdefg");
    }

    #[tokio::test]
    async fn persist_stops_at_the_first_failed_chunk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.mp4");
        let chunks = stream::iter(vec![
            Ok(Bytes::from_static(b"abc")),
            Err(std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset")),
            Ok(Bytes::from_static(b"never")),
        ]);

        let err = persist(chunks, &path, None, |_, _| {}).await.unwrap_err();
        assert!(matches!(err, Error::Io(_)));
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn ciphered_options_are_refused_before_any_transfer() {
        let spec = catalog::lookup(18).unwrap();
        let streams: BTreeMap<u32, ResolvedStream> = [(
            18,
            ResolvedStream {
                itag: 18,
                spec,
                url: "https://x.invalid/v".to_string(),
                cipher_resolution: true,
                signature: Some("ABC".to_string()),
            },
        )]
        .into_iter()
        .collect();
        let mut bundle = assembler::assemble("Clip", &streams);
        bundle.player_script = Some("https://www.youtube.com/s/player/x/base.js".to_string());

        let fetcher = HttpFetcher::new(&Config::default()).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let err = download_option(&fetcher, &bundle, &bundle.options[0], dir.path(), |_, _, _| {})
            .await
            .unwrap_err();

        match err {
            Error::DescramblingRequired { itag, player_script } => {
                assert_eq!(itag, 18);
                assert_eq!(player_script, bundle.player_script);
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn both_halves_of_an_adaptive_option_are_saved() {
        let base = serve(HashMap::from([
            ("/video", b"video-bytes".as_slice()),
            ("/audio", b"audio".as_slice()),
        ]))
        .await;
        let bundle = adaptive_bundle(&base);
        let option = bundle.find("720p").unwrap();

        let fetcher = HttpFetcher::new(&Config::default()).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let paths = download_option(&fetcher, &bundle, option, dir.path(), |_, _, _| {})
            .await
            .unwrap();

        assert_eq!(paths.len(), 2);
        assert_eq!(std::fs::read(&paths[0]).unwrap(), b"video-bytes");
        assert_eq!(std::fs::read(&paths[1]).unwrap(), b"audio");
    }

    #[tokio::test]
    async fn failed_audio_half_removes_the_finished_video() {
        let base = serve(HashMap::from([("/video", b"video-bytes".as_slice())])).await;
        let bundle = adaptive_bundle(&base);
        let option = bundle.find("720p").unwrap();

        let fetcher = HttpFetcher::new(&Config::default()).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let mut started = Vec::new();
        let err = download_option(&fetcher, &bundle, option, dir.path(), |path, _, _| {
            started.push(path.to_path_buf())
        })
        .await
        .unwrap_err();

        assert!(matches!(err, Error::Http(_)));
        assert!(started.iter().any(|path| path.ends_with("Clip_720p.webm")));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
