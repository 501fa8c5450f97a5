//! Fetching frame images from wherever the asset store lives.

use crate::sequence::FrameAddress;
use reqwest::Client;
use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("invalid asset origin '{0}'")]
    InvalidOrigin(String),
    #[error("invalid frame url: {0}")]
    Url(#[from] url::ParseError),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("'{0}' is empty")]
    Empty(FrameAddress),
    #[error("'{address}' did not complete within {timeout:?}")]
    TimedOut {
        address: FrameAddress,
        timeout: Duration,
    },
}

/// Loads one frame. Success means the bytes arrived; the preloader does not keep them.
pub trait AssetFetcher: Send + Sync + 'static {
    fn fetch(&self, address: &FrameAddress) -> impl Future<Output = Result<(), FetchError>> + Send;
}

/// Fetches frames from a static file server.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    origin: Url,
}

impl HttpFetcher {
    /// A path on the origin is kept as the root frame addresses are resolved under.
    pub fn new(origin: &str) -> Result<Self, FetchError> {
        let mut url = Url::parse(origin)
            .ok()
            .filter(|u| !u.cannot_be_a_base())
            .ok_or_else(|| FetchError::InvalidOrigin(origin.into()))?;
        if !url.path().ends_with('/') {
            let path = format!("{}/", url.path());
            url.set_path(&path);
        }
        Ok(Self {
            client: Client::new(),
            origin: url,
        })
    }

    pub fn url(&self, address: &FrameAddress) -> Result<Url, FetchError> {
        Ok(self.origin.join(address.trim_start_matches('/'))?)
    }
}

impl AssetFetcher for HttpFetcher {
    async fn fetch(&self, address: &FrameAddress) -> Result<(), FetchError> {
        let url = self.url(address)?;
        let body = self
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;

        if body.is_empty() {
            return Err(FetchError::Empty(address.clone()));
        }
        Ok(())
    }
}

/// Reads frames from a local directory laid out like the served asset tree.
#[derive(Debug, Clone)]
pub struct FsFetcher {
    root: PathBuf,
}

impl FsFetcher {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn path(&self, address: &FrameAddress) -> PathBuf {
        self.root.join(address.trim_start_matches('/'))
    }
}

impl AssetFetcher for FsFetcher {
    async fn fetch(&self, address: &FrameAddress) -> Result<(), FetchError> {
        let bytes = fs_err::tokio::read(self.path(address)).await?;
        if bytes.is_empty() {
            return Err(FetchError::Empty(address.clone()));
        }
        Ok(())
    }
}

/// Fetcher chosen from an origin string: `http(s)://` goes over the network, anything
/// else (a path or a `file://` url) is read from disk.
#[derive(Debug, Clone)]
pub enum AssetSource {
    Http(HttpFetcher),
    Fs(FsFetcher),
}

impl AssetSource {
    pub fn from_origin(origin: &str) -> Result<Self, FetchError> {
        if origin.starts_with("http://") || origin.starts_with("https://") {
            return HttpFetcher::new(origin).map(AssetSource::Http);
        }

        let root = match origin.strip_prefix("file://") {
            Some(_) => Url::parse(origin)
                .ok()
                .and_then(|u| u.to_file_path().ok())
                .ok_or_else(|| FetchError::InvalidOrigin(origin.into()))?,
            None => PathBuf::from(origin),
        };
        Ok(AssetSource::Fs(FsFetcher::new(root)))
    }
}

impl AssetFetcher for AssetSource {
    async fn fetch(&self, address: &FrameAddress) -> Result<(), FetchError> {
        match self {
            AssetSource::Http(f) => f.fetch(address).await,
            AssetSource::Fs(f) => f.fetch(address).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("spinframe-{name}-{}", std::process::id()));
        fs_err::create_dir_all(dir.join("box00")).unwrap();
        dir
    }

    #[test]
    fn test_http_url_join() {
        let f = HttpFetcher::new("http://localhost:3000").unwrap();
        let url = f.url(&FrameAddress::new("/drill-images/drill-01.jpg")).unwrap();
        assert_eq!(url.as_str(), "http://localhost:3000/drill-images/drill-01.jpg");

        let f = HttpFetcher::new("https://cdn.example.com/assets").unwrap();
        let url = f.url(&FrameAddress::new("/drill-images/drill-36.jpg")).unwrap();
        assert_eq!(
            url.as_str(),
            "https://cdn.example.com/assets/drill-images/drill-36.jpg"
        );
        assert!(HttpFetcher::new("mailto:frames@example.com").is_err());
    }

    /// Serves `/assets/box00/box-001.jpeg` with a body, `box-002.jpeg` empty and
    /// everything else as 404.
    async fn serve_frames(listener: TcpListener) {
        while let Ok((mut stream, _)) = listener.accept().await {
            tokio::spawn(async move {
                let mut request = Vec::new();
                let mut buf = [0u8; 1024];
                while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                    match stream.read(&mut buf).await {
                        Ok(0) | Err(_) => return,
                        Ok(n) => request.extend_from_slice(&buf[..n]),
                    }
                }

                let request = String::from_utf8_lossy(&request);
                let path = request.split_whitespace().nth(1).unwrap_or("/");
                let (status, body): (&str, &[u8]) = match path {
                    "/assets/box00/box-001.jpeg" => ("200 OK", &b"jpeg"[..]),
                    "/assets/box00/box-002.jpeg" => ("200 OK", &b""[..]),
                    _ => ("404 Not Found", &b"missing"[..]),
                };
                let head = format!(
                    "HTTP/1.1 {status}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                    body.len()
                );
                let _ = stream.write_all(head.as_bytes()).await;
                let _ = stream.write_all(body).await;
            });
        }
    }

    #[tokio::test]
    async fn test_http_fetch_statuses() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let origin = format!("http://{}/assets", listener.local_addr().unwrap());
        tokio::spawn(serve_frames(listener));

        let f = HttpFetcher::new(&origin).unwrap();
        assert!(f.fetch(&FrameAddress::new("/box00/box-001.jpeg")).await.is_ok());
        assert!(matches!(
            f.fetch(&FrameAddress::new("/box00/box-002.jpeg")).await,
            Err(FetchError::Empty(_))
        ));
        assert!(matches!(
            f.fetch(&FrameAddress::new("/box00/box-003.jpeg")).await,
            Err(FetchError::Http(_))
        ));
    }

    #[test]
    fn test_origin_selection() {
        assert!(matches!(
            AssetSource::from_origin("https://cdn.example.com").unwrap(),
            AssetSource::Http(_)
        ));
        assert!(matches!(
            AssetSource::from_origin("./public").unwrap(),
            AssetSource::Fs(_)
        ));
        let AssetSource::Fs(f) = AssetSource::from_origin("file:///srv/public").unwrap() else {
            panic!("expected a filesystem source");
        };
        assert_eq!(
            f.path(&FrameAddress::new("/jar00/jar-001.jpeg")),
            PathBuf::from("/srv/public/jar00/jar-001.jpeg")
        );
        assert!(AssetSource::from_origin("http://").is_err());
    }

    #[tokio::test]
    async fn test_fs_fetch() {
        let dir = scratch_dir("fs-fetch");
        fs_err::write(dir.join("box00/box-001.jpeg"), b"jpeg").unwrap();
        fs_err::write(dir.join("box00/box-002.jpeg"), b"").unwrap();

        let f = FsFetcher::new(&dir);
        assert!(f.fetch(&FrameAddress::new("/box00/box-001.jpeg")).await.is_ok());
        assert!(matches!(
            f.fetch(&FrameAddress::new("/box00/box-002.jpeg")).await,
            Err(FetchError::Empty(_))
        ));
        assert!(matches!(
            f.fetch(&FrameAddress::new("/box00/box-003.jpeg")).await,
            Err(FetchError::Io(_))
        ));
    }
}
