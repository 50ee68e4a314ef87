use async_trait::async_trait;
use bytes::Bytes;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::config::Config;
use crate::error::{Error, Result};

const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// What the Bot API answered: the result, or the server's description of
/// why there is none.
pub type Reply<T> = std::result::Result<T, String>;

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
    result: Option<T>,
}

impl<T> Envelope<T> {
    fn into_reply(self) -> Reply<T> {
        match (self.ok, self.result) {
            (true, Some(result)) => Ok(result),
            (true, None) => Err("response without result".to_owned()),
            (false, _) => Err(self
                .description
                .unwrap_or_else(|| "unknown error".to_owned())),
        }
    }
}

pub fn decode_reply<T: DeserializeOwned>(body: &[u8]) -> Reply<T> {
    match serde_json::from_slice::<Envelope<T>>(body) {
        Ok(envelope) => envelope.into_reply(),
        Err(err) => Err(format!("malformed response: {err}")),
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StickerSet {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    pub stickers: Vec<Sticker>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Sticker {
    pub file_id: String,
    #[serde(default)]
    pub emoji: Option<String>,
    #[serde(default)]
    pub is_animated: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct File {
    pub file_id: String,
    #[serde(default)]
    pub file_path: Option<String>,
}

/// The three Bot API calls the downloader needs.
///
/// Transport problems are `Err`; a well-formed "no" from the server is
/// `Ok(Err(description))`.
#[async_trait]
pub trait BotApi: Send + Sync {
    async fn get_sticker_set(&self, name: &str) -> Result<Reply<StickerSet>>;
    async fn get_file(&self, file_id: &str) -> Result<Reply<File>>;
    /// Fetches `file_path` as returned by [`BotApi::get_file`]. Anything but
    /// `200 OK` is [`Error::DownloadFailed`].
    async fn download(&self, file_path: &str) -> Result<Bytes>;
}

pub struct HttpBotApi {
    client: reqwest::Client,
    method_base: String,
    file_base: String,
}

impl HttpBotApi {
    pub fn new(config: &Config) -> Result<Self> {
        let client = reqwest::ClientBuilder::new()
            .user_agent(USER_AGENT)
            .timeout(config.timeout)
            .build()?;
        let api = config.api_url.trim_end_matches('/');
        Ok(Self {
            client,
            method_base: format!("{api}/bot{}", config.token),
            file_base: format!("{api}/file/bot{}", config.token),
        })
    }

    async fn call<T>(&self, method: &str, query: &[(&str, &str)]) -> Result<Reply<T>>
    where
        T: DeserializeOwned,
    {
        // failed calls come back as 4xx with a json envelope, so the status
        // is not checked here
        let body = self
            .client
            .get(format!("{}/{method}", self.method_base))
            .query(query)
            .send()
            .await?
            .bytes()
            .await?;
        Ok(decode_reply(&body))
    }
}

#[async_trait]
impl BotApi for HttpBotApi {
    async fn get_sticker_set(&self, name: &str) -> Result<Reply<StickerSet>> {
        self.call("getStickerSet", &[("name", name)]).await
    }

    async fn get_file(&self, file_id: &str) -> Result<Reply<File>> {
        self.call("getFile", &[("file_id", file_id)]).await
    }

    async fn download(&self, file_path: &str) -> Result<Bytes> {
        let response = self
            .client
            .get(format!("{}/{file_path}", self.file_base))
            .send()
            .await?;
        let status = response.status();
        if status != StatusCode::OK {
            return Err(Error::DownloadFailed {
                path: file_path.to_owned(),
                status: status.as_u16(),
            });
        }
        Ok(response.bytes().await?)
    }
}

#[cfg(test)]
pub(crate) mod fake {
    use std::collections::HashMap;
    use std::time::Duration;

    use super::*;

    struct Blob {
        status: u16,
        data: Bytes,
        delay: Duration,
    }

    /// In-memory Bot API. Unknown packs, files and paths answer the way
    /// Telegram does.
    #[derive(Default)]
    pub struct FakeBotApi {
        sets: HashMap<String, Reply<StickerSet>>,
        files: HashMap<String, Reply<File>>,
        blobs: HashMap<String, Blob>,
    }

    pub fn sticker(file_id: &str, emoji: Option<&str>, is_animated: bool) -> Sticker {
        Sticker {
            file_id: file_id.to_owned(),
            emoji: emoji.map(str::to_owned),
            is_animated,
        }
    }

    impl FakeBotApi {
        pub fn with_pack(mut self, name: &str, title: &str, stickers: Vec<Sticker>) -> Self {
            let set = StickerSet {
                title: Some(title.to_owned()),
                author: None,
                stickers,
            };
            self.sets.insert(name.to_owned(), Ok(set));
            self
        }
        pub fn with_set(mut self, name: &str, set: StickerSet) -> Self {
            self.sets.insert(name.to_owned(), Ok(set));
            self
        }
        pub fn with_file(mut self, file_id: &str, file_path: &str, data: impl Into<Bytes>) -> Self {
            let file = File {
                file_id: file_id.to_owned(),
                file_path: Some(file_path.to_owned()),
            };
            self.files.insert(file_id.to_owned(), Ok(file));
            let blob = Blob {
                status: 200,
                data: data.into(),
                delay: Duration::ZERO,
            };
            self.blobs.insert(file_path.to_owned(), blob);
            self
        }
        pub fn with_unresolvable(mut self, file_id: &str, description: &str) -> Self {
            self.files
                .insert(file_id.to_owned(), Err(description.to_owned()));
            self
        }
        pub fn with_status(mut self, file_path: &str, status: u16) -> Self {
            if let Some(blob) = self.blobs.get_mut(file_path) {
                blob.status = status;
            }
            self
        }
        pub fn with_delay(mut self, file_path: &str, delay: Duration) -> Self {
            if let Some(blob) = self.blobs.get_mut(file_path) {
                blob.delay = delay;
            }
            self
        }
    }

    #[async_trait]
    impl BotApi for FakeBotApi {
        async fn get_sticker_set(&self, name: &str) -> Result<Reply<StickerSet>> {
            Ok(self
                .sets
                .get(name)
                .cloned()
                .unwrap_or_else(|| Err("Bad Request: STICKERSET_INVALID".to_owned())))
        }

        async fn get_file(&self, file_id: &str) -> Result<Reply<File>> {
            Ok(self
                .files
                .get(file_id)
                .cloned()
                .unwrap_or_else(|| Err("Bad Request: invalid file_id".to_owned())))
        }

        async fn download(&self, file_path: &str) -> Result<Bytes> {
            let (status, data, delay) = match self.blobs.get(file_path) {
                Some(blob) => (blob.status, blob.data.clone(), blob.delay),
                None => (404, Bytes::new(), Duration::ZERO),
            };
            tokio::time::sleep(delay).await;
            if status != 200 {
                return Err(Error::DownloadFailed {
                    path: file_path.to_owned(),
                    status,
                });
            }
            Ok(data)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_sticker_set() {
        let body = r#"{
            "ok": true,
            "result": {
                "name": "JollySanta",
                "title": "Jolly Santa",
                "sticker_type": "regular",
                "stickers": [
                    { "file_id": "a", "emoji": "🎅", "is_animated": true, "width": 512 },
                    { "file_id": "b", "is_animated": false },
                    { "file_id": "c", "emoji": "🎄" }
                ]
            }
        }"#;
        let set = decode_reply::<StickerSet>(body.as_bytes()).unwrap();
        assert_eq!(set.title.as_deref(), Some("Jolly Santa"));
        assert_eq!(set.author, None);
        let ids = set.stickers.iter().map(|s| s.file_id.as_str()).collect::<Vec<_>>();
        assert_eq!(ids, ["a", "b", "c"]);
        assert!(set.stickers[0].is_animated);
        assert_eq!(set.stickers[0].emoji.as_deref(), Some("🎅"));
        assert_eq!(set.stickers[1].emoji, None);
        assert_eq!(set.stickers[2].emoji.as_deref(), Some("🎄"));
        assert!(!set.stickers[2].is_animated);
    }

    #[test]
    fn decodes_escaped_emoji() {
        let body = br#"{"ok":true,"result":{"stickers":[{"file_id":"a","emoji":"\ud83c\udf85"}]}}"#;
        let set = decode_reply::<StickerSet>(body).unwrap();
        assert_eq!(set.stickers[0].emoji.as_deref(), Some("🎅"));
    }

    #[test]
    fn failed_envelope_carries_description() {
        let body = br#"{"ok":false,"error_code":400,"description":"Bad Request: STICKERSET_INVALID"}"#;
        assert_eq!(
            decode_reply::<StickerSet>(body).unwrap_err(),
            "Bad Request: STICKERSET_INVALID"
        );
    }

    #[test]
    fn failed_envelope_without_description() {
        assert_eq!(decode_reply::<File>(br#"{"ok":false}"#).unwrap_err(), "unknown error");
        assert_eq!(
            decode_reply::<File>(br#"{"ok":true}"#).unwrap_err(),
            "response without result"
        );
    }

    #[test]
    fn malformed_body_is_an_error_reply() {
        let err = decode_reply::<File>(b"<html>502 Bad Gateway</html>").unwrap_err();
        assert!(err.starts_with("malformed response"), "{err}");
    }

    #[test]
    fn decodes_file() {
        let body = br#"{"ok":true,"result":{"file_id":"a","file_unique_id":"u","file_size":10,"file_path":"stickers/file_1.tgs"}}"#;
        let file = decode_reply::<File>(body).unwrap();
        assert_eq!(file.file_id, "a");
        assert_eq!(file.file_path.as_deref(), Some("stickers/file_1.tgs"));
    }
}

#[cfg(test)]
mod http_tests {
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::thread::{self, JoinHandle};
    use std::time::Duration;

    use super::*;

    const TOKEN: &str = "SECRET";

    /// Answers a single request with `status` and `body` after `delay`.
    /// Joining the handle yields the request line that was received.
    fn serve_once(status: &'static str, body: &'static str, delay: Duration) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        let handle = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut head = Vec::new();
            let mut buf = [0u8; 1024];
            while !head.windows(4).any(|window| window == b"\r\n\r\n") {
                let n = stream.read(&mut buf).unwrap();
                if n == 0 {
                    break;
                }
                head.extend_from_slice(&buf[..n]);
            }
            thread::sleep(delay);
            let response = format!(
                "HTTP/1.1 {status}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );
            // the client may have hung up already
            let _ = stream.write_all(response.as_bytes());
            let head = String::from_utf8_lossy(&head);
            head.lines().next().unwrap_or_default().to_owned()
        });
        (url, handle)
    }

    fn api(api_url: String, timeout: Duration) -> HttpBotApi {
        let config = Config {
            token: TOKEN.to_owned(),
            api_url,
            timeout,
        };
        HttpBotApi::new(&config).unwrap()
    }

    #[tokio::test]
    async fn sticker_set_error_reply() {
        let (url, request) = serve_once(
            "400 Bad Request",
            r#"{"ok":false,"error_code":400,"description":"Bad Request: STICKERSET_INVALID"}"#,
            Duration::ZERO,
        );
        let reply = api(url, Duration::from_secs(5))
            .get_sticker_set("Foo Bar")
            .await
            .unwrap();
        assert_eq!(reply.unwrap_err(), "Bad Request: STICKERSET_INVALID");
        assert_eq!(
            request.join().unwrap(),
            "GET /botSECRET/getStickerSet?name=Foo+Bar HTTP/1.1"
        );
    }

    #[tokio::test]
    async fn resolves_file() {
        let (url, request) = serve_once(
            "200 OK",
            r#"{"ok":true,"result":{"file_id":"abc","file_path":"stickers/f.webp"}}"#,
            Duration::ZERO,
        );
        // a trailing slash on the api url is tolerated
        let reply = api(format!("{url}/"), Duration::from_secs(5))
            .get_file("abc")
            .await
            .unwrap();
        assert_eq!(reply.unwrap().file_path.as_deref(), Some("stickers/f.webp"));
        assert_eq!(
            request.join().unwrap(),
            "GET /botSECRET/getFile?file_id=abc HTTP/1.1"
        );
    }

    #[tokio::test]
    async fn downloads_file() {
        let (url, request) = serve_once("200 OK", "RIFF", Duration::ZERO);
        let bytes = api(url, Duration::from_secs(5))
            .download("stickers/f.webp")
            .await
            .unwrap();
        assert_eq!(&bytes[..], b"RIFF");
        assert_eq!(
            request.join().unwrap(),
            "GET /file/botSECRET/stickers/f.webp HTTP/1.1"
        );
    }

    #[tokio::test]
    async fn download_not_found() {
        let (url, request) = serve_once("404 Not Found", "", Duration::ZERO);
        let err = api(url, Duration::from_secs(5))
            .download("stickers/f.webp")
            .await
            .unwrap_err();
        assert!(
            matches!(&err, Error::DownloadFailed { path, status: 404 } if path == "stickers/f.webp"),
            "{err}"
        );
        request.join().unwrap();
    }

    #[tokio::test]
    async fn slow_server_times_out() {
        let (url, request) = serve_once("200 OK", "{}", Duration::from_millis(800));
        let err = api(url, Duration::from_millis(100))
            .download("stickers/f.webp")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::RequestTimeout), "{err}");
        assert!(!err.to_string().contains(TOKEN));
        request.join().unwrap();
    }
}
