use std::collections::{HashMap, HashSet};
use std::io::Read;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;

use anyhow::{Context, Result, anyhow};

use super::WorkerEvent;

const PROBE_BYTE_LIMIT: u64 = 128 * 1024;

pub(super) enum ImageCommand {
    ProbeImage { url: String },
}

pub(super) trait ImageProber {
    fn probe(&mut self, url: &str) -> Result<(u32, u32)>;
}

struct HttpImageProber;

impl ImageProber for HttpImageProber {
    fn probe(&mut self, url: &str) -> Result<(u32, u32)> {
        let response = ureq::get(url)
            .call()
            .with_context(|| format!("image request failed: {url}"))?;

        let mut bytes = Vec::new();
        response
            .into_reader()
            .take(PROBE_BYTE_LIMIT)
            .read_to_end(&mut bytes)
            .context("image response read failed")?;

        image_dimensions(&bytes).with_context(|| format!("unsupported image data: {url}"))
    }
}

pub(super) fn spawn_image_prober(events: Sender<WorkerEvent>) -> Sender<ImageCommand> {
    let (tx, rx) = mpsc::channel();

    thread::spawn(move || prober_main(rx, events, HttpImageProber));

    tx
}

fn prober_main(
    commands: Receiver<ImageCommand>,
    events: Sender<WorkerEvent>,
    mut prober: impl ImageProber,
) {
    while let Ok(ImageCommand::ProbeImage { url }) = commands.recv() {
        let ratio = match prober.probe(&url) {
            Ok((width, height)) if height > 0 => Some(width as f32 / height as f32),
            Ok(_) => None,
            Err(error) => {
                log::debug!("image probe failed for {url}: {error:#}");
                None
            }
        };

        if events.send(WorkerEvent::ImageProbed { url, ratio }).is_err() {
            break;
        }
    }
}

pub(super) struct ImageRatioCache {
    ratios: HashMap<String, Option<f32>>,
    pending: HashSet<String>,
}

impl ImageRatioCache {
    pub(super) fn new() -> Self {
        Self {
            ratios: HashMap::new(),
            pending: HashSet::new(),
        }
    }

    pub(super) fn request(&mut self, url: &str, commands: &Sender<ImageCommand>) -> Option<f32> {
        if let Some(cached) = self.ratios.get(url) {
            return *cached;
        }

        if self.pending.insert(url.to_owned())
            && commands
                .send(ImageCommand::ProbeImage {
                    url: url.to_owned(),
                })
                .is_err()
        {
            log::warn!("image probe worker gone; portrait ratios unavailable");
        }

        None
    }

    pub(super) fn resolve(&mut self, url: String, ratio: Option<f32>) {
        self.pending.remove(&url);
        self.ratios.insert(url, ratio);
    }
}

pub(super) fn image_dimensions(bytes: &[u8]) -> Result<(u32, u32)> {
    png_dimensions(bytes)
        .or_else(|| gif_dimensions(bytes))
        .or_else(|| jpeg_dimensions(bytes))
        .ok_or_else(|| anyhow!("not a recognizable PNG, GIF, or JPEG header"))
}

fn png_dimensions(bytes: &[u8]) -> Option<(u32, u32)> {
    const SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', b'\r', b'\n', 0x1a, b'\n'];
    if bytes.len() < 24 || bytes[..8] != SIGNATURE || &bytes[12..16] != b"IHDR" {
        return None;
    }

    let width = u32::from_be_bytes(bytes[16..20].try_into().ok()?);
    let height = u32::from_be_bytes(bytes[20..24].try_into().ok()?);
    Some((width, height))
}

fn gif_dimensions(bytes: &[u8]) -> Option<(u32, u32)> {
    if bytes.len() < 10 || (&bytes[..6] != b"GIF87a" && &bytes[..6] != b"GIF89a") {
        return None;
    }

    let width = u16::from_le_bytes([bytes[6], bytes[7]]) as u32;
    let height = u16::from_le_bytes([bytes[8], bytes[9]]) as u32;
    Some((width, height))
}

fn jpeg_dimensions(bytes: &[u8]) -> Option<(u32, u32)> {
    if bytes.len() < 4 || bytes[0] != 0xff || bytes[1] != 0xd8 {
        return None;
    }

    let mut offset = 2usize;
    while offset + 9 < bytes.len() {
        if bytes[offset] != 0xff {
            offset += 1;
            continue;
        }

        let marker = bytes[offset + 1];
        // SOF0..SOF15, excluding DHT/DAC/RST markers.
        let is_frame_marker = (0xc0..=0xcf).contains(&marker)
            && marker != 0xc4
            && marker != 0xc8
            && marker != 0xcc;

        if is_frame_marker {
            let height = u16::from_be_bytes([bytes[offset + 5], bytes[offset + 6]]) as u32;
            let width = u16::from_be_bytes([bytes[offset + 7], bytes[offset + 8]]) as u32;
            return Some((width, height));
        }

        let length = u16::from_be_bytes([bytes[offset + 2], bytes[offset + 3]]) as usize;
        if length < 2 {
            return None;
        }
        offset += 2 + length;
    }

    None
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc::TryRecvError;

    use super::*;

    struct StubProber {
        result: Result<(u32, u32), ()>,
    }

    impl ImageProber for StubProber {
        fn probe(&mut self, _url: &str) -> Result<(u32, u32)> {
            self.result.map_err(|_| anyhow!("probe failed"))
        }
    }

    #[test]
    fn request_sends_one_probe_per_url() {
        let (tx, rx) = mpsc::channel();
        let mut cache = ImageRatioCache::new();

        assert_eq!(cache.request("https://img.example/a.png", &tx), None);
        assert_eq!(cache.request("https://img.example/a.png", &tx), None);

        assert!(matches!(
            rx.try_recv(),
            Ok(ImageCommand::ProbeImage { url }) if url == "https://img.example/a.png"
        ));
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));

        cache.resolve("https://img.example/a.png".to_owned(), Some(2.0));
        assert_eq!(cache.request("https://img.example/a.png", &tx), Some(2.0));
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
    }

    #[test]
    fn failed_probe_resolution_is_cached() {
        let (tx, rx) = mpsc::channel();
        let mut cache = ImageRatioCache::new();

        cache.request("https://img.example/broken", &tx);
        assert!(rx.try_recv().is_ok());

        cache.resolve("https://img.example/broken".to_owned(), None);
        assert_eq!(cache.request("https://img.example/broken", &tx), None);
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
    }

    #[test]
    fn distinct_urls_probe_separately() {
        let (tx, rx) = mpsc::channel();
        let mut cache = ImageRatioCache::new();

        cache.request("https://img.example/a.png", &tx);
        cache.request("https://img.example/b.png", &tx);

        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_ok());
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
    }

    #[test]
    fn probe_worker_reports_ratios() {
        let (commands_tx, commands_rx) = mpsc::channel();
        let (events_tx, events_rx) = mpsc::channel();

        commands_tx
            .send(ImageCommand::ProbeImage {
                url: "https://img.example/a.png".to_owned(),
            })
            .unwrap();
        drop(commands_tx);

        prober_main(commands_rx, events_tx, StubProber {
            result: Ok((200, 100)),
        });

        match events_rx.try_recv() {
            Ok(WorkerEvent::ImageProbed { url, ratio }) => {
                assert_eq!(url, "https://img.example/a.png");
                assert_eq!(ratio, Some(2.0));
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn probe_worker_reports_failures_as_none() {
        let (commands_tx, commands_rx) = mpsc::channel();
        let (events_tx, events_rx) = mpsc::channel();

        commands_tx
            .send(ImageCommand::ProbeImage {
                url: "https://img.example/broken".to_owned(),
            })
            .unwrap();
        drop(commands_tx);

        prober_main(commands_rx, events_tx, StubProber { result: Err(()) });

        match events_rx.try_recv() {
            Ok(WorkerEvent::ImageProbed { ratio, .. }) => assert_eq!(ratio, None),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn png_header_parses() {
        let mut bytes = vec![0x89, b'P', b'N', b'G', b'\r', b'\n', 0x1a, b'\n'];
        bytes.extend_from_slice(&13u32.to_be_bytes());
        bytes.extend_from_slice(b"IHDR");
        bytes.extend_from_slice(&640u32.to_be_bytes());
        bytes.extend_from_slice(&480u32.to_be_bytes());

        assert_eq!(image_dimensions(&bytes).unwrap(), (640, 480));
    }

    #[test]
    fn gif_header_parses() {
        let mut bytes = b"GIF89a".to_vec();
        bytes.extend_from_slice(&256u16.to_le_bytes());
        bytes.extend_from_slice(&128u16.to_le_bytes());

        assert_eq!(image_dimensions(&bytes).unwrap(), (256, 128));
    }

    #[test]
    fn jpeg_sof_parses() {
        let mut bytes = vec![0xff, 0xd8];
        bytes.extend_from_slice(&[0xff, 0xe0, 0x00, 0x04, 0x00, 0x00]);
        bytes.extend_from_slice(&[0xff, 0xc0, 0x00, 0x11, 0x08]);
        bytes.extend_from_slice(&300u16.to_be_bytes());
        bytes.extend_from_slice(&200u16.to_be_bytes());
        bytes.extend_from_slice(&[0x03, 0, 0, 0]);

        assert_eq!(image_dimensions(&bytes).unwrap(), (200, 300));
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(image_dimensions(b"plainly not an image").is_err());
    }
}
