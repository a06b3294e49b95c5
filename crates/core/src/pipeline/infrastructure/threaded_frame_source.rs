use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use crossbeam_channel::{Receiver, Sender, TrySendError};

use crate::shared::frame::Frame;
use crate::shared::video_metadata::VideoMetadata;
use crate::video::domain::video_reader::VideoReader;

const DEFAULT_CHANNEL_CAPACITY: usize = 8;

type SendError = Box<dyn std::error::Error + Send + Sync>;
type FrameResult = Result<Frame, SendError>;

/// What the decode thread does when the consumer falls behind.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameDropPolicy {
    /// Hold only the newest undelivered frame; older ones are discarded.
    KeepLatest,
    /// Wait for the consumer; every frame is delivered in order.
    Block,
}

/// Decodes on a background thread and hands frames over a channel.
///
/// Layout: `reader thread → channel → frames()`
pub struct ThreadedFrameSource {
    reader: Option<Box<dyn VideoReader>>,
    policy: FrameDropPolicy,
    capacity: usize,
    frame_rx: Option<Receiver<FrameResult>>,
    worker: Option<JoinHandle<Box<dyn VideoReader>>>,
    stop: Arc<AtomicBool>,
}

impl ThreadedFrameSource {
    pub fn new(reader: Box<dyn VideoReader>, policy: FrameDropPolicy) -> Self {
        Self {
            reader: Some(reader),
            policy,
            capacity: DEFAULT_CHANNEL_CAPACITY,
            frame_rx: None,
            worker: None,
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn policy(&self) -> FrameDropPolicy {
        self.policy
    }
}

impl VideoReader for ThreadedFrameSource {
    fn open(&mut self, path: &Path) -> Result<VideoMetadata, Box<dyn std::error::Error>> {
        let mut reader = self
            .reader
            .take()
            .ok_or("ThreadedFrameSource: already started")?;
        let metadata = match reader.open(path) {
            Ok(m) => m,
            Err(e) => {
                self.reader = Some(reader);
                return Err(e);
            }
        };

        let cap = match self.policy {
            FrameDropPolicy::KeepLatest => 1,
            FrameDropPolicy::Block => self.capacity,
        };
        let (frame_tx, frame_rx) = crossbeam_channel::bounded::<FrameResult>(cap);

        // Only KeepLatest needs a second receiver; holding one in Block mode
        // would stop the sender from noticing that the consumer went away.
        let drain_rx = (self.policy == FrameDropPolicy::KeepLatest).then(|| frame_rx.clone());

        self.stop.store(false, Ordering::Relaxed);
        self.worker = Some(spawn_reader(reader, frame_tx, drain_rx, self.stop.clone()));
        self.frame_rx = Some(frame_rx);

        log::debug!("Decode thread started ({:?})", self.policy);
        Ok(metadata)
    }

    fn frames(
        &mut self,
    ) -> Box<dyn Iterator<Item = Result<Frame, Box<dyn std::error::Error>>> + '_> {
        let Some(rx) = self.frame_rx.as_ref() else {
            return Box::new(std::iter::once(Err(
                "ThreadedFrameSource: not opened".into()
            )));
        };
        Box::new(
            rx.iter()
                .map(|r| r.map_err(|e| -> Box<dyn std::error::Error> { e.to_string().into() })),
        )
    }

    fn close(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        self.frame_rx = None;
        if let Some(handle) = self.worker.take() {
            match handle.join() {
                Ok(mut reader) => {
                    reader.close();
                    self.reader = Some(reader);
                }
                Err(_) => log::error!("Decode thread panicked"),
            }
        }
    }
}

impl Drop for ThreadedFrameSource {
    fn drop(&mut self) {
        self.close();
    }
}

fn spawn_reader(
    mut reader: Box<dyn VideoReader>,
    frame_tx: Sender<FrameResult>,
    drain_rx: Option<Receiver<FrameResult>>,
    stop: Arc<AtomicBool>,
) -> JoinHandle<Box<dyn VideoReader>> {
    std::thread::spawn(move || {
        let mut dropped = 0usize;
        for frame_result in reader.frames() {
            if stop.load(Ordering::Relaxed) {
                break;
            }
            let mapped = frame_result.map_err(|e| -> SendError { e.to_string().into() });
            let delivered = match &drain_rx {
                None => frame_tx.send(mapped).is_ok(),
                Some(drain) => send_replacing(&frame_tx, drain, mapped, &mut dropped),
            };
            if !delivered {
                break;
            }
        }
        if dropped > 0 {
            log::debug!("Decode thread dropped {dropped} stale frames");
        }
        reader
    })
}

/// Pushes `item`, evicting whatever is still waiting in the channel.
fn send_replacing(
    tx: &Sender<FrameResult>,
    drain_rx: &Receiver<FrameResult>,
    mut item: FrameResult,
    dropped: &mut usize,
) -> bool {
    loop {
        match tx.try_send(item) {
            Ok(()) => return true,
            Err(TrySendError::Full(back)) => {
                if drain_rx.try_recv().is_ok() {
                    *dropped += 1;
                }
                item = back;
            }
            Err(TrySendError::Disconnected(_)) => return false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::{Duration, Instant};

    struct StubReader {
        count: Option<usize>,
        fail_at: Option<usize>,
        exhausted: Arc<AtomicBool>,
        closed: Arc<Mutex<bool>>,
    }

    impl StubReader {
        fn finite(count: usize) -> Self {
            Self {
                count: Some(count),
                fail_at: None,
                exhausted: Arc::new(AtomicBool::new(false)),
                closed: Arc::new(Mutex::new(false)),
            }
        }

        fn endless() -> Self {
            Self {
                count: None,
                ..Self::finite(0)
            }
        }
    }

    impl VideoReader for StubReader {
        fn open(&mut self, path: &Path) -> Result<VideoMetadata, Box<dyn std::error::Error>> {
            if path == Path::new("missing") {
                return Err("no such source".into());
            }
            Ok(VideoMetadata {
                width: 4,
                height: 4,
                fps: 30.0,
                total_frames: self.count.unwrap_or(0),
                codec: String::new(),
                source_path: None,
                is_live: self.count.is_none(),
            })
        }

        fn frames(
            &mut self,
        ) -> Box<dyn Iterator<Item = Result<Frame, Box<dyn std::error::Error>>> + '_> {
            let count = self.count;
            let fail_at = self.fail_at;
            let exhausted = self.exhausted.clone();
            let mut i = 0;
            Box::new(std::iter::from_fn(move || {
                if count.is_some_and(|c| i >= c) {
                    exhausted.store(true, Ordering::SeqCst);
                    return None;
                }
                let idx = i;
                i += 1;
                if fail_at == Some(idx) {
                    return Some(Err("corrupt packet".into()));
                }
                Some(Ok(Frame::new(vec![0; 48], 4, 4, 3, idx)))
            }))
        }

        fn close(&mut self) {
            *self.closed.lock().unwrap() = true;
        }
    }

    #[test]
    fn test_block_delivers_every_frame_in_order() {
        let mut source =
            ThreadedFrameSource::new(Box::new(StubReader::finite(40)), FrameDropPolicy::Block);
        let meta = source.open(Path::new("video")).unwrap();
        assert_eq!(meta.total_frames, 40);

        let indices: Vec<usize> = source.frames().map(|f| f.unwrap().index()).collect();
        assert_eq!(indices, (0..40).collect::<Vec<_>>());
    }

    #[test]
    fn test_keep_latest_discards_stale_frames() {
        let reader = StubReader::finite(50);
        let exhausted = reader.exhausted.clone();
        let mut source = ThreadedFrameSource::new(Box::new(reader), FrameDropPolicy::KeepLatest);
        source.open(Path::new("camera")).unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        while !exhausted.load(Ordering::SeqCst) {
            assert!(Instant::now() < deadline, "producer never finished");
            std::thread::sleep(Duration::from_millis(1));
        }

        let indices: Vec<usize> = source.frames().map(|f| f.unwrap().index()).collect();
        assert_eq!(indices, vec![49]);
    }

    #[test]
    fn test_reader_errors_are_forwarded() {
        let mut reader = StubReader::finite(5);
        reader.fail_at = Some(2);
        let mut source = ThreadedFrameSource::new(Box::new(reader), FrameDropPolicy::Block);
        source.open(Path::new("video")).unwrap();

        let results: Vec<_> = source.frames().collect();
        assert_eq!(results.len(), 5);
        assert!(results[2].is_err());
        assert!(results[3].is_ok());
    }

    #[test]
    fn test_open_failure_is_returned() {
        let mut source =
            ThreadedFrameSource::new(Box::new(StubReader::finite(1)), FrameDropPolicy::Block);
        assert!(source.open(Path::new("missing")).is_err());
        // The reader is kept, so a retry can succeed
        assert!(source.open(Path::new("video")).is_ok());
    }

    #[test]
    fn test_frames_before_open_is_error() {
        let mut source =
            ThreadedFrameSource::new(Box::new(StubReader::finite(1)), FrameDropPolicy::Block);
        assert!(source.frames().next().unwrap().is_err());
    }

    #[rstest::rstest]
    #[case::block(FrameDropPolicy::Block)]
    #[case::keep_latest(FrameDropPolicy::KeepLatest)]
    fn test_close_stops_endless_source(#[case] policy: FrameDropPolicy) {
        let reader = StubReader::endless();
        let closed = reader.closed.clone();
        let mut source = ThreadedFrameSource::new(Box::new(reader), policy);
        let meta = source.open(Path::new("camera")).unwrap();
        assert!(meta.is_live);

        let taken: Vec<_> = source.frames().take(3).collect();
        assert_eq!(taken.len(), 3);

        source.close();
        assert!(*closed.lock().unwrap());
    }

    #[test]
    fn test_close_is_idempotent() {
        let mut source =
            ThreadedFrameSource::new(Box::new(StubReader::finite(2)), FrameDropPolicy::Block);
        source.open(Path::new("video")).unwrap();
        source.close();
        source.close();
    }
}
