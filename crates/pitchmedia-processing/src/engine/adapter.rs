//! Engine lifecycle state machine.
//!
//! `Uninitialized -> Initializing -> Ready`, with failed loads resetting fully
//! to `Uninitialized` so a later call can retry from scratch. Initialization
//! is single-flight: concurrent callers share one in-flight load and all
//! observe its outcome. Conversions serialize on the single engine instance.

use std::sync::{Arc, Mutex};

use bytes::Bytes;
use tokio::sync::{watch, Mutex as AsyncMutex};

use pitchmedia_core::{ConversionPhase, ConversionProgress, EngineSource, MediaProbe};

use super::{
    ConversionProgressFn, EngineError, EngineLoader, EngineProgressFn, TranscodeSpec, Transcoder,
};

/// Outcome of an in-flight load, broadcast to waiters. `None` while loading.
type InitOutcome = Option<Result<(), EngineError>>;

enum EngineState {
    Uninitialized,
    Initializing(watch::Receiver<InitOutcome>),
    Ready(Arc<dyn Transcoder>),
}

/// Process-wide transcoding engine adapter. Lazily initialized on first use;
/// `cleanup` tears the instance down and is valid in every state.
pub struct TranscodeEngine {
    loader: Arc<dyn EngineLoader>,
    sources: Vec<EngineSource>,
    state: Mutex<EngineState>,
    convert_gate: AsyncMutex<()>,
}

enum Role {
    AlreadyReady,
    Waiter(watch::Receiver<InitOutcome>),
    Leader(watch::Sender<InitOutcome>),
}

impl TranscodeEngine {
    pub fn new(loader: Arc<dyn EngineLoader>, sources: Vec<EngineSource>) -> Self {
        Self {
            loader,
            sources,
            state: Mutex::new(EngineState::Uninitialized),
            convert_gate: AsyncMutex::new(()),
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(
            &*self.state.lock().expect("engine state poisoned"),
            EngineState::Ready(_)
        )
    }

    fn transcoder(&self) -> Option<Arc<dyn Transcoder>> {
        match &*self.state.lock().expect("engine state poisoned") {
            EngineState::Ready(t) => Some(t.clone()),
            _ => None,
        }
    }

    /// Initialize the engine if it is not already `Ready`.
    ///
    /// The first caller becomes the leader and walks the source list; every
    /// concurrent caller awaits the same load and receives its outcome. A
    /// failed load leaves the state `Uninitialized`.
    pub async fn initialize(&self) -> Result<(), EngineError> {
        let role = {
            let mut state = self.state.lock().expect("engine state poisoned");
            match &*state {
                EngineState::Ready(_) => Role::AlreadyReady,
                EngineState::Initializing(rx) => Role::Waiter(rx.clone()),
                EngineState::Uninitialized => {
                    let (tx, rx) = watch::channel(None);
                    *state = EngineState::Initializing(rx);
                    Role::Leader(tx)
                }
            }
        };

        match role {
            Role::AlreadyReady => Ok(()),
            Role::Waiter(mut rx) => match rx.wait_for(|outcome| outcome.is_some()).await {
                Ok(outcome) => outcome.clone().unwrap_or(Err(EngineError::Interrupted)),
                // Leader dropped mid-load (cancelled); its guard has reset
                // the state, so a fresh call can retry.
                Err(_) => Err(EngineError::Interrupted),
            },
            Role::Leader(tx) => {
                let guard = InitGuard {
                    state: &self.state,
                    armed: true,
                };
                let result = self.load_from_sources().await;
                let outcome = {
                    let mut state = self.state.lock().expect("engine state poisoned");
                    match result {
                        Ok(transcoder) => {
                            *state = EngineState::Ready(transcoder);
                            Ok(())
                        }
                        Err(e) => {
                            *state = EngineState::Uninitialized;
                            Err(e)
                        }
                    }
                };
                guard.disarm();
                let _ = tx.send(Some(outcome.clone()));
                outcome
            }
        }
    }

    async fn load_from_sources(&self) -> Result<Arc<dyn Transcoder>, EngineError> {
        if self.sources.is_empty() {
            tracing::error!("no engine sources configured");
            return Err(EngineError::Unavailable);
        }
        for source in &self.sources {
            match self.loader.load(source).await {
                Ok(transcoder) => {
                    tracing::info!(source = %source.describe(), "transcoding engine initialized");
                    return Ok(transcoder);
                }
                Err(e) => {
                    tracing::warn!(
                        source = %source.describe(),
                        error = %e,
                        "engine source failed, trying next"
                    );
                }
            }
        }
        tracing::error!(sources = self.sources.len(), "all engine sources failed");
        Err(EngineError::Unavailable)
    }

    /// Convert `input` to the normalized format, initializing the engine on
    /// demand. Engine-internal progress maps to the 0-95 range of the
    /// `converting` phase; the tail is reserved for read-back and cleanup.
    ///
    /// Any conversion failure is re-raised as a single normalized error; the
    /// underlying engine detail is logged, never surfaced.
    pub async fn convert(
        &self,
        input: Bytes,
        input_name: &str,
        spec: &TranscodeSpec,
        on_progress: ConversionProgressFn,
    ) -> Result<Bytes, EngineError> {
        on_progress(ConversionProgress::new(
            ConversionPhase::Loading,
            0,
            "Loading video converter",
        ));
        self.initialize().await?;
        on_progress(ConversionProgress::new(
            ConversionPhase::Loading,
            100,
            "Converter ready",
        ));

        // One conversion at a time per engine instance.
        let _gate = self.convert_gate.lock().await;

        let transcoder = match self.transcoder() {
            Some(t) => t,
            None => {
                // cleanup() ran between initialize and acquiring the gate.
                self.initialize().await?;
                self.transcoder().ok_or(EngineError::Unavailable)?
            }
        };

        on_progress(ConversionProgress::new(
            ConversionPhase::Analyzing,
            0,
            "Analyzing video",
        ));

        let engine_progress: EngineProgressFn = {
            let on_progress = on_progress.clone();
            Arc::new(move |ratio: f32| {
                let capped = (ratio.clamp(0.0, 1.0) * 95.0).round() as u8;
                on_progress(ConversionProgress::new(
                    ConversionPhase::Converting,
                    capped,
                    "Converting video",
                ));
            })
        };

        let output = transcoder
            .transcode(input, input_name, spec, engine_progress)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, file = %input_name, "conversion failed");
                EngineError::ConversionFailed
            })?;

        on_progress(ConversionProgress::new(
            ConversionPhase::Complete,
            100,
            "Conversion complete",
        ));
        Ok(output)
    }

    /// Decode one frame at `offset_secs`, initializing the engine on demand.
    pub async fn extract_frame(
        &self,
        input: Bytes,
        offset_secs: f64,
    ) -> Result<Bytes, EngineError> {
        self.initialize().await?;
        let transcoder = self.transcoder().ok_or(EngineError::Unavailable)?;
        transcoder.extract_frame(input, offset_secs).await
    }

    /// Parse stream information, initializing the engine on demand.
    pub async fn probe(&self, input: Bytes) -> Result<MediaProbe, EngineError> {
        self.initialize().await?;
        let transcoder = self.transcoder().ok_or(EngineError::Unavailable)?;
        transcoder.probe(input).await
    }

    /// Explicit teardown: drops the engine instance and resets the state to
    /// `Uninitialized`. Callable in every state.
    pub fn cleanup(&self) {
        let mut state = self.state.lock().expect("engine state poisoned");
        if matches!(&*state, EngineState::Initializing(_)) {
            tracing::debug!("cleanup during initialization; state reset");
        }
        *state = EngineState::Uninitialized;
    }
}

/// Resets `Initializing` back to `Uninitialized` if the leader future is
/// dropped before recording an outcome.
struct InitGuard<'a> {
    state: &'a Mutex<EngineState>,
    armed: bool,
}

impl InitGuard<'_> {
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for InitGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            let mut state = self.state.lock().expect("engine state poisoned");
            if matches!(&*state, EngineState::Initializing(_)) {
                *state = EngineState::Uninitialized;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct StubTranscoder;

    #[async_trait]
    impl Transcoder for StubTranscoder {
        async fn transcode(
            &self,
            _input: Bytes,
            _input_name: &str,
            _spec: &TranscodeSpec,
            on_progress: EngineProgressFn,
        ) -> Result<Bytes, EngineError> {
            for ratio in [0.25, 0.5, 1.0] {
                on_progress(ratio);
            }
            Ok(Bytes::from_static(b"normalized"))
        }

        async fn extract_frame(
            &self,
            _input: Bytes,
            _offset_secs: f64,
        ) -> Result<Bytes, EngineError> {
            Ok(Bytes::from_static(b"frame"))
        }

        async fn probe(&self, _input: Bytes) -> Result<MediaProbe, EngineError> {
            Ok(MediaProbe {
                duration_secs: 10.0,
                width: 720,
                height: 1280,
            })
        }
    }

    struct ScriptedLoader {
        loads: AtomicUsize,
        delay: Duration,
        fail_remote: bool,
        fail_all: bool,
    }

    impl ScriptedLoader {
        fn new() -> Self {
            Self {
                loads: AtomicUsize::new(0),
                delay: Duration::from_millis(50),
                fail_remote: false,
                fail_all: false,
            }
        }
    }

    #[async_trait]
    impl EngineLoader for ScriptedLoader {
        async fn load(&self, source: &EngineSource) -> Result<Arc<dyn Transcoder>, EngineError> {
            tokio::time::sleep(self.delay).await;
            self.loads.fetch_add(1, Ordering::SeqCst);
            let failed = self.fail_all
                || (self.fail_remote && matches!(source, EngineSource::Remote(_)));
            if failed {
                Err(EngineError::Source {
                    origin: source.describe(),
                    reason: "scripted failure".to_string(),
                })
            } else {
                Ok(Arc::new(StubTranscoder))
            }
        }
    }

    fn sources() -> Vec<EngineSource> {
        vec![
            EngineSource::Remote("https://mirror-a.example.com/ffmpeg".to_string()),
            EngineSource::Remote("https://mirror-b.example.com/ffmpeg".to_string()),
            EngineSource::Local(PathBuf::from("/usr/bin/ffmpeg")),
        ]
    }

    fn engine(loader: ScriptedLoader) -> (Arc<TranscodeEngine>, Arc<ScriptedLoader>) {
        let loader = Arc::new(loader);
        (
            Arc::new(TranscodeEngine::new(loader.clone(), sources())),
            loader,
        )
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_initialize_is_single_flight() {
        let (engine, loader) = engine(ScriptedLoader::new());

        let (a, b) = tokio::join!(engine.initialize(), engine.initialize());
        assert!(a.is_ok() && b.is_ok());
        assert_eq!(loader.loads.load(Ordering::SeqCst), 1);
        assert!(engine.is_ready());

        // Further calls are no-ops once Ready.
        engine.initialize().await.unwrap();
        assert_eq!(loader.loads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn waiters_observe_the_leaders_failure() {
        let (engine, loader) = engine(ScriptedLoader {
            fail_all: true,
            ..ScriptedLoader::new()
        });

        let (a, b) = tokio::join!(engine.initialize(), engine.initialize());
        assert!(matches!(a, Err(EngineError::Unavailable)));
        assert!(matches!(b, Err(EngineError::Unavailable)));
        // One load sequence over the whole source list, not two.
        assert_eq!(loader.loads.load(Ordering::SeqCst), sources().len());
        assert!(!engine.is_ready());
    }

    #[tokio::test(start_paused = true)]
    async fn failed_load_resets_and_allows_fresh_retry() {
        let (engine, loader) = engine(ScriptedLoader {
            fail_all: true,
            ..ScriptedLoader::new()
        });

        assert!(engine.initialize().await.is_err());
        assert!(!engine.is_ready());
        assert_eq!(loader.loads.load(Ordering::SeqCst), sources().len());

        // A subsequent call starts a brand new load sequence.
        assert!(engine.initialize().await.is_err());
        assert_eq!(loader.loads.load(Ordering::SeqCst), 2 * sources().len());
    }

    #[tokio::test(start_paused = true)]
    async fn falls_back_to_next_source() {
        let (engine, loader) = engine(ScriptedLoader {
            fail_remote: true,
            ..ScriptedLoader::new()
        });

        engine.initialize().await.unwrap();
        assert!(engine.is_ready());
        // Both remote mirrors attempted, local fallback won.
        assert_eq!(loader.loads.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn cleanup_is_valid_in_every_state() {
        let (engine, _loader) = engine(ScriptedLoader::new());

        engine.cleanup(); // Uninitialized
        assert!(!engine.is_ready());

        engine.initialize().await.unwrap();
        engine.cleanup(); // Ready
        assert!(!engine.is_ready());

        // Lazy re-initialization still works after teardown.
        engine.initialize().await.unwrap();
        assert!(engine.is_ready());
    }

    #[tokio::test(start_paused = true)]
    async fn convert_is_lazy_and_caps_engine_progress() {
        let (engine, loader) = engine(ScriptedLoader::new());
        assert!(!engine.is_ready());

        let seen: Arc<Mutex<Vec<ConversionProgress>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let on_progress: ConversionProgressFn =
            Arc::new(move |p| sink.lock().unwrap().push(p));

        let out = engine
            .convert(
                Bytes::from_static(b"raw"),
                "clip.mkv",
                &TranscodeSpec::default(),
                on_progress,
            )
            .await
            .unwrap();
        assert_eq!(&out[..], b"normalized");
        assert_eq!(loader.loads.load(Ordering::SeqCst), 1);

        let seen = seen.lock().unwrap();
        let converting: Vec<u8> = seen
            .iter()
            .filter(|p| p.phase == ConversionPhase::Converting)
            .map(|p| p.progress)
            .collect();
        assert_eq!(converting, vec![24, 48, 95], "engine signal capped at 95");
        assert_eq!(seen.first().unwrap().phase, ConversionPhase::Loading);
        let last = seen.last().unwrap();
        assert_eq!((last.phase, last.progress), (ConversionPhase::Complete, 100));
    }

    #[tokio::test(start_paused = true)]
    async fn conversion_failure_is_normalized() {
        struct FailingTranscoder;

        #[async_trait]
        impl Transcoder for FailingTranscoder {
            async fn transcode(
                &self,
                _input: Bytes,
                _input_name: &str,
                _spec: &TranscodeSpec,
                _on_progress: EngineProgressFn,
            ) -> Result<Bytes, EngineError> {
                Err(EngineError::Execution("demuxer blew up".to_string()))
            }
            async fn extract_frame(
                &self,
                _input: Bytes,
                _offset_secs: f64,
            ) -> Result<Bytes, EngineError> {
                Err(EngineError::Execution("no frame".to_string()))
            }
            async fn probe(&self, _input: Bytes) -> Result<MediaProbe, EngineError> {
                Err(EngineError::Probe("no streams".to_string()))
            }
        }

        struct FailingLoader;

        #[async_trait]
        impl EngineLoader for FailingLoader {
            async fn load(
                &self,
                _source: &EngineSource,
            ) -> Result<Arc<dyn Transcoder>, EngineError> {
                Ok(Arc::new(FailingTranscoder))
            }
        }

        let engine = TranscodeEngine::new(Arc::new(FailingLoader), sources());
        let on_progress: ConversionProgressFn = Arc::new(|_| {});
        let err = engine
            .convert(
                Bytes::from_static(b"raw"),
                "clip.mkv",
                &TranscodeSpec::default(),
                on_progress,
            )
            .await
            .unwrap_err();
        // Internal detail is replaced by the single user-facing error class.
        assert!(matches!(err, EngineError::ConversionFailed));
    }
}
