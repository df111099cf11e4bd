//! Per-utterance translation pipeline: stage → transcribe → translate →
//! notify → synthesize.

use crate::audio::{StagedAudio, stage, stage_in};
use crate::error::{Result, RelayError};
use crate::notify::EventNotifier;
use crate::pipeline::types::{AudioBuffer, NotificationEvent, SynthesizedFrame, TranslationResult};
use crate::session::SessionStore;
use crate::stt::SpeechToText;
use crate::translate::Translator;
use crate::tts::{FrameStream, TextToSpeech};
use futures_util::Stream;
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;
use tokio::sync::{Mutex, OwnedMutexGuard};

type RunLocks = Arc<parking_lot::Mutex<HashMap<String, Arc<Mutex<()>>>>>;

/// Configuration for the pipeline.
#[derive(Debug, Clone, Default)]
pub struct PipelineConfig {
    /// Voice hint handed to the synthesizer; `None` uses the backend default.
    pub voice: Option<String>,
    /// Parent directory for staged audio; `None` uses the system temp dir.
    pub staging_dir: Option<PathBuf>,
}

/// Where a run currently is. `Failed` is terminal and reachable from any stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    Staged,
    Transcribed,
    Translated,
    Notified,
    Synthesizing,
    Done,
    Failed,
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineStage::Staged => "staged",
            PipelineStage::Transcribed => "transcribed",
            PipelineStage::Translated => "translated",
            PipelineStage::Notified => "notified",
            PipelineStage::Synthesizing => "synthesizing",
            PipelineStage::Done => "done",
            PipelineStage::Failed => "failed",
        };
        f.write_str(name)
    }
}

fn transition(session_id: &str, stage: PipelineStage) {
    tracing::debug!(session = session_id, stage = %stage, "pipeline stage");
}

fn fail(session_id: &str, error: &RelayError) {
    tracing::warn!(
        session = session_id,
        stage = %PipelineStage::Failed,
        error = %error,
        "pipeline run failed"
    );
}

/// Drives one utterance of one session through the providers.
///
/// Runs of the same session are serialized by a per-session lock that the
/// returned frame stream holds until it is exhausted or dropped. Runs of
/// different sessions never wait on each other.
pub struct TranslationPipeline {
    store: Arc<SessionStore>,
    stt: Arc<dyn SpeechToText>,
    translator: Arc<dyn Translator>,
    tts: Arc<dyn TextToSpeech>,
    notifier: EventNotifier,
    config: PipelineConfig,
    run_locks: RunLocks,
}

impl fmt::Debug for TranslationPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TranslationPipeline")
            .field("stt", &self.stt.name())
            .field("translator", &self.translator.name())
            .field("tts", &self.tts.name())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl TranslationPipeline {
    pub fn new(
        store: Arc<SessionStore>,
        stt: Arc<dyn SpeechToText>,
        translator: Arc<dyn Translator>,
        tts: Arc<dyn TextToSpeech>,
        notifier: EventNotifier,
        config: PipelineConfig,
    ) -> Self {
        Self {
            store,
            stt,
            translator,
            tts,
            notifier,
            config,
            run_locks: Arc::new(parking_lot::Mutex::new(HashMap::new())),
        }
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    pub fn notifier(&self) -> &EventNotifier {
        &self.notifier
    }

    /// Process one utterance for `session_id`.
    ///
    /// On success the returned stream yields the synthesized frames in
    /// playback order. Any failure before that point aborts the run: no
    /// frames are produced and the staged audio has already been removed.
    pub async fn run(&self, session_id: &str, audio: AudioBuffer) -> Result<FrameStream> {
        let guard = self.run_lock(session_id).lock_owned().await;
        let lock = SessionLock {
            guard: Some(guard),
            session_id: session_id.to_string(),
            run_locks: self.run_locks.clone(),
        };
        let started = Instant::now();
        let audio_ms = audio.duration_ms();

        match self.run_stages(session_id, audio).await {
            Ok(frames) => Ok(Box::pin(RunFrames {
                inner: frames,
                session_id: session_id.to_string(),
                lock: Some(lock),
                emitted: 0,
                audio_ms,
                started,
            })),
            Err(e) => {
                fail(session_id, &e);
                Err(e)
            }
        }
    }

    /// Drop the run lock kept for `session_id`. A run in flight keeps its own
    /// handle to the lock and finishes normally.
    pub fn forget_session(&self, session_id: &str) {
        self.run_locks.lock().remove(session_id);
    }

    fn run_lock(&self, session_id: &str) -> Arc<Mutex<()>> {
        self.run_locks
            .lock()
            .entry(session_id.to_string())
            .or_default()
            .clone()
    }

    fn stage_audio(&self, audio: &AudioBuffer) -> Result<StagedAudio> {
        match &self.config.staging_dir {
            Some(dir) => stage_in(dir, audio),
            None => stage(audio),
        }
    }

    async fn run_stages(&self, session_id: &str, audio: AudioBuffer) -> Result<FrameStream> {
        let staged = self.stage_audio(&audio)?;
        transition(session_id, PipelineStage::Staged);

        let languages = self.store.get_language_state(session_id);

        self.stt.initialize()?;
        let transcribed = self
            .stt
            .transcribe(&staged, Some(languages.source_language.as_str()))
            .await;
        let released = staged.close();
        let text = transcribed?;
        released?;
        transition(session_id, PipelineStage::Transcribed);
        tracing::debug!(session = session_id, text = %text, "transcription");

        self.translator.initialize()?;
        let translated = self
            .translator
            .translate(
                &text,
                &languages.source_language,
                &languages.target_language,
            )
            .await?;
        transition(session_id, PipelineStage::Translated);

        self.notify(session_id, text, translated.clone());
        transition(session_id, PipelineStage::Notified);

        self.tts.initialize()?;
        let frames = self
            .tts
            .synthesize(
                &translated,
                Some(languages.target_language.as_str()),
                self.config.voice.as_deref(),
            )
            .await?;
        transition(session_id, PipelineStage::Synthesizing);
        Ok(frames)
    }

    /// Delivery problems are logged and never fail the run.
    fn notify(&self, session_id: &str, input_text: String, output_text: String) {
        let result = TranslationResult {
            input_text,
            output_text,
        };
        let event = match NotificationEvent::translation(&result) {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!(session = session_id, error = %e, "failed to build translation event");
                return;
            }
        };
        if !self.notifier.publish(session_id, &event) {
            tracing::debug!(session = session_id, "translation event not delivered");
        }
    }
}

/// A held per-session run lock. Releasing it drops the session's map entry
/// when no other run is waiting, so finished sessions leave nothing behind.
struct SessionLock {
    guard: Option<OwnedMutexGuard<()>>,
    session_id: String,
    run_locks: RunLocks,
}

impl Drop for SessionLock {
    fn drop(&mut self) {
        self.guard = None;
        let mut locks = self.run_locks.lock();
        // Waiters hold their own clone, so a count of one means the map is the last owner.
        if locks
            .get(&self.session_id)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(&self.session_id);
        }
    }
}

/// Frame stream of one run. Holds the session's run lock until exhausted,
/// failed or dropped.
struct RunFrames {
    inner: FrameStream,
    session_id: String,
    lock: Option<SessionLock>,
    emitted: usize,
    audio_ms: u64,
    started: Instant,
}

impl Stream for RunFrames {
    type Item = Result<SynthesizedFrame>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.lock.is_none() {
            return Poll::Ready(None);
        }

        match this.inner.as_mut().poll_next(cx) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(Some(Ok(frame))) => {
                this.emitted += 1;
                Poll::Ready(Some(Ok(frame)))
            }
            Poll::Ready(Some(Err(e))) => {
                fail(&this.session_id, &e);
                this.lock = None;
                Poll::Ready(Some(Err(e)))
            }
            Poll::Ready(None) => {
                tracing::info!(
                    session = %this.session_id,
                    stage = %PipelineStage::Done,
                    frames = this.emitted,
                    audio_ms = this.audio_ms,
                    elapsed_ms = this.started.elapsed().as_millis() as u64,
                    "pipeline run complete"
                );
                this.lock = None;
                Poll::Ready(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::{ChannelRegistry, Outbound, SessionChannel, SideChannel as _};
    use crate::session::SessionLanguageState;
    use crate::stt::MockSpeechToText;
    use crate::translate::MockTranslator;
    use crate::tts::MockTextToSpeech;
    use futures_util::StreamExt;
    use std::time::Duration;

    struct Harness {
        pipeline: TranslationPipeline,
        stt: Arc<MockSpeechToText>,
        translator: Arc<MockTranslator>,
        tts: Arc<MockTextToSpeech>,
        registry: Arc<ChannelRegistry>,
        staging: tempfile::TempDir,
    }

    fn harness(translator: MockTranslator) -> Harness {
        let stt = Arc::new(MockSpeechToText::new().with_response("hello"));
        let translator = Arc::new(translator);
        let tts = Arc::new(MockTextToSpeech::new());
        let registry = Arc::new(ChannelRegistry::new());
        let staging = tempfile::tempdir().unwrap();
        let pipeline = TranslationPipeline::new(
            Arc::new(SessionStore::new()),
            stt.clone(),
            translator.clone(),
            tts.clone(),
            EventNotifier::new(registry.clone()),
            PipelineConfig {
                voice: None,
                staging_dir: Some(staging.path().to_path_buf()),
            },
        );
        Harness {
            pipeline,
            stt,
            translator,
            tts,
            registry,
            staging,
        }
    }

    fn utterance() -> AudioBuffer {
        AudioBuffer::new(16000, vec![0i16; 1600])
    }

    fn staging_is_empty(h: &Harness) -> bool {
        std::fs::read_dir(h.staging.path()).unwrap().next().is_none()
    }

    #[tokio::test]
    async fn full_run_notifies_then_streams_frames() {
        let h = harness(MockTranslator::new());
        let (channel, mut rx) = SessionChannel::new();
        h.registry.register("s1", Arc::new(channel));

        let frames: Vec<_> = h
            .pipeline
            .run("s1", utterance())
            .await
            .unwrap()
            .collect()
            .await;

        let event = match rx.try_recv().unwrap() {
            Outbound::Text(text) => serde_json::from_str::<NotificationEvent>(&text).unwrap(),
            other => panic!("Expected text event, got {:?}", other),
        };
        let payload = event.translation_payload().unwrap();
        assert_eq!(event.event_type, "translation");
        assert_eq!(payload.input_text, "hello");
        assert_eq!(payload.output_text, "hello-en");

        assert_eq!(frames.len(), 2);
        let first = frames[0].as_ref().unwrap();
        let second = frames[1].as_ref().unwrap();
        assert_eq!(first.sample_rate, 24000);
        assert_eq!(second.sample_rate, 24000);
        assert_eq!(first.samples[0], 100);
        assert_eq!(second.samples[0], -100);

        assert_eq!(h.stt.last_hint().as_deref(), Some("ja"));
        assert_eq!(h.tts.last_text().as_deref(), Some("hello-en"));
        assert!(staging_is_empty(&h));
    }

    #[tokio::test]
    async fn session_languages_are_used() {
        let h = harness(MockTranslator::new());
        h.pipeline
            .store()
            .set_language_state(SessionLanguageState::new("s2", "ko", "ja"));

        let frames: Vec<_> = h
            .pipeline
            .run("s2", utterance())
            .await
            .unwrap()
            .collect()
            .await;

        assert_eq!(frames.len(), 2);
        assert_eq!(h.stt.last_hint().as_deref(), Some("ko"));
        assert_eq!(h.tts.last_text().as_deref(), Some("hello-ja"));
    }

    #[tokio::test]
    async fn translator_failure_aborts_without_event_or_frames() {
        let h = harness(MockTranslator::new().with_failure());
        let (channel, mut rx) = SessionChannel::new();
        h.registry.register("s1", Arc::new(channel));

        let result = h.pipeline.run("s1", utterance()).await;

        assert!(matches!(result, Err(RelayError::Translation { .. })));
        assert!(rx.try_recv().is_err());
        assert_eq!(h.tts.calls(), 0);
        assert!(staging_is_empty(&h));
        let staged_path = h.stt.last_path().unwrap();
        assert!(!staged_path.exists());
    }

    #[tokio::test]
    async fn transcription_failure_releases_staged_audio() {
        let stt = Arc::new(MockSpeechToText::new().with_failure());
        let staging = tempfile::tempdir().unwrap();
        let translator = Arc::new(MockTranslator::new());
        let pipeline = TranslationPipeline::new(
            Arc::new(SessionStore::new()),
            stt.clone(),
            translator.clone(),
            Arc::new(MockTextToSpeech::new()),
            EventNotifier::new(Arc::new(ChannelRegistry::new())),
            PipelineConfig {
                voice: None,
                staging_dir: Some(staging.path().to_path_buf()),
            },
        );

        let result = pipeline.run("s1", utterance()).await;
        assert!(matches!(result, Err(RelayError::Transcription { .. })));
        assert_eq!(translator.calls(), 0);
        assert!(std::fs::read_dir(staging.path()).unwrap().next().is_none());
    }

    #[tokio::test]
    async fn closed_side_channel_does_not_stop_synthesis() {
        let h = harness(MockTranslator::new());
        let (channel, _rx) = SessionChannel::new();
        channel.close().unwrap();
        h.registry.register("s1", Arc::new(channel));

        let frames: Vec<_> = h
            .pipeline
            .run("s1", utterance())
            .await
            .unwrap()
            .collect()
            .await;
        assert_eq!(frames.len(), 2);
        assert_eq!(h.translator.calls(), 1);
    }

    #[tokio::test]
    async fn synthesis_failure_is_reported() {
        let staging = tempfile::tempdir().unwrap();
        let pipeline = TranslationPipeline::new(
            Arc::new(SessionStore::new()),
            Arc::new(MockSpeechToText::new()),
            Arc::new(MockTranslator::new()),
            Arc::new(MockTextToSpeech::new().with_failure()),
            EventNotifier::new(Arc::new(ChannelRegistry::new())),
            PipelineConfig {
                voice: Some("voice-x".to_string()),
                staging_dir: Some(staging.path().to_path_buf()),
            },
        );

        assert!(matches!(
            pipeline.run("s1", utterance()).await,
            Err(RelayError::Synthesis { .. })
        ));
    }

    #[tokio::test]
    async fn voice_hint_is_passed_through() {
        let tts = Arc::new(MockTextToSpeech::new());
        let pipeline = TranslationPipeline::new(
            Arc::new(SessionStore::new()),
            Arc::new(MockSpeechToText::new()),
            Arc::new(MockTranslator::new()),
            tts.clone(),
            EventNotifier::new(Arc::new(ChannelRegistry::new())),
            PipelineConfig {
                voice: Some("voice-x".to_string()),
                staging_dir: None,
            },
        );

        let frames = pipeline.run("s1", utterance()).await.unwrap();
        assert_eq!(frames.count().await, 2);
        assert_eq!(tts.last_voice().as_deref(), Some("voice-x"));
    }

    #[tokio::test]
    async fn runs_of_one_session_are_serialized() {
        let h = harness(MockTranslator::new());

        let held = h.pipeline.run("s1", utterance()).await.unwrap();

        let blocked =
            tokio::time::timeout(Duration::from_millis(50), h.pipeline.run("s1", utterance()))
                .await;
        assert!(blocked.is_err(), "second run must wait for the first stream");

        let other = tokio::time::timeout(Duration::from_secs(5), h.pipeline.run("s2", utterance()))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(other.count().await, 2);

        assert_eq!(held.count().await, 2);
        let next = tokio::time::timeout(Duration::from_secs(5), h.pipeline.run("s1", utterance()))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(next.count().await, 2);
    }

    #[tokio::test]
    async fn finished_sessions_leave_no_run_locks() {
        let h = harness(MockTranslator::new());
        for i in 0..50 {
            let frames = h.pipeline.run(&format!("sess-{}", i), utterance()).await.unwrap();
            assert_eq!(frames.count().await, 2);
        }
        assert!(h.pipeline.run_locks.lock().is_empty());
    }

    #[tokio::test]
    async fn failed_and_abandoned_runs_leave_no_run_locks() {
        let h = harness(MockTranslator::new().with_failure());
        assert!(h.pipeline.run("failed", utterance()).await.is_err());
        assert!(h.pipeline.run_locks.lock().is_empty());

        let h = harness(MockTranslator::new());
        let frames = h.pipeline.run("abandoned", utterance()).await.unwrap();
        assert_eq!(h.pipeline.run_locks.lock().len(), 1);
        drop(frames);
        assert!(h.pipeline.run_locks.lock().is_empty());
    }

    #[tokio::test]
    async fn forget_session_drops_run_lock() {
        let h = harness(MockTranslator::new());
        let frames = h.pipeline.run("s1", utterance()).await.unwrap();
        assert_eq!(h.pipeline.run_locks.lock().len(), 1);

        h.pipeline.forget_session("s1");
        assert!(h.pipeline.run_locks.lock().is_empty());

        assert_eq!(frames.count().await, 2);
        assert!(h.pipeline.run_locks.lock().is_empty());
    }

    #[tokio::test]
    async fn staging_failure_aborts_before_providers() {
        let stt = Arc::new(MockSpeechToText::new());
        let translator = Arc::new(MockTranslator::new());
        let tts = Arc::new(MockTextToSpeech::new());
        let parent = tempfile::tempdir().unwrap();
        let pipeline = TranslationPipeline::new(
            Arc::new(SessionStore::new()),
            stt.clone(),
            translator.clone(),
            tts.clone(),
            EventNotifier::new(Arc::new(ChannelRegistry::new())),
            PipelineConfig {
                voice: None,
                staging_dir: Some(parent.path().join("missing")),
            },
        );

        let result = pipeline.run("s1", utterance()).await;

        assert!(matches!(result, Err(RelayError::Io(_))));
        assert_eq!(stt.calls(), 0);
        assert_eq!(translator.calls(), 0);
        assert_eq!(tts.calls(), 0);
        assert!(pipeline.run_locks.lock().is_empty());
    }

    /// Removes the staged directory behind the pipeline's back.
    struct DirRemovingStt;

    #[async_trait::async_trait]
    impl SpeechToText for DirRemovingStt {
        fn initialize(&self) -> Result<()> {
            Ok(())
        }

        async fn transcribe(&self, audio: &StagedAudio, _hint: Option<&str>) -> Result<String> {
            let dir = audio.path().parent().unwrap();
            std::fs::remove_dir_all(dir).unwrap();
            Ok("hello".to_string())
        }

        fn name(&self) -> &str {
            "dir-removing-stt"
        }
    }

    #[tokio::test]
    async fn staged_release_failure_fails_run() {
        let translator = Arc::new(MockTranslator::new());
        let staging = tempfile::tempdir().unwrap();
        let pipeline = TranslationPipeline::new(
            Arc::new(SessionStore::new()),
            Arc::new(DirRemovingStt),
            translator.clone(),
            Arc::new(MockTextToSpeech::new()),
            EventNotifier::new(Arc::new(ChannelRegistry::new())),
            PipelineConfig {
                voice: None,
                staging_dir: Some(staging.path().to_path_buf()),
            },
        );

        let result = pipeline.run("s1", utterance()).await;

        assert!(matches!(result, Err(RelayError::Staging { .. })));
        assert_eq!(translator.calls(), 0);
    }

    /// Blocks transcription for one source language until a permit is added.
    struct GatedStt {
        gated_language: &'static str,
        gate: Arc<tokio::sync::Semaphore>,
    }

    #[async_trait::async_trait]
    impl SpeechToText for GatedStt {
        fn initialize(&self) -> Result<()> {
            Ok(())
        }

        async fn transcribe(&self, _audio: &StagedAudio, hint: Option<&str>) -> Result<String> {
            if hint == Some(self.gated_language) {
                self.gate.acquire().await.unwrap().forget();
            }
            Ok("hello".to_string())
        }

        fn name(&self) -> &str {
            "gated-stt"
        }
    }

    #[tokio::test]
    async fn blocked_provider_call_does_not_stall_other_sessions() {
        let gate = Arc::new(tokio::sync::Semaphore::new(0));
        let staging = tempfile::tempdir().unwrap();
        let store = Arc::new(SessionStore::new());
        store.set_language_state(SessionLanguageState::new("slow", "ko", "en"));
        let pipeline = Arc::new(TranslationPipeline::new(
            store,
            Arc::new(GatedStt {
                gated_language: "ko",
                gate: gate.clone(),
            }),
            Arc::new(MockTranslator::new()),
            Arc::new(MockTextToSpeech::new()),
            EventNotifier::new(Arc::new(ChannelRegistry::new())),
            PipelineConfig {
                voice: None,
                staging_dir: Some(staging.path().to_path_buf()),
            },
        ));

        let slow = {
            let pipeline = pipeline.clone();
            tokio::spawn(async move {
                let frames = pipeline.run("slow", utterance()).await?;
                Ok::<usize, RelayError>(frames.count().await)
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        let fast = tokio::time::timeout(Duration::from_secs(5), pipeline.run("fast", utterance()))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(fast.count().await, 2);
        assert!(!slow.is_finished());

        let queued =
            tokio::time::timeout(Duration::from_millis(50), pipeline.run("slow", utterance()))
                .await;
        assert!(queued.is_err(), "second run of the blocked session must wait");

        gate.add_permits(1);
        let emitted = tokio::time::timeout(Duration::from_secs(5), slow)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(emitted, 2);
        assert!(pipeline.run_locks.lock().is_empty());
    }

    #[test]
    fn stage_names() {
        assert_eq!(PipelineStage::Staged.to_string(), "staged");
        assert_eq!(PipelineStage::Synthesizing.to_string(), "synthesizing");
        assert_eq!(PipelineStage::Failed.to_string(), "failed");
    }
}
