//! Stream session lifecycle.

use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::task::{Context, Poll};
use std::time::Duration;

use futures_core::Stream;
use futures_util::StreamExt;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use crate::auth::AuthContinuity;
use crate::error::{Error, StreamError, TransportError};
use crate::frame::{Frame, FrameDecoder, FrameKind};
use crate::traits::Transport;
use crate::types::ChatRequest;
use crate::Result;

use super::{ClosurePolicy, FrameHandler, StreamConfig, StreamReply};

/// Lifecycle of one streaming exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Active,
    Cancelled,
    Completed,
    Failed,
}

impl SessionState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Cancelled | Self::Completed | Self::Failed)
    }
}

/// Opens streaming chat exchanges.
///
/// Opening the channel goes through [`AuthContinuity`], so a stream whose
/// token has expired is transparently reopened once after a refresh.
#[derive(Clone)]
pub struct StreamSession {
    transport: Arc<dyn Transport>,
    auth: AuthContinuity,
    config: StreamConfig,
}

impl StreamSession {
    pub fn new(transport: Arc<dyn Transport>, auth: AuthContinuity) -> Self {
        Self::with_config(transport, auth, StreamConfig::default())
    }

    pub fn with_config(
        transport: Arc<dyn Transport>,
        auth: AuthContinuity,
        config: StreamConfig,
    ) -> Self {
        Self {
            transport,
            auth,
            config,
        }
    }

    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    /// Stream the reply to `request` as frames.
    ///
    /// The stream yields `Message` frames in arrival order and ends after a
    /// `Done` frame. An error frame, a transport failure, an idle timeout or a
    /// truncated channel end the stream with a single `Err`. The idle timeout
    /// also bounds each attempt to open the channel. Nothing is sent
    /// until the stream is first polled; dropping it releases the connection.
    pub fn frames(&self, request: &ChatRequest) -> FrameStream {
        let transport = Arc::clone(&self.transport);
        let auth = self.auth.clone();
        let config = self.config.clone();
        let request = request.streaming();

        FrameStream::new(async_stream::stream! {
            if let Err(err) = request.validate() {
                yield Err(err);
                return;
            }

            debug!(bot_id = %request.bot_id, conversation_id = ?request.conversation_id, "Opening chat stream");

            let opened = {
                let transport = &transport;
                let request = &request;
                let idle = config.idle_timeout;
                auth.execute(move |token| async move {
                    match idle {
                        Some(limit) => tokio::time::timeout(limit, transport.open(request, &token))
                            .await
                            .unwrap_or_else(|_| Err(idle_timeout(limit))),
                        None => transport.open(request, &token).await,
                    }
                })
                .await
            };
            let mut fragments = match opened {
                Ok(fragments) => fragments,
                Err(err) => {
                    warn!(error = %err, "Failed to open chat stream");
                    yield Err(err);
                    return;
                }
            };

            let mut decoder = FrameDecoder::new();
            loop {
                let next = match config.idle_timeout {
                    Some(limit) => match tokio::time::timeout(limit, fragments.next()).await {
                        Ok(next) => next,
                        Err(_) => {
                            yield Err(idle_timeout(limit));
                            return;
                        }
                    },
                    None => fragments.next().await,
                };

                let bytes = match next {
                    Some(Ok(bytes)) => bytes,
                    Some(Err(err)) => {
                        warn!(error = %err, "Chat stream interrupted");
                        yield Err(err);
                        return;
                    }
                    None => break,
                };

                trace!(len = bytes.len(), "Received fragment");
                for frame in decoder.consume_bytes(&bytes) {
                    let terminal = frame.is_terminal();
                    yield into_item(frame);
                    if terminal {
                        return;
                    }
                }
            }

            if let Some(frame) = decoder.finish() {
                let terminal = frame.is_terminal();
                yield into_item(frame);
                if terminal {
                    return;
                }
            }

            match config.closure_policy {
                ClosurePolicy::RequireTerminal => {
                    warn!("Chat stream closed before a terminal frame");
                    yield Err(StreamError::Truncated.into());
                }
                ClosurePolicy::ImplicitComplete => {
                    debug!("Chat stream closed without a terminal frame");
                }
            }
        })
    }

    /// Start the exchange on a background task, dispatching to `handler`.
    ///
    /// Must be called from within a tokio runtime. Dropping the returned
    /// handle does not cancel the session.
    pub fn start<H: FrameHandler>(&self, request: &ChatRequest, handler: H) -> StreamHandle {
        let control = Arc::new(Control::new());
        control.activate();

        let frames = self.frames(request);
        let task = tokio::spawn(drive(frames, handler, Arc::clone(&control)));

        StreamHandle { control, task }
    }

    /// Read the whole reply.
    pub async fn collect(&self, request: &ChatRequest) -> Result<StreamReply> {
        let mut frames = self.frames(request);
        let mut reply = StreamReply::default();

        while let Some(frame) = frames.next().await {
            reply.push(&frame?);
        }

        debug!(frames = reply.frames, len = reply.content.len(), "Chat stream complete");
        Ok(reply)
    }
}

impl std::fmt::Debug for StreamSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamSession")
            .field("auth", &self.auth)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

fn idle_timeout(limit: Duration) -> Error {
    let duration_ms = u64::try_from(limit.as_millis()).unwrap_or(u64::MAX);
    warn!(duration_ms, "Chat stream went silent");
    TransportError::IdleTimeout { duration_ms }.into()
}

fn into_item(frame: Frame) -> Result<Frame> {
    match frame.kind() {
        FrameKind::Error { message } => Err(Error::Server {
            message: message.clone(),
        }),
        _ => Ok(frame),
    }
}

/// A stream of decoded frames for one exchange.
pub struct FrameStream {
    inner: Pin<Box<dyn Stream<Item = Result<Frame>> + Send>>,
}

impl FrameStream {
    fn new<S>(stream: S) -> Self
    where
        S: Stream<Item = Result<Frame>> + Send + 'static,
    {
        Self {
            inner: Box::pin(stream),
        }
    }
}

impl Stream for FrameStream {
    type Item = Result<Frame>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.as_mut().poll_next(cx)
    }
}

struct Control {
    state: Mutex<SessionState>,
    cancelled: AtomicBool,
    wake: Notify,
}

impl Control {
    fn new() -> Self {
        Self {
            state: Mutex::new(SessionState::Idle),
            cancelled: AtomicBool::new(false),
            wake: Notify::new(),
        }
    }

    fn state(&self) -> SessionState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    fn activate(&self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if *state == SessionState::Idle {
            *state = SessionState::Active;
        }
    }

    /// Returns false if the session was already terminal.
    fn cancel(&self) -> bool {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.is_terminal() {
            return false;
        }
        *state = SessionState::Cancelled;
        self.cancelled.store(true, Ordering::SeqCst);
        // Stores a permit if the read loop is not waiting yet.
        self.wake.notify_one();
        true
    }

    /// Move an active session to `outcome`. Returns false if it was not
    /// active, in which case no terminal callback may fire.
    fn finish(&self, outcome: SessionState) -> bool {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if *state != SessionState::Active {
            return false;
        }
        *state = outcome;
        true
    }
}

async fn drive<H: FrameHandler>(
    mut frames: FrameStream,
    mut handler: H,
    control: Arc<Control>,
) -> SessionState {
    loop {
        let item = tokio::select! {
            biased;
            () = control.wake.notified() => break,
            item = frames.next() => item,
        };

        if control.is_cancelled() {
            break;
        }

        match item {
            Some(Ok(frame)) if !frame.is_terminal() => handler.on_frame(&frame),
            Some(Ok(_)) | None => {
                if control.finish(SessionState::Completed) {
                    handler.on_complete();
                }
                return control.state();
            }
            Some(Err(err)) => {
                if control.finish(SessionState::Failed) {
                    handler.on_error(err);
                }
                return control.state();
            }
        }
    }

    drop(frames);
    debug!("Stream session cancelled");
    SessionState::Cancelled
}

/// Handle to a session started with [`StreamSession::start`].
pub struct StreamHandle {
    control: Arc<Control>,
    task: JoinHandle<SessionState>,
}

impl StreamHandle {
    /// Stop the session. No callback fires afterwards.
    ///
    /// Returns false, and changes nothing, if the session already ended.
    pub fn cancel(&self) -> bool {
        self.control.cancel()
    }

    /// A cloneable handle that can cancel the session from elsewhere.
    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            control: Arc::clone(&self.control),
        }
    }

    pub fn state(&self) -> SessionState {
        self.control.state()
    }

    /// Wait for the session to reach its terminal state.
    pub async fn wait(self) -> SessionState {
        match self.task.await {
            Ok(state) => state,
            Err(err) => {
                warn!(error = %err, "Stream session task ended abnormally");
                self.control.finish(SessionState::Failed);
                self.control.state()
            }
        }
    }
}

impl std::fmt::Debug for StreamHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamHandle")
            .field("state", &self.state())
            .finish()
    }
}

/// Cancels a running session.
#[derive(Clone)]
pub struct CancelHandle {
    control: Arc<Control>,
}

impl CancelHandle {
    pub fn cancel(&self) -> bool {
        self.control.cancel()
    }

    pub fn is_cancelled(&self) -> bool {
        self.control.is_cancelled()
    }
}

impl std::fmt::Debug for CancelHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancelHandle")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}
