//! Consumer callbacks for background stream sessions.

use crate::Error;
use crate::frame::Frame;

/// Receives the frames of a session started with
/// [`StreamSession::start`](super::StreamSession::start).
///
/// `on_frame` is called for every `Message` frame in arrival order. Exactly
/// one of `on_error` and `on_complete` is called afterwards, unless the
/// session was cancelled, in which case neither is.
pub trait FrameHandler: Send + 'static {
    fn on_frame(&mut self, frame: &Frame);

    fn on_error(&mut self, error: Error);

    fn on_complete(&mut self);
}

/// A [`FrameHandler`] built from three closures.
pub struct Callbacks<F, E, C> {
    on_frame: F,
    on_error: E,
    on_complete: C,
}

impl<F, E, C> Callbacks<F, E, C>
where
    F: FnMut(&Frame) + Send + 'static,
    E: FnMut(Error) + Send + 'static,
    C: FnMut() + Send + 'static,
{
    pub fn new(on_frame: F, on_error: E, on_complete: C) -> Self {
        Self {
            on_frame,
            on_error,
            on_complete,
        }
    }
}

impl<F, E, C> FrameHandler for Callbacks<F, E, C>
where
    F: FnMut(&Frame) + Send + 'static,
    E: FnMut(Error) + Send + 'static,
    C: FnMut() + Send + 'static,
{
    fn on_frame(&mut self, frame: &Frame) {
        (self.on_frame)(frame)
    }

    fn on_error(&mut self, error: Error) {
        (self.on_error)(error)
    }

    fn on_complete(&mut self) {
        (self.on_complete)()
    }
}
