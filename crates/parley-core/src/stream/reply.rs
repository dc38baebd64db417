//! Accumulated result of a streamed reply.

use crate::frame::Frame;

/// The full reply assembled from a stream's `Message` frames.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamReply {
    pub content: String,
    pub message_id: Option<String>,
    pub conversation_id: Option<String>,
    /// Number of frames received, terminal frame included.
    pub frames: usize,
}

impl StreamReply {
    /// Fold one frame into the reply. Later ids replace earlier ones.
    pub fn push(&mut self, frame: &Frame) {
        self.frames += 1;
        if let Some(content) = frame.content() {
            self.content.push_str(content);
        }
        if let Some(id) = frame.message_id() {
            self.message_id = Some(id.to_string());
        }
        if let Some(id) = frame.conversation_id() {
            self.conversation_id = Some(id.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::FrameDecoder;

    #[test]
    fn concatenates_content_and_keeps_ids() {
        let frames = FrameDecoder::new().consume(concat!(
            "data: {\"type\":\"message\",\"content\":\"Hel\",\"conversation_id\":\"c-1\"}\n",
            "data: {\"type\":\"message\",\"content\":\"lo\",\"message_id\":\"m-2\"}\n",
            "data: {\"type\":\"done\",\"conversation_id\":\"c-1\"}\n",
        ));

        let mut reply = StreamReply::default();
        frames.iter().for_each(|f| reply.push(f));

        assert_eq!(reply.content, "Hello");
        assert_eq!(reply.conversation_id.as_deref(), Some("c-1"));
        assert_eq!(reply.message_id.as_deref(), Some("m-2"));
        assert_eq!(reply.frames, 3);
    }
}
