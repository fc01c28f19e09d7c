//! Wire frame decoding for streamed search responses.
//!
//! The response body is `<envelope json>"\n\n"<payload...>`. Bytes arrive
//! in arbitrary chunks; nothing counts as payload until the separator has
//! been fully observed, and multi-byte UTF-8 sequences split across chunk
//! boundaries are carried over to the next feed.

use serde::Deserialize;

const FRAME_SEPARATOR: &str = "\n\n";

/// The first frame of a streamed response, declaring how the remaining
/// bytes must be interpreted.
#[derive(Debug, Clone, Deserialize)]
pub struct StreamEnvelope {
    pub search_result_id: Option<String>,
    #[serde(default)]
    pub error: bool,
    #[serde(default)]
    pub is_image_generation: bool,
    #[serde(default)]
    pub is_downloadable_file_generation: bool,
}

/// How the payload after the envelope is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamMode {
    PlainText,
    Error,
    ImageGeneration,
    FileGeneration,
}

impl StreamEnvelope {
    /// Select the stream mode. At most one flag should be set; when
    /// several are, error wins over image wins over file.
    pub fn mode(&self) -> StreamMode {
        if self.error {
            StreamMode::Error
        } else if self.is_image_generation {
            StreamMode::ImageGeneration
        } else if self.is_downloadable_file_generation {
            StreamMode::FileGeneration
        } else {
            StreamMode::PlainText
        }
    }
}

/// Incremental decoder splitting the envelope frame from the payload.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    carry: Vec<u8>,
    head: String,
    envelope_json: Option<String>,
    payload: String,
    payload_chars: usize,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one network chunk into the decoder.
    pub fn feed(&mut self, bytes: &[u8]) {
        self.carry.extend_from_slice(bytes);
        let decoded = Self::take_decodable(&mut self.carry);
        if decoded.is_empty() {
            return;
        }

        if self.envelope_json.is_some() {
            self.push_payload(&decoded);
            return;
        }

        self.head.push_str(&decoded);
        if let Some(pos) = self.head.find(FRAME_SEPARATOR) {
            self.envelope_json = Some(self.head[..pos].to_string());
            let rest = self.head[pos + FRAME_SEPARATOR.len()..].to_string();
            self.head.clear();
            self.push_payload(&rest);
        }
    }

    /// The raw envelope frame, available once the separator has been
    /// fully observed.
    pub fn envelope_json(&self) -> Option<&str> {
        self.envelope_json.as_deref()
    }

    /// Everything decoded after the separator so far.
    pub fn payload(&self) -> &str {
        &self.payload
    }

    /// Character count of the payload, maintained incrementally.
    pub fn payload_char_count(&self) -> usize {
        self.payload_chars
    }

    fn push_payload(&mut self, text: &str) {
        self.payload.push_str(text);
        self.payload_chars += text.chars().count();
    }

    /// Drain the decodable prefix of `carry`, leaving any incomplete
    /// multi-byte tail for the next feed. Invalid sequences decode to the
    /// replacement character rather than aborting the stream.
    fn take_decodable(carry: &mut Vec<u8>) -> String {
        let mut out = String::new();
        let mut data = std::mem::take(carry);
        loop {
            match std::str::from_utf8(&data) {
                Ok(valid) => {
                    out.push_str(valid);
                    data.clear();
                    break;
                }
                Err(err) => {
                    let valid_len = err.valid_up_to();
                    out.push_str(std::str::from_utf8(&data[..valid_len]).unwrap_or_default());
                    match err.error_len() {
                        Some(bad_len) => {
                            out.push('\u{FFFD}');
                            data.drain(..valid_len + bad_len);
                        }
                        None => {
                            // Incomplete tail; keep it for the next chunk.
                            data.drain(..valid_len);
                            break;
                        }
                    }
                }
            }
        }
        *carry = data;
        out
    }
}
