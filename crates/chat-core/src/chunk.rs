//! Chunk decoder: turns the binary chunks of an agent response into text.
//!
//! Chunk boundaries are arbitrary: a multi-byte UTF-8 sequence may be split
//! across two chunks. The decoder holds back an incomplete trailing sequence
//! until the next chunk completes it, so the decoded text never depends on
//! where the backend cut the bytes.

/// Incremental UTF-8 decoder with the same replacement behaviour as
/// `String::from_utf8_lossy` applied to the whole body.
#[derive(Debug, Default)]
pub struct ChunkDecoder {
    pending: Vec<u8>,
}

impl ChunkDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode one chunk, returning every character it completes.
    pub fn decode(&mut self, chunk: &[u8]) -> String {
        self.pending.extend_from_slice(chunk);
        let mut out = String::new();

        loop {
            match std::str::from_utf8(&self.pending) {
                Ok(text) => {
                    out.push_str(text);
                    self.pending.clear();
                    return out;
                }
                Err(e) => {
                    let valid = e.valid_up_to();
                    out.push_str(&String::from_utf8_lossy(&self.pending[..valid]));
                    match e.error_len() {
                        Some(len) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            self.pending.drain(..valid + len);
                        }
                        None => {
                            // incomplete sequence at the end; wait for more
                            self.pending.drain(..valid);
                            return out;
                        }
                    }
                }
            }
        }
    }

    /// Flush whatever is held back once the body has ended.
    pub fn finish(&mut self) -> String {
        if self.pending.is_empty() {
            return String::new();
        }
        let tail = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        tail
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }
}

/// Decode a complete chunk sequence into one string.
pub fn decode_chunks<I, B>(chunks: I) -> String
where
    I: IntoIterator<Item = B>,
    B: AsRef<[u8]>,
{
    let mut decoder = ChunkDecoder::new();
    let mut text = String::new();
    for chunk in chunks {
        text.push_str(&decoder.decode(chunk.as_ref()));
    }
    text.push_str(&decoder.finish());
    text
}
