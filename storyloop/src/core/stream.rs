//! Line buffering for labeled agent output.

/// Prefixes every complete line of a byte stream with a label.
///
/// Chunks may end mid-line (or mid UTF-8 sequence); the partial tail is held
/// until its terminator arrives. [`LineLabeler::finish`] flushes a trailing
/// partial line exactly once.
#[derive(Debug)]
pub struct LineLabeler {
    prefix: String,
    pending: Vec<u8>,
}

impl LineLabeler {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            pending: Vec::new(),
        }
    }

    /// Feed a chunk and return the labeled lines it completed (each ending in `\n`).
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);
        let mut lines = Vec::new();
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            lines.push(self.label(&line[..line.len() - 1]));
        }
        lines
    }

    /// Flush the residual partial line, if any.
    pub fn finish(mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        let rest = std::mem::take(&mut self.pending);
        Some(self.label(&rest))
    }

    fn label(&self, line: &[u8]) -> String {
        let text = String::from_utf8_lossy(line);
        let text = text.strip_suffix('\r').unwrap_or(text.as_ref());
        format!("{}{}\n", self.prefix, text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_complete_lines() {
        let mut labeler = LineLabeler::new("[Dev] ");
        let lines = labeler.push(b"one\ntwo\n");
        assert_eq!(lines, vec!["[Dev] one\n", "[Dev] two\n"]);
        assert_eq!(labeler.finish(), None);
    }

    #[test]
    fn holds_partial_lines_across_chunks() {
        let mut labeler = LineLabeler::new("[Review] ");
        assert!(labeler.push(b"hel").is_empty());
        assert_eq!(labeler.push(b"lo\nwor"), vec!["[Review] hello\n"]);
        assert_eq!(labeler.finish().as_deref(), Some("[Review] wor\n"));
    }

    #[test]
    fn split_utf8_sequence_is_reassembled() {
        let bytes = "é\n".as_bytes();
        let mut labeler = LineLabeler::new("> ");
        assert!(labeler.push(&bytes[..1]).is_empty());
        assert_eq!(labeler.push(&bytes[1..]), vec!["> é\n"]);
    }

    #[test]
    fn empty_lines_keep_their_label() {
        let mut labeler = LineLabeler::new("[SM] ");
        assert_eq!(labeler.push(b"\r\n\n"), vec!["[SM] \n", "[SM] \n"]);
    }
}
