//! Section and chunk assembly.
//!
//! Splits sanitized text into paragraphs, tracks the current section title via
//! a short-and-upper-case header heuristic, and greedily packs paragraphs into
//! chunks bounded by `max_chunk_size` characters. The bound is soft: a single
//! paragraph is never split, so one oversized paragraph becomes one oversized
//! chunk.

use tracing::{debug, instrument};

use docsift_shared::{ChunkingConfig, TextChunk};

/// Paragraph boundary. Sanitized markup has no newlines left, so in practice
/// only newline-preserving input (PDF text) yields more than one paragraph.
pub const PARAGRAPH_DELIMITER: &str = "\n\n";

/// Assemble `text` with default header settings and the given size cap.
pub fn assemble(text: &str, max_chunk_size: usize) -> Vec<TextChunk> {
    ChunkAssembler::new(ChunkingConfig {
        max_chunk_size,
        ..ChunkingConfig::default()
    })
    .assemble(text)
}

/// Deterministic single-pass section detector and paragraph packer.
#[derive(Debug, Clone, Default)]
pub struct ChunkAssembler {
    config: ChunkingConfig,
}

impl ChunkAssembler {
    pub fn new(config: ChunkingConfig) -> Self {
        Self { config }
    }

    /// Whether `paragraph` should be treated as a section title.
    ///
    /// Any short, fully upper-case paragraph qualifies, including an
    /// acronym-heavy body sentence.
    pub fn is_header(&self, paragraph: &str) -> bool {
        let words = paragraph.split_whitespace().count();
        if words == 0 || words >= self.config.header_max_words {
            return false;
        }
        !self.config.header_requires_uppercase || is_upper_case(paragraph)
    }

    /// Produce ordered `(section_title, text)` chunks for `text`.
    ///
    /// A header does not close the chunk being built; the chunk is tagged with
    /// whichever title is current when it is flushed.
    #[instrument(skip_all, fields(text_len = text.len(), max = self.config.max_chunk_size))]
    pub fn assemble(&self, text: &str) -> Vec<TextChunk> {
        let mut chunks = Vec::new();
        let mut section = self.config.default_section_title.clone();
        let mut current = String::new();
        let mut current_chars = 0usize;

        for raw in text.split(PARAGRAPH_DELIMITER) {
            if self.is_header(raw) {
                section = raw.trim().to_string();
                debug!(%section, "section header detected");
                continue;
            }

            let paragraph = raw.trim();
            if paragraph.is_empty() {
                continue;
            }
            let paragraph_chars = paragraph.chars().count();

            if current_chars + paragraph_chars + 1 > self.config.max_chunk_size {
                flush(&mut chunks, &section, &mut current);
                current.push_str(paragraph);
                current_chars = paragraph_chars;
            } else {
                if !current.is_empty() {
                    current.push(' ');
                    current_chars += 1;
                }
                current.push_str(paragraph);
                current_chars += paragraph_chars;
            }
        }

        flush(&mut chunks, &section, &mut current);

        debug!(chunks = chunks.len(), "assembly complete");
        chunks
    }
}

/// Emit `current` as a chunk (if it has content) and leave it empty.
fn flush(chunks: &mut Vec<TextChunk>, section: &str, current: &mut String) {
    let text = std::mem::take(current);
    if text.is_empty() {
        return;
    }
    chunks.push(TextChunk {
        section_title: section.to_string(),
        text,
    });
}

/// At least one upper-case letter and no lower-case ones; other characters
/// (digits, punctuation, whitespace) are ignored.
fn is_upper_case(s: &str) -> bool {
    s.chars().any(char::is_uppercase) && !s.chars().any(char::is_lowercase)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(max_chunk_size: usize) -> ChunkingConfig {
        ChunkingConfig {
            max_chunk_size,
            ..ChunkingConfig::default()
        }
    }

    fn texts(chunks: &[TextChunk]) -> Vec<&str> {
        chunks.iter().map(|c| c.text.as_str()).collect()
    }

    #[test]
    fn single_sanitized_paragraph_is_main_body() {
        let chunks = assemble("TITLE Hello world.", 1024);
        assert_eq!(
            chunks,
            vec![TextChunk {
                section_title: "Main Body".into(),
                text: "TITLE Hello world.".into(),
            }]
        );
    }

    #[test]
    fn oversized_paragraphs_are_never_merged() {
        let chunks = assemble("alpha beta\n\ngamma delta epsilon", 10);
        assert_eq!(texts(&chunks), vec!["alpha beta", "gamma delta epsilon"]);
    }

    #[test]
    fn small_paragraphs_are_packed_with_single_space() {
        let chunks = assemble("one two\n\nthree four\n\nfive", 1024);
        assert_eq!(texts(&chunks), vec!["one two three four five"]);
    }

    #[test]
    fn packing_respects_cap_including_joining_space() {
        // "aaaa bbbb" is exactly 9 characters.
        let chunks = assemble("aaaa\n\nbbbb\n\ncccc", 9);
        assert_eq!(texts(&chunks), vec!["aaaa bbbb", "cccc"]);

        let chunks = assemble("aaaa\n\nbbbb", 8);
        assert_eq!(texts(&chunks), vec!["aaaa", "bbbb"]);
    }

    #[test]
    fn chunk_length_counts_characters_not_bytes() {
        let chunks = assemble("zażółć\n\ngęślą", 12);
        assert_eq!(texts(&chunks), vec!["zażółć gęślą"]);
    }

    #[test]
    fn empty_input_yields_no_chunks() {
        assert!(assemble("", 1024).is_empty());
        assert!(assemble("\n\n\n\n", 1024).is_empty());
    }

    #[test]
    fn headers_only_yields_no_chunks() {
        assert!(assemble("INTRODUCTION\n\nMETHODS\n\nRESULTS", 1024).is_empty());
    }

    #[test]
    fn chunk_takes_title_current_at_flush() {
        let text = "INTRODUCTION\n\nReflection matters.\n\nIt is key.\n\n\
                    METHODOLOGY\n\nWe used prompting.";
        let chunks = assemble(text, 20);
        assert_eq!(
            chunks,
            vec![
                TextChunk {
                    section_title: "INTRODUCTION".into(),
                    text: "Reflection matters.".into(),
                },
                TextChunk {
                    section_title: "METHODOLOGY".into(),
                    text: "It is key.".into(),
                },
                TextChunk {
                    section_title: "METHODOLOGY".into(),
                    text: "We used prompting.".into(),
                },
            ]
        );
    }

    #[test]
    fn header_does_not_close_open_chunk() {
        let chunks = assemble("intro text\n\nMETHODS\n\nbody text", 1024);
        assert_eq!(
            chunks,
            vec![TextChunk {
                section_title: "METHODS".into(),
                text: "intro text body text".into(),
            }]
        );
    }

    #[test]
    fn header_title_is_trimmed() {
        let chunks = assemble("  RESULTS  \n\nF1 of 0.92.", 1024);
        assert_eq!(chunks[0].section_title, "RESULTS");
    }

    #[test]
    fn header_word_limit_is_exclusive() {
        let assembler = ChunkAssembler::default();
        assert!(assembler.is_header("ONE TWO THREE FOUR FIVE SIX SEVEN EIGHT NINE"));
        assert!(!assembler.is_header("ONE TWO THREE FOUR FIVE SIX SEVEN EIGHT NINE TEN"));
    }

    #[test]
    fn header_requires_upper_case_letters() {
        let assembler = ChunkAssembler::default();
        assert!(assembler.is_header("2. RESULTS: F1 = 0.92"));
        assert!(assembler.is_header("NASA AND ESA AGREE."));
        assert!(!assembler.is_header("Results"));
        assert!(!assembler.is_header("1234 5678"));
        assert!(!assembler.is_header(""));
    }

    #[test]
    fn header_thresholds_are_configurable() {
        let assembler = ChunkAssembler::new(ChunkingConfig {
            header_max_words: 3,
            header_requires_uppercase: false,
            default_section_title: "Preamble".into(),
            ..ChunkingConfig::default()
        });
        assert!(assembler.is_header("Short title"));
        assert!(!assembler.is_header("THREE WORD TITLE"));

        let chunks = assembler.assemble("A longer opening paragraph here\n\nNext part\n\nBody text follows now");
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].section_title, "Next part");
    }

    #[test]
    fn default_title_is_configurable() {
        let assembler = ChunkAssembler::new(ChunkingConfig {
            default_section_title: "Preamble".into(),
            ..ChunkingConfig::default()
        });
        let chunks = assembler.assemble("just body text");
        assert_eq!(chunks[0].section_title, "Preamble");
    }

    #[test]
    fn pdf_style_single_newlines_stay_in_one_paragraph() {
        let text = "PDF DOCUMENT: CONTRADICTION DETECTION\n1. Introduction\n\
                    This paper introduces the critic.\n2. Methodology\nWe used BERT.";
        let chunks = assemble(text, 1024);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].section_title, "Main Body");
        assert!(chunks[0].text.starts_with("PDF DOCUMENT"));
    }

    #[test]
    fn chunks_respect_bound_unless_single_paragraph() {
        let paragraphs: Vec<String> = (0..60)
            .map(|i| "word ".repeat(i % 13 + 1).trim().to_string() + ".")
            .collect();
        let text = paragraphs.join(PARAGRAPH_DELIMITER);
        let max = 40;

        let chunks = ChunkAssembler::new(config(max)).assemble(&text);
        for chunk in &chunks {
            let len = chunk.text.chars().count();
            let single = paragraphs.iter().any(|p| p == &chunk.text);
            assert!(len <= max || single, "chunk of {len} chars: {:?}", chunk.text);
            assert_eq!(chunk.text, chunk.text.trim());
            assert!(!chunk.text.is_empty());
        }

        // Packing loses nothing and keeps order.
        let rejoined = texts(&chunks).join(" ");
        assert_eq!(rejoined, paragraphs.join(" "));
    }

    #[test]
    fn header_paragraphs_never_appear_in_chunks() {
        let text = "ABSTRACT\n\nWe study loops.\n\nMETHODS\n\nIterative prompting.\n\nRESULTS\n\nGains.";
        let assembler = ChunkAssembler::new(config(16));
        let chunks = assembler.assemble(text);
        for chunk in &chunks {
            for header in ["ABSTRACT", "METHODS", "RESULTS"] {
                assert!(!chunk.text.contains(header));
            }
            assert!(!assembler.is_header(&chunk.text));
        }
        assert_eq!(chunks.last().map(|c| c.section_title.as_str()), Some("RESULTS"));
    }
}
