use std::collections::HashMap;

use ndarray::{Array2, ArrayView2};

use super::ctc_alignment::{backtrack, trellis, TokenSpan};
use crate::audio::domain::audio_segment::AudioSegment;
use crate::transcript::segment::{Segment, Word};

const BLANK_TOKEN: &str = "<pad>";
const WORD_DELIMITER: &str = "|";

/// Segments shorter than this (one 25 ms analysis window) are not aligned.
const MIN_ALIGNABLE_SECONDS: f64 = 0.025;

/// Character vocabulary of a CTC acoustic model.
#[derive(Clone, Debug)]
pub struct Vocabulary {
    chars: HashMap<char, usize>,
    blank: usize,
    word_delimiter: Option<usize>,
}

impl Vocabulary {
    /// Build from `token -> id` entries. Multi-character tokens other than
    /// the blank and delimiter markers are not alignable and are dropped.
    pub fn from_entries(entries: &HashMap<String, usize>) -> Self {
        let mut chars = HashMap::new();
        for (token, &id) in entries {
            let mut it = token.chars();
            if let (Some(c), None) = (it.next(), it.next()) {
                if token != WORD_DELIMITER {
                    chars.insert(lowercase(c), id);
                }
            }
        }
        Self {
            chars,
            blank: entries.get(BLANK_TOKEN).copied().unwrap_or(0),
            word_delimiter: entries.get(WORD_DELIMITER).copied(),
        }
    }

    pub fn blank(&self) -> usize {
        self.blank
    }

    fn token_for(&self, c: char) -> Option<usize> {
        if c.is_whitespace() {
            self.word_delimiter
        } else {
            self.chars.get(&lowercase(c)).copied()
        }
    }
}

/// Tokens to align, plus which token (if any) each text character maps to.
#[derive(Clone, Debug, PartialEq)]
pub struct TextTokens {
    pub tokens: Vec<usize>,
    pub char_tokens: Vec<Option<usize>>,
}

pub fn tokenize(text: &str, vocab: &Vocabulary) -> TextTokens {
    let mut tokens = Vec::new();
    let mut char_tokens = Vec::new();
    for c in text.chars() {
        match vocab.token_for(c) {
            Some(id) => {
                char_tokens.push(Some(tokens.len()));
                tokens.push(id);
            }
            None => char_tokens.push(None),
        }
    }
    TextTokens {
        tokens,
        char_tokens,
    }
}

/// Maps emission frames back to absolute time.
#[derive(Clone, Copy, Debug)]
pub struct FrameTiming {
    pub offset: f64,
    pub seconds_per_frame: f64,
}

impl FrameTiming {
    fn at(&self, frame: usize) -> f64 {
        self.offset + frame as f64 * self.seconds_per_frame
    }
}

/// Refine one segment from the emissions computed over its audio.
///
/// Text is never changed. If the text cannot be aligned the segment keeps
/// its timing and gets untimed words.
pub fn align_segment(
    segment: &Segment,
    emission: ArrayView2<f32>,
    vocab: &Vocabulary,
    timing: FrameTiming,
) -> Segment {
    let text_tokens = tokenize(&segment.text, vocab);
    let trellis = trellis(emission, &text_tokens.tokens, vocab.blank());
    let spans = match backtrack(trellis.view(), emission, &text_tokens.tokens, vocab.blank()) {
        Some(spans) => spans,
        None => return untimed(segment),
    };

    let words = build_words(&segment.text, &text_tokens, &spans, timing);
    let mut aligned = segment.clone();
    let mut timed = words.iter().filter_map(Word::span);
    if let Some((first_start, first_end)) = timed.next() {
        let last_end = timed.last().map(|(_, end)| end).unwrap_or(first_end);
        aligned.start = first_start;
        aligned.end = last_end;
    }
    aligned.words = words;
    aligned
}

/// Align every segment of a transcript, computing emissions per segment.
///
/// Output always has the same length and texts as `segments`.
pub fn align_segments<F>(
    segments: &[Segment],
    audio: &AudioSegment,
    vocab: &Vocabulary,
    mut emissions: F,
) -> Result<Vec<Segment>, Box<dyn std::error::Error>>
where
    F: FnMut(&[f32]) -> Result<Array2<f32>, Box<dyn std::error::Error>>,
{
    let mut aligned = Vec::with_capacity(segments.len());
    for segment in segments {
        let start = segment.start.max(0.0);
        let samples = audio.slice(start, segment.end);
        let seconds = samples.len() as f64 / audio.sample_rate() as f64;
        if seconds < MIN_ALIGNABLE_SECONDS {
            log::debug!(
                "Segment at {:.2}s too short to align ({seconds:.3}s)",
                segment.start
            );
            aligned.push(untimed(segment));
            continue;
        }

        let emission = emissions(samples)?;
        if emission.nrows() == 0 {
            aligned.push(untimed(segment));
            continue;
        }
        let timing = FrameTiming {
            offset: start,
            seconds_per_frame: seconds / emission.nrows() as f64,
        };
        aligned.push(align_segment(segment, emission.view(), vocab, timing));
    }
    Ok(aligned)
}

fn build_words(
    text: &str,
    text_tokens: &TextTokens,
    spans: &[TokenSpan],
    timing: FrameTiming,
) -> Vec<Word> {
    let chars: Vec<char> = text.chars().collect();
    let mut words = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        if chars[i].is_whitespace() {
            i += 1;
            continue;
        }
        let word_start = i;
        while i < chars.len() && !chars[i].is_whitespace() {
            i += 1;
        }
        let word: String = chars[word_start..i].iter().collect();
        let word_spans: Vec<&TokenSpan> = (word_start..i)
            .filter_map(|c| text_tokens.char_tokens[c])
            .filter_map(|token_index| spans.get(token_index))
            .collect();

        match (word_spans.first(), word_spans.last()) {
            (Some(first), Some(last)) => {
                let score =
                    word_spans.iter().map(|s| s.score).sum::<f32>() / word_spans.len() as f32;
                words.push(Word::timed(
                    word,
                    timing.at(first.start_frame),
                    timing.at(last.end_frame),
                    score,
                ));
            }
            _ => words.push(Word::untimed(word)),
        }
    }
    words
}

fn untimed(segment: &Segment) -> Segment {
    let mut copy = segment.clone();
    copy.words = segment.text.split_whitespace().map(Word::untimed).collect();
    copy
}

fn lowercase(c: char) -> char {
    c.to_lowercase().next().unwrap_or(c)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alignment::domain::ctc_alignment::tests::peaked_emission;
    use approx::assert_relative_eq;

    // <pad>=0, |=1, a=2, b=3
    fn vocab() -> Vocabulary {
        let entries: HashMap<String, usize> = [("<pad>", 0), ("|", 1), ("a", 2), ("b", 3), ("<unk>", 4)]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();
        Vocabulary::from_entries(&entries)
    }

    #[test]
    fn test_vocabulary_ignores_multichar_tokens() {
        let v = vocab();
        assert_eq!(v.blank(), 0);
        assert_eq!(v.token_for('a'), Some(2));
        assert_eq!(v.token_for('B'), Some(3));
        assert_eq!(v.token_for(' '), Some(1));
        assert_eq!(v.token_for('<'), None);
    }

    #[test]
    fn test_tokenize_maps_chars_and_skips_unknown() {
        let t = tokenize("a1 b", &vocab());
        assert_eq!(t.tokens, vec![2, 1, 3]);
        assert_eq!(t.char_tokens, vec![Some(0), None, Some(1), Some(2)]);
    }

    #[test]
    fn test_align_segment_sets_word_and_segment_timing() {
        // "ab ba" -> a b | b a, laid out across 10 frames
        let em = peaked_emission(&[2, 0, 3, 0, 1, 3, 0, 2, 0, 0], 5);
        let segment = Segment::new(9.0, 12.0, "ab ba");
        let timing = FrameTiming {
            offset: 10.0,
            seconds_per_frame: 0.1,
        };

        let aligned = align_segment(&segment, em.view(), &vocab(), timing);

        assert_eq!(aligned.text, "ab ba");
        assert_eq!(aligned.words.len(), 2);
        let ab = &aligned.words[0];
        let ba = &aligned.words[1];
        assert_eq!(ab.word, "ab");
        assert_relative_eq!(ab.start.unwrap(), 10.0, epsilon = 1e-6);
        assert_relative_eq!(ab.end.unwrap(), 10.4, epsilon = 1e-6);
        assert_eq!(ba.word, "ba");
        assert_relative_eq!(ba.start.unwrap(), 10.5, epsilon = 1e-6);
        assert_relative_eq!(ba.end.unwrap(), 10.8, epsilon = 1e-6);
        assert_relative_eq!(aligned.start, 10.0, epsilon = 1e-6);
        // trailing silence is trimmed from the segment end
        assert_relative_eq!(aligned.end, 10.8, epsilon = 1e-6);
    }

    #[test]
    fn test_unalignable_text_keeps_original_timing() {
        let em = peaked_emission(&[0, 0, 0], 5);
        let segment = Segment::new(1.0, 2.0, "123 456");

        let aligned = align_segment(
            &segment,
            em.view(),
            &vocab(),
            FrameTiming {
                offset: 1.0,
                seconds_per_frame: 0.33,
            },
        );

        assert_eq!(aligned.start, 1.0);
        assert_eq!(aligned.end, 2.0);
        assert_eq!(aligned.words, vec![Word::untimed("123"), Word::untimed("456")]);
    }

    #[test]
    fn test_word_with_unknown_chars_is_timed_from_known_ones() {
        let em = peaked_emission(&[2, 0, 0, 3, 0], 5);
        let segment = Segment::new(0.0, 0.5, "a7b");

        let aligned = align_segment(
            &segment,
            em.view(),
            &vocab(),
            FrameTiming {
                offset: 0.0,
                seconds_per_frame: 0.1,
            },
        );

        assert_eq!(aligned.words.len(), 1);
        assert_eq!(aligned.words[0].word, "a7b");
        assert!(aligned.words[0].span().is_some());
    }

    #[test]
    fn test_align_segments_preserves_count_and_text() {
        let audio = AudioSegment::new(vec![0.0; 16000 * 6], 16000, 1);
        let segments = vec![
            Segment::new(0.0, 1.5, "ab"),
            Segment::new(1.5, 1.51, "ba"),
            Segment::new(2.0, 4.0, "b a b"),
            Segment::new(4.5, 9.0, "??"),
        ];

        // 20 ms frames, every frame favours blank except a rotating label
        let aligned = align_segments(&segments, &audio, &vocab(), |samples| {
            let frames = samples.len() / 320;
            let labels: Vec<usize> = (0..frames).map(|i| [0, 2, 0, 3, 0, 1][i % 6]).collect();
            Ok(peaked_emission(&labels, 5))
        })
        .unwrap();

        assert_eq!(aligned.len(), segments.len());
        for (before, after) in segments.iter().zip(&aligned) {
            assert_eq!(before.text, after.text);
        }
        // Too short to align: original timing kept
        assert_eq!(aligned[1].start, 1.5);
        assert_eq!(aligned[1].end, 1.51);
    }

    #[test]
    fn test_align_segments_propagates_emission_errors() {
        let audio = AudioSegment::new(vec![0.0; 16000], 16000, 1);
        let segments = vec![Segment::new(0.0, 1.0, "ab")];
        let result = align_segments(&segments, &audio, &vocab(), |_| Err("session failed".into()));
        assert!(result.is_err());
    }
}
