//! CTC forced alignment over per-frame log-probabilities.
//!
//! The trellis tracks the best log-probability of having emitted the first
//! `j` tokens after `t` frames; backtracking recovers which frames belong to
//! which token.

use ndarray::{Array2, ArrayView2};

/// Frames `[start_frame, end_frame)` attributed to one token.
#[derive(Clone, Debug, PartialEq)]
pub struct TokenSpan {
    pub token_index: usize,
    pub start_frame: usize,
    pub end_frame: usize,
    /// Mean emission probability over the span.
    pub score: f32,
}

/// Fill the `(frames + 1) x (tokens + 1)` alignment trellis.
///
/// `emission` is `frames x vocabulary` log-probabilities.
pub fn trellis(emission: ArrayView2<f32>, tokens: &[usize], blank: usize) -> Array2<f32> {
    let num_frames = emission.nrows();
    let num_tokens = tokens.len();
    let mut trellis = Array2::from_elem((num_frames + 1, num_tokens + 1), f32::NEG_INFINITY);
    trellis[[0, 0]] = 0.0;

    for t in 0..num_frames {
        let blank_score = emission[[t, blank]];
        trellis[[t + 1, 0]] = trellis[[t, 0]] + blank_score;
        for j in 1..=num_tokens {
            let stay = trellis[[t, j]] + blank_score;
            let change = trellis[[t, j - 1]] + emission[[t, tokens[j - 1]]];
            trellis[[t + 1, j]] = stay.max(change);
        }
    }

    trellis
}

/// Recover per-token frame spans from a filled trellis.
///
/// The walk starts at the frame where having emitted every token scores
/// best, so trailing blank frames are not charged to the last token.
///
/// Returns `None` when no path emits every token (empty token list, fewer
/// frames than tokens, or an unreachable end state).
pub fn backtrack(
    trellis: ArrayView2<f32>,
    emission: ArrayView2<f32>,
    tokens: &[usize],
    blank: usize,
) -> Option<Vec<TokenSpan>> {
    let num_frames = emission.nrows();
    let num_tokens = tokens.len();
    if num_tokens == 0 || num_frames < num_tokens {
        return None;
    }
    let end = best_end_frame(trellis, num_tokens)?;

    // (token_index, frame, probability)
    let mut path: Vec<(usize, usize, f32)> = Vec::with_capacity(end);
    let mut j = num_tokens;
    let mut t = end;
    while j > 0 {
        if t == 0 {
            return None;
        }
        let stayed = trellis[[t - 1, j]] + emission[[t - 1, blank]];
        let token_score = emission[[t - 1, tokens[j - 1]]];
        let changed = trellis[[t - 1, j - 1]] + token_score;
        if changed > stayed {
            path.push((j - 1, t - 1, token_score.exp()));
            j -= 1;
        } else {
            path.push((j - 1, t - 1, emission[[t - 1, blank]].exp()));
        }
        t -= 1;
    }
    path.reverse();

    Some(merge_repeats(&path))
}

/// Earliest frame count at which the full token sequence scores highest.
fn best_end_frame(trellis: ArrayView2<f32>, num_tokens: usize) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;
    for (t, &score) in trellis.column(num_tokens).iter().enumerate() {
        if !score.is_finite() {
            continue;
        }
        match best {
            Some((_, b)) if score <= b => {}
            _ => best = Some((t, score)),
        }
    }
    best.map(|(t, _)| t)
}

fn merge_repeats(path: &[(usize, usize, f32)]) -> Vec<TokenSpan> {
    let mut spans = Vec::new();
    let mut i = 0;
    while i < path.len() {
        let token_index = path[i].0;
        let mut k = i;
        while k < path.len() && path[k].0 == token_index {
            k += 1;
        }
        let score = path[i..k].iter().map(|p| p.2).sum::<f32>() / (k - i) as f32;
        spans.push(TokenSpan {
            token_index,
            start_frame: path[i].1,
            end_frame: path[k - 1].1 + 1,
            score,
        });
        i = k;
    }
    spans
}
