use crate::diarization::domain::diarizer::DiarizationTurn;
use crate::transcript::segment::{overlap, Segment};

/// Label each segment, and each timed word, with the speaker whose turn
/// overlaps it the most.
///
/// Ties go to the earliest-starting turn. Anything without an overlapping
/// turn is left unlabelled.
pub fn assign_speakers(turns: &[DiarizationTurn], segments: &mut [Segment]) {
    let mut ordered: Vec<&DiarizationTurn> = turns.iter().collect();
    ordered.sort_by(|a, b| a.start.total_cmp(&b.start));

    for segment in segments.iter_mut() {
        segment.speaker = best_speaker(&ordered, segment.start, segment.end);
        for word in segment.words.iter_mut() {
            word.speaker = word
                .span()
                .and_then(|(start, end)| best_speaker(&ordered, start, end));
        }
    }
}

fn best_speaker(turns: &[&DiarizationTurn], start: f64, end: f64) -> Option<String> {
    let mut best: Option<(&DiarizationTurn, f64)> = None;
    for turn in turns {
        let shared = overlap(start, end, turn.start, turn.end);
        if shared <= 0.0 {
            continue;
        }
        match best {
            Some((_, best_overlap)) if shared <= best_overlap => {}
            _ => best = Some((turn, shared)),
        }
    }
    best.map(|(turn, _)| turn.speaker.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transcript::segment::Word;

    fn turns() -> Vec<DiarizationTurn> {
        vec![
            DiarizationTurn::new(0.0, 4.0, "SPEAKER_00"),
            DiarizationTurn::new(4.0, 9.0, "SPEAKER_01"),
        ]
    }

    #[test]
    fn test_contained_segment_takes_turn_label() {
        let mut segments = vec![Segment::new(1.0, 3.0, "hello")];
        assign_speakers(&turns(), &mut segments);
        assert_eq!(segments[0].speaker.as_deref(), Some("SPEAKER_00"));
    }

    #[test]
    fn test_greater_overlap_wins() {
        let mut segments = vec![Segment::new(3.0, 6.0, "across")];
        assign_speakers(&turns(), &mut segments);
        assert_eq!(segments[0].speaker.as_deref(), Some("SPEAKER_01"));
    }

    #[test]
    fn test_tie_goes_to_earliest_turn() {
        let mut segments = vec![Segment::new(3.0, 5.0, "tied")];
        // Deliberately unsorted input
        let turns = vec![
            DiarizationTurn::new(4.0, 9.0, "SPEAKER_01"),
            DiarizationTurn::new(0.0, 4.0, "SPEAKER_00"),
        ];
        assign_speakers(&turns, &mut segments);
        assert_eq!(segments[0].speaker.as_deref(), Some("SPEAKER_00"));
    }

    #[test]
    fn test_no_overlap_leaves_segment_unlabelled() {
        let mut segments = vec![Segment::new(10.0, 12.0, "late")];
        segments[0].speaker = Some("stale".into());
        assign_speakers(&turns(), &mut segments);
        assert_eq!(segments[0].speaker, None);
    }

    #[test]
    fn test_words_are_labelled_individually() {
        let mut segment = Segment::new(3.0, 5.0, "one two 3");
        segment.words = vec![
            Word::timed("one", 3.0, 3.8, 0.9),
            Word::timed("two", 4.2, 5.0, 0.9),
            Word::untimed("3"),
        ];
        let mut segments = vec![segment];

        assign_speakers(&turns(), &mut segments);

        let speakers: Vec<Option<&str>> = segments[0]
            .words
            .iter()
            .map(|w| w.speaker.as_deref())
            .collect();
        assert_eq!(speakers, vec![Some("SPEAKER_00"), Some("SPEAKER_01"), None]);
    }

    #[test]
    fn test_no_turns() {
        let mut segments = vec![Segment::new(0.0, 1.0, "alone")];
        assign_speakers(&[], &mut segments);
        assert_eq!(segments[0].speaker, None);
    }
}
