use std::collections::HashSet;

use crate::config::{HIGH_CONFIDENCE_THRESHOLD, MEDIUM_CONFIDENCE_THRESHOLD};
use crate::hashing::FingerprintKey;
use crate::index::{FingerprintIndex, ReferenceId};

/// Per-reference progress inside one match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReferenceState {
    Unmatched,
    Matched { last: usize, score: u64 },
}

impl ReferenceState {
    /// Sequence the next occurrence must follow, and the score so far.
    /// Unmatched references are anchored at sequence 0.
    fn anchor(self) -> (usize, u64) {
        match self {
            ReferenceState::Unmatched => (0, 0),
            ReferenceState::Matched { last, score } => (last, score),
        }
    }
}

/// Result of matching one sample against an index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchOutcome {
    /// Share of all accumulated score held by the winner, 0..=100
    pub confidence: u32,
    pub score: u64,
    pub winner: Option<ReferenceId>,
    /// Every reference that accumulated score, highest first
    pub scores: Vec<(ReferenceId, u64)>,
}

impl MatchOutcome {
    pub fn no_match() -> Self {
        Self {
            confidence: 0,
            score: 0,
            winner: None,
            scores: Vec::new(),
        }
    }

    pub fn is_match(&self) -> bool {
        self.winner.is_some()
    }

    pub fn winner_name<'a>(&self, index: &'a FingerprintIndex) -> Option<&'a str> {
        self.winner.and_then(|id| index.reference_name(id))
    }
}

/// Walks a sample's fingerprints frame by frame against a read-only index.
///
/// An occurrence `(reference, seq)` is accepted when
/// `last < seq < last + distance` for that reference's last accepted
/// sequence, and at most one occurrence per reference is accepted per frame.
pub struct MatchSession<'a> {
    index: &'a FingerprintIndex,
    states: Vec<ReferenceState>,
    high_score: u64,
    winner: Option<ReferenceId>,
    frames: usize,
    accepted: usize,
}

impl<'a> MatchSession<'a> {
    pub fn new(index: &'a FingerprintIndex) -> Self {
        Self {
            index,
            states: vec![ReferenceState::Unmatched; index.reference_count()],
            high_score: 0,
            winner: None,
            frames: 0,
            accepted: 0,
        }
    }

    /// Processes the next sample frame.
    pub fn feed(&mut self, key: &FingerprintKey) {
        let settings = self.index.settings();
        let distance = settings.distance();
        let weight = settings.weight();
        let mut matched_this_frame: HashSet<ReferenceId> = HashSet::new();

        for occurrence in self.index.lookup(key) {
            let reference = occurrence.reference;
            if matched_this_frame.contains(&reference) {
                continue;
            }
            let Some(state) = self.states.get_mut(reference.0 as usize) else {
                continue;
            };

            let (last, score) = state.anchor();
            let seq = occurrence.seq;
            if !(last < seq && seq < last.saturating_add(distance)) {
                continue;
            }

            let gain = weight / (seq - last) as u64;
            let score = score.saturating_add(gain);
            *state = ReferenceState::Matched { last: seq, score };
            matched_this_frame.insert(reference);
            self.accepted += 1;

            log::trace!(
                "frame {}: accepted {} seq {} (gap {}, +{}, total {})",
                self.frames,
                reference,
                seq,
                seq - last,
                gain,
                score
            );

            if self.high_score < score {
                self.high_score = score;
                self.winner = Some(reference);
            }
        }

        self.frames += 1;
    }

    pub fn finish(self) -> MatchOutcome {
        let mut scores: Vec<(ReferenceId, u64)> = self
            .states
            .iter()
            .enumerate()
            .filter_map(|(i, state)| match *state {
                ReferenceState::Matched { score, .. } if score > 0 => {
                    Some((ReferenceId(i as u32), score))
                }
                _ => None,
            })
            .collect();
        scores.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));

        let total: u128 = scores.iter().map(|&(_, s)| s as u128).sum();
        log::debug!(
            "Matched {} frames, {} accepted occurrences, total score {}",
            self.frames,
            self.accepted,
            total
        );

        if total == 0 {
            return MatchOutcome::no_match();
        }

        let confidence = (100 * self.high_score as u128 / total) as u32;
        MatchOutcome {
            confidence,
            score: self.high_score,
            winner: self.winner,
            scores,
        }
    }
}

/// Matches a complete fingerprint stream derived with `index.settings()`.
pub fn match_fingerprints<'k, I>(keys: I, index: &FingerprintIndex) -> MatchOutcome
where
    I: IntoIterator<Item = &'k FingerprintKey>,
{
    let mut session = MatchSession::new(index);
    for key in keys {
        session.feed(key);
    }
    session.finish()
}

pub fn get_match_quality(confidence: u32) -> &'static str {
    if confidence > HIGH_CONFIDENCE_THRESHOLD {
        "High"
    } else if confidence > MEDIUM_CONFIDENCE_THRESHOLD {
        "Medium"
    } else {
        "Low"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FingerprintSettings;
    use crate::index::Occurrence;

    fn key(v: i64) -> FingerprintKey {
        FingerprintKey::new(vec![v])
    }

    fn index_with(distance: usize, weight: u64, refs: &[(&str, Vec<i64>)]) -> FingerprintIndex {
        let settings = FingerprintSettings::builder()
            .distance(distance)
            .weight(weight)
            .build()
            .unwrap();
        let mut index = FingerprintIndex::new(settings);
        for (name, keys) in refs {
            let reference = index.add_reference(name).unwrap();
            for (seq, &k) in keys.iter().enumerate() {
                index.insert(key(k), Occurrence { reference, seq });
            }
        }
        index
    }

    fn run(index: &FingerprintIndex, sample: &[i64]) -> MatchOutcome {
        let keys: Vec<FingerprintKey> = sample.iter().map(|&v| key(v)).collect();
        match_fingerprints(&keys, index)
    }

    #[test]
    fn repeated_key_advances_one_step_per_frame() {
        let index = index_with(10, 100, &[("tone", vec![7; 10])]);
        let outcome = run(&index, &[7; 8]);

        // seq 0 is never accepted; frames 0..8 accept seq 1..=8
        assert_eq!(outcome.score, 800);
        assert_eq!(outcome.confidence, 100);
        assert_eq!(outcome.winner, index.reference_id("tone"));
    }

    #[test]
    fn empty_index_gives_no_match() {
        let index = index_with(10, 100, &[]);
        assert_eq!(run(&index, &[1, 2, 3]), MatchOutcome::no_match());
        assert_eq!(run(&index, &[]), MatchOutcome::no_match());
    }

    #[test]
    fn gap_must_stay_below_distance() {
        // key 1 at seq 3 and seq 6
        let index = index_with(3, 60, &[("a", vec![0, 0, 0, 1, 0, 0, 1])]);
        assert!(!run(&index, &[1, 1]).is_match());

        let index = index_with(4, 60, &[("a", vec![0, 0, 0, 1, 0, 0, 1])]);
        let outcome = run(&index, &[1, 1]);
        // 0 -> 3 (+20), 3 -> 6 (+20)
        assert_eq!(outcome.score, 40);
    }

    #[test]
    fn never_accepts_backwards_or_repeated_sequence() {
        let index = index_with(100, 10, &[("a", vec![0, 1, 2, 3])]);
        let outcome = run(&index, &[3, 2, 1, 3]);
        // only 0 -> 3 counts; 2, 1 and 3 again do not follow seq 3
        assert_eq!(outcome.score, 3);
        assert_eq!(outcome.scores.len(), 1);
    }

    #[test]
    fn one_acceptance_per_reference_per_frame() {
        let index = index_with(10, 10, &[("a", vec![5, 5, 5])]);
        let outcome = run(&index, &[5]);
        // seq 1 wins the frame, seq 2 must wait for the next one
        assert_eq!(outcome.score, 10);
        let outcome = run(&index, &[5, 5]);
        assert_eq!(outcome.score, 20);
    }

    #[test]
    fn weight_uses_integer_division() {
        let index = index_with(10, 100, &[("a", vec![0, 0, 0, 9])]);
        assert_eq!(run(&index, &[9]).score, 33);
    }

    #[test]
    fn truncated_weight_counts_as_no_match() {
        let index = index_with(10, 1, &[("a", vec![0, 0, 0, 9])]);
        let outcome = run(&index, &[9]);
        assert_eq!(outcome, MatchOutcome::no_match());
    }

    #[test]
    fn confidence_is_winner_share_of_total() {
        let index = index_with(10, 100, &[("a", vec![0, 1, 2, 3]), ("b", vec![0, 1, 9, 9])]);
        let outcome = run(&index, &[1, 2, 3]);
        // a: 100 + 100 + 100, b: 100
        assert_eq!(outcome.winner, index.reference_id("a"));
        assert_eq!(outcome.score, 300);
        assert_eq!(outcome.confidence, 75);
        assert_eq!(
            outcome.scores,
            vec![
                (index.reference_id("a").unwrap(), 300),
                (index.reference_id("b").unwrap(), 100)
            ]
        );
        assert!(outcome.confidence <= 100);
    }

    #[test]
    fn first_reference_to_reach_top_score_keeps_the_lead() {
        let index = index_with(10, 50, &[("a", vec![0, 4]), ("b", vec![0, 4])]);
        let outcome = run(&index, &[4]);
        assert_eq!(outcome.winner, index.reference_id("a"));
        assert_eq!(outcome.confidence, 50);
    }

    #[test]
    fn quality_labels() {
        assert_eq!(get_match_quality(100), "High");
        assert_eq!(get_match_quality(45), "Medium");
        assert_eq!(get_match_quality(0), "Low");
    }
}
