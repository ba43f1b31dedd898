//! Playlist data and traversal order
//!
//! [`PlaylistSequencer`] is the pure stepping logic behind the controller's
//! playlist loop: it owns the track list, the repeat/shuffle flags and the
//! current index, and decides per iteration whether to play, skip, or
//! finish. Keeping it free of threads makes the traversal order directly
//! testable.

use rand::seq::SliceRandom;
use rand::Rng;

/// An ordered list of track URIs plus traversal flags.
#[derive(Debug, Clone)]
pub struct Playlist {
    pub tracks: Vec<String>,
    pub repeat: bool,
    pub shuffle: bool,
}

impl Playlist {
    pub fn new(tracks: Vec<String>) -> Self {
        Self {
            tracks,
            repeat: false,
            shuffle: false,
        }
    }

    pub fn with_repeat(mut self, repeat: bool) -> Self {
        self.repeat = repeat;
        self
    }

    pub fn with_shuffle(mut self, shuffle: bool) -> Self {
        self.shuffle = shuffle;
        self
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }
}

/// What the controller should do this iteration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SequenceStep {
    /// Run a playback session for this URI
    Play(String),
    /// Advance past this URI without a session (previous attempt failed)
    Skip(String),
    /// Traversal is complete
    Finished,
}

/// Stepwise playlist traversal.
///
/// Two deliberate policies: a non-repeating playlist of length N finishes
/// *before* attempting its final track (at most N−1 plays), and shuffle
/// re-permutes the entire list on every iteration, so an already-played
/// track can be drawn again.
#[derive(Debug)]
pub struct PlaylistSequencer {
    tracks: Vec<String>,
    repeat: bool,
    shuffle: bool,
    index: usize,
    suppress_next: bool,
}

impl PlaylistSequencer {
    pub fn new(playlist: Playlist) -> Self {
        Self {
            tracks: playlist.tracks,
            repeat: playlist.repeat,
            shuffle: playlist.shuffle,
            index: 0,
            suppress_next: false,
        }
    }

    /// Produce the next step and advance the index.
    pub fn next_step<R: Rng>(&mut self, rng: &mut R) -> SequenceStep {
        if self.tracks.is_empty() {
            return SequenceStep::Finished;
        }
        if !self.repeat && self.index >= self.tracks.len() - 1 {
            return SequenceStep::Finished;
        }

        if self.shuffle {
            self.tracks.shuffle(rng);
        }

        let uri = self.tracks[self.index].clone();
        let step = if self.suppress_next {
            self.suppress_next = false;
            SequenceStep::Skip(uri)
        } else {
            SequenceStep::Play(uri)
        };

        self.index = if self.repeat {
            (self.index + 1) % self.tracks.len()
        } else {
            self.index + 1
        };

        step
    }

    /// Record that the last issued play attempt failed; the next step will
    /// be a skip, after which traversal resumes normally.
    pub fn record_failure(&mut self) {
        self.suppress_next = true;
    }

    pub fn index(&self) -> usize {
        self.index
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn uris(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn collect_steps(mut seq: PlaylistSequencer, limit: usize) -> Vec<SequenceStep> {
        let mut rng = StdRng::seed_from_u64(7);
        let mut steps = Vec::new();
        for _ in 0..limit {
            let step = seq.next_step(&mut rng);
            if step == SequenceStep::Finished {
                steps.push(step);
                break;
            }
            steps.push(step);
        }
        steps
    }

    #[test]
    fn test_non_repeating_plays_at_most_n_minus_one() {
        let seq = PlaylistSequencer::new(Playlist::new(uris(&["a", "b", "c"])));
        let steps = collect_steps(seq, 10);
        assert_eq!(
            steps,
            vec![
                SequenceStep::Play("a".into()),
                SequenceStep::Play("b".into()),
                SequenceStep::Finished,
            ]
        );
    }

    #[test]
    fn test_single_track_without_repeat_plays_nothing() {
        let seq = PlaylistSequencer::new(Playlist::new(uris(&["only"])));
        let steps = collect_steps(seq, 5);
        assert_eq!(steps, vec![SequenceStep::Finished]);
    }

    #[test]
    fn test_empty_playlist_finishes_immediately() {
        let seq = PlaylistSequencer::new(Playlist::new(Vec::new()).with_repeat(true));
        let steps = collect_steps(seq, 5);
        assert_eq!(steps, vec![SequenceStep::Finished]);
    }

    #[test]
    fn test_repeat_wraps_indefinitely() {
        let mut seq =
            PlaylistSequencer::new(Playlist::new(uris(&["x", "y", "z"])).with_repeat(true));
        let mut rng = StdRng::seed_from_u64(1);

        let mut played = Vec::new();
        for _ in 0..7 {
            match seq.next_step(&mut rng) {
                SequenceStep::Play(uri) => played.push(uri),
                other => panic!("unexpected step under repeat: {:?}", other),
            }
        }
        assert_eq!(played, vec!["x", "y", "z", "x", "y", "z", "x"]);
    }

    #[test]
    fn test_single_track_with_repeat_replays() {
        let mut seq = PlaylistSequencer::new(Playlist::new(uris(&["loop"])).with_repeat(true));
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..5 {
            assert_eq!(seq.next_step(&mut rng), SequenceStep::Play("loop".into()));
        }
    }

    #[test]
    fn test_failure_skips_exactly_one_track() {
        let mut seq =
            PlaylistSequencer::new(Playlist::new(uris(&["a", "b", "c", "d", "e"])));
        let mut rng = StdRng::seed_from_u64(1);

        assert_eq!(seq.next_step(&mut rng), SequenceStep::Play("a".into()));
        assert_eq!(seq.next_step(&mut rng), SequenceStep::Play("b".into()));
        // b's session reported failure
        seq.record_failure();
        assert_eq!(seq.next_step(&mut rng), SequenceStep::Skip("c".into()));
        // Traversal resumes normally after the single skip
        assert_eq!(seq.next_step(&mut rng), SequenceStep::Play("d".into()));
        assert_eq!(seq.next_step(&mut rng), SequenceStep::Finished);
    }

    #[test]
    fn test_shuffle_permutes_whole_list_each_iteration() {
        let tracks = uris(&["a", "b", "c", "d", "e", "f", "g", "h"]);
        let mut seq = PlaylistSequencer::new(
            Playlist::new(tracks.clone()).with_repeat(true).with_shuffle(true),
        );
        let mut rng = StdRng::seed_from_u64(42);

        let mut seen = Vec::new();
        for _ in 0..100 {
            match seq.next_step(&mut rng) {
                SequenceStep::Play(uri) => {
                    assert!(tracks.contains(&uri));
                    seen.push(uri);
                }
                other => panic!("unexpected step: {:?}", other),
            }
        }
        // Whole-list reshuffles repeat tracks before the list is exhausted
        let mut sorted = seen.clone();
        sorted.sort();
        sorted.dedup();
        assert!(sorted.len() > 1, "shuffle should vary the selection");
    }
}
