//! Greedy keyframe selection tests.

use keyshot::{Candidate, Histogram, HistogramDistance, KeyframeSelector, KeyshotError, Ranking};

fn luma(samples: &[u8]) -> Histogram {
    Histogram::from_luma(samples).expect("Failed to build histogram")
}

fn frame_numbers<'a, P: 'a>(candidates: impl Iterator<Item = &'a Candidate<P>>) -> Vec<u64> {
    candidates.map(Candidate::frame_number).collect()
}

/// Two dark frames, one bright, one mid-grey, with decreasing entropy.
fn mixed_candidates() -> Vec<Candidate<&'static str>> {
    vec![
        Candidate::with_entropy(0, luma(&[0; 4]), 3.0, "dark"),
        Candidate::with_entropy(1, luma(&[0; 4]), 2.9, "dark again"),
        Candidate::with_entropy(2, luma(&[255; 4]), 2.0, "bright"),
        Candidate::with_entropy(3, luma(&[128; 4]), 1.0, "grey"),
    ]
}

fn rank_mixed(keyframes: usize) -> Ranking<&'static str> {
    KeyframeSelector::new(keyframes)
        .with_metric(HistogramDistance::AbsoluteError)
        .rank(mixed_candidates())
        .expect("Failed to rank")
}

#[test]
fn identical_candidates_are_picked_in_frame_order() {
    let histogram = luma(&[10, 20, 30, 40]);
    let candidates: Vec<Candidate<()>> = (0..9)
        .rev()
        .map(|frame| Candidate::with_entropy(frame, histogram.clone(), 1.0, ()))
        .collect();

    let ranking = KeyframeSelector::new(9).rank(candidates).expect("Failed to rank");
    assert_eq!(frame_numbers(ranking.picks()), (0..9).collect::<Vec<u64>>());

    let first = ranking.picks().next().expect("Missing first pick");
    assert_eq!(first.min_diversity(), 1.0);
    assert_eq!(first.score(), 2.0);
    for later in ranking.picks().skip(1) {
        assert_eq!(later.min_diversity(), 0.0);
        assert_eq!(later.score(), 1.0);
    }
}

#[test]
fn diversity_beats_entropy() {
    let ranking = rank_mixed(2);

    // The second dark frame has more entropy but adds nothing new.
    assert_eq!(frame_numbers(ranking.picks()), vec![0, 2, 1, 3]);
    assert_eq!(frame_numbers(ranking.keyframes()), vec![0, 2]);
    assert_eq!(frame_numbers(ranking.entries().iter()), vec![3, 1, 2, 0]);
}

#[test]
fn picked_scores_are_recorded() {
    let ranking = rank_mixed(4);
    let scores: Vec<(u64, f64, f64)> = ranking
        .picks()
        .map(|c| (c.frame_number(), c.min_diversity(), c.score()))
        .collect();

    assert_eq!(
        scores,
        vec![(0, 1.0, 4.0), (2, 1.0, 3.0), (1, 0.0, 2.9), (3, 1.0, 2.0)]
    );
}

#[test]
fn into_parts_splits_keyframes_from_rest() {
    let (keyframes, rest) = rank_mixed(2).into_parts();
    assert_eq!(frame_numbers(keyframes.iter()), vec![0, 2]);
    assert_eq!(frame_numbers(rest.iter()), vec![1, 3]);

    let payloads: Vec<&str> = keyframes.into_iter().map(Candidate::into_payload).collect();
    assert_eq!(payloads, vec!["dark", "bright"]);
}

#[test]
fn ranking_is_independent_of_input_order() {
    let selector = KeyframeSelector::new(3).with_metric(HistogramDistance::KolmogorovSmirnov);
    let build = || -> Vec<Candidate<()>> {
        [
            (4, vec![0, 10, 20]),
            (9, vec![200, 210, 220]),
            (17, vec![100, 110, 120]),
            (23, vec![0, 10, 200]),
            (31, vec![50, 60, 70]),
        ]
        .into_iter()
        .map(|(frame, samples)| Candidate::new(frame, luma(&samples), ()))
        .collect()
    };

    let forward = selector.rank(build()).expect("Failed to rank");
    let mut reversed_input = build();
    reversed_input.reverse();
    let reversed = selector.rank(reversed_input).expect("Failed to rank");

    assert_eq!(frame_numbers(forward.picks()), frame_numbers(reversed.picks()));
}

#[test]
fn more_keyframes_than_candidates() {
    let ranking = rank_mixed(10);
    assert_eq!(ranking.len(), 4);
    assert_eq!(ranking.keyframe_count(), 4);
    let (keyframes, rest) = ranking.into_parts();
    assert_eq!(keyframes.len(), 4);
    assert!(rest.is_empty());
}

#[test]
fn empty_selection_is_rejected() {
    let selector = KeyframeSelector::new(3);
    assert!(matches!(
        selector.rank(Vec::<Candidate<()>>::new()),
        Err(KeyshotError::EmptySelection {
            candidates: 0,
            keyframes: 3
        })
    ));

    assert!(matches!(
        KeyframeSelector::new(0).rank(mixed_candidates()),
        Err(KeyshotError::EmptySelection {
            candidates: 4,
            keyframes: 0
        })
    ));
}

#[test]
fn incomparable_histograms_fail() {
    let mut narrow = Histogram::new(0, 15);
    narrow.count(3).expect("Failed to count");
    narrow.normalize(1.0).expect("Failed to normalize");

    let candidates = vec![
        Candidate::new(0, luma(&[1, 2, 3]), ()),
        Candidate::new(1, narrow, ()),
    ];
    assert!(matches!(
        KeyframeSelector::default().rank(candidates),
        Err(KeyshotError::RangeMismatch { .. })
    ));
}

#[test]
fn selector_defaults() {
    let selector = KeyframeSelector::default();
    assert_eq!(selector.keyframe_count(), 5);
    assert_eq!(selector.metric(), HistogramDistance::AbsoluteError);
}
