//! Keyframe extraction pipeline tests on scripted sources.

mod common;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use common::{HEIGHT, STEP, ScriptedPacket, SyntheticSource};
use keyshot::{
    AspectRatio, CancellationToken, CandidateStrategy, DecodeMode, ExtractOptions, Extraction,
    FrameCursor, KeyshotError, OperationType, ProgressCallback, ProgressInfo, SeekDirection,
    extract_keyframes,
};

fn extract(source: SyntheticSource, options: &ExtractOptions) -> Result<Extraction, KeyshotError> {
    let mut cursor = FrameCursor::new(source).expect("Failed to index");
    extract_keyframes(&mut cursor, options)
}

fn ranked_frames(extraction: &Extraction) -> Vec<(u64, bool)> {
    extraction
        .ranking
        .iter()
        .map(|frame| (frame.frame_number, frame.selected))
        .collect()
}

#[test]
fn extracts_requested_keyframes() {
    let options = ExtractOptions::new().with_keyframe_count(3);
    let extraction =
        extract(SyntheticSource::sequential(100, 10), &options).expect("Failed to extract");

    assert_eq!(extraction.ranking.len(), 6);
    assert_eq!(extraction.keyframes.len(), 3);
    assert_eq!(extraction.ranking.iter().filter(|frame| frame.selected).count(), 3);

    let mut examined: Vec<u64> = extraction.ranking.iter().map(|f| f.frame_number).collect();
    examined.sort_unstable();
    assert_eq!(examined, vec![14, 28, 42, 57, 71, 85]);

    // Keyframes are the first picks, in pick order.
    for (keyframe, ranked) in extraction.keyframes.iter().zip(&extraction.ranking) {
        assert!(ranked.selected);
        assert_eq!(keyframe.frame_number, ranked.frame_number);
        assert_eq!(keyframe.score, ranked.score);
        assert_eq!(keyframe.pts, keyframe.frame_number as i64 * STEP);
    }
}

#[test]
fn timestamps_follow_the_time_base() {
    let options = ExtractOptions::new().with_keyframe_count(1).with_candidate_count(1);
    let extraction =
        extract(SyntheticSource::sequential(100, 10), &options).expect("Failed to extract");

    let keyframe = &extraction.keyframes[0];
    assert_eq!(keyframe.frame_number, 50);
    assert_eq!(keyframe.timestamp, Duration::from_secs(5));
}

#[test]
fn picked_scores_never_increase() {
    let options = ExtractOptions::new()
        .with_keyframe_count(4)
        .with_candidate_count(12);
    let extraction =
        extract(SyntheticSource::sequential(300, 30), &options).expect("Failed to extract");

    for pair in extraction.ranking.windows(2) {
        assert!(pair[0].score >= pair[1].score, "{pair:?}");
    }
    assert_eq!(extraction.ranking[0].min_diversity, 1.0);
}

#[test]
fn seek_and_sequential_modes_agree() {
    let seek = ExtractOptions::new().with_keyframe_count(3);
    let sequential = ExtractOptions::new()
        .with_keyframe_count(3)
        .with_decode_mode(DecodeMode::Sequential);

    let a = extract(SyntheticSource::reordered(25), &seek).expect("Failed to extract");
    let b = extract(SyntheticSource::reordered(25), &sequential).expect("Failed to extract");
    assert_eq!(ranked_frames(&a), ranked_frames(&b));
}

#[test]
fn undecodable_candidates_settle_forward() {
    for mode in [DecodeMode::Seek, DecodeMode::Sequential] {
        let source = SyntheticSource::sequential(100, 10).with_missing_picture(14 * STEP);
        let options = ExtractOptions::new()
            .with_keyframe_count(3)
            .with_decode_mode(mode);
        let extraction = extract(source, &options).expect("Failed to extract");

        let examined: Vec<u64> = extraction.ranking.iter().map(|f| f.frame_number).collect();
        assert!(examined.contains(&15), "{mode:?}: {examined:?}");
        assert!(!examined.contains(&14), "{mode:?}: {examined:?}");
        assert_eq!(examined.len(), 6);
    }
}

#[test]
fn sequential_mode_survives_a_leading_unindexed_picture() {
    // The rewind lands on a sync packet before the stream start.
    let leading_source = || {
        let mut packets = vec![ScriptedPacket::video(-STEP, -STEP, true)];
        packets.extend(
            (0..100).map(|i| ScriptedPacket::video(i * STEP, i * STEP, i > 0 && i % 10 == 0)),
        );
        SyntheticSource::new(packets).with_start_time(0)
    };
    let seek = ExtractOptions::new().with_keyframe_count(3);
    let sequential = ExtractOptions::new()
        .with_keyframe_count(3)
        .with_decode_mode(DecodeMode::Sequential);

    let b = extract(leading_source(), &sequential).expect("Failed to extract");
    assert_eq!(b.keyframes.len(), 3);
    let mut examined: Vec<u64> = b.ranking.iter().map(|f| f.frame_number).collect();
    examined.sort_unstable();
    assert_eq!(examined, vec![14, 28, 42, 57, 71, 85]);
    for keyframe in &b.keyframes {
        assert_eq!(keyframe.pts, keyframe.frame_number as i64 * STEP);
    }

    let a = extract(leading_source(), &seek).expect("Failed to extract");
    assert_eq!(ranked_frames(&a), ranked_frames(&b));
}

#[test]
fn nothing_decodable_is_an_empty_selection() {
    let mut source = SyntheticSource::sequential(20, 5);
    for frame in 10..20 {
        source = source.with_missing_picture(frame * STEP);
    }
    let options = ExtractOptions::new().with_keyframe_count(1).with_candidate_count(1);

    assert!(matches!(
        extract(source, &options),
        Err(KeyshotError::EmptySelection {
            candidates: 0,
            keyframes: 1
        })
    ));
}

#[test]
fn sequential_mode_rewinds_a_used_cursor() {
    let options = ExtractOptions::new()
        .with_keyframe_count(2)
        .with_decode_mode(DecodeMode::Sequential);

    let fresh = extract(SyntheticSource::sequential(60, 6), &options).expect("Failed to extract");

    let mut cursor = FrameCursor::new(SyntheticSource::sequential(60, 6)).expect("Failed to index");
    cursor.seek_to(45, SeekDirection::Exact).expect("Failed to seek");
    let reused = extract_keyframes(&mut cursor, &options).expect("Failed to extract");

    assert_eq!(ranked_frames(&fresh), ranked_frames(&reused));
}

#[test]
fn seeded_random_strategy_is_reproducible() {
    let options = ExtractOptions::new()
        .with_keyframe_count(3)
        .with_strategy(CandidateStrategy::Random { seed: Some(11) });

    let a = extract(SyntheticSource::sequential(200, 20), &options).expect("Failed to extract");
    let b = extract(SyntheticSource::sequential(200, 20), &options).expect("Failed to extract");
    assert_eq!(ranked_frames(&a), ranked_frames(&b));
    assert_eq!(a.ranking.len(), 6);
}

#[test]
fn aspect_crop_is_applied_to_keyframes() {
    let options = ExtractOptions::new()
        .with_keyframe_count(2)
        .with_aspect_crop(AspectRatio::new(1, 1).expect("Invalid ratio"));
    let extraction =
        extract(SyntheticSource::sequential(40, 10), &options).expect("Failed to extract");

    for keyframe in &extraction.keyframes {
        assert_eq!(keyframe.image.width(), HEIGHT);
        assert_eq!(keyframe.image.height(), HEIGHT);
    }
}

// ── Errors ─────────────────────────────────────────────────────────

#[test]
fn empty_stream_is_rejected() {
    let source = SyntheticSource::new(vec![ScriptedPacket::audio(0)]);
    assert!(matches!(
        extract(source, &ExtractOptions::new()),
        Err(KeyshotError::EmptyFrameIndex)
    ));
}

#[test]
fn zero_keyframes_is_rejected() {
    let options = ExtractOptions::new().with_keyframe_count(0);
    assert!(matches!(
        extract(SyntheticSource::sequential(10, 5), &options),
        Err(KeyshotError::EmptySelection { keyframes: 0, .. })
    ));
}

#[test]
fn too_many_random_candidates() {
    let options = ExtractOptions::new()
        .with_candidate_count(50)
        .with_strategy(CandidateStrategy::Random { seed: Some(1) });
    assert!(matches!(
        extract(SyntheticSource::sequential(20, 5), &options),
        Err(KeyshotError::CandidatePoolExhausted { requested: 50, .. })
    ));
}

#[test]
fn cancelled_extraction_returns_error() {
    for mode in [DecodeMode::Seek, DecodeMode::Sequential] {
        let token = CancellationToken::new();
        token.cancel();
        let options = ExtractOptions::new()
            .with_decode_mode(mode)
            .with_cancellation(token);

        match extract(SyntheticSource::sequential(50, 10), &options) {
            Err(KeyshotError::Cancelled) => {}
            other => panic!("Expected Cancelled, got: {other:?}"),
        }
    }
}

// ── Progress ───────────────────────────────────────────────────────

struct RecordingProgress {
    infos: Mutex<Vec<ProgressInfo>>,
}

impl ProgressCallback for RecordingProgress {
    fn on_progress(&self, info: &ProgressInfo) {
        self.infos.lock().unwrap().push(info.clone());
    }
}

#[test]
fn progress_reports_each_stage() {
    let recorder = Arc::new(RecordingProgress {
        infos: Mutex::new(Vec::new()),
    });
    let options = ExtractOptions::new()
        .with_keyframe_count(3)
        .with_progress(recorder.clone());
    extract(SyntheticSource::sequential(100, 10), &options).expect("Failed to extract");

    let infos = recorder.infos.lock().unwrap();
    let decoding: Vec<&ProgressInfo> = infos
        .iter()
        .filter(|info| info.operation == OperationType::CandidateDecoding)
        .collect();
    let selection: Vec<&ProgressInfo> = infos
        .iter()
        .filter(|info| info.operation == OperationType::Selection)
        .collect();

    // One report per item plus the final one.
    assert_eq!(decoding.len(), 7);
    assert_eq!(selection.len(), 4);
    assert_eq!(decoding.last().map(|info| info.current), Some(6));
    assert_eq!(decoding[0].total, Some(6));
    assert_eq!(selection.last().map(|info| info.percentage), Some(Some(100.0)));
    assert_eq!(decoding[0].current_frame, Some(14));
}
