//! Frame index tests on scripted sources.

mod common;

use common::{STEP, ScriptedPacket, SyntheticSource, VIDEO_STREAM};
use keyshot::{FrameIndex, FrameRecord, KeyshotError};

fn record(pts: i64, dts: i64, is_keyframe: bool) -> FrameRecord {
    FrameRecord {
        pts,
        dts,
        is_keyframe,
    }
}

#[test]
fn scan_sequential_stream() {
    let mut source = SyntheticSource::sequential(30, 10);
    let index = FrameIndex::scan(&mut source).expect("Failed to scan");

    assert_eq!(index.len(), 30);
    assert!(!index.is_empty());
    assert_eq!(index.keyframe_count(), 3);
    assert_eq!(index.get(0), Some(&record(0, 0, true)));
    assert_eq!(index.get(17), Some(&record(17 * STEP, 17 * STEP, false)));
    assert_eq!(index.get(30), None);
}

#[test]
fn scan_sorts_into_presentation_order() {
    let mut source = SyntheticSource::reordered(4);
    let index = FrameIndex::scan(&mut source).expect("Failed to scan");

    let pts: Vec<i64> = index.records().iter().map(|r| r.pts).collect();
    let expected: Vec<i64> = (0..16).map(|i| i * STEP).collect();
    assert_eq!(pts, expected);

    // The P frame of the second group is stored second but displayed last.
    assert_eq!(index.get(7), Some(&record(7 * STEP, 4 * STEP, false)));
    assert_eq!(index.get(4), Some(&record(4 * STEP, 3 * STEP, true)));
}

#[test]
fn scan_ignores_other_streams() {
    let mut packets = Vec::new();
    for i in 0..10 {
        packets.push(ScriptedPacket::audio(i * STEP + 3));
        packets.push(ScriptedPacket::video(i * STEP, i * STEP, i == 0));
    }
    let mut source = SyntheticSource::new(packets).with_start_time(0);
    let index = FrameIndex::scan(&mut source).expect("Failed to scan");

    assert_eq!(index.len(), 10);
    assert!(index.records().iter().all(|r| r.pts % STEP == 0));
}

#[test]
fn scan_drops_packets_before_start_time() {
    let packets = (-3..12)
        .map(|i| ScriptedPacket::video(i * STEP, i * STEP, i % 5 == 0))
        .collect();
    let mut source = SyntheticSource::new(packets).with_start_time(0);
    let index = FrameIndex::scan(&mut source).expect("Failed to scan");

    assert_eq!(index.len(), 12);
    assert_eq!(index.get(0).map(|r| r.pts), Some(0));
}

#[test]
fn scan_without_start_time_keeps_everything() {
    let packets = (-3..12)
        .map(|i| ScriptedPacket::video(i * STEP, i * STEP, i % 5 == 0))
        .collect();
    let mut source = SyntheticSource::new(packets);
    let index = FrameIndex::scan(&mut source).expect("Failed to scan");

    assert_eq!(index.len(), 15);
    assert_eq!(index.get(0).map(|r| r.pts), Some(-3 * STEP));
}

#[test]
fn scan_falls_back_between_timestamps() {
    let packets = vec![
        ScriptedPacket::video(0, 0, true),
        ScriptedPacket {
            stream_index: VIDEO_STREAM,
            pts: None,
            dts: Some(STEP),
            is_key: false,
            produces_picture: true,
        },
        ScriptedPacket {
            stream_index: VIDEO_STREAM,
            pts: Some(2 * STEP),
            dts: None,
            is_key: false,
            produces_picture: true,
        },
        ScriptedPacket {
            stream_index: VIDEO_STREAM,
            pts: None,
            dts: None,
            is_key: false,
            produces_picture: true,
        },
    ];
    let mut source = SyntheticSource::new(packets);
    let index = FrameIndex::scan(&mut source).expect("Failed to scan");

    assert_eq!(
        index.records(),
        &[
            record(0, 0, true),
            record(STEP, STEP, false),
            record(2 * STEP, 2 * STEP, false),
        ]
    );
}

#[test]
fn scan_leaves_out_untimed_and_early_packets() {
    let untimed = ScriptedPacket {
        stream_index: VIDEO_STREAM,
        pts: None,
        dts: None,
        is_key: false,
        produces_picture: true,
    };
    let packets = vec![
        ScriptedPacket::video(-STEP, -STEP, true),
        ScriptedPacket::video(0, 0, true),
        untimed,
        ScriptedPacket::video(STEP, STEP, false),
        untimed,
        ScriptedPacket::video(2 * STEP, 2 * STEP, false),
    ];
    let mut source = SyntheticSource::new(packets).with_start_time(0);
    let index = FrameIndex::scan(&mut source).expect("Failed to scan");

    assert_eq!(
        index.records(),
        &[
            record(0, 0, true),
            record(STEP, STEP, false),
            record(2 * STEP, 2 * STEP, false),
        ]
    );
}

#[test]
fn scan_rewinds_the_source() {
    let mut source = SyntheticSource::sequential(20, 5);
    FrameIndex::scan(&mut source).expect("Failed to scan");
    assert_eq!(source.seek_count(), 1);
}

#[test]
fn scan_read_error_is_reported() {
    let mut source = SyntheticSource::sequential(20, 5).with_read_error_at(7);
    match FrameIndex::scan(&mut source) {
        Err(KeyshotError::Scan(message)) => {
            assert!(message.contains("scripted read failure"), "{message}");
        }
        other => panic!("Expected Scan error, got: {other:?}"),
    }
}

#[test]
fn scan_empty_stream() {
    let mut source = SyntheticSource::new(vec![ScriptedPacket::audio(0)]);
    let index = FrameIndex::scan(&mut source).expect("Failed to scan");
    assert!(index.is_empty());
    assert_eq!(index.keyframe_count(), 0);
}

// ── Lookups ────────────────────────────────────────────────────────

#[test]
fn duplicate_timestamps_keep_first_read() {
    let index = FrameIndex::from_records(vec![
        record(20, 20, false),
        record(0, 0, true),
        record(10, 10, false),
        record(10, 11, true),
    ]);

    assert_eq!(index.len(), 3);
    assert_eq!(index.get(1), Some(&record(10, 10, false)));
}

#[test]
fn frame_with_pts_lookups() {
    let index = FrameIndex::from_records((0..10).map(|i| record(i * STEP, i * STEP, i == 0)).collect());

    assert_eq!(index.frame_with_pts(0), Some(0));
    assert_eq!(index.frame_with_pts(7 * STEP), Some(7));
    assert_eq!(index.frame_with_pts(7 * STEP + 1), None);
    assert_eq!(index.frame_with_pts_from(5, 7 * STEP), Some(7));
    assert_eq!(index.frame_with_pts_from(8, 7 * STEP), None);
}

#[test]
fn keyframe_before_frame() {
    let index = FrameIndex::from_records(
        (0..25).map(|i| record(i * STEP, i * STEP, i % 10 == 0)).collect(),
    );

    assert_eq!(index.keyframe_before(0), None);
    assert_eq!(index.keyframe_before(1), Some(0));
    assert_eq!(index.keyframe_before(10), Some(0));
    assert_eq!(index.keyframe_before(11), Some(10));
    assert_eq!(index.keyframe_before(24), Some(20));
    assert_eq!(index.keyframe_before(u64::MAX), Some(20));
}

#[test]
fn group_of_pictures_summary() {
    let keyframes = [0, 10, 15, 30];
    let index = FrameIndex::from_records(
        (0..40)
            .map(|i| record(i * STEP, i * STEP, keyframes.contains(&i)))
            .collect(),
    );

    let summary = index.group_of_pictures();
    assert_eq!(summary.keyframes, 4);
    assert_eq!(summary.max_size, 15);
    assert!((summary.average_size - 10.0).abs() < 1e-9);
}

#[test]
fn group_of_pictures_without_keyframes() {
    let index = FrameIndex::from_records(vec![record(0, 0, false), record(1, 1, false)]);
    let summary = index.group_of_pictures();
    assert_eq!(summary.keyframes, 0);
    assert_eq!(summary.max_size, 0);
    assert_eq!(summary.average_size, 0.0);
}
