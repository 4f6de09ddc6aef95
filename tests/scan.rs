mod common;

use common::*;
use either::Either::{Left, Right};
use telemux::sans::{
    extract::RecordExtractor,
    range::ByteRange,
    record::Value,
    scan::{FrameError, FrameScanner, ScanEvent},
    schema::ParserConfig,
    state::InProcessFrame,
};

fn range(start: usize, end: usize) -> ByteRange {
    ByteRange::new(start, end).unwrap()
}

fn scan(bytes: &[u8], open: bool) -> Vec<ScanEvent> {
    FrameScanner::new(&config()).scan_range(bytes, range(0, bytes.len()), open)
}

#[test]
fn locates_frames_of_every_type() {
    let stream = Stream::new()
        .noise(3)
        .frame(ct_frame(&[(1, 2000, 0)]))
        .noise(2)
        .frame(co_frame(500, &[-3, 4, 9]))
        .noise(1);

    let events = scan(&stream.bytes, true);

    assert_eq!(
        events,
        [
            ScanEvent::Located {
                range: range(3, 15),
                schema: 0,
                total: 1,
            },
            ScanEvent::Located {
                range: range(17, 31),
                schema: 1,
                total: 3,
            },
        ]
    );
}

#[test]
fn checksum_error_resolves_only_the_header() {
    let mut bad = ct_frame(&[(1, 2000, 0), (2, 2001, 0)]);
    bad[6] ^= 0x40;

    let stream = Stream::new().frame(bad).frame(ct_frame(&[(3, 2002, 0)]));
    let events = scan(&stream.bytes, true);

    assert_eq!(events.len(), 2);
    assert!(matches!(
        &events[0],
        ScanEvent::Corrupt {
            span,
            error: FrameError::Checksum { offset: 0, frame_type, .. },
        } if *span == range(0, 5) && frame_type == "ct"
    ));
    assert!(matches!(
        events[1],
        ScanEvent::Located { schema: 0, total: 1, .. }
    ));
}

#[test]
fn trailer_error_is_corrupt() {
    let mut bad = ct_frame(&[(1, 2000, 0)]);
    *bad.last_mut().unwrap() = 0x04;

    let events = scan(&bad, true);

    assert!(matches!(
        events[..],
        [ScanEvent::Corrupt {
            error: FrameError::Trailer { offset: 0, .. },
            ..
        }]
    ));
}

#[test]
fn implausible_length_is_corrupt() {
    let mut bad = ct_frame(&[(1, 2000, 0)]);
    bad[3..5].copy_from_slice(&0x0FFCu16.to_be_bytes());

    let events = scan(&bad, true);

    assert!(matches!(
        events[..],
        [ScanEvent::Corrupt {
            error: FrameError::Length { offset: 0, .. },
            ..
        }]
    ));

    let mut ragged = ct_frame(&[(1, 2000, 0)]);
    ragged[3..5].copy_from_slice(&3u16.to_be_bytes());

    let events = scan(&ragged, true);

    assert!(matches!(
        events[..],
        [ScanEvent::Corrupt {
            error: FrameError::Length { reason, .. },
            ..
        }] if reason == "not a whole number of records"
    ));
}

#[test]
fn oversized_length_is_corrupt() {
    let config = ParserConfig::from_json(
        r##"{
          "frame_types": [{
            "name": "hx",
            "marker": [35],
            "header_len": 17,
            "length": { "offset": 1, "type": "hex_ascii", "width": 16 },
            "record": { "width": 1, "fields": [{ "name": "b", "offset": 0, "type": "u8" }] }
          }]
        }"##,
    )
    .unwrap();

    let mut bytes = vec![0x80, b'#'];
    bytes.extend(b"FFFFFFFFFFFFFFEE");
    bytes.extend([0; 8]);

    let events = FrameScanner::new(&config).scan_range(&bytes, range(0, bytes.len()), true);

    assert!(matches!(
        &events[..],
        [ScanEvent::Corrupt {
            span,
            error: FrameError::Length { offset: 1, .. },
        }] if *span == range(1, 18)
    ));
}

#[test]
fn unreadable_hex_length_is_corrupt() {
    let mut bad = co_frame(1, &[1, 2]);
    bad[3] = b'Z';

    let events = scan(&bad, true);

    assert!(matches!(
        &events[..],
        [ScanEvent::Corrupt { span, .. }] if *span == range(0, 7)
    ));
}

#[test]
fn fill_marks_a_placeholder() {
    let mut frame = ct_frame(&[(1, 2000, 5), (2, 2001, 5), (3, 2002, 5), (4, 2003, 5)]);
    frame[13..21].fill(0);

    let stream = Stream::new().frame(frame).frame(ct_frame(&[(5, 2004, 0)]));
    let events = scan(&stream.bytes, true);

    assert_eq!(
        events[0],
        ScanEvent::Placeholder {
            range: range(0, 24),
            schema: 0,
        }
    );
    assert!(matches!(events[1], ScanEvent::Located { total: 1, .. }));
}

#[test]
fn zero_records_inside_a_corrupt_frame_are_not_fill() {
    let mut frame = ct_frame(&[(1, 2000, 7), (0, 0, 0), (2, 2001, 7)]);
    frame[17] ^= 0xFF;

    let stream = Stream::new().frame(frame).frame(ct_frame(&[(5, 2004, 0)]));
    let events = scan(&stream.bytes, true);

    assert!(matches!(
        &events[..],
        [
            ScanEvent::Corrupt {
                span,
                error: FrameError::Checksum { offset: 0, .. },
            },
            ScanEvent::Located { total: 1, .. },
        ] if *span == range(0, 5)
    ));
}

#[test]
fn fill_must_cover_whole_records_at_an_edge() {
    // A run that straddles two records is not a placeholder.
    let mut straddling = ct_frame(&[(1, 2000, 5), (2, 2001, 5), (3, 2002, 5)]);
    straddling[7..15].fill(0);
    assert!(matches!(scan(&straddling, true)[..], [ScanEvent::Corrupt { .. }]));

    // Nor is a single zero record, shorter than the minimum run.
    let mut single = ct_frame(&[(1, 2000, 5), (2, 2001, 5), (0, 0, 0)]);
    single[17] ^= 0xFF;
    assert!(matches!(scan(&single, true)[..], [ScanEvent::Corrupt { .. }]));

    let mut leading = ct_frame(&[(1, 2000, 5), (2, 2001, 5), (3, 2002, 5)]);
    leading[5..13].fill(0);
    assert!(matches!(scan(&leading, true)[..], [ScanEvent::Placeholder { .. }]));
}

#[test]
fn incomplete_frame_stops_an_open_range() {
    let frame = ct_frame(&[(1, 2000, 0), (2, 2001, 0)]);
    let truncated = Stream::new()
        .frame(ct_frame(&[(1, 2000, 0)]))
        .frame(frame[..10].to_vec());

    let events = scan(&truncated.bytes, true);

    assert_eq!(
        events[1..],
        [ScanEvent::Incomplete {
            offset: 12,
            schema: 0,
        }]
    );

    // A closed range cannot hold the frame, so the marker is not one.
    let events = scan(&truncated.bytes, false);
    assert_eq!(events.len(), 1);
}

#[test]
fn frame_at_reverifies_a_located_frame() {
    let scanner = FrameScanner::new(&config());
    let frame = co_frame(77, &[1, 2]);

    let verified = scanner.frame_at(&frame, 40).unwrap();
    assert_eq!(verified.schema, 1);
    assert_eq!(verified.bytes, 0..frame.len());
    assert_eq!(verified.payload, 7..11);
    assert_eq!(verified.total, 2);

    let mut damaged = frame.clone();
    damaged[8] ^= 1;
    assert!(scanner.frame_at(&damaged, 40).is_err());

    assert_eq!(
        scanner.frame_at(&[0x80; 12], 40),
        Err(FrameError::Stale { offset: 40 })
    );
}

#[test]
fn extractor_attaches_header_fields() {
    let config = config();
    let scanner = FrameScanner::new(&config);
    let extractor = RecordExtractor::new(&config).unwrap();

    let bytes = co_frame(500, &[-3, 4]);
    let frame = scanner.frame_at(&bytes, 100).unwrap();
    let state = InProcessFrame::new(range(100, 100 + bytes.len()), 2, 1).unwrap();

    let (record, successor) = extractor.advance(state, &bytes, &frame);
    let record = record.unwrap();

    assert_eq!(record.frame_type, "co");
    assert_eq!(record.frame_offset, 100);
    assert_eq!(record.index, 1);
    assert_eq!(
        record.fields,
        [
            ("clock".to_string(), Value::U16(500)),
            ("offset".to_string(), Value::I16(4)),
        ]
    );
    assert_eq!(successor, Right(range(100, 100 + bytes.len())));
}

#[test]
fn predicate_consumes_rejected_records() {
    let config = filtered_config(Some(7));
    let scanner = FrameScanner::new(&config);
    let extractor = RecordExtractor::new(&config).unwrap();

    let bytes = ct_frame(&[(7, 2000, 0), (8, 2001, 0), (7, 2002, 0)]);
    let frame = scanner.frame_at(&bytes, 0).unwrap();
    let mut state = InProcessFrame::new(range(0, bytes.len()), 3, 0).unwrap();

    let mut emitted = Vec::new();
    loop {
        let (record, successor) = extractor.advance(state, &bytes, &frame);
        emitted.push(record.map(|r| r.index));

        match successor {
            Left(next) => state = next,
            Right(_) => break,
        }
    }

    assert_eq!(emitted, [Some(0), None, Some(2)]);
}
