#![cfg(feature = "derive")]

mod common;

use common::*;
use telemux::{
    Parser, ParserConfig,
    avec::{FromRecord, FromRecords, collect, sink::Collector},
};

#[test]
fn collect_deployment() {
    let stream = Stream::new()
        .frame(ct_frame(&[(1, 2150, 3), (2, 2175, 4)]))
        .noise(4)
        .frame(co_frame(300, &[-5, 6]))
        .frame(ct_frame(&[(3, 2200, 0)]));

    let mut parser = Parser::new(&config(), None, &stream.bytes[..], Collector::new()).unwrap();
    let records = parser.get_records(100).unwrap();

    let mut deployment = Deployment::default();
    collect(&records, &mut deployment);

    assert_eq!(
        deployment.readings,
        [
            Reading {
                frame_offset: Some(0),
                index: Some(0),
                id: Some(1),
                temperature_c: 21.5,
                flags: vec![3],
            },
            Reading {
                frame_offset: Some(0),
                index: Some(1),
                id: Some(2),
                temperature_c: 21.75,
                flags: vec![4],
            },
            Reading {
                frame_offset: Some(32),
                index: Some(0),
                id: Some(3),
                temperature_c: 22.0,
                flags: vec![0],
            },
        ]
    );

    // Only the last `co` record is kept.
    assert_eq!(
        deployment.clock_offset,
        Some(ClockOffset {
            clock: Some(300),
            offset: 6,
        })
    );
}

#[derive(Debug, Default, FromRecords)]
struct Deployment {
    #[record("ct")]
    readings: Vec<Reading>,
    #[record("co")]
    clock_offset: Option<ClockOffset>,
}

#[derive(Debug, Default, PartialEq, FromRecord)]
struct Reading {
    #[field(offset)]
    frame_offset: Option<usize>,
    #[field(index)]
    index: Option<usize>,
    #[field("id")]
    id: Option<u8>,
    #[field("temperature", |t, raw: u16| *t = f32::from(raw) / 100.0)]
    temperature_c: f32,
    #[field("flags", |f, raw: u8| f.push(raw))]
    flags: Vec<u8>,
}

#[derive(Debug, Default, PartialEq, FromRecord)]
struct ClockOffset {
    #[field("clock")]
    clock: Option<u16>,
    #[field("offset", |o, raw: i16| *o = i32::from(raw))]
    offset: i32,
}

const SERIAL_CONFIG: &str = r#"{
  "frame_types": [{
    "name": "sn",
    "marker": [36, 83, 78],
    "header_len": 5,
    "length": { "offset": 3, "type": "hex_ascii", "width": 2 },
    "trailer": [13, 10],
    "record": {
      "width": 6,
      "fields": [
        { "name": "serial", "offset": 0, "type": "hex_ascii", "len": 4 },
        { "name": "tag", "offset": 4, "type": "bytes", "len": 2 }
      ]
    }
  }]
}"#;

#[test]
fn text_and_byte_fields() {
    let config = ParserConfig::from_json(SERIAL_CONFIG).unwrap();
    let stream = b"$SN0C1A2BxyFFFFzz\r\n";

    let mut parser = Parser::new(&config, None, &stream[..], Collector::new()).unwrap();
    let records = parser.get_records(100).unwrap();

    let mut inventory = Inventory::default();
    collect(&records, &mut inventory);

    assert_eq!(
        inventory.instruments,
        [
            Instrument {
                serial: Some(0x1A2B),
                tag: Some(b"xy".to_vec()),
            },
            Instrument {
                serial: Some(0xFFFF),
                tag: Some(b"zz".to_vec()),
            },
        ]
    );

    let mut log = TagLog::default();
    for record in &records {
        record.publish(&mut log);
    }
    assert_eq!(log.tags, b"xyzz");
}

#[derive(Debug, Default, FromRecords)]
struct Inventory {
    #[record("sn")]
    instruments: Vec<Instrument>,
}

#[derive(Debug, Default, PartialEq, FromRecord)]
struct Instrument {
    #[field("serial")]
    serial: Option<u64>,
    #[field("tag")]
    tag: Option<Vec<u8>>,
}

#[derive(Debug, Default, FromRecord)]
struct TagLog {
    #[field("tag", |t, raw: &[u8]| t.extend_from_slice(raw))]
    tags: Vec<u8>,
}
