use mp4schema::{
    BoxType, CancelToken, Context, DecodeOptions, DecodedBox, Error, PosReader, Record, SizeForm,
    Walker, default_registry,
};

fn bt(code: &[u8; 4]) -> BoxType {
    BoxType::fourcc(code)
}

fn boxed(code: &[u8; 4], payload: &[u8]) -> Vec<u8> {
    let mut v = Vec::new();
    v.extend_from_slice(&(8 + payload.len() as u32).to_be_bytes());
    v.extend_from_slice(code);
    v.extend_from_slice(payload);
    v
}

fn walker() -> Walker<'static> {
    Walker::new(default_registry().unwrap())
}

#[test]
fn unknown_boxes_survive_byte_for_byte() {
    let mut data = boxed(b"abcd", &[1, 2, 3]);
    data.extend_from_slice(&boxed(b"free", &[]));
    let mut uuid = Vec::new();
    uuid.extend_from_slice(&27u32.to_be_bytes());
    uuid.extend_from_slice(b"uuid");
    uuid.extend_from_slice(&[0xEE; 16]);
    uuid.extend_from_slice(&[7, 8, 9]);
    data.extend_from_slice(&uuid);

    let w = walker();
    let boxes = w.decode_slice(&data, &Context::new()).unwrap();
    assert_eq!(boxes.len(), 3);
    assert!(boxes.iter().all(DecodedBox::is_opaque));
    assert_eq!(boxes[2].box_type, BoxType::Uuid([0xEE; 16]));
    assert_eq!(w.encode(&boxes, &Context::new()).unwrap(), data);
}

#[test]
fn large_size_form_is_preserved() {
    let mut data = Vec::new();
    data.extend_from_slice(&1u32.to_be_bytes());
    data.extend_from_slice(b"zzzz");
    data.extend_from_slice(&19u64.to_be_bytes());
    data.extend_from_slice(&[1, 2, 3]);

    let w = walker();
    let boxes = w.decode_slice(&data, &Context::new()).unwrap();
    assert_eq!(boxes[0].size_form, SizeForm::Large);
    assert_eq!(boxes[0], DecodedBox::opaque(bt(b"zzzz"), vec![1, 2, 3]).with_size_form(SizeForm::Large));
    assert_eq!(w.encode(&boxes, &Context::new()).unwrap(), data);
}

#[test]
fn size_zero_runs_to_the_end() {
    let mut data = boxed(b"free", &[]);
    data.extend_from_slice(&0u32.to_be_bytes());
    data.extend_from_slice(b"mdat");
    data.extend_from_slice(&[5; 5]);

    let w = walker();
    let boxes = w.decode_slice(&data, &Context::new()).unwrap();
    assert_eq!(boxes.len(), 2);
    assert_eq!(boxes[1].size_form, SizeForm::ToEnd);
    assert_eq!(w.encode_payload(&boxes[1], &Context::new()).unwrap(), vec![5; 5]);
    assert_eq!(w.encode(&boxes, &Context::new()).unwrap(), data);
}

#[test]
fn decode_box_reports_its_size() {
    let mut data = boxed(b"chrm", &[3, 4]);
    data.extend_from_slice(&boxed(b"free", &[]));
    let mut r = PosReader::new(data.as_slice());
    let (b, size) = walker()
        .decode_box(&mut r, data.len() as u64, &Context::new())
        .unwrap();
    assert_eq!(size, 10);
    assert_eq!(b.fields().unwrap().uint("Y"), Some(4));
    assert_eq!(r.position(), 10);
}

#[test]
fn box_larger_than_the_input_is_malformed() {
    let mut data = Vec::new();
    data.extend_from_slice(&100u32.to_be_bytes());
    data.extend_from_slice(b"free");
    data.extend_from_slice(&[0; 12]);
    let err = walker().decode_slice(&data, &Context::new()).unwrap_err();
    assert!(matches!(err, Error::MalformedBox { declared: 100, .. }));
}

#[test]
fn size_smaller_than_the_header_is_malformed() {
    let mut data = Vec::new();
    data.extend_from_slice(&4u32.to_be_bytes());
    data.extend_from_slice(b"free");
    let err = walker().decode_slice(&data, &Context::new()).unwrap_err();
    assert!(matches!(err, Error::MalformedBox { .. }));
}

#[test]
fn stream_ending_early_is_truncated() {
    let mut data = Vec::new();
    data.extend_from_slice(&50u32.to_be_bytes());
    data.extend_from_slice(b"free");
    data.extend_from_slice(&[0; 12]);
    let mut r = PosReader::new(data.as_slice());
    let err = walker().decode(&mut r, 100, &Context::new()).unwrap_err();
    match err {
        Error::Truncated { box_type, offset } => {
            assert_eq!(box_type, Some(bt(b"free")));
            assert_eq!(offset, 20);
        }
        other => panic!("expected Truncated, got {other:?}"),
    }
}

#[test]
fn leaf_with_leftover_bytes_is_malformed() {
    let data = boxed(b"chrm", &[1, 2, 3]);
    let err = walker().decode_slice(&data, &Context::new()).unwrap_err();
    match err {
        Error::MalformedBox {
            box_type,
            declared,
            consumed,
            ..
        } => {
            assert_eq!(box_type, Some(bt(b"chrm")));
            assert_eq!(declared, 3);
            assert_eq!(consumed, 2);
        }
        other => panic!("expected MalformedBox, got {other:?}"),
    }
}

#[test]
fn leaf_shorter_than_its_fields_is_truncated() {
    let data = boxed(b"chrm", &[1]);
    let err = walker().decode_slice(&data, &Context::new()).unwrap_err();
    assert!(matches!(
        err,
        Error::Truncated {
            box_type: Some(t),
            ..
        } if t == bt(b"chrm")
    ));
}

#[test]
fn container_with_trailing_junk_is_malformed() {
    let data = boxed(b"moov", &[0, 0, 0, 0]);
    let err = walker().decode_slice(&data, &Context::new()).unwrap_err();
    assert!(matches!(
        err,
        Error::MalformedBox {
            box_type: Some(t),
            ..
        } if t == bt(b"moov")
    ));
}

#[test]
fn cancelled_walk_stops_before_the_next_header() {
    let data = boxed(b"free", &[]);
    let token = CancelToken::new();
    let w = walker().with_cancel(token.clone());
    token.cancel();
    let err = w.decode_slice(&data, &Context::new()).unwrap_err();
    assert!(matches!(err, Error::Cancelled { offset: 0 }));
}

fn nested(levels: usize) -> DecodedBox {
    let mut b = DecodedBox::opaque(bt(b"free"), Vec::new());
    for _ in 0..levels {
        b = DecodedBox::container(bt(b"moov"), Record::new(), vec![b]);
    }
    b
}

#[test]
fn nesting_beyond_the_limit_is_refused() {
    let tree = [nested(5)];
    let data = walker().encode(&tree, &Context::new()).unwrap();

    let shallow = walker().with_options(DecodeOptions::default().with_max_depth(3));
    let err = shallow.decode_slice(&data, &Context::new()).unwrap_err();
    assert!(matches!(err, Error::NestingTooDeep { depth: 3, .. }));

    let deep = walker().with_options(DecodeOptions::default().with_max_depth(6));
    assert_eq!(deep.decode_slice(&data, &Context::new()).unwrap(), tree);
}

fn audio_entry_fields() -> Record {
    Record::new()
        .with("Reserved", vec![0u8; 6])
        .with("DataReferenceIndex", 1u16)
        .with("EntryVersion", 0u16)
        .with("Reserved2", vec![0u8; 6])
        .with("ChannelCount", 2u16)
        .with("SampleSize", 16u16)
        .with("PreDefined", 0u16)
        .with("Reserved3", 0u16)
        .with("SampleRate", 48000u32 << 16)
        .with("QuickTimeData", Vec::<u8>::new())
}

fn dac3_fields() -> Record {
    Record::new()
        .with("Fscod", 0u8)
        .with("Bsid", 8u8)
        .with("Bsmod", 0u8)
        .with("Acmod", 7u8)
        .with("LfeOn", 1u8)
        .with("BitRateCode", 14u8)
        .with("Reserved", 0u8)
}

#[test]
fn sample_description_tree_round_trips() {
    let tree = vec![DecodedBox::container(
        bt(b"moov"),
        Record::new(),
        vec![DecodedBox::container(
            bt(b"trak"),
            Record::new(),
            vec![
                DecodedBox::container(
                    bt(b"stsd"),
                    Record::new().with("EntryCount", 1u32),
                    vec![DecodedBox::container(
                        bt(b"ac-3"),
                        audio_entry_fields(),
                        vec![DecodedBox::leaf(bt(b"dac3"), dac3_fields())],
                    )],
                )
                .with_header(0, 0),
            ],
        )],
    )];

    let w = walker();
    let data = w.encode(&tree, &Context::new()).unwrap();
    // moov(8) trak(8) stsd(8+4+4) ac-3(8+28) dac3(8+3)
    assert_eq!(data.len(), 8 + 8 + 16 + 36 + 11);
    let back = w.decode_slice(&data, &Context::new()).unwrap();
    assert_eq!(back, tree);

    let stsd = &back[0].children()[0].children()[0];
    let entry = &stsd.children()[0];
    assert_eq!(entry.fields().unwrap().uint("SampleRate"), Some(48000 << 16));
    assert!(entry.child(&bt(b"dac3")).is_some());
}

#[test]
fn quicktime_sound_v1_carries_extra_fields() {
    let fields = audio_entry_fields()
        .with("EntryVersion", 1u16)
        .with("QuickTimeData", vec![9u8; 16]);
    let tree = vec![DecodedBox::container(
        bt(b"stsd"),
        Record::new().with("EntryCount", 1u32),
        vec![DecodedBox::container(bt(b"mp4a"), fields, Vec::new())],
    )
    .with_header(0, 0)];

    let w = walker();
    let data = w.encode(&tree, &Context::new()).unwrap();
    assert_eq!(data.len(), 16 + 8 + 28 + 16);
    assert_eq!(w.decode_slice(&data, &Context::new()).unwrap(), tree);
}

#[test]
fn flags_wider_than_24_bits_are_rejected() {
    let b = DecodedBox::container(bt(b"stsd"), Record::new().with("EntryCount", 0u32), Vec::new())
        .with_header(0, 0x0100_0000);
    let err = walker().encode_box(&b, &Context::new()).unwrap_err();
    assert!(matches!(err, Error::InvalidFieldValue { .. }));
}

#[test]
fn body_kind_must_match_the_schema() {
    let b = DecodedBox::leaf(bt(b"moov"), Record::new());
    let err = walker().encode_box(&b, &Context::new()).unwrap_err();
    assert!(matches!(err, Error::InvalidFieldValue { .. }));
}

#[test]
fn known_box_out_of_place_stays_opaque() {
    // Sample entries only make sense under stsd.
    let data = boxed(b"ac-3", &[0; 28]);
    let boxes = walker().decode_slice(&data, &Context::new()).unwrap();
    assert!(boxes[0].is_opaque());
}
