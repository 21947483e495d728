use mp4schema::schema::{Len, SchemaBuilder, count};
use mp4schema::{
    BoxType, Context, DecodeOptions, DecodedBox, Record, SizeForm, Walker, decode_record,
    default_registry, encode_record,
};
use proptest::prelude::*;

mp4schema::field_names! {
    enum P {
        Small => "Small",
        Signed => "Signed",
        Blob => "Blob",
        Wide => "Wide",
        Tail => "Tail",
    }
}

proptest! {
    #[test]
    fn mixed_width_records_round_trip(
        small in 0u64..8,
        signed in -1024i64..1024,
        blob_seed in any::<u8>(),
        wide in any::<u64>(),
        tail in prop::collection::vec(any::<u8>(), 0..8),
    ) {
        let schema = SchemaBuilder::new("mixed")
            .uint(0, P::Small, 3)
            .int(1, P::Signed, 13)
            .bytes(2, P::Blob, count(P::Small))
            .uint(3, P::Wide, 64)
            .bytes(4, P::Tail, Len::Fixed(tail.len() as u64))
            .build()
            .unwrap();
        let blob: Vec<u8> = (0..small).map(|i| blob_seed.wrapping_add(i as u8)).collect();
        let rec = Record::new()
            .with("Small", small)
            .with("Signed", signed)
            .with("Blob", blob)
            .with("Wide", wide)
            .with("Tail", tail.clone());

        let bytes = encode_record(&schema, &rec, &Context::new()).unwrap();
        prop_assert_eq!(bytes.len() as u64, 2 + small + 8 + tail.len() as u64);

        let back = decode_record(&schema, &bytes, &Context::new(), &DecodeOptions::default())
            .unwrap();
        prop_assert_eq!(back, rec);
    }

    #[test]
    fn accepted_dec3_payloads_re_encode_identically(
        payload in prop::collection::vec(any::<u8>(), 0..24),
    ) {
        let reg = default_registry().unwrap();
        let schema = &reg.candidates(&BoxType::fourcc(b"dec3"))[0].schema;
        if let Ok(rec) = decode_record(schema, &payload, &Context::new(), &DecodeOptions::default()) {
            let again = encode_record(schema, &rec, &Context::new()).unwrap();
            prop_assert_eq!(again, payload);
        }
    }

    #[test]
    fn arbitrary_input_never_panics(data in prop::collection::vec(any::<u8>(), 0..256)) {
        let walker = Walker::new(default_registry().unwrap());
        let _ = walker.decode_slice(&data, &Context::new());
    }

    #[test]
    fn opaque_boxes_round_trip_in_every_size_form(
        payload in prop::collection::vec(any::<u8>(), 0..64),
        form in prop_oneof![Just(SizeForm::Compact), Just(SizeForm::Large), Just(SizeForm::ToEnd)],
    ) {
        let walker = Walker::new(default_registry().unwrap());
        let b = DecodedBox::opaque(BoxType::fourcc(b"zzzz"), payload).with_size_form(form);
        let bytes = walker.encode(std::slice::from_ref(&b), &Context::new()).unwrap();
        let back = walker.decode_slice(&bytes, &Context::new()).unwrap();
        prop_assert_eq!(back, vec![b]);
    }
}
