use mp4schema::schema::{Schema, SchemaBuilder};
use mp4schema::{
    AmbiguityPolicy, BoxDefinition, BoxType, Context, DecodedBox, Error, Marker, Record, Registry,
    Versions, Walker, build_registry, default_registry,
};
use std::sync::Arc;

mp4schema::field_names! {
    enum W { Word => "Word" }
}

fn word(name: &'static str) -> Arc<Schema> {
    SchemaBuilder::new(name).uint(0, W::Word, 32).build_arc().unwrap()
}

fn versioned(name: &'static str) -> Arc<Schema> {
    SchemaBuilder::new(name)
        .full_box()
        .uint(0, W::Word, 32)
        .build_arc()
        .unwrap()
}

fn bt(code: &[u8; 4]) -> BoxType {
    BoxType::fourcc(code)
}

#[test]
fn unknown_type_resolves_to_nothing() {
    let reg = Registry::new();
    assert!(reg.is_empty());
    let got = reg.resolve(&bt(b"abcd"), &Context::new(), None).unwrap();
    assert!(got.is_none());
}

#[test]
fn two_unconditional_candidates_are_ambiguous() {
    let reg = Registry::new()
        .with_definition(BoxDefinition::fourcc(b"test", word("first")))
        .with_definition(BoxDefinition::fourcc(b"test", word("second")));
    assert_eq!(reg.len(), 2);

    let err = reg.resolve(&bt(b"test"), &Context::new(), None).unwrap_err();
    assert!(err.is_defect());
    match err {
        Error::AmbiguousSchema { first, second, .. } => {
            assert_eq!(first, "first");
            assert_eq!(second, "second");
        }
        other => panic!("expected AmbiguousSchema, got {other:?}"),
    }
}

#[test]
fn first_registered_policy_picks_the_earliest() {
    let reg = Registry::new()
        .with_ambiguity(AmbiguityPolicy::FirstRegistered)
        .with_definition(BoxDefinition::fourcc(b"test", word("first")))
        .with_definition(BoxDefinition::fourcc(b"test", word("second")));
    let def = reg.resolve(&bt(b"test"), &Context::new(), None).unwrap().unwrap();
    assert_eq!(def.schema.name(), "first");
}

#[test]
fn predicates_split_candidates() {
    fn in_udta(ctx: &Context) -> bool {
        ctx.is(Marker::Udta)
    }
    fn outside_udta(ctx: &Context) -> bool {
        !ctx.is(Marker::Udta)
    }
    let reg = Registry::new()
        .with_definition(BoxDefinition::fourcc(b"test", word("outer")).when(outside_udta))
        .with_definition(BoxDefinition::fourcc(b"test", word("inner")).when(in_udta));

    let top = reg.resolve(&bt(b"test"), &Context::new(), None).unwrap().unwrap();
    assert_eq!(top.schema.name(), "outer");

    let ctx = Context::new().with_marker(Marker::Udta);
    let nested = reg.resolve(&bt(b"test"), &ctx, None).unwrap().unwrap();
    assert_eq!(nested.schema.name(), "inner");
}

#[test]
fn version_sets_filter_full_boxes_only() {
    let reg = Registry::new()
        .with_definition(BoxDefinition::fourcc(b"full", versioned("full")).versions(&[0]))
        .with_definition(BoxDefinition::fourcc(b"flat", word("flat")).versions(&[0]));

    assert!(reg.resolve(&bt(b"full"), &Context::new(), Some(0)).unwrap().is_some());
    assert!(reg.resolve(&bt(b"full"), &Context::new(), Some(1)).unwrap().is_none());
    // The first byte of a plain box is data, not a version.
    assert!(reg.resolve(&bt(b"flat"), &Context::new(), Some(7)).unwrap().is_some());

    assert!(Versions::Only(&[0, 1]).admits(Some(1)));
    assert!(!Versions::Only(&[0, 1]).admits(Some(2)));
    assert!(Versions::Any.admits(Some(9)));
}

#[test]
fn unsupported_version_decodes_as_opaque() {
    let reg = Registry::new()
        .with_definition(BoxDefinition::fourcc(b"full", versioned("full")).versions(&[0]));
    let walker = Walker::new(&reg);

    let mut data = Vec::new();
    data.extend_from_slice(&16u32.to_be_bytes());
    data.extend_from_slice(b"full");
    data.extend_from_slice(&[0, 0, 0, 0, 0, 0, 0, 42]);
    let boxes = walker.decode_slice(&data, &Context::new()).unwrap();
    assert_eq!(boxes[0].version, Some(0));
    assert_eq!(boxes[0].fields().unwrap().uint("Word"), Some(42));

    data[8] = 1;
    let boxes = walker.decode_slice(&data, &Context::new()).unwrap();
    assert!(boxes[0].is_opaque());
    assert_eq!(walker.encode(&boxes, &Context::new()).unwrap(), data);
}

#[test]
fn markers_propagate_to_descendants() {
    fn in_udta(ctx: &Context) -> bool {
        ctx.is(Marker::Udta)
    }
    let reg = Registry::new()
        .with_definition(
            BoxDefinition::new(bt(b"udta"), Arc::new(Schema::container("udta")))
                .marks(mp4schema::Markers::of(Marker::Udta)),
        )
        .with_definition(BoxDefinition::new(bt(b"moov"), Arc::new(Schema::container("moov"))))
        .with_definition(BoxDefinition::fourcc(b"test", word("tagged")).when(in_udta));
    let walker = Walker::new(&reg);

    let leaf = DecodedBox::leaf(bt(b"test"), Record::new().with("Word", 5u32));
    let tree = vec![DecodedBox::container(
        bt(b"udta"),
        Record::new(),
        vec![DecodedBox::container(bt(b"moov"), Record::new(), vec![leaf])],
    )];
    let data = walker.encode(&tree, &Context::new()).unwrap();
    assert_eq!(walker.decode_slice(&data, &Context::new()).unwrap(), tree);

    // The same bytes outside udta carry no schema.
    let alone = walker.encode(&[DecodedBox::opaque(bt(b"test"), vec![0, 0, 0, 5])], &Context::new()).unwrap();
    let boxes = walker.decode_slice(&alone, &Context::new()).unwrap();
    assert!(boxes[0].is_opaque());
}

#[test]
fn catalogue_builds_under_both_policies() {
    let strict = build_registry(AmbiguityPolicy::Reject).unwrap();
    let lenient = build_registry(AmbiguityPolicy::FirstRegistered).unwrap();
    assert_eq!(strict.len(), lenient.len());
    assert!(strict.contains(&bt(b"ftyp")));
    assert!(strict.contains(&bt(b"dec3")));
    assert!(!strict.contains(&bt(b"mdat")));
}

#[test]
fn catalogue_disambiguates_by_context() {
    let reg = default_registry().unwrap();
    let name = |code: &[u8; 4], ctx: &Context| {
        reg.resolve(&bt(code), ctx, Some(0))
            .unwrap()
            .map(|d| d.schema.name())
    };

    let top = Context::new();
    let udta = Context::new().with_marker(Marker::Udta);
    assert_eq!(name(b"hdlr", &top), Some("hdlr"));
    assert_eq!(name(b"hdlr", &udta), Some("metadata_hdlr"));

    let stsd = Context::new().with_marker(Marker::Stsd);
    let entry = stsd.with_marker(Marker::AudioSampleEntry);
    assert_eq!(name(b"alac", &top), None);
    assert_eq!(name(b"alac", &stsd), Some("audio_sample_entry"));
    assert_eq!(name(b"alac", &entry), Some("alac_config"));

    let ilst = Context::new().with_marker(Marker::Ilst);
    let item = ilst.with_marker(Marker::IlstMeta);
    assert_eq!(name(b"data", &top), None);
    assert_eq!(name(b"data", &ilst), Some("ilst_item"));
    assert_eq!(name(b"data", &item), Some("data"));

    let free_form = item.with_marker(Marker::IlstFreeMeta);
    assert_eq!(name(b"mean", &item), None);
    assert_eq!(name(b"mean", &free_form), Some("mean"));
    assert_eq!(name(b"name", &free_form), Some("name"));
}

#[test]
fn registry_is_shareable_across_threads() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<Registry>();

    let reg = default_registry().unwrap();
    let handle = std::thread::spawn(move || reg.contains(&bt(b"moov")));
    assert!(handle.join().unwrap());
}
