use mp4schema::{BoxType, default_registry, full_name};

#[test]
fn full_name_of_ftyp() {
    assert_eq!(full_name(&BoxType::fourcc(b"ftyp")), "File Type Box");
    assert_eq!(full_name(&BoxType::fourcc(b"skip")), "Free Space Box");
}

#[test]
fn unknown_and_uuid_boxes_have_generic_names() {
    assert_eq!(full_name(&BoxType::fourcc(b"zzzz")), "Unknown Box");
    assert_eq!(full_name(&BoxType::Uuid([0; 16])), "User Extension");
}

#[test]
fn catalogue_classifies_container() {
    let reg = default_registry().unwrap();
    let moov = &reg.candidates(&BoxType::fourcc(b"moov"))[0];
    assert!(moov.schema.has_children());

    let ftyp = &reg.candidates(&BoxType::fourcc(b"ftyp"))[0];
    assert!(!ftyp.schema.has_children());
}

#[test]
fn catalogue_classifies_full_box() {
    let reg = default_registry().unwrap();
    let mvhd = &reg.candidates(&BoxType::fourcc(b"mvhd"))[0];
    assert!(mvhd.schema.is_full_box());

    let meta = &reg.candidates(&BoxType::fourcc(b"meta"))[0];
    assert!(meta.schema.is_full_box());
    assert!(meta.schema.has_children());

    assert!(reg.candidates(&BoxType::fourcc(b"mdat")).is_empty());
}

#[test]
fn every_registered_type_has_a_name() {
    let reg = default_registry().unwrap();
    for code in [
        b"ftyp", b"moov", b"mvhd", b"mdhd", b"stsd", b"dac3", b"dec3", b"senc", b"pssh",
        b"tenc", b"tlou", b"alou", b"ilst", b"keys",
    ] {
        let t = BoxType::fourcc(code);
        assert!(reg.contains(&t), "{t} missing");
        assert_ne!(full_name(&t), "Unknown Box", "{t}");
    }
}
