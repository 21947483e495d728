use mp4schema::{
    BoxType, Context, Error, PosReader, SizeForm, Walker, default_registry, read_box_header,
};

fn make_minimal_file() -> Vec<u8> {
    // [ftyp box]
    // size: 20 (0x14), type: "ftyp", payload: 12 bytes
    let mut v = Vec::new();

    // size = 20
    v.extend_from_slice(&20u32.to_be_bytes());
    v.extend_from_slice(b"ftyp");
    // major brand "isom"
    v.extend_from_slice(b"isom");
    // minor version
    v.extend_from_slice(&512u32.to_be_bytes());
    // one compatible brand "isom"
    v.extend_from_slice(b"isom");

    // free: size=8, no payload
    v.extend_from_slice(&8u32.to_be_bytes());
    v.extend_from_slice(b"free");

    // mdat: size=16, 8 bytes payload
    v.extend_from_slice(&16u32.to_be_bytes());
    v.extend_from_slice(b"mdat");
    v.extend_from_slice(&[0xAB; 8]);

    v
}

#[test]
fn read_single_ftyp_header() {
    let data = make_minimal_file();
    let mut r = PosReader::new(data.as_slice());

    let hdr = read_box_header(&mut r, data.len() as u64).expect("read_box_header failed");

    assert_eq!(hdr.start, 0);
    assert_eq!(hdr.size, 20);
    assert_eq!(hdr.box_type, BoxType::fourcc(b"ftyp"));
    assert_eq!(hdr.header_size, 8);
    assert_eq!(hdr.size_form, SizeForm::Compact);
    assert_eq!(r.position(), 8);
}

#[test]
fn header_larger_than_its_parent_is_malformed() {
    let data = make_minimal_file();
    let mut r = PosReader::new(data.as_slice());
    let err = read_box_header(&mut r, 16).unwrap_err();
    assert!(matches!(err, Error::MalformedBox { declared: 20, .. }));
}

#[test]
fn uuid_header_carries_extended_type() {
    let ext = [0x11u8; 16];
    let mut v = Vec::new();
    v.extend_from_slice(&26u32.to_be_bytes());
    v.extend_from_slice(b"uuid");
    v.extend_from_slice(&ext);
    v.extend_from_slice(&[1, 2]);

    let mut r = PosReader::new(v.as_slice());
    let hdr = read_box_header(&mut r, v.len() as u64).unwrap();
    assert_eq!(hdr.box_type, BoxType::Uuid(ext));
    assert_eq!(hdr.header_size, 24);
    assert_eq!(hdr.payload_len(), 2);
}

#[test]
fn decode_top_level_boxes() {
    let data = make_minimal_file();
    let walker = Walker::new(default_registry().unwrap());
    let boxes = walker.decode_slice(&data, &Context::new()).unwrap();

    assert_eq!(boxes.len(), 3);

    let ftyp = boxes[0].fields().expect("ftyp has fields");
    assert_eq!(ftyp.bytes("MajorBrand"), Some(&b"isom"[..]));
    assert_eq!(ftyp.uint("MinorVersion"), Some(512));
    let brands = ftyp.array("CompatibleBrands").unwrap();
    assert_eq!(brands.len(), 1);
    assert_eq!(brands[0].bytes("Brand"), Some(&b"isom"[..]));

    assert!(boxes[1].is_opaque());
    assert!(boxes[2].is_opaque());
    assert_eq!(walker.encode_payload(&boxes[2], &Context::new()).unwrap(), vec![0xAB; 8]);
}

#[test]
fn decoded_tree_encodes_to_the_same_bytes() {
    let data = make_minimal_file();
    let walker = Walker::new(default_registry().unwrap());
    let boxes = walker.decode_slice(&data, &Context::new()).unwrap();
    assert_eq!(data.len(), 20 + 8 + 16);
    assert_eq!(walker.encode(&boxes, &Context::new()).unwrap(), data);
}
