use mp4schema::json_api::to_json;
use mp4schema::{Context, DecodeOptions, Walker, analyze_file, default_registry};
use serde_json::{self, Value};
use std::fs::File;
use std::io::Write;
use std::path::PathBuf;

/// Build a small MP4-ish file in a temp location:
/// [ftyp] [free] [moov [udta [chrm]]] [mdat]
fn make_minimal_mp4_file(name: &str) -> PathBuf {
    // ftyp: size=20, type="ftyp", payload=12 bytes
    let mut data = Vec::new();

    // size (20)
    data.extend_from_slice(&20u32.to_be_bytes());
    // type "ftyp"
    data.extend_from_slice(b"ftyp");
    // major brand "isom"
    data.extend_from_slice(b"isom");
    // minor version 512
    data.extend_from_slice(&512u32.to_be_bytes());
    // one compatible brand "isom"
    data.extend_from_slice(b"isom");

    // free: size=8, type="free", no payload
    data.extend_from_slice(&8u32.to_be_bytes());
    data.extend_from_slice(b"free");

    // moov(26) > udta(18) > chrm(10)
    data.extend_from_slice(&26u32.to_be_bytes());
    data.extend_from_slice(b"moov");
    data.extend_from_slice(&18u32.to_be_bytes());
    data.extend_from_slice(b"udta");
    data.extend_from_slice(&10u32.to_be_bytes());
    data.extend_from_slice(b"chrm");
    data.extend_from_slice(&[1, 2]);

    // mdat: size=16, type="mdat", 8 bytes payload
    data.extend_from_slice(&16u32.to_be_bytes());
    data.extend_from_slice(b"mdat");
    data.extend_from_slice(&[0u8; 8]); // dummy payload

    let path = std::env::temp_dir().join(name);
    let mut f = File::create(&path).expect("create temp file failed");
    f.write_all(&data).expect("write temp data failed");
    path
}

#[test]
fn analyze_and_serialize_to_json() {
    let path = make_minimal_mp4_file("mp4schema_json_roundtrip_test.mp4");

    let boxes = analyze_file(&path, default_registry().unwrap(), DecodeOptions::default())
        .expect("analyze_file failed");

    assert_eq!(boxes.len(), 4);
    assert_eq!(boxes[0].typ, "ftyp");

    // ftyp: size 20, header 8
    assert_eq!(boxes[0].offset, 0);
    assert_eq!(boxes[0].size, 20);
    assert_eq!(boxes[0].header_size, 8);
    assert_eq!(boxes[0].kind, "leaf");

    assert_eq!(boxes[1].offset, 20);
    assert_eq!(boxes[1].kind, "opaque");
    assert_eq!(boxes[2].offset, 28);
    assert_eq!(boxes[3].offset, 54);

    // Serialize to JSON
    let json_str = serde_json::to_string(&boxes).expect("serialize to JSON failed");

    // Parse back into a generic Value just to inspect fields are present
    let v: Value = serde_json::from_str(&json_str).expect("parse JSON failed");
    assert!(v.is_array());
    let arr = v.as_array().unwrap();

    // Check that the first entry has the expected keys / values
    let first = &arr[0];
    assert_eq!(first["typ"], "ftyp");
    assert_eq!(first["header_size"], 8);
    assert_eq!(first["size_form"], "compact");
    assert_eq!(first["full_name"], "File Type Box");
    assert_eq!(first["fields"]["MajorBrand"], "69736f6d");
    assert_eq!(first["fields"]["MinorVersion"], 512);
    assert_eq!(first["fields"]["CompatibleBrands"][0]["Brand"], "69736f6d");
    assert_eq!(
        first["decoded"],
        "MajorBrand=\"isom\" MinorVersion=0x200 CompatibleBrands=[\"isom\"]"
    );

    // Nested offsets follow the headers of their parents.
    let moov = &arr[2];
    assert_eq!(moov["kind"], "container");
    let udta = &moov["children"][0];
    assert_eq!(udta["offset"], 36);
    let chrm = &udta["children"][0];
    assert_eq!(chrm["offset"], 44);
    assert_eq!(chrm["size"], 10);
    assert_eq!(chrm["fields"]["X"], 1);
    assert_eq!(chrm["fields"]["Y"], 2);

    // Opaque boxes carry no fields.
    assert!(arr[3]["fields"].is_null());
    assert!(arr[3]["version"].is_null());
}

#[test]
fn analyze_missing_file_fails() {
    let path = std::env::temp_dir().join("mp4schema_definitely_missing.mp4");
    let err = analyze_file(&path, default_registry().unwrap(), DecodeOptions::default());
    assert!(err.is_err());
}

#[test]
fn offsets_come_from_the_input_layout() {
    // hdlr whose Name has no NUL terminator, as QuickTime writers leave it.
    let mut data = Vec::new();
    data.extend_from_slice(&36u32.to_be_bytes());
    data.extend_from_slice(b"hdlr");
    data.extend_from_slice(&[0; 4]); // version, flags
    data.extend_from_slice(&[0; 4]); // pre-defined
    data.extend_from_slice(b"soun");
    data.extend_from_slice(&[0; 12]);
    data.extend_from_slice(b"abcd");
    data.extend_from_slice(&8u32.to_be_bytes());
    data.extend_from_slice(b"free");
    assert_eq!(data.len(), 44);

    let walker = Walker::new(default_registry().unwrap());
    let boxes = walker.decode_slice(&data, &Context::new()).unwrap();
    assert_eq!(
        boxes[0].fields().unwrap().get("Name"),
        Some(&mp4schema::Value::Str("abcd".to_string()))
    );
    // Writing it back adds the terminator.
    assert_eq!(walker.encode(&boxes, &Context::new()).unwrap().len(), 45);

    let json = to_json(&walker, &boxes, &Context::new(), 0).unwrap();
    assert_eq!(json[0].size, 36);
    assert_eq!(json[1].offset, 36);
    assert_eq!(json[1].size, 8);
}
