use crate::{
    boxes::{BoxType, SizeForm},
    config::DecodeOptions,
    context::Context,
    known_boxes::full_name,
    parser::{Body, BoxSpan, DecodedBox, Walker},
    registry::Registry,
    stringify::stringify_box,
    util::format_uuid,
    value::Record,
};
use serde::Serialize;
use std::{fs::File, io::BufReader, path::Path};

/// A JSON-serializable view of one decoded box.
///
/// Offsets and sizes are those of the input. Boxes built in memory report
/// the layout the walker would write.
#[derive(Serialize)]
pub struct JsonBox {
    pub offset: u64,
    pub size: u64,
    pub header_size: u64,
    pub size_form: SizeForm,

    pub typ: String,
    pub uuid: Option<String>,
    pub full_name: String,
    /// "leaf", "container" or "opaque"
    pub kind: String,
    pub version: Option<u8>,
    pub flags: Option<u32>,
    pub fields: Option<Record>,
    pub decoded: Option<String>,
    pub children: Option<Vec<JsonBox>>,
}

/// Decode a whole file into a box tree.
pub fn read_file(path: impl AsRef<Path>, walker: &Walker<'_>) -> anyhow::Result<Vec<DecodedBox>> {
    let f = File::open(&path)?;
    let len = f.metadata()?.len();
    let mut r = crate::io::PosReader::new(BufReader::new(f));
    let (boxes, _) = walker.decode(&mut r, len, &Context::new())?;
    Ok(boxes)
}

/// Parse a file and return its box tree in JSON-ready form.
pub fn analyze_file(
    path: impl AsRef<Path>,
    registry: &Registry,
    options: DecodeOptions,
) -> anyhow::Result<Vec<JsonBox>> {
    let walker = Walker::new(registry).with_options(options);
    let boxes = read_file(path, &walker)?;
    Ok(to_json(&walker, &boxes, &Context::new(), 0)?)
}

/// JSON view of sibling boxes starting at `offset`.
pub fn to_json(
    walker: &Walker<'_>,
    boxes: &[DecodedBox],
    ctx: &Context,
    offset: u64,
) -> crate::Result<Vec<JsonBox>> {
    let mut out = Vec::with_capacity(boxes.len());
    let mut at = offset;
    for b in boxes {
        let node = json_for_box(walker, b, ctx, at)?;
        at += node.size;
        out.push(node);
    }
    Ok(out)
}

fn json_for_box(
    walker: &Walker<'_>,
    b: &DecodedBox,
    ctx: &Context,
    offset: u64,
) -> crate::Result<JsonBox> {
    let BoxSpan {
        offset,
        size,
        header_size,
    } = match b.span {
        Some(span) => span,
        None => written_span(walker, b, ctx, offset)?,
    };

    let (kind, children) = match &b.body {
        Body::Leaf(_) => ("leaf", None),
        Body::Opaque(_) => ("opaque", None),
        Body::Container { children, .. } => {
            let child_ctx = walker.child_context(b, ctx)?;
            let first = match children.first().and_then(|c| c.span) {
                Some(span) => span.offset,
                None => offset + size - walker.encode(children, &child_ctx)?.len() as u64,
            };
            let nodes = to_json(walker, children, &child_ctx, first)?;
            ("container", Some(nodes))
        }
    };

    let (typ, uuid) = match &b.box_type {
        BoxType::FourCC(cc) => (cc.to_string(), None),
        BoxType::Uuid(u) => ("uuid".to_string(), Some(format_uuid(u))),
    };

    let decoded = stringify_box(walker.registry(), b, ctx)?;
    Ok(JsonBox {
        offset,
        size,
        header_size,
        size_form: b.size_form,
        typ,
        uuid,
        full_name: full_name(&b.box_type).to_string(),
        kind: kind.to_string(),
        version: b.version,
        flags: b.version.map(|_| b.flags),
        fields: b.fields().cloned(),
        decoded: Some(decoded).filter(|s| !s.is_empty()),
        children,
    })
}

/// Layout of a box that was never read from input.
fn written_span(
    walker: &Walker<'_>,
    b: &DecodedBox,
    ctx: &Context,
    offset: u64,
) -> crate::Result<BoxSpan> {
    let size = walker.encode_box(b, ctx)?.len() as u64;
    let payload_len = walker.encode_payload(b, ctx)?.len() as u64;
    Ok(BoxSpan {
        offset,
        size,
        header_size: size - payload_len,
    })
}
