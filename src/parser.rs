//! Walks a box tree: headers, schema resolution, recursion into children and
//! delegation of leaf payloads to the bit codec.
use crate::bits::{BitReader, BitWriter};
use crate::boxes::{BoxType, SizeForm, read_box_header, write_box_header};
use crate::codec::{decode_fields, encode_fields};
use crate::config::DecodeOptions;
use crate::context::{Context, Markers};
use crate::error::{Error, Result};
use crate::io::PosReader;
use crate::registry::{BoxDefinition, Registry};
use crate::schema::Schema;
use crate::value::Record;
use std::io::Read;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Cooperative cancellation flag, checked before every box header read.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    Leaf(Record),
    Container {
        fields: Record,
        children: Vec<DecodedBox>,
    },
    /// No schema matched; the raw payload is kept for re-encoding.
    Opaque(Vec<u8>),
}

/// Position of a decoded box in its input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoxSpan {
    pub offset: u64,
    pub size: u64,
    pub header_size: u64,
}

/// One decoded box. Version and flags are set only for FullBox shapes.
///
/// `span` is filled by the walker and ignored by equality, so a decoded
/// tree compares equal to the same tree built in memory.
#[derive(Debug, Clone)]
pub struct DecodedBox {
    pub box_type: BoxType,
    pub size_form: SizeForm,
    pub version: Option<u8>,
    pub flags: u32,
    pub body: Body,
    pub span: Option<BoxSpan>,
}

impl PartialEq for DecodedBox {
    fn eq(&self, other: &Self) -> bool {
        self.box_type == other.box_type
            && self.size_form == other.size_form
            && self.version == other.version
            && self.flags == other.flags
            && self.body == other.body
    }
}

impl DecodedBox {
    pub fn leaf(box_type: BoxType, fields: Record) -> Self {
        Self::with_body(box_type, Body::Leaf(fields))
    }

    pub fn container(box_type: BoxType, fields: Record, children: Vec<DecodedBox>) -> Self {
        Self::with_body(box_type, Body::Container { fields, children })
    }

    pub fn opaque(box_type: BoxType, payload: Vec<u8>) -> Self {
        Self::with_body(box_type, Body::Opaque(payload))
    }

    fn with_body(box_type: BoxType, body: Body) -> Self {
        DecodedBox {
            box_type,
            size_form: SizeForm::Compact,
            version: None,
            flags: 0,
            body,
            span: None,
        }
    }

    /// Builder-style FullBox header.
    pub fn with_header(mut self, version: u8, flags: u32) -> Self {
        self.version = Some(version);
        self.flags = flags;
        self
    }

    pub fn with_size_form(mut self, size_form: SizeForm) -> Self {
        self.size_form = size_form;
        self
    }

    /// Field values of a leaf or the prefix of a container.
    pub fn fields(&self) -> Option<&Record> {
        match &self.body {
            Body::Leaf(r) | Body::Container { fields: r, .. } => Some(r),
            Body::Opaque(_) => None,
        }
    }

    pub fn children(&self) -> &[DecodedBox] {
        match &self.body {
            Body::Container { children, .. } => children,
            _ => &[],
        }
    }

    pub fn is_opaque(&self) -> bool {
        matches!(self.body, Body::Opaque(_))
    }

    /// First child of the given type.
    pub fn child(&self, box_type: &BoxType) -> Option<&DecodedBox> {
        self.children().iter().find(|c| &c.box_type == box_type)
    }
}

/// Decodes and encodes box trees against a [`Registry`].
pub struct Walker<'r> {
    registry: &'r Registry,
    options: DecodeOptions,
    cancel: CancelToken,
}

impl<'r> Walker<'r> {
    pub fn new(registry: &'r Registry) -> Self {
        Walker {
            registry,
            options: DecodeOptions::default(),
            cancel: CancelToken::default(),
        }
    }

    pub fn with_options(mut self, options: DecodeOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn registry(&self) -> &'r Registry {
        self.registry
    }

    /// Decode the boxes filling exactly `declared_len` bytes of `r`.
    ///
    /// Returns the boxes and the number of bytes consumed, which always
    /// equals `declared_len` on success.
    pub fn decode<R: Read>(
        &self,
        r: &mut PosReader<R>,
        declared_len: u64,
        ctx: &Context,
    ) -> Result<(Vec<DecodedBox>, u64)> {
        let boxes = self.read_children(r, declared_len, ctx, 0)?;
        Ok((boxes, declared_len))
    }

    /// Decode every box in an in-memory buffer.
    pub fn decode_slice(&self, bytes: &[u8], ctx: &Context) -> Result<Vec<DecodedBox>> {
        let mut r = PosReader::new(bytes);
        self.read_children(&mut r, bytes.len() as u64, ctx, 0)
    }

    /// Decode a single box from at most `remaining` bytes. Returns the box
    /// and its total size.
    pub fn decode_box<R: Read>(
        &self,
        r: &mut PosReader<R>,
        remaining: u64,
        ctx: &Context,
    ) -> Result<(DecodedBox, u64)> {
        self.read_box(r, remaining, ctx, 0)
    }

    fn read_children<R: Read>(
        &self,
        r: &mut PosReader<R>,
        len: u64,
        ctx: &Context,
        depth: usize,
    ) -> Result<Vec<DecodedBox>> {
        let mut boxes = Vec::new();
        let mut consumed = 0u64;
        while consumed < len {
            let remaining = len - consumed;
            if remaining < 8 {
                return Err(Error::MalformedBox {
                    box_type: None,
                    offset: r.position(),
                    declared: len,
                    consumed,
                });
            }
            let (b, size) = self.read_box(r, remaining, ctx, depth)?;
            consumed += size;
            boxes.push(b);
        }
        Ok(boxes)
    }

    fn read_box<R: Read>(
        &self,
        r: &mut PosReader<R>,
        remaining: u64,
        ctx: &Context,
        depth: usize,
    ) -> Result<(DecodedBox, u64)> {
        if self.cancel.is_cancelled() {
            return Err(Error::Cancelled {
                offset: r.position(),
            });
        }
        if depth >= self.options.max_depth {
            return Err(Error::NestingTooDeep {
                offset: r.position(),
                depth: self.options.max_depth,
            });
        }

        let header = read_box_header(r, remaining)?;
        let box_type = header.box_type;
        let payload_len = header.payload_len();
        let likely_version = if payload_len > 0 {
            r.peek_u8()
                .map_err(|e| Error::from_io(e, r.position(), Some(box_type)))?
        } else {
            None
        };

        let mut decoded = DecodedBox::opaque(box_type, Vec::new()).with_size_form(header.size_form);
        decoded.span = Some(BoxSpan {
            offset: header.start,
            size: header.size,
            header_size: header.header_size,
        });
        match self.registry.resolve(&box_type, ctx, likely_version)? {
            None => {
                log::debug!("{} at {} kept opaque", box_type, header.start);
                decoded.body = Body::Opaque(read_opaque(r, payload_len, box_type)?);
            }
            Some(def) => {
                let (version, flags, body) = self
                    .read_payload(r, def, payload_len, ctx, depth)
                    .map_err(|e| e.within(box_type))?;
                decoded.version = version;
                decoded.flags = flags;
                decoded.body = body;
            }
        }
        Ok((decoded, header.size))
    }

    fn read_payload<R: Read>(
        &self,
        r: &mut PosReader<R>,
        def: &BoxDefinition,
        payload_len: u64,
        ctx: &Context,
        depth: usize,
    ) -> Result<(Option<u8>, u32, Body)> {
        let schema = &def.schema;
        let start = r.position();
        let (version, flags, fields, prefix_len) = {
            let mut br = BitReader::new(r, start, payload_len);
            let (version, flags) = if schema.is_full_box() {
                (Some(br.read_bits(8)? as u8), br.read_bits(24)? as u32)
            } else {
                (None, 0)
            };
            let here = ctx.with_header(version, flags);
            let fields = decode_fields(schema, &mut br, &here, &self.options)?;

            if schema.has_children() {
                if !br.is_aligned() {
                    return Err(Error::schema(
                        schema.name(),
                        "container field prefix does not end on a byte boundary",
                    ));
                }
            } else if br.remaining_bits() != 0 {
                return Err(Error::MalformedBox {
                    box_type: None,
                    offset: start,
                    declared: payload_len,
                    consumed: br.consumed_bits().div_ceil(8),
                });
            }
            (version, flags, fields, br.consumed_bits() / 8)
        };

        let body = if schema.has_children() {
            let children = self.read_children(
                r,
                payload_len - prefix_len,
                &ctx.for_children(def.child_markers),
                depth + 1,
            )?;
            Body::Container { fields, children }
        } else {
            Body::Leaf(fields)
        };
        Ok((version, flags, body))
    }

    /// Encode a sequence of sibling boxes.
    pub fn encode(&self, boxes: &[DecodedBox], ctx: &Context) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        for b in boxes {
            self.write_box(&mut out, b, ctx)?;
        }
        Ok(out)
    }

    pub fn encode_box(&self, b: &DecodedBox, ctx: &Context) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        self.write_box(&mut out, b, ctx)?;
        Ok(out)
    }

    fn write_box(&self, out: &mut Vec<u8>, b: &DecodedBox, ctx: &Context) -> Result<()> {
        let payload = match &b.body {
            Body::Opaque(bytes) => {
                write_box_header(out, &b.box_type, b.size_form, bytes.len() as u64)?;
                out.extend_from_slice(bytes);
                return Ok(());
            }
            Body::Leaf(fields) => {
                let def = self.definition_for(b, ctx, false)?;
                self.write_prefix(b, &def.schema, fields, ctx)?.finish()
            }
            Body::Container { fields, children } => {
                let def = self.definition_for(b, ctx, true)?;
                let w = self.write_prefix(b, &def.schema, fields, ctx)?;
                if !w.is_aligned() {
                    return Err(Error::schema(
                        def.schema.name(),
                        "container field prefix does not end on a byte boundary",
                    ));
                }
                let mut payload = w.finish();
                let child_ctx = ctx.for_children(def.child_markers);
                for child in children {
                    self.write_box(&mut payload, child, &child_ctx)?;
                }
                payload
            }
        };
        write_box_header(out, &b.box_type, b.size_form, payload.len() as u64)?;
        out.extend_from_slice(&payload);
        Ok(())
    }

    /// Encoded payload of one box, without its header.
    pub fn encode_payload(&self, b: &DecodedBox, ctx: &Context) -> Result<Vec<u8>> {
        if let Body::Opaque(bytes) = &b.body {
            return Ok(bytes.clone());
        }
        let encoded = self.encode_box(b, ctx)?;
        let total = encoded.len() as u64;
        let header = read_box_header(&mut PosReader::new(encoded.as_slice()), total)?;
        Ok(encoded[header.header_size as usize..].to_vec())
    }

    /// Context seen by the children of `b`.
    pub fn child_context(&self, b: &DecodedBox, ctx: &Context) -> Result<Context> {
        if b.is_opaque() {
            return Ok(ctx.for_children(Markers::NONE));
        }
        let def = self.definition_for(b, ctx, matches!(b.body, Body::Container { .. }))?;
        Ok(ctx.for_children(def.child_markers))
    }

    fn definition_for(
        &self,
        b: &DecodedBox,
        ctx: &Context,
        container: bool,
    ) -> Result<&'r BoxDefinition> {
        let def = self
            .registry
            .resolve(&b.box_type, ctx, b.version)?
            .ok_or_else(|| {
                Error::field(
                    b.box_type.to_string(),
                    "no schema matches this box here; only opaque payloads can be written",
                )
            })?;
        if def.schema.has_children() != container {
            return Err(Error::field(
                b.box_type.to_string(),
                format!(
                    "{} {} children but the box body disagrees",
                    def.schema.name(),
                    if container { "has no" } else { "has" }
                ),
            ));
        }
        Ok(def)
    }

    fn write_prefix(
        &self,
        b: &DecodedBox,
        schema: &Schema,
        fields: &Record,
        ctx: &Context,
    ) -> Result<BitWriter> {
        let mut w = BitWriter::new();
        let here = if schema.is_full_box() {
            let version = b.version.unwrap_or(0);
            if b.flags >> 24 != 0 {
                return Err(Error::field(
                    format!("{}.Flags", schema.name()),
                    format!("{:#x} does not fit in 24 bits", b.flags),
                ));
            }
            w.write_bits(u64::from(version), 8);
            w.write_bits(u64::from(b.flags), 24);
            ctx.with_header(Some(version), b.flags)
        } else {
            ctx.with_header(None, 0)
        };
        encode_fields(schema, fields, &mut w, &here)?;
        Ok(w)
    }
}

fn read_opaque<R: Read>(r: &mut PosReader<R>, len: u64, box_type: BoxType) -> Result<Vec<u8>> {
    let at = r.position();
    let mut data = Vec::new();
    let got = r
        .by_ref()
        .take(len)
        .read_to_end(&mut data)
        .map_err(|e| Error::from_io(e, at, Some(box_type)))?;
    if (got as u64) < len {
        return Err(Error::Truncated {
            box_type: Some(box_type),
            offset: at + got as u64,
        });
    }
    Ok(data)
}
