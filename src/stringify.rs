//! `Name=Value` rendering of decoded records and box trees.
use crate::context::Context;
use crate::error::{Error, Result};
use crate::parser::{Body, DecodedBox};
use crate::registry::{BoxDefinition, Registry};
use crate::schema::{FieldDescriptor, Fields, Render, Repr, Schema};
use crate::util::{format_uuid, quoted};
use crate::value::{Record, Value};

/// Render the present fields of `record` in ordinal order.
///
/// Override hooks see the whole record; when one returns `None` the default
/// rendering is used.
pub fn stringify_record(schema: &Schema, record: &Record, ctx: &Context) -> Result<String> {
    let mut parts = Vec::with_capacity(schema.fields().len());
    let mut seen: Vec<(&'static str, Value)> = Vec::with_capacity(schema.fields().len());
    let all = Fields::new(schema.name(), record.as_slice());
    for fd in schema.fields() {
        let present = fd.is_present(&Fields::new(schema.name(), &seen), ctx)?;
        let value = if present {
            record.get(fd.name).cloned().ok_or_else(|| {
                Error::field(
                    format!("{}.{}", schema.name(), fd.name),
                    "missing from the record",
                )
            })?
        } else {
            fd.repr.zero()
        };
        if present {
            let text = match fd.stringify.as_ref().and_then(|hook| hook(&all, ctx)) {
                Some(custom) => custom,
                None => render_value(fd, &value, ctx)?,
            };
            parts.push(format!("{}={}", fd.name, text));
        }
        seen.push((fd.name, value));
    }
    Ok(parts.join(" "))
}

fn render_value(fd: &FieldDescriptor, value: &Value, ctx: &Context) -> Result<String> {
    let text = match (value, &fd.repr) {
        (Value::Uint(v), _) if fd.render == Render::Hex => format!("{v:#x}"),
        (Value::Uint(v), _) => v.to_string(),
        (Value::Int(v), _) => v.to_string(),
        (Value::Bytes(b), _) if fd.render == Render::Text => quoted(b),
        (Value::Bytes(b), _) => {
            let items: Vec<String> = b.iter().map(|x| format!("{x:#x}")).collect();
            format!("[{}]", items.join(", "))
        }
        (Value::Uuid(u), _) => format_uuid(u),
        (Value::Str(s), _) => quoted(s.as_bytes()),
        (Value::Record(r), Repr::Record(nested)) => {
            format!("{{{}}}", stringify_record(nested, r, ctx)?)
        }
        (Value::Array(items), Repr::Array { element, .. }) => {
            let rendered = items
                .iter()
                .map(|item| stringify_record(element, item, ctx).map(|s| format!("{{{s}}}")))
                .collect::<Result<Vec<_>>>()?;
            format!("[{}]", rendered.join(", "))
        }
        (other, repr) => {
            return Err(Error::field(
                fd.name,
                format!("a {} does not fit a {:?} field", other.kind(), repr),
            ));
        }
    };
    Ok(text)
}

fn definition<'r>(
    registry: &'r Registry,
    b: &DecodedBox,
    ctx: &Context,
) -> Result<Option<&'r BoxDefinition>> {
    if b.is_opaque() {
        return Ok(None);
    }
    registry
        .resolve(&b.box_type, ctx, b.version)?
        .map(Some)
        .ok_or_else(|| Error::field(b.box_type.to_string(), "no schema matches this box here"))
}

fn describe(def: Option<&BoxDefinition>, b: &DecodedBox, ctx: &Context) -> Result<String> {
    let (def, fields) = match (def, &b.body) {
        (None, Body::Opaque(payload)) => return Ok(format!("({} bytes)", payload.len())),
        (Some(def), Body::Leaf(fields) | Body::Container { fields, .. }) => (def, fields),
        _ => return Ok(String::new()),
    };
    let schema = &def.schema;
    let here = if schema.is_full_box() {
        ctx.with_header(b.version, b.flags)
    } else {
        ctx.with_header(None, 0)
    };
    let body = stringify_record(schema, fields, &here)?;
    if !schema.is_full_box() {
        return Ok(body);
    }
    let head = format!("Version={} Flags={:#08x}", b.version.unwrap_or(0), b.flags);
    Ok(if body.is_empty() {
        head
    } else {
        format!("{head} {body}")
    })
}

/// One-line rendering of a box's own fields. FullBox shapes are prefixed
/// with their version and flags.
pub fn stringify_box(registry: &Registry, b: &DecodedBox, ctx: &Context) -> Result<String> {
    let def = definition(registry, b, ctx)?;
    describe(def, b, ctx)
}

/// Indented tree, one `[type] fields` line per box.
pub fn render_tree(registry: &Registry, boxes: &[DecodedBox], ctx: &Context) -> Result<String> {
    let mut out = String::new();
    render_level(registry, boxes, ctx, 0, &mut out)?;
    Ok(out)
}

fn render_level(
    registry: &Registry,
    boxes: &[DecodedBox],
    ctx: &Context,
    depth: usize,
    out: &mut String,
) -> Result<()> {
    for b in boxes {
        let def = definition(registry, b, ctx)?;
        let text = describe(def, b, ctx)?;
        out.push_str(&"  ".repeat(depth));
        out.push_str(&format!("[{}]", b.box_type));
        if !text.is_empty() {
            out.push(' ');
            out.push_str(&text);
        }
        out.push('\n');
        if let Some(def) = def {
            let child_ctx = ctx.for_children(def.child_markers);
            render_level(registry, b.children(), &child_ctx, depth + 1, out)?;
        }
    }
    Ok(())
}
