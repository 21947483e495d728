//! Generic encode/decode of a [`Schema`]'s fields.
//!
//! Both directions visit fields in ordinal order and decide presence and
//! length from the same already-materialized siblings, so a record that
//! encodes also decodes to itself.
use crate::bits::{BitReader, BitWriter};
use crate::config::{ConstPolicy, DecodeOptions};
use crate::context::Context;
use crate::error::{Error, Result};
use crate::schema::{FieldDescriptor, Fields, Len, Repr, Schema};
use crate::value::{Record, Value};

fn qualified(schema: &Schema, fd: &FieldDescriptor) -> String {
    format!("{}.{}", schema.name(), fd.name)
}

fn resolve_len(len: &Len, before: &Fields<'_>, ctx: &Context) -> Result<Option<u64>> {
    match len {
        Len::Fixed(n) => Ok(Some(*n)),
        Len::Dynamic(hook) => hook(before, ctx).map(Some),
        Len::Rest => Ok(None),
    }
}

/// Decode every field of `schema` from `r`. Absent fields get their zero value.
pub fn decode_fields(
    schema: &Schema,
    r: &mut BitReader<'_>,
    ctx: &Context,
    options: &DecodeOptions,
) -> Result<Record> {
    let mut values: Vec<(&'static str, Value)> = Vec::with_capacity(schema.fields().len());
    for fd in schema.fields() {
        let at = r.offset();
        let value =
            decode_field(schema, fd, r, ctx, options, &values).map_err(|e| e.at_offset(at))?;
        values.push((fd.name, value));
    }
    Ok(Record::from_fields(values))
}

fn decode_field(
    schema: &Schema,
    fd: &FieldDescriptor,
    r: &mut BitReader<'_>,
    ctx: &Context,
    options: &DecodeOptions,
    values: &[(&'static str, Value)],
) -> Result<Value> {
    let before = Fields::new(schema.name(), values);
    if fd.is_present(&before, ctx)? {
        decode_value(schema, fd, r, ctx, options, &before)
    } else {
        Ok(fd.repr.zero())
    }
}

fn decode_value(
    schema: &Schema,
    fd: &FieldDescriptor,
    r: &mut BitReader<'_>,
    ctx: &Context,
    options: &DecodeOptions,
    before: &Fields<'_>,
) -> Result<Value> {
    let value = match &fd.repr {
        Repr::Uint { bits } => {
            let v = r.read_bits(*bits)?;
            if let Some(c) = fd.constant {
                if v != c {
                    match options.const_policy {
                        ConstPolicy::Reject => {
                            return Err(Error::field(
                                qualified(schema, fd),
                                format!("expected constant {c:#x}, found {v:#x}"),
                            ));
                        }
                        ConstPolicy::Accept => log::debug!(
                            "{}: constant {:#x} expected, keeping {:#x}",
                            qualified(schema, fd),
                            c,
                            v
                        ),
                    }
                }
            }
            Value::Uint(v)
        }
        Repr::Int { bits } => {
            let raw = r.read_bits(*bits)?;
            Value::Int(sign_extend(raw, *bits))
        }
        Repr::Bytes { len } => {
            let n = match resolve_len(len, before, ctx)? {
                Some(n) => n,
                None => r.remaining_bits() / 8,
            };
            Value::Bytes(r.read_bytes(n)?)
        }
        Repr::Uuid => {
            let b = r.read_bytes(16)?;
            let mut u = [0u8; 16];
            u.copy_from_slice(&b);
            Value::Uuid(u)
        }
        Repr::Str => {
            let mut buf = Vec::new();
            while r.remaining_bits() >= 8 {
                let b = r.read_bits(8)? as u8;
                if b == 0 {
                    break;
                }
                buf.push(b);
            }
            Value::Str(String::from_utf8_lossy(&buf).into_owned())
        }
        Repr::Record(nested) => Value::Record(decode_fields(nested, r, ctx, options)?),
        Repr::Array { element, len } => {
            let mut items = Vec::new();
            match resolve_len(len, before, ctx)? {
                Some(n) => {
                    for _ in 0..n {
                        let at = r.consumed_bits();
                        items.push(decode_fields(element, r, ctx, options)?);
                        // Elements that take no input are not bounded by the payload.
                        if r.consumed_bits() == at && n > options.max_empty_elements {
                            return Err(Error::field(
                                qualified(schema, fd),
                                format!(
                                    "{n} zero-width elements exceed the limit of {}",
                                    options.max_empty_elements
                                ),
                            ));
                        }
                    }
                }
                None => {
                    while r.remaining_bits() > 0 {
                        let at = r.consumed_bits();
                        items.push(decode_fields(element, r, ctx, options)?);
                        if r.consumed_bits() == at {
                            return Err(Error::schema(
                                schema.name(),
                                format!("{} fills the payload with zero-width elements", fd.name),
                            ));
                        }
                    }
                }
            }
            Value::Array(items)
        }
    };
    Ok(value)
}

fn sign_extend(raw: u64, bits: u32) -> i64 {
    if bits >= 64 {
        return raw as i64;
    }
    let shift = 64 - bits;
    ((raw << shift) as i64) >> shift
}

/// Encode every field of `record` as laid out by `schema`.
pub fn encode_fields(
    schema: &Schema,
    record: &Record,
    w: &mut BitWriter,
    ctx: &Context,
) -> Result<()> {
    let mut done: Vec<(&'static str, Value)> = Vec::with_capacity(schema.fields().len());
    for fd in schema.fields() {
        let value = {
            let before = Fields::new(schema.name(), &done);
            if fd.is_present(&before, ctx)? {
                let value = match fd.constant {
                    Some(c) => Value::Uint(c),
                    None => record.get(fd.name).cloned().ok_or_else(|| {
                        Error::field(qualified(schema, fd), "missing from the record")
                    })?,
                };
                encode_value(schema, fd, &value, w, ctx, &before)?;
                value
            } else {
                fd.repr.zero()
            }
        };
        done.push((fd.name, value));
    }
    Ok(())
}

fn encode_value(
    schema: &Schema,
    fd: &FieldDescriptor,
    value: &Value,
    w: &mut BitWriter,
    ctx: &Context,
    before: &Fields<'_>,
) -> Result<()> {
    let wrong_kind = || {
        Error::field(
            qualified(schema, fd),
            format!("a {} does not fit a {:?} field", value.kind(), fd.repr),
        )
    };
    let check_len = |expected: Option<u64>, actual: usize| -> Result<()> {
        match expected {
            Some(n) if n != actual as u64 => Err(Error::field(
                qualified(schema, fd),
                format!("length is {actual} but the layout requires {n}"),
            )),
            _ => Ok(()),
        }
    };

    match &fd.repr {
        Repr::Uint { bits } => {
            let v = value.as_uint().ok_or_else(wrong_kind)?;
            if *bits < 64 && v >> bits != 0 {
                return Err(Error::field(
                    qualified(schema, fd),
                    format!("{v} does not fit in {bits} bits"),
                ));
            }
            w.write_bits(v, *bits);
        }
        Repr::Int { bits } => {
            let v = value.as_int().ok_or_else(wrong_kind)?;
            if *bits < 64 {
                let min = -(1i64 << (bits - 1));
                let max = (1i64 << (bits - 1)) - 1;
                if v < min || v > max {
                    return Err(Error::field(
                        qualified(schema, fd),
                        format!("{v} does not fit in {bits} signed bits"),
                    ));
                }
                w.write_bits((v as u64) & ((1u64 << bits) - 1), *bits);
            } else {
                w.write_bits(v as u64, 64);
            }
        }
        Repr::Bytes { len } => {
            let b = value.as_bytes().ok_or_else(wrong_kind)?;
            check_len(resolve_len(len, before, ctx)?, b.len())?;
            w.write_bytes(b);
        }
        Repr::Uuid => match value {
            Value::Uuid(u) => w.write_bytes(u),
            _ => return Err(wrong_kind()),
        },
        Repr::Str => match value {
            Value::Str(s) => {
                w.write_bytes(s.as_bytes());
                w.write_bits(0, 8);
            }
            _ => return Err(wrong_kind()),
        },
        Repr::Record(nested) => {
            let rec = value.as_record().ok_or_else(wrong_kind)?;
            encode_fields(nested, rec, w, ctx)?;
        }
        Repr::Array { element, len } => {
            let items = value.as_array().ok_or_else(wrong_kind)?;
            check_len(resolve_len(len, before, ctx)?, items.len())?;
            for item in items {
                encode_fields(element, item, w, ctx)?;
            }
        }
    }
    Ok(())
}

/// Decode a standalone payload that must be consumed exactly.
pub fn decode_record(
    schema: &Schema,
    payload: &[u8],
    ctx: &Context,
    options: &DecodeOptions,
) -> Result<Record> {
    let mut src = payload;
    let mut r = BitReader::new(&mut src, 0, payload.len() as u64);
    let record = decode_fields(schema, &mut r, ctx, options)?;
    if r.remaining_bits() != 0 {
        return Err(Error::MalformedBox {
            box_type: None,
            offset: 0,
            declared: payload.len() as u64,
            consumed: r.consumed_bits().div_ceil(8),
        });
    }
    Ok(record)
}

/// Encode a record into a standalone payload.
pub fn encode_record(schema: &Schema, record: &Record, ctx: &Context) -> Result<Vec<u8>> {
    let mut w = BitWriter::new();
    encode_fields(schema, record, &mut w, ctx)?;
    Ok(w.finish())
}
