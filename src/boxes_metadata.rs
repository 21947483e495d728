//! iTunes-style metadata: the `udta` handler, item lists and `keys`.
use crate::boxes::BoxType;
use crate::context::{Context, Marker, Markers};
use crate::error::{Error, Result};
use crate::field_names;
use crate::registry::{BoxDefinition, Registry};
use crate::schema::{Len, Schema, SchemaBuilder, Siblings, count, dynamic};
use crate::util::quoted;
use std::sync::Arc;

/// Item atoms that may appear directly under `ilst`.
const ILST_ITEMS: &[&[u8; 4]] = &[
    b"@PST", b"@ppi", b"@pti", b"@sti", b"AACR", b"CDEK", b"CDET", b"GUID", b"VERS", b"aART",
    b"akID", b"albm", b"apID", b"atID", b"auth", b"catg", b"cmID", b"cnID", b"covr", b"cpil",
    b"cprt", b"desc", b"disk", b"dscp", b"egid", b"geID", b"gnre", b"grup", b"gshh", b"gspm",
    b"gspu", b"gssd", b"gsst", b"gstd", b"hdvd", b"itnu", b"keyw", b"ldes", b"ownr", b"pcst",
    b"perf", b"pgap", b"plID", b"prID", b"purd", b"purl", b"rate", b"rldt", b"rtng", b"sdes",
    b"sfID", b"shwm", b"snal", b"soaa", b"soal", b"soar", b"soco", b"sonm", b"sosn", b"stik",
    b"titl", b"tmpo", b"tnal", b"trkn", b"tven", b"tves", b"tvnn", b"tvsh", b"tvsn", b"xid ",
    b"yrrc", b"data", b"\xA9ART", b"\xA9alb", b"\xA9ard", b"\xA9arg", b"\xA9aut", b"\xA9cmt",
    b"\xA9com", b"\xA9con", b"\xA9cpy", b"\xA9day", b"\xA9des", b"\xA9dir", b"\xA9enc",
    b"\xA9gen", b"\xA9grp", b"\xA9lyr", b"\xA9mvc", b"\xA9mvi", b"\xA9mvn", b"\xA9nam",
    b"\xA9nrt", b"\xA9ope", b"\xA9prd", b"\xA9pub", b"\xA9sne", b"\xA9sol", b"\xA9st3",
    b"\xA9too", b"\xA9trk", b"\xA9wrk", b"\xA9wrt", b"\xA9xpd", b"\xA9xyz",
];

/// Free-form item: its `mean` and `name` children spell the key.
const FREE_FORM: &[u8; 4] = b"----";

pub fn is_ilst_item(box_type: &BoxType) -> bool {
    match box_type {
        BoxType::FourCC(cc) => &cc.0 == FREE_FORM || ILST_ITEMS.contains(&&cc.0),
        BoxType::Uuid(_) => false,
    }
}

fn under_udta(ctx: &Context) -> bool {
    ctx.is(Marker::Udta)
}

fn ilst_item_slot(ctx: &Context) -> bool {
    ctx.is(Marker::Ilst) && !ctx.is(Marker::IlstMeta)
}

fn under_ilst_item(ctx: &Context) -> bool {
    ctx.is(Marker::IlstMeta)
}

fn under_free_form(ctx: &Context) -> bool {
    ctx.is(Marker::IlstFreeMeta)
}

field_names! {
    enum MetaHdlr {
        ComponentType => "ComponentType",
        HandlerType => "HandlerType",
        Name => "Name",
    }
}

fn metadata_hdlr() -> Result<Arc<Schema>> {
    SchemaBuilder::new("metadata_hdlr")
        .full_box()
        .hex(0, MetaHdlr::ComponentType, 32)
        .text(1, MetaHdlr::HandlerType, Len::Fixed(4))
        .text(2, MetaHdlr::Name, Len::Fixed(14))
        .build_arc()
}

const DATA_TYPE_UTF8: u64 = 1;

fn data_type_name(code: u64) -> Option<&'static str> {
    Some(match code {
        0 => "BINARY",
        1 | 4 => "UTF8",
        2 | 5 => "UTF16",
        3 => "SJIS",
        13 => "JPEG",
        14 => "PNG",
        27 => "BMP",
        21 => "INT",
        22 => "UINT",
        65 => "INT8",
        75 => "UINT8",
        66 => "INT16",
        76 => "UINT16",
        67 => "INT32",
        77 => "UINT32",
        74 => "INT64",
        78 => "UINT64",
        23 => "FLOAT32",
        24 => "FLOAT64",
        _ => return None,
    })
}

field_names! {
    enum Data { DataType => "DataType", DataLang => "DataLang", Data => "Data" }
}

fn data() -> Result<Arc<Schema>> {
    SchemaBuilder::new("data")
        .uint(0, Data::DataType, 32)
        .stringify_with(|s, _| data_type_name(s.uint(Data::DataType).ok()?).map(str::to_string))
        .uint(1, Data::DataLang, 32)
        .bytes(2, Data::Data, Len::Rest)
        .stringify_with(|s, _| {
            if s.uint(Data::DataType).ok()? != DATA_TYPE_UTF8 {
                return None;
            }
            Some(quoted(s.bytes(Data::Data).ok()?))
        })
        .build_arc()
}

field_names! {
    enum StringData { Data => "Data" }
}

/// `mean` and `name` under a free-form item. Writers put a zero
/// version/flags word first; it stays part of `Data`.
fn string_data(name: &'static str) -> Result<Arc<Schema>> {
    SchemaBuilder::new(name)
        .text(0, StringData::Data, Len::Rest)
        .build_arc()
}

field_names! {
    enum Keys { EntryCount => "EntryCount", Entries => "Entries" }
}

field_names! {
    enum Key { KeySize => "KeySize", KeyNamespace => "KeyNamespace", KeyValue => "KeyValue" }
}

fn keys() -> Result<Arc<Schema>> {
    // KeySize counts itself and the namespace.
    let key = SchemaBuilder::new("key")
        .int(0, Key::KeySize, 32)
        .text(1, Key::KeyNamespace, Len::Fixed(4))
        .text(
            2,
            Key::KeyValue,
            dynamic(|s: &Siblings<'_, Key>, _| {
                let size = s.uint(Key::KeySize)?;
                size.checked_sub(8).ok_or_else(|| {
                    Error::field("key.KeySize", format!("{size} is smaller than the key header"))
                })
            }),
        )
        .build_arc()?;
    SchemaBuilder::new("keys")
        .full_box()
        .int(0, Keys::EntryCount, 32)
        .array(1, Keys::Entries, key, count(Keys::EntryCount))
        .build_arc()
}

pub(crate) fn register(mut reg: Registry) -> Result<Registry> {
    let item = Arc::new(Schema::container("ilst_item"));
    for code in ILST_ITEMS {
        reg.register(
            BoxDefinition::fourcc(code, item.clone())
                .when(ilst_item_slot)
                .marks(Markers::of(Marker::IlstMeta)),
        );
    }
    reg.register(
        BoxDefinition::fourcc(FREE_FORM, item)
            .when(ilst_item_slot)
            .marks(Markers::of(Marker::IlstMeta).with(Marker::IlstFreeMeta)),
    );

    Ok(reg
        .with_definition(BoxDefinition::fourcc(b"hdlr", metadata_hdlr()?).when(under_udta))
        .with_definition(
            BoxDefinition::fourcc(b"ilst", Arc::new(Schema::container("ilst")))
                .marks(Markers::of(Marker::Ilst)),
        )
        .with_definition(BoxDefinition::fourcc(b"data", data()?).when(under_ilst_item))
        .with_definition(BoxDefinition::fourcc(b"mean", string_data("mean")?).when(under_free_form))
        .with_definition(BoxDefinition::fourcc(b"name", string_data("name")?).when(under_free_form))
        .with_definition(BoxDefinition::fourcc(b"keys", keys()?)))
}
