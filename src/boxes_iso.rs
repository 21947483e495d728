//! ISO/IEC 14496-12 boxes: file type, movie and media headers, handler,
//! sample tables, edit lists and audio sample entries.
use crate::boxes::BoxType;
use crate::context::{Context, Marker, Markers};
use crate::error::{Error, Result};
use crate::field_names;
use crate::registry::{BoxDefinition, Registry};
use crate::schema::{Len, Schema, SchemaBuilder, VersionGate, count};
use crate::util::quoted;
use std::sync::Arc;

const V0: VersionGate = VersionGate::Only(&[0]);
const V1: VersionGate = VersionGate::Only(&[1]);

pub(crate) fn under_stsd(ctx: &Context) -> bool {
    ctx.is(Marker::Stsd)
}

fn not_under_udta(ctx: &Context) -> bool {
    !ctx.is(Marker::Udta)
}

fn lang_from_u15(code: u64) -> String {
    if code == 0 {
        return "und".to_string();
    }
    let c1 = ((code >> 10) & 0x1F) as u8 + 0x60;
    let c2 = ((code >> 5) & 0x1F) as u8 + 0x60;
    let c3 = (code & 0x1F) as u8 + 0x60;
    format!("{}{}{}", c1 as char, c2 as char, c3 as char)
}

field_names! {
    enum Ftyp {
        MajorBrand => "MajorBrand",
        MinorVersion => "MinorVersion",
        CompatibleBrands => "CompatibleBrands",
    }
}

field_names! {
    enum Brand { Brand => "Brand" }
}

fn ftyp() -> Result<Arc<Schema>> {
    let brand = SchemaBuilder::new("brand")
        .text(0, Brand::Brand, Len::Fixed(4))
        .build_arc()?;
    SchemaBuilder::new("ftyp")
        .text(0, Ftyp::MajorBrand, Len::Fixed(4))
        .hex(1, Ftyp::MinorVersion, 32)
        .array(2, Ftyp::CompatibleBrands, brand, Len::Rest)
        .stringify_with(|s, _| {
            let brands = s.get(Ftyp::CompatibleBrands).ok()?.as_array()?;
            let names: Vec<String> = brands
                .iter()
                .filter_map(|b| b.bytes("Brand").map(quoted))
                .collect();
            Some(format!("[{}]", names.join(", ")))
        })
        .build_arc()
}

field_names! {
    enum Mvhd {
        CreationTimeV0 => "CreationTimeV0",
        ModificationTimeV0 => "ModificationTimeV0",
        CreationTimeV1 => "CreationTimeV1",
        ModificationTimeV1 => "ModificationTimeV1",
        Timescale => "Timescale",
        DurationV0 => "DurationV0",
        DurationV1 => "DurationV1",
        Rate => "Rate",
        Volume => "Volume",
        Reserved => "Reserved",
        Reserved2 => "Reserved2",
        Matrix => "Matrix",
        PreDefined => "PreDefined",
        NextTrackID => "NextTrackID",
    }
}

fn mvhd() -> Result<Arc<Schema>> {
    SchemaBuilder::new("mvhd")
        .full_box()
        .uint(0, Mvhd::CreationTimeV0, 32)
        .versions(V0)
        .uint(1, Mvhd::ModificationTimeV0, 32)
        .versions(V0)
        .uint(2, Mvhd::CreationTimeV1, 64)
        .versions(V1)
        .uint(3, Mvhd::ModificationTimeV1, 64)
        .versions(V1)
        .uint(4, Mvhd::Timescale, 32)
        .uint(5, Mvhd::DurationV0, 32)
        .versions(V0)
        .uint(6, Mvhd::DurationV1, 64)
        .versions(V1)
        .hex(7, Mvhd::Rate, 32)
        .hex(8, Mvhd::Volume, 16)
        .constant(9, Mvhd::Reserved, 16, 0)
        .bytes(10, Mvhd::Reserved2, Len::Fixed(8))
        .bytes(11, Mvhd::Matrix, Len::Fixed(36))
        .bytes(12, Mvhd::PreDefined, Len::Fixed(24))
        .uint(13, Mvhd::NextTrackID, 32)
        .build_arc()
}

field_names! {
    enum Mdhd {
        CreationTimeV0 => "CreationTimeV0",
        ModificationTimeV0 => "ModificationTimeV0",
        CreationTimeV1 => "CreationTimeV1",
        ModificationTimeV1 => "ModificationTimeV1",
        Timescale => "Timescale",
        DurationV0 => "DurationV0",
        DurationV1 => "DurationV1",
        Pad => "Pad",
        Language => "Language",
        PreDefined => "PreDefined",
    }
}

fn mdhd() -> Result<Arc<Schema>> {
    SchemaBuilder::new("mdhd")
        .full_box()
        .uint(0, Mdhd::CreationTimeV0, 32)
        .versions(V0)
        .uint(1, Mdhd::ModificationTimeV0, 32)
        .versions(V0)
        .uint(2, Mdhd::CreationTimeV1, 64)
        .versions(V1)
        .uint(3, Mdhd::ModificationTimeV1, 64)
        .versions(V1)
        .uint(4, Mdhd::Timescale, 32)
        .uint(5, Mdhd::DurationV0, 32)
        .versions(V0)
        .uint(6, Mdhd::DurationV1, 64)
        .versions(V1)
        .constant(7, Mdhd::Pad, 1, 0)
        .uint(8, Mdhd::Language, 15)
        .stringify_with(|s, _| {
            let code = s.uint(Mdhd::Language).ok()?;
            Some(quoted(lang_from_u15(code).as_bytes()))
        })
        .uint(9, Mdhd::PreDefined, 16)
        .build_arc()
}

field_names! {
    enum Hdlr {
        PreDefined => "PreDefined",
        HandlerType => "HandlerType",
        Reserved => "Reserved",
        Name => "Name",
    }
}

fn hdlr() -> Result<Arc<Schema>> {
    SchemaBuilder::new("hdlr")
        .full_box()
        .uint(0, Hdlr::PreDefined, 32)
        .text(1, Hdlr::HandlerType, Len::Fixed(4))
        .bytes(2, Hdlr::Reserved, Len::Fixed(12))
        .string(3, Hdlr::Name)
        .build_arc()
}

field_names! {
    enum Stsd { EntryCount => "EntryCount" }
}

fn stsd() -> Result<Arc<Schema>> {
    SchemaBuilder::new("stsd")
        .full_box()
        .with_children()
        .uint(0, Stsd::EntryCount, 32)
        .build_arc()
}

field_names! {
    enum Table { EntryCount => "EntryCount", Entries => "Entries" }
}

/// FullBox holding an entry count followed by that many `element` records.
fn table(name: &'static str, element: Arc<Schema>) -> Result<Arc<Schema>> {
    SchemaBuilder::new(name)
        .full_box()
        .uint(0, Table::EntryCount, 32)
        .array(1, Table::Entries, element, count(Table::EntryCount))
        .build_arc()
}

field_names! {
    enum SttsEntry { SampleCount => "SampleCount", SampleDelta => "SampleDelta" }
}

fn stts() -> Result<Arc<Schema>> {
    let entry = SchemaBuilder::new("stts_entry")
        .uint(0, SttsEntry::SampleCount, 32)
        .uint(1, SttsEntry::SampleDelta, 32)
        .build_arc()?;
    table("stts", entry)
}

field_names! {
    enum CttsEntry {
        SampleCount => "SampleCount",
        SampleOffsetV0 => "SampleOffsetV0",
        SampleOffsetV1 => "SampleOffsetV1",
    }
}

fn ctts() -> Result<Arc<Schema>> {
    let entry = SchemaBuilder::new("ctts_entry")
        .uint(0, CttsEntry::SampleCount, 32)
        .uint(1, CttsEntry::SampleOffsetV0, 32)
        .versions(V0)
        .int(2, CttsEntry::SampleOffsetV1, 32)
        .versions(VersionGate::Except(&[0]))
        .build_arc()?;
    table("ctts", entry)
}

field_names! {
    enum StscEntry {
        FirstChunk => "FirstChunk",
        SamplesPerChunk => "SamplesPerChunk",
        SampleDescriptionIndex => "SampleDescriptionIndex",
    }
}

fn stsc() -> Result<Arc<Schema>> {
    let entry = SchemaBuilder::new("stsc_entry")
        .uint(0, StscEntry::FirstChunk, 32)
        .uint(1, StscEntry::SamplesPerChunk, 32)
        .uint(2, StscEntry::SampleDescriptionIndex, 32)
        .build_arc()?;
    table("stsc", entry)
}

field_names! {
    enum Stsz {
        SampleSize => "SampleSize",
        SampleCount => "SampleCount",
        EntrySizes => "EntrySizes",
    }
}

field_names! {
    enum EntrySize { EntrySize => "EntrySize" }
}

fn stsz() -> Result<Arc<Schema>> {
    let entry = SchemaBuilder::new("stsz_entry")
        .uint(0, EntrySize::EntrySize, 32)
        .build_arc()?;
    SchemaBuilder::new("stsz")
        .full_box()
        .uint(0, Stsz::SampleSize, 32)
        .uint(1, Stsz::SampleCount, 32)
        .array(2, Stsz::EntrySizes, entry, count(Stsz::SampleCount))
        .when(|s, _| Ok(s.uint(Stsz::SampleSize)? == 0))
        .build_arc()
}

field_names! {
    enum ChunkOffset { ChunkOffset => "ChunkOffset" }
}

fn chunk_offsets(name: &'static str, bits: u32) -> Result<Arc<Schema>> {
    let entry = SchemaBuilder::new("chunk_offset")
        .uint(0, ChunkOffset::ChunkOffset, bits)
        .build_arc()?;
    table(name, entry)
}

field_names! {
    enum SyncSample { SampleNumber => "SampleNumber" }
}

fn stss() -> Result<Arc<Schema>> {
    let entry = SchemaBuilder::new("stss_entry")
        .uint(0, SyncSample::SampleNumber, 32)
        .build_arc()?;
    table("stss", entry)
}

field_names! {
    enum ElstEntry {
        SegmentDurationV0 => "SegmentDurationV0",
        MediaTimeV0 => "MediaTimeV0",
        SegmentDurationV1 => "SegmentDurationV1",
        MediaTimeV1 => "MediaTimeV1",
        MediaRateInteger => "MediaRateInteger",
        MediaRateFraction => "MediaRateFraction",
    }
}

fn elst() -> Result<Arc<Schema>> {
    let entry = SchemaBuilder::new("elst_entry")
        .uint(0, ElstEntry::SegmentDurationV0, 32)
        .versions(V0)
        .int(1, ElstEntry::MediaTimeV0, 32)
        .versions(V0)
        .uint(2, ElstEntry::SegmentDurationV1, 64)
        .versions(V1)
        .int(3, ElstEntry::MediaTimeV1, 64)
        .versions(V1)
        .int(4, ElstEntry::MediaRateInteger, 16)
        .int(5, ElstEntry::MediaRateFraction, 16)
        .build_arc()?;
    table("elst", entry)
}

field_names! {
    enum AudioSampleEntry {
        Reserved => "Reserved",
        DataReferenceIndex => "DataReferenceIndex",
        EntryVersion => "EntryVersion",
        Reserved2 => "Reserved2",
        ChannelCount => "ChannelCount",
        SampleSize => "SampleSize",
        PreDefined => "PreDefined",
        Reserved3 => "Reserved3",
        SampleRate => "SampleRate",
        QuickTimeData => "QuickTimeData",
    }
}

/// Audio sample entry shared by `mp4a`, `ac-3`, `ec-3` and `alac`.
pub(crate) fn audio_sample_entry() -> Result<Arc<Schema>> {
    SchemaBuilder::new("audio_sample_entry")
        .with_children()
        .bytes(0, AudioSampleEntry::Reserved, Len::Fixed(6))
        .uint(1, AudioSampleEntry::DataReferenceIndex, 16)
        .uint(2, AudioSampleEntry::EntryVersion, 16)
        .bytes(3, AudioSampleEntry::Reserved2, Len::Fixed(6))
        .uint(4, AudioSampleEntry::ChannelCount, 16)
        .uint(5, AudioSampleEntry::SampleSize, 16)
        .uint(6, AudioSampleEntry::PreDefined, 16)
        .uint(7, AudioSampleEntry::Reserved3, 16)
        .uint(8, AudioSampleEntry::SampleRate, 32)
        .stringify_with(|s, _| {
            let rate = s.uint(AudioSampleEntry::SampleRate).ok()?;
            let frac = rate & 0xFFFF;
            if frac == 0 {
                Some((rate >> 16).to_string())
            } else {
                Some(format!("{:.4}", rate as f64 / 65536.0))
            }
        })
        // QuickTime sound description version 1: four 32-bit packet/byte ratios.
        .bytes(9, AudioSampleEntry::QuickTimeData, Len::Fixed(16))
        .when(|s, _| Ok(s.uint(AudioSampleEntry::EntryVersion)? == 1))
        .build_arc()
}

/// Plain containers: no field prefix, only children.
const CONTAINERS: &[&str] = &[
    "moov", "trak", "mdia", "minf", "stbl", "edts", "moof", "traf", "mfra", "mvex", "dinf",
    "sinf", "schi", "ipro", "tref", "iprp",
];

pub(crate) fn container(name: &'static str) -> Result<BoxDefinition> {
    let code: [u8; 4] = name
        .as_bytes()
        .try_into()
        .map_err(|_| Error::schema(name, "box type must be four bytes"))?;
    Ok(BoxDefinition::new(
        BoxType::fourcc(&code),
        Arc::new(Schema::container(name)),
    ))
}

pub(crate) fn register(mut reg: Registry) -> Result<Registry> {
    for name in CONTAINERS {
        reg.register(container(name)?);
    }
    reg.register(container("udta")?.marks(Markers::of(Marker::Udta)));
    reg.register(BoxDefinition::fourcc(
        b"meta",
        Arc::new(Schema::full_container("meta")),
    ));

    let audio = audio_sample_entry()?;
    let time_versions: &'static [u8] = &[0, 1];
    Ok(reg
        .with_definition(BoxDefinition::fourcc(b"ftyp", ftyp()?))
        .with_definition(BoxDefinition::fourcc(b"mvhd", mvhd()?).versions(time_versions))
        .with_definition(BoxDefinition::fourcc(b"mdhd", mdhd()?).versions(time_versions))
        .with_definition(BoxDefinition::fourcc(b"hdlr", hdlr()?).when(not_under_udta))
        .with_definition(BoxDefinition::fourcc(b"stsd", stsd()?).marks(Markers::of(Marker::Stsd)))
        .with_definition(BoxDefinition::fourcc(b"stts", stts()?))
        .with_definition(BoxDefinition::fourcc(b"ctts", ctts()?).versions(time_versions))
        .with_definition(BoxDefinition::fourcc(b"stsc", stsc()?))
        .with_definition(BoxDefinition::fourcc(b"stsz", stsz()?))
        .with_definition(BoxDefinition::fourcc(b"stco", chunk_offsets("stco", 32)?))
        .with_definition(BoxDefinition::fourcc(b"co64", chunk_offsets("co64", 64)?))
        .with_definition(BoxDefinition::fourcc(b"stss", stss()?))
        .with_definition(BoxDefinition::fourcc(b"elst", elst()?).versions(time_versions))
        .with_definition(audio_entry(b"mp4a", audio)))
}

/// Sample entry definition; `alac` narrows the predicate further.
pub(crate) fn audio_entry(code: &[u8; 4], schema: Arc<Schema>) -> BoxDefinition {
    BoxDefinition::fourcc(code, schema)
        .when(under_stsd)
        .marks(Markers::of(Marker::AudioSampleEntry))
}
