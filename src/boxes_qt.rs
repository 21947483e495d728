//! QuickTime and iTunes extensions: ALAC, chroma, loudness and encoder boxes.
use crate::boxes_iso::{audio_entry, audio_sample_entry, container, under_stsd};
use crate::context::{Context, Marker};
use crate::error::Result;
use crate::field_names;
use crate::registry::{BoxDefinition, Registry};
use crate::schema::{Len, Schema, SchemaBuilder, count};
use std::sync::Arc;

field_names! {
    enum Alac {
        FrameLength => "FrameLength",
        CompatibleVersion => "CompatibleVersion",
        BitDepth => "BitDepth",
        Pb => "Pb",
        Mb => "Mb",
        Kb => "Kb",
        NumChannels => "NumChannels",
        MaxRun => "MaxRun",
        MaxFrameByte => "MaxFrameByte",
        AvgBitRate => "AvgBitRate",
        SampleRate => "SampleRate",
    }
}

/// ALACSpecificConfig, nested inside the `alac` sample entry of the same name.
fn alac_config() -> Result<Arc<Schema>> {
    SchemaBuilder::new("alac_config")
        .full_box()
        .uint(0, Alac::FrameLength, 32)
        .uint(1, Alac::CompatibleVersion, 8)
        .uint(2, Alac::BitDepth, 8)
        .uint(3, Alac::Pb, 8)
        .uint(4, Alac::Mb, 8)
        .uint(5, Alac::Kb, 8)
        .uint(6, Alac::NumChannels, 8)
        .uint(7, Alac::MaxRun, 16)
        .uint(8, Alac::MaxFrameByte, 32)
        .uint(9, Alac::AvgBitRate, 32)
        .uint(10, Alac::SampleRate, 32)
        .build_arc()
}

fn in_audio_sample_entry(ctx: &Context) -> bool {
    ctx.is(Marker::AudioSampleEntry)
}

fn alac_sample_entry_slot(ctx: &Context) -> bool {
    under_stsd(ctx) && !ctx.is(Marker::AudioSampleEntry)
}

field_names! {
    enum Chrm { X => "X", Y => "Y" }
}

fn chrm() -> Result<Arc<Schema>> {
    SchemaBuilder::new("chrm")
        .uint(0, Chrm::X, 8)
        .uint(1, Chrm::Y, 8)
        .build_arc()
}

field_names! {
    enum Loudness { LoudnessBaseCount => "LoudnessBaseCount", LoudnessBases => "LoudnessBases" }
}

field_names! {
    enum LoudnessBase {
        EQSetID => "EQSetID",
        DownmixID => "DownmixID",
        DRCSetID => "DRCSetID",
        BsSamplePeakLevel => "BsSamplePeakLevel",
        BsTruePeakLevel => "BsTruePeakLevel",
        MeasurementSystemForTP => "MeasurementSystemForTP",
        ReliabilityForTP => "ReliabilityForTP",
        MeasurementCount => "MeasurementCount",
        Measurements => "Measurements",
    }
}

field_names! {
    enum Measurement {
        MethodDefinition => "MethodDefinition",
        MethodValue => "MethodValue",
        MeasurementSystem => "MeasurementSystem",
        Reliability => "Reliability",
    }
}

/// Track (`tlou`) or album (`alou`) loudness, as found under `ludt`.
fn loudness(name: &'static str) -> Result<Arc<Schema>> {
    let measurement = SchemaBuilder::new("loudness_measurement")
        .uint(0, Measurement::MethodDefinition, 8)
        .uint(1, Measurement::MethodValue, 8)
        .uint(2, Measurement::MeasurementSystem, 4)
        .uint(3, Measurement::Reliability, 4)
        .build_arc()?;
    let base = SchemaBuilder::new("loudness_base")
        .uint(0, LoudnessBase::EQSetID, 8)
        .uint(1, LoudnessBase::DownmixID, 10)
        .uint(2, LoudnessBase::DRCSetID, 6)
        .uint(3, LoudnessBase::BsSamplePeakLevel, 12)
        .uint(4, LoudnessBase::BsTruePeakLevel, 12)
        .uint(5, LoudnessBase::MeasurementSystemForTP, 4)
        .uint(6, LoudnessBase::ReliabilityForTP, 4)
        .uint(7, LoudnessBase::MeasurementCount, 8)
        .array(
            8,
            LoudnessBase::Measurements,
            measurement,
            count(LoudnessBase::MeasurementCount),
        )
        .build_arc()?;
    SchemaBuilder::new(name)
        .full_box()
        .constant(0, Loudness::LoudnessBaseCount, 8, 1)
        .array(1, Loudness::LoudnessBases, base, count(Loudness::LoudnessBaseCount))
        .build_arc()
}

field_names! {
    enum Swre { Unknown => "Unknown", Version => "Version" }
}

fn swre() -> Result<Arc<Schema>> {
    SchemaBuilder::new("swre")
        .full_box()
        .bytes(0, Swre::Unknown, Len::Fixed(2))
        .string(1, Swre::Version)
        .build_arc()
}

pub(crate) fn register(reg: Registry) -> Result<Registry> {
    Ok(reg
        .with_definition(audio_entry(b"alac", audio_sample_entry()?).when(alac_sample_entry_slot))
        .with_definition(BoxDefinition::fourcc(b"alac", alac_config()?).when(in_audio_sample_entry))
        .with_definition(BoxDefinition::fourcc(b"chrm", chrm()?))
        .with_definition(container("ludt")?)
        .with_definition(BoxDefinition::fourcc(b"tlou", loudness("tlou")?))
        .with_definition(BoxDefinition::fourcc(b"alou", loudness("alou")?))
        .with_definition(BoxDefinition::fourcc(b"swre", swre()?)))
}
