//! ETSI TS 102 366 (AC-3 / E-AC-3) sample entries and decoder configuration.
use crate::boxes_iso::{audio_entry, audio_sample_entry};
use crate::error::Result;
use crate::field_names;
use crate::registry::{BoxDefinition, Registry};
use crate::schema::{Len, Schema, SchemaBuilder, Siblings, dynamic};
use std::sync::Arc;

field_names! {
    enum Dac3 {
        Fscod => "Fscod",
        Bsid => "Bsid",
        Bsmod => "Bsmod",
        Acmod => "Acmod",
        LfeOn => "LfeOn",
        BitRateCode => "BitRateCode",
        Reserved => "Reserved",
    }
}

fn dac3() -> Result<Arc<Schema>> {
    SchemaBuilder::new("dac3")
        .uint(0, Dac3::Fscod, 2)
        .uint(1, Dac3::Bsid, 5)
        .uint(2, Dac3::Bsmod, 3)
        .uint(3, Dac3::Acmod, 3)
        .uint(4, Dac3::LfeOn, 1)
        .uint(5, Dac3::BitRateCode, 5)
        .constant(6, Dac3::Reserved, 5, 0)
        .build_arc()
}

field_names! {
    enum Dec3 {
        DataRate => "DataRate",
        NumIndSub => "NumIndSub",
        IndSub => "IndSub",
        Reserved1 => "Reserved1",
        FlagEC3ExtensionTypeA => "FlagEC3ExtensionTypeA",
        ComplexityIndexTypeA => "ComplexityIndexTypeA",
        Reserved2 => "Reserved2",
    }
}

field_names! {
    enum IndSub {
        Fscod => "Fscod",
        Bsid => "Bsid",
        Reserved1 => "Reserved1",
        Asvc => "Asvc",
        Bsmod => "Bsmod",
        Acmod => "Acmod",
        LfeOn => "LfeOn",
        Reserved2 => "Reserved2",
        NumDepSub => "NumDepSub",
        ChanLoc => "ChanLoc",
        Reserved3 => "Reserved3",
    }
}

/// One independent substream. `ChanLoc` exists only when dependent
/// substreams follow; otherwise a reserved bit takes its place.
fn ind_sub() -> Result<Arc<Schema>> {
    SchemaBuilder::new("dec3_ind_sub")
        .uint(0, IndSub::Fscod, 2)
        .uint(1, IndSub::Bsid, 5)
        .constant(2, IndSub::Reserved1, 1, 0)
        .uint(3, IndSub::Asvc, 1)
        .uint(4, IndSub::Bsmod, 3)
        .uint(5, IndSub::Acmod, 3)
        .uint(6, IndSub::LfeOn, 1)
        .constant(7, IndSub::Reserved2, 3, 0)
        .uint(8, IndSub::NumDepSub, 4)
        .hex(9, IndSub::ChanLoc, 9)
        .when(|s, _| Ok(s.uint(IndSub::NumDepSub)? > 0))
        .constant(10, IndSub::Reserved3, 1, 0)
        .when(|s, _| Ok(s.uint(IndSub::ChanLoc)? == 0))
        .build_arc()
}

fn dec3() -> Result<Arc<Schema>> {
    SchemaBuilder::new("dec3")
        .uint(0, Dec3::DataRate, 13)
        .uint(1, Dec3::NumIndSub, 3)
        .array(
            2,
            Dec3::IndSub,
            ind_sub()?,
            dynamic(|s: &Siblings<'_, Dec3>, _| Ok(s.uint(Dec3::NumIndSub)? + 1)),
        )
        .uint(3, Dec3::Reserved1, 7)
        .uint(4, Dec3::FlagEC3ExtensionTypeA, 1)
        .uint(5, Dec3::ComplexityIndexTypeA, 8)
        .bytes(6, Dec3::Reserved2, Len::Rest)
        .build_arc()
}

pub(crate) fn register(reg: Registry) -> Result<Registry> {
    let audio = audio_sample_entry()?;
    Ok(reg
        .with_definition(audio_entry(b"ac-3", audio.clone()))
        .with_definition(audio_entry(b"ec-3", audio))
        .with_definition(BoxDefinition::fourcc(b"dac3", dac3()?))
        .with_definition(BoxDefinition::fourcc(b"dec3", dec3()?)))
}
