//! ISO/IEC 23001-7 common encryption boxes.
use crate::context::Context;
use crate::error::Result;
use crate::field_names;
use crate::registry::{BoxDefinition, Registry};
use crate::schema::{Schema, SchemaBuilder, Siblings, count, dynamic};
use crate::util::format_uuid;
use crate::value::Value;
use std::sync::Arc;

field_names! {
    enum Senc { SampleCount => "SampleCount", SampleEntries => "SampleEntries" }
}

field_names! {
    enum SencSample {
        InitializationVector => "InitializationVector",
        SubsampleCount => "SubsampleCount",
        SubsampleEntries => "SubsampleEntries",
    }
}

field_names! {
    enum Subsample {
        BytesOfClearData => "BytesOfClearData",
        BytesOfProtectedData => "BytesOfProtectedData",
    }
}

const USE_SUBSAMPLE_ENCRYPTION: u32 = 0x2;

fn has_subsamples(_: &Siblings<'_, SencSample>, ctx: &Context) -> Result<bool> {
    Ok(ctx.flags & USE_SUBSAMPLE_ENCRYPTION != 0)
}

fn senc() -> Result<Arc<Schema>> {
    let subsample = SchemaBuilder::new("senc_subsample")
        .uint(0, Subsample::BytesOfClearData, 16)
        .uint(1, Subsample::BytesOfProtectedData, 32)
        .build_arc()?;
    // The IV size is announced by a tenc elsewhere in the file, so the
    // caller supplies it through the context.
    let sample = SchemaBuilder::new("senc_sample")
        .bytes(
            0,
            SencSample::InitializationVector,
            dynamic(|_: &Siblings<'_, SencSample>, ctx| Ok(u64::from(ctx.per_sample_iv_size()))),
        )
        .uint(1, SencSample::SubsampleCount, 16)
        .when(has_subsamples)
        .array(
            2,
            SencSample::SubsampleEntries,
            subsample,
            count(SencSample::SubsampleCount),
        )
        .when(has_subsamples)
        .build_arc()?;
    SchemaBuilder::new("senc")
        .full_box()
        .uint(0, Senc::SampleCount, 32)
        .array(1, Senc::SampleEntries, sample, count(Senc::SampleCount))
        .build_arc()
}

field_names! {
    enum Pssh {
        SystemID => "SystemID",
        KIDCount => "KIDCount",
        KIDs => "KIDs",
        DataSize => "DataSize",
        Data => "Data",
    }
}

field_names! {
    enum Kid { KID => "KID" }
}

fn not_v0(_: &Siblings<'_, Pssh>, ctx: &Context) -> Result<bool> {
    Ok(ctx.version_or_zero() != 0)
}

fn pssh() -> Result<Arc<Schema>> {
    let kid = SchemaBuilder::new("pssh_kid").uuid(0, Kid::KID).build_arc()?;
    SchemaBuilder::new("pssh")
        .full_box()
        .uuid(0, Pssh::SystemID)
        .uint(1, Pssh::KIDCount, 32)
        .when(not_v0)
        .array(2, Pssh::KIDs, kid, count(Pssh::KIDCount))
        .when(not_v0)
        .stringify_with(|s, _| {
            let kids = s.get(Pssh::KIDs).ok()?.as_array()?;
            let ids: Vec<String> = kids
                .iter()
                .filter_map(|k| match k.get("KID") {
                    Some(Value::Uuid(u)) => Some(format_uuid(u)),
                    _ => None,
                })
                .collect();
            Some(format!("[{}]", ids.join(", ")))
        })
        .int(3, Pssh::DataSize, 32)
        .bytes(4, Pssh::Data, count(Pssh::DataSize))
        .build_arc()
}

field_names! {
    enum Tenc {
        Reserved => "Reserved",
        DefaultCryptByteBlock => "DefaultCryptByteBlock",
        DefaultSkipByteBlock => "DefaultSkipByteBlock",
        DefaultIsProtected => "DefaultIsProtected",
        DefaultPerSampleIVSize => "DefaultPerSampleIVSize",
        DefaultKID => "DefaultKID",
        DefaultConstantIVSize => "DefaultConstantIVSize",
        DefaultConstantIV => "DefaultConstantIV",
    }
}

/// A protected track without per-sample IVs carries one constant IV.
fn constant_iv(s: &Siblings<'_, Tenc>, _: &Context) -> Result<bool> {
    Ok(s.uint(Tenc::DefaultIsProtected)? == 1 && s.uint(Tenc::DefaultPerSampleIVSize)? == 0)
}

fn tenc() -> Result<Arc<Schema>> {
    SchemaBuilder::new("tenc")
        .full_box()
        .uint(0, Tenc::Reserved, 8)
        .uint(1, Tenc::DefaultCryptByteBlock, 4)
        .uint(2, Tenc::DefaultSkipByteBlock, 4)
        .uint(3, Tenc::DefaultIsProtected, 8)
        .uint(4, Tenc::DefaultPerSampleIVSize, 8)
        .uuid(5, Tenc::DefaultKID)
        .uint(6, Tenc::DefaultConstantIVSize, 8)
        .when(constant_iv)
        .bytes(7, Tenc::DefaultConstantIV, count(Tenc::DefaultConstantIVSize))
        .when(constant_iv)
        .build_arc()
}

pub(crate) fn register(reg: Registry) -> Result<Registry> {
    Ok(reg
        .with_definition(BoxDefinition::fourcc(b"senc", senc()?))
        .with_definition(BoxDefinition::fourcc(b"pssh", pssh()?).versions(&[0, 1]))
        .with_definition(BoxDefinition::fourcc(b"tenc", tenc()?).versions(&[0, 1])))
}
