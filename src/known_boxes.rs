use crate::boxes::BoxType;
use crate::config::AmbiguityPolicy;
use crate::error::Result;
use crate::registry::Registry;
use crate::{boxes_cenc, boxes_etsi, boxes_iso, boxes_metadata, boxes_qt};
use once_cell::sync::OnceCell;

/// Build a registry holding every compiled-in box shape.
pub fn build_registry(policy: AmbiguityPolicy) -> Result<Registry> {
    let reg = Registry::new().with_ambiguity(policy);
    let reg = boxes_iso::register(reg)?;
    let reg = boxes_etsi::register(reg)?;
    let reg = boxes_cenc::register(reg)?;
    let reg = boxes_qt::register(reg)?;
    boxes_metadata::register(reg)
}

static DEFAULT: OnceCell<Registry> = OnceCell::new();

/// The compiled-in catalogue with strict ambiguity checking, built on first
/// use and shared afterwards.
pub fn default_registry() -> Result<&'static Registry> {
    DEFAULT.get_or_try_init(|| build_registry(AmbiguityPolicy::Reject))
}

/// Human-readable name of a box type, for listings.
pub fn full_name(box_type: &BoxType) -> &'static str {
    let cc = match box_type {
        BoxType::Uuid(_) => return "User Extension",
        BoxType::FourCC(cc) => cc,
    };
    match &cc.0 {
        b"ftyp" => "File Type Box",
        b"moov" => "Movie Box",
        b"mdat" => "Media Data Box",
        b"free" | b"skip" => "Free Space Box",
        b"meta" => "Meta Box",
        b"mvhd" => "Movie Header Box",
        b"trak" => "Track Box",
        b"tkhd" => "Track Header Box",
        b"edts" => "Edit Box",
        b"elst" => "Edit List Box",
        b"mdia" => "Media Box",
        b"mdhd" => "Media Header Box",
        b"hdlr" => "Handler Reference Box",
        b"minf" => "Media Information Box",
        b"dinf" => "Data Information Box",
        b"stbl" => "Sample Table Box",
        b"stsd" => "Sample Description Box",
        b"stts" => "Decoding Time to Sample Box",
        b"ctts" => "Composition Time to Sample Box",
        b"stsc" => "Sample To Chunk Box",
        b"stsz" => "Sample Size Box",
        b"stco" => "Chunk Offset Box",
        b"co64" => "Chunk Large Offset Box",
        b"stss" => "Sync Sample Box",
        b"udta" => "User Data Box",
        b"tref" => "Track Reference Box",
        b"mvex" => "Movie Extends Box",
        b"moof" => "Movie Fragment Box",
        b"traf" => "Track Fragment Box",
        b"mfra" => "Movie Fragment Random Access Box",
        b"iprp" => "Item Properties Box",
        b"sinf" => "Protection Scheme Information Box",
        b"schi" => "Scheme Information Box",
        b"ipro" => "Item Protection Box",
        b"mp4a" => "MPEG-4 Audio Sample Entry",
        b"ac-3" => "AC-3 Audio Sample Entry",
        b"ec-3" => "Enhanced AC-3 Audio Sample Entry",
        b"alac" => "Apple Lossless Audio",
        b"dac3" => "AC-3 Specific Box",
        b"dec3" => "Enhanced AC-3 Specific Box",
        b"senc" => "Sample Encryption Box",
        b"pssh" => "Protection System Specific Header Box",
        b"tenc" => "Track Encryption Box",
        b"chrm" => "Chroma Box",
        b"ludt" => "Loudness Box",
        b"tlou" => "Track Loudness Info",
        b"alou" => "Album Loudness Info",
        b"swre" => "Encoder Software",
        b"ilst" => "Metadata Item List",
        b"data" => "Metadata Value",
        b"mean" => "Free-form Item Mean",
        b"name" => "Free-form Item Name",
        b"keys" => "Metadata Item Keys",
        b"----" => "Free-form Metadata Item",
        _ => "Unknown Box",
    }
}
