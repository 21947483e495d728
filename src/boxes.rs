use crate::error::{Error, Result};
use crate::io::PosReader;
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::fmt;
use std::io::{Read, Write};
use std::str::FromStr;

#[derive(Copy, Clone, Eq, PartialEq, Hash)]
pub struct FourCC(pub [u8; 4]);

impl FourCC {
    pub const UUID: FourCC = FourCC(*b"uuid");

    pub const fn new(b: &[u8; 4]) -> Self {
        FourCC(*b)
    }

    pub fn as_str_lossy(&self) -> String {
        self.0
            .iter()
            .map(|&c| if (32..=126).contains(&c) { c as char } else { '.' })
            .collect()
    }
}

impl FromStr for FourCC {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let b = s.as_bytes();
        if b.len() == 4 {
            Ok(FourCC([b[0], b[1], b[2], b[3]]))
        } else {
            Err(format!("a box type needs exactly 4 bytes, got {:?}", s))
        }
    }
}

impl fmt::Debug for FourCC {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str_lossy())
    }
}
impl fmt::Display for FourCC {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str_lossy())
    }
}

/// Registry key and nominal type of a box: a 4CC, or the 16-byte extended
/// type carried by a `uuid` box.
#[derive(Copy, Clone, Eq, PartialEq, Hash)]
pub enum BoxType {
    FourCC(FourCC),
    Uuid([u8; 16]),
}

impl BoxType {
    pub const fn fourcc(b: &[u8; 4]) -> Self {
        BoxType::FourCC(FourCC(*b))
    }

    /// The 4CC written in the header's type slot.
    pub fn wire_fourcc(&self) -> FourCC {
        match self {
            BoxType::FourCC(cc) => *cc,
            BoxType::Uuid(_) => FourCC::UUID,
        }
    }
}

impl From<FourCC> for BoxType {
    fn from(cc: FourCC) -> Self {
        BoxType::FourCC(cc)
    }
}

impl fmt::Debug for BoxType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}
impl fmt::Display for BoxType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BoxType::FourCC(cc) => write!(f, "{}", cc),
            BoxType::Uuid(u) => write!(f, "uuid:{}", crate::util::format_uuid(u)),
        }
    }
}

/// How the size was spelled in the header, kept so that re-encoding
/// reproduces the original bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SizeForm {
    /// 32-bit size.
    #[default]
    Compact,
    /// `size == 1` followed by a 64-bit size.
    Large,
    /// `size == 0`: the box runs to the end of the enclosing range.
    ToEnd,
}

#[derive(Debug, Clone)]
pub struct BoxHeader {
    pub size: u64, // total size including header; resolved for ToEnd
    pub box_type: BoxType,
    pub size_form: SizeForm,
    pub header_size: u64, // 8, 16, 24 or 32
    pub start: u64,       // offset of header start
}

impl BoxHeader {
    pub fn payload_len(&self) -> u64 {
        self.size - self.header_size
    }
}

pub fn header_len(box_type: &BoxType, large: bool) -> u64 {
    let mut n = 8;
    if large {
        n += 8;
    }
    if matches!(box_type, BoxType::Uuid(_)) {
        n += 16;
    }
    n
}

/// Read one box header. `remaining` is the number of bytes left in the
/// enclosing range; a box that claims more is malformed.
pub fn read_box_header<R: Read>(r: &mut PosReader<R>, remaining: u64) -> Result<BoxHeader> {
    let start = r.position();
    let size32 = r
        .read_u32::<BigEndian>()
        .map_err(|e| Error::from_io(e, start, None))?;
    let mut typ = [0u8; 4];
    r.read_exact(&mut typ)
        .map_err(|e| Error::from_io(e, start + 4, None))?;
    let fourcc = FourCC(typ);

    let (mut size, size_form) = match size32 {
        0 => (remaining, SizeForm::ToEnd),
        1 => {
            let large = r
                .read_u64::<BigEndian>()
                .map_err(|e| Error::from_io(e, r.position(), Some(fourcc.into())))?;
            (large, SizeForm::Large)
        }
        n => (n as u64, SizeForm::Compact),
    };

    let box_type = if fourcc == FourCC::UUID {
        let mut u = [0u8; 16];
        let at = r.position();
        r.read_exact(&mut u)
            .map_err(|e| Error::from_io(e, at, Some(fourcc.into())))?;
        BoxType::Uuid(u)
    } else {
        BoxType::FourCC(fourcc)
    };

    let header_size = r.position() - start;
    if size_form == SizeForm::ToEnd && size < header_size {
        size = header_size;
    }
    if size < header_size || size > remaining {
        return Err(Error::MalformedBox {
            box_type: Some(box_type),
            offset: start,
            declared: size,
            consumed: remaining.min(size),
        });
    }

    log::trace!(
        "box {} at {} size {} header {}",
        box_type,
        start,
        size,
        header_size
    );
    Ok(BoxHeader {
        size,
        box_type,
        size_form,
        header_size,
        start,
    })
}

/// Write a header for a payload of `payload_len` bytes. A compact form that
/// cannot hold the size is promoted to the large form.
pub fn write_box_header<W: Write>(
    w: &mut W,
    box_type: &BoxType,
    size_form: SizeForm,
    payload_len: u64,
) -> Result<()> {
    let compact_total = header_len(box_type, false) + payload_len;
    let large = match size_form {
        SizeForm::Large => true,
        SizeForm::Compact => compact_total > u32::MAX as u64,
        SizeForm::ToEnd => false,
    };
    let total = header_len(box_type, large) + payload_len;

    match (size_form, large) {
        (SizeForm::ToEnd, _) => w.write_u32::<BigEndian>(0)?,
        (_, true) => w.write_u32::<BigEndian>(1)?,
        (_, false) => w.write_u32::<BigEndian>(total as u32)?,
    }
    w.write_all(&box_type.wire_fourcc().0)?;
    if large {
        w.write_u64::<BigEndian>(total)?;
    }
    if let BoxType::Uuid(u) = box_type {
        w.write_all(u)?;
    }
    Ok(())
}
