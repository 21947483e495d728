use crate::boxes::BoxType;

/// Errors raised while walking, decoding or encoding boxes.
///
/// [`Error::SchemaViolation`] and [`Error::AmbiguousSchema`] point at a defect
/// in the compiled-in box catalogue rather than at the input; see
/// [`Error::is_defect`].
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("malformed box at offset {offset} ({}): declared {declared} bytes, consumed {consumed}", describe(.box_type))]
    MalformedBox {
        box_type: Option<BoxType>,
        offset: u64,
        declared: u64,
        consumed: u64,
    },
    #[error("truncated input at offset {offset} ({})", describe(.box_type))]
    Truncated {
        box_type: Option<BoxType>,
        offset: u64,
    },
    #[error("schema violation in {schema}: {detail}")]
    SchemaViolation { schema: String, detail: String },
    #[error("invalid value for field {field}{}: {detail}", locate(.offset, .box_type))]
    InvalidFieldValue {
        box_type: Option<BoxType>,
        /// Byte offset of the field on decode; unset for encode errors.
        offset: Option<u64>,
        field: String,
        detail: String,
    },
    #[error("ambiguous schema for box {box_type}: both {first} and {second} match")]
    AmbiguousSchema {
        box_type: BoxType,
        first: &'static str,
        second: &'static str,
    },
    #[error("traversal cancelled at offset {offset}")]
    Cancelled { offset: u64 },
    #[error("box nesting deeper than {depth} levels at offset {offset}")]
    NestingTooDeep { offset: u64, depth: usize },
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

fn describe(box_type: &Option<BoxType>) -> String {
    match box_type {
        Some(t) => format!("in box {t}"),
        None => "outside any box".to_string(),
    }
}

fn locate(offset: &Option<u64>, box_type: &Option<BoxType>) -> String {
    match (offset, box_type) {
        (Some(o), Some(t)) => format!(" at offset {o} in box {t}"),
        (Some(o), None) => format!(" at offset {o}"),
        (None, Some(t)) => format!(" in box {t}"),
        (None, None) => String::new(),
    }
}

impl Error {
    /// True when the error is a bug in a compiled-in schema or in the
    /// registry configuration, never a property of the input bytes.
    pub fn is_defect(&self) -> bool {
        matches!(
            self,
            Error::SchemaViolation { .. } | Error::AmbiguousSchema { .. }
        )
    }

    pub(crate) fn schema(schema: &str, detail: impl Into<String>) -> Self {
        Error::SchemaViolation {
            schema: schema.to_string(),
            detail: detail.into(),
        }
    }

    pub(crate) fn field(field: impl Into<String>, detail: impl Into<String>) -> Self {
        Error::InvalidFieldValue {
            box_type: None,
            offset: None,
            field: field.into(),
            detail: detail.into(),
        }
    }

    /// Record where a field error was raised, unless a nested field already did.
    pub(crate) fn at_offset(self, at: u64) -> Self {
        match self {
            Error::InvalidFieldValue {
                box_type,
                offset: None,
                field,
                detail,
            } => Error::InvalidFieldValue {
                box_type,
                offset: Some(at),
                field,
                detail,
            },
            other => other,
        }
    }

    /// Attach a box type to an error raised below the walker.
    pub(crate) fn within(self, box_type: BoxType) -> Self {
        match self {
            Error::Truncated {
                box_type: None,
                offset,
            } => Error::Truncated {
                box_type: Some(box_type),
                offset,
            },
            Error::MalformedBox {
                box_type: None,
                offset,
                declared,
                consumed,
            } => Error::MalformedBox {
                box_type: Some(box_type),
                offset,
                declared,
                consumed,
            },
            Error::InvalidFieldValue {
                box_type: None,
                offset,
                field,
                detail,
            } => Error::InvalidFieldValue {
                box_type: Some(box_type),
                offset,
                field,
                detail,
            },
            other => other,
        }
    }

    /// Map an unexpected EOF to [`Error::Truncated`]; everything else stays I/O.
    pub(crate) fn from_io(e: std::io::Error, offset: u64, box_type: Option<BoxType>) -> Self {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            Error::Truncated { box_type, offset }
        } else {
            Error::Io(e)
        }
    }
}
