//! Schema-driven decoding and encoding of ISO-BMFF / QuickTime boxes.
//!
//! A [`Registry`] maps box types to field [`schema::Schema`]s; the
//! [`Walker`] reads headers, resolves each box against its ancestor
//! [`Context`] and runs the generic bit codec over leaf payloads.
pub mod bits;
pub mod boxes;
mod boxes_cenc;
mod boxes_etsi;
mod boxes_iso;
mod boxes_metadata;
mod boxes_qt;
pub mod codec;
pub mod config;
pub mod context;
pub mod error;
pub mod io;
pub mod json_api;
pub mod known_boxes;
pub mod parser;
pub mod registry;
pub mod schema;
pub mod stringify;
pub mod util;
pub mod value;

pub use boxes::{BoxHeader, BoxType, FourCC, SizeForm, read_box_header, write_box_header};
pub use boxes_metadata::is_ilst_item;
pub use codec::{decode_record, encode_record};
pub use config::{AmbiguityPolicy, ConstPolicy, DecodeOptions};
pub use context::{Context, Marker, Markers};
pub use error::{Error, Result};
pub use io::PosReader;
pub use json_api::{JsonBox, analyze_file};
pub use known_boxes::{build_registry, default_registry, full_name};
pub use parser::{Body, BoxSpan, CancelToken, DecodedBox, Walker};
pub use registry::{BoxDefinition, Registry, Versions};
pub use stringify::{render_tree, stringify_box, stringify_record};
pub use value::{Record, Value};
