/// Ancestor markers a box contributes to everything beneath it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Marker {
    /// Inside a user-data (`udta`) box.
    Udta,
    /// Inside a sample description (`stsd`).
    Stsd,
    /// Inside an audio sample entry (`mp4a`, `ac-3`, ...).
    AudioSampleEntry,
    /// Inside an item list (`ilst`).
    Ilst,
    /// Inside one metadata item of an item list.
    IlstMeta,
    /// Inside a free-form (`----`) metadata item.
    IlstFreeMeta,
}

impl Marker {
    const fn bit(self) -> u16 {
        1 << (self as u16)
    }
}

/// Set of [`Marker`]s.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Markers(u16);

impl Markers {
    pub const NONE: Markers = Markers(0);

    pub const fn of(m: Marker) -> Self {
        Markers(m.bit())
    }

    pub const fn with(self, m: Marker) -> Self {
        Markers(self.0 | m.bit())
    }

    pub const fn union(self, other: Markers) -> Self {
        Markers(self.0 | other.0)
    }

    pub const fn contains(self, m: Marker) -> bool {
        self.0 & m.bit() != 0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

/// Ambient decode state for one level of the box tree.
///
/// A child's context carries every marker of its parent plus whatever the
/// parent's definition adds; version and flags always come from the child's
/// own header.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Context {
    pub version: Option<u8>,
    pub flags: u32,
    markers: Markers,
    per_sample_iv_size: Option<u8>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is(&self, m: Marker) -> bool {
        self.markers.contains(m)
    }

    pub fn markers(&self) -> Markers {
        self.markers
    }

    pub fn with_marker(mut self, m: Marker) -> Self {
        self.markers = self.markers.with(m);
        self
    }

    /// Per-sample IV size that `senc` entries use. It lives in a `tenc` of a
    /// different branch, so callers that know it pass it in at the root.
    pub fn with_per_sample_iv_size(mut self, size: u8) -> Self {
        self.per_sample_iv_size = Some(size);
        self
    }

    pub fn per_sample_iv_size(&self) -> u8 {
        self.per_sample_iv_size.unwrap_or(0)
    }

    /// Context for a box's own payload.
    pub fn with_header(mut self, version: Option<u8>, flags: u32) -> Self {
        self.version = version;
        self.flags = flags;
        self
    }

    /// Context handed to the children of a box that adds `added`.
    pub fn for_children(&self, added: Markers) -> Self {
        Context {
            version: None,
            flags: 0,
            markers: self.markers.union(added),
            per_sample_iv_size: self.per_sample_iv_size,
        }
    }

    /// Version used by gates; boxes without a version header count as 0.
    pub fn version_or_zero(&self) -> u8 {
        self.version.unwrap_or(0)
    }
}
