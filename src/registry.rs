use crate::boxes::BoxType;
use crate::config::AmbiguityPolicy;
use crate::context::{Context, Markers};
use crate::error::{Error, Result};
use crate::schema::Schema;
use std::collections::HashMap;
use std::sync::Arc;

/// Pure function of the ancestor context. It never sees payload bytes.
pub type Predicate = fn(&Context) -> bool;

pub fn always(_: &Context) -> bool {
    true
}

/// FullBox versions a definition understands.
#[derive(Debug, Clone, Copy)]
pub enum Versions {
    Any,
    Only(&'static [u8]),
}

impl Versions {
    pub fn admits(&self, version: Option<u8>) -> bool {
        match (self, version) {
            (Versions::Any, _) | (_, None) => true,
            (Versions::Only(set), Some(v)) => set.contains(&v),
        }
    }
}

/// One candidate shape for a box type.
#[derive(Clone)]
pub struct BoxDefinition {
    pub box_type: BoxType,
    pub predicate: Predicate,
    pub versions: Versions,
    pub schema: Arc<Schema>,
    /// Markers this box adds to the context of its children.
    pub child_markers: Markers,
}

impl BoxDefinition {
    pub fn new(box_type: BoxType, schema: Arc<Schema>) -> Self {
        BoxDefinition {
            box_type,
            predicate: always,
            versions: Versions::Any,
            schema,
            child_markers: Markers::NONE,
        }
    }

    pub fn fourcc(code: &[u8; 4], schema: Arc<Schema>) -> Self {
        Self::new(BoxType::fourcc(code), schema)
    }

    pub fn when(mut self, predicate: Predicate) -> Self {
        self.predicate = predicate;
        self
    }

    pub fn versions(mut self, versions: &'static [u8]) -> Self {
        self.versions = Versions::Only(versions);
        self
    }

    pub fn marks(mut self, markers: Markers) -> Self {
        self.child_markers = self.child_markers.union(markers);
        self
    }

    fn accepts(&self, ctx: &Context, likely_version: Option<u8>) -> bool {
        if !(self.predicate)(ctx) {
            return false;
        }
        !self.schema.is_full_box() || self.versions.admits(likely_version)
    }
}

impl std::fmt::Debug for BoxDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoxDefinition")
            .field("box_type", &self.box_type)
            .field("schema", &self.schema.name())
            .field("versions", &self.versions)
            .field("child_markers", &self.child_markers)
            .finish()
    }
}

/// Candidate schemas keyed by box type, in registration order.
///
/// The registry is filled once and only read afterwards; use
/// [`Registry::with_definition`] to build it fluently.
pub struct Registry {
    map: HashMap<BoxType, Vec<BoxDefinition>>,
    ambiguity: AmbiguityPolicy,
}

impl Registry {
    /// Create an empty registry that rejects ambiguous matches.
    pub fn new() -> Self {
        Self {
            map: HashMap::new(),
            ambiguity: AmbiguityPolicy::default(),
        }
    }

    pub fn with_ambiguity(mut self, policy: AmbiguityPolicy) -> Self {
        self.ambiguity = policy;
        self
    }

    pub fn ambiguity(&self) -> AmbiguityPolicy {
        self.ambiguity
    }

    /// Return a new registry with the given definition appended.
    pub fn with_definition(mut self, def: BoxDefinition) -> Self {
        self.register(def);
        self
    }

    pub fn register(&mut self, def: BoxDefinition) {
        self.map.entry(def.box_type).or_default().push(def);
    }

    pub fn candidates(&self, box_type: &BoxType) -> &[BoxDefinition] {
        self.map.get(box_type).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn contains(&self, box_type: &BoxType) -> bool {
        self.map.contains_key(box_type)
    }

    pub fn len(&self) -> usize {
        self.map.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Pick the schema for `box_type` under `ctx`.
    ///
    /// `likely_version` is the first payload byte, which is the version for
    /// FullBox shapes. `Ok(None)` means the box is opaque.
    pub fn resolve(
        &self,
        box_type: &BoxType,
        ctx: &Context,
        likely_version: Option<u8>,
    ) -> Result<Option<&BoxDefinition>> {
        let mut matches = self
            .candidates(box_type)
            .iter()
            .filter(|d| d.accepts(ctx, likely_version));
        let Some(first) = matches.next() else {
            log::debug!("no schema for {} under {:?}", box_type, ctx.markers());
            return Ok(None);
        };
        if let Some(second) = matches.next() {
            match self.ambiguity {
                AmbiguityPolicy::Reject => {
                    return Err(Error::AmbiguousSchema {
                        box_type: *box_type,
                        first: first.schema.name(),
                        second: second.schema.name(),
                    });
                }
                AmbiguityPolicy::FirstRegistered => log::warn!(
                    "{}: {} and {} both match, using {}",
                    box_type,
                    first.schema.name(),
                    second.schema.name(),
                    first.schema.name()
                ),
            }
        }
        Ok(Some(first))
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}
