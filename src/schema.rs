//! Declarative description of a box payload.
//!
//! A [`Schema`] is an ordinal-sorted list of [`FieldDescriptor`]s. Schemas are
//! built once through [`SchemaBuilder`], whose field identifiers come from a
//! per-schema enum implementing [`FieldName`], so hooks can only name fields
//! of their own schema.
use crate::context::Context;
use crate::error::{Error, Result};
use crate::value::{Record, Value};
use std::collections::HashSet;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

/// Closed set of field identifiers of one schema.
pub trait FieldName: Copy + fmt::Debug + Send + Sync + 'static {
    fn name(self) -> &'static str;
}

/// Declare a field-identifier enum together with its wire names.
#[macro_export]
macro_rules! field_names {
    ($(#[$meta:meta])* $vis:vis enum $ty:ident { $($variant:ident => $name:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq)]
        $vis enum $ty { $($variant),+ }

        impl $crate::schema::FieldName for $ty {
            fn name(self) -> &'static str {
                match self { $($ty::$variant => $name),+ }
            }
        }
    };
}

pub type LenHook = Arc<dyn Fn(&Fields<'_>, &Context) -> Result<u64> + Send + Sync>;
pub type PresenceHook = Arc<dyn Fn(&Fields<'_>, &Context) -> Result<bool> + Send + Sync>;
pub type StringifyHook = Arc<dyn Fn(&Fields<'_>, &Context) -> Option<String> + Send + Sync>;

/// Length of a byte block or array, in bytes or elements.
#[derive(Clone)]
pub enum Len {
    Fixed(u64),
    Dynamic(LenHook),
    /// Everything left in the payload.
    Rest,
}

impl fmt::Debug for Len {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Len::Fixed(n) => write!(f, "Fixed({n})"),
            Len::Dynamic(_) => f.write_str("Dynamic"),
            Len::Rest => f.write_str("Rest"),
        }
    }
}

/// Length computed from already-decoded siblings of the same schema.
pub fn dynamic<F, H>(hook: H) -> Len
where
    F: FieldName,
    H: Fn(&Siblings<'_, F>, &Context) -> Result<u64> + Send + Sync + 'static,
{
    Len::Dynamic(erase(move |fields: &Fields<'_>, ctx: &Context| {
        hook(&Siblings::new(*fields), ctx)
    }))
}

/// Length held by an earlier sibling, typically an entry count.
pub fn count<F: FieldName>(f: F) -> Len {
    dynamic(move |s: &Siblings<'_, F>, _: &Context| s.uint(f))
}

fn erase<T, C>(c: C) -> Arc<dyn Fn(&Fields<'_>, &Context) -> T + Send + Sync>
where
    C: Fn(&Fields<'_>, &Context) -> T + Send + Sync + 'static,
{
    Arc::new(c)
}

#[derive(Clone, Debug)]
pub enum Repr {
    Uint { bits: u32 },
    /// Two's-complement.
    Int { bits: u32 },
    Bytes { len: Len },
    Uuid,
    /// NUL-terminated text.
    Str,
    Record(Arc<Schema>),
    Array { element: Arc<Schema>, len: Len },
}

impl Repr {
    /// Value held by a field that is absent from the wire.
    pub fn zero(&self) -> Value {
        match self {
            Repr::Uint { .. } => Value::Uint(0),
            Repr::Int { .. } => Value::Int(0),
            Repr::Bytes { .. } => Value::Bytes(Vec::new()),
            Repr::Uuid => Value::Uuid([0; 16]),
            Repr::Str => Value::Str(String::new()),
            Repr::Record(s) => Value::Record(s.zero_record()),
            Repr::Array { .. } => Value::Array(Vec::new()),
        }
    }
}

/// Default textual form of a field.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Render {
    #[default]
    Dec,
    Hex,
    /// Byte block holding text.
    Text,
}

/// Versions for which a field is on the wire.
#[derive(Clone, Copy, Debug)]
pub enum VersionGate {
    Only(&'static [u8]),
    Except(&'static [u8]),
}

impl VersionGate {
    pub fn admits(&self, version: u8) -> bool {
        match self {
            VersionGate::Only(v) => v.contains(&version),
            VersionGate::Except(v) => !v.contains(&version),
        }
    }
}

#[derive(Clone)]
pub struct FieldDescriptor {
    pub ordinal: u32,
    pub name: &'static str,
    pub repr: Repr,
    pub gate: Option<VersionGate>,
    pub constant: Option<u64>,
    pub presence: Option<PresenceHook>,
    pub render: Render,
    pub stringify: Option<StringifyHook>,
}

impl fmt::Debug for FieldDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldDescriptor")
            .field("ordinal", &self.ordinal)
            .field("name", &self.name)
            .field("repr", &self.repr)
            .field("gate", &self.gate)
            .field("constant", &self.constant)
            .field("conditional", &self.presence.is_some())
            .finish()
    }
}

impl FieldDescriptor {
    /// Whether the field is on the wire, given the siblings before it.
    pub fn is_present(&self, before: &Fields<'_>, ctx: &Context) -> Result<bool> {
        if let Some(gate) = &self.gate {
            if !gate.admits(ctx.version_or_zero()) {
                return Ok(false);
            }
        }
        match &self.presence {
            Some(hook) => hook(before, ctx),
            None => Ok(true),
        }
    }
}

/// Field layout of one box shape (or of a record nested in one).
#[derive(Debug)]
pub struct Schema {
    name: &'static str,
    full_box: bool,
    children: bool,
    fields: Vec<FieldDescriptor>,
}

impl Schema {
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Payload starts with a version byte and 24 flag bits.
    pub fn is_full_box(&self) -> bool {
        self.full_box
    }

    /// Payload ends with child boxes after the field prefix.
    pub fn has_children(&self) -> bool {
        self.children
    }

    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn zero_record(&self) -> Record {
        Record::from_fields(self.fields.iter().map(|f| (f.name, f.repr.zero())).collect())
    }

    /// Plain container: no fields, only children.
    pub fn container(name: &'static str) -> Self {
        Schema {
            name,
            full_box: false,
            children: true,
            fields: Vec::new(),
        }
    }

    /// Container whose payload starts with a version/flags header.
    pub fn full_container(name: &'static str) -> Self {
        Schema {
            full_box: true,
            ..Schema::container(name)
        }
    }
}

/// Read-only view of the fields materialized so far.
#[derive(Clone, Copy)]
pub struct Fields<'a> {
    schema: &'a str,
    values: &'a [(&'static str, Value)],
}

impl<'a> Fields<'a> {
    pub(crate) fn new(schema: &'a str, values: &'a [(&'static str, Value)]) -> Self {
        Fields { schema, values }
    }

    pub fn get(&self, name: &str) -> Result<&'a Value> {
        self.values
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| v)
            .ok_or_else(|| {
                Error::schema(
                    self.schema,
                    format!("hook references field {name}, which is not decoded before it"),
                )
            })
    }

    pub fn uint(&self, name: &str) -> Result<u64> {
        let v = self.get(name)?;
        match v {
            Value::Uint(u) => Ok(*u),
            Value::Int(i) => u64::try_from(*i).map_err(|_| {
                Error::field(
                    format!("{}.{}", self.schema, name),
                    format!("negative value {i} used as a length"),
                )
            }),
            other => Err(Error::schema(
                self.schema,
                format!("hook reads {name} as an integer but it is a {}", other.kind()),
            )),
        }
    }

    pub fn int(&self, name: &str) -> Result<i64> {
        let v = self.get(name)?;
        v.as_int().ok_or_else(|| {
            Error::schema(
                self.schema,
                format!("hook reads {name} as an integer but it is a {}", v.kind()),
            )
        })
    }

    pub fn bytes(&self, name: &str) -> Result<&'a [u8]> {
        let v = self.get(name)?;
        v.as_bytes().ok_or_else(|| {
            Error::schema(
                self.schema,
                format!("hook reads {name} as bytes but it is a {}", v.kind()),
            )
        })
    }
}

/// [`Fields`] addressed through the schema's own identifier enum.
pub struct Siblings<'a, F> {
    fields: Fields<'a>,
    _names: PhantomData<F>,
}

impl<'a, F: FieldName> Siblings<'a, F> {
    pub fn new(fields: Fields<'a>) -> Self {
        Siblings {
            fields,
            _names: PhantomData,
        }
    }

    pub fn get(&self, f: F) -> Result<&'a Value> {
        self.fields.get(f.name())
    }

    pub fn uint(&self, f: F) -> Result<u64> {
        self.fields.uint(f.name())
    }

    pub fn int(&self, f: F) -> Result<i64> {
        self.fields.int(f.name())
    }

    pub fn bytes(&self, f: F) -> Result<&'a [u8]> {
        self.fields.bytes(f.name())
    }
}

/// Builds a [`Schema`] from fields declared in any order.
///
/// Modifiers such as [`SchemaBuilder::versions`] apply to the most recently
/// added field.
pub struct SchemaBuilder<F> {
    name: &'static str,
    full_box: bool,
    children: bool,
    fields: Vec<FieldDescriptor>,
    defect: Option<String>,
    _names: PhantomData<F>,
}

impl<F: FieldName> SchemaBuilder<F> {
    pub fn new(name: &'static str) -> Self {
        SchemaBuilder {
            name,
            full_box: false,
            children: false,
            fields: Vec::new(),
            defect: None,
            _names: PhantomData,
        }
    }

    pub fn full_box(mut self) -> Self {
        self.full_box = true;
        self
    }

    pub fn with_children(mut self) -> Self {
        self.children = true;
        self
    }

    pub fn field(mut self, ordinal: u32, f: F, repr: Repr) -> Self {
        self.fields.push(FieldDescriptor {
            ordinal,
            name: f.name(),
            repr,
            gate: None,
            constant: None,
            presence: None,
            render: Render::Dec,
            stringify: None,
        });
        self
    }

    pub fn uint(self, ordinal: u32, f: F, bits: u32) -> Self {
        self.field(ordinal, f, Repr::Uint { bits })
    }

    /// Unsigned field rendered in hex.
    pub fn hex(self, ordinal: u32, f: F, bits: u32) -> Self {
        self.uint(ordinal, f, bits).render(Render::Hex)
    }

    pub fn int(self, ordinal: u32, f: F, bits: u32) -> Self {
        self.field(ordinal, f, Repr::Int { bits })
    }

    /// Reserved bits that must hold `value`.
    pub fn constant(mut self, ordinal: u32, f: F, bits: u32, value: u64) -> Self {
        self = self.uint(ordinal, f, bits);
        if let Some(last) = self.fields.last_mut() {
            last.constant = Some(value);
        }
        self
    }

    pub fn bytes(self, ordinal: u32, f: F, len: Len) -> Self {
        self.field(ordinal, f, Repr::Bytes { len })
    }

    /// Byte block holding text.
    pub fn text(self, ordinal: u32, f: F, len: Len) -> Self {
        self.bytes(ordinal, f, len).render(Render::Text)
    }

    pub fn uuid(self, ordinal: u32, f: F) -> Self {
        self.field(ordinal, f, Repr::Uuid)
    }

    pub fn string(self, ordinal: u32, f: F) -> Self {
        self.field(ordinal, f, Repr::Str)
    }

    pub fn record(self, ordinal: u32, f: F, schema: Arc<Schema>) -> Self {
        self.field(ordinal, f, Repr::Record(schema))
    }

    pub fn array(self, ordinal: u32, f: F, element: Arc<Schema>, len: Len) -> Self {
        self.field(ordinal, f, Repr::Array { element, len })
    }

    fn last(&mut self, what: &str) -> Option<&mut FieldDescriptor> {
        if self.fields.is_empty() && self.defect.is_none() {
            self.defect = Some(format!("{what} applied before any field was declared"));
        }
        self.fields.last_mut()
    }

    pub fn versions(mut self, gate: VersionGate) -> Self {
        if let Some(last) = self.last("version gate") {
            last.gate = Some(gate);
        }
        self
    }

    pub fn render(mut self, render: Render) -> Self {
        if let Some(last) = self.last("render") {
            last.render = render;
        }
        self
    }

    /// Make the last field conditional on siblings declared before it.
    pub fn when<H>(mut self, hook: H) -> Self
    where
        H: Fn(&Siblings<'_, F>, &Context) -> Result<bool> + Send + Sync + 'static,
    {
        let hook: PresenceHook = erase(move |fields: &Fields<'_>, ctx: &Context| {
            hook(&Siblings::new(*fields), ctx)
        });
        if let Some(last) = self.last("presence condition") {
            last.presence = Some(hook);
        }
        self
    }

    /// Custom text for the last field. Returning `None` keeps the default.
    pub fn stringify_with<H>(mut self, hook: H) -> Self
    where
        H: Fn(&Siblings<'_, F>, &Context) -> Option<String> + Send + Sync + 'static,
    {
        let hook: StringifyHook = erase(move |fields: &Fields<'_>, ctx: &Context| {
            hook(&Siblings::new(*fields), ctx)
        });
        if let Some(last) = self.last("stringify override") {
            last.stringify = Some(hook);
        }
        self
    }

    pub fn build(mut self) -> Result<Schema> {
        if let Some(defect) = self.defect {
            return Err(Error::schema(self.name, defect));
        }
        let mut ordinals = HashSet::new();
        let mut names = HashSet::new();
        for f in &self.fields {
            if !ordinals.insert(f.ordinal) {
                return Err(Error::schema(
                    self.name,
                    format!("ordinal {} is used twice", f.ordinal),
                ));
            }
            if !names.insert(f.name) {
                return Err(Error::schema(
                    self.name,
                    format!("field {} is declared twice", f.name),
                ));
            }
            if let Repr::Uint { bits } | Repr::Int { bits } = f.repr {
                if bits == 0 || bits > 64 {
                    return Err(Error::schema(
                        self.name,
                        format!("field {} has unsupported width {bits}", f.name),
                    ));
                }
            }
            if let (Some(c), Repr::Uint { bits }) = (f.constant, &f.repr) {
                if *bits < 64 && c >> bits != 0 {
                    return Err(Error::schema(
                        self.name,
                        format!("constant of {} does not fit in {bits} bits", f.name),
                    ));
                }
            }
        }
        self.fields.sort_by_key(|f| f.ordinal);
        Ok(Schema {
            name: self.name,
            full_box: self.full_box,
            children: self.children,
            fields: self.fields,
        })
    }

    pub fn build_arc(self) -> Result<Arc<Schema>> {
        self.build().map(Arc::new)
    }
}
