//! JSON-Schema subset used for tool input/output declarations, and the
//! reflection-driven synthesis built on top of it.
//!
//! Rather than scattering runtime reflection across the crate, every type
//! that wants an auto-generated schema implements [`Reflect`] once; all the
//! cycle-detection and `$defs`/`$ref` bookkeeping lives here.

use std::any::TypeId;
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// JSON-Schema subset covering the handful of keywords this toolkit needs.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Schema {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub schema_type: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, Schema>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<Schema>>,

    #[serde(rename = "additionalProperties", skip_serializing_if = "Option::is_none")]
    pub additional_properties: Option<Value>,

    #[serde(rename = "enum", skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<Value>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,

    #[serde(rename = "$ref", skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,

    #[serde(rename = "$defs", skip_serializing_if = "BTreeMap::is_empty")]
    pub defs: BTreeMap<String, Schema>,
}

impl Schema {
    pub fn object() -> Self {
        Self {
            schema_type: Some("object".to_string()),
            ..Default::default()
        }
    }

    pub fn primitive(schema_type: &str) -> Self {
        Self {
            schema_type: Some(schema_type.to_string()),
            ..Default::default()
        }
    }

    pub fn array(items: Schema) -> Self {
        Self {
            schema_type: Some("array".to_string()),
            items: Some(Box::new(items)),
            ..Default::default()
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_enum(mut self, values: Vec<Value>) -> Self {
        self.enum_values = Some(values);
        self
    }

    fn reference_to(name: &str) -> Self {
        Self {
            reference: Some(format!("#/$defs/{name}")),
            ..Default::default()
        }
    }
}

/// A field contributed to an in-progress object schema by [`Reflect::describe`].
pub struct FieldSpec {
    pub name: String,
    pub schema: Schema,
    pub required: bool,
}

/// Accumulates fields for a struct-shaped schema, then resolves into a
/// [`Schema`]. One builder is created per struct being reflected.
#[derive(Default)]
pub struct SchemaBuilder {
    fields: Vec<FieldSpec>,
    description: Option<String>,
}

impl SchemaBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Register a field. `required` = (not optional) unless the field is
    /// itself optional (`Option<T>`), in which case `required` must be
    /// explicitly asserted to override.
    pub fn field(mut self, name: impl Into<String>, schema: Schema, required: bool) -> Self {
        self.fields.push(FieldSpec {
            name: name.into(),
            schema,
            required,
        });
        self
    }

    /// Register a field already resolved by [`describe_field`], carrying
    /// the tag-driven rename/required computation.
    pub fn field_spec(mut self, spec: FieldSpec) -> Self {
        self.fields.push(spec);
        self
    }

    pub fn build(self) -> Schema {
        let mut schema = Schema::object();
        schema.description = self.description;
        for f in self.fields {
            if f.required {
                schema.required.push(f.name.clone());
            }
            schema.properties.insert(f.name, f.schema);
        }
        schema.required.sort();
        schema
    }
}

/// The JSON-Schema primitive kind a Rust field type maps to. Drives enum
/// coercion, since `jsonschema:"enum=..."` values arrive as struct-tag
/// strings and must be parsed into the field's own type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    String,
    Integer,
    Float,
    Boolean,
    Other,
}

/// Implemented by every Rust type that can appear as a struct field in a
/// [`Reflect`] type. Mirrors the field-kind mapping of spec.md §4.2: string,
/// integer, float, bool, `Vec<T>`/`[T]` (array), `HashMap<String, T>`
/// (object + `additionalProperties`), `Option<T>` (the element type, no
/// "null" union), and nested structs via [`Reflect`].
pub trait FieldSchema {
    fn field_schema() -> Schema;

    fn kind() -> FieldKind {
        FieldKind::Other
    }

    /// `true` for `Option<T>`: the field is optional regardless of
    /// `omitempty`, and the wrapped type's schema is emitted with no "null"
    /// union.
    const IS_OPTIONAL: bool = false;
}

macro_rules! impl_field_schema_primitive {
    ($ty:ty, $schema_type:literal, $kind:expr) => {
        impl FieldSchema for $ty {
            fn field_schema() -> Schema {
                Schema::primitive($schema_type)
            }
            fn kind() -> FieldKind {
                $kind
            }
        }
    };
}

impl_field_schema_primitive!(String, "string", FieldKind::String);
impl_field_schema_primitive!(bool, "boolean", FieldKind::Boolean);
impl_field_schema_primitive!(i8, "integer", FieldKind::Integer);
impl_field_schema_primitive!(i16, "integer", FieldKind::Integer);
impl_field_schema_primitive!(i32, "integer", FieldKind::Integer);
impl_field_schema_primitive!(i64, "integer", FieldKind::Integer);
impl_field_schema_primitive!(u8, "integer", FieldKind::Integer);
impl_field_schema_primitive!(u16, "integer", FieldKind::Integer);
impl_field_schema_primitive!(u32, "integer", FieldKind::Integer);
impl_field_schema_primitive!(u64, "integer", FieldKind::Integer);
impl_field_schema_primitive!(usize, "integer", FieldKind::Integer);
impl_field_schema_primitive!(f32, "number", FieldKind::Float);
impl_field_schema_primitive!(f64, "number", FieldKind::Float);

impl<T: FieldSchema> FieldSchema for Option<T> {
    fn field_schema() -> Schema {
        T::field_schema()
    }
    fn kind() -> FieldKind {
        T::kind()
    }
    const IS_OPTIONAL: bool = true;
}

impl<T: FieldSchema> FieldSchema for Vec<T> {
    fn field_schema() -> Schema {
        Schema::array(T::field_schema())
    }
}

impl<V: FieldSchema> FieldSchema for HashMap<String, V> {
    fn field_schema() -> Schema {
        let mut schema = Schema::object();
        schema.additional_properties = Some(serde_json::to_value(V::field_schema()).unwrap_or(Value::Bool(true)));
        schema
    }
}

/// The Rust encoding of a Go struct tag pair: `json:"name,omitempty"` plus
/// `jsonschema:"description=...,enum=v1,enum=v2,required"`. One `FieldTag`
/// is built per field by a [`Reflect::describe`] implementation.
#[derive(Default)]
pub struct FieldTag {
    /// The field's name as it appears on the wire; overridden by `rename`.
    pub json_name: &'static str,
    /// `json:"<rename>,..."`; `None` means no rename was given.
    pub rename: Option<&'static str>,
    /// `json:"-"` or an unexported field: omit entirely.
    pub skip: bool,
    /// `json:"...,omitempty"`.
    pub omit_empty: bool,
    /// `jsonschema:"...,required"`: forces required regardless of
    /// `omitempty`/`Option`.
    pub required: bool,
    /// `jsonschema:"description=..."`.
    pub description: Option<&'static str>,
    /// `jsonschema:"...,enum=v1,enum=v2,..."`, each value still a raw tag
    /// string awaiting coercion into the field's own type.
    pub enum_raw: &'static [&'static str],
}

impl FieldTag {
    pub fn new(json_name: &'static str) -> Self {
        Self {
            json_name,
            ..Default::default()
        }
    }

    pub fn rename(mut self, name: &'static str) -> Self {
        self.rename = Some(name);
        self
    }

    pub fn skip(mut self) -> Self {
        self.skip = true;
        self
    }

    pub fn omit_empty(mut self) -> Self {
        self.omit_empty = true;
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn description(mut self, description: &'static str) -> Self {
        self.description = Some(description);
        self
    }

    pub fn enum_values(mut self, values: &'static [&'static str]) -> Self {
        self.enum_raw = values;
        self
    }
}

/// Parses `raw` tag strings into JSON values matching `kind`. An unsupported
/// kind (anything but string/integer/float/bool) logs a warning and leaves
/// the field unenumerated, per spec.md §4.2.
fn coerce_enum_values(kind: FieldKind, raw: &[&str], field_name: &str) -> Option<Vec<Value>> {
    match kind {
        FieldKind::String => Some(raw.iter().map(|s| Value::String(s.to_string())).collect()),
        FieldKind::Integer => raw
            .iter()
            .map(|s| s.parse::<i64>().ok().map(Value::from))
            .collect::<Option<Vec<_>>>()
            .or_else(|| {
                tracing::warn!(field = field_name, "could not coerce enum values to integer, leaving unenumerated");
                None
            }),
        FieldKind::Float => raw
            .iter()
            .map(|s| s.parse::<f64>().ok().and_then(serde_json::Number::from_f64).map(Value::Number))
            .collect::<Option<Vec<_>>>()
            .or_else(|| {
                tracing::warn!(field = field_name, "could not coerce enum values to float, leaving unenumerated");
                None
            }),
        FieldKind::Boolean => raw
            .iter()
            .map(|s| s.parse::<bool>().ok().map(Value::Bool))
            .collect::<Option<Vec<_>>>()
            .or_else(|| {
                tracing::warn!(field = field_name, "could not coerce enum values to boolean, leaving unenumerated");
                None
            }),
        FieldKind::Other => {
            tracing::warn!(field = field_name, "enum values are unsupported for this field kind, leaving unenumerated");
            None
        }
    }
}

/// Resolves one field's [`FieldTag`] plus its Rust type into a [`FieldSpec`]
/// ready for [`SchemaBuilder::field`], applying spec.md §4.2's rename/skip/
/// enum-coercion/required rules. Returns `None` for a skipped field.
pub fn describe_field<T: FieldSchema>(tag: FieldTag) -> Option<FieldSpec> {
    if tag.skip {
        return None;
    }

    let name = tag.rename.unwrap_or(tag.json_name).to_string();
    let mut schema = T::field_schema();
    if let Some(description) = tag.description {
        schema = schema.with_description(description);
    }
    if !tag.enum_raw.is_empty() {
        if let Some(values) = coerce_enum_values(T::kind(), tag.enum_raw, &name) {
            schema = schema.with_enum(values);
        }
    }

    // required = (not Option AND not omitempty) OR explicitly `required`.
    let required = tag.required || (!T::IS_OPTIONAL && !tag.omit_empty);

    Some(FieldSpec { name, schema, required })
}

/// Implemented by request types whose JSON Schema can be synthesized. Types
/// with cyclic references must register themselves under a stable,
/// lower-cased key via [`type_key`] so [`synthesize`] can break the cycle
/// with a `$ref`.
pub trait Reflect: 'static {
    /// The key this type is emitted under in `$defs` when referenced
    /// cyclically. Defaults to the lower-cased value passed to
    /// [`type_key`]; implementors normally just call that helper.
    fn type_key() -> &'static str;

    /// Build this type's schema, registering any nested cyclic types in
    /// `ctx` instead of inlining them. `ctx` uses interior mutability so
    /// nested calls to [`ReflectCtx::resolve`] don't need `&mut` threaded
    /// through every level of a recursive descent.
    fn describe(ctx: &ReflectCtx) -> Schema;
}

/// Lower-cases a Rust type name into the stable `$defs` key used when a
/// cyclic struct is emitted once and referenced by `$ref` thereafter.
pub fn type_key_of(simple_name: &str) -> String {
    simple_name.to_ascii_lowercase()
}

/// Tracks which types have been visited during one call to [`synthesize`].
pub struct ReflectCtx {
    seen: RefCell<HashMap<TypeId, String>>,
    defs: RefCell<BTreeMap<String, Schema>>,
}

impl ReflectCtx {
    fn new() -> Self {
        Self {
            seen: RefCell::new(HashMap::new()),
            defs: RefCell::new(BTreeMap::new()),
        }
    }

    /// Resolve `T`'s schema: on first visit, describes it fully and stashes
    /// the result under `$defs`; on a cyclic revisit, returns a bare `$ref`.
    pub fn resolve<T: Reflect>(&self) -> Schema {
        let type_id = TypeId::of::<T>();
        let key = T::type_key().to_string();

        if self.seen.borrow().contains_key(&type_id) {
            return Schema::reference_to(&key);
        }
        self.seen.borrow_mut().insert(type_id, key.clone());

        // Reserve the slot before recursing so a self-referential T sees
        // itself as "seen" and emits a $ref instead of recursing forever.
        self.defs.borrow_mut().entry(key.clone()).or_default();
        let schema = T::describe(self);
        self.defs.borrow_mut().insert(key, schema.clone());
        schema
    }
}

/// Synthesize the top-level schema for `T`, folding any cyclic nested types
/// into `$defs` at the root.
pub fn synthesize<T: Reflect>() -> Schema {
    let ctx = ReflectCtx::new();
    let mut top = ctx.resolve::<T>();
    let defs = ctx.defs.into_inner();
    // Only types that were actually revisited (and thus referenced via
    // $ref) need to appear in $defs; a type visited exactly once with no
    // self-reference is already inlined in `top`.
    let referenced: Vec<String> = collect_refs(&top);
    for key in referenced {
        if let Some(def) = defs.get(&key) {
            top.defs.insert(key, def.clone());
        }
    }
    top
}

fn collect_refs(schema: &Schema) -> Vec<String> {
    let mut out = Vec::new();
    collect_refs_into(schema, &mut out);
    out
}

fn collect_refs_into(schema: &Schema, out: &mut Vec<String>) {
    if let Some(r) = &schema.reference {
        if let Some(key) = r.strip_prefix("#/$defs/") {
            out.push(key.to_string());
        }
    }
    for prop in schema.properties.values() {
        collect_refs_into(prop, out);
    }
    if let Some(items) = &schema.items {
        collect_refs_into(items, out);
    }
    for def in schema.defs.values() {
        collect_refs_into(def, out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Leaf;
    impl Reflect for Leaf {
        fn type_key() -> &'static str {
            "leaf"
        }
        fn describe(_ctx: &ReflectCtx) -> Schema {
            SchemaBuilder::new()
                .field("value", Schema::primitive("string"), true)
                .build()
        }
    }

    struct Node;
    impl Reflect for Node {
        fn type_key() -> &'static str {
            "node"
        }
        fn describe(ctx: &ReflectCtx) -> Schema {
            SchemaBuilder::new()
                .field("name", Schema::primitive("string"), true)
                .field("child", ctx.resolve::<Node>(), false)
                .build()
        }
    }

    #[test]
    fn non_recursive_schema_has_no_defs() {
        let schema = synthesize::<Leaf>();
        assert!(schema.defs.is_empty());
        assert_eq!(schema.schema_type.as_deref(), Some("object"));
        assert_eq!(schema.required, vec!["value".to_string()]);
    }

    #[test]
    fn recursive_schema_breaks_cycle_with_ref() {
        let schema = synthesize::<Node>();
        let child = schema.properties.get("child").unwrap();
        assert_eq!(child.reference.as_deref(), Some("#/$defs/node"));
        assert!(schema.defs.contains_key("node"));
    }

    #[test]
    fn builder_sorts_required_fields() {
        let schema = SchemaBuilder::new()
            .field("b", Schema::primitive("string"), true)
            .field("a", Schema::primitive("string"), true)
            .build();
        assert_eq!(schema.required, vec!["a".to_string(), "b".to_string()]);
    }

    /// A request type exercising every struct-tag rule from spec.md §4.2 via
    /// `describe_field`/`FieldTag`, the way `json:"name,omitempty"` and
    /// `jsonschema:"..."` tags would on a reflected type.
    struct SearchRequest;
    impl Reflect for SearchRequest {
        fn type_key() -> &'static str {
            "searchrequest"
        }
        fn describe(_ctx: &ReflectCtx) -> Schema {
            SchemaBuilder::new()
                .field_spec(describe_field::<String>(FieldTag::new("query").description("search text")).unwrap())
                .field_spec(describe_field::<Option<i64>>(FieldTag::new("limit").omit_empty()).unwrap())
                .field_spec(describe_field::<Vec<String>>(FieldTag::new("topics").omit_empty()).unwrap())
                .field_spec(describe_field::<f64>(FieldTag::new("precision").rename("prec").enum_values(&["0.5", "1.0"])).unwrap())
                .field_spec(describe_field::<bool>(FieldTag::new("strict").omit_empty().required().enum_values(&["true", "false"])).unwrap())
                .build()
        }
    }

    #[test]
    fn plain_required_field_has_no_omitempty_or_pointer() {
        let schema = synthesize::<SearchRequest>();
        assert!(schema.required.contains(&"query".to_string()));
        assert_eq!(schema.properties["query"].description.as_deref(), Some("search text"));
    }

    #[test]
    fn omitempty_field_is_not_required() {
        let schema = synthesize::<SearchRequest>();
        assert!(!schema.required.contains(&"limit".to_string()));
        assert_eq!(schema.properties["limit"].schema_type.as_deref(), Some("integer"));
    }

    #[test]
    fn pointer_field_maps_to_element_type_with_no_null_union() {
        // `limit: Option<i64>` must describe as a bare "integer" schema, not
        // a {"type": ["integer", "null"]} union.
        let schema = synthesize::<SearchRequest>();
        assert_eq!(schema.properties["limit"].schema_type.as_deref(), Some("integer"));
    }

    #[test]
    fn slice_field_becomes_array_of_items() {
        let schema = synthesize::<SearchRequest>();
        let topics = &schema.properties["topics"];
        assert_eq!(topics.schema_type.as_deref(), Some("array"));
        assert_eq!(topics.items.as_ref().unwrap().schema_type.as_deref(), Some("string"));
    }

    #[test]
    fn rename_overrides_the_field_key() {
        let schema = synthesize::<SearchRequest>();
        assert!(schema.properties.contains_key("prec"));
        assert!(!schema.properties.contains_key("precision"));
    }

    #[test]
    fn enum_values_are_coerced_to_the_field_kind() {
        let schema = synthesize::<SearchRequest>();
        let precision = &schema.properties["prec"];
        assert_eq!(precision.enum_values, Some(vec![json!(0.5), json!(1.0)]));

        let strict = &schema.properties["strict"];
        assert_eq!(strict.enum_values, Some(vec![json!(true), json!(false)]));
    }

    #[test]
    fn explicit_required_tag_overrides_omitempty() {
        let schema = synthesize::<SearchRequest>();
        assert!(schema.required.contains(&"strict".to_string()));
    }

    #[test]
    fn skipped_field_is_excluded_entirely() {
        let spec = describe_field::<String>(FieldTag::new("secret").skip());
        assert!(spec.is_none());
    }

    #[test]
    fn unsupported_enum_kind_warns_and_leaves_field_unenumerated() {
        struct Opaque;
        impl FieldSchema for Opaque {
            fn field_schema() -> Schema {
                Schema::object()
            }
        }
        let spec = describe_field::<Opaque>(FieldTag::new("blob").enum_values(&["x"])).unwrap();
        assert!(spec.schema.enum_values.is_none());
    }

    #[test]
    fn map_field_becomes_object_with_additional_properties() {
        let schema = HashMap::<String, i64>::field_schema();
        assert_eq!(schema.schema_type.as_deref(), Some("object"));
        assert!(schema.additional_properties.is_some());
    }
}
