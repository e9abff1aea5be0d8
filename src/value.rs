//! Runtime values: a compiler-owned heap of tagged values and the handles into it.
//!
//! Every value produced by a [`Compiler`](crate::Compiler) lives in its [`ValueHeap`].
//! Clients hold [`Value`] handles, which are plain indices: they are `Copy`, cheap to pass
//! around, and become meaningless once the owning compiler is dropped. Failure to construct
//! a value is reported as `None`; construction never panics.
//!
//! Structs are the only *mappable* values: they carry a [`MapInfo`] sidecar describing the IO
//! space and bit offset they were read from. Every other variant ignores mapping setters and
//! reports absent mapping data.

use crate::ios::IosId;
use std::fmt;

/// Largest declared width of an integral value, in bits.
pub const MAX_INT_WIDTH: u32 = 64;

/// Handle to a value stored in a [`ValueHeap`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Value(usize);

impl Value {
    /// Position of the value in its heap.
    pub fn index(self) -> usize {
        self.0
    }
}

/// Discriminant of a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Int,
    Uint,
    String,
    Offset,
    Struct,
    Type,
}

/// Reflected type, as carried by type values.
///
/// Equality is structural: struct type names are ignored and only field names and field
/// types, in order, are compared.
#[derive(Debug, Clone)]
pub enum Type {
    Integral { size: u32, signed: bool },
    String,
    /// Offset whose magnitude has type `base`, counted in units of `unit` bits.
    Offset { base: Box<Type>, unit: u64 },
    Struct { name: Option<String>, fields: Vec<(String, Type)> },
}

impl PartialEq for Type {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (
                Type::Integral { size: a, signed: sa },
                Type::Integral { size: b, signed: sb },
            ) => a == b && sa == sb,
            (Type::String, Type::String) => true,
            (Type::Offset { base: ba, unit: ua }, Type::Offset { base: bb, unit: ub }) => {
                ua == ub && ba == bb
            }
            (Type::Struct { fields: fa, .. }, Type::Struct { fields: fb, .. }) => {
                fa.len() == fb.len()
                    && fa
                        .iter()
                        .zip(fb)
                        .all(|((na, ta), (nb, tb))| na == nb && ta == tb)
            }
            _ => false,
        }
    }
}

impl Type {
    /// Size in bits of a value of this type, when it does not depend on the value.
    pub fn size_bits(&self) -> Option<u64> {
        match self {
            Type::Integral { size, .. } => Some(u64::from(*size)),
            Type::String => None,
            Type::Offset { base, .. } => base.size_bits(),
            Type::Struct { fields, .. } => fields.iter().map(|(_, t)| t.size_bits()).sum(),
        }
    }

    pub fn is_integral(&self) -> bool {
        matches!(self, Type::Integral { .. })
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Integral { size, signed: true } => write!(f, "int<{}>", size),
            Type::Integral { size, signed: false } => write!(f, "uint<{}>", size),
            Type::String => write!(f, "string"),
            Type::Offset { base, unit } => write!(f, "offset<{},{}>", base, unit_name(*unit)),
            Type::Struct { name: Some(name), .. } => write!(f, "{}", name),
            Type::Struct { name: None, fields } => {
                write!(f, "struct {{")?;
                for (name, ty) in fields {
                    write!(f, "{} {};", ty, name)?;
                }
                write!(f, "}}")
            }
        }
    }
}

/// Predefined units, as (name, bits per unit).
pub const UNITS: &[(&str, u64)] = &[
    ("b", 1),
    ("N", 4),
    ("B", 8),
    ("Kb", 1_000),
    ("KB", 8_000),
    ("Mb", 1_000_000),
    ("MB", 8_000_000),
    ("Gb", 1_000_000_000),
    ("GB", 8_000_000_000),
    ("Kib", 1 << 10),
    ("KiB", 8 << 10),
    ("Mib", 1 << 20),
    ("MiB", 8 << 20),
    ("Gib", 1 << 30),
    ("GiB", 8 << 30),
];

/// Bits per unit for a predefined unit name.
pub fn unit_bits(name: &str) -> Option<u64> {
    UNITS.iter().find(|(n, _)| *n == name).map(|(_, bits)| *bits)
}

/// Display name of a unit: the predefined name when there is one, else the bit count.
pub fn unit_name(bits: u64) -> String {
    match UNITS.iter().find(|(_, b)| *b == bits) {
        Some((name, _)) => (*name).to_string(),
        None => bits.to_string(),
    }
}

/// Mapping sidecar of a mappable value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MapInfo {
    pub mapped: bool,
    pub strict: bool,
    pub ios: Option<IosId>,
    /// Absolute offset in bits.
    pub offset: Option<u64>,
}

#[derive(Debug, Clone)]
struct StructData {
    name: Option<String>,
    fields: Vec<(String, Value)>,
    map: MapInfo,
}

#[derive(Debug, Clone)]
enum ValueData {
    Int { value: i64, width: u32 },
    Uint { value: u64, width: u32 },
    String(Vec<u8>),
    Offset { magnitude: Value, unit: Value },
    Struct(StructData),
    Type(Type),
}

/// Integral value widened for arithmetic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Integral {
    pub value: i128,
    pub width: u32,
    pub signed: bool,
}

/// Keep the low `width` bits of `v`.
pub(crate) fn mask_bits(v: u64, width: u32) -> u64 {
    if width >= 64 {
        v
    } else {
        v & ((1u64 << width) - 1)
    }
}

/// Interpret the low `width` bits of `v` as a two's complement number.
pub(crate) fn sign_extend(v: u64, width: u32) -> i64 {
    if width >= 64 {
        v as i64
    } else {
        let shift = 64 - width;
        ((v << shift) as i64) >> shift
    }
}

fn valid_width(width: u32) -> bool {
    (1..=MAX_INT_WIDTH).contains(&width)
}

/// Arena of values owned by one compiler.
#[derive(Debug, Default)]
pub struct ValueHeap {
    slots: Vec<ValueData>,
}

impl ValueHeap {
    pub fn new() -> Self {
        ValueHeap { slots: Vec::new() }
    }

    /// Number of values allocated so far.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    fn alloc(&mut self, data: ValueData) -> Value {
        self.slots.push(data);
        Value(self.slots.len() - 1)
    }

    fn get(&self, v: Value) -> Option<&ValueData> {
        self.slots.get(v.0)
    }

    fn get_mut(&mut self, v: Value) -> Option<&mut ValueData> {
        self.slots.get_mut(v.0)
    }

    // ==================== Construction ====================

    /// Signed integer of `width` bits. Values wider than `width` are truncated and sign-extended.
    pub fn make_int(&mut self, value: i64, width: u32) -> Option<Value> {
        if !valid_width(width) {
            return None;
        }
        Some(self.int(value, width))
    }

    /// Unsigned integer of `width` bits. The value is masked to its low `width` bits.
    pub fn make_uint(&mut self, value: u64, width: u32) -> Option<Value> {
        if !valid_width(width) {
            return None;
        }
        Some(self.uint(value, width))
    }

    /// String holding a copy of `bytes`.
    pub fn make_string(&mut self, bytes: impl AsRef<[u8]>) -> Value {
        self.alloc(ValueData::String(bytes.as_ref().to_vec()))
    }

    /// Offset of `magnitude` units of `unit` bits. The unit must be an unsigned integer and the
    /// magnitude an integer of either signedness.
    pub fn make_offset(&mut self, magnitude: Value, unit: Value) -> Option<Value> {
        match self.get(unit)? {
            ValueData::Uint { .. } => {}
            _ => return None,
        }
        match self.get(magnitude)? {
            ValueData::Int { .. } | ValueData::Uint { .. } => {}
            _ => return None,
        }
        Some(self.alloc(ValueData::Offset { magnitude, unit }))
    }

    /// Type value describing an integral type of `size` bits.
    pub fn make_integral_type(&mut self, size: u32, signed: bool) -> Option<Value> {
        if !valid_width(size) {
            return None;
        }
        Some(self.make_type(Type::Integral { size, signed }))
    }

    pub fn make_type(&mut self, ty: Type) -> Value {
        self.alloc(ValueData::Type(ty))
    }

    /// Struct with the given fields, in order. Fails on duplicate field names or dangling
    /// field values.
    pub fn make_struct(&mut self, name: Option<&str>, fields: Vec<(String, Value)>) -> Option<Value> {
        for (i, (field_name, value)) in fields.iter().enumerate() {
            self.get(*value)?;
            if fields[..i].iter().any(|(n, _)| n == field_name) {
                return None;
            }
        }
        Some(self.struct_value(name.map(str::to_string), fields, MapInfo::default()))
    }

    pub(crate) fn int(&mut self, value: i64, width: u32) -> Value {
        let width = width.clamp(1, MAX_INT_WIDTH);
        let value = sign_extend(value as u64, width);
        self.alloc(ValueData::Int { value, width })
    }

    pub(crate) fn uint(&mut self, value: u64, width: u32) -> Value {
        let width = width.clamp(1, MAX_INT_WIDTH);
        let value = mask_bits(value, width);
        self.alloc(ValueData::Uint { value, width })
    }

    /// Integer of the given signedness from raw bits.
    pub(crate) fn integral_from_bits(&mut self, bits: u64, width: u32, signed: bool) -> Value {
        if signed {
            self.int(bits as i64, width)
        } else {
            self.uint(bits, width)
        }
    }

    pub(crate) fn offset_unchecked(&mut self, magnitude: Value, unit: Value) -> Value {
        self.alloc(ValueData::Offset { magnitude, unit })
    }

    pub(crate) fn struct_value(
        &mut self,
        name: Option<String>,
        fields: Vec<(String, Value)>,
        map: MapInfo,
    ) -> Value {
        self.alloc(ValueData::Struct(StructData { name, fields, map }))
    }

    // ==================== Inspection ====================

    pub fn kind(&self, v: Value) -> Option<ValueKind> {
        Some(match self.get(v)? {
            ValueData::Int { .. } => ValueKind::Int,
            ValueData::Uint { .. } => ValueKind::Uint,
            ValueData::String(_) => ValueKind::String,
            ValueData::Offset { .. } => ValueKind::Offset,
            ValueData::Struct(_) => ValueKind::Struct,
            ValueData::Type(_) => ValueKind::Type,
        })
    }

    pub fn int_value(&self, v: Value) -> Option<i64> {
        match self.get(v)? {
            ValueData::Int { value, .. } => Some(*value),
            _ => None,
        }
    }

    pub fn uint_value(&self, v: Value) -> Option<u64> {
        match self.get(v)? {
            ValueData::Uint { value, .. } => Some(*value),
            _ => None,
        }
    }

    /// Declared width of an integral value.
    pub fn width(&self, v: Value) -> Option<u32> {
        match self.get(v)? {
            ValueData::Int { width, .. } | ValueData::Uint { width, .. } => Some(*width),
            _ => None,
        }
    }

    pub(crate) fn integral(&self, v: Value) -> Option<Integral> {
        match self.get(v)? {
            ValueData::Int { value, width } => Some(Integral {
                value: i128::from(*value),
                width: *width,
                signed: true,
            }),
            ValueData::Uint { value, width } => Some(Integral {
                value: i128::from(*value),
                width: *width,
                signed: false,
            }),
            _ => None,
        }
    }

    pub fn string_bytes(&self, v: Value) -> Option<&[u8]> {
        match self.get(v)? {
            ValueData::String(bytes) => Some(bytes),
            _ => None,
        }
    }

    /// String content, when it is valid UTF-8.
    pub fn string(&self, v: Value) -> Option<&str> {
        self.string_bytes(v).and_then(|b| std::str::from_utf8(b).ok())
    }

    pub fn offset_magnitude(&self, v: Value) -> Option<Value> {
        match self.get(v)? {
            ValueData::Offset { magnitude, .. } => Some(*magnitude),
            _ => None,
        }
    }

    pub fn offset_unit(&self, v: Value) -> Option<Value> {
        match self.get(v)? {
            ValueData::Offset { unit, .. } => Some(*unit),
            _ => None,
        }
    }

    /// Offset converted to bits; `None` for non-offsets or when the product overflows.
    pub fn offset_bits(&self, v: Value) -> Option<i128> {
        let magnitude = self.integral(self.offset_magnitude(v)?)?;
        let unit = self.uint_value(self.offset_unit(v)?)?;
        magnitude.value.checked_mul(i128::from(unit))
    }

    pub fn type_desc(&self, v: Value) -> Option<&Type> {
        match self.get(v)? {
            ValueData::Type(ty) => Some(ty),
            _ => None,
        }
    }

    pub fn struct_name(&self, v: Value) -> Option<&str> {
        match self.get(v)? {
            ValueData::Struct(s) => s.name.as_deref(),
            _ => None,
        }
    }

    pub fn struct_fields(&self, v: Value) -> Option<&[(String, Value)]> {
        match self.get(v)? {
            ValueData::Struct(s) => Some(&s.fields),
            _ => None,
        }
    }

    pub fn nfields(&self, v: Value) -> Option<usize> {
        self.struct_fields(v).map(<[_]>::len)
    }

    pub fn field_name(&self, v: Value, index: usize) -> Option<&str> {
        self.struct_fields(v)?.get(index).map(|(n, _)| n.as_str())
    }

    pub fn field_value(&self, v: Value, index: usize) -> Option<Value> {
        self.struct_fields(v)?.get(index).map(|(_, v)| *v)
    }

    /// Current value of the named field, or `None` when the struct has no such field.
    pub fn field(&self, s: Value, name: &str) -> Option<Value> {
        self.struct_fields(s)?
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| *v)
    }

    /// Replace the named field in place. Unknown fields are left alone: sets never add
    /// fields. A value that is `s` or contains it is refused, so structs stay acyclic.
    /// Returns whether a field was replaced.
    pub fn set_field(&mut self, s: Value, name: &str, value: Value) -> bool {
        if self.get(value).is_none() || self.contains(value, s) {
            return false;
        }
        match self.get_mut(s) {
            Some(ValueData::Struct(data)) => match data.fields.iter_mut().find(|(n, _)| n == name) {
                Some(slot) => {
                    slot.1 = value;
                    true
                }
                None => false,
            },
            _ => false,
        }
    }

    /// Whether `needle` is `v` or reachable through its struct fields.
    fn contains(&self, v: Value, needle: Value) -> bool {
        if v == needle {
            return true;
        }
        match self.get(v) {
            Some(ValueData::Struct(data)) => data.fields.iter().any(|(_, f)| self.contains(*f, needle)),
            _ => false,
        }
    }

    /// Size in bits the value occupies when mapped.
    pub fn size_bits(&self, v: Value) -> u64 {
        match self.get(v) {
            Some(ValueData::Int { width, .. }) | Some(ValueData::Uint { width, .. }) => {
                u64::from(*width)
            }
            Some(ValueData::String(bytes)) => (bytes.len() as u64 + 1) * 8,
            Some(ValueData::Offset { magnitude, .. }) => self.size_bits(*magnitude),
            Some(ValueData::Struct(s)) => s.fields.iter().map(|(_, f)| self.size_bits(*f)).sum(),
            Some(ValueData::Type(_)) | None => 0,
        }
    }

    // ==================== Equality and reflection ====================

    /// Deep structural equality. Mapping data and struct names do not participate.
    pub fn equal(&self, a: Value, b: Value) -> bool {
        let (Some(da), Some(db)) = (self.get(a), self.get(b)) else {
            return false;
        };
        match (da, db) {
            (ValueData::Int { value: x, width: wx }, ValueData::Int { value: y, width: wy }) => {
                wx == wy && x == y
            }
            (ValueData::Uint { value: x, width: wx }, ValueData::Uint { value: y, width: wy }) => {
                wx == wy && x == y
            }
            (ValueData::String(x), ValueData::String(y)) => x == y,
            (
                ValueData::Offset { magnitude: mx, unit: ux },
                ValueData::Offset { magnitude: my, unit: uy },
            ) => self.equal(*mx, *my) && self.equal(*ux, *uy),
            (ValueData::Struct(x), ValueData::Struct(y)) => {
                x.fields.len() == y.fields.len()
                    && x
                        .fields
                        .iter()
                        .zip(&y.fields)
                        .all(|((nx, vx), (ny, vy))| nx == ny && self.equal(*vx, *vy))
            }
            (ValueData::Type(x), ValueData::Type(y)) => x == y,
            _ => false,
        }
    }

    /// Type describing the shape of `v`.
    pub fn type_desc_of(&self, v: Value) -> Option<Type> {
        Some(match self.get(v)? {
            ValueData::Int { width, .. } => Type::Integral { size: *width, signed: true },
            ValueData::Uint { width, .. } => Type::Integral { size: *width, signed: false },
            ValueData::String(_) => Type::String,
            ValueData::Offset { magnitude, unit } => Type::Offset {
                base: Box::new(self.type_desc_of(*magnitude)?),
                unit: self.uint_value(*unit)?,
            },
            ValueData::Struct(s) => Type::Struct {
                name: s.name.clone(),
                fields: s
                    .fields
                    .iter()
                    .map(|(n, f)| Some((n.clone(), self.type_desc_of(*f)?)))
                    .collect::<Option<Vec<_>>>()?,
            },
            ValueData::Type(ty) => ty.clone(),
        })
    }

    /// Type value of `v`. A type value is its own type.
    pub fn type_of(&mut self, v: Value) -> Option<Value> {
        if let ValueData::Type(_) = self.get(v)? {
            return Some(v);
        }
        let ty = self.type_desc_of(v)?;
        Some(self.make_type(ty))
    }

    // ==================== Mapping ====================

    fn map_info(&self, v: Value) -> Option<&MapInfo> {
        match self.get(v)? {
            ValueData::Struct(s) => Some(&s.map),
            _ => None,
        }
    }

    fn map_info_mut(&mut self, v: Value) -> Option<&mut MapInfo> {
        match self.get_mut(v)? {
            ValueData::Struct(s) => Some(&mut s.map),
            _ => None,
        }
    }

    pub fn is_mappable(&self, v: Value) -> bool {
        self.map_info(v).is_some()
    }

    pub fn is_mapped(&self, v: Value) -> bool {
        self.map_info(v).is_some_and(|m| m.mapped)
    }

    pub fn is_strict(&self, v: Value) -> bool {
        self.map_info(v).is_some_and(|m| m.strict)
    }

    pub fn ios_of(&self, v: Value) -> Option<IosId> {
        self.map_info(v)?.ios
    }

    /// Mapped offset in bits.
    pub fn offset_bits_of(&self, v: Value) -> Option<u64> {
        self.map_info(v)?.offset
    }

    pub fn byte_offset_of(&self, v: Value) -> Option<u64> {
        self.offset_bits_of(v).map(|bits| bits / 8)
    }

    /// Bit offset within the byte at [`byte_offset_of`](Self::byte_offset_of).
    pub fn bit_offset_of(&self, v: Value) -> Option<u8> {
        self.offset_bits_of(v).map(|bits| (bits % 8) as u8)
    }

    pub(crate) fn map_info_of(&self, v: Value) -> Option<MapInfo> {
        self.map_info(v).copied()
    }

    pub fn set_mapped(&mut self, v: Value, mapped: bool) {
        if let Some(m) = self.map_info_mut(v) {
            m.mapped = mapped;
        }
    }

    pub fn set_strict(&mut self, v: Value, strict: bool) {
        if let Some(m) = self.map_info_mut(v) {
            m.strict = strict;
        }
    }

    pub fn set_ios(&mut self, v: Value, ios: Option<IosId>) {
        if let Some(m) = self.map_info_mut(v) {
            m.ios = ios;
        }
    }

    /// Set the byte part of the mapped offset, keeping the bit remainder.
    pub fn set_byte_offset(&mut self, v: Value, bytes: u64) {
        if let Some(m) = self.map_info_mut(v) {
            let bit = m.offset.unwrap_or(0) % 8;
            m.offset = Some(bytes.saturating_mul(8).saturating_add(bit));
        }
    }

    /// Set the bit remainder (0..8) of the mapped offset, keeping the byte part.
    pub fn set_bit_offset(&mut self, v: Value, bit: u8) {
        if let Some(m) = self.map_info_mut(v) {
            let bytes = m.offset.unwrap_or(0) / 8;
            m.offset = Some(bytes * 8 + u64::from(bit % 8));
        }
    }

    pub fn set_offset_bits(&mut self, v: Value, bits: u64) {
        if let Some(m) = self.map_info_mut(v) {
            m.offset = Some(bits);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_extend_narrow_widths() {
        assert_eq!(sign_extend(0b111, 3), -1);
        assert_eq!(sign_extend(0b011, 3), 3);
        assert_eq!(sign_extend(0x80, 8), -128);
        assert_eq!(sign_extend(u64::MAX, 64), -1);
    }

    #[test]
    fn int_out_of_range_is_truncated() {
        let mut heap = ValueHeap::new();
        let v = heap.make_int(0x1ff, 8).expect("int");
        assert_eq!(heap.int_value(v), Some(-1));
        assert_eq!(heap.width(v), Some(8));
    }

    #[test]
    fn struct_with_duplicate_fields_is_rejected() {
        let mut heap = ValueHeap::new();
        let a = heap.make_int(1, 32).expect("int");
        let b = heap.make_int(2, 32).expect("int");
        let fields = vec![("x".to_string(), a), ("x".to_string(), b)];
        assert!(heap.make_struct(None, fields).is_none());
    }

    #[test]
    fn size_bits_of_nested_struct() {
        let mut heap = ValueHeap::new();
        let a = heap.make_uint(1, 12).expect("uint");
        let s = heap.make_string("ab");
        let inner = heap.make_struct(None, vec![("s".to_string(), s)]).expect("struct");
        let outer = heap
            .make_struct(Some("T"), vec![("a".to_string(), a), ("in".to_string(), inner)])
            .expect("struct");
        assert_eq!(heap.size_bits(outer), 12 + 24);
    }

    #[test]
    fn struct_type_names_do_not_affect_equality() {
        let a = Type::Struct {
            name: Some("A".to_string()),
            fields: vec![("x".to_string(), Type::String)],
        };
        let b = Type::Struct { name: None, fields: vec![("x".to_string(), Type::String)] };
        assert_eq!(a, b);
        assert_ne!(a, Type::String);
    }

    #[test]
    fn unit_names_round_trip() {
        assert_eq!(unit_bits("KiB"), Some(8192));
        assert_eq!(unit_name(8), "B");
        assert_eq!(unit_name(3), "3");
    }
}
