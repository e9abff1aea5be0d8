//! Value model: construction limits, masking, offsets, structs, reflection and the
//! mapping getters/setters of non-mappable values.

use binscope::{Compiler, IosFlags, TermIf, Type, Value, ValueHeap, ValueKind};

fn compiler() -> Compiler {
    let (term, _capture) = TermIf::capture();
    Compiler::new(Some(term)).expect("complete terminal")
}

fn simple_values(heap: &mut ValueHeap) -> Vec<Value> {
    let int = heap.make_int(-3, 12).expect("int");
    let uint = heap.make_uint(7, 3).expect("uint");
    let string = heap.make_string("foo");
    let m = heap.make_uint(2, 64).expect("uint");
    let u = heap.make_uint(8, 64).expect("uint");
    let offset = heap.make_offset(m, u).expect("offset");
    vec![int, uint, string, offset]
}

#[test]
fn test_signed_widths_round_trip() {
    let mut heap = ValueHeap::new();
    for w in 1..=64u32 {
        let (min, max) = if w == 64 {
            (i64::MIN, i64::MAX)
        } else {
            (-(1i64 << (w - 1)), (1i64 << (w - 1)) - 1)
        };
        for v in [min, -1, 0, max] {
            let value = heap.make_int(v, w).expect("in range");
            assert_eq!(heap.int_value(value), Some(v), "value at width {}", w);
            assert_eq!(heap.width(value), Some(w));
            assert_eq!(heap.kind(value), Some(ValueKind::Int));
        }
    }
    assert!(heap.make_int(0, 65).is_none());
    assert!(heap.make_int(-1, 0).is_none());
}

#[test]
fn test_unsigned_masking() {
    let mut heap = ValueHeap::new();
    let v = heap.make_uint(u64::MAX, 63).expect("uint");
    assert_eq!(heap.uint_value(v), Some(u64::MAX >> 1));
    for x in [0, 1, 0xdead_beef, u64::MAX] {
        let v = heap.make_uint(x, 64).expect("uint");
        assert_eq!(heap.uint_value(v), Some(x));
    }
    assert!(heap.make_uint(1, 65).is_none());
    assert_eq!(heap.int_value(v), None);
}

#[test]
fn test_offset_unit_must_be_unsigned() {
    let mut heap = ValueHeap::new();
    let magnitude = heap.make_uint(u64::MAX, 64).expect("uint");
    for unit in [1i64, 8, -8, i64::MAX] {
        let signed_unit = heap.make_int(unit, 64).expect("int");
        assert!(heap.make_offset(magnitude, signed_unit).is_none());
    }
    let unit = heap.make_uint(u64::MAX, 64).expect("uint");
    let offset = heap.make_offset(magnitude, unit).expect("offset");
    assert_eq!(heap.kind(offset), Some(ValueKind::Offset));
    let m = heap.offset_magnitude(offset).expect("magnitude");
    let u = heap.offset_unit(offset).expect("unit");
    assert_eq!(heap.uint_value(m), Some(u64::MAX));
    assert_eq!(heap.uint_value(u), Some(u64::MAX));
}

#[test]
fn test_simple_values_are_not_mappable() {
    let mut pk = compiler();
    let ios = pk.open("*scratch*", IosFlags::empty(), true).expect("open");
    let heap = pk.heap_mut();
    for v in simple_values(heap) {
        assert!(!heap.is_mappable(v));
        assert!(!heap.is_mapped(v));
        assert!(!heap.is_strict(v));
        assert_eq!(heap.ios_of(v), None);
        assert_eq!(heap.byte_offset_of(v), None);
        assert_eq!(heap.bit_offset_of(v), None);

        heap.set_mapped(v, true);
        heap.set_strict(v, true);
        heap.set_ios(v, Some(ios));
        heap.set_byte_offset(v, 16);
        heap.set_bit_offset(v, 2);

        assert!(!heap.is_mappable(v));
        assert!(!heap.is_mapped(v));
        assert!(!heap.is_strict(v));
        assert_eq!(heap.ios_of(v), None);
        assert_eq!(heap.byte_offset_of(v), None);
        assert_eq!(heap.bit_offset_of(v), None);
    }
}

#[test]
fn test_struct_mapping_setters() {
    let mut heap = ValueHeap::new();
    let a = heap.make_int(1, 32).expect("int");
    let s = heap.make_struct(None, vec![("a".to_string(), a)]).expect("struct");
    assert!(heap.is_mappable(s));
    assert!(!heap.is_mapped(s));
    heap.set_mapped(s, true);
    heap.set_strict(s, true);
    heap.set_byte_offset(s, 4);
    heap.set_bit_offset(s, 3);
    assert!(heap.is_mapped(s));
    assert!(heap.is_strict(s));
    assert_eq!(heap.byte_offset_of(s), Some(4));
    assert_eq!(heap.bit_offset_of(s), Some(3));
}

#[test]
fn test_type_of_is_idempotent() {
    let mut heap = ValueHeap::new();
    let mut values = simple_values(&mut heap);
    let a = heap.make_int(1, 32).expect("int");
    values.push(heap.make_struct(Some("S"), vec![("a".to_string(), a)]).expect("struct"));
    values.push(heap.make_integral_type(16, false).expect("type"));
    for v in values {
        let t = heap.type_of(v).expect("type");
        let tt = heap.type_of(t).expect("type of type");
        assert!(heap.equal(t, tt));
    }
    let t = heap.make_integral_type(7, true).expect("type");
    let same = heap.type_of(t).expect("type");
    assert!(heap.equal(t, same));
    assert_eq!(heap.type_desc(t), Some(&Type::Integral { size: 7, signed: true }));
    assert!(heap.make_integral_type(65, true).is_none());
}

#[test]
fn test_struct_fields_set_and_get() {
    let mut pk = compiler();
    pk.compile_buffer(
        "type Foo = struct { int<32> foo; int<32> bar; };\n\
         var s = Foo { foo = 1, bar = 2 };",
    )
    .expect("compiles");
    let s = pk.decl_value("s").expect("variable s");
    let heap = pk.heap_mut();
    let v = heap.make_int(666, 32).expect("int");
    assert!(heap.set_field(s, "bar", v));
    let bar = heap.field(s, "bar").expect("field bar");
    assert_eq!(heap.kind(bar), Some(ValueKind::Int));
    assert_eq!(heap.int_value(bar), Some(666));

    assert!(!heap.set_field(s, "baz", v));
    assert_eq!(heap.field(s, "baz"), None);
    assert_eq!(heap.nfields(s), Some(2));
    assert_eq!(heap.field_name(s, 1), Some("bar"));
}

#[test]
fn test_wrong_variant_accessors() {
    let mut heap = ValueHeap::new();
    let s = heap.make_string("abc");
    assert_eq!(heap.int_value(s), None);
    assert_eq!(heap.width(s), None);
    assert_eq!(heap.offset_magnitude(s), None);
    assert_eq!(heap.field(s, "a"), None);
    assert_eq!(heap.type_desc(s), None);
    assert_eq!(heap.string(s), Some("abc"));
}

#[test]
fn test_equality_rules() {
    let mut heap = ValueHeap::new();
    let a32 = heap.make_int(1, 32).expect("int");
    let b32 = heap.make_int(1, 32).expect("int");
    let a16 = heap.make_int(1, 16).expect("int");
    let u32 = heap.make_uint(1, 32).expect("uint");
    assert!(heap.equal(a32, b32));
    assert!(!heap.equal(a32, a16));
    assert!(!heap.equal(a32, u32));

    let big = vec![0x41u8; 1 << 20];
    let s1 = heap.make_string(&big);
    let s2 = heap.make_string(&big);
    assert!(heap.equal(s1, s2));

    let x = heap.make_struct(Some("A"), vec![("f".to_string(), a32)]).expect("struct");
    let y = heap.make_struct(None, vec![("f".to_string(), b32)]).expect("struct");
    heap.set_mapped(x, true);
    heap.set_offset_bits(x, 24);
    assert!(heap.equal(x, y));
    let z = heap.make_struct(None, vec![("g".to_string(), b32)]).expect("struct");
    assert!(!heap.equal(x, z));
}

#[test]
fn test_struct_cannot_contain_itself() {
    let mut heap = ValueHeap::new();
    let a = heap.make_int(1, 32).expect("int");
    let inner = heap.make_struct(None, vec![("a".to_string(), a)]).expect("struct");
    let outer = heap.make_struct(None, vec![("inner".to_string(), inner)]).expect("struct");

    assert!(!heap.set_field(inner, "a", inner));
    assert!(!heap.set_field(inner, "a", outer));
    assert_eq!(heap.field(inner, "a"), Some(a));

    let t = heap.type_of(outer).expect("type");
    assert!(heap.equal(outer, outer));
    assert_eq!(heap.size_bits(outer), 32);
    assert!(heap.type_desc(t).is_some());

    let copy = heap.make_struct(None, vec![("a".to_string(), a)]).expect("struct");
    assert!(heap.set_field(outer, "inner", copy));
    assert!(heap.set_field(inner, "a", a));
}
