//! Compiler lifecycle: construction against a terminal interface, compile entry points,
//! exceptions, printing and declaration enumeration.

use binscope::term::CALLBACKS;
use binscope::{
    Capture, CompileError, Compiler, CompilerConfig, CompilerError, DeclKind, ExceptionCode, IoDevice, Iod,
    IodError, IosFlags, TermIf, Type, Value,
};
use std::cell::Cell;
use std::rc::Rc;

fn compiler() -> (Compiler, Capture) {
    let (term, capture) = TermIf::capture();
    (Compiler::new(Some(term)).expect("complete terminal"), capture)
}

fn exception_code(pk: &Compiler, exception: Option<Value>) -> Option<i64> {
    let code = pk.heap().field(exception?, "code")?;
    pk.heap().int_value(code)
}

#[test]
fn test_construction_requires_terminal() {
    assert!(matches!(Compiler::new(None), Err(CompilerError::NoTerminal)));
    assert!(matches!(
        Compiler::with_config(None, CompilerConfig::default()),
        Err(CompilerError::NoTerminal)
    ));
}

#[test]
fn test_each_missing_callback_is_rejected() {
    for name in CALLBACKS {
        let term = TermIf::capture().0.without(name);
        match Compiler::new(Some(term)) {
            Err(CompilerError::MissingCallback(missing)) => assert_eq!(missing, name),
            other => panic!("expected missing `{}`, got {:?}", name, other.map(|_| ())),
        }
    }
    assert!(Compiler::new(Some(TermIf::default())).is_err());
}

#[test]
fn test_map_declarations_in_order() {
    let (mut pk, _capture) = compiler();
    pk.compile_buffer(
        "var a = 1;\n\
         type T = int<8>;\n\
         unit K = 16;\n\
         var b = \"x\";",
    )
    .expect("compiles");

    let mut seen = Vec::new();
    pk.map_declarations(None, |d| seen.push((d.kind, d.name.to_string(), d.value.is_some())));
    assert_eq!(
        seen,
        [
            (DeclKind::Var, "a".to_string(), true),
            (DeclKind::Type, "T".to_string(), false),
            (DeclKind::Unit, "K".to_string(), true),
            (DeclKind::Var, "b".to_string(), true),
        ]
    );

    let mut vars = Vec::new();
    pk.map_declarations(Some(DeclKind::Var), |d| vars.push(d.name.to_string()));
    assert_eq!(vars, ["a", "b"]);

    let mut sources = Vec::new();
    pk.map_declarations(Some(DeclKind::Type), |d| {
        sources.push((d.source.to_string(), d.loc.first_line))
    });
    assert_eq!(sources, [("type T = int<8>;".to_string(), 2)]);

    let mut unit = None;
    pk.map_declarations(Some(DeclKind::Unit), |d| unit = d.value);
    assert_eq!(pk.heap().uint_value(unit.expect("unit value")), Some(16));
}

#[test]
fn test_namespaces_and_redeclaration() {
    let (mut pk, _capture) = compiler();
    pk.compile_buffer("var x = 1; type x = uint<4>; var x = 2;").expect("compiles");
    assert_eq!(pk.decl_kinds("x"), [DeclKind::Var, DeclKind::Type]);
    let x = pk.decl_value("x").expect("x");
    assert_eq!(pk.heap().int_value(x), Some(2));

    let mut count = 0;
    pk.map_declarations(None, |_| count += 1);
    assert_eq!(count, 2);

    let v = pk.compile_expression("0 as x").expect("compiles").value.expect("value");
    assert_eq!(pk.heap().type_desc_of(v), Some(Type::Integral { size: 4, signed: false }));
}

#[test]
fn test_set_decl_value_from_client() {
    let (mut pk, _capture) = compiler();
    pk.compile_statement("var n = 1;").expect("compiles");
    let v = pk.heap_mut().make_int(41, 32).expect("int");
    assert!(pk.set_decl_value("n", v));
    assert!(!pk.set_decl_value("missing", v));
    let sum = pk.compile_expression("n + 1").expect("compiles").value.expect("value");
    assert_eq!(pk.heap().int_value(sum), Some(42));
}

#[test]
fn test_exceptions_are_returned() {
    let (mut pk, capture) = compiler();
    let eval = pk.compile_expression("1 / 0").expect("compiles");
    assert!(eval.raised());
    assert_eq!(eval.value, None);
    assert_eq!(exception_code(&pk, eval.exception), Some(i64::from(ExceptionCode::DivByZero.code())));
    let exc = eval.exception.expect("exception");
    assert_eq!(pk.heap().struct_name(exc), Some("Exception"));
    let name = pk.heap().field(exc, "name").expect("name");
    assert_eq!(pk.heap().string(name), Some("division by zero"));

    let eval = pk.compile_expression("uint<8> @ 0#B").expect("compiles");
    assert_eq!(exception_code(&pk, eval.exception), Some(2));

    let eval = pk.compile_expression("struct { a = 1 }.b").expect("compiles");
    assert_eq!(exception_code(&pk, eval.exception), Some(i64::from(ExceptionCode::Elem.code())));

    let eval = pk.compile_expression("\"s\" as int<8>").expect("compiles");
    assert_eq!(exception_code(&pk, eval.exception), Some(i64::from(ExceptionCode::Conv.code())));
    assert_eq!(capture.text(), "");
}

#[test]
fn test_buffer_stops_at_first_exception() {
    let (mut pk, _capture) = compiler();
    let eval = pk
        .compile_buffer("var a = 1; var b = a % 0; var c = 3;")
        .expect("compiles");
    assert!(eval.raised());
    assert!(pk.decl_value("a").is_some());
    assert!(pk.decl_value("b").is_none());
    assert!(pk.decl_value("c").is_none());
}

#[test]
fn test_compile_errors_are_reported() {
    let (mut pk, capture) = compiler();
    let err = pk.compile_expression("1 +").expect_err("syntax error");
    assert!(matches!(err, CompileError::Syntax { .. }));
    assert!(capture.text().starts_with("error: 1:"));
    assert_eq!(capture.classes(), ["error"]);
    assert!(capture.flushes() > 0);

    capture.clear();
    let err = pk.compile_buffer("var a = 1;\nvar = ;").expect_err("syntax error");
    match err {
        CompileError::Syntax { loc, .. } => assert_eq!(loc.first_line, 2),
        other => panic!("expected syntax error, got {:?}", other),
    }
    assert!(pk.decl_value("a").is_none());

    assert!(matches!(pk.compile_expression("nope"), Err(CompileError::UndefinedVariable(_))));
    assert!(matches!(pk.compile_expression("frob(1)"), Err(CompileError::UnknownFunction(_))));
    assert!(matches!(pk.compile_expression("1#parsec"), Err(CompileError::UndefinedUnit(_))));
    assert!(matches!(pk.compile_expression("1 as Nope"), Err(CompileError::UndefinedType(_))));
    assert!(matches!(pk.compile_expression("1 + \"a\""), Err(CompileError::Type(_))));
    assert!(matches!(pk.compile_expression("0x1ffUB"), Err(CompileError::Literal(_))));
}

#[test]
fn test_statement_and_expression_values() {
    let (mut pk, _capture) = compiler();
    let eval = pk.compile_statement("2 * 3;").expect("compiles");
    assert_eq!(pk.heap().int_value(eval.value.expect("value")), Some(6));
    let eval = pk.compile_statement("var z = 2;").expect("compiles");
    assert_eq!(eval.value, None);
    let eval = pk.compile_expression("z - 3;").expect("compiles");
    assert_eq!(pk.heap().int_value(eval.value.expect("value")), Some(-1));
    let eval = pk.compile_expression("-1 as uint<8>").expect("compiles");
    assert_eq!(pk.heap().uint_value(eval.value.expect("value")), Some(0xff));
    let eval = pk.compile_expression("1UB < 2UH").expect("compiles");
    assert_eq!(pk.heap().int_value(eval.value.expect("value")), Some(1));
}

#[test]
fn test_offset_arithmetic() {
    let (mut pk, _capture) = compiler();
    let v = pk.compile_expression("2#B + 4#b").expect("compiles").value.expect("value");
    assert_eq!(pk.heap().offset_bits(v), Some(20));
    let unit = pk.heap().offset_unit(v).expect("unit");
    assert_eq!(pk.heap().uint_value(unit), Some(1));

    let v = pk.compile_expression("16#b / 1#B").expect("compiles").value.expect("value");
    assert_eq!(pk.heap().kind(v), Some(binscope::ValueKind::Int));
    assert_eq!(pk.heap().int_value(v), Some(2));

    pk.compile_statement("unit K = 16;").expect("compiles");
    let v = pk.compile_expression("3#K * 2").expect("compiles").value.expect("value");
    assert_eq!(pk.heap().offset_bits(v), Some(96));

    let v = pk.compile_expression("sizeof(1UH)").expect("compiles").value.expect("value");
    assert_eq!(pk.heap().offset_bits(v), Some(16));

    let v = pk.compile_expression("typeof(1UH)").expect("compiles").value.expect("value");
    assert_eq!(pk.heap().type_desc(v), Some(&Type::Integral { size: 16, signed: false }));
}

#[test]
fn test_printing_through_terminal() {
    let (mut pk, capture) = compiler();
    pk.compile_statement("print(\"hi \", 1 + 2, \"\\n\");").expect("compiles");
    assert_eq!(capture.text(), "hi 3\n");

    capture.clear();
    assert!(pk.set_obase(16));
    let v = pk.compile_expression("255UB").expect("compiles").value.expect("value");
    pk.print_val(v);
    assert_eq!(capture.text(), "0xffUB");
    assert_eq!(capture.classes(), ["integer"]);

    capture.clear();
    assert!(!pk.set_obase(7));
    assert_eq!(pk.config().obase, 16);
    pk.compile_buffer("type P = struct { uint<8> a; string s; }; var p = P { a = 1UB, s = \"x\" };")
        .expect("compiles");
    let p = pk.decl_value("p").expect("p");
    pk.print_val(p);
    assert_eq!(capture.text(), "P {a=0x1UB,s=\"x\"}");
}

#[test]
fn test_struct_construction_defaults() {
    let (mut pk, _capture) = compiler();
    pk.compile_statement("type Pair = struct { int<16> x; offset<uint<32>,B> o; };")
        .expect("compiles");
    let v = pk.compile_expression("Pair { o = 3#B }").expect("compiles").value.expect("value");
    let heap = pk.heap();
    assert_eq!(heap.struct_name(v), Some("Pair"));
    let x = heap.field(v, "x").expect("x");
    assert_eq!((heap.int_value(x), heap.width(x)), (Some(0), Some(16)));
    let o = heap.field(v, "o").expect("o");
    assert_eq!(heap.offset_bits(o), Some(24));
    assert!(matches!(pk.compile_expression("Pair { y = 1 }"), Err(CompileError::Invalid(_))));
}

struct CountingIod {
    closes: Rc<Cell<usize>>,
}

struct CountingDevice {
    closes: Rc<Cell<usize>>,
}

impl Iod for CountingIod {
    fn name(&self) -> &str {
        "counting"
    }

    fn normalize(&self, handler: &str, _flags: IosFlags) -> Result<Option<String>, IodError> {
        Ok(handler.strip_prefix("count:").map(str::to_string))
    }

    fn open(&mut self, _handler: &str, _flags: IosFlags) -> Result<Box<dyn IoDevice>, IodError> {
        Ok(Box::new(CountingDevice { closes: self.closes.clone() }))
    }
}

impl IoDevice for CountingDevice {
    fn pread(&mut self, buf: &mut [u8], _offset: u64) -> Result<(), IodError> {
        buf.fill(0);
        Ok(())
    }

    fn pwrite(&mut self, _buf: &[u8], _offset: u64) -> Result<(), IodError> {
        Ok(())
    }

    fn size(&self) -> u64 {
        64
    }

    fn flags(&self) -> IosFlags {
        IosFlags::READ
    }

    fn flush(&mut self, _offset: u64) -> Result<(), IodError> {
        Ok(())
    }

    fn close(self: Box<Self>) -> Result<(), IodError> {
        self.closes.set(self.closes.get() + 1);
        Err(IodError::Device("close reported a failure".to_string()))
    }
}

#[test]
fn test_drop_closes_every_ios() {
    let closes = Rc::new(Cell::new(0));
    let (mut pk, _capture) = compiler();
    pk.register_iod(Box::new(CountingIod { closes: closes.clone() })).expect("register");
    let a = pk.open("count:a", IosFlags::READ, true).expect("open a");
    let b = pk.open("count:b", IosFlags::READ, false).expect("open b");
    assert_ne!(a, b);
    assert_eq!(pk.ios().current(), Some(a));
    pk.compile_statement("set_ios(1);").expect("compiles");
    assert_eq!(pk.ios().current(), Some(b));
    let v = pk.compile_expression("get_ios()").expect("compiles").value.expect("value");
    assert_eq!(pk.heap().int_value(v), Some(1));

    let eval = pk.compile_statement("uint<8> @ 0#B = 1UB;").expect("compiles");
    assert_eq!(exception_code(&pk, eval.exception), Some(i64::from(ExceptionCode::IoFlags.code())));

    drop(pk);
    assert_eq!(closes.get(), 2);
}
