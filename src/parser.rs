//! Parse source text into AST using PEST.

use crate::ast::*;
use crate::compiler::CompileError;
use pest::error::LineColLocation;
use pest::Parser;
use pest_derive::Parser as PestParser;

#[derive(PestParser)]
#[grammar = "grammar.pest"]
struct InspectParser;

type Pair<'i> = pest::iterators::Pair<'i, Rule>;

/// Parse a whole program: any number of statements.
pub fn parse_program(source: &str) -> Result<Vec<Stmt>, CompileError> {
    let pair = parse_rule(Rule::program, source)?;
    pair.into_inner()
        .filter(|p| p.as_rule() != Rule::EOI)
        .map(build_statement)
        .collect()
}

/// Parse exactly one statement.
pub fn parse_statement(source: &str) -> Result<Stmt, CompileError> {
    let pair = parse_rule(Rule::single_statement, source)?;
    let stmt = pair
        .into_inner()
        .find(|p| p.as_rule() != Rule::EOI)
        .ok_or_else(|| malformed("statement"))?;
    build_statement(stmt)
}

/// Parse exactly one expression, optionally followed by `;`.
pub fn parse_expression(source: &str) -> Result<Expr, CompileError> {
    let pair = parse_rule(Rule::single_expression, source)?;
    let expr = pair
        .into_inner()
        .find(|p| p.as_rule() == Rule::expr)
        .ok_or_else(|| malformed("expression"))?;
    build_expr(expr)
}

fn parse_rule(rule: Rule, source: &str) -> Result<Pair<'_>, CompileError> {
    let mut pairs = InspectParser::parse(rule, source).map_err(syntax_error)?;
    pairs.next().ok_or_else(|| malformed("input"))
}

fn syntax_error(e: pest::error::Error<Rule>) -> CompileError {
    let ((first_line, first_column), (last_line, last_column)) = match e.line_col {
        LineColLocation::Pos(p) => (p, p),
        LineColLocation::Span(a, b) => (a, b),
    };
    CompileError::Syntax {
        loc: SourceLoc { first_line, first_column, last_line, last_column },
        msg: e.variant.message().into_owned(),
    }
}

fn malformed(what: &str) -> CompileError {
    CompileError::Malformed(what.to_string())
}

fn loc_of(pair: &Pair<'_>) -> SourceLoc {
    let span = pair.as_span();
    let (first_line, first_column) = span.start_pos().line_col();
    let (last_line, last_column) = span.end_pos().line_col();
    SourceLoc { first_line, first_column, last_line, last_column }
}

fn is_keyword(rule: Rule) -> bool {
    matches!(
        rule,
        Rule::kw_var
            | Rule::kw_type
            | Rule::kw_unit
            | Rule::kw_as
            | Rule::kw_struct
            | Rule::kw_int
            | Rule::kw_uint
            | Rule::kw_string
            | Rule::kw_offset
    )
}

fn next<'i>(it: &mut impl Iterator<Item = Pair<'i>>, what: &str) -> Result<Pair<'i>, CompileError> {
    it.next().ok_or_else(|| malformed(what))
}

fn build_statement(pair: Pair<'_>) -> Result<Stmt, CompileError> {
    let loc = loc_of(&pair);
    let source = pair.as_str().trim().to_string();
    let rule = pair.as_rule();
    let mut inner = pair.into_inner().filter(|p| !is_keyword(p.as_rule()));
    match rule {
        Rule::var_decl => {
            let name = next(&mut inner, "variable name")?.as_str().to_string();
            let init = build_expr(next(&mut inner, "variable initializer")?)?;
            Ok(Stmt::Var { head: DeclHead { name, loc, source }, init })
        }
        Rule::type_decl => {
            let name = next(&mut inner, "type name")?.as_str().to_string();
            let ty = build_type(next(&mut inner, "type")?)?;
            Ok(Stmt::Type { head: DeclHead { name, loc, source }, ty })
        }
        Rule::unit_decl => {
            let name = next(&mut inner, "unit name")?.as_str().to_string();
            let value = build_expr(next(&mut inner, "unit value")?)?;
            Ok(Stmt::Unit { head: DeclHead { name, loc, source }, value })
        }
        Rule::assign_stmt => {
            let target = build_lvalue(next(&mut inner, "assignment target")?)?;
            let value = build_expr(next(&mut inner, "assigned value")?)?;
            Ok(Stmt::Assign { target, value, loc })
        }
        Rule::expr_stmt => {
            let expr = build_expr(next(&mut inner, "expression")?)?;
            Ok(Stmt::Expr { expr, loc })
        }
        other => Err(malformed(&format!("statement {:?}", other))),
    }
}

fn build_lvalue(pair: Pair<'_>) -> Result<LValue, CompileError> {
    let inner = next(&mut pair.into_inner(), "assignment target")?;
    match inner.as_rule() {
        Rule::map_expr => Ok(LValue::Map(build_map(inner)?)),
        Rule::field_path => {
            let mut names = inner.into_inner().map(|p| p.as_str().to_string());
            let var = names.next().ok_or_else(|| malformed("assignment target"))?;
            Ok(LValue::Path(var, names.collect()))
        }
        other => Err(malformed(&format!("assignment target {:?}", other))),
    }
}

fn build_type(pair: Pair<'_>) -> Result<TypeExpr, CompileError> {
    let pair = if pair.as_rule() == Rule::type_spec {
        next(&mut pair.into_inner(), "type")?
    } else {
        pair
    };
    let rule = pair.as_rule();
    let mut inner = pair.into_inner().filter(|p| !is_keyword(p.as_rule()));
    match rule {
        Rule::int_type => Ok(TypeExpr::Int(build_width(next(&mut inner, "integer width")?)?)),
        Rule::uint_type => Ok(TypeExpr::Uint(build_width(next(&mut inner, "integer width")?)?)),
        Rule::string_type => Ok(TypeExpr::String),
        Rule::offset_type => {
            let base = build_type(next(&mut inner, "offset base type")?)?;
            let unit = build_unit(next(&mut inner, "offset unit")?.as_str())?;
            Ok(TypeExpr::Offset(Box::new(base), unit))
        }
        Rule::struct_type => {
            let mut fields: Vec<FieldDecl> = Vec::new();
            for field in inner {
                let mut it = field.into_inner();
                let ty = build_type(next(&mut it, "field type")?)?;
                let name = next(&mut it, "field name")?.as_str().to_string();
                if fields.iter().any(|f| f.name == name) {
                    return Err(CompileError::Invalid(format!("duplicated struct field `{}`", name)));
                }
                fields.push(FieldDecl { name, ty });
            }
            Ok(TypeExpr::Struct(fields))
        }
        Rule::named_type => Ok(TypeExpr::Named(next(&mut inner, "type name")?.as_str().to_string())),
        other => Err(malformed(&format!("type {:?}", other))),
    }
}

fn build_width(pair: Pair<'_>) -> Result<u32, CompileError> {
    let width: u32 = pair
        .as_str()
        .parse()
        .map_err(|_| CompileError::Invalid(format!("invalid integer width {}", pair.as_str())))?;
    if !(1..=64).contains(&width) {
        return Err(CompileError::Invalid(format!("invalid integer width {}", width)));
    }
    Ok(width)
}

fn build_unit(text: &str) -> Result<UnitRef, CompileError> {
    if text.bytes().all(|b| b.is_ascii_digit()) {
        let bits = text
            .parse()
            .map_err(|_| CompileError::Invalid(format!("invalid unit {}", text)))?;
        return Ok(UnitRef::Bits(bits));
    }
    Ok(UnitRef::Named(text.to_string()))
}

fn build_map(pair: Pair<'_>) -> Result<MapExpr, CompileError> {
    let mut ty = None;
    let mut strict = true;
    let mut ios = None;
    let mut offset = None;
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::type_spec => ty = Some(build_type(inner)?),
            Rule::map_op => strict = inner.as_str() == "@",
            Rule::map_ios => ios = Some(Box::new(build_expr(inner)?)),
            Rule::map_offset => offset = Some(Box::new(build_expr(inner)?)),
            _ => {}
        }
    }
    Ok(MapExpr {
        ty: ty.ok_or_else(|| malformed("map type"))?,
        strict,
        ios,
        offset: offset.ok_or_else(|| malformed("map offset"))?,
    })
}

fn binary_op(text: &str) -> Result<BinaryOp, CompileError> {
    Ok(match text {
        "*" => BinaryOp::Mul,
        "/" => BinaryOp::Div,
        "%" => BinaryOp::Mod,
        "+" => BinaryOp::Add,
        "-" => BinaryOp::Sub,
        "==" => BinaryOp::Eq,
        "!=" => BinaryOp::Ne,
        "<" => BinaryOp::Lt,
        "<=" => BinaryOp::Le,
        ">" => BinaryOp::Gt,
        ">=" => BinaryOp::Ge,
        other => return Err(malformed(&format!("operator {}", other))),
    })
}

fn build_expr(pair: Pair<'_>) -> Result<Expr, CompileError> {
    match pair.as_rule() {
        Rule::expr | Rule::primary | Rule::map_ios | Rule::map_offset => {
            build_expr(next(&mut pair.into_inner(), "expression")?)
        }
        Rule::comparison | Rule::additive | Rule::multiplicative => {
            let mut inner = pair.into_inner();
            let mut lhs = build_expr(next(&mut inner, "operand")?)?;
            while let Some(op) = inner.next() {
                let rhs = build_expr(next(&mut inner, "operand")?)?;
                lhs = Expr::Binary(binary_op(op.as_str())?, Box::new(lhs), Box::new(rhs));
            }
            Ok(lhs)
        }
        Rule::cast => {
            let mut inner = pair.into_inner().filter(|p| !is_keyword(p.as_rule()));
            let mut expr = build_expr(next(&mut inner, "cast operand")?)?;
            for ty in inner {
                expr = Expr::Cast(Box::new(expr), build_type(ty)?);
            }
            Ok(expr)
        }
        Rule::unary => {
            let mut ops = Vec::new();
            let mut operand = None;
            for inner in pair.into_inner() {
                match inner.as_rule() {
                    Rule::unary_op => ops.push(match inner.as_str() {
                        "-" => UnaryOp::Neg,
                        "~" => UnaryOp::BitNot,
                        _ => UnaryOp::Not,
                    }),
                    _ => operand = Some(build_expr(inner)?),
                }
            }
            let mut expr = operand.ok_or_else(|| malformed("unary operand"))?;
            for op in ops.into_iter().rev() {
                expr = Expr::Unary(op, Box::new(expr));
            }
            Ok(expr)
        }
        Rule::postfix => {
            let mut inner = pair.into_inner();
            let mut expr = build_expr(next(&mut inner, "primary expression")?)?;
            for field in inner {
                expr = Expr::Field(Box::new(expr), field.as_str().to_string());
            }
            Ok(expr)
        }
        Rule::map_expr => Ok(Expr::Map(build_map(pair)?)),
        Rule::call => {
            let mut inner = pair.into_inner();
            let name = next(&mut inner, "function name")?.as_str().to_string();
            let args = inner.map(build_expr).collect::<Result<Vec<_>, _>>()?;
            Ok(Expr::Call { name, args })
        }
        Rule::struct_cons => {
            let mut name = None;
            let mut fields: Vec<(String, Expr)> = Vec::new();
            for inner in pair.into_inner() {
                match inner.as_rule() {
                    Rule::ident => name = Some(inner.as_str().to_string()),
                    Rule::field_init => {
                        let mut it = inner.into_inner();
                        let field = next(&mut it, "field name")?.as_str().to_string();
                        let value = build_expr(next(&mut it, "field value")?)?;
                        if fields.iter().any(|(n, _)| *n == field) {
                            return Err(CompileError::Invalid(format!(
                                "field `{}` initialized twice",
                                field
                            )));
                        }
                        fields.push((field, value));
                    }
                    _ => {}
                }
            }
            Ok(Expr::StructCons { name, fields })
        }
        Rule::offset_lit => {
            let mut magnitude = Expr::Int { value: 1, width: 32, signed: true };
            let mut unit = None;
            for inner in pair.into_inner() {
                match inner.as_rule() {
                    Rule::int_lit => magnitude = build_int(inner)?,
                    Rule::unit_ref => unit = Some(build_unit(inner.as_str())?),
                    _ => {}
                }
            }
            Ok(Expr::Offset {
                magnitude: Box::new(magnitude),
                unit: unit.ok_or_else(|| malformed("offset unit"))?,
            })
        }
        Rule::int_lit => build_int(pair),
        Rule::string_lit => {
            let raw = pair.into_inner().next().map(|p| p.as_str()).unwrap_or("");
            Ok(Expr::Str(unescape(raw)?))
        }
        Rule::variable => Ok(Expr::Var(pair.as_str().to_string())),
        other => Err(malformed(&format!("expression {:?}", other))),
    }
}

/// Whether `value` is representable in `width` bits. Signed decimal literals keep one bit
/// for the sign; other literals are bit patterns.
fn fits(value: u64, width: u32, signed: bool) -> bool {
    let bits = if signed { width - 1 } else { width };
    bits >= 64 || value >> bits == 0
}

fn build_int(pair: Pair<'_>) -> Result<Expr, CompileError> {
    let text = pair.as_str();
    let mut body = "";
    let mut suffix = "";
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::int_body => body = inner.as_str(),
            Rule::int_suffix => suffix = inner.as_str(),
            _ => {}
        }
    }
    let (digits, radix) = match body.get(..2) {
        Some("0x" | "0X") => (&body[2..], 16),
        Some("0o" | "0O") => (&body[2..], 8),
        Some("0b" | "0B") => (&body[2..], 2),
        _ => (body, 10),
    };
    let value = u64::from_str_radix(digits, radix)
        .map_err(|_| CompileError::Literal(text.to_string()))?;
    let signed = !suffix.contains(['u', 'U']);
    let explicit = suffix.chars().find_map(|c| match c.to_ascii_uppercase() {
        'L' => Some(64),
        'H' => Some(16),
        'B' => Some(8),
        'N' => Some(4),
        _ => None,
    });
    let sign_bit = signed && radix == 10;
    let width = match explicit {
        Some(w) if fits(value, w, sign_bit) => w,
        Some(_) => return Err(CompileError::Literal(text.to_string())),
        None if fits(value, 32, sign_bit) => 32,
        None if fits(value, 64, sign_bit) => 64,
        None => return Err(CompileError::Literal(text.to_string())),
    };
    Ok(Expr::Int { value, width, signed })
}

fn unescape(raw: &str) -> Result<Vec<u8>, CompileError> {
    let mut out = Vec::with_capacity(raw.len());
    let mut bytes = raw.bytes();
    while let Some(b) = bytes.next() {
        if b != b'\\' {
            out.push(b);
            continue;
        }
        match bytes.next() {
            Some(b'n') => out.push(b'\n'),
            Some(b't') => out.push(b'\t'),
            Some(b'r') => out.push(b'\r'),
            Some(b'0') => out.push(0),
            Some(b'\\') => out.push(b'\\'),
            Some(b'"') => out.push(b'"'),
            Some(b'x') => {
                let hex = [bytes.next(), bytes.next()];
                let byte = match hex {
                    [Some(hi), Some(lo)] => std::str::from_utf8(&[hi, lo])
                        .ok()
                        .and_then(|s| u8::from_str_radix(s, 16).ok()),
                    _ => None,
                };
                out.push(byte.ok_or_else(|| CompileError::Literal(format!("\"{}\"", raw)))?);
            }
            _ => return Err(CompileError::Literal(format!("\"{}\"", raw))),
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_declarations() {
        let stmts = parse_program(
            "var x = 10;\n\
             type Pair = struct { int<32> a; uint<8> b; };\n\
             unit Word = 16;\n",
        )
        .expect("parse");
        assert_eq!(stmts.len(), 3);
        match &stmts[0] {
            Stmt::Var { head, init } => {
                assert_eq!(head.name, "x");
                assert_eq!(head.loc.first_line, 1);
                assert_eq!(*init, Expr::Int { value: 10, width: 32, signed: true });
            }
            other => panic!("expected var, got {:?}", other),
        }
        match &stmts[1] {
            Stmt::Type { head, ty: TypeExpr::Struct(fields) } => {
                assert_eq!(head.name, "Pair");
                assert_eq!(head.loc.first_line, 2);
                assert_eq!(fields.len(), 2);
                assert_eq!(fields[1].ty, TypeExpr::Uint(8));
            }
            other => panic!("expected struct type, got {:?}", other),
        }
        assert!(matches!(&stmts[2], Stmt::Unit { head, .. } if head.name == "Word"));
    }

    #[test]
    fn parse_map_expressions() {
        let expr = parse_expression("uint<16> @ 23#B").expect("parse");
        match expr {
            Expr::Map(MapExpr { ty, strict, ios, offset }) => {
                assert_eq!(ty, TypeExpr::Uint(16));
                assert!(strict);
                assert!(ios.is_none());
                assert!(matches!(*offset, Expr::Offset { unit: UnitRef::Named(ref u), .. } if u == "B"));
            }
            other => panic!("expected map, got {:?}", other),
        }
        let expr = parse_expression("int<8> @! 1 : 0#b").expect("parse");
        assert!(matches!(expr, Expr::Map(MapExpr { strict: false, ios: Some(_), .. })));
    }

    #[test]
    fn parse_assignment_targets() {
        let stmt = parse_statement("uint<8> @ 23#B = 7;").expect("parse");
        assert!(matches!(stmt, Stmt::Assign { target: LValue::Map(_), .. }));
        let stmt = parse_statement("p.a.b = 1;").expect("parse");
        match stmt {
            Stmt::Assign { target: LValue::Path(var, path), .. } => {
                assert_eq!(var, "p");
                assert_eq!(path, vec!["a".to_string(), "b".to_string()]);
            }
            other => panic!("expected path assignment, got {:?}", other),
        }
        let stmt = parse_statement("x == 1;").expect("parse");
        assert!(matches!(stmt, Stmt::Expr { .. }));
    }

    #[test]
    fn integer_literal_suffixes() {
        let int = |s: &str| parse_expression(s).expect(s);
        assert_eq!(int("0xffUB"), Expr::Int { value: 0xff, width: 8, signed: false });
        assert_eq!(int("7N"), Expr::Int { value: 7, width: 4, signed: true });
        assert_eq!(int("1L"), Expr::Int { value: 1, width: 64, signed: true });
        assert_eq!(int("0b101"), Expr::Int { value: 5, width: 32, signed: true });
        assert_eq!(int("5000000000"), Expr::Int { value: 5_000_000_000, width: 64, signed: true });
        assert!(matches!(parse_expression("300B"), Err(CompileError::Literal(_))));
    }

    #[test]
    fn precedence_and_casts() {
        let expr = parse_expression("1 + 2 * 3 as uint<8>").expect("parse");
        match expr {
            Expr::Binary(BinaryOp::Add, _, rhs) => {
                assert!(matches!(*rhs, Expr::Binary(BinaryOp::Mul, _, ref r) if matches!(**r, Expr::Cast(..))));
            }
            other => panic!("unexpected shape {:?}", other),
        }
    }

    #[test]
    fn string_escapes() {
        let expr = parse_expression(r#""a\n\x41\"""#).expect("parse");
        assert_eq!(expr, Expr::Str(b"a\nA\"".to_vec()));
    }

    #[test]
    fn syntax_errors_carry_location() {
        let err = parse_program("var x = 1;\nvar = 2;").expect_err("syntax error");
        match err {
            CompileError::Syntax { loc, .. } => assert_eq!(loc.first_line, 2),
            other => panic!("expected syntax error, got {:?}", other),
        }
    }

    #[test]
    fn struct_constructors() {
        let expr = parse_expression("Pair { a = 1, b = 2UB }").expect("parse");
        match expr {
            Expr::StructCons { name, fields } => {
                assert_eq!(name.as_deref(), Some("Pair"));
                assert_eq!(fields.len(), 2);
            }
            other => panic!("expected struct constructor, got {:?}", other),
        }
        assert!(matches!(
            parse_expression("struct { a = 1 }"),
            Ok(Expr::StructCons { name: None, .. })
        ));
    }
}
