//! Tree-walking evaluation of statements and expressions against a compiler's state.

use crate::ast::*;
use crate::codec::{advance, fit_bits, Mapper};
use crate::compiler::{CompileError, Compiler};
use crate::env::{Binding, Decl};
use crate::exception::{Exception, ExceptionCode};
use crate::ios::{IosError, IosId};
use crate::iod::IosFlags;
use crate::print;
use crate::value::{unit_bits, Integral, Type, Value, ValueKind};
use std::cmp::Ordering;

/// Why evaluation stopped early.
#[derive(Debug)]
pub(crate) enum Unwind {
    Error(CompileError),
    Raise(Exception),
}

impl From<CompileError> for Unwind {
    fn from(e: CompileError) -> Self {
        Unwind::Error(e)
    }
}

impl From<Exception> for Unwind {
    fn from(e: Exception) -> Self {
        Unwind::Raise(e)
    }
}

impl From<IosError> for Unwind {
    fn from(e: IosError) -> Self {
        Unwind::Raise(e.into())
    }
}

type Eval<T> = Result<T, Unwind>;

fn raise<T>(code: ExceptionCode, msg: impl Into<String>) -> Eval<T> {
    Err(Unwind::Raise(Exception::new(code, msg)))
}

fn type_error<T>(msg: impl Into<String>) -> Eval<T> {
    Err(Unwind::Error(CompileError::Type(msg.into())))
}

/// Common type of two integers: the wider width, signed only when both are.
fn promote(a: Integral, b: Integral) -> (i128, i128, u32, bool) {
    let width = a.width.max(b.width);
    let signed = a.signed && b.signed;
    (
        fit_bits(a.value as u64, width, signed),
        fit_bits(b.value as u64, width, signed),
        width,
        signed,
    )
}

fn compare(op: BinaryOp, ord: Ordering) -> bool {
    match op {
        BinaryOp::Eq => ord == Ordering::Equal,
        BinaryOp::Ne => ord != Ordering::Equal,
        BinaryOp::Lt => ord == Ordering::Less,
        BinaryOp::Le => ord != Ordering::Greater,
        BinaryOp::Gt => ord == Ordering::Greater,
        _ => ord != Ordering::Less,
    }
}

fn arith(op: BinaryOp, x: i128, y: i128) -> Eval<i128> {
    match op {
        BinaryOp::Add => Ok(x.wrapping_add(y)),
        BinaryOp::Sub => Ok(x.wrapping_sub(y)),
        BinaryOp::Mul => Ok(x.wrapping_mul(y)),
        BinaryOp::Div | BinaryOp::Mod if y == 0 => raise(ExceptionCode::DivByZero, "division by zero"),
        BinaryOp::Div => Ok(x.wrapping_div(y)),
        BinaryOp::Mod => Ok(x.wrapping_rem(y)),
        other => type_error(format!("`{}` is not an arithmetic operator", other.symbol())),
    }
}

fn gcd(mut a: u64, mut b: u64) -> u64 {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}

impl Compiler {
    fn mapper(&mut self) -> Mapper<'_> {
        Mapper { heap: &mut self.heap, ios: &mut self.ios, endianness: self.config.endianness }
    }

    fn bool_value(&mut self, b: bool) -> Value {
        self.heap.int(i64::from(b), 32)
    }

    fn describe(&self, v: Value) -> String {
        self.heap
            .type_desc_of(v)
            .map_or_else(|| "<no value>".to_string(), |t| t.to_string())
    }

    // ==================== Statements ====================

    pub(crate) fn exec_stmt(&mut self, stmt: &Stmt) -> Eval<Option<Value>> {
        match stmt {
            Stmt::Var { head, init } => {
                let value = self.eval(init)?;
                self.declare(head, Binding::Var(value));
                Ok(None)
            }
            Stmt::Type { head, ty } => {
                let ty = match self.resolve_type(ty)? {
                    Type::Struct { name: None, fields } => {
                        Type::Struct { name: Some(head.name.clone()), fields }
                    }
                    ty => ty,
                };
                self.declare(head, Binding::Type(ty));
                Ok(None)
            }
            Stmt::Unit { head, value } => {
                let v = self.eval(value)?;
                let bits = match (self.heap.integral(v), self.heap.offset_bits(v)) {
                    (Some(int), _) => fit_bits(int.value as u64, int.width, int.signed),
                    (None, Some(bits)) => bits,
                    _ => return type_error(format!("unit `{}` must be an integer or offset", head.name)),
                };
                let bits = match u64::try_from(bits) {
                    Ok(bits) if bits > 0 => bits,
                    _ => return type_error(format!("unit `{}` must be positive", head.name)),
                };
                let value = self.heap.uint(bits, 64);
                self.declare(head, Binding::Unit { bits, value });
                Ok(None)
            }
            Stmt::Assign { target, value, .. } => {
                self.assign(target, value)?;
                Ok(None)
            }
            Stmt::Expr { expr, .. } => self.eval_maybe_void(expr),
        }
    }

    fn declare(&mut self, head: &DeclHead, binding: Binding) {
        self.env.declare(Decl {
            name: head.name.clone(),
            source: head.source.clone(),
            loc: head.loc,
            binding,
        });
    }

    fn assign(&mut self, target: &LValue, value: &Expr) -> Eval<()> {
        match target {
            LValue::Map(map) => {
                let (ty, ios, offset) = self.map_target(map)?;
                let v = self.eval(value)?;
                let v = self.cast(v, &ty)?;
                self.mapper().write(v, ios, offset, map.strict)?;
                Ok(())
            }
            LValue::Path(var, path) => {
                let old = self
                    .env
                    .var(var)
                    .ok_or_else(|| CompileError::UndefinedVariable(var.clone()))?;
                let new = self.eval(value)?;
                let Some((last, parents)) = path.split_last() else {
                    let new = self.convert_like(new, old)?;
                    self.env.set_var(var, new);
                    return Ok(());
                };
                let mut s = old;
                for name in parents {
                    s = self.field_of(s, name)?;
                }
                let current = self.field_of(s, last)?;
                let new = self.convert_like(new, current)?;
                if !self.heap.set_field(s, last, new) {
                    return raise(ExceptionCode::Inval, format!("cannot store a struct inside itself at `.{}`", last));
                }
                self.write_through(s, last, new)
            }
        }
    }

    /// Convert `v` to the type of `like`, for assignments.
    fn convert_like(&mut self, v: Value, like: Value) -> Eval<Value> {
        if self.heap.kind(like) == Some(ValueKind::Type) {
            if self.heap.kind(v) == Some(ValueKind::Type) {
                return Ok(v);
            }
            return raise(ExceptionCode::Conv, format!("cannot assign {} to a type", self.describe(v)));
        }
        match self.heap.type_desc_of(like) {
            Some(ty) => self.cast(v, &ty),
            None => type_error("assignment to a dangling value"),
        }
    }

    /// Propagate a field update of a mapped struct to its IO space.
    fn write_through(&mut self, s: Value, field: &str, value: Value) -> Eval<()> {
        let Some(map) = self.heap.map_info_of(s) else {
            return Ok(());
        };
        let (true, Some(ios), Some(base)) = (map.mapped, map.ios, map.offset) else {
            return Ok(());
        };
        let fields = self.heap.struct_fields(s).unwrap_or_default();
        let mut at = base;
        for (_, v) in fields.iter().take_while(|(name, _)| name != field) {
            at = advance(at, self.heap.size_bits(*v))?;
        }
        self.mapper().write(value, ios, at, map.strict)?;
        Ok(())
    }

    fn field_of(&self, s: Value, name: &str) -> Eval<Value> {
        if self.heap.kind(s) != Some(ValueKind::Struct) {
            return type_error(format!("field access `.{}` on {}", name, self.describe(s)));
        }
        match self.heap.field(s, name) {
            Some(v) => Ok(v),
            None => raise(ExceptionCode::Elem, format!("no field `{}`", name)),
        }
    }

    // ==================== Types and units ====================

    pub(crate) fn resolve_type(&self, ty: &TypeExpr) -> Result<Type, CompileError> {
        Ok(match ty {
            TypeExpr::Int(size) => Type::Integral { size: *size, signed: true },
            TypeExpr::Uint(size) => Type::Integral { size: *size, signed: false },
            TypeExpr::String => Type::String,
            TypeExpr::Offset(base, unit) => {
                let base = self.resolve_type(base)?;
                if !base.is_integral() {
                    return Err(CompileError::Invalid(format!(
                        "offset magnitude must be integral, not {}",
                        base
                    )));
                }
                Type::Offset { base: Box::new(base), unit: self.resolve_unit(unit)? }
            }
            TypeExpr::Struct(fields) => Type::Struct {
                name: None,
                fields: fields
                    .iter()
                    .map(|f| Ok((f.name.clone(), self.resolve_type(&f.ty)?)))
                    .collect::<Result<Vec<_>, CompileError>>()?,
            },
            TypeExpr::Named(name) => self
                .env
                .type_of(name)
                .cloned()
                .ok_or_else(|| CompileError::UndefinedType(name.clone()))?,
        })
    }

    pub(crate) fn resolve_unit(&self, unit: &UnitRef) -> Result<u64, CompileError> {
        match unit {
            UnitRef::Bits(bits) => Ok(*bits),
            UnitRef::Named(name) => unit_bits(name)
                .or_else(|| self.env.unit_bits(name))
                .ok_or_else(|| CompileError::UndefinedUnit(name.clone())),
        }
    }

    // ==================== Expressions ====================

    /// Evaluate `expr`; calls to builtins returning nothing yield `None`.
    pub(crate) fn eval_maybe_void(&mut self, expr: &Expr) -> Eval<Option<Value>> {
        match expr {
            Expr::Call { name, args } => self.call(name, args),
            _ => self.eval(expr).map(Some),
        }
    }

    pub(crate) fn eval(&mut self, expr: &Expr) -> Eval<Value> {
        match expr {
            Expr::Int { value, width, signed } => {
                Ok(self.heap.integral_from_bits(*value, *width, *signed))
            }
            Expr::Str(bytes) => Ok(self.heap.make_string(bytes)),
            Expr::Offset { magnitude, unit } => {
                let magnitude = self.eval(magnitude)?;
                if self.heap.integral(magnitude).is_none() {
                    return type_error("offset magnitude must be integral");
                }
                let bits = self.resolve_unit(unit)?;
                let unit = self.heap.uint(bits, 64);
                Ok(self.heap.offset_unchecked(magnitude, unit))
            }
            Expr::Var(name) => self
                .env
                .var(name)
                .ok_or_else(|| CompileError::UndefinedVariable(name.clone()).into()),
            Expr::Field(base, name) => {
                let s = self.eval(base)?;
                self.field_of(s, name)
            }
            Expr::Unary(op, operand) => {
                let v = self.eval(operand)?;
                self.unary(*op, v)
            }
            Expr::Binary(op, lhs, rhs) => {
                let a = self.eval(lhs)?;
                let b = self.eval(rhs)?;
                self.binary(*op, a, b)
            }
            Expr::Cast(operand, ty) => {
                let v = self.eval(operand)?;
                let ty = self.resolve_type(ty)?;
                self.cast(v, &ty)
            }
            Expr::Map(map) => {
                let (ty, ios, offset) = self.map_target(map)?;
                Ok(self.mapper().read(&ty, ios, offset, map.strict)?)
            }
            Expr::StructCons { name, fields } => self.construct(name.as_deref(), fields),
            Expr::Call { name, args } => match self.call(name, args)? {
                Some(v) => Ok(v),
                None => type_error(format!("`{}` does not return a value", name)),
            },
        }
    }

    /// Type, IO space and bit offset designated by a map expression.
    fn map_target(&mut self, map: &MapExpr) -> Eval<(Type, IosId, u64)> {
        let ty = self.resolve_type(&map.ty)?;
        let ios = match &map.ios {
            Some(e) => {
                let v = self.eval(e)?;
                self.ios_arg(v)?
            }
            None => self.current_ios()?,
        };
        let offset = self.eval(&map.offset)?;
        let Some(bits) = self.heap.offset_bits(offset) else {
            return type_error(format!("map offset must be an offset, not {}", self.describe(offset)));
        };
        match u64::try_from(bits) {
            Ok(bits) => Ok((ty, ios, bits)),
            Err(_) => raise(ExceptionCode::OutOfBounds, format!("invalid map offset of {} bits", bits)),
        }
    }

    fn current_ios(&self) -> Eval<IosId> {
        match self.ios.current() {
            Some(id) => Ok(id),
            None => raise(ExceptionCode::NoIos, "no IO space is open"),
        }
    }

    fn ios_arg(&self, v: Value) -> Eval<IosId> {
        let Some(int) = self.heap.integral(v) else {
            return type_error(format!("expected an IO space id, got {}", self.describe(v)));
        };
        match u32::try_from(int.value).map(IosId::new) {
            Ok(id) if self.ios.is_open(id) => Ok(id),
            _ => raise(ExceptionCode::NoIos, format!("no IO space #{}", int.value)),
        }
    }

    fn unary(&mut self, op: UnaryOp, v: Value) -> Eval<Value> {
        if op == UnaryOp::Neg {
            if let (Some(magnitude), Some(unit)) = (self.heap.offset_magnitude(v), self.heap.offset_unit(v)) {
                let magnitude = self.unary(op, magnitude)?;
                return Ok(self.heap.offset_unchecked(magnitude, unit));
            }
        }
        let Some(int) = self.heap.integral(v) else {
            return type_error(format!("invalid operand to unary operator: {}", self.describe(v)));
        };
        Ok(match op {
            UnaryOp::Neg => self.heap.integral_from_bits(int.value.wrapping_neg() as u64, int.width, int.signed),
            UnaryOp::BitNot => self.heap.integral_from_bits(!(int.value as u64), int.width, int.signed),
            UnaryOp::Not => self.bool_value(int.value == 0),
        })
    }

    fn binary(&mut self, op: BinaryOp, a: Value, b: Value) -> Eval<Value> {
        use ValueKind::*;
        match (self.heap.kind(a), self.heap.kind(b)) {
            (Some(Int | Uint), Some(Int | Uint)) => self.int_binary(op, a, b),
            (Some(String), Some(String)) => self.string_binary(op, a, b),
            (Some(Offset), Some(Offset)) => self.offset_binary(op, a, b),
            (Some(Offset), Some(Int | Uint))
                if matches!(op, BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod) =>
            {
                self.offset_scale(op, a, b)
            }
            (Some(Int | Uint), Some(Offset)) if op == BinaryOp::Mul => self.offset_scale(op, b, a),
            (Some(x), Some(y)) if x == y && matches!(op, BinaryOp::Eq | BinaryOp::Ne) => {
                let equal = self.heap.equal(a, b);
                Ok(self.bool_value(equal == (op == BinaryOp::Eq)))
            }
            _ => type_error(format!(
                "invalid operands to `{}`: {} and {}",
                op.symbol(),
                self.describe(a),
                self.describe(b)
            )),
        }
    }

    fn int_binary(&mut self, op: BinaryOp, a: Value, b: Value) -> Eval<Value> {
        let (Some(ia), Some(ib)) = (self.heap.integral(a), self.heap.integral(b)) else {
            return type_error("expected integers");
        };
        let (x, y, width, signed) = promote(ia, ib);
        if op.is_comparison() {
            return Ok(self.bool_value(compare(op, x.cmp(&y))));
        }
        let r = arith(op, x, y)?;
        Ok(self.heap.integral_from_bits(r as u64, width, signed))
    }

    fn string_binary(&mut self, op: BinaryOp, a: Value, b: Value) -> Eval<Value> {
        let (Some(x), Some(y)) = (self.heap.string_bytes(a), self.heap.string_bytes(b)) else {
            return type_error("expected strings");
        };
        if op.is_comparison() {
            let result = compare(op, x.cmp(y));
            return Ok(self.bool_value(result));
        }
        if op != BinaryOp::Add {
            return type_error(format!("invalid operands to `{}`: string and string", op.symbol()));
        }
        let joined = [x, y].concat();
        Ok(self.heap.make_string(joined))
    }

    fn offset_parts(&self, v: Value) -> Eval<(Integral, u64)> {
        let magnitude = self.heap.offset_magnitude(v).and_then(|m| self.heap.integral(m));
        let unit = self.heap.offset_unit(v).and_then(|u| self.heap.uint_value(u));
        match (magnitude, unit) {
            (Some(m), Some(u)) => Ok((m, u)),
            _ => type_error("malformed offset"),
        }
    }

    fn offset_binary(&mut self, op: BinaryOp, a: Value, b: Value) -> Eval<Value> {
        let (ma, ua) = self.offset_parts(a)?;
        let (mb, ub) = self.offset_parts(b)?;
        let (x, y, width, signed) = promote(ma, mb);
        let (bits_a, bits_b) = (x.wrapping_mul(i128::from(ua)), y.wrapping_mul(i128::from(ub)));
        if op.is_comparison() {
            return Ok(self.bool_value(compare(op, bits_a.cmp(&bits_b))));
        }
        let g = gcd(ua, ub).max(1);
        let r = match op {
            BinaryOp::Add | BinaryOp::Sub => {
                let x = x.wrapping_mul(i128::from(ua / g));
                let y = y.wrapping_mul(i128::from(ub / g));
                arith(op, x, y)?
            }
            BinaryOp::Div => {
                let q = arith(op, bits_a, bits_b)?;
                return Ok(self.heap.integral_from_bits(q as u64, width, signed));
            }
            BinaryOp::Mod => arith(op, bits_a, bits_b)? / i128::from(g),
            _ => return type_error(format!("invalid operands to `{}`: offset and offset", op.symbol())),
        };
        let magnitude = self.heap.integral_from_bits(r as u64, width, signed);
        let unit = self.heap.uint(g, 64);
        Ok(self.heap.offset_unchecked(magnitude, unit))
    }

    /// `offset * n`, `offset / n`, `offset % n`: scale the magnitude, keep the unit.
    fn offset_scale(&mut self, op: BinaryOp, offset: Value, n: Value) -> Eval<Value> {
        let (magnitude, _) = self.offset_parts(offset)?;
        let Some(factor) = self.heap.integral(n) else {
            return type_error("expected an integer");
        };
        let (x, y, width, signed) = promote(magnitude, factor);
        let r = arith(op, x, y)?;
        let magnitude = self.heap.integral_from_bits(r as u64, width, signed);
        let unit = self.heap.offset_unit(offset).ok_or(Unwind::Error(CompileError::Type(
            "malformed offset".to_string(),
        )))?;
        Ok(self.heap.offset_unchecked(magnitude, unit))
    }

    /// Convert `v` to `ty`, raising `E_conv` when there is no conversion.
    pub(crate) fn cast(&mut self, v: Value, ty: &Type) -> Eval<Value> {
        match ty {
            Type::Integral { size, signed } => {
                if let Some(int) = self.heap.integral(v) {
                    return Ok(self.heap.integral_from_bits(int.value as u64, *size, *signed));
                }
            }
            Type::Offset { base, unit } => {
                if let (Type::Integral { size, signed }, Some(bits)) = (&**base, self.heap.offset_bits(v)) {
                    if *unit == 0 {
                        return raise(ExceptionCode::Conv, "offset unit must not be zero");
                    }
                    let m = bits / i128::from(*unit);
                    let magnitude = self.heap.integral_from_bits(m as u64, *size, *signed);
                    let unit = self.heap.uint(*unit, 64);
                    return Ok(self.heap.offset_unchecked(magnitude, unit));
                }
            }
            Type::String => {
                if self.heap.kind(v) == Some(ValueKind::String) {
                    return Ok(v);
                }
            }
            Type::Struct { .. } => {
                if self.heap.kind(v) == Some(ValueKind::Struct)
                    && self.heap.type_desc_of(v).as_ref() == Some(ty)
                {
                    return Ok(v);
                }
            }
        }
        raise(ExceptionCode::Conv, format!("cannot convert {} to {}", self.describe(v), ty))
    }

    /// Zero value of `ty`.
    fn default_value(&mut self, ty: &Type) -> Value {
        match ty {
            Type::Integral { size, signed } => self.heap.integral_from_bits(0, *size, *signed),
            Type::String => self.heap.make_string(""),
            Type::Offset { base, unit } => {
                let magnitude = self.default_value(base);
                let unit = self.heap.uint(*unit, 64);
                self.heap.offset_unchecked(magnitude, unit)
            }
            Type::Struct { name, fields } => {
                let values = fields
                    .iter()
                    .map(|(n, t)| (n.clone(), self.default_value(t)))
                    .collect();
                self.heap.struct_value(name.clone(), values, Default::default())
            }
        }
    }

    fn construct(&mut self, name: Option<&str>, inits: &[(String, Expr)]) -> Eval<Value> {
        let Some(name) = name else {
            let mut fields = Vec::with_capacity(inits.len());
            for (field, expr) in inits {
                fields.push((field.clone(), self.eval(expr)?));
            }
            return Ok(self.heap.struct_value(None, fields, Default::default()));
        };
        let decl = self
            .env
            .type_of(name)
            .cloned()
            .ok_or_else(|| CompileError::UndefinedType(name.to_string()))?;
        let Type::Struct { name: type_name, fields: decls } = decl else {
            return type_error(format!("`{}` is not a struct type", name));
        };
        if let Some((unknown, _)) = inits.iter().find(|(f, _)| !decls.iter().any(|(d, _)| d == f)) {
            return Err(CompileError::Invalid(format!("struct `{}` has no field `{}`", name, unknown)).into());
        }
        let mut fields = Vec::with_capacity(decls.len());
        for (field, ty) in &decls {
            let value = match inits.iter().find(|(f, _)| f == field) {
                Some((_, expr)) => {
                    let v = self.eval(expr)?;
                    self.cast(v, ty)?
                }
                None => self.default_value(ty),
            };
            fields.push((field.clone(), value));
        }
        Ok(self.heap.struct_value(type_name, fields, Default::default()))
    }

    // ==================== Builtins ====================

    fn call(&mut self, name: &str, args: &[Expr]) -> Eval<Option<Value>> {
        let (min, max) = match name {
            "open" => (1, 2),
            "close" | "set_ios" | "typeof" | "sizeof" => (1, 1),
            "iosize" => (0, 1),
            "flush" => (2, 2),
            "get_ios" => (0, 0),
            "print" => (1, usize::MAX),
            _ => return Err(CompileError::UnknownFunction(name.to_string()).into()),
        };
        if args.len() < min || args.len() > max {
            return type_error(format!("wrong number of arguments to `{}`", name));
        }
        let mut values = Vec::with_capacity(args.len());
        for arg in args {
            values.push(self.eval(arg)?);
        }
        match name {
            "open" => {
                let Some(handler) = self.heap.string(values[0]).map(str::to_string) else {
                    return type_error("`open` expects a string handler");
                };
                let flags = match values.get(1) {
                    Some(&v) => match self.heap.integral(v) {
                        Some(int) => IosFlags::from_bits_truncate(int.value as u64),
                        None => return type_error("`open` expects integer flags"),
                    },
                    None => self.config.default_flags,
                };
                let id = self.ios.open(&mut self.iods, &handler, flags, true)?;
                Ok(Some(self.heap.int(i64::from(id.get()), 32)))
            }
            "close" => {
                let id = self.ios_arg(values[0])?;
                self.ios.close(id)?;
                Ok(None)
            }
            "iosize" => {
                let id = match values.first() {
                    Some(&v) => self.ios_arg(v)?,
                    None => self.current_ios()?,
                };
                let size = self.ios.size(id)?;
                let magnitude = self.heap.uint(size, 64);
                let unit = self.heap.uint(8, 64);
                Ok(Some(self.heap.offset_unchecked(magnitude, unit)))
            }
            "flush" => {
                let id = self.ios_arg(values[0])?;
                let Some(bits) = self.heap.offset_bits(values[1]) else {
                    return type_error("`flush` expects an offset");
                };
                let bytes = u64::try_from(bits / 8).unwrap_or(0);
                self.ios.flush(id, bytes)?;
                Ok(None)
            }
            "get_ios" => {
                let id = self.current_ios()?;
                Ok(Some(self.heap.int(i64::from(id.get()), 32)))
            }
            "set_ios" => {
                let id = self.ios_arg(values[0])?;
                self.ios.set_current(id)?;
                Ok(None)
            }
            "typeof" => match self.heap.type_of(values[0]) {
                Some(t) => Ok(Some(t)),
                None => type_error("`typeof` of a dangling value"),
            },
            "sizeof" => {
                let bits = self.heap.size_bits(values[0]);
                let magnitude = self.heap.uint(bits, 64);
                let unit = self.heap.uint(1, 64);
                Ok(Some(self.heap.offset_unchecked(magnitude, unit)))
            }
            _ => {
                for v in values {
                    match self.heap.string_bytes(v) {
                        Some(bytes) => {
                            let text = String::from_utf8_lossy(bytes).into_owned();
                            self.term.puts(&text);
                        }
                        None => print::print_value(&mut self.term, &self.heap, v, self.config.obase),
                    }
                }
                self.term.flush();
                Ok(None)
            }
        }
    }
}
