//! Phase C: lazy fixed-point evaluation of constant expressions.
//!
//! A request for a field's value pushes a pending marker, evaluates the
//! initializer (which may recursively request other fields, including fields
//! of classpath classes), and caches the result. A self-reference observed
//! while pending yields "no constant value" for that field, matching source
//! semantics. Every failure mode is a quiet `None`: a field without a
//! constant simply has no `ConstantValue` attribute.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;

use gale_classfile::access::*;
use gale_classfile::PrimValue;
use gale_syntax::tree::{BinOp, Expr, Lit, PrimKind, TypeRef, UnOp};

use crate::binder::BindingEnv;
use crate::members::find_field;
use crate::model::{AnnoInfo, HeaderBoundClass, SourceBoundClass};
use crate::scope::{Hierarchy, Resolver};
use crate::sym::{ClassSymbol, FieldSymbol};
use crate::tli::TopLevelIndex;
use crate::ty::Ty;
use crate::value::Const;

#[derive(Debug, Clone)]
enum Cell {
    Pending,
    NoValue,
    Value(Const),
}

pub(crate) struct ConstEvaluator<'a> {
    pub env: BindingEnv<'a>,
    pub headers: &'a BTreeMap<ClassSymbol, Rc<HeaderBoundClass>>,
    pub tli: &'a TopLevelIndex,
    cache: RefCell<HashMap<FieldSymbol, Cell>>,
}

impl<'a> ConstEvaluator<'a> {
    pub fn new(
        env: BindingEnv<'a>,
        headers: &'a BTreeMap<ClassSymbol, Rc<HeaderBoundClass>>,
        tli: &'a TopLevelIndex,
    ) -> Self {
        Self {
            env,
            headers,
            tli,
            cache: RefCell::new(HashMap::new()),
        }
    }

    /// The constant value of a field, or `None` if it has none (not a
    /// constant variable, evaluation failed, or a cycle).
    pub fn field_value(&self, field: &FieldSymbol) -> Option<Const> {
        match self.cache.borrow().get(field) {
            Some(Cell::Value(value)) => return Some(value.clone()),
            Some(Cell::NoValue) | Some(Cell::Pending) => return None,
            None => {}
        }
        self.cache
            .borrow_mut()
            .insert(field.clone(), Cell::Pending);
        let value = self.compute_field(field);
        let cell = match &value {
            Some(v) => Cell::Value(v.clone()),
            None => Cell::NoValue,
        };
        self.cache.borrow_mut().insert(field.clone(), cell);
        value
    }

    fn compute_field(&self, field: &FieldSymbol) -> Option<Const> {
        if let Some(class) = self.env.source.get(&field.owner) {
            let info = class.fields.iter().find(|f| f.sym == *field)?;
            const CONSTANT_MASK: u16 = ACC_STATIC | ACC_FINAL;
            if info.access & CONSTANT_MASK != CONSTANT_MASK {
                return None;
            }
            let init = info.init.as_ref()?;
            let context = &self.headers.get(&field.owner)?.base;
            let value = self.eval(context, init)?;
            return coerce_assignment(value, &info.ty);
        }
        // Classpath constants arrive pre-typed from the ConstantValue
        // attribute.
        let bytecode = self.env.classpath.get(&field.owner)?;
        let fields = bytecode.fields();
        let info = fields.iter().find(|f| f.name == *field.name)?;
        if info.access & ACC_ENUM != 0 {
            return Some(Const::EnumConst(field.clone()));
        }
        info.constant.clone()
    }

    /// Evaluate an expression in the scope of `context`.
    pub fn eval(&self, context: &SourceBoundClass, expr: &Expr) -> Option<Const> {
        match expr {
            Expr::Literal { value, .. } => lit_to_const(value),
            Expr::Name { segments, .. } => self.eval_name(context, segments),
            Expr::ClassLit { ty, .. } => Some(Const::ClassLit(self.bind_class_lit(context, ty)?)),
            Expr::Unary { op, expr, .. } => unary(*op, self.eval(context, expr)?),
            Expr::Binary { op, lhs, rhs, .. } => {
                // `&&`/`||` short-circuit even in constant expressions.
                match op {
                    BinOp::And | BinOp::Or => {
                        let lhs = as_bool(self.eval(context, lhs)?)?;
                        match (op, lhs) {
                            (BinOp::And, false) => Some(Const::boolean(false)),
                            (BinOp::Or, true) => Some(Const::boolean(true)),
                            _ => {
                                let rhs = as_bool(self.eval(context, rhs)?)?;
                                Some(Const::boolean(rhs))
                            }
                        }
                    }
                    _ => binary(*op, self.eval(context, lhs)?, self.eval(context, rhs)?),
                }
            }
            Expr::Conditional {
                cond, then, els, ..
            } => {
                if as_bool(self.eval(context, cond)?)? {
                    self.eval(context, then)
                } else {
                    self.eval(context, els)
                }
            }
            Expr::Cast { ty, expr, .. } => cast(self.eval(context, expr)?, ty),
            Expr::ArrayInit { elements, .. } => {
                let values: Option<Vec<Const>> =
                    elements.iter().map(|e| self.eval(context, e)).collect();
                Some(Const::Array(values?))
            }
            Expr::Anno(anno) => Some(Const::Anno(self.eval_annotation(context, anno)?)),
        }
    }

    /// Fill in an [`AnnoInfo`]'s value map from its argument expressions.
    pub fn eval_anno_info(&self, context: &SourceBoundClass, info: &mut AnnoInfo) {
        let mut values = Vec::new();
        for (key, expr) in &info.args {
            let name = key.clone().unwrap_or_else(|| "value".to_string());
            if let Some(value) = self.eval(context, expr) {
                values.push((name, value));
            }
        }
        info.values = values;
    }

    fn eval_annotation(
        &self,
        context: &SourceBoundClass,
        anno: &gale_syntax::tree::AnnoExpr,
    ) -> Option<AnnoInfo> {
        let resolver = Resolver {
            hierarchy: self,
            tli: self.tli,
        };
        let mut info = AnnoInfo {
            sym: resolver.resolve(context, &anno.name, false),
            args: anno.args.clone(),
            values: Vec::new(),
        };
        self.eval_anno_info(context, &mut info);
        Some(info)
    }

    fn eval_name(&self, context: &SourceBoundClass, segments: &[String]) -> Option<Const> {
        // A simple name: a constant field of this class or its supertypes,
        // then static imports.
        if let [name] = segments {
            if let Some(value) = self.field_in_scope(context, name) {
                return Some(value);
            }
            return self.static_import_field(context, name);
        }

        // Qualified: the longest resolvable class prefix, then one field
        // segment. Anything dangling after the field is not a constant.
        let resolver = Resolver {
            hierarchy: self,
            tli: self.tli,
        };
        for split in (1..segments.len()).rev() {
            if let Some(class) = resolver.resolve(context, &segments[..split], false) {
                if split + 1 != segments.len() {
                    return None;
                }
                return self.field_of(&class, &segments[split]);
            }
        }
        None
    }

    fn field_in_scope(&self, context: &SourceBoundClass, name: &str) -> Option<Const> {
        // The class itself and its supertype closure, then enclosing classes.
        let mut current = Some(context.sym.clone());
        while let Some(sym) = current {
            if let Some(value) = self.field_of(&sym, name) {
                return Some(value);
            }
            current = sym.enclosing();
        }
        None
    }

    fn field_of(&self, class: &ClassSymbol, name: &str) -> Option<Const> {
        let member = find_field(&self.env, class, name)?;
        if member.is_enum_constant() {
            return Some(Const::EnumConst(FieldSymbol::new(
                member.owner.clone(),
                &member.name,
            )));
        }
        self.field_value(&FieldSymbol::new(member.owner, &member.name))
    }

    fn static_import_field(&self, context: &SourceBoundClass, name: &str) -> Option<Const> {
        let resolver = Resolver {
            hierarchy: self,
            tli: self.tli,
        };
        for import in &context.source.unit.imports {
            if !import.is_static {
                continue;
            }
            if import.wildcard {
                if let Some(class) = resolver.resolve_canonical(&import.name) {
                    if let Some(value) = self.field_of(&class, name) {
                        return Some(value);
                    }
                }
            } else if import.name.last().map(String::as_str) == Some(name) {
                let class_name = &import.name[..import.name.len() - 1];
                if let Some(class) = resolver.resolve_canonical(class_name) {
                    if let Some(value) = self.field_of(&class, name) {
                        return Some(value);
                    }
                }
            }
        }
        None
    }

    fn bind_class_lit(&self, context: &SourceBoundClass, ty: &TypeRef) -> Option<Ty> {
        match ty {
            TypeRef::Void => Some(Ty::Void),
            TypeRef::Prim { kind, .. } => Some(Ty::prim(*kind)),
            TypeRef::Array { elem, .. } => Some(Ty::Array {
                elem: Box::new(self.bind_class_lit(context, elem)?),
                annos: Vec::new(),
            }),
            TypeRef::Named(named) => {
                let resolver = Resolver {
                    hierarchy: self,
                    tli: self.tli,
                };
                let segments: Vec<String> =
                    named.segments.iter().map(|s| s.name.clone()).collect();
                resolver
                    .resolve(context, &segments, false)
                    .map(Ty::class)
            }
        }
    }
}

impl Hierarchy for ConstEvaluator<'_> {
    fn supers(&self, sym: &ClassSymbol) -> (Option<ClassSymbol>, Vec<ClassSymbol>) {
        match self.env.view(sym) {
            Some(view) => (view.superclass(), view.interfaces()),
            None => (None, Vec::new()),
        }
    }

    fn child(&self, sym: &ClassSymbol, simple_name: &str) -> Option<ClassSymbol> {
        self.env.view(sym)?.child(simple_name)
    }
}

fn lit_to_const(lit: &Lit) -> Option<Const> {
    Some(Const::Prim(match lit {
        Lit::Int(v) => PrimValue::Int(*v),
        Lit::Long(v) => PrimValue::Long(*v),
        Lit::Float(v) => PrimValue::Float(*v),
        Lit::Double(v) => PrimValue::Double(*v),
        Lit::Char(v) => PrimValue::Char(*v),
        Lit::String(v) => PrimValue::String(v.clone()),
        Lit::Bool(v) => PrimValue::Boolean(*v),
        Lit::Null => return None,
    }))
}

fn as_bool(value: Const) -> Option<bool> {
    match value.as_prim()? {
        PrimValue::Boolean(b) => Some(*b),
        _ => None,
    }
}

/// Binary numeric promotion: byte, short, and char promote to int, then the
/// wider of the operand types wins.
#[derive(Clone, Copy, PartialEq)]
enum Promoted {
    Int(i64),
    Long(i64),
    Float(f32),
    Double(f64),
}

fn promote(value: &PrimValue) -> Option<Promoted> {
    Some(match value {
        PrimValue::Byte(v) => Promoted::Int(*v as i64),
        PrimValue::Short(v) => Promoted::Int(*v as i64),
        PrimValue::Char(v) => Promoted::Int(*v as i64),
        PrimValue::Int(v) => Promoted::Int(*v as i64),
        PrimValue::Long(v) => Promoted::Long(*v),
        PrimValue::Float(v) => Promoted::Float(*v),
        PrimValue::Double(v) => Promoted::Double(*v),
        PrimValue::Boolean(_) | PrimValue::String(_) => return None,
    })
}

fn unary(op: UnOp, value: Const) -> Option<Const> {
    let prim = value.as_prim()?;
    match op {
        UnOp::Not => {
            return match prim {
                PrimValue::Boolean(b) => Some(Const::boolean(!b)),
                _ => None,
            }
        }
        UnOp::Plus => {
            return promote(prim).map(|p| Const::Prim(unpromote(p)));
        }
        _ => {}
    }
    let promoted = promote(prim)?;
    let result = match (op, promoted) {
        (UnOp::Neg, Promoted::Int(v)) => Promoted::Int((v as i32).wrapping_neg() as i64),
        (UnOp::Neg, Promoted::Long(v)) => Promoted::Long(v.wrapping_neg()),
        (UnOp::Neg, Promoted::Float(v)) => Promoted::Float(-v),
        (UnOp::Neg, Promoted::Double(v)) => Promoted::Double(-v),
        (UnOp::BitNot, Promoted::Int(v)) => Promoted::Int(!(v as i32) as i64),
        (UnOp::BitNot, Promoted::Long(v)) => Promoted::Long(!v),
        _ => return None,
    };
    Some(Const::Prim(unpromote(result)))
}

fn unpromote(value: Promoted) -> PrimValue {
    match value {
        Promoted::Int(v) => PrimValue::Int(v as i32),
        Promoted::Long(v) => PrimValue::Long(v),
        Promoted::Float(v) => PrimValue::Float(v),
        Promoted::Double(v) => PrimValue::Double(v),
    }
}

fn binary(op: BinOp, lhs: Const, rhs: Const) -> Option<Const> {
    let lhs = lhs.as_prim()?.clone();
    let rhs = rhs.as_prim()?.clone();

    // String concatenation.
    if op == BinOp::Add {
        if let (PrimValue::String(_), _) | (_, PrimValue::String(_)) = (&lhs, &rhs) {
            return Some(Const::string(format!(
                "{}{}",
                java_to_string(&lhs)?,
                java_to_string(&rhs)?
            )));
        }
    }

    // Boolean logic and (in)equality.
    if let (PrimValue::Boolean(a), PrimValue::Boolean(b)) = (&lhs, &rhs) {
        let result = match op {
            BinOp::BitAnd => a & b,
            BinOp::BitOr => a | b,
            BinOp::BitXor => a ^ b,
            BinOp::Eq => a == b,
            BinOp::Ne => a != b,
            _ => return None,
        };
        return Some(Const::boolean(result));
    }

    if let (PrimValue::String(a), PrimValue::String(b)) = (&lhs, &rhs) {
        // Constant string identity comparison folds on equal literals.
        return match op {
            BinOp::Eq => Some(Const::boolean(a == b)),
            BinOp::Ne => Some(Const::boolean(a != b)),
            _ => None,
        };
    }

    // Shifts promote each operand separately.
    if matches!(op, BinOp::Shl | BinOp::Shr | BinOp::UShr) {
        let distance = match promote(&rhs)? {
            Promoted::Int(v) => v,
            Promoted::Long(v) => v,
            _ => return None,
        };
        return Some(Const::Prim(match promote(&lhs)? {
            Promoted::Int(v) => {
                let v = v as i32;
                let d = (distance & 31) as u32;
                PrimValue::Int(match op {
                    BinOp::Shl => v.wrapping_shl(d),
                    BinOp::Shr => v.wrapping_shr(d),
                    BinOp::UShr => ((v as u32).wrapping_shr(d)) as i32,
                    _ => unreachable!(),
                })
            }
            Promoted::Long(v) => {
                let d = (distance & 63) as u32;
                PrimValue::Long(match op {
                    BinOp::Shl => v.wrapping_shl(d),
                    BinOp::Shr => v.wrapping_shr(d),
                    BinOp::UShr => ((v as u64).wrapping_shr(d)) as i64,
                    _ => unreachable!(),
                })
            }
            _ => return None,
        }));
    }

    let (a, b) = promote_pair(promote(&lhs)?, promote(&rhs)?);
    match (a, b) {
        (Promoted::Int(a), Promoted::Int(b)) => int_binary(op, a as i32, b as i32),
        (Promoted::Long(a), Promoted::Long(b)) => long_binary(op, a, b),
        (Promoted::Float(a), Promoted::Float(b)) => float_binary(op, a, b),
        (Promoted::Double(a), Promoted::Double(b)) => double_binary(op, a, b),
        _ => None,
    }
}

fn promote_pair(a: Promoted, b: Promoted) -> (Promoted, Promoted) {
    use Promoted::*;
    let widen = |v: Promoted, to: &Promoted| -> Promoted {
        match (v, to) {
            (Int(x), Long(_)) => Long(x),
            (Int(x), Float(_)) => Float(x as f32),
            (Int(x), Double(_)) => Double(x as f64),
            (Long(x), Float(_)) => Float(x as f32),
            (Long(x), Double(_)) => Double(x as f64),
            (Float(x), Double(_)) => Double(x as f64),
            (v, _) => v,
        }
    };
    let rank = |v: &Promoted| match v {
        Int(_) => 0,
        Long(_) => 1,
        Float(_) => 2,
        Double(_) => 3,
    };
    if rank(&a) >= rank(&b) {
        let b = widen(b, &a);
        (a, b)
    } else {
        let a = widen(a, &b);
        (a, b)
    }
}

fn int_binary(op: BinOp, a: i32, b: i32) -> Option<Const> {
    Some(match op {
        BinOp::Add => Const::int(a.wrapping_add(b)),
        BinOp::Sub => Const::int(a.wrapping_sub(b)),
        BinOp::Mul => Const::int(a.wrapping_mul(b)),
        BinOp::Div => {
            if b == 0 {
                return None;
            }
            Const::int(a.wrapping_div(b))
        }
        BinOp::Rem => {
            if b == 0 {
                return None;
            }
            Const::int(a.wrapping_rem(b))
        }
        BinOp::BitAnd => Const::int(a & b),
        BinOp::BitOr => Const::int(a | b),
        BinOp::BitXor => Const::int(a ^ b),
        BinOp::Lt => Const::boolean(a < b),
        BinOp::Gt => Const::boolean(a > b),
        BinOp::Le => Const::boolean(a <= b),
        BinOp::Ge => Const::boolean(a >= b),
        BinOp::Eq => Const::boolean(a == b),
        BinOp::Ne => Const::boolean(a != b),
        _ => return None,
    })
}

fn long_binary(op: BinOp, a: i64, b: i64) -> Option<Const> {
    Some(match op {
        BinOp::Add => Const::Prim(PrimValue::Long(a.wrapping_add(b))),
        BinOp::Sub => Const::Prim(PrimValue::Long(a.wrapping_sub(b))),
        BinOp::Mul => Const::Prim(PrimValue::Long(a.wrapping_mul(b))),
        BinOp::Div => {
            if b == 0 {
                return None;
            }
            Const::Prim(PrimValue::Long(a.wrapping_div(b)))
        }
        BinOp::Rem => {
            if b == 0 {
                return None;
            }
            Const::Prim(PrimValue::Long(a.wrapping_rem(b)))
        }
        BinOp::BitAnd => Const::Prim(PrimValue::Long(a & b)),
        BinOp::BitOr => Const::Prim(PrimValue::Long(a | b)),
        BinOp::BitXor => Const::Prim(PrimValue::Long(a ^ b)),
        BinOp::Lt => Const::boolean(a < b),
        BinOp::Gt => Const::boolean(a > b),
        BinOp::Le => Const::boolean(a <= b),
        BinOp::Ge => Const::boolean(a >= b),
        BinOp::Eq => Const::boolean(a == b),
        BinOp::Ne => Const::boolean(a != b),
        _ => return None,
    })
}

fn float_binary(op: BinOp, a: f32, b: f32) -> Option<Const> {
    Some(match op {
        BinOp::Add => Const::Prim(PrimValue::Float(a + b)),
        BinOp::Sub => Const::Prim(PrimValue::Float(a - b)),
        BinOp::Mul => Const::Prim(PrimValue::Float(a * b)),
        BinOp::Div => Const::Prim(PrimValue::Float(a / b)),
        BinOp::Rem => Const::Prim(PrimValue::Float(a % b)),
        BinOp::Lt => Const::boolean(a < b),
        BinOp::Gt => Const::boolean(a > b),
        BinOp::Le => Const::boolean(a <= b),
        BinOp::Ge => Const::boolean(a >= b),
        BinOp::Eq => Const::boolean(a == b),
        BinOp::Ne => Const::boolean(a != b),
        _ => return None,
    })
}

fn double_binary(op: BinOp, a: f64, b: f64) -> Option<Const> {
    Some(match op {
        BinOp::Add => Const::Prim(PrimValue::Double(a + b)),
        BinOp::Sub => Const::Prim(PrimValue::Double(a - b)),
        BinOp::Mul => Const::Prim(PrimValue::Double(a * b)),
        BinOp::Div => Const::Prim(PrimValue::Double(a / b)),
        BinOp::Rem => Const::Prim(PrimValue::Double(a % b)),
        BinOp::Lt => Const::boolean(a < b),
        BinOp::Gt => Const::boolean(a > b),
        BinOp::Le => Const::boolean(a <= b),
        BinOp::Ge => Const::boolean(a >= b),
        BinOp::Eq => Const::boolean(a == b),
        BinOp::Ne => Const::boolean(a != b),
        _ => return None,
    })
}

/// `String.valueOf` semantics for concatenation. Floating-point formatting
/// approximates `Double.toString` for the common cases.
fn java_to_string(value: &PrimValue) -> Option<String> {
    Some(match value {
        PrimValue::String(s) => s.clone(),
        PrimValue::Boolean(b) => b.to_string(),
        PrimValue::Byte(v) => v.to_string(),
        PrimValue::Short(v) => v.to_string(),
        PrimValue::Int(v) => v.to_string(),
        PrimValue::Long(v) => v.to_string(),
        PrimValue::Char(v) => char::from_u32(*v as u32)?.to_string(),
        PrimValue::Float(v) => java_fmt_float(*v as f64),
        PrimValue::Double(v) => java_fmt_float(*v),
    })
}

fn java_fmt_float(v: f64) -> String {
    if v.is_nan() {
        "NaN".to_string()
    } else if v.is_infinite() {
        if v > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
    } else if v == v.trunc() && v.abs() < 1e7 {
        format!("{v:.1}")
    } else {
        format!("{v}")
    }
}

/// Explicit cast conversion.
fn cast(value: Const, target: &TypeRef) -> Option<Const> {
    match target {
        TypeRef::Prim { kind, .. } => cast_prim(value, *kind),
        TypeRef::Named(named) => {
            // Only `(String)` casts keep constants constant.
            let is_string = matches!(
                named.segments.last().map(|s| s.name.as_str()),
                Some("String")
            );
            match (&value, is_string) {
                (Const::Prim(PrimValue::String(_)), true) => Some(value),
                _ => None,
            }
        }
        _ => None,
    }
}

fn cast_prim(value: Const, target: PrimKind) -> Option<Const> {
    let prim = value.as_prim()?;
    if target == PrimKind::Boolean {
        return match prim {
            PrimValue::Boolean(_) => Some(value),
            _ => None,
        };
    }
    // `as` casts share Java's conversion semantics, including saturating
    // float-to-int with NaN mapping to zero. Integral narrowing goes through
    // int first, like the JVM's i2b/i2s/i2c.
    let promoted = promote(prim)?;
    let as_int = |p: Promoted| -> i32 {
        match p {
            Promoted::Int(v) => v as i32,
            Promoted::Long(v) => v as i32,
            Promoted::Float(v) => v as i32,
            Promoted::Double(v) => v as i32,
        }
    };
    Some(Const::Prim(match target {
        PrimKind::Int => PrimValue::Int(as_int(promoted)),
        PrimKind::Byte => PrimValue::Byte(as_int(promoted) as i8),
        PrimKind::Short => PrimValue::Short(as_int(promoted) as i16),
        PrimKind::Char => PrimValue::Char(as_int(promoted) as u16),
        PrimKind::Long => PrimValue::Long(match promoted {
            Promoted::Int(v) => v,
            Promoted::Long(v) => v,
            Promoted::Float(v) => v as i64,
            Promoted::Double(v) => v as i64,
        }),
        PrimKind::Float => PrimValue::Float(match promoted {
            Promoted::Int(v) => v as f32,
            Promoted::Long(v) => v as f32,
            Promoted::Float(v) => v,
            Promoted::Double(v) => v as f32,
        }),
        PrimKind::Double => PrimValue::Double(match promoted {
            Promoted::Int(v) => v as f64,
            Promoted::Long(v) => v as f64,
            Promoted::Float(v) => v as f64,
            Promoted::Double(v) => v,
        }),
        PrimKind::Boolean => unreachable!(),
    }))
}

/// Assignment-context conversion to the declared field type: widening is
/// free, narrowing from int is allowed when the constant fits.
pub(crate) fn coerce_assignment(value: Const, declared: &Ty) -> Option<Const> {
    let Ty::Prim { kind, .. } = declared else {
        // Reference-typed constants: only String survives.
        return match (&value, declared) {
            (Const::Prim(PrimValue::String(_)), Ty::Class(class))
                if class.sym().binary_name() == "java/lang/String" =>
            {
                Some(value)
            }
            _ => None,
        };
    };

    let prim = value.as_prim()?;
    match (prim, kind) {
        (PrimValue::Boolean(_), PrimKind::Boolean) => return Some(value),
        (PrimValue::Boolean(_), _) | (_, PrimKind::Boolean) => return None,
        (PrimValue::String(_), _) => return None,
        (PrimValue::Byte(_), PrimKind::Byte)
        | (PrimValue::Short(_), PrimKind::Short)
        | (PrimValue::Char(_), PrimKind::Char)
        | (PrimValue::Int(_), PrimKind::Int)
        | (PrimValue::Long(_), PrimKind::Long)
        | (PrimValue::Float(_), PrimKind::Float)
        | (PrimValue::Double(_), PrimKind::Double) => return Some(value),
        _ => {}
    }
    let promoted = promote(prim)?;
    Some(Const::Prim(match (promoted, kind) {
        // Constant narrowing from the int family is allowed when the value
        // fits the declared type.
        (Promoted::Int(v), PrimKind::Byte) => PrimValue::Byte(i8::try_from(v).ok()?),
        (Promoted::Int(v), PrimKind::Short) => PrimValue::Short(i16::try_from(v).ok()?),
        (Promoted::Int(v), PrimKind::Char) => PrimValue::Char(u16::try_from(v).ok()?),
        (Promoted::Int(v), PrimKind::Int) => PrimValue::Int(v as i32),
        (Promoted::Int(v), PrimKind::Long) => PrimValue::Long(v),
        (Promoted::Int(v), PrimKind::Float) => PrimValue::Float(v as f32),
        (Promoted::Int(v), PrimKind::Double) => PrimValue::Double(v as f64),
        (Promoted::Long(v), PrimKind::Float) => PrimValue::Float(v as f32),
        (Promoted::Long(v), PrimKind::Double) => PrimValue::Double(v as f64),
        (Promoted::Float(v), PrimKind::Double) => PrimValue::Double(v as f64),
        // Any other narrowing needs an explicit cast.
        _ => return None,
    }))
}
