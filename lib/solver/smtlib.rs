//! Rendering expressions as SMT-LIB2, and reading back values.
//!
//! Integral sorts map to bit-vectors of their width, floating sorts to
//! IEEE-754 floating point, and arrays to `(Array (_ BitVec 32) S)`.

use crate::expr::{ArrayTerm, BinaryOp, Constant, Expression, Sort, Symbols, UnaryOp};
use crate::Error;

pub fn sort_to_smtlib2(sort: Sort) -> String {
    match sort {
        Sort::Bool => "Bool".to_string(),
        Sort::Float => "(_ FloatingPoint 8 24)".to_string(),
        Sort::Double => "(_ FloatingPoint 11 53)".to_string(),
        _ => format!("(_ BitVec {})", sort.bits()),
    }
}

fn array_sort_to_smtlib2(element: Sort) -> String {
    format!("(Array (_ BitVec 32) {})", sort_to_smtlib2(element))
}

// exponent and significand widths
fn fp_widths(sort: Sort) -> (usize, usize) {
    match sort {
        Sort::Float => (8, 24),
        _ => (11, 53),
    }
}

pub fn constant_to_smtlib2(constant: &Constant) -> String {
    match *constant {
        Constant::Int(v) => format!("#x{:08x}", v as u32),
        Constant::Long(v) => format!("#x{:016x}", v as u64),
        Constant::Short(v) => format!("#x{:04x}", v as u16),
        Constant::Byte(v) => format!("#x{:02x}", v as u8),
        Constant::Char(v) => format!("#x{:04x}", v),
        Constant::Bool(v) => format!("{}", v),
        Constant::Float(v) => {
            let bits = v.to_bits();
            format!(
                "(fp #b{} #b{:08b} #b{:023b})",
                bits >> 31,
                (bits >> 23) & 0xff,
                bits & 0x7f_ffff
            )
        }
        Constant::Double(v) => {
            let bits = v.to_bits();
            format!(
                "(fp #b{} #b{:011b} #b{:052b})",
                bits >> 63,
                (bits >> 52) & 0x7ff,
                bits & 0xf_ffff_ffff_ffff
            )
        }
    }
}

/// `(declare-const ..)` commands for every symbol in `symbols`.
pub fn declarations(symbols: &Symbols) -> Vec<(String, String)> {
    let mut declarations = Vec::new();
    for variable in &symbols.variables {
        declarations.push((
            variable.name().to_string(),
            format!(
                "(declare-const {} {})",
                variable.name(),
                sort_to_smtlib2(variable.sort())
            ),
        ));
    }
    for (name, element) in &symbols.arrays {
        declarations.push((
            name.clone(),
            format!("(declare-const {} {})", name, array_sort_to_smtlib2(*element)),
        ));
    }
    declarations
}

fn resize(expression: &str, from: Sort, to_bits: usize) -> String {
    let from_bits = from.bits();
    if from_bits == to_bits {
        expression.to_string()
    } else if from_bits > to_bits {
        format!("((_ extract {} 0) {})", to_bits - 1, expression)
    } else if from == Sort::Char {
        format!("((_ zero_extend {}) {})", to_bits - from_bits, expression)
    } else {
        format!("((_ sign_extend {}) {})", to_bits - from_bits, expression)
    }
}

fn floor_div(lhs: &str, rhs: &str, sort: Sort) -> String {
    let zero = constant_to_smtlib2(&sort.default_value());
    let one = resize("#x01", Sort::Byte, sort.bits());
    format!(
        "(let ((q (bvsdiv {lhs} {rhs}))) \
         (ite (and (bvslt (bvxor {lhs} {rhs}) {zero}) (not (= (bvmul q {rhs}) {lhs}))) \
         (bvsub q {one}) q))",
        lhs = lhs,
        rhs = rhs,
        zero = zero,
        one = one
    )
}

/// Saturating conversion of a floating value to a signed bit-vector of
/// `bits` bits. NaN converts to zero.
fn fp_to_sbv(operand: &str, from: Sort, bits: usize) -> Result<String, Error> {
    let bound = 2f64.powi(bits as i32 - 1);
    let min = constant_to_smtlib2(&Constant::Double(-bound).cast(from)?);
    let max = constant_to_smtlib2(&Constant::Double(bound).cast(from)?);
    let (min_value, max_value) = if bits == 64 {
        (
            constant_to_smtlib2(&Constant::Long(i64::MIN)),
            constant_to_smtlib2(&Constant::Long(i64::MAX)),
        )
    } else {
        (
            constant_to_smtlib2(&Constant::Int(i32::MIN)),
            constant_to_smtlib2(&Constant::Int(i32::MAX)),
        )
    };
    let zero = format!("(_ bv0 {})", bits);
    Ok(format!(
        "(ite (fp.isNaN {e}) {zero} (ite (fp.leq {e} {min}) {min_value} \
         (ite (fp.geq {e} {max}) {max_value} ((_ fp.to_sbv {bits}) RTZ {e}))))",
        e = operand,
        zero = zero,
        min = min,
        min_value = min_value,
        max = max,
        max_value = max_value,
        bits = bits
    ))
}

fn cast_to_smtlib2(to: Sort, operand: &Expression) -> Result<String, Error> {
    let from = operand.sort();
    let e = expr_to_smtlib2(operand)?;
    if from == to {
        return Ok(e);
    }
    Ok(match (from.is_floating(), to.is_floating()) {
        (false, false) => resize(&e, from, to.bits()),
        (false, true) => {
            let (eb, sb) = fp_widths(to);
            if from == Sort::Char {
                format!("((_ to_fp_unsigned {} {}) RNE {})", eb, sb, e)
            } else {
                format!("((_ to_fp {} {}) RNE {})", eb, sb, e)
            }
        }
        (true, true) => {
            let (eb, sb) = fp_widths(to);
            format!("((_ to_fp {} {}) RNE {})", eb, sb, e)
        }
        (true, false) => {
            // narrower targets convert through int
            if to == Sort::Long {
                fp_to_sbv(&e, from, 64)?
            } else {
                resize(&fp_to_sbv(&e, from, 32)?, Sort::Int, to.bits())
            }
        }
    })
}

fn binary_to_smtlib2(op: BinaryOp, lhs: &Expression, rhs: &Expression) -> Result<String, Error> {
    let sort = lhs.sort();
    let a = expr_to_smtlib2(lhs)?;
    let b = expr_to_smtlib2(rhs)?;

    if sort == Sort::Bool {
        return Ok(match op {
            BinaryOp::And => format!("(and {} {})", a, b),
            BinaryOp::Or => format!("(or {} {})", a, b),
            BinaryOp::Xor => format!("(xor {} {})", a, b),
            BinaryOp::Eq => format!("(= {} {})", a, b),
            BinaryOp::Ne => format!("(not (= {} {}))", a, b),
            _ => return Err(Error::Sort(format!("{} over bool", op))),
        });
    }

    if sort.is_floating() {
        let function = match op {
            BinaryOp::Add => "fp.add RNE",
            BinaryOp::Sub => "fp.sub RNE",
            BinaryOp::Mul => "fp.mul RNE",
            BinaryOp::Div => "fp.div RNE",
            // fp.rem rounds the quotient to nearest. Truncated remainder
            // takes the sign of the dividend, so a nonzero remainder of the
            // other sign is moved by |b|, which is exact.
            BinaryOp::Rem => {
                return Ok(format!(
                    "(let ((?rem (fp.rem {a} {b}))) \
                     (ite (and (not (fp.isZero ?rem)) \
                     (xor (fp.isNegative ?rem) (fp.isNegative {a}))) \
                     (ite (fp.isNegative {a}) \
                     (fp.sub RNE ?rem (fp.abs {b})) \
                     (fp.add RNE ?rem (fp.abs {b}))) \
                     ?rem))",
                    a = a,
                    b = b
                ))
            }
            BinaryOp::Eq => "fp.eq",
            BinaryOp::Ne => return Ok(format!("(not (fp.eq {} {}))", a, b)),
            BinaryOp::Lt => "fp.lt",
            BinaryOp::Le => "fp.leq",
            BinaryOp::Gt => "fp.gt",
            BinaryOp::Ge => "fp.geq",
            _ => return Err(Error::Sort(format!("{} over {}", op, sort))),
        };
        return Ok(format!("({} {} {})", function, a, b));
    }

    let unsigned = sort == Sort::Char;
    let function = match op {
        BinaryOp::Add => "bvadd",
        BinaryOp::Sub => "bvsub",
        BinaryOp::Mul => "bvmul",
        BinaryOp::Div => "bvsdiv",
        BinaryOp::Rem => "bvsrem",
        BinaryOp::FloorMod => "bvsmod",
        BinaryOp::FloorDiv => return Ok(floor_div(&a, &b, sort)),
        BinaryOp::And => "bvand",
        BinaryOp::Or => "bvor",
        BinaryOp::Xor => "bvxor",
        BinaryOp::Shl | BinaryOp::Shr | BinaryOp::Ushr => {
            let function = match op {
                BinaryOp::Shl => "bvshl",
                BinaryOp::Shr => "bvashr",
                _ => "bvlshr",
            };
            let mask = if sort.bits() == 64 {
                constant_to_smtlib2(&Constant::Long(63))
            } else {
                constant_to_smtlib2(&Constant::Int(31))
            };
            let distance = resize(&b, rhs.sort(), sort.bits());
            return Ok(format!("({} {} (bvand {} {}))", function, a, distance, mask));
        }
        BinaryOp::Eq => "=",
        BinaryOp::Ne => return Ok(format!("(not (= {} {}))", a, b)),
        BinaryOp::Lt if unsigned => "bvult",
        BinaryOp::Le if unsigned => "bvule",
        BinaryOp::Gt if unsigned => "bvugt",
        BinaryOp::Ge if unsigned => "bvuge",
        BinaryOp::Lt => "bvslt",
        BinaryOp::Le => "bvsle",
        BinaryOp::Gt => "bvsgt",
        BinaryOp::Ge => "bvsge",
    };
    Ok(format!("({} {} {})", function, a, b))
}

pub fn array_to_smtlib2(array: &ArrayTerm) -> Result<String, Error> {
    Ok(match array {
        ArrayTerm::Variable { name, .. } => name.clone(),
        ArrayTerm::Constant { element } => format!(
            "((as const {}) {})",
            array_sort_to_smtlib2(element.sort()),
            constant_to_smtlib2(element)
        ),
        ArrayTerm::Store { base, index, value } => format!(
            "(store {} {} {})",
            array_to_smtlib2(base)?,
            expr_to_smtlib2(index)?,
            expr_to_smtlib2(value)?
        ),
    })
}

pub fn expr_to_smtlib2(expression: &Expression) -> Result<String, Error> {
    Ok(match expression {
        Expression::Constant(constant) => constant_to_smtlib2(constant),
        Expression::Variable(variable) => variable.name().to_string(),
        Expression::Binary(op, lhs, rhs) => binary_to_smtlib2(*op, lhs, rhs)?,
        Expression::Unary(UnaryOp::Not, operand) => format!("(not {})", expr_to_smtlib2(operand)?),
        Expression::Unary(UnaryOp::Neg, operand) => {
            if operand.sort().is_floating() {
                format!("(fp.neg {})", expr_to_smtlib2(operand)?)
            } else {
                format!("(bvneg {})", expr_to_smtlib2(operand)?)
            }
        }
        Expression::Cast(sort, operand) => cast_to_smtlib2(*sort, operand)?,
        Expression::Ite(condition, then, otherwise) => format!(
            "(ite {} {} {})",
            expr_to_smtlib2(condition)?,
            expr_to_smtlib2(then)?,
            expr_to_smtlib2(otherwise)?
        ),
        Expression::Select(array, index) => format!(
            "(select {} {})",
            array_to_smtlib2(array)?,
            expr_to_smtlib2(index)?
        ),
    })
}

/// A parsed s-expression.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum SExpr {
    Atom(String),
    List(Vec<SExpr>),
}

impl SExpr {
    pub fn parse(text: &str) -> Result<SExpr, Error> {
        let mut tokens = Vec::new();
        let mut atom = String::new();
        for c in text.chars() {
            match c {
                '(' | ')' => {
                    if !atom.is_empty() {
                        tokens.push(std::mem::take(&mut atom));
                    }
                    tokens.push(c.to_string());
                }
                c if c.is_whitespace() => {
                    if !atom.is_empty() {
                        tokens.push(std::mem::take(&mut atom));
                    }
                }
                c => atom.push(c),
            }
        }
        if !atom.is_empty() {
            tokens.push(atom);
        }

        let mut stack: Vec<Vec<SExpr>> = vec![Vec::new()];
        for token in tokens {
            match token.as_str() {
                "(" => stack.push(Vec::new()),
                ")" => {
                    let list = stack
                        .pop()
                        .ok_or_else(|| Error::Solver(format!("unbalanced response: {}", text)))?;
                    stack
                        .last_mut()
                        .ok_or_else(|| Error::Solver(format!("unbalanced response: {}", text)))?
                        .push(SExpr::List(list));
                }
                _ => stack
                    .last_mut()
                    .ok_or_else(|| Error::Solver(format!("unbalanced response: {}", text)))?
                    .push(SExpr::Atom(token)),
            }
        }

        match stack.pop() {
            Some(mut top) if stack.is_empty() && top.len() == 1 => Ok(top.remove(0)),
            _ => Err(Error::Solver(format!("malformed response: {}", text))),
        }
    }
}

fn parse_bits(atom: &SExpr) -> Result<u64, Error> {
    let text = match atom {
        SExpr::Atom(text) => text,
        SExpr::List(_) => {
            return Err(Error::Solver(format!(
                "expected a bit-vector literal, found {:?}",
                atom
            )))
        }
    };
    let parsed = if let Some(hex) = text.strip_prefix("#x") {
        u64::from_str_radix(hex, 16)
    } else if let Some(binary) = text.strip_prefix("#b") {
        u64::from_str_radix(binary, 2)
    } else {
        return Err(Error::Solver(format!("not a bit-vector literal: {}", text)));
    };
    parsed.map_err(|e| Error::Solver(format!("bad literal {}: {}", text, e)))
}

fn parse_floating(sort: Sort, value: &SExpr) -> Result<Constant, Error> {
    let (eb, sb) = fp_widths(sort);
    let mb = sb - 1;
    let bits = match value {
        SExpr::List(items) if items.len() == 4 && items[0] == SExpr::Atom("fp".into()) => {
            let sign = parse_bits(&items[1])?;
            let exponent = parse_bits(&items[2])?;
            let mantissa = parse_bits(&items[3])?;
            (sign << (eb + mb)) | (exponent << mb) | mantissa
        }
        SExpr::List(items) if items.len() == 4 && items[0] == SExpr::Atom("_".into()) => {
            let special = match &items[1] {
                SExpr::Atom(special) => special.as_str(),
                SExpr::List(_) => "",
            };
            let exponent_ones = ((1u64 << eb) - 1) << mb;
            match special {
                "+zero" => 0,
                "-zero" => 1 << (eb + mb),
                "+oo" => exponent_ones,
                "-oo" => (1 << (eb + mb)) | exponent_ones,
                "NaN" => exponent_ones | (1 << (mb - 1)),
                _ => {
                    return Err(Error::Solver(format!(
                        "unknown floating point value {:?}",
                        value
                    )))
                }
            }
        }
        _ => {
            return Err(Error::Solver(format!(
                "expected a floating point value, found {:?}",
                value
            )))
        }
    };
    Ok(match sort {
        Sort::Float => Constant::Float(f32::from_bits(bits as u32)),
        _ => Constant::Double(f64::from_bits(bits)),
    })
}

/// Interpret a value returned by `get-value` as a constant of `sort`.
pub fn parse_value(sort: Sort, value: &SExpr) -> Result<Constant, Error> {
    match sort {
        Sort::Bool => match value {
            SExpr::Atom(atom) if atom == "true" => Ok(Constant::Bool(true)),
            SExpr::Atom(atom) if atom == "false" => Ok(Constant::Bool(false)),
            _ => Err(Error::Solver(format!("expected a bool, found {:?}", value))),
        },
        Sort::Float | Sort::Double => parse_floating(sort, value),
        Sort::Int => Ok(Constant::Int(parse_bits(value)? as u32 as i32)),
        Sort::Long => Ok(Constant::Long(parse_bits(value)? as i64)),
        Sort::Short => Ok(Constant::Short(parse_bits(value)? as u16 as i16)),
        Sort::Byte => Ok(Constant::Byte(parse_bits(value)? as u8 as i8)),
        Sort::Char => Ok(Constant::Char(parse_bits(value)? as u16)),
    }
}

/// Extract the value from a `((expression value))` response.
pub fn parse_get_value(sort: Sort, response: &str) -> Result<Constant, Error> {
    match SExpr::parse(response)? {
        SExpr::List(pairs) => match pairs.first() {
            Some(SExpr::List(pair)) if pair.len() == 2 => parse_value(sort, &pair[1]),
            _ => Err(Error::Solver(format!("malformed get-value response: {}", response))),
        },
        SExpr::Atom(_) => Err(Error::Solver(format!(
            "malformed get-value response: {}",
            response
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::Variable;

    fn x() -> Expression {
        Expression::variable(Variable::new("int_0", Sort::Int))
    }

    #[test]
    fn render_constants() {
        assert_eq!(constant_to_smtlib2(&Constant::Int(-1)), "#xffffffff");
        assert_eq!(constant_to_smtlib2(&Constant::Byte(16)), "#x10");
        assert_eq!(
            constant_to_smtlib2(&Constant::Float(1.0)),
            "(fp #b0 #b01111111 #b00000000000000000000000)"
        );
    }

    #[test]
    fn render_expressions() {
        let lt = Expression::lt(x(), Expression::int(0)).unwrap();
        assert_eq!(expr_to_smtlib2(&lt).unwrap(), "(bvslt int_0 #x00000000)");

        let c = Expression::variable(Variable::new("char_0", Sort::Char));
        let lt = Expression::lt(c.clone(), c).unwrap();
        assert_eq!(expr_to_smtlib2(&lt).unwrap(), "(bvult char_0 char_0)");

        let widened = Expression::cast(Sort::Long, x()).unwrap();
        assert_eq!(
            expr_to_smtlib2(&widened).unwrap(),
            "((_ sign_extend 32) int_0)"
        );

        let shifted = Expression::binary(
            BinaryOp::Shl,
            x(),
            Expression::constant(Constant::Long(33)),
        )
        .unwrap();
        assert_eq!(
            expr_to_smtlib2(&shifted).unwrap(),
            "(bvshl int_0 (bvand ((_ extract 31 0) #x0000000000000021) #x0000001f))"
        );
    }

    #[test]
    fn floating_remainder_is_truncated() {
        let d = |name: &str| Expression::variable(Variable::new(name, Sort::Double));
        let rem = Expression::binary(BinaryOp::Rem, d("d_0"), d("d_1")).unwrap();
        assert_eq!(
            expr_to_smtlib2(&rem).unwrap(),
            "(let ((?rem (fp.rem d_0 d_1))) \
             (ite (and (not (fp.isZero ?rem)) (xor (fp.isNegative ?rem) (fp.isNegative d_0))) \
             (ite (fp.isNegative d_0) (fp.sub RNE ?rem (fp.abs d_1)) (fp.add RNE ?rem (fp.abs d_1))) \
             ?rem))"
        );
    }

    #[test]
    fn parse_values() {
        assert_eq!(
            parse_get_value(Sort::Int, "((int_0 #xfffffffe))").unwrap(),
            Constant::Int(-2)
        );
        assert_eq!(
            parse_get_value(Sort::Bool, "(((bvslt int_0 #x00000000) true))").unwrap(),
            Constant::Bool(true)
        );
        assert_eq!(
            parse_get_value(Sort::Float, "((f (fp #b0 #b01111111 #b00000000000000000000000)))")
                .unwrap(),
            Constant::Float(1.0)
        );
        assert!(parse_get_value(Sort::Double, "((d (_ NaN 11 53)))")
            .unwrap()
            .as_f64()
            .unwrap()
            .is_nan());
        assert!(parse_get_value(Sort::Int, "((int_0 #xff)").is_err());
    }
}
