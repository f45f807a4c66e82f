use crate::calc::Calculation;
use crate::expr::{BinaryOp, Constant, Expression, OverflowPolicy, Sort, UnaryOp, Value};
use crate::Error;

/// Computes concretely when every operand is concrete, and builds an
/// expression otherwise.
#[derive(Clone, Copy, Debug, Default)]
pub struct SymbolicCalculation {
    policy: OverflowPolicy,
}

impl SymbolicCalculation {
    pub fn new(policy: OverflowPolicy) -> SymbolicCalculation {
        SymbolicCalculation { policy }
    }

    pub fn policy(&self) -> OverflowPolicy {
        self.policy
    }
}

fn is_bool(value: &Value, b: bool) -> bool {
    matches!(value, Value::Concrete(Constant::Bool(v)) if *v == b)
}

fn is_integral_zero(value: &Value) -> bool {
    matches!(
        value,
        Value::Concrete(Constant::Int(0)) | Value::Concrete(Constant::Long(0))
    )
}

/// Collapse operations whose result does not depend on the symbolic operand.
fn collapse(op: BinaryOp, lhs: &Value, rhs: &Value) -> Option<Value> {
    match op {
        BinaryOp::And if lhs.sort() == Sort::Bool => {
            if is_bool(lhs, false) || is_bool(rhs, false) {
                Some(Value::from(false))
            } else if is_bool(lhs, true) {
                Some(rhs.clone())
            } else if is_bool(rhs, true) {
                Some(lhs.clone())
            } else {
                None
            }
        }
        BinaryOp::Or if lhs.sort() == Sort::Bool => {
            if is_bool(lhs, true) || is_bool(rhs, true) {
                Some(Value::from(true))
            } else if is_bool(lhs, false) {
                Some(rhs.clone())
            } else if is_bool(rhs, false) {
                Some(lhs.clone())
            } else {
                None
            }
        }
        BinaryOp::Mul => {
            if is_integral_zero(lhs) {
                Some(lhs.clone())
            } else if is_integral_zero(rhs) {
                Some(rhs.clone())
            } else {
                None
            }
        }
        _ => None,
    }
}

impl Calculation for SymbolicCalculation {
    fn binary(&self, op: BinaryOp, lhs: &Value, rhs: &Value) -> Result<Value, Error> {
        if let (Some(a), Some(b)) = (lhs.as_constant(), rhs.as_constant()) {
            return Ok(Value::Concrete(Constant::binary(op, a, b, self.policy)?));
        }
        op.result_sort(lhs.sort(), rhs.sort())?;
        if let Some(value) = collapse(op, lhs, rhs) {
            return Ok(value);
        }
        Ok(Value::symbolic(Expression::binary(
            op,
            lhs.to_expression(),
            rhs.to_expression(),
        )?))
    }

    fn unary(&self, op: UnaryOp, operand: &Value) -> Result<Value, Error> {
        match operand.as_constant() {
            Some(constant) => Ok(Value::Concrete(Constant::unary(op, constant, self.policy)?)),
            None => Ok(Value::symbolic(Expression::unary(
                op,
                operand.to_expression(),
            )?)),
        }
    }

    fn cast(&self, sort: Sort, operand: &Value) -> Result<Value, Error> {
        match operand.as_constant() {
            Some(constant) => Ok(Value::Concrete(constant.cast(sort)?)),
            None => Ok(Value::symbolic(Expression::cast(
                sort,
                operand.to_expression(),
            )?)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::Variable;
    use crate::Fault;

    fn x() -> Value {
        Value::Symbolic(Expression::variable(Variable::new("int_0", Sort::Int)))
    }

    fn b() -> Value {
        Value::Symbolic(Expression::variable(Variable::new("bool_0", Sort::Bool)))
    }

    #[test]
    fn concrete_operands_compute() {
        let calc = SymbolicCalculation::new(OverflowPolicy::Wrapping);
        assert_eq!(
            calc.binary(BinaryOp::Mul, &Value::from(6), &Value::from(7))
                .unwrap(),
            Value::from(42)
        );
        assert!(matches!(
            calc.binary(BinaryOp::Rem, &Value::from(6), &Value::from(0)),
            Err(Error::Fault(Fault::DivisionByZero))
        ));
        assert_eq!(
            calc.cast(Sort::Long, &Value::from(-1)).unwrap(),
            Value::from(-1i64)
        );
    }

    #[test]
    fn symbolic_operands_build_expressions() {
        let calc = SymbolicCalculation::default();
        let sum = calc.binary(BinaryOp::Add, &x(), &Value::from(1)).unwrap();
        assert_eq!(sum.to_string(), "(int_0 + 1)");
        assert!(calc.binary(BinaryOp::Add, &x(), &Value::from(1i64)).is_err());
        assert_eq!(calc.cast(Sort::Int, &x()).unwrap(), x());
    }

    #[test]
    fn collapses() {
        let calc = SymbolicCalculation::default();
        assert_eq!(
            calc.binary(BinaryOp::And, &b(), &Value::from(false))
                .unwrap(),
            Value::from(false)
        );
        assert_eq!(
            calc.binary(BinaryOp::Or, &Value::from(true), &b()).unwrap(),
            Value::from(true)
        );
        assert_eq!(
            calc.binary(BinaryOp::And, &Value::from(true), &b()).unwrap(),
            b()
        );
        assert_eq!(
            calc.binary(BinaryOp::Mul, &x(), &Value::from(0)).unwrap(),
            Value::from(0)
        );
        // x * 0.0 is not zero when x is NaN or infinite
        let d = Value::Symbolic(Expression::variable(Variable::new("double_0", Sort::Double)));
        assert!(!calc
            .binary(BinaryOp::Mul, &d, &Value::from(0.0))
            .unwrap()
            .is_concrete());
    }
}
