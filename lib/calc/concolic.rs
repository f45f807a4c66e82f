use crate::calc::{Calculation, SymbolicCalculation};
use crate::expr::{BinaryOp, Concolic, Constant, OverflowPolicy, Sort, UnaryOp, Value};
use crate::{Error, Fault};

/// Computes the concrete shadow alongside the symbolic counterpart.
///
/// The shadow is always computed with the configured overflow policy, while
/// the symbolic side wraps. Strict overflow on the shadow path is fatal, as
/// the shadow would otherwise disagree with the recorded constraints.
#[derive(Clone, Copy, Debug, Default)]
pub struct ConcolicCalculation {
    symbolic: SymbolicCalculation,
}

impl ConcolicCalculation {
    pub fn new(policy: OverflowPolicy) -> ConcolicCalculation {
        ConcolicCalculation {
            symbolic: SymbolicCalculation::new(policy),
        }
    }
}

fn shadow_of(value: &Value) -> Result<Constant, Error> {
    value
        .shadow()
        .copied()
        .ok_or_else(|| Error::invariant(format!("{} has no concrete shadow", value)))
}

fn symbolic_part(value: &Value) -> Value {
    match value {
        Value::Concolic(concolic) => Value::symbolic(concolic.symbolic().clone()),
        value => value.clone(),
    }
}

fn checked(result: Result<Constant, Error>) -> Result<Constant, Error> {
    result.map_err(|e| match e {
        Error::Fault(Fault::Overflow) => {
            Error::invariant("strict overflow while computing a concolic shadow")
        }
        e => e,
    })
}

/// Pair a shadow with the symbolic result computed from the same operands.
fn combine(shadow: Constant, counterpart: Value) -> Result<Value, Error> {
    match counterpart {
        Value::Concrete(constant) => {
            if !constant.identical(&shadow) {
                return Err(Error::invariant(format!(
                    "concolic divergence: shadow {} but symbolic side {}",
                    shadow, constant
                )));
            }
            Ok(Value::Concrete(shadow))
        }
        Value::Symbolic(expression) => Ok(Value::Concolic(Concolic::new(expression, shadow)?)),
        Value::Concolic(_) => Err(Error::invariant(
            "symbolic calculation produced a concolic value",
        )),
    }
}

impl Calculation for ConcolicCalculation {
    fn binary(&self, op: BinaryOp, lhs: &Value, rhs: &Value) -> Result<Value, Error> {
        let shadow = checked(Constant::binary(
            op,
            &shadow_of(lhs)?,
            &shadow_of(rhs)?,
            self.symbolic.policy(),
        ))?;
        let counterpart = self
            .symbolic
            .binary(op, &symbolic_part(lhs), &symbolic_part(rhs))?;
        combine(shadow, counterpart)
    }

    fn unary(&self, op: UnaryOp, operand: &Value) -> Result<Value, Error> {
        let shadow = checked(Constant::unary(
            op,
            &shadow_of(operand)?,
            self.symbolic.policy(),
        ))?;
        let counterpart = self.symbolic.unary(op, &symbolic_part(operand))?;
        combine(shadow, counterpart)
    }

    fn cast(&self, sort: Sort, operand: &Value) -> Result<Value, Error> {
        let shadow = shadow_of(operand)?.cast(sort)?;
        let counterpart = self.symbolic.cast(sort, &symbolic_part(operand))?;
        combine(shadow, counterpart)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::{Expression, Variable};
    use proptest::prelude::*;

    fn x(shadow: i32) -> Value {
        Value::Concolic(
            Concolic::new(
                Expression::variable(Variable::new("int_0", Sort::Int)),
                Constant::Int(shadow),
            )
            .unwrap(),
        )
    }

    #[test]
    fn shadows_follow_concrete_semantics() {
        let calc = ConcolicCalculation::default();
        let sum = calc.binary(BinaryOp::Add, &x(i32::MAX), &Value::from(1)).unwrap();
        assert_eq!(sum.shadow(), Some(&Constant::Int(i32::MIN)));
        assert_eq!(sum.to_expression().to_string(), "(int_0 + 1)");

        let cmp = calc.binary(BinaryOp::Lt, &x(3), &Value::from(4)).unwrap();
        assert_eq!(cmp.shadow(), Some(&Constant::Bool(true)));
        assert!(!cmp.is_concrete());
    }

    #[test]
    fn collapsed_results_stay_concrete() {
        let calc = ConcolicCalculation::default();
        let product = calc.binary(BinaryOp::Mul, &x(9), &Value::from(0)).unwrap();
        assert_eq!(product, Value::from(0));
    }

    #[test]
    fn strict_overflow_is_fatal() {
        let calc = ConcolicCalculation::new(OverflowPolicy::Strict);
        assert!(matches!(
            calc.binary(BinaryOp::Add, &x(i32::MAX), &Value::from(1)),
            Err(Error::Invariant(_))
        ));
        assert!(matches!(
            calc.binary(BinaryOp::Div, &x(1), &Value::from(0)),
            Err(Error::Fault(Fault::DivisionByZero))
        ));
    }

    #[test]
    fn divergence_is_detected() {
        let calc = ConcolicCalculation::default();
        let liar = Value::Concolic(Concolic::new(Expression::int(1), Constant::Int(2)).unwrap());
        assert!(matches!(
            calc.binary(BinaryOp::Add, &liar, &Value::from(0)),
            Err(Error::Invariant(_))
        ));
    }

    #[test]
    fn symbolic_operands_have_no_shadow() {
        let calc = ConcolicCalculation::default();
        let y = Value::Symbolic(Expression::variable(Variable::new("int_1", Sort::Int)));
        assert!(calc.unary(UnaryOp::Neg, &y).is_err());
    }

    fn concolic(shadow: Constant) -> Value {
        Value::Concolic(
            Concolic::new(
                Expression::variable(Variable::new("v_0", shadow.sort())),
                shadow,
            )
            .unwrap(),
        )
    }

    fn constant_of(sort: Sort) -> BoxedStrategy<Constant> {
        match sort {
            Sort::Int => any::<i32>().prop_map(Constant::Int).boxed(),
            Sort::Long => any::<i64>().prop_map(Constant::Long).boxed(),
            Sort::Float => prop_oneof![
                any::<f32>(),
                Just(f32::NAN),
                Just(f32::INFINITY),
                Just(f32::NEG_INFINITY),
                Just(-0.0f32),
            ]
            .prop_map(Constant::Float)
            .boxed(),
            _ => prop_oneof![
                any::<f64>(),
                Just(f64::NAN),
                Just(f64::INFINITY),
                Just(f64::NEG_INFINITY),
                Just(-0.0f64),
            ]
            .prop_map(Constant::Double)
            .boxed(),
        }
    }

    fn arithmetic_sort() -> impl Strategy<Value = Sort> {
        prop::sample::select(vec![Sort::Int, Sort::Long, Sort::Float, Sort::Double])
    }

    fn operand() -> impl Strategy<Value = Constant> {
        arithmetic_sort().prop_flat_map(constant_of)
    }

    fn operands() -> impl Strategy<Value = (Constant, Constant)> {
        arithmetic_sort().prop_flat_map(|sort| (constant_of(sort), constant_of(sort)))
    }

    fn any_binary_op() -> impl Strategy<Value = BinaryOp> {
        prop::sample::select(vec![
            BinaryOp::Add,
            BinaryOp::Sub,
            BinaryOp::Mul,
            BinaryOp::Div,
            BinaryOp::Rem,
            BinaryOp::FloorDiv,
            BinaryOp::FloorMod,
            BinaryOp::And,
            BinaryOp::Or,
            BinaryOp::Xor,
            BinaryOp::Shl,
            BinaryOp::Shr,
            BinaryOp::Ushr,
            BinaryOp::Eq,
            BinaryOp::Ne,
            BinaryOp::Lt,
            BinaryOp::Le,
            BinaryOp::Gt,
            BinaryOp::Ge,
        ])
    }

    fn numeric_sort() -> impl Strategy<Value = Sort> {
        prop::sample::select(
            Sort::ALL
                .iter()
                .copied()
                .filter(|sort| *sort != Sort::Bool)
                .collect::<Vec<Sort>>(),
        )
    }

    /// The concrete result and the shadow must be the same value, NaN
    /// included, or both computations must reject the operands alike.
    fn agree(
        direct: Result<Value, Error>,
        shadowed: Result<Value, Error>,
    ) -> Result<(), TestCaseError> {
        match (direct, shadowed) {
            (Ok(direct), Ok(shadowed)) => {
                let same = match (direct.as_constant(), shadowed.shadow()) {
                    (Some(d), Some(s)) => d.identical(s),
                    _ => false,
                };
                prop_assert!(same, "{} but shadow {:?}", direct, shadowed.shadow());
            }
            (Err(Error::Fault(d)), Err(Error::Fault(s))) => prop_assert_eq!(d, s),
            (Err(Error::Sort(_)), Err(Error::Sort(_))) => {}
            (direct, shadowed) => {
                prop_assert!(false, "{:?} disagrees with {:?}", direct, shadowed);
            }
        }
        Ok(())
    }

    proptest! {
        #[test]
        fn shadow_matches_direct_computation((a, b) in operands(), op in any_binary_op()) {
            let direct = SymbolicCalculation::default().binary(
                op,
                &Value::Concrete(a),
                &Value::Concrete(b),
            );
            let shadowed = ConcolicCalculation::default().binary(op, &concolic(a), &Value::Concrete(b));
            agree(direct, shadowed)?;
        }

        #[test]
        fn shadow_matches_direct_negation(a in operand()) {
            let direct = SymbolicCalculation::default().unary(UnaryOp::Neg, &Value::Concrete(a));
            let shadowed = ConcolicCalculation::default().unary(UnaryOp::Neg, &concolic(a));
            agree(direct, shadowed)?;
        }

        #[test]
        fn shadow_matches_direct_cast(a in operand(), sort in numeric_sort()) {
            let direct = SymbolicCalculation::default().cast(sort, &Value::Concrete(a));
            let shadowed = ConcolicCalculation::default().cast(sort, &concolic(a));
            agree(direct, shadowed)?;
        }
    }
}
