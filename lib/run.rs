//! The handle a search region uses to talk to the engine.
//!
//! A `Run` lives for one execution of the region. It creates fresh values,
//! performs arithmetic on them, and answers the region's decisions. Array
//! operations are implemented in `calc::array`.

use crate::config::{Config, Mode};
use crate::context::ExecutionContext;
use crate::executor::Executor;
use crate::expr::{BinaryOp, Concolic, Expression, Sort, UnaryOp, Value, Variable};
use crate::outcome::BudgetKind;
use crate::region::{Output, Signal};
use crate::tree::{Alternative, CoverageEdge};
use crate::{Error, Fault};

pub struct Run<'a> {
    pub(crate) executor: &'a mut Executor,
    pub(crate) context: ExecutionContext,
}

impl<'a> Run<'a> {
    pub(crate) fn new(executor: &'a mut Executor, context: ExecutionContext) -> Run<'a> {
        Run { executor, context }
    }

    pub(crate) fn into_context(self) -> ExecutionContext {
        self.context
    }

    pub fn config(&self) -> &Config {
        self.executor.shared().config()
    }

    pub fn mode(&self) -> Mode {
        self.config().mode()
    }

    /// True once the recorded part of this path has been replayed.
    pub fn is_live(&self) -> bool {
        self.context.is_live()
    }

    /// The depth of the option this run is currently at.
    pub fn depth(&self) -> Result<usize, Signal> {
        let tree = self.executor.shared().tree()?;
        Ok(tree.depth(self.context.current())?)
    }

    /// A fresh unconstrained value of `sort`.
    pub fn fresh(&mut self, sort: Sort) -> Result<Value, Signal> {
        let name = self.context.next_name(sort);
        let expression = Expression::variable(Variable::new(name.clone(), sort));
        match self.mode() {
            Mode::Symbolic => Ok(Value::Symbolic(expression)),
            Mode::Concolic => {
                let shadow = self
                    .context
                    .shadow(&name)
                    .unwrap_or_else(|| sort.default_value());
                Ok(Value::Concolic(Concolic::new(expression, shadow)?))
            }
        }
    }

    pub fn fresh_int(&mut self) -> Result<Value, Signal> {
        self.fresh(Sort::Int)
    }

    pub fn fresh_long(&mut self) -> Result<Value, Signal> {
        self.fresh(Sort::Long)
    }

    pub fn fresh_double(&mut self) -> Result<Value, Signal> {
        self.fresh(Sort::Double)
    }

    pub fn fresh_bool(&mut self) -> Result<Value, Signal> {
        self.fresh(Sort::Bool)
    }

    /// A fresh value which is labeled under `name` in every outcome.
    pub fn named<S: Into<String>>(&mut self, name: S, sort: Sort) -> Result<Value, Signal> {
        let value = self.fresh(sort)?;
        self.context.name(name, Output::Value(value.clone()));
        Ok(value)
    }

    /// Label `output` under `name` in every outcome of this path.
    pub fn name<S: Into<String>, O: Into<Output>>(&mut self, name: S, output: O) {
        self.context.name(name, output.into());
    }

    pub fn binary(&mut self, op: BinaryOp, lhs: &Value, rhs: &Value) -> Result<Value, Signal> {
        let divides = matches!(
            op,
            BinaryOp::Div | BinaryOp::Rem | BinaryOp::FloorDiv | BinaryOp::FloorMod
        );
        if divides && rhs.sort().is_integral() && !rhs.is_concrete() {
            self.check_divisor(rhs)?;
        }
        Ok(self.executor.calculation().binary(op, lhs, rhs)?)
    }

    /// Split the path on whether a symbolic divisor is zero.
    fn check_divisor(&mut self, divisor: &Value) -> Result<(), Signal> {
        let zero = Value::Concrete(divisor.sort().default_value());
        let is_zero = self
            .executor
            .calculation()
            .binary(BinaryOp::Eq, divisor, &zero)?;
        if self.branch(&is_zero)? {
            return Err(Signal::Exception(Fault::DivisionByZero));
        }
        Ok(())
    }

    pub fn add(&mut self, lhs: &Value, rhs: &Value) -> Result<Value, Signal> {
        self.binary(BinaryOp::Add, lhs, rhs)
    }

    pub fn sub(&mut self, lhs: &Value, rhs: &Value) -> Result<Value, Signal> {
        self.binary(BinaryOp::Sub, lhs, rhs)
    }

    pub fn mul(&mut self, lhs: &Value, rhs: &Value) -> Result<Value, Signal> {
        self.binary(BinaryOp::Mul, lhs, rhs)
    }

    pub fn div(&mut self, lhs: &Value, rhs: &Value) -> Result<Value, Signal> {
        self.binary(BinaryOp::Div, lhs, rhs)
    }

    pub fn rem(&mut self, lhs: &Value, rhs: &Value) -> Result<Value, Signal> {
        self.binary(BinaryOp::Rem, lhs, rhs)
    }

    pub fn floor_div(&mut self, lhs: &Value, rhs: &Value) -> Result<Value, Signal> {
        self.binary(BinaryOp::FloorDiv, lhs, rhs)
    }

    pub fn floor_mod(&mut self, lhs: &Value, rhs: &Value) -> Result<Value, Signal> {
        self.binary(BinaryOp::FloorMod, lhs, rhs)
    }

    pub fn and(&mut self, lhs: &Value, rhs: &Value) -> Result<Value, Signal> {
        self.binary(BinaryOp::And, lhs, rhs)
    }

    pub fn or(&mut self, lhs: &Value, rhs: &Value) -> Result<Value, Signal> {
        self.binary(BinaryOp::Or, lhs, rhs)
    }

    pub fn xor(&mut self, lhs: &Value, rhs: &Value) -> Result<Value, Signal> {
        self.binary(BinaryOp::Xor, lhs, rhs)
    }

    pub fn shl(&mut self, lhs: &Value, rhs: &Value) -> Result<Value, Signal> {
        self.binary(BinaryOp::Shl, lhs, rhs)
    }

    pub fn shr(&mut self, lhs: &Value, rhs: &Value) -> Result<Value, Signal> {
        self.binary(BinaryOp::Shr, lhs, rhs)
    }

    pub fn ushr(&mut self, lhs: &Value, rhs: &Value) -> Result<Value, Signal> {
        self.binary(BinaryOp::Ushr, lhs, rhs)
    }

    pub fn eq(&mut self, lhs: &Value, rhs: &Value) -> Result<Value, Signal> {
        self.binary(BinaryOp::Eq, lhs, rhs)
    }

    pub fn ne(&mut self, lhs: &Value, rhs: &Value) -> Result<Value, Signal> {
        self.binary(BinaryOp::Ne, lhs, rhs)
    }

    pub fn lt(&mut self, lhs: &Value, rhs: &Value) -> Result<Value, Signal> {
        self.binary(BinaryOp::Lt, lhs, rhs)
    }

    pub fn le(&mut self, lhs: &Value, rhs: &Value) -> Result<Value, Signal> {
        self.binary(BinaryOp::Le, lhs, rhs)
    }

    pub fn gt(&mut self, lhs: &Value, rhs: &Value) -> Result<Value, Signal> {
        self.binary(BinaryOp::Gt, lhs, rhs)
    }

    pub fn ge(&mut self, lhs: &Value, rhs: &Value) -> Result<Value, Signal> {
        self.binary(BinaryOp::Ge, lhs, rhs)
    }

    pub fn neg(&mut self, operand: &Value) -> Result<Value, Signal> {
        Ok(self.executor.calculation().unary(UnaryOp::Neg, operand)?)
    }

    pub fn not(&mut self, operand: &Value) -> Result<Value, Signal> {
        Ok(self.executor.calculation().unary(UnaryOp::Not, operand)?)
    }

    pub fn cast(&mut self, sort: Sort, operand: &Value) -> Result<Value, Signal> {
        Ok(self.executor.calculation().cast(sort, operand)?)
    }

    /// Decide `condition`. A symbolic condition opens a choice whose first
    /// option takes the condition and whose second takes its negation.
    pub fn branch(&mut self, condition: &Value) -> Result<bool, Signal> {
        self.branch_with(condition, None)
    }

    /// `branch`, recording the options as edges `(site, 0)` for true and
    /// `(site, 1)` for false.
    pub fn branch_at(&mut self, site: usize, condition: &Value) -> Result<bool, Signal> {
        self.branch_with(condition, Some(site))
    }

    fn branch_with(&mut self, condition: &Value, site: Option<usize>) -> Result<bool, Signal> {
        if condition.sort() != Sort::Bool {
            return Err(Error::Sort(format!("branch on a value of sort {}", condition.sort())).into());
        }
        let preferred = match condition {
            Value::Concrete(constant) => return Ok(constant.as_bool() == Some(true)),
            Value::Concolic(concolic) => Some(if concolic.shadow().as_bool() == Some(true) {
                0
            } else {
                1
            }),
            Value::Symbolic(_) => None,
        };

        let taken = condition.to_expression();
        let negated = Expression::not(taken.clone())?;
        let alternatives = vec![
            Alternative::new(Some(taken), site.map(|site| CoverageEdge::new(site, 0))),
            Alternative::new(Some(negated), site.map(|site| CoverageEdge::new(site, 1))),
        ];
        let index = self
            .executor
            .decide(&mut self.context, alternatives, preferred)?;
        Ok(index == 0)
    }

    /// Choose one of `n` unconstrained alternatives.
    pub fn choose(&mut self, n: usize) -> Result<usize, Signal> {
        match n {
            0 => Err(Signal::Backtrack),
            1 => Ok(0),
            n => {
                let alternatives = vec![Alternative::default(); n];
                self.executor.decide(&mut self.context, alternatives, None)
            }
        }
    }

    /// Choose the first satisfiable of `conditions`, each becoming the path
    /// constraint of its own option.
    pub(crate) fn decide_among(&mut self, conditions: Vec<Expression>) -> Result<usize, Signal> {
        let alternatives = conditions
            .into_iter()
            .map(|condition| Alternative::new(Some(condition), None))
            .collect();
        self.executor.decide(&mut self.context, alternatives, None)
    }

    /// Continue only if `condition` can hold. A path whose constraints become
    /// unsatisfiable backtracks.
    pub fn assume(&mut self, condition: &Value) -> Result<(), Signal> {
        match condition {
            Value::Concrete(constant) => match constant.as_bool() {
                Some(true) => Ok(()),
                Some(false) => Err(Signal::Backtrack),
                None => Err(Error::Sort(format!("assume on a value of sort {}", constant.sort())).into()),
            },
            Value::Concolic(_) => {
                if self.branch(condition)? {
                    Ok(())
                } else {
                    Err(Signal::Backtrack)
                }
            }
            Value::Symbolic(expression) => {
                if expression.sort() != Sort::Bool {
                    return Err(Error::Sort(format!("assume on a value of sort {}", expression.sort())).into());
                }
                // recorded constraints are already in the solver
                if !self.context.is_live() {
                    return Ok(());
                }
                self.executor
                    .add_live_constraint(&self.context, expression.clone())?;
                if !self.executor.solver().is_satisfiable()? {
                    self.executor.mark_unsatisfiable(&self.context)?;
                    return Err(Signal::Backtrack);
                }
                Ok(())
            }
        }
    }

    /// Record `constraint` without checking it, when live. Used for
    /// constraints concrete execution is known to satisfy.
    pub(crate) fn constrain(&mut self, constraint: Expression) -> Result<(), Signal> {
        if self.context.is_live() {
            self.executor.add_live_constraint(&self.context, constraint)?;
        }
        Ok(())
    }

    pub fn fail<T>(&self) -> Result<T, Signal> {
        Err(Signal::Fail)
    }

    pub fn backtrack<T>(&self) -> Result<T, Signal> {
        Err(Signal::Backtrack)
    }

    /// Raise a fault of the explored program.
    pub fn throw<T, S: Into<String>>(&self, message: S) -> Result<T, Signal> {
        Err(Signal::Exception(Fault::Thrown(message.into())))
    }

    /// End this path because a budget the region keeps, such as a loop bound,
    /// ran out.
    pub fn exceed_budget<T, S: Into<String>>(&self, budget: S) -> Result<T, Signal> {
        Err(Signal::ExceededBudget(BudgetKind::Region(budget.into())))
    }
}
