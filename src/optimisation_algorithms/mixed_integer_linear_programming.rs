use std::{fmt::Display, num::NonZeroUsize, time::Duration};
use strum_macros::{Display, EnumIter};

/// The domain of a variable.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum VariableKind {
    /// Integer variable in [0, 1].
    Binary,
    /// Real variable in [0, +inf).
    Continuous,
}

/// A reference to a variable of a [`MipModel`].
///
/// Variables are referenced by their number in the addition sequence.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VariableHandle(pub(crate) usize);

impl VariableHandle {
    pub fn idx(&self) -> usize {
        self.0
    }
}

#[derive(Clone, Debug)]
pub struct Variable {
    pub kind: VariableKind,
    pub name: String,
}

/// A sum of variables multiplied by constant coefficients, used as the left-hand
/// side of constraints and as the objective.
#[derive(Clone, Debug, Default)]
pub struct LinearExpression {
    terms: Vec<(VariableHandle, f64)>,
}

impl LinearExpression {
    /// Creates an empty linear expression.
    pub fn empty() -> Self {
        Self { terms: vec![] }
    }

    /// Add a single term to the linear expression.
    ///
    /// A variable may be added several times; its coefficients are summed by [`LinearExpression::normalised`].
    pub fn add(&mut self, var: VariableHandle, coeff: f64) {
        self.terms.push((var, coeff));
    }

    pub fn terms(&self) -> &[(VariableHandle, f64)] {
        &self.terms
    }

    /// The terms sorted by variable, with repeated variables merged and zero coefficients dropped.
    pub fn normalised(&self) -> Vec<(VariableHandle, f64)> {
        let mut terms = self.terms.clone();
        terms.sort_by_key(|(var, _)| *var);
        let mut result: Vec<(VariableHandle, f64)> = Vec::with_capacity(terms.len());
        for (var, coeff) in terms {
            match result.last_mut() {
                Some((last, sum)) if *last == var => *sum += coeff,
                _ => result.push((var, coeff)),
            }
        }
        result.retain(|(_, coeff)| *coeff != 0.0);
        result
    }

    pub fn evaluate(&self, values: &[f64]) -> f64 {
        self.terms
            .iter()
            .map(|(var, coeff)| coeff * values[var.0])
            .sum()
    }
}

impl<I: IntoIterator<Item = impl Into<LinearTerm>>> From<I> for LinearExpression {
    fn from(iter: I) -> Self {
        let mut expr = LinearExpression::empty();
        for term in iter {
            let LinearTerm(var, coeff) = term.into();
            expr.add(var, coeff);
        }
        expr
    }
}

impl std::iter::FromIterator<(VariableHandle, f64)> for LinearExpression {
    fn from_iter<I: IntoIterator<Item = (VariableHandle, f64)>>(iter: I) -> Self {
        let mut expr = LinearExpression::empty();
        for term in iter {
            expr.add(term.0, term.1)
        }
        expr
    }
}

impl std::iter::Extend<(VariableHandle, f64)> for LinearExpression {
    fn extend<I: IntoIterator<Item = (VariableHandle, f64)>>(&mut self, iter: I) {
        for term in iter {
            self.add(term.0, term.1)
        }
    }
}

/// A single `variable * constant` term in a linear expression.
/// This is an auxiliary struct for specifying conversions.
#[doc(hidden)]
#[derive(Clone, Debug)]
pub struct LinearTerm(VariableHandle, f64);

impl From<(VariableHandle, f64)> for LinearTerm {
    fn from(term: (VariableHandle, f64)) -> Self {
        LinearTerm(term.0, term.1)
    }
}

impl<'a> From<&'a (VariableHandle, f64)> for LinearTerm {
    fn from(term: &'a (VariableHandle, f64)) -> Self {
        LinearTerm(term.0, term.1)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Display)]
pub enum Relation {
    #[strum(serialize = "=")]
    Eq,
    #[strum(serialize = "<=")]
    Le,
    #[strum(serialize = ">=")]
    Ge,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Display)]
pub enum Sense {
    #[default]
    #[strum(serialize = "minimise")]
    Minimize,
    #[strum(serialize = "maximise")]
    Maximize,
}

#[derive(Clone, Debug)]
pub struct Constraint {
    pub expression: LinearExpression,
    pub relation: Relation,
    pub rhs: f64,
    pub name: String,
}

impl Constraint {
    pub fn is_satisfied(&self, values: &[f64], tolerance: f64) -> bool {
        let lhs = self.expression.evaluate(values);
        match self.relation {
            Relation::Eq => (lhs - self.rhs).abs() <= tolerance,
            Relation::Le => lhs <= self.rhs + tolerance,
            Relation::Ge => lhs >= self.rhs - tolerance,
        }
    }
}

/// A mixed-integer linear program, independent of the solver that will solve it.
#[derive(Clone, Debug, Default)]
pub struct MipModel {
    name: String,
    variables: Vec<Variable>,
    constraints: Vec<Constraint>,
    objective: LinearExpression,
    sense: Sense,
}

impl MipModel {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn build_variable(&mut self, kind: VariableKind, name: impl Into<String>) -> VariableHandle {
        let var = VariableHandle(self.variables.len());
        self.variables.push(Variable {
            kind,
            name: name.into(),
        });
        var
    }

    /// Add a linear constraint to the model.
    ///
    /// # Panics
    ///
    /// Will panic if the expression refers to a variable of another model.
    pub fn add_constraint(
        &mut self,
        expression: impl Into<LinearExpression>,
        relation: Relation,
        rhs: f64,
        name: impl Into<String>,
    ) {
        let expression = expression.into();
        assert!(
            expression
                .terms()
                .iter()
                .all(|(var, _)| var.0 < self.variables.len())
        );
        self.constraints.push(Constraint {
            expression,
            relation,
            rhs,
            name: name.into(),
        });
    }

    pub fn set_objective(&mut self, expression: impl Into<LinearExpression>, sense: Sense) {
        self.objective = expression.into();
        self.sense = sense;
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn variables(&self) -> &[Variable] {
        &self.variables
    }

    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    pub fn objective(&self) -> &LinearExpression {
        &self.objective
    }

    pub fn sense(&self) -> Sense {
        self.sense
    }

    pub fn number_of_variables(&self) -> usize {
        self.variables.len()
    }

    pub fn number_of_constraints(&self) -> usize {
        self.constraints.len()
    }

    pub fn number_of_variables_of(&self, kind: VariableKind) -> usize {
        self.variables.iter().filter(|v| v.kind == kind).count()
    }

    /// Dense objective coefficient per variable.
    pub fn objective_coefficients(&self) -> Vec<f64> {
        let mut coefficients = vec![0.0; self.variables.len()];
        for (var, coeff) in self.objective.terms() {
            coefficients[var.0] += coeff;
        }
        coefficients
    }

    /// Constraints that the given assignment violates by more than the tolerance. Binary variables must also be integral.
    pub fn violations(&self, values: &[f64], tolerance: f64) -> Vec<&str> {
        let mut result: Vec<&str> = self
            .variables
            .iter()
            .zip(values.iter())
            .filter(|(variable, value)| match variable.kind {
                VariableKind::Binary => {
                    (**value - value.round()).abs() > tolerance || !(-tolerance..=1.0 + tolerance).contains(*value)
                }
                VariableKind::Continuous => **value < -tolerance,
            })
            .map(|(variable, _)| variable.name.as_str())
            .collect();
        result.extend(
            self.constraints
                .iter()
                .filter(|constraint| !constraint.is_satisfied(values, tolerance))
                .map(|constraint| constraint.name.as_str()),
        );
        result
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display, EnumIter)]
pub enum SolveStatus {
    #[strum(serialize = "optimal")]
    Optimal,
    /// A solution was found, but optimality was not proven within the time limit.
    #[strum(serialize = "feasible")]
    Feasible,
    #[strum(serialize = "infeasible")]
    Infeasible,
    #[strum(serialize = "no solution found")]
    NoSolutionFound,
}

impl SolveStatus {
    pub fn has_solution(&self) -> bool {
        matches!(self, SolveStatus::Optimal | SolveStatus::Feasible)
    }
}

/// How many threads a solver may use.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ThreadHint {
    SolverDefault,
    #[default]
    AllAvailable,
    Exactly(NonZeroUsize),
}

impl ThreadHint {
    /// Interprets the conventional integer hint: 0 = solver default, -1 = all available, N >= 1 = exactly N.
    pub fn from_hint(hint: i64) -> Option<Self> {
        match hint {
            0 => Some(ThreadHint::SolverDefault),
            -1 => Some(ThreadHint::AllAvailable),
            n if n >= 1 => Some(ThreadHint::Exactly(NonZeroUsize::new(
                usize::try_from(n).ok()?,
            )?)),
            _ => None,
        }
    }

    pub fn to_hint(&self) -> i64 {
        match self {
            ThreadHint::SolverDefault => 0,
            ThreadHint::AllAvailable => -1,
            ThreadHint::Exactly(n) => n.get() as i64,
        }
    }

    /// The concrete number of threads, or None to leave the choice to the solver.
    pub fn resolve(&self) -> Option<usize> {
        match self {
            ThreadHint::SolverDefault => None,
            ThreadHint::AllAvailable => Some(
                std::thread::available_parallelism()
                    .map(NonZeroUsize::get)
                    .unwrap_or(1),
            ),
            ThreadHint::Exactly(n) => Some(n.get()),
        }
    }
}

impl Display for ThreadHint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ThreadHint::SolverDefault => write!(f, "solver default"),
            ThreadHint::AllAvailable => write!(f, "all available"),
            ThreadHint::Exactly(n) => write!(f, "{}", n),
        }
    }
}

/// The outcome of one solve call. Values and objective are present exactly when the status has a solution.
#[derive(Clone, Debug, PartialEq)]
pub struct MipSolution {
    status: SolveStatus,
    objective: Option<f64>,
    values: Option<Vec<f64>>,
}

impl MipSolution {
    pub fn with_solution(optimal: bool, objective: f64, values: Vec<f64>) -> Self {
        Self {
            status: if optimal {
                SolveStatus::Optimal
            } else {
                SolveStatus::Feasible
            },
            objective: Some(objective),
            values: Some(values),
        }
    }

    pub fn infeasible() -> Self {
        Self {
            status: SolveStatus::Infeasible,
            objective: None,
            values: None,
        }
    }

    pub fn no_solution_found() -> Self {
        Self {
            status: SolveStatus::NoSolutionFound,
            objective: None,
            values: None,
        }
    }

    pub fn status(&self) -> SolveStatus {
        self.status
    }

    pub fn is_optimal(&self) -> bool {
        self.status == SolveStatus::Optimal
    }

    pub fn objective(&self) -> Option<f64> {
        self.objective
    }

    pub fn values(&self) -> Option<&[f64]> {
        self.values.as_deref()
    }
}

/// A failure of the solver itself, as opposed to a model without solution.
#[derive(Clone, Debug, PartialEq)]
pub enum SolverError {
    /// The objective function is unbounded.
    Unbounded,
    /// The solver stopped working before it could report.
    Aborted(String),
    /// An internal error occurred.
    InternalError(String),
}

impl Display for SolverError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SolverError::Unbounded => write!(f, "problem is unbounded"),
            SolverError::Aborted(msg) => write!(f, "solver aborted: {}", msg),
            SolverError::InternalError(msg) => write!(f, "solver failed: {}", msg),
        }
    }
}

impl std::error::Error for SolverError {}

/// A mixed-integer programming engine. A call to `solve` blocks for at most
/// the time limit plus solver-internal granularity.
pub trait MipSolver {
    fn name(&self) -> &str;

    fn solve(
        &self,
        model: &MipModel,
        time_limit: Duration,
        threads: ThreadHint,
    ) -> Result<MipSolution, SolverError>;
}
