use std::collections::VecDeque;
use std::fmt;

use crate::error::FormulaError;
use crate::formula::Formula;
use crate::types::PropositionSet;

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
struct Idx(usize);

#[derive(Debug, Clone)]
enum Expr<I = Idx> {
    /// Index of an atomic proposition.
    Prop(usize),
    Const(bool),
    Not(I),
    And(I, I),
    Or(I, I),
    Implies(I, I),
    Iff(I, I),
}

impl<A> Expr<A> {
    #[inline(always)]
    fn fmap<B, F>(self, mut f: F) -> Expr<B>
    where
        F: FnMut(A) -> B,
    {
        match self {
            Expr::Prop(p) => Expr::Prop(p),
            Expr::Const(b) => Expr::Const(b),
            Expr::Not(a) => Expr::Not(f(a)),
            Expr::And(a, b) => Expr::And(f(a), f(b)),
            Expr::Or(a, b) => Expr::Or(f(a), f(b)),
            Expr::Implies(a, b) => Expr::Implies(f(a), f(b)),
            Expr::Iff(a, b) => Expr::Iff(f(a), f(b)),
        }
    }
}

/// A state formula compiled against a fixed list of atomic propositions.
///
/// The expression tree is flattened into an arena in topological order
/// (parents before children), so evaluation is a single reverse sweep.
#[derive(Debug, Clone)]
pub struct StatePredicate {
    exprs: Vec<Expr>,
    source: String,
}

impl StatePredicate {
    /// Compiles `formula`, resolving atoms by name against `propositions`.
    pub fn compile<S: AsRef<str>>(formula: &Formula, propositions: &[S]) -> Result<Self, FormulaError> {
        if !formula.is_state_formula() {
            return Err(FormulaError::NotStateFormula(formula.to_string()));
        }

        let lookup = |name: &str| {
            propositions
                .iter()
                .position(|p| p.as_ref() == name)
                .ok_or_else(|| FormulaError::UnknownProposition(name.to_string()))
        };

        let exprs = expand_exprs(formula, |seed| {
            Ok(match seed {
                Formula::Atom(name) => Expr::Prop(lookup(name)?),
                Formula::Bool(b) => Expr::Const(*b),
                Formula::Not(a) => Expr::Not(a.as_ref()),
                Formula::And(a, b) => Expr::And(a.as_ref(), b.as_ref()),
                Formula::Or(a, b) => Expr::Or(a.as_ref(), b.as_ref()),
                Formula::Implies(a, b) => Expr::Implies(a.as_ref(), b.as_ref()),
                Formula::Iff(a, b) => Expr::Iff(a.as_ref(), b.as_ref()),
                _ => unreachable!("checked by is_state_formula"),
            })
        })?;

        Ok(Self {
            exprs,
            source: formula.to_string(),
        })
    }

    /// Evaluates the predicate on a set of satisfied propositions.
    pub fn evaluate(&self, propositions: PropositionSet) -> bool {
        let mut results = vec![false; self.exprs.len()];
        for (i, expr) in self.exprs.iter().enumerate().rev() {
            results[i] = match *expr {
                Expr::Prop(p) => propositions.contains(p),
                Expr::Const(b) => b,
                Expr::Not(a) => !results[a.0],
                Expr::And(a, b) => results[a.0] && results[b.0],
                Expr::Or(a, b) => results[a.0] || results[b.0],
                Expr::Implies(a, b) => !results[a.0] || results[b.0],
                Expr::Iff(a, b) => results[a.0] == results[b.0],
            };
        }
        results[0]
    }

    /// Indices of the propositions the predicate depends on.
    pub fn propositions(&self) -> PropositionSet {
        self.exprs
            .iter()
            .filter_map(|e| match e {
                Expr::Prop(p) => Some(*p),
                _ => None,
            })
            .collect()
    }
}

impl fmt::Display for StatePredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.source)
    }
}

// See: https://recursion.wtf/posts/rust_schemes/
fn expand_exprs<R, E, F>(seed: R, expand: F) -> Result<Vec<Expr>, E>
where
    R: Clone,
    F: Fn(R) -> Result<Expr<R>, E>,
{
    let mut frontier: VecDeque<R> = VecDeque::from([seed]);
    let mut exprs: Vec<Expr> = vec![];

    while let Some(seed) = frontier.pop_front() {
        let expr = expand(seed)?;
        let expr = expr.fmap(|e| {
            frontier.push_back(e);
            Idx(exprs.len() + frontier.len())
        });
        exprs.push(expr);
    }

    Ok(exprs)
}
