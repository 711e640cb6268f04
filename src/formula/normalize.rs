use std::fmt;

use crate::error::FormulaError;
use crate::formula::Formula;

/// CTL in existential normal form: the only temporal operators are EX, EU and EG.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Ctl {
    Atom(String),
    Bool(bool),
    Not(Box<Ctl>),
    And(Box<Ctl>, Box<Ctl>),
    Or(Box<Ctl>, Box<Ctl>),
    /// EX φ
    ExistsNext(Box<Ctl>),
    /// E[φ U ψ]
    ExistsUntil(Box<Ctl>, Box<Ctl>),
    /// EG φ
    ExistsGlobally(Box<Ctl>),
}

impl Ctl {
    fn not(self) -> Self {
        match self {
            Ctl::Not(inner) => *inner,
            Ctl::Bool(b) => Ctl::Bool(!b),
            other => Ctl::Not(Box::new(other)),
        }
    }

    fn and(self, other: Self) -> Self {
        Ctl::And(Box::new(self), Box::new(other))
    }

    fn or(self, other: Self) -> Self {
        Ctl::Or(Box::new(self), Box::new(other))
    }

    fn ex(self) -> Self {
        Ctl::ExistsNext(Box::new(self))
    }

    fn eu(self, other: Self) -> Self {
        Ctl::ExistsUntil(Box::new(self), Box::new(other))
    }

    fn eg(self) -> Self {
        Ctl::ExistsGlobally(Box::new(self))
    }
}

impl fmt::Display for Ctl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ctl::Atom(name) => write!(f, "{}", name),
            Ctl::Bool(b) => write!(f, "{}", b),
            Ctl::Not(a) => write!(f, "¬{}", a),
            Ctl::And(a, b) => write!(f, "({} ∧ {})", a, b),
            Ctl::Or(a, b) => write!(f, "({} ∨ {})", a, b),
            Ctl::ExistsNext(a) => write!(f, "EX {}", a),
            Ctl::ExistsUntil(a, b) => write!(f, "E[{} U {}]", a, b),
            Ctl::ExistsGlobally(a) => write!(f, "EG {}", a),
        }
    }
}

/// Rewrites a CTL formula into existential normal form.
///
/// | input      | rewritten to                           |
/// |------------|----------------------------------------|
/// | `φ → ψ`    | `¬φ ∨ ψ`                               |
/// | `φ ↔ ψ`    | `(φ ∧ ψ) ∨ (¬φ ∧ ¬ψ)`                  |
/// | `EF φ`     | `E[true U φ]`                          |
/// | `AX φ`     | `¬EX ¬φ`                               |
/// | `AF φ`     | `¬EG ¬φ`                               |
/// | `AG φ`     | `¬E[true U ¬φ]`                        |
/// | `A[φ U ψ]` | `¬(E[¬ψ U (¬φ ∧ ¬ψ)] ∨ EG ¬ψ)`         |
///
/// Bounded operators, probability queries and temporal operators without a
/// path quantifier are rejected.
pub fn normalize_ctl(formula: &Formula) -> Result<Ctl, FormulaError> {
    if !formula.is_ctl() {
        return Err(FormulaError::NotCtl(formula.to_string()));
    }
    Ok(rewrite(formula))
}

fn rewrite(formula: &Formula) -> Ctl {
    match formula {
        Formula::Atom(name) => Ctl::Atom(name.clone()),
        Formula::Bool(b) => Ctl::Bool(*b),
        Formula::Not(a) => rewrite(a).not(),
        Formula::And(a, b) => rewrite(a).and(rewrite(b)),
        Formula::Or(a, b) => rewrite(a).or(rewrite(b)),
        Formula::Implies(a, b) => rewrite(a).not().or(rewrite(b)),
        Formula::Iff(a, b) => {
            let (a, b) = (rewrite(a), rewrite(b));
            a.clone().and(b.clone()).or(a.not().and(b.not()))
        }
        Formula::Exists(path) => match path.as_ref() {
            Formula::Next(a) => rewrite(a).ex(),
            Formula::Finally(a, _) => Ctl::Bool(true).eu(rewrite(a)),
            Formula::Globally(a) => rewrite(a).eg(),
            Formula::Until(a, b, _) => rewrite(a).eu(rewrite(b)),
            _ => unreachable!("checked by is_ctl"),
        },
        Formula::All(path) => match path.as_ref() {
            Formula::Next(a) => rewrite(a).not().ex().not(),
            Formula::Finally(a, _) => rewrite(a).not().eg().not(),
            Formula::Globally(a) => Ctl::Bool(true).eu(rewrite(a).not()).not(),
            Formula::Until(a, b, _) => {
                let (a, b) = (rewrite(a), rewrite(b));
                let not_b = b.not();
                let blocked = not_b.clone().eu(a.not().and(not_b.clone()));
                blocked.or(not_b.eg()).not()
            }
            _ => unreachable!("checked by is_ctl"),
        },
        _ => unreachable!("checked by is_ctl"),
    }
}
