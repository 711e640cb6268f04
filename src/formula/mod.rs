//! Temporal-logic formulas over atomic propositions.
//!
//! A single [`Formula`] tree covers state formulas, CTL, bounded path formulas
//! and probability queries. Each checker accepts the subset it can handle and
//! rejects everything else before doing any work:
//!
//! - [`StatePredicate`] compiles non-temporal formulas (see [`Formula::is_state_formula`]);
//! - [`normalize_ctl`] reduces CTL formulas (see [`Formula::is_ctl`]) to EX/EU/EG;
//! - the probabilistic checkers accept (bounded) `F` and `U`, optionally under `P=?`.

use std::fmt;

mod normalize;
mod predicate;

pub use normalize::{normalize_ctl, Ctl};
pub use predicate::StatePredicate;

/// Formula abstract syntax tree
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Formula {
    /// Atomic proposition, referenced by name
    Atom(String),
    /// Boolean constant
    Bool(bool),
    Not(Box<Formula>),
    And(Box<Formula>, Box<Formula>),
    Or(Box<Formula>, Box<Formula>),
    Implies(Box<Formula>, Box<Formula>),
    Iff(Box<Formula>, Box<Formula>),

    /// X φ
    Next(Box<Formula>),
    /// F φ, or F≤k φ when bounded
    Finally(Box<Formula>, Option<u32>),
    /// G φ
    Globally(Box<Formula>),
    /// φ U ψ, or φ U≤k ψ when bounded
    Until(Box<Formula>, Box<Formula>, Option<u32>),

    /// Existential path quantifier: E ...
    Exists(Box<Formula>),
    /// Universal path quantifier: A ...
    All(Box<Formula>),

    /// Probability query: P=? [...]
    Probability(Box<Formula>),
}

impl Formula {
    pub fn atom(name: impl Into<String>) -> Self {
        Formula::Atom(name.into())
    }

    pub fn tt() -> Self {
        Formula::Bool(true)
    }

    pub fn ff() -> Self {
        Formula::Bool(false)
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(self) -> Self {
        Formula::Not(Box::new(self))
    }

    pub fn and(self, other: Self) -> Self {
        Formula::And(Box::new(self), Box::new(other))
    }

    pub fn or(self, other: Self) -> Self {
        Formula::Or(Box::new(self), Box::new(other))
    }

    pub fn implies(self, other: Self) -> Self {
        Formula::Implies(Box::new(self), Box::new(other))
    }

    pub fn iff(self, other: Self) -> Self {
        Formula::Iff(Box::new(self), Box::new(other))
    }

    pub fn next(self) -> Self {
        Formula::Next(Box::new(self))
    }

    pub fn finally(self) -> Self {
        Formula::Finally(Box::new(self), None)
    }

    pub fn finally_within(self, bound: u32) -> Self {
        Formula::Finally(Box::new(self), Some(bound))
    }

    pub fn globally(self) -> Self {
        Formula::Globally(Box::new(self))
    }

    pub fn until(self, other: Self) -> Self {
        Formula::Until(Box::new(self), Box::new(other), None)
    }

    pub fn until_within(self, other: Self, bound: u32) -> Self {
        Formula::Until(Box::new(self), Box::new(other), Some(bound))
    }

    pub fn exists(self) -> Self {
        Formula::Exists(Box::new(self))
    }

    pub fn all(self) -> Self {
        Formula::All(Box::new(self))
    }

    pub fn probability(self) -> Self {
        Formula::Probability(Box::new(self))
    }

    // CTL shorthands.

    pub fn ex(self) -> Self {
        self.next().exists()
    }

    pub fn ax(self) -> Self {
        self.next().all()
    }

    pub fn ef(self) -> Self {
        self.finally().exists()
    }

    pub fn af(self) -> Self {
        self.finally().all()
    }

    pub fn eg(self) -> Self {
        self.globally().exists()
    }

    pub fn ag(self) -> Self {
        self.globally().all()
    }

    pub fn eu(self, other: Self) -> Self {
        self.until(other).exists()
    }

    pub fn au(self, other: Self) -> Self {
        self.until(other).all()
    }

    /// Returns true if the formula contains no temporal operator, path
    /// quantifier or probability query.
    pub fn is_state_formula(&self) -> bool {
        match self {
            Formula::Atom(_) | Formula::Bool(_) => true,
            Formula::Not(a) => a.is_state_formula(),
            Formula::And(a, b) | Formula::Or(a, b) | Formula::Implies(a, b) | Formula::Iff(a, b) => {
                a.is_state_formula() && b.is_state_formula()
            }
            _ => false,
        }
    }

    /// Returns true if the formula is an (unbounded) CTL state formula: every
    /// temporal operator sits directly below a path quantifier.
    pub fn is_ctl(&self) -> bool {
        match self {
            Formula::Atom(_) | Formula::Bool(_) => true,
            Formula::Not(a) => a.is_ctl(),
            Formula::And(a, b) | Formula::Or(a, b) | Formula::Implies(a, b) | Formula::Iff(a, b) => {
                a.is_ctl() && b.is_ctl()
            }
            Formula::Exists(path) | Formula::All(path) => match path.as_ref() {
                Formula::Next(a) | Formula::Finally(a, None) | Formula::Globally(a) => a.is_ctl(),
                Formula::Until(a, b, None) => a.is_ctl() && b.is_ctl(),
                _ => false,
            },
            _ => false,
        }
    }

    /// Names of all atomic propositions, in order of first occurrence.
    pub fn atoms(&self) -> Vec<&str> {
        let mut atoms = Vec::new();
        self.collect_atoms(&mut atoms);
        atoms
    }

    fn collect_atoms<'a>(&'a self, atoms: &mut Vec<&'a str>) {
        match self {
            Formula::Atom(name) => {
                if !atoms.contains(&name.as_str()) {
                    atoms.push(name.as_str());
                }
            }
            Formula::Bool(_) => {}
            Formula::Not(a)
            | Formula::Next(a)
            | Formula::Finally(a, _)
            | Formula::Globally(a)
            | Formula::Exists(a)
            | Formula::All(a)
            | Formula::Probability(a) => a.collect_atoms(atoms),
            Formula::And(a, b) | Formula::Or(a, b) | Formula::Implies(a, b) | Formula::Iff(a, b) | Formula::Until(a, b, _) => {
                a.collect_atoms(atoms);
                b.collect_atoms(atoms);
            }
        }
    }
}

fn write_bound(f: &mut fmt::Formatter<'_>, bound: &Option<u32>) -> fmt::Result {
    match bound {
        Some(k) => write!(f, "≤{}", k),
        None => Ok(()),
    }
}

impl fmt::Display for Formula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Formula::Atom(name) => write!(f, "{}", name),
            Formula::Bool(true) => write!(f, "true"),
            Formula::Bool(false) => write!(f, "false"),
            Formula::Not(a) => write!(f, "¬{}", a),
            Formula::And(a, b) => write!(f, "({} ∧ {})", a, b),
            Formula::Or(a, b) => write!(f, "({} ∨ {})", a, b),
            Formula::Implies(a, b) => write!(f, "({} → {})", a, b),
            Formula::Iff(a, b) => write!(f, "({} ↔ {})", a, b),
            Formula::Next(a) => write!(f, "X {}", a),
            Formula::Finally(a, bound) => {
                write!(f, "F")?;
                write_bound(f, bound)?;
                write!(f, " {}", a)
            }
            Formula::Globally(a) => write!(f, "G {}", a),
            Formula::Until(a, b, bound) => {
                write!(f, "({} U", a)?;
                write_bound(f, bound)?;
                write!(f, " {})", b)
            }
            Formula::Exists(a) => write!(f, "E {}", a),
            Formula::All(a) => write!(f, "A {}", a),
            Formula::Probability(a) => write!(f, "P=? [{}]", a),
        }
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    #[test]
    fn test_display() {
        let p = Formula::atom("p");
        let q = Formula::atom("q");
        assert_eq!(p.clone().and(q.clone().not()).to_string(), "(p ∧ ¬q)");
        assert_eq!(p.clone().eu(q.clone()).to_string(), "E (p U q)");
        assert_eq!(p.clone().ag().to_string(), "A G p");
        assert_eq!(p.clone().until_within(q, 5).to_string(), "(p U≤5 q)");
        assert_eq!(p.finally_within(3).probability().to_string(), "P=? [F≤3 p]");
    }

    #[test]
    fn test_classification() {
        let p = Formula::atom("p");
        let q = Formula::atom("q");

        assert!(p.clone().implies(q.clone()).is_state_formula());
        assert!(!p.clone().ex().is_state_formula());

        assert!(p.clone().ag().is_ctl());
        assert!(p.clone().ef().and(q.clone().au(p.clone())).is_ctl());
        assert!(!p.clone().finally().is_ctl());
        assert!(!p.clone().finally_within(2).exists().is_ctl());
        assert!(!p.clone().globally().finally().exists().is_ctl());
        assert!(!p.clone().ef().probability().is_ctl());
    }

    #[test]
    fn test_atoms() {
        let p = Formula::atom("p");
        let q = Formula::atom("q");
        let formula = p.clone().until(q.clone().and(p)).exists().or(q.not());
        assert_eq!(formula.atoms(), vec!["p", "q"]);
    }
}
