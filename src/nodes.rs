//! Graph terms and the makers that build them from rows.
//!
//! A [`NodeMaker`] combines a value rule with a term kind. Reading direction:
//! a row's value becomes a [`Term`]. Writing direction (`select_term`): a
//! concrete term from a query pattern is pushed back down into a selection
//! expression over columns, so the database does the filtering.

use std::collections::BTreeSet;
use std::fmt;

use crate::expr::Expression;
use crate::names::ColumnName;
use crate::rename::Renamer;
use crate::sql::ResultRow;
use crate::values::ValueMaker;

/// A node in the virtual graph.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Term {
    Iri(String),
    BlankNode(String),
    Literal {
        lexical: String,
        language: Option<String>,
        datatype: Option<String>,
    },
}

impl Term {
    pub fn iri(value: impl Into<String>) -> Term {
        Term::Iri(value.into())
    }

    pub fn blank(id: impl Into<String>) -> Term {
        Term::BlankNode(id.into())
    }

    pub fn literal(lexical: impl Into<String>) -> Term {
        Term::Literal {
            lexical: lexical.into(),
            language: None,
            datatype: None,
        }
    }

    pub fn language_literal(lexical: impl Into<String>, language: impl Into<String>) -> Term {
        Term::Literal {
            lexical: lexical.into(),
            language: Some(language.into()),
            datatype: None,
        }
    }

    pub fn typed_literal(lexical: impl Into<String>, datatype: impl Into<String>) -> Term {
        Term::Literal {
            lexical: lexical.into(),
            language: None,
            datatype: Some(datatype.into()),
        }
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::Iri(iri) => write!(f, "<{iri}>"),
            Term::BlankNode(id) => write!(f, "_:{id}"),
            Term::Literal {
                lexical,
                language,
                datatype,
            } => {
                write!(f, "\"{lexical}\"")?;
                if let Some(lang) = language {
                    write!(f, "@{lang}")?;
                } else if let Some(dt) = datatype {
                    write!(f, "^^<{dt}>")?;
                }
                Ok(())
            }
        }
    }
}

/// The kind of term a typed maker produces.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TermKind {
    Iri,
    BlankNode,
    PlainLiteral,
    LanguageLiteral(String),
    TypedLiteral(String),
}

impl TermKind {
    fn wrap(&self, value: String) -> Term {
        match self {
            TermKind::Iri => Term::Iri(value),
            TermKind::BlankNode => Term::BlankNode(value),
            TermKind::PlainLiteral => Term::literal(value),
            TermKind::LanguageLiteral(lang) => Term::language_literal(value, lang.clone()),
            TermKind::TypedLiteral(dt) => Term::typed_literal(value, dt.clone()),
        }
    }

    /// The underlying value string of `term` if the term is of this kind,
    /// None for a kind mismatch.
    fn unwrap<'a>(&self, term: &'a Term) -> Option<&'a str> {
        match (self, term) {
            (TermKind::Iri, Term::Iri(v)) => Some(v),
            (TermKind::BlankNode, Term::BlankNode(v)) => Some(v),
            (
                TermKind::PlainLiteral,
                Term::Literal {
                    lexical,
                    language: None,
                    datatype: None,
                },
            ) => Some(lexical),
            (
                TermKind::LanguageLiteral(lang),
                Term::Literal {
                    lexical,
                    language: Some(l),
                    datatype: None,
                },
            ) if lang == l => Some(lexical),
            (
                TermKind::TypedLiteral(dt),
                Term::Literal {
                    lexical,
                    language: None,
                    datatype: Some(d),
                },
            ) if dt == d => Some(lexical),
            _ => None,
        }
    }
}

/// Builds one position of a triple from a row.
#[derive(Clone, Debug, PartialEq)]
pub enum NodeMaker {
    /// Always the same term, independent of the row.
    Fixed(Term),
    /// A term of a fixed kind whose value comes from a [`ValueMaker`].
    Typed {
        value: ValueMaker,
        kind: TermKind,
        unique: bool,
    },
}

impl NodeMaker {
    pub fn make_term(&self, row: &ResultRow) -> Option<Term> {
        match self {
            NodeMaker::Fixed(term) => Some(term.clone()),
            NodeMaker::Typed { value, kind, .. } => Some(kind.wrap(value.extract(row)?)),
        }
    }

    /// Binds this maker to a concrete term. Returns the specialized maker
    /// plus the selection expression that restricts rows to those producing
    /// the term. `Expression::False` when the term can never be produced.
    pub fn select_term(&self, term: &Term) -> (NodeMaker, Expression) {
        match self {
            NodeMaker::Fixed(fixed) => {
                let condition = if fixed == term {
                    Expression::True
                } else {
                    Expression::False
                };
                (NodeMaker::Fixed(fixed.clone()), condition)
            }
            NodeMaker::Typed { value, kind, .. } => match kind.unwrap(term) {
                Some(lexical) => (
                    NodeMaker::Fixed(term.clone()),
                    value.matches_expression(lexical),
                ),
                None => (NodeMaker::Fixed(term.clone()), Expression::False),
            },
        }
    }

    /// Whether distinct rows are guaranteed to produce distinct terms.
    pub fn is_unique(&self) -> bool {
        match self {
            NodeMaker::Fixed(_) => true,
            NodeMaker::Typed { unique, .. } => *unique,
        }
    }

    pub fn columns(&self) -> BTreeSet<ColumnName> {
        match self {
            NodeMaker::Fixed(_) => BTreeSet::new(),
            NodeMaker::Typed { value, .. } => value.columns(),
        }
    }

    pub fn rename(&self, renamer: &Renamer) -> NodeMaker {
        match self {
            NodeMaker::Fixed(term) => NodeMaker::Fixed(term.clone()),
            NodeMaker::Typed {
                value,
                kind,
                unique,
            } => NodeMaker::Typed {
                value: value.rename(renamer),
                kind: kind.clone(),
                unique: *unique,
            },
        }
    }
}

/// A query pattern; `None` positions are wildcards.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TriplePattern {
    pub subject: Option<Term>,
    pub predicate: Option<Term>,
    pub object: Option<Term>,
}

impl TriplePattern {
    pub fn new(
        subject: Option<Term>,
        predicate: Option<Term>,
        object: Option<Term>,
    ) -> TriplePattern {
        TriplePattern {
            subject,
            predicate,
            object,
        }
    }

    /// Matches every statement in the graph.
    pub fn any() -> TriplePattern {
        TriplePattern::default()
    }
}

/// One statement of the virtual graph.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Triple {
    pub subject: Term,
    pub predicate: Term,
    pub object: Term,
}

impl fmt::Display for Triple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {} .", self.subject, self.predicate, self.object)
    }
}
