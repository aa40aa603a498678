//! Quest Requirement Grammar
//!
//! Requirement lists are written as tokens: a bare id (`"5"`) is satisfied
//! when that id is present; an underscore-joined group (`"5_6"`) only when
//! every member is present. A list passes when any one token passes.
//!
//! Tokens are parsed once at catalog load into [`Requirement`] values and
//! evaluated by [`RequirementSet::is_satisfied`]; nothing is string-parsed
//! while resolving availability.

use crate::error::RequirementError;

const GROUP_SEPARATOR: char = '_';

/// One parsed requirement token
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Requirement {
    /// A single id
    Single(String),
    /// Every listed id
    AllOf(Vec<String>),
}

impl Requirement {
    /// Parse a token such as `"5"` or `"5_6"`
    pub fn parse(token: &str) -> Result<Self, RequirementError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(RequirementError::Empty);
        }

        let members: Vec<&str> = token.split(GROUP_SEPARATOR).map(str::trim).collect();
        if members.iter().any(|m| m.is_empty()) {
            return Err(RequirementError::EmptyMember(token.to_string()));
        }

        Ok(match members.as_slice() {
            [single] => Requirement::Single(single.to_string()),
            _ => Requirement::AllOf(members.iter().map(|m| m.to_string()).collect()),
        })
    }

    /// Whether the requirement holds for the given membership test
    pub fn is_satisfied_by(&self, has: impl Fn(&str) -> bool) -> bool {
        match self {
            Requirement::Single(id) => has(id),
            Requirement::AllOf(ids) => ids.iter().all(|id| has(id)),
        }
    }

    /// Ids referenced by this requirement
    pub fn ids(&self) -> &[String] {
        match self {
            Requirement::Single(id) => std::slice::from_ref(id),
            Requirement::AllOf(ids) => ids,
        }
    }
}

/// A list of alternatives: satisfied when any member is
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequirementSet {
    alternatives: Vec<Requirement>,
}

impl RequirementSet {
    /// Parse every token; the first malformed token rejects the whole list
    pub fn parse_all<S: AsRef<str>>(tokens: &[S]) -> Result<Self, RequirementError> {
        let alternatives = tokens
            .iter()
            .map(|t| Requirement::parse(t.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { alternatives })
    }

    pub fn is_empty(&self) -> bool {
        self.alternatives.is_empty()
    }

    /// An empty set imposes nothing and is always satisfied
    pub fn is_satisfied(&self, has: impl Fn(&str) -> bool) -> bool {
        self.is_empty() || self.alternatives.iter().any(|r| r.is_satisfied_by(&has))
    }

    /// Alternatives that currently hold
    pub fn satisfied<'a>(
        &'a self,
        has: impl Fn(&str) -> bool + 'a,
    ) -> impl Iterator<Item = &'a Requirement> + 'a {
        self.alternatives
            .iter()
            .filter(move |r| r.is_satisfied_by(&has))
    }

    /// Every id mentioned in any alternative
    pub fn referenced_ids(&self) -> impl Iterator<Item = &String> {
        self.alternatives.iter().flat_map(|r| r.ids().iter())
    }

    pub fn alternatives(&self) -> &[Requirement] {
        &self.alternatives
    }
}
