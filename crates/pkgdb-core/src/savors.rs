//! Savors: tag sets distinguishing build variants of one artifact instance.

use std::{fmt, sync::Arc};

use crate::error::ArtifactError;

/// The namespace savors are drawn from, with the separator used to render them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TraitContext {
    name: Arc<str>,
    separator: char,
}

impl TraitContext {
    pub const DEFAULT_SEPARATOR: char = '|';

    pub fn new(name: &str, separator: char) -> Result<Self, ArtifactError> {
        let name = name.trim();
        if name.is_empty() || separator.is_whitespace() {
            return Err(ArtifactError::InvalidSavorContext(name.to_string()));
        }
        Ok(Self {
            name: name.into(),
            separator,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn separator(&self) -> char {
        self.separator
    }

    /// Parses `"a|b|c"` into savors. A blank string yields `None`.
    pub fn parse(&self, input: &str) -> Option<Savors> {
        Savors::new(self, input.split(self.separator))
    }
}

#[derive(Debug, PartialEq, Eq, Hash)]
struct SavorsInner {
    context: TraitContext,
    atoms: Box<[Box<str>]>,
}

/// A non-empty, sorted set of savor atoms belonging to one [`TraitContext`].
///
/// An empty set is never represented: constructors return `None` instead.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Savors(Arc<SavorsInner>);

impl Savors {
    pub fn new<I, S>(context: &TraitContext, atoms: I) -> Option<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut atoms: Vec<Box<str>> = atoms
            .into_iter()
            .map(|atom| atom.as_ref().trim().to_string())
            .filter(|atom| !atom.is_empty() && !atom.contains(context.separator))
            .map(String::into_boxed_str)
            .collect();
        if atoms.is_empty() {
            return None;
        }
        atoms.sort_unstable();
        atoms.dedup();

        Some(Self(Arc::new(SavorsInner {
            context: context.clone(),
            atoms: atoms.into_boxed_slice(),
        })))
    }

    pub fn context(&self) -> &TraitContext {
        &self.0.context
    }

    pub fn atoms(&self) -> impl Iterator<Item = &str> {
        self.0.atoms.iter().map(|atom| &**atom)
    }

    pub fn len(&self) -> usize {
        self.0.atoms.len()
    }

    pub fn contains(&self, atom: &str) -> bool {
        self.0.atoms.binary_search_by(|a| (**a).cmp(atom)).is_ok()
    }

    pub fn is_superset_of(&self, other: &Savors) -> bool {
        self.context() == other.context() && other.atoms().all(|atom| self.contains(atom))
    }

    /// Atoms present in both sets, or `None` when they share nothing.
    pub fn intersect(&self, other: &Savors) -> Option<Savors> {
        if self.context() != other.context() {
            return None;
        }
        if self.is_superset_of(other) {
            return Some(other.clone());
        }
        Savors::new(self.context(), other.atoms().filter(|atom| self.contains(atom)))
    }
}

impl fmt::Display for Savors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, atom) in self.atoms().enumerate() {
            if i > 0 {
                write!(f, "{}", self.0.context.separator)?;
            }
            f.write_str(atom)?;
        }
        Ok(())
    }
}

impl fmt::Debug for Savors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Savors({}: {self})", self.0.context.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context() -> TraitContext {
        TraitContext::new("Savors", TraitContext::DEFAULT_SEPARATOR).unwrap()
    }

    #[test]
    fn test_parse_sorts_and_dedups() {
        let savors = context().parse("netstandard2.0|net461|net461").unwrap();
        assert_eq!(savors.to_string(), "net461|netstandard2.0");
        assert_eq!(savors.len(), 2);
    }

    #[test]
    fn test_blank_is_none() {
        assert!(context().parse("").is_none());
        assert!(context().parse(" | |").is_none());
        assert!(Savors::new(&context(), Vec::<String>::new()).is_none());
    }

    #[test]
    fn test_intersect_and_superset() {
        let ctx = context();
        let all = ctx.parse("a|b|c").unwrap();
        let some = ctx.parse("b|d").unwrap();

        assert_eq!(all.intersect(&some).unwrap().to_string(), "b");
        assert!(all.is_superset_of(&ctx.parse("a|c").unwrap()));
        assert!(!all.is_superset_of(&some));
        assert!(all.intersect(&ctx.parse("x").unwrap()).is_none());
    }

    #[test]
    fn test_different_contexts_never_intersect() {
        let a = context().parse("a").unwrap();
        let other = TraitContext::new("Frameworks", ',').unwrap();
        let b = other.parse("a").unwrap();
        assert_ne!(a, b);
        assert!(a.intersect(&b).is_none());
        assert!(!a.is_superset_of(&b));
    }

    #[test]
    fn test_invalid_context() {
        assert!(TraitContext::new("  ", '|').is_err());
        assert!(TraitContext::new("Savors", ' ').is_err());
    }
}
