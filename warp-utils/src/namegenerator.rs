use std::collections::HashSet;

use crate::Id;

/// Generates fresh names that do not conflict with a set of previously
/// defined names.
#[derive(Clone, Debug, Default)]
pub struct NameGenerator {
    name_hash: HashSet<Id>,
}

impl NameGenerator {
    /// Create a NameGenerator where `names` are already defined.
    pub fn with_prev_defined_names(names: HashSet<Id>) -> Self {
        NameGenerator { name_hash: names }
    }

    /// Add new defined names to the generator.
    pub fn add_names(&mut self, names: HashSet<Id>) {
        self.name_hash.extend(names);
    }

    /// Returns a fresh name with the given prefix and records it as
    /// defined. The prefix itself is used when still free.
    pub fn gen_name<S>(&mut self, prefix: S) -> Id
    where
        S: Into<Id>,
    {
        let prefix: Id = prefix.into();
        let mut name = prefix;
        let mut suffix = 0;
        while self.name_hash.contains(&name) {
            name = Id::new(format!("{prefix}{suffix}"));
            suffix += 1;
        }
        self.name_hash.insert(name);
        name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_names_do_not_collide() {
        let mut gen = NameGenerator::default();
        let a = gen.gen_name("block");
        let b = gen.gen_name("block");
        let c = gen.gen_name("block");
        assert_eq!(a, "block");
        assert_eq!(b, "block0");
        assert_eq!(c, "block1");
    }

    #[test]
    fn respects_previously_defined_names() {
        let mut gen = NameGenerator::with_prev_defined_names(
            [Id::new("entry")].into_iter().collect(),
        );
        assert_eq!(gen.gen_name("entry"), "entry0");
    }
}
