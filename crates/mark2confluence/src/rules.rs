use crate::directive::ParentDirective;
use crate::error::SetupError;

/// Every configured default parent, most specific directory pattern first.
#[derive(Clone, Debug, Default)]
pub struct ParentRuleSet {
    rules: Vec<ParentDirective>,
}

impl ParentRuleSet {
    /// Parses the newline separated `DEFAULT_PARENTS` blob. Blank lines are
    /// ignored and an absent or empty blob yields an empty rule set.
    pub fn build(blob: Option<&str>) -> Result<Self, SetupError> {
        let Some(blob) = blob else {
            return Ok(Self::default());
        };

        let rules = blob
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(ParentDirective::parse)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::from_directives(rules))
    }

    /// Orders directives by descending length of the directory as written;
    /// `sort_by` is stable so equal lengths keep their configured order.
    pub fn from_directives(mut rules: Vec<ParentDirective>) -> Self {
        rules.sort_by(|a, b| {
            b.directory()
                .chars()
                .count()
                .cmp(&a.directory().chars().count())
        });
        Self { rules }
    }

    pub fn rules(&self) -> &[ParentDirective] {
        &self.rules
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn find_first_match(
        &self,
        file_dir: &str,
        workspace_root: &str,
    ) -> Option<&ParentDirective> {
        self.rules
            .iter()
            .find(|rule| rule.matches(file_dir, workspace_root))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn patterns(rules: &ParentRuleSet) -> Vec<&str> {
        rules.rules().iter().map(|r| r.directory_pattern()).collect()
    }

    #[test]
    fn empty_input_yields_no_rules() {
        assert!(ParentRuleSet::build(None).unwrap().is_empty());
        assert!(ParentRuleSet::build(Some("")).unwrap().is_empty());
        assert!(ParentRuleSet::build(Some("\n\n")).unwrap().is_empty());
    }

    #[test]
    fn sorts_longest_pattern_first() {
        let rules = ParentRuleSet::build(Some("*=ALL\na/=A\na/b/=AB\n")).unwrap();
        assert_eq!(patterns(&rules), ["a/b/", "a/", "*/"]);
    }

    #[test]
    fn equal_lengths_keep_configured_order() {
        let rules = ParentRuleSet::build(Some("xy=FIRST\nab=SECOND\ncd=THIRD")).unwrap();
        let spaces: Vec<&str> = rules.rules().iter().map(|r| r.space()).collect();
        assert_eq!(spaces, ["FIRST", "SECOND", "THIRD"]);
    }

    #[test]
    fn most_specific_rule_wins_regardless_of_input_order() {
        for blob in [
            "a/=A\na/b/=AB\n*=ALL",
            "*=ALL\na/b/=AB\na/=A",
            "a/b/=AB\n*=ALL\na/=A",
        ] {
            let rules = ParentRuleSet::build(Some(blob)).unwrap();
            let found = rules.find_first_match("/ws/a/b", "/ws").unwrap();
            assert_eq!(found.directory_pattern(), "a/b/", "{blob}");
            assert_eq!(found.space(), "AB");
        }
    }

    #[test]
    fn catch_all_listed_first_does_not_shadow_directory_rule() {
        let rules = ParentRuleSet::build(Some("*=ALL\na/=A")).unwrap();
        assert_eq!(
            rules.find_first_match("/ws/a", "/ws").map(|r| r.space()),
            Some("A")
        );
        assert_eq!(
            rules.find_first_match("/ws/b", "/ws").map(|r| r.space()),
            Some("ALL")
        );
    }

    #[test]
    fn falls_back_to_shorter_patterns() {
        let rules = ParentRuleSet::build(Some("a/b/=AB\n*=ALL")).unwrap();
        assert_eq!(
            rules.find_first_match("/ws/other", "/ws").map(|r| r.space()),
            Some("ALL")
        );
    }

    #[test]
    fn no_match_returns_none() {
        let rules = ParentRuleSet::build(Some("docs/=DOCS")).unwrap();
        assert!(rules.find_first_match("/ws/src", "/ws").is_none());
    }

    #[test]
    fn one_malformed_line_fails_the_whole_set() {
        let err = ParentRuleSet::build(Some("docs/=DOCS\nbroken\n")).unwrap_err();
        assert!(err.to_string().ends_with("provided: broken"), "{err}");
    }
}
