use std::collections::HashSet;

use super::ToolSpec;

/// Decides which tools are advertised and callable for this process run.
///
/// Rules, first match wins:
/// 1. collection excluded → out
/// 2. tool excluded → out
/// 3. read-only mode and tool writes → out, even when explicitly included
/// 4. collection included, tool included, or no inclusions given → in
/// 5. otherwise → out
#[derive(Debug, Clone)]
pub struct ToolFilter {
    read_only: bool,
    include_tools: HashSet<String>,
    exclude_tools: HashSet<String>,
    include_collections: HashSet<String>,
    exclude_collections: HashSet<String>,
}

impl Default for ToolFilter {
    fn default() -> Self {
        Self::new(true)
    }
}

fn to_set<I, S>(names: I) -> HashSet<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    names.into_iter().map(Into::into).collect()
}

impl ToolFilter {
    pub fn new(read_only: bool) -> Self {
        Self {
            read_only,
            include_tools: HashSet::new(),
            exclude_tools: HashSet::new(),
            include_collections: HashSet::new(),
            exclude_collections: HashSet::new(),
        }
    }

    pub fn include_tools<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.include_tools = to_set(names);
        self
    }

    pub fn exclude_tools<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude_tools = to_set(names);
        self
    }

    pub fn include_collections<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.include_collections = to_set(names);
        self
    }

    pub fn exclude_collections<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude_collections = to_set(names);
        self
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    pub fn allows(&self, tool: &ToolSpec) -> bool {
        if self.exclude_collections.contains(tool.collection) {
            return false;
        }
        if self.exclude_tools.contains(tool.name) {
            return false;
        }
        if self.read_only && !tool.read_only {
            return false;
        }

        let no_inclusions = self.include_tools.is_empty() && self.include_collections.is_empty();
        no_inclusions
            || self.include_collections.contains(tool.collection)
            || self.include_tools.contains(tool.name)
    }

    /// The subset of `catalog` this filter allows, in catalog order.
    pub fn apply<'a, T: AsRef<ToolSpec>>(&self, catalog: &'a [T]) -> Vec<&'a T> {
        catalog.iter().filter(|t| self.allows(t.as_ref())).collect()
    }

    /// Tool and collection names mentioned by the filter that no catalog
    /// entry has. Typos here silently change what gets exposed.
    pub fn unknown_names<T: AsRef<ToolSpec>>(&self, catalog: &[T]) -> Vec<String> {
        let tools: HashSet<&str> = catalog.iter().map(|t| t.as_ref().name).collect();
        let collections: HashSet<&str> = catalog.iter().map(|t| t.as_ref().collection).collect();

        let mut unknown: Vec<String> = self
            .include_tools
            .iter()
            .chain(self.exclude_tools.iter())
            .filter(|name| !tools.contains(name.as_str()))
            .chain(
                self.include_collections
                    .iter()
                    .chain(self.exclude_collections.iter())
                    .filter(|name| !collections.contains(name.as_str())),
            )
            .cloned()
            .collect();
        unknown.sort();
        unknown.dedup();
        unknown
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CATALOG: &[ToolSpec] = &[
        ToolSpec::read("list_environments", "environments"),
        ToolSpec::read("get_environment", "environments"),
        ToolSpec::write("create_environment", "environments"),
        ToolSpec::read("list_applications", "applications"),
        ToolSpec::write("create_application", "applications"),
    ];

    fn names(filter: &ToolFilter) -> Vec<&'static str> {
        filter.apply(CATALOG).into_iter().map(|t| t.name).collect()
    }

    #[test]
    fn test_default_is_read_only() {
        let filter = ToolFilter::default();
        assert!(filter.is_read_only());
        assert_eq!(
            names(&filter),
            vec!["list_environments", "get_environment", "list_applications"]
        );
    }

    #[test]
    fn test_read_only_disabled_includes_everything() {
        let filter = ToolFilter::new(false);
        assert_eq!(names(&filter).len(), CATALOG.len());
    }

    #[test]
    fn test_read_only_outranks_explicit_include() {
        let filter = ToolFilter::new(true).include_tools(["create_environment"]);
        assert!(names(&filter).is_empty());

        let filter = ToolFilter::new(false).include_tools(["create_environment"]);
        assert_eq!(names(&filter), vec!["create_environment"]);
    }

    #[test]
    fn test_excluded_collection_outranks_included_tool() {
        let filter = ToolFilter::new(false)
            .include_tools(["list_environments"])
            .exclude_collections(["environments"]);
        assert!(names(&filter).is_empty());
    }

    #[test]
    fn test_excluded_tool_outranks_included_collection() {
        let filter = ToolFilter::new(false)
            .include_collections(["environments"])
            .exclude_tools(["create_environment"]);
        assert_eq!(names(&filter), vec!["list_environments", "get_environment"]);
    }

    #[test]
    fn test_inclusions_are_unioned() {
        let filter = ToolFilter::new(true)
            .include_collections(["applications"])
            .include_tools(["get_environment"]);
        assert_eq!(names(&filter), vec!["get_environment", "list_applications"]);
    }

    #[test]
    fn test_write_tool_present_when_not_read_only() {
        let filter = ToolFilter::new(false);
        assert!(names(&filter).contains(&"create_environment"));

        let filter = ToolFilter::new(false).exclude_tools(["create_environment"]);
        assert!(!names(&filter).contains(&"create_environment"));
    }

    #[test]
    fn test_unknown_names() {
        let filter = ToolFilter::new(true)
            .include_tools(["list_environments", "list_enviroments"])
            .exclude_collections(["groups"]);
        assert_eq!(filter.unknown_names(CATALOG), vec!["groups", "list_enviroments"]);
    }
}
