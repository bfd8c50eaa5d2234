//! Static tool catalog.
//!
//! Every tool maps to one management-API route. Path placeholders such as
//! `{environmentId}` are filled from the tool arguments of the same name;
//! write tools send their `body` argument as the JSON request body.

use idgate_core::api::Method;
use idgate_core::tools::ToolSpec;
use schemars::{JsonSchema, Schema};
use serde::Deserialize;
use serde_json::Value;

pub const ENVIRONMENTS: &str = "environments";
pub const APPLICATIONS: &str = "applications";
pub const POPULATIONS: &str = "populations";
pub const USERS: &str = "users";

// ============================================================================
// Tool arguments
// ============================================================================

/// Arguments for tools that take no input
#[derive(Debug, Deserialize, JsonSchema)]
pub struct NoArgs {}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentArgs {
    /// ID of the environment
    pub environment_id: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct CreateEnvironmentArgs {
    /// Environment definition, as accepted by the management API
    pub body: Value,
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateEnvironmentArgs {
    /// ID of the environment
    pub environment_id: String,
    /// Fields to replace
    pub body: Value,
}

/// A resource that lives inside an environment
#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResourceArgs {
    /// ID of the environment
    pub environment_id: String,
    /// ID of the application, population or user
    pub resource_id: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateResourceArgs {
    /// ID of the environment
    pub environment_id: String,
    /// Resource definition, as accepted by the management API
    pub body: Value,
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateResourceArgs {
    /// ID of the environment
    pub environment_id: String,
    /// ID of the application, population or user
    pub resource_id: String,
    /// Fields to replace
    pub body: Value,
}

// ============================================================================
// Catalog
// ============================================================================

pub struct CatalogEntry {
    pub spec: ToolSpec,
    pub description: &'static str,
    pub method: Method,
    /// Route relative to the API base URL
    pub path: &'static str,
    schema: fn() -> Schema,
}

impl CatalogEntry {
    pub fn name(&self) -> &'static str {
        self.spec.name
    }

    pub fn input_schema(&self) -> Schema {
        (self.schema)()
    }

    /// Whether calls send the `body` argument.
    pub fn has_body(&self) -> bool {
        self.method == Method::POST || self.method == Method::PUT
    }
}

impl AsRef<ToolSpec> for CatalogEntry {
    fn as_ref(&self) -> &ToolSpec {
        &self.spec
    }
}

fn schema<T: JsonSchema>() -> Schema {
    schemars::schema_for!(T)
}

const fn entry(
    spec: ToolSpec,
    description: &'static str,
    method: Method,
    path: &'static str,
    schema: fn() -> Schema,
) -> CatalogEntry {
    CatalogEntry {
        spec,
        description,
        method,
        path,
        schema,
    }
}

pub static CATALOG: &[CatalogEntry] = &[
    // Environments
    entry(
        ToolSpec::read("list_environments", ENVIRONMENTS),
        "List all environments in the organization",
        Method::GET,
        "environments",
        schema::<NoArgs>,
    ),
    entry(
        ToolSpec::read("read_environment", ENVIRONMENTS),
        "Get one environment by ID",
        Method::GET,
        "environments/{environmentId}",
        schema::<EnvironmentArgs>,
    ),
    entry(
        ToolSpec::write("create_environment", ENVIRONMENTS),
        "Create a new environment",
        Method::POST,
        "environments",
        schema::<CreateEnvironmentArgs>,
    ),
    entry(
        ToolSpec::write("update_environment", ENVIRONMENTS),
        "Replace the settings of an environment",
        Method::PUT,
        "environments/{environmentId}",
        schema::<UpdateEnvironmentArgs>,
    ),
    // Applications
    entry(
        ToolSpec::read("list_applications", APPLICATIONS),
        "List the applications of an environment",
        Method::GET,
        "environments/{environmentId}/applications",
        schema::<EnvironmentArgs>,
    ),
    entry(
        ToolSpec::read("read_application", APPLICATIONS),
        "Get one application by ID",
        Method::GET,
        "environments/{environmentId}/applications/{resourceId}",
        schema::<ResourceArgs>,
    ),
    entry(
        ToolSpec::write("create_application", APPLICATIONS),
        "Create an application in an environment",
        Method::POST,
        "environments/{environmentId}/applications",
        schema::<CreateResourceArgs>,
    ),
    entry(
        ToolSpec::write("update_application", APPLICATIONS),
        "Replace the settings of an application",
        Method::PUT,
        "environments/{environmentId}/applications/{resourceId}",
        schema::<UpdateResourceArgs>,
    ),
    entry(
        ToolSpec::write("delete_application", APPLICATIONS),
        "Delete an application",
        Method::DELETE,
        "environments/{environmentId}/applications/{resourceId}",
        schema::<ResourceArgs>,
    ),
    // Populations
    entry(
        ToolSpec::read("list_populations", POPULATIONS),
        "List the populations of an environment",
        Method::GET,
        "environments/{environmentId}/populations",
        schema::<EnvironmentArgs>,
    ),
    entry(
        ToolSpec::read("read_population", POPULATIONS),
        "Get one population by ID",
        Method::GET,
        "environments/{environmentId}/populations/{resourceId}",
        schema::<ResourceArgs>,
    ),
    entry(
        ToolSpec::write("create_population", POPULATIONS),
        "Create a population in an environment",
        Method::POST,
        "environments/{environmentId}/populations",
        schema::<CreateResourceArgs>,
    ),
    entry(
        ToolSpec::write("update_population", POPULATIONS),
        "Replace the settings of a population",
        Method::PUT,
        "environments/{environmentId}/populations/{resourceId}",
        schema::<UpdateResourceArgs>,
    ),
    entry(
        ToolSpec::write("delete_population", POPULATIONS),
        "Delete a population",
        Method::DELETE,
        "environments/{environmentId}/populations/{resourceId}",
        schema::<ResourceArgs>,
    ),
    // Users
    entry(
        ToolSpec::read("list_users", USERS),
        "List the users of an environment",
        Method::GET,
        "environments/{environmentId}/users",
        schema::<EnvironmentArgs>,
    ),
    entry(
        ToolSpec::read("read_user", USERS),
        "Get one user by ID",
        Method::GET,
        "environments/{environmentId}/users/{resourceId}",
        schema::<ResourceArgs>,
    ),
    entry(
        ToolSpec::write("create_user", USERS),
        "Create a user in an environment",
        Method::POST,
        "environments/{environmentId}/users",
        schema::<CreateResourceArgs>,
    ),
    entry(
        ToolSpec::write("update_user", USERS),
        "Replace the attributes of a user",
        Method::PUT,
        "environments/{environmentId}/users/{resourceId}",
        schema::<UpdateResourceArgs>,
    ),
    entry(
        ToolSpec::write("delete_user", USERS),
        "Delete a user",
        Method::DELETE,
        "environments/{environmentId}/users/{resourceId}",
        schema::<ResourceArgs>,
    ),
];

pub fn find(name: &str) -> Option<&'static CatalogEntry> {
    CATALOG.iter().find(|entry| entry.name() == name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use idgate_core::tools::ToolFilter;
    use std::collections::HashSet;

    fn placeholders(path: &str) -> Vec<&str> {
        path.split('/')
            .filter_map(|segment| segment.strip_prefix('{')?.strip_suffix('}'))
            .collect()
    }

    #[test]
    fn test_names_are_unique() {
        let names: HashSet<_> = CATALOG.iter().map(|e| e.name()).collect();
        assert_eq!(names.len(), CATALOG.len());
    }

    #[test]
    fn test_write_tools_are_classified() {
        for entry in CATALOG {
            assert_eq!(
                entry.spec.read_only,
                entry.method == Method::GET,
                "{} has the wrong classification",
                entry.name()
            );
        }
    }

    #[test]
    fn test_schemas_declare_path_parameters() {
        for entry in CATALOG {
            let schema = serde_json::to_value(entry.input_schema()).unwrap();
            assert_eq!(schema["type"], "object", "{}", entry.name());
            for name in placeholders(entry.path) {
                assert!(
                    schema["properties"].get(name).is_some(),
                    "{} does not declare {}",
                    entry.name(),
                    name
                );
            }
            if entry.has_body() {
                assert!(schema["properties"].get("body").is_some(), "{}", entry.name());
            }
        }
    }

    #[test]
    fn test_default_filter_is_read_only() {
        let advertised = ToolFilter::default().apply(CATALOG);
        assert!(!advertised.is_empty());
        assert!(advertised.iter().all(|e| e.spec.read_only));
        assert!(advertised.iter().any(|e| e.name() == "list_users"));
    }

    #[test]
    fn test_create_environment_needs_read_only_disabled() {
        let names = |filter: ToolFilter| -> Vec<&'static str> {
            filter.apply(CATALOG).into_iter().map(|e| e.name()).collect()
        };
        assert!(names(ToolFilter::new(true).include_tools(["create_environment"])).is_empty());
        assert_eq!(
            names(ToolFilter::new(false).include_tools(["create_environment"])),
            vec!["create_environment"]
        );
    }

    #[test]
    fn test_find() {
        assert_eq!(find("read_user").map(|e| e.path), Some("environments/{environmentId}/users/{resourceId}"));
        assert!(find("drop_database").is_none());
    }
}
