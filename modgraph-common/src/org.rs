// modgraph-common/src/org.rs
// Human-readable organization labels derived from module path prefixes.

/// Prefix table, most specific first where prefixes overlap.
const ORGANIZATION_PREFIXES: &[(&str, &str)] = &[
    ("github.com/pkg/", "golang"),
    ("google.golang.org/", "google"),
    ("golang.org/", "golang"),
    ("k8s.io/", "kubernetes"),
    ("sigs.k8s.io/", "kubernetes"),
    ("go.uber.org/", "uber-go"),
    ("gorm.io/gorm", "go-gorm"),
    ("go.opentelemetry.io/", "open-telemetry"),
    ("go.mongodb.org/", "mongodb"),
];

/// Organization that publishes the module, if it can be told from its path.
pub fn organization(module_path: &str) -> Option<&str> {
    let table_match = ORGANIZATION_PREFIXES
        .iter()
        .filter(|(prefix, _)| module_path.starts_with(prefix))
        .max_by_key(|(prefix, _)| prefix.len())
        .map(|(_, org)| *org);
    if table_match.is_some() {
        return table_match;
    }

    module_path
        .strip_prefix("github.com/")
        .and_then(|rest| rest.split('/').next())
        .filter(|owner| !owner.is_empty())
}

/// First path element, e.g. `github.com` or `golang.org`.
pub fn host(module_path: &str) -> &str {
    module_path.split('/').next().unwrap_or(module_path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn github_owner_is_the_organization() {
        assert_eq!(organization("github.com/spf13/cobra"), Some("spf13"));
        assert_eq!(organization("github.com/stretchr/testify/v2"), Some("stretchr"));
    }

    #[test]
    fn table_prefixes_win_over_github_owner() {
        assert_eq!(organization("github.com/pkg/errors"), Some("golang"));
        assert_eq!(organization("golang.org/x/mod"), Some("golang"));
        assert_eq!(organization("google.golang.org/grpc"), Some("google"));
        assert_eq!(organization("sigs.k8s.io/yaml"), Some("kubernetes"));
        assert_eq!(organization("go.uber.org/zap"), Some("uber-go"));
    }

    #[test]
    fn unknown_paths_have_no_organization() {
        assert_eq!(organization("example.com/a"), None);
        assert_eq!(organization("github.com/"), None);
    }

    #[test]
    fn host_is_first_element() {
        assert_eq!(host("github.com/spf13/cobra"), "github.com");
        assert_eq!(host("localmodule"), "localmodule");
    }
}
