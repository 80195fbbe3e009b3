/// Derives the workspace alias used when creating the workspace.
///
/// An override keeps only `[A-Za-z0-9-]`; otherwise the project code is used
/// with its hyphens removed.
#[must_use]
pub fn derive_alias(project_code: &str, site_name_override: Option<&str>) -> String {
    match site_name_override {
        Some(name) => name
            .chars()
            .filter(|c| c.is_ascii_alphanumeric() || *c == '-')
            .collect(),
        None => project_code.chars().filter(|c| *c != '-').collect(),
    }
}
