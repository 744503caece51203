//! Name templates for batches, input objects and output artifacts
//!
//! Templates use `{}` as a positional placeholder, or a named one
//! (`{index}` for batch indices, `{name}` for batch names).

/// Renders a template, replacing `{}` and `{key}` with `value`
pub fn render(template: &str, key: &str, value: &str) -> String {
    template
        .replace(&format!("{{{}}}", key), value)
        .replace("{}", value)
}

/// Returns true if the template contains `{}` or `{key}`
pub fn has_placeholder(template: &str, key: &str) -> bool {
    template.contains("{}") || template.contains(&format!("{{{}}}", key))
}
