use agaudit_types::{dotted_get, render_value};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde_json::Value;

static TEMPLATE_VAR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$\{([^}]+)\}").expect("template regex is valid"));

/// Substitute `${dotted.path}` placeholders against a details value.
/// Missing paths render as the literal `<dotted.path>` so a broken template
/// stays visible instead of failing the check.
pub fn substitute_template(template: &str, details: &Value) -> String {
    TEMPLATE_VAR
        .replace_all(template, |caps: &Captures<'_>| {
            let path = &caps[1];
            match dotted_get(details, path) {
                Some(value) => render_value(value),
                None => format!("<{}>", path),
            }
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn substitutes_dotted_paths() {
        let details = json!({"params": {"total": 5000}, "tool_name": "create_invoice"});
        let rendered = substitute_template(
            "Invoice of ${params.total} via ${tool_name} needs approval",
            &details,
        );
        assert_eq!(rendered, "Invoice of 5000 via create_invoice needs approval");
    }

    #[test]
    fn missing_paths_render_as_placeholder() {
        let details = json!({"a": 1});
        assert_eq!(
            substitute_template("value: ${a.b.c}", &details),
            "value: <a.b.c>"
        );
    }

    #[test]
    fn plain_text_passes_through() {
        assert_eq!(
            substitute_template("no placeholders here", &json!({})),
            "no placeholders here"
        );
    }
}
