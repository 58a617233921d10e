//! `{{placeholder}}` templates used throughout recipes.

/// Names of the placeholders appearing in `template`, in order.
///
/// Names are not trimmed. An opening `{{` without a closing `}}` yields the
/// remainder as a name, which never matches a known placeholder.
pub fn placeholders(template: &str) -> Vec<&str> {
    let mut found = Vec::new();
    let mut rest = template;
    while let Some(start) = rest.find("{{") {
        let after = &rest[start + 2..];
        match after.find("}}") {
            Some(end) => {
                found.push(&after[..end]);
                rest = &after[end + 2..];
            }
            None => {
                found.push(after);
                break;
            }
        }
    }
    found
}

/// Substitute every `{{key}}` in `template` with its value from `vars`.
///
/// Unknown placeholders are left in place.
pub fn render(template: &str, vars: &[(&str, &str)]) -> String {
    let mut out = template.to_string();
    for (key, value) in vars {
        out = out.replace(&format!("{{{{{key}}}}}"), value);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholders_in_order() {
        assert_eq!(
            placeholders("{{title}}-{{version}}-{{ arch }}"),
            vec!["title", "version", " arch "]
        );
        assert!(placeholders("plain").is_empty());
        assert_eq!(placeholders("a{{broken"), vec!["broken"]);
    }

    #[test]
    fn test_render_substitutes_known_keys() {
        let out = render(
            "{{title}}-{{version}}.{{ext}}",
            &[("title", "foo"), ("version", "1.0")],
        );
        assert_eq!(out, "foo-1.0.{{ext}}");
    }
}
