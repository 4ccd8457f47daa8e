//! Prompt template rendering
//!
//! Templates carry `{placeholder}` slots. Rendering substitutes declared
//! arguments; `{{` and `}}` escape literal braces. Unknown placeholders and
//! missing required arguments are invalid-argument errors.

use std::collections::BTreeSet;

use serde_json::Value;

use super::descriptor::{PromptArgumentSpec, PromptSpec};
use crate::error::{Error, Result};

/// Extract the placeholder names used by a template
pub fn placeholders(template: &str) -> Result<BTreeSet<String>> {
    let mut names = BTreeSet::new();
    let mut chars = template.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '{' => {
                if chars.peek() == Some(&'{') {
                    chars.next();
                    continue;
                }
                let mut name = String::new();
                loop {
                    match chars.next() {
                        Some('}') => break,
                        Some(c) if c.is_ascii_alphanumeric() || c == '_' => name.push(c),
                        Some(c) => {
                            return Err(Error::invalid_argument(format!(
                                "unexpected character '{c}' inside placeholder"
                            )))
                        }
                        None => {
                            return Err(Error::invalid_argument("unterminated placeholder"));
                        }
                    }
                }
                if name.is_empty() {
                    return Err(Error::invalid_argument("empty placeholder"));
                }
                names.insert(name);
            }
            '}' => {
                if chars.peek() == Some(&'}') {
                    chars.next();
                } else {
                    return Err(Error::invalid_argument("unmatched '}' in template"));
                }
            }
            _ => {}
        }
    }

    Ok(names)
}

/// Check that every placeholder is a declared argument
pub fn validate_placeholders(template: &str, arguments: &[PromptArgumentSpec]) -> Result<()> {
    let used = placeholders(template)?;
    for name in &used {
        if !arguments.iter().any(|a| &a.name == name) {
            return Err(Error::invalid_argument(format!(
                "placeholder '{{{name}}}' has no declared argument"
            )));
        }
    }
    Ok(())
}

/// Render a prompt with the supplied arguments
///
/// Required arguments must be present; extra arguments are rejected so a
/// typo never silently disappears.
pub fn render(spec: &PromptSpec, arguments: &serde_json::Map<String, Value>) -> Result<String> {
    for arg in &spec.arguments {
        if arg.required && !arguments.contains_key(&arg.name) {
            return Err(Error::invalid_argument(format!(
                "missing required argument '{}'",
                arg.name
            )));
        }
    }
    for key in arguments.keys() {
        if !spec.arguments.iter().any(|a| &a.name == key) {
            return Err(Error::invalid_argument(format!(
                "unknown argument '{key}'"
            )));
        }
    }

    let mut out = String::with_capacity(spec.template.len());
    let mut chars = spec.template.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '{' => {
                if chars.peek() == Some(&'{') {
                    chars.next();
                    out.push('{');
                    continue;
                }
                let mut name = String::new();
                for c in chars.by_ref() {
                    if c == '}' {
                        break;
                    }
                    name.push(c);
                }
                match arguments.get(&name) {
                    Some(Value::String(s)) => out.push_str(s),
                    Some(other) => out.push_str(&other.to_string()),
                    // Optional argument left unset renders as empty
                    None => {}
                }
            }
            '}' => {
                if chars.peek() == Some(&'}') {
                    chars.next();
                }
                out.push('}');
            }
            _ => out.push(c),
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(template: &str, args: &[(&str, bool)]) -> PromptSpec {
        PromptSpec {
            template: template.to_string(),
            arguments: args
                .iter()
                .map(|(name, required)| PromptArgumentSpec {
                    name: (*name).to_string(),
                    description: String::new(),
                    arg_type: "string".to_string(),
                    required: *required,
                })
                .collect(),
        }
    }

    fn args(pairs: &[(&str, &str)]) -> serde_json::Map<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), Value::String((*v).to_string())))
            .collect()
    }

    #[test]
    fn renders_placeholders() {
        let spec = spec("Summarize {topic} in {style} style", &[("topic", true), ("style", false)]);
        let out = render(&spec, &args(&[("topic", "Rust"), ("style", "short")])).unwrap();
        assert_eq!(out, "Summarize Rust in short style");
    }

    #[test]
    fn missing_required_argument_fails() {
        let spec = spec("Hello {name}", &[("name", true)]);
        let err = render(&spec, &args(&[])).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument { .. }));
    }

    #[test]
    fn unknown_argument_fails() {
        let spec = spec("Hello {name}", &[("name", false)]);
        let err = render(&spec, &args(&[("nmae", "typo")])).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument { .. }));
    }

    #[test]
    fn escaped_braces_render_literally() {
        let spec = spec("a {{literal}} and {value}", &[("value", true)]);
        let out = render(&spec, &args(&[("value", "x")])).unwrap();
        assert_eq!(out, "a {literal} and x");
    }

    #[test]
    fn undeclared_placeholder_rejected_at_validation() {
        let err = validate_placeholders("Hi {who}", &[]).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument { .. }));
    }
}
