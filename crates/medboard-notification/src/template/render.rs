//! Variable and conditional substitution.
//!
//! Supported syntax:
//!
//! - `{{#if name}}...{{/if}}` keeps the inner text when `name` is truthy
//! - `{{#unless name}}...{{/unless}}` keeps it when `name` is falsy
//! - `{{name}}` is replaced by the value, or by nothing if `name` is absent
//!
//! Blocks are resolved before placeholders and do not nest. Anything else
//! between braces (`{{> partial}}`, `{{#each x}}`, an unterminated block)
//! is copied through unchanged.

use std::borrow::Cow;

use serde_json::{Map, Value};

use super::TemplateError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BlockKind {
    If,
    Unless,
}

struct Block<'a> {
    kind: BlockKind,
    name: &'a str,
    body: &'a str,
    /// Bytes consumed from the opening `{{#` through the closing tag.
    len: usize,
}

/// Render `template` against the variables in `data`, which must be a JSON
/// object.
pub fn render(template: &str, data: &Value) -> Result<String, TemplateError> {
    let vars = data.as_object().ok_or(TemplateError::InvalidData)?;
    let resolved = resolve_blocks(template, vars);
    Ok(substitute(&resolved, vars))
}

/// Template truthiness: absent, `null`, `false`, `0` and `""` are falsy.
pub fn is_truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(_)) | Some(Value::Object(_)) => true,
    }
}

fn display_value(value: Option<&Value>) -> Cow<'_, str> {
    match value {
        None | Some(Value::Null) => Cow::Borrowed(""),
        Some(Value::String(s)) => Cow::Borrowed(s),
        Some(Value::Bool(b)) => Cow::Owned(b.to_string()),
        Some(Value::Number(n)) => Cow::Owned(n.to_string()),
        Some(other) => Cow::Owned(other.to_string()),
    }
}

fn is_identifier(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn resolve_blocks(template: &str, vars: &Map<String, Value>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("{{#") {
        out.push_str(&rest[..start]);
        let tail = &rest[start..];

        match parse_block(tail) {
            Some(block) => {
                let truthy = is_truthy(vars.get(block.name));
                let keep = match block.kind {
                    BlockKind::If => truthy,
                    BlockKind::Unless => !truthy,
                };
                if keep {
                    out.push_str(block.body);
                }
                rest = &tail[block.len..];
            }
            None => {
                out.push_str("{{#");
                rest = &tail[3..];
            }
        }
    }

    out.push_str(rest);
    out
}

/// Parse a block starting at `tail`, which begins with `{{#`.
fn parse_block(tail: &str) -> Option<Block<'_>> {
    let open_end = tail.find("}}")?;
    let (keyword, name) = tail[3..open_end].trim().split_once(char::is_whitespace)?;
    let name = name.trim();
    if !is_identifier(name) {
        return None;
    }

    let kind = match keyword {
        "if" => BlockKind::If,
        "unless" => BlockKind::Unless,
        _ => return None,
    };

    let close = format!("{{{{/{keyword}}}}}");
    let body_start = open_end + 2;
    let body_len = tail[body_start..].find(&close)?;

    Some(Block {
        kind,
        name,
        body: &tail[body_start..body_start + body_len],
        len: body_start + body_len + close.len(),
    })
}

fn substitute(text: &str, vars: &Map<String, Value>) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let tail = &rest[start..];

        let Some(end) = tail[2..].find("}}") else {
            rest = tail;
            break;
        };

        let name = tail[2..2 + end].trim();
        if is_identifier(name) {
            out.push_str(&display_value(vars.get(name)));
            rest = &tail[end + 4..];
        } else {
            out.push_str("{{");
            rest = &tail[2..];
        }
    }

    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_substitutes_variables() {
        let out = render(
            "Hello {{name}}, you have {{ count }} new applicants.",
            &json!({"name": "Dr. Okafor", "count": 3}),
        )
        .unwrap();
        assert_eq!(out, "Hello Dr. Okafor, you have 3 new applicants.");
    }

    #[test]
    fn test_missing_variable_becomes_empty() {
        let out = render("[{{missing}}]", &json!({})).unwrap();
        assert_eq!(out, "[]");
    }

    #[test]
    fn test_falsy_if_block_is_removed() {
        let tpl = "A{{#if premium}}<b>premium listing</b>{{/if}}B";
        for value in [json!(false), json!(0), json!(""), json!(null)] {
            let out = render(tpl, &json!({ "premium": value })).unwrap();
            assert_eq!(out, "AB");
        }
        assert_eq!(render(tpl, &json!({})).unwrap(), "AB");
    }

    #[test]
    fn test_truthy_if_block_keeps_inner_text() {
        let out = render(
            "A{{#if premium}}<b>{{plan}}</b>{{/if}}B",
            &json!({"premium": true, "plan": "gold"}),
        )
        .unwrap();
        assert_eq!(out, "A<b>gold</b>B");
    }

    #[test]
    fn test_unless_block() {
        let tpl = "{{#unless verified}}Please verify your email.{{/unless}}";
        assert_eq!(
            render(tpl, &json!({"verified": false})).unwrap(),
            "Please verify your email."
        );
        assert_eq!(render(tpl, &json!({"verified": "yes"})).unwrap(), "");
    }

    #[test]
    fn test_several_blocks_of_both_kinds() {
        let tpl = "{{#if a}}1{{/if}}{{#unless a}}2{{/unless}}{{#if b}}3{{/if}}";
        assert_eq!(render(tpl, &json!({"a": 1, "b": [] })).unwrap(), "13");
    }

    #[test]
    fn test_unknown_directives_are_left_alone() {
        let tpl = "{{> footer}} {{#each jobs}}x{{/each}} {{not a var}}";
        assert_eq!(render(tpl, &json!({"jobs": [1]})).unwrap(), tpl);
    }

    #[test]
    fn test_unterminated_block_is_left_alone() {
        let tpl = "{{#if open}}never closed";
        assert_eq!(render(tpl, &json!({"open": true})).unwrap(), tpl);
    }

    #[test]
    fn test_unterminated_placeholder_is_left_alone() {
        assert_eq!(render("{{name", &json!({"name": "x"})).unwrap(), "{{name");
    }

    #[test]
    fn test_value_string_forms() {
        let out = render(
            "{{s}}|{{b}}|{{n}}|{{f}}|{{z}}|{{arr}}",
            &json!({"s": "text", "b": false, "n": 42, "f": 1.5, "z": null, "arr": [1, 2]}),
        )
        .unwrap();
        assert_eq!(out, "text|false|42|1.5||[1,2]");
    }

    #[test]
    fn test_substituted_values_are_not_rescanned() {
        let out = render("{{a}}", &json!({"a": "{{b}}", "b": "nope"})).unwrap();
        assert_eq!(out, "{{b}}");
    }

    #[test]
    fn test_non_object_data_is_rejected() {
        let err = render("{{x}}", &json!(["x"])).unwrap_err();
        assert!(matches!(err, TemplateError::InvalidData));
    }
}
