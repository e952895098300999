use std::collections::HashMap;

/// A template for AI prompts that supports `{{name}}` substitution.
///
/// Rendering is a single left-to-right pass. Substituted values are copied
/// verbatim and never re-scanned, and placeholders without a value render as
/// the empty string.
pub struct PromptTemplate<'t> {
    template: &'t str,
}

impl<'t> PromptTemplate<'t> {
    pub const fn new(template: &'t str) -> Self {
        Self { template }
    }

    pub fn render(&self, vars: &HashMap<&str, &str>) -> String {
        let mut output = String::with_capacity(self.template.len());
        let mut rest = self.template;

        while let Some(start) = rest.find("{{") {
            output.push_str(&rest[..start]);
            let after_open = &rest[start + 2..];
            match after_open.find("}}") {
                Some(end) if is_placeholder(after_open[..end].trim()) => {
                    let key = after_open[..end].trim();
                    output.push_str(vars.get(key).copied().unwrap_or_default());
                    rest = &after_open[end + 2..];
                }
                _ => {
                    output.push_str("{{");
                    rest = after_open;
                }
            }
        }
        output.push_str(rest);
        output
    }

    /// Names of every placeholder in the template, in order of appearance.
    pub fn placeholders(&self) -> Vec<&'t str> {
        let mut names = Vec::new();
        let mut rest = self.template;
        while let Some(start) = rest.find("{{") {
            let after_open = &rest[start + 2..];
            match after_open.find("}}") {
                Some(end) if is_placeholder(after_open[..end].trim()) => {
                    names.push(after_open[..end].trim());
                    rest = &after_open[end + 2..];
                }
                _ => rest = after_open,
            }
        }
        names
    }
}

fn is_placeholder(key: &str) -> bool {
    !key.is_empty() && key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render() {
        let t = PromptTemplate::new("Hello {{name}}, welcome to {{ place }}!");
        let mut vars = HashMap::new();
        vars.insert("name", "Alice");
        vars.insert("place", "Wonderland");
        assert_eq!(t.render(&vars), "Hello Alice, welcome to Wonderland!");
    }

    #[test]
    fn missing_values_render_empty() {
        let t = PromptTemplate::new("Tone: {{tone}}\nLength: {{length}}\n");
        let mut vars = HashMap::new();
        vars.insert("length", "short");
        assert_eq!(t.render(&vars), "Tone: \nLength: short\n");
    }

    #[test]
    fn values_are_not_rescanned() {
        let t = PromptTemplate::new("Details: {{details}} / {{tone}}");
        let mut vars = HashMap::new();
        vars.insert("details", "uses {{tone}} literally");
        vars.insert("tone", "friendly");
        assert_eq!(
            t.render(&vars),
            "Details: uses {{tone}} literally / friendly"
        );
    }

    #[test]
    fn non_placeholder_braces_are_kept() {
        let t = PromptTemplate::new("{\"a\": {{not a key}}, \"b\": \"{{x}}\"} {{");
        let mut vars = HashMap::new();
        vars.insert("x", "1");
        assert_eq!(t.render(&vars), "{\"a\": {{not a key}}, \"b\": \"1\"} {{");
    }

    #[test]
    fn lists_placeholders() {
        let t = PromptTemplate::new("{{a}} and {{ b_2 }} but not {{c d}}");
        assert_eq!(t.placeholders(), vec!["a", "b_2"]);
    }
}
