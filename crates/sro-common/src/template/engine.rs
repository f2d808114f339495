//! Template engine for runtime fact injection
//!
//! Uses minijinja with custom syntax configuration:
//! - Variable delimiters: `${...}`
//! - Block delimiters: `{%...%}`
//! - Comment delimiters: `{#...#}`
//! - Escape: `$${...}` produces literal `${...}` after the final pass
//!
//! Go templates (`{{ ... }}`) in manifests, such as Prometheus alert
//! annotations, pass through untouched.

use minijinja::syntax::SyntaxConfig;
use minijinja::{Environment, UndefinedBehavior};
use serde::Serialize;

use super::error::TemplateError;

/// Placeholder for escaped `$${` while a pass renders
const ESCAPED_PLACEHOLDER: &str = "\x00__SRO_ESCAPED_DOLLAR_BRACE__\x00";

/// Number of substitution passes applied to each document.
///
/// Two passes resolve one level of indirection: a value that itself contains
/// a placeholder. A second level of indirection is left unresolved and
/// reported as an error.
pub const RENDER_PASSES: u8 = 2;

/// Template engine for `${...}` placeholder resolution
pub struct TemplateEngine {
    env: Environment<'static>,
}

impl Default for TemplateEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateEngine {
    /// Create a new template engine
    ///
    /// # Panics
    ///
    /// Panics if minijinja rejects the hardcoded delimiters, which indicates an
    /// incompatible library version.
    pub fn new() -> Self {
        let syntax = SyntaxConfig::builder()
            .variable_delimiters("${", "}")
            .block_delimiters("{%", "%}")
            .comment_delimiters("{#", "#}")
            .build()
            .expect("template syntax configuration is hardcoded and valid");

        let mut env = Environment::new();
        env.set_syntax(syntax);
        env.set_undefined_behavior(UndefinedBehavior::Strict);
        env.set_keep_trailing_newline(true);

        Self { env }
    }

    /// Render a document with all substitution passes.
    ///
    /// # Errors
    ///
    /// Returns `TemplateError` if any pass fails (invalid syntax, undefined
    /// value) or if a placeholder is still present after the last pass.
    pub fn render<C: Serialize>(&self, document: &str, ctx: &C) -> Result<String, TemplateError> {
        let mut text = document.replace("$${", ESCAPED_PLACEHOLDER);
        for pass in 1..=RENDER_PASSES {
            text = self
                .env
                .render_str(&text, ctx)
                .map_err(|source| TemplateError::Render { pass, source })?;
        }

        if let Some(start) = text.find("${") {
            let end = text[start..]
                .find('}')
                .map(|i| start + i + 1)
                .unwrap_or(text.len());
            return Err(TemplateError::Unresolved(text[start..end].to_string()));
        }

        Ok(text.replace(ESCAPED_PLACEHOLDER, "${"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[derive(Serialize)]
    #[serde(rename_all = "PascalCase")]
    struct Facts {
        kernel_full_version: String,
        values: BTreeMap<String, String>,
    }

    fn facts(values: &[(&str, &str)]) -> Facts {
        Facts {
            kernel_full_version: "4.18.0-193.el8.x86_64".to_string(),
            values: values
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    #[test]
    fn test_direct_substitution() {
        let engine = TemplateEngine::new();
        let out = engine
            .render("image: driver:${KernelFullVersion}\n", &facts(&[]))
            .unwrap();
        assert_eq!(out, "image: driver:4.18.0-193.el8.x86_64\n");
    }

    #[test]
    fn test_one_level_of_indirection_resolves() {
        let engine = TemplateEngine::new();
        let ctx = facts(&[("image", "driver:${KernelFullVersion}")]);
        let out = engine.render("image: ${Values.image}", &ctx).unwrap();
        assert_eq!(out, "image: driver:4.18.0-193.el8.x86_64");
    }

    #[test]
    fn test_two_levels_of_indirection_fail() {
        let engine = TemplateEngine::new();
        let ctx = facts(&[
            ("image", "${Values.tag}"),
            ("tag", "driver:${KernelFullVersion}"),
        ]);
        let err = engine.render("image: ${Values.image}", &ctx).unwrap_err();
        match err {
            TemplateError::Unresolved(placeholder) => {
                assert_eq!(placeholder, "${KernelFullVersion}")
            }
            other => panic!("Expected Unresolved, got {other}"),
        }
    }

    #[test]
    fn test_undefined_value_fails() {
        let engine = TemplateEngine::new();
        let err = engine.render("x: ${Missing}", &facts(&[])).unwrap_err();
        assert!(matches!(err, TemplateError::Render { pass: 1, .. }));
    }

    #[test]
    fn test_undefined_value_introduced_by_indirection_fails_in_second_pass() {
        let engine = TemplateEngine::new();
        let ctx = facts(&[("image", "${Missing}")]);
        let err = engine.render("x: ${Values.image}", &ctx).unwrap_err();
        assert!(matches!(err, TemplateError::Render { pass: 2, .. }));
    }

    #[test]
    fn test_escape_survives_both_passes() {
        let engine = TemplateEngine::new();
        let out = engine
            .render("command: echo $${KERNEL_VERSION}", &facts(&[]))
            .unwrap();
        assert_eq!(out, "command: echo ${KERNEL_VERSION}");
    }

    #[test]
    fn test_go_templates_pass_through() {
        let engine = TemplateEngine::new();
        let doc = "summary: \"{{ $labels.instance }} is down\"";
        assert_eq!(engine.render(doc, &facts(&[])).unwrap(), doc);
    }
}
