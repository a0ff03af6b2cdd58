//! String template rendering utilities.
//!
//! Tool command templates use `{{name}}` placeholders resolved against the
//! pipeline layout plus per-invocation variables.

pub struct TemplateVars;

impl TemplateVars {
    pub const APP_DIR: &'static str = "appDir";
    pub const BUILD_DIR: &'static str = "buildDir";
    pub const RELEASE_DIR: &'static str = "releaseDir";
    pub const DIST_DIR: &'static str = "distDir";
    pub const CONFIG_DIR: &'static str = "configDir";
    pub const INPUT: &'static str = "input";
    pub const OUTPUT: &'static str = "output";
}

pub fn render(template: &str, variables: &[(&str, &str)]) -> String {
    let mut result = template.to_string();

    for (key, value) in variables {
        let placeholder = format!("{{{{{}}}}}", key);
        result = result.replace(&placeholder, value);
    }

    result
}

pub fn is_present(template: &str, key: &str) -> bool {
    let placeholder = format!("{{{{{}}}}}", key);
    template.contains(&placeholder)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_replaces_all_occurrences() {
        let out = render(
            "npx sass {{input}} {{output}} && cat {{output}}",
            &[("input", "a.scss"), ("output", "a.css")],
        );
        assert_eq!(out, "npx sass a.scss a.css && cat a.css");
    }

    #[test]
    fn is_present_detects_placeholder() {
        assert!(is_present("tsc --outDir {{buildDir}}", TemplateVars::BUILD_DIR));
        assert!(!is_present("tsc --outDir build", TemplateVars::BUILD_DIR));
    }
}
