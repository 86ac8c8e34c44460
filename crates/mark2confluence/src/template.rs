use std::path::{Component, Path};

use handlebars::Handlebars;
use serde::Serialize;

use crate::config::GithubContext;
use crate::error::SetupError;

const BANNER_TEMPLATE_NAME: &str = "banner";

/// Default provenance banner, followed by a Confluence table of contents macro.
pub const DEFAULT_HEADER_TEMPLATE: &str = "---\n\n**WARNING**: This page is automatically generated from [this source code]({{ source_link }})\n\n---\n<!-- Include: ac:toc -->\n\n";

/// Variables available to `HEADER_TEMPLATE`.
#[derive(Clone, Debug, Serialize)]
pub struct BannerContext {
    pub source_link: String,
    pub path: String,
    pub repository: String,
    pub ref_name: String,
}

impl BannerContext {
    pub fn for_file(github: &GithubContext, workspace: &Path, path: &Path) -> Self {
        let relative = workspace_relative(workspace, path);
        Self {
            source_link: source_link(github, &relative),
            path: relative,
            repository: github.repository.clone(),
            ref_name: github.ref_name.clone(),
        }
    }
}

/// Compiled `HEADER_TEMPLATE`. Output is not HTML-escaped.
pub struct HeaderTemplate {
    registry: Handlebars<'static>,
}

impl HeaderTemplate {
    /// Compiles the template once at startup; syntax errors are setup errors.
    pub fn compile(raw: &str) -> Result<Self, SetupError> {
        let mut registry = Handlebars::new();
        registry.register_escape_fn(handlebars::no_escape);
        registry
            .register_template_string(BANNER_TEMPLATE_NAME, raw)
            .map_err(|err| SetupError::HeaderTemplate(err.to_string()))?;
        Ok(Self { registry })
    }

    pub fn render(&self, context: &BannerContext) -> Result<String, handlebars::RenderError> {
        self.registry.render(BANNER_TEMPLATE_NAME, context)
    }
}

/// `{server}/{repository}/blob/{ref}/{relative path}`.
pub fn source_link(github: &GithubContext, relative_path: &str) -> String {
    format!(
        "{}/{}/blob/{}/{}",
        github.server_url.trim_end_matches('/'),
        github.repository.trim_matches('/'),
        github.ref_name,
        relative_path.trim_start_matches('/')
    )
}

/// Path of `path` below `workspace` with `/` separators, or the path itself
/// when it lives elsewhere.
pub fn workspace_relative(workspace: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(workspace).unwrap_or(path);
    relative
        .components()
        .filter_map(|component| match component {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn github() -> GithubContext {
        GithubContext {
            server_url: "https://github.com".into(),
            repository: "acme/docs".into(),
            ref_name: "main".into(),
            ..GithubContext::default()
        }
    }

    #[test]
    fn default_template_compiles_and_renders_link() {
        let template = HeaderTemplate::compile(DEFAULT_HEADER_TEMPLATE).unwrap();
        let context = BannerContext::for_file(
            &github(),
            Path::new("/ws"),
            Path::new("/ws/docs/guide.md"),
        );

        let rendered = template.render(&context).unwrap();

        assert!(
            rendered.contains("[this source code](https://github.com/acme/docs/blob/main/docs/guide.md)"),
            "{rendered}"
        );
        assert!(rendered.ends_with("<!-- Include: ac:toc -->\n\n"));
    }

    #[test]
    fn invalid_template_is_setup_error() {
        let err = HeaderTemplate::compile("{{").err().expect("must fail");
        assert!(matches!(err, SetupError::HeaderTemplate(_)));
        assert!(err.to_string().starts_with("Setup error, HEADER_TEMPLATE"));
    }

    #[test]
    fn rendered_links_are_not_html_escaped() {
        let template = HeaderTemplate::compile("{{source_link}}").unwrap();
        let context = BannerContext {
            source_link: "https://x/a?b=1&c=2".into(),
            path: String::new(),
            repository: String::new(),
            ref_name: String::new(),
        };
        assert_eq!(template.render(&context).unwrap(), "https://x/a?b=1&c=2");
    }

    #[test]
    fn relative_path_drops_current_dir_components() {
        assert_eq!(
            workspace_relative(Path::new("."), Path::new("./docs/a.md")),
            "docs/a.md"
        );
        assert_eq!(
            workspace_relative(Path::new("/ws"), Path::new("/other/a.md")),
            "other/a.md"
        );
    }
}
