//! Code fence rendering.
//!
//! [`BaseFence`] produces the site's code block markup, including the copy
//! button. [`LocalizedFence`] wraps any [`FenceRender`] and patches its
//! output for the active locale.

/// Copy button markup as emitted by the base renderer.
pub const DEFAULT_COPY_BUTTON: &str = r#"<button title="Copy Code" class="copy"></button>"#;

const ESCAPED_ANNOTATION: &str = "[!!code";
const ANNOTATION: &str = "[!code";

/// Per-render context handed down by the markdown renderer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderEnv {
    pub locale_index: String,
}

impl Default for RenderEnv {
    fn default() -> Self {
        Self {
            locale_index: "root".to_string(),
        }
    }
}

impl RenderEnv {
    pub fn new(locale_index: impl Into<String>) -> Self {
        Self {
            locale_index: locale_index.into(),
        }
    }
}

/// Renders one fenced code block to HTML.
pub trait FenceRender: Send + Sync {
    /// `info` is the raw fence info string (`rust`, `ts {1,3}`, ...).
    fn render(&self, code: &str, info: &str, env: &RenderEnv) -> String;
}

impl<F> FenceRender for F
where
    F: Fn(&str, &str, &RenderEnv) -> String + Send + Sync,
{
    fn render(&self, code: &str, info: &str, env: &RenderEnv) -> String {
        self(code, info, env)
    }
}

/// Title for the copy button in the given locale.
pub fn copy_button_title(locale_index: &str) -> &'static str {
    match locale_index {
        "es" => "Copiar código",
        "fa" => "کپی کد",
        "ko" => "코드 복사",
        "pt" => "Copiar código",
        "ru" => "Скопировать код",
        "zh" => "复制代码",
        _ => "Copy code",
    }
}

/// Undoes the double escaping an upstream transform applies to
/// `[!code ...]` annotations.
pub fn unescape_code_annotations(code: &str) -> String {
    code.replace(ESCAPED_ANNOTATION, ANNOTATION)
}

#[derive(Debug, Clone, Default)]
pub struct BaseFence {
    pub line_numbers: bool,
}

impl BaseFence {
    pub fn new(line_numbers: bool) -> Self {
        Self { line_numbers }
    }
}

impl FenceRender for BaseFence {
    fn render(&self, code: &str, info: &str, _env: &RenderEnv) -> String {
        let lang = info.split_whitespace().next().unwrap_or("txt");
        let lang = htmlescape::encode_attribute(lang);
        let class = if self.line_numbers {
            format!("language-{lang} vp-adaptive-theme line-numbers-mode")
        } else {
            format!("language-{lang} vp-adaptive-theme")
        };

        let mut html = format!(
            "<div class=\"{class}\">{DEFAULT_COPY_BUTTON}<span class=\"lang\">{lang}</span><pre><code>{}</code></pre>",
            htmlescape::encode_minimal(code)
        );

        if self.line_numbers {
            html.push_str("<div class=\"line-numbers-wrapper\" aria-hidden=\"true\">");
            for n in 1..=code.trim_end_matches('\n').lines().count().max(1) {
                html.push_str(&format!("<span class=\"line-number\">{n}</span><br>"));
            }
            html.push_str("</div>");
        }

        html.push_str("</div>\n");
        html
    }
}

/// Decorator that repairs escaped annotations before rendering and
/// localizes the copy button afterwards.
#[derive(Debug, Clone)]
pub struct LocalizedFence<R> {
    inner: R,
}

impl<R: FenceRender> LocalizedFence<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }
}

impl<R: FenceRender> FenceRender for LocalizedFence<R> {
    fn render(&self, code: &str, info: &str, env: &RenderEnv) -> String {
        let code = unescape_code_annotations(code);
        let html = self.inner.render(&code, info, env);

        let title = copy_button_title(&env.locale_index);
        html.replacen(
            DEFAULT_COPY_BUTTON,
            &format!(r#"<button title="{title}" class="copy"></button>"#),
            1,
        )
    }
}
