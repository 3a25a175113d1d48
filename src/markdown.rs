use pulldown_cmark::{html, CodeBlockKind, CowStr, Event, Options, Parser, Tag, TagEnd};
use scraper::Html;

use crate::config::MarkdownConfig;
use crate::fence::{BaseFence, FenceRender, LocalizedFence, RenderEnv};

fn markdown_options() -> Options {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_MATH);
    options
}

/// Markdown to HTML with KaTeX math and code fences routed through a
/// [`FenceRender`].
pub struct MarkdownRenderer {
    fence: Box<dyn FenceRender>,
}

impl MarkdownRenderer {
    pub fn new(fence: impl FenceRender + 'static) -> Self {
        Self {
            fence: Box::new(fence),
        }
    }

    /// The site's renderer: base fence markup with the locale patch on top.
    pub fn for_site(config: &MarkdownConfig) -> Self {
        Self::new(LocalizedFence::new(BaseFence::new(config.line_numbers)))
    }

    pub fn render(&self, markdown: &str, env: &RenderEnv) -> String {
        let normalized_markdown = normalize_latex_delimiters(markdown);
        let mut events = Vec::new();
        let mut code_block: Option<(String, String)> = None;

        for event in Parser::new_ext(&normalized_markdown, markdown_options()) {
            match event {
                Event::Start(Tag::CodeBlock(kind)) => {
                    let info = match kind {
                        CodeBlockKind::Fenced(info) => info.into_string(),
                        CodeBlockKind::Indented => String::new(),
                    };
                    code_block = Some((info, String::new()));
                }
                Event::Text(text) if code_block.is_some() => {
                    if let Some((_, code)) = code_block.as_mut() {
                        code.push_str(&text);
                    }
                }
                Event::End(TagEnd::CodeBlock) => {
                    if let Some((info, code)) = code_block.take() {
                        let rendered = self.fence.render(&code, &info, env);
                        events.push(Event::Html(CowStr::Boxed(rendered.into_boxed_str())));
                    }
                }
                Event::InlineMath(math) => {
                    events.push(Event::Html(CowStr::Boxed(render_math_html(&math, false).into_boxed_str())))
                }
                Event::DisplayMath(math) => {
                    events.push(Event::Html(CowStr::Boxed(render_math_html(&math, true).into_boxed_str())))
                }
                other => events.push(other),
            }
        }

        let mut html_out = String::new();
        html::push_html(&mut html_out, events.into_iter());
        html_out
    }
}

/// Renders `markdown` without math or fence handling and keeps only the
/// text, whitespace collapsed.
pub fn markdown_to_plain_text(markdown: &str) -> String {
    let mut html_out = String::new();
    html::push_html(&mut html_out, Parser::new_ext(markdown, markdown_options()));
    plain_text(&html_out)
}

pub fn plain_text(html: &str) -> String {
    let fragment = Html::parse_fragment(html);
    let text: String = fragment.root_element().text().collect();
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Rewrites `\(..\)` and `\[..\]` to dollar delimiters, leaving fenced code
/// untouched.
fn normalize_latex_delimiters(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut prose = String::new();
    let mut open_fence: Option<&str> = None;

    for line in input.split_inclusive('\n') {
        let marker = fence_marker(line);
        match (open_fence, marker) {
            (None, Some(marker)) => {
                out.push_str(&normalize_prose(&prose));
                prose.clear();
                open_fence = Some(marker);
                out.push_str(line);
            }
            (Some(open), Some(marker)) if marker == open => {
                open_fence = None;
                out.push_str(line);
            }
            (Some(_), _) => out.push_str(line),
            (None, None) => prose.push_str(line),
        }
    }

    out.push_str(&normalize_prose(&prose));
    out
}

fn fence_marker(line: &str) -> Option<&'static str> {
    let trimmed = line.trim_start();
    if trimmed.starts_with("```") {
        Some("```")
    } else if trimmed.starts_with("~~~") {
        Some("~~~")
    } else {
        None
    }
}

fn normalize_prose(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut i = 0;

    while i < input.len() {
        if let Some((open, close, display_mode)) = delimiter_at(input, i) {
            let content_start = i + open.len();
            if let Some(close_at) = input[content_start..].find(close) {
                let content_end = content_start + close_at;
                let content = &input[content_start..content_end];
                if display_mode || content.contains('\n') {
                    out.push_str("$$");
                    out.push_str(content);
                    out.push_str("$$");
                } else {
                    out.push('$');
                    out.push_str(content);
                    out.push('$');
                }
                i = content_end + close.len();
                continue;
            }
        }

        if let Some(ch) = input[i..].chars().next() {
            out.push(ch);
            i += ch.len_utf8();
        } else {
            break;
        }
    }

    out
}

fn delimiter_at(input: &str, index: usize) -> Option<(&'static str, &'static str, bool)> {
    let tail = &input[index..];
    if tail.starts_with("\\(") {
        Some(("\\(", "\\)", false))
    } else if tail.starts_with("\\[") {
        Some(("\\[", "\\]", true))
    } else {
        None
    }
}

fn render_math_html(source: &str, display_mode: bool) -> String {
    let mut opts = katex::Opts::builder();
    opts.display_mode(display_mode);

    let rendered = match opts.build() {
        Ok(opts) => katex::render_with_opts(source, opts),
        Err(_) => return fallback_math_html(source, display_mode),
    };

    rendered.unwrap_or_else(|_| fallback_math_html(source, display_mode))
}

fn fallback_math_html(source: &str, display_mode: bool) -> String {
    let class_name = if display_mode { "math math-display" } else { "math math-inline" };
    format!("<span class=\"{class_name}\">{}</span>", htmlescape::encode_minimal(source))
}
