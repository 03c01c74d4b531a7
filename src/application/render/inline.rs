use crate::domain::blocks::{Inline, TextStyles};

/// Render inline runs to markdown text.
pub fn render_inline(runs: &[Inline]) -> String {
    let mut output = String::new();
    for run in runs {
        match run {
            Inline::Text { text, styles } => output.push_str(&styled(text, styles)),
            Inline::Link { href, content } => {
                let label = render_inline(content);
                let label = if label.is_empty() {
                    escape_text(href)
                } else {
                    label
                };
                output.push('[');
                output.push_str(&label);
                output.push_str("](");
                output.push_str(href);
                output.push(')');
            }
            Inline::Unsupported => {}
        }
    }
    output
}

fn styled(text: &str, styles: &TextStyles) -> String {
    if text.is_empty() {
        return String::new();
    }

    if styles.code {
        return if text.contains('`') {
            format!("`` {text} ``")
        } else {
            format!("`{text}`")
        };
    }

    let mut value = escape_text(text);
    if styles.strike {
        value = format!("~~{value}~~");
    }
    if styles.italic {
        value = format!("_{value}_");
    }
    if styles.bold {
        value = format!("**{value}**");
    }
    if styles.underline {
        value = format!("<u>{value}</u>");
    }
    value
}

/// Backslash-escape characters MDX would read as an expression, a tag or a
/// link label.
pub fn escape_text(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        if matches!(ch, '\\' | '{' | '}' | '<' | '>' | '[' | ']') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}
