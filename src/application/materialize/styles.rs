/// Per-version stylesheet: the bundle's base layers, then the documentation's
/// own CSS inside its own cascade layer.
pub fn render_stylesheet(
    base: &str,
    custom_css: Option<&str>,
    primary_color: Option<&str>,
) -> String {
    let mut css = String::with_capacity(base.len() + 128);
    css.push_str(base.trim_end());
    css.push('\n');

    if let Some(color) = primary_color
        .map(str::trim)
        .filter(|color| is_safe_color(color))
    {
        css.push_str(&format!("\n:root {{\n  --docsmith-primary: {color};\n}}\n"));
    }

    if let Some(custom) = custom_css.map(str::trim).filter(|custom| !custom.is_empty()) {
        css.push_str("\n@layer docsmith-custom {\n");
        css.push_str(custom);
        css.push_str("\n}\n");
    }

    css
}

fn is_safe_color(value: &str) -> bool {
    !value.is_empty()
        && value
            .chars()
            .all(|ch| {
                ch.is_ascii_alphanumeric()
                    || matches!(ch, '#' | '(' | ')' | ',' | '.' | '%' | ' ')
            })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn appends_color_and_custom_layer() {
        let css = render_stylesheet(
            "@layer base {}\n\n",
            Some(" h1 { color: red; } "),
            Some("#ff0000"),
        );
        assert_eq!(
            css,
            "@layer base {}\n\n:root {\n  --docsmith-primary: #ff0000;\n}\n\n@layer docsmith-custom {\nh1 { color: red; }\n}\n"
        );
    }

    #[test]
    fn rejects_colors_that_escape_the_declaration() {
        let css = render_stylesheet("", None, Some("red; } body { display: none"));
        assert_eq!(css, "\n");
    }
}
