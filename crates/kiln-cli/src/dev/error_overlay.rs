//! Page shown in place of HTML documents while the last build is failing.

/// Render the overlay for a build error.
///
/// The page subscribes to the event stream itself, so it reloads once a
/// later build succeeds.
pub fn render(error: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <title>Build failed</title>
  <style>
    body {{ margin: 0; background: #1b1b1f; color: #e8e8ea; font-family: ui-sans-serif, system-ui, sans-serif; }}
    main {{ max-width: 960px; margin: 4rem auto; padding: 0 1.5rem; }}
    h1 {{ color: #ff6b6b; font-size: 1.4rem; }}
    pre {{ background: #26262c; padding: 1rem; border-radius: 6px; overflow-x: auto; white-space: pre-wrap; line-height: 1.45; }}
    p {{ color: #9a9aa3; }}
  </style>
</head>
<body>
  <main>
    <h1>Build failed</h1>
    <pre>{}</pre>
    <p>The page reloads when the next build succeeds.</p>
  </main>
  <script src="{}"></script>
</body>
</html>
"#,
        html_escape(error),
        super::RELOAD_SCRIPT_PATH
    )
}

/// Escape text for inclusion in HTML.
pub fn html_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_markup() {
        assert_eq!(html_escape("a & b"), "a &amp; b");
        assert_eq!(
            html_escape("<script>alert('x')</script>"),
            "&lt;script&gt;alert(&#x27;x&#x27;)&lt;/script&gt;"
        );
        assert_eq!(html_escape("plain"), "plain");
    }

    #[test]
    fn overlay_embeds_escaped_error() {
        let html = render("expected `u32`, found `&str`\n --> src/lib.rs:3:5");
        assert!(html.contains("expected `u32`, found `&amp;str`"));
        assert!(html.contains("src/lib.rs:3:5"));
        assert!(html.contains(super::super::RELOAD_SCRIPT_PATH));
    }
}
