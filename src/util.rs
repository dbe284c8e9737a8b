// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

use rand::Rng;

use crate::param::STATUS_CODES;

const CODE_KEYSPACE: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";

const DEFAULT_CSS: &str = r"
            body {
                width: 35em;
                margin: 0 auto;
                font-family: Tahoma, Verdana, Arial, sans-serif;
            }
            .error { color: #b00020; }
            .warning { color: #8a6d00; }
            .success { color: #1b7f3b; }
            ";

pub struct HtmlBuilder {
    title: String,
    css: String,
    script: String,
    body: String,
}

impl HtmlBuilder {
    /// 状态码页面；`note` 为空时使用标准原因短语，未知状态码回退为 500 的短语
    pub fn from_status_code(code: u16, note: Option<&str>) -> Self {
        let title = format!("{}", code);
        let description = match note {
            Some(n) => n,
            None => STATUS_CODES
                .get(&code)
                .copied()
                .unwrap_or("Internal Server Error"),
        };
        let body = format!(
            r"
            <h1>{}</h1>
            <p>{}</p>
            ",
            code, description
        );
        Self {
            title,
            css: DEFAULT_CSS.to_string(),
            script: "".to_string(),
            body,
        }
    }

    /// 由视图组装好的正文构造页面，`body` 不会再被转义
    pub fn from_body(title: &str, body: String) -> Self {
        Self {
            title: escape_html(title),
            css: DEFAULT_CSS.to_string(),
            script: "".to_string(),
            body,
        }
    }

    pub fn build(&self) -> String {
        format!(
            r##"<!DOCTYPE html>
            <!-- 本文件由bang框架自动生成 -->
            <html>
                <head>
                    <meta charset="utf-8">
                    <script>{}</script>
                    <title>{}</title>
                    <style>{}</style>
                </head>
                <body>
                {}
                </body>
            </html>"##,
            self.script, self.title, self.css, self.body
        )
    }
}

/// 转义 HTML 特殊字符，包括单双引号
pub fn escape_html(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#039;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// 生成指定长度的随机字母数字串
pub fn generate_code(length: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..length)
        .map(|_| CODE_KEYSPACE[rng.gen_range(0..CODE_KEYSPACE.len())] as char)
        .collect()
}

/// 首字母大写，`blog` -> `Blog`
pub fn ucfirst(value: &str) -> String {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_html_builder_from_status_code() {
        let html = HtmlBuilder::from_status_code(404, Some("页面不存在")).build();
        assert!(html.contains("404"));
        assert!(html.contains("页面不存在"));
        assert!(html.contains("<!DOCTYPE html>"));
        assert!(html.contains("</html>"));
    }

    #[test]
    fn test_html_builder_from_status_code_no_note() {
        let html = HtmlBuilder::from_status_code(403, None).build();
        assert!(html.contains("403"));
        assert!(html.contains("Forbidden"));
    }

    #[test]
    fn test_html_builder_unknown_status_code() {
        let html = HtmlBuilder::from_status_code(999, None).build();
        assert!(html.contains("Internal Server Error"));
    }

    #[test]
    fn test_html_builder_from_body_escapes_title_only() {
        let html = HtmlBuilder::from_body("<Blog>", "<p>post</p>".to_string()).build();
        assert!(html.contains("<title>&lt;Blog&gt;</title>"));
        assert!(html.contains("<p>post</p>"));
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(
            escape_html(r#"<a href="x">O'Neil & co</a>"#),
            "&lt;a href=&quot;x&quot;&gt;O&#039;Neil &amp; co&lt;/a&gt;"
        );
        assert_eq!(escape_html("plain"), "plain");
    }

    #[test]
    fn test_generate_code() {
        let code = generate_code(32);
        assert_eq!(code.len(), 32);
        assert!(code.chars().all(|c| c.is_ascii_alphanumeric()));
        assert!(generate_code(0).is_empty());
    }

    #[test]
    fn test_ucfirst() {
        assert_eq!(ucfirst("blog"), "Blog");
        assert_eq!(ucfirst("Blog"), "Blog");
        assert_eq!(ucfirst(""), "");
    }
}
