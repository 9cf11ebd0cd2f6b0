//! Serialized document template.

/// Escape text for HTML element content.
pub fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}

/// Escape text for a double-quoted attribute value.
pub fn escape_attr(raw: &str) -> String {
    escape_html(raw).replace('"', "&quot;").replace('\'', "&#39;")
}

/// Head content for the document.
#[derive(Debug, Clone, Default)]
pub struct HeadContent {
    /// Page title.
    pub title: Option<String>,
    /// Meta tags.
    pub meta: Vec<(String, String)>,
    /// Link tags (stylesheets, etc.).
    pub links: Vec<String>,
}

impl HeadContent {
    /// Create head content with a title.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Default::default()
        }
    }

    /// Add a meta tag.
    pub fn with_meta(mut self, name: &str, content: &str) -> Self {
        self.meta.push((name.to_string(), content.to_string()));
        self
    }

    /// Add a stylesheet link.
    pub fn with_stylesheet(mut self, href: &str) -> Self {
        self.links.push(format!(
            r#"<link rel="stylesheet" href="{}">"#,
            escape_attr(href)
        ));
        self
    }

    /// Render head content to HTML.
    pub fn render(&self) -> String {
        let mut html = String::new();

        if let Some(title) = &self.title {
            html.push_str(&format!("<title>{}</title>\n", escape_html(title)));
        }

        for (name, content) in &self.meta {
            html.push_str(&format!(
                r#"<meta name="{}" content="{}">"#,
                escape_attr(name),
                escape_attr(content)
            ));
            html.push('\n');
        }

        for link in &self.links {
            html.push_str(link);
            html.push('\n');
        }

        html
    }
}

/// Full HTML document around the rendered application markup.
#[derive(Debug, Clone)]
pub struct DocumentShell {
    /// Head content.
    pub head: HeadContent,
    /// Id of the element the application mounts into.
    pub container_id: String,
    /// Bootstrap script as `(element id, JSON)`.
    pub bootstrap: Option<(String, String)>,
}

impl DocumentShell {
    /// Create a shell mounting into `#app`.
    pub fn new(head: HeadContent) -> Self {
        Self {
            head,
            container_id: "app".to_string(),
            bootstrap: None,
        }
    }

    /// Set the container element id.
    pub fn with_container_id(mut self, id: impl Into<String>) -> Self {
        self.container_id = id.into();
        self
    }

    /// Embed a bootstrap payload. `json` must already be script-safe.
    pub fn with_bootstrap(mut self, id: impl Into<String>, json: impl Into<String>) -> Self {
        self.bootstrap = Some((id.into(), json.into()));
        self
    }

    /// Render the document around `body`.
    pub fn render(&self, body: &str) -> String {
        let mut html = String::from("<!DOCTYPE html>\n<html>\n<head>\n");
        html.push_str(&self.head.render());
        html.push_str("</head>\n<body>\n");
        html.push_str(&format!(
            "<div id=\"{}\">{}</div>\n",
            escape_attr(&self.container_id),
            body
        ));
        if let Some((id, json)) = &self.bootstrap {
            html.push_str(&format!(
                "<script type=\"application/json\" id=\"{}\">{}</script>\n",
                escape_attr(id),
                json
            ));
        }
        html.push_str("</body>\n</html>");
        html
    }
}
