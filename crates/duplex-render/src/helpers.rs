//! Link and form markup for views.

use duplex_core::{Environment, RequestContext};

use crate::shell::{escape_attr, escape_html};

/// Attribute marking elements a live session intercepts.
pub const LINK_MARKER: &str = "data-duplex-link";

/// Attribute marking forms a live session submits in-page.
pub const FORM_MARKER: &str = "data-duplex-form";

/// Where and how a form submits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormTarget {
    action: FormAction,
    method: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum FormAction {
    Absolute(String),
    Base(String),
}

impl FormTarget {
    /// Submit to `action` as given.
    pub fn action(action: impl Into<String>) -> Self {
        Self {
            action: FormAction::Absolute(action.into()),
            method: "post".to_string(),
        }
    }

    /// Submit to `base_action` under the router's mount point.
    pub fn base_action(base_action: impl Into<String>) -> Self {
        Self {
            action: FormAction::Base(base_action.into()),
            method: "post".to_string(),
        }
    }

    /// Set the method (default `post`).
    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = method.into();
        self
    }

    /// Resolve the action URL for `request`.
    pub fn resolve(&self, request: &RequestContext) -> String {
        match &self.action {
            FormAction::Absolute(action) => action.clone(),
            FormAction::Base(base) => format!("{}{}", request.base_url, base),
        }
    }
}

/// Markup helpers bound to one request.
#[derive(Debug, Clone, Copy)]
pub struct ViewHelpers<'a> {
    request: &'a RequestContext,
    environment: Environment,
}

impl<'a> ViewHelpers<'a> {
    /// Create helpers for `request`.
    pub fn new(request: &'a RequestContext, environment: Environment) -> Self {
        Self {
            request,
            environment,
        }
    }

    /// An anchor. Client sessions mark it for in-page navigation.
    pub fn link(&self, href: &str, label: &str) -> String {
        let marker = match self.environment {
            Environment::Client => format!(" {}", LINK_MARKER),
            Environment::Server => String::new(),
        };
        format!(
            "<a href=\"{}\"{}>{}</a>",
            escape_attr(href),
            marker,
            escape_html(label)
        )
    }

    /// A form with a hidden `_csrf` input appended after `children`.
    pub fn form(&self, target: &FormTarget, children: &str) -> String {
        self.form_with_style(target, children, None)
    }

    /// An inline POST form carrying one hidden name/value and a submit button.
    pub fn form_button(
        &self,
        target: &FormTarget,
        name: &str,
        value: &str,
        button_text: &str,
    ) -> String {
        let children = format!(
            "<input type=\"hidden\" name=\"{}\" value=\"{}\"><input type=\"submit\" value=\"{}\">",
            escape_attr(name),
            escape_attr(value),
            escape_attr(button_text)
        );
        self.form_with_style(target, &children, Some("display:inline"))
    }

    fn form_with_style(&self, target: &FormTarget, children: &str, style: Option<&str>) -> String {
        let mut attrs = format!(
            "action=\"{}\" method=\"{}\"",
            escape_attr(&target.resolve(self.request)),
            escape_attr(&target.method)
        );
        if let Some(style) = style {
            attrs.push_str(&format!(" style=\"{}\"", escape_attr(style)));
        }
        if self.environment == Environment::Client {
            attrs.push(' ');
            attrs.push_str(FORM_MARKER);
        }

        let csrf = self.request.csrf_token.as_deref().unwrap_or("");
        format!(
            "<form {}>{}<input type=\"hidden\" name=\"_csrf\" value=\"{}\"></form>",
            attrs,
            children,
            escape_attr(csrf)
        )
    }
}
