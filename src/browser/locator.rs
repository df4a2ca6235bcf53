//! Locator vocabulary
//!
//! Four locator kinds, uniform across backends: attribute equality, tag
//! name with optional text-contains, CSS selector, XPath. Attribute and
//! tag-name criteria are lowered to synthesized XPath so every backend
//! exposes identical search semantics regardless of its native query
//! facility.

/// A search criterion for descendant elements
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Locator {
    /// Attribute name/value equality
    Attribute { name: String, value: String },
    /// Tag name, optionally narrowed to elements whose text contains a
    /// fragment
    Tag { name: String, text: Option<String> },
    /// Raw CSS selector
    Css(String),
    /// Raw XPath expression
    XPath(String),
}

/// A locator lowered to what an engine can execute natively
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Query {
    XPath(String),
    Css(String),
}

impl Locator {
    /// Attribute equality locator
    pub fn attribute<S: Into<String>, V: Into<String>>(name: S, value: V) -> Self {
        Locator::Attribute {
            name: name.into(),
            value: value.into(),
        }
    }

    /// Tag-name locator
    pub fn tag<S: Into<String>>(name: S) -> Self {
        Locator::Tag {
            name: name.into(),
            text: None,
        }
    }

    /// Tag-name locator narrowed by contained text
    pub fn tag_with_text<S: Into<String>, T: Into<String>>(name: S, text: T) -> Self {
        Locator::Tag {
            name: name.into(),
            text: Some(text.into()),
        }
    }

    /// CSS selector locator
    pub fn css<S: Into<String>>(selector: S) -> Self {
        Locator::Css(selector.into())
    }

    /// XPath locator
    pub fn xpath<S: Into<String>>(expression: S) -> Self {
        Locator::XPath(expression.into())
    }

    /// Lower this locator to an engine-executable query
    ///
    /// Synthesized expressions are always subtree-relative; caller XPath is
    /// normalized to subtree scope so that narrowing a selection can never
    /// escape it.
    pub fn to_query(&self) -> Query {
        match self {
            Locator::Attribute { name, value } => Query::XPath(format!(
                ".//*[@{}={}]",
                name,
                xpath_literal(value)
            )),
            Locator::Tag { name, text } => match text {
                Some(fragment) => Query::XPath(format!(
                    ".//{}[contains(., {})]",
                    name,
                    xpath_literal(fragment)
                )),
                None => Query::XPath(format!(".//{}", name)),
            },
            Locator::Css(selector) => Query::Css(selector.clone()),
            Locator::XPath(expression) => Query::XPath(relativize_xpath(expression)),
        }
    }
}

impl std::fmt::Display for Locator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Locator::Attribute { name, value } => write!(f, "@{}='{}'", name, value),
            Locator::Tag { name, text: None } => write!(f, "<{}>", name),
            Locator::Tag {
                name,
                text: Some(t),
            } => write!(f, "<{}> containing '{}'", name, t),
            Locator::Css(selector) => write!(f, "css '{}'", selector),
            Locator::XPath(expression) => write!(f, "xpath '{}'", expression),
        }
    }
}

/// Rewrite an absolute XPath to search the context node's subtree
fn relativize_xpath(expression: &str) -> String {
    if let Some(rest) = expression.strip_prefix("//") {
        format!(".//{}", rest)
    } else if expression.starts_with('/') {
        format!(".{}", expression)
    } else {
        expression.to_string()
    }
}

/// Render a string as an XPath 1.0 literal
///
/// XPath 1.0 has no escape sequences inside string literals, so a value
/// containing both quote kinds must be split into a concat() of runs.
fn xpath_literal(value: &str) -> String {
    if !value.contains('\'') {
        return format!("'{}'", value);
    }
    if !value.contains('"') {
        return format!("\"{}\"", value);
    }

    let mut parts = Vec::new();
    for (i, run) in value.split('\'').enumerate() {
        if i > 0 {
            parts.push("\"'\"".to_string());
        }
        if !run.is_empty() {
            parts.push(format!("'{}'", run));
        }
    }
    format!("concat({})", parts.join(", "))
}

/// Escape a string for safe embedding in a JavaScript single-quoted literal
pub fn escape_js_str(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('\'', "\\'")
        .replace('"', r#"\""#)
        .replace('\n', "\\n")
}
