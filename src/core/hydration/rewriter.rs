//! Tag-scoped HTML rewriting without a DOM.
//!
//! A single forward scan over the document applies the registered rules:
//! replace `<title>` text, rewrite `content=` on matching `<meta>` tags,
//! correct `<base href>`, and append fragments before `</head>`. Anything
//! the scanner does not recognize is copied through byte-identical, so a
//! rule whose target tag is absent leaves the document untouched.
//!
//! Attribute values never contain raw `<` in practice; the scanner treats
//! the first `>` as the tag end and copies the remainder verbatim when a
//! tag never closes.

/// Builder-style rewriter. Register rules, then run [`HtmlRewriter::rewrite`].
#[derive(Debug, Default)]
pub struct HtmlRewriter {
    title: Option<String>,
    meta_names: Vec<(String, String)>,
    meta_properties: Vec<(String, String)>,
    head_appends: Vec<String>,
    base_href: Option<String>,
}

impl HtmlRewriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the text content of the first `<title>` element.
    pub fn set_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Rewrite `content` on every `<meta name="...">` matching `name`.
    pub fn set_meta_name(mut self, name: impl Into<String>, content: impl Into<String>) -> Self {
        self.meta_names.push((name.into().to_ascii_lowercase(), content.into()));
        self
    }

    /// Rewrite `content` on every `<meta property="...">` matching `property`.
    pub fn set_meta_property(
        mut self,
        property: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        self.meta_properties
            .push((property.into().to_ascii_lowercase(), content.into()));
        self
    }

    /// Insert a fragment immediately before `</head>`. Dropped if the
    /// document has no closing head tag.
    pub fn append_to_head(mut self, fragment: impl Into<String>) -> Self {
        self.head_appends.push(fragment.into());
        self
    }

    /// Point `<base href>` at the given URL, rewriting an existing tag or
    /// injecting one before `</head>`.
    pub fn set_base_href(mut self, href: impl Into<String>) -> Self {
        self.base_href = Some(href.into());
        self
    }

    pub fn rewrite(&self, html: &str) -> String {
        let mut out = String::with_capacity(html.len() + 256);
        let mut i = 0usize;
        let mut saw_base = false;
        let mut head_closed = false;

        while let Some(rel) = html[i..].find('<') {
            let tag_start = i + rel;
            out.push_str(&html[i..tag_start]);

            if html[tag_start..].starts_with("<!--") {
                match html[tag_start..].find("-->") {
                    Some(end_rel) => {
                        let end = tag_start + end_rel + 3;
                        out.push_str(&html[tag_start..end]);
                        i = end;
                        continue;
                    }
                    None => {
                        out.push_str(&html[tag_start..]);
                        return out;
                    }
                }
            }

            let Some(gt_rel) = html[tag_start..].find('>') else {
                out.push_str(&html[tag_start..]);
                return out;
            };
            let tag_end = tag_start + gt_rel + 1;
            let tag_src = &html[tag_start..tag_end];

            match tag_name(tag_src).as_str() {
                "title" if self.title.is_some() => {
                    out.push_str(tag_src);
                    out.push_str(&text_escape(self.title.as_deref().unwrap_or_default()));
                    // Drop the original text; the closing tag is handled by
                    // the next iteration.
                    match find_ci(&html[tag_end..], "</title") {
                        Some(close_rel) => i = tag_end + close_rel,
                        None => i = tag_end,
                    }
                }
                "meta" => {
                    out.push_str(&self.rewrite_meta(tag_src));
                    i = tag_end;
                }
                "base" if self.base_href.is_some() => {
                    saw_base = true;
                    let href = self.base_href.as_deref().unwrap_or_default();
                    out.push_str(&rewrite_tag_attr(tag_src, "href", href));
                    i = tag_end;
                }
                "/head" if !head_closed => {
                    head_closed = true;
                    if !saw_base {
                        if let Some(href) = self.base_href.as_deref() {
                            out.push_str("<base href=\"");
                            out.push_str(&attr_escape(href));
                            out.push_str("\">");
                        }
                    }
                    for fragment in &self.head_appends {
                        out.push_str(fragment);
                    }
                    out.push_str(tag_src);
                    i = tag_end;
                }
                _ => {
                    out.push_str(tag_src);
                    i = tag_end;
                }
            }
        }

        out.push_str(&html[i..]);
        out
    }

    fn rewrite_meta(&self, tag_src: &str) -> String {
        let attrs = parse_attrs(tag_src);

        let matched_content = attr_value(&attrs, "name")
            .and_then(|name| {
                let name = name.to_ascii_lowercase();
                self.meta_names
                    .iter()
                    .find(|(n, _)| *n == name)
                    .map(|(_, content)| content)
            })
            .or_else(|| {
                attr_value(&attrs, "property").and_then(|property| {
                    let property = property.to_ascii_lowercase();
                    self.meta_properties
                        .iter()
                        .find(|(p, _)| *p == property)
                        .map(|(_, content)| content)
                })
            });

        match matched_content {
            Some(content) => rebuild_tag("meta", &attrs, "content", content, tag_src),
            None => tag_src.to_string(),
        }
    }
}

type Attr = (String, Option<String>);

/// Tag name in lowercase, with a leading `/` for closing tags.
fn tag_name(tag_src: &str) -> String {
    let inner = tag_src.trim_start_matches('<');
    let mut name = String::new();
    for c in inner.chars() {
        match c {
            '/' if name.is_empty() => name.push('/'),
            c if c.is_ascii_alphanumeric() || c == '-' => name.push(c.to_ascii_lowercase()),
            _ => break,
        }
    }
    name
}

/// Parse attributes out of an opening tag. Tolerates double-quoted,
/// single-quoted, unquoted and bare attributes.
fn parse_attrs(tag_src: &str) -> Vec<Attr> {
    let inner = tag_src
        .trim_start_matches('<')
        .trim_end_matches('>')
        .trim_end_matches('/');
    let inner = match inner.find(|c: char| c.is_whitespace()) {
        Some(pos) => &inner[pos..],
        None => return Vec::new(),
    };

    let mut attrs = Vec::new();
    let mut chars = inner.char_indices().peekable();
    while let Some((start, c)) = chars.next() {
        if c.is_whitespace() {
            continue;
        }

        // Attribute name
        let mut name_end = inner.len();
        for (pos, c) in inner[start..].char_indices() {
            if c == '=' || c.is_whitespace() {
                name_end = start + pos;
                break;
            }
        }
        let name = inner[start..name_end].to_string();
        while chars.peek().is_some_and(|(pos, _)| *pos < name_end) {
            chars.next();
        }

        // Optional value
        let mut value = None;
        if inner[name_end..].starts_with('=') {
            chars.next(); // consume '='
            let value_start = name_end + 1;
            let rest = &inner[value_start..];
            let (parsed, consumed) = match rest.chars().next() {
                Some(quote @ ('"' | '\'')) => {
                    let body = &rest[1..];
                    match body.find(quote) {
                        Some(end) => (body[..end].to_string(), end + 2),
                        None => (body.to_string(), rest.len()),
                    }
                }
                _ => {
                    let end = rest
                        .find(|c: char| c.is_whitespace())
                        .unwrap_or(rest.len());
                    (rest[..end].to_string(), end)
                }
            };
            value = Some(parsed);
            let value_end = value_start + consumed;
            while chars.peek().is_some_and(|(pos, _)| *pos < value_end) {
                chars.next();
            }
        }

        if !name.is_empty() {
            attrs.push((name, value));
        }
    }
    attrs
}

fn attr_value<'a>(attrs: &'a [Attr], name: &str) -> Option<&'a str> {
    attrs
        .iter()
        .find(|(n, _)| n.eq_ignore_ascii_case(name))
        .and_then(|(_, v)| v.as_deref())
}

/// Re-emit a tag with one attribute forced to `new_value` (appended when
/// absent), preserving attribute order and self-closing style.
fn rebuild_tag(
    name: &str,
    attrs: &[Attr],
    target_attr: &str,
    new_value: &str,
    original: &str,
) -> String {
    let mut out = String::with_capacity(original.len() + new_value.len());
    out.push('<');
    out.push_str(name);

    let mut replaced = false;
    for (attr_name, value) in attrs {
        out.push(' ');
        out.push_str(attr_name);
        if attr_name.eq_ignore_ascii_case(target_attr) {
            replaced = true;
            out.push_str("=\"");
            out.push_str(&attr_escape(new_value));
            out.push('"');
        } else if let Some(value) = value {
            out.push_str("=\"");
            out.push_str(&attr_escape(value));
            out.push('"');
        }
    }
    if !replaced {
        out.push(' ');
        out.push_str(target_attr);
        out.push_str("=\"");
        out.push_str(&attr_escape(new_value));
        out.push('"');
    }

    if original.trim_end_matches('>').trim_end().ends_with('/') {
        out.push_str(" />");
    } else {
        out.push('>');
    }
    out
}

fn rewrite_tag_attr(tag_src: &str, target_attr: &str, new_value: &str) -> String {
    let attrs = parse_attrs(tag_src);
    rebuild_tag(&tag_name(tag_src), &attrs, target_attr, new_value, tag_src)
}

fn find_ci(haystack: &str, needle_lower: &str) -> Option<usize> {
    haystack.to_ascii_lowercase().find(needle_lower)
}

fn text_escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn attr_escape(value: &str) -> String {
    text_escape(value).replace('"', "&quot;")
}
