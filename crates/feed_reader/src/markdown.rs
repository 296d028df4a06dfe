//! HTML message body to Discord-flavoured Markdown

use scraper::ElementRef;

/// Render the children of a message body element as Markdown.
///
/// Inline formatting maps onto Discord markers (`**`, `*`, `__`, `~~`,
/// `||`), links become `[text](href)` unless the text is the url itself,
/// `<br>` becomes a newline and blockquotes are prefixed with `> ` per line.
/// Nested blockquotes are flattened into the outer one.
pub fn render_markdown(element: ElementRef<'_>) -> String {
    render_children(element, false)
}

fn render_children(element: ElementRef<'_>, in_quote: bool) -> String {
    let mut out = String::new();
    for child in element.children() {
        if let Some(text) = child.value().as_text() {
            out.push_str(text);
        } else if let Some(el) = ElementRef::wrap(child) {
            out.push_str(&render_element(el, in_quote));
        }
    }
    out
}

fn render_element(el: ElementRef<'_>, in_quote: bool) -> String {
    let value = el.value();
    match value.name() {
        "a" => {
            let text = render_children(el, in_quote);
            match value.attr("href") {
                Some(href) if text == href => href.to_string(),
                Some(href) if !href.is_empty() => format!("[{text}]({href})"),
                _ => text,
            }
        }
        "pre" => format!("```{}```", el.text().collect::<String>()),
        "b" | "strong" => format!("**{}**", render_children(el, in_quote)),
        "tg-spoiler" => format!("||{}||", render_children(el, in_quote)),
        // custom emoji: the glyph sits in a nested <b>
        "i" if value.classes().any(|class| class == "emoji") => el.text().collect(),
        "i" | "em" => format!("*{}*", render_children(el, in_quote)),
        "u" => format!("__{}__", render_children(el, in_quote)),
        "s" | "strike" | "del" => format!("~~{}~~", render_children(el, in_quote)),
        "br" => "\n".to_string(),
        "blockquote" if in_quote => render_children(el, true),
        "blockquote" => {
            let inner = render_children(el, true)
                .replace("\r\n", "\n")
                .replace('\r', "\n");
            let mut quoted = inner
                .split('\n')
                .map(|line| format!("> {line}"))
                .collect::<Vec<_>>()
                .join("\n");
            quoted.push('\n');
            quoted
        }
        _ => render_children(el, in_quote),
    }
}
