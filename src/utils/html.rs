/// Cleans lesson rich text with ammonia's whitelist.
///
/// Safe formatting tags (`<p>`, `<b>`, lists, links) survive; scripts,
/// iframes and event-handler attributes are removed.
pub fn clean_html(input: &str) -> String {
    ammonia::clean(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_script_keeps_formatting() {
        let cleaned = clean_html("<p>Intro <b>bold</b></p><script>alert(1)</script>");
        assert_eq!(cleaned, "<p>Intro <b>bold</b></p>");
    }

    #[test]
    fn test_strips_event_handlers() {
        let cleaned = clean_html(r#"<p onclick="steal()">x</p>"#);
        assert_eq!(cleaned, "<p>x</p>");
    }
}
