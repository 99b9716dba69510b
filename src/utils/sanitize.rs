/// Strip all HTML from free-text user content (comments, lore fields,
/// chat messages). The API stores and serves plain text only.
pub fn strip_html(input: &str) -> String {
    ammonia::Builder::empty().clean(input).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_passes_through() {
        assert_eq!(strip_html("a perfectly normal comment"), "a perfectly normal comment");
    }

    #[test]
    fn tags_are_removed() {
        assert_eq!(strip_html("<script>alert(1)</script>hi"), "hi");
        assert_eq!(strip_html("<b>bold</b> claim"), "bold claim");
    }

    #[test]
    fn entities_stay_escaped() {
        assert_eq!(strip_html("1 < 2 && 3 > 2"), "1 &lt; 2 &amp;&amp; 3 &gt; 2");
    }
}
