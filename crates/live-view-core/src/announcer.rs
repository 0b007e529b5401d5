//! Subscription announcement.

use crate::document::Document;
use crate::protocol::ClientMessage;

/// Build one subscribe message per region found in `doc`, in document order.
///
/// Identifiers are not deduplicated: two regions sharing an identifier yield
/// two identical messages.
pub fn announce<D: Document>(doc: &D, region_attr: &str) -> Vec<ClientMessage> {
    doc.elements_with_attribute(region_attr)
        .iter()
        .filter_map(|region| doc.attribute(region, region_attr))
        .map(ClientMessage::Subscribe)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::HtmlDocument;
    use crate::protocol::REGION_ATTRIBUTE;

    #[test]
    fn test_one_message_per_region_in_order() {
        let doc = HtmlDocument::parse(
            r#"<div data-live-view="clock"></div><ul><li data-live-view="feed"></li></ul><p data-live-view="clock"></p>"#,
        )
        .unwrap();

        let messages = announce(&doc, REGION_ATTRIBUTE);
        assert_eq!(
            messages,
            vec![
                ClientMessage::subscribe("clock"),
                ClientMessage::subscribe("feed"),
                ClientMessage::subscribe("clock"),
            ]
        );
    }

    #[test]
    fn test_no_regions() {
        let doc = HtmlDocument::parse("<p>static page</p>").unwrap();
        assert!(announce(&doc, REGION_ATTRIBUTE).is_empty());
    }

    #[test]
    fn test_custom_attribute() {
        let doc = HtmlDocument::parse(r#"<div x-view="a"></div><div data-live-view="b"></div>"#)
            .unwrap();
        assert_eq!(announce(&doc, "x-view"), vec![ClientMessage::subscribe("a")]);
    }
}
