//! Document access abstraction.
//!
//! The protocol touches the page through three capabilities only: finding
//! elements by attribute, reading an attribute, and replacing an element's
//! content. Anything that provides them can host a live view session, so
//! sessions can be driven against an in-memory [`HtmlDocument`](crate::dom::HtmlDocument)
//! as well as a real rendering environment.

use crate::error::Result;

pub trait Document {
    /// Handle to an element of this document.
    type Element: Clone + std::fmt::Debug;

    /// Every element carrying `name`, in document order.
    ///
    /// The result is a snapshot: elements added afterwards are not included.
    fn elements_with_attribute(&self, name: &str) -> Vec<Self::Element>;

    /// Value of attribute `name` on `element`, if present.
    fn attribute(&self, element: &Self::Element, name: &str) -> Option<String>;

    /// Replace the entire content of `element` with `markup`.
    fn replace_content(&mut self, element: &Self::Element, markup: &str) -> Result<()>;

    /// Current content of `element` as markup.
    fn content(&self, element: &Self::Element) -> String;

    /// Every element whose attribute `name` equals `value` exactly.
    fn find_by_attribute(&self, name: &str, value: &str) -> Vec<Self::Element> {
        self.elements_with_attribute(name)
            .into_iter()
            .filter(|el| self.attribute(el, name).as_deref() == Some(value))
            .collect()
    }
}
