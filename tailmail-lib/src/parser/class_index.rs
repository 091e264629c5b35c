use std::collections::HashSet;

use crate::dom::dom_tree::Document;

/// Class tokens used by a document, for feeding the stylesheet compiler its
/// candidate list.
#[derive(Debug, Default)]
pub struct ClassIndex {
    /// Distinct class tokens in first-seen document order.
    pub classes: Vec<String>,
}

impl ClassIndex {
    pub fn build(document: &Document) -> Self {
        let mut index = ClassIndex::default();
        let mut seen = HashSet::new();
        for id in document.elements_in_order() {
            let Some(class_attr) = document.element(id).and_then(|e| e.get_attribute("class")) else {
                continue;
            };
            for class in class_attr.split_whitespace() {
                if seen.insert(class) {
                    index.classes.push(class.to_string());
                }
            }
        }
        index
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::mail_html::create_dom_tree;

    #[test]
    fn collects_distinct_classes_in_document_order() {
        let document = create_dom_tree(
            r#"<div class="p-4 text-red-500"><p class="text-red-500 sm:p-2">x</p><p class="p-4"></p></div>"#,
        );
        let index = ClassIndex::build(&document);
        assert_eq!(index.classes, vec!["p-4", "text-red-500", "sm:p-2"]);
    }

    #[test]
    fn elements_without_classes_contribute_nothing() {
        let document = create_dom_tree("<div><p class=\"  \">x</p></div>");
        assert!(ClassIndex::build(&document).classes.is_empty());
    }
}
