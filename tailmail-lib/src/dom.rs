use html5ever::QualName;

pub mod dom_tree {
    use super::*;

    /// Index of a node inside `Document::nodes`.
    pub type NodeId = usize;

    /// The document node is always stored first.
    pub const DOCUMENT_NODE: NodeId = 0;

    #[derive(Debug, Clone)]
    pub enum NodeData {
        Document,
        Element(ElementNode),
        Text(String),
        Comment(String),
        ProcessingInstruction { target: String, data: String },
    }

    #[derive(Debug, Clone)]
    pub struct ElementNode {
        pub tag: String,
        pub qual_name: QualName,
        pub attributes: Vec<(String, String)>,
    }

    #[derive(Debug, Clone)]
    pub struct Node {
        pub parent: Option<NodeId>,
        pub children: Vec<NodeId>,
        pub data: NodeData,
    }

    /// How the markup was parsed. Fragments never get a synthesised `<head>`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum ParseMode {
        Document,
        Fragment,
    }

    /// Arena-backed HTML tree. Nodes are never freed; detached nodes simply
    /// stop being reachable from `content_root`.
    #[derive(Debug, Clone)]
    pub struct Document {
        pub nodes: Vec<Node>,
        pub mode: ParseMode,
        /// Node whose children make up the serialized output.
        pub content_root: NodeId,
    }

    impl ElementNode {
        pub fn new(tag: String, qual_name: QualName) -> Self {
            ElementNode {
                tag,
                qual_name,
                attributes: Vec::new(),
            }
        }

        pub fn get_attribute(&self, name: &str) -> Option<&str> {
            self.attributes
                .iter()
                .find(|(key, _)| key.eq_ignore_ascii_case(name))
                .map(|(_, value)| value.as_str())
        }

        /// Replace the value in place, or append the attribute when absent.
        pub fn set_attribute(&mut self, name: &str, value: String) {
            match self
                .attributes
                .iter_mut()
                .find(|(key, _)| key.eq_ignore_ascii_case(name))
            {
                Some((_, existing)) => *existing = value,
                None => self.attributes.push((name.to_string(), value)),
            }
        }

        pub fn remove_attribute(&mut self, name: &str) -> Option<String> {
            let position = self
                .attributes
                .iter()
                .position(|(key, _)| key.eq_ignore_ascii_case(name))?;
            Some(self.attributes.remove(position).1)
        }
    }

    impl Document {
        pub fn new(mode: ParseMode) -> Self {
            Document {
                nodes: vec![Node {
                    parent: None,
                    children: Vec::new(),
                    data: NodeData::Document,
                }],
                mode,
                content_root: DOCUMENT_NODE,
            }
        }

        pub fn create_node(&mut self, data: NodeData) -> NodeId {
            self.nodes.push(Node {
                parent: None,
                children: Vec::new(),
                data,
            });
            self.nodes.len() - 1
        }

        pub fn node(&self, id: NodeId) -> &Node {
            &self.nodes[id]
        }

        pub fn element(&self, id: NodeId) -> Option<&ElementNode> {
            match &self.nodes.get(id)?.data {
                NodeData::Element(element) => Some(element),
                _ => None,
            }
        }

        pub fn element_mut(&mut self, id: NodeId) -> Option<&mut ElementNode> {
            match &mut self.nodes.get_mut(id)?.data {
                NodeData::Element(element) => Some(element),
                _ => None,
            }
        }

        pub fn children(&self, id: NodeId) -> &[NodeId] {
            &self.nodes[id].children
        }

        /// Remove `child` from its current parent, if any.
        pub fn detach(&mut self, child: NodeId) {
            if let Some(parent) = self.nodes[child].parent.take() {
                self.nodes[parent].children.retain(|&id| id != child);
            }
        }

        pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
            self.detach(child);
            self.nodes[child].parent = Some(parent);
            self.nodes[parent].children.push(child);
        }

        pub fn insert_child(&mut self, parent: NodeId, index: usize, child: NodeId) {
            self.detach(child);
            self.nodes[child].parent = Some(parent);
            let children = &mut self.nodes[parent].children;
            let index = index.min(children.len());
            children.insert(index, child);
        }

        /// Position of `child` among its parent's children.
        pub fn child_index(&self, child: NodeId) -> Option<(NodeId, usize)> {
            let parent = self.nodes[child].parent?;
            let index = self.nodes[parent]
                .children
                .iter()
                .position(|&id| id == child)?;
            Some((parent, index))
        }

        /// Element nodes below `content_root`, in document order.
        pub fn elements_in_order(&self) -> Vec<NodeId> {
            let mut order = Vec::new();
            let mut stack: Vec<NodeId> = self
                .children(self.content_root)
                .iter()
                .rev()
                .copied()
                .collect();
            while let Some(id) = stack.pop() {
                if self.element(id).is_some() {
                    order.push(id);
                }
                stack.extend(self.nodes[id].children.iter().rev());
            }
            order
        }

        /// First element with the given tag name, in document order.
        pub fn find_element(&self, tag: &str) -> Option<NodeId> {
            self.elements_in_order().into_iter().find(|&id| {
                self.element(id)
                    .is_some_and(|element| element.tag.eq_ignore_ascii_case(tag))
            })
        }
    }

    pub fn new_document(mode: ParseMode) -> Document {
        Document::new(mode)
    }
}

#[cfg(test)]
mod tests {
    use super::dom_tree::*;
    use html5ever::{namespace_url, ns, LocalName, QualName};

    fn element(doc: &mut Document, tag: &str) -> NodeId {
        let name = QualName::new(None, ns!(html), LocalName::from(tag));
        doc.create_node(NodeData::Element(ElementNode::new(tag.to_string(), name)))
    }

    #[test]
    fn append_moves_a_node_between_parents() {
        let mut doc = new_document(ParseMode::Fragment);
        let first = element(&mut doc, "div");
        let second = element(&mut doc, "p");
        let child = element(&mut doc, "span");
        doc.append_child(DOCUMENT_NODE, first);
        doc.append_child(DOCUMENT_NODE, second);
        doc.append_child(first, child);
        doc.append_child(second, child);

        assert!(doc.children(first).is_empty());
        assert_eq!(doc.children(second), &[child]);
        assert_eq!(doc.node(child).parent, Some(second));
    }

    #[test]
    fn insert_child_at_front() {
        let mut doc = new_document(ParseMode::Document);
        let head = element(&mut doc, "head");
        let title = element(&mut doc, "title");
        let style = element(&mut doc, "style");
        doc.append_child(DOCUMENT_NODE, head);
        doc.append_child(head, title);
        doc.insert_child(head, 0, style);

        assert_eq!(doc.children(head), &[style, title]);
        assert_eq!(doc.find_element("style"), Some(style));
    }

    #[test]
    fn attributes_are_replaced_in_place() {
        let mut doc = new_document(ParseMode::Fragment);
        let id = element(&mut doc, "div");
        let node = doc.element_mut(id).unwrap();
        node.set_attribute("id", "a".to_string());
        node.set_attribute("class", "x".to_string());
        node.set_attribute("id", "b".to_string());

        assert_eq!(
            node.attributes,
            vec![
                ("id".to_string(), "b".to_string()),
                ("class".to_string(), "x".to_string())
            ]
        );
        assert_eq!(node.remove_attribute("class").as_deref(), Some("x"));
        assert_eq!(node.get_attribute("class"), None);
    }
}
