use crate::dom::dom_tree::{
    self, Document, ElementNode, NodeData, NodeId, ParseMode, DOCUMENT_NODE,
};
use crate::error::InlineResult;
use html5ever::namespace_url;
use html5ever::ns;
use html5ever::serialize::{serialize, Serialize, SerializeOpts, Serializer, TraversalScope};
use html5ever::tendril::{StrTendril, TendrilSink};
use html5ever::{
    interface::{ElemName, NodeOrText, QuirksMode, TreeSink},
    LocalName, Namespace, QualName,
};
use log::trace;
use std::borrow::Cow;
use std::cell::RefCell;
use std::io;

/// Markers that make the input a full document rather than a fragment.
const DOCUMENT_MARKERS: &[&str] = &["<!doctype", "<html", "<head", "<body"];

pub fn detect_parse_mode(html_content: &str) -> ParseMode {
    let lowered = html_content.to_ascii_lowercase();
    if DOCUMENT_MARKERS.iter().any(|marker| lowered.contains(marker)) {
        ParseMode::Document
    } else {
        ParseMode::Fragment
    }
}

/// Parse rendered markup into an arena tree. Full documents get the usual
/// `<html><head><body>` skeleton; bare fragments are parsed in a `<body>`
/// context and keep their shape.
pub fn create_dom_tree(html_content: &str) -> Document {
    match detect_parse_mode(html_content) {
        ParseMode::Document => {
            let sink = MailTreeSink::new(ParseMode::Document);
            html5ever::parse_document(sink, Default::default()).one(html_content.to_string())
        }
        ParseMode::Fragment => {
            let sink = MailTreeSink::new(ParseMode::Fragment);
            let context = QualName::new(None, ns!(html), LocalName::from("body"));
            html5ever::parse_fragment(sink, Default::default(), context, Vec::new())
                .one(html_content.to_string())
        }
    }
}

/// Serialize everything below `document.content_root`. No doctype is written.
pub fn serialize_document(document: &Document) -> InlineResult<String> {
    let mut buffer = Vec::new();
    let root = SerializableNode {
        document,
        id: document.content_root,
    };
    let opts = SerializeOpts {
        traversal_scope: TraversalScope::ChildrenOnly(None),
        ..Default::default()
    };
    serialize(&mut buffer, &root, opts)?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

struct MailTreeSink {
    document: RefCell<Document>,
    quirks_mode: RefCell<QuirksMode>,
}

impl MailTreeSink {
    pub fn new(mode: ParseMode) -> Self {
        Self {
            document: RefCell::new(dom_tree::new_document(mode)),
            quirks_mode: RefCell::new(QuirksMode::NoQuirks),
        }
    }

    fn node_for(&self, child: NodeOrText<NodeId>) -> NodeId {
        match child {
            NodeOrText::AppendNode(node) => node,
            NodeOrText::AppendText(text) => self
                .document
                .borrow_mut()
                .create_node(NodeData::Text(text.to_string())),
        }
    }

    /// Merge text into a neighbouring text node instead of creating a new one.
    fn try_merge_text(&self, neighbour: Option<NodeId>, child: &NodeOrText<NodeId>) -> bool {
        let (Some(neighbour), NodeOrText::AppendText(text)) = (neighbour, child) else {
            return false;
        };
        let mut document = self.document.borrow_mut();
        match &mut document.nodes[neighbour].data {
            NodeData::Text(existing) => {
                existing.push_str(text);
                true
            }
            _ => false,
        }
    }
}

#[derive(Debug)]
pub struct MailElemName {
    ns: Namespace,
    local: LocalName,
}

impl ElemName for MailElemName {
    /// Local name of the element.
    fn local_name(&self) -> &LocalName {
        &self.local
    }

    /// Namespace of the element.
    fn ns(&self) -> &Namespace {
        &self.ns
    }
}

fn attribute_name(name: &QualName) -> String {
    match &name.prefix {
        Some(prefix) => format!("{}:{}", prefix, name.local),
        None => name.local.to_string(),
    }
}

impl TreeSink for MailTreeSink {
    type Handle = NodeId;
    type Output = Document;
    type ElemName<'a>
        = MailElemName
    where
        Self: 'a;

    /// Hands the finished arena over, pointing fragments at their content.
    fn finish(self) -> Self::Output {
        let mut document = self.document.into_inner();
        if document.mode == ParseMode::Fragment {
            // Fragment parsing roots everything under a synthetic <html>.
            if let Some(&html) = document.children(DOCUMENT_NODE).first() {
                document.content_root = html;
            }
        }
        document
    }

    /// html5ever recovers from every parse error; they are only traced.
    fn parse_error(&self, msg: Cow<'static, str>) {
        trace!("html parse error: {}", msg);
    }

    /// The document node is always the first arena slot.
    fn get_document(&self) -> Self::Handle {
        DOCUMENT_NODE
    }

    /// Name of an element; non-elements get an empty name.
    fn elem_name<'a>(&'a self, target: &'a Self::Handle) -> Self::ElemName<'a> {
        let document = self.document.borrow();
        match document.element(*target) {
            Some(element) => MailElemName {
                ns: element.qual_name.ns.clone(),
                local: element.qual_name.local.clone(),
            },
            None => MailElemName {
                ns: ns!(),
                local: LocalName::from(""),
            },
        }
    }

    /// Creates a detached element. Prefixed attribute names keep the prefix.
    fn create_element(
        &self,
        name: QualName,
        attrs: Vec<html5ever::Attribute>,
        _flags: html5ever::interface::ElementFlags,
    ) -> Self::Handle {
        let mut element = ElementNode::new(name.local.to_string(), name);
        element.attributes = attrs
            .into_iter()
            .map(|attr| (attribute_name(&attr.name), attr.value.to_string()))
            .collect();
        self.document
            .borrow_mut()
            .create_node(NodeData::Element(element))
    }

    /// Creates a detached comment node.
    fn create_comment(&self, text: StrTendril) -> Self::Handle {
        self.document
            .borrow_mut()
            .create_node(NodeData::Comment(text.to_string()))
    }

    /// Creates a detached processing instruction node.
    fn create_pi(&self, target: StrTendril, data: StrTendril) -> Self::Handle {
        self.document
            .borrow_mut()
            .create_node(NodeData::ProcessingInstruction {
                target: target.to_string(),
                data: data.to_string(),
            })
    }

    /// Appends a node, or text merged into a trailing text node.
    fn append(&self, parent: &Self::Handle, child: NodeOrText<Self::Handle>) {
        let last_child = self.document.borrow().children(*parent).last().copied();
        if self.try_merge_text(last_child, &child) {
            return;
        }
        let node = self.node_for(child);
        self.document.borrow_mut().append_child(*parent, node);
    }

    /// Used for foster parenting: before `element` if it is attached, else into `prev_element`.
    fn append_based_on_parent_node(
        &self,
        element: &Self::Handle,
        prev_element: &Self::Handle,
        child: NodeOrText<Self::Handle>,
    ) {
        let has_parent = self.document.borrow().node(*element).parent.is_some();
        if has_parent {
            self.append_before_sibling(element, child);
        } else {
            self.append(prev_element, child);
        }
    }

    /// The output always gets the XHTML Transitional doctype, so the parsed one is dropped.
    fn append_doctype_to_document(
        &self,
        name: StrTendril,
        _public_id: StrTendril,
        _system_id: StrTendril,
    ) {
        trace!("dropping parsed doctype {}", name);
    }

    /// Template contents live directly under the template element.
    fn get_template_contents(&self, target: &Self::Handle) -> Self::Handle {
        *target
    }

    /// Handles are arena indices.
    fn same_node(&self, x: &Self::Handle, y: &Self::Handle) -> bool {
        x == y
    }

    /// Records the quirks mode html5ever settled on.
    fn set_quirks_mode(&self, mode: QuirksMode) {
        *self.quirks_mode.borrow_mut() = mode;
    }

    /// Inserts before `sibling`, merging text into a preceding text node.
    fn append_before_sibling(&self, sibling: &Self::Handle, child: NodeOrText<Self::Handle>) {
        let Some((parent, index)) = self.document.borrow().child_index(*sibling) else {
            return;
        };
        let previous = index
            .checked_sub(1)
            .map(|prev| self.document.borrow().children(parent)[prev]);
        if self.try_merge_text(previous, &child) {
            return;
        }
        let node = self.node_for(child);
        self.document.borrow_mut().insert_child(parent, index, node);
    }

    /// Adds attributes the element does not have yet (repeated `<html>`/`<body>` tags).
    fn add_attrs_if_missing(&self, target: &Self::Handle, attrs: Vec<html5ever::Attribute>) {
        let mut document = self.document.borrow_mut();
        if let Some(element) = document.element_mut(*target) {
            for attr in attrs {
                let key = attribute_name(&attr.name);
                if element.get_attribute(&key).is_none() {
                    element.attributes.push((key, attr.value.to_string()));
                }
            }
        }
    }

    /// Detaches the node; it stays in the arena.
    fn remove_from_parent(&self, target: &Self::Handle) {
        self.document.borrow_mut().detach(*target);
    }

    /// Moves every child of `node` to the end of `new_parent`.
    fn reparent_children(&self, node: &Self::Handle, new_parent: &Self::Handle) {
        let mut document = self.document.borrow_mut();
        let children = document.children(*node).to_vec();
        for child in children {
            document.append_child(*new_parent, child);
        }
    }
}

/// Borrowed view of one arena node for html5ever's serializer.
struct SerializableNode<'a> {
    document: &'a Document,
    id: NodeId,
}

impl SerializableNode<'_> {
    fn write_node<S: Serializer>(&self, serializer: &mut S, id: NodeId) -> io::Result<()> {
        let node = self.document.node(id);
        match &node.data {
            NodeData::Element(element) => {
                let names: Vec<QualName> = element
                    .attributes
                    .iter()
                    .map(|(key, _)| QualName::new(None, ns!(), LocalName::from(key.as_str())))
                    .collect();
                let attrs = names
                    .iter()
                    .zip(element.attributes.iter())
                    .map(|(name, (_, value))| (name, value.as_str()));
                serializer.start_elem(element.qual_name.clone(), attrs)?;
                self.write_children(serializer, id)?;
                serializer.end_elem(element.qual_name.clone())
            }
            NodeData::Text(text) => serializer.write_text(text),
            NodeData::Comment(text) => serializer.write_comment(text),
            NodeData::ProcessingInstruction { target, data } => {
                serializer.write_processing_instruction(target, data)
            }
            NodeData::Document => self.write_children(serializer, id),
        }
    }

    fn write_children<S: Serializer>(&self, serializer: &mut S, id: NodeId) -> io::Result<()> {
        for &child in self.document.children(id) {
            self.write_node(serializer, child)?;
        }
        Ok(())
    }
}

impl Serialize for SerializableNode<'_> {
    fn serialize<S: Serializer>(
        &self,
        serializer: &mut S,
        traversal_scope: TraversalScope,
    ) -> io::Result<()> {
        match traversal_scope {
            TraversalScope::IncludeNode => self.write_node(serializer, self.id),
            TraversalScope::ChildrenOnly(_) => self.write_children(serializer, self.id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_documents_get_a_head() {
        let document = create_dom_tree("<html><body><p class=\"a\">Hi</p></body></html>");
        assert_eq!(document.mode, ParseMode::Document);
        assert!(document.find_element("head").is_some());
        assert_eq!(
            serialize_document(&document).unwrap(),
            "<html><head></head><body><p class=\"a\">Hi</p></body></html>"
        );
    }

    #[test]
    fn fragments_keep_their_shape() {
        let document = create_dom_tree("<div class=\"x\"><span>a &amp; b</span></div>");
        assert_eq!(document.mode, ParseMode::Fragment);
        assert!(document.find_element("head").is_none());
        assert_eq!(
            serialize_document(&document).unwrap(),
            "<div class=\"x\"><span>a &amp; b</span></div>"
        );
    }

    #[test]
    fn parsed_doctype_is_not_written() {
        let document = create_dom_tree("<!DOCTYPE html><html><head><title>t</title></head></html>");
        assert_eq!(document.mode, ParseMode::Document);
        let html = serialize_document(&document).unwrap();
        assert!(html.starts_with("<html><head><title>t</title></head>"));
    }

    #[test]
    fn style_text_is_not_escaped() {
        let document =
            create_dom_tree("<html><head><style>a > b { color: red }</style></head></html>");
        let html = serialize_document(&document).unwrap();
        assert!(html.contains("<style>a > b { color: red }</style>"));
    }

    #[test]
    fn comments_survive_serialization() {
        let document = create_dom_tree("<div><!-- c --><p>x</p></div>");
        assert_eq!(
            serialize_document(&document).unwrap(),
            "<div><!-- c --><p>x</p></div>"
        );

        let document =
            create_dom_tree("<html><head></head><body><!--[if mso]><p>o</p><![endif]--></body></html>");
        assert!(serialize_document(&document)
            .unwrap()
            .contains("<body><!--[if mso]><p>o</p><![endif]--></body>"));
    }

    #[test]
    fn adjacent_text_is_merged() {
        let document = create_dom_tree("<p>one &amp; two</p>");
        let p = document.find_element("p").unwrap();
        assert_eq!(document.children(p).len(), 1);
    }
}
