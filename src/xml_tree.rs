//! A forgiving XML element tree.
//!
//! RPVA exports are not always well-formed: the `body` and `attachment`
//! elements sometimes sit next to the `envelope` instead of inside a single
//! root, end tags get mismatched, and some files are cut short. The tree
//! built here keeps whatever structure could be read:
//!
//! - several top-level elements are allowed (they hang off a nameless
//!   document node),
//! - an end tag closes the nearest open element with the same name and is
//!   ignored when nothing matches,
//! - elements still open at the end of input are closed implicitly,
//! - a tokenizer error stops reading but keeps everything parsed so far.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use tracing::debug;

/// Index of an element inside an [`XmlTree`].
pub type NodeId = usize;

#[derive(Debug, Clone)]
enum Child {
    Element(NodeId),
    Text(String),
}

#[derive(Debug, Clone)]
struct Element {
    name: String,
    attributes: Vec<(String, String)>,
    children: Vec<Child>,
}

/// Element tree of one XML document.
#[derive(Debug, Clone)]
pub struct XmlTree {
    nodes: Vec<Element>,
}

impl XmlTree {
    /// The nameless node every top-level element is attached to.
    pub const DOCUMENT: NodeId = 0;

    /// Parse `xml`, never failing: unreadable input yields an empty tree.
    pub fn parse(xml: &str) -> Self {
        let mut tree = Self {
            nodes: vec![Element {
                name: String::new(),
                attributes: Vec::new(),
                children: Vec::new(),
            }],
        };

        let mut reader = Reader::from_str(xml);
        reader.config_mut().check_end_names = false;

        let mut open: Vec<NodeId> = vec![Self::DOCUMENT];

        loop {
            match reader.read_event() {
                Ok(Event::Start(start)) => {
                    let parent = *open.last().unwrap_or(&Self::DOCUMENT);
                    let id = tree.push_element(parent, &start);
                    open.push(id);
                }
                Ok(Event::Empty(start)) => {
                    let parent = *open.last().unwrap_or(&Self::DOCUMENT);
                    tree.push_element(parent, &start);
                }
                Ok(Event::End(end)) => {
                    let name = String::from_utf8_lossy(end.name().as_ref()).into_owned();
                    // The document node never closes.
                    let matching = open
                        .iter()
                        .rposition(|&id| id != Self::DOCUMENT && tree.nodes[id].name == name);
                    if let Some(pos) = matching {
                        open.truncate(pos);
                    }
                }
                Ok(Event::Text(text)) => {
                    let decoded = match text.unescape() {
                        Ok(cow) => cow.into_owned(),
                        // Unknown entities or stray '&': keep the raw text.
                        Err(_) => String::from_utf8_lossy(&text).into_owned(),
                    };
                    let parent = *open.last().unwrap_or(&Self::DOCUMENT);
                    tree.push_text(parent, decoded);
                }
                Ok(Event::CData(data)) => {
                    let parent = *open.last().unwrap_or(&Self::DOCUMENT);
                    tree.push_text(parent, String::from_utf8_lossy(&data).into_owned());
                }
                Ok(Event::Eof) => break,
                Ok(_) => {}
                Err(e) => {
                    debug!(
                        "stopping XML read at byte {}: {e}",
                        reader.buffer_position()
                    );
                    break;
                }
            }
        }

        tree
    }

    fn push_element(&mut self, parent: NodeId, start: &BytesStart) -> NodeId {
        let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
        let attributes = start
            .attributes()
            .with_checks(false)
            .map_while(|attr| attr.ok())
            .map(|attr| {
                let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
                let value = match attr.unescape_value() {
                    Ok(v) => v.into_owned(),
                    Err(_) => String::from_utf8_lossy(&attr.value).into_owned(),
                };
                (key, value)
            })
            .collect();

        let id = self.nodes.len();
        self.nodes.push(Element {
            name,
            attributes,
            children: Vec::new(),
        });
        self.nodes[parent].children.push(Child::Element(id));
        id
    }

    fn push_text(&mut self, parent: NodeId, text: String) {
        if !text.is_empty() {
            self.nodes[parent].children.push(Child::Text(text));
        }
    }

    /// Tag name of `node` (empty for [`XmlTree::DOCUMENT`]).
    pub fn name(&self, node: NodeId) -> &str {
        &self.nodes[node].name
    }

    /// Every element named `tag` below `node`, in document order.
    pub fn descendants_by_tag(&self, node: NodeId, tag: &str) -> Vec<NodeId> {
        let mut found = Vec::new();
        let mut stack: Vec<NodeId> = self.child_elements(node).rev().collect();

        while let Some(id) = stack.pop() {
            if self.nodes[id].name == tag {
                found.push(id);
            }
            stack.extend(self.child_elements(id).rev());
        }

        found
    }

    /// First element named `tag` below `node`, in document order.
    pub fn descendant(&self, node: NodeId, tag: &str) -> Option<NodeId> {
        self.descendants_by_tag(node, tag).into_iter().next()
    }

    /// Every element named `tag` in the document.
    pub fn elements_by_tag(&self, tag: &str) -> Vec<NodeId> {
        self.descendants_by_tag(Self::DOCUMENT, tag)
    }

    /// First element named `tag` in the document.
    pub fn first_element(&self, tag: &str) -> Option<NodeId> {
        self.descendant(Self::DOCUMENT, tag)
    }

    /// Concatenated text of `node` and all its descendants, entities decoded.
    pub fn text_content(&self, node: NodeId) -> String {
        let mut out = String::new();
        self.collect_text(node, &mut out);
        out
    }

    fn collect_text(&self, node: NodeId, out: &mut String) {
        for child in &self.nodes[node].children {
            match child {
                Child::Text(text) => out.push_str(text),
                Child::Element(id) => self.collect_text(*id, out),
            }
        }
    }

    /// Value of attribute `name` on `node`.
    pub fn attribute(&self, node: NodeId, name: &str) -> Option<&str> {
        self.nodes[node]
            .attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    fn child_elements(&self, node: NodeId) -> impl DoubleEndedIterator<Item = NodeId> + '_ {
        self.nodes[node].children.iter().filter_map(|child| match child {
            Child::Element(id) => Some(*id),
            Child::Text(_) => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_several_top_level_elements() {
        let tree = XmlTree::parse(
            r#"<envelope><Subject>S</Subject></envelope>
               <body>texte</body>
               <attachment name="a.pdf"/>"#,
        );
        assert!(tree.first_element("envelope").is_some());
        let body = tree.first_element("body").unwrap();
        assert_eq!(tree.text_content(body), "texte");
        let att = tree.first_element("attachment").unwrap();
        assert_eq!(tree.attribute(att, "name"), Some("a.pdf"));
    }

    #[test]
    fn decodes_character_references() {
        let tree = XmlTree::parse("<body>a&#xD;b &amp; c</body>");
        let body = tree.first_element("body").unwrap();
        assert_eq!(tree.text_content(body), "a\rb & c");
    }

    #[test]
    fn unclosed_elements_keep_their_content() {
        let tree = XmlTree::parse("<email><envelope><From>greffe@justice.fr</From>");
        let env = tree.first_element("envelope").unwrap();
        let from = tree.descendant(env, "From").unwrap();
        assert_eq!(tree.text_content(from), "greffe@justice.fr");
    }

    #[test]
    fn mismatched_end_tag_closes_nearest_match() {
        let tree = XmlTree::parse("<envelope><To>x</Subject><From>y</From></envelope>");
        let env = tree.first_element("envelope").unwrap();
        // </Subject> matches nothing and is ignored, so <From> stays under <To>.
        let to = tree.descendant(env, "To").unwrap();
        assert_eq!(tree.text_content(to), "xy");
        assert!(tree.descendant(env, "From").is_some());
    }

    #[test]
    fn document_order_is_preserved() {
        let tree = XmlTree::parse(
            r#"<a><attachment name="1"/><b><attachment name="2"/></b><attachment name="3"/></a>"#,
        );
        let names: Vec<_> = tree
            .elements_by_tag("attachment")
            .into_iter()
            .filter_map(|id| tree.attribute(id, "name"))
            .collect();
        assert_eq!(names, vec!["1", "2", "3"]);
    }

    #[test]
    fn garbage_yields_empty_tree() {
        let tree = XmlTree::parse("not xml at all");
        assert!(tree.first_element("envelope").is_none());
    }
}
