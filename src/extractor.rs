use crate::text_utils::{clean_body_text, is_numeric, squash_whitespace};
use crate::xml_tree::{NodeId, XmlTree};
use crate::{ConvertError, ConverterConfig, EmailRecord, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

static EMAIL_ADDRESS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}").unwrap());

// Longer extensions first so `.docx` is not cut at `.doc`.
static ATTACHMENT_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\S+\.(?:pdf|docx|doc|xlsx|xls|pptx|ppt|jpeg|jpg|png|gif|zip|rar|txt|xml|xeml)\b",
    )
    .unwrap()
});

// `\w` is Unicode-aware here, so accented names like `requête.pdf` keep
// their letters instead of being reduced to ASCII.
static NOT_FILENAME_CHAR: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\w\s.-]").unwrap());

/// Header values read straight from the envelope, trimmed, empty when absent.
#[derive(Debug, Default)]
struct EnvelopeFields {
    subject: String,
    from: String,
    to: String,
    date: String,
}

impl EnvelopeFields {
    fn read(tree: &XmlTree, envelope: NodeId) -> Self {
        Self {
            subject: child_text(tree, envelope, "Subject"),
            from: child_text(tree, envelope, "From"),
            to: child_text(tree, envelope, "To"),
            date: child_text(tree, envelope, "Date"),
        }
    }

    fn non_empty_values(&self) -> impl Iterator<Item = &str> {
        [&self.subject, &self.from, &self.to, &self.date]
            .into_iter()
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }
}

/// What the body reconstruction produced.
#[derive(Debug, PartialEq)]
enum MessageBody {
    Text(String),
    Participants(Vec<String>),
}

/// Turns RPVA XML exports into [`EmailRecord`]s.
///
/// Only the `envelope` element is mandatory. Every other lookup falls back to
/// an empty string, so a record is either fully populated or extraction fails
/// with [`ConvertError::NoEnvelope`].
pub struct MetadataExtractor<'a> {
    config: &'a ConverterConfig,
}

impl<'a> MetadataExtractor<'a> {
    pub fn new(config: &'a ConverterConfig) -> Self {
        Self { config }
    }

    /// Extract one email from `xml`.
    ///
    /// ```
    /// use optimxmlpreview::{ConverterConfig, MetadataExtractor};
    ///
    /// let config = ConverterConfig::default();
    /// let record = MetadataExtractor::new(&config)
    ///     .extract("<envelope><From>greffe@justice.fr</From></envelope>")
    ///     .unwrap();
    /// assert_eq!(record.from, "greffe@justice.fr");
    /// assert_eq!(record.subject, "Sans objet");
    /// ```
    pub fn extract(&self, xml: &str) -> Result<EmailRecord> {
        let tree = XmlTree::parse(xml);
        let envelope = tree
            .first_element("envelope")
            .ok_or(ConvertError::NoEnvelope)?;

        let fields = EnvelopeFields::read(&tree, envelope);
        let (body, participants) = match self.message_body(&tree, envelope, &fields) {
            MessageBody::Text(text) => (text, Vec::new()),
            MessageBody::Participants(addresses) => (String::new(), addresses),
        };
        let attachments = collect_attachments(&tree);

        Ok(EmailRecord {
            subject: non_empty_or(fields.subject, &self.config.default_subject),
            from: non_empty_or(fields.from, &self.config.default_sender),
            to: fields.to,
            date: fields.date,
            body,
            participants,
            attachments,
        })
    }

    /// Rebuild the message text, trying in order:
    /// 1. the document's `body` element,
    /// 2. the configured alternative envelope children,
    /// 3. whatever envelope text remains once the header values are removed.
    fn message_body(&self, tree: &XmlTree, envelope: NodeId, fields: &EnvelopeFields) -> MessageBody {
        if let Some(body) = tree.first_element("body") {
            let cleaned = clean_body_text(&tree.text_content(body));
            if !cleaned.is_empty() {
                return MessageBody::Text(cleaned);
            }
        }

        for tag in &self.config.alternative_body_tags {
            let content = child_text(tree, envelope, tag);
            if !content.is_empty() {
                debug!("message body read from <{tag}>");
                return MessageBody::Text(content);
            }
        }

        self.residual_body(&tree.text_content(envelope), fields)
    }

    /// Last-resort body: the envelope text without its header values.
    fn residual_body(&self, envelope_text: &str, fields: &EnvelopeFields) -> MessageBody {
        let mut remaining = envelope_text.to_string();
        for value in fields.non_empty_values() {
            remaining = remaining.replacen(value, "", 1);
        }
        let remaining = squash_whitespace(&remaining);

        // A semicolon-separated address list, e.g. the copy recipients.
        if remaining.contains('@') && remaining.contains(';') {
            let addresses: Vec<String> = EMAIL_ADDRESS
                .find_iter(&remaining)
                .map(|m| m.as_str().to_string())
                .collect();

            if addresses.len() >= 2 {
                return MessageBody::Participants(addresses);
            }
        }

        // Lone counters such as `<nbPJ>0</nbPJ>` are not content.
        if is_numeric(&remaining) {
            return MessageBody::Text(String::new());
        }

        if remaining.chars().count() > self.config.min_residual_body_len {
            MessageBody::Text(remaining)
        } else {
            MessageBody::Text(String::new())
        }
    }
}

/// Trimmed text of the first `tag` element below `node`, empty when absent.
fn child_text(tree: &XmlTree, node: NodeId, tag: &str) -> String {
    tree.descendant(node, tag)
        .map(|id| tree.text_content(id).trim().to_string())
        .unwrap_or_default()
}

fn non_empty_or(value: String, default: &str) -> String {
    if value.is_empty() {
        default.to_string()
    } else {
        value
    }
}

/// Names of every `attachment` element, in document order, without
/// duplicates. When the document has no `attachment` element at all, file
/// names mentioned in the `body` text are used instead.
fn collect_attachments(tree: &XmlTree) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    let elements = tree.elements_by_tag("attachment");

    if !elements.is_empty() {
        for id in elements {
            if let Some(name) = tree.attribute(id, "name").filter(|n| !n.is_empty()) {
                push_unique(&mut names, name.to_string());
            }
        }
        return names;
    }

    if let Some(body) = tree.first_element("body") {
        let text = tree.text_content(body);
        for found in ATTACHMENT_NAME.find_iter(&text) {
            let cleaned = NOT_FILENAME_CHAR.replace_all(found.as_str().trim(), "");
            let cleaned = cleaned.trim();
            if !cleaned.is_empty() {
                push_unique(&mut names, cleaned.to_string());
            }
        }
    }

    names
}

fn push_unique(names: &mut Vec<String>, name: String) {
    if !names.contains(&name) {
        names.push(name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extract(xml: &str) -> Result<EmailRecord> {
        MetadataExtractor::new(&ConverterConfig::default()).extract(xml)
    }

    #[test]
    fn missing_subject_and_sender_get_defaults() {
        let record = extract("<envelope><Date></Date></envelope>").unwrap();
        assert_eq!(record.subject, "Sans objet");
        assert_eq!(record.from, "Expéditeur inconnu");
        assert_eq!(record.to, "");
        assert_eq!(record.date, "");
    }

    #[test]
    fn configured_sentinels_are_used() {
        let config = ConverterConfig {
            default_subject: "No subject".into(),
            default_sender: "Unknown sender".into(),
            ..Default::default()
        };
        let record = MetadataExtractor::new(&config)
            .extract("<envelope/>")
            .unwrap();
        assert_eq!(record.subject, "No subject");
        assert_eq!(record.from, "Unknown sender");
    }

    #[test]
    fn no_envelope_is_a_failure() {
        assert!(matches!(
            extract("<email><body>Bonjour</body></email>"),
            Err(ConvertError::NoEnvelope)
        ));
        assert!(matches!(extract(""), Err(ConvertError::NoEnvelope)));
    }

    #[test]
    fn header_fields_are_trimmed() {
        let record = extract(
            "<envelope><Subject>  Audience  </Subject><To>\n avocat@barreau.fr\n</To></envelope>",
        )
        .unwrap();
        assert_eq!(record.subject, "Audience");
        assert_eq!(record.to, "avocat@barreau.fr");
    }

    #[test]
    fn body_element_wins_and_is_cleaned() {
        let record = extract(
            "<email><envelope><Subject>S</Subject></envelope>\
             <body>Bonjour&#xD;&#xD;Cordialement</body></email>",
        )
        .unwrap();
        assert_eq!(record.body, "Bonjour\n\nCordialement");
    }

    #[test]
    fn alternative_tag_used_when_body_is_blank() {
        let record = extract(
            "<email><envelope><Subject>S</Subject><Message>Texte du message</Message></envelope>\
             <body>   </body></email>",
        )
        .unwrap();
        assert_eq!(record.body, "Texte du message");
    }

    #[test]
    fn alternative_tags_are_tried_in_order() {
        let record = extract(
            "<envelope><Text>second</Text><Content>premier</Content></envelope>",
        )
        .unwrap();
        assert_eq!(record.body, "premier");
    }

    #[test]
    fn numeric_residue_is_dropped() {
        let record = extract(
            "<envelope><From>a@b.fr</From><Subject>S</Subject><nbPJ>0</nbPJ></envelope>",
        )
        .unwrap();
        assert_eq!(record.body, "");
    }

    #[test]
    fn short_residue_is_dropped_and_long_residue_kept() {
        let short = extract("<envelope><Subject>S</Subject><x>abcde</x></envelope>").unwrap();
        assert_eq!(short.body, "");

        let long = extract(
            "<envelope><Subject>S</Subject><x>Renvoi   à\n l'audience</x></envelope>",
        )
        .unwrap();
        assert_eq!(long.body, "Renvoi à l'audience");
    }

    #[test]
    fn address_list_residue_becomes_participant_list() {
        let record = extract(
            "<envelope><Subject>S</Subject>\
             <Cc>avocat1@barreau.fr; avocat2@barreau.fr</Cc></envelope>",
        )
        .unwrap();
        assert_eq!(record.participants, vec!["avocat1@barreau.fr", "avocat2@barreau.fr"]);
        assert_eq!(record.body, "");
    }

    #[test]
    fn escaped_list_markup_in_body_stays_text() {
        let record = extract(
            "<envelope/><body>&lt;div class=\"participants-list\"&gt;&lt;script&gt;alert(1)&lt;/script&gt;</body>",
        )
        .unwrap();
        assert!(!record.has_participant_list());
        assert!(record.body.starts_with(r#"<div class="participants-list">"#));
    }

    #[test]
    fn accented_attachment_names_keep_their_letters() {
        let record = extract("<envelope/><body>voir « requête.pdf »</body>").unwrap();
        assert_eq!(record.attachments, vec!["requête.pdf"]);
    }

    #[test]
    fn single_address_with_semicolon_stays_plain_text() {
        let record = extract(
            "<envelope><Subject>S</Subject><Cc>seul@barreau.fr;</Cc></envelope>",
        )
        .unwrap();
        assert!(!record.has_participant_list());
        assert_eq!(record.body, "seul@barreau.fr;");
    }

    #[test]
    fn attachments_keep_order_and_drop_duplicates() {
        let record = extract(
            r#"<email><envelope/>
               <attachment name="a.pdf"/><attachment name="b.docx"/>
               <attachment name="a.pdf"/><attachment/></email>"#,
        )
        .unwrap();
        assert_eq!(record.attachments, vec!["a.pdf", "b.docx"]);
    }

    #[test]
    fn attachments_scanned_from_body_when_no_element() {
        let record = extract(
            "<email><envelope/><body>Avec les pièces jointes : (conclusions.pdf), \
             bordereau.DOCX et conclusions.pdf</body></email>",
        )
        .unwrap();
        assert_eq!(record.attachments, vec!["conclusions.pdf", "bordereau.DOCX"]);
    }

    #[test]
    fn body_scan_skipped_when_attachment_elements_exist() {
        let record = extract(
            r#"<email><envelope/><body>voir note.pdf</body><attachment/></email>"#,
        )
        .unwrap();
        assert!(record.attachments.is_empty());
    }

    #[test]
    fn malformed_xml_with_envelope_still_extracts() {
        let record = extract(
            "<envelope><Subject>Urgent</Subject><From>greffe@justice.fr</Subject></envelope>\
             <body>texte & suite",
        )
        .unwrap();
        assert_eq!(record.subject, "Urgent");
        assert!(record.from.starts_with("greffe@justice.fr"));
    }
}
