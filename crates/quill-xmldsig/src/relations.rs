//! OOXML relationship bookkeeping for the signatures sub-storage.

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, Event};
use quick_xml::Writer;
use roxmltree::Document;

use crate::error::{SignatureError, SignatureResult};
use crate::storage::{ContainerStorage, SignatureStorage};

pub(crate) const RELATIONSHIPS_NS: &str =
    "http://schemas.openxmlformats.org/package/2006/relationships";
pub(crate) const ORIGIN_REL_TYPE: &str =
    "http://schemas.openxmlformats.org/package/2006/relationships/digital-signature/origin";
pub(crate) const SIGNATURE_REL_TYPE: &str =
    "http://schemas.openxmlformats.org/package/2006/relationships/digital-signature/signature";
const ORIGIN_CONTENT_TYPE: &str = "application/vnd.openxmlformats-package.digital-signature-origin";
const SIGNATURE_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-package.digital-signature-xmlsignature+xml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relationship {
    pub id: String,
    pub type_: String,
    pub target: String,
}

/// Parse a `.rels` part into its `<Relationship>` entries.
pub(crate) fn parse_relationships(
    xml: &[u8],
    part_name: &str,
) -> SignatureResult<Vec<Relationship>> {
    let xml = std::str::from_utf8(xml)
        .map_err(|_| SignatureError::MalformedSignature(format!("{part_name} is not UTF-8")))?;
    let doc = Document::parse(xml)?;

    let mut rels = Vec::new();
    for node in doc.descendants().filter(|n| n.is_element()) {
        if node.tag_name().name() != "Relationship" {
            continue;
        }
        let id = match node.attribute("Id") {
            Some(id) => id.to_string(),
            None => continue,
        };
        let type_ = node.attribute("Type").unwrap_or_default().to_string();
        let target = node.attribute("Target").unwrap_or_default().to_string();
        rels.push(Relationship { id, type_, target });
    }
    Ok(rels)
}

/// Write the signatures sub-storage's relationships part: the origin part
/// pointing at `sig1.xml` .. `sigN.xml`, one relation per signature.
pub(crate) fn export_signature_relations(
    storage: &mut SignatureStorage,
    signature_count: usize,
) -> SignatureResult<()> {
    let mut writer = Writer::new(Vec::new());
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), Some("yes"))))?;

    let mut root = BytesStart::new("Relationships");
    root.push_attribute(("xmlns", RELATIONSHIPS_NS));
    writer.write_event(Event::Start(root))?;

    for index in 1..=signature_count {
        let mut rel = BytesStart::new("Relationship");
        let id = format!("rId{index}");
        let target = format!("sig{index}.xml");
        rel.push_attribute(("Id", id.as_str()));
        rel.push_attribute(("Type", SIGNATURE_REL_TYPE));
        rel.push_attribute(("Target", target.as_str()));
        writer.write_event(Event::Empty(rel))?;
    }

    writer.write_event(Event::End(BytesEnd::new("Relationships")))?;

    storage.set_stream("origin.sigs", Vec::new());
    storage.set_stream("_rels/origin.sigs.rels", writer.into_inner());
    Ok(())
}

/// Make the root container aware of the signatures sub-storage: the origin
/// relation in `_rels/.rels` plus the content-type entries for the origin
/// and every signature part.
pub(crate) fn ensure_signatures_relation(
    root: &mut ContainerStorage,
    signature_count: usize,
) -> SignatureResult<()> {
    let rels_part = "_rels/.rels";
    let mut rels_xml = match root.part(rels_part) {
        Some(bytes) => String::from_utf8(bytes.to_vec())?,
        None => format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n<Relationships xmlns=\"{RELATIONSHIPS_NS}\">\n</Relationships>"
        ),
    };
    if !rels_xml.contains(ORIGIN_REL_TYPE) {
        let insert_idx = rels_xml.rfind("</Relationships>").ok_or_else(|| {
            SignatureError::MalformedSignature("missing </Relationships>".to_string())
        })?;
        let next_id = parse_relationships(rels_xml.as_bytes(), rels_part)?.len() + 1;
        rels_xml.insert_str(
            insert_idx,
            &format!(
                "  <Relationship Id=\"rId{next_id}\" Type=\"{ORIGIN_REL_TYPE}\" Target=\"_xmlsignatures/origin.sigs\"/>\n"
            ),
        );
        root.set_part(rels_part, rels_xml.into_bytes());
    }

    let types_part = "[Content_Types].xml";
    let bytes = root
        .part(types_part)
        .ok_or_else(|| SignatureError::MissingPart(types_part.to_string()))?;
    let mut types_xml = String::from_utf8(bytes.to_vec())?;
    let insert_idx = types_xml
        .rfind("</Types>")
        .ok_or_else(|| SignatureError::MalformedSignature("missing </Types>".to_string()))?;

    let mut inserted = String::new();
    if !types_xml.contains("Extension=\"sigs\"") {
        inserted.push_str(&format!(
            "  <Default Extension=\"sigs\" ContentType=\"{ORIGIN_CONTENT_TYPE}\"/>\n"
        ));
    }
    for index in 1..=signature_count {
        let part_name = format!("/_xmlsignatures/sig{index}.xml");
        if !types_xml.contains(&format!("PartName=\"{part_name}\"")) {
            inserted.push_str(&format!(
                "  <Override PartName=\"{part_name}\" ContentType=\"{SIGNATURE_CONTENT_TYPE}\"/>\n"
            ));
        }
    }
    if !inserted.is_empty() {
        types_xml.insert_str(insert_idx, &inserted);
        root.set_part(types_part, types_xml.into_bytes());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn signature_relations_enumerate_every_part() {
        let mut storage = SignatureStorage::default();
        export_signature_relations(&mut storage, 2).unwrap();

        assert!(storage.stream("origin.sigs").is_some());
        let rels = parse_relationships(
            storage.stream("_rels/origin.sigs.rels").unwrap(),
            "_rels/origin.sigs.rels",
        )
        .unwrap();
        assert_eq!(rels.len(), 2);
        assert_eq!(rels[0].target, "sig1.xml");
        assert_eq!(rels[1].target, "sig2.xml");
        assert!(rels.iter().all(|rel| rel.type_ == SIGNATURE_REL_TYPE));
    }

    #[test]
    fn origin_relation_is_added_once() {
        let mut root = ContainerStorage::new();
        root.set_part(
            "[Content_Types].xml",
            b"<?xml version=\"1.0\"?>\n<Types xmlns=\"http://schemas.openxmlformats.org/package/2006/content-types\">\n</Types>"
                .to_vec(),
        );
        ensure_signatures_relation(&mut root, 1).unwrap();
        ensure_signatures_relation(&mut root, 1).unwrap();

        let rels = parse_relationships(root.part("_rels/.rels").unwrap(), "_rels/.rels").unwrap();
        let origins: Vec<_> = rels
            .iter()
            .filter(|rel| rel.type_ == ORIGIN_REL_TYPE)
            .collect();
        assert_eq!(origins.len(), 1);
        assert_eq!(origins[0].target, "_xmlsignatures/origin.sigs");

        let types = String::from_utf8(root.part("[Content_Types].xml").unwrap().to_vec()).unwrap();
        assert_eq!(types.matches("Extension=\"sigs\"").count(), 1);
        assert!(types.contains("PartName=\"/_xmlsignatures/sig1.xml\""));
    }
}
