//! Resolves raw input bytes (ZIP archive, gzip stream or plain XML) to the XML
//! document text handed to the extractors.

use crate::utils::error::{Result, ZoningError};
use flate2::read::MultiGzDecoder;
use std::io::{Cursor, Read};

const ZIP_MAGICS: [&[u8]; 3] = [b"PK\x03\x04", b"PK\x05\x06", b"PK\x07\x08"];
const GZIP_MAGIC: &[u8] = &[0x1f, 0x8b];
const TECHNICAL_PREFIX: &str = "proto_";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum MemberClass {
    Xml,
    XmlGz,
    TechnicalXml,
    TechnicalXmlGz,
}

impl MemberClass {
    fn of(name: &str) -> Option<Self> {
        let lower = name.to_lowercase();
        let base = lower.rsplit('/').next().unwrap_or(&lower);
        let technical = base.starts_with(TECHNICAL_PREFIX);

        if lower.ends_with(".xml") {
            Some(if technical { Self::TechnicalXml } else { Self::Xml })
        } else if lower.ends_with(".xml.gz") {
            Some(if technical { Self::TechnicalXmlGz } else { Self::XmlGz })
        } else {
            None
        }
    }

    fn is_gzip(self) -> bool {
        matches!(self, Self::XmlGz | Self::TechnicalXmlGz)
    }
}

pub fn is_zip(bytes: &[u8]) -> bool {
    ZIP_MAGICS.iter().any(|magic| bytes.starts_with(magic))
}

/// Returns the XML document carried by `bytes`.
pub fn resolve_document(bytes: &[u8]) -> Result<String> {
    let raw = if is_zip(bytes) {
        extract_from_zip(bytes)?
    } else if bytes.starts_with(GZIP_MAGIC) {
        tracing::debug!("Input is a gzip stream, decompressing");
        gunzip(bytes)?
    } else {
        bytes.to_vec()
    };

    let xml = strip_prefix(&raw)?;
    Ok(decode_text(xml))
}

/// Picks the archive member to parse: regular XML before gzip XML, and `proto_*`
/// technical members only when nothing else is present.
pub fn select_member(names: &[String]) -> Option<(usize, bool)> {
    names
        .iter()
        .enumerate()
        .filter(|(_, name)| !name.ends_with('/'))
        .filter_map(|(idx, name)| MemberClass::of(name).map(|class| (class, idx)))
        .min()
        .map(|(class, idx)| (idx, class.is_gzip()))
}

fn extract_from_zip(bytes: &[u8]) -> Result<Vec<u8>> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))?;
    let mut ordered = Vec::with_capacity(archive.len());
    for idx in 0..archive.len() {
        ordered.push(archive.by_index(idx)?.name().to_string());
    }

    let (idx, gzipped) = select_member(&ordered).ok_or_else(|| ZoningError::NoDocument {
        members: ordered.clone(),
    })?;

    let mut member = archive.by_index(idx)?;
    tracing::debug!("Using archive member '{}' ({} bytes)", member.name(), member.size());

    let mut data = Vec::with_capacity(member.size() as usize);
    member.read_to_end(&mut data)?;

    if gzipped {
        gunzip(&data)
    } else {
        Ok(data)
    }
}

fn gunzip(data: &[u8]) -> Result<Vec<u8>> {
    let mut decoder = MultiGzDecoder::new(data);
    let mut out = Vec::new();
    decoder.read_to_end(&mut out)?;
    Ok(out)
}

/// Drops BOMs and any other garbage before the first `<`.
fn strip_prefix(raw: &[u8]) -> Result<&[u8]> {
    match raw.iter().position(|b| *b == b'<') {
        Some(0) => Ok(raw),
        Some(start) => {
            tracing::debug!("Skipping {} leading bytes before XML start", start);
            Ok(&raw[start..])
        }
        None => Err(ZoningError::NotXml {
            reason: "no '<' found in input".to_string(),
        }),
    }
}

fn decode_text(xml: &[u8]) -> String {
    match std::str::from_utf8(xml) {
        Ok(text) => text.to_string(),
        Err(e) => {
            tracing::warn!("Document is not valid UTF-8 ({}), decoding lossily", e);
            String::from_utf8_lossy(xml).into_owned()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;
    use zip::write::{FileOptions, ZipWriter};

    fn zip_with(members: &[(&str, &[u8])]) -> Vec<u8> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        for (name, data) in members {
            zip.start_file::<_, ()>(*name, FileOptions::default()).unwrap();
            zip.write_all(data).unwrap();
        }
        zip.finish().unwrap().into_inner()
    }

    fn gzip(data: &[u8]) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    #[test]
    fn test_select_member_prefers_regular_xml() {
        let names = vec![
            "proto_data.xml".to_string(),
            "data.xml.gz".to_string(),
            "data.xml".to_string(),
        ];
        assert_eq!(select_member(&names), Some((2, false)));
    }

    #[test]
    fn test_select_member_falls_back_to_technical() {
        let names = vec!["readme.txt".to_string(), "docs/proto_.xml".to_string()];
        assert_eq!(select_member(&names), Some((1, false)));

        let names = vec!["readme.txt".to_string()];
        assert_eq!(select_member(&names), None);
    }

    #[test]
    fn test_zip_prefers_data_over_proto() {
        let archive = zip_with(&[
            ("proto_data.xml", &b"<proto/>"[..]),
            ("data.xml", &b"<data/>"[..]),
        ]);
        assert_eq!(resolve_document(&archive).unwrap(), "<data/>");
    }

    #[test]
    fn test_zip_with_gzip_member() {
        let packed = gzip(b"<extract>ok</extract>");
        let archive = zip_with(&[("report.xml.gz", packed.as_slice()), ("sig.sig", &b"xx"[..])]);
        assert_eq!(resolve_document(&archive).unwrap(), "<extract>ok</extract>");
    }

    #[test]
    fn test_zip_without_xml_fails() {
        let archive = zip_with(&[("notes.txt", &b"hello"[..])]);
        let err = resolve_document(&archive).unwrap_err();
        assert!(matches!(err, ZoningError::NoDocument { .. }));
    }

    #[test]
    fn test_raw_xml_with_bom_and_garbage() {
        let mut raw = vec![0xEF, 0xBB, 0xBF];
        raw.extend_from_slice(b"junk<root/>");
        assert_eq!(resolve_document(&raw).unwrap(), "<root/>");
    }

    #[test]
    fn test_plain_gzip_input() {
        let packed = gzip(b"<root/>");
        assert_eq!(resolve_document(&packed).unwrap(), "<root/>");
    }

    #[test]
    fn test_not_xml() {
        let err = resolve_document(b"plain text").unwrap_err();
        assert!(matches!(err, ZoningError::NotXml { .. }));
    }
}
