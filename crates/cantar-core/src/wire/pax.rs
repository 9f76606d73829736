//! PAX extended-header records and GNU long-name compatibility.
//!
//! A PAX data region is a sequence of `"<len> <key>=<value>\n"` records
//! where `<len>` counts every byte of the record including the length
//! digits themselves. GNU long names/links arrive as `L`/`K` entries whose
//! data region carries a NUL-terminated value.

use crate::error::{ArchiveError, Result};
use crate::types::Header;
use crate::wire::block::BINARY_SIZE_THRESHOLD;

/// Path GNU tar stores in `L`/`K` long-name pseudo-entries.
pub(crate) const GNU_LONGNAME_PATH: &[u8] = b"././@LongLink";

/// Name the canonical writer stamps on its `x` header blocks.
pub(crate) const PAX_BLOCK_NAME: &[u8] = b"@PaxHeader";

const PAX_PATH: &str = "path";
const PAX_LINKPATH: &str = "linkpath";
const PAX_SIZE: &str = "size";

/// Field overrides accumulated from extended headers.
///
/// One instance holds the per-stream globals (`g` headers), another the
/// per-entry overrides (`x` headers and GNU `L`/`K` records); locals win
/// over globals when both are present.
#[derive(Debug, Default, Clone)]
pub(crate) struct PaxOverrides {
    pub path: Option<String>,
    pub link: Option<String>,
    pub size: Option<u64>,
}

impl PaxOverrides {
    /// Parses a PAX data region and merges the recognized keys.
    ///
    /// Recognized keys are `path`, `linkpath` and `size`; everything else
    /// is skipped. Malformed records fail the whole region.
    pub fn merge_records(&mut self, data: &[u8], context: &str) -> Result<()> {
        let mut rest = data;
        while !rest.is_empty() {
            let (record, tail) = split_record(rest, context)?;
            rest = tail;

            let eq = record
                .payload
                .iter()
                .position(|&b| b == b'=')
                .ok_or_else(|| malformed(context, "record has no `=`"))?;
            let (key, value) = record.payload.split_at(eq);
            let value = &value[1..];

            match key {
                b"path" => self.path = Some(utf8_value(value, context, PAX_PATH)?),
                b"linkpath" => self.link = Some(utf8_value(value, context, PAX_LINKPATH)?),
                b"size" => {
                    let text = utf8_value(value, context, PAX_SIZE)?;
                    let size: u64 = text
                        .parse()
                        .map_err(|_| malformed(context, "unparseable size record"))?;
                    if size > i64::MAX as u64 {
                        return Err(malformed(context, "size record out of range"));
                    }
                    self.size = Some(size);
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Layers `self` (the local overrides) over `globals`.
    pub fn resolved_over(&self, globals: &PaxOverrides) -> PaxOverrides {
        PaxOverrides {
            path: self.path.clone().or_else(|| globals.path.clone()),
            link: self.link.clone().or_else(|| globals.link.clone()),
            size: self.size.or(globals.size),
        }
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

struct RawRecord<'a> {
    /// The `key=value` bytes, between the length prefix and the newline.
    payload: &'a [u8],
}

fn split_record<'a>(data: &'a [u8], context: &str) -> Result<(RawRecord<'a>, &'a [u8])> {
    let space = data
        .iter()
        .position(|&b| b == b' ')
        .ok_or_else(|| malformed(context, "record has no length prefix"))?;
    let len_text = std::str::from_utf8(&data[..space])
        .map_err(|_| malformed(context, "non-ASCII length prefix"))?;
    let len: usize = len_text
        .parse()
        .map_err(|_| malformed(context, "unparseable length prefix"))?;
    if len <= space + 1 || len > data.len() {
        return Err(malformed(context, "record length out of bounds"));
    }
    if data[len - 1] != b'\n' {
        return Err(malformed(context, "record does not end in newline"));
    }
    Ok((
        RawRecord {
            payload: &data[space + 1..len - 1],
        },
        &data[len..],
    ))
}

fn utf8_value(value: &[u8], context: &str, key: &str) -> Result<String> {
    String::from_utf8(value.to_vec())
        .map_err(|_| malformed(context, &format!("{key} record is not UTF-8")))
}

fn malformed(context: &str, what: &str) -> ArchiveError {
    ArchiveError::invalid_header(context, format!("malformed PAX data: {what}"))
}

/// Reads a GNU `L`/`K` payload: the value up to the first NUL.
pub(crate) fn gnu_long_value(data: &[u8], context: &str) -> Result<String> {
    let end = data.iter().position(|&b| b == 0).unwrap_or(data.len());
    String::from_utf8(data[..end].to_vec())
        .map_err(|_| malformed(context, "long-name payload is not UTF-8"))
}

/// Encodes one PAX record, iterating the length prefix to its fixed point.
fn encode_record(key: &str, value: &str, out: &mut Vec<u8>) {
    let base = 1 + key.len() + 1 + value.len() + 1; // " key=value\n"
    let mut len = base;
    loop {
        let with_digits = base + decimal_digits(len);
        if with_digits == len {
            break;
        }
        len = with_digits;
    }
    out.extend_from_slice(len.to_string().as_bytes());
    out.push(b' ');
    out.extend_from_slice(key.as_bytes());
    out.push(b'=');
    out.extend_from_slice(value.as_bytes());
    out.push(b'\n');
}

fn decimal_digits(mut n: usize) -> usize {
    let mut digits = 1;
    while n >= 10 {
        n /= 10;
        digits += 1;
    }
    digits
}

/// Layout plan for one logical header: standard-field byte values plus the
/// PAX records that must precede the block.
#[derive(Debug, Default)]
pub(crate) struct HeaderPlan {
    pub name: Vec<u8>,
    pub prefix: Vec<u8>,
    pub link: Vec<u8>,
    pax: Vec<(&'static str, String)>,
}

impl HeaderPlan {
    /// Returns the encoded PAX data region, records in lexicographic key
    /// order, or `None` when no extended header is needed.
    pub fn pax_data(&self) -> Option<Vec<u8>> {
        if self.pax.is_empty() {
            return None;
        }
        let mut pairs: Vec<&(&str, String)> = self.pax.iter().collect();
        pairs.sort_by_key(|(key, _)| *key);
        let mut out = Vec::new();
        for (key, value) in pairs {
            encode_record(key, value, &mut out);
        }
        Some(out)
    }
}

/// Decides how a logical header maps onto the wire: which values fit the
/// standard fields and which spill into a PAX `x` block.
pub(crate) fn plan_fields(header: &Header) -> HeaderPlan {
    let mut plan = HeaderPlan::default();

    if header.link.len() > 100 {
        plan.pax.push((PAX_LINKPATH, header.link.clone()));
    } else {
        plan.link = header.link.clone().into_bytes();
    }

    let path = header.path.as_bytes();
    if path.len() <= 100 {
        plan.name = path.to_vec();
    } else if let Some(split) = ustar_split(path) {
        plan.prefix = path[..split].to_vec();
        plan.name = path[split + 1..].to_vec();
    } else {
        plan.pax.push((PAX_PATH, header.path.clone()));
    }

    if header.size >= BINARY_SIZE_THRESHOLD {
        plan.pax.push((PAX_SIZE, header.size.to_string()));
    }

    plan
}

/// Finds the ustar name/prefix split point: the last `/` at offset 100 or
/// earlier, usable only when the whole path is short enough and both halves
/// fit their fields.
fn ustar_split(path: &[u8]) -> Option<usize> {
    if path.len() >= 256 {
        return None;
    }
    let limit = path.len().min(101);
    let split = path[..limit].iter().rposition(|&b| b == b'/')?;
    if split == 0 || path.len() - split - 1 > 100 || split > 155 {
        return None;
    }
    Some(split)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::EntryKind;

    #[test]
    fn record_length_fixed_point() {
        let mut out = Vec::new();
        encode_record("path", "abc", &mut out);
        assert_eq!(out, b"12 path=abc\n");
        assert_eq!(out.len(), 12);
    }

    #[test]
    fn record_length_boundary() {
        // A payload whose record can never be exactly 100 bytes long jumps
        // from 99 to 101 when the prefix grows a digit.
        let value = "v".repeat(98 - 1 - "path".len() - 1 - 1);
        let mut out = Vec::new();
        encode_record("path", &value, &mut out);
        let len: usize = std::str::from_utf8(&out[..out.iter().position(|&b| b == b' ').unwrap()])
            .unwrap()
            .parse()
            .unwrap();
        assert_eq!(len, out.len());
    }

    #[test]
    fn parse_merges_known_keys() {
        let mut data = Vec::new();
        encode_record("path", "long/name.txt", &mut data);
        encode_record("size", "12345", &mut data);
        encode_record("uname", "ignored", &mut data);

        let mut overrides = PaxOverrides::default();
        overrides.merge_records(&data, "test").unwrap();
        assert_eq!(overrides.path.as_deref(), Some("long/name.txt"));
        assert_eq!(overrides.size, Some(12345));
        assert_eq!(overrides.link, None);
    }

    #[test]
    fn parse_rejects_bad_records() {
        let mut overrides = PaxOverrides::default();
        assert!(overrides.merge_records(b"nonsense", "t").is_err());
        assert!(overrides.merge_records(b"7 pat=x", "t").is_err());
        assert!(overrides.merge_records(b"99 path=x\n", "t").is_err());
        assert!(overrides.merge_records(b"11 pathx=v\n", "t").is_ok());
    }

    #[test]
    fn locals_override_globals() {
        let globals = PaxOverrides {
            path: Some("g".into()),
            link: None,
            size: Some(1),
        };
        let locals = PaxOverrides {
            path: Some("l".into()),
            link: Some("lt".into()),
            size: None,
        };
        let resolved = locals.resolved_over(&globals);
        assert_eq!(resolved.path.as_deref(), Some("l"));
        assert_eq!(resolved.link.as_deref(), Some("lt"));
        assert_eq!(resolved.size, Some(1));
    }

    #[test]
    fn gnu_long_value_stops_at_nul() {
        assert_eq!(gnu_long_value(b"abc\0\0\0", "t").unwrap(), "abc");
        assert_eq!(gnu_long_value(b"abc", "t").unwrap(), "abc");
    }

    #[test]
    fn short_path_needs_no_pax() {
        let plan = plan_fields(&Header::file("short.txt", 0o644, 1));
        assert_eq!(plan.name, b"short.txt");
        assert!(plan.prefix.is_empty());
        assert!(plan.pax_data().is_none());
    }

    #[test]
    fn splittable_path_uses_prefix() {
        let path = format!("{}/{}", "d".repeat(60), "f".repeat(80));
        let plan = plan_fields(&Header::file(path.clone(), 0o644, 0));
        assert_eq!(plan.prefix, "d".repeat(60).as_bytes());
        assert_eq!(plan.name, "f".repeat(80).as_bytes());
        assert!(plan.pax_data().is_none());
    }

    #[test]
    fn unsplittable_path_spills_to_pax() {
        // Slash sits past offset 100, so the prefix rule cannot apply.
        let path = format!("{}/{}", "a".repeat(150), "b".repeat(20));
        let plan = plan_fields(&Header::file(path.clone(), 0o644, 0));
        assert!(plan.name.is_empty());
        assert!(plan.prefix.is_empty());
        let data = plan.pax_data().unwrap();
        assert!(data.windows(5).any(|w| w == b"path="));
    }

    #[test]
    fn long_link_spills_to_pax() {
        let target = "t".repeat(150);
        let hdr = Header {
            path: "l".into(),
            kind: EntryKind::SymLink,
            mode: 0o755,
            size: 0,
            link: target,
        };
        let plan = plan_fields(&hdr);
        assert!(plan.link.is_empty());
        let data = plan.pax_data().unwrap();
        assert!(data.windows(9).any(|w| w == b"linkpath="));
    }

    #[test]
    fn pax_records_sorted_by_key() {
        let hdr = Header {
            path: "p".repeat(200),
            kind: EntryKind::SymLink,
            mode: 0o755,
            size: 0,
            link: "t".repeat(200),
        };
        let plan = plan_fields(&hdr);
        let data = plan.pax_data().unwrap();
        let link_at = data.windows(9).position(|w| w == b"linkpath=").unwrap();
        let path_at = data.windows(6).position(|w| w == b" path=").unwrap();
        assert!(link_at < path_at);
    }

    #[test]
    fn huge_size_spills_to_pax() {
        let plan = plan_fields(&Header::file("big", 0o644, BINARY_SIZE_THRESHOLD));
        let data = plan.pax_data().unwrap();
        assert!(data.windows(5).any(|w| w == b"size="));
    }
}
