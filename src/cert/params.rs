use std::fmt;
use std::time::Duration;

use bon::Builder;
use const_oid::ObjectIdentifier;
use der::{Tag, Tagged};
use der::asn1::{Any, GeneralizedTime, SetOfVec, UtcTime};
use rand::Rng;
use time::{OffsetDateTime, UtcOffset};
use x509_cert::attr::AttributeTypeAndValue;
use x509_cert::name::{RdnSequence, RelativeDistinguishedName};

use crate::config::MAX_SERIAL;
use crate::error::{PfxKitError, Result};

/// Parameters for building and signing a certificate.
///
/// # Fields
/// * `serial_number` - The serial number to embed.
/// * `subject` - The distinguished name of the certificate subject.
/// * `issuer` - The distinguished name written into the issuer field.
/// * `validity` - The `notBefore`/`notAfter` window.
#[derive(Clone, Debug, Builder)]
pub struct CertificateParams {
    pub serial_number: SerialNumber,
    pub subject: DistinguishedName,
    pub issuer: DistinguishedName,
    pub validity: Validity,
}

// (canonical short name, accepted aliases, OID)
const KNOWN_ATTRIBUTES: &[(&str, &[&str], &str)] = &[
    ("CN", &[], "2.5.4.3"),
    ("SURNAME", &["SN"], "2.5.4.4"),
    ("SERIALNUMBER", &[], "2.5.4.5"),
    ("C", &[], "2.5.4.6"),
    ("L", &[], "2.5.4.7"),
    ("ST", &["S"], "2.5.4.8"),
    ("STREET", &[], "2.5.4.9"),
    ("O", &[], "2.5.4.10"),
    ("OU", &[], "2.5.4.11"),
    ("T", &["TITLE"], "2.5.4.12"),
    ("GIVENNAME", &["G"], "2.5.4.42"),
    ("E", &["EMAILADDRESS", "EMAIL"], "1.2.840.113549.1.9.1"),
    ("DC", &[], "0.9.2342.19200300.100.1.25"),
    ("UID", &[], "0.9.2342.19200300.100.1.1"),
];

const OID_C: &str = "2.5.4.6";
const OID_SERIAL_NUMBER: &str = "2.5.4.5";
const OID_EMAIL: &str = "1.2.840.113549.1.9.1";
const OID_DC: &str = "0.9.2342.19200300.100.1.25";

/// A single `type=value` pair of a distinguished name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NameAttribute {
    pub oid: ObjectIdentifier,
    pub value: String,
}

impl NameAttribute {
    /// The short name (`CN`, `O`, ...) or the dotted OID for unknown types.
    pub fn key(&self) -> String {
        let dotted = self.oid.to_string();
        KNOWN_ATTRIBUTES
            .iter()
            .find(|(_, _, oid)| *oid == dotted)
            .map(|(name, _, _)| (*name).to_string())
            .unwrap_or(dotted)
    }

    fn parse(raw: &str) -> Result<Self> {
        let eq = find_unescaped(raw, '=').ok_or_else(|| {
            PfxKitError::InputEncodingError(format!("'{}' is not a key=value pair", raw.trim()))
        })?;
        let oid = lookup_oid(raw[..eq].trim())?;
        let value = unescape_value(&raw[eq + 1..])?;
        Ok(Self { oid, value })
    }

    fn to_x509(&self) -> Result<AttributeTypeAndValue> {
        let dotted = self.oid.to_string();
        let tag = match dotted.as_str() {
            OID_EMAIL | OID_DC => {
                if !self.value.is_ascii() {
                    return Err(PfxKitError::InputEncodingError(format!(
                        "{} value '{}' is not IA5",
                        self.key(),
                        self.value
                    )));
                }
                Tag::Ia5String
            }
            OID_C | OID_SERIAL_NUMBER => {
                if !is_printable_string(&self.value) {
                    return Err(PfxKitError::InputEncodingError(format!(
                        "{} value '{}' is not a PrintableString",
                        self.key(),
                        self.value
                    )));
                }
                Tag::PrintableString
            }
            _ => Tag::Utf8String,
        };
        let value = Any::new(tag, self.value.as_bytes())
            .map_err(|e| PfxKitError::InputEncodingError(e.to_string()))?;
        Ok(AttributeTypeAndValue {
            oid: self.oid,
            value,
        })
    }

    fn from_x509(attr: &AttributeTypeAndValue) -> Self {
        let bytes = attr.value.value();
        let value = match attr.value.tag() {
            Tag::Utf8String
            | Tag::PrintableString
            | Tag::Ia5String
            | Tag::TeletexString
            | Tag::VisibleString => String::from_utf8_lossy(bytes).into_owned(),
            _ => {
                let hex: String = bytes.iter().map(|b| format!("{b:02x}")).collect();
                format!("#{hex}")
            }
        };
        Self {
            oid: attr.oid,
            value,
        }
    }
}

impl fmt::Display for NameAttribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.key(), escape_value(&self.value))
    }
}

/// An ordered distinguished name.
///
/// Components keep the order in which they were written: the first
/// component of `"CN=a, O=b"` becomes the first RDN of the encoded
/// `RDNSequence`, and rendering the name gives `"CN=a,O=b"` back.
/// Attributes inside one multi-valued RDN are a DER `SET OF` and are
/// stored sorted by their encoding, so `"UID=42+CN=a"` comes back from
/// the encoded name as `"CN=a+UID=42"`.
/// An empty string is a valid, empty name.
///
/// # Example
/// ```
/// use pfxkit::cert::params::DistinguishedName;
///
/// let dn = DistinguishedName::parse("CN=test.local, O=Acme\\, Inc").unwrap();
/// assert_eq!(
///     dn.components(),
///     vec![("CN".to_string(), "test.local".to_string()), ("O".to_string(), "Acme, Inc".to_string())]
/// );
/// assert_eq!(dn.to_string(), "CN=test.local,O=Acme\\, Inc");
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DistinguishedName {
    /// Each entry is one RDN; multi-valued RDNs hold several attributes.
    pub rdns: Vec<Vec<NameAttribute>>,
}

impl DistinguishedName {
    /// Parses a `CN=..., O=...` string.
    pub fn parse(input: &str) -> Result<Self> {
        if input.trim().is_empty() {
            return Ok(Self::default());
        }
        let mut rdns = Vec::new();
        for rdn in split_unescaped(input, ',') {
            if rdn.trim().is_empty() {
                return Err(PfxKitError::InputEncodingError(format!(
                    "empty component in '{input}'"
                )));
            }
            let attrs = split_unescaped(rdn, '+')
                .into_iter()
                .map(NameAttribute::parse)
                .collect::<Result<Vec<_>>>()?;
            rdns.push(attrs);
        }
        Ok(Self { rdns })
    }

    pub fn is_empty(&self) -> bool {
        self.rdns.is_empty()
    }

    /// Flattened `(key, value)` pairs in encoding order.
    pub fn components(&self) -> Vec<(String, String)> {
        self.rdns
            .iter()
            .flatten()
            .map(|attr| (attr.key(), attr.value.clone()))
            .collect()
    }

    /// Converts the distinguished name to an X.509-compatible format.
    pub fn as_x509_name(&self) -> Result<x509_cert::name::DistinguishedName> {
        let mut rdns = Vec::with_capacity(self.rdns.len());
        for attrs in &self.rdns {
            let mut set = SetOfVec::new();
            for attr in attrs {
                set.insert(attr.to_x509()?).map_err(|e| {
                    PfxKitError::InputEncodingError(format!("duplicate attribute {attr}: {e}"))
                })?;
            }
            rdns.push(RelativeDistinguishedName::from(set));
        }
        Ok(RdnSequence(rdns))
    }

    /// Creates a `DistinguishedName` from an X.509-compatible format.
    pub fn from_x509_name(x509dn: &x509_cert::name::DistinguishedName) -> Self {
        let rdns = x509dn
            .0
            .iter()
            .map(|rdn| rdn.0.iter().map(NameAttribute::from_x509).collect())
            .collect();
        Self { rdns }
    }
}

impl fmt::Display for DistinguishedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, rdn) in self.rdns.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            for (j, attr) in rdn.iter().enumerate() {
                if j > 0 {
                    f.write_str("+")?;
                }
                write!(f, "{attr}")?;
            }
        }
        Ok(())
    }
}

impl std::str::FromStr for DistinguishedName {
    type Err = PfxKitError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

fn lookup_oid(key: &str) -> Result<ObjectIdentifier> {
    let upper = key.to_ascii_uppercase();
    let known = KNOWN_ATTRIBUTES
        .iter()
        .find(|(name, aliases, _)| *name == upper || aliases.contains(&upper.as_str()))
        .map(|(_, _, oid)| *oid);
    let dotted = match known {
        Some(oid) => oid,
        None => upper.strip_prefix("OID.").unwrap_or(&upper),
    };
    ObjectIdentifier::new(dotted)
        .map_err(|_| PfxKitError::InputEncodingError(format!("unknown attribute type '{key}'")))
}

/// Splits on `sep` outside of backslash escapes and double quotes.
fn split_unescaped(input: &str, sep: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut escaped = false;
    let mut quoted = false;
    for (i, c) in input.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '"' => quoted = !quoted,
            c if c == sep && !quoted => {
                parts.push(&input[start..i]);
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    parts.push(&input[start..]);
    parts
}

fn find_unescaped(input: &str, needle: char) -> Option<usize> {
    let first = split_unescaped(input, needle);
    if first.len() > 1 {
        Some(first[0].len())
    } else {
        None
    }
}

/// Resolves escapes and quotes and drops unescaped surrounding whitespace.
fn unescape_value(raw: &str) -> Result<String> {
    let raw = raw.trim_start();
    let mut out = String::with_capacity(raw.len());
    let mut significant = 0;
    let mut chars = raw.chars();
    let mut quoted = false;
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                let next = chars.next().ok_or_else(|| {
                    PfxKitError::InputEncodingError(format!("dangling escape in '{raw}'"))
                })?;
                out.push(next);
                significant = out.len();
            }
            '"' => {
                quoted = !quoted;
            }
            c if c.is_whitespace() && !quoted => out.push(c),
            c => {
                out.push(c);
                significant = out.len();
            }
        }
    }
    if quoted {
        return Err(PfxKitError::InputEncodingError(format!(
            "unterminated quote in '{raw}'"
        )));
    }
    out.truncate(significant);
    Ok(out)
}

fn escape_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let last = value.chars().count().saturating_sub(1);
    for (i, c) in value.chars().enumerate() {
        let needs_escape = matches!(c, ',' | '+' | '=' | '\\' | '"' | '<' | '>' | ';')
            || (i == 0 && (c == '#' || c == ' '))
            || (i == last && c == ' ');
        if needs_escape {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn is_printable_string(value: &str) -> bool {
    value.bytes().all(|b| {
        b.is_ascii_alphanumeric()
            || matches!(
                b,
                b' ' | b'\'' | b'(' | b')' | b'+' | b',' | b'-' | b'.' | b'/' | b':' | b'=' | b'?'
            )
    })
}

/// Certificate validity period.
///
/// No ordering is enforced between the two bounds; an inverted window is
/// encoded as given and left for relying parties to reject.
///
/// # Fields
/// * `not_before` - The start of the validity period.
/// * `not_after` - The end of the validity period.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Validity {
    pub not_before: OffsetDateTime,
    pub not_after: OffsetDateTime,
}

impl Validity {
    /// Creates a validity period starting now for the given number of days.
    pub fn for_days(days: i64) -> Self {
        let now = OffsetDateTime::now_utc();
        Self {
            not_before: now,
            not_after: now + time::Duration::days(days),
        }
    }

    pub(crate) fn to_x509(&self) -> Result<x509_cert::time::Validity> {
        Ok(x509_cert::time::Validity {
            not_before: encode_time(self.not_before)?,
            not_after: encode_time(self.not_after)?,
        })
    }

    pub(crate) fn from_x509(validity: &x509_cert::time::Validity) -> Result<Self> {
        Ok(Self {
            not_before: decode_time(&validity.not_before)?,
            not_after: decode_time(&validity.not_after)?,
        })
    }
}

/// UTCTime through 2049, GeneralizedTime from 2050 on.
fn encode_time(instant: OffsetDateTime) -> Result<x509_cert::time::Time> {
    let secs = u64::try_from(instant.unix_timestamp()).map_err(|_| {
        PfxKitError::InputEncodingError(format!("{instant} predates the Unix epoch"))
    })?;
    let since_epoch = Duration::from_secs(secs);
    let encoded = if instant.to_offset(UtcOffset::UTC).year() < 2050 {
        UtcTime::from_unix_duration(since_epoch).map(x509_cert::time::Time::UtcTime)
    } else {
        GeneralizedTime::from_unix_duration(since_epoch).map(x509_cert::time::Time::GeneralTime)
    };
    encoded.map_err(|e| PfxKitError::InputEncodingError(format!("{instant}: {e}")))
}

fn decode_time(time: &x509_cert::time::Time) -> Result<OffsetDateTime> {
    let secs = time.to_unix_duration().as_secs();
    i64::try_from(secs)
        .ok()
        .and_then(|secs| OffsetDateTime::from_unix_timestamp(secs).ok())
        .ok_or_else(|| PfxKitError::DecodingError(format!("timestamp {secs} out of range")))
}

/// A certificate serial number in `[1, 2^63 - 1]`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SerialNumber(u64);

impl SerialNumber {
    /// Draws a serial uniformly from `[1, MAX_SERIAL]`.
    pub fn random<R: Rng>(rng: &mut R) -> Self {
        Self(rng.gen_range(1..=MAX_SERIAL))
    }

    /// Wraps an explicit value, rejecting anything outside `[1, MAX_SERIAL]`.
    pub fn new(value: u64) -> Result<Self> {
        if value == 0 || value > MAX_SERIAL {
            return Err(PfxKitError::InputEncodingError(format!(
                "serial number {value} outside [1, {MAX_SERIAL}]"
            )));
        }
        Ok(Self(value))
    }

    /// Parses big-endian INTEGER content bytes, tolerating a sign-padding zero.
    pub fn from_der_bytes(bytes: &[u8]) -> Result<Self> {
        let first = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len());
        let significant = &bytes[first..];
        if significant.len() > 8 {
            return Err(PfxKitError::DecodingError(
                "serial number wider than 64 bits".to_string(),
            ));
        }
        Self::new(significant.iter().fold(0u64, |acc, b| (acc << 8) | u64::from(*b)))
    }

    pub fn value(&self) -> u64 {
        self.0
    }

    /// Minimal big-endian two's complement bytes of a positive INTEGER.
    pub fn to_der_bytes(&self) -> Vec<u8> {
        let bytes = self.0.to_be_bytes();
        let first = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len() - 1);
        let mut out = Vec::with_capacity(9);
        if bytes[first] & 0x80 != 0 {
            out.push(0);
        }
        out.extend_from_slice(&bytes[first..]);
        out
    }

    pub(crate) fn to_x509(self) -> Result<x509_cert::serial_number::SerialNumber> {
        x509_cert::serial_number::SerialNumber::new(&self.to_der_bytes())
            .map_err(|e| PfxKitError::EncodingError(format!("serial number: {e}")))
    }
}

impl fmt::Display for SerialNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:X}", self.0)
    }
}
