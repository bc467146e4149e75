//! # Access log line extraction
//!
//! Lines look roughly like this (the client address is anonymised):
//!
//! ```text
//! - - [10/Mar/2019:08:06:30 +0000] "HEAD /ubuntu/releases/bionic/release/ubuntu-18.04.2-server-amd64.iso HTTP/1.1" 200 258 "-" "Packer/1.3.5"
//! ```
//!
//! The image file names follow the `<product>-<release>-<flavor>-<arch>.<ext>`
//! convention, with a few irregular exceptions that are rejected.

use crate::codenames::CodenameRegistry;
use crate::user_agent::{ClientTag, trailing_user_agent};
use percent_encoding::percent_decode_str;

/// File name suffixes of the installer images we count.
///
/// Older revisions of the log processing did not accept plain `.img` files.
pub const IMAGE_SUFFIXES: &[&str] = &[".iso", ".img", ".img.xz", ".img.gz"];

/// The result of extracting a single access log line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadRecord {
    /// The HTTP status code, if one could be found in the line.
    pub status: Option<u16>,
    /// The requested path, without query string.
    pub target: String,
    pub outcome: Result<IsoImage, Rejection>,
}

/// An installer image download inferred from the requested file name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IsoImage {
    pub product: String,
    pub release: String,
    pub flavor: String,
    pub arch: String,
    pub subarch: String,
    pub client: Option<ClientTag>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Rejection {
    #[error("line is not valid UTF-8 after percent-decoding")]
    Encoding,
    #[error("no status code found")]
    MissingStatus,
    #[error("unexpected status code {0}")]
    Status(u16),
    #[error("not an installer image")]
    Suffix,
    #[error("image is named by release codename {0:?}")]
    Codename(String),
    #[error("unrecognized image file name")]
    FilenameShape,
}

impl DownloadRecord {
    /// Extracts a download record from a raw access log line.
    ///
    /// This never fails. Lines that don't describe a successful download of
    /// a versioned installer image produce a record with a [Rejection].
    pub fn parse(line: &str, codenames: &dyn CodenameRegistry) -> Self {
        // Deal with escaped file names like `ubuntu-20.04-preinstalled-server-armhf%2braspi.img.xz`.
        let Ok(line) = percent_decode_str(line).decode_utf8() else {
            return Self {
                status: None,
                target: String::new(),
                outcome: Err(Rejection::Encoding),
            };
        };

        let status = parse_status(&line);
        let target = parse_target(&line);

        let outcome = match status {
            Some(status) => parse_image(status, target, &line, codenames),
            None => Err(Rejection::MissingStatus),
        };

        Self {
            status,
            target: target.to_string(),
            outcome,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.outcome.is_ok()
    }

    pub fn image(&self) -> Option<&IsoImage> {
        self.outcome.as_ref().ok()
    }
}

/// Finds the first run of one to three digits that is surrounded by
/// whitespace.
fn parse_status(line: &str) -> Option<u16> {
    line.char_indices()
        .filter(|(_, c)| c.is_whitespace())
        .find_map(|(pos, c)| {
            let rest = &line[pos + c.len_utf8()..];
            let num_digits = rest.bytes().take_while(u8::is_ascii_digit).count();
            if !(1..=3).contains(&num_digits) {
                return None;
            }

            let (digits, rest) = rest.split_at(num_digits);
            if !rest.starts_with(char::is_whitespace) {
                return None;
            }

            digits.parse().ok()
        })
}

/// Returns the path of the request line, which is the second word of the
/// first non-empty quoted section, without any query string.
fn parse_target(line: &str) -> &str {
    let Some(start) = line.find('"') else {
        return "";
    };

    let rest = &line[start + 1..];
    let Some(first) = rest.chars().next() else {
        return "";
    };

    let Some(len) = rest[first.len_utf8()..].find('"') else {
        return "";
    };

    let request = &rest[..first.len_utf8() + len];
    let target = request.split(' ').nth(1).unwrap_or_default();

    // `download.ubuntu.com` links append tracking query strings.
    target.split('?').next().unwrap_or_default()
}

fn parse_image(
    status: u16,
    target: &str,
    line: &str,
    codenames: &dyn CodenameRegistry,
) -> Result<IsoImage, Rejection> {
    if status != 200 {
        return Err(Rejection::Status(status));
    }

    if !IMAGE_SUFFIXES.iter().any(|suffix| target.ends_with(suffix)) {
        return Err(Rejection::Suffix);
    }

    let file_name = target.rsplit('/').next().unwrap_or(target);

    let first_token = file_name.split('-').next().unwrap_or_default();
    if codenames.is_known_codename(first_token) {
        return Err(Rejection::Codename(first_token.to_string()));
    }

    // Oddball images like `14.09-factory-preinstalled-system-armel+manta.img`
    // are rejected here.
    let (product, release, variant) = split_file_name(file_name).ok_or(Rejection::FilenameShape)?;

    // `live-server-amd64` is the `live-server` flavor for `amd64`, so the
    // architecture is always the last token.
    let (flavor, arch) = variant.rsplit_once('-').unwrap_or(("", variant));

    let (arch, subarch) = match arch.split_once('+') {
        Some((arch, subarch)) if !subarch.contains('+') => (arch, subarch),
        _ => (arch, ""),
    };

    let client = trailing_user_agent(line)
        .and_then(|user_agent| ClientTag::from_request(user_agent, subarch));

    Ok(IsoImage {
        product: product.to_string(),
        release: release.to_string(),
        flavor: flavor.to_string(),
        arch: arch.to_string(),
        subarch: subarch.to_string(),
        client,
    })
}

/// Splits a file name like `ubuntu-mate-20.04-desktop-amd64.iso` into
/// `("ubuntu-mate", "20.04", "desktop-amd64")`.
///
/// The product is the longest prefix that is followed by a `-`, a (possibly
/// empty) dotted version number, another `-`, and a dot-free variant that
/// ends at the first file extension.
fn split_file_name(file_name: &str) -> Option<(&str, &str, &str)> {
    file_name.rmatch_indices('-').find_map(|(pos, _)| {
        let product = &file_name[..pos];
        if product.contains(char::is_whitespace) {
            return None;
        }

        let rest = &file_name[pos + 1..];
        let release_len = rest
            .bytes()
            .take_while(|b| b.is_ascii_digit() || *b == b'.')
            .count();

        let (release, rest) = rest.split_at(release_len);
        let rest = rest.strip_prefix('-')?;
        let (variant, _extension) = rest.split_once('.')?;

        Some((product, release, variant))
    })
}
