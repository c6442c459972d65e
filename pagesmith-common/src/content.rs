//! Attachment decoding and published-content building.
//!
//! Decoding is best-effort per attachment: a malformed data URI or an
//! undecodable payload drops that one entry with a reported reason and
//! never fails the batch. Building is a pure function from (brief,
//! decoded attachments) to the full file set to publish.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::Serialize;
use std::collections::BTreeMap;
use thiserror::Error;

/// Relative path → textual content. Paths are unique by construction.
pub type FileSet = BTreeMap<String, String>;

/// Path of the generated landing page.
pub const LANDING_PAGE: &str = "index.html";

/// Path of the generated README.
pub const README: &str = "README.md";

/// Path of the generated license file.
pub const LICENSE: &str = "LICENSE";

/// Why a single attachment could not be turned into content.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DataUriError {
    /// The value does not start with the `data:` scheme.
    #[error("not a data URI")]
    NotDataUri,

    /// No comma separates the header from the payload.
    #[error("malformed data URI: missing payload separator")]
    MissingSeparator,

    /// The payload is not valid base64.
    #[error("malformed data URI: {0}")]
    InvalidBase64(String),
}

/// Per-attachment decode report.
///
/// Aggregated into a batch report so partial-failure composition is
/// observable instead of silently swallowed.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum DecodeOutcome {
    /// The attachment produced content.
    Decoded { name: String },
    /// The attachment was dropped; the rest of the batch is unaffected.
    Skipped { name: String, reason: String },
}

/// An attachment whose content is ready to merge into the file set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedAttachment {
    pub name: String,
    pub content: String,
}

/// Decode an inline `data:` URI into text.
///
/// The payload after the first comma is base64-decoded; UTF-8 is tried
/// first, and invalid sequences fall back to a lenient byte-to-text
/// mapping so encoding mismatches do not make the attachment vanish.
pub fn decode_data_uri(uri: &str) -> Result<String, DataUriError> {
    if !uri.starts_with("data:") {
        return Err(DataUriError::NotDataUri);
    }
    let payload = uri
        .split_once(',')
        .map(|(_, payload)| payload)
        .ok_or(DataUriError::MissingSeparator)?;
    let bytes = BASE64
        .decode(payload.trim())
        .map_err(|e| DataUriError::InvalidBase64(e.to_string()))?;
    Ok(match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
    })
}

/// Whether an attachment source is inline rather than fetchable.
pub fn is_data_uri(url: &str) -> bool {
    url.starts_with("data:")
}

/// Build the full file set to publish: landing page, README, and license,
/// then attachment entries. Attachments win on path collision, so a
/// caller may deliberately override any generated entry.
///
/// Pure function of its inputs.
pub fn build_file_set(brief: &str, attachments: &[DecodedAttachment]) -> FileSet {
    let mut files = FileSet::new();
    files.insert(LANDING_PAGE.to_string(), landing_page(brief));
    files.insert(README.to_string(), readme(brief));
    files.insert(LICENSE.to_string(), MIT_LICENSE.to_string());

    for attachment in attachments {
        files.insert(attachment.name.clone(), attachment.content.clone());
    }
    files
}

fn landing_page(brief: &str) -> String {
    format!(
        "<!DOCTYPE html>\n\
         <html lang=\"en\">\n\
         <head>\n\
         <meta charset=\"UTF-8\">\n\
         <title>{brief}</title>\n\
         </head>\n\
         <body>\n\
         <h1>{brief}</h1>\n\
         </body>\n\
         </html>\n"
    )
}

fn readme(brief: &str) -> String {
    format!("# Auto-generated App\n\n{brief}\n\nLicense: MIT\n")
}

const MIT_LICENSE: &str = "\
MIT License

Permission is hereby granted, free of charge, to any person obtaining a copy
of this software and associated documentation files (the \"Software\"), to deal
in the Software without restriction, including without limitation the rights
to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
copies of the Software, and to permit persons to whom the Software is
furnished to do so, subject to the following conditions:

The above copyright notice and this permission notice shall be included in all
copies or substantial portions of the Software.

THE SOFTWARE IS PROVIDED \"AS IS\", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
SOFTWARE.
";
