//! List Blobs response parsing.
//!
//! The relevant subset of the `EnumerationResults` document:
//!
//! ```xml
//! <EnumerationResults ContainerName="...">
//!   <Blobs>
//!     <Blob>
//!       <Name>report.pdf</Name>
//!       <Properties>
//!         <Last-Modified>Wed, 09 Sep 2009 09:20:02 GMT</Last-Modified>
//!         <Content-Length>1234</Content-Length>
//!       </Properties>
//!     </Blob>
//!     <BlobPrefix><Name>folder/</Name></BlobPrefix>
//!   </Blobs>
//!   <NextMarker>opaque</NextMarker>
//! </EnumerationResults>
//! ```

use crate::BlobInfo;
use crate::error::{ErrorKind, Result};
use exn::{OptionExt, ResultExt};
use quick_xml::Reader;
use quick_xml::events::Event;
use time::OffsetDateTime;

/// One page of a container listing.
#[derive(Debug, Default)]
pub(crate) struct ListPage {
    pub blobs: Vec<BlobInfo>,
    /// Continuation marker; `None` on the last page.
    pub next_marker: Option<String>,
}

#[derive(Default)]
struct PartialBlob {
    name: Option<String>,
    size: Option<u64>,
    modified: Option<OffsetDateTime>,
}
impl PartialBlob {
    fn finish(self) -> Result<BlobInfo> {
        let name = self.name.ok_or_raise(|| malformed("blob without a name"))?;
        let size = self.size.ok_or_raise(|| malformed(format!("{name} has no Content-Length")))?;
        let modified = self.modified.ok_or_raise(|| malformed(format!("{name} has no Last-Modified")))?;
        Ok(BlobInfo::new(name, size, modified))
    }
}

fn malformed(detail: impl Into<String>) -> ErrorKind {
    ErrorKind::BackendError(format!("malformed blob listing: {}", detail.into()))
}

pub(crate) fn parse(xml: &str) -> Result<ListPage> {
    // No text trimming: blob names may begin or end with whitespace, and
    // indentation between elements falls outside the leaves matched below.
    let mut reader = Reader::from_str(xml);

    let mut page = ListPage::default();
    let mut path: Vec<String> = Vec::new();
    let mut current: Option<PartialBlob> = None;

    loop {
        match reader.read_event().or_raise(|| malformed("invalid XML"))? {
            Event::Start(e) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                if name == "Blob" {
                    current = Some(PartialBlob::default());
                }
                path.push(name);
            },
            Event::End(_) => {
                if path.pop().as_deref() == Some("Blob")
                    && let Some(blob) = current.take()
                {
                    page.blobs.push(blob.finish()?);
                }
            },
            Event::Text(e) => {
                let text = e.unescape().or_raise(|| malformed("invalid text content"))?;
                match (path.as_slice(), current.as_mut()) {
                    ([.., parent, leaf], _) if parent == "EnumerationResults" && leaf == "NextMarker" => {
                        page.next_marker = Some(text.trim().to_string()).filter(|marker| !marker.is_empty());
                    },
                    ([.., parent, leaf], Some(blob)) if parent == "Blob" && leaf == "Name" => {
                        blob.name.get_or_insert_default().push_str(&text);
                    },
                    ([.., parent, leaf], Some(blob)) if parent == "Properties" && leaf == "Content-Length" => {
                        blob.size = Some(text.trim().parse::<u64>().or_raise(|| malformed(format!("bad Content-Length {text:?}")))?);
                    },
                    ([.., parent, leaf], Some(blob)) if parent == "Properties" && leaf == "Last-Modified" => {
                        let modified = httpdate::parse_http_date(text.trim())
                            .or_raise(|| malformed(format!("bad Last-Modified {text:?}")))?;
                        blob.modified = Some(modified.into());
                    },
                    _ => {},
                }
            },
            Event::Eof => break,
            _ => {},
        }
    }

    Ok(page)
}
