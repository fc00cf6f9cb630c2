use crate::{wire, BlobVisionError, TaggedBlob};

/// One page of a find-by-tags listing.
#[derive(Debug, PartialEq, Eq)]
pub(crate) struct ListingPage {
    pub blobs: Vec<TaggedBlob>,
    pub next_marker: Option<String>,
}

pub(crate) fn decode_listing_page(body: &str) -> Result<ListingPage, BlobVisionError> {
    let results: wire::EnumerationResults = quick_xml::de::from_str(body).map_err(|err| {
        BlobVisionError::Decode(format!("invalid blob listing XML: {err}; body: {body}"))
    })?;

    let blobs = results
        .blobs
        .items
        .into_iter()
        .map(|entry| TaggedBlob {
            container: entry.container_name,
            blob: entry.name,
        })
        .collect();

    Ok(ListingPage {
        blobs,
        next_marker: results
            .next_marker
            .map(|marker| marker.trim().to_owned())
            .filter(|marker| !marker.is_empty()),
    })
}

/// Pulls a human-readable message out of a provider error body.
///
/// Understands storage XML (`<Error><Code>..</Code><Message>..</Message>`)
/// and cognitive services JSON (`{"error":{"code":..,"message":..}}`).
pub(crate) fn service_error_message(body: &str) -> Option<String> {
    let trimmed = body.trim();
    if trimmed.starts_with('{') {
        let envelope: wire::ServiceErrorEnvelope = serde_json::from_str(trimmed).ok()?;
        return Some(match envelope.error.code {
            Some(code) => format!("{code}: {}", envelope.error.message),
            None => envelope.error.message,
        });
    }
    if trimmed.starts_with('<') {
        let error: wire::StorageError = quick_xml::de::from_str(trimmed).ok()?;
        return Some(match error.message {
            Some(message) => format!("{}: {}", error.code, first_line(&message)),
            None => error.code,
        });
    }
    None
}

fn first_line(text: &str) -> &str {
    text.lines().next().unwrap_or(text).trim()
}

#[cfg(test)]
mod tests {
    use crate::{decode, BlobVisionError, TaggedBlob};

    const PAGE: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<EnumerationResults ServiceEndpoint="https://acct.blob.core.windows.net/">
  <Where>"customModifiedDate"&lt;='2025-01-05'</Where>
  <Blobs>
    <Blob>
      <Name>a.jpeg</Name>
      <ContainerName>samplefiles</ContainerName>
      <Tags><TagSet><Tag><Key>customModifiedDate</Key><Value>2025-01-01</Value></Tag></TagSet></Tags>
    </Blob>
    <Blob>
      <Name>dir/b.png</Name>
      <ContainerName>archive</ContainerName>
    </Blob>
  </Blobs>
  <NextMarker>2!72!MDAwMDA</NextMarker>
</EnumerationResults>"#;

    #[test]
    fn decodes_listing_with_marker() {
        let page = decode::decode_listing_page(PAGE).expect("must decode");
        assert_eq!(
            page.blobs,
            vec![
                TaggedBlob {
                    container: "samplefiles".to_owned(),
                    blob: "a.jpeg".to_owned(),
                },
                TaggedBlob {
                    container: "archive".to_owned(),
                    blob: "dir/b.png".to_owned(),
                },
            ]
        );
        assert_eq!(page.next_marker.as_deref(), Some("2!72!MDAwMDA"));
    }

    #[test]
    fn decodes_empty_listing() {
        let body = r#"<?xml version="1.0" encoding="utf-8"?>
<EnumerationResults ServiceEndpoint="https://acct.blob.core.windows.net/"><Where>x</Where><Blobs /><NextMarker /></EnumerationResults>"#;
        let page = decode::decode_listing_page(body).expect("must decode");
        assert!(page.blobs.is_empty());
        assert_eq!(page.next_marker, None);
    }

    #[test]
    fn rejects_malformed_listing() {
        let err = decode::decode_listing_page("not xml at all").expect_err("must fail");
        assert!(matches!(err, BlobVisionError::Decode(_)));
    }

    #[test]
    fn extracts_service_json_message() {
        let body =
            r#"{"error":{"code":"InvalidImageSize","message":"Image must be at most 20 MB."}}"#;
        assert_eq!(
            decode::service_error_message(body).as_deref(),
            Some("InvalidImageSize: Image must be at most 20 MB.")
        );
    }

    #[test]
    fn extracts_storage_xml_message() {
        let body = "<?xml version=\"1.0\" encoding=\"utf-8\"?><Error><Code>BlobNotFound</Code><Message>The specified blob does not exist.\nRequestId:abc</Message></Error>";
        assert_eq!(
            decode::service_error_message(body).as_deref(),
            Some("BlobNotFound: The specified blob does not exist.")
        );
    }

    #[test]
    fn unknown_bodies_yield_none() {
        assert_eq!(decode::service_error_message("upstream exploded"), None);
        assert_eq!(decode::service_error_message(""), None);
    }
}
