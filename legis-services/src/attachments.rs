//! Concurrent attachment extraction

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use futures::future::try_join_all;
use legis_core::{Attachment, AttachmentExtractor, ResearchError, ResearchResult, SectionDocuments};
use tracing::{debug, instrument};

/// Query text handed to the extractor: the query followed by each subquery
pub fn extraction_query(query: &str, subqueries: &[String]) -> String {
    std::iter::once(query)
        .chain(subqueries.iter().map(String::as_str))
        .collect::<Vec<_>>()
        .join("\n")
}

fn decode(attachment: &Attachment) -> ResearchResult<Vec<u8>> {
    STANDARD.decode(attachment.content.trim()).map_err(|e| {
        ResearchError::extraction(format!(
            "Attachment {} is not valid base64: {}",
            attachment.name, e
        ))
    })
}

/// Prefix ids of url-less documents with the attachment's position, so two
/// attachments sharing a file name never share a dedup key.
fn scope_ids(index: usize, sections: &mut [SectionDocuments]) {
    for document in sections.iter_mut().flat_map(|s| s.documents.iter_mut()) {
        if document.url.as_deref().map_or(true, |url| url.trim().is_empty()) {
            document.id = format!("attachment-{}/{}", index + 1, document.id);
        }
    }
}

/// Extract section documents from every attachment concurrently.
///
/// Results are flattened in request order. An attachment yielding nothing is
/// fine; any extractor failure fails the whole stage.
#[instrument(skip_all, fields(attachments = attachments.len()))]
pub async fn extract_attachments(
    extractor: &dyn AttachmentExtractor,
    query: &str,
    subqueries: &[String],
    attachments: &[Attachment],
) -> ResearchResult<Vec<SectionDocuments>> {
    let decoded = attachments
        .iter()
        .map(|attachment| decode(attachment).map(|bytes| (attachment, bytes)))
        .collect::<ResearchResult<Vec<_>>>()?;

    let query = extraction_query(query, subqueries);
    let query = query.as_str();

    let per_attachment = try_join_all(decoded.iter().enumerate().map(
        |(index, (attachment, bytes))| async move {
            let mut sections = extractor
                .extract(query, &attachment.name, bytes, &attachment.media_type)
                .await?;
            scope_ids(index, &mut sections);
            debug!(
                "Attachment {} yielded {} sections",
                attachment.name,
                sections.len()
            );
            Ok::<_, ResearchError>(sections)
        },
    ))
    .await?;

    Ok(per_attachment.into_iter().flatten().collect())
}
