//! Recording a rebuilt working tree as a commit

use crate::backend::HistoryWriter;
use crate::document::CommitDocument;
use crate::error::Result;
use crate::types::Revision;
use tracing::debug;

/// Write the current index as a tree and commit it on top of `parent`
///
/// Author, committer and message come from the document unchanged, timestamp
/// offsets included. No ref is moved.
pub fn commit_index<W: HistoryWriter + ?Sized>(
    writer: &mut W,
    parent: Option<&Revision>,
    document: &CommitDocument,
) -> Result<Revision> {
    let tree = writer.write_tree()?;
    let commit = writer.create_commit(
        &tree,
        parent,
        &document.author,
        &document.committer,
        &document.message,
    )?;
    debug!("Committed tree {} as {} (parent {:?})", tree, commit, parent.map(Revision::as_str));
    Ok(commit)
}
