//! Page boundaries and continuation cursors
//!
//! Backends fetch at most `page_size` sorted rows. A full batch means more
//! rows may follow, so the page carries a continuation query whose `since`
//! is the sortable encoding of the last record's ordering value. A short
//! batch is the final page.
//!
//! Ties on a non-unique ordering field are not disambiguated: a record that
//! shares its ordering value with the last record of a page is skipped.

use crate::error::{Error, PathSegment, Result, ValidationError};
use crate::query::{Page, Query};
use crate::resource::Resource;
use crate::value::Record;

/// Default number of records per page
pub const PAGE_SIZE: usize = 100;

/// Build a [`Page`] from an already-sorted batch
///
/// `results` longer than `page_size` are truncated. A batch of exactly
/// `page_size` records yields a continuation even if nothing follows; the
/// next request then returns an empty final page.
pub fn paginate(
    resource: &Resource,
    query: &Query,
    mut results: Vec<Record>,
    page_size: usize,
) -> Result<Page> {
    if page_size == 0 {
        return Err(Error::Config("page size must be positive".to_string()));
    }
    if results.len() < page_size {
        return Ok(Page {
            results,
            next: None,
        });
    }
    results.truncate(page_size);

    let field = resource.schema().get(&query.ordering).ok_or_else(|| {
        ValidationError::composite(
            "query is invalid",
            vec![(
                PathSegment::Key(query.ordering.clone()),
                ValidationError::new("unknown ordering field"),
            )],
        )
    })?;
    let since = match results.last().and_then(|r| r.get(&query.ordering)) {
        Some(value) => field.encode_sortable(value)?,
        None => {
            return Err(ValidationError::new(format!(
                "last result has no '{}' value",
                query.ordering
            ))
            .into())
        }
    };

    let mut next = query.clone();
    next.since = Some(since);
    Ok(Page {
        results,
        next: Some(next),
    })
}
