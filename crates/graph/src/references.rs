//! Free-text issue reference extraction.
//!
//! [`extract_references`] recognises three forms, each in its own pass over
//! the whole text:
//!
//! | Pass | Form | Repository |
//! |------|------|------------|
//! | 1 | `https://host/OWNER/REPO/issues/N` | explicit |
//! | 2 | `OWNER/REPO#N` | explicit |
//! | 3 | `#N` | none (resolved by the caller) |
//!
//! Passes are independent: a `#N` inside an `OWNER/REPO#N` mention is still
//! emitted by pass 3 as a bare reference, because its key `("", N)` differs
//! from the qualified key `("OWNER/REPO", N)`.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::{IssueNumber, Reference, RepositoryId};

static ISSUE_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"https?://[^/\s]+/([^/\s]+)/([^/\s]+)/issues/(\d+)")
        .expect("issue URL regex is valid")
});

static QUALIFIED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([A-Za-z0-9_.-]+/[A-Za-z0-9_.-]+)#(\d+)").expect("qualified regex is valid")
});

static BARE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"#(\d+)").expect("bare regex is valid"));

/// Returns the distinct issue references in `text`, in pass order then
/// first-occurrence order.
///
/// Two matches with the same `(repository-or-empty, number)` collapse into the
/// first one. Numbers that do not fit in a `u64` are skipped.
pub fn extract_references(text: &str) -> Vec<Reference> {
    let mut seen: HashSet<(Option<RepositoryId>, IssueNumber)> = HashSet::new();
    let mut out = Vec::new();

    let mut push = |reference: Reference| {
        if seen.insert((reference.repository.clone(), reference.number)) {
            out.push(reference);
        }
    };

    for caps in ISSUE_URL.captures_iter(text) {
        let repository = RepositoryId::new(format!("{}/{}", &caps[1], &caps[2]));
        if let Some(reference) = build(&caps, repository, 3) {
            push(reference);
        }
    }

    for caps in QUALIFIED.captures_iter(text) {
        let repository = RepositoryId::new(&caps[1]);
        if let Some(reference) = build(&caps, repository, 2) {
            push(reference);
        }
    }

    for caps in BARE.captures_iter(text) {
        if let Some(reference) = build(&caps, None, 1) {
            push(reference);
        }
    }

    out
}

fn build(
    caps: &Captures<'_>,
    repository: Option<RepositoryId>,
    number_group: usize,
) -> Option<Reference> {
    let number = caps.get(number_group)?.as_str().parse::<u64>().ok()?;
    Some(Reference {
        repository,
        number: IssueNumber::new(number),
        raw: caps.get(0)?.as_str().to_string(),
    })
}
