//! Hierarchical account paths such as `Income:Salary:Bonus`.
//!
//! Paths are plain strings split by a divider (usually `:`). The helpers here
//! enumerate divider-aligned prefixes once instead of re-scanning strings for
//! every membership question.

/// Default separator between account path segments.
pub const DEFAULT_DIVIDER: &str = ":";

/// Path segments of `account`, root first.
pub fn segments<'a>(account: &'a str, divider: &'a str) -> impl Iterator<Item = &'a str> + 'a {
    account.split(divider)
}

/// Proper ancestors of `account`, root first.
///
/// `ancestors("A:B:C", ":")` yields `"A"`, `"A:B"`.
pub fn ancestors<'a>(account: &'a str, divider: &'a str) -> impl Iterator<Item = &'a str> + 'a {
    let ends: Vec<usize> = if divider.is_empty() {
        Vec::new()
    } else {
        account
            .match_indices(divider)
            .map(|(i, _)| i)
            .filter(|&i| i > 0)
            .collect()
    };
    ends.into_iter().map(move |end| &account[..end])
}

/// Ancestors of `account` followed by `account` itself.
pub fn lineage<'a>(account: &'a str, divider: &'a str) -> impl Iterator<Item = &'a str> + 'a {
    ancestors(account, divider).chain(core::iter::once(account))
}

/// True if `account` is `ancestor` or lies underneath it.
pub fn is_descendant_or_self(account: &str, ancestor: &str, divider: &str) -> bool {
    match account.strip_prefix(ancestor) {
        Some("") => true,
        Some(rest) => !divider.is_empty() && rest.starts_with(divider),
        None => false,
    }
}

/// Longest divider-aligned prefix shared by both paths (empty if none).
///
/// `common_prefix("Income:T1:A", "Income:T1:B", ":")` is `"Income:T1"`, and
/// `common_prefix("Income:T1", "Income:T1:A", ":")` is `"Income:T1"`.
pub fn common_prefix<'a>(left: &'a str, right: &str, divider: &str) -> &'a str {
    let mut shared = 0;
    for prefix in lineage(left, divider) {
        if !is_descendant_or_self(right, prefix, divider) {
            break;
        }
        shared = prefix.len();
    }
    &left[..shared]
}

/// Splits `account` at every ancestor for which `is_point` holds.
///
/// Returns the number of split points above the account and the remaining
/// suffix. With `include_self`, the account itself counts as a split point,
/// which leaves an empty suffix.
pub fn split_at_points<'a, F>(
    account: &'a str,
    divider: &str,
    include_self: bool,
    is_point: F,
) -> (u32, &'a str)
where
    F: Fn(&str) -> bool,
{
    let mut level = 0;
    let mut start = 0;
    for ancestor in ancestors(account, divider) {
        if is_point(ancestor) {
            level += 1;
            start = ancestor.len() + divider.len();
        }
    }
    if include_self && is_point(account) {
        level += 1;
        start = account.len();
    }
    (level, &account[start..])
}
