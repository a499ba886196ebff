use std::collections::HashMap;

use num_rational::BigRational;
use num_traits::Zero;

use crate::posting::Posting;
use crate::transaction::Journal;

/// Puts postings into book order, merges entries of the same account and
/// currency within a transaction, drops zero amounts and recomputes running
/// balances per `(account, currency)`.
///
/// Merged postings lose their posting note. Idempotent.
pub(crate) fn compact(mut postings: Vec<Posting>) -> Journal {
    postings.sort_by(Posting::book_order);

    let mut merged: Vec<Posting> = Vec::with_capacity(postings.len());
    for posting in postings {
        match merged.last_mut() {
            Some(last) if last.same_slot(&posting) => {
                last.amount += posting.amount;
                last.note.clear();
            }
            _ => merged.push(posting),
        }
    }
    merged.retain(|p| !p.amount.is_zero());

    let mut running: HashMap<(String, String), BigRational> = HashMap::new();
    for posting in &mut merged {
        let balance = running
            .entry((posting.account.clone(), posting.currency.clone()))
            .or_insert_with(BigRational::zero);
        *balance += &posting.amount;
        posting.balance = balance.clone();
    }

    tracing::trace!(postings = merged.len(), "compacted");
    Journal::from_sorted(merged)
}
