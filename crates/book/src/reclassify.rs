//! Cross-book cleanup: dropping transactions another book already has, and
//! recategorising counter accounts by payee similarity.

use std::collections::{BTreeMap, HashSet};

use tally_core::Date;

use crate::book::Book;

impl Book {
    /// Drops every transaction whose `(date, payee)` also appears in `other`.
    pub fn remove_duplicates_of(&mut self, other: &Book) {
        let known: HashSet<(Date, &str)> = other
            .transactions()
            .map(|t| (t.date(), t.payee()))
            .collect();
        self.filter_transactions(|t| !known.contains(&(t.date(), t.payee())));
    }

    /// Recategorises two-posting transactions against `account`.
    ///
    /// For each payee in `reference`, the counter account it was most often
    /// booked to is learned from its two-posting transactions against
    /// `account`. Each matching transaction here then takes the counter
    /// account of the reference payee with the highest positive `similarity`
    /// to its own payee. Transactions with no similar payee are untouched.
    pub fn reclassify_by_account<F>(&mut self, reference: &Book, account: &str, mut similarity: F)
    where
        F: FnMut(&str, &str) -> f64,
    {
        let mut counts: BTreeMap<&str, BTreeMap<&str, usize>> = BTreeMap::new();
        for t in reference.transactions() {
            if let [a, b] = t.postings() {
                let counter = match (a.account == account, b.account == account) {
                    (true, false) => b,
                    (false, true) => a,
                    _ => continue,
                };
                *counts
                    .entry(t.payee())
                    .or_default()
                    .entry(counter.account.as_str())
                    .or_insert(0) += 1;
            }
        }
        let learned: Vec<(&str, &str)> = counts
            .iter()
            .filter_map(|(payee, accounts)| {
                // Most frequent counter account; ties go to the first name.
                let (best, _) = accounts
                    .iter()
                    .max_by(|(a_name, a_count), (b_name, b_count)| {
                        a_count.cmp(b_count).then_with(|| b_name.cmp(a_name))
                    })?;
                Some((*payee, *best))
            })
            .collect();

        let spans = self.journal.spans().to_vec();
        let mut postings = self.take_postings();
        let mut moved = 0usize;
        for span in spans {
            let (start, end) = (span.start, span.end);
            if end - start != 2 {
                continue;
            }
            let counter_idx = match (
                postings[start].account == account,
                postings[start + 1].account == account,
            ) {
                (true, false) => start + 1,
                (false, true) => start,
                _ => continue,
            };

            let payee = postings[start].payee.clone();
            let mut best: Option<&str> = None;
            let mut best_score = 0.0;
            for (candidate, counter) in &learned {
                let score = similarity(&payee, candidate);
                if score > best_score {
                    best_score = score;
                    best = Some(*counter);
                }
            }
            if let Some(counter) = best {
                if postings[counter_idx].account != counter {
                    tracing::debug!(
                        payee = %payee,
                        from = %postings[counter_idx].account,
                        to = counter,
                        "reclassified"
                    );
                    postings[counter_idx].set_account(counter.to_string());
                    moved += 1;
                }
            }
        }
        self.replace_postings(postings);
        tracing::info!(account, moved, "reclassification finished");
    }
}
