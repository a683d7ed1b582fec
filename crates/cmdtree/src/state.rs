//! Run-scoped match state: the token list and what claimed each token.
//!
//! Every token is claimed by at most one item. The only way to change a claim
//! is [`MatchState::claim`] / [`MatchState::unclaim`], so the invariant can be
//! checked after any run with [`MatchState::is_consistent`].

use crate::error::{ClaimError, Result};
use crate::item::{ItemId, ParserId};

/// One raw command-line token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Argument {
    text: String,
    claimed_by: Option<ItemId>,
}

impl Argument {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            claimed_by: None,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn claimed_by(&self) -> Option<ItemId> {
        self.claimed_by
    }

    pub fn is_claimed(&self) -> bool {
        self.claimed_by.is_some()
    }
}

/// A value bound to an item: a token, or the tail of a token for `--name=value`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Bound {
    token: usize,
    offset: usize,
}

#[derive(Debug, Clone, Default)]
struct ItemState {
    matched: bool,
    matched_in: Option<ParserId>,
    matched_token: Option<usize>,
    bound: Vec<Bound>,
}

/// Claim table plus per-item match state for a single run.
#[derive(Debug, Clone)]
pub struct MatchState {
    args: Vec<Argument>,
    items: Vec<ItemState>,
}

impl MatchState {
    pub(crate) fn new<I, S>(args: I, item_count: usize) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            args: args.into_iter().map(Argument::new).collect(),
            items: vec![ItemState::default(); item_count],
        }
    }

    pub fn arguments(&self) -> &[Argument] {
        &self.args
    }

    pub fn len(&self) -> usize {
        self.args.len()
    }

    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }

    pub fn text(&self, index: usize) -> Option<&str> {
        self.args.get(index).map(Argument::text)
    }

    pub fn is_claimed(&self, index: usize) -> bool {
        self.args.get(index).is_some_and(Argument::is_claimed)
    }

    pub fn claimed_by(&self, index: usize) -> Option<ItemId> {
        self.args.get(index).and_then(Argument::claimed_by)
    }

    pub fn first_unclaimed(&self) -> Option<usize> {
        self.args.iter().position(|a| !a.is_claimed())
    }

    pub fn unclaimed(&self) -> impl Iterator<Item = usize> + '_ {
        self.args
            .iter()
            .enumerate()
            .filter(|(_, a)| !a.is_claimed())
            .map(|(i, _)| i)
    }

    /// Attribute token `index` to `item`.
    ///
    /// Claiming a token the item already owns is a no-op.
    pub fn claim(&mut self, index: usize, item: ItemId) -> Result<()> {
        let arg = self
            .args
            .get_mut(index)
            .ok_or(ClaimError::OutOfRange(index))?;
        match arg.claimed_by {
            Some(owner) if owner != item => Err(ClaimError::AlreadyClaimed {
                index,
                text: arg.text.clone(),
            }),
            _ => {
                arg.claimed_by = Some(item);
                tracing::trace!(index, item = item.index(), "claimed '{}'", arg.text);
                Ok(())
            }
        }
    }

    /// Release every token `item` holds and forget that it matched.
    pub fn unclaim(&mut self, item: ItemId) {
        for arg in self.args.iter_mut().filter(|a| a.claimed_by == Some(item)) {
            arg.claimed_by = None;
        }
        if let Some(state) = self.items.get_mut(item.index()) {
            *state = ItemState::default();
        }
        tracing::trace!(item = item.index(), "unclaimed");
    }

    /// Claim `index` as the token that made `item` match at level `parser`.
    pub(crate) fn mark_matched(&mut self, item: ItemId, parser: ParserId, index: usize) -> Result<()> {
        self.item_state(item)?;
        self.claim(index, item)?;
        let state = self.item_state(item)?;
        state.matched = true;
        state.matched_in = Some(parser);
        state.matched_token = Some(index);
        Ok(())
    }

    /// Claim `index` and record `token[offset..]` as one of `item`'s values.
    pub(crate) fn bind(&mut self, item: ItemId, index: usize, offset: usize) -> Result<()> {
        self.item_state(item)?;
        self.claim(index, item)?;
        self.item_state(item)?.bound.push(Bound {
            token: index,
            offset,
        });
        Ok(())
    }

    fn item_state(&mut self, item: ItemId) -> Result<&mut ItemState> {
        self.items
            .get_mut(item.index())
            .ok_or(ClaimError::UnknownItem(item.index()))
    }

    pub fn is_matched(&self, item: ItemId) -> bool {
        self.items.get(item.index()).is_some_and(|s| s.matched)
    }

    /// Parser level that claimed `item` in this run.
    pub fn matched_in(&self, item: ItemId) -> Option<ParserId> {
        self.items.get(item.index()).and_then(|s| s.matched_in)
    }

    /// Token that made `item` match (the flag token itself for value flags).
    pub fn matched_token(&self, item: ItemId) -> Option<usize> {
        self.items.get(item.index()).and_then(|s| s.matched_token)
    }

    /// Values bound to `item`, in binding order.
    pub fn values(&self, item: ItemId) -> Vec<&str> {
        let Some(state) = self.items.get(item.index()) else {
            return Vec::new();
        };
        state
            .bound
            .iter()
            .filter_map(|b| self.args.get(b.token).and_then(|a| a.text.get(b.offset..)))
            .collect()
    }

    /// Token indices bound as values to `item`.
    pub fn bound_tokens(&self, item: ItemId) -> Vec<usize> {
        self.items
            .get(item.index())
            .map(|s| s.bound.iter().map(|b| b.token).collect())
            .unwrap_or_default()
    }

    /// Every token an item refers to is claimed by that same item.
    pub fn is_consistent(&self) -> bool {
        self.items.iter().enumerate().all(|(idx, state)| {
            let owner = Some(ItemId(idx));
            state
                .matched_token
                .iter()
                .chain(state.bound.iter().map(|b| &b.token))
                .all(|&t| self.claimed_by(t) == owner)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(args: &[&str]) -> MatchState {
        MatchState::new(args.iter().copied(), 3)
    }

    #[test]
    fn claim_rejects_a_second_owner() {
        let mut s = state(&["-x", "value"]);
        s.claim(0, ItemId(0)).unwrap();
        s.claim(0, ItemId(0)).unwrap();
        let err = s.claim(0, ItemId(1)).unwrap_err();
        assert_eq!(
            err,
            ClaimError::AlreadyClaimed {
                index: 0,
                text: "-x".to_string()
            }
        );
        assert_eq!(s.claimed_by(0), Some(ItemId(0)));
    }

    #[test]
    fn claim_out_of_range() {
        let mut s = state(&["a"]);
        assert_eq!(s.claim(4, ItemId(0)), Err(ClaimError::OutOfRange(4)));
    }

    #[test]
    fn items_outside_the_run_claim_nothing() {
        let mut s = state(&["a"]);
        assert_eq!(
            s.mark_matched(ItemId(7), ParserId::ROOT, 0),
            Err(ClaimError::UnknownItem(7))
        );
        assert_eq!(s.bind(ItemId(3), 0, 0), Err(ClaimError::UnknownItem(3)));
        assert!(!s.is_claimed(0));
    }

    #[test]
    fn inline_values_are_token_tails() {
        let mut s = state(&["--out=file.txt"]);
        s.mark_matched(ItemId(2), ParserId::ROOT, 0).unwrap();
        s.bind(ItemId(2), 0, "--out=".len()).unwrap();
        assert_eq!(s.values(ItemId(2)), vec!["file.txt"]);
        assert!(s.is_consistent());
    }

    #[test]
    fn unclaim_releases_every_token_of_the_item() {
        let mut s = state(&["-o", "out", "rest"]);
        s.mark_matched(ItemId(1), ParserId::ROOT, 0).unwrap();
        s.bind(ItemId(1), 1, 0).unwrap();
        assert_eq!(s.first_unclaimed(), Some(2));

        s.unclaim(ItemId(1));
        assert!(!s.is_matched(ItemId(1)));
        assert!(s.values(ItemId(1)).is_empty());
        assert_eq!(s.unclaimed().collect::<Vec<_>>(), vec![0, 1, 2]);
    }
}
