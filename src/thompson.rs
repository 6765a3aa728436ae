//! This module contains the Thompson construction that converts the postfix form of a regex
//! into an NFA.
//!
//! The postfix tokens are evaluated left to right with a stack that holds either NFA fragments
//! or the markers of open groups. All state ids of a compilation are drawn from one counter
//! that the `ThompsonBuilder` threads through the construction of each pattern, so that the
//! pattern NFAs own disjoint id ranges and can be merged without renumbering.

use std::collections::{BTreeMap, BTreeSet};

use log::trace;

use crate::{
    alphabet,
    nfa::{Nfa, NfaState, PatternNfa},
    normalizer::{Postfix, PostfixToken, Repetition},
    LexGenError, LexGenErrorKind, PatternID, Result, StateID,
};

macro_rules! internal {
    ($($arg:tt)*) => {
        LexGenError::new(LexGenErrorKind::InternalBuildError(format!($($arg)*)))
    };
}

/// The builder that creates one NFA per pattern and merges them afterwards.
#[derive(Debug)]
pub struct ThompsonBuilder {
    // The id of the next state to create. State 0 is reserved for the start state of the
    // merged NFA.
    next_id: StateID,
}

impl Default for ThompsonBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ThompsonBuilder {
    /// Create a new builder for a compilation.
    pub fn new() -> Self {
        ThompsonBuilder {
            next_id: StateID::new(1),
        }
    }

    /// Build the NFA of a pattern from the postfix form of its regex.
    /// # Errors
    /// An `InternalBuildError` is returned if the postfix sequence can't be evaluated, e.g.
    /// because an operator finds no operand on the stack.
    pub fn build(&mut self, postfix: &Postfix, pattern: PatternID) -> Result<PatternNfa> {
        let mut construction = Construction::new(self.next_id);
        let fragment = construction.evaluate(postfix)?;
        debug_assert_eq!(fragment.states.len(), construction.states.len());
        self.next_id += construction.states.len();
        trace!(
            "Pattern {}: NFA with {} states, start {}, accept {}",
            pattern,
            construction.states.len(),
            fragment.start,
            fragment.accept
        );
        Ok(PatternNfa {
            pattern,
            states: construction.states,
            start_state: fragment.start,
            accept_state: fragment.accept,
            alphabet: construction.alphabet,
        })
    }

    /// Merge the pattern NFAs built by this builder into one NFA.
    /// A new start state gets an epsilon edge to the start state of each pattern NFA.
    /// # Errors
    /// An `InternalBuildError` is returned if the state ids of the NFAs are not disjoint or
    /// leave gaps.
    pub fn merge(self, mut nfas: Vec<PatternNfa>) -> Result<Nfa> {
        nfas.sort_by_key(|nfa| nfa.states.first().map(|s| s.id()));
        let mut nfa = Nfa {
            states: vec![NfaState::new(StateID::default())],
            accepting_states: BTreeMap::new(),
            alphabet: BTreeSet::new(),
        };
        for pattern_nfa in nfas {
            let PatternNfa {
                pattern,
                states,
                start_state,
                accept_state,
                alphabet,
            } = pattern_nfa;
            nfa.states[0].add_epsilon_transition(start_state);
            if nfa
                .accepting_states
                .insert(accept_state, pattern)
                .is_some()
            {
                return Err(internal!("accepting state {} is shared", accept_state));
            }
            nfa.alphabet.extend(alphabet);
            nfa.states.extend(states);
        }
        if let Some((index, state)) = nfa
            .states
            .iter()
            .enumerate()
            .find(|(index, state)| state.id().as_usize() != *index)
        {
            return Err(internal!(
                "state {} found at position {} of the merged NFA",
                state.id(),
                index
            ));
        }
        Ok(nfa)
    }
}

/// A partial NFA with exactly one accepting state.
#[derive(Debug, Clone)]
struct Fragment {
    states: Vec<StateID>,
    start: StateID,
    accept: StateID,
}

#[derive(Debug)]
enum StackItem {
    Fragment(Fragment),
    GroupMarker(char),
}

// The working state of the construction of a single pattern NFA.
struct Construction {
    // The id of the first state.
    base: usize,
    states: Vec<NfaState>,
    alphabet: BTreeSet<char>,
}

impl Construction {
    fn new(base: StateID) -> Self {
        Construction {
            base: base.as_usize(),
            states: Vec::new(),
            alphabet: BTreeSet::new(),
        }
    }

    fn evaluate(&mut self, postfix: &Postfix) -> Result<Fragment> {
        let mut stack: Vec<StackItem> = Vec::new();
        for token in postfix {
            let fragment = match token {
                PostfixToken::Char(c) => self.chars([*c]),
                PostfixToken::Any => self.chars(alphabet::wildcard()),
                PostfixToken::Range(first, last) => self.chars(*first..=*last),
                PostfixToken::OpenGroup => {
                    stack.push(StackItem::GroupMarker('('));
                    continue;
                }
                PostfixToken::OpenClass => {
                    stack.push(StackItem::GroupMarker('['));
                    continue;
                }
                PostfixToken::CloseGroup => {
                    let parts = Self::pop_group(&mut stack, '(')?;
                    self.concat_all(parts)?
                }
                PostfixToken::CloseClass => {
                    let parts = Self::pop_group(&mut stack, '[')?;
                    self.union_all(parts)?
                }
                PostfixToken::Star => {
                    let fragment = Self::pop_fragment(&mut stack, token)?;
                    self.closure(fragment)
                }
                PostfixToken::Plus => {
                    let fragment = Self::pop_fragment(&mut stack, token)?;
                    self.one_or_more(fragment)
                }
                PostfixToken::Question => {
                    let fragment = Self::pop_fragment(&mut stack, token)?;
                    self.zero_or_one(fragment)
                }
                PostfixToken::Repeat(repetition) => {
                    let fragment = Self::pop_fragment(&mut stack, token)?;
                    self.repeat(fragment, *repetition)?
                }
                PostfixToken::Alternation => {
                    let second = Self::pop_fragment(&mut stack, token)?;
                    let first = Self::pop_fragment(&mut stack, token)?;
                    self.union(first, second)
                }
            };
            stack.push(StackItem::Fragment(fragment));
        }

        // Concatenate what is left on the stack.
        let parts = stack
            .into_iter()
            .map(|item| match item {
                StackItem::Fragment(fragment) => Ok(fragment),
                StackItem::GroupMarker(marker) => Err(internal!("unclosed group '{}'", marker)),
            })
            .collect::<Result<Vec<_>>>()?;
        self.concat_all(parts)
    }

    fn pop_fragment(stack: &mut Vec<StackItem>, operator: &PostfixToken) -> Result<Fragment> {
        match stack.pop() {
            Some(StackItem::Fragment(fragment)) => Ok(fragment),
            Some(StackItem::GroupMarker(marker)) => Err(internal!(
                "operator '{}' applied to group marker '{}'",
                operator,
                marker
            )),
            None => Err(internal!("stack underflow at operator '{}'", operator)),
        }
    }

    // Pop all fragments down to the given marker. The fragments are returned in the order
    // they were pushed.
    fn pop_group(stack: &mut Vec<StackItem>, marker: char) -> Result<Vec<Fragment>> {
        let mut parts = Vec::new();
        loop {
            match stack.pop() {
                Some(StackItem::Fragment(fragment)) => parts.push(fragment),
                Some(StackItem::GroupMarker(m)) if m == marker => break,
                Some(StackItem::GroupMarker(m)) => {
                    return Err(internal!("group '{}' closed by marker '{}'", m, marker))
                }
                None => return Err(internal!("no open group '{}'", marker)),
            }
        }
        parts.reverse();
        Ok(parts)
    }

    fn new_state(&mut self) -> StateID {
        let id = StateID::new(self.base + self.states.len());
        self.states.push(NfaState::new(id));
        id
    }

    fn state(&self, id: StateID) -> &NfaState {
        &self.states[id.as_usize() - self.base]
    }

    fn state_mut(&mut self, id: StateID) -> &mut NfaState {
        &mut self.states[id.as_usize() - self.base]
    }

    fn add_epsilon_transition(&mut self, from: StateID, to: StateID) {
        self.state_mut(from).add_epsilon_transition(to);
    }

    fn has_incoming_edges(&self, fragment: &Fragment, target: StateID) -> bool {
        fragment.states.iter().any(|id| {
            let state = self.state(*id);
            state
                .epsilon_transitions()
                .iter()
                .any(|e| e.target_state() == target)
                || state
                    .transitions()
                    .iter()
                    .any(|t| t.target_state() == target)
        })
    }

    fn has_outgoing_edges(&self, id: StateID) -> bool {
        let state = self.state(id);
        !state.epsilon_transitions().is_empty() || !state.transitions().is_empty()
    }

    /// Two states connected by one edge for each of the characters.
    fn chars<I>(&mut self, chars: I) -> Fragment
    where
        I: IntoIterator<Item = char>,
    {
        let start = self.new_state();
        let accept = self.new_state();
        for ch in chars {
            self.alphabet.insert(ch);
            self.state_mut(start).add_transition(ch, accept);
        }
        Fragment {
            states: vec![start, accept],
            start,
            accept,
        }
    }

    /// The accept state of the first fragment gets an epsilon edge to the start state of the
    /// second one.
    fn concat(&mut self, mut first: Fragment, mut second: Fragment) -> Fragment {
        self.add_epsilon_transition(first.accept, second.start);
        first.states.append(&mut second.states);
        Fragment {
            states: first.states,
            start: first.start,
            accept: second.accept,
        }
    }

    fn concat_all(&mut self, parts: Vec<Fragment>) -> Result<Fragment> {
        let mut parts = parts.into_iter();
        let first = parts
            .next()
            .ok_or_else(|| internal!("nothing to concatenate"))?;
        Ok(parts.fold(first, |acc, part| self.concat(acc, part)))
    }

    fn union(&mut self, mut first: Fragment, mut second: Fragment) -> Fragment {
        let start = self.new_state();
        let accept = self.new_state();
        self.add_epsilon_transition(start, first.start);
        self.add_epsilon_transition(start, second.start);
        self.add_epsilon_transition(first.accept, accept);
        self.add_epsilon_transition(second.accept, accept);
        first.states.append(&mut second.states);
        first.states.extend([start, accept]);
        Fragment {
            states: first.states,
            start,
            accept,
        }
    }

    fn union_all(&mut self, parts: Vec<Fragment>) -> Result<Fragment> {
        let mut parts = parts.into_iter();
        let first = parts
            .next()
            .ok_or_else(|| internal!("nothing to unite"))?;
        Ok(parts.fold(first, |acc, part| self.union(acc, part)))
    }

    /// `*`
    fn closure(&mut self, mut fragment: Fragment) -> Fragment {
        let start = self.new_state();
        let accept = self.new_state();
        self.add_epsilon_transition(start, fragment.start);
        self.add_epsilon_transition(start, accept);
        self.add_epsilon_transition(fragment.accept, fragment.start);
        self.add_epsilon_transition(fragment.accept, accept);
        fragment.states.extend([start, accept]);
        Fragment {
            states: fragment.states,
            start,
            accept,
        }
    }

    /// `+`
    fn one_or_more(&mut self, fragment: Fragment) -> Fragment {
        self.add_epsilon_transition(fragment.accept, fragment.start);
        fragment
    }

    /// `?`
    fn zero_or_one(&mut self, mut fragment: Fragment) -> Fragment {
        // A bypass between start and accept would also skip the paths that return to the
        // start state or leave the accept state. Such fragments get fresh boundary states.
        if self.has_incoming_edges(&fragment, fragment.start)
            || self.has_outgoing_edges(fragment.accept)
        {
            let start = self.new_state();
            let accept = self.new_state();
            self.add_epsilon_transition(start, fragment.start);
            self.add_epsilon_transition(fragment.accept, accept);
            fragment.states.extend([start, accept]);
            fragment.start = start;
            fragment.accept = accept;
        }
        self.add_epsilon_transition(fragment.start, fragment.accept);
        fragment
    }

    /// Matches only the empty string.
    /// The states of the given fragment are dropped. They are always the most recently
    /// created ones because fragments are built in stack order.
    fn empty(&mut self, fragment: Fragment) -> Result<Fragment> {
        let first = fragment
            .states
            .iter()
            .map(|id| id.as_usize())
            .min()
            .ok_or_else(|| internal!("fragment without states"))?;
        if first < self.base || first + fragment.states.len() != self.base + self.states.len() {
            return Err(internal!(
                "the states of the fragment starting at {} are not the last ones",
                first
            ));
        }
        self.states.truncate(first - self.base);
        self.alphabet = self
            .states
            .iter()
            .flat_map(|state| state.transitions().iter().map(|t| t.ch()))
            .collect();
        let fragment = self.chars(std::iter::empty());
        self.add_epsilon_transition(fragment.start, fragment.accept);
        Ok(fragment)
    }

    /// Deep copy of a fragment with fresh state ids.
    fn clone_fragment(&mut self, fragment: &Fragment) -> Result<Fragment> {
        let map: BTreeMap<StateID, StateID> = fragment
            .states
            .iter()
            .map(|id| (*id, self.new_state()))
            .collect();
        for (old, new) in &map {
            let state = self.state(*old);
            let leaves_fragment = state
                .epsilon_transitions()
                .iter()
                .map(|e| e.target_state())
                .chain(state.transitions().iter().map(|t| t.target_state()))
                .any(|target| !map.contains_key(&target));
            if leaves_fragment {
                return Err(internal!("state {} has an edge leaving its fragment", old));
            }
            let copy = state.remapped(*new, |target| map.get(&target).copied().unwrap_or(target));
            *self.state_mut(*new) = copy;
        }
        let remap = |id: StateID| {
            map.get(&id)
                .copied()
                .ok_or_else(|| internal!("state {} is not part of its fragment", id))
        };
        Ok(Fragment {
            states: fragment.states.iter().map(|id| map[id]).collect(),
            start: remap(fragment.start)?,
            accept: remap(fragment.accept)?,
        })
    }

    fn clones(&mut self, fragment: &Fragment, count: usize) -> Result<Vec<Fragment>> {
        (0..count).map(|_| self.clone_fragment(fragment)).collect()
    }

    fn repeat(&mut self, fragment: Fragment, repetition: Repetition) -> Result<Fragment> {
        match repetition {
            Repetition::Exactly(0) | Repetition::Bounded(0, 0) => self.empty(fragment),
            Repetition::Exactly(n) => {
                let clones = self.clones(&fragment, n - 1)?;
                self.concat_all(std::iter::once(fragment).chain(clones).collect())
            }
            Repetition::AtLeast(0) => Ok(self.closure(fragment)),
            Repetition::AtLeast(1) => Ok(self.one_or_more(fragment)),
            Repetition::AtLeast(n) => {
                let parts: Vec<Fragment> = std::iter::once(fragment.clone())
                    .chain(self.clones(&fragment, n - 1)?)
                    .collect();
                let pre_final_accept = parts[n - 2].accept;
                let final_accept = parts[n - 1].accept;
                let repeated = self.concat_all(parts)?;
                self.add_epsilon_transition(final_accept, pre_final_accept);
                Ok(repeated)
            }
            Repetition::Bounded(n, m) => {
                let clones = self.clones(&fragment, m - 1)?;
                let parts = std::iter::once(fragment)
                    .chain(clones)
                    .enumerate()
                    .map(|(index, part)| {
                        if index < n {
                            part
                        } else {
                            self.zero_or_one(part)
                        }
                    })
                    .collect();
                self.concat_all(parts)
            }
        }
    }
}
