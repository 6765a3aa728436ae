//! This module contains the DFA implementation.
//! The DFA is generated from the merged NFA using the subset construction algorithm and can be
//! minimized by partition refinement afterwards.
//!
//! Pattern ids are assigned in ascending priority order by the compiler, so the pattern list of
//! an accepting state, which is kept sorted by id, is also sorted by priority.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Instant;

use itertools::Itertools;
use log::trace;

use crate::{nfa::Nfa, LexGenError, LexGenErrorKind, PatternID, Result, StateID};

// The type definitions for the partition refinement.
pub(crate) type StateGroup = BTreeSet<StateID>;
pub(crate) type Partition = Vec<StateGroup>;

// A data type that is calculated from the transitions of a DFA state so that for each character
// of the alphabet the target state is mapped to the partition group it belongs to. `None`
// stands for a missing transition.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub(crate) struct TransitionsToPartitionGroups(pub(crate) Vec<Option<usize>>);

/// The DFA implementation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Dfa {
    // The states of the DFA. The start state is always the first state in the vector, i.e.
    // state 0.
    states: Vec<DfaState>,
    // The accepting states of the DFA with the patterns they accept, sorted by priority.
    accepting_states: BTreeMap<StateID, Vec<PatternID>>,
    // The characters used on the edges.
    alphabet: BTreeSet<char>,
}

impl Dfa {
    /// Get the states of the DFA.
    pub fn states(&self) -> &[DfaState] {
        &self.states
    }

    /// Get the start state.
    pub fn start_state(&self) -> StateID {
        StateID::default()
    }

    /// Get the accepting states of the DFA along with their patterns.
    pub fn accepting_states(&self) -> &BTreeMap<StateID, Vec<PatternID>> {
        &self.accepting_states
    }

    /// Get the patterns accepted in the given state, highest priority first.
    /// The slice is empty for non-accepting states.
    pub fn patterns_of(&self, state_id: StateID) -> &[PatternID] {
        self.accepting_states
            .get(&state_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Returns true if the given state is an accepting state.
    pub fn is_accepting(&self, state_id: StateID) -> bool {
        self.accepting_states.contains_key(&state_id)
    }

    /// Get the alphabet of the DFA.
    pub fn alphabet(&self) -> &BTreeSet<char> {
        &self.alphabet
    }

    /// Get the target of the transition on `ch`, if there is one.
    #[inline]
    pub fn next_state(&self, state_id: StateID, ch: char) -> Option<StateID> {
        self.states
            .get(state_id.as_usize())
            .and_then(|state| state.transitions.get(&ch).copied())
    }

    /// Returns true if the DFA ends in an accepting state after consuming the whole input.
    pub fn accepts(&self, input: &str) -> bool {
        if self.states.is_empty() {
            return false;
        }
        input
            .chars()
            .try_fold(self.start_state(), |state, ch| self.next_state(state, ch))
            .is_some_and(|state| self.is_accepting(state))
    }

    /// Create a DFA from the merged NFA.
    /// The DFA is created using the subset construction algorithm.
    fn try_from_nfa(nfa: &Nfa) -> Result<Self> {
        let now = Instant::now();
        if nfa.states().is_empty() {
            return Err(LexGenError::new(LexGenErrorKind::InternalBuildError(
                "the NFA has no states".to_string(),
            )));
        }
        let mut dfa = Dfa {
            states: Vec::new(),
            accepting_states: BTreeMap::new(),
            alphabet: nfa.alphabet().clone(),
        };
        // The NFA states that constitute each DFA state. This mapping is only needed during
        // the construction.
        let mut subsets = Subsets::default();

        // The initial state of the DFA is the epsilon closure of the start state of the NFA.
        let start_state = nfa.epsilon_closure(nfa.start_state());
        let (initial_state, _) =
            dfa.add_state_if_new(start_state, &mut subsets, nfa.accepting_states());
        // The work list holds the states whose transitions have not been calculated yet.
        let mut work_list = vec![initial_state];

        while let Some(state_id) = work_list.pop() {
            let nfa_states = subsets.nfa_states[state_id].clone();
            for ch in nfa.alphabet() {
                let target_states = nfa.epsilon_closure_set(nfa.move_set(&nfa_states, *ch));
                if target_states.is_empty() {
                    // Dead end for this character
                    continue;
                }
                let (target_state, is_new) =
                    dfa.add_state_if_new(target_states, &mut subsets, nfa.accepting_states());
                dfa.states[state_id].transitions.insert(*ch, target_state);
                if is_new {
                    work_list.push(target_state);
                }
            }
        }

        trace!(
            "Subset construction: {} NFA states -> {} DFA states ({} accepting) in {} milliseconds.",
            nfa.states().len(),
            dfa.states.len(),
            dfa.accepting_states.len(),
            now.elapsed().as_millis()
        );
        Ok(dfa)
    }

    /// Add a state to the DFA if it does not already exist.
    /// The state is identified by the sorted NFA states that constitute the DFA state.
    /// Returns the id of the state and whether it was newly created.
    fn add_state_if_new(
        &mut self,
        nfa_states: Vec<StateID>,
        subsets: &mut Subsets,
        accepting_states: &BTreeMap<StateID, PatternID>,
    ) -> (StateID, bool) {
        if let Some(state_id) = subsets.ids.get(&nfa_states) {
            return (*state_id, false);
        }

        let state_id = StateID::new(self.states.len());
        // The state accepts all patterns of the accepting NFA states it contains.
        let patterns: BTreeSet<PatternID> = nfa_states
            .iter()
            .filter_map(|nfa_state_id| accepting_states.get(nfa_state_id).copied())
            .collect();
        if !patterns.is_empty() {
            self.accepting_states
                .insert(state_id, patterns.into_iter().collect());
        }

        self.states.push(DfaState::new(state_id));
        subsets.ids.insert(nfa_states.clone(), state_id);
        subsets.nfa_states.push(nfa_states);
        (state_id, true)
    }

    /// Trace out a partition of the DFA.
    fn trace_partition(context: &str, partition: &[StateGroup]) {
        trace!("Partition {}:", context);
        for (i, group) in partition.iter().enumerate() {
            trace!("Group {}: {:?}", i, group);
        }
    }

    /// Minimize the DFA.
    ///
    /// States that can't be distinguished by their transitions are merged. A merged accepting
    /// state accepts the union of the patterns of its original states.
    /// The groups of the final partition are ordered by their smallest state, so the start
    /// state stays state 0 and minimizing a minimal DFA reproduces it exactly.
    pub fn minimize(&self) -> Result<Self> {
        let now = Instant::now();
        let mut partition = self.calculate_initial_partition();
        Self::trace_partition("initial", &partition);

        loop {
            let new_partition = self.calculate_new_partition(&partition);
            // Each round can only split groups, so an unchanged group count means a fixpoint.
            let changed = new_partition.len() != partition.len();
            partition = new_partition;
            if !changed {
                break;
            }
        }
        Self::trace_partition("final", &partition);

        let dfa = self.create_from_partition(&partition)?;
        trace!(
            "Minimized DFA from {} to {} states in {} milliseconds.",
            self.states.len(),
            dfa.states.len(),
            now.elapsed().as_millis()
        );
        Ok(dfa)
    }

    /// The initial partition consists of the group of accepting states and the group of
    /// non-accepting states. Empty groups are omitted.
    fn calculate_initial_partition(&self) -> Partition {
        let (accepting, non_accepting): (StateGroup, StateGroup) = self
            .states
            .iter()
            .map(|state| state.id)
            .partition(|state_id| self.is_accepting(*state_id));
        let mut partition: Partition = [accepting, non_accepting]
            .into_iter()
            .filter(|group| !group.is_empty())
            .collect();
        Self::sort_partition(&mut partition);
        partition
    }

    /// Calculate the new partition based on the old partition.
    /// Each group is split into the subgroups of states whose transitions lead to the same
    /// groups of the old partition for every character of the alphabet.
    fn calculate_new_partition(&self, partition: &[StateGroup]) -> Partition {
        let group_of = Self::group_indices(self.states.len(), partition);
        let mut new_partition: Partition = partition
            .iter()
            .flat_map(|group| self.split_group(group, &group_of))
            .collect();
        Self::sort_partition(&mut new_partition);
        new_partition
    }

    fn split_group(&self, group: &StateGroup, group_of: &[usize]) -> Partition {
        // If the group contains only one state, the group can't be split further.
        if group.len() == 1 {
            return vec![group.clone()];
        }
        let mut transition_map_to_states: BTreeMap<TransitionsToPartitionGroups, StateGroup> =
            BTreeMap::new();
        for state_id in group {
            transition_map_to_states
                .entry(self.build_transitions_to_partition_group(*state_id, group_of))
                .or_default()
                .insert(*state_id);
        }
        transition_map_to_states.into_values().collect()
    }

    /// Build a modified transition data structure of a given DFA state that maps each
    /// character of the alphabet to the partition group of the target state.
    fn build_transitions_to_partition_group(
        &self,
        state_id: StateID,
        group_of: &[usize],
    ) -> TransitionsToPartitionGroups {
        TransitionsToPartitionGroups(
            self.alphabet
                .iter()
                .map(|ch| {
                    self.next_state(state_id, *ch)
                        .map(|target| group_of[target])
                })
                .collect(),
        )
    }

    // Maps each state to the index of its group.
    fn group_indices(state_count: usize, partition: &[StateGroup]) -> Vec<usize> {
        let mut group_of = vec![0; state_count];
        for (index, group) in partition.iter().enumerate() {
            for state_id in group {
                group_of[*state_id] = index;
            }
        }
        group_of
    }

    // Canonical order of the groups: by their smallest state.
    fn sort_partition(partition: &mut Partition) {
        partition.sort_by_key(|group| group.first().copied());
    }

    /// Create a DFA from a partition.
    /// Each group becomes one state whose id is the index of the group. Its transitions are
    /// those of the first state of the group, renumbered to groups.
    fn create_from_partition(&self, partition: &[StateGroup]) -> Result<Dfa> {
        let group_of = Self::group_indices(self.states.len(), partition);
        let mut dfa = Dfa {
            states: Vec::with_capacity(partition.len()),
            accepting_states: BTreeMap::new(),
            alphabet: self.alphabet.clone(),
        };

        for (index, group) in partition.iter().enumerate() {
            let state_id = StateID::new(index);
            let representative = group.first().ok_or_else(|| {
                LexGenError::new(LexGenErrorKind::InternalBuildError(format!(
                    "group {} of the partition is empty",
                    index
                )))
            })?;
            let mut state = DfaState::new(state_id);
            state.transitions = self.states[*representative]
                .transitions
                .iter()
                .map(|(ch, target)| (*ch, StateID::new(group_of[*target])))
                .collect();
            dfa.states.push(state);

            let patterns: BTreeSet<PatternID> = group
                .iter()
                .flat_map(|state_in_group| self.patterns_of(*state_in_group))
                .copied()
                .collect();
            if !patterns.is_empty() {
                dfa.accepting_states
                    .insert(state_id, patterns.into_iter().collect());
            }
        }

        Ok(dfa)
    }
}

// The NFA states of the DFA states during the subset construction.
#[derive(Debug, Default)]
struct Subsets {
    nfa_states: Vec<Vec<StateID>>,
    ids: BTreeMap<Vec<StateID>, StateID>,
}

impl TryFrom<&Nfa> for Dfa {
    type Error = LexGenError;

    fn try_from(nfa: &Nfa) -> Result<Self> {
        Dfa::try_from_nfa(nfa)
    }
}

impl TryFrom<Nfa> for Dfa {
    type Error = LexGenError;

    fn try_from(nfa: Nfa) -> Result<Self> {
        Dfa::try_from_nfa(&nfa)
    }
}

impl std::fmt::Display for Dfa {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "DFA")?;
        writeln!(f, "Alphabet: {}", self.alphabet.iter().collect::<String>().escape_default())?;
        writeln!(f, "Accepting states:")?;
        for (state_id, pattern_ids) in &self.accepting_states {
            writeln!(f, "{}: {}", state_id, pattern_ids.iter().join(", "))?;
        }
        writeln!(f, "Transitions:")?;
        for state in &self.states {
            write!(f, "{} -> ", state.id)?;
            for (ch, target_id) in &state.transitions {
                write!(f, "{}:{} ", ch.escape_default(), target_id)?;
            }
            writeln!(f)?
        }
        Ok(())
    }
}

/// A state of the DFA with its outgoing transitions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DfaState {
    id: StateID,
    transitions: BTreeMap<char, StateID>,
}

impl DfaState {
    fn new(id: StateID) -> Self {
        DfaState {
            id,
            transitions: BTreeMap::new(),
        }
    }

    /// Get the id of the DFA state.
    pub fn id(&self) -> StateID {
        self.id
    }

    /// Get the transitions, at most one per character.
    pub fn transitions(&self) -> &BTreeMap<char, StateID> {
        &self.transitions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{normalizer::normalize, thompson::ThompsonBuilder};

    // A data type that provides test data for the DFA minimization tests.
    struct TestData {
        name: &'static str,
        patterns: &'static [&'static str],
        states: usize,
        accepting_states: usize,
        min_states: usize,
        min_accepting_states: usize,
    }

    // Test data for the DFA minimization tests.
    const TEST_DATA: &[TestData] = &[
        TestData {
            name: "dragon",
            patterns: &["(a|b)*abb"],
            states: 5,
            accepting_states: 1,
            min_states: 4,
            min_accepting_states: 1,
        },
        TestData {
            name: "in_int",
            patterns: &["in", "int"],
            states: 4,
            accepting_states: 2,
            min_states: 4,
            min_accepting_states: 2,
        },
        TestData {
            name: "bounds",
            patterns: &["a{1,2}b{2,}c{3}"],
            states: 8,
            accepting_states: 1,
            min_states: 8,
            min_accepting_states: 1,
        },
        TestData {
            name: "keyword_identifier",
            patterns: &["if", "[a-z]+"],
            states: 4,
            accepting_states: 3,
            min_states: 2,
            min_accepting_states: 1,
        },
    ];

    // Initialize the logger for the tests
    fn init() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn nfa_of(patterns: &[&str]) -> Nfa {
        let mut builder = ThompsonBuilder::new();
        let nfas = patterns
            .iter()
            .enumerate()
            .map(|(index, regex)| {
                builder.build(&normalize(regex).unwrap(), PatternID::new(index))
            })
            .collect::<Result<Vec<_>>>()
            .unwrap();
        builder.merge(nfas).unwrap()
    }

    // All strings over the characters up to the given length, including the empty one.
    fn strings(chars: &str, max_len: usize) -> Vec<String> {
        let mut result = vec![String::new()];
        let mut last = vec![String::new()];
        for _ in 0..max_len {
            last = last
                .iter()
                .flat_map(|prefix| chars.chars().map(move |c| format!("{}{}", prefix, c)))
                .collect();
            result.extend(last.iter().cloned());
        }
        result
    }

    #[test]
    fn test_dfa_from_nfa() {
        init();
        let nfa = nfa_of(&["b|a{2,3}", "(a|b)*abb"]);
        nfa_render_to!(&nfa, "input_nfa");

        let dfa = Dfa::try_from(&nfa).unwrap();
        dfa_render_to!(&dfa, "dfa_from_nfa");

        assert_eq!(dfa.start_state(), StateID::new(0));
        assert_eq!(dfa.alphabet(), &BTreeSet::from(['a', 'b']));
        assert!(dfa.accepts("abb"));
        assert!(dfa.accepts("aaa"));
        assert!(!dfa.accepts("ab"));
        let end_of = |input: &str| {
            input
                .chars()
                .try_fold(dfa.start_state(), |state, ch| dfa.next_state(state, ch))
                .unwrap()
        };
        assert_eq!(dfa.patterns_of(end_of("abb")), &[PatternID::new(1)]);
        assert_eq!(dfa.patterns_of(end_of("aa")), &[PatternID::new(0)]);
        assert!(dfa.patterns_of(end_of("ab")).is_empty());
    }

    #[test]
    fn test_dfa_minimize() {
        init();

        // Iterate over the test data and run the tests.
        for data in TEST_DATA {
            let nfa = nfa_of(data.patterns);
            nfa_render_to!(&nfa, &format!("{}_nfa", data.name));

            let dfa = Dfa::try_from(nfa).unwrap();
            dfa_render_to!(&dfa, &format!("{}_dfa", data.name));

            assert_eq!(dfa.states().len(), data.states, "states of {}", data.name);
            assert_eq!(
                dfa.accepting_states().len(),
                data.accepting_states,
                "accepting_states of {}",
                data.name
            );

            let minimized_dfa = dfa.minimize().unwrap();
            dfa_render_to!(&minimized_dfa, &format!("{}_min_dfa", data.name));

            assert_eq!(
                minimized_dfa.states().len(),
                data.min_states,
                "min_states of {}",
                data.name
            );
            assert_eq!(
                minimized_dfa.accepting_states().len(),
                data.min_accepting_states,
                "min_accepting_states of {}",
                data.name
            );
            assert_eq!(minimized_dfa.alphabet(), dfa.alphabet());
        }
    }

    #[test]
    fn test_merged_states_accept_the_union_of_patterns() {
        init();
        let dfa = Dfa::try_from(nfa_of(&["if", "[a-z]+"]))
            .unwrap()
            .minimize()
            .unwrap();
        let accepting: Vec<&Vec<PatternID>> = dfa.accepting_states().values().collect();
        assert_eq!(accepting, vec![&vec![PatternID::new(0), PatternID::new(1)]]);
    }

    #[test]
    fn test_transitions_are_deterministic_and_closed() {
        let dfa = Dfa::try_from(nfa_of(&["[a-c]+", "ca?b{0,2}", "(ab|ba)+"])).unwrap();
        for state in dfa.states() {
            for (ch, target) in state.transitions() {
                assert!(dfa.alphabet().contains(ch));
                assert!(target.as_usize() < dfa.states().len());
            }
            for ch in dfa.alphabet() {
                assert_eq!(
                    dfa.next_state(state.id(), *ch),
                    state.transitions().get(ch).copied()
                );
            }
        }
        for state_id in dfa.accepting_states().keys() {
            assert!(!dfa.patterns_of(*state_id).is_empty());
        }
    }

    #[test]
    fn test_minimization_preserves_the_language() {
        init();
        let cases: &[(&[&str], &str, usize)] = &[
            (&["(a|b)*abb"], "ab", 10),
            (&["a{3,5}", "b{2,}a?"], "ab", 8),
            (&["(ab|ba)+", "a?b*"], "ab", 8),
            (&["[a-c]+", "ca?b{0,2}"], "abc", 6),
            (&["in", "int", "[a-z]+"], "int", 6),
        ];
        for (patterns, chars, max_len) in cases {
            let oracles: Vec<regex::Regex> = patterns
                .iter()
                .map(|p| regex::Regex::new(&format!("^(?:{})$", p)).unwrap())
                .collect();
            let dfa = Dfa::try_from(nfa_of(patterns)).unwrap();
            let minimized_dfa = dfa.minimize().unwrap();
            for input in strings(chars, *max_len) {
                let expected = oracles.iter().any(|r| r.is_match(&input));
                assert_eq!(dfa.accepts(&input), expected, "{:?} on {:?}", patterns, input);
                assert_eq!(
                    minimized_dfa.accepts(&input),
                    expected,
                    "minimized {:?} on {:?}",
                    patterns,
                    input
                );
            }
        }
    }

    #[test]
    fn test_minimize_is_idempotent() {
        for data in TEST_DATA {
            let minimized_dfa = Dfa::try_from(nfa_of(data.patterns))
                .unwrap()
                .minimize()
                .unwrap();
            assert_eq!(
                minimized_dfa.minimize().unwrap(),
                minimized_dfa,
                "{}",
                data.name
            );
        }
    }

    #[test]
    fn test_empty_nfa_is_rejected() {
        let error = Dfa::try_from(Nfa::default()).unwrap_err();
        assert!(matches!(
            error.kind(),
            LexGenErrorKind::InternalBuildError(_)
        ));
    }
}
