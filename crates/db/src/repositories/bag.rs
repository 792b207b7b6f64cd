use std::collections::HashMap;

/// Reorders `fetched` to follow `input_ids`.
///
/// The sort is stable and keyed by each entity's position in the input;
/// entities whose id is unknown (or unset) go last in fetched order.
pub(crate) fn restore_input_order<T>(
    input_ids: &[i64],
    mut fetched: Vec<T>,
    id_of: impl Fn(&T) -> Option<i64>,
) -> Vec<T> {
    let positions: HashMap<i64, usize> = input_ids
        .iter()
        .enumerate()
        .map(|(position, id)| (*id, position))
        .collect();
    fetched.sort_by_key(|entity| {
        id_of(entity)
            .and_then(|id| positions.get(&id).copied())
            .unwrap_or(usize::MAX)
    });
    fetched
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn follows_input_positions() {
        let fetched = vec![(1, "a"), (2, "b"), (3, "c")];
        let ordered = restore_input_order(&[3, 1, 2], fetched, |e| Some(e.0));
        assert_eq!(ordered, vec![(3, "c"), (1, "a"), (2, "b")]);
    }

    #[test]
    fn unknown_ids_go_last() {
        let fetched = vec![(9, "x"), (2, "b"), (1, "a")];
        let ordered = restore_input_order(&[1, 2], fetched, |e| Some(e.0));
        assert_eq!(ordered, vec![(1, "a"), (2, "b"), (9, "x")]);
    }

    #[test]
    fn empty_input() {
        let ordered: Vec<(i64, &str)> = restore_input_order(&[], vec![], |e| Some(e.0));
        assert!(ordered.is_empty());
    }
}
