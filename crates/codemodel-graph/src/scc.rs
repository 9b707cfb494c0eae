use codemodel_core::SymbolId;
use std::collections::HashMap;

const UNVISITED: usize = usize::MAX;

/// Strongly connected components using Tarjan's algorithm.
///
/// Iterative, so call chains thousands of frames deep do not exhaust the stack.
/// Components come out in reverse topological order of the condensation.
pub fn tarjan_scc(adjacency: &[Vec<usize>]) -> Vec<Vec<usize>> {
    let n = adjacency.len();
    let mut index = vec![UNVISITED; n];
    let mut lowlink = vec![0usize; n];
    let mut on_stack = vec![false; n];
    let mut stack: Vec<usize> = Vec::new();
    let mut components = Vec::new();
    let mut next_index = 0usize;
    // (node, position of the next edge to explore)
    let mut call_stack: Vec<(usize, usize)> = Vec::new();

    for start in 0..n {
        if index[start] != UNVISITED {
            continue;
        }
        index[start] = next_index;
        lowlink[start] = next_index;
        next_index += 1;
        stack.push(start);
        on_stack[start] = true;
        call_stack.push((start, 0));

        while let Some(frame) = call_stack.last_mut() {
            let node = frame.0;
            if frame.1 < adjacency[node].len() {
                let next = adjacency[node][frame.1];
                frame.1 += 1;
                if index[next] == UNVISITED {
                    index[next] = next_index;
                    lowlink[next] = next_index;
                    next_index += 1;
                    stack.push(next);
                    on_stack[next] = true;
                    call_stack.push((next, 0));
                } else if on_stack[next] {
                    lowlink[node] = lowlink[node].min(index[next]);
                }
                continue;
            }

            call_stack.pop();
            if let Some(&(parent, _)) = call_stack.last() {
                lowlink[parent] = lowlink[parent].min(lowlink[node]);
            }
            if lowlink[node] == index[node] {
                let mut component = Vec::new();
                while let Some(member) = stack.pop() {
                    on_stack[member] = false;
                    component.push(member);
                    if member == node {
                        break;
                    }
                }
                components.push(component);
            }
        }
    }

    components
}

/// Cycles among `nodes`: components with more than one member, or a single
/// member with an edge to itself. `edges` must only return ids from `nodes`;
/// anything else is ignored.
///
/// Each cycle is sorted by id and the list is sorted by its first member.
pub fn find_cyclic_components<F>(nodes: &[SymbolId], mut edges: F) -> Vec<Vec<SymbolId>>
where
    F: FnMut(&SymbolId) -> Vec<SymbolId>,
{
    let positions: HashMap<&SymbolId, usize> =
        nodes.iter().enumerate().map(|(i, id)| (id, i)).collect();

    let mut self_loops = vec![false; nodes.len()];
    let adjacency: Vec<Vec<usize>> = nodes
        .iter()
        .enumerate()
        .map(|(i, id)| {
            edges(id)
                .iter()
                .filter_map(|target| positions.get(target).copied())
                .inspect(|&j| {
                    if j == i {
                        self_loops[i] = true;
                    }
                })
                .collect()
        })
        .collect();

    let mut cycles: Vec<Vec<SymbolId>> = tarjan_scc(&adjacency)
        .into_iter()
        .filter(|component| component.len() > 1 || self_loops[component[0]])
        .map(|component| {
            let mut ids: Vec<SymbolId> = component.into_iter().map(|i| nodes[i].clone()).collect();
            ids.sort();
            ids
        })
        .collect();
    cycles.sort();
    cycles
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tarjan_finds_components() {
        // 0 -> 1 -> 2 -> 0, 2 -> 3, 3 -> 4 -> 3
        let adjacency = vec![vec![1], vec![2], vec![0, 3], vec![4], vec![3]];
        let mut components: Vec<Vec<usize>> = tarjan_scc(&adjacency)
            .into_iter()
            .map(|mut c| {
                c.sort();
                c
            })
            .collect();
        components.sort();
        assert_eq!(components, vec![vec![0, 1, 2], vec![3, 4]]);
    }

    #[test]
    fn test_deep_chain_does_not_overflow() {
        let n = 200_000;
        let adjacency: Vec<Vec<usize>> = (0..n)
            .map(|i| if i + 1 < n { vec![i + 1] } else { vec![0] })
            .collect();
        let components = tarjan_scc(&adjacency);
        assert_eq!(components.len(), 1);
        assert_eq!(components[0].len(), n);
    }

    #[test]
    fn test_cyclic_components_include_self_loops() {
        let nodes: Vec<SymbolId> = ["a", "b", "c", "d"].into_iter().map(SymbolId::from).collect();
        let cycles = find_cyclic_components(&nodes, |id| match id.as_str() {
            "a" => vec!["b".into()],
            "b" => vec!["a".into(), "c".into()],
            "d" => vec!["d".into(), "elsewhere".into()],
            _ => vec![],
        });
        assert_eq!(
            cycles,
            vec![
                vec![SymbolId::from("a"), SymbolId::from("b")],
                vec![SymbolId::from("d")],
            ]
        );
    }
}
