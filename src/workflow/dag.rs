//! Dependency graph ordering for processing steps.

use std::collections::{HashMap, HashSet};

use super::types::StepDecl;

/// Compute execution waves: each wave holds the names of steps whose
/// dependencies are all satisfied by earlier waves. Steps within a wave
/// are independent of each other and keep declaration order.
///
/// Assumes the steps already passed validation; unknown dependencies are
/// ignored here rather than re-diagnosed.
pub fn execution_waves(steps: &[StepDecl]) -> Vec<Vec<String>> {
    let known: HashSet<&str> = steps.iter().map(|s| s.name.as_str()).collect();
    let mut remaining: Vec<&StepDecl> = steps.iter().collect();
    let mut done: HashSet<&str> = HashSet::new();
    let mut waves = Vec::new();

    while !remaining.is_empty() {
        let (ready, blocked): (Vec<&StepDecl>, Vec<&StepDecl>) =
            remaining.iter().partition(|s| {
                s.dependencies
                    .iter()
                    .all(|d| done.contains(d.as_str()) || !known.contains(d.as_str()))
            });

        if ready.is_empty() {
            // Cyclic remainder; validation should have caught this. Fall
            // back to declaration order so the engine still terminates.
            waves.extend(blocked.iter().map(|s| vec![s.name.clone()]));
            break;
        }

        for step in &ready {
            done.insert(step.name.as_str());
        }
        waves.push(ready.iter().map(|s| s.name.clone()).collect());
        remaining = blocked;
    }

    waves
}

/// Find a dependency cycle among the steps, if any, returned as the chain
/// of step names (first == last).
pub fn find_cycle(steps: &[StepDecl]) -> Option<Vec<String>> {
    let edges: HashMap<&str, &[String]> = steps
        .iter()
        .map(|s| (s.name.as_str(), s.dependencies.as_slice()))
        .collect();

    let mut visited: HashSet<&str> = HashSet::new();
    for step in steps {
        let mut stack = Vec::new();
        let mut on_stack = HashSet::new();
        if let Some(cycle) = visit(step.name.as_str(), &edges, &mut visited, &mut stack, &mut on_stack)
        {
            return Some(cycle);
        }
    }
    None
}

fn visit<'a>(
    node: &'a str,
    edges: &HashMap<&'a str, &'a [String]>,
    visited: &mut HashSet<&'a str>,
    stack: &mut Vec<&'a str>,
    on_stack: &mut HashSet<&'a str>,
) -> Option<Vec<String>> {
    if on_stack.contains(node) {
        let start = stack.iter().position(|n| *n == node).unwrap_or(0);
        let mut cycle: Vec<String> = stack[start..].iter().map(|n| n.to_string()).collect();
        cycle.push(node.to_string());
        return Some(cycle);
    }
    if visited.contains(node) {
        return None;
    }
    visited.insert(node);
    stack.push(node);
    on_stack.insert(node);

    if let Some(deps) = edges.get(node) {
        for dep in deps.iter() {
            if edges.contains_key(dep.as_str()) {
                if let Some(cycle) = visit(dep.as_str(), edges, visited, stack, on_stack) {
                    return Some(cycle);
                }
            }
        }
    }

    stack.pop();
    on_stack.remove(node);
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(name: &str, deps: &[&str]) -> StepDecl {
        StepDecl {
            name: name.to_string(),
            dependencies: deps.iter().map(|d| d.to_string()).collect(),
            prompt_template: String::new(),
            timeout: None,
        }
    }

    #[test]
    fn test_independent_steps_share_a_wave() {
        let waves = execution_waves(&[step("a", &[]), step("b", &[]), step("c", &["a", "b"])]);
        assert_eq!(waves, vec![vec!["a".to_string(), "b".to_string()], vec!["c".to_string()]]);
    }

    #[test]
    fn test_chain_is_one_step_per_wave() {
        let waves = execution_waves(&[step("a", &[]), step("b", &["a"]), step("c", &["b"])]);
        assert_eq!(waves.len(), 3);
        assert_eq!(waves[1], vec!["b".to_string()]);
    }

    #[test]
    fn test_waves_preserve_declaration_order() {
        let waves = execution_waves(&[step("z", &[]), step("m", &[]), step("a", &[])]);
        assert_eq!(waves, vec![vec!["z".to_string(), "m".to_string(), "a".to_string()]]);
    }

    #[test]
    fn test_diamond() {
        let waves = execution_waves(&[
            step("root", &[]),
            step("left", &["root"]),
            step("right", &["root"]),
            step("join", &["left", "right"]),
        ]);
        assert_eq!(waves.len(), 3);
        assert_eq!(waves[1], vec!["left".to_string(), "right".to_string()]);
    }

    #[test]
    fn test_find_cycle_reports_chain() {
        let cycle = find_cycle(&[step("a", &["b"]), step("b", &["c"]), step("c", &["a"])]);
        let cycle = cycle.expect("cycle expected");
        assert_eq!(cycle.first(), cycle.last());
        assert!(cycle.len() >= 2);
    }

    #[test]
    fn test_no_cycle_in_dag() {
        assert!(find_cycle(&[step("a", &[]), step("b", &["a"])]).is_none());
    }
}
