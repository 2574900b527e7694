//! Evidence Linker - entity-based evidence grouping
//!
//! Groups retrieved evidence units (paragraphs and equations) that share at
//! least one entity, transitively: if A and B share variable X and B and C
//! share concept Y, then A, B, C form one group. Purely deterministic; no
//! model call.
//!
//! "Shared" entities of a group are those occurring in at least TWO of its
//! members - deliberately looser than a strict all-members intersection (a
//! 3-member group where a concept appears in only 2 of 3 still reports it).

use crate::state::EvidenceGroup;
use std::collections::HashMap;
use veridoc_common::document::{Entities, Equation, Paragraph};
use veridoc_common::entities::EntityExtractor;

/// Union-find over evidence indices, with path compression.
struct UnionFind {
    parent: Vec<usize>,
}

impl UnionFind {
    fn new(size: usize) -> Self {
        Self {
            parent: (0..size).collect(),
        }
    }

    fn find(&mut self, x: usize) -> usize {
        if self.parent[x] != x {
            let root = self.find(self.parent[x]);
            self.parent[x] = root;
        }
        self.parent[x]
    }

    fn union(&mut self, a: usize, b: usize) {
        let ra = self.find(a);
        let rb = self.find(b);
        if ra != rb {
            self.parent[rb] = ra;
        }
    }
}

/// One evidence unit prepared for linking.
struct EvidenceUnit {
    id: String,
    entities: Entities,
}

/// Link evidence into connected components over the shares-an-entity
/// relation. Singleton components are discarded: there is no link without
/// at least two members.
pub fn link(
    paragraphs: &[Paragraph],
    equations: &[Equation],
    extractor: &dyn EntityExtractor,
) -> Vec<EvidenceGroup> {
    // Gather entities per unit: paragraphs use their pre-computed entities
    // when present; equations are always extracted from their verbatim text.
    let units: Vec<EvidenceUnit> = paragraphs
        .iter()
        .map(|p| EvidenceUnit {
            id: p.paragraph_id.clone(),
            entities: p
                .entities
                .clone()
                .unwrap_or_else(|| extractor.extract(&p.text)),
        })
        .chain(equations.iter().map(|e| EvidenceUnit {
            id: e.equation_id.clone(),
            entities: extractor.extract(&e.equation_text),
        }))
        .collect();

    if units.len() < 2 {
        return Vec::new();
    }

    // Entity key -> unit indices. Variables are keyed case-insensitively
    // (identity preserves the first-seen casing); concepts are already
    // lowercased by the extractor. Keys are namespaced so a variable can
    // never collide with a concept of the same spelling.
    let mut entity_members: HashMap<String, Vec<usize>> = HashMap::new();
    let mut variable_display: HashMap<String, String> = HashMap::new();

    for (i, unit) in units.iter().enumerate() {
        for var in &unit.entities.variables {
            let key = format!("v:{}", var.to_lowercase());
            variable_display
                .entry(key.clone())
                .or_insert_with(|| var.clone());
            entity_members.entry(key).or_default().push(i);
        }
        for concept in &unit.entities.concepts {
            entity_members
                .entry(format!("c:{}", concept))
                .or_default()
                .push(i);
        }
    }

    // Union all units that co-occur under the same entity
    let mut uf = UnionFind::new(units.len());
    for members in entity_members.values() {
        for window in members.windows(2) {
            uf.union(window[0], window[1]);
        }
    }

    // Collect components of size >= 2
    let mut components: HashMap<usize, Vec<usize>> = HashMap::new();
    for i in 0..units.len() {
        let root = uf.find(i);
        components.entry(root).or_default().push(i);
    }

    let mut groups: Vec<EvidenceGroup> = Vec::new();

    for members in components.into_values() {
        if members.len() < 2 {
            continue;
        }

        // Shared entities: present in at least two members of this group
        let mut shared_variables = Vec::new();
        let mut shared_concepts = Vec::new();

        for (key, occurrence) in &entity_members {
            let count = occurrence
                .iter()
                .copied()
                .filter(|idx| members.contains(idx))
                .collect::<std::collections::HashSet<usize>>()
                .len();
            if count < 2 {
                continue;
            }
            if let Some(display) = variable_display.get(key) {
                shared_variables.push(display.clone());
            } else if let Some(concept) = key.strip_prefix("c:") {
                shared_concepts.push(concept.to_string());
            }
        }

        shared_variables.sort();
        shared_concepts.sort();

        let mut source_ids: Vec<String> =
            members.iter().map(|&i| units[i].id.clone()).collect();
        source_ids.sort();

        groups.push(EvidenceGroup {
            source_ids,
            shared_variables,
            shared_concepts,
        });
    }

    // Deterministic group order
    groups.sort_by(|a, b| a.source_ids.cmp(&b.source_ids));

    tracing::debug!(
        units = units.len(),
        groups = groups.len(),
        "Evidence linking complete"
    );

    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use veridoc_common::entities::HeuristicEntityExtractor;

    fn para_with_entities(id: &str, text: &str, variables: &[&str], concepts: &[&str]) -> Paragraph {
        let mut p = Paragraph::new(id, text);
        p.entities = Some(Entities {
            variables: variables.iter().map(|s| s.to_string()).collect(),
            concepts: concepts.iter().map(|s| s.to_string()).collect(),
        });
        p
    }

    fn eq(id: &str, text: &str, origin: &str) -> Equation {
        Equation {
            equation_id: id.into(),
            equation_text: text.into(),
            associated_paragraph_id: origin.into(),
        }
    }

    fn extractor() -> HeuristicEntityExtractor {
        HeuristicEntityExtractor::new()
    }

    #[test]
    fn test_empty_input_no_groups() {
        assert!(link(&[], &[], &extractor()).is_empty());
    }

    #[test]
    fn test_single_unit_no_groups() {
        let p = para_with_entities("s1_p1", "text", &["Q"], &["attention"]);
        assert!(link(&[p], &[], &extractor()).is_empty());
    }

    #[test]
    fn test_links_paragraph_to_equation_via_variables() {
        let p = para_with_entities(
            "s1_p1",
            "An attention function maps a query Q and key-value pairs K, V.",
            &["Q", "K", "V"],
            &["attention", "query"],
        );
        let e = eq("eq1", "Attention(Q, K, V) = softmax(QK^T / sqrt(d_k))V", "s1_p1");

        let groups = link(&[p], &[e], &extractor());

        assert_eq!(groups.len(), 1);
        let group = &groups[0];
        assert_eq!(group.source_ids, vec!["eq1", "s1_p1"]);
        // Sorted shared variables from the Q/K/V overlap; d_k appears only
        // in the equation, so it is not shared
        assert_eq!(group.shared_variables, vec!["K", "Q", "V"]);
    }

    #[test]
    fn test_links_via_shared_concept() {
        let p1 = para_with_entities("s1_p1", "text", &[], &["attention"]);
        let p2 = para_with_entities("s1_p2", "text", &[], &["attention", "softmax"]);

        let groups = link(&[p1, p2], &[], &extractor());

        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].source_ids, vec!["s1_p1", "s1_p2"]);
        assert_eq!(groups[0].shared_concepts, vec!["attention"]);
        // softmax occurs in only one member: not shared
        assert!(!groups[0].shared_concepts.contains(&"softmax".to_string()));
    }

    #[test]
    fn test_no_links_without_shared_entities() {
        let p1 = para_with_entities("s1_p1", "topic A", &["X"], &["encoder"]);
        let p2 = para_with_entities("s2_p1", "topic B", &["Y"], &["bleu"]);

        assert!(link(&[p1, p2], &[], &extractor()).is_empty());
    }

    #[test]
    fn test_transitive_linking_forms_one_group() {
        // A-B share X; B-C share "softmax"; no direct A-C overlap
        let a = para_with_entities("a", "text", &["X"], &[]);
        let b = para_with_entities("b", "text", &["X"], &["softmax"]);
        let c = para_with_entities("c", "text", &[], &["softmax"]);

        let groups = link(&[a, b, c], &[], &extractor());

        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].source_ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_shared_is_count_based_not_intersection() {
        // "attention" appears in 2 of 3 members: still reported as shared
        let a = para_with_entities("a", "text", &["X"], &["attention"]);
        let b = para_with_entities("b", "text", &["X"], &["attention"]);
        let c = para_with_entities("c", "text", &["X"], &[]);

        let groups = link(&[a, b, c], &[], &extractor());

        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].shared_concepts, vec!["attention"]);
        assert_eq!(groups[0].shared_variables, vec!["X"]);
    }

    #[test]
    fn test_independent_groups_stay_separate() {
        let a1 = para_with_entities("s1_p1", "text", &[], &["attention"]);
        let a2 = para_with_entities("s1_p2", "text", &[], &["attention"]);
        let b1 = para_with_entities("s2_p1", "text", &[], &["bleu"]);
        let b2 = para_with_entities("s2_p2", "text", &[], &["bleu"]);

        let groups = link(&[a1, a2, b1, b2], &[], &extractor());

        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].source_ids, vec!["s1_p1", "s1_p2"]);
        assert_eq!(groups[1].source_ids, vec!["s2_p1", "s2_p2"]);
    }

    #[test]
    fn test_entities_extracted_on_the_fly_when_missing() {
        // No pre-computed entities; the extractor runs on the text
        let p1 = Paragraph::new("p1", "The attention function uses Q and K matrices.");
        let p2 = Paragraph::new("p2", "We compute Q times K transpose for attention.");

        let groups = link(&[p1, p2], &[], &extractor());

        assert_eq!(groups.len(), 1);
        assert!(groups[0].shared_variables.contains(&"Q".to_string()));
        assert!(groups[0].shared_variables.contains(&"K".to_string()));
    }

    #[test]
    fn test_equation_entities_from_verbatim_text() {
        let p = Paragraph::new("p1", "The query Q and key K are used in attention.");
        let e = eq("eq1", "Attention(Q, K, V) = softmax(QK^T / sqrt(d_k))V", "p1");

        let groups = link(&[p], &[e], &extractor());

        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].source_ids, vec!["eq1", "p1"]);
    }

    #[test]
    fn test_output_is_deterministic() {
        let a = para_with_entities("a", "text", &["Q"], &["attention"]);
        let b = para_with_entities("b", "text", &["Q"], &["attention"]);
        let c = para_with_entities("c", "text", &[], &["bleu"]);
        let d = para_with_entities("d", "text", &[], &["bleu"]);

        let first = link(&[a.clone(), b.clone(), c.clone(), d.clone()], &[], &extractor());
        let second = link(&[a, b, c, d], &[], &extractor());
        assert_eq!(first, second);
    }
}
