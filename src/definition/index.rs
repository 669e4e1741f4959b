use std::collections::{HashMap, HashSet, VecDeque};

use crate::definition::types::{DefinitionId, Level, Node};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{level} dependency cycle: {}", .path.join(" -> "))]
pub struct DependencyCycle {
    pub level: Level,
    /// 环上的节点名称，首尾相同
    pub path: Vec<String>,
}

/// 一组兄弟节点的依赖索引：根节点列表 + 依赖 id → 有序的直接依赖者
///
/// 每次取出一层兄弟节点时构建一次，构建时检测依赖环。
/// 依赖指向兄弟集合之外的节点永远不会被调度。
#[derive(Debug, Clone)]
pub struct DependencyIndex<T> {
    roots: Vec<T>,
    dependents: HashMap<DefinitionId, Vec<T>>,
}

impl<T: Node + Clone> DependencyIndex<T> {
    pub fn build(nodes: Vec<T>) -> Result<Self, DependencyCycle> {
        detect_cycle(&nodes)?;

        let mut roots = Vec::new();
        let mut dependents: HashMap<DefinitionId, Vec<T>> = HashMap::new();
        for node in nodes {
            match node.depends_on() {
                None => roots.push(node),
                Some(dependency) => dependents.entry(dependency).or_default().push(node),
            }
        }

        Ok(Self { roots, dependents })
    }

    pub fn roots(&self) -> &[T] {
        &self.roots
    }

    pub fn dependents_of(&self, id: DefinitionId) -> &[T] {
        self.dependents.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// 以根节点为初始内容的工作队列
    pub fn worklist(&self) -> Worklist<T> {
        Worklist::new(self.roots.iter().cloned())
    }
}

fn detect_cycle<T: Node>(nodes: &[T]) -> Result<(), DependencyCycle> {
    let by_id: HashMap<DefinitionId, &T> = nodes.iter().map(|n| (n.id(), n)).collect();
    let mut acyclic: HashSet<DefinitionId> = HashSet::new();

    for start in nodes {
        let mut path: Vec<DefinitionId> = Vec::new();
        let mut current = Some(start.id());

        while let Some(id) = current {
            if acyclic.contains(&id) {
                break;
            }
            if let Some(pos) = path.iter().position(|&p| p == id) {
                let mut names: Vec<String> = path[pos..]
                    .iter()
                    .map(|p| by_id[p].name().to_string())
                    .collect();
                names.push(by_id[&id].name().to_string());
                return Err(DependencyCycle {
                    level: start.level(),
                    path: names,
                });
            }
            path.push(id);
            current = by_id
                .get(&id)
                .and_then(|n| n.depends_on())
                .filter(|dep| by_id.contains_key(dep));
        }

        acyclic.extend(path);
    }

    Ok(())
}

/// 按到达顺序处理的增长型工作队列
///
/// 处理一个节点时可以把它的直接依赖者追加到队尾。
#[derive(Debug, Clone)]
pub struct Worklist<T> {
    pending: VecDeque<T>,
}

impl<T> Worklist<T> {
    pub fn new(items: impl IntoIterator<Item = T>) -> Self {
        Self {
            pending: items.into_iter().collect(),
        }
    }

    pub fn extend(&mut self, items: impl IntoIterator<Item = T>) {
        self.pending.extend(items);
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

impl<T> Iterator for Worklist<T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        self.pending.pop_front()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::types::Scenario;

    fn scenario(id: DefinitionId, name: &str, depends_on: Option<DefinitionId>) -> Scenario {
        Scenario {
            id,
            name: name.to_string(),
            section_id: 1,
            depends_on,
        }
    }

    #[test]
    fn test_build_index() {
        let index = DependencyIndex::build(vec![
            scenario(10, "a", None),
            scenario(11, "b", Some(10)),
            scenario(12, "c", None),
            scenario(13, "d", Some(10)),
        ])
        .unwrap();

        let roots: Vec<_> = index.roots().iter().map(|s| s.id).collect();
        assert_eq!(roots, vec![10, 12]);

        let dependents: Vec<_> = index.dependents_of(10).iter().map(|s| s.id).collect();
        assert_eq!(dependents, vec![11, 13]);
        assert!(index.dependents_of(12).is_empty());
    }

    #[test]
    fn test_detect_cycle() {
        let err = DependencyIndex::build(vec![
            scenario(1, "root", None),
            scenario(2, "a", Some(3)),
            scenario(3, "b", Some(2)),
        ])
        .unwrap_err();

        assert_eq!(err.level, Level::Scenario);
        assert_eq!(err.path, vec!["a", "b", "a"]);
        assert_eq!(err.to_string(), "scenario dependency cycle: a -> b -> a");
    }

    #[test]
    fn test_detect_self_dependency() {
        let err = DependencyIndex::build(vec![scenario(5, "self", Some(5))]).unwrap_err();
        assert_eq!(err.path, vec!["self", "self"]);
    }

    #[test]
    fn test_dangling_dependency_is_not_a_cycle() {
        let index = DependencyIndex::build(vec![scenario(1, "orphan", Some(99))]).unwrap();
        assert!(index.roots().is_empty());
        assert_eq!(index.dependents_of(99).len(), 1);
    }

    #[test]
    fn test_worklist_grows_in_arrival_order() {
        let mut worklist = Worklist::new(vec![1, 2]);
        assert_eq!(worklist.next(), Some(1));
        worklist.extend(vec![3, 4]);
        assert_eq!(worklist.next(), Some(2));
        assert_eq!(worklist.next(), Some(3));
        assert_eq!(worklist.next(), Some(4));
        assert_eq!(worklist.next(), None);
        assert!(worklist.is_empty());
    }
}
