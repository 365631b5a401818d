//! The top-level IR object: a collection of modules that instantiate each
//! other.
use crate::Module;
use esi_utils::{Error, EsiResult, Id};
use linked_hash_map::LinkedHashMap;
use petgraph::algo;
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_CONTEXT_ID: AtomicU64 = AtomicU64::new(0);

/// Owns every module of a design, in insertion order.
#[derive(Debug)]
pub struct Context {
    /// Unique identifier of this context within the process.
    id: u64,
    modules: LinkedHashMap<Id, Module>,
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl Context {
    pub fn new() -> Self {
        Self {
            id: NEXT_CONTEXT_ID.fetch_add(1, Ordering::Relaxed),
            modules: LinkedHashMap::new(),
        }
    }

    /// Identifier distinguishing this context from every other context
    /// created in the same process.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Add a module. Module names are unique within a context.
    pub fn add_module(&mut self, module: Module) -> EsiResult<()> {
        if self.modules.contains_key(&module.name) {
            return Err(Error::malformed_structure(format!(
                "Module `{}' is already defined",
                module.name
            )));
        }
        log::debug!("Adding module `{}'", module.name);
        self.modules.insert(module.name, module);
        Ok(())
    }

    pub fn has_module<S: Into<Id>>(&self, name: S) -> bool {
        self.modules.contains_key(&name.into())
    }

    pub fn get_module<S: Into<Id>>(&self, name: S) -> Option<&Module> {
        self.modules.get(&name.into())
    }

    /// Modules in insertion order.
    pub fn modules(&self) -> impl Iterator<Item = &Module> {
        self.modules.values()
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Module names ordered so that every module comes after the modules it
    /// instantiates.
    pub fn dependency_order(&self) -> EsiResult<Vec<Id>> {
        let mut graph: DiGraph<Id, ()> = DiGraph::new();
        let rev_map: HashMap<Id, NodeIndex> = self
            .modules
            .keys()
            .map(|name| (*name, graph.add_node(*name)))
            .collect();

        for module in self.modules.values() {
            for callee in module.instantiated_modules() {
                let Some(src) = rev_map.get(&callee) else {
                    return Err(Error::malformed_structure(format!(
                        "Module `{}' instantiates undefined module `{}'",
                        module.name, callee
                    )));
                };
                graph.add_edge(*src, rev_map[&module.name], ());
            }
        }

        let topo = algo::toposort(&graph, None).map_err(|cycle| {
            Error::malformed_structure(format!(
                "Module `{}' instantiates itself",
                graph[cycle.node_id()]
            ))
        })?;
        Ok(topo.into_iter().map(|idx| graph[idx]).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Builder, PortInfo, Type};

    fn leaf(name: &str) -> Module {
        let mut m = Module::new(
            name,
            vec![
                PortInfo::input("a", Type::int(4)),
                PortInfo::output("b", Type::int(4)),
            ],
        );
        let mut b = Builder::new(&mut m);
        let a = b.arg("a");
        b.output(&[a]);
        m
    }

    #[test]
    fn rejects_duplicate_modules() {
        let mut ctx = Context::new();
        ctx.add_module(leaf("m")).unwrap();
        let err = ctx.add_module(leaf("m")).unwrap_err();
        assert!(matches!(
            err.kind(),
            esi_utils::ErrorKind::MalformedStructure(_)
        ));
    }

    #[test]
    fn contexts_have_distinct_ids() {
        assert_ne!(Context::new().id(), Context::new().id());
    }

    #[test]
    fn callees_come_first() {
        let mut ctx = Context::new();
        let mut top = Module::new(
            "top",
            vec![
                PortInfo::input("x", Type::int(4)),
                PortInfo::output("y", Type::int(4)),
            ],
        );
        let mut b = Builder::new(&mut top);
        let x = b.arg("x");
        let y = b.instance_of(&leaf("child"), "child_inst", &[x]);
        b.output(&y);
        ctx.add_module(top).unwrap();
        ctx.add_module(leaf("child")).unwrap();
        assert_eq!(
            ctx.dependency_order().unwrap(),
            vec![Id::new("child"), Id::new("top")]
        );
    }

    #[test]
    fn undefined_instances_are_reported() {
        let mut ctx = Context::new();
        let mut top =
            Module::new("top", vec![PortInfo::input("x", Type::int(4))]);
        let mut b = Builder::new(&mut top);
        let x = b.arg("x");
        b.instance_of(&leaf("ghost"), "g", &[x]);
        b.output(&[]);
        ctx.add_module(top).unwrap();
        assert!(ctx.dependency_order().is_err());
    }
}
