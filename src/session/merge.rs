//! Cross-unit merging
//!
//! Units are analysed in independent sessions and folded into one target
//! session afterwards. The fold is the only synchronisation point: node
//! ids are shifted into the target arena, types re-interned, the global
//! scopes merged and namespaces with the same qualified name unified.

use super::{Session, SessionOptions};
use crate::graph::NodeId;
use crate::language::LanguageRegistry;
use crate::scope::ScopeId;
use crate::types::{Provenance, TypeId};
use crate::{Error, Result, UnitMessage};
use std::thread;
use tracing::{error, info};

impl Session {
    /// Fold another session into this one.
    ///
    /// The other session must be back at its global scope.
    pub fn merge_from(&mut self, other: Session) -> Result<()> {
        let current = other.scopes.current();
        if current != ScopeId::root() {
            return Err(Error::Scope(format!(
                "cannot merge a session left in scope {}",
                current.0
            )));
        }

        let offset = self.graph.len() as u32;
        let nodes = move |id: NodeId| NodeId(id.0 + offset);

        // ids are assigned in interning order, so every component of a type
        // is mapped before the type itself
        let mut type_map: Vec<TypeId> = Vec::with_capacity(other.types.len());
        for (id, ty) in other.types.iter() {
            let remapped = ty.remap(|t| type_map.get(t.0 as usize).copied().unwrap_or(t), nodes);
            let merged = self.types.intern(remapped);
            let provenance = other.types.provenance(id);
            if self.types.provenance(merged) == Provenance::Unresolved && provenance != Provenance::Unresolved {
                self.types.set_provenance(merged, provenance);
            }
            type_map.push(merged);
        }
        let types = |t: TypeId| type_map.get(t.0 as usize).copied().unwrap_or(t);

        self.types.absorb_bindings(&other.types, &type_map, nodes);
        let scope_map = self.scopes.absorb(&other.scopes, nodes, types);
        let scopes = |s: ScopeId| scope_map.get(s.0 as usize).copied().unwrap_or_else(ScopeId::root);

        let node_count = other.graph.len();
        self.graph.absorb(other.graph, nodes, types, scopes);
        self.propagation.absorb(other.propagation, nodes, types);
        self.expressions.extend(other.expressions.iter().map(|e| nodes(*e)));
        self.diagnostics.extend(other.diagnostics);
        if self.unit.is_none() {
            self.unit = other.unit.map(nodes);
        }
        if self.language.is_none() {
            self.language = other.language;
        }

        info!(
            "Merged {} nodes, {} types and {} scopes",
            node_count,
            type_map.len(),
            scope_map.len()
        );
        Ok(())
    }
}

/// Analyse units in parallel and merge the results in unit order.
///
/// Each unit gets its own session on a scoped thread; `build` drives the
/// session like a frontend would, after which the unit is resolved. The
/// first failing unit aborts the whole analysis.
pub fn analyze_units<U, F>(
    units: &[U],
    languages: &LanguageRegistry,
    options: SessionOptions,
    build: F,
) -> Result<Session>
where
    U: Sync,
    F: Fn(&mut Session, &U) -> Result<()> + Sync,
{
    let (tx, rx) = crossbeam::channel::unbounded::<UnitMessage>();

    thread::scope(|scope| {
        for (index, unit) in units.iter().enumerate() {
            let tx = tx.clone();
            let build = &build;
            scope.spawn(move || {
                let mut session = Session::new(languages.clone(), options);
                let message = match build(&mut session, unit) {
                    Ok(()) => {
                        session.resolve();
                        UnitMessage::Done {
                            index,
                            session: Box::new(session),
                        }
                    }
                    Err(error) => UnitMessage::Failed { index, error },
                };
                // the receiver outlives every worker
                let _ = tx.send(message);
            });
        }
    });
    drop(tx);

    let mut slots: Vec<Option<Session>> = (0..units.len()).map(|_| None).collect();
    for message in rx {
        match message {
            UnitMessage::Done { index, session } => {
                if let Some(slot) = slots.get_mut(index) {
                    *slot = Some(*session);
                }
            }
            UnitMessage::Failed { index, error } => {
                error!("Unit {} failed: {}", index, error);
                return Err(error);
            }
        }
    }

    let mut merged = Session::new(languages.clone(), options);
    for (index, slot) in slots.into_iter().enumerate() {
        let session = slot.ok_or_else(|| Error::Merge(format!("unit {} produced no session", index)))?;
        merged.merge_from(session)?;
    }
    info!("Analysed {} units", units.len());
    Ok(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::NodeKind;
    use crate::language::default_registry;

    fn cpp_session() -> Session {
        let mut session = Session::default();
        session.new_translation_unit("main.cpp", "cpp");
        session
    }

    fn invokes(session: &Session, call: NodeId) -> Vec<NodeId> {
        match session.graph.kind(call) {
            Some(NodeKind::Call { invokes, .. }) => invokes.clone(),
            other => panic!("not a call: {:?}", other),
        }
    }

    #[test]
    fn test_merge_unifies_namespaces() {
        let mut first = cpp_session();
        let ns = first.new_namespace("util");
        first.enter_scope(ns);
        first.new_function("helper", "int", vec![]);
        first.leave_scope(ns);

        let mut second = Session::default();
        second.new_translation_unit("other.cpp", "cpp");
        let ns = second.new_namespace("util");
        second.enter_scope(ns);
        let call = second.new_call("helper", vec![], None);
        second.leave_scope(ns);

        let offset = first.graph.len() as u32;
        first.merge_from(second).unwrap();

        let util = first.scopes.lookup_scope_by_name("util").unwrap();
        assert_eq!(first.scopes.scope(util).unwrap().value_declarations.len(), 1);
        assert_eq!(first.scopes.iter().filter(|s| s.name.is_some()).count(), 1);

        let call = NodeId(call.0 + offset);
        let stats = first.resolve();
        assert_eq!(stats.inferred, 0);
        assert_eq!(first.graph.local_name(invokes(&first, call)[0]), "helper");
    }

    #[test]
    fn test_merge_rejects_open_scope() {
        let mut target = cpp_session();
        let mut other = cpp_session();
        let block = other.new_block();
        other.enter_scope(block);

        assert!(matches!(target.merge_from(other), Err(Error::Scope(_))));
    }

    #[test]
    fn test_analyze_units_merges_in_order() {
        let units = vec!["a", "b", "c"];
        let session = analyze_units(&units, &default_registry(), SessionOptions::default(), |session, unit| {
            session.new_translation_unit(&format!("{}.cpp", unit), "cpp");
            let ns = session.new_namespace("shared");
            session.enter_scope(ns);
            session.new_function(unit, "int", vec![]);
            session.leave_scope(ns);
            Ok(())
        })
        .unwrap();

        let shared = session.scopes.lookup_scope_by_name("shared").unwrap();
        let names: Vec<&str> = session
            .scopes
            .scope(shared)
            .unwrap()
            .value_declarations
            .iter()
            .map(|d| session.graph.local_name(*d))
            .collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_analyze_units_propagates_failure() {
        let units = vec![1, 2];
        let result = analyze_units(&units, &default_registry(), SessionOptions::default(), |_, unit| {
            if *unit == 2 {
                Err(Error::UnknownLanguage("cobol".into()))
            } else {
                Ok(())
            }
        });
        assert!(matches!(result, Err(Error::UnknownLanguage(_))));
    }
}
