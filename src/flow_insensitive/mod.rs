use std::collections::VecDeque;

use etrace::some_or;
use log::trace;
use rustc_hash::FxHashMap;

use crate::{
    node::{NodeId, NodeKind},
    object::{ObjectId, ObjectStore},
    solver::{PointerAnalysis, Solver},
    subgraph::PointerSubgraph,
};


/// Runs a flow-insensitive solve and hands back the solved subgraph.
pub fn analyze(psg: PointerSubgraph) -> PointerSubgraph {
    let mut solver = Solver::new(psg, FlowInsensitive::new());
    solver.run();
    solver.into_parts().0
}

/// Flow-insensitive memory model: one memory object per pointed-to
/// allocation, allocated on first use. All updates are weak. A query for the
/// unknown-memory sentinel yields every object, since an unknown pointer may
/// alias any of them.
#[derive(Default)]
pub struct FlowInsensitive {
    objects: FxHashMap<NodeId, ObjectId>,
}

impl FlowInsensitive {
    pub fn new() -> Self {
        Self::default()
    }

    fn object_for(
        &mut self,
        psg: &PointerSubgraph,
        store: &mut ObjectStore,
        target: NodeId,
    ) -> Option<ObjectId> {
        match psg[target].kind() {
            NodeKind::Alloc | NodeKind::DynAlloc | NodeKind::Function | NodeKind::UnknownMem => {}
            _ => return None,
        }
        let id = *self.objects.entry(target).or_insert_with(|| {
            trace!("memory object for {:?}", target);
            store.alloc(target)
        });
        Some(id)
    }
}

impl PointerAnalysis for FlowInsensitive {
    fn memory_objects(
        &mut self,
        psg: &PointerSubgraph,
        objects: &mut ObjectStore,
        _at: NodeId,
        of: NodeId,
        out: &mut Vec<ObjectId>,
    ) {
        if of == NodeId::UNKNOWN_MEM {
            // make sure the unknown-memory object itself exists
            let _ = self.object_for(psg, objects, of);
            out.extend(objects.ids());
            return;
        }
        let id = some_or!(self.object_for(psg, objects, of), return);
        out.push(id);
    }

    // a single object per target makes whole-graph requeues pointless;
    // direct successors suffice, the outer pass catches the rest
    fn enqueue(&mut self, psg: &mut PointerSubgraph, queue: &mut VecDeque<NodeId>, n: NodeId) {
        queue.extend(psg[n].successors().iter().copied());
    }
}
