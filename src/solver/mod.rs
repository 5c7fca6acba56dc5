use std::collections::VecDeque;

use log::{debug, trace};
use rustc_hash::{FxHashMap, FxHashSet};

use crate::{
    node::{NodeId, NodeKind},
    object::{ObjectId, ObjectStore},
    pointer::{Offset, Pointer},
    subgraph::PointerSubgraph,
};


/// Customization points of the solver. An analysis supplies the memory-object
/// model and may override the queueing discipline, graph adjustment on
/// resolved function-pointer calls, and the two recoverable error channels.
pub trait PointerAnalysis {
    /// Populates `out` with the memory objects relevant to the target `of`
    /// at the program point `at`, allocating them in `objects` on demand.
    fn memory_objects(
        &mut self,
        psg: &PointerSubgraph,
        objects: &mut ObjectStore,
        at: NodeId,
        of: NodeId,
        out: &mut Vec<ObjectId>,
    );

    /// Called after `n`'s transfer changed some points-to state. The default
    /// requeues every node reachable from `n`.
    fn enqueue(&mut self, psg: &mut PointerSubgraph, queue: &mut VecDeque<NodeId>, n: NodeId) {
        let mut nodes = vec![];
        psg.collect_reachable(n, &mut nodes);
        queue.extend(nodes);
    }

    fn before_processed(&mut self, _psg: &mut PointerSubgraph, _n: NodeId) {}

    fn after_processed(&mut self, _psg: &mut PointerSubgraph, _n: NodeId) {}

    /// Attaches the subgraph of `callee` at the call site `call`. Returns
    /// whether the graph changed; newly reachable nodes are picked up on the
    /// next seeding pass.
    fn function_pointer_call(
        &mut self,
        _psg: &mut PointerSubgraph,
        _call: NodeId,
        _callee: NodeId,
    ) -> bool {
        false
    }

    /// Generic channel for analysis-detected anomalies. Returns whether the
    /// hook changed some points-to state.
    fn error(&mut self, _psg: &mut PointerSubgraph, _at: NodeId, _msg: &str) -> bool {
        false
    }

    /// Called when a load observes an empty points-to set at a memory object
    /// of `to` that is not zero-initialized. Flow-insensitive analyses treat
    /// this as no error; a flow-sensitive one may add `(UnknownMem, ?)` to
    /// `from` and return true.
    fn error_empty_points_to(
        &mut self,
        _psg: &mut PointerSubgraph,
        _from: NodeId,
        _to: NodeId,
    ) -> bool {
        false
    }
}

/// Worklist fixpoint solver over a pointer subgraph. Transfers are monotone,
/// so iterating until a full pass reports no change terminates with the
/// least fixpoint regardless of queueing order.
pub struct Solver<A> {
    psg: PointerSubgraph,
    objects: ObjectStore,
    queue: VecDeque<NodeId>,
    analysis: A,
    resolved_calls: FxHashMap<NodeId, FxHashSet<NodeId>>,
}

impl<A: PointerAnalysis> Solver<A> {
    pub fn new(psg: PointerSubgraph, analysis: A) -> Self {
        assert!(psg.root().is_some(), "pointer subgraph has no root");
        Self {
            psg,
            objects: ObjectStore::new(),
            queue: VecDeque::new(),
            analysis,
            resolved_calls: FxHashMap::default(),
        }
    }

    #[inline]
    pub fn psg(&self) -> &PointerSubgraph {
        &self.psg
    }

    #[inline]
    pub fn psg_mut(&mut self) -> &mut PointerSubgraph {
        &mut self.psg
    }

    #[inline]
    pub fn objects(&self) -> &ObjectStore {
        &self.objects
    }

    #[inline]
    pub fn analysis(&self) -> &A {
        &self.analysis
    }

    #[inline]
    pub fn analysis_mut(&mut self) -> &mut A {
        &mut self.analysis
    }

    #[inline]
    pub fn pending_in_queue(&self) -> usize {
        self.queue.len()
    }

    pub fn into_parts(self) -> (PointerSubgraph, A) {
        (self.psg, self.analysis)
    }

    /// Runs the solve to fixpoint: a pass seeds the queue with every node
    /// reachable from the root and drains it, requeueing on change; passes
    /// repeat until one records no change at all.
    pub fn run(&mut self) {
        let root = self.psg.root().unwrap();
        let mut passes = 0;
        loop {
            passes += 1;
            self.seed(root);
            debug!("pass {}: {} nodes seeded", passes, self.queue.len());
            let mut changed = false;
            while let Some(cur) = self.queue.pop_front() {
                self.analysis.before_processed(&mut self.psg, cur);
                let node_changed = self.process_node(cur);
                self.analysis.after_processed(&mut self.psg, cur);
                if node_changed {
                    changed = true;
                    self.analysis.enqueue(&mut self.psg, &mut self.queue, cur);
                }
            }
            if !changed {
                break;
            }
        }
        debug!("fixpoint reached after {} passes", passes);
    }

    fn seed(&mut self, root: NodeId) {
        let mut nodes = vec![];
        self.psg.collect_reachable(root, &mut nodes);
        self.queue.extend(nodes);
    }

    fn process_node(&mut self, n: NodeId) -> bool {
        match self.psg[n].kind().clone() {
            // constant or empty contributions
            NodeKind::Alloc
            | NodeKind::DynAlloc
            | NodeKind::Function
            | NodeKind::Constant { .. }
            | NodeKind::NullAddr
            | NodeKind::UnknownMem
            | NodeKind::Noop
            | NodeKind::Entry => false,
            NodeKind::Cast { value } => self.psg.copy_points_to(n, value),
            NodeKind::Load { ptr } => self.process_load(n, ptr),
            NodeKind::Store { value, dest } => self.process_store(n, value, dest),
            NodeKind::Gep { base, offset } => self.process_gep(n, base, offset),
            NodeKind::Memcpy {
                src,
                dst,
                offset,
                len,
            } => self.process_memcpy(n, src, dst, offset, len),
            NodeKind::Phi(ops)
            | NodeKind::Call(ops)
            | NodeKind::CallReturn(ops)
            | NodeKind::Return(ops) => {
                let mut changed = false;
                for op in ops {
                    changed |= self.psg.copy_points_to(n, op);
                }
                changed
            }
            NodeKind::CallFuncPtr { func } => self.process_funcptr(n, func),
        }
    }

    fn process_load(&mut self, n: NodeId, ptr: NodeId) -> bool {
        let ptrs: Vec<Pointer> = self.psg[ptr].points_to().iter().collect();
        let mut changed = false;
        let mut objects = vec![];
        for p in ptrs {
            if p.target == NodeId::NULL_ADDR {
                changed |= self.analysis.error(&mut self.psg, n, "load via null pointer");
                continue;
            }
            objects.clear();
            self.analysis
                .memory_objects(&self.psg, &mut self.objects, n, p.target, &mut objects);
            for &mo in &objects {
                if self.objects[mo].is_empty_at(p.offset) {
                    if self.psg[p.target].is_zero_initialized() {
                        changed |=
                            self.psg
                                .add_points_to(n, Pointer::new(NodeId::NULL_ADDR, Offset::ZERO));
                    } else {
                        changed |= self
                            .analysis
                            .error_empty_points_to(&mut self.psg, n, p.target);
                    }
                } else {
                    changed |= self.objects[mo].read_into(p.offset, &mut self.psg[n].points_to);
                }
            }
        }
        changed
    }

    fn process_store(&mut self, n: NodeId, value: NodeId, dest: NodeId) -> bool {
        let dests: Vec<Pointer> = self.psg[dest].points_to().iter().collect();
        let mut changed = false;
        let mut objects = vec![];
        for p in dests {
            if p.target == NodeId::NULL_ADDR {
                changed |= self
                    .analysis
                    .error(&mut self.psg, n, "store via null pointer");
                continue;
            }
            objects.clear();
            self.analysis
                .memory_objects(&self.psg, &mut self.objects, n, p.target, &mut objects);
            for &mo in &objects {
                changed |= self.objects[mo].write(p.offset, self.psg[value].points_to());
            }
        }
        changed
    }

    fn process_gep(&mut self, n: NodeId, base: NodeId, offset: Offset) -> bool {
        let ptrs: Vec<Pointer> = self.psg[base].points_to().iter().collect();
        let mut changed = false;
        for p in ptrs {
            changed |= self
                .psg
                .add_points_to(n, Pointer::new(p.target, p.offset + offset));
        }
        changed
    }

    fn process_memcpy(
        &mut self,
        n: NodeId,
        src: NodeId,
        dst: NodeId,
        offset: Offset,
        len: Offset,
    ) -> bool {
        let src_ptrs: Vec<Pointer> = self.psg[src].points_to().iter().collect();
        let dst_ptrs: Vec<Pointer> = self.psg[dst].points_to().iter().collect();
        let mut changed = false;
        let mut src_objects = vec![];
        let mut dst_objects = vec![];
        for p in src_ptrs {
            if p.target == NodeId::NULL_ADDR {
                changed |= self
                    .analysis
                    .error(&mut self.psg, n, "memcpy via null pointer");
                continue;
            }
            self.analysis
                .memory_objects(&self.psg, &mut self.objects, n, p.target, &mut src_objects);
        }
        for p in dst_ptrs {
            if p.target == NodeId::NULL_ADDR {
                changed |= self
                    .analysis
                    .error(&mut self.psg, n, "memcpy via null pointer");
                continue;
            }
            self.analysis
                .memory_objects(&self.psg, &mut self.objects, n, p.target, &mut dst_objects);
        }
        for &ms in &src_objects {
            for &md in &dst_objects {
                if ms != md {
                    changed |= self.objects.copy_region(ms, md, offset, len);
                }
            }
        }
        changed
    }

    fn process_funcptr(&mut self, n: NodeId, func: NodeId) -> bool {
        let targets: Vec<NodeId> = self.psg[func].points_to().targets().collect();
        let mut changed = false;
        for t in targets {
            if !matches!(self.psg[t].kind(), NodeKind::Function) {
                continue;
            }
            // one resolution per (call, callee) pair per solve
            if !self.resolved_calls.entry(n).or_default().insert(t) {
                continue;
            }
            trace!("resolving call {:?} -> {:?}", n, t);
            changed |= self.analysis.function_pointer_call(&mut self.psg, n, t);
        }
        changed
    }
}
